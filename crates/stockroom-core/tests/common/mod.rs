//! Shared helpers for integration tests.
//!
//! `ScriptedGateway` answers each call from a per-operation queue. A reply
//! can resolve immediately, after a (paused-clock) delay, or only when the
//! test releases it through a oneshot sender, which is how tests keep a
//! call in flight across a logout.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;

use stockroom_core::api::{
    ApiEnvelope, ApiError, Gateway, HealthResponse, LoginResponse, LoginUser, RefreshData,
    RefreshResponse, VerifyResponse,
};
use stockroom_core::auth::{CredentialStore, SessionManager};
use stockroom_core::{Credential, KeyValueStore, MemoryStore, Role, UserRecord};

pub enum Reply<T> {
    Now(Result<T, ApiError>),
    After(Duration, Result<T, ApiError>),
    Hold(oneshot::Receiver<Result<T, ApiError>>),
}

impl<T> Reply<T> {
    async fn resolve(self) -> Result<T, ApiError> {
        match self {
            Reply::Now(result) => result,
            Reply::After(delay, result) => {
                tokio::time::sleep(delay).await;
                result
            }
            Reply::Hold(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ApiError::Network("held reply dropped".to_string()))),
        }
    }
}

struct Script<T> {
    queue: Mutex<VecDeque<Reply<T>>>,
    fallback: Mutex<Result<T, ApiError>>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    fn new(fallback: Result<T, ApiError>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicUsize::new(0),
        }
    }

    fn push(&self, reply: Reply<T>) {
        self.queue.lock().unwrap().push_back(reply);
    }

    fn hold(&self) -> oneshot::Sender<Result<T, ApiError>> {
        let (tx, rx) = oneshot::channel();
        self.push(Reply::Hold(rx));
        tx
    }

    fn set_fallback(&self, result: Result<T, ApiError>) {
        *self.fallback.lock().unwrap() = result;
    }

    fn next(&self) -> Reply<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.queue.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Reply::Now(self.fallback.lock().unwrap().clone()))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub struct ScriptedGateway {
    token: Mutex<Option<Credential>>,
    base_url: Mutex<String>,
    login: Script<LoginResponse>,
    verify: Script<VerifyResponse>,
    refresh: Script<RefreshResponse>,
    health: Script<HealthResponse>,
    stats: Script<ApiEnvelope<Value>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            token: Mutex::new(None),
            base_url: Mutex::new(String::new()),
            login: Script::new(Ok(login_ok("T1"))),
            verify: Script::new(Ok(VerifyResponse { success: true, message: None })),
            refresh: Script::new(Ok(refresh_ok("T2"))),
            health: Script::new(Ok(health_ok())),
            stats: Script::new(Err(ApiError::Network("connection refused".to_string()))),
        })
    }

    pub fn base_url(&self) -> String {
        self.base_url.lock().unwrap().clone()
    }

    // ----- login -----
    pub fn push_login(&self, reply: Reply<LoginResponse>) {
        self.login.push(reply);
    }
    pub fn hold_login(&self) -> oneshot::Sender<Result<LoginResponse, ApiError>> {
        self.login.hold()
    }
    pub fn login_calls(&self) -> usize {
        self.login.calls()
    }

    // ----- verify -----
    pub fn push_verify(&self, reply: Reply<VerifyResponse>) {
        self.verify.push(reply);
    }
    pub fn hold_verify(&self) -> oneshot::Sender<Result<VerifyResponse, ApiError>> {
        self.verify.hold()
    }

    // ----- refresh -----
    pub fn push_refresh(&self, reply: Reply<RefreshResponse>) {
        self.refresh.push(reply);
    }
    pub fn hold_refresh(&self) -> oneshot::Sender<Result<RefreshResponse, ApiError>> {
        self.refresh.hold()
    }
    pub fn set_refresh_fallback(&self, result: Result<RefreshResponse, ApiError>) {
        self.refresh.set_fallback(result);
    }
    pub fn refresh_calls(&self) -> usize {
        self.refresh.calls()
    }

    // ----- health -----
    pub fn push_health(&self, reply: Reply<HealthResponse>) {
        self.health.push(reply);
    }
    pub fn set_health_fallback(&self, result: Result<HealthResponse, ApiError>) {
        self.health.set_fallback(result);
    }
    pub fn health_calls(&self) -> usize {
        self.health.calls()
    }

    // ----- generic GET -----
    pub fn set_stats_fallback(&self, result: Result<ApiEnvelope<Value>, ApiError>) {
        self.stats.set_fallback(result);
    }
    pub fn stats_calls(&self) -> usize {
        self.stats.calls()
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    fn set_token(&self, token: Option<&Credential>) {
        *self.token.lock().unwrap() = token.cloned();
    }

    fn token(&self) -> Option<Credential> {
        self.token.lock().unwrap().clone()
    }

    fn set_base_url(&self, base_url: &str) {
        *self.base_url.lock().unwrap() = base_url.to_string();
    }

    async fn login(&self, _email: &str, _password: &str) -> Result<LoginResponse, ApiError> {
        self.login.next().resolve().await
    }

    async fn verify(&self) -> Result<VerifyResponse, ApiError> {
        self.verify.next().resolve().await
    }

    async fn refresh(&self) -> Result<RefreshResponse, ApiError> {
        self.refresh.next().resolve().await
    }

    async fn health(&self) -> Result<HealthResponse, ApiError> {
        self.health.next().resolve().await
    }

    async fn get_json(&self, _path: &str) -> Result<ApiEnvelope<Value>, ApiError> {
        self.stats.next().resolve().await
    }
}

// =========================================================================
// Canned payloads
// =========================================================================

pub fn login_ok(token: &str) -> LoginResponse {
    LoginResponse {
        success: true,
        token: Some(token.to_string()),
        user: Some(LoginUser {
            id: "1".to_string(),
            email: "a@x.com".to_string(),
            role: Some("user".to_string()),
            name: None,
        }),
        message: None,
    }
}

pub fn login_rejected(message: &str) -> LoginResponse {
    LoginResponse {
        success: false,
        token: None,
        user: None,
        message: Some(message.to_string()),
    }
}

pub fn refresh_ok(token: &str) -> RefreshResponse {
    RefreshResponse {
        success: true,
        data: Some(RefreshData { token: token.to_string() }),
        message: None,
    }
}

pub fn health_ok() -> HealthResponse {
    HealthResponse {
        status: Some("OK".to_string()),
        success: None,
        timestamp: Some("2024-01-01T00:00:00Z".to_string()),
        uptime: Some(42.0),
        version: Some("1.0.0".to_string()),
    }
}

pub fn network_error() -> ApiError {
    ApiError::Network("connection refused".to_string())
}

pub fn stored_user() -> UserRecord {
    UserRecord {
        id: "1".to_string(),
        email: "a@x.com".to_string(),
        role: Role::User,
        display_name: "Alice".to_string(),
    }
}

/// Session manager over a fresh in-memory store.
pub fn session_manager(gateway: &Arc<ScriptedGateway>) -> (Arc<SessionManager>, Arc<MemoryStore>) {
    let kv = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(gateway.clone(), CredentialStore::new(kv.clone()));
    (Arc::new(manager), kv)
}

/// Persist a `{token, user}` pair as a previous run would have.
pub fn seed_session(kv: &Arc<MemoryStore>, token: &str) {
    CredentialStore::new(kv.clone())
        .save(&Credential::new(token), &stored_user())
        .expect("seed stored session");
}

pub fn stored_token(kv: &MemoryStore) -> Option<String> {
    kv.get("auth-token").expect("read token")
}

/// Let spawned tasks run up to their next await point.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
