//! Session lifecycle state machine.
//!
//! `SessionManager` owns the credential: it performs login, startup
//! verification, refresh and logout, mirrors the token into the gateway
//! and the credential store, and publishes every state change on a
//! `watch` channel.
//!
//! Each async operation captures the current generation before its gateway
//! call and re-checks it before applying the result. `logout` bumps the
//! generation, so anything that was in flight when it ran is discarded.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::credentials::CredentialStore;
use crate::api::{ApiError, Gateway, LoginResponse, RefreshResponse};
use crate::models::{Credential, Session, SessionStatus, UserRecord};

struct Inner {
    session: Session,
    generation: u64,
}

pub struct SessionManager {
    gateway: Arc<dyn Gateway>,
    store: CredentialStore,
    inner: Mutex<Inner>,
    updates: watch::Sender<Session>,
}

impl SessionManager {
    pub fn new(gateway: Arc<dyn Gateway>, store: CredentialStore) -> Self {
        let (updates, _) = watch::channel(Session::initializing());
        Self {
            gateway,
            store,
            inner: Mutex::new(Inner {
                session: Session::initializing(),
                generation: 0,
            }),
            updates,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn commit(&self, inner: &mut Inner, session: Session) {
        debug!(from = ?inner.session.status, to = ?session.status, "Session transition");
        inner.session = session;
        self.updates.send_replace(inner.session.clone());
    }

    /// Clear memory, store and gateway token, and invalidate in-flight calls.
    fn reset(&self, inner: &mut Inner) {
        inner.generation += 1;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored session");
        }
        self.gateway.set_token(None);
        self.commit(inner, Session::unauthenticated());
    }

    // =========================================================================
    // Read model
    // =========================================================================

    pub fn session(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().session.status
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().session.is_authenticated()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.updates.subscribe()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Restore the persisted session and verify it against the backend.
    ///
    /// Only acts while `Initializing`. Any verify failure clears the store.
    pub async fn initialize(&self) -> bool {
        let (generation, stored) = {
            let mut inner = self.lock();
            if inner.session.status != SessionStatus::Initializing {
                debug!(status = ?inner.session.status, "Session already initialized");
                return inner.session.is_authenticated();
            }

            let Some(stored) = self.store.load() else {
                debug!("No usable stored session");
                // Drop any half of a pair left behind
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Failed to clear stored session");
                }
                self.commit(&mut inner, Session::unauthenticated());
                return false;
            };

            self.gateway.set_token(Some(&stored.token));
            (inner.generation, stored)
        };

        let result = self.gateway.verify().await;

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!("Discarding verify result that resolved after logout");
            return false;
        }

        match result {
            Ok(response) if response.success => {
                info!(user = %stored.user.email, "Stored session verified");
                self.commit(&mut inner, Session::authenticated(stored.user, stored.token));
                true
            }
            Ok(response) => {
                warn!(message = ?response.message, "Stored token rejected");
                self.reset(&mut inner);
                false
            }
            Err(e) => {
                warn!(error = %e, "Stored token could not be verified");
                self.reset(&mut inner);
                false
            }
        }
    }

    /// Sign in. Never fails loudly: on any failure the session moves to
    /// `Error` with a user-facing message and `false` is returned.
    ///
    /// Only accepted from `Unauthenticated` or `Error`; otherwise the call is
    /// ignored and the state is left as is.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        let generation = {
            let mut inner = self.lock();
            match inner.session.status {
                SessionStatus::Unauthenticated | SessionStatus::Error => {}
                other => {
                    warn!(status = ?other, "Login ignored in current session state");
                    return false;
                }
            }

            if email.trim().is_empty() || password.is_empty() {
                self.commit(&mut inner, Session::failed("Email and password are required"));
                return false;
            }

            self.commit(&mut inner, Session::authenticating());
            inner.generation
        };

        let result = self.gateway.login(email.trim(), password).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!("Discarding login response that resolved after logout");
            return false;
        }

        match accept_login(result) {
            Ok((token, user)) => {
                if !user.role.is_known() {
                    warn!(role = %user.role, "Unknown role, treating as lowest privilege");
                }
                if let Err(e) = self.store.save(&token, &user) {
                    warn!(error = %e, "Failed to persist session");
                }
                self.gateway.set_token(Some(&token));
                info!(user = %user.email, role = %user.role, "Login successful");
                self.commit(&mut inner, Session::authenticated(user, token));
                true
            }
            Err(message) => {
                error!(error = %message, "Login failed");
                self.commit(&mut inner, Session::failed(message));
                false
            }
        }
    }

    /// Sign out. Synchronous and unconditional; a no-op when already signed out.
    pub fn logout(&self) {
        let mut inner = self.lock();
        if inner.session.status == SessionStatus::Unauthenticated {
            return;
        }
        self.reset(&mut inner);
        info!("Logged out");
    }

    /// Exchange the current token for a fresh one.
    ///
    /// A failed refresh means the credential is no longer usable, so the
    /// session is logged out rather than retried. A call made while another
    /// refresh is in flight waits for that one and reports its outcome.
    /// `false` is returned only when no session is left afterwards.
    pub async fn refresh_token(&self) -> bool {
        let generation = {
            let mut inner = self.lock();
            match inner.session.status {
                SessionStatus::Authenticated => {
                    let mut refreshing = inner.session.clone();
                    refreshing.status = SessionStatus::Refreshing;
                    self.commit(&mut inner, refreshing);
                    Some(inner.generation)
                }
                SessionStatus::Refreshing => None,
                other => {
                    debug!(status = ?other, "Refresh skipped, no authenticated session");
                    return false;
                }
            }
        };
        let Some(generation) = generation else {
            return self.join_refresh().await;
        };

        let result = self.gateway.refresh().await;

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!("Discarding refresh response that resolved after logout");
            return false;
        }

        match accept_refresh(result) {
            Ok(token) => {
                if let Err(e) = self.store.save_token(&token) {
                    warn!(error = %e, "Failed to persist refreshed token");
                }
                self.gateway.set_token(Some(&token));
                let mut refreshed = inner.session.clone();
                refreshed.status = SessionStatus::Authenticated;
                refreshed.token = Some(token);
                self.commit(&mut inner, refreshed);
                debug!("Token refreshed");
                true
            }
            Err(reason) => {
                warn!(reason = %reason, "Token refresh failed, ending session");
                self.reset(&mut inner);
                false
            }
        }
    }

    /// Wait for the refresh already in flight and report whether the session survived it.
    async fn join_refresh(&self) -> bool {
        debug!("Refresh already in flight, joining it");
        let mut updates = self.updates.subscribe();
        let survived = match updates
            .wait_for(|session| session.status != SessionStatus::Refreshing)
            .await
        {
            Ok(session) => session.status == SessionStatus::Authenticated,
            Err(_) => false,
        };
        survived
    }
}

fn accept_login(result: Result<LoginResponse, ApiError>) -> Result<(Credential, UserRecord), String> {
    let response = result.map_err(|e| e.user_message())?;
    if !response.success {
        return Err(response
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Login failed".to_string()));
    }

    let token = response
        .token
        .map(Credential::new)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "Login failed: response did not include a token".to_string())?;
    let user = response
        .user
        .ok_or_else(|| "Login failed: response did not include a user".to_string())?
        .into_record();

    Ok((token, user))
}

fn accept_refresh(result: Result<RefreshResponse, ApiError>) -> Result<Credential, String> {
    let response = result.map_err(|e| e.to_string())?;
    if !response.success {
        return Err(response.message.unwrap_or_else(|| "refresh rejected".to_string()));
    }
    response
        .data
        .map(|d| Credential::new(d.token))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "refresh response did not include a token".to_string())
}
