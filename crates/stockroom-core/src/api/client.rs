//! HTTP client for the inventory REST API.
//!
//! `ApiClient` implements `Gateway` over `reqwest`. It owns a shared token
//! slot so every clone attaches the same bearer credential.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::gateway::{
    ApiEnvelope, Gateway, HealthResponse, LoginResponse, RefreshResponse, VerifyResponse,
};
use super::ApiError;
use crate::models::Credential;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

const LOGIN_PATH: &str = "/api/auth/login";
const VERIFY_PATH: &str = "/api/auth/verify";
const REFRESH_PATH: &str = "/api/auth/refresh";
const HEALTH_PATH: &str = "/health";

/// API client for the inventory backend.
/// Clone is cheap - reqwest::Client, base URL and token slot are all shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<RwLock<String>>,
    token: Arc<RwLock<Option<Credential>>>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: Arc::new(RwLock::new(normalize_base_url(base_url))),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url(), path)
        } else {
            format!("{}/{}", self.base_url(), path)
        }
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(token) = self.token() {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                .map_err(|_| ApiError::Unauthorized)?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<reqwest::Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .headers(self.auth_headers()?);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn send_json<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.send(method.clone(), path, body).await?;
        let text = response.text().await?;
        debug!(method = %method, path = path, bytes = text.len(), "Response received");
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("{} {}: {}", method, path, e))
        })
    }

    // ===== Generic CRUD =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json::<T, ()>(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send_json(Method::POST, path, Some(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send_json(Method::PUT, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json::<T, ()>(Method::DELETE, path, None).await
    }
}

#[async_trait]
impl Gateway for ApiClient {
    fn set_token(&self, token: Option<&Credential>) {
        let mut slot = self.token.write().unwrap_or_else(|e| e.into_inner());
        *slot = token.cloned();
    }

    fn token(&self) -> Option<Credential> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_base_url(&self, base_url: &str) {
        let mut slot = self.base_url.write().unwrap_or_else(|e| e.into_inner());
        *slot = normalize_base_url(base_url);
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        self.post(LOGIN_PATH, &body).await
    }

    async fn verify(&self) -> Result<VerifyResponse, ApiError> {
        self.get(VERIFY_PATH).await
    }

    async fn refresh(&self) -> Result<RefreshResponse, ApiError> {
        self.post(REFRESH_PATH, &serde_json::json!({})).await
    }

    async fn health(&self) -> Result<HealthResponse, ApiError> {
        self.get(HEALTH_PATH).await
    }

    async fn get_json(&self, path: &str) -> Result<ApiEnvelope<Value>, ApiError> {
        self.get(path).await
    }
}

fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}
