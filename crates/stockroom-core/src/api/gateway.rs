use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiError;
use crate::models::{Credential, Role, UserRecord};

/// Network boundary consumed by the session manager and health monitor.
///
/// Implementations normalise transport failures and non-2xx statuses into
/// `ApiError`; a 2xx body is returned as-is for the caller to classify.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Replace (or clear) the bearer credential attached to outgoing calls.
    fn set_token(&self, token: Option<&Credential>);

    fn token(&self) -> Option<Credential>;

    /// Point subsequent calls at a different backend.
    fn set_base_url(&self, _base_url: &str) {}

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;

    async fn verify(&self) -> Result<VerifyResponse, ApiError>;

    async fn refresh(&self) -> Result<RefreshResponse, ApiError>;

    async fn health(&self) -> Result<HealthResponse, ApiError>;

    /// Generic authenticated GET returning the standard `{success, data}` envelope.
    async fn get_json(&self, path: &str) -> Result<ApiEnvelope<Value>, ApiError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginUser {
    #[serde(deserialize_with = "crate::models::user::string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl LoginUser {
    /// Convert to the domain record; a missing name falls back to the email.
    pub fn into_record(self) -> UserRecord {
        let display_name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.email.clone());
        UserRecord {
            id: self.id,
            role: Role::from(self.role.unwrap_or_default()),
            email: self.email,
            display_name,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<LoginUser>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshData {
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<RefreshData>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `GET /health`. The backend answers either with the plain
/// `{status: "OK", ...}` form or wrapped in the `{success}` envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub uptime: Option<f64>,
    #[serde(default)]
    pub version: Option<String>,
}

impl HealthResponse {
    pub fn is_ok(&self) -> bool {
        let status_ok = self
            .status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("ok"))
            .unwrap_or(false);
        status_ok || self.success == Some(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default, rename = "totalPages", alias = "pages")]
    pub total_pages: u64,
}

/// Standard `{success, data, pagination?}` envelope of the CRUD routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            pagination: None,
            error: None,
            message: None,
        }
    }

    /// Unwrap the payload, turning `{success: false}` into `ApiError::Rejected`.
    pub fn into_data(self) -> Result<T, ApiError> {
        if !self.success {
            let reason = self
                .error
                .or(self.message)
                .unwrap_or_else(|| "Request failed".to_string());
            return Err(ApiError::Rejected(reason));
        }
        self.data
            .ok_or_else(|| ApiError::InvalidResponse("Missing data in response".to_string()))
    }
}
