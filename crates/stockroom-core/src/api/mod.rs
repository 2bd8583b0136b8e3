//! Gateway to the inventory REST API.
//!
//! `Gateway` is the contract the session manager and health monitor depend
//! on; `ApiClient` implements it over HTTP. The bearer credential, when set,
//! is attached to every outgoing request as an `Authorization` header.

pub mod client;
pub mod error;
pub mod gateway;

pub use client::ApiClient;
pub use error::ApiError;
pub use gateway::{
    ApiEnvelope, Gateway, HealthResponse, LoginResponse, LoginUser, Pagination, RefreshData,
    RefreshResponse, VerifyResponse,
};
