//! Stockroom core: client-side session lifecycle and backend health for the
//! inventory API.
//!
//! Build an [`Orchestrator`] once with a [`Gateway`] (normally
//! [`ApiClient`]) and a [`KeyValueStore`], call `initialize()`, then `mount()`
//! it from every consumer that needs live session and connection state.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod health;
pub mod models;
pub mod orchestrator;
pub mod schedule;
pub mod storage;

pub use api::{ApiClient, ApiError, Gateway};
pub use config::{AppConfig, ConfigPatch, Timings};
pub use models::{ConnectionMetrics, ConnectionStatus, Credential, Role, Session, SessionStatus, UserRecord};
pub use orchestrator::{AppSnapshot, Mount, Orchestrator};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
