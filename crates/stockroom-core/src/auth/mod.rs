//! Authentication: the session state machine and its persistence.
//!
//! This module provides:
//! - `SessionManager`: login, logout, startup verification and token refresh
//! - `CredentialStore`: durable `{token, user}` pair over a key/value store
//! - `Keychain`: optional OS keychain storage for remembered passwords

pub mod credentials;
pub mod keychain;
pub mod session;

pub use credentials::{CredentialStore, StoredSession};
pub use keychain::Keychain;
pub use session::SessionManager;
