use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::{debug, warn};

use crate::models::{Credential, UserRecord};
use crate::storage::{load_json, save_json, KeyValueStore};

pub const USER_KEY: &str = "user";
pub const TOKEN_KEY: &str = "auth-token";

/// A `{token, user}` pair restored from durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: Credential,
    pub user: UserRecord,
}

/// Durable copy of the current credential and user record.
///
/// Reads and multi-key writes are serialised, so a reader never sees the
/// token of one login paired with the user of another.
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            lock: Mutex::new(()),
        }
    }

    /// Load the persisted pair. Missing halves or malformed data yield `None`.
    pub fn load(&self) -> Option<StoredSession> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let token = match self.kv.get(TOKEN_KEY) {
            Ok(Some(raw)) if !raw.trim().is_empty() => Credential::new(raw.trim()),
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                return None;
            }
        };
        let user: UserRecord = load_json(self.kv.as_ref(), USER_KEY)?;

        debug!(user_id = %user.id, "Restored stored session");
        Some(StoredSession { token, user })
    }

    pub fn save(&self, token: &Credential, user: &UserRecord) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        save_json(self.kv.as_ref(), USER_KEY, user)?;
        self.kv.set(TOKEN_KEY, token.as_str())
    }

    /// Replace the token only; the stored user is left as is.
    pub fn save_token(&self, token: &Credential) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.kv.set(TOKEN_KEY, token.as_str())
    }

    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        // Token first: a half-finished clear must not leave a usable token.
        self.kv.remove(TOKEN_KEY)?;
        self.kv.remove(USER_KEY)
    }
}
