use serde::{Deserialize, Serialize};

use super::user::{Credential, UserRecord};

/// Authentication state of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionStatus {
    Unauthenticated,
    Initializing,
    Authenticating,
    Authenticated,
    /// A refresh call is in flight. The current credential stays valid
    /// until the call resolves, so this counts as signed in.
    Refreshing,
    Error,
}

impl SessionStatus {
    /// True for states that hold a live credential.
    pub fn has_credential(&self) -> bool {
        matches!(self, SessionStatus::Authenticated | SessionStatus::Refreshing)
    }
}

/// In-memory session record published by the session manager.
///
/// `user` and `token` are both present exactly when the status holds a
/// credential, which is `Authenticated` or `Refreshing`. `Refreshing` keeps
/// the pair because the old token stays valid until the refresh resolves.
/// Every constructor here preserves that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Session {
    pub status: SessionStatus,
    pub user: Option<UserRecord>,
    pub token: Option<Credential>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
}

impl Session {
    fn empty(status: SessionStatus) -> Self {
        Self {
            status,
            user: None,
            token: None,
            error_message: None,
        }
    }

    pub fn initializing() -> Self {
        Self::empty(SessionStatus::Initializing)
    }

    pub fn unauthenticated() -> Self {
        Self::empty(SessionStatus::Unauthenticated)
    }

    pub fn authenticating() -> Self {
        Self::empty(SessionStatus::Authenticating)
    }

    pub fn authenticated(user: UserRecord, token: Credential) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            user: Some(user),
            token: Some(token),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::empty(SessionStatus::Error)
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status.has_credential()
    }

    /// Check the status/credential invariant: `user` and `token` are set
    /// if and only if the status is `Authenticated` or `Refreshing`.
    pub fn is_consistent(&self) -> bool {
        self.status.has_credential() == (self.user.is_some() && self.token.is_some())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::initializing()
    }
}
