//! Data models shared by the session, health and dashboard layers.
//!
//! - `UserRecord`, `Role`, `Credential`: identity issued by the auth endpoints
//! - `Session`, `SessionStatus`: the authentication state machine's read model
//! - `ConnectionStatus`, `ConnectionMetrics`: backend reachability and health
//! - `SystemMenuData`: aggregate admin statistics shown on the dashboard

pub mod connection;
pub mod dashboard;
pub mod session;
pub mod user;

pub use connection::{ConnectionMetrics, ConnectionStatus};
pub use dashboard::SystemMenuData;
pub use session::{Session, SessionStatus};
pub use user::{Credential, Role, UserRecord};
