//! Backend connection health.
//!
//! The monitor polls `GET /health`, tracks reachability (`online`) and
//! health (`online` and fast enough) as separate signals, and counts
//! consecutive unhealthy checks. It never touches the session: an offline
//! backend does not sign the user out.

pub mod monitor;

pub use monitor::{HealthMonitor, HealthSnapshot};
