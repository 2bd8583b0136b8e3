//! Read-through cache for data shown while the backend is unreachable.
//!
//! - `CacheManager`: timestamped JSON values in the key/value store
//! - `DashboardService`: aggregate admin stats with per-section fallback

pub mod dashboard;
pub mod manager;

pub use dashboard::{DashboardService, DashboardSnapshot};
pub use manager::{CacheManager, CachedData};
