use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::manager::{CacheManager, CachedData};
use crate::api::{ApiEnvelope, ApiError, Gateway};
use crate::models::SystemMenuData;

const STATS_PATHS: [&str; 7] = [
    "/api/admin/api-stats",
    "/api/admin/security-stats",
    "/api/admin/database-stats",
    "/api/admin/system-stats",
    "/api/admin/stock-movement-stats",
    "/api/admin/user-stats",
    "/api/admin/report-stats",
];

/// Dashboard data plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub data: SystemMenuData,
    /// True when at least one section was fetched live on this call.
    pub live: bool,
    pub cached_at: Option<DateTime<Utc>>,
}

impl DashboardSnapshot {
    /// Age of the cached data for display, e.g. "12m ago".
    pub fn age_display(&self) -> Option<String> {
        self.cache_stamp().map(|c| c.age_display())
    }

    /// True when the data came from a cache entry older than the staleness window.
    pub fn is_stale(&self) -> bool {
        self.cache_stamp().is_some_and(|c| c.is_stale())
    }

    fn cache_stamp(&self) -> Option<CachedData<()>> {
        self.cached_at.map(|cached_at| CachedData { data: (), cached_at })
    }

    fn from_cache(cached: Option<CachedData<SystemMenuData>>) -> Self {
        match cached {
            Some(cached) => Self {
                data: cached.data,
                live: false,
                cached_at: Some(cached.cached_at),
            },
            None => Self {
                data: SystemMenuData::default(),
                live: false,
                cached_at: None,
            },
        }
    }
}

pub struct DashboardService {
    gateway: Arc<dyn Gateway>,
    cache: CacheManager,
}

impl DashboardService {
    pub fn new(gateway: Arc<dyn Gateway>, cache: CacheManager) -> Self {
        Self { gateway, cache }
    }

    /// Fetch every stats section concurrently.
    ///
    /// When `reachable` is false the cache is returned as is. Otherwise each
    /// section that fails keeps its cached value; the merged result is
    /// written back if anything was fetched.
    pub async fn fetch(&self, reachable: bool) -> DashboardSnapshot {
        let cached = self.cache.load_dashboard();
        if !reachable {
            debug!("Backend unavailable, serving cached dashboard");
            return DashboardSnapshot::from_cache(cached);
        }

        let results = join_all(STATS_PATHS.iter().map(|path| self.gateway.get_json(path))).await;

        let previous = cached.map(|c| c.data).unwrap_or_default();
        let mut fetched = 0;
        let mut take = |index: usize| -> Option<Value> {
            match &results[index] {
                Ok(envelope) => section_value(envelope, STATS_PATHS[index]).inspect(|_| fetched += 1),
                Err(e) => {
                    debug!(path = STATS_PATHS[index], error = %e, "Stats section unavailable");
                    None
                }
            }
        };

        let data = SystemMenuData {
            api_management: merge(take(0), previous.api_management),
            security: merge(take(1), previous.security),
            database: merge(take(2), previous.database),
            settings: merge(take(3), previous.settings),
            stock_movements: merge(take(4), previous.stock_movements),
            users: merge(take(5), previous.users),
            reports: merge(take(6), previous.reports),
        };

        if fetched == 0 {
            warn!("No dashboard sections could be fetched, serving cache");
            return DashboardSnapshot::from_cache(self.cache.load_dashboard());
        }

        if let Err(e) = self.cache.save_dashboard(&data) {
            warn!(error = %e, "Failed to cache dashboard data");
        }
        DashboardSnapshot {
            data,
            live: true,
            cached_at: Some(Utc::now()),
        }
    }
}

fn section_value(envelope: &ApiEnvelope<Value>, path: &str) -> Option<Value> {
    match envelope.clone().into_data() {
        Ok(value) => Some(value),
        Err(ApiError::Rejected(reason)) => {
            debug!(path = path, reason = %reason, "Stats section rejected");
            None
        }
        Err(e) => {
            debug!(path = path, error = %e, "Stats section malformed");
            None
        }
    }
}

fn merge<T: DeserializeOwned>(value: Option<Value>, fallback: T) -> T {
    match value {
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(error = %e, "Malformed stats section, keeping cached value");
            fallback
        }),
        None => fallback,
    }
}
