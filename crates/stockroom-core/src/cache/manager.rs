use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::models::SystemMenuData;
use crate::storage::{load_json, save_json, KeyValueStore};

/// Consider cached dashboard data stale after 5 minutes, the dashboard's
/// auto-refresh period.
const CACHE_STALE_MINUTES: i64 = 5;

pub const DASHBOARD_KEY: &str = "system-menu-data";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() >= CACHE_STALE_MINUTES
    }
}

pub struct CacheManager {
    kv: Arc<dyn KeyValueStore>,
}

impl CacheManager {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        load_json(self.kv.as_ref(), key)
    }

    fn save<T: Serialize>(&self, key: &str, data: &T) -> Result<()> {
        save_json(self.kv.as_ref(), key, &CachedData::new(data))
    }

    // ===== Dashboard =====

    pub fn load_dashboard(&self) -> Option<CachedData<SystemMenuData>> {
        self.load(DASHBOARD_KEY)
    }

    pub fn save_dashboard(&self, data: &SystemMenuData) -> Result<()> {
        self.save(DASHBOARD_KEY, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::Duration;

    #[test]
    fn test_age_display() {
        let mut cached = CachedData::new(());
        assert_eq!(cached.age_display(), "just now");

        cached.cached_at = Utc::now() - Duration::minutes(12);
        assert_eq!(cached.age_display(), "12m ago");

        cached.cached_at = Utc::now() - Duration::minutes(95);
        assert_eq!(cached.age_display(), "2h ago");

        cached.cached_at = Utc::now() - Duration::hours(30);
        assert_eq!(cached.age_display(), "1d ago");

        // Clock skew
        cached.cached_at = Utc::now() + Duration::minutes(3);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_is_stale() {
        let fresh = CachedData::new(1);
        assert!(!fresh.is_stale());

        let mut old = CachedData::new(1);
        old.cached_at = Utc::now() - Duration::minutes(6);
        assert!(old.is_stale());
    }

    #[test]
    fn test_dashboard_round_trip() {
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        assert!(cache.load_dashboard().is_none());

        let mut data = SystemMenuData::default();
        data.users.total_count = 15;
        cache.save_dashboard(&data).expect("save");

        let loaded = cache.load_dashboard().expect("cached dashboard");
        assert_eq!(loaded.data, data);
        assert!(!loaded.is_stale());
    }
}
