//! Aggregate admin statistics for the system menu.
//!
//! Each section maps to one `/api/admin/*-stats` endpoint and is fetched
//! and cached independently, so a single failing endpoint only leaves its
//! own section stale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiManagementStats {
    pub total_keys: u64,
    pub active_keys: u64,
    pub total_requests: u64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityStats {
    pub alerts: u64,
    pub threats: u64,
    pub last_scan: Option<DateTime<Utc>>,
    pub vulnerabilities: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseHealth {
    #[default]
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseStats {
    pub status: DatabaseHealth,
    pub connections: u64,
    pub response_time: f64,
    pub disk_usage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    #[default]
    Success,
    Pending,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsStats {
    pub pending_updates: u64,
    pub backup_status: BackupStatus,
    #[serde(alias = "uptime")]
    pub system_uptime: f64,
    pub maintenance_mode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StockMovementStats {
    pub today_count: u64,
    pub weekly_count: u64,
    pub monthly_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    pub active_count: u64,
    pub online_count: u64,
    pub total_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportStats {
    pub pending_count: u64,
    pub completed_today: u64,
    pub failed_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemMenuData {
    pub api_management: ApiManagementStats,
    pub security: SecurityStats,
    pub database: DatabaseStats,
    pub settings: SettingsStats,
    pub stock_movements: StockMovementStats,
    pub users: UserStats,
    pub reports: ReportStats,
}
