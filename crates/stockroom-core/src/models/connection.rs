use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reachability of the backend as of the last check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ConnectionStatus {
    pub online: bool,
    #[serde(rename = "lastCheckAt")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub last_check_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Health signals accumulated across checks.
///
/// `healthy` is stricter than `ConnectionStatus::online`: a slow but
/// successful check is online yet unhealthy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ConnectionMetrics {
    #[serde(rename = "latencyMs")]
    pub latency_ms: Option<f64>,
    #[serde(rename = "lastSuccessAt")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(rename = "consecutiveFailures")]
    pub consecutive_failures: u32,
    pub healthy: bool,
}

impl ConnectionMetrics {
    /// Fold one check outcome into the metrics.
    ///
    /// `latency_ms` is `None` when the check never completed. The failure
    /// streak resets only on a healthy check.
    pub fn record(&mut self, online: bool, latency_ms: Option<f64>, threshold_ms: f64, at: DateTime<Utc>) {
        let healthy = online && latency_ms.map(|l| l < threshold_ms).unwrap_or(false);

        self.latency_ms = latency_ms;
        self.healthy = healthy;
        if healthy {
            self.consecutive_failures = 0;
            self.last_success_at = Some(at);
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
    }
}
