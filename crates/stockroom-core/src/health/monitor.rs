use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::Gateway;
use crate::models::{ConnectionMetrics, ConnectionStatus};

/// Error recorded when the backend answers with an unrecognised payload.
const UNHEALTHY_PAYLOAD_ERROR: &str = "Health check failed";

/// Status and metrics as of the most recent check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthSnapshot {
    pub status: ConnectionStatus,
    pub metrics: ConnectionMetrics,
}

pub struct HealthMonitor {
    gateway: Arc<dyn Gateway>,
    healthy_latency_ms: f64,
    state: Mutex<HealthSnapshot>,
    updates: watch::Sender<HealthSnapshot>,
}

impl HealthMonitor {
    /// Checks slower than `healthy_latency_ms` count as online but unhealthy.
    pub fn new(gateway: Arc<dyn Gateway>, healthy_latency_ms: f64) -> Self {
        let (updates, _) = watch::channel(HealthSnapshot::default());
        Self {
            gateway,
            healthy_latency_ms,
            state: Mutex::new(HealthSnapshot::default()),
            updates,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HealthSnapshot> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        self.lock().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.lock().status.clone()
    }

    pub fn metrics(&self) -> ConnectionMetrics {
        self.lock().metrics.clone()
    }

    pub fn is_online(&self) -> bool {
        self.lock().status.online
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthSnapshot> {
        self.updates.subscribe()
    }

    /// Run one check and fold its outcome into status and metrics.
    pub async fn check(&self) -> HealthSnapshot {
        let started = Instant::now();
        let result = self.gateway.health().await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let now = Utc::now();

        let mut state = self.lock();
        let was_online = state.status.online;

        match result {
            Ok(response) => {
                let online = response.is_ok();
                state.status = ConnectionStatus {
                    online,
                    last_check_at: Some(now),
                    error: if online {
                        None
                    } else {
                        Some(UNHEALTHY_PAYLOAD_ERROR.to_string())
                    },
                };
                state
                    .metrics
                    .record(online, Some(latency_ms), self.healthy_latency_ms, now);
            }
            Err(e) => {
                state.status = ConnectionStatus {
                    online: false,
                    last_check_at: Some(now),
                    error: Some(e.to_string()),
                };
                state.metrics.record(false, None, self.healthy_latency_ms, now);
            }
        }

        let snapshot = state.clone();
        self.updates.send_replace(snapshot.clone());
        drop(state);

        if snapshot.status.online && !was_online {
            info!(latency_ms = latency_ms, "Backend reachable");
        } else if !snapshot.status.online && was_online {
            warn!(error = ?snapshot.status.error, "Backend unreachable");
        }
        debug!(
            online = snapshot.status.online,
            healthy = snapshot.metrics.healthy,
            latency_ms = ?snapshot.metrics.latency_ms,
            consecutive_failures = snapshot.metrics.consecutive_failures,
            "Health check complete"
        );

        snapshot
    }
}
