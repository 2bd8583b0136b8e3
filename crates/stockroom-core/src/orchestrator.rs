//! Single entry point composing the session manager and health monitor.
//!
//! The orchestrator is constructed once and shared (`Arc`) with every
//! consumer. It is the only owner of the refresh and health timers:
//!
//! - health polling runs while at least one consumer is mounted and the
//!   API is enabled, regardless of authentication;
//! - token refresh runs while, in addition, the session holds a credential.
//!
//! Mounting the feature several times never creates a second timer. All
//! methods that may start timers must be called from within a Tokio runtime.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::Gateway;
use crate::auth::{CredentialStore, SessionManager};
use crate::cache::{CacheManager, DashboardService, DashboardSnapshot};
use crate::config::{AppConfig, ConfigPatch, Timings, CONFIG_KEY};
use crate::health::{HealthMonitor, HealthSnapshot};
use crate::models::{ConnectionMetrics, ConnectionStatus, Session, SessionStatus};
use crate::schedule::ScheduledTask;
use crate::storage::KeyValueStore;

/// Consolidated read model for consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSnapshot {
    pub session: Session,
    pub connection_status: ConnectionStatus,
    pub connection_metrics: ConnectionMetrics,
    pub config: AppConfig,
}

impl AppSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn is_online(&self) -> bool {
        self.connection_status.online
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_enabled
    }
}

#[derive(Default)]
struct Timers {
    mounts: usize,
    health: Option<ScheduledTask>,
    refresh: Option<ScheduledTask>,
}

pub struct Orchestrator {
    gateway: Arc<dyn Gateway>,
    kv: Arc<dyn KeyValueStore>,
    session: Arc<SessionManager>,
    health: Arc<HealthMonitor>,
    dashboard: DashboardService,
    timings: Timings,
    config: Mutex<AppConfig>,
    timers: Mutex<Timers>,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        kv: Arc<dyn KeyValueStore>,
        config: AppConfig,
        timings: Timings,
    ) -> Arc<Self> {
        let timings = timings.validated();
        gateway.set_base_url(&config.base_url);

        let session = Arc::new(SessionManager::new(
            Arc::clone(&gateway),
            CredentialStore::new(Arc::clone(&kv)),
        ));
        let health = Arc::new(HealthMonitor::new(
            Arc::clone(&gateway),
            timings.healthy_latency_ms,
        ));
        let dashboard = DashboardService::new(
            Arc::clone(&gateway),
            CacheManager::new(Arc::clone(&kv)),
        );

        Arc::new(Self {
            gateway,
            kv,
            session,
            health,
            dashboard,
            timings,
            config: Mutex::new(config),
            timers: Mutex::new(Timers::default()),
        })
    }

    fn config_lock(&self) -> MutexGuard<'_, AppConfig> {
        self.config.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn timers_lock(&self) -> MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Restore and verify the persisted session.
    pub async fn initialize(&self) -> bool {
        let authenticated = self.session.initialize().await;
        self.sync_timers();
        authenticated
    }

    /// Register a consumer. Timers start with the first mount and stop when
    /// the last `Mount` is dropped.
    pub fn mount(self: &Arc<Self>) -> Mount {
        {
            let mut timers = self.timers_lock();
            timers.mounts += 1;
            debug!(mounts = timers.mounts, "Consumer mounted");
        }
        self.sync_timers();
        Mount {
            orchestrator: Arc::clone(self),
        }
    }

    fn unmount(&self) {
        {
            let mut timers = self.timers_lock();
            timers.mounts = timers.mounts.saturating_sub(1);
            debug!(mounts = timers.mounts, "Consumer unmounted");
        }
        self.sync_timers();
    }

    /// Stop every timer now, regardless of outstanding mounts.
    pub fn shutdown(&self) {
        let mut timers = self.timers_lock();
        timers.mounts = 0;
        if let Some(task) = timers.health.take() {
            task.cancel();
        }
        if let Some(task) = timers.refresh.take() {
            task.cancel();
        }
        info!("Orchestrator shut down");
    }

    /// Bring timers in line with mounts, config and session state.
    ///
    /// State is read with the timers lock held, so the last caller always
    /// acts on the latest session and config.
    fn sync_timers(&self) {
        let mut timers = self.timers_lock();
        let api_enabled = self.config_lock().api_enabled;
        let authenticated = self.session.is_authenticated();
        let active = timers.mounts > 0 && api_enabled;

        if active {
            if !timers.health.as_ref().is_some_and(ScheduledTask::is_running) {
                timers.health = Some(self.spawn_health_task());
            }
        } else if let Some(task) = timers.health.take() {
            task.cancel();
        }

        if active && authenticated {
            if !timers.refresh.as_ref().is_some_and(ScheduledTask::is_running) {
                timers.refresh = Some(self.spawn_refresh_task());
            }
        } else if let Some(task) = timers.refresh.take() {
            task.cancel();
        }
    }

    fn spawn_health_task(&self) -> ScheduledTask {
        let health = Arc::clone(&self.health);
        ScheduledTask::spawn("health-check", self.timings.health_interval, true, move || {
            let health = Arc::clone(&health);
            async move {
                health.check().await;
                ControlFlow::Continue(())
            }
        })
    }

    fn spawn_refresh_task(&self) -> ScheduledTask {
        let session = Arc::clone(&self.session);
        ScheduledTask::spawn("token-refresh", self.timings.refresh_interval, false, move || {
            let session = Arc::clone(&session);
            async move {
                match session.status() {
                    SessionStatus::Authenticated => {}
                    SessionStatus::Refreshing => {
                        debug!("Refresh already in flight, skipping tick");
                        return ControlFlow::Continue(());
                    }
                    _ => return ControlFlow::Break(()),
                }
                if session.refresh_token().await {
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            }
        })
    }

    pub fn health_polling(&self) -> bool {
        self.timers_lock()
            .health
            .as_ref()
            .is_some_and(ScheduledTask::is_running)
    }

    pub fn refresh_scheduled(&self) -> bool {
        self.timers_lock()
            .refresh
            .as_ref()
            .is_some_and(ScheduledTask::is_running)
    }

    pub fn mount_count(&self) -> usize {
        self.timers_lock().mounts
    }

    // =========================================================================
    // Read model
    // =========================================================================

    pub fn snapshot(&self) -> AppSnapshot {
        let health = self.health.snapshot();
        AppSnapshot {
            session: self.session.session(),
            connection_status: health.status,
            connection_metrics: health.metrics,
            config: self.config(),
        }
    }

    pub fn session(&self) -> Session {
        self.session.session()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.health.status()
    }

    pub fn connection_metrics(&self) -> ConnectionMetrics {
        self.health.metrics()
    }

    pub fn config(&self) -> AppConfig {
        self.config_lock().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn is_online(&self) -> bool {
        self.health.is_online()
    }

    pub fn is_configured(&self) -> bool {
        self.config_lock().api_enabled
    }

    pub fn subscribe_session(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    pub fn subscribe_health(&self) -> watch::Receiver<HealthSnapshot> {
        self.health.subscribe()
    }

    // =========================================================================
    // Actions
    // =========================================================================

    pub async fn login(&self, email: &str, password: &str) -> bool {
        let ok = self.session.login(email, password).await;
        self.sync_timers();
        ok
    }

    pub fn logout(&self) {
        self.session.logout();
        self.sync_timers();
    }

    pub async fn refresh_token(&self) -> bool {
        let ok = self.session.refresh_token().await;
        self.sync_timers();
        ok
    }

    /// Check the backend now. Returns `false` without checking while the
    /// API is disabled, leaving the last-known status untouched.
    pub async fn test_connection(&self) -> bool {
        if !self.is_configured() {
            debug!("API disabled, skipping connection test");
            return false;
        }
        self.health.check().await.status.online
    }

    /// Merge a partial config update, persist it and re-evaluate timers.
    pub fn set_config(&self, patch: ConfigPatch) -> AppConfig {
        let updated = {
            let mut config = self.config_lock();
            let previous_url = config.base_url.clone();
            config.apply(patch);
            if config.base_url != previous_url {
                info!(base_url = %config.base_url, "Backend URL changed");
                self.gateway.set_base_url(&config.base_url);
            }
            if let Err(e) = config.save(self.kv.as_ref()) {
                warn!(error = %e, "Failed to save config");
            }
            config.clone()
        };
        self.sync_timers();
        updated
    }

    /// Reset to defaults with the API disabled and forget the persisted config.
    pub fn clear_config(&self) {
        {
            let mut config = self.config_lock();
            *config = AppConfig::disabled();
            self.gateway.set_base_url(&config.base_url);
            if let Err(e) = self.kv.remove(CONFIG_KEY) {
                warn!(error = %e, "Failed to remove saved config");
            }
        }
        self.sync_timers();
    }

    /// Aggregate dashboard stats, served from cache when the backend is
    /// disabled or unreachable.
    pub async fn dashboard(&self) -> DashboardSnapshot {
        let reachable = self.is_configured() && self.is_online();
        self.dashboard.fetch(reachable).await
    }
}

/// A mounted consumer of the orchestrator. Dropping it unmounts.
pub struct Mount {
    orchestrator: Arc<Orchestrator>,
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.orchestrator.unmount();
    }
}
