//! Cancellable periodic tasks.
//!
//! A `ScheduledTask` is the explicit handle for one timer. Dropping the
//! handle aborts the task, so whoever owns the handle owns the timer.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

pub struct ScheduledTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawn `tick` every `period` on the current Tokio runtime.
    ///
    /// With `fire_immediately` the first tick runs right away; otherwise it
    /// runs one period from now. The task ends when `tick` returns
    /// `ControlFlow::Break`. Missed ticks are skipped, not replayed.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, fire_immediately: bool, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let start = if fire_immediately {
            Instant::now()
        } else {
            Instant::now() + period
        };

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tick().await.is_break() {
                    debug!(task = name, "Scheduled task finished");
                    break;
                }
            }
        });

        debug!(task = name, period_secs = period.as_secs_f64(), "Scheduled task started");
        Self { name, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the task. Equivalent to dropping the handle.
    pub fn cancel(self) {
        debug!(task = self.name, "Scheduled task cancelled");
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
