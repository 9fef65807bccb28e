//! Periodic reachability monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::manager::{lock, AutoSync, ConnectionModeManager};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

impl ConnectionModeManager {
    /// Probe every `interval` and react to reachability transitions.
    ///
    /// Returns `false` when monitoring is already running.
    pub fn start_monitoring(&self, interval: Duration) -> bool {
        let mut monitor = lock(&self.inner.monitor);
        if monitor.as_ref().is_some_and(|task| !task.is_finished()) {
            tracing::debug!("Connection monitoring already running");
            return false;
        }

        let interval = interval.max(MIN_INTERVAL);
        tracing::info!("Starting connection monitoring every {:?}", interval);

        let weak = Arc::downgrade(&self.inner);
        *monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                // The automatic sync keeps running on its own task
                drop(ConnectionModeManager { inner }.check_now().await);
            }
        }));
        true
    }

    /// Returns `false` when monitoring was not running
    pub fn stop_monitoring(&self) -> bool {
        match lock(&self.inner.monitor).take() {
            Some(task) => {
                task.abort();
                tracing::info!("Stopped connection monitoring");
                true
            }
            None => false,
        }
    }

    pub fn is_monitoring(&self) -> bool {
        lock(&self.inner.monitor)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// One monitoring tick: probe and hand any transition to
    /// [`handle_status_change`](Self::handle_status_change).
    ///
    /// No probe before the first tick counts as unreachable.
    pub async fn check_now(&self) -> Option<AutoSync> {
        let reachable = if self.engine().network().is_network_available().await {
            self.probe().probe().await.is_reachable()
        } else {
            false
        };

        let was_reachable = lock(&self.inner.last_reachable)
            .replace(reachable)
            .unwrap_or(false);
        if was_reachable != reachable {
            tracing::debug!(
                "Reachability changed: {} -> {}",
                was_reachable,
                reachable
            );
        }
        self.handle_status_change(was_reachable, reachable).await
    }
}
