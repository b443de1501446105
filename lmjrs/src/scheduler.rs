//! Periodic trigger of the update cycle

use crate::monitor::LiveMonitor;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

/// Spawns the background task driving `monitor`
///
/// The first cycle runs after the configured startup delay, then one cycle
/// per interval. A tick landing while a manual refresh is running is simply
/// ignored by [`LiveMonitor::trigger`].
pub fn spawn_scheduler(monitor: Arc<LiveMonitor>) -> JoinHandle<()> {
    let settings = monitor.settings().clone();
    tokio::spawn(async move {
        info!(
            "⏱️ Scheduler started: first update in {}s, then every {}s",
            settings.startup_delay.as_secs(),
            settings.interval.as_secs()
        );
        time::sleep(settings.startup_delay).await;

        let mut ticker = time::interval(settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            monitor.trigger().await;
        }
    })
}
