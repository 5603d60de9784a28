//! Background task that keeps the corpus current

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::assistant::Assistant;

/// Run [`Assistant::update_content`] every `every`, starting one period from now.
///
/// Failed updates are logged and the next tick runs as scheduled. Abort the
/// returned handle to stop refreshing.
pub fn spawn_periodic_refresh(assistant: Arc<Assistant>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Periodic refresh started (interval: {:?})", every);

        loop {
            ticker.tick().await;
            debug!("Starting scheduled content update");

            match assistant.update_content().await {
                Ok(result) => info!(
                    new = result.new,
                    changed = result.changed,
                    unchanged = result.unchanged,
                    "Scheduled update finished"
                ),
                Err(e) => error!(error = %e, "Scheduled update failed"),
            }
        }
    })
}
