use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use crate::features::listings::services::ListingSyncService;

/// Runs the listing sync on a fixed interval inside the server process
pub struct ListingSyncWorker {
    service: Arc<ListingSyncService>,
    period: Duration,
}

impl ListingSyncWorker {
    pub fn new(service: Arc<ListingSyncService>, period: Duration) -> Self {
        Self { service, period }
    }

    /// Run the sync in a background loop
    pub async fn run(&self) {
        tracing::info!(
            "Starting listing sync worker (every {}s)",
            self.period.as_secs()
        );

        let mut interval = interval(self.period);
        // A sync can outlast the period; don't stack runs afterwards
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            match self.service.run().await {
                Ok(report) => tracing::info!(
                    "Listing sync done: {} listings, {} databases ({} failed)",
                    report.fetched,
                    report.databases.len(),
                    report.failed_databases()
                ),
                Err(e) => tracing::error!("Listing sync failed: {:?}", e),
            }
        }
    }
}
