use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::coordinator::MutationCoordinator;
use crate::gateway::PipelineGateway;

/// Periodic authoritative refresh of a coordinator's board.
///
/// Failed polls are not retried early; the next tick is the retry.
pub struct Poller<G> {
    coordinator: Arc<MutationCoordinator<G>>,
    period: Duration,
}

impl<G> Poller<G>
where
    G: PipelineGateway + 'static,
{
    pub fn new(coordinator: Arc<MutationCoordinator<G>>, period: Duration) -> Self {
        Self { coordinator, period: period.max(Duration::from_millis(1)) }
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            event_name = "client.poller.started",
            period_ms = self.period.as_millis() as u64,
            "board poller started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are logged and broadcast by the coordinator.
                    if self.coordinator.refresh().await.is_err() {
                        debug!(event_name = "client.poller.tick_failed", "poll failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(event_name = "client.poller.stopped", "board poller stopped");
    }
}
