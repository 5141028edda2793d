use crate::controller::ReconciliationController;
use crate::metrics::TICKS_TOTAL;
use crate::models::{ReconciliationOutcome, ReconciliationTarget};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Drives the controller over every target, one tick per interval.
pub struct Scheduler {
    controller: ReconciliationController,
    targets: Vec<ReconciliationTarget>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        controller: ReconciliationController,
        targets: Vec<ReconciliationTarget>,
        interval: Duration,
    ) -> Self {
        Self {
            controller,
            targets,
            interval,
        }
    }

    /// Run ticks until `shutdown` turns true or its sender is dropped.
    ///
    /// The signal is checked before each tick and while waiting for the next
    /// one. A tick that has started runs to completion.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Scheduler starting ({} targets, interval {}s)",
            self.targets.len(),
            self.interval.as_secs()
        );

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            self.tick().await;

            if !self.wait_for_next_tick(&mut shutdown).await {
                break;
            }
        }

        info!("Scheduler stopped");
    }

    /// Sleep out the interval. Returns false if shutdown was requested meanwhile;
    /// other signal updates do not shorten the wait.
    async fn wait_for_next_tick(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let sleep = tokio::time::sleep(self.interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped");
                        return false;
                    }
                    if *shutdown.borrow_and_update() {
                        return false;
                    }
                },
            }
        }
    }

    /// Reconcile every target once, in order. One failing target does not
    /// affect the others.
    pub async fn tick(&self) -> Vec<(ReconciliationTarget, ReconciliationOutcome)> {
        TICKS_TOTAL.inc();
        debug!("Starting reconciliation tick");

        let mut outcomes = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            let outcome = self.controller.reconcile(target).await;
            report_outcome(target, &outcome);
            outcomes.push((target.clone(), outcome));
        }

        outcomes
    }
}

fn report_outcome(target: &ReconciliationTarget, outcome: &ReconciliationOutcome) {
    match outcome {
        ReconciliationOutcome::Unchanged => {
            info!("No new image for {}, workload is up to date", target)
        },
        ReconciliationOutcome::Updated {
            old_image,
            new_image,
        } => info!("Updated {} from {} to {}", target, old_image, new_image),
        ReconciliationOutcome::Failed { reason } => {
            warn!("Reconciliation of {} failed: {}", target, reason)
        },
    }
}
