mod deployment;

pub use deployment::{
    KubeDeployments, WorkloadApi, first_container_image, set_first_container_image,
};

use crate::metrics::{RECONCILE_DURATION, RECONCILE_ERRORS, UPDATES_APPLIED, WORKLOADS_UNCHANGED};
use crate::models::{ReconciliationOutcome, ReconciliationTarget};
use crate::resolver::ImageResolver;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to read workload: {0}")]
    OrchestratorReadFailure(String),

    #[error("failed to replace workload: {0}")]
    OrchestratorWriteFailure(String),

    #[error("unsupported workload: {0}")]
    MissingContainer(String),
}

/// Runs one read, resolve, write pass for a single target.
pub struct ReconciliationController {
    workloads: Arc<dyn WorkloadApi>,
    resolver: ImageResolver,
}

impl ReconciliationController {
    pub fn new(workloads: Arc<dyn WorkloadApi>, resolver: ImageResolver) -> Self {
        Self {
            workloads,
            resolver,
        }
    }

    /// Reconcile `target` once. Failures end up in the outcome, never in a panic
    /// or an early return to the caller.
    #[instrument(skip_all, fields(target = %target))]
    pub async fn reconcile(&self, target: &ReconciliationTarget) -> ReconciliationOutcome {
        let _timer = RECONCILE_DURATION.start_timer();

        let outcome = self
            .try_reconcile(target)
            .await
            .unwrap_or_else(|e| ReconciliationOutcome::Failed {
                reason: e.to_string(),
            });

        match &outcome {
            ReconciliationOutcome::Unchanged => WORKLOADS_UNCHANGED.inc(),
            ReconciliationOutcome::Updated { .. } => UPDATES_APPLIED.inc(),
            ReconciliationOutcome::Failed { .. } => RECONCILE_ERRORS.inc(),
        }

        outcome
    }

    async fn try_reconcile(
        &self,
        target: &ReconciliationTarget,
    ) -> Result<ReconciliationOutcome, ReconcileError> {
        let mut workload = self
            .workloads
            .read_workload(&target.identifier, &target.namespace)
            .await
            .map_err(|e| ReconcileError::OrchestratorReadFailure(format!("{:#}", e)))?;

        let current_image = first_container_image(&workload)?.to_string();
        let resolved_image = self.resolver.resolve_latest_image(&current_image).await;

        if resolved_image == current_image {
            debug!("{} is up to date at {}", target, current_image);
            return Ok(ReconciliationOutcome::Unchanged);
        }

        debug!(
            "Updating {} from {} to {}",
            target, current_image, resolved_image
        );

        // The definition read above is written back as-is apart from the image.
        // A change made by someone else in between is overwritten.
        set_first_container_image(&mut workload, &resolved_image)?;

        self.workloads
            .replace_workload(&target.identifier, &target.namespace, &workload)
            .await
            .map_err(|e| ReconcileError::OrchestratorWriteFailure(format!("{:#}", e)))?;

        Ok(ReconciliationOutcome::Updated {
            old_image: current_image,
            new_image: resolved_image,
        })
    }
}
