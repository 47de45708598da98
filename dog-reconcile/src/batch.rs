use std::time::Instant;

use tracing::{error, info, instrument};

use crate::error::ReconcileError;
use crate::observability::{Metric, Stage};
use crate::reconciler::{ReconciledTenant, TenantReconciler};
use crate::types::TenantConfig;

/// A tenant whose reconciliation returned an error.
#[derive(Debug)]
pub struct FailedTenant {
    pub config: TenantConfig,
    pub error: ReconcileError,
}

/// Result of a startup batch. Both lists must be inspected: a batch never
/// fails as a whole.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<ReconciledTenant>,
    pub failed: Vec<FailedTenant>,
}

impl BatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.succeeded.iter().all(|t| t.errors.is_empty())
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn item_errors(&self) -> usize {
        self.succeeded.iter().map(|t| t.errors.len()).sum()
    }
}

impl TenantReconciler {
    /// Reconcile every configured tenant, one at a time, in input order.
    #[instrument(skip(self, configs), fields(tenants = configs.len()))]
    pub async fn on_startup(&self, configs: &[TenantConfig]) -> BatchOutcome {
        let started = Instant::now();
        let mut outcome = BatchOutcome::default();

        for config in configs {
            match self.upsert_from_config(config).await {
                Ok(done) => {
                    self.telemetry().increment(Metric::Succeeded, Stage::Batch, 1);
                    outcome.succeeded.push(done);
                }
                Err(e) => {
                    self.telemetry().increment(Metric::Failed, Stage::Batch, 1);
                    error!(tenant_key = %config.key, error = %e, "Tenant skipped");
                    outcome.failed.push(FailedTenant {
                        config: config.clone(),
                        error: e,
                    });
                }
            }
        }

        let elapsed = started.elapsed();
        self.telemetry().record_duration(Stage::Batch, elapsed);
        info!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            item_errors = outcome.item_errors(),
            duration_ms = elapsed.as_millis() as u64,
            "Tenant batch reconciled"
        );
        outcome
    }
}
