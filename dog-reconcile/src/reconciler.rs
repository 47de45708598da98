use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument};

use crate::config::ReconcileConfig;
use crate::error::{ItemError, ReconcileResult};
use crate::gateway::PersistenceGateway;
use crate::install::ComponentInstaller;
use crate::observability::{Metric, NoopTelemetry, Stage, TelemetrySink};
use crate::provision::UserProvisioner;
use crate::sync::{MenuSynchronizer, RouteSynchronizer, StageReport, SyncResult};
use crate::types::{TenantConfig, TenantRecord};
use crate::validation::validate_tenant_config;

/// One async mutex per tenant key.
#[derive(Default)]
pub struct TenantLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other reconciliation holds `key`.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.locks
            .lock()
            .get(key)
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}

/// Outcome of reconciling one tenant.
#[derive(Debug, Clone)]
pub struct ReconciledTenant {
    pub tenant: TenantRecord,
    /// Whether this call created the tenant record.
    pub created: bool,
    pub routes: SyncResult,
    pub menus: SyncResult,
    pub components: SyncResult,
    pub users: SyncResult,
    /// Item-level failures from every stage, in stage order.
    pub errors: Vec<ItemError>,
    pub duration: Duration,
}

impl ReconciledTenant {
    /// Nothing was added, updated or removed by any stage.
    pub fn is_noop(&self) -> bool {
        !self.created
            && self.routes.is_noop()
            && self.menus.is_noop()
            && self.components.is_noop()
            && self.users.is_noop()
    }
}

/// Converges persisted tenants to their declarative configs.
pub struct TenantReconciler {
    gateway: Arc<dyn PersistenceGateway>,
    telemetry: Arc<dyn TelemetrySink>,
    config: ReconcileConfig,
    locks: TenantLocks,
    routes: RouteSynchronizer,
    menus: MenuSynchronizer,
    components: ComponentInstaller,
    users: UserProvisioner,
}

/// Builder taking the reconciler's collaborators.
pub struct TenantReconcilerBuilder {
    gateway: Arc<dyn PersistenceGateway>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    config: ReconcileConfig,
}

impl TenantReconcilerBuilder {
    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn config(mut self, config: ReconcileConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> TenantReconciler {
        let gateway = self.gateway;
        TenantReconciler {
            telemetry: self.telemetry.unwrap_or_else(|| Arc::new(NoopTelemetry)),
            locks: TenantLocks::new(),
            routes: RouteSynchronizer::new(),
            menus: MenuSynchronizer::new(gateway.clone()),
            components: ComponentInstaller::new(gateway.clone()),
            users: UserProvisioner::new(gateway.clone(), self.config.clone()),
            config: self.config,
            gateway,
        }
    }
}

impl TenantReconciler {
    pub fn builder(gateway: Arc<dyn PersistenceGateway>) -> TenantReconcilerBuilder {
        TenantReconcilerBuilder {
            gateway,
            telemetry: None,
            config: ReconcileConfig::default(),
        }
    }

    /// Reconciler with default config and no telemetry
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self::builder(gateway).build()
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn locks(&self) -> &TenantLocks {
        &self.locks
    }

    pub(crate) fn telemetry(&self) -> &dyn TelemetrySink {
        self.telemetry.as_ref()
    }

    /// Converge the tenant `config.key` to `config`.
    ///
    /// Validation runs before anything is written. After that each stage
    /// commits on its own: a later failure leaves earlier stages applied.
    /// Item failures are collected into the result; only validation and
    /// tenant-level persistence failures are returned as errors.
    #[instrument(skip(self, config), fields(tenant_key = %config.key))]
    pub async fn upsert_from_config(
        &self,
        config: &TenantConfig,
    ) -> ReconcileResult<ReconciledTenant> {
        let _guard = self.locks.acquire(&config.key).await;
        let started = Instant::now();

        let result = self.reconcile(config, started).await;
        self.telemetry.record_duration(Stage::Tenant, started.elapsed());

        match &result {
            Ok(done) => info!(
                created = done.created,
                duration_ms = done.duration.as_millis() as u64,
                routes_added = done.routes.added,
                routes_updated = done.routes.updated,
                routes_removed = done.routes.removed,
                menus_added = done.menus.added,
                menus_updated = done.menus.updated,
                menus_removed = done.menus.removed,
                components_added = done.components.added,
                components_updated = done.components.updated,
                components_removed = done.components.removed,
                users_added = done.users.added,
                users_updated = done.users.updated,
                errors = done.errors.len(),
                "Tenant reconciled"
            ),
            Err(e) => {
                self.telemetry.increment(Metric::Errors, Stage::Tenant, 1);
                error!(error = %e, "Tenant reconciliation failed");
            }
        }
        result
    }

    async fn reconcile(
        &self,
        config: &TenantConfig,
        started: Instant,
    ) -> ReconcileResult<ReconciledTenant> {
        validate_tenant_config(config)?;

        let now = Utc::now();
        let (mut tenant, created) = match self.gateway.find_tenant_by_key(&config.key).await? {
            Some(existing) => (existing, false),
            None => (TenantRecord::new(&config.key, now), true),
        };
        debug!(tenant_id = %tenant.id, created, "Tenant looked up");

        tenant.apply_profile(&config.profile, now);
        // Menus and memberships reference the tenant id, so it is stored first.
        self.gateway.save_tenant(&mut tenant).await?;

        let stage = Instant::now();
        let routes = self.routes.synchronize(&mut tenant, &config.routes, now);
        self.finish_stage(Stage::Routes, &routes, stage);

        let stage = Instant::now();
        let menus = self.menus.synchronize(&mut tenant, &config.menus, now).await;
        self.finish_stage(Stage::Menus, &menus, stage);

        let components = if self.config.install_components {
            let stage = Instant::now();
            let report = self
                .components
                .install_into(&mut tenant, &config.components, now)
                .await;
            self.finish_stage(Stage::Components, &report, stage);
            report
        } else {
            StageReport::default()
        };

        self.gateway.save_tenant(&mut tenant).await?;

        let users = if self.config.provision_users {
            let stage = Instant::now();
            let (_, report) = self.users.provision_all(&tenant, &config.users).await;
            self.finish_stage(Stage::Users, &report, stage);
            report
        } else {
            StageReport::default()
        };

        let errors = [routes.errors, menus.errors, components.errors, users.errors].concat();

        Ok(ReconciledTenant {
            tenant,
            created,
            routes: routes.result,
            menus: menus.result,
            components: components.result,
            users: users.result,
            errors,
            duration: started.elapsed(),
        })
    }

    fn finish_stage(&self, stage: Stage, report: &StageReport, started: Instant) {
        self.telemetry.record_sync(stage, &report.result);
        self.telemetry.record_duration(stage, started.elapsed());
    }
}
