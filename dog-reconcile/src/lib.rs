//! # dog-reconcile: Tenant Configuration Reconciliation
//!
//! **Converge persisted tenants to declarative configs, safely and idempotently**
//!
//! A tenant config describes what a tenant should look like: its profile,
//! routes, menus, installable components and seed users. The reconciler
//! reads what is persisted, diffs it against the config, applies additions,
//! updates and removals, and reports what it did. One item's failure never
//! aborts its siblings, and one tenant's failure never aborts the batch.
//!
//! ## Features
//!
//! - **Idempotent**: reconciling an unchanged config reports zero adds, updates and removals
//! - **Full-list replace**: routes, menus and components absent from the config drop out
//! - **Partial-failure isolation**: item errors are collected per stage, tenant errors per batch
//! - **Per-key exclusion**: no two reconciliations of the same tenant run at once
//! - **Pluggable storage**: everything goes through [`PersistenceGateway`]
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use dog_reconcile::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ReconcileError> {
//! let gateway = Arc::new(MemoryGateway::new());
//! let reconciler = TenantReconciler::builder(gateway.clone()).build();
//!
//! let config = TenantConfig::new("acme", "Acme Inc")
//!     .with_routes(vec![RouteSpec::new("home", "/")]);
//!
//! let first = reconciler.upsert_from_config(&config).await?;
//! assert_eq!(first.routes.added, 1);
//!
//! let second = reconciler.upsert_from_config(&config).await?;
//! assert_eq!(second.routes.unchanged, 1);
//! assert!(second.is_noop());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod gateway;
pub mod install;
pub mod observability;
pub mod provision;
pub mod reconciler;
pub mod resolve;
pub mod sync;
pub mod types;
pub mod validation;

pub use batch::{BatchOutcome, FailedTenant};
pub use config::{ConfigSnapshot, ConfigStore, ReconcileConfig};
pub use error::{ErrorKind, ItemError, ReconcileError, ReconcileResult};
pub use gateway::{MemoryGateway, PersistenceGateway, UpsertOutcome, Upserted};
pub use install::ComponentInstaller;
pub use observability::{LiveMetrics, Metric, NoopTelemetry, Stage, TelemetrySink};
pub use provision::UserProvisioner;
pub use reconciler::{ReconciledTenant, TenantLocks, TenantReconciler, TenantReconcilerBuilder};
pub use sync::{MenuSynchronizer, RouteSynchronizer, StageReport, SyncResult};
pub use validation::{SchemaErrors, validate_tenant_config};

pub mod prelude {
    pub use crate::{
        BatchOutcome, MemoryGateway, PersistenceGateway, ReconcileConfig, ReconcileError,
        ReconcileResult, TenantReconciler,
    };

    pub use crate::types::{
        ComponentSpec, EntityRef, MenuEntry, MenuSpec, RouteSpec, SeedUserSpec, TenantConfig,
    };

    pub use crate::{LiveMetrics, NoopTelemetry, TelemetrySink};
}
