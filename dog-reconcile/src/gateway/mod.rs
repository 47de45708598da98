pub mod memory;

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    ReconcileResult,
    types::{
        BusinessUnitRecord, ComponentIdentity, ComponentRecord, EntityId, MenuRecord, MenuSpec,
        OrganizationRecord, TeamRecord, TenantRecord, UserRecord,
    },
};

pub use memory::MemoryGateway;

/// What an upsert did to the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// A persisted record together with how it got there.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted<T> {
    pub record: T,
    pub outcome: UpsertOutcome,
}

impl<T> Upserted<T> {
    pub fn new(record: T, outcome: UpsertOutcome) -> Self {
        Self { record, outcome }
    }
}

/// Storage primitives the reconciler runs against.
///
/// Find-or-create for components, organizations, business units, teams and
/// users is composed from the `find_*` / `get_*` / `save_*` pairs by the
/// stages that need it; menus get a dedicated upsert because their identity
/// is scoped to a tenant. Every call is a suspension point and may fail with
/// [`ReconcileError::Persistence`](crate::ReconcileError::Persistence).
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn find_tenant_by_key(&self, key: &str) -> ReconcileResult<Option<TenantRecord>>;

    /// Insert or replace a tenant. Implementations must reject a second
    /// record under an existing key with `Conflict`, write at least the
    /// fields the record reports as dirty, and drain its dirty set on
    /// success.
    async fn save_tenant(&self, tenant: &mut TenantRecord) -> ReconcileResult<()>;

    /// Find the menu `(tenant_id, key)` and overwrite its content, or create
    /// it. `key` is the normalized form of `spec.key`.
    async fn upsert_menu(
        &self,
        tenant_id: &EntityId,
        key: &str,
        spec: &MenuSpec,
    ) -> ReconcileResult<Upserted<MenuRecord>>;

    async fn find_component(
        &self,
        identity: &ComponentIdentity,
    ) -> ReconcileResult<Option<ComponentRecord>>;

    async fn save_component(&self, component: &ComponentRecord) -> ReconcileResult<()>;

    async fn get_organization(&self, id: &EntityId) -> ReconcileResult<Option<OrganizationRecord>>;

    async fn find_organization_by_name(
        &self,
        name: &str,
    ) -> ReconcileResult<Option<OrganizationRecord>>;

    async fn save_organization(&self, organization: &OrganizationRecord) -> ReconcileResult<()>;

    async fn get_business_unit(&self, id: &EntityId) -> ReconcileResult<Option<BusinessUnitRecord>>;

    async fn find_business_unit_by_name(
        &self,
        organization_id: &EntityId,
        name: &str,
    ) -> ReconcileResult<Option<BusinessUnitRecord>>;

    async fn save_business_unit(&self, unit: &BusinessUnitRecord) -> ReconcileResult<()>;

    async fn get_team(&self, id: &EntityId) -> ReconcileResult<Option<TeamRecord>>;

    async fn find_team_by_name(
        &self,
        organization_id: &EntityId,
        name: &str,
    ) -> ReconcileResult<Option<TeamRecord>>;

    async fn save_team(&self, team: &TeamRecord) -> ReconcileResult<()>;

    async fn find_user_by_email(&self, email: &str) -> ReconcileResult<Option<UserRecord>>;

    async fn save_user(&self, user: &UserRecord) -> ReconcileResult<()>;
}
