use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{PersistenceGateway, UpsertOutcome, Upserted};
use crate::{
    ReconcileError, ReconcileResult,
    types::{
        BusinessUnitRecord, ComponentIdentity, ComponentRecord, EntityId, MenuRecord, MenuSpec,
        OrganizationRecord, TeamRecord, TenantRecord, UserRecord,
    },
};

type MenuKey = (EntityId, String);

const INJECTED: &str = "injected failure";

/// Operations forced to fail, keyed by the identity they touch.
#[derive(Debug, Default)]
struct Faults {
    menus: HashSet<String>,
    components: HashSet<ComponentIdentity>,
    users: HashSet<String>,
    organizations: HashSet<String>,
    tenant_saves: HashSet<String>,
}

/// In-memory gateway for testing and development
#[derive(Clone, Default)]
pub struct MemoryGateway {
    /// Tenants indexed by key
    tenants: Arc<RwLock<HashMap<String, TenantRecord>>>,
    /// Dirty fields flushed by each save, per tenant key
    flushed: Arc<RwLock<HashMap<String, Vec<BTreeSet<&'static str>>>>>,
    menus: Arc<RwLock<HashMap<MenuKey, MenuRecord>>>,
    components: Arc<RwLock<HashMap<ComponentIdentity, ComponentRecord>>>,
    organizations: Arc<RwLock<HashMap<EntityId, OrganizationRecord>>>,
    business_units: Arc<RwLock<HashMap<EntityId, BusinessUnitRecord>>>,
    teams: Arc<RwLock<HashMap<EntityId, TeamRecord>>>,
    /// Users indexed by email
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
    faults: Arc<RwLock<Faults>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: make upserts of this menu key fail (any tenant)
    pub fn fail_menu(&self, key: impl Into<String>) {
        self.faults.write().menus.insert(key.into());
    }

    /// Test helper: make lookups and saves of this component fail
    pub fn fail_component(&self, identity: ComponentIdentity) {
        self.faults.write().components.insert(identity);
    }

    /// Test helper: make lookups and saves of this user fail
    pub fn fail_user(&self, email: impl Into<String>) {
        self.faults.write().users.insert(email.into());
    }

    /// Test helper: make saves of this organization name fail
    pub fn fail_organization(&self, name: impl Into<String>) {
        self.faults.write().organizations.insert(name.into());
    }

    /// Test helper: make saves of this tenant key fail
    pub fn fail_tenant_save(&self, key: impl Into<String>) {
        self.faults.write().tenant_saves.insert(key.into());
    }

    pub fn clear_faults(&self) {
        *self.faults.write() = Faults::default();
    }

    /// Insert a tenant as-is, bypassing conflict checks. For seeding
    /// pre-existing state in tests.
    pub fn seed_tenant(&self, tenant: TenantRecord) {
        self.tenants.write().insert(tenant.key.clone(), tenant);
    }

    pub fn seed_user(&self, user: UserRecord) {
        self.users.write().insert(user.email.clone(), user);
    }

    pub fn tenant(&self, key: &str) -> Option<TenantRecord> {
        self.tenants.read().get(key).cloned()
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.read().len()
    }

    /// Dirty fields written by every save of `key`, oldest first.
    pub fn flush_history(&self, key: &str) -> Vec<BTreeSet<&'static str>> {
        self.flushed.read().get(key).cloned().unwrap_or_default()
    }

    pub fn menus_for(&self, tenant_id: &EntityId) -> Vec<MenuRecord> {
        let mut menus: Vec<MenuRecord> = self
            .menus
            .read()
            .values()
            .filter(|m| &m.tenant_id == tenant_id)
            .cloned()
            .collect();
        menus.sort_by(|a, b| a.key.cmp(&b.key));
        menus
    }

    pub fn component(&self, identity: &ComponentIdentity) -> Option<ComponentRecord> {
        self.components.read().get(identity).cloned()
    }

    pub fn component_count(&self) -> usize {
        self.components.read().len()
    }

    pub fn user(&self, email: &str) -> Option<UserRecord> {
        self.users.read().get(email).cloned()
    }

    pub fn organizations(&self) -> Vec<OrganizationRecord> {
        let mut orgs: Vec<OrganizationRecord> =
            self.organizations.read().values().cloned().collect();
        orgs.sort_by(|a, b| a.name.cmp(&b.name));
        orgs
    }

    pub fn business_units(&self) -> Vec<BusinessUnitRecord> {
        let mut units: Vec<BusinessUnitRecord> =
            self.business_units.read().values().cloned().collect();
        units.sort_by(|a, b| a.name.cmp(&b.name));
        units
    }

    pub fn teams(&self) -> Vec<TeamRecord> {
        let mut teams: Vec<TeamRecord> = self.teams.read().values().cloned().collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        teams
    }

    fn injected(operation: &'static str) -> ReconcileError {
        ReconcileError::persistence(operation, INJECTED)
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn find_tenant_by_key(&self, key: &str) -> ReconcileResult<Option<TenantRecord>> {
        Ok(self.tenants.read().get(key).cloned())
    }

    async fn save_tenant(&self, tenant: &mut TenantRecord) -> ReconcileResult<()> {
        if self.faults.read().tenant_saves.contains(&tenant.key) {
            return Err(Self::injected("save_tenant"));
        }

        let mut tenants = self.tenants.write();
        if let Some(existing) = tenants.get(&tenant.key) {
            if existing.id != tenant.id {
                return Err(ReconcileError::conflict(format!(
                    "tenant key '{}' already belongs to {}",
                    tenant.key, existing.id
                )));
            }
        }

        let flushed = tenant.take_dirty();
        tenants.insert(tenant.key.clone(), tenant.clone());
        self.flushed
            .write()
            .entry(tenant.key.clone())
            .or_default()
            .push(flushed);
        Ok(())
    }

    async fn upsert_menu(
        &self,
        tenant_id: &EntityId,
        key: &str,
        spec: &MenuSpec,
    ) -> ReconcileResult<Upserted<MenuRecord>> {
        if self.faults.read().menus.contains(key) {
            return Err(Self::injected("upsert_menu"));
        }

        let now = Utc::now();
        let mut menus = self.menus.write();
        let slot = (tenant_id.clone(), key.to_string());

        match menus.get_mut(&slot) {
            Some(existing) => {
                let outcome = if existing.overwrite(spec, now) {
                    UpsertOutcome::Updated
                } else {
                    UpsertOutcome::Unchanged
                };
                Ok(Upserted::new(existing.clone(), outcome))
            }
            None => {
                let record = MenuRecord::create(tenant_id, key, spec, now);
                menus.insert(slot, record.clone());
                Ok(Upserted::new(record, UpsertOutcome::Created))
            }
        }
    }

    async fn find_component(
        &self,
        identity: &ComponentIdentity,
    ) -> ReconcileResult<Option<ComponentRecord>> {
        if self.faults.read().components.contains(identity) {
            return Err(Self::injected("find_component"));
        }
        Ok(self.components.read().get(identity).cloned())
    }

    async fn save_component(&self, component: &ComponentRecord) -> ReconcileResult<()> {
        let identity = component.identity();
        if self.faults.read().components.contains(&identity) {
            return Err(Self::injected("save_component"));
        }

        let mut components = self.components.write();
        if let Some(existing) = components.get(&identity) {
            if existing.id != component.id {
                return Err(ReconcileError::conflict(format!(
                    "component {identity} already exists as {}",
                    existing.id
                )));
            }
        }
        components.insert(identity, component.clone());
        Ok(())
    }

    async fn get_organization(&self, id: &EntityId) -> ReconcileResult<Option<OrganizationRecord>> {
        Ok(self.organizations.read().get(id).cloned())
    }

    async fn find_organization_by_name(
        &self,
        name: &str,
    ) -> ReconcileResult<Option<OrganizationRecord>> {
        Ok(self
            .organizations
            .read()
            .values()
            .find(|o| o.name == name)
            .cloned())
    }

    async fn save_organization(&self, organization: &OrganizationRecord) -> ReconcileResult<()> {
        if self.faults.read().organizations.contains(&organization.name) {
            return Err(Self::injected("save_organization"));
        }
        self.organizations
            .write()
            .insert(organization.id.clone(), organization.clone());
        Ok(())
    }

    async fn get_business_unit(
        &self,
        id: &EntityId,
    ) -> ReconcileResult<Option<BusinessUnitRecord>> {
        Ok(self.business_units.read().get(id).cloned())
    }

    async fn find_business_unit_by_name(
        &self,
        organization_id: &EntityId,
        name: &str,
    ) -> ReconcileResult<Option<BusinessUnitRecord>> {
        Ok(self
            .business_units
            .read()
            .values()
            .find(|u| &u.organization_id == organization_id && u.name == name)
            .cloned())
    }

    async fn save_business_unit(&self, unit: &BusinessUnitRecord) -> ReconcileResult<()> {
        self.business_units
            .write()
            .insert(unit.id.clone(), unit.clone());
        Ok(())
    }

    async fn get_team(&self, id: &EntityId) -> ReconcileResult<Option<TeamRecord>> {
        Ok(self.teams.read().get(id).cloned())
    }

    async fn find_team_by_name(
        &self,
        organization_id: &EntityId,
        name: &str,
    ) -> ReconcileResult<Option<TeamRecord>> {
        Ok(self
            .teams
            .read()
            .values()
            .find(|t| &t.organization_id == organization_id && t.name == name)
            .cloned())
    }

    async fn save_team(&self, team: &TeamRecord) -> ReconcileResult<()> {
        self.teams.write().insert(team.id.clone(), team.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> ReconcileResult<Option<UserRecord>> {
        if self.faults.read().users.contains(email) {
            return Err(Self::injected("find_user_by_email"));
        }
        Ok(self.users.read().get(email).cloned())
    }

    async fn save_user(&self, user: &UserRecord) -> ReconcileResult<()> {
        if self.faults.read().users.contains(&user.email) {
            return Err(Self::injected("save_user"));
        }

        let mut users = self.users.write();
        if let Some(existing) = users.get(&user.email) {
            if existing.id != user.id {
                return Err(ReconcileError::conflict(format!(
                    "email '{}' already belongs to {}",
                    user.email, existing.id
                )));
            }
        }
        users.insert(user.email.clone(), user.clone());
        Ok(())
    }
}
