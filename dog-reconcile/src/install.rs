use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::error::ItemError;
use crate::gateway::{PersistenceGateway, UpsertOutcome, Upserted};
use crate::observability::Stage;
use crate::sync::{StageReport, count_removed};
use crate::types::{
    ComponentIdentity, ComponentPatch, ComponentRecord, ComponentSpec, EntityId, TenantRecord,
};
use crate::ReconcileResult;

/// Upserts installable components by `(namespace, name, version)`.
pub struct ComponentInstaller {
    gateway: Arc<dyn PersistenceGateway>,
}

impl ComponentInstaller {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Install `components` and return the persisted ids in input order.
    #[instrument(skip(self, components), fields(components = components.len()))]
    pub async fn install(&self, components: &[ComponentSpec]) -> (Vec<EntityId>, StageReport) {
        let mut report = StageReport::default();
        let mut installed = Vec::with_capacity(components.len());
        let mut seen: HashSet<ComponentIdentity> = HashSet::with_capacity(components.len());

        for (idx, spec) in components.iter().enumerate() {
            let identity = match ComponentIdentity::from_spec(spec) {
                Ok(identity) => identity,
                Err(e) => {
                    report.push_error(ItemError::from_error(
                        Stage::Components,
                        format!("components[{idx}]"),
                        &e,
                    ));
                    continue;
                }
            };

            if !seen.insert(identity.clone()) {
                report.push_error(ItemError::invalid(
                    Stage::Components,
                    identity.to_string(),
                    "duplicate component identity",
                ));
                continue;
            }

            match self.install_one(&identity, spec).await {
                Ok(upserted) => {
                    report.result.record(upserted.outcome);
                    installed.push(upserted.record.id);
                }
                Err(e) => {
                    let error = ItemError::from_error(Stage::Components, identity.to_string(), &e);
                    warn!("{}", error);
                    report.push_error(error);
                }
            }
        }

        (installed, report)
    }

    /// Install into a tenant, replacing its component list.
    pub async fn install_into(
        &self,
        tenant: &mut TenantRecord,
        components: &[ComponentSpec],
        now: DateTime<Utc>,
    ) -> StageReport {
        let (installed, mut report) = self.install(components).await;

        report.result.removed = count_removed(&tenant.components, &installed);
        if tenant.components != installed {
            tenant.updated_at = now;
        }
        tenant.components = installed;
        tenant.mark_dirty("components");
        report
    }

    async fn install_one(
        &self,
        identity: &ComponentIdentity,
        spec: &ComponentSpec,
    ) -> ReconcileResult<Upserted<ComponentRecord>> {
        let author = match spec.author.as_deref() {
            Some(email) => self.resolve_author(identity, email).await,
            None => None,
        };
        let patch = ComponentPatch::from_spec(spec, author);
        let now = Utc::now();

        match self.gateway.find_component(identity).await? {
            Some(mut existing) => {
                if !existing.apply_patch(patch, now) {
                    return Ok(Upserted::new(existing, UpsertOutcome::Unchanged));
                }
                self.gateway.save_component(&existing).await?;
                debug!(component = %identity, "Component updated");
                Ok(Upserted::new(existing, UpsertOutcome::Updated))
            }
            None => {
                let record = ComponentRecord::create(identity, spec, patch, now);
                self.gateway.save_component(&record).await?;
                debug!(component = %identity, "Component installed");
                Ok(Upserted::new(record, UpsertOutcome::Created))
            }
        }
    }

    /// Author emails resolve to a user id. Any failure installs the
    /// component without an author.
    async fn resolve_author(&self, identity: &ComponentIdentity, email: &str) -> Option<EntityId> {
        let email = email.trim().to_lowercase();
        match self.gateway.find_user_by_email(&email).await {
            Ok(Some(user)) => Some(user.id),
            Ok(None) => {
                debug!(component = %identity, author = %email, "Author not found");
                None
            }
            Err(e) => {
                warn!(component = %identity, author = %email, error = %e, "Author lookup failed");
                None
            }
        }
    }
}
