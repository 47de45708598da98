use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::config::ReconcileConfig;
use crate::error::ItemError;
use crate::gateway::{PersistenceGateway, UpsertOutcome, Upserted};
use crate::observability::Stage;
use crate::resolve::ReferenceResolver;
use crate::sync::StageReport;
use crate::types::{EntityId, SeedUserSpec, TenantRecord, UserRecord};
use crate::{ReconcileError, ReconcileResult};

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Creates seed users and grants them a membership in the tenant.
pub struct UserProvisioner {
    gateway: Arc<dyn PersistenceGateway>,
    resolver: ReferenceResolver,
    config: ReconcileConfig,
}

impl UserProvisioner {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, config: ReconcileConfig) -> Self {
        Self {
            resolver: ReferenceResolver::new(gateway.clone()),
            gateway,
            config,
        }
    }

    /// Provision every seed user; a failure only skips that user.
    #[instrument(skip(self, tenant, specs), fields(tenant_key = %tenant.key, users = specs.len()))]
    pub async fn provision_all(
        &self,
        tenant: &TenantRecord,
        specs: &[SeedUserSpec],
    ) -> (Vec<EntityId>, StageReport) {
        let mut report = StageReport::default();
        let mut provisioned = Vec::with_capacity(specs.len());

        for (idx, spec) in specs.iter().enumerate() {
            let item = required(&spec.email)
                .map(str::to_lowercase)
                .unwrap_or_else(|| format!("users[{idx}]"));

            match self.provision(tenant, spec).await {
                Ok(upserted) => {
                    report.result.record(upserted.outcome);
                    provisioned.push(upserted.record.id);
                }
                Err(e) => {
                    let error = ItemError::from_error(Stage::Users, item, &e);
                    warn!("{}", error);
                    report.push_error(error);
                }
            }
        }

        (provisioned, report)
    }

    /// Resolve the user's organization, business unit and teams, then find
    /// or create the user and grant the requested roles within `tenant`.
    ///
    /// Existing users keep their name and password; only memberships, team
    /// links and auth providers are merged in.
    pub async fn provision(
        &self,
        tenant: &TenantRecord,
        spec: &SeedUserSpec,
    ) -> ReconcileResult<Upserted<UserRecord>> {
        let (email, first_name, last_name) = match (
            required(&spec.email),
            required(&spec.first_name),
            required(&spec.last_name),
        ) {
            (Some(email), Some(first), Some(last)) => (email.to_lowercase(), first, last),
            (email, first, last) => {
                let fields = [("email", email), ("firstName", first), ("lastName", last)];
                let missing: Vec<&str> = fields
                    .into_iter()
                    .filter(|(_, v)| v.is_none())
                    .map(|(field, _)| field)
                    .collect();
                return Err(ReconcileError::invalid_item(format!(
                    "missing required fields: {}",
                    missing.join(", ")
                )));
            }
        };

        let mut organization = match &spec.organization {
            Some(reference) => Some(self.resolver.organization(reference).await?),
            None => None,
        };

        let business_unit = match (&spec.business_unit, &organization) {
            (Some(reference), Some(org)) => {
                Some(self.resolver.business_unit(reference, org).await?)
            }
            (Some(reference), None) => {
                return Err(ReconcileError::dependency(format!(
                    "business unit '{}' requires an organization",
                    reference.label()
                )));
            }
            (None, _) => None,
        };

        let mut team_ids: Vec<EntityId> = Vec::with_capacity(spec.teams.len());
        if !spec.teams.is_empty() {
            let Some(org) = organization.as_mut() else {
                return Err(ReconcileError::dependency("teams require an organization"));
            };

            let mut linked = false;
            for reference in &spec.teams {
                let team = self.resolver.team(reference, org).await?;
                linked |= org.link_team(&team.id);
                if !team_ids.contains(&team.id) {
                    team_ids.push(team.id);
                }
            }
            if linked {
                org.updated_at = Utc::now();
                self.gateway.save_organization(org).await?;
            }
        }

        let now = Utc::now();
        let (mut user, mut outcome) = match self.gateway.find_user_by_email(&email).await? {
            Some(existing) => (existing, UpsertOutcome::Unchanged),
            None => {
                let mut user = UserRecord::new(&email, first_name, last_name, now);
                if let Some(password) = spec.password.as_deref() {
                    let hash = bcrypt::hash(password, self.config.password_hash_cost)?;
                    user.password_hash = Some(hash);
                }
                (user, UpsertOutcome::Created)
            }
        };

        let roles: &[String] = if spec.roles.is_empty() {
            &self.config.default_roles
        } else {
            &spec.roles
        };

        let mut changed = user.grant(
            &tenant.id,
            organization.as_ref().map(|o| &o.id),
            business_unit.as_ref().map(|u| &u.id),
            roles.iter().cloned(),
        );
        for team_id in &team_ids {
            changed |= user.link_team(team_id);
        }
        for provider in &spec.auth_providers {
            changed |= user.add_auth_provider(provider);
        }

        if outcome == UpsertOutcome::Unchanged && changed {
            outcome = UpsertOutcome::Updated;
            user.updated_at = now;
        }
        if outcome != UpsertOutcome::Unchanged {
            self.gateway.save_user(&user).await?;
            debug!(email = %user.email, outcome = ?outcome, "Seed user provisioned");
        }

        Ok(Upserted::new(user, outcome))
    }
}
