//! Find-or-create for the organization records seed users point at.
//!
//! A reference is tried as a persisted id first, then as a name, and only
//! then created. Bare strings that parse as ids are id lookups and must
//! exist; inline objects may carry an id and fall back to their name.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::gateway::PersistenceGateway;
use crate::types::{BusinessUnitRecord, EntityId, EntityRef, OrganizationRecord, TeamRecord};
use crate::{ReconcileError, ReconcileResult};

/// Name and description a reference would create a record with.
fn creation_fields(reference: &EntityRef, what: &str) -> ReconcileResult<(String, Option<String>)> {
    let (name, description) = match reference {
        EntityRef::Name(name) => (name.as_str(), None),
        EntityRef::Inline(inline) => (inline.name.as_str(), inline.description.clone()),
        EntityRef::Id(id) => {
            return Err(ReconcileError::dependency(format!("{what} {id} not found")));
        }
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(ReconcileError::dependency(format!("{what} reference has no name")));
    }
    Ok((name.to_string(), description))
}

fn explicit_id(reference: &EntityRef) -> Option<&EntityId> {
    match reference {
        EntityRef::Id(id) => Some(id),
        EntityRef::Inline(inline) => inline.id.as_ref(),
        EntityRef::Name(_) => None,
    }
}

fn check_owner(
    what: &str,
    label: &str,
    owner: &EntityId,
    organization: &OrganizationRecord,
) -> ReconcileResult<()> {
    if owner == &organization.id {
        return Ok(());
    }
    Err(ReconcileError::dependency(format!(
        "{what} '{label}' belongs to another organization than '{}'",
        organization.name
    )))
}

pub struct ReferenceResolver {
    gateway: Arc<dyn PersistenceGateway>,
}

impl ReferenceResolver {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    pub async fn organization(&self, reference: &EntityRef) -> ReconcileResult<OrganizationRecord> {
        if let Some(id) = explicit_id(reference) {
            if let Some(found) = self.gateway.get_organization(id).await? {
                return Ok(found);
            }
        }

        let (name, description) = creation_fields(reference, "organization")?;
        if let Some(found) = self.gateway.find_organization_by_name(&name).await? {
            return Ok(found);
        }

        let created = OrganizationRecord::new(name, description, Utc::now());
        self.gateway.save_organization(&created).await?;
        debug!(organization = %created.name, id = %created.id, "Organization created");
        Ok(created)
    }

    pub async fn business_unit(
        &self,
        reference: &EntityRef,
        organization: &OrganizationRecord,
    ) -> ReconcileResult<BusinessUnitRecord> {
        if let Some(id) = explicit_id(reference) {
            if let Some(found) = self.gateway.get_business_unit(id).await? {
                check_owner("business unit", &found.name, &found.organization_id, organization)?;
                return Ok(found);
            }
        }

        let (name, description) = creation_fields(reference, "business unit")?;
        if let Some(found) = self
            .gateway
            .find_business_unit_by_name(&organization.id, &name)
            .await?
        {
            return Ok(found);
        }

        let created = BusinessUnitRecord::new(&organization.id, name, description, Utc::now());
        self.gateway.save_business_unit(&created).await?;
        debug!(business_unit = %created.name, id = %created.id, "Business unit created");
        Ok(created)
    }

    pub async fn team(
        &self,
        reference: &EntityRef,
        organization: &OrganizationRecord,
    ) -> ReconcileResult<TeamRecord> {
        if let Some(id) = explicit_id(reference) {
            if let Some(found) = self.gateway.get_team(id).await? {
                check_owner("team", &found.name, &found.organization_id, organization)?;
                return Ok(found);
            }
        }

        let (name, description) = creation_fields(reference, "team")?;
        if let Some(found) = self.gateway.find_team_by_name(&organization.id, &name).await? {
            return Ok(found);
        }

        let created = TeamRecord::new(&organization.id, name, description, Utc::now());
        self.gateway.save_team(&created).await?;
        debug!(team = %created.name, id = %created.id, "Team created");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::gateway::MemoryGateway;
    use crate::types::InlineEntity;

    fn resolver(gateway: &MemoryGateway) -> ReferenceResolver {
        ReferenceResolver::new(Arc::new(gateway.clone()))
    }

    #[tokio::test]
    async fn name_reference_finds_before_creating() {
        let gateway = MemoryGateway::new();
        let resolver = resolver(&gateway);

        let first = resolver.organization(&EntityRef::name("Acme")).await.unwrap();
        let second = resolver.organization(&EntityRef::name("Acme")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(gateway.organizations().len(), 1);
    }

    #[tokio::test]
    async fn id_reference_must_exist() {
        let gateway = MemoryGateway::new();
        let err = resolver(&gateway)
            .organization(&EntityRef::Id(EntityId::new()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert!(gateway.organizations().is_empty());
    }

    #[tokio::test]
    async fn inline_reference_with_stale_id_falls_back_to_name() {
        let gateway = MemoryGateway::new();
        let resolver = resolver(&gateway);
        let existing = resolver.organization(&EntityRef::name("Acme")).await.unwrap();

        let inline = EntityRef::Inline(InlineEntity {
            id: Some(EntityId::new()),
            name: "Acme".into(),
            description: None,
        });
        let resolved = resolver.organization(&inline).await.unwrap();

        assert_eq!(resolved.id, existing.id);
    }

    #[tokio::test]
    async fn inline_reference_creates_with_description() {
        let gateway = MemoryGateway::new();
        let inline = EntityRef::Inline(InlineEntity {
            id: None,
            name: "Sales".into(),
            description: Some("EMEA".into()),
        });

        let org = resolver(&gateway).organization(&EntityRef::name("Acme")).await.unwrap();
        let unit = resolver(&gateway).business_unit(&inline, &org).await.unwrap();

        assert_eq!(unit.organization_id, org.id);
        assert_eq!(unit.description.as_deref(), Some("EMEA"));
    }

    #[tokio::test]
    async fn team_of_another_organization_is_a_dependency_error() {
        let gateway = MemoryGateway::new();
        let resolver = resolver(&gateway);
        let acme = resolver.organization(&EntityRef::name("Acme")).await.unwrap();
        let globex = resolver.organization(&EntityRef::name("Globex")).await.unwrap();
        let team = resolver.team(&EntityRef::name("Core"), &globex).await.unwrap();

        let err = resolver.team(&EntityRef::Id(team.id), &acme).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Dependency);
    }

    #[tokio::test]
    async fn teams_are_scoped_by_organization() {
        let gateway = MemoryGateway::new();
        let resolver = resolver(&gateway);
        let acme = resolver.organization(&EntityRef::name("Acme")).await.unwrap();
        let globex = resolver.organization(&EntityRef::name("Globex")).await.unwrap();

        let a = resolver.team(&EntityRef::name("Core"), &acme).await.unwrap();
        let b = resolver.team(&EntityRef::name("Core"), &globex).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(gateway.teams().len(), 2);
    }
}
