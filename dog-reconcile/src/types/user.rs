use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityId;

/// Seed user declared in a tenant config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedUserSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_unit: Option<EntityRef>,
    #[serde(default)]
    pub teams: Vec<EntityRef>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub auth_providers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl SeedUserSpec {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: Some(email.into()),
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
            ..Self::default()
        }
    }
}

/// Reference to an organization, business unit or team.
///
/// Configs may name the entity by persisted id, by bare name, or with an
/// inline object. A bare string is read as an id only when it is shaped
/// like one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEntityRef", into = "RawEntityRef")]
pub enum EntityRef {
    Id(EntityId),
    Name(String),
    Inline(InlineEntity),
}

impl EntityRef {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Human-readable label for logs and error messages.
    pub fn label(&self) -> &str {
        match self {
            EntityRef::Id(id) => id.as_str(),
            EntityRef::Name(name) => name,
            EntityRef::Inline(inline) => &inline.name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawEntityRef {
    Text(String),
    Inline(InlineEntity),
}

impl From<RawEntityRef> for EntityRef {
    fn from(raw: RawEntityRef) -> Self {
        match raw {
            RawEntityRef::Text(text) if EntityId::is_well_formed(&text) => {
                EntityRef::Id(EntityId::from(text.trim()))
            }
            RawEntityRef::Text(text) => EntityRef::Name(text),
            RawEntityRef::Inline(inline) => EntityRef::Inline(inline),
        }
    }
}

impl From<EntityRef> for RawEntityRef {
    fn from(r: EntityRef) -> Self {
        match r {
            EntityRef::Id(id) => RawEntityRef::Text(id.0),
            EntityRef::Name(name) => RawEntityRef::Text(name),
            EntityRef::Inline(inline) => RawEntityRef::Inline(inline),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRecord {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Each team id appears exactly once.
    #[serde(default)]
    pub teams: Vec<EntityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrganizationRecord {
    pub fn new(name: impl Into<String>, description: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            description,
            teams: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Link a team; returns false when it was already linked.
    pub fn link_team(&mut self, team_id: &EntityId) -> bool {
        if self.teams.contains(team_id) {
            return false;
        }
        self.teams.push(team_id.clone());
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessUnitRecord {
    pub id: EntityId,
    pub organization_id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BusinessUnitRecord {
    pub fn new(
        organization_id: &EntityId,
        name: impl Into<String>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            organization_id: organization_id.clone(),
            name: name.into(),
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRecord {
    pub id: EntityId,
    pub organization_id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamRecord {
    pub fn new(
        organization_id: &EntityId,
        name: impl Into<String>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            organization_id: organization_id.clone(),
            name: name.into(),
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A role grant scoped to `(client, organization, business unit)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub client_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_unit_id: Option<EntityId>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Membership {
    fn same_scope(
        &self,
        client_id: &EntityId,
        organization_id: Option<&EntityId>,
        business_unit_id: Option<&EntityId>,
    ) -> bool {
        &self.client_id == client_id
            && self.organization_id.as_ref() == organization_id
            && self.business_unit_id.as_ref() == business_unit_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: EntityId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub auth_providers: Vec<String>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
    #[serde(default)]
    pub teams: Vec<EntityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            password_hash: None,
            auth_providers: Vec::new(),
            memberships: Vec::new(),
            teams: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Grant `roles` within a scope. At most one membership exists per
    /// scope; new roles are appended to it. Returns whether anything changed.
    pub fn grant<I, S>(
        &mut self,
        client_id: &EntityId,
        organization_id: Option<&EntityId>,
        business_unit_id: Option<&EntityId>,
        roles: I,
    ) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (idx, created) = match self
            .memberships
            .iter()
            .position(|m| m.same_scope(client_id, organization_id, business_unit_id))
        {
            Some(idx) => (idx, false),
            None => {
                self.memberships.push(Membership {
                    client_id: client_id.clone(),
                    organization_id: organization_id.cloned(),
                    business_unit_id: business_unit_id.cloned(),
                    roles: BTreeSet::new(),
                });
                (self.memberships.len() - 1, true)
            }
        };

        let membership = &mut self.memberships[idx];
        let mut added = false;
        for role in roles {
            added |= membership.roles.insert(role.into());
        }
        created || added
    }

    pub fn membership_for<'a>(
        &'a self,
        client_id: &'a EntityId,
    ) -> impl Iterator<Item = &'a Membership> + 'a {
        self.memberships.iter().filter(move |m| &m.client_id == client_id)
    }

    pub fn link_team(&mut self, team_id: &EntityId) -> bool {
        if self.teams.contains(team_id) {
            return false;
        }
        self.teams.push(team_id.clone());
        true
    }

    pub fn add_auth_provider(&mut self, provider: &str) -> bool {
        if self.auth_providers.iter().any(|p| p == provider) {
            return false;
        }
        self.auth_providers.push(provider.to_string());
        true
    }
}
