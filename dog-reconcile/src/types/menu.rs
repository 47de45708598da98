use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuSpec {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub entries: Vec<MenuEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuEntry {
    #[serde(default)]
    pub ordinal: i32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub items: Vec<MenuEntry>,
}

/// A menu document scoped to one tenant; unique on `(tenant_id, key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuRecord {
    pub id: EntityId,
    pub tenant_id: EntityId,
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub entries: Vec<MenuEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MenuRecord {
    pub fn create(tenant_id: &EntityId, key: &str, spec: &MenuSpec, now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::new(),
            tenant_id: tenant_id.clone(),
            key: key.to_string(),
            name: spec.name.clone(),
            target: spec.target.clone(),
            roles: spec.roles.clone(),
            entries: spec.entries.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite content fields in place. Returns whether anything changed.
    pub fn overwrite(&mut self, spec: &MenuSpec, now: DateTime<Utc>) -> bool {
        let same = self.name == spec.name
            && self.target == spec.target
            && self.roles == spec.roles
            && self.entries == spec.entries;
        if same {
            return false;
        }

        self.name = spec.name.clone();
        self.target = spec.target.clone();
        self.roles = spec.roles.clone();
        self.entries = spec.entries.clone();
        self.updated_at = now;
        true
    }
}
