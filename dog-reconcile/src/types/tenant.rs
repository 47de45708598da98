use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use super::{ComponentSpec, EntityId, MenuSpec, RouteEntry, RouteSpec, SeedUserSpec};
use crate::validation::validate_tenant_key;

/// Scalar tenant fields, shared verbatim between config and record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TenantProfile {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "email must be a valid email"))]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url(message = "siteUrl must be a valid URL"))]
    pub site_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "billingType must not be empty"))]
    pub billing_type: Option<String>,
    #[serde(default)]
    pub application_roles: Vec<String>,
    #[serde(default)]
    pub themes: Vec<Value>,
    #[serde(default)]
    pub auth_config: Vec<Value>,
    #[serde(default)]
    pub settings: Vec<Value>,
    #[serde(default)]
    pub whitelist: Vec<String>,
}

impl TenantProfile {
    /// Variant-typed fields. Gateways can't be trusted to notice nested
    /// changes in these, so they are marked dirty on every assignment.
    pub const VARIANT_FIELDS: [&'static str; 4] = ["themes", "authConfig", "settings", "whitelist"];
}

/// Desired state for one tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    #[validate(custom(function = "validate_tenant_key"))]
    pub key: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub profile: TenantProfile,
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
    #[serde(default)]
    pub menus: Vec<MenuSpec>,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    #[serde(default)]
    pub users: Vec<SeedUserSpec>,
}

impl TenantConfig {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            profile: TenantProfile {
                name: name.into(),
                ..TenantProfile::default()
            },
            ..Self::default()
        }
    }

    pub fn with_routes(mut self, routes: Vec<RouteSpec>) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_menus(mut self, menus: Vec<MenuSpec>) -> Self {
        self.menus = menus;
        self
    }

    pub fn with_components(mut self, components: Vec<ComponentSpec>) -> Self {
        self.components = components;
        self
    }

    pub fn with_users(mut self, users: Vec<SeedUserSpec>) -> Self {
        self.users = users;
        self
    }
}

/// Persisted tenant. Exactly one exists per `key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    pub id: EntityId,
    pub key: String,
    #[serde(flatten)]
    pub profile: TenantProfile,
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
    #[serde(default)]
    pub menus: Vec<EntityId>,
    #[serde(default)]
    pub components: Vec<EntityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    dirty: BTreeSet<&'static str>,
}

impl TenantRecord {
    pub fn new(key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::new(),
            key: key.into(),
            profile: TenantProfile::default(),
            routes: Vec::new(),
            menus: Vec::new(),
            components: Vec::new(),
            created_at: now,
            updated_at: now,
            dirty: BTreeSet::new(),
        }
    }

    /// Shallow-merge the config's scalar fields onto this record.
    ///
    /// Returns whether any field content changed. Variant fields are
    /// marked dirty regardless.
    pub fn apply_profile(&mut self, profile: &TenantProfile, now: DateTime<Utc>) -> bool {
        let changed = self.profile != *profile;
        self.profile = profile.clone();
        for field in TenantProfile::VARIANT_FIELDS {
            self.mark_dirty(field);
        }
        if changed {
            self.updated_at = now;
        }
        changed
    }

    pub fn mark_dirty(&mut self, field: &'static str) {
        self.dirty.insert(field);
    }

    pub fn is_dirty(&self, field: &str) -> bool {
        self.dirty.contains(field)
    }

    pub fn dirty_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.dirty.iter().copied()
    }

    /// Drain the dirty set. Gateways call this once the record is persisted.
    pub fn take_dirty(&mut self) -> BTreeSet<&'static str> {
        std::mem::take(&mut self.dirty)
    }
}
