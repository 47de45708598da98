use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::EntityId;
use crate::error::{ReconcileError, ReconcileResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub namespace: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Author email, resolved against the user store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub arguments: Vec<Value>,
    #[serde(default)]
    pub resources: Vec<Value>,
}

impl ComponentSpec {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }
}

/// `(namespace, name, version)`: never changed by an update.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentIdentity {
    pub namespace: String,
    pub name: String,
    pub version: String,
}

impl ComponentIdentity {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn from_spec(spec: &ComponentSpec) -> ReconcileResult<Self> {
        let parts = [
            ("namespace", &spec.namespace),
            ("name", &spec.name),
            ("version", &spec.version),
        ];
        let missing: Vec<&str> = parts
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(field, _)| *field)
            .collect();

        if !missing.is_empty() {
            return Err(ReconcileError::invalid_item(format!(
                "component is missing {}",
                missing.join(", ")
            )));
        }

        Ok(Self::new(
            spec.namespace.trim(),
            spec.name.trim(),
            spec.version.trim(),
        ))
    }
}

impl fmt::Display for ComponentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}@{}", self.namespace, self.name, self.version)
    }
}

/// The allow-listed mutable fields of a component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentPatch {
    pub title: Option<String>,
    pub author: Option<EntityId>,
    pub labels: Vec<String>,
    pub uri: Option<String>,
    pub roles: Vec<String>,
    pub arguments: Vec<Value>,
    pub resources: Vec<Value>,
}

impl ComponentPatch {
    pub fn from_spec(spec: &ComponentSpec, author: Option<EntityId>) -> Self {
        Self {
            title: spec.title.clone(),
            author,
            labels: spec.labels.clone(),
            uri: spec.uri.clone(),
            roles: spec.roles.clone(),
            arguments: spec.arguments.clone(),
            resources: spec.resources.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub id: EntityId,
    pub namespace: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<EntityId>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub arguments: Vec<Value>,
    #[serde(default)]
    pub resources: Vec<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ComponentRecord {
    /// New record. Fields outside the allow-list (`description`) are only
    /// ever written here.
    pub fn create(
        identity: &ComponentIdentity,
        spec: &ComponentSpec,
        patch: ComponentPatch,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            namespace: identity.namespace.clone(),
            name: identity.name.clone(),
            version: identity.version.clone(),
            title: patch.title,
            description: spec.description.clone(),
            author: patch.author,
            labels: patch.labels,
            uri: patch.uri,
            roles: patch.roles,
            arguments: patch.arguments,
            resources: patch.resources,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn identity(&self) -> ComponentIdentity {
        ComponentIdentity::new(&self.namespace, &self.name, &self.version)
    }

    fn current_patch(&self) -> ComponentPatch {
        ComponentPatch {
            title: self.title.clone(),
            author: self.author.clone(),
            labels: self.labels.clone(),
            uri: self.uri.clone(),
            roles: self.roles.clone(),
            arguments: self.arguments.clone(),
            resources: self.resources.clone(),
        }
    }

    /// Apply allow-listed fields; bumps `updated_at` only on change.
    pub fn apply_patch(&mut self, patch: ComponentPatch, now: DateTime<Utc>) -> bool {
        if self.current_patch() == patch {
            return false;
        }

        self.title = patch.title;
        self.author = patch.author;
        self.labels = patch.labels;
        self.uri = patch.uri;
        self.roles = patch.roles;
        self.arguments = patch.arguments;
        self.resources = patch.resources;
        self.updated_at = now;
        true
    }
}
