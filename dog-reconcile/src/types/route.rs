use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EntityId;

/// Desired route, as it appears in a tenant config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_fqn: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub exact: bool,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl RouteSpec {
    pub fn new(key: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Identity of the route: `key`, else `path`. Blank values don't count.
    pub fn resolved_key(&self) -> Option<&str> {
        non_blank(self.key.as_deref()).or_else(|| non_blank(self.path.as_deref()))
    }
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

/// Route as embedded in a persisted tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_fqn: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub exact: bool,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Fields present on the stored document but unknown to the config
    /// schema. Kept only while the entry is unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RouteEntry {
    /// Materialize a desired route under its resolved key.
    pub fn from_spec(key: &str, spec: &RouteSpec) -> Self {
        Self {
            id: Some(EntityId::new()),
            key: key.to_string(),
            path: spec.path.clone(),
            title: spec.title.clone(),
            roles: spec.roles.clone(),
            component_fqn: spec.component_fqn.clone(),
            public: spec.public,
            exact: spec.exact,
            args: spec.args.clone(),
            extra: Map::new(),
        }
    }

    /// Structural equality against a desired route, ignoring `id` and
    /// persisted-only fields.
    pub fn matches(&self, key: &str, spec: &RouteSpec) -> bool {
        self.key == key
            && self.path == spec.path
            && self.title == spec.title
            && self.roles == spec.roles
            && self.component_fqn == spec.component_fqn
            && self.public == spec.public
            && self.exact == spec.exact
            && self.args == spec.args
    }
}
