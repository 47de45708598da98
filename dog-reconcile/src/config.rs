//! # Reconciler configuration
//!
//! Settings live in a plain string key/value store, the same way DogRS
//! apps use `app.set()` / `app.get()`. Environment variables can be layered
//! on top with a prefix:
//!
//! ```rust
//! use dog_reconcile::config::{ConfigStore, ReconcileConfig};
//!
//! let mut store = ConfigStore::new();
//! store.set("reconcile.default_roles", "USER, VIEWER");
//! store.load_env("DOG_RECONCILE__"); // DOG_RECONCILE__RECONCILE__PROVISION_USERS=false
//!
//! let config = ReconcileConfig::from_snapshot(&store.snapshot());
//! assert_eq!(config.default_roles, vec!["USER".to_string(), "VIEWER".to_string()]);
//! ```

use std::collections::HashMap;

pub const PASSWORD_HASH_COST: &str = "reconcile.password_hash_cost";
pub const DEFAULT_ROLES: &str = "reconcile.default_roles";
pub const PROVISION_USERS: &str = "reconcile.provision_users";
pub const INSTALL_COMPONENTS: &str = "reconcile.install_components";

#[derive(Debug, Default)]
pub struct ConfigStore {
    values: HashMap<String, String>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copy `PREFIX` + `A__B` environment variables in as `a.b`.
    pub fn load_env(&mut self, prefix: &str) {
        self.load_vars(prefix, std::env::vars());
    }

    fn load_vars<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(normalized, value);
            }
        }
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            map: self.values.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    map: HashMap<String, String>,
}

impl ConfigSnapshot {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse::<u32>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }

    /// Comma-separated list; blank entries dropped.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

/// Behaviour switches for a [`TenantReconciler`](crate::TenantReconciler).
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// bcrypt cost for seed user passwords
    pub password_hash_cost: u32,
    /// Roles granted to seed users that declare none
    pub default_roles: Vec<String>,
    pub provision_users: bool,
    pub install_components: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            password_hash_cost: bcrypt::DEFAULT_COST,
            default_roles: vec!["USER".to_string()],
            provision_users: true,
            install_components: true,
        }
    }
}

impl ReconcileConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from a snapshot, keeping defaults for absent or
    /// unparseable keys.
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
        let defaults = Self::default();
        Self {
            password_hash_cost: snapshot
                .get_u32(PASSWORD_HASH_COST)
                .unwrap_or(defaults.password_hash_cost),
            default_roles: snapshot
                .get_list(DEFAULT_ROLES)
                .unwrap_or(defaults.default_roles),
            provision_users: snapshot
                .get_bool(PROVISION_USERS)
                .unwrap_or(defaults.provision_users),
            install_components: snapshot
                .get_bool(INSTALL_COMPONENTS)
                .unwrap_or(defaults.install_components),
        }
    }

    pub fn with_password_hash_cost(mut self, cost: u32) -> Self {
        self.password_hash_cost = cost;
        self
    }

    pub fn with_default_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn without_user_provisioning(mut self) -> Self {
        self.provision_users = false;
        self
    }

    pub fn without_component_install(mut self) -> Self {
        self.install_components = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_vars_are_normalized() {
        let mut store = ConfigStore::new();
        store.load_vars(
            "DOG_RECONCILE__",
            vec![
                ("DOG_RECONCILE__RECONCILE__PASSWORD_HASH_COST".to_string(), "6".to_string()),
                ("UNRELATED".to_string(), "x".to_string()),
            ],
        );

        assert_eq!(store.get(PASSWORD_HASH_COST), Some("6"));
        assert!(!store.has("unrelated"));
    }

    #[test]
    fn snapshot_overrides_defaults() {
        let mut store = ConfigStore::new();
        store.set(PASSWORD_HASH_COST, "5");
        store.set(PROVISION_USERS, "false");
        store.set(INSTALL_COMPONENTS, "not-a-bool");

        let config = ReconcileConfig::from_snapshot(&store.snapshot());
        assert_eq!(config.password_hash_cost, 5);
        assert!(!config.provision_users);
        assert!(config.install_components);
        assert_eq!(config.default_roles, vec!["USER".to_string()]);
    }

    #[test]
    fn snapshot_typed_getters() {
        let mut store = ConfigStore::new();
        store.set("reconcile.batch_size", " 25 ");
        store.set(DEFAULT_ROLES, "USER, , ADMIN");

        let snapshot = store.snapshot();
        assert_eq!(snapshot.get_usize("reconcile.batch_size"), Some(25));
        assert_eq!(snapshot.get_u32("reconcile.missing"), None);
        assert_eq!(
            snapshot.get_list(DEFAULT_ROLES),
            Some(vec!["USER".to_string(), "ADMIN".to_string()])
        );
    }
}
