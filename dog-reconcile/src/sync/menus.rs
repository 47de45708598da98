use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use super::{StageReport, count_removed};
use crate::error::ItemError;
use crate::gateway::PersistenceGateway;
use crate::observability::Stage;
use crate::types::{EntityId, MenuSpec, TenantRecord};

/// Upserts a tenant's menu documents and rewrites its menu reference list.
pub struct MenuSynchronizer {
    gateway: Arc<dyn PersistenceGateway>,
}

impl MenuSynchronizer {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Upsert every menu in `desired` under `tenant`, then replace the
    /// tenant's menu list with the ids that succeeded. Menu documents that
    /// drop out of the list are left in place.
    #[instrument(
        skip(self, tenant, desired, now),
        fields(tenant_key = %tenant.key, menus = desired.len())
    )]
    pub async fn synchronize(
        &self,
        tenant: &mut TenantRecord,
        desired: &[MenuSpec],
        now: DateTime<Utc>,
    ) -> StageReport {
        let mut report = StageReport::default();
        let mut ids: Vec<EntityId> = Vec::with_capacity(desired.len());
        let mut seen: HashSet<&str> = HashSet::with_capacity(desired.len());

        for (idx, spec) in desired.iter().enumerate() {
            let key = spec.key.trim();
            if key.is_empty() {
                report.push_error(ItemError::invalid(
                    Stage::Menus,
                    format!("menus[{idx}]"),
                    "menu has no key",
                ));
                continue;
            }
            if !seen.insert(key) {
                report.push_error(ItemError::invalid(Stage::Menus, key, "duplicate menu key"));
                continue;
            }

            match self.gateway.upsert_menu(&tenant.id, key, spec).await {
                Ok(upserted) => {
                    report.result.record(upserted.outcome);
                    ids.push(upserted.record.id);
                }
                Err(e) => {
                    let error = ItemError::from_error(Stage::Menus, key, &e);
                    warn!("{}", error);
                    report.push_error(error);
                }
            }
        }

        report.result.removed = count_removed(&tenant.menus, &ids);
        if tenant.menus != ids {
            tenant.updated_at = now;
        }
        tenant.menus = ids;
        tenant.mark_dirty("menus");

        debug!(
            added = report.result.added,
            updated = report.result.updated,
            removed = report.result.removed,
            errors = report.result.errors,
            "Menus synchronized"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use chrono::Duration;

    fn menu(key: &str, name: &str) -> MenuSpec {
        MenuSpec {
            key: key.into(),
            name: name.into(),
            ..MenuSpec::default()
        }
    }

    #[tokio::test]
    async fn failed_menu_is_skipped_and_others_persist() {
        // Arrange
        let gateway = MemoryGateway::new();
        gateway.fail_menu("broken");
        let sync = MenuSynchronizer::new(Arc::new(gateway.clone()));
        let mut tenant = TenantRecord::new("acme", Utc::now());

        // Act
        let report = sync
            .synchronize(
                &mut tenant,
                &[menu("main", "Main"), menu("broken", "Broken"), menu("footer", "Footer")],
                Utc::now(),
            )
            .await;

        // Assert
        assert_eq!(report.result.added, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].item, "broken");
        assert_eq!(tenant.menus.len(), 2);
        assert_eq!(gateway.menus_for(&tenant.id).len(), 2);
    }

    #[tokio::test]
    async fn menu_list_is_replaced_not_appended() {
        let gateway = MemoryGateway::new();
        let sync = MenuSynchronizer::new(Arc::new(gateway.clone()));
        let mut tenant = TenantRecord::new("acme", Utc::now());

        sync.synchronize(&mut tenant, &[menu("main", "Main"), menu("footer", "Footer")], Utc::now())
            .await;
        let report = sync
            .synchronize(&mut tenant, &[menu("main", "Main v2")], Utc::now())
            .await;

        assert_eq!(report.result.updated, 1);
        assert_eq!(report.result.removed, 1);
        assert_eq!(tenant.menus.len(), 1);
        // documents are never deleted
        assert_eq!(gateway.menus_for(&tenant.id).len(), 2);
    }

    #[tokio::test]
    async fn keyless_and_duplicate_menus_are_rejected() {
        let gateway = MemoryGateway::new();
        let sync = MenuSynchronizer::new(Arc::new(gateway));
        let mut tenant = TenantRecord::new("acme", Utc::now());

        let report = sync
            .synchronize(
                &mut tenant,
                &[menu("", "Nameless"), menu("main", "Main"), menu("main", "Again")],
                Utc::now(),
            )
            .await;

        assert_eq!(report.result.added, 1);
        assert_eq!(report.result.errors, 2);
        assert_eq!(report.errors[0].item, "menus[0]");
    }

    #[tokio::test]
    async fn whitespace_in_key_maps_to_the_same_document() {
        let gateway = MemoryGateway::new();
        let sync = MenuSynchronizer::new(Arc::new(gateway.clone()));
        let mut tenant = TenantRecord::new("acme", Utc::now());

        sync.synchronize(&mut tenant, &[menu(" main ", "Main")], Utc::now()).await;
        let report = sync.synchronize(&mut tenant, &[menu("main", "Main")], Utc::now()).await;

        assert_eq!(report.result.unchanged, 1);
        assert_eq!(report.result.added, 0);
        assert_eq!(report.result.removed, 0);
        let stored = gateway.menus_for(&tenant.id);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].key, "main");
    }

    #[tokio::test]
    async fn updated_at_moves_only_when_the_menu_list_changes() {
        let gateway = MemoryGateway::new();
        let sync = MenuSynchronizer::new(Arc::new(gateway));
        let created = Utc::now() - Duration::hours(1);
        let mut tenant = TenantRecord::new("acme", created);
        let later = created + Duration::minutes(5);

        sync.synchronize(&mut tenant, &[menu("main", "Main")], later).await;
        assert_eq!(tenant.updated_at, later);

        sync.synchronize(&mut tenant, &[menu("main", "Main")], later + Duration::minutes(5))
            .await;
        assert_eq!(tenant.updated_at, later);
    }
}
