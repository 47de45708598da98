use std::sync::Arc;

use serde_json::json;

use dog_reconcile::{
    ErrorKind, LiveMetrics, MemoryGateway, Metric, ReconcileConfig, ReconcileError, Stage,
    TenantReconciler,
    types::{
        ComponentIdentity, ComponentSpec, MenuSpec, RouteEntry, RouteSpec, SeedUserSpec,
        TenantConfig, TenantRecord,
    },
};

/// Test factory functions
fn create_reconciler(gateway: &MemoryGateway) -> TenantReconciler {
    TenantReconciler::builder(Arc::new(gateway.clone()))
        .config(ReconcileConfig::default().with_password_hash_cost(4))
        .build()
}

fn create_acme_config() -> TenantConfig {
    TenantConfig::new("acme", "Acme Inc").with_routes(vec![RouteSpec::new("home", "/")])
}

fn create_full_config(key: &str) -> TenantConfig {
    let mut widget = ComponentSpec::new("core", "Widget", "1.0.0");
    widget.title = Some("A".into());

    let mut admin = SeedUserSpec::new(format!("admin@{key}.io"), "Ada", "Admin");
    admin.organization = Some(dog_reconcile::types::EntityRef::name("HQ"));
    admin.roles = vec!["ADMIN".into()];

    let mut config = TenantConfig::new(key, format!("{key} tenant"))
        .with_routes(vec![RouteSpec::new("home", "/"), RouteSpec::new("about", "/about")])
        .with_menus(vec![MenuSpec {
            key: "main".into(),
            name: "Main".into(),
            ..MenuSpec::default()
        }])
        .with_components(vec![widget])
        .with_users(vec![admin]);
    config.profile.themes = vec![json!({"name": "dark"})];
    config
}

/// R1. Routes: add, then unchanged, then removed by omission
#[tokio::test]
async fn test_acme_route_lifecycle() {
    let gateway = MemoryGateway::new();
    let reconciler = create_reconciler(&gateway);
    let config = create_acme_config();

    // Act: reconcile the same config twice
    let first = reconciler.upsert_from_config(&config).await.unwrap();
    let second = reconciler.upsert_from_config(&config).await.unwrap();

    // Assert: added once, then unchanged
    assert!(first.created);
    assert_eq!(first.routes.added, 1);
    assert!(!second.created);
    assert_eq!(second.routes.added, 0);
    assert_eq!(second.routes.unchanged, 1);
    assert_eq!(second.tenant.id, first.tenant.id);

    // Act: empty the route list
    let third = reconciler
        .upsert_from_config(&config.clone().with_routes(vec![]))
        .await
        .unwrap();

    // Assert: counted as removed and truly absent from storage
    assert_eq!(third.routes.removed, 1);
    assert!(third.tenant.routes.is_empty());
    assert!(gateway.tenant("acme").unwrap().routes.is_empty());
}

/// R2. Components: reinstall patches title, identity stays
#[tokio::test]
async fn test_component_title_patch() {
    let gateway = MemoryGateway::new();
    let reconciler = create_reconciler(&gateway);
    let identity = ComponentIdentity::new("core", "Widget", "1.0.0");

    let mut widget = ComponentSpec::new("core", "Widget", "1.0.0");
    widget.title = Some("A".into());
    let config = TenantConfig::new("acme", "Acme Inc").with_components(vec![widget.clone()]);

    // Arrange: install with title A
    let first = reconciler.upsert_from_config(&config).await.unwrap();

    // Act: reinstall with title B
    widget.title = Some("B".into());
    let second = reconciler
        .upsert_from_config(&config.clone().with_components(vec![widget]))
        .await
        .unwrap();

    // Assert: same record, new title
    assert_eq!(second.components.updated, 1);
    assert_eq!(first.tenant.components, second.tenant.components);
    let stored = gateway.component(&identity).unwrap();
    assert_eq!(stored.identity(), identity);
    assert_eq!(stored.title.as_deref(), Some("B"));
    assert_eq!(gateway.component_count(), 1);
}

/// R3. One invalid tenant fails alone
#[tokio::test]
async fn test_batch_partial_failure_isolation() {
    let gateway = MemoryGateway::new();
    let reconciler = create_reconciler(&gateway);

    let mut configs: Vec<TenantConfig> = (0..4)
        .map(|i| TenantConfig::new(format!("tenant-{i}"), format!("Tenant {i}")))
        .collect();
    configs[2].profile.name = String::new();

    // Act
    let outcome = reconciler.on_startup(&configs).await;

    // Assert: N-1 succeeded, 1 failed, nothing written for the invalid one
    assert_eq!(outcome.succeeded.len(), 3);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.total(), configs.len());
    assert_eq!(outcome.failed[0].config.key, "tenant-2");
    assert!(matches!(outcome.failed[0].error, ReconcileError::Validation { .. }));
    assert!(gateway.tenant("tenant-2").is_none());
    assert_eq!(gateway.tenant_count(), 3);
}

/// R4. A keyless, pathless route is rejected individually
#[tokio::test]
async fn test_route_item_isolation() {
    let gateway = MemoryGateway::new();
    let reconciler = create_reconciler(&gateway);
    let routes = vec![
        RouteSpec::new("home", "/"),
        RouteSpec::default(),
        RouteSpec::new("about", "/about"),
    ];
    let config = TenantConfig::new("acme", "Acme Inc").with_routes(routes.clone());

    let done = reconciler.upsert_from_config(&config).await.unwrap();

    assert_eq!(done.tenant.routes.len(), routes.len() - 1);
    assert_eq!(done.errors.len(), 1);
    assert_eq!(done.errors[0].stage, Stage::Routes);
    assert_eq!(done.errors[0].kind, ErrorKind::Item);
}

/// R5. Every stage is idempotent
#[tokio::test]
async fn test_full_config_is_idempotent() {
    let gateway = MemoryGateway::new();
    let reconciler = create_reconciler(&gateway);
    let config = create_full_config("acme");

    let first = reconciler.upsert_from_config(&config).await.unwrap();
    let second = reconciler.upsert_from_config(&config).await.unwrap();

    assert!(!first.is_noop());
    assert!(first.errors.is_empty(), "{:?}", first.errors);
    assert!(second.is_noop(), "second run changed something: {second:?}");
    assert_eq!(second.routes.unchanged, 2);
    assert_eq!(second.menus.unchanged, 1);
    assert_eq!(second.components.unchanged, 1);
    assert_eq!(second.users.unchanged, 1);
    assert_eq!(second.tenant.menus, first.tenant.menus);
}

/// R6. Variant profile fields are written on every save
#[tokio::test]
async fn test_variant_fields_flushed_without_change() {
    let gateway = MemoryGateway::new();
    let reconciler = create_reconciler(&gateway);
    let config = create_full_config("acme");

    reconciler.upsert_from_config(&config).await.unwrap();
    reconciler.upsert_from_config(&config).await.unwrap();

    // two saves per run: profile first, then the reference lists
    let history = gateway.flush_history("acme");
    assert_eq!(history.len(), 4);
    for field in ["themes", "authConfig", "settings", "whitelist"] {
        assert!(history[2].contains(field), "{field} was not flushed");
    }
    assert!(history[3].contains("routes"));
    assert_eq!(gateway.tenant("acme").unwrap().profile.themes, vec![json!({"name": "dark"})]);
}

/// R7. A failing menu is recorded, the tenant still succeeds
#[tokio::test]
async fn test_menu_failure_is_item_level() {
    let gateway = MemoryGateway::new();
    gateway.fail_menu("main");
    let reconciler = create_reconciler(&gateway);

    let done = reconciler
        .upsert_from_config(&create_full_config("acme"))
        .await
        .unwrap();

    assert_eq!(done.menus.errors, 1);
    assert!(done.tenant.menus.is_empty());
    assert_eq!(done.components.added, 1);
    assert_eq!(done.users.added, 1);
    assert_eq!(done.errors[0].kind, ErrorKind::Persistence);
}

/// R8. A tenant-level persistence failure fails only that tenant
#[tokio::test]
async fn test_tenant_save_failure_is_tenant_level() {
    let gateway = MemoryGateway::new();
    gateway.fail_tenant_save("globex");
    let reconciler = create_reconciler(&gateway);

    let outcome = reconciler
        .on_startup(&[create_full_config("acme"), create_full_config("globex")])
        .await;

    assert_eq!(outcome.succeeded.len(), 1);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].error.kind(), ErrorKind::Persistence);
    assert!(gateway.user("admin@globex.io").is_none());
}

/// R9. Same-key reconciliations never run concurrently
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_key_creates_one_tenant() {
    let gateway = MemoryGateway::new();
    let reconciler = Arc::new(create_reconciler(&gateway));
    let config = create_full_config("acme");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let reconciler = reconciler.clone();
            let config = config.clone();
            tokio::spawn(async move { reconciler.upsert_from_config(&config).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        let done = handle.await.unwrap().unwrap();
        if done.created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(gateway.tenant_count(), 1);
    assert_eq!(gateway.component_count(), 1);
    assert!(!reconciler.locks().is_locked("acme"));
}

/// R10. Disabled stages leave their data alone
#[tokio::test]
async fn test_stage_toggles() {
    let gateway = MemoryGateway::new();
    let reconciler = TenantReconciler::builder(Arc::new(gateway.clone()))
        .config(
            ReconcileConfig::default()
                .without_user_provisioning()
                .without_component_install(),
        )
        .build();

    let done = reconciler
        .upsert_from_config(&create_full_config("acme"))
        .await
        .unwrap();

    assert_eq!(done.users, Default::default());
    assert_eq!(done.components, Default::default());
    assert!(gateway.user("admin@acme.io").is_none());
    assert_eq!(gateway.component_count(), 0);
    assert_eq!(done.routes.added, 2);
}

/// R11. Telemetry counts per stage and per batch
#[tokio::test]
async fn test_live_metrics_receive_counts() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new();
    let metrics = Arc::new(LiveMetrics::new());
    let reconciler = TenantReconciler::builder(Arc::new(gateway.clone()))
        .telemetry(metrics.clone())
        .config(ReconcileConfig::default().with_password_hash_cost(4))
        .build();

    let mut invalid = create_acme_config();
    invalid.key = "bad key".into();

    let outcome = reconciler
        .on_startup(&[create_full_config("acme"), create_full_config("globex"), invalid])
        .await;

    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(metrics.counter(Metric::Succeeded, Stage::Batch), 2);
    assert_eq!(metrics.counter(Metric::Failed, Stage::Batch), 1);
    assert_eq!(metrics.counter(Metric::Added, Stage::Routes), 4);
    assert_eq!(metrics.counter(Metric::Added, Stage::Users), 2);
    assert_eq!(metrics.counter(Metric::Errors, Stage::Tenant), 1);
    assert_eq!(metrics.samples(Stage::Batch), 1);
    assert_eq!(metrics.samples(Stage::Tenant), 3);

    let snapshot = serde_json::to_value(&outcome.succeeded[0].routes)?;
    assert_eq!(snapshot["added"], 2);
    Ok(())
}

/// R12. Seed users get a membership in the reconciled tenant
#[tokio::test]
async fn test_seed_user_membership_scoped_to_tenant() {
    let gateway = MemoryGateway::new();
    let reconciler = create_reconciler(&gateway);

    let done = reconciler
        .upsert_from_config(&create_full_config("acme"))
        .await
        .unwrap();

    let user = gateway.user("admin@acme.io").unwrap();
    let orgs = gateway.organizations();
    assert_eq!(orgs.len(), 1);

    let membership = user.membership_for(&done.tenant.id).next().unwrap();
    assert_eq!(membership.organization_id.as_ref(), Some(&orgs[0].id));
    assert!(membership.business_unit_id.is_none());
    assert!(membership.roles.contains("ADMIN"));
    assert!(!membership.roles.contains("USER"));
}

/// R13. Unresolvable user dependencies abort only that user
#[tokio::test]
async fn test_user_dependency_error_is_item_level() {
    let gateway = MemoryGateway::new();
    let reconciler = create_reconciler(&gateway);

    let mut orphan = SeedUserSpec::new("orphan@acme.io", "Or", "Phan");
    orphan.business_unit = Some(dog_reconcile::types::EntityRef::name("Sales"));
    let mut config = create_full_config("acme");
    config.users.push(orphan);

    let done = reconciler.upsert_from_config(&config).await.unwrap();

    assert_eq!(done.users.added, 1);
    assert_eq!(done.users.errors, 1);
    let error = done.errors.iter().find(|e| e.stage == Stage::Users).unwrap();
    assert_eq!(error.item, "orphan@acme.io");
    assert_eq!(error.kind, ErrorKind::Dependency);
    assert!(gateway.user("orphan@acme.io").is_none());
}

/// R14. Existing tenants are updated in place
#[tokio::test]
async fn test_profile_update_keeps_record_identity() {
    let gateway = MemoryGateway::new();
    let reconciler = create_reconciler(&gateway);
    let mut config = create_acme_config();

    let first = reconciler.upsert_from_config(&config).await.unwrap();
    config.profile.name = "Acme Corporation".into();
    config.profile.site_url = Some("https://acme.example".into());
    let second = reconciler.upsert_from_config(&config).await.unwrap();

    assert_eq!(second.tenant.id, first.tenant.id);
    assert_eq!(second.tenant.created_at, first.tenant.created_at);
    let stored = gateway.tenant("acme").unwrap();
    assert_eq!(stored.profile.name, "Acme Corporation");
    assert_eq!(stored.profile.site_url.as_deref(), Some("https://acme.example"));
}

/// R15. Pre-existing tenants keep unchanged routes verbatim
#[tokio::test]
async fn test_seeded_tenant_routes_kept_verbatim() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new();
    let mut seeded = TenantRecord::new("acme", chrono::Utc::now());
    seeded.routes = vec![serde_json::from_value::<RouteEntry>(json!({
        "id": "legacy-home",
        "key": "home",
        "path": "/",
        "pinned": true
    }))?];
    gateway.seed_tenant(seeded.clone());
    let reconciler = create_reconciler(&gateway);

    // Act
    let done = reconciler.upsert_from_config(&create_acme_config()).await?;

    // Assert: same record, stored-only fields survive an unchanged route
    assert!(!done.created);
    assert_eq!(done.tenant.id, seeded.id);
    assert_eq!(done.routes.unchanged, 1);
    assert_eq!(done.tenant.routes, seeded.routes);
    assert_eq!(done.tenant.routes[0].extra.get("pinned"), Some(&json!(true)));
    Ok(())
}

/// R16. Menu keys are trimmed before they reach storage
#[tokio::test]
async fn test_menu_key_whitespace_is_not_a_new_menu() {
    let gateway = MemoryGateway::new();
    let reconciler = create_reconciler(&gateway);
    let menu = |key: &str| MenuSpec {
        key: key.into(),
        name: "Main".into(),
        ..MenuSpec::default()
    };

    // Arrange: first run declares the key with surrounding spaces
    let base = TenantConfig::new("acme", "Acme Inc");
    let first = reconciler
        .upsert_from_config(&base.clone().with_menus(vec![menu(" main ")]))
        .await
        .unwrap();

    // Act: same menu, key without the spaces
    let second = reconciler
        .upsert_from_config(&base.with_menus(vec![menu("main")]))
        .await
        .unwrap();

    // Assert: one document keyed "main", reported unchanged
    assert_eq!(second.menus.unchanged, 1);
    assert_eq!(second.menus.added, 0);
    assert_eq!(second.menus.removed, 0);
    assert_eq!(second.tenant.menus, first.tenant.menus);
    let stored = gateway.menus_for(&second.tenant.id);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].key, "main");
}
