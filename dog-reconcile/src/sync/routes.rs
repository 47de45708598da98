use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::StageReport;
use crate::error::ItemError;
use crate::observability::Stage;
use crate::types::{RouteEntry, RouteSpec, TenantRecord};

/// Result of diffing desired routes against the persisted list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteDiff {
    /// The new route list, in desired order.
    pub materialized: Vec<RouteEntry>,
    pub report: StageReport,
}

/// Diff `desired` against `existing`.
///
/// Entries are matched by resolved key. A match that is structurally equal
/// is kept verbatim; otherwise it is replaced but keeps its id. Existing
/// keys absent from `desired` are counted as removed and simply not carried
/// over. Routes without a key or path, and repeats of a key already seen,
/// are reported and skipped. A persisted key that appears more than once
/// keeps its first entry; the later ones are dropped and counted as removed.
pub fn diff_routes(existing: &[RouteEntry], desired: &[RouteSpec]) -> RouteDiff {
    let mut index: HashMap<&str, &RouteEntry> = HashMap::with_capacity(existing.len());
    let mut shadowed = 0;
    for entry in existing {
        if index.contains_key(entry.key.as_str()) {
            warn!(key = %entry.key, "Dropping persisted route with a repeated key");
            shadowed += 1;
            continue;
        }
        index.insert(entry.key.as_str(), entry);
    }

    let mut diff = RouteDiff::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(desired.len());

    for (idx, spec) in desired.iter().enumerate() {
        let Some(key) = spec.resolved_key() else {
            diff.report.push_error(ItemError::invalid(
                Stage::Routes,
                format!("routes[{idx}]"),
                "route has neither key nor path",
            ));
            continue;
        };

        if !seen.insert(key) {
            diff.report.push_error(ItemError::invalid(
                Stage::Routes,
                key,
                "duplicate route key",
            ));
            continue;
        }

        match index.get(key) {
            Some(current) if current.matches(key, spec) => {
                diff.report.result.unchanged += 1;
                diff.materialized.push((*current).clone());
            }
            Some(current) => {
                diff.report.result.updated += 1;
                let mut replacement = RouteEntry::from_spec(key, spec);
                if current.id.is_some() {
                    replacement.id = current.id.clone();
                }
                diff.materialized.push(replacement);
            }
            None => {
                diff.report.result.added += 1;
                diff.materialized.push(RouteEntry::from_spec(key, spec));
            }
        }
    }

    diff.report.result.removed =
        index.keys().filter(|key| !seen.contains(*key)).count() + shadowed;
    diff
}

/// Replaces a tenant's embedded route list with the desired one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteSynchronizer;

impl RouteSynchronizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synchronize(
        &self,
        tenant: &mut TenantRecord,
        desired: &[RouteSpec],
        now: DateTime<Utc>,
    ) -> StageReport {
        let RouteDiff {
            materialized,
            report,
        } = diff_routes(&tenant.routes, desired);

        for error in &report.errors {
            warn!(tenant_key = %tenant.key, "{}", error);
        }

        if !report.result.is_noop() {
            tenant.updated_at = now;
        }
        tenant.routes = materialized;
        tenant.mark_dirty("routes");

        debug!(
            tenant_key = %tenant.key,
            added = report.result.added,
            updated = report.result.updated,
            unchanged = report.result.unchanged,
            removed = report.result.removed,
            "Routes synchronized"
        );
        report
    }
}
