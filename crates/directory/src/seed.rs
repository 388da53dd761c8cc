//! Startup seeding.
//!
//! [`seed_defaults`] writes a fixed set of tenants and ruleset documents,
//! each only if nothing is stored under its key yet. It never overwrites, so
//! running it on every start is safe. Members listed in a newly written
//! document are granted the tenant in the user directory.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::reconciler::{MembershipDelta, MembershipReconciler, ReconcileReport};
use crate::ruleset::RulesetStore;
use crate::tenant::TenantId;
use crate::tenants::TenantManager;
use crate::types::{RulesetDocument, Tenant};

/// Tenants and ruleset documents to create on first start.
///
/// ```json
/// {
///   "tenants": [{"id": "acme", "name": "Acme", "description": null}],
///   "rulesets": [{"tenant_id": "acme", "groups": [], "access_controls": []}]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedData {
    /// Identity records.
    #[serde(default)]
    pub tenants: Vec<Tenant>,
    /// Ruleset documents, keyed by their `tenant_id`.
    #[serde(default)]
    pub rulesets: Vec<RulesetDocument>,
}

impl SeedData {
    /// The set used when no seed file is configured: one `default` tenant
    /// with an empty ruleset document.
    pub fn builtin() -> Self {
        let id = TenantId::new("default");
        Self {
            tenants: vec![Tenant::new(id.clone(), "Default", None)],
            rulesets: vec![RulesetDocument::empty(id, "")],
        }
    }

    /// Parses and validates seed data from JSON text.
    pub fn from_json(text: &str) -> StorageResult<Self> {
        let mut data: SeedData = serde_json::from_str(text)
            .map_err(|e| StorageError::invalid_field("seed", e.to_string()))?;
        data.normalize()?;
        Ok(data)
    }

    /// Rejects empty or key-breaking tenant ids and points every group at
    /// its document's tenant.
    fn normalize(&mut self) -> StorageResult<()> {
        for tenant in &mut self.tenants {
            tenant.id = TenantId::parse(tenant.id.as_str())?;
        }
        for doc in &mut self.rulesets {
            doc.tenant_id = TenantId::parse(doc.tenant_id.as_str())?;
            for group in &mut doc.groups {
                group.tenant_id = doc.tenant_id.clone();
            }
        }
        Ok(())
    }
}

/// What [`seed_defaults`] wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Identity records written.
    pub tenants_created: Vec<TenantId>,
    /// Identity records left alone because one existed.
    pub tenants_skipped: Vec<TenantId>,
    /// Ruleset documents written.
    pub rulesets_created: Vec<TenantId>,
    /// Ruleset documents left alone because one existed.
    pub rulesets_skipped: Vec<TenantId>,
    /// Membership granted for newly written documents.
    pub reconcile: ReconcileReport,
}

impl SeedReport {
    /// Returns `true` if nothing was written.
    pub fn is_noop(&self) -> bool {
        self.tenants_created.is_empty() && self.rulesets_created.is_empty()
    }
}

/// Writes every record in `data` that does not exist yet.
pub async fn seed_defaults(
    tenants: &TenantManager,
    rulesets: &RulesetStore,
    reconciler: &MembershipReconciler,
    data: &SeedData,
) -> StorageResult<SeedReport> {
    let mut report = SeedReport::default();

    for tenant in &data.tenants {
        if tenants.create_identity_if_absent(tenant).await? {
            debug!(tenant_id = %tenant.id, "Seeded tenant");
            report.tenants_created.push(tenant.id.clone());
        } else {
            report.tenants_skipped.push(tenant.id.clone());
        }
    }

    for doc in &data.rulesets {
        if !rulesets.create_if_absent(doc).await? {
            report.rulesets_skipped.push(doc.tenant_id.clone());
            continue;
        }
        debug!(tenant_id = %doc.tenant_id, groups = doc.groups.len(), "Seeded ruleset document");
        report.rulesets_created.push(doc.tenant_id.clone());

        let members = doc.all_members();
        if !members.is_empty() {
            let granted = reconciler
                .apply(&doc.tenant_id, &MembershipDelta::grant(&members), None)
                .await?;
            report.reconcile.merge(granted);
        }
    }

    info!(
        tenants = report.tenants_created.len(),
        rulesets = report.rulesets_created.len(),
        "Seeding finished"
    );
    Ok(report)
}
