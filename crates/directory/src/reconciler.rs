//! Membership reconciliation.
//!
//! Group membership lives in ruleset documents; each user record carries a
//! denormalized copy of it as a list of tenant ids. The two are written
//! without a shared transaction, so the [`MembershipReconciler`] runs after
//! every structural membership change (member replace, group delete, tenant
//! delete) and brings the affected user records back in line:
//!
//! ```text
//! tenant T in user.tenants  <=>  user is a member of some group of T
//! ```
//!
//! Additions are applied unconditionally. A removal is only applied after
//! re-reading the tenant's current document and finding the user in no
//! remaining group, so a user moved from one group to another keeps the
//! tenant. Every step is a set-membership check before a write, which makes
//! applying the same delta twice a no-op.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::config::ReconcileFailurePolicy;
use crate::core::DynUserDirectory;
use crate::error::{ReconcileError, ResourceKind, StorageResult};
use crate::ruleset::RulesetStore;
use crate::tenant::TenantId;
use crate::types::{RulesetDocument, encode_tenant_list};

/// Emails whose membership in one tenant changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDelta {
    /// Emails that gained membership.
    pub added: Vec<String>,
    /// Emails that lost membership in one group.
    pub removed: Vec<String>,
}

impl MembershipDelta {
    /// Computes `new - old` and `old - new` as sets, keeping first-seen order.
    ///
    /// # Examples
    ///
    /// ```
    /// use acl_directory::reconciler::MembershipDelta;
    ///
    /// let old = vec!["a@x.io".to_string(), "b@x.io".to_string()];
    /// let new = vec!["b@x.io".to_string(), "c@x.io".to_string(), "c@x.io".to_string()];
    /// let delta = MembershipDelta::between(&old, &new);
    /// assert_eq!(delta.added, vec!["c@x.io"]);
    /// assert_eq!(delta.removed, vec!["a@x.io"]);
    /// ```
    pub fn between(old: &[String], new: &[String]) -> Self {
        let old_set: HashSet<&str> = old.iter().map(String::as_str).collect();
        let new_set: HashSet<&str> = new.iter().map(String::as_str).collect();
        Self {
            added: distinct(new.iter().filter(|m| !old_set.contains(m.as_str()))),
            removed: distinct(old.iter().filter(|m| !new_set.contains(m.as_str()))),
        }
    }

    /// A delta granting membership to every email.
    pub fn grant<'a>(members: impl IntoIterator<Item = &'a String>) -> Self {
        Self {
            added: distinct(members.into_iter()),
            removed: Vec::new(),
        }
    }

    /// A delta withdrawing membership from every email.
    pub fn revoke<'a>(members: impl IntoIterator<Item = &'a String>) -> Self {
        Self {
            added: Vec::new(),
            removed: distinct(members.into_iter()),
        }
    }

    /// Returns `true` if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

fn distinct<'a>(members: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    members
        .filter(|m| seen.insert(m.as_str()))
        .cloned()
        .collect()
}

/// What a reconciliation pass did, per email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Tenant appended to the user's list.
    pub added: Vec<String>,
    /// Tenant removed from the user's list.
    pub removed: Vec<String>,
    /// Removal skipped because the user is still in another group.
    pub retained: Vec<String>,
    /// Already consistent, nothing written.
    pub unchanged: Vec<String>,
    /// No user record exists for the email.
    pub skipped_unknown: Vec<String>,
    /// The user directory call failed.
    pub failed: Vec<String>,
}

impl ReconcileReport {
    /// Number of user records written.
    pub fn mutations(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    /// Returns `true` if no directory call failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn merge(&mut self, other: ReconcileReport) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
        self.retained.extend(other.retained);
        self.unchanged.extend(other.unchanged);
        self.skipped_unknown.extend(other.skipped_unknown);
        self.failed.extend(other.failed);
    }
}

enum Outcome {
    Changed,
    Unchanged,
    Unknown,
}

/// Applies membership deltas to the user directory.
#[derive(Clone)]
pub struct MembershipReconciler {
    rulesets: RulesetStore,
    users: DynUserDirectory,
    tenants_field: String,
    policy: ReconcileFailurePolicy,
}

impl std::fmt::Debug for MembershipReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipReconciler")
            .field("users", &self.users.backend_name())
            .field("tenants_field", &self.tenants_field)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl MembershipReconciler {
    /// Creates a reconciler.
    pub fn new(
        rulesets: RulesetStore,
        users: DynUserDirectory,
        tenants_field: impl Into<String>,
        policy: ReconcileFailurePolicy,
    ) -> Self {
        Self {
            rulesets,
            users,
            tenants_field: tenants_field.into(),
            policy,
        }
    }

    /// Brings user records in line with a membership change in `tenant_id`.
    ///
    /// Must run after the ruleset document write. For removals the current
    /// document is re-read once; a missing document counts as a tenant with
    /// no groups. `exclude_group` is left out of the "still a member
    /// elsewhere" check.
    ///
    /// Every email is attempted even if some fail. Failures are then either
    /// returned as [`ReconcileError::Incomplete`] or only logged, according
    /// to the configured [`ReconcileFailurePolicy`].
    pub async fn apply(
        &self,
        tenant_id: &TenantId,
        delta: &MembershipDelta,
        exclude_group: Option<&str>,
    ) -> StorageResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for email in &delta.added {
            match self.ensure_tenant(email, tenant_id).await {
                Ok(Outcome::Changed) => report.added.push(email.clone()),
                Ok(Outcome::Unchanged) => report.unchanged.push(email.clone()),
                Ok(Outcome::Unknown) => report.skipped_unknown.push(email.clone()),
                Err(e) => {
                    warn!(tenant_id = %tenant_id, email = %email, error = %e, "Failed to add tenant to user");
                    report.failed.push(email.clone());
                }
            }
        }

        if !delta.removed.is_empty() {
            let current = self.current_document(tenant_id).await?;
            report.merge(
                self.apply_removals(tenant_id, &delta.removed, current.as_ref(), exclude_group)
                    .await,
            );
        }

        self.finish(tenant_id, report)
    }

    async fn apply_removals(
        &self,
        tenant_id: &TenantId,
        removed: &[String],
        current: Option<&RulesetDocument>,
        exclude_group: Option<&str>,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for email in removed {
            if current.is_some_and(|doc| doc.has_member(email, exclude_group)) {
                debug!(tenant_id = %tenant_id, email = %email, "User still in another group, keeping tenant");
                report.retained.push(email.clone());
                continue;
            }
            match self.remove_tenant(email, tenant_id).await {
                Ok(Outcome::Changed) => report.removed.push(email.clone()),
                Ok(Outcome::Unchanged) => report.unchanged.push(email.clone()),
                Ok(Outcome::Unknown) => report.skipped_unknown.push(email.clone()),
                Err(e) => {
                    warn!(tenant_id = %tenant_id, email = %email, error = %e, "Failed to remove tenant from user");
                    report.failed.push(email.clone());
                }
            }
        }
        report
    }

    async fn current_document(&self, tenant_id: &TenantId) -> StorageResult<Option<RulesetDocument>> {
        match self.rulesets.read(tenant_id).await {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.is_not_found(ResourceKind::Ruleset) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn finish(&self, tenant_id: &TenantId, report: ReconcileReport) -> StorageResult<ReconcileReport> {
        if report.is_complete() {
            return Ok(report);
        }
        match self.policy {
            ReconcileFailurePolicy::Propagate => Err(ReconcileError::Incomplete {
                tenant_id: tenant_id.clone(),
                failed: report.failed,
            }
            .into()),
            ReconcileFailurePolicy::Defer => {
                warn!(
                    tenant_id = %tenant_id,
                    failed = report.failed.len(),
                    "Deferring failed membership updates to the repair sweep"
                );
                Ok(report)
            }
        }
    }

    /// Ensures `tenant_id` is in the user's tenant list.
    ///
    /// Users without a record are skipped; the directory only tracks users
    /// that already have an account.
    async fn ensure_tenant(&self, email: &str, tenant_id: &TenantId) -> StorageResult<Outcome> {
        let Some(user) = self.users.get_user_record(email).await? else {
            debug!(email = %email, "No user record, skipping");
            return Ok(Outcome::Unknown);
        };
        let mut tenants = user.tenants_in(&self.tenants_field);
        if tenants.iter().any(|t| t == tenant_id.as_str()) {
            return Ok(Outcome::Unchanged);
        }
        tenants.push(tenant_id.to_string());
        let written = self
            .users
            .set_user_field(email, &self.tenants_field, encode_tenant_list(&tenants))
            .await?;
        if !written {
            debug!(email = %email, "User record disappeared, skipping");
            return Ok(Outcome::Unknown);
        }
        debug!(tenant_id = %tenant_id, email = %email, "Added tenant to user");
        Ok(Outcome::Changed)
    }

    /// Removes every occurrence of `tenant_id` from the user's tenant list.
    async fn remove_tenant(&self, email: &str, tenant_id: &TenantId) -> StorageResult<Outcome> {
        let Some(user) = self.users.get_user_record(email).await? else {
            debug!(email = %email, "No user record, skipping");
            return Ok(Outcome::Unknown);
        };
        let tenants = user.tenants_in(&self.tenants_field);
        let kept: Vec<String> = tenants
            .iter()
            .filter(|t| t.as_str() != tenant_id.as_str())
            .cloned()
            .collect();
        if kept.len() == tenants.len() {
            return Ok(Outcome::Unchanged);
        }
        let written = self
            .users
            .set_user_field(email, &self.tenants_field, encode_tenant_list(&kept))
            .await?;
        if !written {
            debug!(email = %email, "User record disappeared, skipping");
            return Ok(Outcome::Unknown);
        }
        debug!(tenant_id = %tenant_id, email = %email, "Removed tenant from user");
        Ok(Outcome::Changed)
    }
}
