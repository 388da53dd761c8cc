//! Out-of-band membership repair.
//!
//! Ruleset writes and user directory writes are not transactional, so a
//! crash or an outage between them leaves user tenant lists out of date.
//! [`RepairSweep`] re-derives the expected user to tenant mapping from every
//! ruleset document and rewrites the user records that disagree with it.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, info, warn};

use crate::core::DynUserDirectory;
use crate::error::{ErrorKind, ResourceKind, StorageResult};
use crate::ruleset::RulesetStore;
use crate::tenant::TenantId;
use crate::types::encode_tenant_list;

/// The change made (or proposed) to one user's tenant list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRepair {
    /// The user.
    pub email: String,
    /// Tenants the user is a member of but did not list.
    pub added: Vec<String>,
    /// Tenants the user listed without being a member.
    pub removed: Vec<String>,
}

/// Outcome of a [`RepairSweep`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Ruleset documents read.
    pub tenants_scanned: usize,
    /// Tenants whose document failed to parse. Their entries in user lists
    /// are left untouched.
    pub corrupted: Vec<TenantId>,
    /// User records compared.
    pub users_checked: usize,
    /// Users whose tenant list differs from their group memberships.
    pub repairs: Vec<UserRepair>,
    /// Group members with no user record.
    pub unknown_members: Vec<String>,
    /// Users whose record could not be rewritten.
    pub failed: Vec<String>,
    /// Whether `repairs` were written.
    pub applied: bool,
}

impl RepairReport {
    /// Returns `true` if every user list already matched.
    pub fn is_consistent(&self) -> bool {
        self.repairs.is_empty()
    }
}

/// Re-derives user tenant lists from the ruleset documents.
#[derive(Clone)]
pub struct RepairSweep {
    rulesets: RulesetStore,
    users: DynUserDirectory,
    tenants_field: String,
}

impl std::fmt::Debug for RepairSweep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepairSweep")
            .field("users", &self.users.backend_name())
            .field("tenants_field", &self.tenants_field)
            .finish_non_exhaustive()
    }
}

impl RepairSweep {
    /// Creates a sweep.
    pub fn new(rulesets: RulesetStore, users: DynUserDirectory, tenants_field: impl Into<String>) -> Self {
        Self {
            rulesets,
            users,
            tenants_field: tenants_field.into(),
        }
    }

    /// Compares every user's tenant list with group membership and, unless
    /// `dry_run` is set, rewrites the lists that differ.
    ///
    /// A tenant is removed from a list whenever the user is in none of its
    /// groups, including tenants that no longer exist at all. Tenants whose
    /// document is corrupted are never added or removed.
    pub async fn run(&self, dry_run: bool) -> StorageResult<RepairReport> {
        let mut report = RepairReport {
            applied: !dry_run,
            ..Default::default()
        };

        let mut expected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut corrupted: HashSet<String> = HashSet::new();
        for tenant_id in self.rulesets.tenant_ids().await? {
            match self.rulesets.read(&tenant_id).await {
                Ok(doc) => {
                    report.tenants_scanned += 1;
                    for email in doc.all_members() {
                        expected
                            .entry(email)
                            .or_default()
                            .insert(tenant_id.to_string());
                    }
                }
                Err(e) if e.is_not_found(ResourceKind::Ruleset) => {}
                Err(e) if e.kind() == ErrorKind::Corrupted => {
                    warn!(tenant_id = %tenant_id, error = %e, "Skipping corrupted ruleset document");
                    corrupted.insert(tenant_id.to_string());
                    report.corrupted.push(tenant_id);
                }
                Err(e) => return Err(e),
            }
        }

        let users = self.users.list_users().await?;
        let listed: HashSet<&str> = users.iter().map(String::as_str).collect();
        report.unknown_members = expected
            .keys()
            .filter(|email| !listed.contains(email.as_str()))
            .cloned()
            .collect();

        let none = BTreeSet::new();
        for email in &users {
            let Some(user) = self.users.get_user_record(email).await? else {
                continue;
            };
            report.users_checked += 1;

            let current = user.tenants_in(&self.tenants_field);
            let wanted = expected.get(email).unwrap_or(&none);
            let removed: Vec<String> = current
                .iter()
                .filter(|t| !wanted.contains(*t) && !corrupted.contains(*t))
                .cloned()
                .collect();
            let added: Vec<String> = wanted
                .iter()
                .filter(|t| !current.contains(*t))
                .cloned()
                .collect();
            if added.is_empty() && removed.is_empty() {
                continue;
            }

            warn!(
                email = %email,
                added = ?added,
                removed = ?removed,
                dry_run,
                "Tenant list out of sync with group membership"
            );

            if !dry_run {
                let mut repaired: Vec<String> = current
                    .iter()
                    .filter(|t| !removed.contains(*t))
                    .cloned()
                    .collect();
                repaired.extend(added.iter().cloned());
                match self
                    .users
                    .set_user_field(email, &self.tenants_field, encode_tenant_list(&repaired))
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(email = %email, "User record disappeared, skipping repair");
                        continue;
                    }
                    Err(e) => {
                        warn!(email = %email, error = %e, "Failed to repair tenant list");
                        report.failed.push(email.clone());
                        continue;
                    }
                }
            }

            report.repairs.push(UserRepair {
                email: email.clone(),
                added,
                removed,
            });
        }

        info!(
            tenants = report.tenants_scanned,
            users = report.users_checked,
            repairs = report.repairs.len(),
            dry_run,
            "Repair sweep finished"
        );
        Ok(report)
    }
}
