//! Tenant lifecycle.
//!
//! A tenant is an identity record (`tenant:{id}`, a hash) paired with a
//! ruleset document (`tenant:{id}:rulesets`, a string). Both are created and
//! deleted together, but either may be found missing: creation seeds a
//! document only if none exists, and deletion succeeds as long as one of the
//! two is present.

use tracing::{info, warn};

use crate::core::keys::{TENANT_PREFIX, tenant_id_from_key, tenant_key};
use crate::core::{DynDocumentStore, KeyType};
use crate::error::{ResourceKind, StorageError, StorageResult};
use crate::reconciler::{MembershipDelta, MembershipReconciler, ReconcileReport};
use crate::ruleset::RulesetStore;
use crate::tenant::TenantId;
use crate::types::{CreateTenantRequest, RulesetDocument, Tenant};

/// Result of deleting a tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantDeletion {
    /// The deleted tenant.
    pub tenant_id: TenantId,
    /// Whether the identity record existed.
    pub identity_existed: bool,
    /// Whether the ruleset document existed.
    pub ruleset_existed: bool,
    /// What the reconciler did for the tenant's former members.
    pub report: ReconcileReport,
}

/// Creates, deletes and lists tenants.
#[derive(Clone)]
pub struct TenantManager {
    documents: DynDocumentStore,
    rulesets: RulesetStore,
    reconciler: MembershipReconciler,
}

impl std::fmt::Debug for TenantManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantManager")
            .field("documents", &self.documents.backend_name())
            .field("rulesets", &self.rulesets)
            .finish_non_exhaustive()
    }
}

impl TenantManager {
    /// Creates a manager.
    pub fn new(
        documents: DynDocumentStore,
        rulesets: RulesetStore,
        reconciler: MembershipReconciler,
    ) -> Self {
        Self {
            documents,
            rulesets,
            reconciler,
        }
    }

    /// Lists all tenants, sorted by id.
    ///
    /// Only hash-typed keys count as identity records, which keeps ruleset
    /// documents out even though they share the prefix.
    pub async fn list(&self) -> StorageResult<Vec<Tenant>> {
        let mut tenants = Vec::new();
        for key in self.documents.scan(TENANT_PREFIX).await? {
            let Some(fallback_id) = tenant_id_from_key(&key) else {
                continue;
            };
            if self.documents.key_type(&key).await? != KeyType::Hash {
                continue;
            }
            if let Some(fields) = self.documents.get_hash(&key).await? {
                tenants.push(Tenant::from_fields(&fallback_id, &fields));
            }
        }
        tenants.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tenants)
    }

    /// Reads a tenant's identity record.
    pub async fn get(&self, tenant_id: &TenantId) -> StorageResult<Tenant> {
        self.documents
            .get_hash(&tenant_key(tenant_id))
            .await?
            .map(|fields| Tenant::from_fields(tenant_id, &fields))
            .ok_or_else(|| StorageError::not_found(ResourceKind::Tenant, tenant_id.as_str()))
    }

    /// Reads a tenant's ruleset document.
    pub async fn get_rulesets(&self, tenant_id: &TenantId) -> StorageResult<RulesetDocument> {
        self.rulesets.read(tenant_id).await
    }

    /// Creates a tenant and, if it has none yet, an empty ruleset document.
    ///
    /// # Errors
    ///
    /// * `ResourceError::AlreadyExists` - the identity record exists
    pub async fn create(&self, request: &CreateTenantRequest) -> StorageResult<Tenant> {
        let tenant = request.to_tenant();
        let key = tenant_key(&tenant.id);
        if self.documents.exists(&key).await? {
            return Err(StorageError::already_exists(
                ResourceKind::Tenant,
                tenant.id.as_str(),
            ));
        }
        self.documents.set_hash(&key, &tenant.to_fields()).await?;

        let document = RulesetDocument::empty(
            tenant.id.clone(),
            tenant.description.clone().unwrap_or_default(),
        );
        let seeded = self.rulesets.create_if_absent(&document).await?;

        info!(tenant_id = %tenant.id, seeded_rulesets = seeded, "Created tenant");
        Ok(tenant)
    }

    /// Writes the identity record only if none exists. Returns whether it
    /// was written.
    pub(crate) async fn create_identity_if_absent(&self, tenant: &Tenant) -> StorageResult<bool> {
        let key = tenant_key(&tenant.id);
        if self.documents.exists(&key).await? {
            return Ok(false);
        }
        self.documents.set_hash(&key, &tenant.to_fields()).await?;
        Ok(true)
    }

    /// Deletes a tenant's identity record and ruleset document, then removes
    /// the tenant from every former member's tenant list.
    ///
    /// Retrying a partially applied delete is safe. A corrupted document
    /// is still deleted, but its members cannot be reconciled; that is
    /// logged and left to the repair sweep.
    ///
    /// # Errors
    ///
    /// * `ResourceError::NotFound` - neither key exists
    pub async fn delete(&self, tenant_id: &TenantId) -> StorageResult<TenantDeletion> {
        let identity_key = tenant_key(tenant_id);
        let identity_existed = self.documents.exists(&identity_key).await?;
        let ruleset_existed = self.rulesets.exists(tenant_id).await?;
        if !identity_existed && !ruleset_existed {
            return Err(StorageError::not_found(ResourceKind::Tenant, tenant_id.as_str()));
        }

        let members = match self.rulesets.read(tenant_id).await {
            Ok(doc) => doc.all_members(),
            Err(e) if e.is_not_found(ResourceKind::Ruleset) => Vec::new(),
            Err(e) => {
                warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Ruleset document unreadable, members will not be reconciled"
                );
                Vec::new()
            }
        };

        self.documents.delete(&identity_key).await?;
        self.rulesets.delete(tenant_id).await?;
        info!(tenant_id = %tenant_id, members = members.len(), "Deleted tenant");

        let report = self
            .reconciler
            .apply(tenant_id, &MembershipDelta::revoke(&members), None)
            .await?;
        Ok(TenantDeletion {
            tenant_id: tenant_id.clone(),
            identity_existed,
            ruleset_existed,
            report,
        })
    }
}
