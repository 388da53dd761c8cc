//! The directory facade.

use std::sync::Arc;

use crate::access_controls::AccessControlManager;
use crate::backends::memory::{MemoryDocumentStore, MemoryUserDirectory};
use crate::config::DirectoryConfig;
use crate::core::{DynDocumentStore, DynUserDirectory};
use crate::error::StorageResult;
use crate::groups::GroupManager;
use crate::reconciler::MembershipReconciler;
use crate::repair::RepairSweep;
use crate::ruleset::RulesetStore;
use crate::seed::{SeedData, SeedReport, seed_defaults};
use crate::tenants::TenantManager;

/// Owns the store handles and configuration, and hands out managers.
///
/// Managers are cheap to create; each holds clones of the shared handles.
///
/// # Example
///
/// ```
/// use acl_directory::Directory;
/// use acl_directory::tenant::TenantId;
/// use acl_directory::types::{CreateGroupRequest, CreateTenantRequest};
///
/// # tokio_test::block_on(async {
/// let directory = Directory::in_memory();
/// let acme = TenantId::parse("Acme")?;
/// directory
///     .tenants()
///     .create(&CreateTenantRequest::new(acme.clone(), "Acme Corp"))
///     .await?;
/// let group = directory
///     .groups()
///     .create(&acme, &CreateGroupRequest::new("eng"))
///     .await?;
/// assert_eq!(group.name, "eng");
/// # Ok::<(), acl_directory::StorageError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct Directory {
    documents: DynDocumentStore,
    users: DynUserDirectory,
    config: DirectoryConfig,
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("documents", &self.documents.backend_name())
            .field("users", &self.users.backend_name())
            .field("config", &self.config)
            .finish()
    }
}

impl Directory {
    /// Creates a directory over the given stores.
    pub fn new(documents: DynDocumentStore, users: DynUserDirectory, config: DirectoryConfig) -> Self {
        Self {
            documents,
            users,
            config,
        }
    }

    /// Creates a directory over fresh in-memory stores with the default
    /// configuration.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryUserDirectory::new()),
            DirectoryConfig::default(),
        )
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Returns the document store handle.
    pub fn documents(&self) -> &DynDocumentStore {
        &self.documents
    }

    /// Returns the user directory handle.
    pub fn users(&self) -> &DynUserDirectory {
        &self.users
    }

    /// Ruleset document adapter.
    pub fn rulesets(&self) -> RulesetStore {
        RulesetStore::new(self.documents.clone(), self.config.concurrency)
    }

    /// Membership reconciler.
    pub fn reconciler(&self) -> MembershipReconciler {
        MembershipReconciler::new(
            self.rulesets(),
            self.users.clone(),
            self.config.user_tenants_field.clone(),
            self.config.reconcile_failures,
        )
    }

    /// Group manager.
    pub fn groups(&self) -> GroupManager {
        GroupManager::new(self.rulesets(), self.reconciler())
    }

    /// Access-control manager.
    pub fn access_controls(&self) -> AccessControlManager {
        AccessControlManager::new(
            self.rulesets(),
            self.config.default_access_control_type.clone(),
        )
    }

    /// Tenant lifecycle manager.
    pub fn tenants(&self) -> TenantManager {
        TenantManager::new(self.documents.clone(), self.rulesets(), self.reconciler())
    }

    /// Membership repair sweep.
    pub fn repair(&self) -> RepairSweep {
        RepairSweep::new(
            self.rulesets(),
            self.users.clone(),
            self.config.user_tenants_field.clone(),
        )
    }

    /// Writes every record in `data` that does not exist yet.
    pub async fn seed(&self, data: &SeedData) -> StorageResult<SeedReport> {
        seed_defaults(&self.tenants(), &self.rulesets(), &self.reconciler(), data).await
    }
}
