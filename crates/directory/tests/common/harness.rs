//! A [`Directory`] over in-memory stores, plus helpers for common setup.

use std::sync::Arc;

use acl_directory::backends::memory::{MemoryDocumentStore, MemoryUserDirectory};
use acl_directory::core::UserDirectory;
use acl_directory::groups::MembershipChange;
use acl_directory::tenant::TenantId;
use acl_directory::types::{CreateGroupRequest, CreateTenantRequest, ReplaceMembersRequest};
use acl_directory::{Directory, DirectoryConfig};

use super::fixtures::user_fields;

/// A directory whose backing stores stay reachable for inspection.
pub struct TestContext {
    pub directory: Directory,
    pub documents: Arc<MemoryDocumentStore>,
    pub users: Arc<MemoryUserDirectory>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(DirectoryConfig::default())
    }

    pub fn with_config(config: DirectoryConfig) -> Self {
        let documents = Arc::new(MemoryDocumentStore::new());
        let users = Arc::new(MemoryUserDirectory::new());
        let directory = Directory::new(documents.clone(), users.clone(), config);
        Self {
            directory,
            documents,
            users,
        }
    }

    /// Registers users with empty tenant lists.
    pub fn add_users(&self, emails: &[&str]) {
        for email in emails {
            self.users.insert_user(*email, user_fields(email, &[]));
        }
    }

    pub async fn create_tenant(&self, id: &str) -> TenantId {
        let tenant_id = TenantId::parse(id).unwrap();
        self.directory
            .tenants()
            .create(&CreateTenantRequest::new(tenant_id.clone(), id.to_uppercase()))
            .await
            .unwrap();
        tenant_id
    }

    pub async fn create_group(&self, tenant_id: &TenantId, group_id: &str) {
        self.directory
            .groups()
            .create(tenant_id, &CreateGroupRequest::new(group_id))
            .await
            .unwrap();
    }

    pub async fn set_members(
        &self,
        tenant_id: &TenantId,
        group_id: &str,
        members: &[&str],
    ) -> MembershipChange {
        self.directory
            .groups()
            .replace_members(
                tenant_id,
                group_id,
                &ReplaceMembersRequest::new(members.iter().copied()),
            )
            .await
            .unwrap()
    }

    /// The tenant list currently stored for `email`.
    pub async fn user_tenants(&self, email: &str) -> Vec<String> {
        self.users
            .get_user_record(email)
            .await
            .unwrap()
            .map(|user| user.tenants())
            .unwrap_or_default()
    }

    /// Builds tenant `acme` with groups `eng` = [alice] and
    /// `ops` = [alice, bob], with both users registered.
    pub async fn acme_scenario(&self) -> TenantId {
        use super::fixtures::{ALICE, BOB};

        self.add_users(&[ALICE, BOB]);
        let acme = self.create_tenant("acme").await;
        self.create_group(&acme, "eng").await;
        self.create_group(&acme, "ops").await;
        self.set_members(&acme, "eng", &[ALICE]).await;
        self.set_members(&acme, "ops", &[ALICE, BOB]).await;
        acme
    }
}
