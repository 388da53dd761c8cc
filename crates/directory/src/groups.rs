//! Group management.
//!
//! Groups are embedded in the tenant's ruleset document, so every operation
//! is a read-modify-write of the whole document. Operations that change who
//! is a member (replace members, delete) hand the resulting delta to the
//! [`MembershipReconciler`] after the document write.

use tracing::{debug, info};

use crate::error::{ResourceKind, StorageError, StorageResult};
use crate::reconciler::{MembershipDelta, MembershipReconciler, ReconcileReport};
use crate::ruleset::RulesetStore;
use crate::tenant::TenantId;
use crate::types::{AccessControl, CreateGroupRequest, Group, ReplaceMembersRequest, UpdateGroupRequest};

/// Result of replacing a group's members.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipChange {
    /// The group as stored after the write.
    pub group: Group,
    /// The set difference that was reconciled.
    pub delta: MembershipDelta,
    /// What the reconciler did.
    pub report: ReconcileReport,
}

/// Result of deleting a group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDeletion {
    /// The removed group, with its member list at deletion time.
    pub group: Group,
    /// Access controls that referenced the group and were removed with it.
    pub access_controls: Vec<AccessControl>,
    /// What the reconciler did for the former members.
    pub report: ReconcileReport,
}

/// CRUD over a tenant's groups.
#[derive(Debug, Clone)]
pub struct GroupManager {
    rulesets: RulesetStore,
    reconciler: MembershipReconciler,
}

impl GroupManager {
    /// Creates a manager.
    pub fn new(rulesets: RulesetStore, reconciler: MembershipReconciler) -> Self {
        Self {
            rulesets,
            reconciler,
        }
    }

    /// Lists a tenant's groups in stored order.
    pub async fn list(&self, tenant_id: &TenantId) -> StorageResult<Vec<Group>> {
        Ok(self.rulesets.read(tenant_id).await?.groups)
    }

    /// Reads one group.
    pub async fn get(&self, tenant_id: &TenantId, group_id: &str) -> StorageResult<Group> {
        let group_id = group_id.trim();
        self.rulesets
            .read(tenant_id)
            .await?
            .group(group_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(ResourceKind::Group, group_id))
    }

    /// Creates an empty group.
    ///
    /// If the tenant has no ruleset document yet, an empty one is started.
    ///
    /// # Errors
    ///
    /// * `ValidationError::MissingRequiredField` - blank id
    /// * `ResourceError::AlreadyExists` - a group with this id exists
    /// * `DocumentError::Corrupted` - the stored document does not parse
    pub async fn create(
        &self,
        tenant_id: &TenantId,
        request: &CreateGroupRequest,
    ) -> StorageResult<Group> {
        let id = request.id.trim();
        if id.is_empty() {
            return Err(StorageError::missing_field("id"));
        }

        let mut loaded = self.rulesets.load_or_init(tenant_id).await?;
        if loaded.document.has_group(id) {
            return Err(StorageError::already_exists(ResourceKind::Group, id));
        }

        let name = match request.name.trim() {
            "" => id,
            name => name,
        };
        let group = Group::new(tenant_id.clone(), id, name, request.description.clone());
        loaded.document.groups.push(group.clone());
        self.rulesets.save(&mut loaded).await?;

        info!(tenant_id = %tenant_id, group_id = %id, "Created group");
        Ok(group)
    }

    /// Updates a group's name and description.
    ///
    /// The name only changes when a non-blank value is given; the
    /// description is always overwritten, and cleared when absent.
    pub async fn update(
        &self,
        tenant_id: &TenantId,
        group_id: &str,
        request: &UpdateGroupRequest,
    ) -> StorageResult<Group> {
        let group_id = group_id.trim();
        let mut loaded = self.rulesets.load(tenant_id).await?;
        let group = loaded
            .document
            .group_mut(group_id)
            .ok_or_else(|| StorageError::not_found(ResourceKind::Group, group_id))?;

        if let Some(name) = request.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            group.name = name.to_string();
        }
        group.description = request.description.clone().unwrap_or_default();
        let updated = group.clone();

        self.rulesets.save(&mut loaded).await?;
        debug!(tenant_id = %tenant_id, group_id = %group_id, "Updated group");
        Ok(updated)
    }

    /// Replaces a group's member list and reconciles the user directory.
    ///
    /// The list is stored exactly as given, duplicates and order included;
    /// the reconciled delta is computed on sets.
    pub async fn replace_members(
        &self,
        tenant_id: &TenantId,
        group_id: &str,
        request: &ReplaceMembersRequest,
    ) -> StorageResult<MembershipChange> {
        let group_id = group_id.trim();
        let mut loaded = self.rulesets.load(tenant_id).await?;
        let group = loaded
            .document
            .group_mut(group_id)
            .ok_or_else(|| StorageError::not_found(ResourceKind::Group, group_id))?;

        let delta = MembershipDelta::between(&group.members, &request.members);
        group.members = request.members.clone();
        let group = group.clone();
        self.rulesets.save(&mut loaded).await?;

        debug!(
            tenant_id = %tenant_id,
            group_id = %group_id,
            added = delta.added.len(),
            removed = delta.removed.len(),
            "Replaced group members"
        );

        let report = self
            .reconciler
            .apply(tenant_id, &delta, Some(group_id))
            .await?;
        Ok(MembershipChange {
            group,
            delta,
            report,
        })
    }

    /// Deletes a group along with every access control that references it,
    /// then reconciles its former members.
    pub async fn delete(&self, tenant_id: &TenantId, group_id: &str) -> StorageResult<GroupDeletion> {
        let group_id = group_id.trim();
        let mut loaded = self.rulesets.load(tenant_id).await?;
        let doc = &mut loaded.document;
        let position = doc
            .groups
            .iter()
            .position(|g| g.id == group_id)
            .ok_or_else(|| StorageError::not_found(ResourceKind::Group, group_id))?;

        let group = doc.groups.remove(position);
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut doc.access_controls)
            .into_iter()
            .partition(|ac| ac.group_id.as_deref() == Some(group_id));
        doc.access_controls = kept;
        self.rulesets.save(&mut loaded).await?;

        info!(
            tenant_id = %tenant_id,
            group_id = %group_id,
            access_controls = removed.len(),
            "Deleted group"
        );

        let report = self
            .reconciler
            .apply(tenant_id, &MembershipDelta::revoke(&group.members), None)
            .await?;
        Ok(GroupDeletion {
            group,
            access_controls: removed,
            report,
        })
    }
}
