//! Access-control management.
//!
//! Access controls are embedded in the tenant's ruleset document next to the
//! groups they reference. Each operation re-reads the whole document,
//! validates the reference, merges through
//! [`normalize_access_control`] and writes the whole document back.

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{ResourceKind, StorageError, StorageResult};
use crate::normalizer::normalize_access_control;
use crate::ruleset::RulesetStore;
use crate::tenant::TenantId;
use crate::types::{AccessControl, AccessControlPayload, RulesetDocument};

/// CRUD over a tenant's access controls.
#[derive(Debug, Clone)]
pub struct AccessControlManager {
    rulesets: RulesetStore,
    default_type: String,
}

fn ensure_group(doc: &RulesetDocument, group_id: &str) -> StorageResult<()> {
    if doc.has_group(group_id) {
        Ok(())
    } else {
        Err(StorageError::not_found(ResourceKind::Group, group_id))
    }
}

impl AccessControlManager {
    /// Creates a manager. `default_type` fills in `type` when neither the
    /// payload nor an existing record sets one.
    pub fn new(rulesets: RulesetStore, default_type: impl Into<String>) -> Self {
        Self {
            rulesets,
            default_type: default_type.into(),
        }
    }

    /// Lists a tenant's access controls in stored order.
    pub async fn list(&self, tenant_id: &TenantId) -> StorageResult<Vec<AccessControl>> {
        Ok(self.rulesets.read(tenant_id).await?.access_controls)
    }

    /// Reads one access control.
    pub async fn get(&self, tenant_id: &TenantId, ruleset_id: &str) -> StorageResult<AccessControl> {
        let ruleset_id = ruleset_id.trim();
        self.rulesets
            .read(tenant_id)
            .await?
            .access_control(ruleset_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(ResourceKind::AccessControl, ruleset_id))
    }

    /// Adds an access control.
    ///
    /// The referenced group must exist, unless the tenant has no groups at
    /// all yet.
    ///
    /// # Errors
    ///
    /// * `ValidationError::MissingRequiredField` - blank `ruleset_id` or `group_id`
    /// * `ResourceError::NotFound` - no ruleset document, or unknown group
    /// * `ResourceError::AlreadyExists` - the ruleset id is taken
    pub async fn create(
        &self,
        tenant_id: &TenantId,
        payload: &AccessControlPayload,
    ) -> StorageResult<AccessControl> {
        let ruleset_id = payload
            .ruleset_id()
            .ok_or_else(|| StorageError::missing_field("ruleset_id"))?;
        let group_id = payload
            .group_id()
            .ok_or_else(|| StorageError::missing_field("group_id"))?;

        let mut loaded = self.rulesets.load(tenant_id).await?;
        let doc = &mut loaded.document;
        if !doc.groups.is_empty() {
            ensure_group(doc, group_id)?;
        }
        if doc.access_control(ruleset_id).is_some() {
            return Err(StorageError::already_exists(
                ResourceKind::AccessControl,
                ruleset_id,
            ));
        }

        let mut record = normalize_access_control(payload, None, &self.default_type);
        record.ruleset_id = Some(ruleset_id.to_string());
        record.group_id = Some(group_id.to_string());
        let now = Utc::now();
        record.created_at = Some(now);
        record.updated_at = Some(now);
        doc.access_controls.push(record.clone());
        self.rulesets.save(&mut loaded).await?;

        info!(tenant_id = %tenant_id, ruleset_id = %ruleset_id, group_id = %group_id, "Created access control");
        Ok(record)
    }

    /// Merges `payload` into an existing access control.
    ///
    /// The ruleset id cannot be changed. A non-blank `group_id` in the
    /// payload must name an existing group. The original `created_at` is
    /// kept, falling back to the previous `updated_at` for records written
    /// without one.
    pub async fn update(
        &self,
        tenant_id: &TenantId,
        ruleset_id: &str,
        payload: &AccessControlPayload,
    ) -> StorageResult<AccessControl> {
        let ruleset_id = ruleset_id.trim();
        let mut loaded = self.rulesets.load(tenant_id).await?;
        let doc = &mut loaded.document;
        let index = doc
            .access_control_index(ruleset_id)
            .ok_or_else(|| StorageError::not_found(ResourceKind::AccessControl, ruleset_id))?;
        if let Some(group_id) = payload.group_id() {
            ensure_group(doc, group_id)?;
        }

        let existing = &doc.access_controls[index];
        let mut record = normalize_access_control(payload, Some(existing), &self.default_type);
        record.ruleset_id = Some(ruleset_id.to_string());
        record.created_at = existing.created_at.or(existing.updated_at);
        record.updated_at = Some(Utc::now());
        doc.access_controls[index] = record.clone();
        self.rulesets.save(&mut loaded).await?;

        debug!(tenant_id = %tenant_id, ruleset_id = %ruleset_id, "Updated access control");
        Ok(record)
    }

    /// Removes an access control, returning it.
    pub async fn delete(&self, tenant_id: &TenantId, ruleset_id: &str) -> StorageResult<AccessControl> {
        let ruleset_id = ruleset_id.trim();
        let mut loaded = self.rulesets.load(tenant_id).await?;
        let index = loaded
            .document
            .access_control_index(ruleset_id)
            .ok_or_else(|| StorageError::not_found(ResourceKind::AccessControl, ruleset_id))?;
        let removed = loaded.document.access_controls.remove(index);
        self.rulesets.save(&mut loaded).await?;

        info!(tenant_id = %tenant_id, ruleset_id = %ruleset_id, "Deleted access control");
        Ok(removed)
    }
}
