//! Tenant identity records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;

/// A tenant's identity record.
///
/// Stored as a hash with the fields `id`, `name` and `description`; an empty
/// `description` field reads back as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Primary key, lowercase.
    pub id: TenantId,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

impl Tenant {
    /// Creates a tenant record.
    pub fn new(id: TenantId, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description,
        }
    }

    /// Returns the hash fields this record is stored as.
    pub fn to_fields(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("id".to_string(), self.id.as_str().to_string()),
            ("name".to_string(), self.name.clone()),
            (
                "description".to_string(),
                self.description.clone().unwrap_or_default(),
            ),
        ])
    }

    /// Rebuilds a record from stored hash fields.
    ///
    /// `fallback_id` is used when the hash has no usable `id` field, which
    /// happens for records written by hand.
    pub fn from_fields(fallback_id: &TenantId, fields: &BTreeMap<String, String>) -> Self {
        let id = fields
            .get("id")
            .filter(|id| !id.trim().is_empty())
            .map(TenantId::new)
            .unwrap_or_else(|| fallback_id.clone());
        Self {
            id,
            name: fields.get("name").cloned().unwrap_or_default(),
            description: fields.get("description").filter(|d| !d.is_empty()).cloned(),
        }
    }
}
