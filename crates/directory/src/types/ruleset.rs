//! The per-tenant ruleset document and its embedded records.
//!
//! A [`RulesetDocument`] is the aggregate root for one tenant: it owns the
//! tenant's [`Group`]s and [`AccessControl`] entries and is always read and
//! written as a whole. Its JSON shape is the at-rest format:
//!
//! ```json
//! {
//!   "tenant_id": "acme",
//!   "description": "",
//!   "groups": [
//!     {"id": "eng", "name": "Engineering", "description": "",
//!      "members": ["alice@acme.io"], "tenant_id": "acme"}
//!   ],
//!   "access_controls": [
//!     {"ruleset_id": "rs-1", "group_id": "eng", "type": "tool_validation",
//!      "target_agent": "item-agent", "tool_name": "search", "rules": {},
//!      "enabled": true, "description": "", "name": "rs-1",
//!      "created_at": "2026-01-01T00:00:00Z", "updated_at": "2026-01-01T00:00:00Z"}
//!   ],
//!   "updated_at": "2026-01-01T00:00:00Z"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::normalizer::as_bool;
use crate::tenant::TenantId;

/// The access-control type used when neither the payload nor an existing
/// record names one.
pub const DEFAULT_ACCESS_CONTROL_TYPE: &str = "tool_validation";

/// One tenant's groups and access-control rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesetDocument {
    /// The owning tenant.
    pub tenant_id: TenantId,

    /// Free-form description.
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    /// Member groups. Group ids are unique within the document.
    #[serde(default, deserialize_with = "null_as_default")]
    pub groups: Vec<Group>,

    /// Access-control entries. Ruleset ids are unique within the document.
    #[serde(default, deserialize_with = "null_as_default")]
    pub access_controls: Vec<AccessControl>,

    /// Refreshed on every mutation.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    /// Fields this crate does not interpret, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RulesetDocument {
    /// Creates an empty document for a tenant.
    pub fn empty(tenant_id: TenantId, description: impl Into<String>) -> Self {
        Self {
            tenant_id,
            description: description.into(),
            groups: Vec::new(),
            access_controls: Vec::new(),
            updated_at: Utc::now(),
            extra: Map::new(),
        }
    }

    /// Refreshes `updated_at`.
    pub fn touch(&mut self) -> DateTime<Utc> {
        self.updated_at = Utc::now();
        self.updated_at
    }

    /// Finds a group by id (case-sensitive).
    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    /// Finds a group by id for mutation.
    pub fn group_mut(&mut self, group_id: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == group_id)
    }

    /// Returns `true` if a group with this id exists.
    pub fn has_group(&self, group_id: &str) -> bool {
        self.group(group_id).is_some()
    }

    /// Returns the position of an access control by ruleset id.
    pub fn access_control_index(&self, ruleset_id: &str) -> Option<usize> {
        self.access_controls
            .iter()
            .position(|ac| ac.ruleset_id.as_deref() == Some(ruleset_id))
    }

    /// Finds an access control by ruleset id.
    pub fn access_control(&self, ruleset_id: &str) -> Option<&AccessControl> {
        self.access_control_index(ruleset_id)
            .map(|idx| &self.access_controls[idx])
    }

    /// Returns `true` if `email` is a member of any group, ignoring the
    /// group named by `exclude_group_id`.
    pub fn has_member(&self, email: &str, exclude_group_id: Option<&str>) -> bool {
        self.groups
            .iter()
            .filter(|g| Some(g.id.as_str()) != exclude_group_id)
            .any(|g| g.has_member(email))
    }

    /// Returns every distinct member across all groups, in first-seen order.
    pub fn all_members(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.groups
            .iter()
            .flat_map(|g| g.members.iter())
            .filter(|m| seen.insert(m.as_str()))
            .cloned()
            .collect()
    }
}

/// A named set of users within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Identifier, unique within the tenant.
    pub id: String,

    /// Display name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    /// Free-form description.
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    /// Member emails, stored in the order they were supplied.
    #[serde(default, deserialize_with = "null_as_default")]
    pub members: Vec<String>,

    /// The owning tenant.
    #[serde(default)]
    pub tenant_id: TenantId,

    /// Fields this crate does not interpret, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Group {
    /// Creates a group with no members.
    pub fn new(
        tenant_id: TenantId,
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            members: Vec::new(),
            tenant_id,
            extra: Map::new(),
        }
    }

    /// Returns `true` if `email` is listed as a member.
    pub fn has_member(&self, email: &str) -> bool {
        self.members.iter().any(|m| m == email)
    }
}

/// A policy record scoping a tool/agent validation rule to one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessControl {
    /// Identifier, unique within the tenant.
    pub ruleset_id: Option<String>,

    /// The group this rule applies to.
    pub group_id: Option<String>,

    /// Rule type, `tool_validation` unless set.
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,

    /// Agent the rule targets (payload alias: `agent_id`).
    #[serde(default)]
    pub target_agent: Option<String>,

    /// Tool the rule targets (payload alias: `tool`).
    #[serde(default)]
    pub tool_name: Option<String>,

    /// Opaque rule body.
    #[serde(default = "empty_rules", deserialize_with = "rules_or_empty")]
    pub rules: Value,

    /// Whether the rule is active.
    #[serde(default = "default_enabled", deserialize_with = "lenient_bool")]
    pub enabled: bool,

    /// Free-form description.
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    /// Display name, the ruleset id unless set.
    #[serde(default)]
    pub name: Option<String>,

    /// Set once on creation.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Refreshed on every update.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Fields this crate does not interpret, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_type() -> String {
    DEFAULT_ACCESS_CONTROL_TYPE.to_string()
}

pub(crate) fn empty_rules() -> Value {
    Value::Object(Map::new())
}

fn default_enabled() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn rules_or_empty<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(if value.is_null() { empty_rules() } else { value })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_bool(Some(&value), true))
}
