//! Typed request payloads.
//!
//! Every manager operation takes one of these requests. Each has a
//! `from_value` constructor that performs the full validation pass over a
//! loosely-typed JSON payload and either yields the typed request or a
//! [`ValidationError`](crate::error::ValidationError).

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{StorageError, StorageResult};
use crate::tenant::TenantId;

use super::Tenant;

fn as_object<'a>(payload: &'a Value, what: &str) -> StorageResult<&'a Map<String, Value>> {
    payload
        .as_object()
        .ok_or_else(|| StorageError::invalid_field(what, "payload must be a JSON object"))
}

/// Reads an optional string field; `null` counts as absent.
fn optional_str(obj: &Map<String, Value>, field: &str) -> StorageResult<Option<String>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(StorageError::invalid_field(field, "expected a string")),
    }
}

/// Reads a string field that must be present and non-blank after trimming.
fn required_trimmed(obj: &Map<String, Value>, field: &str) -> StorageResult<String> {
    optional_str(obj, field)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StorageError::missing_field(field))
}

/// Create a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGroupRequest {
    /// Group id, trimmed and non-empty.
    pub id: String,
    /// Display name; defaults to the id.
    pub name: String,
    /// Description; defaults to empty.
    pub description: String,
}

impl CreateGroupRequest {
    /// Creates a request whose name defaults to the id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into().trim().to_string();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Validates a `{"id", "name"?, "description"?}` payload.
    pub fn from_value(payload: &Value) -> StorageResult<Self> {
        let obj = as_object(payload, "group")?;
        let id = required_trimmed(obj, "id")?;
        let name = optional_str(obj, "name")?
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.clone());
        let description = optional_str(obj, "description")?.unwrap_or_default();
        Ok(Self {
            id,
            name,
            description,
        })
    }
}

/// Update a group's name and description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateGroupRequest {
    /// New name; ignored when blank.
    pub name: Option<String>,
    /// New description; always written, absent clears it.
    pub description: Option<String>,
}

impl UpdateGroupRequest {
    /// Validates a `{"name"?, "description"?}` payload.
    pub fn from_value(payload: &Value) -> StorageResult<Self> {
        let obj = as_object(payload, "group")?;
        Ok(Self {
            name: optional_str(obj, "name")?,
            description: optional_str(obj, "description")?,
        })
    }
}

/// Replace a group's member list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceMembersRequest {
    /// The complete new member list, kept in the given order.
    pub members: Vec<String>,
}

impl ReplaceMembersRequest {
    /// Creates a request from any list of emails.
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Validates a `{"members": [string, ...]}` payload.
    pub fn from_value(payload: &Value) -> StorageResult<Self> {
        let obj = as_object(payload, "members")?;
        let invalid = || {
            StorageError::invalid_field("members", "members must be an array of email strings")
        };
        let items = obj
            .get("members")
            .ok_or_else(|| StorageError::missing_field("members"))?
            .as_array()
            .ok_or_else(invalid)?;
        let members = items
            .iter()
            .map(|m| m.as_str().map(str::to_string).ok_or_else(invalid))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(Self { members })
    }
}

/// A partial access-control record, as accepted by create and update.
///
/// `agent_id` and `tool` are accepted as aliases for `target_agent` and
/// `tool_name`; the canonical name wins when both are given. Keys not
/// listed here are kept in `extra` and carried into the stored record.
/// Field meanings match [`AccessControl`](super::AccessControl).
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AccessControlPayload {
    #[serde(default)]
    pub ruleset_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub target_agent: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub rules: Option<Value>,
    /// Raw value; coerced by the normalizer's permissive boolean parser.
    #[serde(default)]
    pub enabled: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessControlPayload {
    /// Validates a loosely-typed access-control payload.
    pub fn from_value(payload: &Value) -> StorageResult<Self> {
        as_object(payload, "access_control")?;
        let mut parsed = Self::deserialize(payload)
            .map_err(|e| StorageError::invalid_field("access_control", e.to_string()))?;
        // timestamps are owned by the manager, never by the caller
        parsed.extra.remove("created_at");
        parsed.extra.remove("updated_at");
        Ok(parsed)
    }

    /// `ruleset_id`, trimmed, if non-blank.
    pub fn ruleset_id(&self) -> Option<&str> {
        non_blank(self.ruleset_id.as_deref())
    }

    /// `group_id`, trimmed, if non-blank.
    pub fn group_id(&self) -> Option<&str> {
        non_blank(self.group_id.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Create a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTenantRequest {
    /// Validated, normalized identifier.
    pub id: TenantId,
    /// Display name.
    pub name: String,
    /// Optional description; also seeds the ruleset document's description.
    pub description: Option<String>,
}

impl CreateTenantRequest {
    /// Creates a request.
    pub fn new(id: TenantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validates a `{"id", "name", "description"?}` payload.
    pub fn from_value(payload: &Value) -> StorageResult<Self> {
        let obj = as_object(payload, "tenant")?;
        let raw_id = optional_str(obj, "id")?.ok_or_else(|| StorageError::missing_field("id"))?;
        let id = TenantId::parse(&raw_id)?;
        let name = optional_str(obj, "name")?.ok_or_else(|| StorageError::missing_field("name"))?;
        let description = optional_str(obj, "description")?.filter(|d| !d.is_empty());
        Ok(Self {
            id,
            name,
            description,
        })
    }

    /// The identity record this request creates.
    pub fn to_tenant(&self) -> Tenant {
        Tenant::new(self.id.clone(), self.name.clone(), self.description.clone())
    }
}
