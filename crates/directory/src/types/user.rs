//! User directory records.
//!
//! The user directory is an external collaborator; this crate only reads a
//! record's fields and rewrites its tenant list. The tenant list has been
//! stored in several shapes over time, so [`parse_tenant_list`] accepts all
//! of them and [`encode_tenant_list`] always writes the canonical one (a
//! JSON-encoded array of strings).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field of the user record that holds the tenant list.
pub const TENANTS_FIELD: &str = "tenant";

/// A user record as returned by the user directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// The user's email, which is also the directory key.
    pub email: String,
    /// Raw stored fields.
    pub fields: Map<String, Value>,
}

impl UserRecord {
    /// Creates a record from raw fields.
    pub fn new(email: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            email: email.into(),
            fields,
        }
    }

    /// Returns a raw field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Display name, falling back to the email.
    pub fn name(&self) -> &str {
        self.str_field("name").unwrap_or(&self.email)
    }

    /// Job title, empty if unset.
    pub fn title(&self) -> &str {
        self.str_field("title").unwrap_or_default()
    }

    /// Stored password hash, if any.
    pub fn hashed_password(&self) -> Option<&str> {
        self.str_field("hashed_password")
    }

    /// Tenant list stored under the default [`TENANTS_FIELD`].
    pub fn tenants(&self) -> Vec<String> {
        self.tenants_in(TENANTS_FIELD)
    }

    /// Tenant list stored under `field`.
    pub fn tenants_in(&self, field: &str) -> Vec<String> {
        parse_tenant_list(self.field(field))
    }
}

/// Parses a stored tenant list.
///
/// * absent, `null` or `""` - empty list
/// * a JSON array - its string entries
/// * a string holding a JSON array - that array's string entries
/// * any other non-empty string - a one-element list
///
/// # Examples
///
/// ```
/// use acl_directory::types::parse_tenant_list;
/// use serde_json::json;
///
/// assert_eq!(parse_tenant_list(Some(&json!(["acme", 3, "beta"]))), vec!["acme", "beta"]);
/// assert_eq!(parse_tenant_list(Some(&json!("[\"acme\"]"))), vec!["acme"]);
/// assert_eq!(parse_tenant_list(Some(&json!("acme"))), vec!["acme"]);
/// assert!(parse_tenant_list(None).is_empty());
/// ```
pub fn parse_tenant_list(raw: Option<&Value>) -> Vec<String> {
    match raw {
        Some(Value::Array(items)) => strings_of(items),
        Some(Value::String(s)) if s.is_empty() => Vec::new(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => strings_of(&items),
            _ => vec![s.clone()],
        },
        _ => Vec::new(),
    }
}

fn strings_of(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// Encodes a tenant list in its canonical stored form.
pub fn encode_tenant_list(tenants: &[String]) -> Value {
    Value::String(Value::from(tenants.to_vec()).to_string())
}
