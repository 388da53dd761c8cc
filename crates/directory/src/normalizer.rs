//! Access-control normalization.
//!
//! [`normalize_access_control`] merges a partial [`AccessControlPayload`] with
//! an optional existing [`AccessControl`] into a complete record. For each
//! field the payload wins over the existing record, which wins over the
//! default. Empty strings, `null`, empty objects and empty arrays count as
//! "not supplied" and fall through to the next source, so a previously-set
//! field is never dropped by an update that omits it.
//!
//! Identity fields (`ruleset_id`, `group_id`) are merged like the others but
//! never validated here; a record with no ruleset id comes back with `None`
//! and the calling manager decides whether that is an error.

use serde_json::Value;

use crate::types::{AccessControl, AccessControlPayload, empty_rules};

/// Strings that parse as `true`, compared trimmed and case-insensitively.
const TRUTHY_STRINGS: [&str; 5] = ["1", "true", "yes", "y", "on"];

/// Permissive boolean parser.
///
/// * absent or `null` - `default`
/// * booleans pass through
/// * numbers are `true` unless zero
/// * strings are `true` if they match `1`, `true`, `yes`, `y` or `on`
/// * anything else - `default`
///
/// # Examples
///
/// ```
/// use acl_directory::normalizer::as_bool;
/// use serde_json::json;
///
/// assert!(as_bool(Some(&json!(" YES ")), false));
/// assert!(!as_bool(Some(&json!("nope")), true));
/// assert!(!as_bool(Some(&json!(0)), true));
/// assert!(as_bool(None, true));
/// ```
pub fn as_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        None | Some(Value::Null) => default,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => {
            let s = s.trim().to_lowercase();
            TRUTHY_STRINGS.contains(&s.as_str())
        }
        Some(_) => default,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn present(value: Option<&String>) -> Option<&String> {
    value.filter(|s| !s.is_empty())
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Merges `payload` over `existing` into a complete access-control record.
///
/// `default_type` is used for `type` when neither side supplies one.
/// Timestamps are copied from `existing`; stamping them is the caller's job.
/// Neither input is modified.
pub fn normalize_access_control(
    payload: &AccessControlPayload,
    existing: Option<&AccessControl>,
    default_type: &str,
) -> AccessControl {
    let ruleset_id = trimmed(payload.ruleset_id.as_ref())
        .or_else(|| existing.and_then(|e| present(e.ruleset_id.as_ref()).cloned()));

    let group_id = trimmed(payload.group_id.as_ref())
        .or_else(|| existing.and_then(|e| present(e.group_id.as_ref()).cloned()));

    let kind = present(payload.kind.as_ref())
        .or_else(|| existing.map(|e| &e.kind).filter(|k| !k.is_empty()))
        .cloned()
        .unwrap_or_else(|| default_type.to_string());

    let target_agent = present(payload.target_agent.as_ref())
        .or_else(|| present(payload.agent_id.as_ref()))
        .or_else(|| existing.and_then(|e| present(e.target_agent.as_ref())))
        .cloned();

    let tool_name = present(payload.tool_name.as_ref())
        .or_else(|| present(payload.tool.as_ref()))
        .or_else(|| existing.and_then(|e| present(e.tool_name.as_ref())))
        .cloned();

    let rules = payload
        .rules
        .as_ref()
        .filter(|r| is_truthy(r))
        .or_else(|| existing.map(|e| &e.rules).filter(|r| is_truthy(r)))
        .cloned()
        .unwrap_or_else(empty_rules);

    let fallback_enabled = existing.is_none_or(|e| e.enabled);
    let enabled = as_bool(payload.enabled.as_ref(), fallback_enabled);

    let description = present(payload.description.as_ref())
        .or_else(|| existing.and_then(|e| present(Some(&e.description))))
        .cloned()
        .unwrap_or_default();

    let name = present(payload.name.as_ref())
        .or_else(|| existing.and_then(|e| present(e.name.as_ref())))
        .cloned()
        .or_else(|| ruleset_id.clone());

    let mut extra = existing.map(|e| e.extra.clone()).unwrap_or_default();
    for (key, value) in &payload.extra {
        extra.insert(key.clone(), value.clone());
    }

    AccessControl {
        ruleset_id,
        group_id,
        kind,
        target_agent,
        tool_name,
        rules,
        enabled,
        description,
        name,
        created_at: existing.and_then(|e| e.created_at),
        updated_at: existing.and_then(|e| e.updated_at),
        extra,
    }
}
