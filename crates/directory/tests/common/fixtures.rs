//! Shared identifiers and payloads.

use serde_json::{Value, json};

pub const ALICE: &str = "alice@acme.io";
pub const BOB: &str = "bob@acme.io";
pub const CAROL: &str = "carol@acme.io";
pub const GHOST: &str = "ghost@acme.io";

/// An access-control payload for `ruleset_id` scoped to `group_id`.
pub fn access_control(ruleset_id: &str, group_id: &str) -> Value {
    json!({
        "ruleset_id": ruleset_id,
        "group_id": group_id,
        "target_agent": "item-agent",
        "tool_name": "search",
        "rules": {"max_calls": 10},
        "description": "search limits"
    })
}

/// A user record with a name and an existing tenant list.
pub fn user_fields(email: &str, tenants: &[&str]) -> serde_json::Map<String, Value> {
    let Value::Object(fields) = json!({
        "email": email,
        "name": email.split('@').next().unwrap_or(email),
        "title": "",
        "hashed_password": "$2b$12$fixture",
        "tenant": serde_json::to_string(tenants).unwrap(),
    }) else {
        unreachable!()
    };
    fields
}
