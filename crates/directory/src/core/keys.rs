//! Key layout in the shared document store.
//!
//! ```text
//! tenant:{id}            hash    identity record (id, name, description)
//! tenant:{id}:rulesets   string  JSON ruleset document
//! user:{email}           hash    user record (owned by the user directory)
//! ```
//!
//! Identity records and ruleset documents share the `tenant:` prefix, so a
//! prefix scan returns both; callers tell them apart with
//! [`KeyType`](super::KeyType), not by key shape alone.

use crate::tenant::TenantId;

/// Prefix shared by identity records and ruleset documents.
pub const TENANT_PREFIX: &str = "tenant:";

/// Suffix of ruleset document keys.
pub const RULESET_SUFFIX: &str = ":rulesets";

/// Prefix of user directory keys.
pub const USER_PREFIX: &str = "user:";

/// Key of a tenant's identity record.
pub fn tenant_key(tenant_id: &TenantId) -> String {
    format!("{TENANT_PREFIX}{tenant_id}")
}

/// Key of a tenant's ruleset document.
pub fn ruleset_key(tenant_id: &TenantId) -> String {
    format!("{TENANT_PREFIX}{tenant_id}{RULESET_SUFFIX}")
}

/// Key of a user record.
pub fn user_key(email: &str) -> String {
    format!("{USER_PREFIX}{email}")
}

/// Extracts the tenant id from an identity-record key.
pub fn tenant_id_from_key(key: &str) -> Option<TenantId> {
    key.strip_prefix(TENANT_PREFIX)
        .filter(|rest| !rest.is_empty() && !rest.ends_with(RULESET_SUFFIX))
        .map(TenantId::new)
}

/// Extracts the tenant id from a ruleset-document key.
pub fn tenant_id_from_ruleset_key(key: &str) -> Option<TenantId> {
    key.strip_prefix(TENANT_PREFIX)
        .and_then(|rest| rest.strip_suffix(RULESET_SUFFIX))
        .filter(|id| !id.is_empty())
        .map(TenantId::new)
}
