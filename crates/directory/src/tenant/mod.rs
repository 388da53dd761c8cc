//! Tenant identity.
//!
//! Every manager operation is scoped to a [`TenantId`]. Identifiers are
//! normalized (trimmed, lowercased) on construction, so two spellings of the
//! same tenant always address the same identity record and ruleset document.

mod id;

pub use id::TenantId;
