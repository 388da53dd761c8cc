//! Core data types for the access-control directory.
//!
//! - [`Tenant`] - a tenant's identity record
//! - [`RulesetDocument`] - the per-tenant aggregate of [`Group`]s and [`AccessControl`]s
//! - [`UserRecord`] - a user directory entry and its denormalized tenant list
//! - request DTOs validated up front by each manager operation

mod requests;
mod ruleset;
mod tenant;
mod user;

pub use requests::{
    AccessControlPayload, CreateGroupRequest, CreateTenantRequest, ReplaceMembersRequest,
    UpdateGroupRequest,
};
pub use ruleset::{AccessControl, DEFAULT_ACCESS_CONTROL_TYPE, Group, RulesetDocument};
pub(crate) use ruleset::empty_rules;
pub use tenant::Tenant;
pub use user::{TENANTS_FIELD, UserRecord, encode_tenant_list, parse_tenant_list};
