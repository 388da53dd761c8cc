//! Multi-tenant access-control directory.
//!
//! Each tenant owns a ruleset document holding its member groups and the
//! per-group access-control rules for tools and agents. A separate user
//! directory keeps, for every user, the list of tenants they belong to. The
//! two live in independent stores with no shared transaction; this crate
//! keeps them consistent.
//!
//! # Architecture
//!
//! - [`tenant`] - normalized tenant identifiers
//! - [`types`] - ruleset documents, groups, access controls, user records, request DTOs
//! - [`error`] - error types for all operations
//! - [`core`] - storage traits and key layout
//! - [`backends`] - in-memory and SQLite implementations
//! - [`ruleset`] - whole-document reads and writes
//! - [`normalizer`] - merging partial access-control updates
//! - [`groups`], [`access_controls`], [`tenants`] - the managers
//! - [`reconciler`] - keeping user tenant lists in line with group membership
//! - [`seed`], [`repair`] - startup seeding and the out-of-band repair sweep
//!
//! # Consistency
//!
//! The ruleset document is the source of truth. After every structural
//! membership change the document is written first and the user directory
//! second, so a failure in between leaves stale tenant lists that
//! [`repair::RepairSweep`] can re-derive. Concurrent writes to one tenant's
//! document are last-writer-wins unless
//! [`ConcurrencyMode::Optimistic`](config::ConcurrencyMode::Optimistic) is
//! configured.
//!
//! # Backend Features
//!
//! - `sqlite` (default) - [`backends::sqlite::SqliteBackend`]

#![warn(missing_docs)]

pub mod access_controls;
pub mod backends;
pub mod config;
pub mod core;
mod directory;
pub mod error;
pub mod groups;
pub mod normalizer;
pub mod reconciler;
pub mod repair;
pub mod ruleset;
pub mod seed;
pub mod tenant;
pub mod tenants;
pub mod types;

pub use config::{ConcurrencyMode, DirectoryConfig, ReconcileFailurePolicy};
pub use directory::Directory;
pub use error::{ErrorKind, StorageError, StorageResult};
