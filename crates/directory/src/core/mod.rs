//! Core storage traits and key layout.
//!
//! - [`DocumentStore`] - tenant identity records and ruleset documents
//! - [`UserDirectory`] - user records and their tenant lists
//! - [`keys`] - how tenants and users map onto store keys

pub mod keys;
pub mod store;

pub use store::{DocumentStore, DynDocumentStore, DynUserDirectory, KeyType, UserDirectory};
