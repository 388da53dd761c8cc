//! SQLite backend.
//!
//! Ruleset documents and tenant identity records share the `documents`
//! table, distinguished by their `kind` column; user records live in
//! `users`. One [`SqliteBackend`] serves as both the
//! [`DocumentStore`](crate::core::DocumentStore) and the
//! [`UserDirectory`](crate::core::UserDirectory).
//!
//! # Example
//!
//! ```no_run
//! use acl_directory::backends::sqlite::SqliteBackend;
//!
//! let backend = SqliteBackend::open("directory.db")?;
//! backend.init_schema()?;
//! # Ok::<(), acl_directory::error::StorageError>(())
//! ```

mod backend;
mod schema;
mod storage;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use schema::SCHEMA_VERSION;
