//! Storage collaborator traits.
//!
//! The directory core talks to two independent stores with no shared
//! transaction boundary:
//!
//! - a [`DocumentStore`] holding tenant identity records (hashes) and ruleset
//!   documents (strings), partitioned by key prefix;
//! - a [`UserDirectory`] holding user records, whose tenant list this crate
//!   keeps consistent with group membership.
//!
//! Both are used as trait objects so backends can be mixed, for example a
//! SQLite document store with an in-memory user directory in tests.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageResult;
use crate::types::UserRecord;

/// The stored type of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Opaque bytes (ruleset documents).
    String,
    /// Field map (identity records).
    Hash,
    /// The key does not exist.
    None,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::String => write!(f, "string"),
            KeyType::Hash => write!(f, "hash"),
            KeyType::None => write!(f, "none"),
        }
    }
}

/// Key-addressed storage for identity records and ruleset documents.
///
/// Retry and timeout policy belong to the implementation; this crate
/// propagates every error it receives.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns a human-readable name for this backend.
    fn backend_name(&self) -> &'static str;

    /// Reads a string value.
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Writes a string value, replacing whatever was stored under `key`.
    async fn set(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Returns `true` if anything is stored under `key`.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Lists keys starting with `prefix`, in no particular order.
    async fn scan(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Returns the stored type of `key`.
    async fn key_type(&self, key: &str) -> StorageResult<KeyType>;

    /// Reads all fields of a hash. Returns `None` if the key is missing or
    /// is not a hash.
    async fn get_hash(&self, key: &str) -> StorageResult<Option<BTreeMap<String, String>>>;

    /// Writes fields into a hash, creating it if needed.
    async fn set_hash(&self, key: &str, fields: &BTreeMap<String, String>) -> StorageResult<()>;

    /// Writes `value` only if the current string value equals `expected`
    /// (`None` meaning "key absent"). Returns whether the write happened.
    ///
    /// The default implementation reads, compares and writes without any
    /// atomicity guarantee. Backends that can do better should override it.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> StorageResult<bool> {
        let current = self.get(key).await?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        self.set(key, value).await?;
        Ok(true)
    }
}

/// The global user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns a human-readable name for this backend.
    fn backend_name(&self) -> &'static str;

    /// Reads a user record. Returns `None` for users without an account.
    async fn get_user_record(&self, email: &str) -> StorageResult<Option<UserRecord>>;

    /// Writes one field of an existing user record.
    ///
    /// Returns `false`, and writes nothing, if the user has no record. A
    /// missing user is never created here.
    async fn set_user_field(&self, email: &str, field: &str, value: Value)
    -> StorageResult<bool>;

    /// Lists the emails of all users.
    async fn list_users(&self) -> StorageResult<Vec<String>>;
}

/// Shared handle to a document store.
pub type DynDocumentStore = Arc<dyn DocumentStore>;

/// Shared handle to a user directory.
pub type DynUserDirectory = Arc<dyn UserDirectory>;
