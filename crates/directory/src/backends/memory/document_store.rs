//! In-memory document store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::core::{DocumentStore, KeyType};
use crate::error::{BackendError, StorageError, StorageResult};

#[derive(Debug, Clone)]
enum Entry {
    String(Vec<u8>),
    Hash(BTreeMap<String, String>),
}

/// A [`DocumentStore`] kept in process memory.
///
/// Every operation takes the lock once, so `compare_and_set` is atomic.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn wrong_type(key: &str) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "memory".to_string(),
        message: format!("WRONGTYPE operation against key {key} holding the wrong kind of value"),
        source: None,
    })
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        match self.entries.read().get(key) {
            None => Ok(None),
            Some(Entry::String(bytes)) => Ok(Some(bytes.clone())),
            Some(Entry::Hash(_)) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), Entry::String(value.to_vec()));
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn key_type(&self, key: &str) -> StorageResult<KeyType> {
        Ok(match self.entries.read().get(key) {
            None => KeyType::None,
            Some(Entry::String(_)) => KeyType::String,
            Some(Entry::Hash(_)) => KeyType::Hash,
        })
    }

    async fn get_hash(&self, key: &str) -> StorageResult<Option<BTreeMap<String, String>>> {
        Ok(match self.entries.read().get(key) {
            Some(Entry::Hash(fields)) => Some(fields.clone()),
            _ => None,
        })
    }

    async fn set_hash(&self, key: &str, fields: &BTreeMap<String, String>) -> StorageResult<()> {
        let mut entries = self.entries.write();
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(BTreeMap::new()))
        {
            Entry::Hash(existing) => {
                existing.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(())
            }
            Entry::String(_) => Err(wrong_type(key)),
        }
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> StorageResult<bool> {
        let mut entries = self.entries.write();
        let current = match entries.get(key) {
            None => None,
            Some(Entry::String(bytes)) => Some(bytes.as_slice()),
            Some(Entry::Hash(_)) => return Err(wrong_type(key)),
        };
        if current != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), Entry::String(value.to_vec()));
        Ok(true)
    }
}
