//! In-memory user directory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::core::UserDirectory;
use crate::error::{BackendError, StorageError, StorageResult};
use crate::types::UserRecord;

/// A [`UserDirectory`] kept in process memory.
///
/// Besides storage it counts field writes and can be switched into an
/// unavailable state, which lets callers observe exactly how many directory
/// mutations an operation caused and how it behaves when the directory is
/// down.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, Map<String, Value>>>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryUserDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user record. Does not count as a write.
    pub fn insert_user(&self, email: impl Into<String>, fields: Map<String, Value>) {
        self.users.write().insert(email.into(), fields);
    }

    /// Inserts a user with only an `email` field.
    pub fn insert_email(&self, email: &str) {
        let mut fields = Map::new();
        fields.insert("email".to_string(), Value::String(email.to_string()));
        self.insert_user(email, fields);
    }

    /// Number of `set_user_field` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(BackendError::Unavailable {
                backend_name: "memory".to_string(),
                message: "user directory marked unavailable".to_string(),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_user_record(&self, email: &str) -> StorageResult<Option<UserRecord>> {
        self.check_available()?;
        Ok(self
            .users
            .read()
            .get(email)
            .filter(|fields| !fields.is_empty())
            .map(|fields| UserRecord::new(email, fields.clone())))
    }

    async fn set_user_field(
        &self,
        email: &str,
        field: &str,
        value: Value,
    ) -> StorageResult<bool> {
        self.check_available()?;
        let mut users = self.users.write();
        let Some(fields) = users.get_mut(email) else {
            return Ok(false);
        };
        fields.insert(field.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn list_users(&self) -> StorageResult<Vec<String>> {
        self.check_available()?;
        let mut emails: Vec<String> = self.users.read().keys().cloned().collect();
        emails.sort();
        Ok(emails)
    }
}
