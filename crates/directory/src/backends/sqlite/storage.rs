//! DocumentStore and UserDirectory implementations for SQLite.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use serde_json::{Map, Value};

use crate::core::{DocumentStore, KeyType, UserDirectory};
use crate::error::{BackendError, StorageError, StorageResult};
use crate::types::UserRecord;

use super::SqliteBackend;

const KIND_STRING: &str = "string";
const KIND_HASH: &str = "hash";

fn internal_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message,
        source: None,
    })
}

fn serialization_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::SerializationError { message })
}

fn wrong_type(key: &str, found: &str) -> StorageError {
    internal_error(format!(
        "WRONGTYPE operation against key {key} holding a {found} value"
    ))
}

fn decode_hash(key: &str, value: &[u8]) -> StorageResult<BTreeMap<String, String>> {
    serde_json::from_slice(value)
        .map_err(|e| serialization_error(format!("Failed to decode hash at {key}: {e}")))
}

fn decode_fields(email: &str, raw: &str) -> StorageResult<Map<String, Value>> {
    serde_json::from_str(raw)
        .map_err(|e| serialization_error(format!("Failed to decode user {email}: {e}")))
}

impl SqliteBackend {
    /// Inserts or replaces a user record.
    ///
    /// Used to provision accounts; the directory itself only ever rewrites
    /// single fields.
    pub fn insert_user(&self, email: &str, fields: &Map<String, Value>) -> StorageResult<()> {
        let conn = self.get_connection()?;
        let raw = serde_json::to_string(fields)
            .map_err(|e| serialization_error(format!("Failed to encode user {email}: {e}")))?;
        conn.execute(
            "INSERT INTO users (email, fields) VALUES (?1, ?2)
             ON CONFLICT(email) DO UPDATE SET fields = excluded.fields",
            params![email, raw],
        )
        .map_err(|e| internal_error(format!("Failed to insert user: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let conn = self.get_connection()?;
        let row: Option<(String, Vec<u8>)> = conn
            .query_row(
                "SELECT kind, value FROM documents WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read {key}: {e}")))?;

        match row {
            None => Ok(None),
            Some((kind, value)) if kind == KIND_STRING => Ok(Some(value)),
            Some((kind, _)) => Err(wrong_type(key, &kind)),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let conn = self.get_connection()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO documents (key, kind, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                kind = excluded.kind, value = excluded.value, updated_at = excluded.updated_at",
            params![key, KIND_STRING, value, now],
        )
        .map_err(|e| internal_error(format!("Failed to write {key}: {e}")))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let conn = self.get_connection()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM documents WHERE key = ?1",
                params![key],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to check {key}: {e}")))?;
        Ok(found.is_some())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let conn = self.get_connection()?;
        conn.execute("DELETE FROM documents WHERE key = ?1", params![key])
            .map_err(|e| internal_error(format!("Failed to delete {key}: {e}")))?;
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let conn = self.get_connection()?;
        // substr comparison keeps '%' and '_' in keys from acting as wildcards
        let mut stmt = conn
            .prepare("SELECT key FROM documents WHERE substr(key, 1, length(?1)) = ?1")
            .map_err(|e| internal_error(format!("Failed to prepare scan: {}", e)))?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))
            .map_err(|e| internal_error(format!("Failed to scan {prefix}: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| internal_error(format!("Failed to read scan row: {}", e)))?;
        Ok(keys)
    }

    async fn key_type(&self, key: &str) -> StorageResult<KeyType> {
        let conn = self.get_connection()?;
        let kind: Option<String> = conn
            .query_row(
                "SELECT kind FROM documents WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read type of {key}: {e}")))?;

        Ok(match kind.as_deref() {
            None => KeyType::None,
            Some(KIND_HASH) => KeyType::Hash,
            Some(_) => KeyType::String,
        })
    }

    async fn get_hash(&self, key: &str) -> StorageResult<Option<BTreeMap<String, String>>> {
        let conn = self.get_connection()?;
        let value: Option<Vec<u8>> = conn
            .query_row(
                "SELECT value FROM documents WHERE key = ?1 AND kind = ?2",
                params![key, KIND_HASH],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read hash {key}: {e}")))?;

        value.map(|v| decode_hash(key, &v)).transpose()
    }

    async fn set_hash(&self, key: &str, fields: &BTreeMap<String, String>) -> StorageResult<()> {
        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        let current: Option<(String, Vec<u8>)> = tx
            .query_row(
                "SELECT kind, value FROM documents WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read hash {key}: {e}")))?;

        let mut merged = match current {
            None => BTreeMap::new(),
            Some((kind, value)) if kind == KIND_HASH => decode_hash(key, &value)?,
            Some((kind, _)) => return Err(wrong_type(key, &kind)),
        };
        merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));

        let encoded = serde_json::to_vec(&merged)
            .map_err(|e| serialization_error(format!("Failed to encode hash {key}: {e}")))?;
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO documents (key, kind, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, KIND_HASH, encoded, now],
        )
        .map_err(|e| internal_error(format!("Failed to write hash {key}: {e}")))?;

        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> StorageResult<bool> {
        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        let current: Option<(String, Vec<u8>)> = tx
            .query_row(
                "SELECT kind, value FROM documents WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read {key}: {e}")))?;

        let current = match &current {
            None => None,
            Some((kind, bytes)) if kind == KIND_STRING => Some(bytes.as_slice()),
            Some((kind, _)) => return Err(wrong_type(key, kind)),
        };
        if current != expected {
            return Ok(false);
        }

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO documents (key, kind, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, KIND_STRING, value, now],
        )
        .map_err(|e| internal_error(format!("Failed to write {key}: {e}")))?;

        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit transaction: {}", e)))?;
        Ok(true)
    }
}

#[async_trait]
impl UserDirectory for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn get_user_record(&self, email: &str) -> StorageResult<Option<UserRecord>> {
        let conn = self.get_connection()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT fields FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read user: {}", e)))?;

        match raw {
            None => Ok(None),
            Some(raw) => {
                let fields = decode_fields(email, &raw)?;
                if fields.is_empty() {
                    return Ok(None);
                }
                Ok(Some(UserRecord::new(email, fields)))
            }
        }
    }

    async fn set_user_field(
        &self,
        email: &str,
        field: &str,
        value: Value,
    ) -> StorageResult<bool> {
        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        let raw: Option<String> = tx
            .query_row(
                "SELECT fields FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read user: {}", e)))?;

        let Some(raw) = raw else {
            return Ok(false);
        };
        let mut fields = decode_fields(email, &raw)?;
        fields.insert(field.to_string(), value);

        let encoded = serde_json::to_string(&fields)
            .map_err(|e| serialization_error(format!("Failed to encode user {email}: {e}")))?;
        tx.execute(
            "UPDATE users SET fields = ?2 WHERE email = ?1",
            params![email, encoded],
        )
        .map_err(|e| internal_error(format!("Failed to update user: {}", e)))?;

        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit transaction: {}", e)))?;
        Ok(true)
    }

    async fn list_users(&self) -> StorageResult<Vec<String>> {
        let conn = self.get_connection()?;
        let mut stmt = conn
            .prepare("SELECT email FROM users ORDER BY email")
            .map_err(|e| internal_error(format!("Failed to prepare user list: {}", e)))?;
        let emails = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| internal_error(format!("Failed to list users: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| internal_error(format!("Failed to read user row: {}", e)))?;
        Ok(emails)
    }
}
