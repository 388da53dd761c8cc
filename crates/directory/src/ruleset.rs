//! Ruleset document storage.
//!
//! [`RulesetStore`] reads and writes whole [`RulesetDocument`]s under
//! `tenant:{id}:rulesets`. A missing document is reported as not-found and a
//! document that fails to parse as corrupted; neither is ever replaced with a
//! default behind the caller's back.
//!
//! The storage key is authoritative for which tenant a document belongs to.
//! A loaded document is always written back under the key it was read from,
//! whatever its embedded `tenant_id` says.

use tracing::{debug, warn};

use crate::config::ConcurrencyMode;
use crate::core::DynDocumentStore;
use crate::core::keys::ruleset_key;
use crate::error::{ConcurrencyError, DocumentError, ResourceKind, StorageError, StorageResult};
use crate::tenant::TenantId;
use crate::types::RulesetDocument;

/// A ruleset document together with the tenant and bytes it was loaded from.
///
/// The origin bytes let [`RulesetStore::save`] detect concurrent writers
/// when the store runs in [`ConcurrencyMode::Optimistic`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRuleset {
    /// The parsed document.
    pub document: RulesetDocument,
    tenant_id: TenantId,
    origin: Option<Vec<u8>>,
}

impl LoadedRuleset {
    /// Wraps a document that does not exist in the store yet. It will be
    /// saved under its own `tenant_id`.
    pub fn fresh(document: RulesetDocument) -> Self {
        Self {
            tenant_id: document.tenant_id.clone(),
            document,
            origin: None,
        }
    }

    /// The tenant whose key this document is saved under.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns `true` if the document was not read from the store.
    pub fn is_fresh(&self) -> bool {
        self.origin.is_none()
    }

    /// Unwraps the document.
    pub fn into_document(self) -> RulesetDocument {
        self.document
    }
}

/// Adapter over the document store for ruleset documents.
#[derive(Clone)]
pub struct RulesetStore {
    store: DynDocumentStore,
    mode: ConcurrencyMode,
}

impl std::fmt::Debug for RulesetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulesetStore")
            .field("backend", &self.store.backend_name())
            .field("mode", &self.mode)
            .finish()
    }
}

impl RulesetStore {
    /// Creates an adapter.
    pub fn new(store: DynDocumentStore, mode: ConcurrencyMode) -> Self {
        Self { store, mode }
    }

    /// Returns the write mode.
    pub fn mode(&self) -> ConcurrencyMode {
        self.mode
    }

    /// Loads a tenant's document.
    ///
    /// # Errors
    ///
    /// * `ResourceError::NotFound` if nothing (or an empty value) is stored
    /// * `DocumentError::Corrupted` if the stored bytes do not parse
    ///
    /// An embedded `tenant_id` that disagrees with the key is replaced by the
    /// requested tenant.
    pub async fn load(&self, tenant_id: &TenantId) -> StorageResult<LoadedRuleset> {
        let key = ruleset_key(tenant_id);
        let bytes = match self.store.get(&key).await? {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(StorageError::not_found(ResourceKind::Ruleset, tenant_id.as_str())),
        };

        let mut document = serde_json::from_slice::<RulesetDocument>(&bytes).map_err(|e| {
            StorageError::Document(DocumentError::Corrupted {
                key: key.clone(),
                message: e.to_string(),
            })
        })?;

        if document.tenant_id != *tenant_id {
            warn!(
                key = %key,
                stored_tenant_id = %document.tenant_id,
                "Ruleset document names another tenant, keeping it under its key"
            );
            document.tenant_id = tenant_id.clone();
        }

        Ok(LoadedRuleset {
            document,
            tenant_id: tenant_id.clone(),
            origin: Some(bytes),
        })
    }

    /// Loads a tenant's document, returning only the parsed value.
    pub async fn read(&self, tenant_id: &TenantId) -> StorageResult<RulesetDocument> {
        self.load(tenant_id).await.map(LoadedRuleset::into_document)
    }

    /// Loads a tenant's document, starting an empty one if none is stored.
    ///
    /// Corrupted documents are still an error.
    pub async fn load_or_init(&self, tenant_id: &TenantId) -> StorageResult<LoadedRuleset> {
        match self.load(tenant_id).await {
            Err(e) if e.is_not_found(ResourceKind::Ruleset) => {
                debug!(tenant_id = %tenant_id, "Starting empty ruleset document");
                Ok(LoadedRuleset::fresh(RulesetDocument::empty(
                    tenant_id.clone(),
                    "",
                )))
            }
            other => other,
        }
    }

    /// Writes a document back under the key it was loaded from, refreshing
    /// its `updated_at`.
    ///
    /// In optimistic mode the write only succeeds if the stored bytes are
    /// still the ones `loaded` was read from.
    pub async fn save(&self, loaded: &mut LoadedRuleset) -> StorageResult<()> {
        let tenant_id = loaded.tenant_id.clone();
        loaded.document.tenant_id = tenant_id.clone();
        loaded.document.touch();
        let key = ruleset_key(&tenant_id);
        let bytes = serde_json::to_vec(&loaded.document)?;

        match self.mode {
            ConcurrencyMode::LastWriterWins => self.store.set(&key, &bytes).await?,
            ConcurrencyMode::Optimistic => {
                let written = self
                    .store
                    .compare_and_set(&key, loaded.origin.as_deref(), &bytes)
                    .await?;
                if !written {
                    return Err(ConcurrencyError::VersionConflict { tenant_id }.into());
                }
            }
        }

        debug!(tenant_id = %tenant_id, bytes = bytes.len(), "Saved ruleset document");
        loaded.origin = Some(bytes);
        Ok(())
    }

    /// Writes `document` only if no document is stored for its tenant.
    ///
    /// Returns whether the write happened. The document is stored as given.
    pub async fn create_if_absent(&self, document: &RulesetDocument) -> StorageResult<bool> {
        let key = ruleset_key(&document.tenant_id);
        if self.store.exists(&key).await? {
            return Ok(false);
        }
        let bytes = serde_json::to_vec(document)?;
        self.store.compare_and_set(&key, None, &bytes).await
    }

    /// Returns `true` if a document is stored for the tenant.
    pub async fn exists(&self, tenant_id: &TenantId) -> StorageResult<bool> {
        self.store.exists(&ruleset_key(tenant_id)).await
    }

    /// Removes a tenant's document. Removing a missing document is not an error.
    pub async fn delete(&self, tenant_id: &TenantId) -> StorageResult<()> {
        self.store.delete(&ruleset_key(tenant_id)).await
    }

    /// Lists the tenants that have a ruleset document key.
    pub async fn tenant_ids(&self) -> StorageResult<Vec<TenantId>> {
        let mut ids: Vec<TenantId> = self
            .store
            .scan(crate::core::keys::TENANT_PREFIX)
            .await?
            .iter()
            .filter_map(|key| crate::core::keys::tenant_id_from_ruleset_key(key))
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryDocumentStore;
    use crate::core::DocumentStore;
    use crate::error::ErrorKind;
    use crate::types::Group;
    use std::sync::Arc;

    fn store(mode: ConcurrencyMode) -> (Arc<MemoryDocumentStore>, RulesetStore) {
        let backing = Arc::new(MemoryDocumentStore::new());
        (backing.clone(), RulesetStore::new(backing, mode))
    }

    #[tokio::test]
    async fn test_missing_and_empty_are_not_found() {
        let (backing, rulesets) = store(ConcurrencyMode::LastWriterWins);
        let acme = TenantId::new("acme");
        let err = rulesets.load(&acme).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        backing.set("tenant:acme:rulesets", b"").await.unwrap();
        let err = rulesets.load(&acme).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_corrupted_is_never_defaulted() {
        let (backing, rulesets) = store(ConcurrencyMode::LastWriterWins);
        let acme = TenantId::new("acme");
        backing.set("tenant:acme:rulesets", b"{not json").await.unwrap();

        assert_eq!(
            rulesets.load(&acme).await.unwrap_err().kind(),
            ErrorKind::Corrupted
        );
        assert_eq!(
            rulesets.load_or_init(&acme).await.unwrap_err().kind(),
            ErrorKind::Corrupted
        );
    }

    #[tokio::test]
    async fn test_save_touches_and_roundtrips() {
        let (_, rulesets) = store(ConcurrencyMode::LastWriterWins);
        let acme = TenantId::new("acme");
        let mut loaded = rulesets.load_or_init(&acme).await.unwrap();
        assert!(loaded.is_fresh());
        let before = loaded.document.updated_at;
        loaded
            .document
            .groups
            .push(Group::new(acme.clone(), "eng", "Engineering", "엔지니어링"));
        rulesets.save(&mut loaded).await.unwrap();
        assert!(loaded.document.updated_at >= before);

        let read = rulesets.read(&acme).await.unwrap();
        assert_eq!(read, loaded.document);
    }

    #[tokio::test]
    async fn test_optimistic_save_detects_concurrent_writer() {
        let (_, rulesets) = store(ConcurrencyMode::Optimistic);
        let acme = TenantId::new("acme");
        let mut first = rulesets.load_or_init(&acme).await.unwrap();
        rulesets.save(&mut first).await.unwrap();

        let mut a = rulesets.load(&acme).await.unwrap();
        let mut b = rulesets.load(&acme).await.unwrap();
        a.document.description = "a".to_string();
        rulesets.save(&mut a).await.unwrap();

        b.document.description = "b".to_string();
        let err = rulesets.save(&mut b).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(rulesets.read(&acme).await.unwrap().description, "a");

        // a saved document can be saved again from its new origin
        a.document.description = "a2".to_string();
        rulesets.save(&mut a).await.unwrap();
    }

    #[tokio::test]
    async fn test_last_writer_wins_overwrites() {
        let (_, rulesets) = store(ConcurrencyMode::LastWriterWins);
        let acme = TenantId::new("acme");
        let mut first = rulesets.load_or_init(&acme).await.unwrap();
        rulesets.save(&mut first).await.unwrap();

        let mut a = rulesets.load(&acme).await.unwrap();
        let mut b = rulesets.load(&acme).await.unwrap();
        a.document.description = "a".to_string();
        b.document.description = "b".to_string();
        rulesets.save(&mut a).await.unwrap();
        rulesets.save(&mut b).await.unwrap();
        assert_eq!(rulesets.read(&acme).await.unwrap().description, "b");
    }

    #[tokio::test]
    async fn test_save_stays_under_loaded_key() {
        let (backing, rulesets) = store(ConcurrencyMode::LastWriterWins);
        let beta = TenantId::new("beta");
        let mut beta_doc = RulesetDocument::empty(beta.clone(), "");
        beta_doc
            .groups
            .push(Group::new(beta.clone(), "beta-team", "Beta", ""));
        rulesets.save(&mut LoadedRuleset::fresh(beta_doc)).await.unwrap();

        backing
            .set(
                "tenant:acme:rulesets",
                br#"{"tenant_id":"beta","groups":[],"access_controls":[]}"#,
            )
            .await
            .unwrap();

        let acme = TenantId::new("acme");
        let mut loaded = rulesets.load(&acme).await.unwrap();
        assert_eq!(loaded.document.tenant_id, acme);
        assert_eq!(loaded.tenant_id(), &acme);
        loaded
            .document
            .groups
            .push(Group::new(acme.clone(), "eng", "eng", ""));
        rulesets.save(&mut loaded).await.unwrap();

        let acme_doc = rulesets.read(&acme).await.unwrap();
        assert_eq!(acme_doc.tenant_id, acme);
        assert!(acme_doc.has_group("eng"));
        let beta_doc = rulesets.read(&beta).await.unwrap();
        assert!(beta_doc.has_group("beta-team"));
        assert!(!beta_doc.has_group("eng"));
    }

    #[tokio::test]
    async fn test_uppercase_embedded_tenant_is_normalized() {
        let (backing, rulesets) = store(ConcurrencyMode::Optimistic);
        backing
            .set("tenant:acme:rulesets", br#"{"tenant_id":" ACME ","groups":[]}"#)
            .await
            .unwrap();

        let acme = TenantId::new("acme");
        let mut loaded = rulesets.load(&acme).await.unwrap();
        assert_eq!(loaded.document.tenant_id.as_str(), "acme");
        rulesets.save(&mut loaded).await.unwrap();
        assert!(backing.get("tenant:ACME:rulesets").await.unwrap().is_none());
        assert!(backing.get("tenant: acme :rulesets").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_if_absent() {
        let (_, rulesets) = store(ConcurrencyMode::LastWriterWins);
        let doc = RulesetDocument::empty(TenantId::new("acme"), "first");
        assert!(rulesets.create_if_absent(&doc).await.unwrap());
        let other = RulesetDocument::empty(TenantId::new("acme"), "second");
        assert!(!rulesets.create_if_absent(&other).await.unwrap());
        assert_eq!(
            rulesets.read(&TenantId::new("acme")).await.unwrap().description,
            "first"
        );
        assert_eq!(rulesets.tenant_ids().await.unwrap(), vec![TenantId::new("acme")]);
    }
}
