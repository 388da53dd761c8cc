//! SQLite backend integration tests.
//!
//! The same directory operations, backed by a SQLite database for both the
//! document store and the user directory.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use serde_json::{Map, Value, json};

use acl_directory::backends::sqlite::SqliteBackend;
use acl_directory::core::{DocumentStore, KeyType, UserDirectory};
use acl_directory::tenant::TenantId;
use acl_directory::types::{
    AccessControlPayload, CreateGroupRequest, CreateTenantRequest, ReplaceMembersRequest,
};
use acl_directory::{ConcurrencyMode, Directory, DirectoryConfig, ErrorKind};

fn create_backend() -> Arc<SqliteBackend> {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    Arc::new(backend)
}

fn create_directory(backend: &Arc<SqliteBackend>, config: DirectoryConfig) -> Directory {
    Directory::new(backend.clone(), backend.clone(), config)
}

fn user(email: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("email".to_string(), json!(email));
    fields
}

#[tokio::test]
async fn test_membership_flow() {
    let backend = create_backend();
    backend.insert_user("alice@acme.io", &user("alice@acme.io")).unwrap();
    let directory = create_directory(&backend, DirectoryConfig::default());
    let acme = TenantId::new("acme");

    directory
        .tenants()
        .create(&CreateTenantRequest::new(acme.clone(), "Acme"))
        .await
        .unwrap();
    directory
        .groups()
        .create(&acme, &CreateGroupRequest::new("eng"))
        .await
        .unwrap();
    directory
        .groups()
        .replace_members(&acme, "eng", &ReplaceMembersRequest::new(["alice@acme.io"]))
        .await
        .unwrap();

    let alice = backend.get_user_record("alice@acme.io").await.unwrap().unwrap();
    assert_eq!(alice.tenants(), vec!["acme"]);

    assert_eq!(backend.key_type("tenant:acme").await.unwrap(), KeyType::Hash);
    assert_eq!(
        backend.key_type("tenant:acme:rulesets").await.unwrap(),
        KeyType::String
    );
    let tenants = directory.tenants().list().await.unwrap();
    assert_eq!(tenants.len(), 1);

    directory.tenants().delete(&acme).await.unwrap();
    let alice = backend.get_user_record("alice@acme.io").await.unwrap().unwrap();
    assert!(alice.tenants().is_empty());
    assert!(backend.scan("tenant:").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_document_roundtrip_with_unicode() {
    let backend = create_backend();
    let directory = create_directory(&backend, DirectoryConfig::default());
    let acme = TenantId::new("acme");
    directory
        .tenants()
        .create(&CreateTenantRequest::new(acme.clone(), "Acme").with_description("접근 제어 ✓"))
        .await
        .unwrap();
    directory
        .groups()
        .create(&acme, &CreateGroupRequest::new("eng").with_description("Équipe"))
        .await
        .unwrap();
    directory
        .access_controls()
        .create(
            &acme,
            &AccessControlPayload::from_value(&json!({
                "ruleset_id": "rs-1",
                "group_id": "eng",
                "rules": {"allow": ["검색", {"nested": [1, 2.5, null]}]}
            }))
            .unwrap(),
        )
        .await
        .unwrap();

    let raw = backend.get("tenant:acme:rulesets").await.unwrap().unwrap();
    let doc = directory.rulesets().read(&acme).await.unwrap();
    assert_eq!(doc.description, "접근 제어 ✓");
    assert_eq!(serde_json::to_vec(&doc).unwrap(), raw);
}

#[tokio::test]
async fn test_optimistic_mode_detects_lost_update() {
    let backend = create_backend();
    let directory = create_directory(
        &backend,
        DirectoryConfig::default().with_concurrency(ConcurrencyMode::Optimistic),
    );
    let acme = TenantId::new("acme");
    directory
        .tenants()
        .create(&CreateTenantRequest::new(acme.clone(), "Acme"))
        .await
        .unwrap();

    let rulesets = directory.rulesets();
    let mut first = rulesets.load(&acme).await.unwrap();
    let mut second = rulesets.load(&acme).await.unwrap();
    first.document.description = "first".to_string();
    rulesets.save(&mut first).await.unwrap();
    second.document.description = "second".to_string();
    let err = rulesets.save(&mut second).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_file_database_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("directory.db");
    let acme = TenantId::new("acme");

    {
        let backend = Arc::new(SqliteBackend::open(&path).unwrap());
        backend.init_schema().unwrap();
        let directory = create_directory(&backend, DirectoryConfig::default());
        directory
            .tenants()
            .create(&CreateTenantRequest::new(acme.clone(), "Acme"))
            .await
            .unwrap();
    }

    let backend = Arc::new(SqliteBackend::open(&path).unwrap());
    backend.init_schema().unwrap();
    let directory = create_directory(&backend, DirectoryConfig::default());
    let tenant = directory.tenants().get(&acme).await.unwrap();
    assert_eq!(tenant.name, "Acme");
    assert!(directory.tenants().get_rulesets(&acme).await.is_ok());
}
