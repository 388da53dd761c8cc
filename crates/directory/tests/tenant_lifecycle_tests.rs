//! Tenant lifecycle and seeding integration tests.

mod common;

use std::collections::BTreeMap;

use serde_json::json;

use acl_directory::ErrorKind;
use acl_directory::core::DocumentStore;
use acl_directory::seed::SeedData;
use acl_directory::tenant::TenantId;
use acl_directory::types::{CreateTenantRequest, Group, RulesetDocument, Tenant};

use common::*;

// ============================================================================
// Create / Get
// ============================================================================

#[tokio::test]
async fn test_create_tenant_writes_identity_and_empty_rulesets() {
    let ctx = TestContext::new();
    let request = CreateTenantRequest::from_value(&json!({
        "id": " Acme ",
        "name": "Acme Corp",
        "description": "widgets"
    }))
    .unwrap();
    let tenant = ctx.directory.tenants().create(&request).await.unwrap();
    assert_eq!(tenant.id.as_str(), "acme");

    let acme = TenantId::new("acme");
    assert_eq!(ctx.directory.tenants().get(&acme).await.unwrap(), tenant);

    let doc = ctx.directory.tenants().get_rulesets(&acme).await.unwrap();
    assert_eq!(doc.tenant_id, acme);
    assert_eq!(doc.description, "widgets");
    assert!(doc.groups.is_empty());
    assert!(doc.access_controls.is_empty());
}

#[tokio::test]
async fn test_create_existing_tenant_conflicts() {
    let ctx = TestContext::new();
    ctx.create_tenant("acme").await;
    let err = ctx
        .directory
        .tenants()
        .create(&CreateTenantRequest::new(TenantId::new("ACME"), "again"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_create_keeps_existing_rulesets() {
    let ctx = TestContext::new();
    let acme = TenantId::new("acme");
    ctx.directory
        .groups()
        .create(&acme, &acl_directory::types::CreateGroupRequest::new("eng"))
        .await
        .unwrap();

    ctx.create_tenant("acme").await;
    let doc = ctx.directory.tenants().get_rulesets(&acme).await.unwrap();
    assert_eq!(doc.groups.len(), 1);
}

#[tokio::test]
async fn test_get_missing_tenant_is_not_found() {
    let ctx = TestContext::new();
    let err = ctx
        .directory
        .tenants()
        .get(&TenantId::new("nobody"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_get_rulesets_reports_corruption() {
    let ctx = TestContext::new();
    ctx.documents
        .set("tenant:acme:rulesets", b"{\"tenant_id\": ")
        .await
        .unwrap();
    let err = ctx
        .directory
        .tenants()
        .get_rulesets(&TenantId::new("acme"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corrupted);
}

// ============================================================================
// List
// ============================================================================

#[tokio::test]
async fn test_list_excludes_ruleset_documents() {
    let ctx = TestContext::new();
    ctx.create_tenant("beta").await;
    ctx.create_tenant("acme").await;
    // an orphaned ruleset document and a non-hash key under the prefix
    ctx.documents
        .set("tenant:orphan:rulesets", b"{\"tenant_id\": \"orphan\"}")
        .await
        .unwrap();
    ctx.documents.set("tenant:stray", b"x").await.unwrap();

    let tenants = ctx.directory.tenants().list().await.unwrap();
    let ids: Vec<&str> = tenants.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["acme", "beta"]);
}

#[tokio::test]
async fn test_list_falls_back_to_key_for_missing_id_field() {
    let ctx = TestContext::new();
    ctx.documents
        .set_hash(
            "tenant:legacy",
            &BTreeMap::from([("name".to_string(), "Legacy".to_string())]),
        )
        .await
        .unwrap();
    let tenants = ctx.directory.tenants().list().await.unwrap();
    assert_eq!(tenants[0].id.as_str(), "legacy");
    assert_eq!(tenants[0].description, None);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_removes_both_keys_and_is_retry_safe() {
    let ctx = TestContext::new();
    let acme = ctx.create_tenant("acme").await;

    let deletion = ctx.directory.tenants().delete(&acme).await.unwrap();
    assert!(deletion.identity_existed);
    assert!(deletion.ruleset_existed);
    assert!(ctx.documents.is_empty());

    let err = ctx.directory.tenants().delete(&acme).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_with_only_one_key_present() {
    let ctx = TestContext::new();
    ctx.documents
        .set_hash(
            "tenant:acme",
            &Tenant::new(TenantId::new("acme"), "Acme", None).to_fields(),
        )
        .await
        .unwrap();

    let deletion = ctx
        .directory
        .tenants()
        .delete(&TenantId::new("acme"))
        .await
        .unwrap();
    assert!(deletion.identity_existed);
    assert!(!deletion.ruleset_existed);
}

#[tokio::test]
async fn test_delete_with_corrupted_document_still_deletes() {
    let ctx = TestContext::new();
    let acme = ctx.create_tenant("acme").await;
    ctx.documents
        .set("tenant:acme:rulesets", b"garbage")
        .await
        .unwrap();

    let deletion = ctx.directory.tenants().delete(&acme).await.unwrap();
    assert_eq!(deletion.report.mutations(), 0);
    assert!(ctx.documents.is_empty());
}

// ============================================================================
// Seeding
// ============================================================================

fn seed_data() -> SeedData {
    let acme = TenantId::new("acme");
    let mut doc = RulesetDocument::empty(acme.clone(), "seeded");
    let mut eng = Group::new(acme.clone(), "eng", "Engineering", "");
    eng.members = vec![ALICE.to_string(), GHOST.to_string()];
    doc.groups.push(eng);
    SeedData {
        tenants: vec![Tenant::new(acme, "Acme", None)],
        rulesets: vec![doc],
    }
}

#[tokio::test]
async fn test_seed_creates_and_grants_membership() {
    let ctx = TestContext::new();
    ctx.add_users(&[ALICE]);

    let report = ctx.directory.seed(&seed_data()).await.unwrap();
    assert_eq!(report.tenants_created, vec![TenantId::new("acme")]);
    assert_eq!(report.rulesets_created, vec![TenantId::new("acme")]);
    assert_eq!(report.reconcile.added, vec![ALICE]);
    assert_eq!(report.reconcile.skipped_unknown, vec![GHOST]);
    assert_eq!(ctx.user_tenants(ALICE).await, vec!["acme"]);
}

#[tokio::test]
async fn test_seed_never_overwrites() {
    let ctx = TestContext::new();
    let acme = ctx.create_tenant("acme").await;
    ctx.create_group(&acme, "ops").await;

    let report = ctx.directory.seed(&seed_data()).await.unwrap();
    assert!(report.is_noop());
    assert_eq!(report.tenants_skipped, vec![acme.clone()]);

    let doc = ctx.directory.tenants().get_rulesets(&acme).await.unwrap();
    assert_eq!(doc.groups[0].id, "ops");

    let again = ctx.directory.seed(&seed_data()).await.unwrap();
    assert!(again.is_noop());
}

#[tokio::test]
async fn test_builtin_seed() {
    let ctx = TestContext::new();
    ctx.directory.seed(&SeedData::builtin()).await.unwrap();
    let tenants = ctx.directory.tenants().list().await.unwrap();
    assert_eq!(tenants.len(), 1);
    assert_eq!(tenants[0].id.as_str(), "default");
}
