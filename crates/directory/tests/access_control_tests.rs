//! Access-control manager integration tests.

mod common;

use serde_json::json;

use acl_directory::ErrorKind;
use acl_directory::config::DirectoryConfig;
use acl_directory::tenant::TenantId;
use acl_directory::types::AccessControlPayload;

use common::*;

fn payload(value: serde_json::Value) -> AccessControlPayload {
    AccessControlPayload::from_value(&value).unwrap()
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_normalizes_and_stamps() {
    let ctx = TestContext::new();
    let acme = ctx.create_tenant("acme").await;
    ctx.create_group(&acme, "eng").await;

    let created = ctx
        .directory
        .access_controls()
        .create(
            &acme,
            &payload(json!({
                "ruleset_id": " rs-1 ",
                "group_id": "eng",
                "agent_id": "item-agent",
                "tool": "search",
                "enabled": "no",
                "priority": 3
            })),
        )
        .await
        .unwrap();

    assert_eq!(created.ruleset_id.as_deref(), Some("rs-1"));
    assert_eq!(created.kind, "tool_validation");
    assert_eq!(created.target_agent.as_deref(), Some("item-agent"));
    assert_eq!(created.tool_name.as_deref(), Some("search"));
    assert!(!created.enabled);
    assert_eq!(created.name.as_deref(), Some("rs-1"));
    assert_eq!(created.extra.get("priority"), Some(&json!(3)));
    assert!(created.created_at.is_some());
    assert_eq!(created.created_at, created.updated_at);

    let stored = ctx.directory.access_controls().get(&acme, "rs-1").await.unwrap();
    assert_eq!(stored, created);
}

#[tokio::test]
async fn test_create_requires_identity_fields() {
    let ctx = TestContext::new();
    let acme = ctx.create_tenant("acme").await;
    let controls = ctx.directory.access_controls();

    for body in [
        json!({"group_id": "eng"}),
        json!({"ruleset_id": "rs-1"}),
        json!({"ruleset_id": "  ", "group_id": "eng"}),
    ] {
        let err = controls.create(&acme, &payload(body)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }
}

#[tokio::test]
async fn test_create_duplicate_ruleset_conflicts() {
    let ctx = TestContext::new();
    let acme = ctx.create_tenant("acme").await;
    ctx.create_group(&acme, "eng").await;
    let controls = ctx.directory.access_controls();

    controls
        .create(&acme, &payload(access_control("rs-1", "eng")))
        .await
        .unwrap();
    let err = controls
        .create(&acme, &payload(access_control("rs-1", "eng")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_create_checks_group_reference_once_groups_exist() {
    let ctx = TestContext::new();
    let acme = ctx.create_tenant("acme").await;
    let controls = ctx.directory.access_controls();

    // no groups yet: any group id is accepted
    controls
        .create(&acme, &payload(access_control("rs-early", "future")))
        .await
        .unwrap();

    ctx.create_group(&acme, "eng").await;
    let err = controls
        .create(&acme, &payload(access_control("rs-2", "future")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_create_without_document_is_not_found() {
    let ctx = TestContext::new();
    let err = ctx
        .directory
        .access_controls()
        .create(&TenantId::new("ghost"), &payload(access_control("rs-1", "eng")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!ctx.directory.rulesets().exists(&TenantId::new("ghost")).await.unwrap());
}

#[tokio::test]
async fn test_create_uses_configured_default_type() {
    let config = DirectoryConfig {
        default_access_control_type: "agent_validation".to_string(),
        ..Default::default()
    };
    let ctx = TestContext::with_config(config);
    let acme = ctx.create_tenant("acme").await;
    let created = ctx
        .directory
        .access_controls()
        .create(&acme, &payload(json!({"ruleset_id": "rs-1", "group_id": "any"})))
        .await
        .unwrap();
    assert_eq!(created.kind, "agent_validation");
}

// ============================================================================
// Update
// ============================================================================

#[tokio::test]
async fn test_update_merges_over_existing() {
    let ctx = TestContext::new();
    let acme = ctx.create_tenant("acme").await;
    ctx.create_group(&acme, "eng").await;
    ctx.create_group(&acme, "ops").await;
    let controls = ctx.directory.access_controls();
    let created = controls
        .create(&acme, &payload(access_control("rs-1", "eng")))
        .await
        .unwrap();

    let updated = controls
        .update(
            &acme,
            "rs-1",
            &payload(json!({"tool": "lookup", "group_id": "ops", "ruleset_id": "renamed"})),
        )
        .await
        .unwrap();

    assert_eq!(updated.ruleset_id.as_deref(), Some("rs-1"));
    assert_eq!(updated.group_id.as_deref(), Some("ops"));
    assert_eq!(updated.tool_name.as_deref(), Some("lookup"));
    assert_eq!(updated.target_agent.as_deref(), Some("item-agent"));
    assert_eq!(updated.rules, json!({"max_calls": 10}));
    assert_eq!(updated.description, "search limits");
    assert!(updated.enabled);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(controls.list(&acme).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_missing_ruleset_is_not_found() {
    let ctx = TestContext::new();
    let acme = ctx.create_tenant("acme").await;
    let err = ctx
        .directory
        .access_controls()
        .update(&acme, "rs-404", &payload(json!({"enabled": false})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_update_to_unknown_group_is_not_found() {
    let ctx = TestContext::new();
    let acme = ctx.create_tenant("acme").await;
    ctx.create_group(&acme, "eng").await;
    let controls = ctx.directory.access_controls();
    controls
        .create(&acme, &payload(access_control("rs-1", "eng")))
        .await
        .unwrap();

    let err = controls
        .update(&acme, "rs-1", &payload(json!({"group_id": "nope"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // a blank group id keeps the current one
    let updated = controls
        .update(&acme, "rs-1", &payload(json!({"group_id": ""})))
        .await
        .unwrap();
    assert_eq!(updated.group_id.as_deref(), Some("eng"));
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_access_control() {
    let ctx = TestContext::new();
    let acme = ctx.create_tenant("acme").await;
    ctx.create_group(&acme, "eng").await;
    let controls = ctx.directory.access_controls();
    controls
        .create(&acme, &payload(access_control("rs-1", "eng")))
        .await
        .unwrap();

    let removed = controls.delete(&acme, "rs-1").await.unwrap();
    assert_eq!(removed.ruleset_id.as_deref(), Some("rs-1"));
    assert!(controls.list(&acme).await.unwrap().is_empty());

    let err = controls.delete(&acme, "rs-1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
