//! Tests for the approval link endpoint

mod common;

use chrono::{Duration, Utc};
use common::{
    create_failing_commit_server, create_test_server, pending, pending_at, seed_pending,
};
use gatekeeper_broker::crypto::hash_password;
use gatekeeper_broker::{IdentityProvider, RegistrationStore};
use serde_json::json;

#[tokio::test]
async fn test_approval_scenario() {
    let ctx = create_test_server();
    seed_pending(ctx.store.as_ref(), pending("T1", "a@b.com"));

    let response = ctx.server.get("/verifyAdmin?token=T1").await;
    assert_eq!(response.status_code(), 200);
    assert!(response.text().contains("Account approved"));
    assert!(response.text().contains("https://admin.test/login"));

    let record = ctx.store.get_pending("T1").unwrap().unwrap();
    assert!(record.verified);
    let admin = ctx.store.get_admin("a@b.com").unwrap().unwrap();
    assert_eq!(admin.first_name, "Ada");
    assert!(admin.created_at <= Utc::now());
    assert_eq!(ctx.store.admin_count(), 1);

    // Second click: rejected, nothing written
    let writes = ctx.store.write_count();
    let response = ctx.server.get("/verifyAdmin?token=T1").await;
    assert_eq!(response.status_code(), 400);
    assert!(response.text().contains("Invalid or used link"));
    assert_eq!(ctx.store.write_count(), writes);
    assert_eq!(ctx.identity.account_count(), 1);
}

#[tokio::test]
async fn test_unknown_token_writes_nothing() {
    let ctx = create_test_server();
    seed_pending(ctx.store.as_ref(), pending("T1", "a@b.com"));
    let writes = ctx.store.write_count();

    let response = ctx.server.get("/verifyAdmin?token=nope").await;

    assert_eq!(response.status_code(), 400);
    assert!(response.text().contains("Invalid or used link"));
    assert_eq!(ctx.store.write_count(), writes);
    assert_eq!(ctx.store.admin_count(), 0);
}

#[tokio::test]
async fn test_missing_token_has_its_own_page() {
    let ctx = create_test_server();

    for path in ["/verifyAdmin", "/verifyAdmin?token=", "/verifyAdmin?token=%20"] {
        let response = ctx.server.get(path).await;
        assert_eq!(response.status_code(), 400);
        assert!(response.text().contains("Missing token"));
    }
    assert_eq!(ctx.store.write_count(), 0);
}

#[tokio::test]
async fn test_token_in_form_body() {
    let ctx = create_test_server();
    seed_pending(ctx.store.as_ref(), pending("T1", "a@b.com"));

    let response = ctx.server.post("/verifyAdmin").form(&[("token", "T1")]).await;

    assert_eq!(response.status_code(), 200);
    assert!(ctx.store.get_pending("T1").unwrap().unwrap().verified);
}

#[tokio::test]
async fn test_token_in_json_body() {
    let ctx = create_test_server();
    seed_pending(ctx.store.as_ref(), pending("T1", "a@b.com"));

    let response = ctx.server.post("/verifyAdmin").json(&json!({ "token": "T1" })).await;

    assert_eq!(response.status_code(), 200);
    assert!(ctx.store.get_pending("T1").unwrap().unwrap().verified);
}

#[tokio::test]
async fn test_post_without_token_is_missing() {
    let ctx = create_test_server();

    let response = ctx.server.post("/verifyAdmin").json(&json!({})).await;

    assert_eq!(response.status_code(), 400);
    assert!(response.text().contains("Missing token"));
}

#[tokio::test]
async fn test_expired_token_is_invalid() {
    let ctx = create_test_server();
    let issued = Utc::now() - Duration::hours(25);
    seed_pending(ctx.store.as_ref(), pending_at("T1", "a@b.com", issued));

    let response = ctx.server.get("/verifyAdmin?token=T1").await;

    assert_eq!(response.status_code(), 400);
    assert!(!ctx.store.get_pending("T1").unwrap().unwrap().verified);
    assert_eq!(ctx.store.admin_count(), 0);
}

#[tokio::test]
async fn test_reapproval_refreshes_names_and_keeps_created_at() {
    let ctx = create_test_server();
    seed_pending(ctx.store.as_ref(), pending("T1", "a@b.com"));
    ctx.server.get("/verifyAdmin?token=T1").await;
    let first = ctx.store.get_admin("a@b.com").unwrap().unwrap();

    let mut renamed = pending("T2", "a@b.com");
    renamed.first_name = "Augusta".to_string();
    renamed.last_name = "King".to_string();
    seed_pending(ctx.store.as_ref(), renamed);

    let response = ctx.server.get("/verifyAdmin?token=T2").await;
    assert_eq!(response.status_code(), 200);
    assert!(response.text().contains("has been updated"));

    let admin = ctx.store.get_admin("a@b.com").unwrap().unwrap();
    assert_eq!(admin.first_name, "Augusta");
    assert_eq!(admin.last_name, "King");
    assert_eq!(admin.created_at, first.created_at);
    assert_eq!(ctx.store.admin_count(), 1);
}

#[tokio::test]
async fn test_existing_identity_account_is_updated() {
    let ctx = create_test_server();
    let old_hash = hash_password("old password", 4).unwrap();
    let existing = ctx.identity.create_account("a@b.com", &old_hash, false).unwrap();
    seed_pending(ctx.store.as_ref(), pending("T1", "a@b.com"));

    let response = ctx.server.get("/verifyAdmin?token=T1").await;
    assert_eq!(response.status_code(), 200);

    let account = ctx.identity.get_account_by_email("a@b.com").unwrap().unwrap();
    assert_eq!(account.uid, existing.uid);
    assert!(account.email_verified);
    assert!(ctx.identity.verify_credentials("a@b.com", "correct horse").unwrap());
    assert_eq!(ctx.identity.account_count(), 1);
}

#[tokio::test]
async fn test_commit_failure_shows_error_page() {
    let (server, store) = create_failing_commit_server();
    seed_pending(&store.inner, pending("T1", "a@b.com"));

    let response = server.get("/verifyAdmin?token=T1").await;
    assert_eq!(response.status_code(), 500);
    assert!(response.text().contains("Something went wrong"));

    let record = store.inner.get_pending("T1").unwrap().unwrap();
    assert!(!record.verified);
    assert!(record.rejected_at.is_none());
    assert_eq!(store.inner.admin_count(), 0);
}

#[tokio::test]
async fn test_health() {
    let ctx = create_test_server();

    let response = ctx.server.get("/health").await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<serde_json::Value>(), json!({ "status": "ok" }));
}
