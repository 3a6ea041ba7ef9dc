//! HTTP-level integration tests for the workflow API endpoints.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router
//! without an actual TCP listener. Covers CRUD, ownership enforcement,
//! lifecycle transitions, statistics, and the audit-trail listing.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, delete_auth, get, get_auth, post_auth, post_json_auth, put_json_auth,
    seed_user_with_account, seed_workflow, token_for,
};
use sqlx::PgPool;

use replyflow_db::models::event::NewEvent;
use replyflow_db::repositories::EventRepo;

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_without_token_returns_401(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/api/workflows").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_garbage_token_returns_401(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/workflows", "not-a-jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_workflow_returns_201_draft(pool: PgPool) {
    let (user_id, account_id) = seed_user_with_account(&pool, "alice").await;
    let token = token_for(user_id);

    let app = common::build_test_app(pool);
    let response = post_json_auth(
        app,
        "/api/workflows",
        serde_json::json!({
            "account_id": account_id,
            "name": "Launch promo",
            "post_id": "post_1",
            "keywords": ["price", "link"],
            "message_template": "Hi {{username}}!",
        }),
        &token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "draft");
    assert_eq!(json["data"]["name"], "Launch promo");
    assert_eq!(json["data"]["user_id"], user_id);
    // Unspecified cap falls back to the default.
    assert_eq!(json["data"]["max_dms_per_day"], 100);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_with_empty_keywords_returns_400(pool: PgPool) {
    let (user_id, account_id) = seed_user_with_account(&pool, "alice").await;
    let token = token_for(user_id);

    let app = common::build_test_app(pool);
    let response = post_json_auth(
        app,
        "/api/workflows",
        serde_json::json!({
            "account_id": account_id,
            "name": "No keywords",
            "post_id": "post_1",
            "keywords": [],
            "message_template": "Hi!",
        }),
        &token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_against_foreign_account_returns_403(pool: PgPool) {
    let (_alice, alice_account) = seed_user_with_account(&pool, "alice").await;
    let (bob, _bob_account) = seed_user_with_account(&pool, "bob").await;
    let token = token_for(bob);

    let app = common::build_test_app(pool);
    let response = post_json_auth(
        app,
        "/api/workflows",
        serde_json::json!({
            "account_id": alice_account,
            "name": "Sneaky",
            "post_id": "post_1",
            "keywords": ["price"],
            "message_template": "Hi!",
        }),
        &token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Read / ownership
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_get_workflow_by_id(pool: PgPool) {
    let (user_id, account_id) = seed_user_with_account(&pool, "alice").await;
    let workflow = seed_workflow(&pool, user_id, account_id, "post_1").await;
    let token = token_for(user_id);

    let app = common::build_test_app(pool);
    let response = get_auth(app, &format!("/api/workflows/{}", workflow.id), &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["id"], workflow.id);
    assert_eq!(json["data"]["post_id"], "post_1");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_get_nonexistent_workflow_returns_404(pool: PgPool) {
    let (user_id, _) = seed_user_with_account(&pool, "alice").await;
    let token = token_for(user_id);

    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/workflows/999999", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_get_foreign_workflow_returns_403(pool: PgPool) {
    let (alice, alice_account) = seed_user_with_account(&pool, "alice").await;
    let (bob, _) = seed_user_with_account(&pool, "bob").await;
    let workflow = seed_workflow(&pool, alice, alice_account, "post_1").await;
    let token = token_for(bob);

    let app = common::build_test_app(pool);
    let response = get_auth(app, &format!("/api/workflows/{}", workflow.id), &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_returns_only_own_workflows(pool: PgPool) {
    let (alice, alice_account) = seed_user_with_account(&pool, "alice").await;
    let (bob, bob_account) = seed_user_with_account(&pool, "bob").await;
    seed_workflow(&pool, alice, alice_account, "post_a").await;
    seed_workflow(&pool, bob, bob_account, "post_b").await;
    let token = token_for(alice);

    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/workflows", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let rows = json["data"].as_array().expect("data should be an array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["post_id"], "post_a");
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_draft_workflow(pool: PgPool) {
    let (user_id, account_id) = seed_user_with_account(&pool, "alice").await;
    let workflow = seed_workflow(&pool, user_id, account_id, "post_1").await;
    let token = token_for(user_id);

    let app = common::build_test_app(pool);
    let response = put_json_auth(
        app,
        &format!("/api/workflows/{}", workflow.id),
        serde_json::json!({"name": "Renamed", "keywords": ["giveaway"]}),
        &token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["name"], "Renamed");
    assert_eq!(json["data"]["keywords"], serde_json::json!(["giveaway"]));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_active_workflow_returns_409(pool: PgPool) {
    let (user_id, account_id) = seed_user_with_account(&pool, "alice").await;
    let workflow = seed_workflow(&pool, user_id, account_id, "post_1").await;
    let token = token_for(user_id);

    let app = common::build_test_app(pool.clone());
    let response = post_auth(
        app,
        &format!("/api/workflows/{}/activate", workflow.id),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let app = common::build_test_app(pool);
    let response = put_json_auth(
        app,
        &format!("/api/workflows/{}", workflow.id),
        serde_json::json!({"name": "Too late"}),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_activate_pause_stop_cycle(pool: PgPool) {
    let (user_id, account_id) = seed_user_with_account(&pool, "alice").await;
    let workflow = seed_workflow(&pool, user_id, account_id, "post_1").await;
    let token = token_for(user_id);

    let app = common::build_test_app(pool.clone());
    let response = post_auth(
        app,
        &format!("/api/workflows/{}/activate", workflow.id),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "active");

    let app = common::build_test_app(pool.clone());
    let response = post_auth(app, &format!("/api/workflows/{}/pause", workflow.id), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "paused");

    let app = common::build_test_app(pool.clone());
    let response = post_auth(app, &format!("/api/workflows/{}/stop", workflow.id), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "stopped");

    // Each transition leaves an audit event behind.
    let events = EventRepo::list_by_workflow(&pool, workflow.id, None, 50)
        .await
        .expect("listing should succeed");
    let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert!(types.contains(&"workflow_activated"));
    assert!(types.contains(&"workflow_paused"));
    assert!(types.contains(&"workflow_stopped"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_stopped_workflow_cannot_reactivate(pool: PgPool) {
    let (user_id, account_id) = seed_user_with_account(&pool, "alice").await;
    let workflow = seed_workflow(&pool, user_id, account_id, "post_1").await;
    let token = token_for(user_id);

    for step in ["activate", "stop"] {
        let app = common::build_test_app(pool.clone());
        let response = post_auth(
            app,
            &format!("/api/workflows/{}/{step}", workflow.id),
            &token,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let app = common::build_test_app(pool);
    let response = post_auth(
        app,
        &format!("/api/workflows/{}/activate", workflow.id),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_pause_draft_returns_409(pool: PgPool) {
    let (user_id, account_id) = seed_user_with_account(&pool, "alice").await;
    let workflow = seed_workflow(&pool, user_id, account_id, "post_1").await;
    let token = token_for(user_id);

    let app = common::build_test_app(pool);
    let response = post_auth(app, &format!("/api/workflows/{}/pause", workflow.id), &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_draft_returns_204(pool: PgPool) {
    let (user_id, account_id) = seed_user_with_account(&pool, "alice").await;
    let workflow = seed_workflow(&pool, user_id, account_id, "post_1").await;
    let token = token_for(user_id);

    let app = common::build_test_app(pool.clone());
    let response = delete_auth(app, &format!("/api/workflows/{}", workflow.id), &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let app = common::build_test_app(pool);
    let response = get_auth(app, &format!("/api/workflows/{}", workflow.id), &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_active_returns_409(pool: PgPool) {
    let (user_id, account_id) = seed_user_with_account(&pool, "alice").await;
    let workflow = seed_workflow(&pool, user_id, account_id, "post_1").await;
    let token = token_for(user_id);

    let app = common::build_test_app(pool.clone());
    let response = post_auth(
        app,
        &format!("/api/workflows/{}/activate", workflow.id),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let app = common::build_test_app(pool);
    let response = delete_auth(app, &format!("/api/workflows/{}", workflow.id), &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Statistics and audit trail
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_stats_for_untriggered_workflow(pool: PgPool) {
    let (user_id, account_id) = seed_user_with_account(&pool, "alice").await;
    let workflow = seed_workflow(&pool, user_id, account_id, "post_1").await;
    let token = token_for(user_id);

    let app = common::build_test_app(pool);
    let response = get_auth(
        app,
        &format!("/api/workflows/{}/stats", workflow.id),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["total_triggers"], 0);
    assert_eq!(json["data"]["dms_sent"], 0);
    assert_eq!(json["data"]["success_rate"], 0.0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_events_listing_with_type_filter(pool: PgPool) {
    let (user_id, account_id) = seed_user_with_account(&pool, "alice").await;
    let workflow = seed_workflow(&pool, user_id, account_id, "post_1").await;
    let token = token_for(user_id);

    EventRepo::append(
        &pool,
        &NewEvent::comment_detected(workflow.id, "c1", "bob", "u9", "price?", "price"),
    )
    .await
    .expect("append should succeed");
    EventRepo::append(
        &pool,
        &NewEvent::dm_sent(workflow.id, "c1", "bob", "u9", "price", "mid_1"),
    )
    .await
    .expect("append should succeed");

    let app = common::build_test_app(pool.clone());
    let response = get_auth(
        app,
        &format!("/api/workflows/{}/events", workflow.id),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let app = common::build_test_app(pool);
    let response = get_auth(
        app,
        &format!("/api/workflows/{}/events?event_type=dm_sent", workflow.id),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["event_type"], "dm_sent");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_events_listing_rejects_unknown_type(pool: PgPool) {
    let (user_id, account_id) = seed_user_with_account(&pool, "alice").await;
    let workflow = seed_workflow(&pool, user_id, account_id, "post_1").await;
    let token = token_for(user_id);

    let app = common::build_test_app(pool);
    let response = get_auth(
        app,
        &format!("/api/workflows/{}/events?event_type=bogus", workflow.id),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_health_reports_ok(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["active_monitors"], 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_responses_are_gzipped_when_client_accepts(pool: PgPool) {
    use axum::body::Body;
    use axum::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    let app = common::build_test_app(pool);
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/health")
                .header(ACCEPT_ENCODING, "gzip")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_ENCODING).map(|v| v.as_bytes()),
        Some(b"gzip".as_ref())
    );
}
