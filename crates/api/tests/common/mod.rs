//! Shared helpers for HTTP-level integration tests.
//!
//! `build_test_app` mirrors the router construction in `main.rs` so tests
//! exercise the same middleware stack (CORS, request ID, timeout, tracing,
//! compression, panic recovery) that production uses. Requests go straight to the router
//! via `tower::ServiceExt` without a TCP listener.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use replyflow_api::auth::jwt::{generate_access_token, JwtConfig};
use replyflow_api::config::ServerConfig;
use replyflow_api::routes;
use replyflow_api::state::AppState;
use replyflow_api::ws::WsManager;
use replyflow_core::types::DbId;
use replyflow_db::models::account::CreateAccount;
use replyflow_db::models::user::CreateUser;
use replyflow_db::models::workflow::CreateWorkflow;
use replyflow_db::repositories::{AccountRepo, UserRepo, WorkflowRepo};
use replyflow_engine::{
    DispatchService, DuplicateGuard, EngineConfig, EngineStore, MonitorScheduler, PgEngineStore,
    RateLimiter,
};
use replyflow_events::EventBus;
use replyflow_instagram::{GraphClient, ProviderApi};

/// Verify token the test config uses for the webhook handshake.
pub const TEST_VERIFY_TOKEN: &str = "test-verify-token";
/// App secret the test config uses for webhook signatures.
pub const TEST_APP_SECRET: &str = "test-app-secret";

/// Build a test `ServerConfig` with safe defaults.
///
/// The provider base URL points at an unroutable local port so any poll task
/// a test accidentally starts fails fast instead of reaching the real API.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "integration-test-secret-with-enough-length".to_string(),
            access_token_expiry_mins: 60,
        },
        webhook_verify_token: TEST_VERIFY_TOKEN.to_string(),
        app_secret: TEST_APP_SECRET.to_string(),
        provider_base_url: "http://127.0.0.1:9".to_string(),
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let ws_manager = Arc::new(WsManager::new());

    let engine_config = EngineConfig::default();
    let store: Arc<dyn EngineStore> = Arc::new(PgEngineStore::new(pool.clone()));
    let provider: Arc<dyn ProviderApi> =
        Arc::new(GraphClient::new(config.provider_base_url.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(
        engine_config.hourly_dm_limit,
        engine_config.daily_dm_limit,
    ));
    let duplicate_guard = Arc::new(DuplicateGuard::new(
        Arc::clone(&store),
        engine_config.dedupe_ttl,
    ));
    let event_bus = Arc::new(EventBus::default());
    let dispatch = Arc::new(DispatchService::new(
        Arc::clone(&store),
        Arc::clone(&provider),
        rate_limiter,
        Arc::clone(&duplicate_guard),
        Arc::clone(&event_bus),
    ));
    let scheduler = MonitorScheduler::new(
        store,
        provider,
        Arc::clone(&dispatch),
        duplicate_guard,
        Arc::clone(&event_bus),
        engine_config,
    );

    let state = AppState {
        pool,
        config: Arc::new(config),
        ws_manager,
        scheduler,
        dispatch,
        event_bus,
        started_at: chrono::Utc::now(),
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .route("/ws", axum::routing::get(replyflow_api::ws::ws_handler))
        .nest("/webhooks", routes::webhooks::router())
        .nest("/api", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// Mint a valid bearer token for the given user id.
pub fn token_for(user_id: DbId) -> String {
    generate_access_token(user_id, &test_config().jwt).expect("token generation should succeed")
}

// ---------------------------------------------------------------------------
// Seed helpers
// ---------------------------------------------------------------------------

/// Create a user plus one connected account, returning `(user_id, account_id)`.
pub async fn seed_user_with_account(pool: &PgPool, username: &str) -> (DbId, DbId) {
    let user = UserRepo::create(
        pool,
        &CreateUser {
            provider_user_id: format!("puid-{username}"),
            username: username.to_string(),
        },
    )
    .await
    .expect("user creation should succeed");

    let account = AccountRepo::create(
        pool,
        &CreateAccount {
            user_id: user.id,
            provider_account_id: format!("acct-{username}"),
            username: username.to_string(),
            access_token: "test-token".to_string(),
            token_expires_at: None,
        },
    )
    .await
    .expect("account creation should succeed");

    (user.id, account.id)
}

/// Create a draft workflow with sensible defaults directly in the database.
pub async fn seed_workflow(
    pool: &PgPool,
    user_id: DbId,
    account_id: DbId,
    post_id: &str,
) -> replyflow_db::models::workflow::Workflow {
    WorkflowRepo::create(
        pool,
        &CreateWorkflow {
            user_id,
            account_id,
            name: "Launch promo".to_string(),
            post_id: post_id.to_string(),
            keywords: vec!["price".to_string(), "link".to_string()],
            message_template: "Hi {{username}}, here you go!".to_string(),
            link_url: None,
            case_sensitive: false,
            exact_match: false,
            max_dms_per_day: 100,
        },
    )
    .await
    .expect("workflow creation should succeed")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send a GET request without authentication.
pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a GET request with a bearer token.
pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a POST request with a JSON body and a bearer token.
pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send an empty-bodied POST with a bearer token (status transitions).
pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a PUT request with a JSON body and a bearer token.
pub async fn put_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a DELETE request with a bearer token.
pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a raw POST with explicit headers (webhook signature tests).
pub async fn post_raw(
    app: Router,
    uri: &str,
    body: Vec<u8>,
    headers: &[(&str, String)],
) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, value.as_str());
    }
    app.oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// Read a response body to completion and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be valid JSON")
}

/// Read a response body to completion as a UTF-8 string.
pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("body should be valid UTF-8")
}
