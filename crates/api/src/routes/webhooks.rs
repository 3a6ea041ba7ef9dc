//! Route definitions for provider webhooks.

use axum::routing::get;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`. No bearer token; the GET handshake is
/// authenticated by the shared verify token and the POST by its HMAC
/// signature header.
///
/// ```text
/// GET  /instagram   -> verify (subscription handshake)
/// POST /instagram   -> receive (signed change notifications)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/instagram", get(webhooks::verify).post(webhooks::receive))
}
