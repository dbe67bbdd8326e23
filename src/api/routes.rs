use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{jwt_auth, AppState};

use super::handlers::{
    event_created, membership_request, notify_user, register_push_token, remove_push_token,
    unsubscribe_email,
};
use super::health::{health, stats};
use super::metrics::metrics_handler;

pub fn api_routes(state: AppState) -> Router<AppState> {
    // Trigger and recipient routes require a bearer token
    let protected = Router::new()
        // Broadcast triggers
        .route("/broadcasts/event", post(event_created))
        .route("/broadcasts/membership-request", post(membership_request))
        .route("/broadcasts/user", post(notify_user))
        // Recipient lifecycle
        .route(
            "/recipients/push-token",
            post(register_push_token).delete(remove_push_token),
        )
        .route("/recipients/email/unsubscribe", post(unsubscribe_email))
        .route_layer(middleware::from_fn_with_state(state, jwt_auth));

    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", protected)
}
