//! HTTP surface over the booking core.
//!
//! Handlers are thin: they parse the request, call one `core` operation and render
//! the result or the error's [`crate::errors::ErrorKind`]. All state lives in the
//! database; [`AppState`] only carries the connection pool and the studio clock.

use axum::{
    Json, Router,
    response::IntoResponse,
    routing::{get, patch, post},
};
use sea_orm::DatabaseConnection;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::core::schedule::StudioClock;

/// Credit balance and issuance endpoints
pub mod credits;
/// Error to response mapping
pub mod error;
/// Extractors with JSON error bodies
pub mod extract;
/// Registration booking and status endpoints
pub mod registrations;
/// Session listing and availability endpoints
pub mod sessions;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Connection pool
    pub db: DatabaseConnection,
    /// Source of the studio's "today"
    pub clock: StudioClock,
}

/// Create the router for the booking service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/:id/occurrences", get(sessions::get_occurrences))
        .route("/sessions/:id/availability", get(sessions::get_availability))
        .route("/sessions/:id/occupancy", get(sessions::get_occupancy))
        .route(
            "/classes/:id/availability",
            get(sessions::get_class_availability),
        )
        .route("/registrations", post(registrations::create_registration))
        .route("/registrations/:id", get(registrations::get_registration))
        .route(
            "/registrations/:id/status",
            patch(registrations::update_status),
        )
        .route(
            "/registrations/:id/status/preview",
            post(registrations::preview_status),
        )
        .route(
            "/users/:id/registrations",
            get(registrations::list_user_registrations),
        )
        .route(
            "/users/:id/credits",
            get(credits::get_balances).post(credits::post_credits),
        )
        .route(
            "/users/:id/credits/transactions",
            get(credits::get_transactions),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "studio-booking"
    }))
}

#[cfg(test)]
pub(crate) mod test_support {
    #![allow(clippy::unwrap_used)]
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    /// Sends one request through the router and decodes the JSON body.
    pub async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }
}
