pub mod payments;
pub mod tenant;
pub mod webhooks;

use {
    crate::AppState,
    axum::{
        Json, Router,
        extract::DefaultBodyLimit,
        http::StatusCode,
        routing::{get, post},
    },
    std::time::Duration,
    tower::ServiceBuilder,
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
};

/// Provider notifications are a few KB; anything bigger is not ours.
const BODY_LIMIT: usize = 64 * 1024;

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/payments", post(payments::create_payment))
        .route("/payments/{id}", get(payments::get_payment))
        .route("/payments/{id}/capture", post(payments::capture_payment))
        .route("/payments/{id}/cancel", post(payments::cancel_payment))
        .route("/payments/{id}/refund", post(payments::refund_payment))
        .route("/webhooks/{provider}", post(webhooks::provider_webhook))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::GATEWAY_TIMEOUT,
                    request_timeout,
                ))
                .layer(DefaultBodyLimit::max(BODY_LIMIT)),
        )
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "service": "payment-service"}))
}
