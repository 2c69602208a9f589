use crate::domain::error::PipelineError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

// Обертка (Newtype) для доменной ошибки, чтобы реализовать для нее трейт Axum
#[derive(Debug)]
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

/// Same `{error_code, message}` body as every other API error.
pub fn error_body(status: StatusCode, error_code: &str, message: impl Into<String>) -> Response {
    let body = serde_json::json!({
        "error_code": error_code,
        "message": message.into(),
    });
    (status, Json(body)).into_response()
}

// Вся логика HTTP-ответов живет в слое адаптеров
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            PipelineError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                msg.clone(),
            ),
            PipelineError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            PipelineError::InvalidState(msg) => {
                (StatusCode::CONFLICT, "invalid_state", msg.clone())
            }
            PipelineError::Gateway {
                message,
                status,
                body,
            } => {
                tracing::error!(
                    upstream_status = ?status,
                    upstream_body = body.as_deref().unwrap_or(""),
                    "gateway error: {message}"
                );
                (
                    StatusCode::BAD_GATEWAY,
                    "gateway_error",
                    "payment provider request failed".to_string(),
                )
            }
            PipelineError::OutOfOrder(msg) => (StatusCode::CONFLICT, "out_of_order", msg.clone()),
            PipelineError::WebhookSignature(_) => (
                StatusCode::UNAUTHORIZED,
                "webhook_error",
                "invalid webhook signature".to_string(),
            ),
            PipelineError::Database(err) => {
                tracing::error!("database error: {err}");
                internal()
            }
            PipelineError::Persistence(msg) => {
                tracing::error!("persistence error: {msg}");
                internal()
            }
            PipelineError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                internal()
            }
            PipelineError::Publish(msg) => {
                tracing::error!("publish error: {msg}");
                internal()
            }
        };

        error_body(status, error_code, message)
    }
}

/// Webhook replies only tell a bad signature apart from everything else.
/// Any other failure is a 500 so the provider redelivers.
pub fn webhook_failure(err: PipelineError) -> Response {
    match err {
        PipelineError::WebhookSignature(_) => ApiError(err).into_response(),
        other => {
            tracing::warn!(error = %other, "webhook not processed, awaiting redelivery");
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "webhook_processing_failed",
                "webhook not processed",
            )
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal error".to_string(),
    )
}
