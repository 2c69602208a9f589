use {
    crate::{
        AppState,
        adapters::api_errors::{ApiError, webhook_failure},
        domain::error::PipelineError,
    },
    axum::{
        Json,
        body::Bytes,
        extract::{Path, State},
        http::HeaderMap,
        response::{IntoResponse, Response},
    },
};

pub const SIGNATURE_HEADER: &str = "x-signature";

/// Takes the body as raw bytes: the signature covers exactly what was sent.
pub async fn provider_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, Response> {
    if provider != state.webhooks.provider() {
        let err = PipelineError::NotFound(format!("webhook provider {provider}"));
        return Err(ApiError(err).into_response());
    }

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let result = state
        .webhooks
        .handle(&body, signature)
        .await
        .map_err(webhook_failure)?;
    Ok(Json(serde_json::json!({"status": result.as_status()})))
}
