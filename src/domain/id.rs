use {
    super::error::PipelineError,
    derive_more::Display,
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

const MAX_ID_LEN: usize = 255;

fn validated(kind: &str, id: String) -> Result<String, PipelineError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::Validation(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_ID_LEN {
        return Err(PipelineError::Validation(format!(
            "{kind} longer than {MAX_ID_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Provider-side payment identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        validated("ExternalId", id.into()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Provider-issued notification identifier, the webhook idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebhookId(String);

impl WebhookId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        validated("WebhookId", id.into()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        validated("TenantId", id.into()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Token sent as `Idempotency-Key` on every mutating gateway call.
///
/// Built once per logical operation; retries of that operation reuse it.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn for_create(order_id: Uuid, now_ms: i64) -> Self {
        Self(format!("order_{order_id}_{now_ms}"))
    }

    pub fn for_capture(payment_id: Uuid, now_ms: i64) -> Self {
        Self(format!("capture_{payment_id}_{now_ms}"))
    }

    pub fn for_cancel(payment_id: Uuid, now_ms: i64) -> Self {
        Self(format!("cancel_{payment_id}_{now_ms}"))
    }

    pub fn for_refund(payment_id: Uuid, now_ms: i64) -> Self {
        Self(format!("refund_{payment_id}_{now_ms}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
