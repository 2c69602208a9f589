use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("gateway: {message}")]
    Gateway {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    /// The event is for a status the payment has not reached yet.
    #[error("out of order: {0}")]
    OutOfOrder(String),

    #[error("webhook signature: {0}")]
    WebhookSignature(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("persistence: {0}")]
    Persistence(String),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("publish: {0}")]
    Publish(String),
}

impl PipelineError {
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    /// Client errors are not retried and never touch the gateway.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::InvalidState(_)
        )
    }
}
