use {
    super::{
        events::DomainEventType,
        id::WebhookId,
        money::MoneyAmount,
        payment::PaymentStatus,
    },
    chrono::{DateTime, Utc},
    derive_more::Display,
    serde::{Deserialize, Serialize},
};

/// Notification body as sent by the provider. Only the fields we act on are
/// typed; `object` is kept verbatim and stored as payment metadata.
#[derive(Debug, Deserialize)]
pub struct ProviderNotification {
    pub id: Option<String>,
    pub event: String,
    #[serde(default)]
    pub object: serde_json::Value,
}

impl ProviderNotification {
    /// Provider payment id the event refers to. Refund objects carry their
    /// own id plus `payment_id`; payment objects only `id`.
    pub fn payment_external_id(&self, kind: WebhookEventKind) -> Option<&str> {
        let field = match kind {
            WebhookEventKind::RefundSucceeded => "payment_id",
            _ => "id",
        };
        self.object.get(field).and_then(|v| v.as_str())
    }

    /// `object.amount.value`, if present and well-formed.
    pub fn amount(&self) -> Option<MoneyAmount> {
        self.object
            .get("amount")
            .and_then(|a| a.get("value"))
            .and_then(|v| v.as_str())
            .and_then(|v| MoneyAmount::from_decimal_str(v).ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum WebhookEventKind {
    #[display("payment.succeeded")]
    PaymentSucceeded,
    #[display("payment.canceled")]
    PaymentCanceled,
    #[display("payment.waiting_for_capture")]
    PaymentWaitingForCapture,
    #[display("refund.succeeded")]
    RefundSucceeded,
    #[display("unknown")]
    Unknown,
}

impl WebhookEventKind {
    pub fn target_status(&self) -> Option<PaymentStatus> {
        match self {
            Self::PaymentSucceeded => Some(PaymentStatus::Succeeded),
            Self::PaymentCanceled => Some(PaymentStatus::Canceled),
            Self::PaymentWaitingForCapture => Some(PaymentStatus::Authorized),
            Self::RefundSucceeded => Some(PaymentStatus::Refunded),
            Self::Unknown => None,
        }
    }

    pub fn domain_event(&self) -> Option<DomainEventType> {
        match self {
            Self::PaymentSucceeded => Some(DomainEventType::PaymentSucceeded),
            Self::PaymentCanceled => Some(DomainEventType::PaymentCanceled),
            Self::RefundSucceeded => Some(DomainEventType::PaymentRefunded),
            Self::PaymentWaitingForCapture | Self::Unknown => None,
        }
    }
}

impl From<&str> for WebhookEventKind {
    fn from(event: &str) -> Self {
        match event {
            "payment.succeeded" => Self::PaymentSucceeded,
            "payment.canceled" => Self::PaymentCanceled,
            "payment.waiting_for_capture" => Self::PaymentWaitingForCapture,
            "refund.succeeded" => Self::RefundSucceeded,
            _ => Self::Unknown,
        }
    }
}

/// For INSERT into `webhook_logs`, before any state is touched.
#[derive(Debug, Clone)]
pub struct NewWebhookLog {
    pub webhook_id: WebhookId,
    pub provider: String,
    pub event_type: String,
    /// Raw body exactly as signed by the provider.
    pub payload: String,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookLog {
    pub webhook_id: String,
    pub provider: String,
    pub event_type: String,
    pub payload: String,
    pub signature: Option<String>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}
