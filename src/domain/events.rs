use {
    super::{error::PipelineError, id::TenantId, money::MoneyAmount, payment::Payment},
    chrono::{DateTime, Utc},
    serde::Serialize,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEventType {
    PaymentSucceeded,
    PaymentCanceled,
    PaymentRefunded,
}

impl DomainEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentSucceeded => "PAYMENT_SUCCEEDED",
            Self::PaymentCanceled => "PAYMENT_CANCELED",
            Self::PaymentRefunded => "PAYMENT_REFUNDED",
        }
    }
}

/// Envelope published to the `payments` topic of the event bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub event_type: DomainEventType,
    pub tenant_id: TenantId,
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub amount: MoneyAmount,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent {
    pub fn for_payment(event_type: DomainEventType, payment: &Payment, amount: MoneyAmount) -> Self {
        Self {
            event_type,
            tenant_id: payment.tenant_id.clone(),
            payment_id: payment.id,
            order_id: payment.order_id,
            amount,
            timestamp: Utc::now(),
        }
    }
}

/// Best-effort, non-blocking event sink. An error means the event was not
/// queued; callers log it and carry on, committed state is never undone.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: DomainEvent) -> Result<(), PipelineError>;
}
