use {
    super::{
        error::PipelineError,
        id::{ExternalId, TenantId},
        money::{Currency, MoneyAmount},
        order::OrderUpdate,
        split::SplitTransfer,
    },
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Authorized,
    Captured,
    Succeeded,
    Canceled,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        Self::Created,
        Self::Authorized,
        Self::Captured,
        Self::Succeeded,
        Self::Canceled,
        Self::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Authorized => "authorized",
            Self::Captured => "captured",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
            Self::Refunded => "refunded",
        }
    }

    /// Transition table. Anything not listed here is rejected on write,
    /// including every move backwards.
    pub fn can_transition_to(&self, next: &PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Created, Authorized)
                | (Created, Canceled)
                | (Authorized, Captured)
                | (Authorized, Succeeded)
                | (Authorized, Canceled)
                | (Captured, Succeeded)
                | (Succeeded, Refunded)
        )
    }

    /// Whether `target` lies ahead of `self` along one or more transitions.
    pub fn can_reach(&self, target: &PaymentStatus) -> bool {
        let mut frontier = vec![*self];
        let mut seen = Vec::with_capacity(Self::ALL.len());
        while let Some(status) = frontier.pop() {
            for next in Self::ALL {
                if status.can_transition_to(&next) && !seen.contains(&next) {
                    if next == *target {
                        return true;
                    }
                    seen.push(next);
                    frontier.push(next);
                }
            }
        }
        false
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::Refunded)
    }

    /// Statuses that block a new payment for the same order.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Authorized | Self::Captured | Self::Succeeded
        )
    }

    /// Maps the provider's payment status onto ours.
    pub fn from_provider(status: &str) -> Result<PaymentStatus, PipelineError> {
        match status {
            "pending" => Ok(Self::Created),
            "waiting_for_capture" => Ok(Self::Authorized),
            "succeeded" => Ok(Self::Succeeded),
            "canceled" => Ok(Self::Canceled),
            other => Err(PipelineError::gateway(format!(
                "unknown provider payment status: {other}"
            ))),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| PipelineError::Validation(format!("unknown payment status: {s}")))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Transferred,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Transferred => "transferred",
        }
    }
}

impl TryFrom<&str> for TransferStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "transferred" => Ok(Self::Transferred),
            other => Err(PipelineError::Validation(format!(
                "unknown transfer status: {other}"
            ))),
        }
    }
}

/// Full payment record from the ledger (for reads).
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub order_id: Uuid,
    pub provider: String,
    pub external_id: ExternalId,
    pub amount: MoneyAmount,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub metadata: serde_json::Value,
    pub confirmation_url: Option<String>,
    pub refunded_amount: Option<MoneyAmount>,
    pub created_at: DateTime<Utc>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub captured_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentTransfer {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub vendor_id: Uuid,
    pub vendor_account_id: Option<String>,
    pub amount: MoneyAmount,
    pub platform_fee: MoneyAmount,
    pub vendor_payout: MoneyAmount,
    pub status: TransferStatus,
    pub transferred_at: Option<DateTime<Utc>>,
}

pub struct NewPaymentParams {
    pub tenant_id: TenantId,
    pub order_id: Uuid,
    pub provider: String,
    pub external_id: ExternalId,
    pub amount: MoneyAmount,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub metadata: serde_json::Value,
    pub confirmation_url: Option<String>,
}

/// For INSERT; id generated in Rust via Uuid::now_v7().
#[derive(Debug, Clone)]
pub struct NewPayment {
    id: Uuid,
    tenant_id: TenantId,
    order_id: Uuid,
    provider: String,
    external_id: ExternalId,
    amount: MoneyAmount,
    currency: Currency,
    status: PaymentStatus,
    metadata: serde_json::Value,
    confirmation_url: Option<String>,
}

impl NewPayment {
    pub fn new(p: NewPaymentParams) -> Self {
        Self {
            id: Uuid::now_v7(),
            tenant_id: p.tenant_id,
            order_id: p.order_id,
            provider: p.provider,
            external_id: p.external_id,
            amount: p.amount,
            currency: p.currency,
            status: p.status,
            metadata: p.metadata,
            confirmation_url: p.confirmation_url,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn external_id(&self) -> &ExternalId {
        &self.external_id
    }

    pub fn amount(&self) -> MoneyAmount {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    pub fn confirmation_url(&self) -> Option<&str> {
        self.confirmation_url.as_deref()
    }

    /// Transfer rows owned by this payment, one per split.
    pub fn transfers(&self, splits: &[SplitTransfer]) -> Vec<NewTransfer> {
        splits
            .iter()
            .map(|split| NewTransfer {
                id: Uuid::now_v7(),
                payment_id: self.id,
                tenant_id: self.tenant_id.clone(),
                vendor_id: split.vendor_id,
                vendor_account_id: split.vendor_account_id.clone(),
                amount: split.gross,
                platform_fee: split.platform_fee,
                vendor_payout: split.vendor_payout,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub tenant_id: TenantId,
    pub vendor_id: Uuid,
    pub vendor_account_id: Option<String>,
    pub amount: MoneyAmount,
    pub platform_fee: MoneyAmount,
    pub vendor_payout: MoneyAmount,
}

/// A single status change plus the order and transfer writes that must
/// commit with it.
#[derive(Debug, Clone)]
pub struct PaymentTransition {
    pub payment_id: Uuid,
    pub tenant_id: TenantId,
    pub order_id: Uuid,
    pub to: PaymentStatus,
    pub order_update: Option<OrderUpdate>,
    pub settle_transfers: bool,
    pub metadata: Option<serde_json::Value>,
    pub refunded_amount: Option<MoneyAmount>,
}

impl PaymentTransition {
    pub fn new(payment: &Payment, to: PaymentStatus) -> Self {
        let order_update = match to {
            PaymentStatus::Created => None,
            PaymentStatus::Authorized => Some(OrderUpdate::AUTHORIZED),
            PaymentStatus::Captured | PaymentStatus::Succeeded => Some(OrderUpdate::PAID),
            PaymentStatus::Canceled => Some(OrderUpdate::CANCELLED),
            PaymentStatus::Refunded => Some(OrderUpdate::REFUNDED),
        };
        Self {
            payment_id: payment.id,
            tenant_id: payment.tenant_id.clone(),
            order_id: payment.order_id,
            to,
            order_update,
            settle_transfers: to == PaymentStatus::Succeeded,
            metadata: None,
            refunded_amount: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_refunded_amount(mut self, amount: MoneyAmount) -> Self {
        self.refunded_amount = Some(amount);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Status changed; dependent order/transfer writes committed with it.
    Applied { previous: PaymentStatus },
    /// Payment already had the target status.
    Unchanged,
    /// Transition not in the table; nothing written.
    Rejected { current: PaymentStatus },
}

#[derive(Debug)]
pub enum ProcessResult {
    /// Transition applied for this payment.
    Applied(Uuid),
    /// Payment was already in the target status.
    Stale(Uuid),
    /// Transition not allowed by the state machine (e.g. reordered event).
    Anomaly(Uuid),
    /// Webhook id already processed or being processed.
    Duplicate,
    /// Unknown event type or no matching payment.
    Ignored,
}

impl ProcessResult {
    pub fn as_status(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Stale(_) => "skipped",
            Self::Anomaly(_) => "anomaly",
            Self::Duplicate => "duplicate",
            Self::Ignored => "ignored",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaymentStatus::*;

    #[test]
    fn reachability_follows_the_table() {
        assert!(Created.can_reach(&Succeeded));
        assert!(Created.can_reach(&Refunded));
        assert!(Authorized.can_reach(&Refunded));
        assert!(Captured.can_reach(&Refunded));

        assert!(!Captured.can_reach(&Canceled));
        assert!(!Succeeded.can_reach(&Authorized));
        assert!(!Succeeded.can_reach(&Succeeded));
        for status in PaymentStatus::ALL {
            assert!(!Canceled.can_reach(&status));
            assert!(!Refunded.can_reach(&status));
        }
    }

    #[test]
    fn provider_statuses() {
        assert_eq!(PaymentStatus::from_provider("pending").unwrap(), Created);
        assert_eq!(
            PaymentStatus::from_provider("waiting_for_capture").unwrap(),
            Authorized
        );
        assert_eq!(PaymentStatus::from_provider("succeeded").unwrap(), Succeeded);
        assert_eq!(PaymentStatus::from_provider("canceled").unwrap(), Canceled);

        let err = PaymentStatus::from_provider("refunded_partially").unwrap_err();
        assert!(matches!(err, PipelineError::Gateway { .. }), "got {err:?}");
        assert!(PaymentStatus::from_provider("").is_err());
    }
}
