use {
    crate::domain::{
        error::PipelineError,
        events::{DomainEvent, DomainEventType, EventPublisher},
        id::{ExternalId, IdempotencyKey, TenantId},
        money::{CommissionRate, Currency, MoneyAmount},
        payment::{
            NewPayment, NewPaymentParams, Payment, PaymentStatus, PaymentTransfer,
            PaymentTransition, TransitionOutcome,
        },
        provider::{CreatePaymentRequest, PaymentGateway},
        split::{calculate_transfers, transfers_total},
        store::LedgerStore,
    },
    chrono::Utc,
    serde::Serialize,
    std::sync::Arc,
    uuid::Uuid,
};

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: Currency,
    /// Used when the tenant has no commission rate of its own.
    pub default_commission: CommissionRate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPayment {
    pub payment_id: Uuid,
    pub external_id: ExternalId,
    pub confirmation_url: Option<String>,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentDetails {
    #[serde(flatten)]
    pub payment: Payment,
    pub transfers: Vec<PaymentTransfer>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundedPayment {
    pub payment_id: Uuid,
    pub refund_id: String,
    pub amount: MoneyAmount,
    pub status: PaymentStatus,
}

/// Synchronous, tenant-scoped payment actions: create, capture, cancel, refund.
///
/// Gateway calls happen before any local write, so a failed or timed-out
/// call leaves the ledger untouched and the request can be retried.
pub struct PaymentService {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
    settings: PaymentSettings,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            publisher,
            settings,
        }
    }

    #[tracing::instrument(name = "create_payment", skip(self, tenant), fields(tenant_id = %tenant))]
    pub async fn create_payment(
        &self,
        tenant: &TenantId,
        order_id: Uuid,
    ) -> Result<CreatedPayment, PipelineError> {
        let order = self
            .store
            .load_order(tenant, order_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("order {order_id}")))?;

        if let Some(existing) = self.store.active_payment_for_order(tenant, order_id).await? {
            return Err(PipelineError::InvalidState(format!(
                "order {order_id} already has active payment {existing}"
            )));
        }

        if order.items.is_empty() {
            return Err(PipelineError::Validation(format!(
                "order {order_id} has no items"
            )));
        }
        if order.total_amount.is_zero() {
            return Err(PipelineError::Validation(format!(
                "order {order_id} has zero total"
            )));
        }

        let rate = order.commission_rate.unwrap_or(self.settings.default_commission);
        let splits = calculate_transfers(&order.items, rate)?;
        let items_total = transfers_total(&splits)?;
        if items_total != order.total_amount {
            return Err(PipelineError::Validation(format!(
                "order {order_id} total {} does not match items total {items_total}",
                order.total_amount
            )));
        }

        let request = CreatePaymentRequest {
            order_id,
            order_number: order.order_number.clone(),
            tenant_id: tenant.clone(),
            amount: order.total_amount,
            currency: self.settings.currency,
            transfers: splits.clone(),
        };
        let key = IdempotencyKey::for_create(order_id, Utc::now().timestamp_millis());
        let remote = self.gateway.create(request, key).await?;

        let payment = NewPayment::new(NewPaymentParams {
            tenant_id: tenant.clone(),
            order_id,
            provider: self.gateway.provider().to_string(),
            external_id: remote.external_id.clone(),
            amount: order.total_amount,
            currency: self.settings.currency,
            status: remote.status,
            metadata: remote.raw,
            confirmation_url: remote.confirmation_url.clone(),
        });
        let transfers = payment.transfers(&splits);

        if let Err(e) = self.store.insert_payment(&payment, &transfers).await {
            // The remote payment exists but nothing local does; it stays
            // unconfirmed on the provider side and expires there.
            tracing::error!(
                external_id = %remote.external_id,
                error = %e,
                "payment created at provider but not persisted"
            );
            return Err(e);
        }

        tracing::info!(
            payment_id = %payment.id(),
            external_id = %remote.external_id,
            transfers = transfers.len(),
            rate = %rate,
            "payment created"
        );

        Ok(CreatedPayment {
            payment_id: payment.id(),
            external_id: remote.external_id,
            confirmation_url: remote.confirmation_url,
            status: payment.status(),
        })
    }

    pub async fn get_payment(
        &self,
        tenant: &TenantId,
        payment_id: Uuid,
    ) -> Result<PaymentDetails, PipelineError> {
        let payment = self.load(tenant, payment_id).await?;
        let transfers = self.store.list_transfers(payment.id).await?;
        Ok(PaymentDetails { payment, transfers })
    }

    #[tracing::instrument(name = "capture_payment", skip(self, tenant), fields(tenant_id = %tenant))]
    pub async fn capture_payment(
        &self,
        tenant: &TenantId,
        payment_id: Uuid,
    ) -> Result<Payment, PipelineError> {
        let payment = self.load(tenant, payment_id).await?;
        require_status(&payment, &[PaymentStatus::Authorized], "capture")?;

        let key = IdempotencyKey::for_capture(payment.id, Utc::now().timestamp_millis());
        let remote = self
            .gateway
            .capture(&payment.external_id, payment.amount, payment.currency, key)
            .await?;

        let transition =
            PaymentTransition::new(&payment, PaymentStatus::Captured).with_metadata(remote.raw);
        self.commit(&payment, &transition, "capture").await?;

        tracing::info!(payment_id = %payment.id, "payment captured");
        self.load(tenant, payment_id).await
    }

    #[tracing::instrument(name = "cancel_payment", skip(self, tenant), fields(tenant_id = %tenant))]
    pub async fn cancel_payment(
        &self,
        tenant: &TenantId,
        payment_id: Uuid,
    ) -> Result<Payment, PipelineError> {
        let payment = self.load(tenant, payment_id).await?;
        require_status(
            &payment,
            &[PaymentStatus::Created, PaymentStatus::Authorized],
            "cancel",
        )?;

        let key = IdempotencyKey::for_cancel(payment.id, Utc::now().timestamp_millis());
        let remote = self.gateway.cancel(&payment.external_id, key).await?;

        let transition =
            PaymentTransition::new(&payment, PaymentStatus::Canceled).with_metadata(remote.raw);
        if self.commit(&payment, &transition, "cancel").await? {
            self.publish(DomainEvent::for_payment(
                DomainEventType::PaymentCanceled,
                &payment,
                payment.amount,
            ));
        }

        tracing::info!(payment_id = %payment.id, "payment canceled");
        self.load(tenant, payment_id).await
    }

    #[tracing::instrument(name = "refund_payment", skip(self, tenant, reason), fields(tenant_id = %tenant))]
    pub async fn refund_payment(
        &self,
        tenant: &TenantId,
        payment_id: Uuid,
        amount: Option<MoneyAmount>,
        reason: Option<String>,
    ) -> Result<RefundedPayment, PipelineError> {
        let payment = self.load(tenant, payment_id).await?;
        require_status(&payment, &[PaymentStatus::Succeeded], "refund")?;

        let amount = amount.unwrap_or(payment.amount);
        if amount.is_zero() || amount > payment.amount {
            return Err(PipelineError::Validation(format!(
                "refund amount must be within (0, {}], got {amount}",
                payment.amount
            )));
        }

        let key = IdempotencyKey::for_refund(payment.id, Utc::now().timestamp_millis());
        let refund = self
            .gateway
            .refund(
                &payment.external_id,
                amount,
                payment.currency,
                reason.as_deref(),
                key,
            )
            .await?;

        let transition =
            PaymentTransition::new(&payment, PaymentStatus::Refunded).with_refunded_amount(amount);
        if self.commit(&payment, &transition, "refund").await? {
            self.publish(DomainEvent::for_payment(
                DomainEventType::PaymentRefunded,
                &payment,
                amount,
            ));
        }

        tracing::info!(payment_id = %payment.id, refund_id = %refund.refund_id, "payment refunded");
        Ok(RefundedPayment {
            payment_id: payment.id,
            refund_id: refund.refund_id,
            amount,
            status: PaymentStatus::Refunded,
        })
    }

    async fn load(&self, tenant: &TenantId, payment_id: Uuid) -> Result<Payment, PipelineError> {
        self.store
            .get_payment(tenant, payment_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("payment {payment_id}")))
    }

    /// Writes the transition after a successful gateway call. Returns
    /// whether this call was the one that changed the status.
    async fn commit(
        &self,
        payment: &Payment,
        transition: &PaymentTransition,
        action: &str,
    ) -> Result<bool, PipelineError> {
        match self.store.apply_transition(transition).await? {
            TransitionOutcome::Applied { .. } => Ok(true),
            TransitionOutcome::Unchanged => Ok(false),
            TransitionOutcome::Rejected { current } => {
                tracing::warn!(
                    payment_id = %payment.id,
                    from = %current,
                    to = %transition.to,
                    "{action} accepted by provider but payment moved concurrently"
                );
                Err(PipelineError::InvalidState(format!(
                    "cannot {action} payment {} in status {current}",
                    payment.id
                )))
            }
        }
    }

    fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.publisher.publish(event) {
            tracing::warn!(error = %e, "domain event not published");
        }
    }
}

fn require_status(
    payment: &Payment,
    allowed: &[PaymentStatus],
    action: &str,
) -> Result<(), PipelineError> {
    if allowed.contains(&payment.status) {
        return Ok(());
    }
    Err(PipelineError::InvalidState(format!(
        "cannot {action} payment {} in status {}",
        payment.id, payment.status
    )))
}
