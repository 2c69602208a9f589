use {
    crate::domain::{
        error::PipelineError,
        id::{TenantId, WebhookId},
        order::{Order, OrderPaymentStatus},
        payment::{
            NewPayment, NewTransfer, Payment, PaymentStatus, PaymentTransfer, PaymentTransition,
            TransferStatus, TransitionOutcome,
        },
        provider::PipelineFuture,
        store::LedgerStore,
        webhook::{NewWebhookLog, WebhookLog},
    },
    chrono::Utc,
    std::{
        collections::HashMap,
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
    },
    tokio::sync::RwLock,
    uuid::Uuid,
};

/// Order columns this subsystem writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderState {
    pub payment_status: &'static str,
    pub status: &'static str,
}

#[derive(Default)]
struct Ledger {
    orders: HashMap<Uuid, (Order, OrderState)>,
    payments: HashMap<Uuid, Payment>,
    transfers: Vec<PaymentTransfer>,
    webhooks: HashMap<String, WebhookLog>,
}

/// A thread-safe in-memory ledger.
///
/// Each trait method takes the write lock once, so multi-row writes are
/// all-or-nothing like their Postgres counterparts. The integration tests
/// run the services against it, with switches to inject write failures.
#[derive(Default, Clone)]
pub struct MemoryLedgerStore {
    inner: Arc<RwLock<Ledger>>,
    fail_transfer_insert: Arc<AtomicBool>,
    fail_transition: Arc<AtomicBool>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_order(&self, order: Order) {
        let state = OrderState {
            payment_status: OrderPaymentStatus::Pending.as_str(),
            status: "new",
        };
        self.inner.write().await.orders.insert(order.id, (order, state));
    }

    pub async fn order_state(&self, order_id: Uuid) -> Option<OrderState> {
        self.inner
            .read()
            .await
            .orders
            .get(&order_id)
            .map(|(_, state)| state.clone())
    }

    pub async fn payment_count(&self) -> usize {
        self.inner.read().await.payments.len()
    }

    pub async fn transfer_count(&self) -> usize {
        self.inner.read().await.transfers.len()
    }

    /// Makes the next `insert_payment` fail while writing its transfers.
    pub fn fail_next_transfer_insert(&self) {
        self.fail_transfer_insert.store(true, Ordering::SeqCst);
    }

    /// Makes the next `apply_transition` fail before writing anything.
    pub fn fail_next_transition(&self) {
        self.fail_transition.store(true, Ordering::SeqCst);
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load_order<'a>(
        &'a self,
        tenant: &'a TenantId,
        order_id: Uuid,
    ) -> PipelineFuture<'a, Option<Order>> {
        Box::pin(async move {
            let ledger = self.inner.read().await;
            Ok(ledger
                .orders
                .get(&order_id)
                .filter(|(order, _)| &order.tenant_id == tenant)
                .map(|(order, _)| order.clone()))
        })
    }

    fn active_payment_for_order<'a>(
        &'a self,
        tenant: &'a TenantId,
        order_id: Uuid,
    ) -> PipelineFuture<'a, Option<Uuid>> {
        Box::pin(async move {
            let ledger = self.inner.read().await;
            Ok(ledger
                .payments
                .values()
                .find(|p| p.order_id == order_id && &p.tenant_id == tenant && p.status.is_active())
                .map(|p| p.id))
        })
    }

    fn insert_payment<'a>(
        &'a self,
        payment: &'a NewPayment,
        transfers: &'a [NewTransfer],
    ) -> PipelineFuture<'a, ()> {
        Box::pin(async move {
            let mut ledger = self.inner.write().await;

            if ledger.payments.values().any(|p| {
                p.provider == payment.provider() && &p.external_id == payment.external_id()
            }) {
                return Err(PipelineError::Persistence(format!(
                    "duplicate external id {}",
                    payment.external_id()
                )));
            }
            if payment.status().is_active()
                && ledger
                    .payments
                    .values()
                    .any(|p| p.order_id == payment.order_id() && p.status.is_active())
            {
                return Err(PipelineError::InvalidState(format!(
                    "order {} already has an active payment",
                    payment.order_id()
                )));
            }

            let now = Utc::now();
            let row = Payment {
                id: payment.id(),
                tenant_id: payment.tenant_id().clone(),
                order_id: payment.order_id(),
                provider: payment.provider().to_string(),
                external_id: payment.external_id().clone(),
                amount: payment.amount(),
                currency: payment.currency(),
                status: payment.status(),
                metadata: payment.metadata().clone(),
                confirmation_url: payment.confirmation_url().map(str::to_string),
                refunded_amount: None,
                created_at: now,
                authorized_at: None,
                captured_at: None,
                refunded_at: None,
            };
            let rows: Vec<PaymentTransfer> = transfers
                .iter()
                .map(|t| PaymentTransfer {
                    id: t.id,
                    payment_id: t.payment_id,
                    vendor_id: t.vendor_id,
                    vendor_account_id: t.vendor_account_id.clone(),
                    amount: t.amount,
                    platform_fee: t.platform_fee,
                    vendor_payout: t.vendor_payout,
                    status: TransferStatus::Pending,
                    transferred_at: None,
                })
                .collect();

            if self.fail_transfer_insert.swap(false, Ordering::SeqCst) {
                return Err(PipelineError::Persistence(
                    "payment_transfers insert failed".into(),
                ));
            }

            ledger.payments.insert(row.id, row);
            ledger.transfers.extend(rows);
            Ok(())
        })
    }

    fn get_payment<'a>(
        &'a self,
        tenant: &'a TenantId,
        payment_id: Uuid,
    ) -> PipelineFuture<'a, Option<Payment>> {
        Box::pin(async move {
            let ledger = self.inner.read().await;
            Ok(ledger
                .payments
                .get(&payment_id)
                .filter(|p| &p.tenant_id == tenant)
                .cloned())
        })
    }

    fn list_transfers(&self, payment_id: Uuid) -> PipelineFuture<'_, Vec<PaymentTransfer>> {
        Box::pin(async move {
            let ledger = self.inner.read().await;
            let mut transfers: Vec<PaymentTransfer> = ledger
                .transfers
                .iter()
                .filter(|t| t.payment_id == payment_id)
                .cloned()
                .collect();
            transfers.sort_by_key(|t| t.vendor_id);
            Ok(transfers)
        })
    }

    fn find_payment_by_external_id<'a>(
        &'a self,
        provider: &'a str,
        external_id: &'a str,
    ) -> PipelineFuture<'a, Option<Payment>> {
        Box::pin(async move {
            let ledger = self.inner.read().await;
            Ok(ledger
                .payments
                .values()
                .find(|p| p.provider == provider && p.external_id.as_str() == external_id)
                .cloned())
        })
    }

    fn apply_transition<'a>(
        &'a self,
        transition: &'a PaymentTransition,
    ) -> PipelineFuture<'a, TransitionOutcome> {
        Box::pin(async move {
            if self.fail_transition.swap(false, Ordering::SeqCst) {
                return Err(PipelineError::Persistence("payments update failed".into()));
            }
            let mut ledger = self.inner.write().await;
            let now = Utc::now();

            let payment = ledger
                .payments
                .get_mut(&transition.payment_id)
                .ok_or_else(|| {
                    PipelineError::NotFound(format!("payment {}", transition.payment_id))
                })?;
            let current = payment.status;
            if current == transition.to {
                return Ok(TransitionOutcome::Unchanged);
            }
            if !current.can_transition_to(&transition.to) {
                return Ok(TransitionOutcome::Rejected { current });
            }

            payment.status = transition.to;
            match transition.to {
                PaymentStatus::Authorized => {
                    payment.authorized_at.get_or_insert(now);
                }
                PaymentStatus::Captured | PaymentStatus::Succeeded => {
                    payment.captured_at.get_or_insert(now);
                }
                PaymentStatus::Refunded => payment.refunded_at = Some(now),
                PaymentStatus::Created | PaymentStatus::Canceled => {}
            }
            if let Some(metadata) = &transition.metadata {
                payment.metadata = metadata.clone();
            }
            if let Some(amount) = transition.refunded_amount {
                payment.refunded_amount = Some(amount);
            }

            if let Some(update) = transition.order_update {
                if let Some((order, state)) = ledger.orders.get_mut(&transition.order_id) {
                    if order.tenant_id == transition.tenant_id {
                        state.payment_status = update.payment_status.as_str();
                        if let Some(status) = update.status {
                            state.status = status.as_str();
                        }
                    }
                }
            }

            if transition.settle_transfers {
                for t in ledger
                    .transfers
                    .iter_mut()
                    .filter(|t| t.payment_id == transition.payment_id)
                {
                    t.status = TransferStatus::Transferred;
                    t.transferred_at = Some(now);
                }
            }

            Ok(TransitionOutcome::Applied { previous: current })
        })
    }

    fn find_webhook_log<'a>(
        &'a self,
        webhook_id: &'a WebhookId,
    ) -> PipelineFuture<'a, Option<WebhookLog>> {
        Box::pin(async move {
            let ledger = self.inner.read().await;
            Ok(ledger.webhooks.get(webhook_id.as_str()).cloned())
        })
    }

    fn insert_webhook_log<'a>(&'a self, log: &'a NewWebhookLog) -> PipelineFuture<'a, bool> {
        Box::pin(async move {
            let mut ledger = self.inner.write().await;
            if ledger.webhooks.contains_key(log.webhook_id.as_str()) {
                return Ok(false);
            }
            ledger.webhooks.insert(
                log.webhook_id.as_str().to_string(),
                WebhookLog {
                    webhook_id: log.webhook_id.as_str().to_string(),
                    provider: log.provider.clone(),
                    event_type: log.event_type.clone(),
                    payload: log.payload.clone(),
                    signature: log.signature.clone(),
                    processed: false,
                    processed_at: None,
                    error_message: None,
                    retry_count: 0,
                    created_at: Utc::now(),
                },
            );
            Ok(true)
        })
    }

    fn mark_webhook_processed<'a>(&'a self, webhook_id: &'a WebhookId) -> PipelineFuture<'a, ()> {
        Box::pin(async move {
            let mut ledger = self.inner.write().await;
            if let Some(log) = ledger.webhooks.get_mut(webhook_id.as_str()) {
                log.processed = true;
                log.processed_at = Some(Utc::now());
                log.error_message = None;
            }
            Ok(())
        })
    }

    fn record_webhook_failure<'a>(
        &'a self,
        webhook_id: &'a WebhookId,
        error: &'a str,
    ) -> PipelineFuture<'a, ()> {
        Box::pin(async move {
            let mut ledger = self.inner.write().await;
            if let Some(log) = ledger.webhooks.get_mut(webhook_id.as_str()) {
                log.error_message = Some(error.to_string());
                log.retry_count += 1;
            }
            Ok(())
        })
    }
}
