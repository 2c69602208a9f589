use {
    super::{
        id::{TenantId, WebhookId},
        order::Order,
        payment::{NewPayment, NewTransfer, Payment, PaymentTransfer, PaymentTransition, TransitionOutcome},
        provider::PipelineFuture,
        webhook::{NewWebhookLog, WebhookLog},
    },
    uuid::Uuid,
};

/// Durable state for payments, their transfers and the webhook log.
///
/// Every method is its own unit of work: multi-row writes either commit as
/// a whole or not at all. Reads always hit the store, nothing is cached.
pub trait LedgerStore: Send + Sync {
    /// Order with items and tenant commission, only if owned by `tenant`.
    fn load_order<'a>(
        &'a self,
        tenant: &'a TenantId,
        order_id: Uuid,
    ) -> PipelineFuture<'a, Option<Order>>;

    fn active_payment_for_order<'a>(
        &'a self,
        tenant: &'a TenantId,
        order_id: Uuid,
    ) -> PipelineFuture<'a, Option<Uuid>>;

    /// Payment and all its transfers in one transaction.
    fn insert_payment<'a>(
        &'a self,
        payment: &'a NewPayment,
        transfers: &'a [NewTransfer],
    ) -> PipelineFuture<'a, ()>;

    fn get_payment<'a>(
        &'a self,
        tenant: &'a TenantId,
        payment_id: Uuid,
    ) -> PipelineFuture<'a, Option<Payment>>;

    fn list_transfers(&self, payment_id: Uuid) -> PipelineFuture<'_, Vec<PaymentTransfer>>;

    fn find_payment_by_external_id<'a>(
        &'a self,
        provider: &'a str,
        external_id: &'a str,
    ) -> PipelineFuture<'a, Option<Payment>>;

    /// Locks the payment row, validates the transition against the state
    /// machine and writes status, order and transfers together.
    fn apply_transition<'a>(
        &'a self,
        transition: &'a PaymentTransition,
    ) -> PipelineFuture<'a, TransitionOutcome>;

    fn find_webhook_log<'a>(
        &'a self,
        webhook_id: &'a WebhookId,
    ) -> PipelineFuture<'a, Option<WebhookLog>>;

    /// Returns `false` if a row with this webhook id already exists.
    fn insert_webhook_log<'a>(&'a self, log: &'a NewWebhookLog) -> PipelineFuture<'a, bool>;

    fn mark_webhook_processed<'a>(&'a self, webhook_id: &'a WebhookId) -> PipelineFuture<'a, ()>;

    fn record_webhook_failure<'a>(
        &'a self,
        webhook_id: &'a WebhookId,
        error: &'a str,
    ) -> PipelineFuture<'a, ()>;
}
