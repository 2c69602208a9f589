use {
    super::{
        error::PipelineError,
        id::{ExternalId, IdempotencyKey, TenantId},
        money::{Currency, MoneyAmount},
        payment::PaymentStatus,
        split::SplitTransfer,
    },
    std::{future::Future, pin::Pin},
    uuid::Uuid,
};

pub type PipelineFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PipelineError>> + Send + 'a>>;

/// Authorize-only payment request for one order.
#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub tenant_id: TenantId,
    pub amount: MoneyAmount,
    pub currency: Currency,
    pub transfers: Vec<SplitTransfer>,
}

/// What the service layer gets back from the provider for a payment.
#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub external_id: ExternalId,
    pub status: PaymentStatus,
    pub paid: bool,
    pub amount: Option<MoneyAmount>,
    pub confirmation_url: Option<String>,
    /// Full provider response, kept verbatim as payment metadata.
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct GatewayRefund {
    pub refund_id: String,
    pub status: String,
    pub amount: Option<MoneyAmount>,
}

/// Remote payment provider. Mutating calls carry an idempotency key; a
/// retried call with the same key must not repeat the remote side effect.
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> &'static str;

    fn create(
        &self,
        request: CreatePaymentRequest,
        key: IdempotencyKey,
    ) -> PipelineFuture<'_, GatewayPayment>;

    fn capture<'a>(
        &'a self,
        external_id: &'a ExternalId,
        amount: MoneyAmount,
        currency: Currency,
        key: IdempotencyKey,
    ) -> PipelineFuture<'a, GatewayPayment>;

    fn cancel<'a>(
        &'a self,
        external_id: &'a ExternalId,
        key: IdempotencyKey,
    ) -> PipelineFuture<'a, GatewayPayment>;

    fn refund<'a>(
        &'a self,
        external_id: &'a ExternalId,
        amount: MoneyAmount,
        currency: Currency,
        reason: Option<&'a str>,
        key: IdempotencyKey,
    ) -> PipelineFuture<'a, GatewayRefund>;

    fn get<'a>(&'a self, external_id: &'a ExternalId) -> PipelineFuture<'a, GatewayPayment>;

    /// Checks the provider's signature over the raw notification body.
    fn verify_signature(&self, payload: &[u8], signature: &str) -> bool;
}
