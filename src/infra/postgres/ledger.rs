use {
    super::{order_repo, payment_repo, webhook_repo},
    crate::domain::{
        error::PipelineError,
        id::{TenantId, WebhookId},
        order::Order,
        payment::{NewPayment, NewTransfer, Payment, PaymentTransfer, PaymentTransition, TransitionOutcome},
        provider::PipelineFuture,
        store::LedgerStore,
        webhook::{NewWebhookLog, WebhookLog},
    },
    sqlx::PgPool,
    uuid::Uuid,
};

/// `LedgerStore` on Postgres. Multi-row writes each run in one transaction.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_payment_tx(
        &self,
        payment: &NewPayment,
        transfers: &[NewTransfer],
    ) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await?;
        payment_repo::insert(&mut tx, payment).await?;
        for transfer in transfers {
            payment_repo::insert_transfer(&mut tx, transfer).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn apply_transition_tx(
        &self,
        transition: &PaymentTransition,
    ) -> Result<TransitionOutcome, PipelineError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET LOCAL lock_timeout = '5s'")
            .execute(&mut *tx)
            .await?;

        // Concurrent transitions on the same payment queue up here.
        let current = payment_repo::lock_status(&mut tx, transition.payment_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("payment {}", transition.payment_id)))?;

        if current == transition.to {
            tx.commit().await?;
            return Ok(TransitionOutcome::Unchanged);
        }
        if !current.can_transition_to(&transition.to) {
            tx.commit().await?;
            return Ok(TransitionOutcome::Rejected { current });
        }

        if !payment_repo::update_status(&mut tx, transition, current).await? {
            return Err(PipelineError::Persistence(format!(
                "payment {} changed under row lock",
                transition.payment_id
            )));
        }

        if let Some(update) = transition.order_update {
            order_repo::apply_update(&mut tx, &transition.tenant_id, transition.order_id, update)
                .await?;
        }

        if transition.settle_transfers {
            let settled = payment_repo::settle_transfers(&mut tx, transition.payment_id).await?;
            tracing::debug!(payment_id = %transition.payment_id, settled, "transfers settled");
        }

        tx.commit().await?;
        Ok(TransitionOutcome::Applied { previous: current })
    }
}

impl LedgerStore for PgLedgerStore {
    fn load_order<'a>(
        &'a self,
        tenant: &'a TenantId,
        order_id: Uuid,
    ) -> PipelineFuture<'a, Option<Order>> {
        Box::pin(order_repo::load_order(&self.pool, tenant, order_id))
    }

    fn active_payment_for_order<'a>(
        &'a self,
        tenant: &'a TenantId,
        order_id: Uuid,
    ) -> PipelineFuture<'a, Option<Uuid>> {
        Box::pin(payment_repo::active_for_order(&self.pool, tenant, order_id))
    }

    fn insert_payment<'a>(
        &'a self,
        payment: &'a NewPayment,
        transfers: &'a [NewTransfer],
    ) -> PipelineFuture<'a, ()> {
        Box::pin(self.insert_payment_tx(payment, transfers))
    }

    fn get_payment<'a>(
        &'a self,
        tenant: &'a TenantId,
        payment_id: Uuid,
    ) -> PipelineFuture<'a, Option<Payment>> {
        Box::pin(payment_repo::get(&self.pool, tenant, payment_id))
    }

    fn list_transfers(&self, payment_id: Uuid) -> PipelineFuture<'_, Vec<PaymentTransfer>> {
        Box::pin(payment_repo::list_transfers(&self.pool, payment_id))
    }

    fn find_payment_by_external_id<'a>(
        &'a self,
        provider: &'a str,
        external_id: &'a str,
    ) -> PipelineFuture<'a, Option<Payment>> {
        Box::pin(payment_repo::find_by_external_id(&self.pool, provider, external_id))
    }

    fn apply_transition<'a>(
        &'a self,
        transition: &'a PaymentTransition,
    ) -> PipelineFuture<'a, TransitionOutcome> {
        Box::pin(self.apply_transition_tx(transition))
    }

    fn find_webhook_log<'a>(
        &'a self,
        webhook_id: &'a WebhookId,
    ) -> PipelineFuture<'a, Option<WebhookLog>> {
        Box::pin(webhook_repo::find(&self.pool, webhook_id))
    }

    fn insert_webhook_log<'a>(&'a self, log: &'a NewWebhookLog) -> PipelineFuture<'a, bool> {
        Box::pin(webhook_repo::insert(&self.pool, log))
    }

    fn mark_webhook_processed<'a>(&'a self, webhook_id: &'a WebhookId) -> PipelineFuture<'a, ()> {
        Box::pin(webhook_repo::mark_processed(&self.pool, webhook_id))
    }

    fn record_webhook_failure<'a>(
        &'a self,
        webhook_id: &'a WebhookId,
        error: &'a str,
    ) -> PipelineFuture<'a, ()> {
        Box::pin(webhook_repo::record_failure(&self.pool, webhook_id, error))
    }
}
