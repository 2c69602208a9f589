use {
    crate::domain::{
        error::PipelineError,
        events::{DomainEvent, EventPublisher},
        id::WebhookId,
        payment::{PaymentTransition, ProcessResult, TransitionOutcome},
        provider::PaymentGateway,
        store::LedgerStore,
        webhook::{NewWebhookLog, ProviderNotification, WebhookEventKind},
    },
    std::sync::Arc,
};

/// Turns signed, possibly duplicated provider callbacks into local payment
/// transitions. The `webhook_logs` row is written before anything else and
/// its `processed` flag is the dedup boundary.
pub struct WebhookReconciler {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
}

impl WebhookReconciler {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            gateway,
            publisher,
        }
    }

    pub fn provider(&self) -> &'static str {
        self.gateway.provider()
    }

    #[tracing::instrument(
        name = "webhook",
        skip_all,
        fields(webhook_id = tracing::field::Empty, event_type = tracing::field::Empty)
    )]
    pub async fn handle(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<ProcessResult, PipelineError> {
        let signature = signature
            .ok_or_else(|| PipelineError::WebhookSignature("missing signature header".into()))?;
        if !self.gateway.verify_signature(body, signature) {
            tracing::warn!("webhook signature mismatch");
            return Err(PipelineError::WebhookSignature("signature mismatch".into()));
        }

        let notification: ProviderNotification = match serde_json::from_slice(body) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("skipping unparseable notification: {e}");
                return Ok(ProcessResult::Ignored);
            }
        };
        let webhook_id = match notification.id.as_deref().map(WebhookId::new) {
            Some(Ok(id)) => id,
            _ => {
                tracing::warn!(event_type = %notification.event, "skipping notification without id");
                return Ok(ProcessResult::Ignored);
            }
        };

        tracing::Span::current()
            .record("webhook_id", tracing::field::display(&webhook_id))
            .record("event_type", tracing::field::display(&notification.event));

        match self.store.find_webhook_log(&webhook_id).await? {
            Some(log) if log.processed => {
                tracing::info!("duplicate webhook, already processed");
                return Ok(ProcessResult::Duplicate);
            }
            Some(log) => {
                tracing::info!(retry_count = log.retry_count, "reprocessing failed webhook");
            }
            None => {
                let log = NewWebhookLog {
                    webhook_id: webhook_id.clone(),
                    provider: self.gateway.provider().to_string(),
                    event_type: notification.event.clone(),
                    payload: String::from_utf8_lossy(body).into_owned(),
                    signature: Some(signature.to_string()),
                };
                if !self.store.insert_webhook_log(&log).await? {
                    tracing::info!("duplicate webhook, delivery in flight");
                    return Ok(ProcessResult::Duplicate);
                }
            }
        }

        match self.process(&notification).await {
            Ok(result) => {
                self.store.mark_webhook_processed(&webhook_id).await?;
                Ok(result)
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(log_err) = self.store.record_webhook_failure(&webhook_id, &message).await {
                    tracing::error!(error = %log_err, "failed to record webhook failure");
                }
                tracing::error!(error = %message, "webhook processing failed");
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        notification: &ProviderNotification,
    ) -> Result<ProcessResult, PipelineError> {
        let kind = WebhookEventKind::from(notification.event.as_str());
        let Some(target) = kind.target_status() else {
            tracing::info!("unhandled webhook event");
            return Ok(ProcessResult::Ignored);
        };
        let Some(external_id) = notification.payment_external_id(kind) else {
            tracing::warn!(event = %kind, "notification object has no payment id");
            return Ok(ProcessResult::Ignored);
        };

        let Some(payment) = self
            .store
            .find_payment_by_external_id(self.gateway.provider(), external_id)
            .await?
        else {
            tracing::warn!(external_id, "payment not found for webhook");
            return Ok(ProcessResult::Ignored);
        };

        let (transition, event_amount) = match kind {
            WebhookEventKind::RefundSucceeded => {
                let refunded = notification.amount().unwrap_or(payment.amount);
                (
                    PaymentTransition::new(&payment, target).with_refunded_amount(refunded),
                    refunded,
                )
            }
            _ => (
                PaymentTransition::new(&payment, target)
                    .with_metadata(notification.object.clone()),
                payment.amount,
            ),
        };

        match self.store.apply_transition(&transition).await? {
            TransitionOutcome::Applied { previous } => {
                tracing::info!(
                    payment_id = %payment.id,
                    from = %previous,
                    to = %target,
                    "payment transitioned"
                );
                if let Some(event_type) = kind.domain_event() {
                    let event = DomainEvent::for_payment(event_type, &payment, event_amount);
                    if let Err(e) = self.publisher.publish(event) {
                        tracing::warn!(error = %e, "domain event not published");
                    }
                }
                Ok(ProcessResult::Applied(payment.id))
            }
            TransitionOutcome::Unchanged => {
                tracing::info!(payment_id = %payment.id, status = %target, "stale event, skipped");
                Ok(ProcessResult::Stale(payment.id))
            }
            TransitionOutcome::Rejected { current } if current.can_reach(&target) => {
                tracing::info!(
                    payment_id = %payment.id,
                    from = %current,
                    to = %target,
                    "event ahead of payment status, left for redelivery"
                );
                Err(PipelineError::OutOfOrder(format!(
                    "payment {} is {current}, cannot move to {target} yet",
                    payment.id
                )))
            }
            TransitionOutcome::Rejected { current } => {
                tracing::warn!(
                    payment_id = %payment.id,
                    from = %current,
                    to = %target,
                    "invalid status transition, logged as anomaly"
                );
                Ok(ProcessResult::Anomaly(payment.id))
            }
        }
    }
}
