pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use {
    crate::services::{payment_service::PaymentService, webhook_reconciler::WebhookReconciler},
    std::sync::Arc,
};

#[derive(Clone)]
pub struct AppState {
    pub payments: Arc<PaymentService>,
    pub webhooks: Arc<WebhookReconciler>,
}
