#![allow(dead_code)]

use marketplace_payments::adapters::yookassa::signature;
use marketplace_payments::domain::error::PipelineError;
use marketplace_payments::domain::events::{DomainEvent, DomainEventType, EventPublisher};
use marketplace_payments::domain::id::{ExternalId, IdempotencyKey, TenantId};
use marketplace_payments::domain::money::{CommissionRate, Currency, MoneyAmount};
use marketplace_payments::domain::order::{Order, OrderItem};
use marketplace_payments::domain::payment::PaymentStatus;
use marketplace_payments::domain::provider::{
    CreatePaymentRequest, GatewayPayment, GatewayRefund, PaymentGateway, PipelineFuture,
};
use marketplace_payments::infra::memory::MemoryLedgerStore;
use marketplace_payments::services::payment_service::{PaymentService, PaymentSettings};
use marketplace_payments::services::webhook_reconciler::WebhookReconciler;
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const PROVIDER: &str = "yookassa";
pub const WEBHOOK_SECRET: &[u8] = b"test_webhook_secret";

pub const VENDOR_A: Uuid = Uuid::from_u128(0xA);
pub const VENDOR_B: Uuid = Uuid::from_u128(0xB);

// ── Fake gateway ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Create { amount: MoneyAmount, transfers: usize, key: String },
    Capture { external_id: String, amount: MoneyAmount, currency: Currency, key: String },
    Cancel { external_id: String, key: String },
    Refund { external_id: String, amount: MoneyAmount, currency: Currency, key: String },
    Get { external_id: String },
}

/// Records every call; answers like a provider that accepts everything
/// unless told to fail.
#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<GatewayCall>>,
    fail_next: Mutex<Option<u16>>,
    created: Mutex<u32>,
}

impl FakeGateway {
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The next call fails with this provider HTTP status.
    pub fn fail_next(&self, status: u16) {
        *self.fail_next.lock().unwrap() = Some(status);
    }

    fn record(&self, call: GatewayCall) -> Result<(), PipelineError> {
        self.calls.lock().unwrap().push(call);
        match self.fail_next.lock().unwrap().take() {
            Some(status) => Err(PipelineError::Gateway {
                message: format!("provider returned {status}"),
                status: Some(status),
                body: Some(r#"{"type":"error"}"#.into()),
            }),
            None => Ok(()),
        }
    }

    fn payment(external_id: &str, status: &str) -> GatewayPayment {
        GatewayPayment {
            external_id: ExternalId::new(external_id).unwrap(),
            status: PaymentStatus::from_provider(status).unwrap(),
            paid: status == "succeeded" || status == "waiting_for_capture",
            amount: None,
            confirmation_url: None,
            raw: serde_json::json!({"id": external_id, "status": status}),
        }
    }
}

impl PaymentGateway for FakeGateway {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn create(
        &self,
        request: CreatePaymentRequest,
        key: IdempotencyKey,
    ) -> PipelineFuture<'_, GatewayPayment> {
        Box::pin(async move {
            self.record(GatewayCall::Create {
                amount: request.amount,
                transfers: request.transfers.len(),
                key: key.to_string(),
            })?;
            let n = {
                let mut created = self.created.lock().unwrap();
                *created += 1;
                *created
            };
            let external_id = format!("yk_{}_{n}", request.order_id.simple());
            let mut payment = Self::payment(&external_id, "pending");
            payment.amount = Some(request.amount);
            payment.confirmation_url = Some(format!("https://yoomoney.test/checkout/{external_id}"));
            Ok(payment)
        })
    }

    fn capture<'a>(
        &'a self,
        external_id: &'a ExternalId,
        amount: MoneyAmount,
        currency: Currency,
        key: IdempotencyKey,
    ) -> PipelineFuture<'a, GatewayPayment> {
        Box::pin(async move {
            self.record(GatewayCall::Capture {
                external_id: external_id.to_string(),
                amount,
                currency,
                key: key.to_string(),
            })?;
            Ok(Self::payment(external_id.as_str(), "succeeded"))
        })
    }

    fn cancel<'a>(
        &'a self,
        external_id: &'a ExternalId,
        key: IdempotencyKey,
    ) -> PipelineFuture<'a, GatewayPayment> {
        Box::pin(async move {
            self.record(GatewayCall::Cancel {
                external_id: external_id.to_string(),
                key: key.to_string(),
            })?;
            Ok(Self::payment(external_id.as_str(), "canceled"))
        })
    }

    fn refund<'a>(
        &'a self,
        external_id: &'a ExternalId,
        amount: MoneyAmount,
        currency: Currency,
        _reason: Option<&'a str>,
        key: IdempotencyKey,
    ) -> PipelineFuture<'a, GatewayRefund> {
        Box::pin(async move {
            self.record(GatewayCall::Refund {
                external_id: external_id.to_string(),
                amount,
                currency,
                key: key.to_string(),
            })?;
            Ok(GatewayRefund {
                refund_id: format!("rf_{external_id}"),
                status: "succeeded".into(),
                amount: Some(amount),
            })
        })
    }

    fn get<'a>(&'a self, external_id: &'a ExternalId) -> PipelineFuture<'a, GatewayPayment> {
        Box::pin(async move {
            self.record(GatewayCall::Get {
                external_id: external_id.to_string(),
            })?;
            Ok(Self::payment(external_id.as_str(), "pending"))
        })
    }

    fn verify_signature(&self, payload: &[u8], signature: &str) -> bool {
        signature::verify(WEBHOOK_SECRET, payload, signature)
    }
}

// ── Recording publisher ────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event_type: DomainEventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: DomainEvent) -> Result<(), PipelineError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

// ── Harness ────────────────────────────────────────────────────────────────

pub struct Harness {
    pub store: Arc<MemoryLedgerStore>,
    pub gateway: Arc<FakeGateway>,
    pub publisher: Arc<RecordingPublisher>,
    pub payments: Arc<PaymentService>,
    pub webhooks: Arc<WebhookReconciler>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryLedgerStore::new());
        let gateway = Arc::new(FakeGateway::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let payments = Arc::new(PaymentService::new(
            store.clone(),
            gateway.clone(),
            publisher.clone(),
            PaymentSettings {
                currency: Currency::Rub,
                default_commission: CommissionRate::from_bps(1000).unwrap(),
            },
        ));
        let webhooks = Arc::new(WebhookReconciler::new(
            store.clone(),
            gateway.clone(),
            publisher.clone(),
        ));
        Self {
            store,
            gateway,
            publisher,
            payments,
            webhooks,
        }
    }
}

pub fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

pub fn item(vendor: Uuid, unit_price: i64, quantity: u32) -> OrderItem {
    OrderItem {
        id: Uuid::now_v7(),
        vendor_id: vendor,
        vendor_account_id: Some(format!("acc_{}", vendor.simple())),
        unit_price: MoneyAmount::new(unit_price).unwrap(),
        quantity,
    }
}

pub fn order(tenant_id: &TenantId, items: Vec<OrderItem>, rate_bps: Option<u32>) -> Order {
    let total = items.iter().fold(MoneyAmount::ZERO, |acc, i| {
        acc + i.unit_price.checked_mul(i.quantity).unwrap()
    });
    Order {
        id: Uuid::now_v7(),
        tenant_id: tenant_id.clone(),
        order_number: "1001".into(),
        total_amount: total,
        commission_rate: rate_bps.map(|bps| CommissionRate::from_bps(bps).unwrap()),
        items,
    }
}

/// Vendor A sells 1000, vendor B 500 at a 10% tenant commission.
pub async fn seed_two_vendor_order(store: &MemoryLedgerStore, tenant_id: &TenantId) -> Order {
    let order = order(
        tenant_id,
        vec![item(VENDOR_A, 400, 2), item(VENDOR_A, 200, 1), item(VENDOR_B, 500, 1)],
        Some(1000),
    );
    store.insert_order(order.clone()).await;
    order
}

// ── Webhooks ───────────────────────────────────────────────────────────────

pub fn notification(webhook_id: &str, event: &str, object: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "id": webhook_id,
        "type": "notification",
        "event": event,
        "object": object,
    }))
    .unwrap()
}

pub fn sign(body: &[u8]) -> String {
    signature::sign(WEBHOOK_SECRET, body)
}

// ── Postgres ───────────────────────────────────────────────────────────────

static PG_INIT: tokio::sync::OnceCell<()> = tokio::sync::OnceCell::const_new();

/// Migrated pool, or `None` when `TEST_DATABASE_URL` is unset. Tables are
/// truncated once per test binary; tests keep apart by using fresh ids.
pub async fn pg_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return None;
    };
    let pool = PgPool::connect(&url)
        .await
        .expect("failed to connect to test db");
    PG_INIT
        .get_or_init(|| async {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("failed to run migrations");
            sqlx::query(
                "TRUNCATE webhook_logs, payment_transfers, payments, order_items, orders, \
                 vendor_payout_accounts, tenants RESTART IDENTITY CASCADE",
            )
            .execute(&pool)
            .await
            .expect("truncate failed");
        })
        .await;
    Some(pool)
}

/// Inserts tenant, order, items and payout accounts.
pub async fn pg_seed_order(pool: &PgPool, order: &Order) {
    sqlx::query(
        "INSERT INTO tenants (id, commission_rate_bps) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
    )
    .bind(order.tenant_id.as_str())
    .bind(order.commission_rate.map(|r| r.bps() as i32))
    .execute(pool)
    .await
    .expect("insert tenant failed");

    sqlx::query(
        "INSERT INTO orders (id, tenant_id, order_number, total_amount) VALUES ($1, $2, $3, $4)",
    )
    .bind(order.id)
    .bind(order.tenant_id.as_str())
    .bind(&order.order_number)
    .bind(order.total_amount.minor())
    .execute(pool)
    .await
    .expect("insert order failed");

    for item in &order.items {
        if let Some(account) = &item.vendor_account_id {
            sqlx::query(
                "INSERT INTO vendor_payout_accounts (vendor_id, account_id) VALUES ($1, $2) \
                 ON CONFLICT (vendor_id) DO NOTHING",
            )
            .bind(item.vendor_id)
            .bind(account)
            .execute(pool)
            .await
            .expect("insert payout account failed");
        }
        sqlx::query(
            "INSERT INTO order_items (id, order_id, vendor_id, unit_price, quantity) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(item.id)
        .bind(order.id)
        .bind(item.vendor_id)
        .bind(item.unit_price.minor())
        .bind(item.quantity as i32)
        .execute(pool)
        .await
        .expect("insert item failed");
    }
}

pub async fn pg_order_status(pool: &PgPool, order_id: Uuid) -> (String, String) {
    sqlx::query_as::<_, (String, String)>("SELECT payment_status, status FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await
        .expect("query failed")
}

pub async fn pg_count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count failed")
}
