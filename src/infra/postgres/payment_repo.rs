use {
    crate::domain::{
        error::PipelineError,
        id::{ExternalId, TenantId},
        money::{Currency, MoneyAmount},
        payment::{
            NewPayment, NewTransfer, Payment, PaymentStatus, PaymentTransfer, PaymentTransition,
            TransferStatus,
        },
    },
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

type Tx<'c> = sqlx::Transaction<'c, sqlx::Postgres>;

const ONE_ACTIVE_PER_ORDER: &str = "payments_one_active_per_order";

const PAYMENT_COLUMNS: &str = "id, tenant_id, order_id, provider, external_id, amount, currency, \
     status, metadata, confirmation_url, refunded_amount, created_at, authorized_at, captured_at, \
     refunded_at";

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    tenant_id: String,
    order_id: Uuid,
    provider: String,
    external_id: String,
    amount: i64,
    currency: String,
    status: String,
    metadata: serde_json::Value,
    confirmation_url: Option<String>,
    refunded_amount: Option<i64>,
    created_at: DateTime<Utc>,
    authorized_at: Option<DateTime<Utc>>,
    captured_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = PipelineError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            tenant_id: TenantId::new(row.tenant_id)?,
            order_id: row.order_id,
            provider: row.provider,
            external_id: ExternalId::new(row.external_id)?,
            amount: MoneyAmount::try_from(row.amount)?,
            currency: Currency::try_from(row.currency.as_str())?,
            status: PaymentStatus::try_from(row.status.as_str())?,
            metadata: row.metadata,
            confirmation_url: row.confirmation_url,
            refunded_amount: row.refunded_amount.map(MoneyAmount::try_from).transpose()?,
            created_at: row.created_at,
            authorized_at: row.authorized_at,
            captured_at: row.captured_at,
            refunded_at: row.refunded_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransferRow {
    id: Uuid,
    payment_id: Uuid,
    vendor_id: Uuid,
    vendor_account_id: Option<String>,
    amount: i64,
    platform_fee: i64,
    vendor_payout: i64,
    status: String,
    transferred_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransferRow> for PaymentTransfer {
    type Error = PipelineError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            payment_id: row.payment_id,
            vendor_id: row.vendor_id,
            vendor_account_id: row.vendor_account_id,
            amount: MoneyAmount::try_from(row.amount)?,
            platform_fee: MoneyAmount::try_from(row.platform_fee)?,
            vendor_payout: MoneyAmount::try_from(row.vendor_payout)?,
            status: TransferStatus::try_from(row.status.as_str())?,
            transferred_at: row.transferred_at,
        })
    }
}

fn map_insert_error(e: sqlx::Error, order_id: Uuid) -> PipelineError {
    match &e {
        sqlx::Error::Database(db) if db.constraint() == Some(ONE_ACTIVE_PER_ORDER) => {
            PipelineError::InvalidState(format!("order {order_id} already has an active payment"))
        }
        _ => PipelineError::Database(e),
    }
}

pub async fn insert(tx: &mut Tx<'_>, payment: &NewPayment) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO payments
            (id, tenant_id, order_id, provider, external_id, amount, currency,
             status, metadata, confirmation_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(payment.id())
    .bind(payment.tenant_id().as_str())
    .bind(payment.order_id())
    .bind(payment.provider())
    .bind(payment.external_id().as_str())
    .bind(payment.amount().minor())
    .bind(payment.currency().as_str())
    .bind(payment.status().as_str())
    .bind(payment.metadata())
    .bind(payment.confirmation_url())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_insert_error(e, payment.order_id()))?;
    Ok(())
}

pub async fn insert_transfer(tx: &mut Tx<'_>, transfer: &NewTransfer) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO payment_transfers
            (id, payment_id, tenant_id, vendor_id, vendor_account_id,
             amount, platform_fee, vendor_payout, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending')
        "#,
    )
    .bind(transfer.id)
    .bind(transfer.payment_id)
    .bind(transfer.tenant_id.as_str())
    .bind(transfer.vendor_id)
    .bind(transfer.vendor_account_id.as_deref())
    .bind(transfer.amount.minor())
    .bind(transfer.platform_fee.minor())
    .bind(transfer.vendor_payout.minor())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn get(
    pool: &PgPool,
    tenant: &TenantId,
    payment_id: Uuid,
) -> Result<Option<Payment>, PipelineError> {
    sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 AND tenant_id = $2"
    ))
    .bind(payment_id)
    .bind(tenant.as_str())
    .fetch_optional(pool)
    .await?
    .map(Payment::try_from)
    .transpose()
}

pub async fn find_by_external_id(
    pool: &PgPool,
    provider: &str,
    external_id: &str,
) -> Result<Option<Payment>, PipelineError> {
    sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE provider = $1 AND external_id = $2"
    ))
    .bind(provider)
    .bind(external_id)
    .fetch_optional(pool)
    .await?
    .map(Payment::try_from)
    .transpose()
}

pub async fn active_for_order(
    pool: &PgPool,
    tenant: &TenantId,
    order_id: Uuid,
) -> Result<Option<Uuid>, PipelineError> {
    let active: Vec<&str> = PaymentStatus::ALL
        .iter()
        .filter(|s| s.is_active())
        .map(|s| s.as_str())
        .collect();
    let id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM payments WHERE order_id = $1 AND tenant_id = $2 AND status = ANY($3) LIMIT 1",
    )
    .bind(order_id)
    .bind(tenant.as_str())
    .bind(&active)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

pub async fn list_transfers(
    pool: &PgPool,
    payment_id: Uuid,
) -> Result<Vec<PaymentTransfer>, PipelineError> {
    sqlx::query_as::<_, TransferRow>(
        r#"
        SELECT id, payment_id, vendor_id, vendor_account_id, amount, platform_fee,
               vendor_payout, status, transferred_at
        FROM payment_transfers
        WHERE payment_id = $1
        ORDER BY vendor_id
        "#,
    )
    .bind(payment_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(PaymentTransfer::try_from)
    .collect()
}

/// Row-locks the payment for the rest of the transaction.
pub async fn lock_status(
    tx: &mut Tx<'_>,
    payment_id: Uuid,
) -> Result<Option<PaymentStatus>, PipelineError> {
    let status = sqlx::query_scalar::<_, String>(
        "SELECT status FROM payments WHERE id = $1 FOR UPDATE",
    )
    .bind(payment_id)
    .fetch_optional(&mut **tx)
    .await?;
    status
        .map(|s| PaymentStatus::try_from(s.as_str()))
        .transpose()
}

/// Conditional on `expected` still being the stored status. Returns whether
/// a row was updated.
pub async fn update_status(
    tx: &mut Tx<'_>,
    transition: &PaymentTransition,
    expected: PaymentStatus,
) -> Result<bool, PipelineError> {
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = $1::text,
            metadata = COALESCE($2::jsonb, metadata),
            refunded_amount = COALESCE($3, refunded_amount),
            authorized_at = CASE WHEN $1::text = 'authorized'
                                 THEN COALESCE(authorized_at, now()) ELSE authorized_at END,
            captured_at = CASE WHEN $1::text IN ('captured', 'succeeded')
                               THEN COALESCE(captured_at, now()) ELSE captured_at END,
            refunded_at = CASE WHEN $1::text = 'refunded' THEN now() ELSE refunded_at END,
            updated_at = now()
        WHERE id = $4 AND status = $5
        "#,
    )
    .bind(transition.to.as_str())
    .bind(transition.metadata.as_ref())
    .bind(transition.refunded_amount.map(|a| a.minor()))
    .bind(transition.payment_id)
    .bind(expected.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Marks every pending transfer of the payment as paid out.
pub async fn settle_transfers(tx: &mut Tx<'_>, payment_id: Uuid) -> Result<u64, PipelineError> {
    let result = sqlx::query(
        r#"
        UPDATE payment_transfers
        SET status = 'transferred', transferred_at = now()
        WHERE payment_id = $1 AND status = 'pending'
        "#,
    )
    .bind(payment_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}
