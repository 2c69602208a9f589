use {
    crate::domain::{
        error::PipelineError,
        id::TenantId,
        money::{CommissionRate, MoneyAmount},
        order::{Order, OrderItem, OrderUpdate},
    },
    sqlx::PgPool,
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    tenant_id: String,
    order_number: String,
    total_amount: i64,
    commission_rate_bps: Option<i32>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    vendor_id: Uuid,
    vendor_account_id: Option<String>,
    unit_price: i64,
    quantity: i32,
}

impl TryFrom<ItemRow> for OrderItem {
    type Error = PipelineError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            vendor_id: row.vendor_id,
            vendor_account_id: row.vendor_account_id,
            unit_price: MoneyAmount::try_from(row.unit_price)?,
            quantity: u32::try_from(row.quantity).map_err(|_| {
                PipelineError::Persistence(format!("order item {} has negative quantity", row.id))
            })?,
        })
    }
}

/// Order header, tenant commission and items with payout accounts. `None`
/// when the order does not exist or belongs to another tenant.
pub async fn load_order(
    pool: &PgPool,
    tenant: &TenantId,
    order_id: Uuid,
) -> Result<Option<Order>, PipelineError> {
    let Some(row) = sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT o.id, o.tenant_id, o.order_number, o.total_amount, t.commission_rate_bps
        FROM orders o
        JOIN tenants t ON t.id = o.tenant_id
        WHERE o.id = $1 AND o.tenant_id = $2
        "#,
    )
    .bind(order_id)
    .bind(tenant.as_str())
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, ItemRow>(
        r#"
        SELECT i.id, i.vendor_id, a.account_id AS vendor_account_id, i.unit_price, i.quantity
        FROM order_items i
        LEFT JOIN vendor_payout_accounts a ON a.vendor_id = i.vendor_id
        WHERE i.order_id = $1
        ORDER BY i.id
        "#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(OrderItem::try_from)
    .collect::<Result<Vec<_>, _>>()?;

    let commission_rate = row
        .commission_rate_bps
        .map(|bps| {
            u32::try_from(bps)
                .map_err(|_| PipelineError::Persistence(format!("negative commission: {bps}")))
                .and_then(CommissionRate::from_bps)
        })
        .transpose()?;

    Ok(Some(Order {
        id: row.id,
        tenant_id: TenantId::new(row.tenant_id)?,
        order_number: row.order_number,
        total_amount: MoneyAmount::try_from(row.total_amount)?,
        commission_rate,
        items,
    }))
}

/// Mirrors a payment transition onto the order, scoped to its tenant.
pub async fn apply_update(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    tenant: &TenantId,
    order_id: Uuid,
    update: OrderUpdate,
) -> Result<(), PipelineError> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET payment_status = $1, status = COALESCE($2, status), updated_at = now()
        WHERE id = $3 AND tenant_id = $4
        "#,
    )
    .bind(update.payment_status.as_str())
    .bind(update.status.map(|s| s.as_str()))
    .bind(order_id)
    .bind(tenant.as_str())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        tracing::warn!(%order_id, "order row missing for payment transition");
    }
    Ok(())
}
