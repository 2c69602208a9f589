use {
    super::tenant::TenantContext,
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{money::MoneyAmount, payment::Payment},
        services::payment_service::{CreatedPayment, PaymentDetails, RefundedPayment},
    },
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
    },
    serde::Deserialize,
    uuid::Uuid,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentBody {
    pub order_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundBody {
    /// Minor units; the full payment amount when absent.
    pub amount: Option<i64>,
    pub reason: Option<String>,
}

pub async fn create_payment(
    State(state): State<AppState>,
    TenantContext(tenant): TenantContext,
    Json(body): Json<CreatePaymentBody>,
) -> Result<(StatusCode, Json<CreatedPayment>), ApiError> {
    let created = state.payments.create_payment(&tenant, body.order_id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    TenantContext(tenant): TenantContext,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentDetails>, ApiError> {
    Ok(Json(state.payments.get_payment(&tenant, payment_id).await?))
}

pub async fn capture_payment(
    State(state): State<AppState>,
    TenantContext(tenant): TenantContext,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Payment>, ApiError> {
    Ok(Json(state.payments.capture_payment(&tenant, payment_id).await?))
}

pub async fn cancel_payment(
    State(state): State<AppState>,
    TenantContext(tenant): TenantContext,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Payment>, ApiError> {
    Ok(Json(state.payments.cancel_payment(&tenant, payment_id).await?))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    TenantContext(tenant): TenantContext,
    Path(payment_id): Path<Uuid>,
    body: Option<Json<RefundBody>>,
) -> Result<Json<RefundedPayment>, ApiError> {
    let RefundBody { amount, reason } = body.map(|Json(b)| b).unwrap_or_default();
    let amount = amount.map(MoneyAmount::new).transpose()?;
    let refunded = state
        .payments
        .refund_payment(&tenant, payment_id, amount, reason)
        .await?;
    Ok(Json(refunded))
}
