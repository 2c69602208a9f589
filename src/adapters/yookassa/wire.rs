//! Request and response bodies of the provider REST API. Only the fields
//! this service reads or sends are modelled.

use {
    crate::domain::{
        error::PipelineError,
        money::{Currency, MoneyAmount},
    },
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct Amount {
    pub value: String,
    pub currency: String,
}

impl Amount {
    pub fn new(amount: MoneyAmount, currency: Currency) -> Self {
        Self {
            value: amount.to_decimal_string(),
            currency: currency.as_str().to_string(),
        }
    }

    pub fn minor(&self) -> Result<MoneyAmount, PipelineError> {
        MoneyAmount::from_decimal_str(&self.value)
    }
}

#[derive(Debug, Serialize)]
pub struct Confirmation {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub return_url: String,
}

#[derive(Debug, Serialize)]
pub struct Metadata {
    pub order_id: String,
    pub tenant_id: String,
}

#[derive(Debug, Serialize)]
pub struct Transfer {
    pub account_id: String,
    pub amount: Amount,
    pub platform_fee_amount: Amount,
}

#[derive(Debug, Serialize)]
pub struct CreatePayment {
    pub amount: Amount,
    pub capture: bool,
    pub description: String,
    pub metadata: Metadata,
    pub confirmation: Confirmation,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transfers: Vec<Transfer>,
}

#[derive(Debug, Serialize)]
pub struct CapturePayment {
    pub amount: Amount,
}

#[derive(Debug, Serialize)]
pub struct CreateRefund<'a> {
    pub payment_id: &'a str,
    pub amount: Amount,
    pub description: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmationResponse {
    pub confirmation_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub paid: bool,
    pub amount: Option<Amount>,
    pub confirmation: Option<ConfirmationResponse>,
}

#[derive(Debug, Deserialize)]
pub struct RefundResponse {
    pub id: String,
    pub status: String,
    pub amount: Option<Amount>,
}
