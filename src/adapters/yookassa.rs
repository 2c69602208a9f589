pub mod signature;
mod wire;

use {
    crate::domain::{
        error::PipelineError,
        id::{ExternalId, IdempotencyKey},
        money::{Currency, MoneyAmount},
        payment::PaymentStatus,
        provider::{
            CreatePaymentRequest, GatewayPayment, GatewayRefund, PaymentGateway, PipelineFuture,
        },
    },
    reqwest::{Method, StatusCode},
    serde::Serialize,
    std::time::Duration,
};

pub const PROVIDER: &str = "yookassa";

const DEFAULT_REFUND_DESCRIPTION: &str = "Refund";

#[derive(Debug, Clone)]
pub struct YooKassaConfig {
    pub api_url: String,
    pub shop_id: String,
    pub secret_key: String,
    /// Key for `X-Signature` on notifications.
    pub webhook_secret: String,
    /// Base of the redirect `return_url`.
    pub web_app_url: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_base: Duration,
}

/// REST client for the provider. Every attempt of one logical call sends the
/// same `Idempotency-Key`, so a retry after a lost response is safe.
pub struct YooKassaGateway {
    client: reqwest::Client,
    config: YooKassaConfig,
}

impl YooKassaGateway {
    pub fn new(config: YooKassaConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::gateway(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.config.retry_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        key: Option<&IdempotencyKey>,
    ) -> Result<serde_json::Value, PipelineError> {
        let url = self.url(path);
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut request = self
                .client
                .request(method.clone(), &url)
                .basic_auth(&self.config.shop_id, Some(&self.config.secret_key));
            if let Some(key) = key {
                request = request.header("Idempotency-Key", key.as_str());
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let error = match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp.json::<serde_json::Value>().await.map_err(|e| {
                        PipelineError::gateway(format!("{method} {path}: invalid response: {e}"))
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    let error = PipelineError::Gateway {
                        message: format!("{method} {path} returned {status}"),
                        status: Some(status.as_u16()),
                        body: Some(body.chars().take(1000).collect()),
                    };
                    if !is_retryable(status) {
                        return Err(error);
                    }
                    error
                }
                Err(e) if e.is_timeout() => {
                    PipelineError::gateway(format!("{method} {path}: timed out"))
                }
                Err(e) => PipelineError::gateway(format!("{method} {path}: {e}")),
            };

            if attempt >= max_attempts {
                tracing::error!(%method, path, attempt, error = %error, "gateway call failed");
                return Err(error);
            }
            let delay = self.backoff(attempt);
            tracing::warn!(
                %method,
                path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "gateway call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn create_body(&self, request: &CreatePaymentRequest) -> wire::CreatePayment {
        let currency = request.currency;
        let transfers = if request
            .transfers
            .iter()
            .all(|t| t.vendor_account_id.is_some())
        {
            request
                .transfers
                .iter()
                .filter_map(|t| {
                    Some(wire::Transfer {
                        account_id: t.vendor_account_id.clone()?,
                        amount: wire::Amount::new(t.gross, currency),
                        platform_fee_amount: wire::Amount::new(t.platform_fee, currency),
                    })
                })
                .collect()
        } else {
            tracing::warn!(
                order_id = %request.order_id,
                "vendor without payout account, creating payment without split"
            );
            Vec::new()
        };

        wire::CreatePayment {
            amount: wire::Amount::new(request.amount, currency),
            capture: false,
            description: format!("Order #{}", request.order_number),
            metadata: wire::Metadata {
                order_id: request.order_id.to_string(),
                tenant_id: request.tenant_id.to_string(),
            },
            confirmation: wire::Confirmation {
                kind: "redirect",
                return_url: format!(
                    "{}/orders/{}/success",
                    self.config.web_app_url.trim_end_matches('/'),
                    request.order_id
                ),
            },
            transfers,
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn parse_payment(raw: serde_json::Value) -> Result<GatewayPayment, PipelineError> {
    let resp: wire::PaymentResponse = serde_json::from_value(raw.clone())
        .map_err(|e| PipelineError::gateway(format!("unexpected payment body: {e}")))?;
    Ok(GatewayPayment {
        external_id: ExternalId::new(resp.id)?,
        status: PaymentStatus::from_provider(&resp.status)?,
        paid: resp.paid,
        amount: resp.amount.as_ref().map(wire::Amount::minor).transpose()?,
        confirmation_url: resp.confirmation.and_then(|c| c.confirmation_url),
        raw,
    })
}

impl PaymentGateway for YooKassaGateway {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn create(
        &self,
        request: CreatePaymentRequest,
        key: IdempotencyKey,
    ) -> PipelineFuture<'_, GatewayPayment> {
        Box::pin(async move {
            let body = self.create_body(&request);
            let raw = self
                .send(Method::POST, "/payments", Some(&body), Some(&key))
                .await?;
            let payment = parse_payment(raw)?;
            tracing::info!(external_id = %payment.external_id, "provider payment created");
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
            let body = wire::CapturePayment {
                amount: wire::Amount::new(amount, currency),
            };
            let path = format!("/payments/{external_id}/capture");
            let raw = self.send(Method::POST, &path, Some(&body), Some(&key)).await?;
            parse_payment(raw)
        })
    }

    fn cancel<'a>(
        &'a self,
        external_id: &'a ExternalId,
        key: IdempotencyKey,
    ) -> PipelineFuture<'a, GatewayPayment> {
        Box::pin(async move {
            let path = format!("/payments/{external_id}/cancel");
            let raw = self
                .send(Method::POST, &path, Some(&serde_json::json!({})), Some(&key))
                .await?;
            parse_payment(raw)
        })
    }

    fn refund<'a>(
        &'a self,
        external_id: &'a ExternalId,
        amount: MoneyAmount,
        currency: Currency,
        reason: Option<&'a str>,
        key: IdempotencyKey,
    ) -> PipelineFuture<'a, GatewayRefund> {
        Box::pin(async move {
            let body = wire::CreateRefund {
                payment_id: external_id.as_str(),
                amount: wire::Amount::new(amount, currency),
                description: reason.unwrap_or(DEFAULT_REFUND_DESCRIPTION),
            };
            let raw = self
                .send(Method::POST, "/refunds", Some(&body), Some(&key))
                .await?;
            let resp: wire::RefundResponse = serde_json::from_value(raw)
                .map_err(|e| PipelineError::gateway(format!("unexpected refund body: {e}")))?;
            Ok(GatewayRefund {
                refund_id: resp.id,
                status: resp.status,
                amount: resp.amount.as_ref().map(wire::Amount::minor).transpose()?,
            })
        })
    }

    fn get<'a>(&'a self, external_id: &'a ExternalId) -> PipelineFuture<'a, GatewayPayment> {
        Box::pin(async move {
            let path = format!("/payments/{external_id}");
            let raw = self.send::<()>(Method::GET, &path, None, None).await?;
            parse_payment(raw)
        })
    }

    fn verify_signature(&self, payload: &[u8], signature: &str) -> bool {
        signature::verify(self.config.webhook_secret.as_bytes(), payload, signature)
    }
}
