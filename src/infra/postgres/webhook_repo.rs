use {
    crate::domain::{
        error::PipelineError,
        id::WebhookId,
        webhook::{NewWebhookLog, WebhookLog},
    },
    chrono::{DateTime, Utc},
    sqlx::PgPool,
};

#[derive(sqlx::FromRow)]
struct WebhookLogRow {
    webhook_id: String,
    provider: String,
    event_type: String,
    payload: String,
    signature: Option<String>,
    processed: bool,
    processed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    retry_count: i32,
    created_at: DateTime<Utc>,
}

impl From<WebhookLogRow> for WebhookLog {
    fn from(row: WebhookLogRow) -> Self {
        Self {
            webhook_id: row.webhook_id,
            provider: row.provider,
            event_type: row.event_type,
            payload: row.payload,
            signature: row.signature,
            processed: row.processed,
            processed_at: row.processed_at,
            error_message: row.error_message,
            retry_count: row.retry_count,
            created_at: row.created_at,
        }
    }
}

pub async fn find(pool: &PgPool, webhook_id: &WebhookId) -> Result<Option<WebhookLog>, PipelineError> {
    let row = sqlx::query_as::<_, WebhookLogRow>(
        r#"
        SELECT webhook_id, provider, event_type, payload, signature, processed,
               processed_at, error_message, retry_count, created_at
        FROM webhook_logs
        WHERE webhook_id = $1
        "#,
    )
    .bind(webhook_id.as_str())
    .fetch_optional(pool)
    .await?;
    Ok(row.map(WebhookLog::from))
}

/// Returns `false` when another delivery already claimed this webhook id.
pub async fn insert(pool: &PgPool, log: &NewWebhookLog) -> Result<bool, PipelineError> {
    let inserted = sqlx::query_scalar::<_, bool>(
        r#"
        INSERT INTO webhook_logs (webhook_id, provider, event_type, payload, signature)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (webhook_id) DO NOTHING
        RETURNING true
        "#,
    )
    .bind(log.webhook_id.as_str())
    .bind(&log.provider)
    .bind(&log.event_type)
    .bind(&log.payload)
    .bind(log.signature.as_deref())
    .fetch_optional(pool)
    .await?;
    Ok(inserted.is_some())
}

pub async fn mark_processed(pool: &PgPool, webhook_id: &WebhookId) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        UPDATE webhook_logs
        SET processed = true, processed_at = now(), error_message = NULL
        WHERE webhook_id = $1
        "#,
    )
    .bind(webhook_id.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn record_failure(
    pool: &PgPool,
    webhook_id: &WebhookId,
    error: &str,
) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        UPDATE webhook_logs
        SET error_message = $2, retry_count = retry_count + 1
        WHERE webhook_id = $1
        "#,
    )
    .bind(webhook_id.as_str())
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}
