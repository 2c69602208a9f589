use {
    marketplace_payments::{
        AppState,
        adapters::{
            http::router,
            yookassa::{YooKassaConfig, YooKassaGateway},
        },
        config::Config,
        domain::{events::EventPublisher, provider::PaymentGateway, store::LedgerStore},
        infra::{
            event_bus::{ChannelPublisher, EventSink, run_dispatcher},
            postgres::ledger::PgLedgerStore,
        },
        services::{
            payment_service::{PaymentService, PaymentSettings},
            webhook_reconciler::WebhookReconciler,
        },
    },
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().expect("invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let store: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(pool));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        YooKassaGateway::new(YooKassaConfig {
            api_url: config.api_url.clone(),
            shop_id: config.shop_id.clone(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            web_app_url: config.web_app_url.clone(),
            timeout: config.gateway_timeout,
            max_attempts: config.gateway_max_attempts,
            retry_base: config.gateway_retry_base,
        })
        .expect("failed to build gateway client"),
    );

    let (publisher, events_rx) = ChannelPublisher::new(config.event_queue_capacity);
    let publisher: Arc<dyn EventPublisher> = Arc::new(publisher);
    let sink = match &config.event_bus_url {
        Some(url) => {
            EventSink::http(url.clone(), Duration::from_secs(5)).expect("failed to build event sink")
        }
        None => {
            tracing::warn!("EVENT_BUS_URL not set, domain events are only logged");
            EventSink::Log
        }
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = tokio::spawn(run_dispatcher(events_rx, sink, shutdown_rx));

    let state = AppState {
        payments: Arc::new(PaymentService::new(
            store.clone(),
            gateway.clone(),
            publisher.clone(),
            PaymentSettings {
                currency: config.currency,
                default_commission: config.default_commission,
            },
        )),
        webhooks: Arc::new(WebhookReconciler::new(store, gateway, publisher)),
    };

    // Outlives the gateway timeout including retries.
    let request_timeout = config.gateway_timeout * (config.gateway_max_attempts.max(1) + 1);
    let app = router(state, request_timeout);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("failed to bind");
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    if let Err(e) = dispatcher.await {
        tracing::error!(error = %e, "event dispatcher panicked");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
