use {
    crate::domain::{
        error::PipelineError,
        events::{DomainEvent, EventPublisher},
    },
    serde::Serialize,
    std::time::Duration,
    tokio::sync::{mpsc, watch},
};

pub const PAYMENTS_TOPIC: &str = "payments";

/// Queues events for the dispatcher task. `publish` never waits: a full or
/// closed queue is reported as an error and the event is dropped.
#[derive(Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<DomainEvent>,
}

impl ChannelPublisher {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DomainEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, event: DomainEvent) -> Result<(), PipelineError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(ev) => PipelineError::Publish(format!(
                "event queue full, dropped {} for payment {}",
                ev.event_type.as_str(),
                ev.payment_id
            )),
            mpsc::error::TrySendError::Closed(_) => {
                PipelineError::Publish("event dispatcher stopped".into())
            }
        })
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    event: &'a DomainEvent,
}

/// Where dispatched events end up.
pub enum EventSink {
    /// POSTs each event to the bus endpoint.
    Http {
        client: reqwest::Client,
        url: String,
    },
    /// No bus configured: events are only logged.
    Log,
}

impl EventSink {
    pub fn http(url: impl Into<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Publish(format!("event bus client: {e}")))?;
        Ok(Self::Http {
            client,
            url: url.into(),
        })
    }

    async fn send(&self, event: &DomainEvent) -> Result<(), PipelineError> {
        match self {
            Self::Http { client, url } => {
                let resp = client
                    .post(url)
                    .json(&Envelope {
                        topic: PAYMENTS_TOPIC,
                        event,
                    })
                    .send()
                    .await
                    .map_err(|e| PipelineError::Publish(e.to_string()))?;
                if !resp.status().is_success() {
                    return Err(PipelineError::Publish(format!(
                        "event bus responded {}",
                        resp.status()
                    )));
                }
                Ok(())
            }
            Self::Log => {
                tracing::info!(
                    topic = PAYMENTS_TOPIC,
                    event_type = event.event_type.as_str(),
                    payment_id = %event.payment_id,
                    order_id = %event.order_id,
                    amount = %event.amount,
                    "domain event"
                );
                Ok(())
            }
        }
    }
}

/// Forwards queued events to the sink until shutdown, then drains what is
/// already queued. Delivery failures are logged, never retried.
pub async fn run_dispatcher(
    mut rx: mpsc::Receiver<DomainEvent>,
    sink: EventSink,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("event dispatcher started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            next = rx.recv() => match next {
                Some(event) => deliver(&sink, &event).await,
                None => {
                    tracing::info!("event queue closed");
                    return;
                }
            },
        }
    }

    rx.close();
    while let Some(event) = rx.recv().await {
        deliver(&sink, &event).await;
    }
    tracing::info!("event dispatcher shutting down");
}

async fn deliver(sink: &EventSink, event: &DomainEvent) {
    if let Err(e) = sink.send(event).await {
        tracing::warn!(
            event_type = event.event_type.as_str(),
            payment_id = %event.payment_id,
            error = %e,
            "domain event delivery failed"
        );
    }
}
