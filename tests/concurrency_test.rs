mod common;

use common::*;
use marketplace_payments::domain::error::PipelineError;
use marketplace_payments::domain::events::DomainEventType;
use marketplace_payments::domain::payment::{PaymentStatus, ProcessResult};
use serde_json::json;
use std::sync::Arc;

// ── 1. concurrent_duplicate_webhooks ───────────────────────────────────────
// 10 tasks deliver the same webhook id. Exactly 1 applies, the rest are
// duplicates, and only one event is published.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_webhooks() {
    let h = Arc::new(Harness::new());
    let t = tenant("t1");
    let order = seed_two_vendor_order(&h.store, &t).await;
    let created = h.payments.create_payment(&t, order.id).await.unwrap();

    let auth = notification(
        "wh-auth",
        "payment.waiting_for_capture",
        json!({"id": created.external_id}),
    );
    h.webhooks.handle(&auth, Some(&sign(&auth))).await.unwrap();

    let body = notification(
        "wh-same",
        "payment.succeeded",
        json!({"id": created.external_id, "status": "succeeded"}),
    );
    let sig = sign(&body);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let h = h.clone();
        let body = body.clone();
        let sig = sig.clone();
        handles.push(tokio::spawn(async move {
            h.webhooks.handle(&body, Some(&sig)).await.unwrap()
        }));
    }

    let mut applied = 0;
    let mut duplicates = 0;
    let mut stale = 0;
    for handle in handles {
        match handle.await.unwrap() {
            ProcessResult::Applied(_) => applied += 1,
            ProcessResult::Duplicate => duplicates += 1,
            // Log row claimed but another delivery reprocessed it first.
            ProcessResult::Stale(_) => stale += 1,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    assert_eq!(applied, 1, "exactly 1 Applied");
    assert_eq!(duplicates + stale, 9);
    assert_eq!(h.publisher.count(DomainEventType::PaymentSucceeded), 1);
}

// ── 2. concurrent_distinct_succeeded_events ────────────────────────────────
// 5 different webhook ids all report succeeded. One transition, 4 stale.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_succeeded_events() {
    let h = Arc::new(Harness::new());
    let t = tenant("t1");
    let order = seed_two_vendor_order(&h.store, &t).await;
    let created = h.payments.create_payment(&t, order.id).await.unwrap();
    let auth = notification(
        "wh-auth",
        "payment.waiting_for_capture",
        json!({"id": created.external_id}),
    );
    h.webhooks.handle(&auth, Some(&sign(&auth))).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
        let h = h.clone();
        let body = notification(
            &format!("wh-succ-{i}"),
            "payment.succeeded",
            json!({"id": created.external_id}),
        );
        handles.push(tokio::spawn(async move {
            let sig = sign(&body);
            h.webhooks.handle(&body, Some(&sig)).await.unwrap()
        }));
    }

    let mut applied = 0;
    let mut stale = 0;
    for handle in handles {
        match handle.await.unwrap() {
            ProcessResult::Applied(_) => applied += 1,
            ProcessResult::Stale(_) => stale += 1,
            other => panic!("unexpected result: {other:?}"),
        }
    }
    assert_eq!((applied, stale), (1, 4));

    let details = h.payments.get_payment(&t, created.payment_id).await.unwrap();
    assert_eq!(details.payment.status, PaymentStatus::Succeeded);
    assert_eq!(h.publisher.count(DomainEventType::PaymentSucceeded), 1);
}

// ── 3. capture_races_cancel_webhook ────────────────────────────────────────
// API capture and a provider cancel race on the same authorized payment.
// Whatever wins, the other is refused and the order matches the payment.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn capture_races_cancel_webhook() {
    let h = Arc::new(Harness::new());
    let t = tenant("t1");
    let order = seed_two_vendor_order(&h.store, &t).await;
    let created = h.payments.create_payment(&t, order.id).await.unwrap();
    let auth = notification(
        "wh-auth",
        "payment.waiting_for_capture",
        json!({"id": created.external_id}),
    );
    h.webhooks.handle(&auth, Some(&sign(&auth))).await.unwrap();

    let capture = {
        let h = h.clone();
        let t = t.clone();
        let id = created.payment_id;
        tokio::spawn(async move { h.payments.capture_payment(&t, id).await })
    };
    let cancel = {
        let h = h.clone();
        let body = notification("wh-cancel", "payment.canceled", json!({"id": created.external_id}));
        tokio::spawn(async move {
            let sig = sign(&body);
            h.webhooks.handle(&body, Some(&sig)).await.unwrap()
        })
    };

    let capture = capture.await.unwrap();
    let cancel = cancel.await.unwrap();
    let details = h.payments.get_payment(&t, created.payment_id).await.unwrap();
    let state = h.store.order_state(order.id).await.unwrap();

    match details.payment.status {
        PaymentStatus::Captured => {
            assert!(capture.is_ok());
            assert!(matches!(cancel, ProcessResult::Anomaly(_)), "got {cancel:?}");
            assert_eq!(state.payment_status, "paid");
        }
        PaymentStatus::Canceled => {
            assert!(matches!(capture, Err(PipelineError::InvalidState(_))));
            assert!(matches!(cancel, ProcessResult::Applied(_)), "got {cancel:?}");
            assert_eq!(state.payment_status, "failed");
        }
        other => panic!("unexpected final status: {other}"),
    }
}

// ── 4. concurrent_create_for_same_order ────────────────────────────────────
// At most one active payment per order even when creates race.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_create_for_same_order() {
    let h = Arc::new(Harness::new());
    let t = tenant("t1");
    let order = seed_two_vendor_order(&h.store, &t).await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let h = h.clone();
        let t = t.clone();
        handles.push(tokio::spawn(async move { h.payments.create_payment(&t, order.id).await }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(PipelineError::InvalidState(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(h.store.payment_count().await, 1);
}
