use axum::body::{to_bytes, Body};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use seadrift_domain::capsule::{DeliveryQueueItem, OutboxEntry, SentBottleStatus, TargetGender};
use seadrift_domain::entitlements::Tier;
use seadrift_domain::profile::{CandidateProfile, Gender};
use seadrift_domain::util::now_ms;
use seadrift_infra::config::AppConfig;
use seadrift_infra::repositories::MemoryBackend;

use crate::routes;
use crate::state::AppState;

const SERVICE_TOKEN: &str = "test-service-token";
const KM_PER_DEGREE_LAT: f64 = 111.195;

fn test_config() -> AppConfig {
    AppConfig {
        app_env: "test".to_string(),
        port: 0,
        log_level: "info".to_string(),
        data_backend: "memory".to_string(),
        store_base_url: "http://127.0.0.1:54321".to_string(),
        store_service_key: "test-key".to_string(),
        store_timeout_ms: 2_000,
        service_token: SERVICE_TOKEN.to_string(),
        delivery_delay_ms: 0,
        email_api_url: "http://127.0.0.1:1/emails".to_string(),
        email_api_key: "test-email-key".to_string(),
        email_from: "SeaDrift <noreply@seadrift.test>".to_string(),
        worker_poll_interval_ms: 60_000,
    }
}

fn test_app() -> (MemoryBackend, Router) {
    let backend = MemoryBackend::new();
    let state =
        AppState::with_repositories(test_config(), backend.repositories()).expect("app state");
    (backend, routes::router(state))
}

fn candidate(id: &str, km_north: f64, age: i32, gender: Gender) -> CandidateProfile {
    CandidateProfile {
        id: id.to_string(),
        lat: Some(km_north / KM_PER_DEGREE_LAT),
        lng: Some(0.0),
        birth_year: Some(seadrift_domain::util::current_utc_year() - age),
        gender: Some(gender),
        receive_bottles: true,
    }
}

fn sender_profile(id: &str) -> CandidateProfile {
    CandidateProfile {
        id: id.to_string(),
        lat: Some(0.0),
        lng: Some(0.0),
        birth_year: Some(1990),
        gender: Some(Gender::Other),
        receive_bottles: false,
    }
}

fn outbox_entry(id: &str, sender_id: &str) -> OutboxEntry {
    OutboxEntry {
        id: id.to_string(),
        sender_id: sender_id.to_string(),
        text: "message in a bottle".to_string(),
        target_gender: None,
        min_age: None,
        max_age: None,
        max_distance_km: None,
        created_at_ms: now_ms(),
        processed_at_ms: None,
    }
}

fn queue_item(id: &str, bottle_id: &str, recipient_id: &str, scheduled_at_ms: i64) -> DeliveryQueueItem {
    DeliveryQueueItem {
        id: id.to_string(),
        sent_bottle_id: bottle_id.to_string(),
        recipient_id: recipient_id.to_string(),
        scheduled_delivery_at_ms: scheduled_at_ms,
        delivered: false,
        delivered_at_ms: None,
    }
}

async fn request(app: &Router, method: &str, path: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn run_matching(app: &Router) -> (StatusCode, Value) {
    request(app, "POST", "/internal/matching/run", Some(SERVICE_TOKEN), None).await
}

async fn run_delivery(app: &Router) -> (StatusCode, Value) {
    request(app, "POST", "/internal/delivery/run", Some(SERVICE_TOKEN), None).await
}

#[tokio::test]
async fn health_reports_ok() {
    let (_backend, app) = test_app();
    let (status, body) = request(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["environment"], "test");
}

#[tokio::test]
async fn internal_routes_require_service_token() {
    let (_backend, app) = test_app();

    let (status, _) = request(&app, "POST", "/internal/matching/run", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(&app, "POST", "/internal/delivery/run", Some("wrong"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn matching_routes_only_to_the_eligible_in_range_candidate() {
    let (backend, app) = test_app();
    backend.profiles.upsert(sender_profile("sender-1")).await;
    backend
        .profiles
        .upsert(candidate("near-female", 10.0, 25, Gender::Female))
        .await;
    backend
        .profiles
        .upsert(candidate("far-female", 60.0, 24, Gender::Female))
        .await;
    backend
        .profiles
        .upsert(candidate("near-male", 20.0, 22, Gender::Male))
        .await;

    let mut entry = outbox_entry("capsule-1", "sender-1");
    entry.min_age = Some(18);
    entry.max_age = Some(30);
    entry.target_gender = Some(TargetGender::Female);
    entry.max_distance_km = Some(50.0);
    backend.outbox.push(entry).await;

    let (status, body) = run_matching(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["processed"], 1);

    let matches = backend.fanout.matches_snapshot().await;
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].outbox_id, "capsule-1");
    assert_eq!(matches[0].recipient_id, "near-female");

    let messages = backend.fanout.messages_snapshot().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].receiver_id, "near-female");
    assert_eq!(messages[0].sender_id, "sender-1");
    assert_eq!(messages[0].content_type, "text");
    assert_eq!(messages[0].message, "message in a bottle");
    assert!(!messages[0].is_read);
    assert!(!messages[0].is_replied);

    let queued = backend.delivery_queue.snapshot().await;
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].sent_bottle_id, "capsule-1");
    assert_eq!(queued[0].recipient_id, "near-female");
    assert!(!queued[0].delivered);
}

#[tokio::test]
async fn matching_skips_entry_with_no_candidates() {
    let (backend, app) = test_app();
    backend.profiles.upsert(sender_profile("sender-1")).await;
    backend.outbox.push(outbox_entry("capsule-1", "sender-1")).await;

    let (status, body) = run_matching(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 0);
    assert!(backend.fanout.matches_snapshot().await.is_empty());
    assert!(backend.fanout.messages_snapshot().await.is_empty());
}

#[tokio::test]
async fn matching_skips_sender_without_location() {
    let (backend, app) = test_app();
    let mut sender = sender_profile("sender-1");
    sender.lat = None;
    sender.lng = None;
    backend.profiles.upsert(sender).await;
    backend
        .profiles
        .upsert(candidate("candidate-1", 10.0, 25, Gender::Female))
        .await;
    backend.outbox.push(outbox_entry("capsule-1", "sender-1")).await;

    let (_, body) = run_matching(&app).await;
    assert_eq!(body["processed"], 0);
    assert!(backend.fanout.matches_snapshot().await.is_empty());
}

#[tokio::test]
async fn matching_caps_fanout_at_twenty_recipients() {
    let (backend, app) = test_app();
    backend.profiles.upsert(sender_profile("sender-1")).await;
    for index in 0..35 {
        backend
            .profiles
            .upsert(candidate(
                &format!("candidate-{index:02}"),
                5.0 + index as f64,
                25,
                Gender::Female,
            ))
            .await;
    }
    backend.outbox.push(outbox_entry("capsule-1", "sender-1")).await;

    let (_, body) = run_matching(&app).await;
    assert_eq!(body["processed"], 1);

    let matches = backend.fanout.matches_snapshot().await;
    assert_eq!(matches.len(), 20);

    let recipients: std::collections::HashSet<_> = matches
        .iter()
        .map(|capsule_match| capsule_match.recipient_id.clone())
        .collect();
    assert_eq!(recipients.len(), 20, "no recipient may appear twice");

    assert_eq!(backend.fanout.messages_snapshot().await.len(), 20);
    assert_eq!(backend.delivery_queue.snapshot().await.len(), 20);
}

#[tokio::test]
async fn matching_rerun_does_not_rematch_processed_entries() {
    let (backend, app) = test_app();
    backend.profiles.upsert(sender_profile("sender-1")).await;
    backend
        .profiles
        .upsert(candidate("candidate-1", 10.0, 25, Gender::Female))
        .await;
    backend.outbox.push(outbox_entry("capsule-1", "sender-1")).await;

    let (_, body) = run_matching(&app).await;
    assert_eq!(body["processed"], 1);

    let entries = backend.outbox.snapshot().await;
    assert!(entries[0].processed_at_ms.is_some());

    let (_, body) = run_matching(&app).await;
    assert_eq!(body["processed"], 0);
    assert_eq!(backend.fanout.matches_snapshot().await.len(), 1);
}

#[tokio::test]
async fn matching_fatal_outbox_read_returns_500() {
    let (backend, app) = test_app();
    backend.outbox.set_fail_reads(true);

    let (status, body) = run_matching(&app).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap_or_default().contains("outbox"));
}

#[tokio::test]
async fn delivery_transitions_due_item() {
    let (backend, app) = test_app();
    let yesterday = now_ms() - 86_400_000;
    backend
        .delivery_queue
        .push(queue_item("item-1", "capsule-1", "recipient-1", yesterday))
        .await;

    let (status, body) = run_delivery(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["stats"]["checked"], 1);
    assert_eq!(body["stats"]["delivered"], 1);
    assert_eq!(body["stats"]["errors"], 0);
    assert!(body["timestamp"].as_str().is_some());

    let items = backend.delivery_queue.snapshot().await;
    assert!(items[0].delivered);
    assert!(items[0].delivered_at_ms.is_some());

    let bottle = backend.sent_bottles.get("capsule-1").await.expect("bottle");
    assert_eq!(bottle.status, SentBottleStatus::Delivered);
    assert!(bottle.delivered_at_ms.is_some());

    assert_eq!(backend.daily_counter.count_for("recipient-1").await, 1);
}

#[tokio::test]
async fn delivery_ignores_items_scheduled_in_the_future() {
    let (backend, app) = test_app();
    let tomorrow = now_ms() + 86_400_000;
    backend
        .delivery_queue
        .push(queue_item("item-1", "capsule-1", "recipient-1", tomorrow))
        .await;

    let (_, body) = run_delivery(&app).await;
    assert_eq!(body["stats"]["checked"], 0);
    assert_eq!(body["stats"]["delivered"], 0);

    let items = backend.delivery_queue.snapshot().await;
    assert!(!items[0].delivered);
    assert_eq!(backend.daily_counter.count_for("recipient-1").await, 0);
}

#[tokio::test]
async fn delivery_rerun_is_a_noop_for_delivered_items() {
    let (backend, app) = test_app();
    backend
        .delivery_queue
        .push(queue_item("item-1", "capsule-1", "recipient-1", now_ms() - 1_000))
        .await;

    let (_, first) = run_delivery(&app).await;
    assert_eq!(first["stats"]["delivered"], 1);

    let (_, second) = run_delivery(&app).await;
    assert_eq!(second["stats"]["checked"], 0);
    assert_eq!(second["stats"]["delivered"], 0);

    assert_eq!(backend.daily_counter.count_for("recipient-1").await, 1);
}

#[tokio::test]
async fn delivery_counter_failure_does_not_count_as_error() {
    let (backend, app) = test_app();
    backend.daily_counter.set_fail_increments(true);
    backend
        .delivery_queue
        .push(queue_item("item-1", "capsule-1", "recipient-1", now_ms() - 1_000))
        .await;

    let (_, body) = run_delivery(&app).await;
    assert_eq!(body["stats"]["delivered"], 1);
    assert_eq!(body["stats"]["errors"], 0);

    let items = backend.delivery_queue.snapshot().await;
    assert!(items[0].delivered);
}

#[tokio::test]
async fn delivery_sent_bottle_failure_leaves_item_queued() {
    let (backend, app) = test_app();
    backend.sent_bottles.set_fail_updates(true);
    backend
        .delivery_queue
        .push(queue_item("item-1", "capsule-1", "recipient-1", now_ms() - 1_000))
        .await;

    let (status, body) = run_delivery(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["checked"], 1);
    assert_eq!(body["stats"]["delivered"], 0);
    assert_eq!(body["stats"]["errors"], 1);

    let items = backend.delivery_queue.snapshot().await;
    assert!(!items[0].delivered, "queue item must stay queued for retry");
    assert_eq!(backend.daily_counter.count_for("recipient-1").await, 0);

    // Next sweep retries the same item once the store recovers.
    backend.sent_bottles.set_fail_updates(false);
    let (_, body) = run_delivery(&app).await;
    assert_eq!(body["stats"]["delivered"], 1);
}

#[tokio::test]
async fn subscription_webhook_upserts_premium_and_elite_tiers() {
    let (backend, app) = test_app();

    let premium_event = json!({
        "type": "customer.subscription.updated",
        "data": { "object": {
            "status": "active",
            "metadata": { "user_id": "user-1" },
            "current_period_end": 1_700_000_000,
        }},
    });
    let (status, body) =
        request(&app, "POST", "/webhooks/subscriptions", None, Some(premium_event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let entitlement = backend.entitlements.get("user-1").await.expect("entitlement");
    assert_eq!(entitlement.tier, Tier::Premium);
    assert_eq!(entitlement.source, "stripe");

    let elite_event = json!({
        "type": "customer.subscription.updated",
        "data": { "object": {
            "status": "active",
            "metadata": { "user_id": "user-1" },
            "items": [{ "price": { "id": "price_elite_yearly" } }],
        }},
    });
    request(&app, "POST", "/webhooks/subscriptions", None, Some(elite_event)).await;

    let entitlement = backend.entitlements.get("user-1").await.expect("entitlement");
    assert_eq!(entitlement.tier, Tier::Elite);
}

#[tokio::test]
async fn subscription_webhook_acknowledges_events_without_user_id() {
    let (backend, app) = test_app();
    let event = json!({
        "type": "customer.subscription.updated",
        "data": { "object": { "status": "active" } },
    });

    let (status, body) = request(&app, "POST", "/webhooks/subscriptions", None, Some(event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(backend.entitlements.get("user-1").await.is_none());
}

#[tokio::test]
async fn send_email_rejects_invalid_recipient() {
    let (_backend, app) = test_app();
    let payload = json!({
        "recipient_email": "not-an-email",
        "subject": "hello",
        "html": "<p>hi</p>",
    });

    let (status, _) = request(
        &app,
        "POST",
        "/internal/emails/send",
        Some(SERVICE_TOKEN),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
