mod common;

use common::{endpoint, token_for, RecordingTransport};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use webpush_dispatch::dispatch::{DispatchError, Dispatcher};
use webpush_dispatch::model::{DeliveryStatus, DispatchRequest, NotificationPayload};
use webpush_dispatch::renderer::parse_event_data;
use webpush_dispatch::token::TokenDecodeError;
use webpush_dispatch::validator::validate;

fn request(tokens: Vec<String>) -> DispatchRequest {
    DispatchRequest {
        tokens,
        payload: NotificationPayload::new("Hi", "Hello"),
    }
}

#[tokio::test]
async fn delivers_once_to_every_subscriber() {
    let transport = RecordingTransport::new();
    let dispatcher = Dispatcher::new(Arc::new(transport.clone()));

    let tokens = (0..5).map(token_for).collect();
    let report = dispatcher.dispatch(&request(tokens)).await.unwrap();

    assert!(report.all_delivered());
    assert_eq!(report.delivered(), 5);

    let calls = transport.calls().await;
    assert_eq!(calls.len(), 5);
    let mut endpoints: Vec<_> = calls.iter().map(|c| c.endpoint.clone()).collect();
    endpoints.sort();
    let mut expected: Vec<_> = (0..5).map(endpoint).collect();
    expected.sort();
    assert_eq!(endpoints, expected);
}

#[tokio::test]
async fn payload_is_serialized_once_and_shared() {
    let transport = RecordingTransport::new();
    let dispatcher = Dispatcher::new(Arc::new(transport.clone()));

    dispatcher
        .dispatch(&request(vec![token_for(0), token_for(1)]))
        .await
        .unwrap();

    let calls = transport.calls().await;
    assert_eq!(calls[0].payload, calls[1].payload);
    let wire: serde_json::Value = serde_json::from_slice(&calls[0].payload).unwrap();
    assert_eq!(wire, json!({ "title": "Hi", "body": "Hello" }));
}

#[tokio::test]
async fn one_failed_delivery_fails_the_dispatch() {
    let failing = endpoint(2);
    let transport = RecordingTransport::failing(&[failing.as_str()]);
    let dispatcher = Dispatcher::new(Arc::new(transport.clone()));

    let tokens = (0..4).map(token_for).collect();
    let err = dispatcher.dispatch(&request(tokens)).await.unwrap_err();

    match err {
        DispatchError::Delivery {
            failed,
            total,
            reason,
            report,
        } => {
            assert_eq!(failed, 1);
            assert_eq!(total, 4);
            assert!(reason.contains("410"));
            assert_eq!(report.outcomes[2].status, DeliveryStatus::DeliveryFailed);
            assert_eq!(report.delivered(), 3);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // The other subscribers were still attempted exactly once.
    assert_eq!(transport.calls().await.len(), 4);
}

#[tokio::test]
async fn undecodable_token_blocks_all_delivery() {
    let transport = RecordingTransport::new();
    let dispatcher = Dispatcher::new(Arc::new(transport.clone()));

    let tokens = vec![token_for(0), "!!not-a-token!!".to_string(), token_for(2)];
    let err = dispatcher.dispatch(&request(tokens)).await.unwrap_err();

    match err {
        DispatchError::Decode { index, source } => {
            assert_eq!(index, 1);
            assert!(matches!(source, TokenDecodeError::Base64(_)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(transport.calls().await.is_empty());
}

#[tokio::test]
async fn dispatch_each_reports_every_subscriber() {
    let failing = endpoint(3);
    let transport = RecordingTransport::failing(&[failing.as_str()]);
    let dispatcher = Dispatcher::new(Arc::new(transport.clone()));

    let tokens = vec![
        token_for(0),
        "e30=".to_string(), // `{}`: no endpoint
        token_for(2),
        token_for(3),
    ];
    let report = dispatcher.dispatch_each(&request(tokens)).await.unwrap();

    let statuses: Vec<_> = report.outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            DeliveryStatus::Delivered,
            DeliveryStatus::DecodeFailed,
            DeliveryStatus::Delivered,
            DeliveryStatus::DeliveryFailed,
        ]
    );
    let indexes: Vec<_> = report.outcomes.iter().map(|o| o.subscriber_index).collect();
    assert_eq!(indexes, vec![0, 1, 2, 3]);
    assert!(report.outcomes[1]
        .reason
        .as_deref()
        .unwrap()
        .contains("endpoint"));
    assert_eq!(report.first_failure().map(|o| o.subscriber_index), Some(1));

    // Decode failures never reach the transport.
    assert_eq!(transport.calls().await.len(), 3);
}

#[tokio::test]
async fn deliveries_start_concurrently() {
    let delay = Duration::from_millis(200);
    let transport = RecordingTransport::new().with_delay(delay);
    let dispatcher = Dispatcher::new(Arc::new(transport.clone()));

    let tokens = (0..6).map(token_for).collect();
    dispatcher.dispatch(&request(tokens)).await.unwrap();

    let calls = transport.calls().await;
    assert_eq!(calls.len(), 6);
    let first = calls.iter().map(|c| c.started).min().unwrap();
    let last = calls.iter().map(|c| c.started).max().unwrap();
    // Sequential delivery would space starts at least `delay` apart.
    assert!(last.duration_since(first) < delay / 2);
}

#[tokio::test]
async fn delivered_payload_renders_on_the_device() {
    let transport = RecordingTransport::new();
    let dispatcher = Dispatcher::new(Arc::new(transport.clone()));

    let body = json!({
        "tokens": [token_for(0)],
        "payload": {
            "title": "T",
            "body": "B",
            "tag": "news",
            "requireInteraction": true,
            "data": { "url": "/inbox" }
        }
    });
    let req = validate(&body).unwrap();
    dispatcher.dispatch(&req).await.unwrap();

    let calls = transport.calls().await;
    let (title, options) = parse_event_data(&calls[0].payload).unwrap();
    assert_eq!(title, "T");
    assert!(options.get("title").is_none());
    assert_eq!(options.get("body"), Some(&json!("B")));
    assert_eq!(options.get("tag"), Some(&json!("news")));
    assert_eq!(options.get("requireInteraction"), Some(&json!(true)));
    assert_eq!(options.get("data"), Some(&json!({ "url": "/inbox" })));
}
