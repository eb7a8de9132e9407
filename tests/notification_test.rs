//! Turn notices delivered over the webhook

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use standboard::drawing::DrawingSettings;
use standboard::engine::{fixed_clock, Engine};
use standboard::models::Member;
use standboard::notifications::{WebhookConfig, WebhookNotifier};

async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<serde_json::Value> {
    for _ in 0..50 {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= count {
            return received
                .iter()
                .map(|r| serde_json::from_slice(&r.body).unwrap())
                .collect();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {count} webhook requests");
}

#[tokio::test]
async fn test_drawing_sends_turn_notices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(WebhookConfig::new(format!("{}/notify", server.uri()))).unwrap();
    let engine = Engine::builder(store_with_edges(&[]))
        .settings(DrawingSettings {
            on_deck_delay_secs: 0,
            ..Default::default()
        })
        .notifier(Arc::new(notifier))
        .clock(fixed_clock(june()))
        .build();

    engine
        .upsert_member(
            &Member::new(user("pat"))
                .with_contact("555-0100")
                .with_priority(true),
        )
        .await
        .unwrap();
    engine
        .upsert_member(&Member::new(user("sam")).with_contact("555-0101"))
        .await
        .unwrap();
    engine.toggle_entry("pat").await.unwrap();
    engine.toggle_entry("sam").await.unwrap();

    engine.start_lottery().await.unwrap();

    let mut bodies = wait_for_requests(&server, 2).await;
    bodies.sort_by_key(|b| b["to"].as_str().unwrap_or_default().to_string());
    assert_eq!(bodies[0]["to"], "555-0100");
    assert!(bodies[0]["message"].as_str().unwrap().contains("your turn"));
    assert_eq!(bodies[1]["to"], "555-0101");
    assert!(bodies[1]["message"].as_str().unwrap().contains("on deck"));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_failed_delivery_does_not_stop_drawing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(WebhookConfig::new(server.uri())).unwrap();
    let engine = Engine::builder(store_with_edges(&[]))
        .notifier(Arc::new(notifier))
        .clock(fixed_clock(june()))
        .build();

    engine
        .upsert_member(&Member::new(user("pat")).with_contact("555-0100"))
        .await
        .unwrap();
    engine.toggle_entry("pat").await.unwrap();
    engine.start_lottery().await.unwrap();

    wait_for_requests(&server, 1).await;
    let status = engine.current_status("pat").await.unwrap();
    assert!(status.is_running);
    assert_eq!(status.position, Some(0));

    engine.shutdown().await;
}
