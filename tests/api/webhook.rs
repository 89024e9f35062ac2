use std::time::Duration;

use reqwest::StatusCode;

use secrecy::Secret;

use wiremock::matchers::*;
use wiremock::{Mock, ResponseTemplate};

use newsletter::webhook::WebhookAuth;

use crate::helpers::{unsubscribe_links, TestApp, FRONTEND_BASE_URL, WEBHOOK_SECRET};

fn insert_event(email: &str, token: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "INSERT",
        "table": "subscribers",
        "record": {
            "email": email,
            "unsubscribe_token": token,
            "confirmed": false
        }
    })
}

#[tokio::test]
async fn webhook_dispatches_welcome_email_for_new_subscriber() {
    let app = TestApp::spawn().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let res = app
        .webhook(Some(WEBHOOK_SECRET), &insert_event("test@test.com", "tok-1"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(serde_json::json!({ "success": true }), body);

    let emails = app.wait_for_emails(1).await;
    let (html_link, _) = unsubscribe_links(&emails[0]);
    assert_eq!(
        format!("{}/newsletter/unsubscribe/tok-1", FRONTEND_BASE_URL),
        html_link
    );
}

#[tokio::test]
async fn webhook_with_wrong_secret_is_unauthorized() {
    let app = TestApp::spawn().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    for secret in [Some("wrong-secret"), None] {
        let res = app
            .webhook(secret, &insert_event("test@test.com", "tok-1"))
            .await
            .expect("Failed to execute request");

        assert_eq!(StatusCode::UNAUTHORIZED, res.status());
    }

    // Give a wrongly dispatched email the chance to arrive
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn webhook_ignores_other_events() {
    let app = TestApp::spawn().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let events = vec![
        serde_json::json!({
            "type": "UPDATE",
            "table": "subscribers",
            "record": { "email": "test@test.com", "unsubscribe_token": "tok-1" }
        }),
        serde_json::json!({
            "type": "INSERT",
            "table": "users",
            "record": { "email": "test@test.com", "unsubscribe_token": "tok-1" }
        }),
        serde_json::json!({
            "type": "INSERT",
            "table": "subscribers",
            "record": { "email": "test@test.com" }
        }),
    ];

    for event in events {
        let res = app.webhook(Some(WEBHOOK_SECRET), &event).await.unwrap();
        assert_eq!(StatusCode::OK, res.status());
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn webhook_acknowledges_malformed_payload_without_sending() {
    let app = TestApp::spawn().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let res = app
        .webhook(Some(WEBHOOK_SECRET), &serde_json::json!({ "record": {} }))
        .await
        .unwrap();

    assert_eq!(StatusCode::OK, res.status());
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(serde_json::json!({ "success": true }), body);

    let res = app
        .request(reqwest::Method::POST, "newsletter/webhook")
        .header("x-webhook-secret", WEBHOOK_SECRET)
        .body("not json")
        .send()
        .await
        .unwrap();

    assert_eq!(StatusCode::OK, res.status());

    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn webhook_without_configured_secret_is_rejected_when_required() {
    let app = TestApp::spawn_with_webhook_auth(WebhookAuth::new(None, true)).await;

    let res = app
        .webhook(None, &insert_event("test@test.com", "tok-1"))
        .await
        .unwrap();

    assert_eq!(StatusCode::UNAUTHORIZED, res.status());
}

#[tokio::test]
async fn webhook_without_configured_secret_is_accepted_when_optional() {
    let app = TestApp::spawn_with_webhook_auth(WebhookAuth::new(None, false)).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let res = app
        .webhook(None, &insert_event("test@test.com", "tok-1"))
        .await
        .unwrap();

    assert_eq!(StatusCode::OK, res.status());
    app.wait_for_emails(1).await;
}

#[tokio::test]
async fn configured_secret_is_enforced_even_when_optional() {
    let auth = WebhookAuth::new(Some(Secret::new("other".into())), false);
    let app = TestApp::spawn_with_webhook_auth(auth).await;

    let res = app
        .webhook(Some(WEBHOOK_SECRET), &insert_event("test@test.com", "tok-1"))
        .await
        .unwrap();

    assert_eq!(StatusCode::UNAUTHORIZED, res.status());
}
