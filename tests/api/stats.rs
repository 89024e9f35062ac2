use reqwest::StatusCode;

use wiremock::matchers::*;
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{EmailBody, TestApp};

#[tokio::test]
async fn stats_on_empty_store_are_zero() {
    let app = TestApp::spawn().await;

    let res = app.stats().await.expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(
        serde_json::json!({
            "success": true,
            "data": {
                "totalSubscribers": 0,
                "activeSubscribers": 0,
                "unsubscribed": 0,
                "recentSubscriptions": 0
            }
        }),
        body
    );
}

#[tokio::test]
async fn stats_follow_subscriptions() {
    let app = TestApp::spawn().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;

    for email in ["one@test.com", "two@test.com", "three@test.com"] {
        app.subscribe(&EmailBody::new(email)).await.unwrap();
    }
    app.unsubscribe(&EmailBody::new("two@test.com")).await.unwrap();

    let body: serde_json::Value = app.stats().await.unwrap().json().await.unwrap();

    assert_eq!(
        serde_json::json!({
            "totalSubscribers": 3,
            "activeSubscribers": 2,
            "unsubscribed": 1,
            "recentSubscriptions": 2
        }),
        body["data"]
    );
}
