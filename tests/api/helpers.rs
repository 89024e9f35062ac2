use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Response};

use secrecy::Secret;

use serde::Serialize;

use url::Url;

use wiremock::{MockServer, Request};

use newsletter::app::{self, AppState};
use newsletter::client::{EmailClient, EmailProvider, Sender, WelcomeMailer};
use newsletter::domain::Subscriber;
use newsletter::repo::{MemorySubscriberStore, SubscriberStore};
use newsletter::service::SubscriptionService;
use newsletter::templates::TemplateManager;
use newsletter::webhook::WebhookAuth;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const FRONTEND_BASE_URL: &str = "https://news.test.com";

#[derive(Debug, Serialize)]
pub struct EmailBody {
    pub email: Option<String>,
}

impl EmailBody {
    pub fn new(email: &str) -> Self {
        Self {
            email: Some(email.into()),
        }
    }
}

pub struct TestApp {
    addr: String,

    pub client: Client,
    pub email_server: MockServer,
    pub store: Arc<MemorySubscriberStore>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let webhook_auth = WebhookAuth::new(Some(Secret::new(WEBHOOK_SECRET.into())), true);
        let store = Arc::new(MemorySubscriberStore::new());

        Self::spawn_with(store.clone(), webhook_auth, store).await
    }

    pub async fn spawn_with_webhook_auth(webhook_auth: WebhookAuth) -> Self {
        let store = Arc::new(MemorySubscriberStore::new());

        Self::spawn_with(store.clone(), webhook_auth, store).await
    }

    /// Spawn against an arbitrary backing store, `store` is kept only for inspection
    pub async fn spawn_with(
        backing_store: Arc<dyn SubscriberStore>,
        webhook_auth: WebhookAuth,
        store: Arc<MemorySubscriberStore>,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to listen on random port");
        let port = listener.local_addr().unwrap().port();

        let addr = format!("http://127.0.0.1:{}", port);

        let email_server = MockServer::start().await;

        let templates = TemplateManager::new("Test News").expect("Failed to load templates");

        let email_client = {
            let sender = Sender {
                email: "test@test.com"
                    .parse()
                    .expect("Failed to parse sender email address"),
                name: "Test News".into(),
            };
            let api_base_url =
                Url::parse(&email_server.uri()).expect("Failed to parse mock server uri");
            let api_auth_token = Secret::new("TestAuthorization".into());
            let api_timeout = Duration::from_secs(2);

            EmailClient::new(
                EmailProvider::Postmark,
                sender,
                api_timeout,
                api_base_url,
                api_auth_token,
            )
            .expect("Failed to create email client")
        };

        let mailer = Arc::new(WelcomeMailer::new(
            email_client,
            templates.clone(),
            Url::parse(FRONTEND_BASE_URL).unwrap(),
        ));

        let state = AppState {
            service: SubscriptionService::new(backing_store, mailer),
            templates,
            webhook_auth,
        };

        let server = app::run(listener, state).expect("Failed to spawn app instance");
        let _ = tokio::spawn(server);

        let client = Client::new();

        Self {
            addr,
            client,
            email_server,
            store,
        }
    }

    pub fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", &self.addr, url);
        self.client.request(method, url)
    }

    pub async fn health_check(&self) -> reqwest::Result<Response> {
        self.request(Method::GET, "health_check").send().await
    }

    pub async fn deep_health_check(&self) -> reqwest::Result<Response> {
        self.request(Method::GET, "health_check/deep").send().await
    }

    pub async fn subscribe(&self, body: &EmailBody) -> reqwest::Result<Response> {
        self.request(Method::POST, "newsletter/subscribe")
            .json(body)
            .send()
            .await
    }

    pub async fn unsubscribe(&self, body: &EmailBody) -> reqwest::Result<Response> {
        self.request(Method::POST, "newsletter/unsubscribe")
            .json(body)
            .send()
            .await
    }

    pub async fn unsubscribe_link(&self, token: &str) -> reqwest::Result<Response> {
        self.request(Method::GET, &format!("newsletter/unsubscribe/{}", token))
            .send()
            .await
    }

    pub async fn stats(&self) -> reqwest::Result<Response> {
        self.request(Method::GET, "newsletter/stats").send().await
    }

    pub async fn webhook(
        &self,
        secret: Option<&str>,
        body: &serde_json::Value,
    ) -> reqwest::Result<Response> {
        let req = self.request(Method::POST, "newsletter/webhook").json(body);
        let req = match secret {
            Some(secret) => req.header("x-webhook-secret", secret),
            None => req,
        };
        req.send().await
    }

    pub fn subscriber(&self, email: &str) -> Option<Subscriber> {
        self.store.all().into_iter().find(|s| s.email == email)
    }

    /// Wait for the background welcome emails to reach the provider
    pub async fn wait_for_emails(&self, count: usize) -> Vec<Request> {
        for _ in 0..50 {
            let received = self
                .email_server
                .received_requests()
                .await
                .expect("Request recording is disabled");
            if received.len() >= count {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Expected {} email(s) to be sent", count);
    }
}

/// Extract the unsubscribe links from a send-email request
pub fn unsubscribe_links(email_request: &Request) -> (String, String) {
    let body: serde_json::Value = serde_json::from_slice(&email_request.body).unwrap();

    let get_link = |s: &str| {
        let links: Vec<_> = linkify::LinkFinder::new()
            .links(s)
            .filter(|l| *l.kind() == linkify::LinkKind::Url)
            .collect();
        assert_eq!(1, links.len());
        links[0].as_str().to_owned()
    };

    let html = get_link(body["HtmlBody"].as_str().unwrap());
    let text = get_link(body["TextBody"].as_str().unwrap());

    (html, text)
}
