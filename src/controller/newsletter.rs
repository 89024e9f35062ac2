use actix_web::dev::HttpServiceFactory;
use actix_web::http::header::{ContentType, USER_AGENT};
use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};

use serde::{Deserialize, Serialize};

use crate::controller::error::{RestError, RestResult};
use crate::domain::{SubscribeOutcome, SubscriberStats};
use crate::error::Error;
use crate::service::SubscriptionService;
use crate::templates::TemplateManager;
use crate::webhook::{self, WebhookAuth, WebhookEvent, WEBHOOK_SECRET_HEADER};

/// Body of the subscribe and unsubscribe endpoints
#[derive(Debug, Deserialize)]
pub struct EmailBody {
    email: Option<String>,
}

impl EmailBody {
    fn email(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeResponse {
    success: bool,
    message: &'static str,
    already_subscribed: bool,
}

impl From<SubscribeOutcome> for SubscribeResponse {
    fn from(outcome: SubscribeOutcome) -> Self {
        Self {
            success: true,
            message: outcome.message(),
            already_subscribed: outcome.already_subscribed(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    success: bool,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    success: bool,
    data: SubscriberStats,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

/// Subscribe an email address to the newsletter
#[tracing::instrument(name = "Subscribe request", skip(req, service, body))]
#[post("/subscribe")]
async fn subscribe(
    req: HttpRequest,
    service: web::Data<SubscriptionService>,
    body: web::Json<EmailBody>,
) -> RestResult<impl Responder> {
    let ip_address = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or_default()
        .to_string();
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let outcome = service
        .subscribe(body.email(), &ip_address, user_agent)
        .await?;

    let status = if outcome.already_subscribed() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok(HttpResponse::build(status).json(SubscribeResponse::from(outcome)))
}

/// Unsubscribe an email address from the newsletter
#[tracing::instrument(name = "Unsubscribe request", skip(service, body))]
#[post("/unsubscribe")]
async fn unsubscribe(
    service: web::Data<SubscriptionService>,
    body: web::Json<EmailBody>,
) -> RestResult<impl Responder> {
    service.unsubscribe(body.email()).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        success: true,
        message: "Successfully unsubscribed from newsletter",
    }))
}

/// One-click unsubscribe link from the welcome email, answers with an HTML page
#[tracing::instrument(name = "Unsubscribe link", skip(service, templates, path))]
#[get("/unsubscribe/{token}")]
async fn unsubscribe_by_token(
    service: web::Data<SubscriptionService>,
    templates: web::Data<TemplateManager>,
    path: web::Path<(String,)>,
) -> RestResult<impl Responder> {
    let (token,) = path.into_inner();

    let (status, page) = match service.unsubscribe_by_token(&token).await {
        Ok(email) => (StatusCode::OK, templates.unsubscribe_success_page(&email)),
        Err(Error::InvalidToken) => (
            StatusCode::BAD_REQUEST,
            templates.unsubscribe_error_page(&Error::InvalidToken.to_string()),
        ),
        Err(error) => {
            tracing::error!(error.cause_chain = ?error, "Failed to unsubscribe by token");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                templates.unsubscribe_error_page("An error occurred while processing your request"),
            )
        }
    };

    let page = page.map_err(|error| {
        tracing::error!(error.cause_chain = ?error, "Failed to render unsubscribe page");
        RestError::InternalError("Internal server error".into())
    })?;

    Ok(HttpResponse::build(status)
        .content_type(ContentType::html())
        .body(page))
}

/// Aggregate subscriber counts
#[tracing::instrument(name = "Stats request", skip(service))]
#[get("/stats")]
async fn stats(service: web::Data<SubscriptionService>) -> RestResult<impl Responder> {
    let data = service.stats().await?;

    Ok(HttpResponse::Ok().json(StatsResponse {
        success: true,
        data,
    }))
}

/// Database change notifications; welcome emails for new subscriber rows
#[tracing::instrument(name = "Webhook request", skip(req, service, auth, body))]
#[post("/webhook")]
async fn receive_webhook(
    req: HttpRequest,
    service: web::Data<SubscriptionService>,
    auth: web::Data<WebhookAuth>,
    body: web::Bytes,
) -> RestResult<impl Responder> {
    let presented = req
        .headers()
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    auth.verify(presented)?;

    match serde_json::from_slice::<WebhookEvent>(&body) {
        Ok(event) => webhook::handle_event(&service, &event),
        Err(error) => tracing::warn!(%error, "Ignoring malformed webhook payload"),
    }

    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

/// Newsletter API endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/newsletter")
        .service(subscribe)
        .service(unsubscribe)
        .service(unsubscribe_by_token)
        .service(stats)
        .service(receive_webhook)
}
