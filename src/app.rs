use std::net::TcpListener;

use actix_web::dev::{HttpServiceFactory, Server};
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};

use serde::Serialize;

use tracing_actix_web::TracingLogger;

use crate::controller::error::json_error_handler;
use crate::controller::newsletter;
use crate::service::SubscriptionService;
use crate::templates::TemplateManager;
use crate::webhook::WebhookAuth;

/// Everything the request handlers share, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub service: SubscriptionService,
    pub templates: TemplateManager,
    pub webhook_auth: WebhookAuth,
}

/// Liveness endpoint
#[tracing::instrument(name = "Health check")]
#[get("")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().finish()
}

#[derive(Debug, Serialize)]
struct DeepHealth {
    success: bool,
    data: DeepHealthData,
}

#[derive(Debug, Serialize)]
struct DeepHealthData {
    database: &'static str,
}

/// Readiness endpoint, also checks that the subscriber store answers
#[tracing::instrument(name = "Deep health check", skip(service))]
#[get("/deep")]
async fn deep_health_check(service: web::Data<SubscriptionService>) -> impl Responder {
    match service.ping_store().await {
        Ok(()) => HttpResponse::Ok().json(DeepHealth {
            success: true,
            data: DeepHealthData {
                database: "connected",
            },
        }),
        Err(error) => {
            tracing::error!(error.cause_chain = ?error, "Subscriber store is unreachable");
            HttpResponse::ServiceUnavailable().json(DeepHealth {
                success: false,
                data: DeepHealthData {
                    database: "disconnected",
                },
            })
        }
    }
}

fn health_scope() -> impl HttpServiceFactory {
    web::scope("/health_check")
        .service(health_check)
        .service(deep_health_check)
}

/// Run the application on a specified TCP listener
pub fn run(listener: TcpListener, state: AppState) -> anyhow::Result<Server> {
    let service = web::Data::new(state.service);
    let templates = web::Data::new(state.templates);
    let webhook_auth = web::Data::new(state.webhook_auth);
    let json_config = web::JsonConfig::default().error_handler(json_error_handler);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(json_config.clone())
            .app_data(service.clone())
            .app_data(templates.clone())
            .app_data(webhook_auth.clone())
            .service(health_scope())
            .service(newsletter::scope())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
