use std::net::TcpListener;
use std::sync::Arc;

use anyhow::Context;

use newsletter::app::{self, AppState};
use newsletter::client::WelcomeMailer;
use newsletter::repo::PgSubscriberStore;
use newsletter::service::SubscriptionService;
use newsletter::settings::Settings;
use newsletter::telemetry;
use newsletter::templates::TemplateManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = telemetry::create_subscriber(
        telemetry::env_filter(telemetry::DEFAULT_LOG_FILTER),
        std::io::stdout,
    );
    telemetry::set_subscriber(subscriber)?;

    let settings = Settings::load()?;

    let pool = settings
        .database
        .pool_options()
        .connect_lazy_with(settings.database.with_db());
    let store = Arc::new(PgSubscriberStore::new(pool));

    let templates = TemplateManager::new(settings.email.sender_name())
        .context("Failed to load templates")?;
    let mailer = Arc::new(WelcomeMailer::new(
        settings.email.client()?,
        templates.clone(),
        settings.app.frontend_base_url()?,
    ));

    let state = AppState {
        service: SubscriptionService::new(store, mailer),
        templates,
        webhook_auth: settings.webhook.auth(),
    };

    let listener = TcpListener::bind(settings.app.addr())?;
    tracing::info!(addr = ?listener.local_addr()?, "Listening");

    app::run(listener, state)?.await.context("Failed to run app")
}
