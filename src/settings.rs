use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;

use config::{Config, Environment, File};

use secrecy::Secret;

use serde::Deserialize;
use serde_aux::prelude::*;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};

use url::Url;

use crate::client::{EmailClient, EmailProvider, Sender};
use crate::webhook::WebhookAuth;

/// Runtime environment, either `Dev` for local development, or `Prod` for release
#[derive(Debug)]
pub enum Runtime {
    Dev,
    Prod,
}

impl Runtime {
    pub fn as_str(&self) -> &str {
        match self {
            Runtime::Dev => "dev",
            Runtime::Prod => "prod",
        }
    }
}

impl TryFrom<String> for Runtime {
    type Error = anyhow::Error;

    fn try_from(s: String) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => anyhow::bail!("{} is not a valid runtime environment", other),
        }
    }
}

/// Application settings wrapper
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: ApplicationSettings,
    pub database: DatabaseSettings,
    pub email: EmailSettings,
    #[serde(default)]
    pub webhook: WebhookSettings,
}

impl Settings {
    /// Load application settings from the settings directory
    pub fn load() -> anyhow::Result<Self> {
        let path = env::current_dir()?.join("settings");
        // `APP_ENV` selects the runtime, default to `Dev`
        let runtime: Runtime = env::var("APP_ENV")
            .unwrap_or_else(|_| "dev".into())
            .try_into()?;

        Self::load_from(runtime, &path)
    }

    /// Load application settings from a specified path and runtime
    pub fn load_from(runtime: Runtime, base_path: &Path) -> anyhow::Result<Self> {
        Config::builder()
            .add_source(File::from(base_path.join("base")).required(true))
            .add_source(File::from(base_path.join(runtime.as_str())).required(true))
            // NOTE: Should be used for any prod secrets. Takes the form `APP_<settings category>__<setting name>`.
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
            .context("Failed to load/deserialize settings")
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplicationSettings {
    host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    port: u16,
    frontend_base_url: String,
}

impl ApplicationSettings {
    /// The application address to bind to
    pub fn addr(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    /// Base URL of the public site, unsubscribe links are built from it
    pub fn frontend_base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.frontend_base_url).context("Failed to parse frontend base URL")
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    port: u16,
    host: String,
    name: String,
    username: String,
    password: Secret<String>,
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    require_ssl: bool,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    acquire_timeout_milliseconds: u64,
}

impl DatabaseSettings {
    /// The database connection options, without specifying the database name
    pub fn without_db(&self) -> PgConnectOptions {
        use secrecy::ExposeSecret;

        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .port(self.port)
            .host(&self.host)
            .ssl_mode(ssl_mode)
            .username(&self.username)
            .password(self.password.expose_secret())
    }

    /// The database connection options, with the database name
    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.name)
    }

    /// Pool options, connections are acquired lazily
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new().acquire_timeout(Duration::from_millis(self.acquire_timeout_milliseconds))
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailSettings {
    provider: EmailProvider,
    sender: String,
    sender_name: String,
    api_base_url: String,
    api_auth_token: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    api_timeout_milliseconds: u64,
}

impl EmailSettings {
    /// The mailbox to send application emails from
    pub fn sender(&self) -> anyhow::Result<Sender> {
        let email = self
            .sender
            .parse()
            .map_err(anyhow::Error::msg)
            .context("Failed to parse email sender address")?;

        Ok(Sender {
            email,
            name: self.sender_name.clone(),
        })
    }

    /// Display name used as the newsletter brand
    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    /// The email REST API timeout duration
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_milliseconds)
    }

    /// The base URL for the email REST service
    pub fn api_base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.api_base_url).context("Failed to parse email base URL")
    }

    /// Build the client for the configured provider
    pub fn client(&self) -> anyhow::Result<EmailClient> {
        EmailClient::new(
            self.provider,
            self.sender()?,
            self.api_timeout(),
            self.api_base_url()?,
            self.api_auth_token.clone(),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookSettings {
    #[serde(default)]
    secret: Option<Secret<String>>,
    #[serde(
        default = "default_require_secret",
        deserialize_with = "deserialize_bool_from_anything"
    )]
    require_secret: bool,
}

fn default_require_secret() -> bool {
    true
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            secret: None,
            require_secret: default_require_secret(),
        }
    }
}

impl WebhookSettings {
    pub fn auth(&self) -> WebhookAuth {
        WebhookAuth::new(self.secret.clone(), self.require_secret)
    }
}
