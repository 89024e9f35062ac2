use secrecy::{ExposeSecret, Secret};

use serde::Deserialize;

use sha2::{Digest, Sha256};

use crate::domain::{EmailAddress, UnsubscribeToken};
use crate::error::{Error, Result};
use crate::service::SubscriptionService;

/// Header carrying the shared secret on database change notifications
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

const INSERT_EVENT: &str = "INSERT";
const SUBSCRIBERS_TABLE: &str = "subscribers";

/// Shared-secret check for incoming webhooks
#[derive(Debug, Clone)]
pub struct WebhookAuth {
    secret: Option<Secret<String>>,
    require_secret: bool,
}

impl WebhookAuth {
    pub fn new(secret: Option<Secret<String>>, require_secret: bool) -> Self {
        // An empty configured secret counts as no secret
        let secret = secret.filter(|s| !s.expose_secret().is_empty());
        Self {
            secret,
            require_secret,
        }
    }

    /// Verify the secret presented by the caller.
    ///
    /// Without a configured secret, requests are rejected when `require_secret`
    /// is set and accepted with a warning otherwise.
    pub fn verify(&self, presented: Option<&str>) -> Result<()> {
        match &self.secret {
            Some(secret) => {
                let matches = presented
                    .map(|presented| digest_eq(secret.expose_secret(), presented))
                    .unwrap_or(false);
                if matches {
                    Ok(())
                } else {
                    Err(Error::Unauthorized("Invalid webhook secret".into()))
                }
            }
            None if self.require_secret => {
                tracing::error!("Webhook secret is required but not configured, rejecting request");
                Err(Error::Unauthorized("Webhook secret not configured".into()))
            }
            None => {
                tracing::warn!("Webhook secret not configured, accepting unauthenticated request");
                Ok(())
            }
        }
    }
}

// Compares fixed-size digests, not the raw secrets
fn digest_eq(expected: &str, presented: &str) -> bool {
    Sha256::digest(expected.as_bytes()) == Sha256::digest(presented.as_bytes())
}

/// Change notification sent by the database service
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub table: String,
    #[serde(default)]
    pub record: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SubscriberRecord {
    email: String,
    unsubscribe_token: String,
}

impl WebhookEvent {
    /// The new subscriber's email and unsubscribe token, for inserts on the subscribers table
    pub fn new_subscriber(&self) -> Option<(EmailAddress, UnsubscribeToken)> {
        if self.kind != INSERT_EVENT || self.table != SUBSCRIBERS_TABLE {
            return None;
        }

        let record: SubscriberRecord = match serde_json::from_value(self.record.clone()) {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(%error, "Ignoring subscriber insert without email and token");
                return None;
            }
        };

        match record.email.parse() {
            Ok(email) => Some((email, record.unsubscribe_token.into())),
            Err(error) => {
                tracing::warn!(%error, "Ignoring subscriber insert with invalid email");
                None
            }
        }
    }
}

/// Dispatch the welcome email for a subscriber insert notification.
/// Returns immediately, the email is sent in the background.
#[tracing::instrument(name = "Handle webhook event", skip(service, event), fields(kind = %event.kind, table = %event.table))]
pub fn handle_event(service: &SubscriptionService, event: &WebhookEvent) {
    match event.new_subscriber() {
        Some((email, token)) => service.dispatch_welcome_email(email, token),
        None => tracing::debug!("Ignoring webhook event"),
    }
}
