use crate::domain::{EmailAddress, UnsubscribeToken};

mod email_client;
mod welcome;

pub use email_client::{Email, EmailClient, EmailProvider, Sender};
pub use welcome::WelcomeMailer;

/// Errors raised while sending an email, never surfaced to API callers
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to render email: {0}")]
    Template(#[from] tera::Error),
    #[error("Failed to build unsubscribe link from {0}")]
    InvalidLink(String),
}

/// Capability to send the welcome email to a new or returning subscriber.
/// Implementations report failure through the result and never panic.
#[async_trait::async_trait]
pub trait WelcomeEmailSender: Send + Sync {
    async fn send_welcome_email(
        &self,
        recipient: &EmailAddress,
        unsubscribe_token: &UnsubscribeToken,
    ) -> Result<(), EmailError>;
}
