use url::Url;

use crate::client::{Email, EmailClient, EmailError, WelcomeEmailSender};
use crate::domain::{EmailAddress, UnsubscribeToken};
use crate::templates::TemplateManager;

/// Sends the templated welcome email through the configured provider
#[derive(Debug)]
pub struct WelcomeMailer {
    client: EmailClient,
    templates: TemplateManager,
    frontend_base_url: Url,
}

impl WelcomeMailer {
    pub fn new(client: EmailClient, templates: TemplateManager, frontend_base_url: Url) -> Self {
        Self {
            client,
            templates,
            frontend_base_url,
        }
    }

    /// One-click unsubscribe link, `{frontend_base_url}/newsletter/unsubscribe/{token}`
    pub fn unsubscribe_url(&self, token: &UnsubscribeToken) -> Result<Url, EmailError> {
        let mut url = self.frontend_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EmailError::InvalidLink(self.frontend_base_url.to_string()))?
            .pop_if_empty()
            .extend(["newsletter", "unsubscribe", token.as_ref()]);

        Ok(url)
    }

    fn build_email(
        &self,
        recipient: &EmailAddress,
        token: &UnsubscribeToken,
    ) -> Result<Email, EmailError> {
        let unsubscribe_url = self.unsubscribe_url(token)?;
        let (html_body, text_body) = self
            .templates
            .welcome_email(recipient.as_ref(), unsubscribe_url.as_str())?;

        Ok(Email {
            recipient: recipient.clone(),
            subject: format!("Welcome to {}!", self.templates.brand()),
            html_body,
            text_body,
        })
    }
}

#[async_trait::async_trait]
impl WelcomeEmailSender for WelcomeMailer {
    #[tracing::instrument(name = "Send welcome email", skip(self, unsubscribe_token))]
    async fn send_welcome_email(
        &self,
        recipient: &EmailAddress,
        unsubscribe_token: &UnsubscribeToken,
    ) -> Result<(), EmailError> {
        let email = self.build_email(recipient, unsubscribe_token)?;
        self.client.send(&email).await
    }
}
