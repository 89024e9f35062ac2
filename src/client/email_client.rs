use std::time::Duration;

use anyhow::Context;

use reqwest::Client;

use serde::{Deserialize, Serialize};

use secrecy::Secret;

use url::Url;

use crate::client::EmailError;
use crate::domain::EmailAddress;

const POSTMARK_TOKEN_HEADER: &str = "X-Postmark-Server-Token";
const BREVO_KEY_HEADER: &str = "api-key";

/// Transactional email HTTP APIs the client can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    Postmark,
    Brevo,
    Resend,
}

impl EmailProvider {
    /// Send endpoint, relative to the provider's base URL
    fn send_path(&self) -> &'static str {
        match self {
            Self::Postmark => "email",
            Self::Brevo => "v3/smtp/email",
            Self::Resend => "emails",
        }
    }
}

/// The mailbox application emails are sent from
#[derive(Debug, Clone)]
pub struct Sender {
    pub email: EmailAddress,
    pub name: String,
}

#[derive(Debug)]
pub struct EmailClient {
    client: Client,
    provider: EmailProvider,
    sender: Sender,

    api_send_email_url: Url,
    api_auth_token: Secret<String>,
}

impl EmailClient {
    pub fn new(
        provider: EmailProvider,
        sender: Sender,
        api_timeout: Duration,
        api_base_url: Url,
        api_auth_token: Secret<String>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(api_timeout)
            .build()
            .context("Failed to build http client")?;

        let api_send_email_url = api_base_url
            .join(provider.send_path())
            .context("Failed to create send email endpoint URL")?;

        Ok(Self {
            client,
            provider,
            sender,
            api_send_email_url,
            api_auth_token,
        })
    }

    #[tracing::instrument(
        name = "Send an email via API",
        skip(self, email),
        fields(provider = ?self.provider, recipient = %email.recipient)
    )]
    pub async fn send(&self, email: &Email) -> Result<(), EmailError> {
        use secrecy::ExposeSecret;

        let token = self.api_auth_token.expose_secret();
        let request = self
            .client
            .post(self.api_send_email_url.clone())
            .json(&email.as_request(self.provider, &self.sender));

        let request = match self.provider {
            EmailProvider::Postmark => request.header(POSTMARK_TOKEN_HEADER, token),
            EmailProvider::Brevo => request
                .header(BREVO_KEY_HEADER, token)
                .header(reqwest::header::ACCEPT, "application/json"),
            EmailProvider::Resend => request.bearer_auth(token),
        };

        request.send().await?.error_for_status()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Email {
    pub recipient: EmailAddress,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

impl Email {
    fn as_request<'e>(
        &'e self,
        provider: EmailProvider,
        sender: &'e Sender,
    ) -> SendEmailRequest<'e> {
        match provider {
            EmailProvider::Postmark => SendEmailRequest::Postmark(PostmarkRequest {
                to: self.recipient.as_ref(),
                from: sender.email.as_ref(),
                subject: &self.subject,
                html_body: &self.html_body,
                text_body: &self.text_body,
            }),
            EmailProvider::Brevo => {
                let from = BrevoMailbox {
                    email: sender.email.as_ref(),
                    name: &sender.name,
                };
                let local_part = self
                    .recipient
                    .as_ref()
                    .split('@')
                    .next()
                    .unwrap_or_default();

                SendEmailRequest::Brevo(BrevoRequest {
                    sender: from.clone(),
                    to: vec![BrevoMailbox {
                        email: self.recipient.as_ref(),
                        name: local_part,
                    }],
                    subject: &self.subject,
                    html_content: &self.html_body,
                    text_content: &self.text_body,
                    reply_to: from,
                })
            }
            EmailProvider::Resend => SendEmailRequest::Resend(ResendRequest {
                from: format!("{} <{}>", sender.name, sender.email),
                to: vec![self.recipient.as_ref()],
                subject: &self.subject,
                html: &self.html_body,
                text: &self.text_body,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum SendEmailRequest<'a> {
    Postmark(PostmarkRequest<'a>),
    Brevo(BrevoRequest<'a>),
    Resend(ResendRequest<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkRequest<'a> {
    to: &'a str,
    from: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct BrevoMailbox<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoRequest<'a> {
    sender: BrevoMailbox<'a>,
    to: Vec<BrevoMailbox<'a>>,
    subject: &'a str,
    html_content: &'a str,
    text_content: &'a str,
    reply_to: BrevoMailbox<'a>,
}

#[derive(Debug, Serialize)]
struct ResendRequest<'a> {
    from: String,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}
