use std::sync::Arc;

use chrono::{Duration, Utc};

use tracing::Instrument;

use crate::client::WelcomeEmailSender;
use crate::domain::{
    EmailAddress, NewSubscriber, SubscribeOutcome, Subscriber, SubscriberStats, UnsubscribeToken,
};
use crate::error::{Error, Result};
use crate::repo::{StoreError, SubscriberStore};

/// Window for the recent subscriptions count
const RECENT_WINDOW_DAYS: i64 = 7;

/// Maps email addresses to subscriber records and moves them through
/// subscribed -> unsubscribed -> resubscribed. Holds no per-request state,
/// so one instance is shared by every request.
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn SubscriberStore>,
    mailer: Arc<dyn WelcomeEmailSender>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn SubscriberStore>, mailer: Arc<dyn WelcomeEmailSender>) -> Self {
        Self { store, mailer }
    }

    /// Subscribe an email address, reactivating it if it was unsubscribed.
    /// A welcome email is dispatched in the background once the record is stored.
    #[tracing::instrument(name = "Subscribe", skip(self, ip_address, user_agent))]
    pub async fn subscribe(
        &self,
        email: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<SubscribeOutcome> {
        let email: EmailAddress = email.parse().map_err(Error::InvalidInput)?;

        if let Some(existing) = self.store.find_by_email(email.as_ref()).await? {
            return self.subscribe_existing(email, existing).await;
        }

        let new_subscriber = NewSubscriber {
            email,
            unsubscribe_token: UnsubscribeToken::generate(),
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
        };

        match self.store.insert(&new_subscriber, Utc::now()).await {
            Ok(subscriber) => {
                self.dispatch_welcome_email(new_subscriber.email, subscriber.token());
                Ok(SubscribeOutcome::Subscribed)
            }
            // Lost a race against a concurrent subscribe for the same address
            Err(StoreError::Conflict) => {
                let existing = self
                    .store
                    .find_by_email(new_subscriber.email.as_ref())
                    .await?
                    .ok_or(StoreError::Conflict)?;
                self.subscribe_existing(new_subscriber.email, existing).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn subscribe_existing(
        &self,
        email: EmailAddress,
        existing: Subscriber,
    ) -> Result<SubscribeOutcome> {
        if existing.is_active() {
            tracing::info!("Email is already subscribed");
            return Ok(SubscribeOutcome::AlreadySubscribed);
        }

        self.store.resubscribe(existing.id, Utc::now()).await?;
        self.dispatch_welcome_email(email, existing.token());

        Ok(SubscribeOutcome::Resubscribed)
    }

    /// Unsubscribe the active subscriber with this email
    #[tracing::instrument(name = "Unsubscribe", skip(self))]
    pub async fn unsubscribe(&self, email: &str) -> Result<()> {
        let email = EmailAddress::normalize(email);
        if email.is_empty() {
            return Err(Error::InvalidInput("Email is required".into()));
        }

        match self.store.unsubscribe_active(&email, Utc::now()).await? {
            0 => Err(Error::NotFound),
            _ => Ok(()),
        }
    }

    /// Unsubscribe through a one-click link. Already inactive subscribers are left untouched.
    /// Returns the subscriber's email.
    #[tracing::instrument(name = "Unsubscribe by token", skip(self, token))]
    pub async fn unsubscribe_by_token(&self, token: &str) -> Result<String> {
        let subscriber = self
            .store
            .find_by_token(token)
            .await?
            .ok_or(Error::InvalidToken)?;

        if subscriber.is_active() {
            self.store
                .unsubscribe_by_id(subscriber.id, Utc::now())
                .await?;
            tracing::info!(subscriber_email = %subscriber.email, "Subscriber unsubscribed via token");
        }

        Ok(subscriber.email)
    }

    #[tracing::instrument(name = "Fetch subscriber stats", skip(self))]
    pub async fn stats(&self) -> Result<SubscriberStats> {
        let recent_since = Utc::now() - Duration::days(RECENT_WINDOW_DAYS);
        Ok(self.store.stats(recent_since).await?)
    }

    /// Emails of active, confirmed subscribers, newest subscription first
    #[tracing::instrument(name = "Fetch active subscribers", skip(self))]
    pub async fn active_subscribers(&self) -> Result<Vec<String>> {
        Ok(self.store.active_confirmed_emails().await?)
    }

    /// Check that the subscriber store answers
    pub async fn ping_store(&self) -> Result<()> {
        Ok(self.store.ping().await?)
    }

    /// Send the welcome email without blocking the caller.
    /// Failures are logged and never reach the caller.
    pub fn dispatch_welcome_email(&self, recipient: EmailAddress, token: UnsubscribeToken) {
        let mailer = Arc::clone(&self.mailer);
        let span = tracing::info_span!("Dispatch welcome email", subscriber_email = %recipient);

        tokio::spawn(
            async move {
                match mailer.send_welcome_email(&recipient, &token).await {
                    Ok(()) => tracing::info!("Welcome email sent"),
                    Err(error) => tracing::error!(
                        error.cause_chain = ?error,
                        error.message = %error,
                        "Failed to send welcome email"
                    ),
                }
            }
            .instrument(span),
        );
    }
}
