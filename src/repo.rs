use uuid::Uuid;

use chrono::{DateTime, Utc};

use crate::domain::{NewSubscriber, Subscriber, SubscriberStats};

mod memory;
mod postgres;

pub use memory::MemorySubscriberStore;
pub use postgres::PgSubscriberStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a subscriber store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique key (email or unsubscribe token) is already taken
    #[error("Subscriber record already exists")]
    Conflict,
    #[error(transparent)]
    Database(sqlx::Error),
}

/// Subscriber store trait, the only shared resource of the service.
/// Row-level atomicity is delegated to the implementation.
/// NOTE: Intended to facilitate easier testing/mocking
#[async_trait::async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Fetch a subscriber by normalized email
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Subscriber>>;

    /// Fetch a subscriber by exact unsubscribe token
    async fn find_by_token(&self, token: &str) -> StoreResult<Option<Subscriber>>;

    /// Insert a new, active and unconfirmed subscriber.
    /// Fails with `StoreError::Conflict` when the email or token is already stored.
    async fn insert(&self, new_subscriber: &NewSubscriber, now: DateTime<Utc>)
        -> StoreResult<Subscriber>;

    /// Reactivate a subscriber: clear `unsubscribed_at`, refresh `subscribed_at`, reset `confirmed`
    async fn resubscribe(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()>;

    /// Mark the active subscriber with this email as unsubscribed, returns the number of rows changed
    async fn unsubscribe_active(&self, email: &str, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Mark a subscriber as unsubscribed by id
    async fn unsubscribe_by_id(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()>;

    /// Aggregate counts, `recent_since` bounds the recent subscriptions count
    async fn stats(&self, recent_since: DateTime<Utc>) -> StoreResult<SubscriberStats>;

    /// Emails of active, confirmed subscribers, newest subscription first
    async fn active_confirmed_emails(&self) -> StoreResult<Vec<String>>;

    /// Check that the store is reachable
    async fn ping(&self) -> StoreResult<()>;
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => Self::Conflict,
            _ => Self::Database(e),
        }
    }
}
