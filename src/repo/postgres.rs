use uuid::Uuid;

use chrono::{DateTime, Utc};

use sqlx::PgPool;

use crate::domain::{NewSubscriber, Subscriber, SubscriberStats};
use crate::repo::{StoreResult, SubscriberStore};

const SUBSCRIBER_COLUMNS: &str = "id, email, subscribed_at, unsubscribed_at, confirmed, \
     unsubscribe_token, ip_address, user_agent";

/// Postgres subscriber store
#[derive(Debug, Clone)]
pub struct PgSubscriberStore {
    pool: PgPool,
}

impl PgSubscriberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SubscriberStore for PgSubscriberStore {
    #[tracing::instrument(name = "Fetch subscriber by email", skip(self))]
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Subscriber>> {
        let subscriber = sqlx::query_as::<_, Subscriber>(&format!(
            "select {} from subscribers where email = $1",
            SUBSCRIBER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscriber)
    }

    #[tracing::instrument(name = "Fetch subscriber by token", skip(self, token))]
    async fn find_by_token(&self, token: &str) -> StoreResult<Option<Subscriber>> {
        let subscriber = sqlx::query_as::<_, Subscriber>(&format!(
            "select {} from subscribers where unsubscribe_token = $1",
            SUBSCRIBER_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscriber)
    }

    #[tracing::instrument(
        name = "Insert subscriber",
        skip(self, new_subscriber),
        fields(subscriber_email = %new_subscriber.email)
    )]
    async fn insert(
        &self,
        new_subscriber: &NewSubscriber,
        now: DateTime<Utc>,
    ) -> StoreResult<Subscriber> {
        let subscriber = sqlx::query_as::<_, Subscriber>(&format!(
            "insert into subscribers \
             (id, email, subscribed_at, confirmed, unsubscribe_token, ip_address, user_agent) \
             values ($1, $2, $3, false, $4, $5, $6) \
             returning {}",
            SUBSCRIBER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new_subscriber.email.as_ref())
        .bind(now)
        .bind(new_subscriber.unsubscribe_token.as_ref())
        .bind(&new_subscriber.ip_address)
        .bind(&new_subscriber.user_agent)
        .fetch_one(&self.pool)
        .await?;

        Ok(subscriber)
    }

    #[tracing::instrument(name = "Resubscribe subscriber by id", skip(self))]
    async fn resubscribe(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            "update subscribers \
             set unsubscribed_at = null, subscribed_at = $2, confirmed = false \
             where id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Unsubscribe active subscriber by email", skip(self))]
    async fn unsubscribe_active(&self, email: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "update subscribers set unsubscribed_at = $2 \
             where email = $1 and unsubscribed_at is null",
        )
        .bind(email)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "Unsubscribe subscriber by id", skip(self))]
    async fn unsubscribe_by_id(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        // Keeps the first unsubscribe timestamp if two requests race
        sqlx::query(
            "update subscribers set unsubscribed_at = $2 \
             where id = $1 and unsubscribed_at is null",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Count subscribers", skip(self))]
    async fn stats(&self, recent_since: DateTime<Utc>) -> StoreResult<SubscriberStats> {
        let stats = sqlx::query_as::<_, SubscriberStats>(
            "select \
               count(*) as total_subscribers, \
               count(*) filter (where unsubscribed_at is null) as active_subscribers, \
               count(*) filter (where unsubscribed_at is not null) as unsubscribed, \
               count(*) filter (where unsubscribed_at is null and subscribed_at >= $1) \
                 as recent_subscriptions \
             from subscribers",
        )
        .bind(recent_since)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    #[tracing::instrument(name = "Fetch active confirmed subscribers", skip(self))]
    async fn active_confirmed_emails(&self) -> StoreResult<Vec<String>> {
        let emails = sqlx::query_scalar::<_, String>(
            "select email from subscribers \
             where unsubscribed_at is null and confirmed \
             order by subscribed_at desc",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(emails)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("select 1").execute(&self.pool).await?;
        Ok(())
    }
}
