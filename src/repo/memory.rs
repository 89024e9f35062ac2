use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use chrono::{DateTime, Utc};

use crate::domain::{NewSubscriber, Subscriber, SubscriberStats};
use crate::repo::{StoreError, StoreResult, SubscriberStore};

/// In-process subscriber store with the same uniqueness rules as the Postgres table.
/// Used by tests and for running the service without a database.
#[derive(Debug, Default)]
pub struct MemorySubscriberStore {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl MemorySubscriberStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record as-is, bypassing the subscribe flow
    pub fn seed(&self, subscriber: Subscriber) -> StoreResult<()> {
        let mut subscribers = self.lock();
        if Self::is_taken(&subscribers, &subscriber.email, &subscriber.unsubscribe_token) {
            return Err(StoreError::Conflict);
        }
        subscribers.push(subscriber);
        Ok(())
    }

    /// Snapshot of every stored record
    pub fn all(&self) -> Vec<Subscriber> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        // A poisoned lock only means another test thread panicked mid-update
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_taken(subscribers: &[Subscriber], email: &str, token: &str) -> bool {
        subscribers
            .iter()
            .any(|s| s.email == email || s.unsubscribe_token == token)
    }
}

#[async_trait::async_trait]
impl SubscriberStore for MemorySubscriberStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Subscriber>> {
        Ok(self.lock().iter().find(|s| s.email == email).cloned())
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<Subscriber>> {
        Ok(self
            .lock()
            .iter()
            .find(|s| s.unsubscribe_token == token)
            .cloned())
    }

    async fn insert(
        &self,
        new_subscriber: &NewSubscriber,
        now: DateTime<Utc>,
    ) -> StoreResult<Subscriber> {
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            email: new_subscriber.email.as_ref().to_string(),
            subscribed_at: now,
            unsubscribed_at: None,
            confirmed: false,
            unsubscribe_token: new_subscriber.unsubscribe_token.as_ref().to_string(),
            ip_address: Some(new_subscriber.ip_address.clone()),
            user_agent: Some(new_subscriber.user_agent.clone()),
        };

        self.seed(subscriber.clone())?;

        Ok(subscriber)
    }

    async fn resubscribe(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        if let Some(subscriber) = self.lock().iter_mut().find(|s| s.id == id) {
            subscriber.unsubscribed_at = None;
            subscriber.subscribed_at = now;
            subscriber.confirmed = false;
        }
        Ok(())
    }

    async fn unsubscribe_active(&self, email: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut changed = 0;
        for subscriber in self
            .lock()
            .iter_mut()
            .filter(|s| s.email == email && s.is_active())
        {
            subscriber.unsubscribed_at = Some(now);
            changed += 1;
        }
        Ok(changed)
    }

    async fn unsubscribe_by_id(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        if let Some(subscriber) = self
            .lock()
            .iter_mut()
            .find(|s| s.id == id && s.is_active())
        {
            subscriber.unsubscribed_at = Some(now);
        }
        Ok(())
    }

    async fn stats(&self, recent_since: DateTime<Utc>) -> StoreResult<SubscriberStats> {
        let subscribers = self.lock();
        let active = subscribers.iter().filter(|s| s.is_active());

        Ok(SubscriberStats {
            total_subscribers: subscribers.len() as i64,
            active_subscribers: active.clone().count() as i64,
            unsubscribed: subscribers.iter().filter(|s| !s.is_active()).count() as i64,
            recent_subscriptions: active
                .filter(|s| s.subscribed_at >= recent_since)
                .count() as i64,
        })
    }

    async fn active_confirmed_emails(&self) -> StoreResult<Vec<String>> {
        let mut active: Vec<_> = self
            .lock()
            .iter()
            .filter(|s| s.is_active() && s.confirmed)
            .map(|s| (s.subscribed_at, s.email.clone()))
            .collect();
        active.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(active.into_iter().map(|(_, email)| email).collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
