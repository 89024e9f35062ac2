use uuid::Uuid;

use chrono::{DateTime, Utc};

use serde::Serialize;

use crate::domain::{EmailAddress, UnsubscribeToken};

/// Stored subscriber record
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Subscriber {
    pub id: Uuid,
    /// Normalized (trimmed, lowercase) address, unique across subscribers
    pub email: String,
    /// Set on creation and refreshed on every resubscribe
    pub subscribed_at: DateTime<Utc>,
    /// `None` while the subscription is active
    pub unsubscribed_at: Option<DateTime<Utc>>,
    pub confirmed: bool,
    /// Assigned once, kept across unsubscribe/resubscribe cycles
    pub unsubscribe_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Subscriber {
    pub fn is_active(&self) -> bool {
        self.unsubscribed_at.is_none()
    }

    pub fn token(&self) -> UnsubscribeToken {
        self.unsubscribe_token.clone().into()
    }
}

/// New subscriber request, validated and ready to be stored
#[derive(Debug, Clone)]
pub struct NewSubscriber {
    pub email: EmailAddress,
    pub unsubscribe_token: UnsubscribeToken,
    pub ip_address: String,
    pub user_agent: String,
}

/// Result of a subscribe request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// A new subscriber record was created
    Subscribed,
    /// A previously unsubscribed record was reactivated
    Resubscribed,
    /// The address already had an active subscription, nothing changed
    AlreadySubscribed,
}

impl SubscribeOutcome {
    pub fn already_subscribed(&self) -> bool {
        matches!(self, Self::AlreadySubscribed)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Subscribed => "Successfully subscribed to newsletter",
            Self::Resubscribed => "Successfully resubscribed to newsletter",
            Self::AlreadySubscribed => "Email is already subscribed",
        }
    }
}

/// Aggregate subscriber counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberStats {
    pub total_subscribers: i64,
    pub active_subscribers: i64,
    pub unsubscribed: i64,
    /// Active subscribers whose `subscribed_at` falls within the last 7 days
    pub recent_subscriptions: i64,
}
