mod email_address;
mod subscriber;
mod unsubscribe_token;

pub use email_address::EmailAddress;
pub use subscriber::{NewSubscriber, SubscribeOutcome, Subscriber, SubscriberStats};
pub use unsubscribe_token::UnsubscribeToken;
