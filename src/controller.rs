pub mod error;
pub mod newsletter;
