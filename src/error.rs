use crate::repo::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Rejected before any store access
    #[error("{0}")]
    InvalidInput(String),
    #[error("Email not found or already unsubscribed")]
    NotFound,
    #[error("Invalid unsubscribe link")]
    InvalidToken,
    #[error("{0}")]
    Unauthorized(String),
    // Store failures are terminal for the request
    #[error("Failed to access subscriber store")]
    Persistence(#[from] StoreError),
}
