use actix_web::error::JsonPayloadError;
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};

use serde::Serialize;

use thiserror::Error;

use crate::error::Error;

pub type RestResult<T> = Result<T, RestError>;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("{0}")]
    ParseError(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    InternalError(String),
}

impl From<Error> for RestError {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidInput(msg) => Self::ParseError(msg),
            Error::NotFound | Error::InvalidToken => Self::ParseError(e.to_string()),
            Error::Unauthorized(msg) => Self::Unauthorized(msg),
            Error::Persistence(error) => {
                tracing::error!(error.cause_chain = ?error, "Subscriber store failure");
                Self::InternalError("Internal server error".into())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    message: &'a str,
}

impl ResponseError for RestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ParseError(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = self.to_string();
        HttpResponse::build(self.status_code()).json(ErrorBody {
            success: false,
            message: &message,
        })
    }
}

/// Turns malformed JSON bodies into the same error body as every other rejection
pub fn json_error_handler(error: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(%error, "Rejecting malformed JSON body");
    RestError::ParseError("Invalid request body".into()).into()
}
