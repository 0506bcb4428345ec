use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use bank_payment_engine::ReconciliationError;
use thiserror::Error;

use crate::providers::{AuthError, IngressError, ParseError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Unknown payment provider: {0}")]
    UnknownProvider(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("Payload could not be parsed. {0}")]
    InvalidPayload(#[from] ParseError),
    #[error("The order store is unavailable. {0}")]
    StoreUnavailable(String),
    #[error("The order store did not respond in time")]
    StoreTimeout,
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnknownProvider(_) => StatusCode::NOT_FOUND,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::StoreTimeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<IngressError> for ServerError {
    fn from(e: IngressError) -> Self {
        match e {
            IngressError::Auth(e) => Self::AuthenticationError(e),
            IngressError::Parse(e) => Self::InvalidPayload(e),
        }
    }
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::Store(s) => Self::StoreUnavailable(s),
        }
    }
}
