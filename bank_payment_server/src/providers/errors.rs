use thiserror::Error;

/// Authentication failures. The messages never include the presented or the expected credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No credential was presented")]
    MissingCredential,
    #[error("The presented credential is not valid")]
    InvalidCredential,
    #[error("No credential is configured for this provider")]
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Malformed JSON payload. {0}")]
    InvalidJson(String),
    #[error("Malformed form payload. {0}")]
    InvalidForm(String),
    #[error("Required field '{0}' is missing or empty")]
    MissingField(&'static str),
    #[error("Transfer amount must be positive, got {0}")]
    InvalidAmount(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngressError {
    #[error("Webhook authentication failed. {0}")]
    Auth(#[from] AuthError),
    #[error("Webhook payload could not be parsed. {0}")]
    Parse(#[from] ParseError),
}
