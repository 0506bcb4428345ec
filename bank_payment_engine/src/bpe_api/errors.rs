use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    /// The order store could not be reached or failed the operation. The caller should ask the provider to retry.
    #[error("Order store error: {0}")]
    Store(String),
}

impl ReconciliationError {
    pub fn store<E: std::error::Error>(e: E) -> Self {
        Self::Store(e.to_string())
    }
}
