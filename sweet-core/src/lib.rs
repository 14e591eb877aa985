pub mod payment;
pub mod repository;
pub mod signature;
pub mod webhook;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Payment provider error ({status}): {message}")]
    ProviderError { status: u16, message: String },
    #[error("Upstream request failed: {0}")]
    UpstreamUnavailable(String),
    #[error("Storage error: {0}")]
    StoreError(String),
    #[error("Inventory service error: {0}")]
    InventoryError(String),
    #[error("Payment intent {0} is already linked to another order")]
    DuplicateIntent(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    /// Errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::ValidationError(_) | CoreError::DuplicateIntent(_) | CoreError::NotFound(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
