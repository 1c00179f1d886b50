use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns `true` when the failure came from the transport rather than the
    /// remote service answering with an error.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BridgeError::OperationFailed(_) | BridgeError::Timeout(_) | BridgeError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
