use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Voice connection failed: {0}")]
    ConnectFailed(String),

    #[error("Audio stream unavailable: {0}")]
    StreamUnavailable(String),

    #[error("Malformed resolver payload: {0}")]
    MalformedPayload(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::MalformedPayload(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
