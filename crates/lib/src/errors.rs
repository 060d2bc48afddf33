use thiserror::Error;

/// Errors raised by the engagement store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage connection error: {0}")]
    StorageConnection(String),
    #[error("Storage operation failed: {0}")]
    StorageOperationFailed(String),
    #[error("Failed to serialize result: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

impl From<turso::Error> for StoreError {
    fn from(err: turso::Error) -> Self {
        StoreError::StorageOperationFailed(err.to_string())
    }
}
