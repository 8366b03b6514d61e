/// Errors from store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The key exists but holds a different data type than the operation
    /// expects.
    #[error("wrong type for key {key}: expected {expected}")]
    WrongType { key: String, expected: &'static str },

    /// Increment target does not hold an integer.
    #[error("value at {0} is not an integer")]
    NotInteger(String),

    /// The connection to the backing store failed mid-operation.
    #[error("connection error: {0}")]
    Connection(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
