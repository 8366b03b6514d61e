use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("identifier must not be empty")]
    EmptyId,

    #[error("identifier '{0}' contains the reserved separator character ':'")]
    SeparatorInId(String),
}
