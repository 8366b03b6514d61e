use thiserror::Error;

/// Errors produced when building or resolving model definitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("model name must not be empty")]
    EmptyModelName,

    #[error("model name '{0}' contains the reserved separator character ':'")]
    SeparatorInModelName(String),

    #[error("duplicate property '{0}' in model definition")]
    DuplicateProperty(String),

    #[error("property '{0}' is not numeric and cannot use a scored index")]
    ScoredIndexOnNonNumeric(String),
}
