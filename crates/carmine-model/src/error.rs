use std::collections::HashMap;

use carmine_store::StoreError;
use carmine_types::TypeError;

use crate::instance::Instance;

/// Per-property validation failures: property name → failure kinds in the
/// order they were recorded (`"notEmpty"`, `"email"`, `"notUnique"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: HashMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure kind for a property.
    pub fn add(&mut self, property: &str, kind: &str) {
        self.errors
            .entry(property.to_string())
            .or_default()
            .push(kind.to_string());
    }

    /// Failure kinds recorded for one property. Empty slice if the
    /// property passed.
    pub fn of(&self, property: &str) -> &[String] {
        self.errors.get(property).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True iff no property has failures.
    pub fn is_empty(&self) -> bool {
        self.errors.values().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.errors
            .iter()
            .filter(|(_, kinds)| !kinds.is_empty())
            .map(|(p, kinds)| (p.as_str(), kinds.as_slice()))
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut failed: Vec<(&str, &[String])> = self.iter().collect();
        failed.sort_by_key(|(property, _)| *property);
        let mut first = true;
        for (property, kinds) in failed {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{property}: {}", kinds.join(", "))?;
        }
        Ok(())
    }
}

/// One failed deep-linked save: the parent whose queue held the link, the
/// child whose save failed, and the child's underlying error.
#[derive(Debug, Clone)]
pub struct LinkFailure {
    pub parent: Instance,
    pub child: Instance,
    pub error: Box<ModelError>,
}

/// Aggregate failure of one or more deep-linked saves. At most one of
/// these is raised per save attempt; independent sibling links may have
/// succeeded regardless.
#[derive(Debug, Clone)]
pub struct LinkError {
    pub failures: Vec<LinkFailure>,
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} deep-linked save(s) failed", self.failures.len())
    }
}

/// Errors produced by model operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// Validation rejected the instance; carries the per-property
    /// failure kinds.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// One or more deep-linked saves failed.
    #[error("{0}")]
    Link(LinkError),

    /// The load/remove target does not exist.
    #[error("not found")]
    NotFound,

    /// The model name is not registered.
    #[error("model '{0}' not found")]
    UnknownModel(String),

    /// The property name is not part of the model definition.
    #[error("invalid property key '{0}'")]
    UnknownProperty(String),

    /// An index lookup was requested for a property that is not indexed.
    #[error("property '{property}' of model '{model}' is not indexed")]
    NotIndexed { model: String, property: String },

    /// The identifier violates the key layout rules.
    #[error("malformed identifier: {0}")]
    MalformedId(#[from] TypeError),

    /// The store rejected or failed an operation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_failure_kinds() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());
        errors.add("name", "notEmpty");
        errors.add("name", "notUnique");
        errors.add("email", "email");
        assert!(!errors.is_empty());
        assert_eq!(errors.of("name"), ["notEmpty", "notUnique"]);
        assert_eq!(errors.of("email"), ["email"]);
        assert!(errors.of("visits").is_empty());
    }

    #[test]
    fn display_is_sorted_and_joined() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "notUnique");
        errors.add("country", "notEmpty");
        assert_eq!(errors.to_string(), "country: notEmpty; name: notUnique");
    }
}
