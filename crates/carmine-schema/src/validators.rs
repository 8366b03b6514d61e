//! Validator predicates.
//!
//! Validators are pure checks over a single cast value. The pipeline in
//! the model layer runs them in declared order and records the kind of
//! every failing validator; the predicates themselves know nothing about
//! instances or the store.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};

use carmine_types::Value;
use regex::Regex;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid regex"));

/// A caller-supplied predicate: `true` means the value passes.
pub type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A caller-supplied deferred predicate: the pipeline awaits the returned
/// future.
pub type DeferredPredicateFn =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

/// A validation rule attached to a property.
#[derive(Clone)]
pub enum Validator {
    /// Fails on empty or whitespace-only values.
    NotEmpty,
    /// Fails on strings that are not an address. With `optional`, empty
    /// values pass.
    Email { optional: bool },
    /// Caller-supplied synchronous predicate reported under `kind`.
    Custom { kind: String, predicate: PredicateFn },
    /// Caller-supplied deferred predicate reported under `kind`.
    Deferred {
        kind: String,
        predicate: DeferredPredicateFn,
    },
}

impl Validator {
    pub fn email() -> Self {
        Validator::Email { optional: false }
    }

    pub fn email_optional() -> Self {
        Validator::Email { optional: true }
    }

    pub fn custom(kind: &str, predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Validator::Custom {
            kind: kind.to_string(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn deferred<F, Fut>(kind: &str, predicate: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Validator::Deferred {
            kind: kind.to_string(),
            predicate: Arc::new(move |value| {
                Box::pin(predicate(value)) as Pin<Box<dyn Future<Output = bool> + Send>>
            }),
        }
    }

    /// The failure kind recorded when this validator rejects a value.
    pub fn kind(&self) -> &str {
        match self {
            Validator::NotEmpty => "notEmpty",
            Validator::Email { .. } => "email",
            Validator::Custom { kind, .. } => kind,
            Validator::Deferred { kind, .. } => kind,
        }
    }

    /// Run the predicate against a cast value.
    pub async fn check(&self, value: &Value) -> bool {
        match self {
            Validator::NotEmpty => !value.storage_form().trim().is_empty(),
            Validator::Email { optional } => {
                if *optional && value.is_empty() {
                    return true;
                }
                EMAIL.is_match(&value.storage_form())
            }
            Validator::Custom { predicate, .. } => predicate(value),
            Validator::Deferred { predicate, .. } => predicate(value.clone()).await,
        }
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}
