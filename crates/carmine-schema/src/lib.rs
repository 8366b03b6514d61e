//! Model definitions for Carmine.
//!
//! A [`ModelSchema`] describes one named entity type: its ordered property
//! specs (type caster, default, uniqueness, indexing, validators), its
//! identifier strategy, and a stable fingerprint of the whole definition
//! used to detect schema drift between a running process and what the
//! store has seen before.
//!
//! Definitions are consumed read-only by the model layer. They are kept in
//! a [`ModelRegistry`] — an explicit object owned by the engine, not
//! process-global state — where registering a name again replaces the
//! previous definition unless the registration is temporary.

pub mod error;
pub mod property;
pub mod registry;
pub mod schema;
pub mod validators;

pub use error::SchemaError;
pub use property::{CasterFn, DefaultProvider, IndexKind, PropertyKind, PropertySpec};
pub use registry::ModelRegistry;
pub use schema::{IdGenerator, IdStrategy, ModelSchema, SchemaBuilder};
pub use validators::{DeferredPredicateFn, PredicateFn, Validator};
