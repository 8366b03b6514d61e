//! Model instance runtime for Carmine.
//!
//! This crate is the heart of Carmine: it takes an in-memory model
//! instance with pending property changes and commits it to (or removes
//! it from) a key-value store that has no cross-key transactions, while
//! upholding uniqueness constraints, secondary indexes, and mirrored
//! relation edges.
//!
//! The pieces, leaves first:
//!
//! - [`properties`] — per-instance property state (value, previous,
//!   updated flag); pure memory, no I/O
//! - [`validation`] — the cast-then-validate pipeline with the deferred
//!   uniqueness probe
//! - [`id`] — identifier allocation (store counter or custom generator)
//! - [`unique`] — claim/confirm/release of unique value locks
//! - [`index`] — equality and scored secondary index maintenance
//! - [`relations`] — queued link/unlink changes, mirrored edges, cascade
//!   cleanup
//! - [`save`] — the save/remove orchestrator sequencing all of the above,
//!   with compensation-based rollback
//! - [`instance`] — the [`Instance`] handle callers interact with

pub mod context;
pub mod error;
pub mod id;
pub mod index;
pub mod instance;
pub mod properties;
pub mod relations;
pub mod save;
pub mod unique;
pub mod validation;

pub use context::ModelContext;
pub use error::{LinkError, LinkFailure, ModelError, ModelResult, ValidationErrors};
pub use instance::Instance;
pub use properties::{PropertyDiff, PropertyEntry, PropertyStore};
pub use relations::LinkOptions;
