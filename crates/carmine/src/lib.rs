//! Carmine — a relational model layer over key-value stores.
//!
//! Carmine maps schema-defined model instances onto a plain key-value
//! store and gives them relational-database comforts the store itself
//! lacks: uniqueness constraints, secondary indexes, bidirectional named
//! relations, and validation before every write. Because the store has no
//! cross-key transactions, every guarantee is engineered explicitly with
//! claim/confirm/rollback steps; see `carmine-model` for the protocol.
//!
//! # Getting started
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use carmine::{Engine, MemoryStore, ModelSchema, PropertySpec, Validator};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(Arc::new(MemoryStore::new()));
//! engine.register(
//!     ModelSchema::builder("User")
//!         .property(
//!             PropertySpec::string("name")
//!                 .unique()
//!                 .validated_by(Validator::NotEmpty),
//!         )
//!         .property(PropertySpec::integer("visits").indexed())
//!         .build()?,
//! );
//!
//! let user = engine.instance("User")?;
//! user.set_property("name", "alice")?;
//! user.save().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;

pub use config::EngineConfig;
pub use engine::Engine;

// The public surface of the lower layers, re-exported for ergonomic
// imports.
pub use carmine_model::{
    Instance, LinkError, LinkFailure, LinkOptions, ModelError, ModelResult, PropertyDiff,
    ValidationErrors,
};
pub use carmine_schema::{
    IdGenerator, IdStrategy, ModelRegistry, ModelSchema, PropertySpec, SchemaError, Validator,
};
pub use carmine_store::{MemoryStore, Store, StoreError};
pub use carmine_types::{KeyLayout, TypeError, Value, DEFAULT_RELATION_NAME};
