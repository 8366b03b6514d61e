//! Foundation types for Carmine.
//!
//! This crate provides the types shared by every other Carmine crate:
//!
//! - [`Value`] — a dynamically typed property value with a canonical
//!   storage form
//! - identifier rules ([`validate_id`], [`KEY_SEPARATOR`]) — instance ids
//!   are embedded in colon-delimited keys and must never contain the
//!   separator
//! - [`KeyLayout`] — the full key namespace of the engine under a
//!   configurable root prefix
//!
//! Every other Carmine crate depends on `carmine-types`.

pub mod error;
pub mod id;
pub mod keys;
pub mod value;

pub use error::TypeError;
pub use id::{validate_id, KEY_SEPARATOR};
pub use keys::{KeyLayout, DEFAULT_RELATION_NAME};
pub use value::Value;
