//! Key-value store boundary for Carmine.
//!
//! The engine talks to its backing store exclusively through the [`Store`]
//! trait: flat strings, counters, hashes, sets, and sorted sets under
//! colon-delimited keys. One `Arc<dyn Store>` is shared process-wide;
//! every operation is an asynchronous request multiplexed over that shared
//! session.
//!
//! # Backends
//!
//! - [`MemoryStore`] — `RwLock`-guarded maps for tests and embedding. It
//!   reproduces the store semantics the engine depends on: set-if-absent
//!   is atomic, sets and sorted sets disappear when their last member is
//!   removed, and counters start from zero.
//!
//! # Design Rules
//!
//! 1. `set_nx` is the only atomic conditional write; it is the engine's
//!    sole mutual-exclusion primitive.
//! 2. Multi-key updates are plain sequences of independent writes. The
//!    trait gives no cross-key atomicity.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use traits::Store;
