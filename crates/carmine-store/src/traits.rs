use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Asynchronous key-value store session.
///
/// All implementations must satisfy these invariants:
/// - [`set_nx`](Store::set_nx) is atomic: of any number of concurrent
///   callers for the same absent key, exactly one observes `true`.
/// - Removing the last member of a set or sorted set deletes the key;
///   reads of missing keys return empty collections, never errors.
/// - Operations against a single key are applied in request order;
///   operations against different keys carry no ordering guarantee.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait Store: Send + Sync {
    // ---- flat strings and counters ----

    /// Read a string value. Returns `Ok(None)` if the key does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a string value, overwriting any previous value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Write a string value only if the key does not exist.
    ///
    /// Returns `true` if the write happened. This is the engine's only
    /// mutual-exclusion primitive and MUST be atomic.
    async fn set_nx(&self, key: &str, value: &str) -> StoreResult<bool>;

    /// Atomically increment an integer counter, creating it at zero first
    /// if absent. Returns the incremented value.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Delete a key of any type. Returns `true` if the key existed.
    async fn del(&self, key: &str) -> StoreResult<bool>;

    /// Check whether a key exists, regardless of type.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    // ---- hashes ----

    /// Read every field of a hash. Missing key reads as an empty map.
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Write fields into a hash, creating it if absent. Existing fields
    /// not named in `fields` are left untouched.
    async fn hash_set_all(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()>;

    // ---- sets ----

    /// Add a member. Returns `true` if it was not already present.
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Remove a member. Returns `true` if it was present.
    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// All members of a set. Missing key reads as empty.
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Membership test.
    async fn set_contains(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Cardinality of a set. Missing key reads as zero.
    async fn set_len(&self, key: &str) -> StoreResult<u64>;

    // ---- sorted sets ----

    /// Add a member with a score, or update the score of an existing
    /// member.
    async fn zset_add(&self, key: &str, member: &str, score: f64) -> StoreResult<()>;

    /// Remove a member. Returns `true` if it was present.
    async fn zset_remove(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Score of a member, if present.
    async fn zset_score(&self, key: &str, member: &str) -> StoreResult<Option<f64>>;

    // ---- keyspace ----

    /// Every key starting with `prefix`. Used for database purging; the
    /// engine never scans on its hot paths.
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}
