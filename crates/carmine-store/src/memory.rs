use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::traits::Store;

/// One keyed entry. The store is type-checked per key, like the real
/// backend: a key holds exactly one of these shapes at a time.
#[derive(Clone, Debug)]
enum Entry {
    Str(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    ZSet(HashMap<String, f64>),
}

/// In-memory, `HashMap`-based store.
///
/// Intended for tests and embedding. All entries are held behind a single
/// `RwLock`; writes that must be atomic (`set_nx`, `incr`) take the write
/// lock for their whole read-modify-write cycle. Sets and sorted sets are
/// deleted when their last member is removed, matching the backend
/// semantics the engine's "no key left behind" guarantees rely on.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no keys exist.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Remove all keys.
    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("key_count", &self.len())
            .finish()
    }
}

fn wrong_type(key: &str, expected: &'static str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let map = self.entries.read().expect("lock poisoned");
        match map.get(key) {
            None => Ok(None),
            Some(Entry::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key, "string")),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        map.insert(key.to_string(), Entry::Str(value.to_string()));
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str) -> StoreResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(key.to_string(), Entry::Str(value.to_string()));
        Ok(true)
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut map = self.entries.write().expect("lock poisoned");
        let current = match map.get(key) {
            None => 0,
            Some(Entry::Str(s)) => s
                .parse::<i64>()
                .map_err(|_| StoreError::NotInteger(key.to_string()))?,
            Some(_) => return Err(wrong_type(key, "string")),
        };
        let next = current + 1;
        map.insert(key.to_string(), Entry::Str(next.to_string()));
        Ok(next)
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        Ok(map.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.contains_key(key))
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let map = self.entries.read().expect("lock poisoned");
        match map.get(key) {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(fields)) => Ok(fields.clone()),
            Some(_) => Err(wrong_type(key, "hash")),
        }
    }

    async fn hash_set_all(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        match entry {
            Entry::Hash(existing) => {
                for (field, value) in fields {
                    existing.insert(field.clone(), value.clone());
                }
                Ok(())
            }
            _ => Err(wrong_type(key, "hash")),
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(HashSet::new()));
        match entry {
            Entry::Set(members) => Ok(members.insert(member.to_string())),
            _ => Err(wrong_type(key, "set")),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        let (removed, now_empty) = match map.get_mut(key) {
            None => return Ok(false),
            Some(Entry::Set(members)) => (members.remove(member), members.is_empty()),
            Some(_) => return Err(wrong_type(key, "set")),
        };
        if now_empty {
            map.remove(key);
        }
        Ok(removed)
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let map = self.entries.read().expect("lock poisoned");
        match map.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key, "set")),
        }
    }

    async fn set_contains(&self, key: &str, member: &str) -> StoreResult<bool> {
        let map = self.entries.read().expect("lock poisoned");
        match map.get(key) {
            None => Ok(false),
            Some(Entry::Set(members)) => Ok(members.contains(member)),
            Some(_) => Err(wrong_type(key, "set")),
        }
    }

    async fn set_len(&self, key: &str) -> StoreResult<u64> {
        let map = self.entries.read().expect("lock poisoned");
        match map.get(key) {
            None => Ok(0),
            Some(Entry::Set(members)) => Ok(members.len() as u64),
            Some(_) => Err(wrong_type(key, "set")),
        }
    }

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::ZSet(HashMap::new()));
        match entry {
            Entry::ZSet(members) => {
                members.insert(member.to_string(), score);
                Ok(())
            }
            _ => Err(wrong_type(key, "sorted set")),
        }
    }

    async fn zset_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        let (removed, now_empty) = match map.get_mut(key) {
            None => return Ok(false),
            Some(Entry::ZSet(members)) => {
                (members.remove(member).is_some(), members.is_empty())
            }
            Some(_) => return Err(wrong_type(key, "sorted set")),
        };
        if now_empty {
            map.remove(key);
        }
        Ok(removed)
    }

    async fn zset_score(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        let map = self.entries.read().expect("lock poisoned");
        match map.get(key) {
            None => Ok(None),
            Some(Entry::ZSet(members)) => Ok(members.get(member).copied()),
            Some(_) => Err(wrong_type(key, "sorted set")),
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let map = self.entries.read().expect("lock poisoned");
        let mut keys: Vec<String> = map
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
