//! The key layout.
//!
//! Every concept the engine persists lives in its own colon-delimited
//! namespace under a configurable root prefix:
//!
//! | namespace | shape |
//! |---|---|
//! | hash | `{p}:hash:{model}:{id}` — current property values |
//! | idsets | `{p}:idsets:{model}` — all live ids of a model |
//! | ids | `{p}:ids:{model}` — increment-strategy counter |
//! | index | `{p}:index:{model}:{prop}:{value}` — equality index |
//! | scoredindex | `{p}:scoredindex:{model}:{prop}` — numeric index |
//! | uniques | `{p}:uniques:{model}:{prop}:{value}` — unique locks |
//! | relations | `{p}:relations:{model}:{name}:{other}:{id}` — edges |
//! | relationKeys | `{p}:relationKeys:{model}:{id}` — edge key registry |
//! | meta | `{p}:meta:version/idGenerator/properties:{model}` |
//! | channel | `{p}:channel:{model}` — change notification topic |

use crate::id::KEY_SEPARATOR;

/// Relation name used when the caller supplies none.
pub const DEFAULT_RELATION_NAME: &str = "default";

/// Suffix distinguishing the mirrored foreign edge from the forward edge.
const FOREIGN_SUFFIX: &str = "Foreign";

/// Builds every store key the engine uses, under one root prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The root prefix all keys start with, including the trailing
    /// separator. Used by purge scans.
    pub fn root(&self) -> String {
        format!("{}{}", self.prefix, KEY_SEPARATOR)
    }

    fn join(&self, segments: &[&str]) -> String {
        let mut key = self.prefix.clone();
        for segment in segments {
            key.push(KEY_SEPARATOR);
            key.push_str(segment);
        }
        key
    }

    pub fn hash(&self, model: &str, id: &str) -> String {
        self.join(&["hash", model, id])
    }

    pub fn idset(&self, model: &str) -> String {
        self.join(&["idsets", model])
    }

    pub fn incremental_ids(&self, model: &str) -> String {
        self.join(&["ids", model])
    }

    pub fn index(&self, model: &str, property: &str, value: &str) -> String {
        self.join(&["index", model, property, value])
    }

    pub fn scored_index(&self, model: &str, property: &str) -> String {
        self.join(&["scoredindex", model, property])
    }

    pub fn unique(&self, model: &str, property: &str, value: &str) -> String {
        self.join(&["uniques", model, property, value])
    }

    /// Forward edge set: members are the ids of `target_model` instances
    /// the `source_model` instance `source_id` links to under `name`.
    pub fn relation(
        &self,
        source_model: &str,
        name: &str,
        target_model: &str,
        source_id: &str,
    ) -> String {
        self.join(&["relations", source_model, name, target_model, source_id])
    }

    /// The relation name of the mirrored foreign edge.
    pub fn foreign_name(name: &str) -> String {
        format!("{name}{FOREIGN_SUFFIX}")
    }

    /// Per-instance registry of every relation set key the instance
    /// participates in, from either side. Cascade removal walks this set
    /// instead of scanning the keyspace.
    pub fn relation_keys(&self, model: &str, id: &str) -> String {
        self.join(&["relationKeys", model, id])
    }

    /// Split a relation set key back into
    /// `(model, relation name, other model, id)`. Returns `None` for keys
    /// outside the relations namespace.
    pub fn parse_relation(&self, key: &str) -> Option<(String, String, String, String)> {
        let namespace = self.join(&["relations"]);
        let rest = key
            .strip_prefix(&namespace)?
            .strip_prefix(KEY_SEPARATOR)?;
        let parts: Vec<&str> = rest.split(KEY_SEPARATOR).collect();
        if parts.len() != 4 {
            return None;
        }
        Some((
            parts[0].to_string(),
            parts[1].to_string(),
            parts[2].to_string(),
            parts[3].to_string(),
        ))
    }

    /// Strip the `Foreign` suffix from a relation name, if present.
    pub fn base_name(name: &str) -> Option<&str> {
        name.strip_suffix(FOREIGN_SUFFIX)
    }

    pub fn meta_version(&self, model: &str) -> String {
        self.join(&["meta", "version", model])
    }

    pub fn meta_id_generator(&self, model: &str) -> String {
        self.join(&["meta", "idGenerator", model])
    }

    pub fn meta_properties(&self, model: &str) -> String {
        self.join(&["meta", "properties", model])
    }

    /// Pub/sub topic for external change notification. The engine defines
    /// the name but never publishes; subscribers are out of scope.
    pub fn channel(&self, model: &str) -> String {
        self.join(&["channel", model])
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::new("carmine")
    }
}
