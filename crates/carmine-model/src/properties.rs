//! Per-instance property state.
//!
//! A [`PropertyStore`] tracks, for every property of the definition, the
//! current value, the last committed value, and whether the two differ.
//! It is pure in-memory state; the orchestrator reads it to compute hash
//! fields and index diffs, and commits it after a successful save or
//! load.

use std::sync::Arc;

use carmine_schema::ModelSchema;
use carmine_types::Value;

use crate::error::{ModelError, ModelResult};

/// State of a single property.
#[derive(Clone, Debug)]
pub struct PropertyEntry {
    /// Current (cast) value.
    pub value: Value,
    /// Value at the last successful save/load.
    pub previous: Value,
    /// True iff `value` differs from `previous`. Setting a property back
    /// to its committed value clears the flag.
    pub updated: bool,
}

/// One pending change, as reported by [`PropertyStore::diff`].
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDiff {
    pub property: String,
    pub before: Value,
    pub after: Value,
}

/// All property entries of one instance, in definition order.
#[derive(Clone, Debug)]
pub struct PropertyStore {
    schema: Arc<ModelSchema>,
    entries: Vec<(String, PropertyEntry)>,
}

impl PropertyStore {
    /// Build the store with every property at its (cast) default value.
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        let entries = schema
            .properties()
            .iter()
            .map(|spec| {
                let value = spec.initial_value();
                let entry = PropertyEntry {
                    previous: value.clone(),
                    value,
                    updated: false,
                };
                (spec.name.clone(), entry)
            })
            .collect();
        Self { schema, entries }
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn entry(&self, name: &str) -> Option<&PropertyEntry> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut PropertyEntry> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    /// Current value of a property.
    pub fn get(&self, name: &str) -> ModelResult<Value> {
        self.entry(name)
            .map(|e| e.value.clone())
            .ok_or_else(|| ModelError::UnknownProperty(name.to_string()))
    }

    /// Cast and assign a property value. Returns the cast value.
    pub fn set(&mut self, name: &str, raw: Value) -> ModelResult<Value> {
        let spec = self
            .schema
            .property(name)
            .ok_or_else(|| ModelError::UnknownProperty(name.to_string()))?;
        let kind = spec.kind.clone();
        let entry = self
            .entry_mut(name)
            .expect("schema property without an entry");
        let cast = kind.cast(&raw, &entry.value);
        entry.updated = cast != entry.previous;
        entry.value = cast.clone();
        Ok(cast)
    }

    /// Pending changes: every updated property, optionally restricted to
    /// one name. Order follows the definition.
    pub fn diff(&self, filter: Option<&str>) -> Vec<PropertyDiff> {
        self.entries
            .iter()
            .filter(|(name, entry)| entry.updated && filter.map_or(true, |f| f == name))
            .map(|(name, entry)| PropertyDiff {
                property: name.clone(),
                before: entry.previous.clone(),
                after: entry.value.clone(),
            })
            .collect()
    }

    /// Discard pending changes, optionally for one property only.
    pub fn reset(&mut self, filter: Option<&str>) {
        for (name, entry) in &mut self.entries {
            if filter.map_or(true, |f| f == name) {
                entry.value = entry.previous.clone();
                entry.updated = false;
            }
        }
    }

    /// Snapshot current values as committed: previous := value, flags
    /// cleared. Called after a successful save or load.
    pub fn commit(&mut self) {
        for (_, entry) in &mut self.entries {
            entry.previous = entry.value.clone();
            entry.updated = false;
        }
    }

    /// True iff any property has a pending change.
    pub fn is_dirty(&self) -> bool {
        self.entries.iter().any(|(_, e)| e.updated)
    }

    /// All current values in definition order.
    pub fn all(&self) -> Vec<(String, Value)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.value.clone()))
            .collect()
    }

    /// Current values in their storage form, ready for the hash write.
    pub fn storage_fields(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.value.storage_form()))
            .collect()
    }

    /// Replace state from stored hash fields. Load-pure properties take
    /// the stored string verbatim; everything else runs the caster. The
    /// store is committed afterwards (nothing dirty).
    pub fn hydrate(&mut self, fields: &std::collections::HashMap<String, String>) {
        for spec in self.schema.clone().properties() {
            if let Some(raw) = fields.get(&spec.name) {
                let stored = Value::String(raw.clone());
                let entry = self
                    .entry_mut(&spec.name)
                    .expect("schema property without an entry");
                entry.value = if spec.load_pure {
                    stored
                } else {
                    spec.kind.cast(&stored, &entry.value)
                };
            }
        }
        self.commit();
    }
}
