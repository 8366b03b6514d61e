//! The model registry.
//!
//! An explicit, engine-owned name→definition map. Nothing here is process
//! global: embedders create one registry per engine and inject it, which
//! keeps parallel engines (tests, multi-tenant processes) isolated.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::schema::ModelSchema;

/// Name→definition registry with replace-on-reregister semantics.
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<ModelSchema>>>,
    /// Models whose meta records have been written by this process.
    meta_written: RwLock<HashSet<String>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
            meta_written: RwLock::new(HashSet::new()),
        }
    }

    /// Register a definition under its model name, replacing any previous
    /// definition of that name. Returns the registered handle.
    pub fn register(&self, schema: Arc<ModelSchema>) -> Arc<ModelSchema> {
        let mut models = self.models.write().expect("lock poisoned");
        models.insert(schema.name().to_string(), Arc::clone(&schema));
        schema
    }

    /// Hand back a definition handle WITHOUT touching the registry. A
    /// temporary definition shadows nothing: instances created from the
    /// returned handle use it, while the registered definition of the same
    /// name stays in place for everyone else.
    pub fn register_temporary(&self, schema: Arc<ModelSchema>) -> Arc<ModelSchema> {
        schema
    }

    /// Look up a registered definition.
    pub fn get(&self, name: &str) -> Option<Arc<ModelSchema>> {
        self.models.read().expect("lock poisoned").get(name).cloned()
    }

    /// All registered model names, sorted.
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .models
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Record that the meta records for `name` were written. Returns
    /// `true` the first time per process, `false` afterwards.
    pub fn mark_meta_written(&self, name: &str) -> bool {
        self.meta_written
            .write()
            .expect("lock poisoned")
            .insert(name.to_string())
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.model_names())
            .finish()
    }
}
