use std::sync::Arc;

use carmine_schema::ModelRegistry;
use carmine_store::Store;
use carmine_types::KeyLayout;

/// Shared environment every instance operates in: the process-wide store
/// session, the key layout, and the model registry.
///
/// Cloning is cheap; all instances of one engine share the same context.
#[derive(Clone)]
pub struct ModelContext {
    pub store: Arc<dyn Store>,
    pub keys: KeyLayout,
    pub registry: Arc<ModelRegistry>,
}

impl ModelContext {
    pub fn new(store: Arc<dyn Store>, keys: KeyLayout, registry: Arc<ModelRegistry>) -> Self {
        Self {
            store,
            keys,
            registry,
        }
    }
}

impl std::fmt::Debug for ModelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelContext")
            .field("keys", &self.keys)
            .field("registry", &self.registry)
            .finish()
    }
}
