//! The engine: one store session, one key layout, one model registry.

use std::sync::Arc;

use carmine_model::{Instance, ModelContext, ModelError, ModelResult};
use carmine_schema::{IndexKind, ModelRegistry, ModelSchema};
use carmine_store::Store;
use carmine_types::{KeyLayout, Value};
use tracing::info;

use crate::config::EngineConfig;

/// Entry point for embedders.
///
/// An engine owns the process-wide state: the single shared store
/// session every instance multiplexes its requests over, the key layout,
/// and the explicit model registry. Engines are cheap to clone and safe
/// to share.
#[derive(Clone)]
pub struct Engine {
    ctx: ModelContext,
}

impl Engine {
    /// An engine with the default configuration.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<dyn Store>, config: EngineConfig) -> Self {
        let ctx = ModelContext::new(
            store,
            KeyLayout::new(config.prefix),
            Arc::new(ModelRegistry::new()),
        );
        info!("engine initialized");
        Self { ctx }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.ctx.registry
    }

    pub fn keys(&self) -> &KeyLayout {
        &self.ctx.keys
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.ctx.store
    }

    /// Register a model definition, replacing any previous definition of
    /// the same name.
    pub fn register(&self, schema: Arc<ModelSchema>) -> Arc<ModelSchema> {
        self.ctx.registry.register(schema)
    }

    /// Hand back a temporary definition handle without touching the
    /// registry; use [`instance_of`](Self::instance_of) to instantiate
    /// it.
    pub fn register_temporary(&self, schema: Arc<ModelSchema>) -> Arc<ModelSchema> {
        self.ctx.registry.register_temporary(schema)
    }

    /// A fresh, unsaved instance of a registered model.
    pub fn instance(&self, model: &str) -> ModelResult<Instance> {
        let schema = self
            .ctx
            .registry
            .get(model)
            .ok_or_else(|| ModelError::UnknownModel(model.to_string()))?;
        Ok(Instance::new(schema, self.ctx.clone()))
    }

    /// A fresh instance of an explicit (possibly temporary) definition.
    pub fn instance_of(&self, schema: Arc<ModelSchema>) -> Instance {
        Instance::new(schema, self.ctx.clone())
    }

    /// Instantiate and load in one step.
    pub async fn load(&self, model: &str, id: &str) -> ModelResult<Instance> {
        let instance = self.instance(model)?;
        instance.load(id).await?;
        Ok(instance)
    }

    /// Ids of every `model` instance whose indexed `property` equals
    /// `value` exactly, sorted. Scored properties answer through their
    /// mirrored per-value sets.
    pub async fn find(
        &self,
        model: &str,
        property: &str,
        value: impl Into<Value>,
    ) -> ModelResult<Vec<String>> {
        let schema = self
            .ctx
            .registry
            .get(model)
            .ok_or_else(|| ModelError::UnknownModel(model.to_string()))?;
        let spec = schema
            .property(property)
            .ok_or_else(|| ModelError::UnknownProperty(property.to_string()))?;
        if spec.index == IndexKind::None {
            return Err(ModelError::NotIndexed {
                model: model.to_string(),
                property: property.to_string(),
            });
        }
        let cast = spec.kind.cast(&value.into(), &Value::Null);
        let key = self.ctx.keys.index(model, property, &cast.storage_form());
        let mut ids = self.ctx.store.set_members(&key).await?;
        ids.sort();
        Ok(ids)
    }

    /// All live ids of a model, sorted.
    pub async fn all_ids(&self, model: &str) -> ModelResult<Vec<String>> {
        let mut ids = self
            .ctx
            .store
            .set_members(&self.ctx.keys.idset(model))
            .await?;
        ids.sort();
        Ok(ids)
    }

    /// Delete every key under this engine's prefix. Test hygiene; meta
    /// records included.
    pub async fn purge(&self) -> ModelResult<()> {
        let keys = self.ctx.store.scan_prefix(&self.ctx.keys.root()).await?;
        let count = keys.len();
        for key in keys {
            self.ctx.store.del(&key).await?;
        }
        info!(count, "database purged");
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("ctx", &self.ctx).finish()
    }
}
