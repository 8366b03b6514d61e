//! Identifier allocation.

use carmine_schema::{IdStrategy, ModelSchema};
use carmine_store::Store;
use tracing::debug;

use crate::context::ModelContext;
use crate::error::ModelResult;

/// Produce a fresh identifier for a new instance of `schema`.
///
/// The increment strategy uses the store's atomic counter; custom
/// generators run caller code and may await I/O of their own. The
/// no-separator postcondition on the result is enforced by the
/// orchestrator before any lock is claimed, not here.
pub(crate) async fn allocate(ctx: &ModelContext, schema: &ModelSchema) -> ModelResult<String> {
    let id = match schema.id_strategy() {
        IdStrategy::Increment => {
            let counter = ctx.keys.incremental_ids(schema.name());
            ctx.store.incr(&counter).await?.to_string()
        }
        IdStrategy::Custom(generator) => generator.next_id().await,
    };
    debug!(model = schema.name(), id = %id, "allocated identifier");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use carmine_schema::{IdGenerator, ModelRegistry, ModelSchema, PropertySpec};
    use carmine_store::MemoryStore;
    use carmine_types::KeyLayout;

    use super::*;

    fn context() -> ModelContext {
        ModelContext::new(
            Arc::new(MemoryStore::new()),
            KeyLayout::default(),
            Arc::new(ModelRegistry::new()),
        )
    }

    #[tokio::test]
    async fn increment_strategy_counts_per_model() {
        let ctx = context();
        let users = ModelSchema::builder("User")
            .property(PropertySpec::string("name"))
            .build()
            .unwrap();
        let roles = ModelSchema::builder("Role")
            .property(PropertySpec::string("name"))
            .build()
            .unwrap();

        assert_eq!(allocate(&ctx, &users).await.unwrap(), "1");
        assert_eq!(allocate(&ctx, &users).await.unwrap(), "2");
        // Independent counter per model.
        assert_eq!(allocate(&ctx, &roles).await.unwrap(), "1");
    }

    #[tokio::test]
    async fn custom_generator_is_used() {
        struct Fixed;
        #[async_trait]
        impl IdGenerator for Fixed {
            async fn next_id(&self) -> String {
                "generated-id".to_string()
            }
        }

        let ctx = context();
        let schema = ModelSchema::builder("NonIncrement")
            .property(PropertySpec::string("name"))
            .id_generator(Fixed)
            .build()
            .unwrap();
        assert_eq!(allocate(&ctx, &schema).await.unwrap(), "generated-id");
    }
}
