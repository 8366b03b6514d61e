//! The save/remove orchestrator.
//!
//! Save runs a fixed state machine:
//!
//! ```text
//! Unvalidated → Validating → Invalid (terminal)
//!                          → Allocating → Locking → LockConflict (terminal)
//!                                                 → Writing → Indexing → Linking → Confirmed
//! ```
//!
//! The store has no cross-key transactions, so every forward step that
//! claims a unique value records a compensating release; a failure at
//! `Writing`, `Indexing`, or `Linking` runs the compensations in reverse
//! and re-raises. Compensations themselves are best-effort (logged, never
//! surfaced) so the original failure stays visible.
//!
//! Accepted limitation: multi-key updates after the hash write (indexes,
//! relation mirrors) are ordered but not atomic. A crash mid-sequence can
//! leave indexes or relation mirrors inconsistent with the hash. Such
//! failures are fatal and surfaced, never retried; only unique claims are
//! compensated.

use std::future::Future;
use std::pin::Pin;

use carmine_schema::{IndexKind, ModelSchema};
use carmine_store::Store;
use carmine_types::{validate_id, Value};
use tracing::{debug, info, warn};

use crate::context::ModelContext;
use crate::error::{ModelError, ModelResult, ValidationErrors};
use crate::id;
use crate::index::{IndexChange, IndexMaintainer};
use crate::instance::Instance;
use crate::properties::PropertyStore;
use crate::relations;
use crate::unique::{ClaimOutcome, UniqueConstraints};
use crate::validation;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Compensating action for a forward step already taken.
enum Compensation {
    ReleaseUniqueClaim(String),
}

/// Ordered list of compensations, executed in reverse on failure.
struct Saga<'a> {
    ctx: &'a ModelContext,
    compensations: Vec<Compensation>,
}

impl<'a> Saga<'a> {
    fn new(ctx: &'a ModelContext) -> Self {
        Self {
            ctx,
            compensations: Vec::new(),
        }
    }

    fn push(&mut self, compensation: Compensation) {
        self.compensations.push(compensation);
    }

    async fn unwind(self) {
        for compensation in self.compensations.into_iter().rev() {
            match compensation {
                Compensation::ReleaseUniqueClaim(key) => {
                    if let Err(error) = self.ctx.store.del(&key).await {
                        warn!(key = %key, %error, "rollback failed to release unique claim");
                    }
                }
            }
        }
    }
}

/// Save an instance. Boxed so deep links can save their targets
/// recursively.
pub(crate) fn save(instance: &Instance) -> BoxFuture<'_, ModelResult<()>> {
    Box::pin(save_inner(instance))
}

async fn save_inner(instance: &Instance) -> ModelResult<()> {
    let ctx = instance.context();
    let schema = instance.schema().clone();
    let model = schema.name();

    let (properties, current_id, loaded, id_changed, queue_empty) = instance.with_state(|s| {
        (
            s.properties.clone(),
            s.id.clone(),
            s.loaded,
            s.id_changed,
            s.queue.is_empty(),
        )
    });

    let dirty = id_changed || properties.is_dirty() || !queue_empty;
    if !dirty && current_id.is_some() {
        debug!(model, id = ?current_id, "clean instance; save is a no-op");
        return Ok(());
    }

    // Validating.
    let errors = validation::run(
        ctx,
        &schema,
        &properties,
        current_id.as_deref(),
        loaded,
        None,
    )
    .await?;
    if !errors.is_empty() {
        instance.with_state(|s| s.errors = errors.clone());
        return Err(ModelError::Validation(errors));
    }
    instance.with_state(|s| s.errors = ValidationErrors::new());

    ensure_meta(ctx, &schema).await?;

    // Allocating. The separator check guards the key layout and must
    // pass before any lock is claimed.
    let (save_id, newly_allocated) = match current_id {
        Some(existing) => (existing, false),
        None => (id::allocate(ctx, &schema).await?, true),
    };
    validate_id(&save_id)?;

    // Locking: fresh instances claim every non-empty unique value;
    // loaded instances only the changed ones (the rest are already
    // owned).
    let candidates: Vec<(String, Value)> = schema
        .properties()
        .iter()
        .filter(|spec| spec.unique)
        .filter_map(|spec| {
            let entry = properties.entry(&spec.name)?;
            if loaded && !entry.updated {
                return None;
            }
            Some((spec.name.clone(), entry.value.clone()))
        })
        .collect();
    let uniques = UniqueConstraints::new(ctx);
    let claims = match uniques.claim(model, &save_id, &candidates).await? {
        ClaimOutcome::Claimed(claims) => claims,
        ClaimOutcome::Conflict { property, partial } => {
            uniques.release(partial).await;
            let mut errors = ValidationErrors::new();
            errors.add(&property, validation::NOT_UNIQUE);
            instance.with_state(|s| s.errors = errors.clone());
            return Err(ModelError::Validation(errors));
        }
    };

    let mut saga = Saga::new(ctx);
    for key in claims.keys() {
        saga.push(Compensation::ReleaseUniqueClaim(key.clone()));
    }

    // Writing.
    let write = async {
        ctx.store
            .hash_set_all(&ctx.keys.hash(model, &save_id), &properties.storage_fields())
            .await?;
        ctx.store.set_add(&ctx.keys.idset(model), &save_id).await?;
        Ok::<(), ModelError>(())
    };
    if let Err(error) = write.await {
        saga.unwind().await;
        return Err(error);
    }

    // Indexing. Runs strictly after the hash write; unchanged properties
    // of a loaded instance are a no-op by construction.
    let changes: Vec<IndexChange> = schema
        .properties()
        .iter()
        .filter(|spec| spec.index != IndexKind::None)
        .filter_map(|spec| {
            let entry = properties.entry(&spec.name)?;
            if loaded && !entry.updated {
                return None;
            }
            Some(IndexChange {
                property: spec.name.clone(),
                index: spec.index,
                old: (loaded && entry.updated).then(|| entry.previous.clone()),
                new: entry.value.clone(),
            })
        })
        .collect();
    if let Err(error) = IndexMaintainer::new(ctx).apply(model, &save_id, &changes).await {
        saga.unwind().await;
        return Err(error);
    }

    // The record is durably stored: commit the in-memory state before
    // flushing relations, so a link failure leaves a saved instance with
    // its id assigned.
    instance.with_state(|s| {
        s.id = Some(save_id.clone());
        s.loaded = true;
        s.id_changed = false;
        s.properties.commit();
    });

    // Linking, in queue order.
    let queue = instance.with_state(|s| std::mem::take(&mut s.queue));
    if !queue.is_empty() {
        if let Err(error) = relations::flush(ctx, instance, &save_id, queue).await {
            saga.unwind().await;
            return Err(error);
        }
    }

    // Confirm: the new claims stay as the permanent lock rows; old
    // values superseded by this update are freed now, and only now.
    if loaded {
        for spec in schema.properties().iter().filter(|s| s.unique) {
            let Some(entry) = properties.entry(&spec.name) else {
                continue;
            };
            if entry.updated
                && !entry.previous.is_empty()
                && entry.previous.unique_form() != entry.value.unique_form()
            {
                uniques
                    .release_value(model, &spec.name, &entry.previous)
                    .await;
            }
        }
    }

    info!(model, id = %save_id, allocated = newly_allocated, "instance saved");
    Ok(())
}

/// Write the meta records (definition version, id strategy, property
/// fingerprint) the first time a model is saved by this process. A
/// version mismatch against what the store holds means the definition
/// drifted since the last writer; it is logged and overwritten.
async fn ensure_meta(ctx: &ModelContext, schema: &ModelSchema) -> ModelResult<()> {
    let model = schema.name();
    if !ctx.registry.mark_meta_written(model) {
        return Ok(());
    }
    let version_key = ctx.keys.meta_version(model);
    if let Some(stored) = ctx.store.get(&version_key).await? {
        if stored != schema.definition_version() {
            warn!(
                model,
                "stored model definition differs from the in-process definition"
            );
        }
    }
    ctx.store
        .set(&version_key, schema.definition_version())
        .await?;
    ctx.store
        .set(&ctx.keys.meta_id_generator(model), schema.id_strategy().tag())
        .await?;
    ctx.store
        .set(
            &ctx.keys.meta_properties(model),
            schema.properties_fingerprint(),
        )
        .await?;
    debug!(model, "meta records written");
    Ok(())
}

/// Remove an instance from the store.
pub(crate) async fn remove(instance: &Instance) -> ModelResult<()> {
    let ctx = instance.context();
    let schema = instance.schema().clone();
    let model = schema.name();

    let id = instance.id().ok_or(ModelError::NotFound)?;
    let hash_key = ctx.keys.hash(model, &id);
    let fields = ctx.store.hash_get_all(&hash_key).await?;
    if fields.is_empty() {
        return Err(ModelError::NotFound);
    }

    // Work from the stored values: pending in-memory edits must not skew
    // which lock rows and index members get deleted.
    let mut stored = PropertyStore::new(schema.clone());
    stored.hydrate(&fields);

    relations::unlink_all(ctx, model, &id).await?;

    let uniques = UniqueConstraints::new(ctx);
    for spec in schema.properties().iter().filter(|s| s.unique) {
        if let Some(entry) = stored.entry(&spec.name) {
            uniques.release_owned(model, &spec.name, &entry.value).await?;
        }
    }

    let current: Vec<(String, IndexKind, Value)> = schema
        .properties()
        .iter()
        .filter(|spec| spec.index != IndexKind::None)
        .filter_map(|spec| {
            stored
                .entry(&spec.name)
                .map(|entry| (spec.name.clone(), spec.index, entry.value.clone()))
        })
        .collect();
    IndexMaintainer::new(ctx).remove(model, &id, &current).await?;

    ctx.store.set_remove(&ctx.keys.idset(model), &id).await?;
    ctx.store.del(&hash_key).await?;

    // Meta records are deliberately left in place; they persist for the
    // model's lifetime.
    instance.with_state(|s| {
        s.id = None;
        s.loaded = false;
        s.id_changed = false;
        s.queue.clear();
    });
    info!(model, id = %id, "instance removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use carmine_schema::{
        IdGenerator, ModelRegistry, ModelSchema, PropertySpec, Validator,
    };
    use carmine_store::{MemoryStore, Store, StoreError, StoreResult};
    use carmine_types::KeyLayout;

    use super::*;

    fn context_with(store: Arc<dyn Store>) -> ModelContext {
        ModelContext::new(store, KeyLayout::default(), Arc::new(ModelRegistry::new()))
    }

    fn context() -> ModelContext {
        context_with(Arc::new(MemoryStore::new()))
    }

    fn user_schema() -> Arc<ModelSchema> {
        ModelSchema::builder("UserMockup")
            .property(
                PropertySpec::string("name")
                    .with_default("test")
                    .unique()
                    .validated_by(Validator::NotEmpty),
            )
            .property(PropertySpec::integer("visits").indexed())
            .property(
                PropertySpec::string("email")
                    .with_default("email@email.de")
                    .unique()
                    .validated_by(Validator::email()),
            )
            .property(
                PropertySpec::string("country")
                    .with_default("Tibet")
                    .indexed()
                    .validated_by(Validator::NotEmpty),
            )
            .build()
            .unwrap()
    }

    fn user(ctx: &ModelContext) -> Instance {
        Instance::new(user_schema(), ctx.clone())
    }

    // -----------------------------------------------------------------------
    // Create / update
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn create_writes_hash_idset_and_meta() {
        let ctx = context();
        let user = user(&ctx);
        user.set_property("name", "createTest").unwrap();
        user.set_property("email", "createTest@asdasd.de").unwrap();
        user.save().await.unwrap();

        assert_eq!(user.id(), Some("1".to_string()));
        assert!(user.is_loaded());
        assert!(!user.is_dirty());

        let fields = ctx
            .store
            .hash_get_all("carmine:hash:UserMockup:1")
            .await
            .unwrap();
        assert_eq!(fields["name"], "createTest");
        assert_eq!(fields["visits"], "0");
        assert_eq!(fields["email"], "createTest@asdasd.de");

        assert!(ctx
            .store
            .set_contains("carmine:idsets:UserMockup", "1")
            .await
            .unwrap());
        assert_eq!(
            ctx.store
                .get("carmine:meta:idGenerator:UserMockup")
                .await
                .unwrap()
                .as_deref(),
            Some("increment")
        );
        assert!(ctx
            .store
            .get("carmine:meta:version:UserMockup")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn update_overwrites_fields() {
        let ctx = context();
        let user = user(&ctx);
        user.set_property("name", "updateTest1").unwrap();
        user.set_property("email", "updateTest1@email.de").unwrap();
        user.save().await.unwrap();
        let id = user.id().unwrap();

        user.set_property("name", "updateTest2").unwrap();
        user.set_property("email", "updateTest2@email.de").unwrap();
        user.save().await.unwrap();

        assert_eq!(user.id().unwrap(), id);
        let fields = ctx
            .store
            .hash_get_all(&format!("carmine:hash:UserMockup:{id}"))
            .await
            .unwrap();
        assert_eq!(fields["name"], "updateTest2");
        assert_eq!(fields["email"], "updateTest2@email.de");
    }

    #[tokio::test]
    async fn clean_save_makes_no_store_calls() {
        let counting = Arc::new(CountingStore::new());
        let ctx = context_with(counting.clone());
        let user = user(&ctx);
        user.set_property("name", "noopTest").unwrap();
        user.save().await.unwrap();

        let after_first = counting.calls();
        user.save().await.unwrap();
        assert_eq!(counting.calls(), after_first);
    }

    #[tokio::test]
    async fn indexes_follow_saved_values() {
        let ctx = context();
        let user = user(&ctx);
        user.set_property("name", "indexTest").unwrap();
        user.set_property("country", "indexTestCountry").unwrap();
        user.set_property("visits", 20i64).unwrap();
        user.save().await.unwrap();
        let id = user.id().unwrap();

        assert!(ctx
            .store
            .set_contains("carmine:index:UserMockup:country:indexTestCountry", &id)
            .await
            .unwrap());
        assert_eq!(
            ctx.store
                .zset_score("carmine:scoredindex:UserMockup:visits", &id)
                .await
                .unwrap(),
            Some(20.0)
        );
        assert!(ctx
            .store
            .set_contains("carmine:index:UserMockup:visits:20", &id)
            .await
            .unwrap());

        user.set_property("visits", 21i64).unwrap();
        user.save().await.unwrap();
        assert_eq!(
            ctx.store
                .zset_score("carmine:scoredindex:UserMockup:visits", &id)
                .await
                .unwrap(),
            Some(21.0)
        );
        assert!(!ctx
            .store
            .exists("carmine:index:UserMockup:visits:20")
            .await
            .unwrap());
    }

    // -----------------------------------------------------------------------
    // Uniqueness
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn duplicate_unique_fails_and_releases_other_claims() {
        let ctx = context();
        let first = user(&ctx);
        first.set_property("name", "duplicateTest").unwrap();
        first.set_property("email", "duplicateTest@test.de").unwrap();
        first.save().await.unwrap();
        let first_id = first.id().unwrap();

        let second = user(&ctx);
        second.set_property("name", "duplicateTest").unwrap();
        second
            .set_property("email", "dubplicateTest@test.de")
            .unwrap();
        let error = second.save().await.unwrap_err();
        match error {
            ModelError::Validation(errors) => {
                assert_eq!(errors.of("name"), ["notUnique"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(second.errors().of("name"), ["notUnique"]);

        // The loser's fresh claim for its email was released...
        assert!(!ctx
            .store
            .exists("carmine:uniques:UserMockup:email:dubplicatetest@test.de")
            .await
            .unwrap());
        // ...while the winner's lock still stands.
        assert_eq!(
            ctx.store
                .get("carmine:uniques:UserMockup:name:duplicatetest")
                .await
                .unwrap(),
            Some(first_id)
        );
    }

    #[tokio::test]
    async fn uniqueness_is_case_insensitive() {
        let ctx = context();
        let first = user(&ctx);
        first.set_property("name", "LowerCaseTest").unwrap();
        first.set_property("email", "LowerCaseTest@test.de").unwrap();
        first.save().await.unwrap();

        let second = user(&ctx);
        second.set_property("name", "lowercasetest").unwrap();
        second.set_property("email", "lowercasetest@test.de").unwrap();
        assert!(!second.validate(None).await.unwrap());
        assert_eq!(second.errors().of("name"), ["notUnique"]);
        assert_eq!(second.errors().of("email"), ["notUnique"]);
        assert!(second.save().await.is_err());
    }

    #[tokio::test]
    async fn validation_failure_claims_nothing() {
        let ctx = context();
        let user = user(&ctx);
        user.set_property("name", "uniqueDeleteTest").unwrap();
        user.set_property("email", "uniqueDeleteTest@test.de").unwrap();
        user.set_property("country", "").unwrap();

        let error = user.save().await.unwrap_err();
        match error {
            ModelError::Validation(errors) => {
                assert_eq!(errors.of("country"), ["notEmpty"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        // Validation failed before the locking stage: no lock rows at
        // all, not even transiently visible ones left behind.
        assert!(ctx
            .store
            .scan_prefix("carmine:uniques:")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn changing_unique_frees_the_old_value() {
        let ctx = context();
        let first = user(&ctx);
        first
            .set_property("name", "Changing Unique Frees The Value")
            .unwrap();
        first.set_property("email", "change_frees@unique.de").unwrap();
        first.save().await.unwrap();

        first
            .set_property("name", "changed to something else")
            .unwrap();
        first.save().await.unwrap();

        assert!(!ctx
            .store
            .exists("carmine:uniques:UserMockup:name:changing unique frees the value")
            .await
            .unwrap());
        assert!(ctx
            .store
            .exists("carmine:uniques:UserMockup:name:changed to something else")
            .await
            .unwrap());

        // A third instance can take the freed value immediately.
        let third = user(&ctx);
        third
            .set_property("name", "Changing Unique Frees The Value")
            .unwrap();
        third.set_property("email", "third@unique.de").unwrap();
        third.save().await.unwrap();
    }

    #[tokio::test]
    async fn case_only_change_keeps_the_lock() {
        let ctx = context();
        let user = user(&ctx);
        user.set_property("name", "CaseOnly").unwrap();
        user.save().await.unwrap();
        let id = user.id().unwrap();

        user.set_property("name", "CASEONLY").unwrap();
        user.save().await.unwrap();
        assert_eq!(
            ctx.store
                .get("carmine:uniques:UserMockup:name:caseonly")
                .await
                .unwrap(),
            Some(id)
        );
    }

    #[tokio::test]
    async fn empty_unique_values_create_no_lock() {
        let schema = ModelSchema::builder("OptMockup")
            .property(PropertySpec::string("emailOptional").unique())
            .build()
            .unwrap();
        let ctx = context();
        let instance = Instance::new(schema, ctx.clone());
        instance.save().await.unwrap();
        assert!(ctx
            .store
            .scan_prefix("carmine:uniques:")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn integer_uniques_conflict_until_removed() {
        let schema = ModelSchema::builder("UniqueInteger")
            .property(PropertySpec::integer("unique").unique())
            .build()
            .unwrap();
        let ctx = context();
        let first = Instance::new(schema.clone(), ctx.clone());
        let second = Instance::new(schema, ctx.clone());
        first.set_property("unique", 123i64).unwrap();
        second.set_property("unique", 123i64).unwrap();

        first.save().await.unwrap();
        assert!(matches!(
            second.save().await,
            Err(ModelError::Validation(_))
        ));

        first.remove().await.unwrap();
        second.save().await.unwrap();
    }

    #[tokio::test]
    async fn manual_id_upsert_may_keep_its_own_uniques() {
        let ctx = context();
        let original = user(&ctx);
        original.set_property("name", "manualIdWithUniques").unwrap();
        original
            .set_property("email", "manualIdWithUniques@example.com")
            .unwrap();
        original.save().await.unwrap();
        let id = original.id().unwrap();

        let copy = user(&ctx);
        copy.set_id(id.clone());
        copy.set_property("name", "manualIdWithUniques").unwrap();
        copy.set_property("email", "manualIdWithUniques@example.com")
            .unwrap();
        copy.save().await.unwrap();
        assert_eq!(copy.id(), Some(id));
    }

    // -----------------------------------------------------------------------
    // Identifier allocation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn generator_id_with_separator_aborts_before_claims() {
        struct Broken;
        #[async_trait]
        impl IdGenerator for Broken {
            async fn next_id(&self) -> String {
                "foo:bar".to_string()
            }
        }

        let schema = ModelSchema::builder("WrongIdModel")
            .property(PropertySpec::string("name").unique().with_default("x"))
            .id_generator(Broken)
            .build()
            .unwrap();
        let ctx = context();
        let instance = Instance::new(schema, ctx.clone());
        assert!(matches!(
            instance.save().await,
            Err(ModelError::MalformedId(_))
        ));
        assert!(ctx
            .store
            .scan_prefix("carmine:uniques:")
            .await
            .unwrap()
            .is_empty());
        assert!(ctx
            .store
            .scan_prefix("carmine:hash:")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn preassigned_id_skips_allocation() {
        let ctx = context();
        let user = user(&ctx);
        user.set_id("own-id");
        user.set_property("name", "preassigned").unwrap();
        user.save().await.unwrap();

        assert_eq!(user.id(), Some("own-id".to_string()));
        assert!(user.is_loaded());
        // The counter was never touched.
        assert!(!ctx.store.exists("carmine:ids:UserMockup").await.unwrap());
    }

    // -----------------------------------------------------------------------
    // Rollback
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn index_failure_releases_fresh_claims() {
        let failing = Arc::new(FailingStore::new("zset_add"));
        let ctx = context_with(failing.clone());
        let user = user(&ctx);
        user.set_property("name", "rollbackTest").unwrap();
        user.set_property("visits", 5i64).unwrap();

        let error = user.save().await.unwrap_err();
        assert!(matches!(error, ModelError::Store(_)));

        // Both fresh unique claims were compensated.
        assert!(failing
            .inner
            .scan_prefix("carmine:uniques:")
            .await
            .unwrap()
            .is_empty());
        // The hash write had already happened; that residue is the
        // documented price of no cross-key transactions.
        assert!(!failing
            .inner
            .scan_prefix("carmine:hash:")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn write_failure_leaves_no_record() {
        let failing = Arc::new(FailingStore::new("hash_set_all"));
        let ctx = context_with(failing.clone());
        let user = user(&ctx);
        user.set_property("name", "writeFail").unwrap();

        assert!(matches!(
            user.save().await,
            Err(ModelError::Store(_))
        ));
        assert!(failing
            .inner
            .scan_prefix("carmine:uniques:")
            .await
            .unwrap()
            .is_empty());
        assert!(!user.is_loaded());
        assert!(user.is_dirty());
    }

    // -----------------------------------------------------------------------
    // Remove
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn remove_clears_every_trace_but_meta() {
        let ctx = context();
        let user = user(&ctx);
        user.set_property("name", "deleteTest").unwrap();
        user.set_property("email", "deleteTest@asdasd.de").unwrap();
        user.set_property("visits", 7i64).unwrap();
        user.save().await.unwrap();
        let id = user.id().unwrap();

        user.remove().await.unwrap();
        assert_eq!(user.id(), None);

        assert!(!ctx
            .store
            .exists(&format!("carmine:hash:UserMockup:{id}"))
            .await
            .unwrap());
        assert!(!ctx
            .store
            .set_contains("carmine:idsets:UserMockup", &id)
            .await
            .unwrap());
        assert!(!ctx
            .store
            .exists("carmine:uniques:UserMockup:name:deletetest")
            .await
            .unwrap());
        assert_eq!(
            ctx.store
                .zset_score("carmine:scoredindex:UserMockup:visits", &id)
                .await
                .unwrap(),
            None
        );
        assert!(!ctx
            .store
            .exists("carmine:index:UserMockup:visits:7")
            .await
            .unwrap());
        // Meta records persist for the model's lifetime.
        assert!(ctx
            .store
            .get("carmine:meta:version:UserMockup")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn remove_without_id_is_not_found() {
        let ctx = context();
        let user = user(&ctx);
        assert!(matches!(user.remove().await, Err(ModelError::NotFound)));
    }

    #[tokio::test]
    async fn remove_of_absent_record_is_not_found() {
        let ctx = context();
        let user = user(&ctx);
        user.set_id("987654321");
        assert!(matches!(user.remove().await, Err(ModelError::NotFound)));
    }

    #[tokio::test]
    async fn removed_unique_value_is_reusable() {
        let ctx = context();
        let first = user(&ctx);
        first
            .set_property("name", "Removing Unique Frees The Value")
            .unwrap();
        first.set_property("email", "remove_frees@unique.de").unwrap();
        first.save().await.unwrap();
        let first_id = first.id().unwrap();
        first.remove().await.unwrap();

        let second = user(&ctx);
        second
            .set_property("name", "Removing Unique Frees The Value")
            .unwrap();
        second.set_property("email", "second@unique.de").unwrap();
        second.save().await.unwrap();
        assert_ne!(second.id().unwrap(), first_id);
    }

    // -----------------------------------------------------------------------
    // Test stores
    // -----------------------------------------------------------------------

    /// Counts every store call; used to prove the clean-save no-op.
    struct CountingStore {
        inner: MemoryStore,
        count: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                count: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }

        fn tick(&self) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Store for CountingStore {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.tick();
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            self.tick();
            self.inner.set(key, value).await
        }
        async fn set_nx(&self, key: &str, value: &str) -> StoreResult<bool> {
            self.tick();
            self.inner.set_nx(key, value).await
        }
        async fn incr(&self, key: &str) -> StoreResult<i64> {
            self.tick();
            self.inner.incr(key).await
        }
        async fn del(&self, key: &str) -> StoreResult<bool> {
            self.tick();
            self.inner.del(key).await
        }
        async fn exists(&self, key: &str) -> StoreResult<bool> {
            self.tick();
            self.inner.exists(key).await
        }
        async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
            self.tick();
            self.inner.hash_get_all(key).await
        }
        async fn hash_set_all(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
            self.tick();
            self.inner.hash_set_all(key, fields).await
        }
        async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
            self.tick();
            self.inner.set_add(key, member).await
        }
        async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
            self.tick();
            self.inner.set_remove(key, member).await
        }
        async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
            self.tick();
            self.inner.set_members(key).await
        }
        async fn set_contains(&self, key: &str, member: &str) -> StoreResult<bool> {
            self.tick();
            self.inner.set_contains(key, member).await
        }
        async fn set_len(&self, key: &str) -> StoreResult<u64> {
            self.tick();
            self.inner.set_len(key).await
        }
        async fn zset_add(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
            self.tick();
            self.inner.zset_add(key, member, score).await
        }
        async fn zset_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
            self.tick();
            self.inner.zset_remove(key, member).await
        }
        async fn zset_score(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
            self.tick();
            self.inner.zset_score(key, member).await
        }
        async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
            self.tick();
            self.inner.scan_prefix(prefix).await
        }
    }

    /// Fails every call of one operation; everything else passes through.
    struct FailingStore {
        inner: MemoryStore,
        fail_op: &'static str,
    }

    impl FailingStore {
        fn new(fail_op: &'static str) -> Self {
            Self {
                inner: MemoryStore::new(),
                fail_op,
            }
        }

        fn maybe_fail(&self, op: &'static str) -> StoreResult<()> {
            if self.fail_op == op {
                Err(StoreError::Connection(format!("injected failure in {op}")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Store for FailingStore {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.maybe_fail("get")?;
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            self.maybe_fail("set")?;
            self.inner.set(key, value).await
        }
        async fn set_nx(&self, key: &str, value: &str) -> StoreResult<bool> {
            self.maybe_fail("set_nx")?;
            self.inner.set_nx(key, value).await
        }
        async fn incr(&self, key: &str) -> StoreResult<i64> {
            self.maybe_fail("incr")?;
            self.inner.incr(key).await
        }
        async fn del(&self, key: &str) -> StoreResult<bool> {
            self.maybe_fail("del")?;
            self.inner.del(key).await
        }
        async fn exists(&self, key: &str) -> StoreResult<bool> {
            self.maybe_fail("exists")?;
            self.inner.exists(key).await
        }
        async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
            self.maybe_fail("hash_get_all")?;
            self.inner.hash_get_all(key).await
        }
        async fn hash_set_all(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
            self.maybe_fail("hash_set_all")?;
            self.inner.hash_set_all(key, fields).await
        }
        async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
            self.maybe_fail("set_add")?;
            self.inner.set_add(key, member).await
        }
        async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
            self.maybe_fail("set_remove")?;
            self.inner.set_remove(key, member).await
        }
        async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
            self.maybe_fail("set_members")?;
            self.inner.set_members(key).await
        }
        async fn set_contains(&self, key: &str, member: &str) -> StoreResult<bool> {
            self.maybe_fail("set_contains")?;
            self.inner.set_contains(key, member).await
        }
        async fn set_len(&self, key: &str) -> StoreResult<u64> {
            self.maybe_fail("set_len")?;
            self.inner.set_len(key).await
        }
        async fn zset_add(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
            self.maybe_fail("zset_add")?;
            self.inner.zset_add(key, member, score).await
        }
        async fn zset_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
            self.maybe_fail("zset_remove")?;
            self.inner.zset_remove(key, member).await
        }
        async fn zset_score(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
            self.maybe_fail("zset_score")?;
            self.inner.zset_score(key, member).await
        }
        async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
            self.inner.scan_prefix(prefix).await
        }
    }
}
