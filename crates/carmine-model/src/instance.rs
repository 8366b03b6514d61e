//! The model instance handle.
//!
//! An [`Instance`] is a cheap clone: all clones share one state. That
//! sharing is what makes the relation queue work — a queued link holds a
//! handle to its live target, a deep save assigns the target's id through
//! that handle, and a self-link is detected by pointer identity.

use std::sync::{Arc, Mutex};

use carmine_schema::ModelSchema;
use carmine_store::Store;
use carmine_types::{validate_id, Value, DEFAULT_RELATION_NAME};

use crate::context::ModelContext;
use crate::error::{ModelError, ModelResult, ValidationErrors};
use crate::properties::{PropertyDiff, PropertyStore};
use crate::relations::{self, ChangeKind, LinkOptions, RelationChange};
use crate::save;
use crate::validation;

pub(crate) struct InstanceState {
    pub id: Option<String>,
    /// True iff the id was set by a successful load or save, not by
    /// manual assignment.
    pub loaded: bool,
    /// True iff the id changed since the last load/save.
    pub id_changed: bool,
    pub properties: PropertyStore,
    pub queue: Vec<RelationChange>,
    pub errors: ValidationErrors,
}

struct Inner {
    schema: Arc<ModelSchema>,
    ctx: ModelContext,
    state: Mutex<InstanceState>,
}

/// One model instance. Clones share state.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<Inner>,
}

impl Instance {
    pub fn new(schema: Arc<ModelSchema>, ctx: ModelContext) -> Self {
        let state = InstanceState {
            id: None,
            loaded: false,
            id_changed: false,
            properties: PropertyStore::new(schema.clone()),
            queue: Vec::new(),
            errors: ValidationErrors::new(),
        };
        Self {
            inner: Arc::new(Inner {
                schema,
                ctx,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn model_name(&self) -> &str {
        self.inner.schema.name()
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.inner.schema
    }

    pub(crate) fn context(&self) -> &ModelContext {
        &self.inner.ctx
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut InstanceState) -> R) -> R {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        f(&mut state)
    }

    /// True iff `other` is a handle to this same instance.
    pub fn same_instance(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ---- identity ----

    pub fn id(&self) -> Option<String> {
        self.with_state(|s| s.id.clone())
    }

    /// Assign the identifier manually. This marks the instance as
    /// not-loaded and dirty — unless the id is unchanged, which is a
    /// no-op. A manually assigned id makes the next save an upsert.
    pub fn set_id(&self, id: impl Into<String>) {
        let id = id.into();
        self.with_state(|s| {
            if s.id.as_deref() == Some(id.as_str()) {
                return;
            }
            s.id = Some(id);
            s.loaded = false;
            s.id_changed = true;
        });
    }

    /// True iff the identifier was produced by a successful load or save.
    pub fn is_loaded(&self) -> bool {
        self.with_state(|s| s.loaded)
    }

    /// True iff anything would be written by a save: a property change,
    /// a manually changed id, or a queued relation change.
    pub fn is_dirty(&self) -> bool {
        self.with_state(|s| s.id_changed || s.properties.is_dirty() || !s.queue.is_empty())
    }

    // ---- properties ----

    pub fn property(&self, name: &str) -> ModelResult<Value> {
        self.with_state(|s| s.properties.get(name))
    }

    /// Cast and assign one property. Returns the cast value.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> ModelResult<Value> {
        let value = value.into();
        self.with_state(|s| s.properties.set(name, value))
    }

    /// Assign several properties at once; stops at the first unknown
    /// name.
    pub fn set_properties(&self, pairs: &[(&str, Value)]) -> ModelResult<()> {
        self.with_state(|s| {
            for (name, value) in pairs {
                s.properties.set(name, value.clone())?;
            }
            Ok(())
        })
    }

    /// All current values in definition order.
    pub fn all_properties(&self) -> Vec<(String, Value)> {
        self.with_state(|s| s.properties.all())
    }

    /// Pending property changes, optionally restricted to one name.
    pub fn property_diff(&self, filter: Option<&str>) -> Vec<PropertyDiff> {
        self.with_state(|s| s.properties.diff(filter))
    }

    /// Discard pending property changes, optionally for one name.
    pub fn property_reset(&self, filter: Option<&str>) {
        self.with_state(|s| s.properties.reset(filter));
    }

    /// The error set populated by the last validation or failed save.
    pub fn errors(&self) -> ValidationErrors {
        self.with_state(|s| s.errors.clone())
    }

    // ---- validation ----

    /// Run the validation pipeline, optionally for a single property.
    /// Populates [`errors`](Self::errors) and returns whether the
    /// instance is valid.
    pub async fn validate(&self, only: Option<&str>) -> ModelResult<bool> {
        let (properties, id, loaded) =
            self.with_state(|s| (s.properties.clone(), s.id.clone(), s.loaded));
        let errors = validation::run(
            &self.inner.ctx,
            &self.inner.schema,
            &properties,
            id.as_deref(),
            loaded,
            only,
        )
        .await?;
        let valid = errors.is_empty();
        self.with_state(|s| s.errors = errors);
        Ok(valid)
    }

    // ---- persistence ----

    /// Commit the instance: validate, allocate an id if needed, claim
    /// unique values, write the hash, maintain indexes, flush queued
    /// relation changes. A clean instance that already has an id is a
    /// no-op success without store traffic.
    pub async fn save(&self) -> ModelResult<()> {
        save::save(self).await
    }

    /// Delete the instance from the store: cascade-unlink every relation
    /// edge, release owned unique locks, clear index memberships, drop
    /// the hash row, and null the in-memory id. Fails with
    /// [`ModelError::NotFound`] when the id is unset or no record exists.
    pub async fn remove(&self) -> ModelResult<()> {
        save::remove(self).await
    }

    /// Hydrate this instance from the stored record for `id`.
    pub async fn load(&self, id: &str) -> ModelResult<()> {
        validate_id(id)?;
        let key = self.inner.ctx.keys.hash(self.model_name(), id);
        let fields = self.inner.ctx.store.hash_get_all(&key).await?;
        if fields.is_empty() {
            return Err(ModelError::NotFound);
        }
        self.with_state(|s| {
            s.properties.hydrate(&fields);
            s.id = Some(id.to_string());
            s.loaded = true;
            s.id_changed = false;
            s.errors = ValidationErrors::new();
        });
        Ok(())
    }

    // ---- relations ----

    /// Queue a link to `target` under the default relation name.
    pub fn link(&self, target: &Instance) {
        self.link_with(target, LinkOptions::default());
    }

    /// Queue a link to `target` with an explicit name and/or per-link
    /// error callback. Executed FIFO at save time; an unsaved target is
    /// saved first (deep link).
    pub fn link_with(&self, target: &Instance, options: LinkOptions) {
        self.queue_change(ChangeKind::Link, target, options);
    }

    /// Queue removal of the link to `target` under the default name.
    pub fn unlink(&self, target: &Instance) {
        self.unlink_with(target, LinkOptions::default());
    }

    /// Queue removal of a named link. Removing an edge that does not
    /// exist is a no-op, not an error.
    pub fn unlink_with(&self, target: &Instance, options: LinkOptions) {
        self.queue_change(ChangeKind::Unlink, target, options);
    }

    fn queue_change(&self, kind: ChangeKind, target: &Instance, options: LinkOptions) {
        let change = RelationChange {
            kind,
            name: options
                .name
                .unwrap_or_else(|| DEFAULT_RELATION_NAME.to_string()),
            target: target.clone(),
            on_error: options.on_error,
        };
        self.with_state(|s| s.queue.push(change));
    }

    /// Does a saved link from this instance to `target` exist under
    /// `name` (default name if `None`)? Unsaved instances belong to
    /// nothing.
    pub async fn belongs_to(&self, target: &Instance, name: Option<&str>) -> ModelResult<bool> {
        relations::belongs_to(&self.inner.ctx, self, target, resolve(name)).await
    }

    /// Ids of every `target_model` instance this instance links to under
    /// `name`, sorted.
    pub async fn get_all(
        &self,
        target_model: &str,
        name: Option<&str>,
    ) -> ModelResult<Vec<String>> {
        relations::get_all(&self.inner.ctx, self, target_model, resolve(name)).await
    }

    /// Number of links to `target_model` instances under `name`.
    pub async fn num_links(&self, target_model: &str, name: Option<&str>) -> ModelResult<u64> {
        relations::num_links(&self.inner.ctx, self, target_model, resolve(name)).await
    }
}

fn resolve(name: Option<&str>) -> &str {
    name.unwrap_or(DEFAULT_RELATION_NAME)
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (id, loaded) = self.with_state(|s| (s.id.clone(), s.loaded));
        f.debug_struct("Instance")
            .field("model", &self.model_name())
            .field("id", &id)
            .field("loaded", &loaded)
            .finish()
    }
}
