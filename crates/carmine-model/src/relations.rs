//! Relation graph maintenance.
//!
//! A relation is a named, directed edge between two instances, recorded
//! twice: the forward edge in the source's namespace and the mirrored
//! foreign edge in the target's, so traversal works from either side.
//! Every edge key an instance participates in is additionally registered
//! in its per-instance relation-keys set, which is what cascade cleanup
//! walks on remove — no keyspace scan required.
//!
//! Link and unlink operations are queued on the instance and flushed in
//! FIFO order during save. Linking a target that has no identifier yet
//! saves the target first (deep link); a failed deep save does not stop
//! the remaining queued changes, and all failures of one flush are
//! reported as a single aggregate error.

use std::sync::Arc;

use carmine_store::Store;
use carmine_types::KeyLayout;
use tracing::debug;

use crate::context::ModelContext;
use crate::error::{LinkError, LinkFailure, ModelError, ModelResult};
use crate::instance::Instance;
use crate::save;

/// Per-link error callback: invoked with the failed child's error and the
/// child instance before the aggregate error is raised.
pub type LinkErrorCallback = Arc<dyn Fn(&ModelError, &Instance) + Send + Sync>;

/// Options for queueing a link or unlink.
#[derive(Clone, Default)]
pub struct LinkOptions {
    /// Relation name; the default sentinel when `None`.
    pub name: Option<String>,
    /// Invoked if the deep save of the link's target fails.
    pub on_error: Option<LinkErrorCallback>,
}

impl LinkOptions {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            on_error: None,
        }
    }

    pub fn on_error(mut self, callback: impl Fn(&ModelError, &Instance) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Link,
    Unlink,
}

/// One queued relation change.
#[derive(Clone)]
pub(crate) struct RelationChange {
    pub kind: ChangeKind,
    pub name: String,
    pub target: Instance,
    pub on_error: Option<LinkErrorCallback>,
}

/// Flush `queue` for a freshly written `source` (whose id is `source_id`).
///
/// Changes run in queue order. A deep save that fails validation is
/// collected (after firing the per-link callback) and the remaining
/// changes still run; a child that itself failed on a deeper link
/// contributes its own failures to the aggregate instead of being wrapped
/// again. Store errors abort immediately — they are fatal, not
/// per-link conditions.
pub(crate) async fn flush(
    ctx: &ModelContext,
    source: &Instance,
    source_id: &str,
    queue: Vec<RelationChange>,
) -> ModelResult<()> {
    let mut failures: Vec<LinkFailure> = Vec::new();

    for change in queue {
        if change.kind == ChangeKind::Link
            && change.target.id().is_none()
            && !change.target.same_instance(source)
        {
            if let Err(error) = save::save(&change.target).await {
                match error {
                    ModelError::Validation(_) => {
                        if let Some(callback) = &change.on_error {
                            callback(&error, &change.target);
                        }
                        failures.push(LinkFailure {
                            parent: source.clone(),
                            child: change.target.clone(),
                            error: Box::new(error),
                        });
                        continue;
                    }
                    ModelError::Link(nested) => {
                        failures.extend(nested.failures);
                        continue;
                    }
                    fatal => return Err(fatal),
                }
            }
        }

        let target_id = match change.target.id() {
            Some(id) => id,
            // An unlink against a never-saved target: nothing to remove.
            None => continue,
        };

        match change.kind {
            ChangeKind::Link => {
                write_edge(
                    ctx,
                    source.model_name(),
                    source_id,
                    &change.name,
                    change.target.model_name(),
                    &target_id,
                )
                .await?;
            }
            ChangeKind::Unlink => {
                remove_edge(
                    ctx,
                    source.model_name(),
                    source_id,
                    &change.name,
                    change.target.model_name(),
                    &target_id,
                )
                .await?;
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ModelError::Link(LinkError { failures }))
    }
}

async fn write_edge(
    ctx: &ModelContext,
    source_model: &str,
    source_id: &str,
    name: &str,
    target_model: &str,
    target_id: &str,
) -> ModelResult<()> {
    let forward = ctx
        .keys
        .relation(source_model, name, target_model, source_id);
    let foreign = ctx.keys.relation(
        target_model,
        &KeyLayout::foreign_name(name),
        source_model,
        target_id,
    );

    ctx.store.set_add(&forward, target_id).await?;
    ctx.store.set_add(&foreign, source_id).await?;
    ctx.store
        .set_add(&ctx.keys.relation_keys(source_model, source_id), &forward)
        .await?;
    ctx.store
        .set_add(&ctx.keys.relation_keys(target_model, target_id), &foreign)
        .await?;
    debug!(
        source = source_model,
        source_id,
        name,
        target = target_model,
        target_id,
        "linked"
    );
    Ok(())
}

async fn remove_edge(
    ctx: &ModelContext,
    source_model: &str,
    source_id: &str,
    name: &str,
    target_model: &str,
    target_id: &str,
) -> ModelResult<()> {
    let forward = ctx
        .keys
        .relation(source_model, name, target_model, source_id);
    let foreign = ctx.keys.relation(
        target_model,
        &KeyLayout::foreign_name(name),
        source_model,
        target_id,
    );

    ctx.store.set_remove(&forward, target_id).await?;
    if !ctx.store.exists(&forward).await? {
        ctx.store
            .set_remove(&ctx.keys.relation_keys(source_model, source_id), &forward)
            .await?;
    }
    ctx.store.set_remove(&foreign, source_id).await?;
    if !ctx.store.exists(&foreign).await? {
        ctx.store
            .set_remove(&ctx.keys.relation_keys(target_model, target_id), &foreign)
            .await?;
    }
    debug!(
        source = source_model,
        source_id,
        name,
        target = target_model,
        target_id,
        "unlinked"
    );
    Ok(())
}

/// Remove every edge `id` participates in, from either side. An instance
/// with no relations cleans up trivially; edges already gone are skipped
/// without error.
pub(crate) async fn unlink_all(ctx: &ModelContext, model: &str, id: &str) -> ModelResult<()> {
    let registry_key = ctx.keys.relation_keys(model, id);
    for edge_key in ctx.store.set_members(&registry_key).await? {
        let Some((own_model, name, other_model, _own_id)) = ctx.keys.parse_relation(&edge_key)
        else {
            continue;
        };
        // The mirror of a forward edge is the foreign edge and vice
        // versa, keyed per counterpart id.
        let mirror_name = match KeyLayout::base_name(&name) {
            Some(base) => base.to_string(),
            None => KeyLayout::foreign_name(&name),
        };
        for other_id in ctx.store.set_members(&edge_key).await? {
            let mirror = ctx
                .keys
                .relation(&other_model, &mirror_name, &own_model, &other_id);
            ctx.store.set_remove(&mirror, id).await?;
            if !ctx.store.exists(&mirror).await? {
                ctx.store
                    .set_remove(&ctx.keys.relation_keys(&other_model, &other_id), &mirror)
                    .await?;
            }
        }
        ctx.store.del(&edge_key).await?;
    }
    ctx.store.del(&registry_key).await?;
    debug!(model, id, "relations cleaned up");
    Ok(())
}

pub(crate) async fn belongs_to(
    ctx: &ModelContext,
    source: &Instance,
    target: &Instance,
    name: &str,
) -> ModelResult<bool> {
    let (Some(source_id), Some(target_id)) = (source.id(), target.id()) else {
        return Ok(false);
    };
    let forward = ctx.keys.relation(
        source.model_name(),
        name,
        target.model_name(),
        &source_id,
    );
    Ok(ctx.store.set_contains(&forward, &target_id).await?)
}

pub(crate) async fn get_all(
    ctx: &ModelContext,
    source: &Instance,
    target_model: &str,
    name: &str,
) -> ModelResult<Vec<String>> {
    let Some(source_id) = source.id() else {
        return Ok(Vec::new());
    };
    let forward = ctx
        .keys
        .relation(source.model_name(), name, target_model, &source_id);
    let mut ids = ctx.store.set_members(&forward).await?;
    ids.sort();
    Ok(ids)
}

pub(crate) async fn num_links(
    ctx: &ModelContext,
    source: &Instance,
    target_model: &str,
    name: &str,
) -> ModelResult<u64> {
    let Some(source_id) = source.id() else {
        return Ok(0);
    };
    let forward = ctx
        .keys
        .relation(source.model_name(), name, target_model, &source_id);
    Ok(ctx.store.set_len(&forward).await?)
}
