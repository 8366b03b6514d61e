//! Secondary index maintenance.
//!
//! Equality-indexed properties keep a per-value id set. Score-indexed
//! (numeric) properties keep the id's score in one ordered structure AND
//! mirror the per-value sets, so both exact-match and range queries stay
//! answerable. Index writes run only after the hash write has succeeded,
//! so an index never references a value that was not durably stored.

use carmine_schema::IndexKind;
use carmine_store::Store;
use carmine_types::Value;
use tracing::debug;

use crate::context::ModelContext;
use crate::error::ModelResult;

/// One index update: the property, its index kind, the previously stored
/// value (if the instance existed before), and the value just written.
#[derive(Clone, Debug)]
pub(crate) struct IndexChange {
    pub property: String,
    pub index: IndexKind,
    pub old: Option<Value>,
    pub new: Value,
}

pub(crate) struct IndexMaintainer<'a> {
    ctx: &'a ModelContext,
}

impl<'a> IndexMaintainer<'a> {
    pub fn new(ctx: &'a ModelContext) -> Self {
        Self { ctx }
    }

    async fn move_equality_member(
        &self,
        model: &str,
        id: &str,
        property: &str,
        old: Option<&Value>,
        new: &Value,
    ) -> ModelResult<()> {
        if let Some(old) = old {
            let old_key = self.ctx.keys.index(model, property, &old.storage_form());
            self.ctx.store.set_remove(&old_key, id).await?;
        }
        let new_key = self.ctx.keys.index(model, property, &new.storage_form());
        self.ctx.store.set_add(&new_key, id).await?;
        Ok(())
    }

    /// Apply the given changes for `id`. Value-unchanged properties must
    /// not be passed in; the caller diffs, this applies.
    pub async fn apply(
        &self,
        model: &str,
        id: &str,
        changes: &[IndexChange],
    ) -> ModelResult<()> {
        for change in changes {
            match change.index {
                IndexKind::None => {}
                IndexKind::Equality => {
                    self.move_equality_member(
                        model,
                        id,
                        &change.property,
                        change.old.as_ref(),
                        &change.new,
                    )
                    .await?;
                }
                IndexKind::Scored => {
                    if let Some(score) = change.new.as_score() {
                        let key = self.ctx.keys.scored_index(model, &change.property);
                        self.ctx.store.zset_add(&key, id, score).await?;
                    }
                    self.move_equality_member(
                        model,
                        id,
                        &change.property,
                        change.old.as_ref(),
                        &change.new,
                    )
                    .await?;
                }
            }
        }
        if !changes.is_empty() {
            debug!(model, id, count = changes.len(), "indexes updated");
        }
        Ok(())
    }

    /// Remove `id` from every index it appears in, given the currently
    /// stored values.
    pub async fn remove(
        &self,
        model: &str,
        id: &str,
        current: &[(String, IndexKind, Value)],
    ) -> ModelResult<()> {
        for (property, index, value) in current {
            match index {
                IndexKind::None => {}
                IndexKind::Equality => {
                    let key = self.ctx.keys.index(model, property, &value.storage_form());
                    self.ctx.store.set_remove(&key, id).await?;
                }
                IndexKind::Scored => {
                    let scored = self.ctx.keys.scored_index(model, property);
                    self.ctx.store.zset_remove(&scored, id).await?;
                    let key = self.ctx.keys.index(model, property, &value.storage_form());
                    self.ctx.store.set_remove(&key, id).await?;
                }
            }
        }
        Ok(())
    }
}
