//! Unique constraint arbitration.
//!
//! A unique lock is one store row: `uniques:{model}:{property}:{value}` →
//! owning id, with string values lowercased (uniqueness is
//! case-insensitive). The lock row doubles as claim and permanent record;
//! what distinguishes a tentative claim from a confirmed lock is timing —
//! claims taken during a save attempt are released again if the attempt
//! fails, and old-value locks are released exactly when an update commits
//! the new value.
//!
//! The underlying set-if-absent write is the engine's only atomic
//! primitive: of two racing claimants, exactly one wins, and the loser
//! reports `notUnique`.

use carmine_store::Store;
use carmine_types::Value;
use tracing::{debug, warn};

use crate::context::ModelContext;
use crate::error::ModelResult;

/// The lock keys freshly claimed during one save attempt. These — and
/// only these — are released when the attempt fails; locks already owned
/// from an earlier save stay put.
#[derive(Debug, Default)]
pub(crate) struct ClaimSet {
    keys: Vec<String>,
}

impl ClaimSet {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Result of claiming every unique candidate of one save attempt.
pub(crate) enum ClaimOutcome {
    Claimed(ClaimSet),
    /// `property` lost the race; `partial` holds the claims taken before
    /// the conflict, which the caller must release.
    Conflict { property: String, partial: ClaimSet },
}

/// Store-backed unique constraint manager.
pub(crate) struct UniqueConstraints<'a> {
    ctx: &'a ModelContext,
}

impl<'a> UniqueConstraints<'a> {
    pub fn new(ctx: &'a ModelContext) -> Self {
        Self { ctx }
    }

    /// Read path for the validation pipeline: is `value` locked by an
    /// identifier other than `own_id`?
    pub async fn is_taken_by_other(
        &self,
        model: &str,
        property: &str,
        value: &Value,
        own_id: Option<&str>,
    ) -> ModelResult<bool> {
        if value.is_empty() {
            return Ok(false);
        }
        let key = self.ctx.keys.unique(model, property, &value.unique_form());
        match self.ctx.store.get(&key).await? {
            Some(owner) => Ok(Some(owner.as_str()) != own_id),
            None => Ok(false),
        }
    }

    /// Claim every `(property, value)` candidate for `id`, in order.
    ///
    /// Empty values are exempt: no row is written or checked. A claim on
    /// a value already owned by `id` succeeds without being recorded in
    /// the [`ClaimSet`] (it is not fresh, so a failed attempt must not
    /// release it). The first conflict stops the run.
    pub async fn claim(
        &self,
        model: &str,
        id: &str,
        candidates: &[(String, Value)],
    ) -> ModelResult<ClaimOutcome> {
        let mut claims = ClaimSet::default();
        for (property, value) in candidates {
            if value.is_empty() {
                continue;
            }
            let key = self.ctx.keys.unique(model, property, &value.unique_form());
            if self.ctx.store.set_nx(&key, id).await? {
                debug!(model, property, key = %key, "claimed unique value");
                claims.keys.push(key);
                continue;
            }
            let owner = self.ctx.store.get(&key).await?;
            if owner.as_deref() != Some(id) {
                debug!(model, property, key = %key, "unique claim conflict");
                return Ok(ClaimOutcome::Conflict {
                    property: property.clone(),
                    partial: claims,
                });
            }
        }
        Ok(ClaimOutcome::Claimed(claims))
    }

    /// Release freshly taken claims after a failed attempt. Best-effort:
    /// a release that fails is logged and skipped, never surfaced, so the
    /// original failure stays visible to the caller.
    pub async fn release(&self, claims: ClaimSet) {
        for key in claims.keys.into_iter().rev() {
            if let Err(error) = self.ctx.store.del(&key).await {
                warn!(key = %key, %error, "failed to release unique claim");
            }
        }
    }

    /// Delete the lock row for a value this instance owns. Used by
    /// remove, where a failed deletion must surface — a removed instance
    /// may not leave locks behind silently.
    pub async fn release_owned(
        &self,
        model: &str,
        property: &str,
        value: &Value,
    ) -> ModelResult<()> {
        if value.is_empty() {
            return Ok(());
        }
        let key = self.ctx.keys.unique(model, property, &value.unique_form());
        self.ctx.store.del(&key).await?;
        Ok(())
    }

    /// Free the lock of a superseded value after a successful update.
    /// Best-effort for the same reason as [`release`](Self::release).
    pub async fn release_value(&self, model: &str, property: &str, value: &Value) {
        if value.is_empty() {
            return;
        }
        let key = self.ctx.keys.unique(model, property, &value.unique_form());
        match self.ctx.store.del(&key).await {
            Ok(existed) => debug!(model, property, existed, "released superseded unique value"),
            Err(error) => warn!(key = %key, %error, "failed to release superseded unique value"),
        }
    }
}
