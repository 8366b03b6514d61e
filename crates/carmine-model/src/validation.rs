//! The validation pipeline.
//!
//! For every property in scope the pipeline runs the declared validators
//! in order against the already-cast value (assignment casts eagerly, and
//! casters are idempotent, so nothing is re-cast here). Every failing
//! validator appends its kind, so one property can accumulate several
//! failure kinds.
//!
//! Unique properties get one additional, deferred check against the
//! unique constraint manager's read path: does a lock row for this value
//! already point at a different identifier? That probe is skipped when
//! `only` excludes the property, and for unchanged properties of a loaded
//! instance (their lock is already held), but never bypassed for a
//! property that is in scope.
//!
//! The pipeline never mutates values. Store failures during the deferred
//! check abort the whole pipeline as an error; they are not recorded as
//! per-property failures.

use carmine_schema::ModelSchema;

use crate::context::ModelContext;
use crate::error::{ModelResult, ValidationErrors};
use crate::properties::PropertyStore;
use crate::unique::UniqueConstraints;

/// Failure kind recorded when a unique value is held by someone else.
pub(crate) const NOT_UNIQUE: &str = "notUnique";

/// Run the pipeline over `properties`, restricted to `only` when given.
pub(crate) async fn run(
    ctx: &ModelContext,
    schema: &ModelSchema,
    properties: &PropertyStore,
    id: Option<&str>,
    loaded: bool,
    only: Option<&str>,
) -> ModelResult<ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let uniques = UniqueConstraints::new(ctx);

    for spec in schema.properties() {
        if let Some(only) = only {
            if only != spec.name {
                continue;
            }
        }
        let entry = properties
            .entry(&spec.name)
            .expect("schema property without an entry");

        for validator in &spec.validators {
            if !validator.check(&entry.value).await {
                errors.add(&spec.name, validator.kind());
            }
        }

        if spec.unique && !(loaded && !entry.updated) {
            let taken = uniques
                .is_taken_by_other(schema.name(), &spec.name, &entry.value, id)
                .await?;
            if taken {
                errors.add(&spec.name, NOT_UNIQUE);
            }
        }
    }

    Ok(errors)
}
