//! Identifier rules.
//!
//! Instance identifiers are plain strings embedded in colon-delimited store
//! keys, so they must never contain the separator. Identifiers come from
//! two sources: the per-model increment counter (always digits) or a
//! caller-supplied generator, which is why the rule is enforced at save
//! time rather than by construction.

use crate::error::TypeError;

/// The character separating key namespace segments. Identifiers must not
/// contain it.
pub const KEY_SEPARATOR: char = ':';

/// Check that a string is usable as an instance identifier.
pub fn validate_id(id: &str) -> Result<(), TypeError> {
    if id.is_empty() {
        return Err(TypeError::EmptyId);
    }
    if id.contains(KEY_SEPARATOR) {
        return Err(TypeError::SeparatorInId(id.to_string()));
    }
    Ok(())
}
