//! Field tables and field-name rules.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::TypeError;

/// A model's fields: name → JSON value. `BTreeMap` keeps iteration (and
/// serialization) deterministic.
pub type FieldTable = BTreeMap<String, Value>;

/// Prefix reserved for store-internal bookkeeping fields. User writes may
/// never touch fields with this prefix.
pub const META_FIELD_PREFIX: &str = "meta_";

/// Returns `true` if the field name is reserved for internal use.
pub fn is_reserved_field(name: &str) -> bool {
    name.starts_with(META_FIELD_PREFIX)
}

/// Validate a user-writable field name: `[a-z][a-z0-9_]*`, not reserved.
pub fn validate_field_name(name: &str) -> Result<(), TypeError> {
    if is_reserved_field(name) {
        return Err(TypeError::ReservedField(name.to_string()));
    }
    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !first_ok || !rest_ok {
        return Err(TypeError::InvalidField(name.to_string()));
    }
    Ok(())
}
