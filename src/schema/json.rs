//! Persisted schema format.
//!
//! One pretty-printed JSON document per compiled class. Parcelables look like
//!
//! ```json
//! {
//!   "name": "com.example.Point",
//!   "imports": [],
//!   "kind": "parcelable",
//!   "fields": [
//!     { "name": "x", "call": "readInt" },
//!     { "name": "y", "call": "readInt", "condition": { "field": "x", "op": "!=", "value": 0 } }
//!   ],
//!   "creator": true,
//!   "constructor": true,
//!   "structured": false
//! }
//! ```
//!
//! and binders carry `methods` entries of the form
//! `{ "name", "tc", "oneway", "retval": { "call" } | null, "arguments": [{ "name", "call", "direction" }] }`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{schema::ClassDef, Result};

/// Serialize a class to its persisted JSON form.
///
/// # Errors
/// Returns [`crate::Error::JsonError`] if serialization fails.
pub fn to_json(class: &ClassDef) -> Result<String> {
    Ok(serde_json::to_string_pretty(class)?)
}

/// Parse a persisted class and check it is internally consistent.
///
/// # Errors
/// Returns [`crate::Error::JsonError`] for invalid documents and [`crate::Error::Malformed`]
/// when a condition references a field that does not precede it.
pub fn from_json(text: &str) -> Result<ClassDef> {
    let class: ClassDef = serde_json::from_str(text)?;
    validate(&class)?;
    Ok(class)
}

/// Check the invariants serde cannot express.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] when a condition refers to a field that is not declared
/// before it, when an opaque parcelable lists fields, or when two methods share a transaction
/// code.
pub fn validate(class: &ClassDef) -> Result<()> {
    if let Some(parcelable) = class.as_parcelable() {
        if parcelable.opaque && !parcelable.fields.is_empty() {
            return Err(malformed_error!(
                "{}: an opaque parcelable cannot declare fields",
                class.name
            ));
        }
        for (index, field) in parcelable.fields.iter().enumerate() {
            let Some(condition) = &field.condition else {
                continue;
            };
            let earlier = parcelable.fields[..index]
                .iter()
                .any(|prior| prior.name == condition.field);
            if !earlier {
                return Err(malformed_error!(
                    "{}: field '{}' depends on '{}' which is not declared before it",
                    class.name,
                    field.name,
                    condition.field
                ));
            }
        }
    }

    if let Some(binder) = class.as_binder() {
        for (index, method) in binder.methods.iter().enumerate() {
            if binder.methods[..index].iter().any(|prior| prior.tc == method.tc) {
                return Err(malformed_error!(
                    "{}: transaction code {} is used twice",
                    class.name,
                    method.tc
                ));
            }
        }
    }

    Ok(())
}

/// Write `class` below `dir`, one directory per name segment.
///
/// Returns the written path. An existing file is only replaced when `force` is set; otherwise
/// `Ok(None)` is returned.
///
/// # Errors
/// Returns [`crate::Error::FileError`] if the directory or file cannot be written.
pub fn save(class: &ClassDef, dir: &Path, force: bool) -> Result<Option<PathBuf>> {
    let path = dir.join(class.name.schema_path());
    if path.exists() && !force {
        return Ok(None);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, to_json(class)?)?;
    Ok(Some(path))
}

/// Read a persisted class from disk.
///
/// # Errors
/// Returns [`crate::Error::FileError`] or the errors of [`from_json`].
pub fn load(path: &Path) -> Result<ClassDef> {
    from_json(&fs::read_to_string(path)?)
}
