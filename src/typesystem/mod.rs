//! Type resolution: from a type reference as written in source to a [`crate::schema::ReadOp`].
//!
//! # Architecture
//!
//! Resolution runs in a fixed order:
//!
//! 1. Arrays and `List<T>` containers recurse into their element type and become
//!    [`crate::schema::ReadOp::Repeated`]
//! 2. Primitive keywords map through the [`primitives::PRIMITIVES`] table
//! 3. Class names are qualified against nested types, imports and the unit's package, then
//!    mapped by the kind of the declaration found (interface, parcelable, enum, union)
//! 4. Framework types with their own format (`IBinder`, `Bundle`, `Map`) come from
//!    [`primitives::builtin`]
//! 5. Anything else becomes [`crate::schema::ReadOp::Unsupported`]
//!
//! Failure to resolve is not an error. The field keeps its name and position in the schema
//! so that decoding can run up to it.

pub mod primitives;
mod resolver;

pub use resolver::TypeResolver;
