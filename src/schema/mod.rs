//! Compiled Parcel schemas.
//!
//! A schema is the subset of a class declaration that matters on the wire: the ordered reads a
//! parcelable performs, or the dispatch table of a Binder interface. Schemas are produced by
//! [`crate::compiler`], cached by [`crate::Loader`], persisted as JSON by [`json`] and consumed
//! by [`crate::codec`].
//!
//! # Key Components
//!
//! - [`ClassDef`] - A compiled class: name, location, imports and a [`ClassKind`] body
//! - [`ParcelableDef`] / [`FieldDef`] - Field layout, in wire order
//! - [`BinderDef`] / [`MethodDef`] / [`ParameterDef`] - Transaction dispatch table
//! - [`ConditionDef`] - Presence predicates on fields
//! - [`ReadOp`] - The symbolic read operation attached to every field
//!
//! References between classes are by [`QualifiedName`], never by embedding. Cyclic layouts (a
//! parcelable containing itself, directly or indirectly) are therefore ordinary data.
//!
//! # Examples
//!
//! ```rust
//! use parcelscope::schema::{json, ClassDef, ClassKind, FieldDef, ParcelableDef, PrimitiveKind, ReadOp};
//!
//! let class = ClassDef {
//!     kind: ClassKind::Parcelable(ParcelableDef {
//!         fields: vec![FieldDef::new("uid", ReadOp::Primitive(PrimitiveKind::Int))],
//!         ..ParcelableDef::default()
//!     }),
//!     ..ClassDef::empty("android.os.WorkSource".into())
//! };
//!
//! let text = json::to_json(&class)?;
//! assert_eq!(json::from_json(&text)?, class);
//! # Ok::<(), parcelscope::Error>(())
//! ```

mod call;
pub mod json;
mod types;

pub use call::{PrimitiveKind, ReadOp};
pub use types::{
    BinderDef, ClassDef, ClassKind, CompareOp, ConditionDef, Direction, FieldDef, ImportDef,
    MethodDef, ParameterDef, ParcelableDef, QualifiedName, ReturnDef, SourceLocation,
};
