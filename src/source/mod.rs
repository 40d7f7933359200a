//! Parsed declaration units and the readers that produce them.
//!
//! The compiler never looks at source text. It consumes [`DeclUnit`]s: one per class
//! declaration, listing package, imports, kind, fields, methods, constructors and an optional
//! custom unmarshal routine, with type references kept exactly as written ([`TypeRef`]).
//!
//! Readers implement [`SourceParser`] and are registered on a [`crate::Loader`] by file
//! extension. The crate ships [`AidlParser`] for `.aidl` files; a Java front-end plugs in
//! through the same trait for `.java` sources.
//!
//! # Examples
//!
//! ```rust
//! use std::path::Path;
//! use parcelscope::source::{AidlParser, SourceParser, UnitKind};
//!
//! let units = AidlParser.parse(
//!     Path::new("IFoo.aidl"),
//!     "package com.example; interface IFoo { void bar(int x); }",
//! )?;
//! assert_eq!(units[0].kind, UnitKind::Interface);
//! assert_eq!(units[0].methods[0].name, "bar");
//! # Ok::<(), parcelscope::Error>(())
//! ```

mod aidl;
mod unit;

use std::path::Path;

use crate::Result;

pub use aidl::AidlParser;
pub use unit::{
    ConstructorDecl, DeclUnit, FieldDecl, MarshalSource, MarshalStep, MethodDecl, Modifiers,
    ParamDecl, TypeRef, UnitKind,
};

/// Turns one source file into declaration units.
///
/// Implementations must be stateless with respect to individual files: the loader may call
/// `parse` from several threads at once.
pub trait SourceParser: Send + Sync {
    /// File extension handled, without the dot.
    fn extension(&self) -> &'static str;

    /// Parse `text`, read from `path`, into every unit it declares, nested ones included.
    ///
    /// # Errors
    /// Returns [`crate::Error::Syntax`] when the text cannot be understood.
    fn parse(&self, path: &Path, text: &str) -> Result<Vec<DeclUnit>>;
}
