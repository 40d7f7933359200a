use std::{path::PathBuf, sync::Arc};

use serde::Serialize;

use crate::{
    schema::{ClassDef, ClassKind, QualifiedName},
    source::DeclUnit,
    Error,
};

/// Summary of one declaration, as printed by `info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitInfo {
    /// Qualified name
    pub name: QualifiedName,
    /// Declaration kind (`interface`, `parcelable`, ...)
    pub kind: &'static str,
    /// Source language, `json` for persisted schemas
    pub language: &'static str,
    /// Path relative to its source root
    pub relative: PathBuf,
    /// Path on disk
    pub absolute: PathBuf,
    /// Instance fields, or compiled fields for a persisted schema
    pub fields: usize,
    /// Declared methods
    pub methods: usize,
    /// Declared constructors
    pub constructors: usize,
    /// Declares `CREATOR`
    pub creator: bool,
    /// Declares a `Parcel` constructor
    pub parcel_constructor: bool,
    /// Carries the Parcel marshaling contract
    pub parcelable: bool,
    /// Present in the compiled-class cache
    pub compiled: bool,
}

impl UnitInfo {
    pub(crate) fn from_unit(unit: &DeclUnit, relative: PathBuf, compiled: bool) -> Self {
        UnitInfo {
            name: unit.qualified_name(),
            kind: unit.kind.label(),
            language: unit.language,
            absolute: unit.path.clone(),
            relative,
            fields: unit
                .fields
                .iter()
                .filter(|field| field.modifiers.is_instance_field())
                .count(),
            methods: unit.methods.len(),
            constructors: unit.constructors.len(),
            creator: unit.has_creator(),
            parcel_constructor: unit.has_parcel_constructor(),
            parcelable: unit.is_parcelable(),
            compiled,
        }
    }

    pub(crate) fn from_class(class: &ClassDef, relative: PathBuf, absolute: PathBuf) -> Self {
        let (kind, fields, methods, creator, parcel_constructor) = match &class.kind {
            ClassKind::Parcelable(def) => (
                "parcelable",
                def.fields.len(),
                0,
                def.creator,
                def.constructor,
            ),
            ClassKind::Binder(def) => ("interface", 0, def.methods.len(), false, false),
        };
        UnitInfo {
            name: class.name.clone(),
            kind,
            language: "json",
            relative,
            absolute,
            fields,
            methods,
            constructors: 0,
            creator,
            parcel_constructor,
            parcelable: !class.is_binder(),
            compiled: true,
        }
    }
}

/// Result of scanning the source roots.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Every declared name, in root order then path order
    pub names: Vec<QualifiedName>,
    /// Files that could not be read or parsed
    pub failures: Vec<(PathBuf, Error)>,
}

/// Result of compiling many names.
#[derive(Debug, Default)]
pub struct CompileReport {
    /// Successfully compiled classes, in request order
    pub compiled: Vec<Arc<ClassDef>>,
    /// Names that failed, with the reason
    pub failed: Vec<(QualifiedName, Error)>,
}
