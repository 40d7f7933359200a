use log::warn;

use crate::{
    schema::{ImportDef, QualifiedName, ReadOp},
    source::{DeclUnit, TypeRef, UnitKind},
    typesystem::primitives,
    Loader,
};

/// Maps type references of one declaration unit to read operations.
///
/// The resolver is shallow: it asks the [`Loader`] what *kind* of declaration a name refers to,
/// which parses at most the declaring file, but it never compiles referenced classes. A
/// parcelable is referenced by name and compiled only when a decoder first needs it.
pub struct TypeResolver<'a> {
    loader: &'a Loader,
    unit: &'a DeclUnit,
    name: QualifiedName,
}

impl<'a> TypeResolver<'a> {
    /// Resolver for references written inside `unit`.
    #[must_use]
    pub fn new(loader: &'a Loader, unit: &'a DeclUnit) -> Self {
        TypeResolver {
            loader,
            unit,
            name: unit.qualified_name(),
        }
    }

    /// Resolve a type reference.
    ///
    /// Never fails: a reference without a wire mapping becomes [`ReadOp::Unsupported`]
    /// carrying the type as written.
    #[must_use]
    pub fn resolve(&self, ty: &TypeRef) -> ReadOp {
        let op = self.resolve_inner(ty);
        if !op.is_supported() {
            warn!("{}: unsupported type '{}'", self.name, ty);
        }
        op
    }

    fn resolve_inner(&self, ty: &TypeRef) -> ReadOp {
        if let Some(element) = ty.element() {
            return ReadOp::repeated(self.resolve_inner(&element));
        }

        if ty.args.is_empty() {
            if let Some(info) = primitives::lookup(&ty.name) {
                return ReadOp::Primitive(info.kind);
            }
        }

        if primitives::is_list(&ty.name) {
            return match ty.args.as_slice() {
                [element] => ReadOp::repeated(self.resolve_inner(element)),
                _ => ReadOp::repeated(ReadOp::Value),
            };
        }

        match self.qualify(&ty.name) {
            Some((name, kind)) => {
                if let Some(op) = primitives::builtin(name.as_str()) {
                    return op;
                }
                match kind {
                    UnitKind::Interface => ReadOp::StrongBinder,
                    UnitKind::Enum { backing } => self.resolve_inner(&backing),
                    UnitKind::Parcelable { .. } | UnitKind::Class | UnitKind::Union => {
                        ReadOp::Parcelable(name)
                    }
                }
            }
            None => primitives::builtin(&ty.name)
                .unwrap_or_else(|| ReadOp::Unsupported(ty.to_string())),
        }
    }

    /// Find the declaration a possibly-qualified name refers to.
    ///
    /// Search order: types nested in the unit and its enclosing classes, explicit imports,
    /// wildcard imports, the unit's own package, then the name taken as fully qualified.
    #[must_use]
    pub fn qualify(&self, name: &str) -> Option<(QualifiedName, UnitKind)> {
        let (head, rest) = match name.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (name, None),
        };

        let mut scope = Some(self.name.clone());
        while let Some(outer) = scope {
            if let Some(found) = self.probe(outer.nested(name)) {
                return Some(found);
            }
            scope = outer.enclosing();
        }

        for import in self.unit.imports.iter().filter(|import| import.imports(head)) {
            let candidate = match rest {
                Some(rest) => import.path.nested(rest),
                None => import.path.clone(),
            };
            if let Some(found) = self.probe(candidate) {
                return Some(found);
            }
        }

        for import in self.unit.imports.iter().filter(|import| import.wildcard) {
            if let Some(found) = self.probe_wildcard(import, name) {
                return Some(found);
            }
        }

        if let Some(found) = self.probe(QualifiedName::join(&self.unit.package, name)) {
            return Some(found);
        }

        rest.and_then(|_| self.probe(QualifiedName::new(name)))
    }

    fn probe(&self, candidate: QualifiedName) -> Option<(QualifiedName, UnitKind)> {
        let kind = self.loader.kind_of(&candidate)?;
        Some((candidate, kind))
    }

    fn probe_wildcard(&self, import: &ImportDef, name: &str) -> Option<(QualifiedName, UnitKind)> {
        let candidate = import.path.nested(name);
        self.loader.resolve_location(&candidate).ok()?;
        self.probe(candidate)
    }
}
