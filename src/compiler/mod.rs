//! Schema extraction from parsed declaration units.
//!
//! [`compile`] turns one [`DeclUnit`] into a [`ClassDef`]:
//!
//! - interfaces become a [`crate::schema::BinderDef`]. Methods keep declaration order, transaction
//!   codes start at [`FIRST_CALL_TRANSACTION`] unless declared explicitly, `oneway` comes from the
//!   method or the interface, and parameter directions come from the loader's [`DirectionPolicy`]
//! - parcelables, unions and classes carrying the Parcel contract become a
//!   [`crate::schema::ParcelableDef`]. A custom unmarshal routine takes precedence over the
//!   declared field order; static, transient and constant fields never contribute
//!
//! Compilation is best-effort and infallible. A type the [`crate::typesystem::TypeResolver`]
//! cannot map stays in the schema as [`crate::schema::ReadOp::Unsupported`], and a class without
//! a usable layout compiles to an empty parcelable. Both cases are logged.
//!
//! # Examples
//!
//! ```rust
//! use parcelscope::{compiler, source::{AidlParser, SourceParser}, Loader};
//!
//! let units = AidlParser.parse(
//!     std::path::Path::new("IFoo.aidl"),
//!     "package com.example; interface IFoo { void bar(int x); }",
//! )?;
//! let loader = Loader::new();
//! let class = compiler::compile(&units[0], &loader);
//!
//! let bar = &class.as_binder().unwrap().methods[0];
//! assert_eq!(bar.tc, 1);
//! assert_eq!(bar.arguments[0].call.to_string(), "readInt");
//! # Ok::<(), parcelscope::Error>(())
//! ```

mod binder;
mod direction;
mod parcelable;

use log::debug;

use crate::{
    schema::{ClassDef, ClassKind, QualifiedName},
    source::{DeclUnit, UnitKind},
    typesystem::TypeResolver,
    Loader,
};

pub use binder::FIRST_CALL_TRANSACTION;
pub use direction::{DirectionPolicy, ModifierPolicy};
pub use parcelable::UNION_TAG;

/// Compile one declaration unit, resolving referenced names through `loader`.
///
/// The result has no [`ClassDef::location`]; the loader fills it in when it compiles from a
/// file.
#[must_use]
pub fn compile(unit: &DeclUnit, loader: &Loader) -> ClassDef {
    let name: QualifiedName = unit.qualified_name();
    let resolver = TypeResolver::new(loader, unit);

    let kind = match unit.kind {
        UnitKind::Interface => ClassKind::Binder(binder::compile_binder(
            unit,
            &resolver,
            loader.direction_policy(),
            loader.transaction_base(),
        )),
        _ => ClassKind::Parcelable(parcelable::compile_parcelable(unit, &resolver)),
    };

    debug!("{name}: compiled {}", unit.kind.label());

    ClassDef {
        name,
        location: None,
        imports: unit.imports.clone(),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        schema::{CompareOp, Direction, PrimitiveKind, ReadOp},
        source::{
            FieldDecl, MarshalSource, MarshalStep, MethodDecl, Modifiers, ParamDecl, TypeRef,
        },
    };

    fn int() -> ReadOp {
        ReadOp::Primitive(PrimitiveKind::Int)
    }

    fn field(name: &str, ty: &str, modifiers: Modifiers) -> FieldDecl {
        FieldDecl {
            name: name.into(),
            ty: TypeRef::parse(ty).unwrap(),
            modifiers,
        }
    }

    fn read(target: &str, call: ReadOp) -> MarshalStep {
        MarshalStep::Read {
            target: target.into(),
            source: MarshalSource::Call(call),
        }
    }

    #[test]
    fn test_single_method_interface() {
        let mut unit = DeclUnit::new("com.example", "Foo", UnitKind::Interface);
        unit.methods.push(MethodDecl {
            name: "bar".into(),
            ret: TypeRef::void(),
            params: vec![ParamDecl {
                name: "x".into(),
                ty: TypeRef::simple("int"),
                modifiers: Modifiers::empty(),
                annotations: Vec::new(),
            }],
            modifiers: Modifiers::empty(),
            code: None,
            annotations: Vec::new(),
        });

        let class = compile(&unit, &Loader::new());
        assert_eq!(class.name.as_str(), "com.example.Foo");
        let method = &class.as_binder().unwrap().methods[0];
        assert_eq!(method.tc, 1);
        assert!(!method.oneway);
        assert!(method.retval.is_none());
        assert_eq!(method.arguments[0].name, "x");
        assert_eq!(method.arguments[0].direction, Direction::In);
        assert_eq!(method.arguments[0].call, int());
    }

    #[test]
    fn test_custom_policy_and_base() {
        let mut unit = DeclUnit::new("a", "IFoo", UnitKind::Interface);
        unit.modifiers = Modifiers::ONEWAY;
        unit.methods.push(MethodDecl {
            name: "f".into(),
            ret: TypeRef::simple("long"),
            params: vec![ParamDecl {
                name: "p".into(),
                ty: TypeRef::simple("int"),
                modifiers: Modifiers::empty(),
                annotations: Vec::new(),
            }],
            modifiers: Modifiers::empty(),
            code: None,
            annotations: Vec::new(),
        });

        let loader = Loader::new()
            .with_transaction_base(100)
            .with_direction_policy(|_: &MethodDecl, _: &ParamDecl| Direction::InOut);
        let class = compile(&unit, &loader);
        let method = &class.as_binder().unwrap().methods[0];
        assert_eq!(method.tc, 100);
        assert!(method.oneway);
        assert_eq!(method.arguments[0].direction, Direction::InOut);
        assert_eq!(
            method.retval.as_ref().unwrap().call,
            ReadOp::Primitive(PrimitiveKind::Long)
        );
    }

    #[test]
    fn test_java_parcelable_fields() {
        let mut unit = DeclUnit::new("a", "Point", UnitKind::Class);
        unit.language = "java";
        unit.fields = vec![
            field("CREATOR", "Parcelable.Creator<Point>", Modifiers::STATIC),
            field("x", "int", Modifiers::empty()),
            field("cache", "long", Modifiers::TRANSIENT),
            field("label", "String", Modifiers::FINAL),
            field("extra", "CharSequence", Modifiers::empty()),
        ];

        let class = compile(&unit, &Loader::new());
        let def = class.as_parcelable().unwrap();
        assert!(def.creator);
        assert!(!def.constructor);
        assert!(!def.structured);

        let names: Vec<_> = def.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["x", "label", "extra"]);
        assert!(!def.fields[2].call.is_supported());
        assert_eq!(def.fields[2].ty.as_deref(), Some("CharSequence"));
    }

    #[test]
    fn test_plain_class_is_opaque() {
        let mut unit = DeclUnit::new("a", "Helper", UnitKind::Class);
        unit.fields.push(field("x", "int", Modifiers::empty()));
        let class = compile(&unit, &Loader::new());
        let def = class.as_parcelable().unwrap();
        assert!(def.fields.is_empty());
        assert!(def.opaque);

        let forward = DeclUnit::new("a", "Forward", UnitKind::Parcelable { structured: false });
        assert!(compile(&forward, &Loader::new()).as_parcelable().unwrap().opaque);
    }

    #[test]
    fn test_marshal_steps_take_precedence() {
        let mut unit = DeclUnit::new("a", "Flags", UnitKind::Class);
        unit.supertypes.push(TypeRef::simple("Parcelable"));
        unit.fields = vec![
            field("b", "int", Modifiers::empty()),
            field("a", "int", Modifiers::empty()),
        ];
        unit.marshal = Some(vec![
            read("a", int()),
            MarshalStep::Condition {
                source: MarshalSource::Type(TypeRef::simple("int")),
                op: CompareOp::Ne,
                value: 0,
                then: vec![read("b", ReadOp::Primitive(PrimitiveKind::String))],
                otherwise: vec![read("c", int())],
            },
            MarshalStep::Stop,
            read("unreachable", int()),
        ]);

        let class = compile(&unit, &Loader::new());
        let def = class.as_parcelable().unwrap();
        let names: Vec<_> = def.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a", "_cond0", "b", "c"]);

        assert!(def.fields[1].condition.is_none());
        let then = def.fields[2].condition.as_ref().unwrap();
        assert_eq!(then.field, "_cond0");
        assert_eq!(then.op, CompareOp::Ne);
        assert_eq!(def.fields[3].condition.as_ref().unwrap().op, CompareOp::Eq);
        assert!(crate::schema::json::validate(&class).is_ok());
    }

    #[test]
    fn test_nested_conditions() {
        let mut unit = DeclUnit::new("a", "Nested", UnitKind::Parcelable { structured: false });
        unit.marshal = Some(vec![MarshalStep::Condition {
            source: MarshalSource::Call(int()),
            op: CompareOp::Gt,
            value: 1,
            then: vec![MarshalStep::Condition {
                source: MarshalSource::Call(int()),
                op: CompareOp::Eq,
                value: 7,
                then: vec![read("deep", int())],
                otherwise: Vec::new(),
            }],
            otherwise: Vec::new(),
        }]);

        let class = compile(&unit, &Loader::new());
        let def = class.as_parcelable().unwrap();
        let names: Vec<_> = def.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["_cond0", "_cond1", "deep"]);
        assert_eq!(def.fields[1].condition.as_ref().unwrap().field, "_cond0");
        assert_eq!(def.fields[2].condition.as_ref().unwrap().field, "_cond1");
    }

    #[test]
    fn test_union_layout() {
        let mut unit = DeclUnit::new("a", "Choice", UnitKind::Union);
        unit.fields = vec![
            field("number", "int", Modifiers::empty()),
            field("text", "String", Modifiers::empty()),
        ];

        let class = compile(&unit, &Loader::new());
        let def = class.as_parcelable().unwrap();
        assert_eq!(def.fields[0].name, UNION_TAG);
        assert_eq!(def.fields[2].condition.as_ref().unwrap().value, 1);
        assert!(!def.structured);
    }

    #[test]
    fn test_unresolved_field_kept() {
        let mut unit = DeclUnit::new("a", "Holder", UnitKind::Parcelable { structured: true });
        unit.fields = vec![
            field("before", "int", Modifiers::empty()),
            field("missing", "com.nowhere.Thing", Modifiers::empty()),
            field("after", "int", Modifiers::empty()),
        ];

        let class = compile(&unit, &Loader::new());
        let def = class.as_parcelable().unwrap();
        assert_eq!(def.fields.len(), 3);
        assert_eq!(
            def.fields[1].call,
            ReadOp::Unsupported("com.nowhere.Thing".into())
        );
        assert!(def.structured);
    }
}
