use log::warn;

use crate::{
    schema::{CompareOp, ConditionDef, FieldDef, ParcelableDef, PrimitiveKind, ReadOp},
    source::{DeclUnit, MarshalSource, MarshalStep, UnitKind},
    typesystem::TypeResolver,
};

/// Name of the synthetic field holding an AIDL union's active member.
pub const UNION_TAG: &str = "_tag";

/// Build the field layout of a parcelable, union or plain class unit.
pub(crate) fn compile_parcelable(unit: &DeclUnit, resolver: &TypeResolver<'_>) -> ParcelableDef {
    let mut def = ParcelableDef {
        creator: unit.has_creator(),
        constructor: unit.has_parcel_constructor(),
        structured: matches!(unit.kind, UnitKind::Parcelable { structured: true }),
        ..ParcelableDef::default()
    };

    if let Some(steps) = &unit.marshal {
        let mut builder = StepCompiler {
            resolver,
            fields: Vec::new(),
            markers: 0,
        };
        builder.steps(steps, None);
        def.fields = builder.fields;
        return def;
    }

    match &unit.kind {
        UnitKind::Union => def.fields = union_fields(unit, resolver),
        UnitKind::Parcelable { structured: false } if unit.fields.is_empty() => {
            warn!(
                "{}: forward-declared parcelable has no layout",
                unit.qualified_name()
            );
            def.opaque = true;
        }
        UnitKind::Parcelable { .. } => def.fields = declared_fields(unit, resolver),
        UnitKind::Class if unit.is_parcelable() => def.fields = declared_fields(unit, resolver),
        kind => {
            warn!(
                "{}: {} does not implement the Parcel contract",
                unit.qualified_name(),
                kind.label()
            );
            def.opaque = true;
        }
    }

    def
}

fn declared_fields(unit: &DeclUnit, resolver: &TypeResolver<'_>) -> Vec<FieldDef> {
    unit.fields
        .iter()
        .filter(|field| field.modifiers.is_instance_field())
        .map(|field| FieldDef {
            ty: Some(field.ty.to_string()),
            ..FieldDef::new(field.name.clone(), resolver.resolve(&field.ty))
        })
        .collect()
}

/// `writeInt(tag)` followed by the member the tag selects.
fn union_fields(unit: &DeclUnit, resolver: &TypeResolver<'_>) -> Vec<FieldDef> {
    let mut fields = vec![FieldDef::new(UNION_TAG, ReadOp::Primitive(PrimitiveKind::Int))];
    let members = unit
        .fields
        .iter()
        .filter(|field| field.modifiers.is_instance_field());
    for (tag, member) in (0_i64..).zip(members) {
        fields.push(FieldDef {
            ty: Some(member.ty.to_string()),
            condition: Some(ConditionDef {
                field: UNION_TAG.to_string(),
                op: CompareOp::Eq,
                value: tag,
            }),
            ..FieldDef::new(member.name.clone(), resolver.resolve(&member.ty))
        });
    }
    fields
}

/// Flattens a custom unmarshal routine into conditional fields.
///
/// Every `if` becomes a synthetic marker field `_cond<N>` holding the value its condition
/// reads. The fields of the `then` branch depend on the marker comparing true, those of the
/// `else` branch on the negated comparison.
struct StepCompiler<'r, 'a> {
    resolver: &'r TypeResolver<'a>,
    fields: Vec<FieldDef>,
    markers: usize,
}

impl StepCompiler<'_, '_> {
    /// Returns `false` once a [`MarshalStep::Stop`] is reached.
    fn steps(&mut self, steps: &[MarshalStep], condition: Option<&ConditionDef>) -> bool {
        for step in steps {
            match step {
                MarshalStep::Read { target, source } => {
                    let (ty, call) = self.source(source);
                    self.fields.push(FieldDef {
                        name: target.clone(),
                        ty,
                        call,
                        condition: condition.cloned(),
                    });
                }
                MarshalStep::Condition {
                    source,
                    op,
                    value,
                    then,
                    otherwise,
                } => {
                    let marker = format!("_cond{}", self.markers);
                    self.markers += 1;

                    let (ty, call) = self.source(source);
                    self.fields.push(FieldDef {
                        name: marker.clone(),
                        ty,
                        call,
                        condition: condition.cloned(),
                    });

                    let taken = ConditionDef {
                        field: marker,
                        op: *op,
                        value: *value,
                    };
                    if !self.steps(then, Some(&taken)) {
                        return false;
                    }
                    if !self.steps(otherwise, Some(&taken.negated())) {
                        return false;
                    }
                }
                MarshalStep::Stop => return false,
            }
        }
        true
    }

    fn source(&self, source: &MarshalSource) -> (Option<String>, ReadOp) {
        match source {
            MarshalSource::Type(ty) => (Some(ty.to_string()), self.resolver.resolve(ty)),
            MarshalSource::Call(call) => (None, call.clone()),
        }
    }
}
