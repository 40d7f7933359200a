use std::collections::HashSet;

use log::warn;

use crate::{
    compiler::DirectionPolicy,
    schema::{BinderDef, MethodDef, ParameterDef, ReturnDef},
    source::{DeclUnit, MethodDecl, Modifiers},
    typesystem::TypeResolver,
};

/// `IBinder.FIRST_CALL_TRANSACTION`
pub const FIRST_CALL_TRANSACTION: u32 = 1;

/// Build the dispatch table of an interface unit.
pub(crate) fn compile_binder(
    unit: &DeclUnit,
    resolver: &TypeResolver<'_>,
    policy: &dyn DirectionPolicy,
    base: u32,
) -> BinderDef {
    let codes = assign_codes(unit, base);
    let interface_oneway = unit.modifiers.contains(Modifiers::ONEWAY);

    let methods = unit
        .methods
        .iter()
        .zip(codes)
        .map(|(method, tc)| MethodDef {
            name: method.name.clone(),
            tc,
            oneway: interface_oneway || method.modifiers.contains(Modifiers::ONEWAY),
            retval: (!method.ret.is_void()).then(|| ReturnDef {
                ty: Some(method.ret.to_string()),
                call: resolver.resolve(&method.ret),
            }),
            arguments: method
                .params
                .iter()
                .map(|param| ParameterDef {
                    name: param.name.clone(),
                    ty: Some(param.ty.to_string()),
                    call: resolver.resolve(&param.ty),
                    direction: policy.direction(method, param),
                })
                .collect(),
        })
        .collect();

    BinderDef { methods }
}

/// Transaction codes for every method, in declaration order.
///
/// Explicit codes are kept. Methods without one take the next code after the previous method
/// that is not claimed explicitly anywhere in the interface. A repeated explicit code is
/// reassigned the same way and reported.
fn assign_codes(unit: &DeclUnit, base: u32) -> Vec<u32> {
    let reserved: HashSet<u32> = unit.methods.iter().filter_map(|m| m.code).collect();
    let mut taken = HashSet::new();
    let mut next = base;

    let allocate = |taken: &mut HashSet<u32>, next: &mut u32| {
        while reserved.contains(next) || taken.contains(next) {
            *next += 1;
        }
        let code = *next;
        taken.insert(code);
        *next += 1;
        code
    };

    unit.methods
        .iter()
        .map(|method: &MethodDecl| match method.code {
            Some(code) if taken.insert(code) => {
                next = next.max(code.saturating_add(1));
                code
            }
            Some(code) => {
                let reassigned = allocate(&mut taken, &mut next);
                warn!(
                    "{}.{}: transaction code {} already used, assigned {}",
                    unit.qualified_name(),
                    method.name,
                    code,
                    reassigned
                );
                reassigned
            }
            None => allocate(&mut taken, &mut next),
        })
        .collect()
}
