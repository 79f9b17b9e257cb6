//! Call-site generic inference.
//!
//! Walks parameter-type/argument-type pairs, emitting an observation for
//! each type parameter position; a parameter's solution is the least
//! upper bound (union) of its observations. Parameters with no
//! observation default to their constraint, or `any`.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::types::{FunctionType, TypeId, TypeKind, TypeParamId, TypeTable};

/// Observations collected per type parameter.
type Observations = FxHashMap<TypeParamId, Vec<TypeId>>;

/// Infer type arguments for a call to `func` with the given argument
/// types. Returns the solution for each of `func.type_params`, in order.
pub fn infer_type_arguments(
    table: &mut TypeTable,
    func: &FunctionType,
    arg_types: &[TypeId],
) -> Vec<TypeId> {
    let mut observations = Observations::default();
    for (i, &arg) in arg_types.iter().enumerate() {
        let param_ty = match func.params.get(i) {
            Some(p) => p.ty,
            None => match func.rest {
                Some(rest) => rest,
                None => break,
            },
        };
        collect(table, func, param_ty, arg, &mut observations);
    }

    func.type_params
        .iter()
        .map(|&p| {
            match observations.remove(&p) {
                Some(seen) => {
                    // Literal observations widen so `id(7)` solves to
                    // `number` rather than pinning the literal.
                    let widened: Vec<TypeId> =
                        seen.into_iter().map(|t| table.widen(t)).collect();
                    let solution = table.union(widened);
                    trace!(param = %table.type_param_def(p).name, solution = %table.display(solution), "inferred");
                    solution
                }
                None => match table.type_param_def(p).constraint {
                    Some(constraint) => constraint,
                    None => table.any(),
                },
            }
        })
        .collect()
}

fn collect(
    table: &mut TypeTable,
    func: &FunctionType,
    param: TypeId,
    arg: TypeId,
    observations: &mut Observations,
) {
    match table.kind(param).clone() {
        TypeKind::Param(p) if func.type_params.contains(&p) => {
            observations.entry(p).or_default().push(arg);
        }
        TypeKind::Array(p_elem) => {
            if let TypeKind::Array(a_elem) = table.kind(arg).clone() {
                collect(table, func, p_elem, a_elem, observations);
            } else if let TypeKind::Tuple { elements, .. } = table.kind(arg).clone() {
                let joined = table.union(elements);
                collect(table, func, p_elem, joined, observations);
            }
        }
        TypeKind::Promise(p_inner) => {
            if let TypeKind::Promise(a_inner) = table.kind(arg).clone() {
                collect(table, func, p_inner, a_inner, observations);
            }
        }
        TypeKind::Generator(p_inner) => {
            if let TypeKind::Generator(a_inner) = table.kind(arg).clone() {
                collect(table, func, p_inner, a_inner, observations);
            }
        }
        TypeKind::Tuple {
            elements: p_elems, ..
        } => {
            if let TypeKind::Tuple {
                elements: a_elems, ..
            } = table.kind(arg).clone()
            {
                for (p_elem, a_elem) in p_elems.into_iter().zip(a_elems) {
                    collect(table, func, p_elem, a_elem, observations);
                }
            }
        }
        TypeKind::Union(members) => {
            // Prefer matching a non-parameter member; fall back to the
            // bare parameter position.
            for member in &members {
                if !table.mentions_params(*member) {
                    continue;
                }
                collect(table, func, *member, arg, observations);
            }
        }
        TypeKind::Function(p_fn) => {
            if let TypeKind::Function(a_fn) = table.kind(arg).clone() {
                for (p_param, a_param) in p_fn.params.iter().zip(a_fn.params.iter()) {
                    collect(table, func, p_param.ty, a_param.ty, observations);
                }
                collect(table, func, p_fn.return_ty, a_fn.return_ty, observations);
            }
        }
        TypeKind::Record(p_rec) => {
            if let TypeKind::Record(a_rec) = table.kind(arg).clone() {
                for (name, p_prop) in &p_rec.props {
                    if let Some(a_prop) = a_rec.prop(name) {
                        collect(table, func, p_prop.ty, a_prop.ty, observations);
                    }
                }
            }
        }
        TypeKind::Instance(p_def, p_args) => {
            if let TypeKind::Instance(a_def, a_args) = table.kind(arg).clone()
                && p_def == a_def
            {
                for (p_arg, a_arg) in p_args.into_iter().zip(a_args) {
                    collect(table, func, p_arg, a_arg, observations);
                }
            }
        }
        TypeKind::Interface(p_def, p_args) => {
            if let TypeKind::Interface(a_def, a_args) = table.kind(arg).clone()
                && p_def == a_def
            {
                for (p_arg, a_arg) in p_args.into_iter().zip(a_args) {
                    collect(table, func, p_arg, a_arg, observations);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "tests/infer_tests.rs"]
mod tests;
