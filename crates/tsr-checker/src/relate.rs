//! Structural assignability (`source <: target`).
//!
//! Compatibility checks are memoized on pairs of interned type handles;
//! in-progress pairs are assumed compatible, which makes the relation
//! coinductive and terminates recursive types.

use rustc_hash::{FxHashMap, FxHashSet};
use tsr_common::CompilerOptions;

use crate::operations::{member_type, substitute, build_subst};
use crate::types::{FunctionType, PropInfo, TypeId, TypeKind, TypeTable};

/// Memoized relation results plus the in-progress set.
#[derive(Debug, Default)]
pub struct RelationCache {
    results: FxHashMap<(TypeId, TypeId), bool>,
    in_progress: FxHashSet<(TypeId, TypeId)>,
}

impl RelationCache {
    pub fn new() -> Self {
        RelationCache::default()
    }
}

/// Is `source` assignable to `target`?
pub fn is_assignable(
    table: &mut TypeTable,
    cache: &mut RelationCache,
    options: &CompilerOptions,
    source: TypeId,
    target: TypeId,
) -> bool {
    relate(table, cache, options, source, target, false)
}

/// Method-position assignability: parameters check bivariantly when the
/// compatibility flag is set.
pub fn is_method_assignable(
    table: &mut TypeTable,
    cache: &mut RelationCache,
    options: &CompilerOptions,
    source: TypeId,
    target: TypeId,
) -> bool {
    relate(table, cache, options, source, target, options.method_bivariance)
}

fn relate(
    table: &mut TypeTable,
    cache: &mut RelationCache,
    options: &CompilerOptions,
    source: TypeId,
    target: TypeId,
    bivariant: bool,
) -> bool {
    if source == target {
        return true;
    }
    let key = (source, target);
    if let Some(&result) = cache.results.get(&key) {
        return result;
    }
    if !cache.in_progress.insert(key) {
        // Recursive type: assume compatible while the outer check runs.
        return true;
    }
    let result = relate_uncached(table, cache, options, source, target, bivariant);
    cache.in_progress.remove(&key);
    cache.results.insert(key, result);
    result
}

fn relate_uncached(
    table: &mut TypeTable,
    cache: &mut RelationCache,
    options: &CompilerOptions,
    source: TypeId,
    target: TypeId,
    bivariant: bool,
) -> bool {
    let source_kind = table.kind(source).clone();
    let target_kind = table.kind(target).clone();

    // Top/bottom edges.
    if matches!(source_kind, TypeKind::Any) || matches!(target_kind, TypeKind::Any) {
        return true;
    }
    if matches!(target_kind, TypeKind::Unknown) {
        return true;
    }
    if matches!(source_kind, TypeKind::Never) {
        return true;
    }

    // null/undefined policy.
    if matches!(source_kind, TypeKind::Null | TypeKind::Undefined) {
        if !options.strict_null_checks {
            return !matches!(target_kind, TypeKind::Never);
        }
        // Strict: only exact or union membership (handled below).
        if source_kind == target_kind {
            return true;
        }
        if matches!(source_kind, TypeKind::Undefined) && matches!(target_kind, TypeKind::Void) {
            return true;
        }
    }

    // Literal widening.
    match (&source_kind, &target_kind) {
        (TypeKind::NumberLit(_), TypeKind::Number)
        | (TypeKind::StringLit(_), TypeKind::String)
        | (TypeKind::BoolLit(_), TypeKind::Boolean) => return true,
        (TypeKind::Enum(_), TypeKind::Number) => return true,
        _ => {}
    }

    // Union source: every member must fit the target.
    if let TypeKind::Union(members) = &source_kind {
        let members = members.clone();
        return members
            .into_iter()
            .all(|m| relate(table, cache, options, m, target, bivariant));
    }
    // Union target: some member must accept the source.
    if let TypeKind::Union(members) = &target_kind {
        let members = members.clone();
        return members
            .into_iter()
            .any(|m| relate(table, cache, options, source, m, bivariant));
    }
    // Intersection target: every member must accept the source.
    if let TypeKind::Intersection(members) = &target_kind {
        let members = members.clone();
        return members
            .into_iter()
            .all(|m| relate(table, cache, options, source, m, bivariant));
    }
    // Intersection source: any member may satisfy the target.
    if let TypeKind::Intersection(members) = &source_kind {
        let members = members.clone();
        return members
            .into_iter()
            .any(|m| relate(table, cache, options, m, target, bivariant));
    }

    match (&source_kind, &target_kind) {
        // Covariant wrappers (the explicit special cases).
        (TypeKind::Array(s), TypeKind::Array(t)) => {
            relate(table, cache, options, *s, *t, bivariant)
        }
        (TypeKind::Promise(s), TypeKind::Promise(t)) => {
            relate(table, cache, options, *s, *t, bivariant)
        }
        (TypeKind::Generator(s), TypeKind::Generator(t)) => {
            relate(table, cache, options, *s, *t, bivariant)
        }

        (
            TypeKind::Tuple {
                elements: s_elems,
                required: s_required,
                rest: s_rest,
            },
            TypeKind::Tuple {
                elements: t_elems,
                required: t_required,
                rest: t_rest,
            },
        ) => {
            if s_elems.len() < *t_required {
                return false;
            }
            if s_elems.len() > t_elems.len() && t_rest.is_none() {
                return false;
            }
            for (i, &s_elem) in s_elems.iter().enumerate() {
                let t_elem = match t_elems.get(i) {
                    Some(&t) => t,
                    None => match t_rest {
                        Some(t) => *t,
                        None => return false,
                    },
                };
                if !relate(table, cache, options, s_elem, t_elem, bivariant) {
                    return false;
                }
            }
            let _ = (s_required, s_rest);
            true
        }

        // Tuples flow into arrays element-wise.
        (TypeKind::Tuple { elements, rest, .. }, TypeKind::Array(t_elem)) => {
            let t_elem = *t_elem;
            let mut all = elements.clone();
            if let Some(rest) = rest {
                all.push(*rest);
            }
            all.into_iter()
                .all(|e| relate(table, cache, options, e, t_elem, bivariant))
        }

        (TypeKind::Function(s_fn), TypeKind::Function(t_fn)) => {
            relate_functions(table, cache, options, s_fn, t_fn, bivariant)
        }

        // Nominal class instances: identity or ancestry, then the
        // structural fallback below.
        (TypeKind::Instance(s_def, s_args), TypeKind::Instance(t_def, t_args)) => {
            if s_def == t_def {
                // Invariant in type arguments by default.
                return s_args == t_args;
            }
            // Walk the superclass chain.
            let class = table.class_def(*s_def).clone();
            let subst = build_subst(&class.type_params, s_args);
            if let Some(superclass) = class.superclass {
                let superclass = substitute(table, superclass, &subst);
                if relate(table, cache, options, superclass, target, bivariant) {
                    return true;
                }
            }
            false
        }

        (TypeKind::Class(s_def), TypeKind::Class(t_def)) => s_def == t_def,

        (TypeKind::Param(s_param), _) => {
            // A type parameter is assignable where its constraint is.
            if let Some(constraint) = table.type_param_def(*s_param).constraint {
                relate(table, cache, options, constraint, target, bivariant)
            } else {
                false
            }
        }

        _ => {
            // Structural record/interface compatibility, including a
            // class instance satisfying an interface or record shape.
            if is_shape_like(&target_kind) && is_shape_source(&source_kind) {
                return relate_shape(table, cache, options, source, target, bivariant);
            }
            false
        }
    }
}

fn is_shape_like(kind: &TypeKind) -> bool {
    matches!(kind, TypeKind::Record(_) | TypeKind::Interface(..))
}

fn is_shape_source(kind: &TypeKind) -> bool {
    matches!(
        kind,
        TypeKind::Record(_) | TypeKind::Interface(..) | TypeKind::Instance(..)
    )
}

/// Every required member of the target must exist on the source with a
/// compatible type; extra source members are ignored here (excess
/// property checks on fresh literals are a separate, syntactic pass).
fn relate_shape(
    table: &mut TypeTable,
    cache: &mut RelationCache,
    options: &CompilerOptions,
    source: TypeId,
    target: TypeId,
    bivariant: bool,
) -> bool {
    let members = shape_members(table, target);
    for (name, t_prop) in members {
        match member_type(table, source, &name) {
            Some(s_prop) => {
                let compatible = if is_method_like(table, t_prop.ty) {
                    // Method positions may use the bivariance flag.
                    relate(
                        table,
                        cache,
                        options,
                        s_prop.ty,
                        t_prop.ty,
                        options.method_bivariance,
                    )
                } else {
                    relate(table, cache, options, s_prop.ty, t_prop.ty, bivariant)
                };
                if !compatible {
                    return false;
                }
                if s_prop.optional && !t_prop.optional {
                    return false;
                }
            }
            None => {
                if !t_prop.optional {
                    return false;
                }
            }
        }
    }
    // Index signatures on the target constrain all source members.
    if let Some(t_index) = crate::operations::string_index_type(table, target) {
        for (_, s_prop) in shape_members(table, source) {
            if !relate(table, cache, options, s_prop.ty, t_index, bivariant) {
                return false;
            }
        }
    }
    true
}

fn is_method_like(table: &TypeTable, ty: TypeId) -> bool {
    matches!(table.kind(ty), TypeKind::Function(_))
}

/// Full member set of a shape type (inherited members included).
pub fn shape_members(table: &mut TypeTable, ty: TypeId) -> Vec<(String, PropInfo)> {
    let names = crate::operations::literal_keys(table, ty);
    let mut members = Vec::new();
    for name in names {
        if let Some(prop) = member_type(table, ty, &name) {
            members.push((name, prop));
        }
    }
    members
}

/// Function compatibility: contravariant parameters (bivariant when the
/// flag is set for method positions), covariant return, and the source
/// must not require more arguments than the target supplies.
fn relate_functions(
    table: &mut TypeTable,
    cache: &mut RelationCache,
    options: &CompilerOptions,
    source: &FunctionType,
    target: &FunctionType,
    bivariant: bool,
) -> bool {
    // Arity: callers satisfy the target's shape, so the source must be
    // callable with what the target's callers pass.
    if source.min_args > target.params.len() && target.rest.is_none() {
        return false;
    }

    let pair_count = source.params.len().min(target.params.len());
    for i in 0..pair_count {
        let s_param = source.params[i].ty;
        let t_param = target.params[i].ty;
        let contra = relate(table, cache, options, t_param, s_param, bivariant);
        let compatible = if bivariant {
            contra || relate(table, cache, options, s_param, t_param, bivariant)
        } else {
            contra
        };
        if !compatible {
            return false;
        }
    }
    // Source params beyond the target's arity must accept the target's
    // rest element, if any.
    if let Some(t_rest) = target.rest {
        for param in source.params.iter().skip(pair_count) {
            if !relate(table, cache, options, t_rest, param.ty, bivariant)
                && !bivariant
            {
                return false;
            }
        }
    }

    // Covariant return; `void` targets accept anything.
    if matches!(table.kind(target.return_ty), TypeKind::Void) {
        return true;
    }
    relate(table, cache, options, source.return_ty, target.return_ty, bivariant)
}

#[cfg(test)]
#[path = "tests/relate_tests.rs"]
mod tests;
