//! Control-flow narrowing: guard recognition and type refinement.
//!
//! The checker recognizes `typeof x === "kind"` (and `!==`), `x ===
//! null` / `x !== null` / `undefined` comparisons, truthiness guards,
//! `instanceof`, the `in` operator, and user-defined `x is T`
//! predicates. Entering a branch applies (or negates) the guard's effect
//! on the referenced binding; narrowings merge back by union at joins,
//! which falls out of the overlays being branch-local.

use tsr_parser::ast::{Arena, BinaryOp, ExprId, ExprKind, UnaryOp};

use crate::types::{ClassDefId, TypeId, TypeKind, TypeTable};

/// A recognized guard over a single binding.
#[derive(Clone, Debug)]
pub enum Guard {
    /// `typeof x === "kind"`
    Typeof { name: String, kind: String },
    /// `x === null` (and `== null`, which also covers undefined)
    Null { name: String, loose: bool },
    /// `x === undefined`
    Undefined { name: String, loose: bool },
    /// `if (x)`
    Truthy { name: String },
    /// `x instanceof C`
    InstanceOf { name: String, class: ClassDefId },
    /// `"key" in x`
    In { name: String, key: String },
    /// A call to a `x is T` predicate.
    Predicate { name: String, ty: TypeId },
}

/// A guard with its polarity.
#[derive(Clone, Debug)]
pub struct GuardInfo {
    pub guard: Guard,
    pub negated: bool,
}

impl GuardInfo {
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

/// Extract a guard from a condition expression, if one is recognized.
///
/// `lookup_predicate` resolves a callee expression to a predicate
/// `(param_name, narrowed_type)` when its type is a predicate function;
/// `lookup_class` resolves an identifier to a class definition.
pub fn extract_guard(
    arena: &Arena,
    cond: ExprId,
    lookup_predicate: &dyn Fn(ExprId) -> Option<(String, TypeId)>,
    lookup_class: &dyn Fn(&str) -> Option<ClassDefId>,
) -> Option<GuardInfo> {
    match &arena.expr(cond).kind {
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => {
            let inner = extract_guard(arena, *operand, lookup_predicate, lookup_class)?;
            Some(inner.negate())
        }
        ExprKind::Ident(name) => Some(GuardInfo {
            guard: Guard::Truthy {
                name: name.to_string(),
            },
            negated: false,
        }),
        ExprKind::Binary { op, left, right } => {
            let (equality, negated, loose) = match op {
                BinaryOp::StrictEq => (true, false, false),
                BinaryOp::StrictNe => (true, true, false),
                BinaryOp::LooseEq => (true, false, true),
                BinaryOp::LooseNe => (true, true, true),
                BinaryOp::In => {
                    if let (ExprKind::StringLit(key), ExprKind::Ident(name)) =
                        (&arena.expr(*left).kind, &arena.expr(*right).kind)
                    {
                        return Some(GuardInfo {
                            guard: Guard::In {
                                name: name.to_string(),
                                key: key.to_string(),
                            },
                            negated: false,
                        });
                    }
                    return None;
                }
                BinaryOp::InstanceOf => {
                    if let (ExprKind::Ident(name), ExprKind::Ident(class_name)) =
                        (&arena.expr(*left).kind, &arena.expr(*right).kind)
                        && let Some(class) = lookup_class(class_name)
                    {
                        return Some(GuardInfo {
                            guard: Guard::InstanceOf {
                                name: name.to_string(),
                                class,
                            },
                            negated: false,
                        });
                    }
                    return None;
                }
                _ => return None,
            };
            if !equality {
                return None;
            }
            // typeof x === "kind" (either operand order).
            for (a, b) in [(*left, *right), (*right, *left)] {
                if let ExprKind::Unary {
                    op: UnaryOp::Typeof,
                    operand,
                } = &arena.expr(a).kind
                    && let ExprKind::Ident(name) = &arena.expr(*operand).kind
                    && let ExprKind::StringLit(kind) = &arena.expr(b).kind
                {
                    return Some(GuardInfo {
                        guard: Guard::Typeof {
                            name: name.to_string(),
                            kind: kind.to_string(),
                        },
                        negated,
                    });
                }
                if let ExprKind::Ident(name) = &arena.expr(a).kind {
                    match &arena.expr(b).kind {
                        ExprKind::NullLit => {
                            return Some(GuardInfo {
                                guard: Guard::Null {
                                    name: name.to_string(),
                                    loose,
                                },
                                negated,
                            });
                        }
                        ExprKind::UndefinedLit => {
                            return Some(GuardInfo {
                                guard: Guard::Undefined {
                                    name: name.to_string(),
                                    loose,
                                },
                                negated,
                            });
                        }
                        _ => {}
                    }
                }
            }
            None
        }
        ExprKind::Call { callee, args, .. } => {
            // User-defined type predicate: `isFish(pet)`.
            let (param_name, narrowed) = lookup_predicate(*callee)?;
            let _ = param_name;
            let first = args.first()?;
            if let ExprKind::Ident(name) = &arena.expr(*first).kind {
                return Some(GuardInfo {
                    guard: Guard::Predicate {
                        name: name.to_string(),
                        ty: narrowed,
                    },
                    negated: false,
                });
            }
            None
        }
        _ => None,
    }
}

/// The binding a guard refines.
pub fn guard_target(guard: &Guard) -> &str {
    match guard {
        Guard::Typeof { name, .. }
        | Guard::Null { name, .. }
        | Guard::Undefined { name, .. }
        | Guard::Truthy { name }
        | Guard::InstanceOf { name, .. }
        | Guard::In { name, .. }
        | Guard::Predicate { name, .. } => name,
    }
}

/// Apply a guard to the binding's current type.
pub fn narrow_type(
    table: &mut TypeTable,
    current: TypeId,
    guard: &Guard,
    negated: bool,
) -> TypeId {
    match guard {
        Guard::Typeof { kind, .. } => {
            filter_union(table, current, |table, member| {
                let matches = matches_typeof(table, member, kind);
                if negated { !matches } else { matches }
            })
        }
        Guard::Null { loose, .. } => {
            narrow_nullish(table, current, negated, true, *loose)
        }
        Guard::Undefined { loose, .. } => {
            narrow_nullish(table, current, negated, false, *loose)
        }
        Guard::Truthy { .. } => filter_union(table, current, |table, member| {
            let falsy = matches!(
                table.kind(member),
                TypeKind::Null | TypeKind::Undefined | TypeKind::Void
            ) || matches!(table.kind(member), TypeKind::BoolLit(false));
            if negated { falsy } else { !falsy }
        }),
        Guard::InstanceOf { class, .. } => {
            let narrowed = filter_union(table, current, |table, member| {
                let is_instance = is_instance_of(table, member, *class);
                if negated { !is_instance } else { is_instance }
            });
            if !negated && matches!(table.kind(narrowed), TypeKind::Never | TypeKind::Any | TypeKind::Unknown)
            {
                // Narrowing an opaque type pins it to the class instance.
                return table.intern(TypeKind::Instance(*class, Vec::new()));
            }
            narrowed
        }
        Guard::In { key, .. } => filter_union(table, current, |table, member| {
            let has = crate::operations::member_type(table, member, key).is_some();
            if negated { !has } else { has }
        }),
        Guard::Predicate { ty, .. } => {
            if negated {
                let ty = *ty;
                filter_union(table, current, |_, member| member != ty)
            } else {
                *ty
            }
        }
    }
}

fn narrow_nullish(
    table: &mut TypeTable,
    current: TypeId,
    negated: bool,
    null_side: bool,
    loose: bool,
) -> TypeId {
    if !negated {
        // Positive comparison pins the value.
        if loose {
            let null = table.null();
            let undefined = table.undefined();
            return table.union(vec![null, undefined]);
        }
        return if null_side {
            table.null()
        } else {
            table.undefined()
        };
    }
    filter_union(table, current, |table, member| {
        let is_null = matches!(table.kind(member), TypeKind::Null);
        let is_undefined = matches!(table.kind(member), TypeKind::Undefined);
        if loose {
            !is_null && !is_undefined
        } else if null_side {
            !is_null
        } else {
            !is_undefined
        }
    })
}

/// Keep the union members satisfying the predicate; a non-union type is
/// treated as a single-member union.
fn filter_union(
    table: &mut TypeTable,
    current: TypeId,
    mut keep: impl FnMut(&mut TypeTable, TypeId) -> bool,
) -> TypeId {
    let members = match table.kind(current).clone() {
        TypeKind::Union(members) => members,
        TypeKind::Any | TypeKind::Unknown => return current,
        _ => vec![current],
    };
    let kept: Vec<TypeId> = members
        .into_iter()
        .filter(|&m| keep(table, m))
        .collect();
    table.union(kept)
}

fn matches_typeof(table: &TypeTable, member: TypeId, kind: &str) -> bool {
    match table.kind(member) {
        TypeKind::Number | TypeKind::NumberLit(_) | TypeKind::Enum(_) => kind == "number",
        TypeKind::String | TypeKind::StringLit(_) => kind == "string",
        TypeKind::Boolean | TypeKind::BoolLit(_) => kind == "boolean",
        TypeKind::Undefined | TypeKind::Void => kind == "undefined",
        TypeKind::Function(_) | TypeKind::Class(_) => kind == "function",
        TypeKind::Symbol => kind == "symbol",
        TypeKind::Null => kind == "object",
        TypeKind::Record(_)
        | TypeKind::Interface(..)
        | TypeKind::Instance(..)
        | TypeKind::Array(_)
        | TypeKind::Tuple { .. }
        | TypeKind::Promise(_)
        | TypeKind::Generator(_) => kind == "object",
        _ => false,
    }
}

fn is_instance_of(table: &TypeTable, member: TypeId, class: ClassDefId) -> bool {
    match table.kind(member) {
        TypeKind::Instance(def, _) => {
            let mut current = Some(*def);
            while let Some(def) = current {
                if def == class {
                    return true;
                }
                current = table
                    .class_def(def)
                    .superclass
                    .and_then(|s| match table.kind(s) {
                        TypeKind::Instance(parent, _) => Some(*parent),
                        _ => None,
                    });
            }
            false
        }
        _ => false,
    }
}

#[cfg(test)]
#[path = "tests/narrowing_tests.rs"]
mod tests;
