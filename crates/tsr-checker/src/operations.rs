//! Type-level operations: substitution, `keyof`, mapped-type expansion,
//! indexed access, string intrinsics, and member lookup.
//!
//! Deferred forms (`Keyof`, `Mapped`, `IndexedAccess`, `StringIntrinsic`)
//! stay symbolic while they mention unresolved type parameters;
//! substitution re-evaluates them once operands become concrete. Mapped
//! expansion is cached under (template, substitution) by interning: the
//! expansion rebuilds the same record, so expanding twice yields the
//! same `TypeId`.

use rustc_hash::FxHashMap;

use crate::types::{
    FunctionType, MappedType, ParamInfo, PropInfo, RecordType, StringIntrinsicKind, TypeId,
    TypeKind, TypeParamId, TypeTable,
};

/// A substitution from type parameters to concrete types.
pub type Substitution = FxHashMap<TypeParamId, TypeId>;

/// Apply a substitution, re-evaluating deferred forms whose operands
/// become concrete.
pub fn substitute(table: &mut TypeTable, ty: TypeId, subst: &Substitution) -> TypeId {
    if subst.is_empty() || !table.mentions_params(ty) {
        return ty;
    }
    match table.kind(ty).clone() {
        TypeKind::Param(p) => subst.get(&p).copied().unwrap_or(ty),
        TypeKind::Array(t) => {
            let t = substitute(table, t, subst);
            table.array(t)
        }
        TypeKind::Promise(t) => {
            let t = substitute(table, t, subst);
            table.promise(t)
        }
        TypeKind::Generator(t) => {
            let t = substitute(table, t, subst);
            table.generator(t)
        }
        TypeKind::Tuple {
            elements,
            required,
            rest,
        } => {
            let elements = elements
                .into_iter()
                .map(|t| substitute(table, t, subst))
                .collect();
            let rest = rest.map(|t| substitute(table, t, subst));
            table.intern(TypeKind::Tuple {
                elements,
                required,
                rest,
            })
        }
        TypeKind::Union(members) => {
            let members = members
                .into_iter()
                .map(|t| substitute(table, t, subst))
                .collect();
            table.union(members)
        }
        TypeKind::Intersection(members) => {
            let members = members
                .into_iter()
                .map(|t| substitute(table, t, subst))
                .collect();
            table.intersection(members)
        }
        TypeKind::Record(record) => {
            let props = record
                .props
                .into_iter()
                .map(|(name, p)| {
                    let ty = substitute(table, p.ty, subst);
                    (name, PropInfo { ty, ..p })
                })
                .collect();
            let string_index = record.string_index.map(|t| substitute(table, t, subst));
            let number_index = record.number_index.map(|t| substitute(table, t, subst));
            table.intern(TypeKind::Record(RecordType {
                props,
                string_index,
                number_index,
            }))
        }
        TypeKind::Function(f) => {
            let params = f
                .params
                .into_iter()
                .map(|p| ParamInfo {
                    ty: substitute(table, p.ty, subst),
                    ..p
                })
                .collect();
            let rest = f.rest.map(|t| substitute(table, t, subst));
            let return_ty = substitute(table, f.return_ty, subst);
            let predicate = f
                .predicate
                .map(|(name, t)| (name, substitute(table, t, subst)));
            table.intern(TypeKind::Function(FunctionType {
                type_params: f.type_params,
                params,
                rest,
                return_ty,
                min_args: f.min_args,
                predicate,
            }))
        }
        TypeKind::Interface(def, args) => {
            let args = args
                .into_iter()
                .map(|t| substitute(table, t, subst))
                .collect();
            table.intern(TypeKind::Interface(def, args))
        }
        TypeKind::Instance(def, args) => {
            let args = args
                .into_iter()
                .map(|t| substitute(table, t, subst))
                .collect();
            table.intern(TypeKind::Instance(def, args))
        }
        TypeKind::Keyof(t) => {
            let t = substitute(table, t, subst);
            keyof(table, t)
        }
        TypeKind::IndexedAccess(obj, index) => {
            let obj = substitute(table, obj, subst);
            let index = substitute(table, index, subst);
            indexed_access(table, obj, index)
        }
        TypeKind::Mapped(m) => {
            let constraint = substitute(table, m.constraint, subst);
            // The mapped type's own parameter is bound by the template,
            // not by the incoming substitution.
            let value_subst: Substitution = subst
                .iter()
                .filter(|(p, _)| **p != m.param)
                .map(|(p, t)| (*p, *t))
                .collect();
            let value = substitute(table, m.value, &value_subst);
            let as_clause = m.as_clause.map(|t| substitute(table, t, &value_subst));
            expand_mapped(
                table,
                &MappedType {
                    param: m.param,
                    constraint,
                    value,
                    optional: m.optional,
                    as_clause,
                },
            )
        }
        TypeKind::StringIntrinsic(kind, t) => {
            let t = substitute(table, t, subst);
            string_intrinsic(table, kind, t)
        }
        _ => ty,
    }
}

// =============================================================================
// keyof
// =============================================================================

/// Compute `keyof T`.
///
/// Unions intersect their key sets; intersections union them; `any`
/// yields `string | number | symbol`; unresolved operands defer.
pub fn keyof(table: &mut TypeTable, ty: TypeId) -> TypeId {
    if table.mentions_params(ty) {
        return table.intern(TypeKind::Keyof(ty));
    }
    match table.kind(ty).clone() {
        TypeKind::Any => {
            let s = table.string();
            let n = table.number();
            let sym = table.symbol();
            table.union(vec![s, n, sym])
        }
        TypeKind::Union(members) => {
            // Intersection of member key sets.
            let mut key_sets: Vec<Vec<String>> = Vec::new();
            for member in members {
                key_sets.push(literal_keys(table, member));
            }
            let Some((first, rest)) = key_sets.split_first() else {
                return table.never();
            };
            let common: Vec<String> = first
                .iter()
                .filter(|k| rest.iter().all(|set| set.contains(k)))
                .cloned()
                .collect();
            let lits: Vec<TypeId> = common.iter().map(|k| table.string_lit(k)).collect();
            table.union(lits)
        }
        TypeKind::Intersection(members) => {
            let mut keys: Vec<TypeId> = Vec::new();
            for member in members {
                keys.push(keyof(table, member));
            }
            table.union(keys)
        }
        TypeKind::Record(record) => {
            let mut keys: Vec<TypeId> = record
                .props
                .iter()
                .map(|(name, _)| name.clone())
                .collect::<Vec<_>>()
                .into_iter()
                .map(|name| table.string_lit(&name))
                .collect();
            if record.string_index.is_some() {
                keys.push(table.string());
            }
            if record.number_index.is_some() {
                keys.push(table.number());
            }
            table.union(keys)
        }
        TypeKind::Array(_) => table.number(),
        TypeKind::Tuple { elements, .. } => {
            let lits: Vec<TypeId> = (0..elements.len())
                .map(|i| table.number_lit(i as f64))
                .collect();
            table.union(lits)
        }
        TypeKind::Interface(..) | TypeKind::Instance(..) => {
            let names = literal_keys(table, ty);
            let lits: Vec<TypeId> = names.iter().map(|k| table.string_lit(k)).collect();
            table.union(lits)
        }
        _ => table.never(),
    }
}

/// Declared member names of a structured type, in declaration order.
pub fn literal_keys(table: &mut TypeTable, ty: TypeId) -> Vec<String> {
    match table.kind(ty).clone() {
        TypeKind::Record(record) => record.props.iter().map(|(n, _)| n.to_string()).collect(),
        TypeKind::Interface(def, args) => {
            let mut keys = Vec::new();
            let extends = table.interface_def(def).extends.clone();
            for parent in extends {
                for key in literal_keys(table, parent) {
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
            let _ = args;
            for name in table.interface_def(def).props.keys() {
                if !keys.contains(name) {
                    keys.push(name.clone());
                }
            }
            keys
        }
        TypeKind::Instance(def, _) => {
            let mut keys = Vec::new();
            let mut current = Some(def);
            while let Some(class_id) = current {
                let class = table.class_def(class_id);
                for name in class
                    .instance_props
                    .keys()
                    .chain(class.instance_methods.keys())
                    .chain(class.getters.keys())
                {
                    if !keys.contains(name) {
                        keys.push(name.clone());
                    }
                }
                current = class.superclass.and_then(|s| match table.kind(s) {
                    TypeKind::Instance(parent, _) => Some(*parent),
                    _ => None,
                });
            }
            keys
        }
        TypeKind::Union(_) | TypeKind::Intersection(_) => {
            let key_ty = keyof(table, ty);
            union_string_literals(table, key_ty).unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

/// The string-literal members of a key type, if it is entirely literal.
pub fn union_string_literals(table: &TypeTable, ty: TypeId) -> Option<Vec<String>> {
    match table.kind(ty) {
        TypeKind::StringLit(s) => Some(vec![s.to_string()]),
        TypeKind::Never => Some(Vec::new()),
        TypeKind::Union(members) => {
            let mut keys = Vec::new();
            for &member in members {
                match table.kind(member) {
                    TypeKind::StringLit(s) => keys.push(s.to_string()),
                    _ => return None,
                }
            }
            Some(keys)
        }
        _ => None,
    }
}

// =============================================================================
// Indexed access
// =============================================================================

/// Compute `T[K]`.
pub fn indexed_access(table: &mut TypeTable, obj: TypeId, index: TypeId) -> TypeId {
    if table.mentions_params(obj) || table.mentions_params(index) {
        return table.intern(TypeKind::IndexedAccess(obj, index));
    }
    match table.kind(index).clone() {
        TypeKind::Union(members) => {
            let parts: Vec<TypeId> = members
                .into_iter()
                .map(|m| indexed_access(table, obj, m))
                .collect();
            return table.union(parts);
        }
        TypeKind::StringLit(name) => {
            if let Some(prop) = member_type(table, obj, &name) {
                return if prop.optional {
                    let undef = table.undefined();
                    table.union(vec![prop.ty, undef])
                } else {
                    prop.ty
                };
            }
            return table.undefined();
        }
        TypeKind::NumberLit(bits) => {
            let idx = f64::from_bits(bits);
            match table.kind(obj).clone() {
                TypeKind::Tuple { elements, .. } => {
                    let i = idx as usize;
                    return elements.get(i).copied().unwrap_or_else(|| table.undefined());
                }
                TypeKind::Array(element) => return element,
                _ => {}
            }
            if let Some(t) = number_index_type(table, obj) {
                return t;
            }
            return table.undefined();
        }
        TypeKind::String => {
            if let Some(t) = string_index_type(table, obj) {
                return t;
            }
            return table.any();
        }
        TypeKind::Number => {
            if let Some(t) = number_index_type(table, obj) {
                return t;
            }
            if let TypeKind::Array(element) = table.kind(obj) {
                return *element;
            }
            return table.any();
        }
        _ => {}
    }
    table.any()
}

pub fn string_index_type(table: &TypeTable, obj: TypeId) -> Option<TypeId> {
    match table.kind(obj) {
        TypeKind::Record(record) => record.string_index,
        TypeKind::Interface(def, _) => table.interface_def(*def).string_index,
        _ => None,
    }
}

pub fn number_index_type(table: &TypeTable, obj: TypeId) -> Option<TypeId> {
    match table.kind(obj) {
        TypeKind::Record(record) => record.number_index,
        TypeKind::Interface(def, _) => table.interface_def(*def).number_index,
        TypeKind::Array(element) => Some(*element),
        _ => None,
    }
}

// =============================================================================
// Mapped types
// =============================================================================

/// Expand a mapped type when its key set is concrete; defer otherwise.
///
/// Keys iterate the evaluated constraint. For each literal key the value
/// type is substituted with `K := "key"`; the `as` clause (with `K`
/// bound) renames the key, or drops it entirely when it reduces to
/// `never`. Optionality: `+?` adds, `-?` strips, and a homomorphic
/// source (`[K in keyof T]`) carries the source property's optionality
/// through unmodified templates.
pub fn expand_mapped(table: &mut TypeTable, mapped: &MappedType) -> TypeId {
    // Homomorphic source, for optionality transfer.
    let source = match table.kind(mapped.constraint) {
        TypeKind::Keyof(src) => Some(*src),
        _ => None,
    };
    if table.mentions_params(mapped.constraint) {
        return table.intern(TypeKind::Mapped(mapped.clone()));
    }
    let key_ty = match source {
        Some(src) => keyof(table, src),
        None => mapped.constraint,
    };
    if table.mentions_params(key_ty) {
        return table.intern(TypeKind::Mapped(mapped.clone()));
    }
    let Some(keys) = union_string_literals(table, key_ty) else {
        // Non-literal key sets (e.g. `[K in string]`) become an index
        // signature.
        let mut subst = Substitution::default();
        subst.insert(mapped.param, key_ty);
        let value = substitute(table, mapped.value, &subst);
        return table.intern(TypeKind::Record(RecordType {
            props: Vec::new(),
            string_index: Some(value),
            number_index: None,
        }));
    };

    let mut props: Vec<(Box<str>, PropInfo)> = Vec::new();
    for key in keys {
        let key_lit = table.string_lit(&key);
        let mut subst = Substitution::default();
        subst.insert(mapped.param, key_lit);

        // Key remapping.
        let final_key = match mapped.as_clause {
            Some(as_clause) => {
                let remapped = substitute(table, as_clause, &subst);
                match table.kind(remapped).clone() {
                    TypeKind::Never => continue,
                    TypeKind::StringLit(s) => s.to_string(),
                    _ => key.clone(),
                }
            }
            None => key.clone(),
        };

        let value = substitute(table, mapped.value, &subst);
        let source_optional = source
            .and_then(|src| member_type(table, src, &key))
            .map(|p| p.optional)
            .unwrap_or(false);
        let optional = match mapped.optional {
            Some(true) => true,
            Some(false) => false,
            None => source_optional,
        };
        props.push((
            final_key.into(),
            PropInfo {
                ty: value,
                optional,
                readonly: false,
            },
        ));
    }
    table.intern(TypeKind::Record(RecordType {
        props,
        string_index: None,
        number_index: None,
    }))
}

// =============================================================================
// String intrinsics
// =============================================================================

/// Evaluate `Uppercase<S>` and friends over literal operands.
pub fn string_intrinsic(table: &mut TypeTable, kind: StringIntrinsicKind, ty: TypeId) -> TypeId {
    match table.kind(ty).clone() {
        TypeKind::StringLit(s) => {
            let out = apply_string_intrinsic(kind, &s);
            table.string_lit(&out)
        }
        TypeKind::Union(members) => {
            let parts: Vec<TypeId> = members
                .into_iter()
                .map(|m| string_intrinsic(table, kind, m))
                .collect();
            table.union(parts)
        }
        TypeKind::String => table.string(),
        _ => table.intern(TypeKind::StringIntrinsic(kind, ty)),
    }
}

fn apply_string_intrinsic(kind: StringIntrinsicKind, s: &str) -> String {
    match kind {
        StringIntrinsicKind::Uppercase => s.to_uppercase(),
        StringIntrinsicKind::Lowercase => s.to_lowercase(),
        StringIntrinsicKind::Capitalize => capitalize(s, true),
        StringIntrinsicKind::Uncapitalize => capitalize(s, false),
    }
}

fn capitalize(s: &str, upper: bool) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let first: String = if upper {
                first.to_uppercase().collect()
            } else {
                first.to_lowercase().collect()
            };
            first + chars.as_str()
        }
        None => String::new(),
    }
}

// =============================================================================
// Member lookup
// =============================================================================

/// Look up a named member on a type, walking class/interface heritage
/// and substituting generic arguments.
pub fn member_type(table: &mut TypeTable, ty: TypeId, name: &str) -> Option<PropInfo> {
    match table.kind(ty).clone() {
        TypeKind::Record(record) => record.prop(name).cloned().or_else(|| {
            record.string_index.map(|t| PropInfo {
                ty: t,
                optional: false,
                readonly: false,
            })
        }),
        TypeKind::Interface(def, args) => {
            let idef = table.interface_def(def).clone();
            let subst = build_subst(&idef.type_params, &args);
            if let Some(prop) = idef.props.get(name) {
                let ty = substitute(table, prop.ty, &subst);
                return Some(PropInfo { ty, ..prop.clone() });
            }
            for parent in idef.extends {
                let parent = substitute(table, parent, &subst);
                if let Some(found) = member_type(table, parent, name) {
                    return Some(found);
                }
            }
            None
        }
        TypeKind::Instance(def, args) => {
            let class = table.class_def(def).clone();
            let subst = build_subst(&class.type_params, &args);
            if let Some(prop) = class.instance_props.get(name) {
                let ty = substitute(table, prop.ty, &subst);
                return Some(PropInfo { ty, ..prop.clone() });
            }
            if let Some(&method) = class.instance_methods.get(name) {
                let ty = substitute(table, method, &subst);
                return Some(PropInfo {
                    ty,
                    optional: false,
                    readonly: true,
                });
            }
            if let Some(&getter) = class.getters.get(name) {
                let ty = substitute(table, getter, &subst);
                let readonly = !class.setters.contains_key(name);
                return Some(PropInfo {
                    ty,
                    optional: false,
                    readonly,
                });
            }
            if let Some(superclass) = class.superclass {
                let superclass = substitute(table, superclass, &subst);
                return member_type(table, superclass, name);
            }
            None
        }
        TypeKind::Class(def) => {
            let class = table.class_def(def).clone();
            if let Some(prop) = class.static_props.get(name) {
                return Some(prop.clone());
            }
            if let Some(&method) = class.static_methods.get(name) {
                return Some(PropInfo {
                    ty: method,
                    optional: false,
                    readonly: true,
                });
            }
            None
        }
        TypeKind::Enum(def) => {
            let edef = table.enum_def(def);
            edef.members.get(name).map(|&ty| PropInfo {
                ty,
                optional: false,
                readonly: true,
            })
        }
        TypeKind::Intersection(members) => {
            for member in members {
                if let Some(found) = member_type(table, member, name) {
                    return Some(found);
                }
            }
            None
        }
        // A type parameter exposes its constraint's members.
        TypeKind::Param(p) => {
            let constraint = table.type_param_def(p).constraint?;
            member_type(table, constraint, name)
        }
        TypeKind::Union(members) => {
            // A member exists on a union when it exists on every arm.
            let mut tys = Vec::new();
            let mut optional = false;
            for member in members {
                let found = member_type(table, member, name)?;
                optional |= found.optional;
                tys.push(found.ty);
            }
            let ty = table.union(tys);
            Some(PropInfo {
                ty,
                optional,
                readonly: false,
            })
        }
        _ => None,
    }
}

/// Build a parameter substitution from a definition's parameter list and
/// concrete arguments; missing arguments default to the constraint or
/// `any`.
pub fn build_subst(params: &[TypeParamId], args: &[TypeId]) -> Substitution {
    let mut subst = Substitution::default();
    for (i, &param) in params.iter().enumerate() {
        if let Some(&arg) = args.get(i) {
            subst.insert(param, arg);
        }
    }
    subst
}

#[cfg(test)]
#[path = "tests/operations_tests.rs"]
mod tests;
