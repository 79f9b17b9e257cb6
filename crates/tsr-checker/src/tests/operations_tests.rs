use crate::operations::{
    expand_mapped, indexed_access, keyof, string_intrinsic, substitute, Substitution,
};
use crate::types::{
    MappedType, PropInfo, RecordType, StringIntrinsicKind, TypeKind, TypeParamDef, TypeTable,
};

fn record(table: &mut TypeTable, props: &[(&str, crate::types::TypeId, bool)]) -> crate::types::TypeId {
    let props = props
        .iter()
        .map(|(name, ty, optional)| {
            (
                (*name).into(),
                PropInfo {
                    ty: *ty,
                    optional: *optional,
                    readonly: false,
                },
            )
        })
        .collect();
    table.intern(TypeKind::Record(RecordType {
        props,
        string_index: None,
        number_index: None,
    }))
}

#[test]
fn keyof_record_is_union_of_literal_keys() {
    let mut table = TypeTable::new();
    let number = table.number();
    let string = table.string();
    let rec = record(&mut table, &[("a", number, false), ("b", string, false)]);
    let keys = keyof(&mut table, rec);
    let a = table.string_lit("a");
    let b = table.string_lit("b");
    let expected = table.union(vec![a, b]);
    assert_eq!(keys, expected);
}

#[test]
fn keyof_union_intersects_keys() {
    let mut table = TypeTable::new();
    let number = table.number();
    let a = record(&mut table, &[("x", number, false), ("y", number, false)]);
    let b = record(&mut table, &[("y", number, false), ("z", number, false)]);
    let union = table.union(vec![a, b]);
    let keys = keyof(&mut table, union);
    let y = table.string_lit("y");
    assert_eq!(keys, y);
}

#[test]
fn keyof_intersection_unions_keys() {
    let mut table = TypeTable::new();
    let number = table.number();
    let a = record(&mut table, &[("x", number, false)]);
    let b = record(&mut table, &[("z", number, false)]);
    let inter = table.intersection(vec![a, b]);
    let keys = keyof(&mut table, inter);
    let x = table.string_lit("x");
    let z = table.string_lit("z");
    let expected = table.union(vec![x, z]);
    assert_eq!(keys, expected);
}

#[test]
fn indexed_access_resolves_literal_and_union_keys() {
    let mut table = TypeTable::new();
    let number = table.number();
    let string = table.string();
    let rec = record(&mut table, &[("a", number, false), ("b", string, false)]);
    let a_key = table.string_lit("a");
    assert_eq!(indexed_access(&mut table, rec, a_key), number);

    let b_key = table.string_lit("b");
    let both = table.union(vec![a_key, b_key]);
    let result = indexed_access(&mut table, rec, both);
    let expected = table.union(vec![number, string]);
    assert_eq!(result, expected);
}

#[test]
fn mapped_type_adds_optionality_and_is_idempotent() {
    let mut table = TypeTable::new();
    let number = table.number();
    let string = table.string();
    let src = record(&mut table, &[("a", number, false), ("b", string, false)]);

    let k = table.add_type_param(TypeParamDef {
        name: "K".into(),
        constraint: None,
        default: None,
    });
    let constraint = table.intern(TypeKind::Keyof(src));
    let k_ty = table.intern(TypeKind::Param(k));
    let value = table.intern(TypeKind::IndexedAccess(src, k_ty));
    let mapped = MappedType {
        param: k,
        constraint,
        value,
        optional: Some(true),
        as_clause: None,
    };

    let once = expand_mapped(&mut table, &mapped);
    let twice = expand_mapped(&mut table, &mapped);
    assert_eq!(once, twice, "expansion must be idempotent");

    let TypeKind::Record(result) = table.kind(once).clone() else {
        panic!("expected record, got {}", table.display(once));
    };
    assert_eq!(result.props.len(), 2);
    assert!(result.props.iter().all(|(_, p)| p.optional));
    assert_eq!(result.prop("a").unwrap().ty, number);
    assert_eq!(result.prop("b").unwrap().ty, string);
}

#[test]
fn mapped_type_key_remapping_renames_and_drops() {
    let mut table = TypeTable::new();
    let number = table.number();
    let src = record(&mut table, &[("get", number, false)]);

    let k = table.add_type_param(TypeParamDef {
        name: "K".into(),
        constraint: None,
        default: None,
    });
    let constraint = table.intern(TypeKind::Keyof(src));
    let k_ty = table.intern(TypeKind::Param(k));
    let as_clause = table.intern(TypeKind::StringIntrinsic(
        StringIntrinsicKind::Uppercase,
        k_ty,
    ));
    let mapped = MappedType {
        param: k,
        constraint,
        value: number,
        optional: None,
        as_clause: Some(as_clause),
    };
    let expanded = expand_mapped(&mut table, &mapped);
    let TypeKind::Record(result) = table.kind(expanded).clone() else {
        panic!("expected record");
    };
    assert!(result.prop("GET").is_some());
    assert!(result.prop("get").is_none());
}

#[test]
fn string_intrinsics_reduce_literals() {
    let mut table = TypeTable::new();
    let lit = table.string_lit("hello");
    let upper = string_intrinsic(&mut table, StringIntrinsicKind::Uppercase, lit);
    assert_eq!(upper, table.string_lit("HELLO"));
    let cap = string_intrinsic(&mut table, StringIntrinsicKind::Capitalize, lit);
    assert_eq!(cap, table.string_lit("Hello"));
}

#[test]
fn substitution_resolves_deferred_keyof() {
    let mut table = TypeTable::new();
    let t = table.add_type_param(TypeParamDef {
        name: "T".into(),
        constraint: None,
        default: None,
    });
    let t_ty = table.intern(TypeKind::Param(t));
    let deferred = keyof(&mut table, t_ty);
    assert!(matches!(table.kind(deferred), TypeKind::Keyof(_)));

    let number = table.number();
    let rec = record(&mut table, &[("a", number, false)]);
    let mut subst = Substitution::default();
    subst.insert(t, rec);
    let resolved = substitute(&mut table, deferred, &subst);
    assert_eq!(resolved, table.string_lit("a"));
}
