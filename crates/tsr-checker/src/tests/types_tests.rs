use crate::types::{TypeKind, TypeTable};

#[test]
fn interning_gives_stable_ids() {
    let mut table = TypeTable::new();
    let a = table.number();
    let b = table.number();
    assert_eq!(a, b);
    let s1 = table.string_lit("x");
    let s2 = table.string_lit("x");
    let s3 = table.string_lit("y");
    assert_eq!(s1, s2);
    assert_ne!(s1, s3);
}

#[test]
fn unions_flatten_and_deduplicate() {
    let mut table = TypeTable::new();
    let number = table.number();
    let string = table.string();
    let inner = table.union(vec![number, string]);
    let boolean = table.boolean();
    let outer = table.union(vec![inner, boolean, number]);
    let TypeKind::Union(members) = table.kind(outer) else {
        panic!("expected union");
    };
    assert_eq!(members.len(), 3);
    // Same members in any order intern to the same id.
    let again = table.union(vec![boolean, string, number]);
    assert_eq!(outer, again);
}

#[test]
fn union_drops_never_and_collapses_singletons() {
    let mut table = TypeTable::new();
    let number = table.number();
    let never = table.never();
    assert_eq!(table.union(vec![number, never]), number);
    assert_eq!(table.union(vec![never, never]), never);
}

#[test]
fn any_absorbs_unions() {
    let mut table = TypeTable::new();
    let number = table.number();
    let any = table.any();
    assert_eq!(table.union(vec![number, any]), any);
}

#[test]
fn promise_never_nests() {
    let mut table = TypeTable::new();
    let number = table.number();
    let p = table.promise(number);
    let pp = table.promise(p);
    let ppp = table.promise(pp);
    assert_eq!(p, pp);
    assert_eq!(p, ppp);
    assert!(matches!(table.kind(p), TypeKind::Promise(inner) if *inner == number));
}

#[test]
fn widening_maps_literals_to_primitives() {
    let mut table = TypeTable::new();
    let lit = table.string_lit("hi");
    let string = table.string();
    assert_eq!(table.widen(lit), string);

    let one = table.number_lit(1.0);
    let two = table.number_lit(2.0);
    let union = table.union(vec![one, two]);
    let number = table.number();
    assert_eq!(table.widen(union), number);
}

#[test]
fn display_is_readable() {
    let mut table = TypeTable::new();
    let number = table.number();
    let string = table.string();
    let union = table.union(vec![number, string]);
    let arr = table.array(union);
    assert_eq!(table.display(arr), "(number | string)[]");
}
