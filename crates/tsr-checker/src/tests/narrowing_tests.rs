use crate::narrowing::{Guard, narrow_type};
use crate::types::TypeTable;

#[test]
fn typeof_string_narrows_union() {
    let mut table = TypeTable::new();
    let number = table.number();
    let string = table.string();
    let union = table.union(vec![number, string]);

    let guard = Guard::Typeof {
        name: "x".into(),
        kind: "string".into(),
    };
    assert_eq!(narrow_type(&mut table, union, &guard, false), string);
    assert_eq!(narrow_type(&mut table, union, &guard, true), number);
}

#[test]
fn null_comparison_strips_or_pins_null() {
    let mut table = TypeTable::new();
    let number = table.number();
    let null = table.null();
    let union = table.union(vec![number, null]);

    let guard = Guard::Null {
        name: "x".into(),
        loose: false,
    };
    assert_eq!(narrow_type(&mut table, union, &guard, false), null);
    assert_eq!(narrow_type(&mut table, union, &guard, true), number);
}

#[test]
fn loose_null_comparison_also_strips_undefined() {
    let mut table = TypeTable::new();
    let number = table.number();
    let null = table.null();
    let undefined = table.undefined();
    let union = table.union(vec![number, null, undefined]);

    let guard = Guard::Null {
        name: "x".into(),
        loose: true,
    };
    assert_eq!(narrow_type(&mut table, union, &guard, true), number);
}

#[test]
fn truthiness_removes_nullish_members() {
    let mut table = TypeTable::new();
    let string = table.string();
    let undefined = table.undefined();
    let union = table.union(vec![string, undefined]);

    let guard = Guard::Truthy { name: "x".into() };
    assert_eq!(narrow_type(&mut table, union, &guard, false), string);
    assert_eq!(narrow_type(&mut table, union, &guard, true), undefined);
}

#[test]
fn predicate_guard_replaces_with_narrowed_type() {
    let mut table = TypeTable::new();
    let number = table.number();
    let string = table.string();
    let union = table.union(vec![number, string]);

    let guard = Guard::Predicate {
        name: "x".into(),
        ty: string,
    };
    assert_eq!(narrow_type(&mut table, union, &guard, false), string);
    assert_eq!(narrow_type(&mut table, union, &guard, true), number);
}
