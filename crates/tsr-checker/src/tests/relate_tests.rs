use tsr_common::CompilerOptions;

use crate::relate::{RelationCache, is_assignable};
use crate::types::{FunctionType, ParamInfo, PropInfo, RecordType, TypeKind, TypeTable};

struct Ctx {
    table: TypeTable,
    cache: RelationCache,
    options: CompilerOptions,
}

impl Ctx {
    fn new() -> Self {
        Ctx {
            table: TypeTable::new(),
            cache: RelationCache::new(),
            options: CompilerOptions::default(),
        }
    }

    fn check(&mut self, source: crate::types::TypeId, target: crate::types::TypeId) -> bool {
        is_assignable(&mut self.table, &mut self.cache, &self.options, source, target)
    }
}

fn record(
    table: &mut TypeTable,
    props: &[(&str, crate::types::TypeId, bool)],
) -> crate::types::TypeId {
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
fn literals_assign_to_their_widened_primitive() {
    let mut ctx = Ctx::new();
    let lit = ctx.table.number_lit(3.0);
    let number = ctx.table.number();
    assert!(ctx.check(lit, number));
    assert!(!ctx.check(number, lit));

    let s = ctx.table.string_lit("a");
    let string = ctx.table.string();
    assert!(ctx.check(s, string));
}

#[test]
fn never_goes_anywhere_and_everything_goes_to_unknown() {
    let mut ctx = Ctx::new();
    let never = ctx.table.never();
    let number = ctx.table.number();
    let unknown = ctx.table.unknown();
    assert!(ctx.check(never, number));
    assert!(ctx.check(number, unknown));
    assert!(!ctx.check(unknown, number));
}

#[test]
fn strict_null_checks_reject_null_flowing_into_number() {
    let mut ctx = Ctx::new();
    let null = ctx.table.null();
    let number = ctx.table.number();
    assert!(!ctx.check(null, number));

    ctx.options.strict_null_checks = false;
    let mut cache = RelationCache::new();
    assert!(is_assignable(
        &mut ctx.table,
        &mut cache,
        &ctx.options,
        null,
        number
    ));
}

#[test]
fn value_is_assignable_to_union_containing_it() {
    let mut ctx = Ctx::new();
    let number = ctx.table.number();
    let string = ctx.table.string();
    let union = ctx.table.union(vec![number, string]);
    assert!(ctx.check(number, union));
    assert!(!ctx.check(union, number));

    // Union to union: every member must land somewhere.
    let boolean = ctx.table.boolean();
    let wider = ctx.table.union(vec![number, string, boolean]);
    assert!(ctx.check(union, wider));
    assert!(!ctx.check(wider, union));
}

#[test]
fn arrays_are_covariant() {
    let mut ctx = Ctx::new();
    let one = ctx.table.number_lit(1.0);
    let number = ctx.table.number();
    let lit_array = ctx.table.array(one);
    let num_array = ctx.table.array(number);
    assert!(ctx.check(lit_array, num_array));
    assert!(!ctx.check(num_array, lit_array));
}

#[test]
fn records_check_structurally_and_ignore_extras() {
    let mut ctx = Ctx::new();
    let number = ctx.table.number();
    let string = ctx.table.string();
    let small = record(&mut ctx.table, &[("a", number, false)]);
    let big = record(
        &mut ctx.table,
        &[("a", number, false), ("b", string, false)],
    );
    // Extra members on the source are fine on the structural path.
    assert!(ctx.check(big, small));
    // Missing required member fails.
    assert!(!ctx.check(small, big));
    // Optional target member may be absent.
    let optional_b = record(
        &mut ctx.table,
        &[("a", number, false), ("b", string, true)],
    );
    assert!(ctx.check(small, optional_b));
}

#[test]
fn functions_are_contravariant_in_parameters_covariant_in_return() {
    let mut ctx = Ctx::new();
    let number = ctx.table.number();
    let one = ctx.table.number_lit(1.0);

    let takes_number = ctx.table.intern(TypeKind::Function(FunctionType {
        type_params: Vec::new(),
        params: vec![ParamInfo {
            name: "x".into(),
            ty: number,
            optional: false,
        }],
        rest: None,
        return_ty: number,
        min_args: 1,
        predicate: None,
    }));
    let takes_literal = ctx.table.intern(TypeKind::Function(FunctionType {
        type_params: Vec::new(),
        params: vec![ParamInfo {
            name: "x".into(),
            ty: one,
            optional: false,
        }],
        rest: None,
        return_ty: one,
        min_args: 1,
        predicate: None,
    }));
    // (x: number) => number where (x: 1) => 1: parameters accept (1 <:
    // number contravariantly) but the return fails (number is not <: 1).
    assert!(!ctx.check(takes_number, takes_literal));
    // (x: 1) => 1 where (x: number) => number: parameter contravariance
    // fails (number is not <: 1).
    assert!(!ctx.check(takes_literal, takes_number));
}

#[test]
fn source_requiring_fewer_params_is_accepted() {
    let mut ctx = Ctx::new();
    let number = ctx.table.number();
    let void = ctx.table.void();
    let nullary = ctx.table.intern(TypeKind::Function(FunctionType {
        type_params: Vec::new(),
        params: Vec::new(),
        rest: None,
        return_ty: void,
        min_args: 0,
        predicate: None,
    }));
    let unary = ctx.table.intern(TypeKind::Function(FunctionType {
        type_params: Vec::new(),
        params: vec![ParamInfo {
            name: "x".into(),
            ty: number,
            optional: false,
        }],
        rest: None,
        return_ty: void,
        min_args: 1,
        predicate: None,
    }));
    // Callbacks may ignore arguments.
    assert!(ctx.check(nullary, unary));
    assert!(!ctx.check(unary, nullary));
}

#[test]
fn void_return_target_accepts_any_source_return() {
    let mut ctx = Ctx::new();
    let number = ctx.table.number();
    let void = ctx.table.void();
    let returns_number = ctx.table.intern(TypeKind::Function(FunctionType {
        type_params: Vec::new(),
        params: Vec::new(),
        rest: None,
        return_ty: number,
        min_args: 0,
        predicate: None,
    }));
    let returns_void = ctx.table.intern(TypeKind::Function(FunctionType {
        type_params: Vec::new(),
        params: Vec::new(),
        rest: None,
        return_ty: void,
        min_args: 0,
        predicate: None,
    }));
    assert!(ctx.check(returns_number, returns_void));
}

#[test]
fn tuples_check_element_wise_with_required_count() {
    let mut ctx = Ctx::new();
    let number = ctx.table.number();
    let string = ctx.table.string();
    let pair = ctx.table.intern(TypeKind::Tuple {
        elements: vec![number, string],
        required: 2,
        rest: None,
    });
    let pair_opt = ctx.table.intern(TypeKind::Tuple {
        elements: vec![number, string],
        required: 1,
        rest: None,
    });
    let single = ctx.table.intern(TypeKind::Tuple {
        elements: vec![number],
        required: 1,
        rest: None,
    });
    assert!(ctx.check(pair, pair_opt));
    assert!(!ctx.check(single, pair));
    assert!(ctx.check(single, pair_opt));

    // Tuple into array, element-wise.
    let num_or_string = ctx.table.union(vec![number, string]);
    let arr = ctx.table.array(num_or_string);
    assert!(ctx.check(pair, arr));
}

#[test]
fn intersections_require_all_target_members() {
    let mut ctx = Ctx::new();
    let number = ctx.table.number();
    let string = ctx.table.string();
    let a = record(&mut ctx.table, &[("a", number, false)]);
    let b = record(&mut ctx.table, &[("b", string, false)]);
    let both = record(
        &mut ctx.table,
        &[("a", number, false), ("b", string, false)],
    );
    let target = ctx.table.intersection(vec![a, b]);
    assert!(ctx.check(both, target));
    let only_a = record(&mut ctx.table, &[("a", number, false)]);
    assert!(!ctx.check(only_a, target));
}
