use crate::infer::infer_type_arguments;
use crate::types::{FunctionType, ParamInfo, TypeKind, TypeParamDef, TypeTable};

fn identity_fn(table: &mut TypeTable) -> (FunctionType, crate::types::TypeParamId) {
    let t = table.add_type_param(TypeParamDef {
        name: "T".into(),
        constraint: None,
        default: None,
    });
    let t_ty = table.intern(TypeKind::Param(t));
    (
        FunctionType {
            type_params: vec![t],
            params: vec![ParamInfo {
                name: "x".into(),
                ty: t_ty,
                optional: false,
            }],
            rest: None,
            return_ty: t_ty,
            min_args: 1,
            predicate: None,
        },
        t,
    )
}

#[test]
fn identity_infers_widened_argument_type() {
    let mut table = TypeTable::new();
    let (func, _) = identity_fn(&mut table);
    let seven = table.number_lit(7.0);
    let solved = infer_type_arguments(&mut table, &func, &[seven]);
    assert_eq!(solved, vec![table.number()]);

    let s = table.string_lit("s");
    let solved = infer_type_arguments(&mut table, &func, &[s]);
    assert_eq!(solved, vec![table.string()]);
}

#[test]
fn multiple_observations_join_as_union() {
    let mut table = TypeTable::new();
    let t = table.add_type_param(TypeParamDef {
        name: "T".into(),
        constraint: None,
        default: None,
    });
    let t_ty = table.intern(TypeKind::Param(t));
    let func = FunctionType {
        type_params: vec![t],
        params: vec![
            ParamInfo {
                name: "a".into(),
                ty: t_ty,
                optional: false,
            },
            ParamInfo {
                name: "b".into(),
                ty: t_ty,
                optional: false,
            },
        ],
        rest: None,
        return_ty: t_ty,
        min_args: 2,
        predicate: None,
    };
    let number = table.number();
    let string = table.string();
    let solved = infer_type_arguments(&mut table, &func, &[number, string]);
    let expected = table.union(vec![number, string]);
    assert_eq!(solved, vec![expected]);
}

#[test]
fn array_positions_infer_their_element() {
    let mut table = TypeTable::new();
    let t = table.add_type_param(TypeParamDef {
        name: "T".into(),
        constraint: None,
        default: None,
    });
    let t_ty = table.intern(TypeKind::Param(t));
    let t_array = table.array(t_ty);
    let func = FunctionType {
        type_params: vec![t],
        params: vec![ParamInfo {
            name: "xs".into(),
            ty: t_array,
            optional: false,
        }],
        rest: None,
        return_ty: t_ty,
        min_args: 1,
        predicate: None,
    };
    let number = table.number();
    let num_array = table.array(number);
    let solved = infer_type_arguments(&mut table, &func, &[num_array]);
    assert_eq!(solved, vec![number]);
}

#[test]
fn unobserved_parameter_defaults_to_constraint_then_any() {
    let mut table = TypeTable::new();
    let number = table.number();
    let t = table.add_type_param(TypeParamDef {
        name: "T".into(),
        constraint: Some(number),
        default: None,
    });
    let func = FunctionType {
        type_params: vec![t],
        params: Vec::new(),
        rest: None,
        return_ty: number,
        min_args: 0,
        predicate: None,
    };
    let solved = infer_type_arguments(&mut table, &func, &[]);
    assert_eq!(solved, vec![number]);
}
