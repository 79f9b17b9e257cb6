//! Ambient globals and host-module signature tables.
//!
//! These are data: name → type, consulted by the checker when binding
//! the outermost scope and when an import targets a built-in host
//! module. The runtime carries the matching implementations; anything
//! typed loosely here (`any`) is still dynamically dispatched there.

use crate::context::Scope;
use crate::types::{FunctionType, ParamInfo, PropInfo, RecordType, TypeId, TypeKind, TypeTable};

/// A variadic `(...args: any[]) => void` used for logging surfaces.
fn variadic_void(table: &mut TypeTable) -> TypeId {
    let any = table.any();
    let rest = table.array(any);
    let void = table.void();
    table.intern(TypeKind::Function(FunctionType {
        type_params: Vec::new(),
        params: Vec::new(),
        rest: Some(rest),
        return_ty: void,
        min_args: 0,
        predicate: None,
    }))
}

fn unary_fn(table: &mut TypeTable, param: TypeId, ret: TypeId) -> TypeId {
    table.intern(TypeKind::Function(FunctionType {
        type_params: Vec::new(),
        params: vec![ParamInfo {
            name: "value".into(),
            ty: param,
            optional: false,
        }],
        rest: None,
        return_ty: ret,
        min_args: 1,
        predicate: None,
    }))
}

fn record_of(table: &mut TypeTable, props: Vec<(&str, TypeId)>) -> TypeId {
    let props = props
        .into_iter()
        .map(|(name, ty)| {
            (
                name.into(),
                PropInfo {
                    ty,
                    optional: false,
                    readonly: true,
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

/// An opaque namespace: `{ [key: string]: any }`.
pub fn opaque_namespace(table: &mut TypeTable) -> TypeId {
    let any = table.any();
    table.intern(TypeKind::Record(RecordType {
        props: Vec::new(),
        string_index: Some(any),
        number_index: None,
    }))
}

/// Install global value bindings into the outermost scope.
pub fn install_globals(table: &mut TypeTable, scope: &mut Scope) {
    let any = table.any();
    let number = table.number();
    let string = table.string();
    let boolean = table.boolean();

    let log = variadic_void(table);
    let console = record_of(
        table,
        vec![
            ("log", log),
            ("error", log),
            ("warn", log),
            ("info", log),
            ("debug", log),
        ],
    );
    let math = {
        let unary_number = unary_fn(table, number, number);
        record_of(
            table,
            vec![
                ("floor", unary_number),
                ("ceil", unary_number),
                ("round", unary_number),
                ("trunc", unary_number),
                ("abs", unary_number),
                ("sqrt", unary_number),
                ("sign", unary_number),
                ("log", unary_number),
                ("exp", unary_number),
                ("sin", unary_number),
                ("cos", unary_number),
                ("tan", unary_number),
                ("min", any),
                ("max", any),
                ("pow", any),
                ("random", any),
                ("PI", number),
                ("E", number),
            ],
        )
    };
    let json = {
        let stringify = unary_fn(table, any, string);
        let parse = unary_fn(table, string, any);
        record_of(table, vec![("stringify", stringify), ("parse", parse)])
    };

    let globals: Vec<(&str, TypeId)> = vec![
        ("console", console),
        ("Math", math),
        ("JSON", json),
        ("parseInt", unary_fn(table, string, number)),
        ("parseFloat", unary_fn(table, string, number)),
        ("isNaN", unary_fn(table, any, boolean)),
        ("isFinite", unary_fn(table, any, boolean)),
        ("Number", unary_fn(table, any, number)),
        ("String", unary_fn(table, any, string)),
        ("Boolean", unary_fn(table, any, boolean)),
        ("NaN", number),
        ("Infinity", number),
        ("globalThis", any),
        ("Object", any),
        ("Promise", any),
        ("Error", any),
        ("Symbol", any),
        ("setTimeout", any),
        ("setInterval", any),
        ("clearTimeout", any),
        ("clearInterval", any),
        ("queueMicrotask", any),
        ("process", any),
    ];
    for (name, ty) in globals {
        scope.values.insert(
            name.to_string(),
            crate::context::Binding { ty, mutable: false },
        );
    }
}

/// The checker-visible type of a built-in host module namespace.
///
/// The member signatures are the runtime's business; the checker sees an
/// opaque, string-indexed namespace so host calls type as `any` and flow
/// onward.
pub fn host_module_type(table: &mut TypeTable, specifier: &str) -> TypeId {
    let _ = specifier;
    opaque_namespace(table)
}
