use tsr_common::DiagnosticSink;

use crate::ast::*;
use crate::parser::parse_module;
use crate::printer::print_module;

fn parse_ok(source: &str) -> SourceModule {
    let sink = DiagnosticSink::new();
    let module = parse_module("test", source, &sink);
    assert!(
        !sink.has_errors(),
        "unexpected diagnostics: {:?}",
        sink.snapshot()
    );
    module
}

fn roundtrips(source: &str) {
    let first = parse_ok(source);
    let printed = print_module(&first);
    let sink = DiagnosticSink::new();
    let second = parse_module("test", &printed, &sink);
    assert!(
        !sink.has_errors(),
        "printed output failed to reparse: {printed}\n{:?}",
        sink.snapshot()
    );
    let reprinted = print_module(&second);
    assert_eq!(printed, reprinted, "print/reparse/print disagreement");
}

#[test]
fn nested_generic_arguments_split_compound_greater_than() {
    let module = parse_ok("let x: Partial<Readonly<T>> = y;");
    let StmtKind::VarDecl { declarations, .. } =
        &module.arena.stmt(module.statements[0]).kind
    else {
        panic!("expected var decl");
    };
    let ty = declarations[0].ty.expect("annotation");
    let TypeNodeKind::Ref { name, type_args } = &module.arena.type_node(ty).kind else {
        panic!("expected type reference");
    };
    assert_eq!(&**name, "Partial");
    assert_eq!(type_args.len(), 1);
    let TypeNodeKind::Ref { name, .. } = &module.arena.type_node(type_args[0]).kind else {
        panic!("expected nested reference");
    };
    assert_eq!(&**name, "Readonly");
}

#[test]
fn shift_operator_survives_alongside_generics() {
    let module = parse_ok("let a: Map<string, Array<number>> = m; let b = 16 >> 2;");
    let StmtKind::VarDecl { declarations, .. } =
        &module.arena.stmt(module.statements[1]).kind
    else {
        panic!("expected var decl");
    };
    let init = declarations[0].init.expect("initializer");
    let ExprKind::Binary { op, .. } = &module.arena.expr(init).kind else {
        panic!("expected binary expression");
    };
    assert_eq!(*op, BinaryOp::Shr);
}

#[test]
fn triple_greater_than_splits_inside_type_arguments() {
    parse_ok("let x: A<B<C<D>>> = y;");
    parse_ok("let x: A<B<C>> = y; let z = a >>> b;");
}

#[test]
fn arrow_vs_parenthesized_expression() {
    let module = parse_ok("let f = (a: number, b: number) => a + b; let g = (1 + 2) * 3;");
    let StmtKind::VarDecl { declarations, .. } =
        &module.arena.stmt(module.statements[0]).kind
    else {
        panic!("expected var decl");
    };
    let init = declarations[0].init.unwrap();
    assert!(matches!(
        module.arena.expr(init).kind,
        ExprKind::Arrow(_)
    ));

    let StmtKind::VarDecl { declarations, .. } =
        &module.arena.stmt(module.statements[1]).kind
    else {
        panic!("expected var decl");
    };
    let init = declarations[0].init.unwrap();
    assert!(matches!(
        module.arena.expr(init).kind,
        ExprKind::Binary { .. }
    ));
}

#[test]
fn class_members_modifiers_and_parameter_properties() {
    let module = parse_ok(
        "abstract class Shape {\n\
         private readonly id: number = 0;\n\
         static count: number;\n\
         constructor(public x: number, protected y: number) {}\n\
         abstract area(): number;\n\
         get name(): string { return \"shape\"; }\n\
         set name(v: string) {}\n\
         [key: string]: any;\n\
         }",
    );
    let StmtKind::ClassDecl(class_id) = &module.arena.stmt(module.statements[0]).kind else {
        panic!("expected class");
    };
    let class = module.arena.class(*class_id);
    assert!(class.is_abstract);
    assert_eq!(class.members.len(), 7);

    let field = &class.members[0];
    assert!(field.modifiers.contains(Modifiers::PRIVATE));
    assert!(field.modifiers.contains(Modifiers::READONLY));

    let ClassMemberKind::Method { kind, func, .. } = &class.members[2].kind else {
        panic!("expected constructor");
    };
    assert_eq!(*kind, MethodKind::Constructor);
    let ctor = module.arena.func(*func);
    assert!(ctor.params[0].modifiers.contains(Modifiers::PUBLIC));
    assert!(ctor.params[1].modifiers.contains(Modifiers::PROTECTED));

    let abstract_method = &class.members[3];
    assert!(abstract_method.modifiers.contains(Modifiers::ABSTRACT));
    let ClassMemberKind::Method { func, .. } = &abstract_method.kind else {
        panic!("expected method");
    };
    assert!(module.arena.func(*func).body.is_none());

    assert!(matches!(
        class.members[6].kind,
        ClassMemberKind::IndexSignature { .. }
    ));
}

#[test]
fn decorators_attach_in_both_positions() {
    let module = parse_ok(
        "@sealed\n@register(\"box\")\nclass Box {\n\
         @logged m() {}\n\
         static @counted n() {}\n\
         }",
    );
    let StmtKind::ClassDecl(class_id) = &module.arena.stmt(module.statements[0]).kind else {
        panic!("expected class");
    };
    let class = module.arena.class(*class_id);
    assert_eq!(class.decorators.len(), 2);
    assert_eq!(class.members[0].decorators.len(), 1);
    assert_eq!(class.members[1].decorators.len(), 1);
    assert!(class.members[1].modifiers.contains(Modifiers::STATIC));
}

#[test]
fn import_and_export_forms() {
    let module = parse_ok(
        "import \"side\";\n\
         import d from \"a\";\n\
         import d2, { x, y as z } from \"b\";\n\
         import * as ns from \"c\";\n\
         import req = require(\"d\");\n\
         export { x, y as w };\n\
         export { p } from \"e\";\n\
         export * from \"f\";\n\
         export default 42;\n\
         export const k = 1;\n\
         export = ns;",
    );
    assert_eq!(module.statements.len(), 11);
    assert!(matches!(
        module.arena.stmt(module.statements[4]).kind,
        StmtKind::Import {
            kind: ImportKind::EqualsRequire { .. },
            ..
        }
    ));
    assert!(matches!(
        module.arena.stmt(module.statements[10]).kind,
        StmtKind::ExportAssignment(_)
    ));
}

#[test]
fn optional_default_rest_parameters() {
    let module = parse_ok("function f(a: number, b?: string, c = 3, ...rest: number[]) {}");
    let StmtKind::FunctionDecl { func, .. } = &module.arena.stmt(module.statements[0]).kind
    else {
        panic!("expected function");
    };
    let f = module.arena.func(*func);
    assert_eq!(f.params.len(), 4);
    assert!(f.params[1].optional);
    assert!(f.params[2].default.is_some());
    assert!(f.params[3].rest);
}

#[test]
fn rest_parameter_not_last_is_reported() {
    let sink = DiagnosticSink::new();
    parse_module("test", "function f(...a: number[], b: number) {}", &sink);
    assert!(sink.has_errors());
}

#[test]
fn mapped_type_with_remapping_parses() {
    let module = parse_ok(
        "type P<T> = { [K in keyof T]?: T[K] };\n\
         type R<T> = { [K in keyof T as N]: T[K] };",
    );
    let StmtKind::TypeAlias { ty, .. } = &module.arena.stmt(module.statements[0]).kind else {
        panic!("expected alias");
    };
    let TypeNodeKind::Mapped { optional, .. } = &module.arena.type_node(*ty).kind else {
        panic!("expected mapped type");
    };
    assert_eq!(*optional, Some(MappedModifier::Add));

    let StmtKind::TypeAlias { ty, .. } = &module.arena.stmt(module.statements[1]).kind else {
        panic!("expected alias");
    };
    let TypeNodeKind::Mapped { as_clause, .. } = &module.arena.type_node(*ty).kind else {
        panic!("expected mapped type");
    };
    assert!(as_clause.is_some());
}

#[test]
fn error_recovery_produces_multiple_diagnostics() {
    let sink = DiagnosticSink::new();
    let module = parse_module(
        "test",
        "let x = ;\nlet y = 1;\nlet z = @;\nlet w = 2;",
        &sink,
    );
    assert!(sink.len() >= 2);
    // Later statements still parsed.
    assert!(module.statements.len() >= 3);
}

#[test]
fn roundtrip_core_constructs() {
    roundtrips("let x: number = 1 + 2 * 3;");
    roundtrips("function id<T>(x: T): T { return x; }");
    roundtrips(
        "class A { constructor(public x: number) {} m(): number { return this.x; } }\n\
         class B extends A { m(): number { return super.m() + 1; } }",
    );
    roundtrips("async function f() { return await g() + 1; }");
    roundtrips("function* g() { yield 1; yield* inner(); }");
    roundtrips("for (let v of xs) { console.log(v); }");
    roundtrips("const o = { a: 1, b, m() { return 2; }, get p() { return 3; }, ...rest };");
    roundtrips("type P<T> = { [K in keyof T]?: T[K] };");
    roundtrips("let t: [number, string?, ...boolean[]] = q;");
    roundtrips("switch (k) { case 1: break; default: f(); }");
    roundtrips("try { f(); } catch (e) { g(e); } finally { h(); }");
    roundtrips("label: for (;;) { break label; }");
    roundtrips("let s = `a${x}b${`nested${y}`}c`;");
    roundtrips("enum Color { Red, Green = 5, Blue }");
    roundtrips("interface I { a: number; b?: string; [k: string]: any; }");
}
