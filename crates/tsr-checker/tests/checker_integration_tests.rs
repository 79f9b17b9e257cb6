use tsr_checker::check_program;
use tsr_common::diagnostics::codes;
use tsr_common::{CompilerOptions, DiagnosticSink};
use tsr_resolver::{MapProvider, resolve_graph};

fn check(source: &str) -> Vec<tsr_common::Diagnostic> {
    let mut provider = MapProvider::new();
    provider.add("main", source);
    let sink = DiagnosticSink::new();
    let graph = resolve_graph("main", &provider, &sink);
    check_program(&graph, &CompilerOptions::default(), &sink);
    sink.take()
}

fn check_ok(source: &str) {
    let diagnostics = check(source);
    assert!(
        diagnostics.is_empty(),
        "expected clean check, got: {diagnostics:?}"
    );
}

fn assert_has_code(source: &str, code: u32) {
    let diagnostics = check(source);
    assert!(
        diagnostics.iter().any(|d| d.code == code),
        "expected TSR{code}, got: {diagnostics:?}"
    );
}

#[test]
fn literal_widening_in_let_but_not_const() {
    check_ok("let a = 1; a = 2;");
    check_ok("const b = 1; let c: number = b;");
}

#[test]
fn assignment_type_mismatch_is_reported() {
    assert_has_code("let x: number = \"hi\";", codes::TYPE_NOT_ASSIGNABLE);
    assert_has_code("let x: string = 1;", codes::TYPE_NOT_ASSIGNABLE);
    check_ok("let x: number | string = \"hi\";");
}

#[test]
fn assignment_to_const_is_reported() {
    assert_has_code("const x = 1; x = 2;", codes::ASSIGNMENT_TO_CONST);
}

#[test]
fn unknown_names_are_reported_once_and_checking_continues() {
    let diagnostics = check("let a = missing1; let b = missing2;");
    assert_eq!(
        diagnostics
            .iter()
            .filter(|d| d.code == codes::UNKNOWN_NAME)
            .count(),
        2
    );
}

#[test]
fn fresh_object_literal_excess_property_fires_at_annotation_site() {
    assert_has_code(
        "let p: { a: number } = { a: 1, b: 2 };",
        codes::EXCESS_PROPERTY,
    );
}

#[test]
fn aliased_object_passes_the_structural_path() {
    // The same value through a non-annotated local is no longer fresh.
    check_ok(
        "const tmp = { a: 1, b: 2 };\n\
         let p: { a: number } = tmp;",
    );
}

#[test]
fn excess_property_checks_apply_to_arguments_too() {
    assert_has_code(
        "function f(p: { a: number }) {}\nf({ a: 1, b: 2 });",
        codes::EXCESS_PROPERTY,
    );
}

#[test]
fn generic_identity_infers_and_checks() {
    check_ok(
        "function id<T>(x: T): T { return x; }\n\
         let a: number = id(7);\n\
         let b: string = id(\"s\");",
    );
    assert_has_code(
        "function id<T>(x: T): T { return x; }\n\
         let a: string = id(7);",
        codes::TYPE_NOT_ASSIGNABLE,
    );
}

#[test]
fn generic_constraint_violation_is_reported() {
    assert_has_code(
        "function len<T extends { length: number }>(x: T): number { return x.length; }\n\
         len(5);",
        codes::CONSTRAINT_VIOLATION,
    );
}

#[test]
fn typeof_narrowing_selects_branch_types() {
    check_ok(
        "function f(x: string | number) {\n\
         if (typeof x === \"string\") { let n: number = x.length; }\n\
         else { let m: number = x + 1; }\n\
         }",
    );
}

#[test]
fn null_narrowing_with_strict_null_checks() {
    assert_has_code(
        "function f(x: string | null) { let n: number = x.length; }",
        codes::POSSIBLY_NULL_OR_UNDEFINED,
    );
    check_ok(
        "function f(x: string | null) {\n\
         if (x !== null) { let n: number = x.length; }\n\
         }",
    );
}

#[test]
fn abstract_member_in_concrete_class_is_reported() {
    assert_has_code(
        "class C { abstract m(): number; }",
        codes::ABSTRACT_MEMBER_IN_CONCRETE_CLASS,
    );
    check_ok("abstract class C { abstract m(): number; }");
}

#[test]
fn abstract_class_is_not_instantiable() {
    assert_has_code(
        "abstract class C { abstract m(): number; }\nnew C();",
        codes::ABSTRACT_CLASS_INSTANTIATED,
    );
}

#[test]
fn classes_and_inheritance_check() {
    check_ok(
        "class A { constructor(public x: number) {} m(): number { return this.x; } }\n\
         class B extends A { m(): number { return super.m() + 1; } }\n\
         let b: A = new B(2);\n\
         let n: number = b.m();",
    );
}

#[test]
fn class_implements_is_checked_structurally() {
    check_ok(
        "interface Named { name: string; }\n\
         class Person implements Named { name: string = \"p\"; }",
    );
    assert_has_code(
        "interface Named { name: string; }\n\
         class Anon implements Named { }",
        codes::INTERFACE_NOT_IMPLEMENTED,
    );
}

#[test]
fn interface_merging_is_additive() {
    check_ok(
        "interface Box { width: number; }\n\
         interface Box { height: number; }\n\
         const b: Box = { width: 1, height: 2 };",
    );
}

#[test]
fn mapped_type_partial_makes_members_optional() {
    check_ok(
        "type P<T> = { [K in keyof T]?: T[K] };\n\
         const x: P<{ a: number; b: string }> = { a: 1 };\n\
         console.log(x.a);",
    );
    assert_has_code(
        "type P<T> = { [K in keyof T]?: T[K] };\n\
         const x: P<{ a: number }> = { a: \"wrong\" };",
        codes::TYPE_NOT_ASSIGNABLE,
    );
}

#[test]
fn indexed_access_types_resolve_member_types() {
    check_ok(
        "type Point = { x: number; y: number };\n\
         let n: Point[\"x\"] = 3;",
    );
}

#[test]
fn keyof_annotation_accepts_only_known_keys() {
    check_ok(
        "type Point = { x: number; y: number };\n\
         let k: keyof Point = \"x\";",
    );
    assert_has_code(
        "type Point = { x: number; y: number };\n\
         let k: keyof Point = \"z\";",
        codes::TYPE_NOT_ASSIGNABLE,
    );
}

#[test]
fn readonly_members_reject_writes() {
    assert_has_code(
        "class C { readonly x: number = 1; m() { this.x = 2; } }",
        codes::ASSIGNMENT_TO_READONLY,
    );
}

#[test]
fn call_arity_is_checked() {
    assert_has_code(
        "function f(a: number, b: number) {}\nf(1);",
        codes::ARGUMENT_COUNT_MISMATCH,
    );
    check_ok("function f(a: number, b?: number) {}\nf(1);");
    check_ok("function f(a: number, ...rest: number[]) {}\nf(1, 2, 3, 4);");
}

#[test]
fn async_functions_wrap_returns_in_promises() {
    check_ok(
        "async function f(): Promise<number> { return 10; }\n\
         async function g(): Promise<number> { return await f() + 1; }",
    );
}

#[test]
fn generator_yield_types_infer() {
    check_ok(
        "function* g() { yield 1; yield 2; }\n\
         for (let v of g()) { let n: number = v; }",
    );
}

#[test]
fn cross_module_imports_carry_types() {
    let mut provider = MapProvider::new();
    provider
        .add("lib", "export function double(x: number): number { return x * 2; }")
        .add(
            "main",
            "import { double } from \"./lib\";\nlet n: number = double(4);\nlet s: string = double(4);",
        );
    let sink = DiagnosticSink::new();
    let graph = resolve_graph("main", &provider, &sink);
    check_program(&graph, &CompilerOptions::default(), &sink);
    let diagnostics = sink.take();
    assert_eq!(
        diagnostics
            .iter()
            .filter(|d| d.code == codes::TYPE_NOT_ASSIGNABLE)
            .count(),
        1,
        "only the string annotation should fail: {diagnostics:?}"
    );
}

#[test]
fn user_defined_type_predicates_narrow() {
    check_ok(
        "function isString(x: string | number): x is string { return typeof x === \"string\"; }\n\
         function f(x: string | number) {\n\
         if (isString(x)) { let n: number = x.length; }\n\
         }",
    );
}

#[test]
fn same_name_classes_in_distinct_modules_are_distinct() {
    let mut provider = MapProvider::new();
    provider
        .add("a", "export class C { x: number = 1; }")
        .add("b", "export class C { x: number = 1; }")
        .add(
            "main",
            "import { C as CA } from \"./a\";\nimport { C as CB } from \"./b\";\n\
             let x: CA = new CB();",
        );
    let sink = DiagnosticSink::new();
    let graph = resolve_graph("main", &provider, &sink);
    check_program(&graph, &CompilerOptions::default(), &sink);
    let diagnostics = sink.take();
    assert!(
        diagnostics
            .iter()
            .any(|d| d.code == codes::TYPE_NOT_ASSIGNABLE),
        "nominally distinct classes must not be interchangeable: {diagnostics:?}"
    );
}
