//! End-to-end scenarios: fixed inputs with expected stdout, each run
//! under both execution strategies.

use tsr::{provider_of, run_compiled, run_interpreted};
use tsr_common::CompilerOptions;

fn run_both(source: &str, expected: &str) {
    let options = CompilerOptions::default();
    let provider = provider_of(&[("main", source)]);

    let interpreted = run_interpreted("main", &provider, &options);
    assert!(
        interpreted.succeeded(),
        "interpreter diagnostics: {:?}",
        interpreted.diagnostics
    );
    assert_eq!(interpreted.stdout, expected, "interpreter stdout");

    let compiled = run_compiled("main", &provider, &options);
    assert!(
        compiled.succeeded(),
        "vm diagnostics: {:?}",
        compiled.diagnostics
    );
    assert_eq!(compiled.stdout, expected, "vm stdout");
}

#[test]
fn scenario_classes_and_inheritance() {
    run_both(
        "class A { constructor(public x: number) {} m() { return this.x; } }\n\
         class B extends A { m() { return super.m() + 1; } }\n\
         console.log(new B(2).m());",
        "3\n",
    );
}

#[test]
fn scenario_generics_and_inference() {
    run_both(
        "function id<T>(x: T): T { return x; }\n\
         console.log(id(7));\n\
         console.log(id(\"s\"));",
        "7\ns\n",
    );
}

#[test]
fn scenario_async_await() {
    run_both(
        "async function f() { return 10; }\n\
         async function g() { return await f() + 1; }\n\
         g().then(v => console.log(v));",
        "11\n",
    );
}

#[test]
fn scenario_generator() {
    run_both(
        "function* g() { yield 1; yield 2; yield 3; }\n\
         for (let v of g()) console.log(v);",
        "1\n2\n3\n",
    );
}

#[test]
fn scenario_mapped_type() {
    run_both(
        "type P<T> = { [K in keyof T]?: T[K] };\n\
         const x: P<{ a: number; b: string }> = { a: 1 };\n\
         console.log(x.a);",
        "1\n",
    );
}

#[test]
fn scenario_typeof_narrowing() {
    run_both(
        "function f(x: string | number) {\n\
         if (typeof x === \"string\") console.log(x.length);\n\
         else console.log(x + 1);\n\
         }\n\
         f(\"hi\");\n\
         f(10);",
        "2\n11\n",
    );
}

#[test]
fn uncaught_exception_produces_a_diagnostic_and_nonzero_exit() {
    let options = CompilerOptions::default();
    let provider = provider_of(&[("main", "throw \"kaboom\";")]);
    let outcome = run_interpreted("main", &provider, &options);
    assert_eq!(outcome.exit_code, 1);
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.code == tsr::codes::UNCAUGHT_EXCEPTION));
}

#[test]
fn unhandled_rejection_produces_a_diagnostic() {
    let options = CompilerOptions::default();
    let provider = provider_of(&[(
        "main",
        "async function f() { throw \"nope\"; }\nf();",
    )]);
    let outcome = run_interpreted("main", &provider, &options);
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.code == tsr::codes::UNHANDLED_REJECTION));
}

#[test]
fn type_errors_are_reported_but_execution_still_runs() {
    let options = CompilerOptions::default();
    let provider = provider_of(&[(
        "main",
        "let n: number = \"oops\";\nconsole.log(\"ran\");",
    )]);
    let outcome = run_interpreted("main", &provider, &options);
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.code == tsr::codes::TYPE_NOT_ASSIGNABLE));
    assert_eq!(outcome.stdout, "ran\n");
}

#[test]
fn bytecode_module_has_a_stable_debug_dump() {
    let provider = provider_of(&[("main", "function f(x: number) { return x + 1; }\nconsole.log(f(1));")]);
    let sink = tsr_common::DiagnosticSink::new();
    let module = tsr::emit("main", &provider, &sink);
    let dump = module.debug_dump();
    assert!(dump.contains("\"functions\""));
    assert!(dump.contains("\"module_inits\""));
    assert!(!module.module_inits.is_empty());
}
