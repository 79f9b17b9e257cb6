use std::rc::Rc;

use tsr_common::{CompilerOptions, DiagnosticSink};
use tsr_interp::Interp;
use tsr_resolver::{MapProvider, resolve_graph};
use tsr_runtime::RuntimeCtx;

fn run(source: &str) -> String {
    run_modules(&[("main", source)])
}

fn run_modules(modules: &[(&str, &str)]) -> String {
    let mut provider = MapProvider::new();
    for (specifier, source) in modules {
        provider.add(*specifier, *source);
    }
    let sink = DiagnosticSink::new();
    let graph = Rc::new(resolve_graph(modules[0].0, &provider, &sink));
    assert!(
        !sink.has_errors(),
        "resolution failed: {:?}",
        sink.snapshot()
    );
    let rt = RuntimeCtx::new();
    let mut interp = Interp::new(graph, rt.clone(), CompilerOptions::default(), sink.clone());
    interp.run();
    assert!(
        !sink.has_errors(),
        "execution failed: {:?}\nstdout so far: {}",
        sink.snapshot(),
        rt.stdout_snapshot()
    );
    rt.take_stdout()
}

#[test]
fn classes_and_inheritance() {
    let out = run(
        "class A { constructor(public x: number) {} m() { return this.x; } }\n\
         class B extends A { m() { return super.m() + 1; } }\n\
         console.log(new B(2).m());",
    );
    assert_eq!(out, "3\n");
}

#[test]
fn generics_and_inference() {
    let out = run(
        "function id<T>(x: T): T { return x; }\n\
         console.log(id(7));\n\
         console.log(id(\"s\"));",
    );
    assert_eq!(out, "7\ns\n");
}

#[test]
fn async_await() {
    let out = run(
        "async function f() { return 10; }\n\
         async function g() { return await f() + 1; }\n\
         g().then(v => console.log(v));",
    );
    assert_eq!(out, "11\n");
}

#[test]
fn generators() {
    let out = run("function* g() { yield 1; yield 2; yield 3; }\nfor (let v of g()) console.log(v);");
    assert_eq!(out, "1\n2\n3\n");
}

#[test]
fn mapped_type_programs_execute() {
    let out = run(
        "type P<T> = { [K in keyof T]?: T[K] };\n\
         const x: P<{ a: number; b: string }> = { a: 1 };\n\
         console.log(x.a);",
    );
    assert_eq!(out, "1\n");
}

#[test]
fn typeof_narrowing_programs_execute() {
    let out = run(
        "function f(x: string | number) {\n\
         if (typeof x === \"string\") console.log(x.length);\n\
         else console.log(x + 1);\n\
         }\n\
         f(\"hi\");\n\
         f(10);",
    );
    assert_eq!(out, "2\n11\n");
}

#[test]
fn async_body_runs_synchronously_to_the_first_await() {
    let out = run(
        "async function f() { console.log(\"a\"); await Promise.resolve(0); console.log(\"c\"); }\n\
         f();\n\
         console.log(\"b\");",
    );
    assert_eq!(out, "a\nb\nc\n");
}

#[test]
fn try_catch_around_await_catches_rejection() {
    let out = run(
        "async function boom() { throw \"bang\"; }\n\
         async function main() {\n\
         try { await boom(); console.log(\"unreachable\"); }\n\
         catch (e) { console.log(\"caught\", e); }\n\
         }\n\
         main();",
    );
    assert_eq!(out, "caught bang\n");
}

#[test]
fn microtasks_drain_before_timers() {
    let out = run(
        "setTimeout(() => console.log(\"timer\"), 0);\n\
         Promise.resolve(1).then(() => console.log(\"micro\"));\n\
         console.log(\"sync\");",
    );
    assert_eq!(out, "sync\nmicro\ntimer\n");
}

#[test]
fn timers_run_in_schedule_order_and_cancellation_is_a_tombstone() {
    let out = run(
        "const a = setTimeout(() => console.log(\"a\"), 5);\n\
         setTimeout(() => console.log(\"b\"), 5);\n\
         setTimeout(() => console.log(\"c\"), 1);\n\
         clearTimeout(a);",
    );
    assert_eq!(out, "c\nb\n");
}

#[test]
fn generator_two_way_communication() {
    let out = run(
        "function* g() { const got = yield 1; console.log(\"got\", got); yield got + 1; }\n\
         const it = g();\n\
         console.log(it.next().value);\n\
         console.log(it.next(41).value);",
    );
    assert_eq!(out, "1\ngot 41\n42\n");
}

#[test]
fn yield_delegation_passes_values_through() {
    let out = run(
        "function* inner() { yield 1; yield 2; return 9; }\n\
         function* outer() { const r = yield* inner(); console.log(\"ret\", r); yield 3; }\n\
         for (const v of outer()) console.log(v);",
    );
    assert_eq!(out, "1\n2\nret 9\n3\n");
}

#[test]
fn for_in_enumerates_own_keys_in_insertion_order() {
    let out = run(
        "const o = { b: 1, a: 2 };\n\
         for (const k in o) console.log(k);",
    );
    assert_eq!(out, "b\na\n");
}

#[test]
fn finally_runs_on_all_exit_paths() {
    let out = run(
        "function f(n: number) {\n\
         try { if (n === 1) return \"ret\"; if (n === 2) throw \"boom\"; }\n\
         catch (e) { console.log(\"caught\"); }\n\
         finally { console.log(\"finally\", n); }\n\
         return \"end\";\n\
         }\n\
         console.log(f(1));\n\
         console.log(f(2));",
    );
    assert_eq!(out, "finally 1\nret\ncaught\nfinally 2\nend\n");
}

#[test]
fn labeled_break_exits_outer_loop() {
    let out = run(
        "outer: for (let i = 0; i < 3; i++) {\n\
         for (let j = 0; j < 3; j++) {\n\
         if (j === 1) continue outer;\n\
         if (i === 2) break outer;\n\
         console.log(i, j);\n\
         }\n\
         }",
    );
    assert_eq!(out, "0 0\n1 0\n");
}

#[test]
fn modules_initialize_leaves_first_with_live_bindings() {
    let out = run_modules(&[
        (
            "main",
            "import { helper } from \"./lib\";\nconsole.log(helper(4));",
        ),
        (
            "lib",
            "console.log(\"lib init\");\nexport function helper(x: number) { return x * 2; }",
        ),
    ]);
    assert_eq!(out, "lib init\n8\n");
}

#[test]
fn cyclic_modules_read_undefined_before_initialization() {
    let out = run_modules(&[
        (
            "a",
            "import { bValue } from \"./b\";\n\
             export const aValue = 1;\n\
             console.log(\"a sees\", bValue);",
        ),
        (
            "b",
            "import { aValue } from \"./a\";\n\
             console.log(\"b sees\", aValue);\n\
             export const bValue = 2;",
        ),
    ]);
    // DFS from `a` visits `b` first; `b` runs before `a` has initialized.
    assert_eq!(out, "b sees undefined\na sees 2\n");
}

#[test]
fn getters_setters_and_readonly_fields() {
    let out = run(
        "class Box {\n\
         private _w: number = 1;\n\
         get width() { return this._w; }\n\
         set width(v: number) { this._w = v; }\n\
         }\n\
         const b = new Box();\n\
         b.width = 7;\n\
         console.log(b.width);",
    );
    assert_eq!(out, "7\n");
}

#[test]
fn readonly_field_write_throws_catchably() {
    let out = run(
        "class C { readonly k: number = 1; }\n\
         const c = new C();\n\
         try { (c as any).k = 2; } catch (e) { console.log(\"rejected\"); }\n\
         console.log(c.k);",
    );
    assert_eq!(out, "rejected\n1\n");
}

#[test]
fn enums_auto_increment_with_reverse_mapping() {
    let out = run(
        "enum Color { Red, Green = 5, Blue }\n\
         console.log(Color.Red, Color.Green, Color.Blue);\n\
         console.log(Color[5]);",
    );
    assert_eq!(out, "0 5 6\nGreen\n");
}

#[test]
fn spread_in_calls_and_arrays() {
    let out = run(
        "function sum(...xs: number[]) { let t = 0; for (const x of xs) t += x; return t; }\n\
         const parts = [2, 3];\n\
         console.log(sum(1, ...parts));\n\
         const all = [0, ...parts, 4];\n\
         console.log(all.length);",
    );
    assert_eq!(out, "6\n4\n");
}

#[test]
fn promise_combinators() {
    let out = run(
        "Promise.all([Promise.resolve(1), 2, Promise.resolve(3)]).then(vs =>\n\
         console.log(vs[0], vs[1], vs[2]));",
    );
    assert_eq!(out, "1 2 3\n");
}

#[test]
fn array_methods_call_back_into_the_evaluator() {
    let out = run(
        "const xs = [1, 2, 3, 4];\n\
         const ys = xs.filter(x => x % 2 === 0).map(x => x * 10);\n\
         console.log(ys.join(\"-\"));",
    );
    assert_eq!(out, "20-40\n");
}

#[test]
fn decorators_apply_to_classes() {
    let out = run(
        "function sealed(target: any) { console.log(\"sealing\", target.name); }\n\
         @sealed\n\
         class Box {}\n\
         new Box();",
    );
    assert_eq!(out, "sealing Box\n");
}

#[test]
fn string_concatenation_chooses_string_when_either_side_is_string() {
    let out = run(
        "console.log(1 + 2);\n\
         console.log(\"a\" + 1);\n\
         console.log(1 + \"b\");\n\
         console.log(\"x\" + \"y\");",
    );
    assert_eq!(out, "3\na1\n1b\nxy\n");
}

#[test]
fn template_literals_interpolate() {
    let out = run("const n = 3; console.log(`n is ${n}, twice is ${n * 2}`);");
    assert_eq!(out, "n is 3, twice is 6\n");
}

#[test]
fn for_await_of_drives_promises() {
    let out = run(
        "async function main() {\n\
         const xs = [Promise.resolve(1), Promise.resolve(2)];\n\
         for await (const v of xs) console.log(v);\n\
         }\n\
         main();",
    );
    assert_eq!(out, "1\n2\n");
}
