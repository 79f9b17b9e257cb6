//! Interpreter / VM parity: each fixture runs under both execution
//! strategies and must produce identical stdout byte streams.

use tsr::{provider_of, run_compiled, run_interpreted};
use tsr_common::CompilerOptions;

fn assert_parity(source: &str) -> String {
    assert_parity_modules(&[("main", source)])
}

fn assert_parity_modules(modules: &[(&str, &str)]) -> String {
    let options = CompilerOptions::default();
    let provider = provider_of(modules);
    let interpreted = run_interpreted(modules[0].0, &provider, &options);
    assert!(
        interpreted.succeeded(),
        "interpreter failed: {:?}\nstdout: {}",
        interpreted.diagnostics,
        interpreted.stdout
    );
    let compiled = run_compiled(modules[0].0, &provider, &options);
    assert!(
        compiled.succeeded(),
        "vm failed: {:?}\nstdout: {}",
        compiled.diagnostics,
        compiled.stdout
    );
    assert_eq!(
        interpreted.stdout, compiled.stdout,
        "stdout diverged between execution strategies"
    );
    interpreted.stdout
}

#[test]
fn parity_arithmetic_and_strings() {
    let out = assert_parity(
        "console.log(1 + 2 * 3);\n\
         console.log(\"a\" + 1, 2 + \"b\");\n\
         console.log(7 % 3, 2 ** 8, 16 >> 2, -1 >>> 0);\n\
         console.log(`t${1 + 1}`);",
    );
    assert_eq!(out, "7\na1 2b\n1 256 4 4294967295\nt2\n");
}

#[test]
fn parity_control_flow() {
    assert_parity(
        "for (let i = 0; i < 3; i++) { if (i === 1) continue; console.log(i); }\n\
         let n = 0;\n\
         while (n < 5) { n += 2; }\n\
         console.log(n);\n\
         do { console.log(\"once\"); } while (false);\n\
         switch (2) { case 1: console.log(\"one\"); case 2: console.log(\"two\"); case 3: console.log(\"three\"); break; default: console.log(\"other\"); }",
    );
}

#[test]
fn parity_functions_closures_defaults() {
    assert_parity(
        "function make(start: number) { let n = start; return (step = 1) => { n += step; return n; }; }\n\
         const tick = make(10);\n\
         console.log(tick());\n\
         console.log(tick(5));\n\
         function sum(...xs: number[]) { let t = 0; for (const x of xs) t += x; return t; }\n\
         console.log(sum(1, 2, 3));",
    );
}

#[test]
fn parity_classes_inheritance_super() {
    let out = assert_parity(
        "class A { constructor(public x: number) {} m() { return this.x; } }\n\
         class B extends A { m() { return super.m() + 1; } }\n\
         console.log(new B(2).m());\n\
         const a: A = new B(7);\n\
         console.log(a.m());\n\
         console.log(a instanceof A, a instanceof B);",
    );
    assert_eq!(out, "3\n8\ntrue true\n");
}

#[test]
fn parity_field_initializers_and_statics() {
    assert_parity(
        "class Counter {\n\
         count: number = 0;\n\
         static total: number = 100;\n\
         static bump() { return 1; }\n\
         tick() { this.count++; return this.count; }\n\
         }\n\
         const c = new Counter();\n\
         console.log(c.tick(), c.tick());\n\
         console.log(Counter.total, Counter.bump());",
    );
}

#[test]
fn parity_getters_setters() {
    assert_parity(
        "class Box {\n\
         private _w: number = 1;\n\
         get width() { return this._w; }\n\
         set width(v: number) { this._w = v * 2; }\n\
         }\n\
         const b = new Box();\n\
         b.width = 5;\n\
         console.log(b.width);",
    );
}

#[test]
fn parity_generics() {
    let out = assert_parity(
        "function id<T>(x: T): T { return x; }\n\
         console.log(id(7));\n\
         console.log(id(\"s\"));",
    );
    assert_eq!(out, "7\ns\n");
}

#[test]
fn parity_async_await() {
    let out = assert_parity(
        "async function f() { return 10; }\n\
         async function g() { return await f() + 1; }\n\
         g().then(v => console.log(v));",
    );
    assert_eq!(out, "11\n");
}

#[test]
fn parity_async_ordering() {
    let out = assert_parity(
        "async function f() { console.log(\"a\"); await Promise.resolve(0); console.log(\"c\"); }\n\
         f();\n\
         console.log(\"b\");",
    );
    assert_eq!(out, "a\nb\nc\n");
}

#[test]
fn parity_async_try_catch() {
    assert_parity(
        "async function boom() { throw \"bang\"; }\n\
         async function main() {\n\
         try { await boom(); } catch (e) { console.log(\"caught\", e); }\n\
         finally { console.log(\"after\"); }\n\
         }\n\
         main();",
    );
}

#[test]
fn parity_generators() {
    let out = assert_parity(
        "function* g() { yield 1; yield 2; yield 3; }\n\
         for (let v of g()) console.log(v);",
    );
    assert_eq!(out, "1\n2\n3\n");
}

#[test]
fn parity_generator_two_way() {
    assert_parity(
        "function* g() { const got = yield 1; console.log(\"got\", got); yield got * 2; }\n\
         const it = g();\n\
         console.log(it.next().value);\n\
         console.log(it.next(21).value);",
    );
}

#[test]
fn parity_yield_delegation() {
    assert_parity(
        "function* inner() { yield 1; yield 2; return 9; }\n\
         function* outer() { const r = yield* inner(); console.log(\"ret\", r); yield 3; }\n\
         for (const v of outer()) console.log(v);",
    );
}

#[test]
fn parity_spread_in_generators() {
    assert_parity(
        "function* g() { yield 1; yield 2; }\n\
         const xs = [...g(), 3];\n\
         console.log(xs.length, xs[0], xs[2]);",
    );
}

#[test]
fn parity_timers_and_microtasks() {
    let out = assert_parity(
        "setTimeout(() => console.log(\"timer\"), 0);\n\
         Promise.resolve(1).then(() => console.log(\"micro\"));\n\
         console.log(\"sync\");",
    );
    assert_eq!(out, "sync\nmicro\ntimer\n");
}

#[test]
fn parity_timer_cancellation() {
    assert_parity(
        "const a = setTimeout(() => console.log(\"a\"), 5);\n\
         setTimeout(() => console.log(\"b\"), 5);\n\
         setTimeout(() => console.log(\"c\"), 1);\n\
         clearTimeout(a);",
    );
}

#[test]
fn parity_try_finally_paths() {
    assert_parity(
        "function f(n: number) {\n\
         try { if (n === 1) return \"ret\"; if (n === 2) throw \"boom\"; }\n\
         catch (e) { console.log(\"caught\"); }\n\
         finally { console.log(\"finally\", n); }\n\
         return \"end\";\n\
         }\n\
         console.log(f(0));\n\
         console.log(f(1));\n\
         console.log(f(2));",
    );
}

#[test]
fn parity_labeled_loops() {
    assert_parity(
        "outer: for (let i = 0; i < 3; i++) {\n\
         for (let j = 0; j < 3; j++) {\n\
         if (j === 1) continue outer;\n\
         if (i === 2) break outer;\n\
         console.log(i, j);\n\
         }\n\
         }",
    );
}

#[test]
fn parity_objects_arrays_enumeration() {
    assert_parity(
        "const o = { b: 1, a: 2, c: 3 };\n\
         for (const k in o) console.log(k, o[k]);\n\
         const xs = [3, 1, 2];\n\
         console.log(xs.map(x => x * 10).join(\",\"));\n\
         console.log(Object.keys(o).join(\"-\"));\n\
         const spread = { ...o, d: 4 };\n\
         console.log(JSON.stringify(spread));",
    );
}

#[test]
fn parity_enums() {
    let out = assert_parity(
        "enum Color { Red, Green = 5, Blue }\n\
         console.log(Color.Red, Color.Green, Color.Blue);\n\
         console.log(Color[5]);",
    );
    assert_eq!(out, "0 5 6\nGreen\n");
}

#[test]
fn parity_modules_and_cycles() {
    assert_parity_modules(&[
        (
            "main",
            "import { helper, shared } from \"./lib\";\n\
             import def from \"./lib\";\n\
             console.log(helper(4), shared, def);",
        ),
        (
            "lib",
            "export const shared = \"s\";\n\
             export function helper(x: number) { return x * 2; }\n\
             export default 42;",
        ),
    ]);
    assert_parity_modules(&[
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
}

#[test]
fn parity_export_assignment_and_require() {
    assert_parity_modules(&[
        (
            "main",
            "import box = require(\"./box\");\nconsole.log(box.size);",
        ),
        ("box", "export = { size: 3 };"),
    ]);
}

#[test]
fn parity_narrowing_programs() {
    let out = assert_parity(
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
fn parity_mapped_type_programs() {
    let out = assert_parity(
        "type P<T> = { [K in keyof T]?: T[K] };\n\
         const x: P<{ a: number; b: string }> = { a: 1 };\n\
         console.log(x.a);",
    );
    assert_eq!(out, "1\n");
}

#[test]
fn parity_decorators() {
    assert_parity(
        "function tag(target: any) { console.log(\"tag\", target.name); }\n\
         @tag\n\
         class Widget {}\n\
         new Widget();",
    );
}

#[test]
fn parity_promise_combinators() {
    assert_parity(
        "Promise.all([Promise.resolve(1), 2]).then(vs => console.log(vs[0] + vs[1]));\n\
         Promise.race([Promise.resolve(\"fast\")]).then(v => console.log(v));",
    );
}

#[test]
fn parity_string_and_array_builtins() {
    assert_parity(
        "console.log(\"Hello World\".toUpperCase());\n\
         console.log(\"a,b,c\".split(\",\").length);\n\
         console.log([1, 2, 3, 4].filter(x => x % 2 === 0).join(\"+\"));\n\
         console.log(\"abcdef\".slice(1, 4));\n\
         console.log([5, 3, 1].indexOf(3));",
    );
}

#[test]
fn parity_for_await() {
    assert_parity(
        "async function main() {\n\
         const xs = [Promise.resolve(1), Promise.resolve(2)];\n\
         for await (const v of xs) console.log(v);\n\
         }\n\
         main();",
    );
}
