use tsr_common::DiagnosticSink;

use crate::{ImportTarget, MapProvider, resolve_graph, resolve_specifier};

#[test]
fn relative_specifiers_resolve_against_the_importer() {
    assert_eq!(resolve_specifier("src/app", "./util"), "src/util");
    assert_eq!(resolve_specifier("src/app", "../lib/x"), "lib/x");
    assert_eq!(resolve_specifier("app", "./a/b"), "a/b");
    assert_eq!(resolve_specifier("src/app", "fs"), "fs");
}

#[test]
fn initialization_order_is_leaves_first_post_order() {
    let mut provider = MapProvider::new();
    provider
        .add("main", "import { a } from \"./a\"; import { b } from \"./b\";")
        .add("a", "import { c } from \"./c\"; export const a = 1;")
        .add("b", "export const b = 2;")
        .add("c", "export const c = 3;");
    let sink = DiagnosticSink::new();
    let graph = resolve_graph("main", &provider, &sink);
    assert!(sink.is_empty());
    let order: Vec<&str> = graph.modules.iter().map(|m| m.specifier.as_str()).collect();
    assert_eq!(order, vec!["c", "a", "b", "main"]);
}

#[test]
fn cycles_are_tolerated_and_marked() {
    let mut provider = MapProvider::new();
    provider
        .add("main", "import { a } from \"./a\";")
        .add("a", "import { b } from \"./b\"; export const a = 1;")
        .add("b", "import { a } from \"./a\"; export const b = 2;");
    let sink = DiagnosticSink::new();
    let graph = resolve_graph("main", &provider, &sink);
    assert!(sink.is_empty());
    assert!(graph.by_specifier("a").unwrap().in_cycle);
    assert!(graph.by_specifier("b").unwrap().in_cycle);
    assert!(!graph.by_specifier("main").unwrap().in_cycle);
    // The back edge was patched to a real module id.
    let b = graph.by_specifier("b").unwrap();
    assert!(matches!(b.imports[0].target, ImportTarget::Module(_)));
}

#[test]
fn missing_module_is_reported() {
    let mut provider = MapProvider::new();
    provider.add("main", "import { x } from \"./nope\";");
    let sink = DiagnosticSink::new();
    let graph = resolve_graph("main", &provider, &sink);
    assert!(sink.has_errors());
    assert_eq!(graph.modules.len(), 1);
    assert_eq!(
        graph.by_specifier("main").unwrap().imports[0].target,
        ImportTarget::Missing
    );
}

#[test]
fn builtin_modules_resolve_without_sources() {
    let mut provider = MapProvider::new();
    provider.add("main", "import * as fs from \"fs\"; import * as path from \"path\";");
    let sink = DiagnosticSink::new();
    let graph = resolve_graph("main", &provider, &sink);
    assert!(sink.is_empty());
    let main = graph.by_specifier("main").unwrap();
    assert!(main
        .imports
        .iter()
        .all(|i| i.target == ImportTarget::Builtin));
}

#[test]
fn duplicate_default_export_is_reported() {
    let mut provider = MapProvider::new();
    provider.add("main", "export default 1; export default 2;");
    let sink = DiagnosticSink::new();
    resolve_graph("main", &provider, &sink);
    assert!(sink.has_errors());
}

#[test]
fn export_assignment_in_cycle_is_reported() {
    let mut provider = MapProvider::new();
    provider
        .add("a", "import b = require(\"./b\"); export = b;")
        .add("b", "import a = require(\"./a\"); export = a;");
    let sink = DiagnosticSink::new();
    resolve_graph("a", &provider, &sink);
    assert!(sink.has_errors());
}

#[test]
fn export_shape_collects_declaration_names() {
    let mut provider = MapProvider::new();
    provider.add(
        "main",
        "export const a = 1; export function f() {} export class C {} export { a as b };",
    );
    let sink = DiagnosticSink::new();
    let graph = resolve_graph("main", &provider, &sink);
    let shape = &graph.by_specifier("main").unwrap().exports;
    let names: Vec<&str> = shape.named.keys().map(|s| s.as_str()).collect();
    assert_eq!(names, vec!["a", "f", "C", "b"]);
    assert!(!shape.has_default);
}
