use tsr_common::DiagnosticSink;
use tsr_emitter::bytecode::{FunctionKind, Instr};
use tsr_emitter::emit_program;
use tsr_resolver::{MapProvider, resolve_graph};

fn emit(source: &str) -> tsr_emitter::BytecodeModule {
    let mut provider = MapProvider::new();
    provider.add("main", source);
    let sink = DiagnosticSink::new();
    let graph = resolve_graph("main", &provider, &sink);
    assert!(!sink.has_errors(), "{:?}", sink.snapshot());
    emit_program(&graph)
}

#[test]
fn plain_functions_lower_to_single_bodies() {
    let module = emit("function f(x: number) { return x + 1; }");
    let f = module
        .functions
        .iter()
        .find(|f| f.name == "f")
        .expect("function f emitted");
    assert_eq!(f.kind, FunctionKind::Plain);
    assert_eq!(f.params, vec!["x".to_string()]);
    assert!(f.machine.is_none());
}

#[test]
fn async_functions_lower_to_wrapper_plus_state_machine() {
    let module = emit(
        "async function f() { const a = await g(); return a; }\n\
         async function g() { return 1; }",
    );
    let wrapper = module
        .functions
        .iter()
        .find(|f| f.name == "f" && f.kind == FunctionKind::AsyncWrapper)
        .expect("async wrapper emitted");
    let machine = wrapper.machine.expect("wrapper references its machine");
    let machine_class = module.class(machine);
    assert!(machine_class.is_state_machine);
    let step = module.function(machine_class.step.expect("machine step"));
    assert_eq!(step.kind, FunctionKind::Step);

    // One await → one suspension state in the dispatch table.
    let Some(Instr::StateDispatch(table)) = step.code.first() else {
        panic!("step must begin with a state dispatch");
    };
    assert_eq!(table.len(), 1);
    assert!(step
        .code
        .iter()
        .any(|i| matches!(i, Instr::AwaitSuspend { .. })));
    assert!(step.code.iter().any(|i| matches!(i, Instr::Resume)));
    assert!(step.code.iter().any(|i| matches!(i, Instr::AsyncReturn)));
}

#[test]
fn generators_lower_to_state_machines_with_yields() {
    let module = emit("function* g() { yield 1; yield 2; }");
    let wrapper = module
        .functions
        .iter()
        .find(|f| f.kind == FunctionKind::GeneratorWrapper)
        .expect("generator wrapper emitted");
    let machine = module.class(wrapper.machine.expect("machine"));
    let step = module.function(machine.step.expect("step"));
    let Some(Instr::StateDispatch(table)) = step.code.first() else {
        panic!("step must begin with a state dispatch");
    };
    assert_eq!(table.len(), 2, "two yields, two resume states");
    assert_eq!(
        step.code
            .iter()
            .filter(|i| matches!(i, Instr::YieldSuspend))
            .count(),
        2
    );
}

#[test]
fn try_catch_emits_a_handler_range() {
    let module = emit("function f() { try { g(); } catch (e) { return 1; } return 2; }\nfunction g() {}");
    let f = module
        .functions
        .iter()
        .find(|f| f.name == "f")
        .expect("function f");
    assert_eq!(f.handlers.len(), 1);
    let handler = &f.handlers[0];
    assert!(handler.try_start < handler.try_end);
    assert!(handler.catch_pc >= handler.try_end);
}

#[test]
fn classes_without_constructors_get_field_init_functions() {
    let module = emit("class C { x: number = 1; }");
    let class = module
        .classes
        .iter()
        .find(|c| c.name == "C")
        .expect("class C");
    assert!(class.ctor.is_none());
    assert!(class.field_init.is_some());
    assert_eq!(class.fields.len(), 1);
}

#[test]
fn derived_classes_reference_their_parent_definition() {
    let module = emit("class A {}\nclass B extends A { m() { return 1; } }");
    let b = module
        .classes
        .iter()
        .find(|c| c.name == "B")
        .expect("class B");
    let parent = b.parent.expect("B has a parent");
    assert_eq!(module.class(parent).name, "A");
    assert_eq!(b.methods.len(), 1);
}

#[test]
fn abstract_members_are_not_emitted() {
    let module = emit(
        "abstract class Shape { abstract area(): number; name(): string { return \"s\"; } }",
    );
    let class = module
        .classes
        .iter()
        .find(|c| c.name == "Shape")
        .expect("class Shape");
    assert!(class.is_abstract);
    assert_eq!(class.methods.len(), 1, "only the concrete method lowers");
    assert_eq!(class.methods[0].0, "name");
}

#[test]
fn module_initializers_follow_initialization_order() {
    let mut provider = MapProvider::new();
    provider
        .add("main", "import { a } from \"./lib\";\nconsole.log(a);")
        .add("lib", "export const a = 1;");
    let sink = DiagnosticSink::new();
    let graph = resolve_graph("main", &provider, &sink);
    let module = emit_program(&graph);
    assert_eq!(module.module_inits.len(), 2);
    assert_eq!(module.module_specifiers, vec!["lib", "main"]);
    // The importer reads the exporter's field directly.
    let main_init = module.function(module.module_inits[1]);
    assert!(main_init
        .code
        .iter()
        .any(|i| matches!(i, Instr::LoadExport(0, _))));
}

#[test]
fn enums_lower_through_enum_add() {
    let module = emit("enum Color { Red, Green = 5, Blue }");
    let init = module.function(module.module_inits[0]);
    assert_eq!(
        init.code
            .iter()
            .filter(|i| matches!(i, Instr::EnumAdd(_)))
            .count(),
        3
    );
}
