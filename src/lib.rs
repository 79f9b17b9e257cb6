//! tsr: a TypeScript-like compiler, interpreter, and bytecode VM.
//!
//! Pipeline facade over the workspace crates:
//! source → scanner → parser → module resolver → type checker →
//! either the tree-walking interpreter or the bytecode emitter + VM.
//! Diagnostics flow orthogonally through a shared sink; the two
//! execution strategies observe identical semantics and are checked
//! against each other by the parity tests in `tests/`.

use std::rc::Rc;

use tracing::debug;
use tsr_checker::{CheckResult, check_program};
use tsr_common::diagnostics::Diagnostic;
use tsr_common::{CompilerOptions, DiagnosticSink};
use tsr_emitter::{BytecodeModule, Vm, emit_program};
use tsr_interp::Interp;
use tsr_resolver::{MapProvider, ModuleGraph, SourceProvider, resolve_graph};
use tsr_runtime::RuntimeCtx;

pub use tsr_common::diagnostics::codes;

/// A fully front-ended program: resolved module graph plus the
/// checker's read-only type table.
pub struct Program {
    pub graph: Rc<ModuleGraph>,
    pub check: CheckResult,
}

/// Result of one execution.
pub struct RunOutcome {
    pub stdout: String,
    pub diagnostics: Vec<Diagnostic>,
    pub exit_code: i32,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
            && !self
                .diagnostics
                .iter()
                .any(|d| d.category == tsr_common::diagnostics::DiagnosticCategory::Error)
    }
}

/// Parse, resolve, and type-check a program.
pub fn compile(
    entry: &str,
    provider: &dyn SourceProvider,
    options: &CompilerOptions,
    sink: &DiagnosticSink,
) -> Program {
    let graph = Rc::new(resolve_graph(entry, provider, sink));
    let check = check_program(&graph, options, sink);
    debug!(modules = graph.modules.len(), "compile finished");
    Program { graph, check }
}

/// Compile and run under the tree-walking interpreter.
pub fn run_interpreted(
    entry: &str,
    provider: &dyn SourceProvider,
    options: &CompilerOptions,
) -> RunOutcome {
    let sink = DiagnosticSink::new();
    let program = compile(entry, provider, options, &sink);
    let rt = RuntimeCtx::new();
    let mut interp = Interp::new(program.graph.clone(), rt.clone(), options.clone(), sink.clone());
    interp.run();
    RunOutcome {
        stdout: rt.take_stdout(),
        diagnostics: sink.take(),
        exit_code: rt.exit_code.get(),
    }
}

/// Compile to bytecode and run under the VM loader.
pub fn run_compiled(
    entry: &str,
    provider: &dyn SourceProvider,
    options: &CompilerOptions,
) -> RunOutcome {
    let sink = DiagnosticSink::new();
    let program = compile(entry, provider, options, &sink);
    let module = Rc::new(emit_program(&program.graph));
    let rt = RuntimeCtx::new();
    let mut vm = Vm::new(module, rt.clone(), options.clone(), sink.clone());
    vm.run();
    RunOutcome {
        stdout: rt.take_stdout(),
        diagnostics: sink.take(),
        exit_code: rt.exit_code.get(),
    }
}

/// Emit the bytecode module for a program without running it.
pub fn emit(entry: &str, provider: &dyn SourceProvider, sink: &DiagnosticSink) -> BytecodeModule {
    let graph = resolve_graph(entry, provider, sink);
    emit_program(&graph)
}

/// Convenience: build a provider over inline module sources.
pub fn provider_of(modules: &[(&str, &str)]) -> MapProvider {
    let mut provider = MapProvider::new();
    for (specifier, source) in modules {
        provider.add(*specifier, *source);
    }
    provider
}
