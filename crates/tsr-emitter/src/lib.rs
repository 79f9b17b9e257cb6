//! Bytecode emitter and VM loader.
//!
//! The emitter lowers the checked AST into a managed bytecode module:
//! one class per source class, a synthetic per-module class whose
//! static initializer runs the module body and populates its export
//! fields, and state-machine classes for async functions and
//! generators (an integer state, a heap frame holding locals live
//! across suspensions, and a `step(resume_value, resume_throw)` method
//! re-entered by the scheduler). Dynamic operations defer to the shared
//! `tsr-runtime` helpers, so interpreted and compiled runs of the same
//! deterministic program produce identical stdout.

pub mod bytecode;
pub use bytecode::{BytecodeModule, ClassId, Constant, FunctionId, Instr};

pub mod emit;
pub use emit::emit_program;

pub mod vm;
pub use vm::Vm;
