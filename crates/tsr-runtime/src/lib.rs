//! Shared runtime for both execution strategies.
//!
//! The tree-walking interpreter and the bytecode VM observe identical
//! semantics by sharing everything here:
//! - the tagged `Value` model (numbers as doubles, insertion-ordered
//!   objects, callable records with executor-specific payloads)
//! - dynamic operator helpers (`==`/`===`, `+` dispatch, truthiness,
//!   `typeof`, relational comparison, iteration)
//! - the three-state promise cell and the paired microtask/macrotask
//!   queues with the documented drain order
//! - host module tables (console, fs, path, crypto, timers, ...)
//!
//! Executor-specific callables (interpreter closures, VM method
//! handles) ride along as opaque `Rc<dyn Any>` payloads; the runtime
//! never calls user code directly, it enqueues jobs that the executor
//! drains.

pub mod value;
pub use value::{
    ClassValue, FunctionPayload, FunctionValue, HostHandle, InstanceValue, NativeFn, ObjectValue,
    Value,
};

pub mod ops;

pub mod promise;
pub use promise::{PromiseCell, PromiseState};

pub mod queue;
pub use queue::{Job, JobRunner, TaskQueue, run_event_loop};

pub mod ctx;
pub use ctx::RuntimeCtx;

pub mod fmt;

pub mod host;
