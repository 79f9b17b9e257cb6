//! Tree-walking interpreter.
//!
//! Evaluation functions return `'static` boxed futures over `Rc`-shared
//! state, so `await` in interpreted code is a genuine suspension point:
//! an async call polls its body once synchronously (running to the
//! first await), then parks the body future in the task table; the
//! awaited promise's settlement enqueues a wake job that re-polls it.
//! Generators keep their body future in the generator object and step
//! it through a yield/resume channel. The scheduler and all of its
//! ordering guarantees live in `tsr-runtime`.

pub mod closure;
pub mod env;
mod eval;
mod exec;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use rustc_hash::FxHashMap;
use tracing::debug;
use tsr_common::diagnostics::{DiagnosticSink, codes};
use tsr_common::{CompilerOptions, Span};
use tsr_resolver::ModuleGraph;
use tsr_runtime::promise::{PromiseCell, Reaction};
use tsr_runtime::queue::{JobRunner, run_event_loop};
use tsr_runtime::value::FunctionValue;
use tsr_runtime::{RuntimeCtx, Value};

use crate::closure::{BoxFuture, EvalResult, Signal};
use crate::env::{Env, VarCell};

/// Shared interpreter state. Everything is `Rc` so evaluation futures
/// are `'static`.
pub struct InterpCx {
    pub graph: Rc<ModuleGraph>,
    pub rt: Rc<RuntimeCtx>,
    pub sink: DiagnosticSink,
    pub options: CompilerOptions,
    pub global: Rc<Env>,
    /// Export binding cells per module; imports alias these.
    pub export_cells: RefCell<Vec<FxHashMap<String, VarCell>>>,
    /// Parked async frames.
    tasks: RefCell<FxHashMap<u64, TaskEntry>>,
    next_task: Cell<u64>,
    current_task: Cell<u64>,
    pub depth: Cell<usize>,
    pub call_stack: RefCell<Vec<String>>,
}

struct TaskEntry {
    future: Option<BoxFuture<EvalResult>>,
    promise: Rc<PromiseCell>,
}

/// Poll a future once with a no-op waker; wake-ups are explicit jobs.
pub(crate) fn poll_once<T>(future: &mut BoxFuture<T>) -> Poll<T> {
    let mut task_cx = Context::from_waker(Waker::noop());
    future.as_mut().poll(&mut task_cx)
}

impl InterpCx {
    pub fn module_specifier(&self, module: u32) -> &str {
        &self.graph.modules[module as usize].specifier
    }

    pub fn arena(&self, module: u32) -> &tsr_parser::Arena {
        &self.graph.modules[module as usize].ast.arena
    }

    pub fn throw_string(&self, message: impl Into<String>) -> Signal {
        Signal::Throw(Value::string(message.into()))
    }

    /// Spawn an async function body: poll to the first await
    /// synchronously, park if it suspends, and hand back the promise
    /// for its eventual result.
    pub fn spawn_async(self: &Rc<Self>, mut body: BoxFuture<EvalResult>) -> Value {
        let promise = PromiseCell::new();
        let task = self.next_task.get() + 1;
        self.next_task.set(task);
        let previous = self.current_task.get();
        self.current_task.set(task);
        let poll = poll_once(&mut body);
        self.current_task.set(previous);
        match poll {
            Poll::Ready(Ok(value)) => promise.resolve(&self.rt.queue, value),
            Poll::Ready(Err(Signal::Throw(error))) => promise.reject(&self.rt.queue, error),
            Poll::Ready(Err(_)) => promise.reject(
                &self.rt.queue,
                Value::string("async function completed abnormally"),
            ),
            Poll::Pending => {
                self.tasks.borrow_mut().insert(
                    task,
                    TaskEntry {
                        future: Some(body),
                        promise: promise.clone(),
                    },
                );
            }
        }
        Value::Promise(promise)
    }

    /// Re-poll a parked task after its awaited promise settled.
    pub fn poll_task(self: &Rc<Self>, task: u64) {
        let (mut future, promise) = {
            let mut tasks = self.tasks.borrow_mut();
            let Some(entry) = tasks.get_mut(&task) else {
                return;
            };
            let Some(future) = entry.future.take() else {
                return;
            };
            (future, entry.promise.clone())
        };
        let previous = self.current_task.get();
        self.current_task.set(task);
        let poll = poll_once(&mut future);
        self.current_task.set(previous);
        match poll {
            Poll::Ready(Ok(value)) => {
                self.tasks.borrow_mut().remove(&task);
                promise.resolve(&self.rt.queue, value);
            }
            Poll::Ready(Err(Signal::Throw(error))) => {
                self.tasks.borrow_mut().remove(&task);
                promise.reject(&self.rt.queue, error);
            }
            Poll::Ready(Err(_)) => {
                self.tasks.borrow_mut().remove(&task);
                promise.reject(
                    &self.rt.queue,
                    Value::string("async function completed abnormally"),
                );
            }
            Poll::Pending => {
                if let Some(entry) = self.tasks.borrow_mut().get_mut(&task) {
                    entry.future = Some(future);
                }
            }
        }
    }

    /// Register a wake job on `promise` for the currently running task.
    /// Fired settlements re-poll the parked frame.
    pub fn register_wake(self: &Rc<Self>, promise: &Rc<PromiseCell>) {
        let task = self.current_task.get();
        let cx = self.clone();
        let wake = Value::Function(FunctionValue::native(
            "asyncResume",
            Rc::new(move |_, _, _| {
                cx.poll_task(task);
                Ok(Value::Undefined)
            }),
        ));
        promise.subscribe(
            &self.rt.queue,
            Reaction {
                on_fulfilled: Some(wake.clone()),
                on_rejected: Some(wake),
                target: PromiseCell::new(),
            },
        );
    }

    /// Synchronous call used by jobs and native callbacks. Legal targets
    /// never suspend (only async bodies do, and those park themselves
    /// behind a promise before returning).
    pub fn call_sync(self: &Rc<Self>, func: &Value, this: &Value, args: &[Value]) -> Result<Value, Value> {
        let mut future = eval::call_function(
            self.clone(),
            func.clone(),
            this.clone(),
            args.to_vec(),
        );
        match poll_once(&mut future) {
            Poll::Ready(Ok(value)) => Ok(value),
            Poll::Ready(Err(Signal::Throw(error))) => Err(error),
            Poll::Ready(Err(_)) => Err(Value::string("function completed abnormally")),
            Poll::Pending => Err(Value::string("await is not allowed in this context")),
        }
    }

    fn report_uncaught_value(&self, error: &Value, code: u32) {
        let stack = self.call_stack.borrow().join(" <- ");
        let mut message = tsr_runtime::fmt::inspect(error);
        if !stack.is_empty() {
            message.push_str(&format!("\n    at {stack}"));
        }
        self.sink.error(
            self.graph
                .entry()
                .map(|m| m.specifier.as_str())
                .unwrap_or("<entry>"),
            Span::dummy(),
            code,
            &[&message],
        );
    }
}

/// The interpreter facade.
pub struct Interp {
    pub cx: Rc<InterpCx>,
}

impl Interp {
    pub fn new(
        graph: Rc<ModuleGraph>,
        rt: Rc<RuntimeCtx>,
        options: CompilerOptions,
        sink: DiagnosticSink,
    ) -> Interp {
        let module_count = graph.modules.len();
        let cx = Rc::new(InterpCx {
            graph,
            rt,
            sink,
            options,
            global: Env::global(),
            export_cells: RefCell::new(vec![FxHashMap::default(); module_count]),
            tasks: RefCell::new(FxHashMap::default()),
            next_task: Cell::new(0),
            current_task: Cell::new(0),
            depth: Cell::new(0),
            call_stack: RefCell::new(Vec::new()),
        });

        // Globals from the host tables.
        let mut globals = indexmap::IndexMap::new();
        tsr_runtime::host::install_globals(&mut globals);
        for (name, value) in globals {
            cx.global.define(&name, value, false);
        }
        cx.global.define("undefined", Value::Undefined, false);
        cx.global.define("globalThis", Value::Undefined, false);

        // Hook native callbacks (array.map and friends) back into the
        // evaluator.
        let hook_cx = cx.clone();
        cx.rt.install_caller(Rc::new(move |func, this, args| {
            hook_cx.call_sync(func, this, args)
        }));

        Interp { cx }
    }

    /// Execute the whole program: module bodies in initialization
    /// order, then the event loop to quiescence.
    pub fn run(&mut self) {
        debug!(modules = self.cx.graph.modules.len(), "interpreting program");
        exec::prepare_export_cells(&self.cx);
        for index in 0..self.cx.graph.modules.len() {
            let mut body = exec::run_module(self.cx.clone(), index as u32);
            match poll_once(&mut body) {
                Poll::Ready(Ok(())) => {}
                Poll::Ready(Err(Signal::Throw(error))) => {
                    self.cx
                        .report_uncaught_value(&error, codes::UNCAUGHT_EXCEPTION);
                    self.cx.rt.exit_code.set(1);
                    return;
                }
                Poll::Ready(Err(_)) => {
                    self.cx.report_uncaught_value(
                        &Value::string("illegal top-level control flow"),
                        codes::UNCAUGHT_EXCEPTION,
                    );
                    self.cx.rt.exit_code.set(1);
                    return;
                }
                Poll::Pending => {
                    self.cx.report_uncaught_value(
                        &Value::string("top-level await is not supported"),
                        codes::UNCAUGHT_EXCEPTION,
                    );
                    self.cx.rt.exit_code.set(1);
                    return;
                }
            }
        }

        let queue_cx = self.cx.clone();
        run_event_loop(&queue_cx.rt.queue, self);

        for rejection in self.cx.rt.queue.unhandled_rejections() {
            self.cx
                .report_uncaught_value(&rejection, codes::UNHANDLED_REJECTION);
            self.cx.rt.exit_code.set(1);
        }
    }
}

impl JobRunner for Interp {
    fn call_value(&mut self, func: &Value, this: &Value, args: &[Value]) -> Result<Value, Value> {
        self.cx.call_sync(func, this, args)
    }

    fn run_foreign(&mut self, _token: &Rc<dyn std::any::Any>) {
        // Wake-ups are modeled as reaction jobs, not foreign tokens.
    }

    fn report_uncaught(&mut self, error: Value) {
        self.cx
            .report_uncaught_value(&error, codes::UNCAUGHT_EXCEPTION);
        self.cx.rt.exit_code.set(1);
    }
}
