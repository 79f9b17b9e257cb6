//! Interpreter-side callable payloads and the suspension machinery.
//!
//! Evaluation futures are `'static` and single-threaded; suspension
//! points are `await` (parked in the task table, woken by promise
//! settlement jobs) and `yield` (driven by the generator's `next`
//! through a yield/resume channel).

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tsr_parser::FuncId;
use tsr_runtime::promise::PromiseCell;
use tsr_runtime::Value;

use crate::env::Env;

/// Thrown-value/control-flow signal unwinding through evaluation.
#[derive(Clone, Debug)]
pub enum Signal {
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
    Throw(Value),
}

pub type EvalResult = Result<Value, Signal>;
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T>>>;

/// A user function closure: AST body plus captured environment.
pub struct InterpClosure {
    pub module: u32,
    pub func: FuncId,
    pub env: Rc<Env>,
    pub home_class: Option<Rc<tsr_runtime::value::ClassValue>>,
}

/// One instance-field initializer, in declaration order.
pub struct FieldInit {
    pub name: String,
    pub init: Option<tsr_parser::ExprId>,
    pub readonly: bool,
}

/// Class payload: member tables resolved at declaration time, plus the
/// environment the member bodies close over.
pub struct InterpClassData {
    pub module: u32,
    pub env: Rc<Env>,
    pub ctor: Option<FuncId>,
    /// Constructor parameter properties: (param index, name, readonly).
    pub param_props: Vec<(usize, String, bool)>,
    pub methods: rustc_hash::FxHashMap<String, FuncId>,
    pub getters: rustc_hash::FxHashMap<String, FuncId>,
    pub setters: rustc_hash::FxHashMap<String, FuncId>,
    pub field_inits: Vec<FieldInit>,
}


// =============================================================================
// Await
// =============================================================================

/// Future resolving when a promise settles; registers a wake-up on the
/// current task the first time it returns `Pending`.
pub struct AwaitPromise {
    pub promise: Rc<PromiseCell>,
    pub registered: bool,
    /// Called to register the wake-up (captures the scheduler and
    /// current task id).
    pub register: Option<Box<dyn FnOnce(&Rc<PromiseCell>)>>,
}

impl Future for AwaitPromise {
    type Output = EvalResult;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        // Always suspend on the first poll, even when the promise has
        // already settled: the continuation runs as a microtask, never
        // synchronously at the await site.
        if !this.registered {
            this.registered = true;
            if let Some(register) = this.register.take() {
                register(&this.promise);
            }
            return Poll::Pending;
        }
        match this.promise.state() {
            tsr_runtime::PromiseState::Fulfilled(value) => Poll::Ready(Ok(value)),
            tsr_runtime::PromiseState::Rejected(error) => {
                this.promise.handled.set(true);
                Poll::Ready(Err(Signal::Throw(error)))
            }
            tsr_runtime::PromiseState::Pending => Poll::Pending,
        }
    }
}

// =============================================================================
// Generators
// =============================================================================

/// How a suspended generator is resumed.
pub enum GenResume {
    Next(Value),
    Throw(Value),
    Return(Value),
}

/// The yield/resume rendezvous between a generator body future and its
/// driver.
#[derive(Default)]
pub struct GenChannel {
    pub yielded: RefCell<Option<Value>>,
    pub resume: RefCell<Option<GenResume>>,
}

/// One `yield` suspension point.
pub struct YieldPoint {
    pub channel: Rc<GenChannel>,
    pub value: Option<Value>,
    pub first_poll: bool,
}

impl YieldPoint {
    pub fn new(channel: Rc<GenChannel>, value: Value) -> Self {
        YieldPoint {
            channel,
            value: Some(value),
            first_poll: true,
        }
    }
}

impl Future for YieldPoint {
    type Output = EvalResult;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.first_poll {
            this.first_poll = false;
            *this.channel.yielded.borrow_mut() = Some(this.value.take().unwrap_or(Value::Undefined));
            return Poll::Pending;
        }
        match this.channel.resume.borrow_mut().take() {
            Some(GenResume::Next(value)) => Poll::Ready(Ok(value)),
            Some(GenResume::Throw(error)) => Poll::Ready(Err(Signal::Throw(error))),
            Some(GenResume::Return(value)) => Poll::Ready(Err(Signal::Return(value))),
            None => Poll::Pending,
        }
    }
}

/// A live generator: its parked body future and channel.
pub struct GeneratorState {
    pub body: RefCell<Option<BoxFuture<EvalResult>>>,
    pub channel: Rc<GenChannel>,
    pub done: Cell<bool>,
    started: Cell<bool>,
}

impl GeneratorState {
    pub fn new(body: BoxFuture<EvalResult>, channel: Rc<GenChannel>) -> Self {
        GeneratorState {
            body: RefCell::new(Some(body)),
            channel,
            done: Cell::new(false),
            started: Cell::new(false),
        }
    }

    pub fn started(&self) -> bool {
        self.started.get()
    }

    pub fn mark_started(&self) {
        self.started.set(true);
    }
}

/// Which generator method a callable drives.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum GenOpKind {
    Next,
    Return,
    Throw,
}

/// Callable payload for `next`/`return`/`throw` on a generator object.
pub struct GenOp {
    pub state: Rc<GeneratorState>,
    pub kind: GenOpKind,
}
