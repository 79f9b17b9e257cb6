//! The three-state promise cell.
//!
//! Transitions are one-way and idempotent: the first `fulfill`/`reject`
//! wins, later settlements are ignored. Settling moves the registered
//! reactions onto the microtask queue; the executor drains them after
//! the current synchronous frame.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::queue::{Job, TaskQueue};
use crate::value::Value;

/// A reaction registered by `then`/`catch`/`finally` or by an `await`.
#[derive(Clone)]
pub struct Reaction {
    pub on_fulfilled: Option<Value>,
    pub on_rejected: Option<Value>,
    /// Promise settled with the handler's result.
    pub target: Rc<PromiseCell>,
}

#[derive(Clone)]
pub enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

pub struct PromiseCell {
    state: RefCell<PromiseState>,
    reactions: RefCell<Vec<Reaction>>,
    /// Set once any rejection handler attaches, for unhandled-rejection
    /// reporting.
    pub handled: Cell<bool>,
}

impl std::fmt::Debug for PromiseCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.state.borrow() {
            PromiseState::Pending => "pending",
            PromiseState::Fulfilled(_) => "fulfilled",
            PromiseState::Rejected(_) => "rejected",
        };
        write!(f, "Promise {{ <{state}> }}")
    }
}

impl PromiseCell {
    pub fn new() -> Rc<Self> {
        Rc::new(PromiseCell {
            state: RefCell::new(PromiseState::Pending),
            reactions: RefCell::new(Vec::new()),
            handled: Cell::new(false),
        })
    }

    pub fn fulfilled(value: Value) -> Rc<Self> {
        let cell = PromiseCell::new();
        *cell.state.borrow_mut() = PromiseState::Fulfilled(value);
        cell
    }

    pub fn state(&self) -> PromiseState {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), PromiseState::Pending)
    }

    /// Register a reaction; fires immediately (as a microtask) when the
    /// promise is already settled.
    pub fn subscribe(self: &Rc<Self>, queue: &TaskQueue, reaction: Reaction) {
        if reaction.on_rejected.is_some() {
            self.handled.set(true);
        }
        match self.state.borrow().clone() {
            PromiseState::Pending => self.reactions.borrow_mut().push(reaction),
            PromiseState::Fulfilled(value) => queue.push_micro(Job::Reaction {
                handler: reaction.on_fulfilled,
                argument: value,
                rejected: false,
                target: reaction.target,
            }),
            PromiseState::Rejected(error) => queue.push_micro(Job::Reaction {
                handler: reaction.on_rejected,
                argument: error,
                rejected: true,
                target: reaction.target,
            }),
        }
    }

    /// Resolve: adopt promise results, fulfill everything else.
    pub fn resolve(self: &Rc<Self>, queue: &TaskQueue, value: Value) {
        if let Value::Promise(inner) = &value {
            if Rc::ptr_eq(inner, self) {
                self.reject(queue, Value::string("chaining cycle detected"));
                return;
            }
            let target = self.clone();
            inner.subscribe(
                queue,
                Reaction {
                    on_fulfilled: None,
                    on_rejected: None,
                    target,
                },
            );
            inner.handled.set(true);
            return;
        }
        self.fulfill(queue, value);
    }

    pub fn fulfill(self: &Rc<Self>, queue: &TaskQueue, value: Value) {
        if !self.is_pending() {
            return;
        }
        *self.state.borrow_mut() = PromiseState::Fulfilled(value.clone());
        for reaction in self.reactions.borrow_mut().drain(..) {
            queue.push_micro(Job::Reaction {
                handler: reaction.on_fulfilled,
                argument: value.clone(),
                rejected: false,
                target: reaction.target,
            });
        }
    }

    pub fn reject(self: &Rc<Self>, queue: &TaskQueue, error: Value) {
        if !self.is_pending() {
            return;
        }
        *self.state.borrow_mut() = PromiseState::Rejected(error.clone());
        let reactions: Vec<Reaction> = self.reactions.borrow_mut().drain(..).collect();
        for reaction in reactions {
            queue.push_micro(Job::Reaction {
                handler: reaction.on_rejected,
                argument: error.clone(),
                rejected: true,
                target: reaction.target,
            });
        }
        queue.note_rejection(self);
    }
}
