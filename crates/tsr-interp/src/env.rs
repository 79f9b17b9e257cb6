//! Lexical environments.
//!
//! Scopes are a persistent immutable linked structure: a new scope is a
//! node pointing at its parent, so block entry never copies. Bindings
//! are `Rc<RefCell<Value>>` cells; module exports alias the same cells,
//! which is what makes cycle-broken imports read `undefined` before the
//! exporter's body runs and the final value afterwards.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tsr_runtime::value::ClassValue;
use tsr_runtime::Value;

use crate::closure::GenChannel;

/// A mutable binding cell.
pub type VarCell = Rc<RefCell<Value>>;

#[derive(Clone)]
pub struct Binding {
    pub cell: VarCell,
    pub mutable: bool,
}

/// Environment node kind; function nodes carry the call-scoped state.
pub enum EnvKind {
    Global,
    Module,
    Block,
    Function {
        /// `this` receiver; `None` for arrows (lexical lookup walks up).
        this: Option<Value>,
        /// Class that defined the running method, for `super` dispatch.
        home_class: Option<Rc<ClassValue>>,
        /// Yield channel when this is a generator body.
        gen_channel: Option<Rc<GenChannel>>,
    },
}

pub struct Env {
    pub parent: Option<Rc<Env>>,
    pub kind: EnvKind,
    vars: RefCell<FxHashMap<String, Binding>>,
}

impl Env {
    pub fn global() -> Rc<Env> {
        Rc::new(Env {
            parent: None,
            kind: EnvKind::Global,
            vars: RefCell::new(FxHashMap::default()),
        })
    }

    pub fn child(self: &Rc<Env>, kind: EnvKind) -> Rc<Env> {
        Rc::new(Env {
            parent: Some(self.clone()),
            kind,
            vars: RefCell::new(FxHashMap::default()),
        })
    }

    pub fn block(self: &Rc<Env>) -> Rc<Env> {
        self.child(EnvKind::Block)
    }

    /// Define a fresh binding in this scope.
    pub fn define(&self, name: &str, value: Value, mutable: bool) {
        self.vars.borrow_mut().insert(
            name.to_string(),
            Binding {
                cell: Rc::new(RefCell::new(value)),
                mutable,
            },
        );
    }

    /// Define a binding aliasing an existing cell (imports/exports).
    pub fn define_cell(&self, name: &str, cell: VarCell, mutable: bool) {
        self.vars
            .borrow_mut()
            .insert(name.to_string(), Binding { cell, mutable });
    }

    pub fn lookup(&self, name: &str) -> Option<Binding> {
        if let Some(binding) = self.vars.borrow().get(name) {
            return Some(binding.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.lookup(name).map(|b| b.cell.borrow().clone())
    }

    /// Assign through the scope chain. `Err(())` when the binding is
    /// missing or immutable.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), AssignError> {
        match self.lookup(name) {
            Some(binding) if binding.mutable => {
                *binding.cell.borrow_mut() = value;
                Ok(())
            }
            Some(_) => Err(AssignError::Immutable),
            None => Err(AssignError::Unbound),
        }
    }

    /// The nearest function scope that carries its own `this`.
    pub fn this_value(&self) -> Value {
        let mut current = Some(self);
        while let Some(env) = current {
            if let EnvKind::Function { this: Some(this), .. } = &env.kind {
                return this.clone();
            }
            current = env.parent.as_deref();
        }
        Value::Undefined
    }

    /// The defining class of the innermost running method.
    pub fn home_class(&self) -> Option<Rc<ClassValue>> {
        let mut current = Some(self);
        while let Some(env) = current {
            if let EnvKind::Function {
                home_class: Some(home),
                ..
            } = &env.kind
            {
                return Some(home.clone());
            }
            current = env.parent.as_deref();
        }
        None
    }

    /// The innermost generator yield channel.
    pub fn gen_channel(&self) -> Option<Rc<GenChannel>> {
        let mut current = Some(self);
        while let Some(env) = current {
            match &env.kind {
                EnvKind::Function {
                    gen_channel: Some(channel),
                    ..
                } => return Some(channel.clone()),
                EnvKind::Function { .. } => return None,
                _ => current = env.parent.as_deref(),
            }
        }
        None
    }

    /// The nearest function (or module/global) scope, for `var`
    /// hoisting.
    pub fn function_scope<'a>(self: &'a Rc<Env>) -> &'a Env {
        let mut current: &Env = self;
        loop {
            match &current.kind {
                EnvKind::Block => match &current.parent {
                    Some(parent) => current = parent,
                    None => return current,
                },
                _ => return current,
            }
        }
    }
}

impl Env {
    /// Snapshot of this scope's own bindings (not the chain).
    pub fn bindings_snapshot(&self) -> Vec<(String, Binding)> {
        self.vars
            .borrow()
            .iter()
            .map(|(name, binding)| (name.clone(), binding.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    Unbound,
    Immutable,
}
