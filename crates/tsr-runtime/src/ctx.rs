//! The runtime context: scheduler, captured stdout, and process state.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::queue::TaskQueue;
use crate::value::Value;

/// Synchronous call-back into the executor, installed at startup so
/// native methods (`array.map`, `then` fast paths) can invoke user
/// functions. Calling across an `await` boundary is impossible here:
/// only non-async user functions are legal targets.
pub type SyncCaller = Rc<dyn Fn(&Value, &Value, &[Value]) -> Result<Value, Value>>;

/// Shared state for one program execution.
///
/// Cloned handles (`Rc`) are passed to native functions and both
/// executors; stdout is captured so interpreted and compiled runs can
/// be byte-compared.
pub struct RuntimeCtx {
    pub queue: TaskQueue,
    stdout: RefCell<String>,
    pub exit_code: Cell<i32>,
    /// Seeded xorshift state for crypto.random* (documented as
    /// non-cryptographic).
    pub rng: Cell<u64>,
    caller: RefCell<Option<SyncCaller>>,
}

impl RuntimeCtx {
    pub fn new() -> Rc<Self> {
        Rc::new(RuntimeCtx {
            queue: TaskQueue::new(),
            stdout: RefCell::new(String::new()),
            exit_code: Cell::new(0),
            rng: Cell::new(0x9e37_79b9_7f4a_7c15),
            caller: RefCell::new(None),
        })
    }

    /// Install the executor's synchronous call hook.
    pub fn install_caller(&self, caller: SyncCaller) {
        *self.caller.borrow_mut() = Some(caller);
    }

    /// Call a user function synchronously through the executor.
    pub fn call_function(
        &self,
        func: &Value,
        this: &Value,
        args: &[Value],
    ) -> Result<Value, Value> {
        let caller = self.caller.borrow().clone();
        match caller {
            Some(caller) => caller(func, this, args),
            None => Err(Value::string("no executor installed")),
        }
    }

    pub fn write_stdout(&self, text: &str) {
        self.stdout.borrow_mut().push_str(text);
    }

    pub fn writeln_stdout(&self, text: &str) {
        let mut out = self.stdout.borrow_mut();
        out.push_str(text);
        out.push('\n');
    }

    pub fn take_stdout(&self) -> String {
        std::mem::take(&mut *self.stdout.borrow_mut())
    }

    pub fn stdout_snapshot(&self) -> String {
        self.stdout.borrow().clone()
    }

    /// Next pseudo-random u64 (xorshift*).
    pub fn next_random(&self) -> u64 {
        let mut x = self.rng.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng.set(x);
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }
}
