//! The paired FIFO task queues and the cooperative event loop.
//!
//! Microtasks (promise reactions, parked async resumptions) drain to
//! completion before any timer callback runs. Timer callbacks run in
//! due order with insertion-order ties, against a virtual clock that
//! jumps to the earliest due time; the loop never blocks. Cancelled
//! timers are tombstones skipped at drain time.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tracing::trace;
use tsr_common::limits::MAX_TASK_TICKS;

use crate::promise::{PromiseCell, PromiseState};
use crate::value::Value;

/// A queued unit of work. The runtime never runs user code itself; the
/// executor interprets these.
pub enum Job {
    /// Call `func(args)`; when `complete` is present, resolve it with
    /// the result or reject it with a thrown error.
    Call {
        func: Value,
        this: Value,
        args: Vec<Value>,
        complete: Option<Rc<PromiseCell>>,
    },
    /// A settled promise firing one reaction: run the handler (if any)
    /// with `argument` and settle `target` accordingly; a missing
    /// handler passes the settlement through.
    Reaction {
        handler: Option<Value>,
        argument: Value,
        rejected: bool,
        target: Rc<PromiseCell>,
    },
    /// Executor-specific resumption (a parked async frame).
    Foreign(Rc<dyn Any>),
}

struct TimerEntry {
    id: u64,
    due: f64,
    seq: u64,
    job: Option<Job>,
    cancelled: bool,
    /// Interval period; `None` for one-shot timeouts.
    repeat: Option<f64>,
    repeat_func: Option<Value>,
    repeat_args: Vec<Value>,
}

/// The paired FIFOs plus timer bookkeeping.
#[derive(Default)]
pub struct TaskQueue {
    micro: RefCell<VecDeque<Job>>,
    timers: RefCell<Vec<TimerEntry>>,
    next_timer_id: Cell<u64>,
    next_seq: Cell<u64>,
    now: Cell<f64>,
    rejections: RefCell<Vec<Weak<PromiseCell>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue::default()
    }

    pub fn push_micro(&self, job: Job) {
        self.micro.borrow_mut().push_back(job);
    }

    pub fn pop_micro(&self) -> Option<Job> {
        self.micro.borrow_mut().pop_front()
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> f64 {
        self.now.get()
    }

    pub fn set_timeout(&self, func: Value, args: Vec<Value>, delay: f64) -> u64 {
        self.add_timer(func, args, delay, None)
    }

    pub fn set_interval(&self, func: Value, args: Vec<Value>, period: f64) -> u64 {
        self.add_timer(func.clone(), args, period, Some(period))
    }

    fn add_timer(
        &self,
        func: Value,
        args: Vec<Value>,
        delay: f64,
        repeat: Option<f64>,
    ) -> u64 {
        let id = self.next_timer_id.get() + 1;
        self.next_timer_id.set(id);
        let seq = self.next_seq.get() + 1;
        self.next_seq.set(seq);
        let delay = if delay.is_finite() && delay > 0.0 {
            delay
        } else {
            0.0
        };
        self.timers.borrow_mut().push(TimerEntry {
            id,
            due: self.now.get() + delay,
            seq,
            job: Some(Job::Call {
                func: func.clone(),
                this: Value::Undefined,
                args: args.clone(),
                complete: None,
            }),
            cancelled: false,
            repeat,
            repeat_func: repeat.map(|_| func),
            repeat_args: args,
        });
        id
    }

    /// Mark a timer cancelled; the drain step skips the tombstone.
    pub fn clear_timer(&self, id: u64) {
        for entry in self.timers.borrow_mut().iter_mut() {
            if entry.id == id {
                entry.cancelled = true;
            }
        }
    }

    fn has_live_timers(&self) -> bool {
        self.timers.borrow().iter().any(|t| !t.cancelled)
    }

    /// Pop the next due timer job, advancing the virtual clock.
    fn pop_timer(&self) -> Option<Job> {
        let mut timers = self.timers.borrow_mut();
        timers.retain(|t| !t.cancelled);
        let best = timers
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.due
                    .partial_cmp(&b.due)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|(i, _)| i)?;
        let entry = &mut timers[best];
        self.now.set(self.now.get().max(entry.due));
        let job = entry.job.take();
        if let (Some(period), Some(func)) = (entry.repeat, entry.repeat_func.clone()) {
            // Re-arm intervals.
            let seq = self.next_seq.get() + 1;
            self.next_seq.set(seq);
            entry.due = self.now.get() + period;
            entry.seq = seq;
            entry.job = Some(Job::Call {
                func,
                this: Value::Undefined,
                args: entry.repeat_args.clone(),
                complete: None,
            });
        } else {
            timers.remove(best);
        }
        job
    }

    pub fn note_rejection(&self, promise: &Rc<PromiseCell>) {
        self.rejections.borrow_mut().push(Rc::downgrade(promise));
    }

    /// Rejected promises nobody handled, surfaced after the loop drains.
    pub fn unhandled_rejections(&self) -> Vec<Value> {
        let mut unhandled = Vec::new();
        for weak in self.rejections.borrow().iter() {
            if let Some(promise) = weak.upgrade()
                && !promise.handled.get()
                && let PromiseState::Rejected(error) = promise.state()
            {
                unhandled.push(error);
            }
        }
        unhandled
    }
}

/// The executor side of job processing.
pub trait JobRunner {
    /// Call a language-level function value. Errors are thrown values.
    fn call_value(&mut self, func: &Value, this: &Value, args: &[Value])
    -> Result<Value, Value>;
    /// Resume an executor-specific parked frame.
    fn run_foreign(&mut self, token: &Rc<dyn Any>);
    /// An uncaught error escaped a job (timer callback threw).
    fn report_uncaught(&mut self, error: Value);
}

/// Drain the event loop to quiescence: microtasks fully, then the next
/// timer, then microtasks again. Pending timers do not outlive the
/// drain guard; a runaway program stops at the tick limit.
pub fn run_event_loop(queue: &TaskQueue, runner: &mut dyn JobRunner) {
    let mut ticks = 0usize;
    loop {
        while let Some(job) = queue.pop_micro() {
            run_job(queue, runner, job);
            ticks += 1;
            if ticks > MAX_TASK_TICKS {
                trace!("task tick limit reached; stopping drain");
                return;
            }
        }
        if !queue.has_live_timers() {
            return;
        }
        match queue.pop_timer() {
            Some(job) => run_job(queue, runner, job),
            None => return,
        }
        ticks += 1;
        if ticks > MAX_TASK_TICKS {
            return;
        }
    }
}

fn run_job(queue: &TaskQueue, runner: &mut dyn JobRunner, job: Job) {
    match job {
        Job::Call {
            func,
            this,
            args,
            complete,
        } => match runner.call_value(&func, &this, &args) {
            Ok(value) => {
                if let Some(complete) = complete {
                    complete.resolve(queue, value);
                }
            }
            Err(error) => match complete {
                Some(complete) => complete.reject(queue, error),
                None => runner.report_uncaught(error),
            },
        },
        Job::Reaction {
            handler,
            argument,
            rejected,
            target,
        } => match handler {
            Some(handler) => match runner.call_value(&handler, &Value::Undefined, &[argument]) {
                Ok(value) => target.resolve(queue, value),
                Err(error) => target.reject(queue, error),
            },
            None => {
                // Pass-through settlement.
                if rejected {
                    target.reject(queue, argument);
                } else {
                    target.resolve(queue, argument);
                }
            }
        },
        Job::Foreign(token) => runner.run_foreign(&token),
    }
}
