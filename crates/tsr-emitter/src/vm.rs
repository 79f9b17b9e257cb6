//! The loader and stack VM executing produced bytecode modules.
//!
//! The VM shares everything observable with the interpreter: runtime
//! values, dynamic-op helpers, the promise cell, and the scheduler.
//! State machines re-enter through `step` jobs exactly like the
//! interpreter's parked frames, so the two strategies produce identical
//! stdout for the shared program subset.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;
use tsr_common::diagnostics::{DiagnosticSink, codes};
use tsr_common::{CompilerOptions, Span};
use tsr_runtime::host::{self, builtin_member, host_error};
use tsr_runtime::ops;
use tsr_runtime::promise::{PromiseCell, Reaction};
use tsr_runtime::queue::{JobRunner, run_event_loop};
use tsr_runtime::value::{
    ClassValue, FunctionPayload, FunctionValue, HostHandle, InstanceValue, ObjectValue,
};
use tsr_runtime::Value;

use crate::bytecode::{
    ARGC_SPREAD, BinOp, BytecodeModule, ClassId, Constant, FunctionId, FunctionKind, Handler,
    Instr, UnOp,
};

/// Executor-specific callable payload: a bytecode function plus its
/// captured frame chain.
struct VmClosure {
    func: FunctionId,
    frames: Vec<Rc<ObjectValue>>,
    home_class: Option<Rc<ClassValue>>,
}

/// Class payload: definition id plus the frame chain its member bodies
/// close over.
struct VmClassData {
    class: ClassId,
    frames: Vec<Rc<ObjectValue>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ResumeKind {
    Next,
    Throw,
    Return,
}

/// A live async/generator state machine.
struct VmMachine {
    step: FunctionId,
    /// Frame chain; frame 0 is the machine's own (persistent) frame.
    frames: Vec<Rc<ObjectValue>>,
    state: Cell<u32>,
    done: Cell<bool>,
    running: Cell<bool>,
    /// Operand stack preserved across suspensions (live temporaries
    /// like the iterator under a `for await` loop).
    saved_stack: RefCell<Vec<Value>>,
    /// Result promise (async machines).
    result: Option<Rc<PromiseCell>>,
    this: Value,
    home_class: Option<Rc<ClassValue>>,
}

/// Generator method payload (`next` / `return` / `throw`).
struct VmGenOp {
    machine: Rc<VmMachine>,
    kind: ResumeKind,
}

/// Outcome of one bytecode function execution.
enum Outcome {
    Return(Value),
    /// A step parked on an awaited promise.
    AwaitSuspended,
    /// A generator step produced a value.
    Yielded(Value),
    /// A generator completed with a final value.
    GenDone(Value),
}

type ExecResult = Result<Outcome, Value>;

pub struct Vm {
    core: Rc<VmCore>,
}

pub struct VmCore {
    module: Rc<BytecodeModule>,
    rt: Rc<tsr_runtime::RuntimeCtx>,
    sink: DiagnosticSink,
    options: CompilerOptions,
    globals: RefCell<IndexMap<String, Value>>,
    /// Export-field objects per source module; imports read these
    /// lazily, which is what gives cycle-broken bindings their
    /// undefined-then-final behavior.
    exports: Vec<Rc<ObjectValue>>,
    /// Class values cached once their `MakeClass` executes.
    classes: RefCell<Vec<Option<Rc<ClassValue>>>>,
    depth: Cell<usize>,
    call_stack: RefCell<Vec<String>>,
}

impl Vm {
    pub fn new(
        module: Rc<BytecodeModule>,
        rt: Rc<tsr_runtime::RuntimeCtx>,
        options: CompilerOptions,
        sink: DiagnosticSink,
    ) -> Vm {
        let mut globals = IndexMap::new();
        host::install_globals(&mut globals);
        globals.insert("undefined".to_string(), Value::Undefined);

        let exports = (0..module.module_specifiers.len())
            .map(|_| ObjectValue::new())
            .collect();
        let class_count = module.classes.len();
        let core = Rc::new(VmCore {
            module,
            rt,
            sink,
            options,
            globals: RefCell::new(globals),
            exports,
            classes: RefCell::new(vec![None; class_count]),
            depth: Cell::new(0),
            call_stack: RefCell::new(Vec::new()),
        });

        let hook = core.clone();
        core.rt
            .install_caller(Rc::new(move |func, this, args| {
                hook.call_value(func, this, args)
            }));
        Vm { core }
    }

    /// Load and run the module: static initializers in order, then the
    /// event loop to quiescence.
    pub fn run(&mut self) {
        debug!(
            inits = self.core.module.module_inits.len(),
            "executing bytecode module"
        );
        for &init in &self.core.module.module_inits.clone() {
            let frame = ObjectValue::new();
            let result = self.core.exec(
                init,
                vec![frame],
                Value::Undefined,
                None,
                &[],
                None,
            );
            if let Err(error) = result {
                self.core.report_uncaught(&error, codes::UNCAUGHT_EXCEPTION);
                self.core.rt.exit_code.set(1);
                return;
            }
        }
        let core = self.core.clone();
        run_event_loop(&core.rt.queue, self);
        for rejection in self.core.rt.queue.unhandled_rejections() {
            self.core
                .report_uncaught(&rejection, codes::UNHANDLED_REJECTION);
            self.core.rt.exit_code.set(1);
        }
    }
}

impl JobRunner for Vm {
    fn call_value(&mut self, func: &Value, this: &Value, args: &[Value]) -> Result<Value, Value> {
        self.core.call_value(func, this, args)
    }

    fn run_foreign(&mut self, _token: &Rc<dyn Any>) {}

    fn report_uncaught(&mut self, error: Value) {
        self.core.report_uncaught(&error, codes::UNCAUGHT_EXCEPTION);
        self.core.rt.exit_code.set(1);
    }
}

/// Propagate a thrown value through the current function's handler
/// table or out of the function.
macro_rules! vm_try {
    ($self:ident, $func:expr, $pc:ident, $stack:ident, $expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(error) => {
                // `pc` already advanced past the faulting instruction.
                match find_handler(&$func.handlers, $pc - 1) {
                    Some(target) => {
                        $stack.push(error);
                        $pc = target as usize;
                        continue;
                    }
                    None => return Err(error),
                }
            }
        }
    };
}

fn find_handler(handlers: &[Handler], pc: usize) -> Option<u32> {
    let pc = pc as u32;
    handlers
        .iter()
        .filter(|h| h.try_start <= pc && pc < h.try_end)
        .max_by_key(|h| (h.try_start, std::cmp::Reverse(h.try_end)))
        .map(|h| h.catch_pc)
}

impl VmCore {
    fn constant_value(&self, id: crate::bytecode::ConstId) -> Value {
        match self.module.constant(id) {
            Constant::Undefined => Value::Undefined,
            Constant::Null => Value::Null,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Number(n) => Value::Number(*n),
            Constant::String(s) => Value::string(s),
        }
    }

    fn constant_str(&self, id: crate::bytecode::ConstId) -> String {
        match self.module.constant(id) {
            Constant::String(s) => s.clone(),
            other => format!("{other:?}"),
        }
    }

    fn report_uncaught(&self, error: &Value, code: u32) {
        let stack = self.call_stack.borrow().join(" <- ");
        let mut message = tsr_runtime::fmt::inspect(error);
        if !stack.is_empty() {
            message.push_str(&format!("\n    at {stack}"));
        }
        let module = self
            .module
            .module_specifiers
            .first()
            .cloned()
            .unwrap_or_else(|| "<entry>".to_string());
        self.sink.error(&module, Span::dummy(), code, &[&message]);
    }

    // =========================================================================
    // Calls
    // =========================================================================

    pub fn call_value(
        self: &Rc<Self>,
        func: &Value,
        this: &Value,
        args: &[Value],
    ) -> Result<Value, Value> {
        match func {
            Value::Function(f) => {
                let this = f.bound_this.clone().unwrap_or_else(|| this.clone());
                match &f.payload {
                    FunctionPayload::Native(native) => native(&self.rt, &this, args),
                    FunctionPayload::Foreign(payload) => {
                        if let Ok(closure) = payload.clone().downcast::<VmClosure>() {
                            self.call_closure(&closure, this, args)
                        } else if let Ok(op) = payload.clone().downcast::<VmGenOp>() {
                            self.drive_generator(&op.machine, op.kind, args)
                        } else {
                            Err(Value::string("value is not callable"))
                        }
                    }
                }
            }
            Value::Class(class) => Err(Value::string(format!(
                "Class constructor {} cannot be invoked without 'new'",
                class.name
            ))),
            other => Err(Value::string(format!(
                "{} is not a function",
                tsr_runtime::fmt::to_string_value(other)
            ))),
        }
    }

    fn call_closure(
        self: &Rc<Self>,
        closure: &VmClosure,
        this: Value,
        args: &[Value],
    ) -> Result<Value, Value> {
        let def = self.module.function(closure.func).clone();

        self.depth.set(self.depth.get() + 1);
        self.call_stack.borrow_mut().push(if def.name.is_empty() {
            "<anonymous>".to_string()
        } else {
            def.name.clone()
        });
        let result = self.call_closure_inner(closure, &def, this, args);
        self.depth.set(self.depth.get() - 1);
        self.call_stack.borrow_mut().pop();
        result
    }

    fn call_closure_inner(
        self: &Rc<Self>,
        closure: &VmClosure,
        def: &crate::bytecode::FunctionDef,
        this: Value,
        args: &[Value],
    ) -> Result<Value, Value> {
        if self.depth.get() > self.options.stack_limit {
            return Err(Value::string("Maximum call stack size exceeded"));
        }
        let frame = bind_params(def, args);

        match def.kind {
            FunctionKind::Plain => {
                let mut frames = Vec::with_capacity(closure.frames.len() + 1);
                frames.push(frame);
                frames.extend(closure.frames.iter().cloned());
                match self.exec(
                    closure.func,
                    frames,
                    this,
                    closure.home_class.clone(),
                    args,
                    None,
                )? {
                    Outcome::Return(value) => Ok(value),
                    _ => Ok(Value::Undefined),
                }
            }
            FunctionKind::AsyncWrapper => {
                let machine_class = def.machine.expect("async wrapper has a machine");
                let step = self
                    .module
                    .class(machine_class)
                    .step
                    .expect("machine has a step");
                let mut frames = Vec::with_capacity(closure.frames.len() + 1);
                frames.push(frame);
                frames.extend(closure.frames.iter().cloned());
                let machine = Rc::new(VmMachine {
                    step,
                    frames,
                    state: Cell::new(0),
                    done: Cell::new(false),
                    running: Cell::new(false),
                    saved_stack: RefCell::new(Vec::new()),
                    result: Some(PromiseCell::new()),
                    this,
                    home_class: closure.home_class.clone(),
                });
                let promise = machine.result.clone().expect("async result promise");
                self.run_step(&machine, ResumeKind::Next, Value::Undefined)?;
                Ok(Value::Promise(promise))
            }
            FunctionKind::GeneratorWrapper => {
                let machine_class = def.machine.expect("generator wrapper has a machine");
                let step = self
                    .module
                    .class(machine_class)
                    .step
                    .expect("machine has a step");
                let mut frames = Vec::with_capacity(closure.frames.len() + 1);
                frames.push(frame);
                frames.extend(closure.frames.iter().cloned());
                let machine = Rc::new(VmMachine {
                    step,
                    frames,
                    state: Cell::new(0),
                    done: Cell::new(false),
                    running: Cell::new(false),
                    saved_stack: RefCell::new(Vec::new()),
                    result: None,
                    this,
                    home_class: closure.home_class.clone(),
                });
                Ok(self.make_generator_object(machine))
            }
            FunctionKind::Step => Err(Value::string("step functions are not directly callable")),
        }
    }

    fn make_generator_object(self: &Rc<Self>, machine: Rc<VmMachine>) -> Value {
        let object = ObjectValue::new();
        for (name, kind) in [
            ("next", ResumeKind::Next),
            ("return", ResumeKind::Return),
            ("throw", ResumeKind::Throw),
        ] {
            let op = Rc::new(VmGenOp {
                machine: machine.clone(),
                kind,
            });
            object.set(name, Value::Function(FunctionValue::foreign(name, op)));
        }
        Value::Object(object)
    }

    /// Drive one generator step from `next`/`return`/`throw`.
    fn drive_generator(
        self: &Rc<Self>,
        machine: &Rc<VmMachine>,
        kind: ResumeKind,
        args: &[Value],
    ) -> Result<Value, Value> {
        let arg = args.first().cloned().unwrap_or(Value::Undefined);
        if machine.done.get() {
            return match kind {
                ResumeKind::Throw => Err(arg),
                ResumeKind::Return => Ok(step_record(arg, true)),
                ResumeKind::Next => Ok(step_record(Value::Undefined, true)),
            };
        }
        if machine.state.get() == 0 {
            // Not started: return/throw complete without running the
            // body.
            match kind {
                ResumeKind::Return => {
                    machine.done.set(true);
                    return Ok(step_record(arg, true));
                }
                ResumeKind::Throw => {
                    machine.done.set(true);
                    return Err(arg);
                }
                ResumeKind::Next => {}
            }
        }
        match self.run_step(machine, kind, arg) {
            Ok(StepOutcome::Yielded(value)) => Ok(step_record(value, false)),
            Ok(StepOutcome::Done(value)) => {
                machine.done.set(true);
                Ok(step_record(value, true))
            }
            Ok(StepOutcome::Parked) => {
                machine.done.set(true);
                Err(Value::string("generator suspended outside of yield"))
            }
            Err(error) => {
                machine.done.set(true);
                Err(error)
            }
        }
    }

    /// Enter a machine's `step` with a resume disposition.
    fn run_step(
        self: &Rc<Self>,
        machine: &Rc<VmMachine>,
        kind: ResumeKind,
        value: Value,
    ) -> Result<StepOutcome, Value> {
        if machine.running.get() {
            return Err(Value::string("state machine is already running"));
        }
        machine.running.set(true);
        let step_ctx = StepCtx {
            machine: machine.clone(),
            resume: RefCell::new(Some((kind, value))),
        };
        let result = self.exec(
            machine.step,
            machine.frames.clone(),
            machine.this.clone(),
            machine.home_class.clone(),
            &[],
            Some(&step_ctx),
        );
        machine.running.set(false);
        match result {
            Ok(Outcome::Return(value)) | Ok(Outcome::GenDone(value)) => {
                Ok(StepOutcome::Done(value))
            }
            Ok(Outcome::Yielded(value)) => Ok(StepOutcome::Yielded(value)),
            Ok(Outcome::AwaitSuspended) => Ok(StepOutcome::Parked),
            Err(error) => {
                if let Some(result) = &machine.result {
                    // Async: rejection settles the result promise.
                    machine.done.set(true);
                    result.reject(&self.rt.queue, error);
                    Ok(StepOutcome::Done(Value::Undefined))
                } else {
                    Err(error)
                }
            }
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    fn class_value(&self, id: ClassId) -> Option<Rc<ClassValue>> {
        self.classes.borrow()[id.0 as usize].clone()
    }

    fn make_class(self: &Rc<Self>, id: ClassId, frames: &[Rc<ObjectValue>]) -> Result<Rc<ClassValue>, Value> {
        if let Some(existing) = self.class_value(id) {
            return Ok(existing);
        }
        let def = self.module.class(id).clone();
        let parent = match def.parent {
            Some(parent_id) => match self.class_value(parent_id) {
                Some(parent) => Some(parent),
                None => {
                    return Err(Value::string(format!(
                        "class {} extends an uninitialized class",
                        def.name
                    )));
                }
            },
            None => None,
        };
        let class = Rc::new(ClassValue {
            name: def.name.clone(),
            parent,
            statics: RefCell::new(IndexMap::new()),
            payload: Rc::new(VmClassData {
                class: id,
                frames: frames.to_vec(),
            }),
            is_abstract: def.is_abstract,
        });
        for (name, func) in &def.static_methods {
            let closure = Rc::new(VmClosure {
                func: *func,
                frames: frames.to_vec(),
                home_class: Some(class.clone()),
            });
            class
                .statics
                .borrow_mut()
                .insert(name.clone(), Value::Function(FunctionValue::foreign(name, closure)));
        }
        self.classes.borrow_mut()[id.0 as usize] = Some(class.clone());
        Ok(class)
    }

    fn construct(self: &Rc<Self>, class: &Rc<ClassValue>, args: &[Value]) -> Result<Value, Value> {
        if class.is_abstract {
            return Err(host_error(
                "ETYPE",
                &format!("Cannot create an instance of abstract class {}", class.name),
            ));
        }
        let instance = Rc::new(InstanceValue {
            class: class.clone(),
            fields: RefCell::new(IndexMap::new()),
            readonly_fields: RefCell::new(Vec::new()),
        });
        self.construct_onto(class, &instance, args)?;

        // Freeze readonly fields once construction completes.
        let mut readonly = Vec::new();
        let mut current = Some(class.clone());
        while let Some(c) = current {
            if let Ok(data) = c.payload.clone().downcast::<VmClassData>() {
                for field in &self.module.class(data.class).fields {
                    if field.readonly {
                        readonly.push(field.name.clone());
                    }
                }
            }
            current = c.parent.clone();
        }
        *instance.readonly_fields.borrow_mut() = readonly;
        Ok(Value::Instance(instance))
    }

    /// One class's share of construction over an existing instance.
    fn construct_onto(
        self: &Rc<Self>,
        class: &Rc<ClassValue>,
        instance: &Rc<InstanceValue>,
        args: &[Value],
    ) -> Result<(), Value> {
        let Ok(data) = class.payload.clone().downcast::<VmClassData>() else {
            return Ok(());
        };
        let def = self.module.class(data.class).clone();
        let this = Value::Instance(instance.clone());
        match def.ctor {
            Some(ctor) => {
                let closure = VmClosure {
                    func: ctor,
                    frames: data.frames.clone(),
                    home_class: Some(class.clone()),
                };
                self.call_closure(&closure, this, args)?;
                Ok(())
            }
            None => {
                // Inherited constructor forwards, then own field
                // initializers.
                if let Some(parent) = class.parent.clone() {
                    self.construct_onto(&parent, instance, args)?;
                }
                if let Some(field_init) = def.field_init {
                    let closure = VmClosure {
                        func: field_init,
                        frames: data.frames.clone(),
                        home_class: Some(class.clone()),
                    };
                    self.call_closure(&closure, this, &[])?;
                }
                Ok(())
            }
        }
    }

    // =========================================================================
    // Property access
    // =========================================================================

    fn get_prop(self: &Rc<Self>, receiver: &Value, name: &str) -> Result<Value, Value> {
        match receiver {
            Value::Undefined | Value::Null => Err(host_error(
                "ETYPE",
                &format!(
                    "Cannot read properties of {} (reading '{name}')",
                    tsr_runtime::fmt::to_string_value(receiver)
                ),
            )),
            Value::Instance(instance) => {
                if let Some(value) = instance.fields.borrow().get(name).cloned() {
                    return Ok(value);
                }
                if let Some((home, func)) = self.find_member(&instance.class, name, MemberKind::Method) {
                    return Ok(self.method_value(&home, func, receiver.clone(), name));
                }
                if let Some((home, func)) = self.find_member(&instance.class, name, MemberKind::Getter) {
                    let getter = self.method_value(&home, func, receiver.clone(), name);
                    return self.call_value(&getter, receiver, &[]);
                }
                Ok(Value::Undefined)
            }
            Value::Class(class) => {
                let mut current = Some(class.clone());
                while let Some(c) = current {
                    if let Some(value) = c.statics.borrow().get(name).cloned() {
                        return Ok(value);
                    }
                    current = c.parent.clone();
                }
                Ok(Value::Undefined)
            }
            other => {
                if let Some(value) = other.get_shared_property(name) {
                    return Ok(value);
                }
                if let Some(member) = builtin_member(other, name) {
                    if let Value::Function(f) = &member {
                        return Ok(Value::Function(f.bind(other.clone())));
                    }
                    return Ok(member);
                }
                Ok(Value::Undefined)
            }
        }
    }

    fn set_prop(self: &Rc<Self>, receiver: &Value, name: &str, value: Value) -> Result<(), Value> {
        match receiver {
            Value::Object(object) => {
                object.set(name, value);
                Ok(())
            }
            Value::Instance(instance) => {
                if instance.readonly_fields.borrow().iter().any(|f| f == name) {
                    return Err(host_error(
                        "ETYPE",
                        &format!("Cannot assign to read only property '{name}'"),
                    ));
                }
                if let Some((home, func)) = self.find_member(&instance.class, name, MemberKind::Setter) {
                    let setter = self.method_value(&home, func, receiver.clone(), name);
                    self.call_value(&setter, receiver, &[value])?;
                    return Ok(());
                }
                instance.fields.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Class(class) => {
                class.statics.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Array(items) => {
                if name == "length" {
                    let new_len = ops::to_number(&value) as usize;
                    items.borrow_mut().resize(new_len, Value::Undefined);
                    return Ok(());
                }
                if let Ok(index) = name.parse::<usize>() {
                    let mut items = items.borrow_mut();
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                }
                Ok(())
            }
            _ => Err(host_error(
                "ETYPE",
                &format!(
                    "Cannot set properties of {}",
                    tsr_runtime::fmt::to_string_value(receiver)
                ),
            )),
        }
    }

    fn find_member(
        self: &Rc<Self>,
        class: &Rc<ClassValue>,
        name: &str,
        kind: MemberKind,
    ) -> Option<(Rc<ClassValue>, FunctionId)> {
        let mut current = Some(class.clone());
        while let Some(c) = current {
            if let Ok(data) = c.payload.clone().downcast::<VmClassData>() {
                let def = self.module.class(data.class);
                let table = match kind {
                    MemberKind::Method => &def.methods,
                    MemberKind::Getter => &def.getters,
                    MemberKind::Setter => &def.setters,
                };
                if let Some((_, func)) = table.iter().find(|(n, _)| n == name) {
                    return Some((c.clone(), *func));
                }
            }
            current = c.parent.clone();
        }
        None
    }

    fn method_value(
        self: &Rc<Self>,
        home: &Rc<ClassValue>,
        func: FunctionId,
        this: Value,
        name: &str,
    ) -> Value {
        let data = home
            .payload
            .clone()
            .downcast::<VmClassData>()
            .expect("vm class payload");
        let closure = Rc::new(VmClosure {
            func,
            frames: data.frames.clone(),
            home_class: Some(home.clone()),
        });
        Value::Function(FunctionValue::foreign(name, closure).bind(this))
    }

    // =========================================================================
    // The dispatch loop
    // =========================================================================

    #[allow(clippy::too_many_lines)]
    fn exec(
        self: &Rc<Self>,
        func_id: FunctionId,
        frames: Vec<Rc<ObjectValue>>,
        this: Value,
        home_class: Option<Rc<ClassValue>>,
        _args: &[Value],
        step: Option<&StepCtx>,
    ) -> ExecResult {
        let func = self.module.function(func_id).clone();
        let mut stack: Vec<Value> = Vec::new();
        let mut pc: usize = 0;

        loop {
            let Some(instr) = func.code.get(pc) else {
                return Ok(Outcome::Return(Value::Undefined));
            };
            pc += 1;
            match instr.clone() {
                Instr::Const(id) => stack.push(self.constant_value(id)),
                Instr::Pop => {
                    stack.pop();
                }
                Instr::Dup => {
                    let top = stack.last().cloned().unwrap_or(Value::Undefined);
                    stack.push(top);
                }
                Instr::Swap => {
                    let len = stack.len();
                    if len >= 2 {
                        stack.swap(len - 1, len - 2);
                    }
                }
                Instr::RotUp3 => {
                    let len = stack.len();
                    if len >= 3 {
                        let third = stack.remove(len - 3);
                        stack.push(third);
                    }
                }
                Instr::LoadVar(depth, name) => {
                    let name = self.constant_str(name);
                    let frame = &frames[depth as usize];
                    let value = frame.get(&name);
                    match value {
                        Some(value) => stack.push(value),
                        None => {
                            let error = Value::string(format!("{name} is not defined"));
                            vm_try!(self, func, pc, stack, Err::<(), Value>(error));
                        }
                    }
                }
                Instr::StoreVar(depth, name) => {
                    let name = self.constant_str(name);
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    frames[depth as usize].set(&name, value);
                }
                Instr::DeclareVar(name) => {
                    let name = self.constant_str(name);
                    frames[0].set(&name, Value::Undefined);
                }
                Instr::LoadGlobal(name) => {
                    let name = self.constant_str(name);
                    let value = self.globals.borrow().get(&name).cloned();
                    match value {
                        Some(value) => stack.push(value),
                        None => {
                            let error = Value::string(format!("{name} is not defined"));
                            vm_try!(self, func, pc, stack, Err::<(), Value>(error));
                        }
                    }
                }
                Instr::TypeOfGlobal(name) => {
                    let name = self.constant_str(name);
                    let value = self.globals.borrow().get(&name).cloned();
                    stack.push(Value::string(match value {
                        Some(value) => ops::type_of(&value),
                        None => "undefined",
                    }));
                }
                Instr::LoadExport(module, name) => {
                    let name = self.constant_str(name);
                    let value = self.exports[module as usize]
                        .get(&name)
                        .unwrap_or(Value::Undefined);
                    stack.push(value);
                }
                Instr::StoreExport(module, name) => {
                    let name = self.constant_str(name);
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    self.exports[module as usize].set(&name, value);
                }
                Instr::LoadModuleNs(module) => {
                    // Snapshot of the module's export fields.
                    let ns = ObjectValue::new();
                    for (key, value) in self.exports[module as usize].props.borrow().iter() {
                        if key != "=" {
                            ns.set(key, value.clone());
                        }
                    }
                    stack.push(Value::Object(ns));
                }
                Instr::LoadHostModule(spec) => {
                    let spec = self.constant_str(spec);
                    stack.push(host::host_module(&spec).unwrap_or(Value::Undefined));
                }
                Instr::MakeArray(n) => {
                    let n = n as usize;
                    let start = stack.len().saturating_sub(n);
                    let items: Vec<Value> = stack.split_off(start);
                    stack.push(Value::array(items));
                }
                Instr::MakeObject(n) => {
                    let mut props = IndexMap::new();
                    let n = n as usize;
                    let start = stack.len().saturating_sub(n * 2);
                    let entries: Vec<Value> = stack.split_off(start);
                    for pair in entries.chunks(2) {
                        if let [key, value] = pair {
                            props.insert(
                                tsr_runtime::fmt::to_string_value(key),
                                value.clone(),
                            );
                        }
                    }
                    stack.push(Value::Object(ObjectValue::from_props(props)));
                }
                Instr::SetEntry => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    let key = stack.pop().unwrap_or(Value::Undefined);
                    let key = tsr_runtime::fmt::to_string_value(&key);
                    if let Some(Value::Object(object)) = stack.last() {
                        object.set(&key, value);
                    }
                }
                Instr::SpreadObject => {
                    let source = stack.pop().unwrap_or(Value::Undefined);
                    if let Some(Value::Object(object)) = stack.last() {
                        for key in ops::own_keys(&source) {
                            if let Some(value) = source.get_shared_property(&key) {
                                object.set(&key, value);
                            }
                        }
                    }
                }
                Instr::SpreadInto => {
                    let source = stack.pop().unwrap_or(Value::Undefined);
                    let expanded = vm_try!(self, func, pc, stack, self.iterate_all(&source));
                    if let Some(Value::Array(items)) = stack.last() {
                        items.borrow_mut().extend(expanded);
                    }
                }
                Instr::GetProp(name) => {
                    let name = self.constant_str(name);
                    let receiver = stack.pop().unwrap_or(Value::Undefined);
                    let value =
                        vm_try!(self, func, pc, stack, self.get_prop(&receiver, &name));
                    stack.push(value);
                }
                Instr::SetProp(name) => {
                    let name = self.constant_str(name);
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    let receiver = stack.pop().unwrap_or(Value::Undefined);
                    vm_try!(self, func, pc, stack, self.set_prop(&receiver, &name, value));
                }
                Instr::DeleteProp(name) => {
                    let name = self.constant_str(name);
                    let receiver = stack.pop().unwrap_or(Value::Undefined);
                    let deleted = match &receiver {
                        Value::Object(object) => {
                            object.props.borrow_mut().shift_remove(&name);
                            true
                        }
                        Value::Instance(instance) => {
                            instance.fields.borrow_mut().shift_remove(&name);
                            true
                        }
                        _ => false,
                    };
                    stack.push(Value::Bool(deleted));
                }
                Instr::GetIndex => {
                    let key = stack.pop().unwrap_or(Value::Undefined);
                    let receiver = stack.pop().unwrap_or(Value::Undefined);
                    let value = if let (Value::Array(items), Value::Number(n)) = (&receiver, &key)
                    {
                        items
                            .borrow()
                            .get(*n as usize)
                            .cloned()
                            .unwrap_or(Value::Undefined)
                    } else {
                        let name = tsr_runtime::fmt::to_string_value(&key);
                        vm_try!(self, func, pc, stack, self.get_prop(&receiver, &name))
                    };
                    stack.push(value);
                }
                Instr::SetIndex => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    let key = stack.pop().unwrap_or(Value::Undefined);
                    let receiver = stack.pop().unwrap_or(Value::Undefined);
                    if let (Value::Array(items), Value::Number(n)) = (&receiver, &key) {
                        let index = *n as usize;
                        let mut items = items.borrow_mut();
                        if index >= items.len() {
                            items.resize(index + 1, Value::Undefined);
                        }
                        items[index] = value;
                    } else {
                        let name = tsr_runtime::fmt::to_string_value(&key);
                        vm_try!(self, func, pc, stack, self.set_prop(&receiver, &name, value));
                    }
                }
                Instr::Call(argc) => {
                    let args = pop_args(&mut stack, argc);
                    let this = stack.pop().unwrap_or(Value::Undefined);
                    let callee = stack.pop().unwrap_or(Value::Undefined);
                    let result =
                        vm_try!(self, func, pc, stack, self.call_value(&callee, &this, &args));
                    stack.push(result);
                }
                Instr::CallMethod(name, argc) => {
                    let args = pop_args(&mut stack, argc);
                    let receiver = stack.pop().unwrap_or(Value::Undefined);
                    let name = self.constant_str(name);
                    let method =
                        vm_try!(self, func, pc, stack, self.get_prop(&receiver, &name));
                    let result = vm_try!(
                        self,
                        func,
                        pc,
                        stack,
                        self.call_value(&method, &receiver, &args)
                    );
                    stack.push(result);
                }
                Instr::New(argc) => {
                    let args = pop_args(&mut stack, argc);
                    let callee = stack.pop().unwrap_or(Value::Undefined);
                    let result = match &callee {
                        Value::Class(class) => {
                            vm_try!(self, func, pc, stack, self.construct(class, &args))
                        }
                        Value::Function(_) => {
                            // Host constructors behave as factories.
                            vm_try!(
                                self,
                                func,
                                pc,
                                stack,
                                self.call_value(&callee, &Value::Undefined, &args)
                            )
                        }
                        other => {
                            let error = Value::string(format!(
                                "{} is not a constructor",
                                tsr_runtime::fmt::to_string_value(other)
                            ));
                            vm_try!(self, func, pc, stack, Err::<Value, Value>(error))
                        }
                    };
                    stack.push(result);
                }
                Instr::SuperCall(argc) => {
                    let args = pop_args(&mut stack, argc);
                    let result: Result<(), Value> = (|| {
                        let home = home_class
                            .clone()
                            .ok_or_else(|| Value::string("'super' outside of a method"))?;
                        let parent = home
                            .parent
                            .clone()
                            .ok_or_else(|| Value::string("class has no superclass"))?;
                        let Value::Instance(instance) = &this else {
                            return Err(Value::string("'super' call without an instance"));
                        };
                        self.construct_onto(&parent, instance, &args)
                    })();
                    vm_try!(self, func, pc, stack, result);
                    stack.push(Value::Undefined);
                }
                Instr::SuperGet(name) => {
                    let name = self.constant_str(name);
                    let result: Result<Value, Value> = (|| {
                        let home = home_class
                            .clone()
                            .ok_or_else(|| Value::string("'super' outside of a method"))?;
                        let parent = home
                            .parent
                            .clone()
                            .ok_or_else(|| Value::string("class has no superclass"))?;
                        match self.find_member(&parent, &name, MemberKind::Method) {
                            Some((found, method)) => {
                                Ok(self.method_value(&found, method, this.clone(), &name))
                            }
                            None => Ok(Value::Undefined),
                        }
                    })();
                    let value = vm_try!(self, func, pc, stack, result);
                    stack.push(value);
                }
                Instr::Jump(target) => pc = target as usize,
                Instr::JumpIfFalse(target) => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    if !ops::truthy(&value) {
                        pc = target as usize;
                    }
                }
                Instr::JumpIfTrue(target) => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    if ops::truthy(&value) {
                        pc = target as usize;
                    }
                }
                Instr::JumpIfNullish(target) => {
                    let nullish = stack
                        .last()
                        .map(|v| v.is_nullish())
                        .unwrap_or(true);
                    if nullish {
                        pc = target as usize;
                    }
                }
                Instr::JumpIfNotUndefined(target) => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    if !matches!(value, Value::Undefined) {
                        pc = target as usize;
                    }
                }
                Instr::BinOp(op) => {
                    let rhs = stack.pop().unwrap_or(Value::Undefined);
                    let lhs = stack.pop().unwrap_or(Value::Undefined);
                    let result = vm_try!(self, func, pc, stack, eval_binop(op, &lhs, &rhs));
                    stack.push(result);
                }
                Instr::UnOp(op) => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    stack.push(match op {
                        UnOp::Plus => Value::Number(ops::to_number(&value)),
                        UnOp::Minus => Value::Number(-ops::to_number(&value)),
                        UnOp::Not => Value::Bool(!ops::truthy(&value)),
                        UnOp::BitNot => Value::Number(f64::from(!ops::to_int32(&value))),
                        UnOp::TypeOf => Value::string(ops::type_of(&value)),
                        UnOp::Void => Value::Undefined,
                    });
                }
                Instr::LoadThis => stack.push(this.clone()),
                Instr::Return => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    return Ok(Outcome::Return(value));
                }
                Instr::Throw => {
                    let error = stack.pop().unwrap_or(Value::Undefined);
                    vm_try!(self, func, pc, stack, Err::<(), Value>(error));
                }
                Instr::MakeClosure(inner) => {
                    let closure = Rc::new(VmClosure {
                        func: inner,
                        frames: frames.clone(),
                        home_class: home_class.clone(),
                    });
                    let name = self.module.function(inner).name.clone();
                    stack.push(Value::Function(FunctionValue::foreign(&name, closure)));
                }
                Instr::MakeClass(id) => {
                    let class = vm_try!(self, func, pc, stack, self.make_class(id, &frames));
                    stack.push(Value::Class(class));
                }
                Instr::GetIter => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    let iter = vm_try!(self, func, pc, stack, self.make_iterator(&value));
                    stack.push(iter);
                }
                Instr::IterNext => {
                    let iterator = stack.last().cloned().unwrap_or(Value::Undefined);
                    let (value, done) =
                        vm_try!(self, func, pc, stack, self.iterator_step(&iterator));
                    stack.push(value);
                    stack.push(Value::Bool(done));
                }
                Instr::OwnKeys => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    let keys: Vec<Value> = ops::own_keys(&value)
                        .into_iter()
                        .map(Value::string)
                        .collect();
                    stack.push(make_items_iterator(keys));
                }
                Instr::EnumAdd(name) => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    let name = self.constant_str(name);
                    if let Some(Value::Object(object)) = stack.last() {
                        if let Value::Number(n) = &value {
                            object.set(
                                &tsr_runtime::fmt::format_number(*n),
                                Value::string(&name),
                            );
                        }
                        object.set(&name, value);
                    }
                }
                Instr::SetState(state) => {
                    if let Some(step) = step {
                        step.machine.state.set(state);
                    }
                }
                Instr::StateDispatch(table) => {
                    if let Some(step) = step {
                        let state = step.machine.state.get();
                        if state > 0 {
                            // Restore the operand stack saved at the
                            // suspension point.
                            stack = step.machine.saved_stack.take();
                            pc = table[(state - 1) as usize] as usize;
                        }
                    }
                }
                Instr::AwaitSuspend { after } => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    match value {
                        Value::Promise(promise) => {
                            let Some(step) = step else {
                                return Err(Value::string("await outside an async function"));
                            };
                            *step.machine.saved_stack.borrow_mut() = std::mem::take(&mut stack);
                            self.park_on(&promise, &step.machine);
                            return Ok(Outcome::AwaitSuspended);
                        }
                        other => {
                            // Non-promise awaits continue synchronously.
                            stack.push(other);
                            pc = after as usize;
                        }
                    }
                }
                Instr::YieldSuspend => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    if let Some(step) = step {
                        *step.machine.saved_stack.borrow_mut() = std::mem::take(&mut stack);
                    }
                    return Ok(Outcome::Yielded(value));
                }
                Instr::Resume => {
                    let Some(step) = step else {
                        return Err(Value::string("resume outside a state machine"));
                    };
                    let resume = step.resume.borrow_mut().take();
                    match resume {
                        Some((ResumeKind::Next, value)) => stack.push(value),
                        Some((ResumeKind::Throw, error)) => {
                            vm_try!(self, func, pc, stack, Err::<(), Value>(error));
                        }
                        Some((ResumeKind::Return, value)) => {
                            return Ok(Outcome::GenDone(value));
                        }
                        None => stack.push(Value::Undefined),
                    }
                }
                Instr::AsyncReturn => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    if let Some(step) = step {
                        step.machine.done.set(true);
                        if let Some(result) = &step.machine.result {
                            result.resolve(&self.rt.queue, value);
                        }
                        return Ok(Outcome::Return(Value::Undefined));
                    }
                    return Ok(Outcome::Return(value));
                }
                Instr::GenReturn => {
                    let value = stack.pop().unwrap_or(Value::Undefined);
                    return Ok(Outcome::GenDone(value));
                }
                Instr::Trap(message) => {
                    let message = self.constant_str(message);
                    let error = host_error("ENOSYS", &message);
                    vm_try!(self, func, pc, stack, Err::<(), Value>(error));
                }
            }
        }
    }

    /// Park a state machine on a promise: settlement re-enters `step`.
    fn park_on(self: &Rc<Self>, promise: &Rc<PromiseCell>, machine: &Rc<VmMachine>) {
        let on_fulfilled = {
            let vm = self.clone();
            let machine = machine.clone();
            Value::Function(FunctionValue::native(
                "stepResume",
                Rc::new(move |_, _, args| {
                    let value = args.first().cloned().unwrap_or(Value::Undefined);
                    let _ = vm.run_step(&machine, ResumeKind::Next, value);
                    Ok(Value::Undefined)
                }),
            ))
        };
        let on_rejected = {
            let vm = self.clone();
            let machine = machine.clone();
            Value::Function(FunctionValue::native(
                "stepReject",
                Rc::new(move |_, _, args| {
                    let error = args.first().cloned().unwrap_or(Value::Undefined);
                    let _ = vm.run_step(&machine, ResumeKind::Throw, error);
                    Ok(Value::Undefined)
                }),
            ))
        };
        promise.subscribe(
            &self.rt.queue,
            Reaction {
                on_fulfilled: Some(on_fulfilled),
                on_rejected: Some(on_rejected),
                target: PromiseCell::new(),
            },
        );
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    fn make_iterator(self: &Rc<Self>, value: &Value) -> Result<Value, Value> {
        match ops::get_iter_source(value) {
            Ok(ops::IterSource::Items(items)) => Ok(make_items_iterator(items)),
            Ok(ops::IterSource::Dynamic(iterator)) => Ok(iterator),
            Err(error) => Err(error),
        }
    }

    /// One protocol step over either an internal cursor or a dynamic
    /// iterator object.
    fn iterator_step(self: &Rc<Self>, iterator: &Value) -> Result<(Value, bool), Value> {
        if let Value::Handle(handle) = iterator
            && handle.kind == "iterator"
            && let Ok(cursor) = handle.data.clone().downcast::<RefCell<ItemsCursor>>()
        {
            let mut cursor = cursor.borrow_mut();
            if cursor.index >= cursor.items.len() {
                return Ok((Value::Undefined, true));
            }
            let value = cursor.items[cursor.index].clone();
            cursor.index += 1;
            return Ok((value, false));
        }
        let next = self.get_prop(iterator, "next")?;
        let result = self.call_value(&next, iterator, &[])?;
        let done = self.get_prop(&result, "done")?;
        let value = self.get_prop(&result, "value")?;
        Ok((value, ops::truthy(&done)))
    }

    fn iterate_all(self: &Rc<Self>, value: &Value) -> Result<Vec<Value>, Value> {
        match ops::get_iter_source(value) {
            Ok(ops::IterSource::Items(items)) => Ok(items),
            Ok(ops::IterSource::Dynamic(iterator)) => {
                let mut out = Vec::new();
                loop {
                    let (item, done) = self.iterator_step(&iterator)?;
                    if done {
                        return Ok(out);
                    }
                    out.push(item);
                }
            }
            Err(error) => Err(error),
        }
    }
}

#[derive(Clone, Copy)]
enum MemberKind {
    Method,
    Getter,
    Setter,
}

enum StepOutcome {
    Yielded(Value),
    Done(Value),
    Parked,
}

struct StepCtx {
    machine: Rc<VmMachine>,
    resume: RefCell<Option<(ResumeKind, Value)>>,
}

struct ItemsCursor {
    items: Vec<Value>,
    index: usize,
}

fn make_items_iterator(items: Vec<Value>) -> Value {
    Value::Handle(Rc::new(HostHandle {
        kind: "iterator",
        data: Rc::new(RefCell::new(ItemsCursor { items, index: 0 })),
    }))
}

fn pop_args(stack: &mut Vec<Value>, argc: u8) -> Vec<Value> {
    if argc == ARGC_SPREAD {
        match stack.pop() {
            Some(Value::Array(items)) => items.borrow().clone(),
            Some(other) => vec![other],
            None => Vec::new(),
        }
    } else {
        let n = argc as usize;
        let start = stack.len().saturating_sub(n);
        stack.split_off(start)
    }
}

fn bind_params(def: &crate::bytecode::FunctionDef, args: &[Value]) -> Rc<ObjectValue> {
    let frame = ObjectValue::new();
    for (i, param) in def.params.iter().enumerate() {
        frame.set(param, args.get(i).cloned().unwrap_or(Value::Undefined));
    }
    if let Some(rest) = &def.rest_param {
        let tail: Vec<Value> = args.iter().skip(def.params.len()).cloned().collect();
        frame.set(rest, Value::array(tail));
    }
    frame
}

fn step_record(value: Value, done: bool) -> Value {
    let mut props = IndexMap::new();
    props.insert("value".to_string(), value);
    props.insert("done".to_string(), Value::Bool(done));
    Value::Object(ObjectValue::from_props(props))
}

fn eval_binop(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, Value> {
    Ok(match op {
        BinOp::Add => ops::add(lhs, rhs),
        BinOp::Sub => Value::Number(ops::to_number(lhs) - ops::to_number(rhs)),
        BinOp::Mul => Value::Number(ops::to_number(lhs) * ops::to_number(rhs)),
        BinOp::Div => Value::Number(ops::to_number(lhs) / ops::to_number(rhs)),
        BinOp::Rem => Value::Number(ops::to_number(lhs) % ops::to_number(rhs)),
        BinOp::Exp => Value::Number(ops::to_number(lhs).powf(ops::to_number(rhs))),
        BinOp::Shl => Value::Number(f64::from(
            ops::to_int32(lhs).wrapping_shl(ops::to_uint32(rhs) & 31),
        )),
        BinOp::Shr => Value::Number(f64::from(
            ops::to_int32(lhs).wrapping_shr(ops::to_uint32(rhs) & 31),
        )),
        BinOp::UShr => Value::Number(f64::from(
            ops::to_uint32(lhs).wrapping_shr(ops::to_uint32(rhs) & 31),
        )),
        BinOp::BitAnd => Value::Number(f64::from(ops::to_int32(lhs) & ops::to_int32(rhs))),
        BinOp::BitOr => Value::Number(f64::from(ops::to_int32(lhs) | ops::to_int32(rhs))),
        BinOp::BitXor => Value::Number(f64::from(ops::to_int32(lhs) ^ ops::to_int32(rhs))),
        BinOp::Lt => compare(lhs, rhs, |o| o == std::cmp::Ordering::Less),
        BinOp::Gt => compare(lhs, rhs, |o| o == std::cmp::Ordering::Greater),
        BinOp::Le => compare(lhs, rhs, |o| o != std::cmp::Ordering::Greater),
        BinOp::Ge => compare(lhs, rhs, |o| o != std::cmp::Ordering::Less),
        BinOp::LooseEq => Value::Bool(ops::loose_eq(lhs, rhs)),
        BinOp::LooseNe => Value::Bool(!ops::loose_eq(lhs, rhs)),
        BinOp::StrictEq => Value::Bool(ops::strict_eq(lhs, rhs)),
        BinOp::StrictNe => Value::Bool(!ops::strict_eq(lhs, rhs)),
        BinOp::In => {
            let key = tsr_runtime::fmt::to_string_value(lhs);
            let has = rhs.get_shared_property(&key).is_some()
                || ops::own_keys(rhs).iter().any(|k| k == &key);
            Value::Bool(has)
        }
        BinOp::InstanceOf => match (lhs, rhs) {
            (Value::Instance(instance), Value::Class(class)) => {
                Value::Bool(instance.class.extends(class))
            }
            (_, Value::Class(_)) | (_, Value::Function(_)) => Value::Bool(false),
            _ => {
                return Err(Value::string(
                    "right-hand side of 'instanceof' is not callable",
                ));
            }
        },
    })
}

fn compare(lhs: &Value, rhs: &Value, test: impl Fn(std::cmp::Ordering) -> bool) -> Value {
    match ops::compare(lhs, rhs) {
        Some(ordering) => Value::Bool(test(ordering)),
        None => Value::Bool(false),
    }
}
