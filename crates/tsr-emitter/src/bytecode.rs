//! The bytecode module format.
//!
//! A produced module is a self-contained value: a constant pool,
//! function bodies (flat instruction vectors with pc-range exception
//! handler tables), class definitions, and the per-module static
//! initializers in initialization order. `serde` derives give the
//! module a stable debug dump for tooling.

use serde::Serialize;

/// Index into the constant pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ConstId(pub u32);

/// Index into the function table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionId(pub u32);

/// Index into the class table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ClassId(pub u32);

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Constant {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

/// Binary operator codes, sharing the runtime coercion helpers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    Lt,
    Gt,
    Le,
    Ge,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
    In,
    InstanceOf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UnOp {
    Plus,
    Minus,
    Not,
    BitNot,
    TypeOf,
    Void,
}

/// One instruction of the stack machine.
///
/// Jump targets are absolute pcs within the owning function.
#[derive(Clone, Debug, Serialize)]
pub enum Instr {
    /// Push a constant.
    Const(ConstId),
    Pop,
    Dup,
    /// Swap the two top stack values.
    Swap,
    /// Rotate the third-from-top value to the top: `a b c` → `b c a`.
    RotUp3,

    /// Read/write a frame variable: `depth` frames up the chain, name
    /// from the pool. Frame 0 is the current function's frame.
    LoadVar(u8, ConstId),
    StoreVar(u8, ConstId),
    /// Declare in the current frame (let/const/param binding).
    DeclareVar(ConstId),
    /// Read a global binding.
    LoadGlobal(ConstId),

    /// Read/write another module's export field.
    LoadExport(u16, ConstId),
    StoreExport(u16, ConstId),
    /// Push a module's namespace object.
    LoadModuleNs(u16),
    /// Push a built-in host module namespace by specifier.
    LoadHostModule(ConstId),

    MakeArray(u16),
    /// Pops 2n stack values (key, value pairs, bottom-first).
    MakeObject(u16),
    /// Append the popped iterable's elements to the array below it.
    SpreadInto,
    /// Copy the popped value's own properties into the object below it.
    SpreadObject,
    /// Stack `obj, key, value` → `obj`, setting the entry.
    SetEntry,

    GetProp(ConstId),
    SetProp(ConstId),
    GetIndex,
    SetIndex,
    DeleteProp(ConstId),

    /// Stack: callee, this, args... → result.
    Call(u8),
    /// Stack: receiver, args... → result. Looks up the method and binds
    /// the receiver.
    CallMethod(ConstId, u8),
    /// Stack: class, args... → instance.
    New(u8),
    /// Invoke the superclass constructor over the current `this`.
    /// Stack: args... → undefined.
    SuperCall(u8),
    /// Look up a method on the superclass of the defining class.
    SuperGet(ConstId),

    Jump(u32),
    JumpIfFalse(u32),
    JumpIfTrue(u32),
    /// Peeks (does not pop) for `??` / `?.`-style chains.
    JumpIfNullish(u32),
    /// Pops; jumps when the value is not `undefined` (default params).
    JumpIfNotUndefined(u32),

    BinOp(BinOp),
    UnOp(UnOp),
    /// `typeof` of a possibly-unbound global name (never throws).
    TypeOfGlobal(ConstId),

    LoadThis,
    Return,
    Throw,

    /// Create a closure over the current frame chain.
    MakeClosure(FunctionId),
    /// Instantiate a class definition (resolving its member bodies in
    /// the current frame chain) and push the class value.
    MakeClass(ClassId),

    /// Iteration protocol: value → iterator handle.
    GetIter,
    /// iterator → iterator, value, done.
    IterNext,
    /// value → array of own enumerable keys (for-in).
    OwnKeys,

    // --- State machines ---------------------------------------------------
    /// Record the resumption state on the machine instance.
    SetState(u32),
    /// Await: pops the awaited value. A promise parks the machine and
    /// returns from `step`; anything else pushes the value and jumps to
    /// `after` (skipping the resume sequence).
    AwaitSuspend { after: u32 },
    /// Yield: pops the yielded value, hands it to the driver, and
    /// returns from `step`.
    YieldSuspend,
    /// Re-entry point: pushes the resume value, or throws the resume
    /// error, or unwinds a generator `return`.
    Resume,
    /// Dispatch on the machine's recorded state. Index = state, value =
    /// target pc; state 0 falls through.
    StateDispatch(Vec<u32>),
    /// Settle the machine's result promise with the popped value and
    /// finish the step.
    AsyncReturn,
    /// Finish a generator: popped value becomes `{ value, done: true }`.
    GenReturn,

    /// Enum member definition: stack `obj, value` → `obj`. Installs the
    /// member and, for numeric values, the reverse mapping.
    EnumAdd(ConstId),

    /// Raise a host error (unreachable markers, unsupported paths).
    Trap(ConstId),
}

/// Argc sentinel marking a spread call: the single pushed argument is
/// an array to expand into the argument list.
pub const ARGC_SPREAD: u8 = 0xff;

/// A pc-range exception handler: throws inside `[try_start, try_end)`
/// transfer to `catch_pc` with the thrown value pushed.
#[derive(Clone, Debug, Serialize)]
pub struct Handler {
    pub try_start: u32,
    pub try_end: u32,
    pub catch_pc: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FunctionKind {
    Plain,
    /// Wrapper that allocates a state machine and returns its promise.
    AsyncWrapper,
    /// Wrapper that allocates a state machine and returns its iterator.
    GeneratorWrapper,
    /// A state machine `step` body.
    Step,
}

#[derive(Clone, Debug, Serialize)]
pub struct FunctionDef {
    pub name: String,
    pub kind: FunctionKind,
    pub params: Vec<String>,
    /// Rest parameter name, collecting the argument tail.
    pub rest_param: Option<String>,
    pub code: Vec<Instr>,
    pub handlers: Vec<Handler>,
    /// For wrappers: the state-machine class to instantiate.
    pub machine: Option<ClassId>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub readonly: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClassDef {
    pub name: String,
    pub parent: Option<ClassId>,
    pub is_abstract: bool,
    /// Constructor body; when absent, construction forwards to the
    /// parent and then runs `field_init`.
    pub ctor: Option<FunctionId>,
    /// Field initializers for classes without their own constructor
    /// (classes with one inline the initializers after `super()`).
    pub field_init: Option<FunctionId>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<(String, FunctionId)>,
    pub getters: Vec<(String, FunctionId)>,
    pub setters: Vec<(String, FunctionId)>,
    pub static_methods: Vec<(String, FunctionId)>,
    /// `step` method for state-machine classes.
    pub step: Option<FunctionId>,
    pub is_state_machine: bool,
}

/// A complete produced module.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BytecodeModule {
    pub constants: Vec<Constant>,
    pub functions: Vec<FunctionDef>,
    pub classes: Vec<ClassDef>,
    /// Source module specifiers, indexed by the u16 in
    /// `LoadExport`/`StoreExport`.
    pub module_specifiers: Vec<String>,
    /// Static initializers, one per module, in initialization order.
    pub module_inits: Vec<FunctionId>,
}

impl BytecodeModule {
    pub fn constant(&self, id: ConstId) -> &Constant {
        &self.constants[id.0 as usize]
    }

    pub fn function(&self, id: FunctionId) -> &FunctionDef {
        &self.functions[id.0 as usize]
    }

    pub fn class(&self, id: ClassId) -> &ClassDef {
        &self.classes[id.0 as usize]
    }

    /// Stable textual dump for debugging and tests.
    pub fn debug_dump(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
