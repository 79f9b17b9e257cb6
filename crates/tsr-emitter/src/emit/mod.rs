//! Lowering from the checked AST to the bytecode module.
//!
//! Variables live in per-function heap frame objects, so closures and
//! state machines share one mechanism: a closure captures the frame
//! chain, and an async/generator state machine keeps its function frame
//! as a field, which is exactly the "locals live across suspension are
//! promoted to fields" lowering. Block-scoped shadowing is resolved at
//! emit time by name mangling within the function.
//!
//! `try`/`finally` lowers by duplicating the finally block on every
//! exit path (normal fall-through, catch re-throw, and early
//! return/break/continue), with a pc-range handler table covering the
//! protected regions.

mod exprs;
mod funcs;
mod stmts;

use rustc_hash::FxHashMap;
use tracing::debug;
use tsr_parser::ast::StmtKind;
use tsr_resolver::ModuleGraph;

use crate::bytecode::{
    BytecodeModule, ClassId, ConstId, Constant, FunctionDef, FunctionId, FunctionKind, Handler,
    Instr,
};

/// Emit a whole program.
pub fn emit_program(graph: &ModuleGraph) -> BytecodeModule {
    let mut emitter = Emitter::new(graph);
    for index in 0..graph.modules.len() {
        emitter.emit_module(index);
    }
    debug!(
        functions = emitter.out.functions.len(),
        classes = emitter.out.classes.len(),
        "emission complete"
    );
    emitter.out
}

/// Where an identifier resolves at emit time.
#[derive(Clone, Debug)]
pub(crate) enum Resolution {
    /// Frame-chain variable: (depth, mangled name).
    Var(u8, String),
    /// Import binding aliasing another module's export field.
    Export(u16, String),
    /// Built-in host module namespace bound by an import.
    HostModule(String),
    /// A named member of a built-in host module.
    HostMember(String, String),
    /// Whole-module namespace import.
    ModuleNs(u16),
    /// Unresolved: falls back to a global lookup.
    Global,
}

/// One lexical block scope within a function.
#[derive(Default)]
pub(crate) struct BlockScope {
    /// Source name → mangled frame name.
    pub names: FxHashMap<String, String>,
}

/// Loop (or switch) context for break/continue patching.
pub(crate) struct LoopCtx {
    pub label: Option<String>,
    pub continue_pc: Option<u32>,
    /// Jumps to patch to the continue target (when not yet known).
    pub continue_patches: Vec<usize>,
    pub break_patches: Vec<usize>,
    /// Depth of the finally stack at loop entry; early exits re-emit
    /// finallies above this depth.
    pub finally_depth: usize,
    /// `false` for switch contexts: `break` targets them, `continue`
    /// skips past to the enclosing loop.
    pub is_loop: bool,
}

/// Per-function emission state.
pub(crate) struct FuncCtx {
    pub code: Vec<Instr>,
    pub handlers: Vec<Handler>,
    pub scopes: Vec<BlockScope>,
    pub loops: Vec<LoopCtx>,
    /// Bodies of enclosing `finally` blocks, innermost last, re-emitted
    /// on early exits.
    pub finally_stack: Vec<Vec<tsr_parser::StmtId>>,
    /// Mangle counter for shadowed names.
    pub mangle: u32,
    /// State machine bookkeeping: next state index; `None` for plain
    /// functions.
    pub states: Option<Vec<usize>>,
    pub is_async: bool,
    pub is_generator: bool,
}

impl FuncCtx {
    pub fn new(is_async: bool, is_generator: bool) -> Self {
        FuncCtx {
            code: Vec::new(),
            handlers: Vec::new(),
            scopes: vec![BlockScope::default()],
            loops: Vec::new(),
            finally_stack: Vec::new(),
            mangle: 0,
            states: if is_async || is_generator {
                Some(Vec::new())
            } else {
                None
            },
            is_async,
            is_generator,
        }
    }

    pub fn pc(&self) -> u32 {
        self.code.len() as u32
    }

    pub fn push(&mut self, instr: Instr) -> usize {
        self.code.push(instr);
        self.code.len() - 1
    }

    /// Patch a previously pushed jump to the current pc.
    pub fn patch_jump(&mut self, at: usize) {
        let target = self.pc();
        match &mut self.code[at] {
            Instr::Jump(t)
            | Instr::JumpIfFalse(t)
            | Instr::JumpIfTrue(t)
            | Instr::JumpIfNullish(t)
            | Instr::JumpIfNotUndefined(t) => *t = target,
            Instr::AwaitSuspend { after } => *after = target,
            other => unreachable!("patching non-jump {other:?}"),
        }
    }
}

pub(crate) struct Emitter<'a> {
    pub graph: &'a ModuleGraph,
    pub out: BytecodeModule,
    const_ids: FxHashMap<String, ConstId>,
    /// Current module being emitted.
    pub module: u32,
    /// Import resolution for the current module.
    pub imports: FxHashMap<String, Resolution>,
    /// Function emission stack; the last entry is the innermost
    /// function.
    pub funcs: Vec<FuncCtx>,
    /// Class ids per (module, class name) for direct construction.
    pub class_ids: FxHashMap<(u32, String), ClassId>,
    /// Field initializers waiting for `super()` in the constructor
    /// being emitted.
    pub(crate) pending_field_inits: Option<Vec<(String, Option<tsr_parser::ExprId>)>>,
    /// Whether the class whose constructor is being emitted has a
    /// superclass.
    pub(crate) current_class_has_parent: bool,
    /// Static field initializers of the most recently emitted class,
    /// applied right after `MakeClass`.
    pub(crate) deferred_static_fields: Vec<(String, Option<tsr_parser::ExprId>)>,
}

impl<'a> Emitter<'a> {
    pub fn new(graph: &'a ModuleGraph) -> Self {
        let mut out = BytecodeModule::default();
        out.module_specifiers = graph
            .modules
            .iter()
            .map(|m| m.specifier.clone())
            .collect();
        Emitter {
            graph,
            out,
            const_ids: FxHashMap::default(),
            module: 0,
            imports: FxHashMap::default(),
            funcs: Vec::new(),
            class_ids: FxHashMap::default(),
            pending_field_inits: None,
            current_class_has_parent: false,
            deferred_static_fields: Vec::new(),
        }
    }

    pub fn arena(&self) -> &'a tsr_parser::Arena {
        &self.graph.modules[self.module as usize].ast.arena
    }

    // =========================================================================
    // Constants
    // =========================================================================

    pub fn const_string(&mut self, s: &str) -> ConstId {
        if let Some(&id) = self.const_ids.get(s) {
            return id;
        }
        let id = ConstId(self.out.constants.len() as u32);
        self.out.constants.push(Constant::String(s.to_string()));
        self.const_ids.insert(s.to_string(), id);
        id
    }

    pub fn const_number(&mut self, n: f64) -> ConstId {
        let id = ConstId(self.out.constants.len() as u32);
        self.out.constants.push(Constant::Number(n));
        id
    }

    pub fn const_simple(&mut self, constant: Constant) -> ConstId {
        let id = ConstId(self.out.constants.len() as u32);
        self.out.constants.push(constant);
        id
    }

    // =========================================================================
    // Function-context helpers
    // =========================================================================

    pub fn f(&mut self) -> &mut FuncCtx {
        self.funcs.last_mut().expect("function context")
    }

    pub fn push_instr(&mut self, instr: Instr) -> usize {
        self.f().push(instr)
    }

    pub fn enter_block(&mut self) {
        self.f().scopes.push(BlockScope::default());
    }

    pub fn exit_block(&mut self) {
        self.f().scopes.pop();
    }

    /// Declare a name in the innermost block, mangling shadowed names
    /// so every binding has a unique slot in the function frame.
    pub fn declare(&mut self, name: &str) -> String {
        let func = self.funcs.last_mut().expect("function context");
        let shadowed = func
            .scopes
            .iter()
            .any(|scope| scope.names.contains_key(name));
        let mangled = if shadowed {
            func.mangle += 1;
            format!("{name}#{}", func.mangle)
        } else {
            name.to_string()
        };
        func.scopes
            .last_mut()
            .expect("block scope")
            .names
            .insert(name.to_string(), mangled.clone());
        mangled
    }

    /// Resolve an identifier: block scopes of the current function,
    /// then enclosing functions (frame depth), then imports, then
    /// global fallback.
    pub fn resolve(&self, name: &str) -> Resolution {
        for (distance, func) in self.funcs.iter().rev().enumerate() {
            for scope in func.scopes.iter().rev() {
                if let Some(mangled) = scope.names.get(name) {
                    return Resolution::Var(distance as u8, mangled.clone());
                }
            }
        }
        if let Some(resolution) = self.imports.get(name) {
            return resolution.clone();
        }
        Resolution::Global
    }

    pub fn emit_load_name(&mut self, name: &str) {
        match self.resolve(name) {
            Resolution::Var(depth, mangled) => {
                let id = self.const_string(&mangled);
                self.push_instr(Instr::LoadVar(depth, id));
            }
            Resolution::Export(module, export) => {
                let id = self.const_string(&export);
                self.push_instr(Instr::LoadExport(module, id));
            }
            Resolution::HostModule(specifier) => {
                let id = self.const_string(&specifier);
                self.push_instr(Instr::LoadHostModule(id));
            }
            Resolution::HostMember(specifier, member) => {
                let id = self.const_string(&specifier);
                self.push_instr(Instr::LoadHostModule(id));
                let member_id = self.const_string(&member);
                self.push_instr(Instr::GetProp(member_id));
            }
            Resolution::ModuleNs(module) => {
                self.push_instr(Instr::LoadModuleNs(module));
            }
            Resolution::Global => {
                let id = self.const_string(name);
                self.push_instr(Instr::LoadGlobal(id));
            }
        }
    }

    pub fn emit_store_name(&mut self, name: &str) {
        match self.resolve(name) {
            Resolution::Var(depth, mangled) => {
                let id = self.const_string(&mangled);
                self.push_instr(Instr::StoreVar(depth, id));
            }
            Resolution::Export(module, export) => {
                let id = self.const_string(&export);
                self.push_instr(Instr::StoreExport(module, id));
            }
            _ => {
                // Assigning an unresolved name: declare it in the
                // current frame so execution can proceed.
                let id = self.const_string(name);
                self.push_instr(Instr::StoreVar(0, id));
            }
        }
    }

    // =========================================================================
    // Modules
    // =========================================================================

    pub fn emit_module(&mut self, index: usize) {
        self.module = index as u32;
        self.imports.clear();
        debug!(
            module = self.graph.modules[index].specifier,
            "emitting module"
        );

        // Bind imports to export-field references (live bindings).
        let statements = self.graph.modules[index].ast.statements.clone();
        for &stmt in &statements {
            if let StmtKind::Import { kind, specifier } =
                self.arena().stmt(stmt).kind.clone()
            {
                self.bind_import(&kind, &specifier);
            }
        }

        self.funcs.push(FuncCtx::new(false, false));
        self.hoist_into_scope(&statements);
        for &stmt in &statements {
            self.emit_stmt(stmt);
        }
        // Publish declaration exports after the body, mirroring the
        // interpreter's final sync.
        for &stmt in &statements {
            self.emit_export_sync(stmt);
        }
        let undefined = self.const_simple(Constant::Undefined);
        self.push_instr(Instr::Const(undefined));
        self.push_instr(Instr::Return);

        let func = self.funcs.pop().expect("module function");
        let id = FunctionId(self.out.functions.len() as u32);
        self.out.functions.push(FunctionDef {
            name: format!("{}::init", self.graph.modules[index].specifier),
            kind: FunctionKind::Plain,
            params: Vec::new(),
            rest_param: None,
            code: func.code,
            handlers: func.handlers,
            machine: None,
        });
        self.out.module_inits.push(id);
    }

    fn bind_import(&mut self, kind: &tsr_parser::ast::ImportKind, specifier: &str) {
        use tsr_parser::ast::ImportKind;
        let resolved = tsr_resolver::resolve_specifier(
            &self.graph.modules[self.module as usize].specifier,
            specifier,
        );
        if tsr_resolver::is_builtin_module(&resolved) {
            match kind {
                ImportKind::SideEffect => {}
                ImportKind::EqualsRequire { local } => {
                    self.imports.insert(
                        local.to_string(),
                        Resolution::HostModule(resolved.clone()),
                    );
                }
                ImportKind::Clause {
                    default,
                    namespace,
                    named,
                } => {
                    for binding in default.iter().chain(namespace.iter()) {
                        self.imports.insert(
                            binding.to_string(),
                            Resolution::HostModule(resolved.clone()),
                        );
                    }
                    for spec in named {
                        self.imports.insert(
                            spec.local.to_string(),
                            Resolution::HostMember(
                                resolved.clone(),
                                spec.imported.to_string(),
                            ),
                        );
                    }
                }
            }
            return;
        }
        let Some(target) = self.graph.by_specifier(&resolved) else {
            return;
        };
        let target_index = target.id.0 as u16;
        match kind {
            ImportKind::SideEffect => {}
            ImportKind::EqualsRequire { local } => {
                let has_assignment = target.exports.has_export_assignment;
                let export = if has_assignment { "=" } else { "default" };
                self.imports.insert(
                    local.to_string(),
                    Resolution::Export(target_index, export.to_string()),
                );
            }
            ImportKind::Clause {
                default,
                namespace,
                named,
            } => {
                if let Some(default) = default {
                    self.imports.insert(
                        default.to_string(),
                        Resolution::Export(target_index, "default".to_string()),
                    );
                }
                if let Some(namespace) = namespace {
                    self.imports
                        .insert(namespace.to_string(), Resolution::ModuleNs(target_index));
                }
                for spec in named {
                    self.imports.insert(
                        spec.local.to_string(),
                        Resolution::Export(target_index, spec.imported.to_string()),
                    );
                }
            }
        }
    }
}
