//! Function, state-machine, and class lowering.

use tsr_parser::ast::{
    ClassMemberKind, FuncBody, Function, MethodKind, Modifiers,
};
use tsr_parser::FuncId as AstFuncId;

use crate::bytecode::{
    ClassDef, ClassId, Constant, FieldDef, FunctionDef, FunctionId, FunctionKind, Instr,
};

use super::{Emitter, FuncCtx, Resolution};

/// Field initializers awaiting their post-`super()` slot in a
/// constructor body.
pub(crate) struct PendingFieldInits {
    pub fields: Vec<(String, Option<tsr_parser::ExprId>)>,
}

impl<'a> Emitter<'a> {
    /// Emit a function definition, routing async/generator bodies
    /// through the state-machine lowering.
    pub(crate) fn emit_function(&mut self, func_id: AstFuncId) -> FunctionId {
        let func = self.arena().func(func_id).clone();
        if func.is_async || func.is_generator {
            self.emit_state_machine(&func)
        } else {
            self.emit_plain_function(&func, FunctionKind::Plain, None)
        }
    }

    fn function_name(func: &Function) -> String {
        func.name
            .clone()
            .map(|n| n.to_string())
            .unwrap_or_default()
    }

    /// Shared body emission: parameter defaults, hoisting, statements,
    /// and the epilogue appropriate to the function kind.
    pub(crate) fn emit_plain_function(
        &mut self,
        func: &Function,
        kind: FunctionKind,
        pending_inits: Option<PendingFieldInits>,
    ) -> FunctionId {
        self.funcs.push(FuncCtx::new(func.is_async, func.is_generator));

        let mut params = Vec::new();
        let mut rest_param = None;
        for param in &func.params {
            let mangled = self.declare(&param.name);
            if param.rest {
                rest_param = Some(mangled);
            } else {
                params.push(mangled);
            }
        }
        if kind == FunctionKind::Step {
            // Re-entry dispatch, patched once all states are known.
            self.push_instr(Instr::StateDispatch(Vec::new()));
        }

        // Defaults: `p = d` applies when the bound argument is
        // undefined.
        for param in &func.params {
            if let Some(default) = param.default {
                let name_id = {
                    let resolution = self.resolve(&param.name);
                    match resolution {
                        Resolution::Var(_, mangled) => self.const_string(&mangled),
                        _ => self.const_string(&param.name),
                    }
                };
                self.push_instr(Instr::LoadVar(0, name_id));
                let skip = self.push_instr(Instr::JumpIfNotUndefined(0));
                self.emit_expr(default);
                self.push_instr(Instr::StoreVar(0, name_id));
                self.f().patch_jump(skip);
            }
        }

        // Base-class constructors run field initializers up front;
        // derived ones wait for `super()` (see the super-call emission).
        let saved_pending = self.pending_field_inits.take();
        if let Some(inits) = pending_inits {
            if self.ctor_awaits_super() {
                self.pending_field_inits = Some(inits.fields);
            } else {
                self.emit_field_inits(&inits.fields);
            }
        }

        match &func.body {
            Some(FuncBody::Block(stmts)) => {
                self.hoist_into_scope(stmts);
                for &stmt in &stmts.clone() {
                    self.emit_stmt(stmt);
                }
            }
            Some(FuncBody::Expr(expr)) => {
                self.emit_expr(*expr);
                if kind == FunctionKind::Step && func.is_async {
                    self.push_instr(Instr::AsyncReturn);
                } else {
                    self.push_instr(Instr::Return);
                }
            }
            None => {}
        }
        self.pending_field_inits = saved_pending;

        // Epilogue: fall-off-the-end completion.
        let undefined = self.const_simple(Constant::Undefined);
        self.push_instr(Instr::Const(undefined));
        match kind {
            FunctionKind::Step if func.is_generator => {
                self.push_instr(Instr::GenReturn);
            }
            FunctionKind::Step => {
                self.push_instr(Instr::AsyncReturn);
            }
            _ => {
                self.push_instr(Instr::Return);
            }
        }

        let mut ctx = self.funcs.pop().expect("function context");
        if kind == FunctionKind::Step {
            let states = ctx.states.take().unwrap_or_default();
            let table: Vec<u32> = states.iter().map(|&pc| pc as u32).collect();
            ctx.code[0] = Instr::StateDispatch(table);
        }
        let id = FunctionId(self.out.functions.len() as u32);
        self.out.functions.push(FunctionDef {
            name: Self::function_name(func),
            kind,
            params,
            rest_param,
            code: ctx.code,
            handlers: ctx.handlers,
            machine: None,
        });
        id
    }

    /// Whether the current constructor body defers field initializers
    /// until `super()`.
    fn ctor_awaits_super(&self) -> bool {
        self.current_class_has_parent
    }

    pub(crate) fn emit_field_inits(&mut self, fields: &[(String, Option<tsr_parser::ExprId>)]) {
        for (name, init) in fields {
            // Parameter properties copy the bound parameter into the
            // field of the same name.
            if let Some(param) = name.strip_prefix("\u{1}param:") {
                self.push_instr(Instr::LoadThis);
                let param = param.to_string();
                self.emit_load_name(&param);
                let name_id = self.const_string(&param);
                self.push_instr(Instr::SetProp(name_id));
                continue;
            }
            self.push_instr(Instr::LoadThis);
            match init {
                Some(init) => self.emit_expr(*init),
                None => {
                    let undefined = self.const_simple(Constant::Undefined);
                    self.push_instr(Instr::Const(undefined));
                }
            }
            let name_id = self.const_string(name);
            self.push_instr(Instr::SetProp(name_id));
        }
    }

    // =========================================================================
    // Async / generator state machines
    // =========================================================================

    /// Lower an async or generator function into a state-machine class
    /// plus a wrapper that instantiates it.
    fn emit_state_machine(&mut self, func: &Function) -> FunctionId {
        // The step body: same parameters (they live in the machine's
        // frame, bound by the wrapper), lowered with suspension points.
        let step = self.emit_plain_function(func, FunctionKind::Step, None);

        let machine_name = format!("{}$sm", Self::function_name(func));
        let machine = ClassId(self.out.classes.len() as u32);
        self.out.classes.push(ClassDef {
            name: machine_name,
            parent: None,
            is_abstract: false,
            ctor: None,
            field_init: None,
            fields: Vec::new(),
            methods: Vec::new(),
            getters: Vec::new(),
            setters: Vec::new(),
            static_methods: Vec::new(),
            step: Some(step),
            is_state_machine: true,
        });

        let wrapper_kind = if func.is_generator {
            FunctionKind::GeneratorWrapper
        } else {
            FunctionKind::AsyncWrapper
        };
        let mut params = Vec::new();
        let mut rest_param = None;
        for param in &func.params {
            if param.rest {
                rest_param = Some(param.name.to_string());
            } else {
                params.push(param.name.to_string());
            }
        }
        let id = FunctionId(self.out.functions.len() as u32);
        self.out.functions.push(FunctionDef {
            name: Self::function_name(func),
            kind: wrapper_kind,
            params,
            rest_param,
            code: Vec::new(),
            handlers: Vec::new(),
            machine: Some(machine),
        });
        id
    }

    /// Reserve a suspension state; its resume pc is recorded once the
    /// resume sequence is emitted.
    pub(crate) fn reserve_state(&mut self) -> u32 {
        let func = self.f();
        let states = func.states.get_or_insert_with(Vec::new);
        states.push(0);
        states.len() as u32
    }

    pub(crate) fn record_state_pc(&mut self, state: u32, pc: u32) {
        let func = self.f();
        if let Some(states) = func.states.as_mut() {
            states[(state - 1) as usize] = pc as usize;
        }
    }

    // =========================================================================
    // Classes
    // =========================================================================

    /// Emit a class declaration, returning its table id.
    pub(crate) fn emit_class(&mut self, class_id: tsr_parser::ClassId) -> ClassId {
        let class = self.arena().class(class_id).clone();

        // Parent: must resolve statically (possibly across modules).
        let parent = class.superclass.and_then(|superclass| {
            let arena = self.arena();
            match &arena.expr(superclass).kind {
                tsr_parser::ast::ExprKind::Ident(name) => {
                    self.resolve_class_by_name(name)
                }
                _ => None,
            }
        });

        let mut fields = Vec::new();
        let mut instance_field_inits: Vec<(String, Option<tsr_parser::ExprId>)> = Vec::new();
        let mut methods = Vec::new();
        let mut getters = Vec::new();
        let mut setters = Vec::new();
        let mut static_methods = Vec::new();
        let mut static_field_stmts: Vec<(String, Option<tsr_parser::ExprId>)> = Vec::new();
        let mut ctor_func: Option<AstFuncId> = None;
        let mut param_props: Vec<(String, bool)> = Vec::new();

        for member in &class.members {
            let is_static = member.modifiers.contains(Modifiers::STATIC);
            match &member.kind {
                ClassMemberKind::Field { key, init, .. } => {
                    let Some(name) = key.static_name() else { continue };
                    if is_static {
                        static_field_stmts.push((name, *init));
                    } else {
                        fields.push(FieldDef {
                            name: name.clone(),
                            readonly: member.modifiers.contains(Modifiers::READONLY),
                        });
                        instance_field_inits.push((name, *init));
                    }
                }
                ClassMemberKind::Method { key, kind, func } => {
                    let Some(name) = key.static_name() else { continue };
                    // Abstract members are not emitted.
                    if self.arena().func(*func).body.is_none() {
                        continue;
                    }
                    match kind {
                        MethodKind::Constructor => {
                            ctor_func = Some(*func);
                            let params = self.arena().func(*func).params.clone();
                            for param in &params {
                                if param.modifiers.has_access_modifier()
                                    || param.modifiers.contains(Modifiers::READONLY)
                                {
                                    let readonly =
                                        param.modifiers.contains(Modifiers::READONLY);
                                    param_props.push((param.name.to_string(), readonly));
                                    fields.push(FieldDef {
                                        name: param.name.to_string(),
                                        readonly,
                                    });
                                }
                            }
                        }
                        MethodKind::Getter => {
                            let id = self.emit_method(*func);
                            getters.push((name, id));
                        }
                        MethodKind::Setter => {
                            let id = self.emit_method(*func);
                            setters.push((name, id));
                        }
                        MethodKind::Method => {
                            let id = self.emit_method(*func);
                            if is_static {
                                static_methods.push((name, id));
                            } else {
                                methods.push((name, id));
                            }
                        }
                    }
                }
                ClassMemberKind::IndexSignature { .. } => {}
            }
        }

        // Constructor: user constructor inlines parameter properties
        // and field initializers; absent one defers to `field_init`.
        let has_parent = parent.is_some();
        let (ctor, field_init) = match ctor_func {
            Some(func_id) => {
                let func = self.arena().func(func_id).clone();
                let saved = self.current_class_has_parent;
                self.current_class_has_parent = has_parent;
                // Parameter property stores prepend the field list.
                let mut inits: Vec<(String, Option<tsr_parser::ExprId>)> = Vec::new();
                for (name, _) in &param_props {
                    // Stored from the bound parameter at body start.
                    inits.push((format!("\u{1}param:{name}"), None));
                }
                inits.extend(instance_field_inits.clone());
                let id = self.emit_plain_function(
                    &func,
                    FunctionKind::Plain,
                    Some(PendingFieldInits { fields: inits }),
                );
                self.current_class_has_parent = saved;
                (Some(id), None)
            }
            None => {
                if instance_field_inits.is_empty() {
                    (None, None)
                } else {
                    let id = self.emit_init_only_function(&instance_field_inits);
                    (None, Some(id))
                }
            }
        };

        let id = ClassId(self.out.classes.len() as u32);
        self.out.classes.push(ClassDef {
            name: class.name.to_string(),
            parent,
            is_abstract: class.is_abstract,
            ctor,
            field_init,
            fields,
            methods,
            getters,
            setters,
            static_methods,
            step: None,
            is_state_machine: false,
        });
        self.class_ids
            .insert((self.module, class.name.to_string()), id);

        // Static fields run at definition time; the emitter's caller
        // (`emit_stmt` for class declarations) emits them after
        // MakeClass, via `emit_static_fields`.
        self.deferred_static_fields = static_field_stmts;
        id
    }

    fn emit_method(&mut self, func_id: AstFuncId) -> FunctionId {
        self.emit_function(func_id)
    }

    /// A function running only field initializers (classes that inherit
    /// their constructor).
    fn emit_init_only_function(
        &mut self,
        fields: &[(String, Option<tsr_parser::ExprId>)],
    ) -> FunctionId {
        self.funcs.push(FuncCtx::new(false, false));
        self.emit_field_inits(fields);
        let undefined = self.const_simple(Constant::Undefined);
        self.push_instr(Instr::Const(undefined));
        self.push_instr(Instr::Return);
        let ctx = self.funcs.pop().expect("function context");
        let id = FunctionId(self.out.functions.len() as u32);
        self.out.functions.push(FunctionDef {
            name: "<fields>".to_string(),
            kind: FunctionKind::Plain,
            params: Vec::new(),
            rest_param: None,
            code: ctx.code,
            handlers: ctx.handlers,
            machine: None,
        });
        id
    }

    /// Resolve a class name (local or imported) to its emitted id.
    fn resolve_class_by_name(&self, name: &str) -> Option<ClassId> {
        if let Some(&id) = self.class_ids.get(&(self.module, name.to_string())) {
            return Some(id);
        }
        // Imported class: follow the import binding to its source
        // module's class of the exported name.
        if let Some(Resolution::Export(target, export)) = self.imports.get(name) {
            if let Some(&id) = self.class_ids.get(&(u32::from(*target), export.clone())) {
                return Some(id);
            }
        }
        None
    }
}
