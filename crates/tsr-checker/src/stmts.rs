//! Statement and declaration checking, in module initialization order.
//!
//! Each module runs three passes so declarations are order-independent:
//! 1. hoist declaration shells (classes, interfaces, aliases, enums,
//!    functions) and bind imports;
//! 2. fill in signatures (heritage, member types, alias bodies);
//! 3. check statement bodies in source order.

use rustc_hash::FxHashMap;
use tracing::debug;
use tsr_common::diagnostics::codes;
use tsr_parser::ast::{
    ClassMemberKind, ExprId, ExprKind, FuncId, ImportKind, MethodKind, Modifiers, StmtId,
    StmtKind, VarKind,
};
use tsr_resolver::ImportTarget;

use crate::builtins;
use crate::context::{CheckerContext, ScopeKind, TypeBinding};
use crate::narrowing::{extract_guard, guard_target, narrow_type};
use crate::operations::member_type;
use crate::relate::is_method_assignable;
use crate::types::{
    ClassDef, ClassDefId, EnumDef, FunctionType, InterfaceDef, ParamInfo, PropInfo, TypeId,
    TypeKind,
};

impl<'a> CheckerContext<'a> {
    pub fn check_module(&mut self, index: usize) {
        self.current_module = index as u32;
        debug!(module = self.module_specifier(), "checking module");
        self.push_scope(ScopeKind::Module);

        let statements = self.graph.modules[index].ast.statements.clone();
        self.hoist_declarations(&statements);
        self.fill_signatures(&statements);
        for &stmt in &statements {
            self.check_stmt(stmt);
        }
        self.collect_exports(&statements);
        self.pop_scope();
    }

    fn unwrap_export(&self, stmt: StmtId) -> StmtId {
        match &self.graph.modules[self.current_module as usize]
            .ast
            .arena
            .stmt(stmt)
            .kind
        {
            StmtKind::ExportDecl(inner) => *inner,
            _ => stmt,
        }
    }

    // =========================================================================
    // Pass 1: hoisting
    // =========================================================================

    fn hoist_declarations(&mut self, statements: &[StmtId]) {
        let module_index = self.current_module as usize;
        for &stmt in statements {
            let stmt = self.unwrap_export(stmt);
            let kind = self.graph.modules[module_index].ast.arena.stmt(stmt).kind.clone();
            match kind {
                StmtKind::ClassDecl(class_id) => {
                    let class = self.graph.modules[module_index].ast.arena.class(class_id);
                    let name = class.name.to_string();
                    let is_abstract = class.is_abstract;
                    let def = self.table.add_class(ClassDef {
                        name: name.clone(),
                        module: self.module_specifier().to_string(),
                        is_abstract,
                        ..ClassDef::default()
                    });
                    self.declare_type(&name, TypeBinding::Class(def));
                    let class_ty = self.table.intern(TypeKind::Class(def));
                    self.declare_value(&name, class_ty, false);
                }
                StmtKind::InterfaceDecl(interface_id) => {
                    let name = self.graph.modules[module_index]
                        .ast
                        .arena
                        .interface(interface_id)
                        .name
                        .to_string();
                    // Merging: reuse an existing same-module definition.
                    match self.lookup_type(&name) {
                        Some(TypeBinding::Interface(_)) => {}
                        _ => {
                            let def = self.table.add_interface(InterfaceDef {
                                name: name.clone(),
                                module: self.module_specifier().to_string(),
                                ..InterfaceDef::default()
                            });
                            self.declare_type(&name, TypeBinding::Interface(def));
                        }
                    }
                }
                StmtKind::TypeAlias { name, .. } => {
                    let any = self.table.any();
                    self.declare_type(
                        &name,
                        TypeBinding::Alias {
                            type_params: Vec::new(),
                            body: any,
                        },
                    );
                }
                StmtKind::EnumDecl { name, members } => {
                    let def = self.table.add_enum(EnumDef {
                        name: name.to_string(),
                        module: self.module_specifier().to_string(),
                        ..EnumDef::default()
                    });
                    let enum_ty = self.table.intern(TypeKind::Enum(def));
                    for member in &members {
                        self.table.enums[def.0 as usize]
                            .members
                            .insert(member.name.to_string(), enum_ty);
                    }
                    self.declare_type(&name, TypeBinding::Enum(def));
                    self.declare_value(&name, enum_ty, false);
                }
                StmtKind::FunctionDecl { name, .. } => {
                    let any = self.table.any();
                    self.declare_value(&name, any, false);
                }
                StmtKind::Import { kind, specifier } => {
                    self.bind_import(&kind, &specifier);
                }
                _ => {}
            }
        }
    }

    fn bind_import(&mut self, kind: &ImportKind, specifier: &str) {
        let module_index = self.current_module as usize;
        let resolved = tsr_resolver::resolve_specifier(
            &self.graph.modules[module_index].specifier,
            specifier,
        );
        let record = self.graph.modules[module_index]
            .imports
            .iter()
            .find(|i| i.raw == resolved);
        let target = record.map(|r| r.target);

        match target {
            Some(ImportTarget::Builtin) => {
                let ns = builtins::host_module_type(&mut self.table, &resolved);
                match kind {
                    ImportKind::SideEffect => {}
                    ImportKind::EqualsRequire { local } => self.declare_value(local, ns, false),
                    ImportKind::Clause {
                        default,
                        namespace,
                        named,
                    } => {
                        if let Some(default) = default {
                            self.declare_value(default, ns, false);
                        }
                        if let Some(namespace) = namespace {
                            self.declare_value(namespace, ns, false);
                        }
                        for spec in named {
                            let any = self.table.any();
                            self.declare_value(&spec.local, any, false);
                        }
                    }
                }
            }
            Some(ImportTarget::Module(target_id)) => {
                let target_index = target_id.index();
                match kind {
                    ImportKind::SideEffect => {}
                    ImportKind::EqualsRequire { local } => {
                        let ty = self.module_export_assignments[target_index]
                            .or(self.module_default_exports[target_index])
                            .unwrap_or_else(|| self.table.any());
                        self.declare_value(local, ty, false);
                    }
                    ImportKind::Clause {
                        default,
                        namespace,
                        named,
                    } => {
                        if let Some(default) = default {
                            let ty = self.module_default_exports[target_index]
                                .or(self.module_export_assignments[target_index])
                                .unwrap_or_else(|| self.table.any());
                            self.declare_value(default, ty, false);
                        }
                        if let Some(namespace) = namespace {
                            let exports = self.module_exports[target_index].clone();
                            let props = exports
                                .into_iter()
                                .map(|(name, ty)| {
                                    (
                                        name.into(),
                                        PropInfo {
                                            ty,
                                            optional: false,
                                            readonly: true,
                                        },
                                    )
                                })
                                .collect();
                            let ns = self.table.intern(TypeKind::Record(
                                crate::types::RecordType {
                                    props,
                                    string_index: None,
                                    number_index: None,
                                },
                            ));
                            self.declare_value(namespace, ns, false);
                        }
                        for spec in named {
                            let value_ty =
                                self.module_exports[target_index].get(&*spec.imported).copied();
                            let type_binding = self.module_type_exports[target_index]
                                .get(&*spec.imported)
                                .cloned();
                            // Cycle-broken modules may not have published
                            // yet; their bindings read as `any` cells.
                            let ty = value_ty.unwrap_or_else(|| self.table.any());
                            self.declare_value(&spec.local, ty, false);
                            if let Some(binding) = type_binding {
                                self.declare_type(&spec.local, binding);
                            }
                        }
                    }
                }
            }
            _ => {
                // Missing module was already reported by the resolver;
                // bind everything as `any` so checking continues.
                let any = self.table.any();
                match kind {
                    ImportKind::SideEffect => {}
                    ImportKind::EqualsRequire { local } => self.declare_value(local, any, false),
                    ImportKind::Clause {
                        default,
                        namespace,
                        named,
                    } => {
                        if let Some(default) = default {
                            self.declare_value(default, any, false);
                        }
                        if let Some(namespace) = namespace {
                            self.declare_value(namespace, any, false);
                        }
                        for spec in named {
                            self.declare_value(&spec.local, any, false);
                        }
                    }
                }
            }
        }
    }

    // =========================================================================
    // Pass 2: signatures
    // =========================================================================

    fn fill_signatures(&mut self, statements: &[StmtId]) {
        let module_index = self.current_module as usize;
        for &stmt in statements {
            let stmt = self.unwrap_export(stmt);
            let kind = self.graph.modules[module_index].ast.arena.stmt(stmt).kind.clone();
            match kind {
                StmtKind::TypeAlias {
                    name,
                    type_params,
                    ty,
                } => {
                    self.push_scope(ScopeKind::Block);
                    let param_ids = self.declare_type_params(&type_params);
                    let body = self.convert_type(ty);
                    self.pop_scope();
                    self.declare_type(
                        &name,
                        TypeBinding::Alias {
                            type_params: param_ids,
                            body,
                        },
                    );
                }
                StmtKind::InterfaceDecl(interface_id) => {
                    self.fill_interface(interface_id);
                }
                StmtKind::ClassDecl(class_id) => {
                    self.fill_class(class_id);
                }
                StmtKind::FunctionDecl { name, func } => {
                    let signature = self.function_signature(func);
                    self.declare_value(&name, signature, false);
                }
                _ => {}
            }
        }
    }

    /// A function's type from its annotations alone (no body checking).
    pub fn function_signature(&mut self, func_id: FuncId) -> TypeId {
        let func = self.graph.modules[self.current_module as usize]
            .ast
            .arena
            .func(func_id)
            .clone();
        self.push_scope(ScopeKind::Block);
        let type_param_ids = self.declare_type_params(&func.type_params);
        let mut params = Vec::new();
        let mut rest = None;
        let mut min_args = 0;
        for param in &func.params {
            let mut ty = match param.ty {
                Some(annotation) => self.convert_type(annotation),
                None => self.table.any(),
            };
            if param.optional && self.options.strict_null_checks {
                let undefined = self.table.undefined();
                ty = self.table.union(vec![ty, undefined]);
            }
            if param.rest {
                rest = Some(self.table.array(ty));
            } else {
                if !param.optional && param.default.is_none() {
                    min_args = params.len() + 1;
                }
                params.push(ParamInfo {
                    name: param.name.clone(),
                    ty,
                    optional: param.optional || param.default.is_some(),
                });
            }
        }
        let (mut return_ty, predicate) = match func.return_type {
            Some(node) => {
                let (ty, predicate) = self.convert_return_type(node);
                (ty, predicate)
            }
            None => (self.table.any(), None),
        };
        if func.is_async {
            return_ty = self.table.promise(return_ty);
        }
        if func.is_generator && !matches!(self.table.kind(return_ty), TypeKind::Generator(_)) {
            let any = self.table.any();
            return_ty = self.table.generator(any);
        }
        self.pop_scope();
        self.table.intern(TypeKind::Function(FunctionType {
            type_params: type_param_ids,
            params,
            rest,
            return_ty,
            min_args,
            predicate,
        }))
    }

    fn fill_interface(&mut self, interface_id: tsr_parser::InterfaceId) {
        let interface = self.graph.modules[self.current_module as usize]
            .ast
            .arena
            .interface(interface_id)
            .clone();
        let Some(TypeBinding::Interface(def)) = self.lookup_type(&interface.name) else {
            return;
        };
        self.push_scope(ScopeKind::Block);
        let param_ids = self.declare_type_params(&interface.type_params);
        let extends: Vec<TypeId> = interface
            .extends
            .iter()
            .map(|&e| self.convert_type(e))
            .collect();
        let mut props: Vec<(String, PropInfo)> = Vec::new();
        let mut string_index = None;
        let mut number_index = None;
        for member in &interface.members {
            match member {
                tsr_parser::ast::InterfaceMember::Property {
                    name,
                    ty,
                    optional,
                    readonly,
                    ..
                } => {
                    let ty = self.convert_type(*ty);
                    props.push((
                        name.to_string(),
                        PropInfo {
                            ty,
                            optional: *optional,
                            readonly: *readonly,
                        },
                    ));
                }
                tsr_parser::ast::InterfaceMember::IndexSignature {
                    key_ty, value_ty, ..
                } => {
                    let key = self.convert_type(*key_ty);
                    let value = self.convert_type(*value_ty);
                    if matches!(self.table.kind(key), TypeKind::Number) {
                        number_index = Some(value);
                    } else {
                        string_index = Some(value);
                    }
                }
            }
        }
        self.pop_scope();

        // Additive merge: later declarations contribute members and
        // heritage to the same definition.
        let def_mut = self.table.interface_def_mut(def);
        if def_mut.type_params.is_empty() {
            def_mut.type_params = param_ids;
        }
        def_mut.extends.extend(extends);
        for (name, prop) in props {
            def_mut.props.insert(name, prop);
        }
        if string_index.is_some() {
            def_mut.string_index = string_index;
        }
        if number_index.is_some() {
            def_mut.number_index = number_index;
        }
    }

    fn fill_class(&mut self, class_id: tsr_parser::ClassId) {
        let module_index = self.current_module as usize;
        let class = self.graph.modules[module_index].ast.arena.class(class_id).clone();
        let Some(TypeBinding::Class(def)) = self.lookup_type(&class.name) else {
            return;
        };

        self.push_scope(ScopeKind::Block);
        let param_ids = self.declare_type_params(&class.type_params);
        self.table.class_def_mut(def).type_params = param_ids;

        // Heritage.
        if let Some(superclass) = class.superclass {
            let arena = &self.graph.modules[module_index].ast.arena;
            if let ExprKind::Ident(name) = &arena.expr(superclass).kind {
                let name = name.to_string();
                if let Some(TypeBinding::Class(parent)) = self.lookup_type(&name) {
                    let args: Vec<TypeId> = class
                        .super_type_args
                        .iter()
                        .map(|&a| self.convert_type(a))
                        .collect();
                    let parent_ty = self.table.intern(TypeKind::Instance(parent, args));
                    self.table.class_def_mut(def).superclass = Some(parent_ty);
                }
            }
        }
        let implements: Vec<TypeId> = class
            .implements
            .iter()
            .map(|&i| self.convert_type(i))
            .collect();
        self.table.class_def_mut(def).implements = implements;

        // Members.
        for member in &class.members {
            let is_static = member.modifiers.contains(Modifiers::STATIC);
            let is_private = member.modifiers.contains(Modifiers::PRIVATE);
            let is_protected = member.modifiers.contains(Modifiers::PROTECTED);
            match &member.kind {
                ClassMemberKind::Field { key, ty, init } => {
                    let Some(name) = key.static_name() else { continue };
                    let ty = match ty {
                        Some(annotation) => self.convert_type(*annotation),
                        None => match init {
                            Some(init) => {
                                let t = self.check_expr(*init);
                                self.table.widen(t)
                            }
                            None => self.table.any(),
                        },
                    };
                    let info = PropInfo {
                        ty,
                        optional: false,
                        readonly: member.modifiers.contains(Modifiers::READONLY),
                    };
                    let def_mut = self.table.class_def_mut(def);
                    if is_static {
                        def_mut.static_props.insert(name.clone(), info);
                    } else {
                        def_mut.instance_props.insert(name.clone(), info);
                    }
                    if member.modifiers.contains(Modifiers::READONLY) {
                        self.table.class_def_mut(def).readonly_fields.push(name.clone());
                    }
                    self.record_member_access(def, &name, is_private, is_protected);
                }
                ClassMemberKind::Method { key, kind, func } => {
                    let Some(name) = key.static_name() else { continue };
                    let signature = self.function_signature(*func);
                    let has_body = self.graph.modules[module_index]
                        .ast
                        .arena
                        .func(*func)
                        .body
                        .is_some();
                    if member.modifiers.contains(Modifiers::ABSTRACT) || !has_body {
                        if !class.is_abstract {
                            self.error(
                                member.span,
                                codes::ABSTRACT_MEMBER_IN_CONCRETE_CLASS,
                                &[&name],
                            );
                        }
                        self.table.class_def_mut(def).abstract_members.push(name.clone());
                    }
                    match kind {
                        MethodKind::Constructor => {
                            self.table.class_def_mut(def).ctor = Some(signature);
                            // Parameter properties become instance fields.
                            let params = self.graph.modules[module_index]
                                .ast
                                .arena
                                .func(*func)
                                .params
                                .clone();
                            for param in params {
                                if !param.modifiers.has_access_modifier()
                                    && !param.modifiers.contains(Modifiers::READONLY)
                                {
                                    continue;
                                }
                                let ty = match param.ty {
                                    Some(annotation) => self.convert_type(annotation),
                                    None => self.table.any(),
                                };
                                let info = PropInfo {
                                    ty,
                                    optional: false,
                                    readonly: param.modifiers.contains(Modifiers::READONLY),
                                };
                                self.table
                                    .class_def_mut(def)
                                    .instance_props
                                    .insert(param.name.to_string(), info);
                                self.record_member_access(
                                    def,
                                    &param.name,
                                    param.modifiers.contains(Modifiers::PRIVATE),
                                    param.modifiers.contains(Modifiers::PROTECTED),
                                );
                            }
                        }
                        MethodKind::Getter => {
                            let return_ty = match self.table.kind(signature).clone() {
                                TypeKind::Function(f) => f.return_ty,
                                _ => self.table.any(),
                            };
                            self.table.class_def_mut(def).getters.insert(name.clone(), return_ty);
                        }
                        MethodKind::Setter => {
                            let param_ty = match self.table.kind(signature).clone() {
                                TypeKind::Function(f) => {
                                    f.params.first().map(|p| p.ty).unwrap_or_else(|| {
                                        self.table.any()
                                    })
                                }
                                _ => self.table.any(),
                            };
                            self.table.class_def_mut(def).setters.insert(name.clone(), param_ty);
                        }
                        MethodKind::Method => {
                            let def_mut = self.table.class_def_mut(def);
                            if is_static {
                                def_mut.static_methods.insert(name.clone(), signature);
                            } else {
                                def_mut.instance_methods.insert(name.clone(), signature);
                            }
                        }
                    }
                    self.record_member_access(def, &name, is_private, is_protected);
                }
                ClassMemberKind::IndexSignature { .. } => {}
            }
        }
        self.pop_scope();
    }

    fn record_member_access(
        &mut self,
        def: ClassDefId,
        name: &str,
        is_private: bool,
        is_protected: bool,
    ) {
        let def_mut = self.table.class_def_mut(def);
        if is_private {
            def_mut.private_members.push(name.to_string());
        }
        if is_protected {
            def_mut.protected_members.push(name.to_string());
        }
    }

    // =========================================================================
    // Pass 3: bodies
    // =========================================================================

    pub fn check_stmt(&mut self, stmt: StmtId) {
        let module_index = self.current_module as usize;
        let kind = self.graph.modules[module_index].ast.arena.stmt(stmt).kind.clone();
        let span = self.graph.modules[module_index].ast.arena.stmt(stmt).span;
        match kind {
            StmtKind::Empty => {}
            StmtKind::Expr(expr) => {
                self.check_expr(expr);
            }
            StmtKind::VarDecl { kind, declarations } => {
                for decl in &declarations {
                    let annotation = decl.ty.map(|t| self.convert_type(t));
                    let init_ty = decl.init.map(|init| self.check_expr(init));
                    let binding_ty = match (annotation, init_ty) {
                        (Some(annotation), Some(init_ty)) => {
                            self.check_assignable_with_freshness(
                                decl.init.unwrap(),
                                init_ty,
                                annotation,
                                decl.span,
                            );
                            annotation
                        }
                        (Some(annotation), None) => annotation,
                        (None, Some(init_ty)) => {
                            if kind == VarKind::Const {
                                init_ty
                            } else {
                                self.table.widen(init_ty)
                            }
                        }
                        (None, None) => self.table.any(),
                    };
                    let mutable = kind != VarKind::Const;
                    if kind == VarKind::Var {
                        self.declare_value_hoisted(&decl.name, binding_ty, mutable);
                    } else {
                        self.declare_value(&decl.name, binding_ty, mutable);
                    }
                }
            }
            StmtKind::Block(stmts) => {
                self.push_scope(ScopeKind::Block);
                for &inner in &stmts {
                    self.check_stmt(inner);
                }
                self.pop_scope();
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_expr(cond);
                let (then_overlay, else_overlay) = self.branch_overlays(cond);
                self.narrowing.push(then_overlay);
                self.check_stmt(then_branch);
                self.narrowing.pop();
                if let Some(else_branch) = else_branch {
                    self.narrowing.push(else_overlay);
                    self.check_stmt(else_branch);
                    self.narrowing.pop();
                }
            }
            StmtKind::While { cond, body } => {
                self.check_expr(cond);
                let (then_overlay, _) = self.branch_overlays(cond);
                self.narrowing.push(then_overlay);
                self.check_stmt(body);
                self.narrowing.pop();
            }
            StmtKind::DoWhile { body, cond } => {
                self.check_stmt(body);
                self.check_expr(cond);
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.push_scope(ScopeKind::Block);
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(test) = test {
                    self.check_expr(test);
                }
                if let Some(update) = update {
                    self.check_expr(update);
                }
                self.check_stmt(body);
                self.pop_scope();
            }
            StmtKind::ForIn { head, object, body } => {
                self.check_expr(object);
                self.push_scope(ScopeKind::Block);
                let string = self.table.string();
                if head.var_kind.is_some() {
                    self.declare_value(&head.name, string, true);
                }
                self.check_stmt(body);
                self.pop_scope();
            }
            StmtKind::ForOf {
                head,
                iterable,
                body,
                is_await,
            } => {
                let iterable_ty = self.check_expr(iterable);
                let mut element = self.element_type_of(iterable_ty, span);
                if is_await {
                    element = self.awaited_type(element);
                }
                self.push_scope(ScopeKind::Block);
                if head.var_kind.is_some() {
                    self.declare_value(&head.name, element, true);
                }
                self.check_stmt(body);
                self.pop_scope();
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                self.check_expr(discriminant);
                for case in &cases {
                    if let Some(test) = case.test {
                        self.check_expr(test);
                    }
                    self.push_scope(ScopeKind::Block);
                    for &inner in &case.body {
                        self.check_stmt(inner);
                    }
                    self.pop_scope();
                }
            }
            StmtKind::Labeled { body, .. } => self.check_stmt(body),
            StmtKind::Break(_) | StmtKind::Continue(_) => {}
            StmtKind::Return(arg) => {
                let arg_ty = arg.map(|a| self.check_expr(a));
                let expected = self.function_stack.last().and_then(|fx| fx.return_ty);
                match (arg, arg_ty, expected) {
                    (Some(arg), Some(arg_ty), Some(expected)) => {
                        self.check_assignable_with_freshness(arg, arg_ty, expected, span);
                    }
                    (_, Some(arg_ty), None) => {
                        if let Some(fx) = self.function_stack.last_mut() {
                            fx.inferred_returns.push(arg_ty);
                        }
                    }
                    _ => {}
                }
            }
            StmtKind::Throw(arg) => {
                self.check_expr(arg);
            }
            StmtKind::Try {
                block,
                catch,
                finally,
            } => {
                self.push_scope(ScopeKind::Block);
                for &inner in &block {
                    self.check_stmt(inner);
                }
                self.pop_scope();
                if let Some(catch) = catch {
                    self.push_scope(ScopeKind::Block);
                    if let Some(param) = &catch.param {
                        let ty = match catch.param_ty {
                            Some(annotation) => self.convert_type(annotation),
                            None => self.table.any(),
                        };
                        self.declare_value(param, ty, true);
                    }
                    for &inner in &catch.body {
                        self.check_stmt(inner);
                    }
                    self.pop_scope();
                }
                if let Some(finally) = finally {
                    self.push_scope(ScopeKind::Block);
                    for &inner in &finally {
                        self.check_stmt(inner);
                    }
                    self.pop_scope();
                }
            }
            StmtKind::FunctionDecl { name, func } => {
                let ty = self.check_function(func);
                self.declare_value(&name, ty, false);
            }
            StmtKind::ClassDecl(class_id) => self.check_class_bodies(class_id),
            StmtKind::InterfaceDecl(_)
            | StmtKind::TypeAlias { .. }
            | StmtKind::EnumDecl { .. } => {}
            StmtKind::Import { .. } => {}
            StmtKind::ExportNamed { .. } | StmtKind::ExportStar { .. } => {}
            StmtKind::ExportDefault(expr) | StmtKind::ExportAssignment(expr) => {
                self.check_expr(expr);
            }
            StmtKind::ExportDecl(inner) => self.check_stmt(inner),
        }
    }

    fn element_type_of(&mut self, iterable: TypeId, span: tsr_common::Span) -> TypeId {
        match self.table.kind(iterable).clone() {
            TypeKind::Array(element) => element,
            TypeKind::Tuple { elements, .. } => self.table.union(elements),
            TypeKind::Generator(yield_ty) => yield_ty,
            TypeKind::String | TypeKind::StringLit(_) => self.table.string(),
            TypeKind::Any | TypeKind::Unknown => self.table.any(),
            TypeKind::Union(members) => {
                let elements: Vec<TypeId> = members
                    .into_iter()
                    .map(|m| self.element_type_of(m, span))
                    .collect();
                self.table.union(elements)
            }
            _ => {
                self.error(span, codes::NOT_ITERABLE, &[&self.table.display(iterable)]);
                self.table.any()
            }
        }
    }

    fn check_class_bodies(&mut self, class_id: tsr_parser::ClassId) {
        let module_index = self.current_module as usize;
        let class = self.graph.modules[module_index].ast.arena.class(class_id).clone();
        let Some(TypeBinding::Class(def)) = self.lookup_type(&class.name) else {
            return;
        };

        // Decorator expressions are plain expressions; check them.
        for &decorator in &class.decorators {
            self.check_expr(decorator);
        }

        self.push_scope(ScopeKind::Block);
        let param_ids = self.table.class_def(def).type_params.clone();
        for (tp, ast_tp) in param_ids.iter().zip(&class.type_params) {
            self.declare_type(&ast_tp.name, TypeBinding::Param(*tp));
        }
        self.class_stack.push(def);

        for member in &class.members {
            for &decorator in &member.decorators {
                self.check_expr(decorator);
            }
            match &member.kind {
                ClassMemberKind::Field { init, ty, .. } => {
                    if let Some(init) = init {
                        let init_ty = self.check_expr(*init);
                        if let Some(annotation) = ty {
                            let annotation = self.convert_type(*annotation);
                            let init_span = self.graph.modules[module_index]
                                .ast
                                .arena
                                .expr(*init)
                                .span;
                            self.check_assignable_with_freshness(
                                *init, init_ty, annotation, init_span,
                            );
                        }
                    }
                }
                ClassMemberKind::Method { func, .. } => {
                    let has_body = self.graph.modules[module_index]
                        .ast
                        .arena
                        .func(*func)
                        .body
                        .is_some();
                    if has_body {
                        self.check_function(*func);
                    }
                }
                ClassMemberKind::IndexSignature { .. } => {}
            }
        }

        self.class_stack.pop();
        self.pop_scope();

        // `implements` is structural compatibility of the instance shape.
        let instance = self.table.intern(TypeKind::Instance(def, Vec::new()));
        let implements = self.table.class_def(def).implements.clone();
        for interface in implements {
            if !is_method_assignable(
                &mut self.table,
                &mut self.cache,
                &self.options,
                instance,
                interface,
            ) {
                self.error(
                    class.span,
                    codes::INTERFACE_NOT_IMPLEMENTED,
                    &[&class.name, &self.table.display(interface)],
                );
            }
        }

        // Inherited abstract members must be implemented by concrete
        // subclasses.
        if !class.is_abstract {
            let mut missing: Vec<String> = Vec::new();
            let mut current = self.table.class_def(def).superclass;
            while let Some(parent_ty) = current {
                let TypeKind::Instance(parent, _) = self.table.kind(parent_ty) else {
                    break;
                };
                let parent_def = self.table.class_def(*parent).clone();
                for name in &parent_def.abstract_members {
                    if member_type(&mut self.table, instance, name).is_none() {
                        missing.push(name.clone());
                    }
                }
                current = parent_def.superclass;
            }
            for name in missing {
                self.error(class.span, codes::ABSTRACT_MEMBER_IN_CONCRETE_CLASS, &[&name]);
            }
        }
    }

    // =========================================================================
    // Narrowing glue
    // =========================================================================

    /// Overlays for the then/else branches guarded by `cond`.
    pub fn branch_overlays(
        &mut self,
        cond: ExprId,
    ) -> (FxHashMap<String, TypeId>, FxHashMap<String, TypeId>) {
        let arena = &self.graph.modules[self.current_module as usize].ast.arena;
        let guard = {
            let predicate_lookup = |callee: ExprId| -> Option<(String, TypeId)> {
                if let ExprKind::Ident(name) = &arena.expr(callee).kind
                    && let Some(binding) = self.lookup_declared(name)
                    && let TypeKind::Function(f) = self.table.kind(binding.ty)
                    && let Some((param, ty)) = &f.predicate
                {
                    return Some((param.to_string(), *ty));
                }
                None
            };
            let class_lookup = |name: &str| -> Option<ClassDefId> {
                match self.lookup_type(name) {
                    Some(TypeBinding::Class(def)) => Some(def),
                    _ => None,
                }
            };
            extract_guard(arena, cond, &predicate_lookup, &class_lookup)
        };

        let mut then_overlay = FxHashMap::default();
        let mut else_overlay = FxHashMap::default();
        if let Some(info) = guard {
            let name = guard_target(&info.guard).to_string();
            if let Some(binding) = self.lookup_value(&name) {
                let then_ty =
                    narrow_type(&mut self.table, binding.ty, &info.guard, info.negated);
                let else_ty =
                    narrow_type(&mut self.table, binding.ty, &info.guard, !info.negated);
                then_overlay.insert(name.clone(), then_ty);
                else_overlay.insert(name, else_ty);
            }
        }
        (then_overlay, else_overlay)
    }

    // =========================================================================
    // Exports
    // =========================================================================

    fn collect_exports(&mut self, statements: &[StmtId]) {
        let module_index = self.current_module as usize;
        for &stmt in statements {
            let kind = self.graph.modules[module_index].ast.arena.stmt(stmt).kind.clone();
            let span = self.graph.modules[module_index].ast.arena.stmt(stmt).span;
            match kind {
                StmtKind::ExportDecl(inner) => {
                    let inner_kind =
                        self.graph.modules[module_index].ast.arena.stmt(inner).kind.clone();
                    match inner_kind {
                        StmtKind::VarDecl { declarations, .. } => {
                            for decl in &declarations {
                                self.export_value_binding(&decl.name);
                            }
                        }
                        StmtKind::FunctionDecl { name, .. } => self.export_value_binding(&name),
                        StmtKind::ClassDecl(class_id) => {
                            let name = self.graph.modules[module_index]
                                .ast
                                .arena
                                .class(class_id)
                                .name
                                .to_string();
                            self.export_value_binding(&name);
                            self.export_type_binding(&name);
                        }
                        StmtKind::InterfaceDecl(interface_id) => {
                            let name = self.graph.modules[module_index]
                                .ast
                                .arena
                                .interface(interface_id)
                                .name
                                .to_string();
                            self.export_type_binding(&name);
                        }
                        StmtKind::TypeAlias { name, .. } => self.export_type_binding(&name),
                        StmtKind::EnumDecl { name, .. } => {
                            self.export_value_binding(&name);
                            self.export_type_binding(&name);
                        }
                        _ => {}
                    }
                }
                StmtKind::ExportNamed { specifiers, from } => match from {
                    None => {
                        for spec in &specifiers {
                            if let Some(binding) = self.lookup_declared(&spec.local) {
                                self.module_exports[module_index]
                                    .insert(spec.exported.to_string(), binding.ty);
                            }
                            if let Some(tb) = self.lookup_type(&spec.local) {
                                self.module_type_exports[module_index]
                                    .insert(spec.exported.to_string(), tb);
                            }
                        }
                    }
                    Some(from) => {
                        let resolved = tsr_resolver::resolve_specifier(
                            &self.graph.modules[module_index].specifier,
                            &from,
                        );
                        let target = self
                            .graph
                            .by_specifier(&resolved)
                            .map(|m| m.id.index());
                        if let Some(target) = target {
                            if self.graph.modules[target].exports.has_export_assignment {
                                self.error(
                                    span,
                                    codes::NAMED_REEXPORT_OF_EXPORT_ASSIGNMENT,
                                    &[&resolved],
                                );
                            }
                            for spec in &specifiers {
                                let ty = self.module_exports[target]
                                    .get(&*spec.local)
                                    .copied()
                                    .unwrap_or_else(|| self.table.any());
                                self.module_exports[module_index]
                                    .insert(spec.exported.to_string(), ty);
                            }
                        }
                    }
                },
                StmtKind::ExportStar { from } => {
                    let resolved = tsr_resolver::resolve_specifier(
                        &self.graph.modules[module_index].specifier,
                        &from,
                    );
                    let target = self.graph.by_specifier(&resolved).map(|m| m.id.index());
                    if let Some(target) = target {
                        let exports = self.module_exports[target].clone();
                        for (name, ty) in exports {
                            self.module_exports[module_index].insert(name, ty);
                        }
                    }
                }
                StmtKind::ExportDefault(expr) => {
                    let ty = self
                        .expr_types
                        .get(&(self.current_module, expr.0))
                        .copied()
                        .unwrap_or_else(|| self.table.any());
                    self.module_default_exports[module_index] = Some(ty);
                }
                StmtKind::ExportAssignment(expr) => {
                    let ty = self
                        .expr_types
                        .get(&(self.current_module, expr.0))
                        .copied()
                        .unwrap_or_else(|| self.table.any());
                    self.module_export_assignments[module_index] = Some(ty);
                }
                _ => {}
            }
        }
    }

    fn export_value_binding(&mut self, name: &str) {
        let module_index = self.current_module as usize;
        if let Some(binding) = self.lookup_declared(name) {
            self.module_exports[module_index].insert(name.to_string(), binding.ty);
        }
    }

    fn export_type_binding(&mut self, name: &str) {
        let module_index = self.current_module as usize;
        if let Some(binding) = self.lookup_type(name) {
            self.module_type_exports[module_index].insert(name.to_string(), binding);
        }
    }
}
