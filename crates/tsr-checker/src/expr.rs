//! Expression checking.

use tsr_common::diagnostics::codes;
use tsr_common::Span;
use tsr_parser::ast::{
    AssignOp, BinaryOp, ExprId, ExprKind, FuncBody, FuncId, LogicalOp, ObjectPropKind, PropKey,
    UnaryOp,
};

use crate::context::{CheckerContext, FunctionCtx, ScopeKind};
use crate::infer::infer_type_arguments;
use crate::operations::{build_subst, indexed_access, member_type, substitute};
use crate::relate::is_assignable;
use crate::types::{FunctionType, ParamInfo, PropInfo, RecordType, TypeId, TypeKind};

impl<'a> CheckerContext<'a> {
    fn arena(&self) -> &'a tsr_parser::Arena {
        &self.graph.modules[self.current_module as usize].ast.arena
    }

    pub fn check_expr(&mut self, expr: ExprId) -> TypeId {
        let arena = self.arena();
        let kind = arena.expr(expr).kind.clone();
        let span = arena.expr(expr).span;
        let ty = match kind {
            ExprKind::NullLit => self.table.null(),
            ExprKind::UndefinedLit => self.table.undefined(),
            ExprKind::BoolLit(b) => self.table.bool_lit(b),
            ExprKind::NumberLit(n) => self.table.number_lit(n),
            ExprKind::StringLit(s) => self.table.string_lit(&s),
            ExprKind::BigIntLit(_) => self.table.number(),
            ExprKind::Template { exprs, .. } => {
                for e in exprs {
                    self.check_expr(e);
                }
                self.table.string()
            }
            ExprKind::Ident(name) => match self.lookup_value(&name) {
                Some(binding) => binding.ty,
                None => {
                    self.error(span, codes::UNKNOWN_NAME, &[&name]);
                    self.table.any()
                }
            },
            ExprKind::This => match self.class_stack.last() {
                Some(&def) => self.table.intern(TypeKind::Instance(def, Vec::new())),
                None => self.table.any(),
            },
            ExprKind::Super => match self.current_super() {
                Some(ty) => ty,
                None => {
                    self.error(span, codes::SUPER_OUTSIDE_CLASS, &[]);
                    self.table.any()
                }
            },
            ExprKind::Unary { op, operand } => self.check_unary(op, operand),
            ExprKind::Update { target, .. } => {
                let target_ty = self.check_expr(target);
                self.expect_numeric(target_ty, span);
                self.table.number()
            }
            ExprKind::Binary { op, left, right } => self.check_binary(op, left, right, span),
            ExprKind::Logical { op, left, right } => self.check_logical(op, left, right),
            ExprKind::Conditional {
                cond,
                when_true,
                when_false,
            } => {
                self.check_expr(cond);
                let (then_overlay, else_overlay) = self.branch_overlays(cond);
                self.narrowing.push(then_overlay);
                let t = self.check_expr(when_true);
                self.narrowing.pop();
                self.narrowing.push(else_overlay);
                let f = self.check_expr(when_false);
                self.narrowing.pop();
                self.table.union(vec![t, f])
            }
            ExprKind::Assign { op, target, value } => self.check_assign(op, target, value, span),
            ExprKind::Member { object, property } => self.check_member(object, &property, span),
            ExprKind::Index { object, index } => self.check_index(object, index, span),
            ExprKind::Call {
                callee,
                type_args,
                args,
            } => self.check_call(callee, &type_args, &args, span),
            ExprKind::New {
                callee,
                type_args,
                args,
            } => self.check_new(callee, &type_args, &args, span),
            ExprKind::ObjectLit { props } => self.check_object_literal(&props),
            ExprKind::ArrayLit { elements } => self.check_array_literal(&elements),
            ExprKind::Arrow(func) | ExprKind::Function(func) => self.check_function(func),
            ExprKind::Yield { arg, delegate } => {
                let value_ty = arg.map(|a| self.check_expr(a));
                if let Some(ty) = value_ty {
                    // `yield*` contributes the delegate's yields.
                    let contributed = if delegate {
                        match self.table.kind(ty) {
                            TypeKind::Generator(inner) => Some(*inner),
                            _ => None,
                        }
                    } else {
                        Some(ty)
                    };
                    if let Some(contributed) = contributed
                        && let Some(fx) = self.function_stack.last_mut()
                    {
                        fx.inferred_yields.push(contributed);
                    }
                }
                self.table.any()
            }
            ExprKind::Await(operand) => {
                let ty = self.check_expr(operand);
                self.awaited_type(ty)
            }
            ExprKind::Spread(inner) => self.check_expr(inner),
            ExprKind::Assertion { expr: inner, ty } => {
                self.check_expr(inner);
                self.convert_type(ty)
            }
        };
        self.record_expr_type(expr, ty)
    }

    fn current_super(&mut self) -> Option<TypeId> {
        let &def = self.class_stack.last()?;
        self.table.class_def(def).superclass
    }

    /// The awaited type of an expression: unwrap promise, pass through
    /// non-promises.
    pub fn awaited_type(&mut self, ty: TypeId) -> TypeId {
        match self.table.kind(ty) {
            TypeKind::Promise(inner) => *inner,
            TypeKind::Any | TypeKind::Unknown => ty,
            _ => ty,
        }
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn check_unary(&mut self, op: UnaryOp, operand: ExprId) -> TypeId {
        let operand_ty = self.check_expr(operand);
        let span = self.arena().expr(operand).span;
        match op {
            UnaryOp::Typeof => self.table.string(),
            UnaryOp::Not | UnaryOp::Delete => self.table.boolean(),
            UnaryOp::Void => self.table.undefined(),
            UnaryOp::Minus | UnaryOp::Plus | UnaryOp::BitNot => {
                self.expect_numeric(operand_ty, span);
                self.table.number()
            }
        }
    }

    fn expect_numeric(&mut self, ty: TypeId, span: Span) {
        let number = self.table.number();
        if !is_assignable(&mut self.table, &mut self.cache, &self.options, ty, number)
            && !matches!(self.table.kind(ty), TypeKind::Any | TypeKind::Enum(_))
        {
            self.error(
                span,
                codes::UNKNOWN_OPERATOR_TYPES,
                &[&self.table.display(ty)],
            );
        }
    }

    fn check_binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId, span: Span) -> TypeId {
        let left_ty = self.check_expr(left);
        let right_ty = self.check_expr(right);
        match op {
            BinaryOp::Add => {
                let string = self.table.string();
                let left_is_string = is_assignable(
                    &mut self.table,
                    &mut self.cache,
                    &self.options,
                    left_ty,
                    string,
                );
                let right_is_string = is_assignable(
                    &mut self.table,
                    &mut self.cache,
                    &self.options,
                    right_ty,
                    string,
                );
                if left_is_string || right_is_string {
                    return self.table.string();
                }
                if matches!(self.table.kind(left_ty), TypeKind::Any)
                    || matches!(self.table.kind(right_ty), TypeKind::Any)
                {
                    return self.table.any();
                }
                self.expect_numeric(left_ty, span);
                self.expect_numeric(right_ty, span);
                self.table.number()
            }
            BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::Exp
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::UShr
            | BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor => {
                self.expect_numeric(left_ty, span);
                self.expect_numeric(right_ty, span);
                self.table.number()
            }
            BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge
            | BinaryOp::LooseEq
            | BinaryOp::LooseNe
            | BinaryOp::StrictEq
            | BinaryOp::StrictNe
            | BinaryOp::In
            | BinaryOp::InstanceOf => self.table.boolean(),
        }
    }

    fn check_logical(&mut self, op: LogicalOp, left: ExprId, right: ExprId) -> TypeId {
        let left_ty = self.check_expr(left);
        // The right side evaluates under the guard's effect.
        let (then_overlay, else_overlay) = self.branch_overlays(left);
        match op {
            LogicalOp::And => {
                self.narrowing.push(then_overlay);
                let right_ty = self.check_expr(right);
                self.narrowing.pop();
                self.table.union(vec![left_ty, right_ty])
            }
            LogicalOp::Or => {
                self.narrowing.push(else_overlay);
                let right_ty = self.check_expr(right);
                self.narrowing.pop();
                self.table.union(vec![left_ty, right_ty])
            }
            LogicalOp::Nullish => {
                let right_ty = self.check_expr(right);
                let non_nullish = crate::narrowing::narrow_type(
                    &mut self.table,
                    left_ty,
                    &crate::narrowing::Guard::Null {
                        name: String::new(),
                        loose: true,
                    },
                    true,
                );
                self.table.union(vec![non_nullish, right_ty])
            }
        }
    }

    fn check_assign(
        &mut self,
        op: AssignOp,
        target: ExprId,
        value: ExprId,
        span: Span,
    ) -> TypeId {
        let value_ty = self.check_expr(value);
        let arena = self.arena();
        match arena.expr(target).kind.clone() {
            ExprKind::Ident(name) => {
                match self.lookup_declared(&name) {
                    Some(binding) => {
                        if !binding.mutable {
                            self.error(span, codes::ASSIGNMENT_TO_CONST, &[&name]);
                        }
                        if op == AssignOp::Assign {
                            self.check_assignable_with_freshness(
                                value, value_ty, binding.ty, span,
                            );
                        }
                        self.record_expr_type(target, binding.ty);
                    }
                    None => {
                        self.error(span, codes::UNKNOWN_NAME, &[&name]);
                    }
                }
            }
            ExprKind::Member { object, property } => {
                let object_ty = self.check_expr(object);
                if let Some(prop) = member_type(&mut self.table, object_ty, &property) {
                    if prop.readonly {
                        self.error(span, codes::ASSIGNMENT_TO_READONLY, &[&property]);
                    }
                    if op == AssignOp::Assign {
                        self.check_assignable_with_freshness(value, value_ty, prop.ty, span);
                    }
                }
            }
            ExprKind::Index { object, index } => {
                self.check_expr(object);
                self.check_expr(index);
            }
            _ => {}
        }
        value_ty
    }

    // =========================================================================
    // Member access and calls
    // =========================================================================

    fn check_member(&mut self, object: ExprId, property: &str, span: Span) -> TypeId {
        let object_ty = self.check_expr(object);
        if matches!(self.table.kind(object_ty), TypeKind::Any) {
            return self.table.any();
        }
        if self.options.strict_null_checks
            && self.union_has_nullish(object_ty)
        {
            self.error(span, codes::POSSIBLY_NULL_OR_UNDEFINED, &[]);
        }
        if let Some(prop) = member_type(&mut self.table, object_ty, property) {
            return prop.ty;
        }
        if let Some(ty) = self.builtin_member(object_ty, property) {
            return ty;
        }
        self.error(
            span,
            codes::PROPERTY_NOT_FOUND,
            &[property, &self.table.display(object_ty)],
        );
        self.table.any()
    }

    fn union_has_nullish(&self, ty: TypeId) -> bool {
        match self.table.kind(ty) {
            TypeKind::Null | TypeKind::Undefined => true,
            TypeKind::Union(members) => members.iter().any(|&m| {
                matches!(self.table.kind(m), TypeKind::Null | TypeKind::Undefined)
            }),
            _ => false,
        }
    }

    fn check_index(&mut self, object: ExprId, index: ExprId, span: Span) -> TypeId {
        let object_ty = self.check_expr(object);
        let index_ty = self.check_expr(index);
        if matches!(self.table.kind(object_ty), TypeKind::Any) {
            return self.table.any();
        }
        let result = indexed_access(&mut self.table, object_ty, index_ty);
        if matches!(self.table.kind(result), TypeKind::Never) {
            self.error(span, codes::INDEX_TYPE_MISMATCH, &[]);
            return self.table.any();
        }
        result
    }

    fn check_call(
        &mut self,
        callee: ExprId,
        type_args: &[tsr_parser::TypeNodeId],
        args: &[ExprId],
        span: Span,
    ) -> TypeId {
        let callee_ty = self.check_expr(callee);
        let arg_types: Vec<TypeId> = args.iter().map(|&a| self.check_expr(a)).collect();

        match self.table.kind(callee_ty).clone() {
            TypeKind::Any | TypeKind::Unknown => self.table.any(),
            TypeKind::Function(func) => {
                self.check_call_against(&func, type_args, args, &arg_types, span)
            }
            TypeKind::Class(_) => {
                self.error(span, codes::NOT_CALLABLE, &[&self.table.display(callee_ty)]);
                self.table.any()
            }
            _ => {
                self.error(span, codes::NOT_CALLABLE, &[&self.table.display(callee_ty)]);
                self.table.any()
            }
        }
    }

    /// Shared signature-application path for calls and constructions.
    fn check_call_against(
        &mut self,
        func: &FunctionType,
        type_args: &[tsr_parser::TypeNodeId],
        args: &[ExprId],
        arg_types: &[TypeId],
        span: Span,
    ) -> TypeId {
        // Solve generics: explicit arguments win, otherwise infer.
        let func = if func.type_params.is_empty() {
            func.clone()
        } else {
            let solutions: Vec<TypeId> = if !type_args.is_empty() {
                type_args.iter().map(|&t| self.convert_type(t)).collect()
            } else {
                infer_type_arguments(&mut self.table, func, arg_types)
            };
            // Validate constraints.
            for (&param, &solution) in func.type_params.iter().zip(&solutions) {
                if let Some(constraint) = self.table.type_param_def(param).constraint
                    && !is_assignable(
                        &mut self.table,
                        &mut self.cache,
                        &self.options,
                        solution,
                        constraint,
                    )
                {
                    self.error(
                        span,
                        codes::CONSTRAINT_VIOLATION,
                        &[
                            &self.table.display(solution),
                            &self.table.display(constraint),
                        ],
                    );
                }
            }
            let subst = build_subst(&func.type_params, &solutions);
            let instantiated = {
                let as_type = self.table.intern(TypeKind::Function(func.clone()));
                substitute(&mut self.table, as_type, &subst)
            };
            match self.table.kind(instantiated).clone() {
                TypeKind::Function(f) => f,
                _ => func.clone(),
            }
        };

        // Arity.
        let has_spread = args.iter().any(|&a| {
            matches!(self.arena().expr(a).kind, ExprKind::Spread(_))
        });
        if !has_spread {
            let max = if func.rest.is_some() {
                usize::MAX
            } else {
                func.params.len()
            };
            if arg_types.len() < func.min_args || arg_types.len() > max {
                self.error(
                    span,
                    codes::ARGUMENT_COUNT_MISMATCH,
                    &[&func.min_args.to_string(), &arg_types.len().to_string()],
                );
            }
        }

        // Argument compatibility, with freshness-scoped excess checks.
        for (i, (&arg, &arg_ty)) in args.iter().zip(arg_types).enumerate() {
            if matches!(self.arena().expr(arg).kind, ExprKind::Spread(_)) {
                continue;
            }
            let param_ty = match func.params.get(i) {
                Some(p) => p.ty,
                None => match func.rest {
                    Some(rest) => match self.table.kind(rest) {
                        TypeKind::Array(element) => *element,
                        _ => continue,
                    },
                    None => continue,
                },
            };
            let arg_span = self.arena().expr(arg).span;
            self.check_assignable_with_freshness(arg, arg_ty, param_ty, arg_span);
        }

        func.return_ty
    }

    fn check_new(
        &mut self,
        callee: ExprId,
        type_args: &[tsr_parser::TypeNodeId],
        args: &[ExprId],
        span: Span,
    ) -> TypeId {
        let callee_ty = self.check_expr(callee);
        let arg_types: Vec<TypeId> = args.iter().map(|&a| self.check_expr(a)).collect();
        match self.table.kind(callee_ty).clone() {
            TypeKind::Any | TypeKind::Unknown => self.table.any(),
            TypeKind::Class(def) => {
                let class = self.table.class_def(def).clone();
                if class.is_abstract {
                    self.error(span, codes::ABSTRACT_CLASS_INSTANTIATED, &[]);
                }
                // Construct the instance type; generic classes infer from
                // constructor arguments.
                let solved_args: Vec<TypeId> = if !type_args.is_empty() {
                    type_args.iter().map(|&t| self.convert_type(t)).collect()
                } else if class.type_params.is_empty() {
                    Vec::new()
                } else if let Some(ctor) = class.ctor {
                    match self.table.kind(ctor).clone() {
                        TypeKind::Function(mut f) => {
                            f.type_params = class.type_params.clone();
                            infer_type_arguments(&mut self.table, &f, &arg_types)
                        }
                        _ => vec![self.table.any(); class.type_params.len()],
                    }
                } else {
                    vec![self.table.any(); class.type_params.len()]
                };

                if let Some(ctor) = class.ctor
                    && let TypeKind::Function(ctor_fn) = self.table.kind(ctor).clone()
                {
                    let subst = build_subst(&class.type_params, &solved_args);
                    let instantiated = substitute(&mut self.table, ctor, &subst);
                    let ctor_fn = match self.table.kind(instantiated).clone() {
                        TypeKind::Function(f) => f,
                        _ => ctor_fn,
                    };
                    self.check_call_against(&ctor_fn, &[], args, &arg_types, span);
                }
                self.table.intern(TypeKind::Instance(def, solved_args))
            }
            _ => {
                self.error(
                    span,
                    codes::NOT_CONSTRUCTABLE,
                    &[&self.table.display(callee_ty)],
                );
                self.table.any()
            }
        }
    }

    // =========================================================================
    // Literals
    // =========================================================================

    fn check_object_literal(&mut self, props: &[tsr_parser::ast::ObjectProp]) -> TypeId {
        let mut record_props: Vec<(Box<str>, PropInfo)> = Vec::new();
        for prop in props {
            let name = prop.key.static_name();
            match &prop.kind {
                ObjectPropKind::Shorthand => {
                    if let Some(name) = name {
                        let ty = match self.lookup_value(&name) {
                            Some(binding) => binding.ty,
                            None => {
                                self.error(prop.span, codes::UNKNOWN_NAME, &[&name]);
                                self.table.any()
                            }
                        };
                        record_props.push((name.into(), PropInfo {
                            ty,
                            optional: false,
                            readonly: false,
                        }));
                    }
                }
                ObjectPropKind::KeyValue(value) => {
                    let ty = self.check_expr(*value);
                    if let Some(name) = name {
                        record_props.push((name.into(), PropInfo {
                            ty,
                            optional: false,
                            readonly: false,
                        }));
                    }
                }
                ObjectPropKind::Method(func)
                | ObjectPropKind::Getter(func)
                | ObjectPropKind::Setter(func) => {
                    let ty = self.check_function(*func);
                    let ty = match &prop.kind {
                        ObjectPropKind::Getter(_) => match self.table.kind(ty).clone() {
                            TypeKind::Function(f) => f.return_ty,
                            _ => ty,
                        },
                        ObjectPropKind::Setter(_) => continue,
                        _ => ty,
                    };
                    if let Some(name) = name {
                        record_props.push((name.into(), PropInfo {
                            ty,
                            optional: false,
                            readonly: false,
                        }));
                    }
                }
                ObjectPropKind::Spread(inner) => {
                    let inner_ty = self.check_expr(*inner);
                    if let TypeKind::Record(rec) = self.table.kind(inner_ty).clone() {
                        for (name, info) in rec.props {
                            record_props.retain(|(n, _)| *n != name);
                            record_props.push((name, info));
                        }
                    }
                }
            }
            if let PropKey::Computed(key_expr) = &prop.key {
                self.check_expr(*key_expr);
            }
        }
        self.table.intern(TypeKind::Record(RecordType {
            props: record_props,
            string_index: None,
            number_index: None,
        }))
    }

    fn check_array_literal(&mut self, elements: &[ExprId]) -> TypeId {
        let mut element_types = Vec::new();
        for &element in elements {
            let arena = self.arena();
            if let ExprKind::Spread(inner) = arena.expr(element).kind.clone() {
                let inner_ty = self.check_expr(inner);
                self.record_expr_type(element, inner_ty);
                match self.table.kind(inner_ty).clone() {
                    TypeKind::Array(e) => element_types.push(e),
                    TypeKind::Tuple { elements: es, .. } => element_types.extend(es),
                    TypeKind::Generator(y) => element_types.push(y),
                    _ => element_types.push(inner_ty),
                }
            } else {
                let ty = self.check_expr(element);
                let widened = self.table.widen(ty);
                element_types.push(widened);
            }
        }
        if element_types.is_empty() {
            let any = self.table.any();
            return self.table.array(any);
        }
        let element = self.table.union(element_types);
        self.table.array(element)
    }

    // =========================================================================
    // Functions
    // =========================================================================

    /// Check a function definition, producing its function type. Used by
    /// expressions, declarations, and methods alike.
    pub fn check_function(&mut self, func_id: FuncId) -> TypeId {
        let func = self.arena().func(func_id).clone();
        self.push_scope(ScopeKind::Function);
        let type_param_ids = self.declare_type_params(&func.type_params);

        let mut params = Vec::new();
        let mut rest = None;
        let mut min_args = 0;
        for param in &func.params {
            let mut ty = match param.ty {
                Some(annotation) => self.convert_type(annotation),
                None => match param.default {
                    Some(default) => {
                        let d = self.check_expr(default);
                        self.table.widen(d)
                    }
                    None => self.table.any(),
                },
            };
            if let Some(default) = param.default {
                let default_ty = self.check_expr(default);
                let span = self.arena().expr(default).span;
                self.check_assignable_with_freshness(default, default_ty, ty, span);
            }
            if param.optional && self.options.strict_null_checks {
                let undefined = self.table.undefined();
                ty = self.table.union(vec![ty, undefined]);
            }
            if param.rest {
                let arr = self.table.array(ty);
                rest = Some(arr);
                self.declare_value(&param.name, arr, true);
            } else {
                if !param.optional && param.default.is_none() {
                    min_args = params.len() + 1;
                }
                self.declare_value(&param.name, ty, true);
                params.push(ParamInfo {
                    name: param.name.clone(),
                    ty,
                    optional: param.optional || param.default.is_some(),
                });
            }
        }

        let (annotated_return, predicate) = match func.return_type {
            Some(node) => {
                let (ty, predicate) = self.convert_return_type(node);
                (Some(ty), predicate)
            }
            None => (None, None),
        };

        // The body checks against the *inner* return type: the awaited
        // type for async functions, the yield type for generators.
        let inner_return = annotated_return.map(|ty| {
            if func.is_async {
                self.awaited_type(ty)
            } else {
                ty
            }
        });
        let yield_ty = annotated_return.and_then(|ty| match self.table.kind(ty) {
            TypeKind::Generator(y) => Some(*y),
            _ => None,
        });

        self.function_stack.push(FunctionCtx {
            return_ty: if func.is_generator { None } else { inner_return },
            is_async: func.is_async,
            is_generator: func.is_generator,
            yield_ty,
            inferred_returns: Vec::new(),
            inferred_yields: Vec::new(),
        });

        match &func.body {
            Some(FuncBody::Block(stmts)) => {
                for &stmt in stmts {
                    self.check_stmt(stmt);
                }
            }
            Some(FuncBody::Expr(expr)) => {
                let ty = self.check_expr(*expr);
                if let Some(fx) = self.function_stack.last_mut() {
                    fx.inferred_returns.push(ty);
                }
            }
            None => {}
        }

        let fx = self.function_stack.pop().expect("function context");
        self.pop_scope();

        let return_ty = match annotated_return {
            Some(ty) => ty,
            None => {
                if func.is_generator {
                    let yielded = self.table.union(fx.inferred_yields);
                    let widened = self.table.widen(yielded);
                    self.table.generator(widened)
                } else {
                    let inferred = if fx.inferred_returns.is_empty() {
                        self.table.void()
                    } else {
                        self.table.union(fx.inferred_returns)
                    };
                    if func.is_async {
                        self.table.promise(inferred)
                    } else {
                        inferred
                    }
                }
            }
        };
        // Async functions always return promises, annotated or not.
        let return_ty = if func.is_async {
            self.table.promise(return_ty)
        } else {
            return_ty
        };

        self.table.intern(TypeKind::Function(FunctionType {
            type_params: type_param_ids,
            params,
            rest,
            return_ty,
            min_args,
            predicate,
        }))
    }

    // =========================================================================
    // Assignability with freshness
    // =========================================================================

    /// Report excess properties when a *fresh* object literal flows into
    /// an annotated position, then check plain assignability.
    pub fn check_assignable_with_freshness(
        &mut self,
        source_expr: ExprId,
        source_ty: TypeId,
        target_ty: TypeId,
        span: Span,
    ) {
        if let ExprKind::ObjectLit { props } = self.arena().expr(source_expr).kind.clone() {
            let target_is_shape = matches!(
                self.table.kind(target_ty),
                TypeKind::Record(_) | TypeKind::Interface(..)
            );
            let has_index = crate::operations::string_index_type(&self.table, target_ty)
                .is_some();
            if target_is_shape && !has_index {
                for prop in &props {
                    let Some(name) = prop.key.static_name() else {
                        continue;
                    };
                    if matches!(prop.kind, ObjectPropKind::Spread(_)) {
                        continue;
                    }
                    if member_type(&mut self.table, target_ty, &name).is_none() {
                        self.error(
                            prop.span,
                            codes::EXCESS_PROPERTY,
                            &[&name, &self.table.display(target_ty)],
                        );
                        return;
                    }
                }
            }
        }
        if !is_assignable(
            &mut self.table,
            &mut self.cache,
            &self.options,
            source_ty,
            target_ty,
        ) {
            self.error(
                span,
                codes::TYPE_NOT_ASSIGNABLE,
                &[
                    &self.table.display(source_ty),
                    &self.table.display(target_ty),
                ],
            );
        }
    }

    // =========================================================================
    // Built-in members on primitives and wrappers
    // =========================================================================

    /// Members the runtime provides on primitive and wrapper values:
    /// `length` on strings/arrays, array methods, promise `then`, and so
    /// on. Signatures are pragmatic rather than exhaustive.
    fn builtin_member(&mut self, object_ty: TypeId, property: &str) -> Option<TypeId> {
        let number = self.table.number();
        let string = self.table.string();
        let boolean = self.table.boolean();
        let any = self.table.any();
        match self.table.kind(object_ty).clone() {
            TypeKind::String | TypeKind::StringLit(_) => match property {
                "length" => Some(number),
                "charAt" | "charCodeAt" | "at" => Some(self.simple_fn(&[number], string)),
                "slice" | "substring" | "substr" => {
                    Some(self.simple_fn(&[number, number], string))
                }
                "indexOf" | "lastIndexOf" => Some(self.simple_fn(&[string], number)),
                "includes" | "startsWith" | "endsWith" => {
                    Some(self.simple_fn(&[string], boolean))
                }
                "toUpperCase" | "toLowerCase" | "trim" | "trimStart" | "trimEnd" => {
                    Some(self.simple_fn(&[], string))
                }
                "split" => {
                    let arr = self.table.array(string);
                    Some(self.simple_fn(&[string], arr))
                }
                "replace" | "replaceAll" | "concat" | "padStart" | "padEnd" | "repeat" => {
                    Some(self.simple_fn(&[any, any], string))
                }
                "codePointAt" => Some(self.simple_fn(&[number], number)),
                "toString" => Some(self.simple_fn(&[], string)),
                _ => None,
            },
            TypeKind::Number | TypeKind::NumberLit(_) | TypeKind::Enum(_) => match property {
                "toFixed" | "toPrecision" | "toString" => Some(self.simple_fn(&[number], string)),
                _ => None,
            },
            TypeKind::Boolean | TypeKind::BoolLit(_) => match property {
                "toString" => Some(self.simple_fn(&[], string)),
                _ => None,
            },
            TypeKind::Array(element) => match property {
                "length" => Some(number),
                "push" | "unshift" => Some(self.simple_fn(&[element], number)),
                "pop" | "shift" => {
                    let ret = if self.options.strict_null_checks {
                        let undefined = self.table.undefined();
                        self.table.union(vec![element, undefined])
                    } else {
                        element
                    };
                    Some(self.simple_fn(&[], ret))
                }
                "slice" | "concat" | "reverse" => {
                    let arr = self.table.array(element);
                    Some(self.simple_fn(&[any, any], arr))
                }
                "indexOf" | "lastIndexOf" | "findIndex" => {
                    Some(self.simple_fn(&[any], number))
                }
                "includes" | "some" | "every" => Some(self.simple_fn(&[any], boolean)),
                "join" => Some(self.simple_fn(&[string], string)),
                "map" | "flatMap" => {
                    let cb = self.simple_fn(&[element, number], any);
                    let arr = self.table.array(any);
                    Some(self.simple_fn(&[cb], arr))
                }
                "filter" | "sort" => {
                    let cb = self.simple_fn(&[element, number], any);
                    let arr = self.table.array(element);
                    Some(self.simple_fn(&[cb], arr))
                }
                "forEach" => {
                    let void = self.table.void();
                    let cb = self.simple_fn(&[element, number], void);
                    Some(self.simple_fn(&[cb], void))
                }
                "find" => {
                    let cb = self.simple_fn(&[element, number], boolean);
                    let ret = if self.options.strict_null_checks {
                        let undefined = self.table.undefined();
                        self.table.union(vec![element, undefined])
                    } else {
                        element
                    };
                    Some(self.simple_fn(&[cb], ret))
                }
                "reduce" => Some(self.simple_fn(&[any, any], any)),
                _ => None,
            },
            TypeKind::Tuple { .. } => match property {
                "length" => Some(number),
                _ => None,
            },
            TypeKind::Promise(inner) => match property {
                "then" | "catch" | "finally" => {
                    let cb = self.simple_fn(&[inner], any);
                    let p = self.table.promise(any);
                    Some(self.simple_fn(&[cb], p))
                }
                _ => None,
            },
            TypeKind::Generator(yield_ty) => match property {
                "next" => {
                    let done = self.table.boolean();
                    let result = self.table.intern(TypeKind::Record(RecordType {
                        props: vec![
                            ("value".into(), PropInfo {
                                ty: yield_ty,
                                optional: false,
                                readonly: false,
                            }),
                            ("done".into(), PropInfo {
                                ty: done,
                                optional: false,
                                readonly: false,
                            }),
                        ],
                        string_index: None,
                        number_index: None,
                    }));
                    Some(self.simple_fn(&[any], result))
                }
                "return" | "throw" => Some(self.simple_fn(&[any], any)),
                _ => None,
            },
            _ => None,
        }
    }

    fn simple_fn(&mut self, params: &[TypeId], return_ty: TypeId) -> TypeId {
        let params = params
            .iter()
            .enumerate()
            .map(|(i, &ty)| ParamInfo {
                name: format!("arg{i}").into(),
                ty,
                optional: true,
            })
            .collect();
        self.table.intern(TypeKind::Function(FunctionType {
            type_params: Vec::new(),
            params,
            rest: None,
            return_ty,
            min_args: 0,
            predicate: None,
        }))
    }
}
