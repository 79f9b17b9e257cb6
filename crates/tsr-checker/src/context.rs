//! Checker context: scope chain, module pass ordering, and conversion
//! from syntactic type annotations to semantic types.

use rustc_hash::FxHashMap;
use tracing::debug;
use tsr_common::diagnostics::{DiagnosticSink, codes};
use tsr_common::{CompilerOptions, Span};
use tsr_parser::ast::{TypeNodeId, TypeNodeKind, TypeKeyword, TypeLit, TypeParam};
use tsr_parser::ExprId;
use tsr_resolver::ModuleGraph;

use crate::builtins;
use crate::relate::RelationCache;
use crate::types::{
    ClassDefId, EnumDefId, InterfaceDefId, PropInfo, RecordType, StringIntrinsicKind, TypeId,
    TypeKind, TypeParamDef, TypeParamId, TypeTable,
};

/// A value binding in scope.
#[derive(Clone, Debug)]
pub struct Binding {
    pub ty: TypeId,
    pub mutable: bool,
}

/// A type-namespace binding in scope.
#[derive(Clone, Debug)]
pub enum TypeBinding {
    Interface(InterfaceDefId),
    Class(ClassDefId),
    Enum(EnumDefId),
    Alias {
        type_params: Vec<TypeParamId>,
        body: TypeId,
    },
    Param(TypeParamId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Block,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub values: FxHashMap<String, Binding>,
    pub types: FxHashMap<String, TypeBinding>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Scope {
            kind,
            values: FxHashMap::default(),
            types: FxHashMap::default(),
        }
    }
}

/// Per-function checking state.
#[derive(Debug)]
pub struct FunctionCtx {
    pub return_ty: Option<TypeId>,
    pub is_async: bool,
    pub is_generator: bool,
    pub yield_ty: Option<TypeId>,
    /// Return expression types observed while inferring an unannotated
    /// return type.
    pub inferred_returns: Vec<TypeId>,
    pub inferred_yields: Vec<TypeId>,
}

/// The checker's read-only product.
#[derive(Debug)]
pub struct CheckResult {
    pub table: TypeTable,
    /// (module index, expression id) → computed type.
    pub expr_types: FxHashMap<(u32, u32), TypeId>,
}

impl CheckResult {
    pub fn expr_type(&self, module: u32, expr: ExprId) -> Option<TypeId> {
        self.expr_types.get(&(module, expr.0)).copied()
    }
}

/// Check a whole program in module initialization order.
pub fn check_program(
    graph: &ModuleGraph,
    options: &CompilerOptions,
    sink: &DiagnosticSink,
) -> CheckResult {
    let mut cx = CheckerContext::new(graph, options.clone(), sink.clone());
    for index in 0..graph.modules.len() {
        cx.check_module(index);
    }
    debug!(exprs = cx.expr_types.len(), "checking complete");
    CheckResult {
        table: cx.table,
        expr_types: cx.expr_types,
    }
}

pub struct CheckerContext<'a> {
    pub graph: &'a ModuleGraph,
    pub options: CompilerOptions,
    pub sink: DiagnosticSink,
    pub table: TypeTable,
    pub cache: RelationCache,
    pub scopes: Vec<Scope>,
    /// Branch-local narrowing overlays, innermost last.
    pub narrowing: Vec<FxHashMap<String, TypeId>>,
    /// Per-module export tables (value side), indexed like
    /// `graph.modules`.
    pub module_exports: Vec<FxHashMap<String, TypeId>>,
    pub module_type_exports: Vec<FxHashMap<String, TypeBinding>>,
    pub module_default_exports: Vec<Option<TypeId>>,
    pub module_export_assignments: Vec<Option<TypeId>>,
    pub current_module: u32,
    pub expr_types: FxHashMap<(u32, u32), TypeId>,
    pub function_stack: Vec<FunctionCtx>,
    pub class_stack: Vec<ClassDefId>,
    /// Recursion guard for self-referential type aliases.
    pub type_depth: usize,
}

impl<'a> CheckerContext<'a> {
    pub fn new(graph: &'a ModuleGraph, options: CompilerOptions, sink: DiagnosticSink) -> Self {
        let module_count = graph.modules.len();
        let mut cx = CheckerContext {
            graph,
            options,
            sink,
            table: TypeTable::new(),
            cache: RelationCache::new(),
            scopes: Vec::new(),
            narrowing: Vec::new(),
            module_exports: vec![FxHashMap::default(); module_count],
            module_type_exports: vec![FxHashMap::default(); module_count],
            module_default_exports: vec![None; module_count],
            module_export_assignments: vec![None; module_count],
            current_module: 0,
            expr_types: FxHashMap::default(),
            function_stack: Vec::new(),
            class_stack: Vec::new(),
            type_depth: 0,
        };
        let mut globals = Scope::new(ScopeKind::Module);
        builtins::install_globals(&mut cx.table, &mut globals);
        cx.scopes.push(globals);
        cx
    }

    pub fn module_specifier(&self) -> &str {
        &self.graph.modules[self.current_module as usize].specifier
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    pub fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn declare_value(&mut self, name: &str, ty: TypeId, mutable: bool) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .values
            .insert(name.to_string(), Binding { ty, mutable });
    }

    /// Declare into the nearest function/module scope (`var` hoisting).
    pub fn declare_value_hoisted(&mut self, name: &str, ty: TypeId, mutable: bool) {
        for scope in self.scopes.iter_mut().rev() {
            if scope.kind != ScopeKind::Block {
                scope.values.insert(name.to_string(), Binding { ty, mutable });
                return;
            }
        }
    }

    pub fn declare_type(&mut self, name: &str, binding: TypeBinding) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .types
            .insert(name.to_string(), binding);
    }

    /// Look up a value binding, honoring narrowing overlays.
    pub fn lookup_value(&self, name: &str) -> Option<Binding> {
        for overlay in self.narrowing.iter().rev() {
            if let Some(&ty) = overlay.get(name) {
                return Some(Binding { ty, mutable: true });
            }
        }
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.values.get(name) {
                return Some(binding.clone());
            }
        }
        None
    }

    /// The declared (pre-narrowing) type of a binding.
    pub fn lookup_declared(&self, name: &str) -> Option<Binding> {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.values.get(name) {
                return Some(binding.clone());
            }
        }
        None
    }

    pub fn lookup_type(&self, name: &str) -> Option<TypeBinding> {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.types.get(name) {
                return Some(binding.clone());
            }
        }
        None
    }

    pub fn error(&self, span: Span, code: u32, args: &[&str]) {
        self.sink.error(self.module_specifier(), span, code, args);
    }

    pub fn record_expr_type(&mut self, expr: ExprId, ty: TypeId) -> TypeId {
        self.expr_types.insert((self.current_module, expr.0), ty);
        ty
    }

    // =========================================================================
    // Type parameters
    // =========================================================================

    /// Declare a function/class/alias type parameter list into the
    /// current scope, returning the parameter ids.
    pub fn declare_type_params(&mut self, params: &[TypeParam]) -> Vec<TypeParamId> {
        // Two passes so constraints may reference earlier parameters.
        let mut ids = Vec::new();
        for param in params {
            let id = self.table.add_type_param(TypeParamDef {
                name: param.name.to_string(),
                constraint: None,
                default: None,
            });
            self.declare_type(&param.name, TypeBinding::Param(id));
            ids.push(id);
        }
        for (param, &id) in params.iter().zip(&ids) {
            let constraint = param.constraint.map(|c| self.convert_type(c));
            let default = param.default.map(|d| self.convert_type(d));
            let def = &mut self.table.type_params[id.0 as usize];
            def.constraint = constraint;
            def.default = default;
        }
        ids
    }

    // =========================================================================
    // Annotation conversion
    // =========================================================================

    /// Convert a syntactic type annotation into a semantic type.
    pub fn convert_type(&mut self, node_id: TypeNodeId) -> TypeId {
        if self.type_depth >= tsr_common::limits::TYPE_RECURSION_LIMIT {
            return self.table.any();
        }
        self.type_depth += 1;
        let result = self.convert_type_inner(node_id);
        self.type_depth -= 1;
        result
    }

    fn convert_type_inner(&mut self, node_id: TypeNodeId) -> TypeId {
        let arena = &self.graph.modules[self.current_module as usize].ast.arena;
        let node = arena.type_node(node_id);
        let span = node.span;
        match node.kind.clone() {
            TypeNodeKind::Keyword(keyword) => match keyword {
                TypeKeyword::Number => self.table.number(),
                TypeKeyword::String => self.table.string(),
                TypeKeyword::Boolean => self.table.boolean(),
                TypeKeyword::Any => self.table.any(),
                TypeKeyword::Unknown => self.table.unknown(),
                TypeKeyword::Void => self.table.void(),
                TypeKeyword::Never => self.table.never(),
                TypeKeyword::Null => self.table.null(),
                TypeKeyword::Undefined => self.table.undefined(),
                TypeKeyword::Symbol => self.table.symbol(),
            },
            TypeNodeKind::Literal(lit) => match lit {
                TypeLit::String(s) => self.table.string_lit(&s),
                TypeLit::Number(n) => self.table.number_lit(n),
                TypeLit::Boolean(b) => self.table.bool_lit(b),
            },
            TypeNodeKind::Array(element) => {
                let element = self.convert_type(element);
                self.table.array(element)
            }
            TypeNodeKind::Tuple { elements, rest } => {
                let required = elements.iter().take_while(|e| !e.optional).count();
                let element_tys: Vec<TypeId> = elements
                    .iter()
                    .map(|e| self.convert_type(e.ty))
                    .collect();
                let rest = rest.map(|r| self.convert_type(r));
                self.table.intern(TypeKind::Tuple {
                    elements: element_tys,
                    required,
                    rest,
                })
            }
            TypeNodeKind::Union(members) => {
                let members: Vec<TypeId> =
                    members.into_iter().map(|m| self.convert_type(m)).collect();
                self.table.union(members)
            }
            TypeNodeKind::Intersection(members) => {
                let members: Vec<TypeId> =
                    members.into_iter().map(|m| self.convert_type(m)).collect();
                self.table.intersection(members)
            }
            TypeNodeKind::Function {
                type_params,
                params,
                return_ty,
            } => {
                self.push_scope(ScopeKind::Block);
                let type_param_ids = self.declare_type_params(&type_params);
                let mut infos = Vec::new();
                let mut rest = None;
                let mut min_args = 0;
                for param in &params {
                    let ty = self.convert_type(param.ty);
                    if param.rest {
                        rest = Some(self.table.array(ty));
                    } else {
                        if !param.optional {
                            min_args = infos.len() + 1;
                        }
                        infos.push(crate::types::ParamInfo {
                            name: param.name.clone(),
                            ty,
                            optional: param.optional,
                        });
                    }
                }
                let (return_ty, predicate) = self.convert_return_type(return_ty);
                self.pop_scope();
                self.table.intern(TypeKind::Function(crate::types::FunctionType {
                    type_params: type_param_ids,
                    params: infos,
                    rest,
                    return_ty,
                    min_args,
                    predicate,
                }))
            }
            TypeNodeKind::TypeLiteral(members) => {
                let mut props: Vec<(Box<str>, PropInfo)> = Vec::new();
                let mut string_index = None;
                let mut number_index = None;
                for member in &members {
                    match member {
                        tsr_parser::ast::TypeLiteralMember::Property {
                            name,
                            ty,
                            optional,
                            readonly,
                        } => {
                            let ty = self.convert_type(*ty);
                            props.push((
                                name.clone(),
                                PropInfo {
                                    ty,
                                    optional: *optional,
                                    readonly: *readonly,
                                },
                            ));
                        }
                        tsr_parser::ast::TypeLiteralMember::IndexSignature {
                            key_ty,
                            value_ty,
                            ..
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
                self.table.intern(TypeKind::Record(RecordType {
                    props,
                    string_index,
                    number_index,
                }))
            }
            TypeNodeKind::Keyof(inner) => {
                let inner = self.convert_type(inner);
                crate::operations::keyof(&mut self.table, inner)
            }
            TypeNodeKind::IndexedAccess { object, index } => {
                let object = self.convert_type(object);
                let index = self.convert_type(index);
                crate::operations::indexed_access(&mut self.table, object, index)
            }
            TypeNodeKind::Mapped {
                param_name,
                constraint,
                as_clause,
                value,
                optional,
            } => {
                self.push_scope(ScopeKind::Block);
                let param = self.table.add_type_param(TypeParamDef {
                    name: param_name.to_string(),
                    constraint: None,
                    default: None,
                });
                self.declare_type(&param_name, TypeBinding::Param(param));
                let constraint = self.convert_type(constraint);
                let value = self.convert_type(value);
                let as_clause = as_clause.map(|a| self.convert_type(a));
                self.pop_scope();
                let mapped = crate::types::MappedType {
                    param,
                    constraint,
                    value,
                    optional: optional.map(|m| m == tsr_parser::ast::MappedModifier::Add),
                    as_clause,
                };
                crate::operations::expand_mapped(&mut self.table, &mapped)
            }
            TypeNodeKind::Predicate { ty, .. } => {
                // Bare predicate position outside a return type behaves
                // as boolean.
                let _ = self.convert_type(ty);
                self.table.boolean()
            }
            TypeNodeKind::Ref { name, type_args } => {
                self.convert_type_ref(&name, &type_args, span)
            }
        }
    }

    /// Return-type position: unwraps `x is T` predicates.
    pub fn convert_return_type(
        &mut self,
        node_id: TypeNodeId,
    ) -> (TypeId, Option<(Box<str>, TypeId)>) {
        let arena = &self.graph.modules[self.current_module as usize].ast.arena;
        if let TypeNodeKind::Predicate { param_name, ty } = arena.type_node(node_id).kind.clone()
        {
            let narrowed = self.convert_type(ty);
            let boolean = self.table.boolean();
            return (boolean, Some((param_name, narrowed)));
        }
        (self.convert_type(node_id), None)
    }

    fn convert_type_ref(&mut self, name: &str, type_args: &[TypeNodeId], span: Span) -> TypeId {
        let args: Vec<TypeId> = type_args.iter().map(|&a| self.convert_type(a)).collect();

        // Built-in generic wrappers.
        match name {
            "Array" => {
                let element = args.first().copied().unwrap_or_else(|| self.table.any());
                return self.table.array(element);
            }
            "Promise" => {
                let inner = args.first().copied().unwrap_or_else(|| self.table.any());
                return self.table.promise(inner);
            }
            "Generator" | "IterableIterator" => {
                let inner = args.first().copied().unwrap_or_else(|| self.table.any());
                return self.table.generator(inner);
            }
            "Uppercase" | "Lowercase" | "Capitalize" | "Uncapitalize" => {
                let kind = match name {
                    "Uppercase" => StringIntrinsicKind::Uppercase,
                    "Lowercase" => StringIntrinsicKind::Lowercase,
                    "Capitalize" => StringIntrinsicKind::Capitalize,
                    _ => StringIntrinsicKind::Uncapitalize,
                };
                let arg = args.first().copied().unwrap_or_else(|| self.table.string());
                return crate::operations::string_intrinsic(&mut self.table, kind, arg);
            }
            _ => {}
        }

        match self.lookup_type(name) {
            Some(TypeBinding::Param(id)) => self.table.intern(TypeKind::Param(id)),
            Some(TypeBinding::Interface(def)) => {
                self.table.intern(TypeKind::Interface(def, args))
            }
            Some(TypeBinding::Class(def)) => self.table.intern(TypeKind::Instance(def, args)),
            Some(TypeBinding::Enum(def)) => self.table.intern(TypeKind::Enum(def)),
            Some(TypeBinding::Alias { type_params, body }) => {
                if !type_params.is_empty() && !args.is_empty() {
                    if args.len() != type_params.len() {
                        self.error(
                            span,
                            codes::TYPE_ARGUMENT_COUNT_MISMATCH,
                            &[&type_params.len().to_string(), &args.len().to_string()],
                        );
                    }
                    let subst = crate::operations::build_subst(&type_params, &args);
                    crate::operations::substitute(&mut self.table, body, &subst)
                } else {
                    body
                }
            }
            None => {
                self.error(span, codes::UNKNOWN_TYPE_NAME, &[name]);
                self.table.any()
            }
        }
    }
}
