//! Statement execution, hoisting, and module initialization.

use std::rc::Rc;

use indexmap::IndexMap;
use tsr_parser::ast::{
    ClassMemberKind, ForHead, ImportKind, MethodKind, Modifiers, StmtId, StmtKind, VarKind,
};
use tsr_runtime::host;
use tsr_runtime::ops;
use tsr_runtime::value::{ClassValue, ObjectValue};
use tsr_runtime::Value;

use crate::closure::{BoxFuture, FieldInit, InterpClassData, Signal};
use crate::env::{Env, EnvKind, VarCell};
use crate::eval::{call_function, eval_expr, get_property, iterator_next, make_closure};
use crate::InterpCx;

pub(crate) type ExecResult = Result<(), Signal>;

// =============================================================================
// Hoisting
// =============================================================================

/// Hoist `var` declarations and function declarations into the current
/// function scope before executing a body.
pub(crate) fn hoist(cx: &Rc<InterpCx>, module: u32, env: &Rc<Env>, stmts: &[StmtId]) {
    for &stmt in stmts {
        hoist_stmt(cx, module, env, stmt);
    }
}

fn hoist_stmt(cx: &Rc<InterpCx>, module: u32, env: &Rc<Env>, stmt: StmtId) {
    let kind = cx.arena(module).stmt(stmt).kind.clone();
    match kind {
        StmtKind::VarDecl {
            kind: VarKind::Var,
            declarations,
        } => {
            for decl in &declarations {
                let scope = env.function_scope();
                if scope.lookup(&decl.name).is_none() {
                    scope.define(&decl.name, Value::Undefined, true);
                }
            }
        }
        StmtKind::FunctionDecl { name, func } => {
            env.define(&name, make_closure(cx, module, env, func, None), false);
        }
        StmtKind::Block(stmts) => hoist(cx, module, env, &stmts),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            hoist_stmt(cx, module, env, then_branch);
            if let Some(else_branch) = else_branch {
                hoist_stmt(cx, module, env, else_branch);
            }
        }
        StmtKind::While { body, .. }
        | StmtKind::DoWhile { body, .. }
        | StmtKind::Labeled { body, .. }
        | StmtKind::ForIn { body, .. }
        | StmtKind::ForOf { body, .. } => hoist_stmt(cx, module, env, body),
        StmtKind::For { init, body, .. } => {
            if let Some(init) = init {
                hoist_stmt(cx, module, env, init);
            }
            hoist_stmt(cx, module, env, body);
        }
        StmtKind::Try {
            block,
            catch,
            finally,
        } => {
            hoist(cx, module, env, &block);
            if let Some(catch) = &catch {
                hoist(cx, module, env, &catch.body);
            }
            if let Some(finally) = &finally {
                hoist(cx, module, env, finally);
            }
        }
        StmtKind::Switch { cases, .. } => {
            for case in &cases {
                hoist(cx, module, env, &case.body);
            }
        }
        StmtKind::ExportDecl(inner) => hoist_stmt(cx, module, env, inner),
        _ => {}
    }
}

// =============================================================================
// Statements
// =============================================================================

pub(crate) async fn exec_stmts(
    cx: &Rc<InterpCx>,
    module: u32,
    env: &Rc<Env>,
    stmts: &[StmtId],
) -> ExecResult {
    for &stmt in stmts {
        exec_stmt(cx.clone(), module, env.clone(), stmt, None).await?;
    }
    Ok(())
}

pub(crate) fn exec_stmt(
    cx: Rc<InterpCx>,
    module: u32,
    env: Rc<Env>,
    stmt: StmtId,
    label: Option<String>,
) -> BoxFuture<ExecResult> {
    Box::pin(async move {
        let kind = cx.arena(module).stmt(stmt).kind.clone();
        match kind {
            StmtKind::Empty => Ok(()),
            StmtKind::Expr(expr) => {
                eval_expr(cx.clone(), module, env.clone(), expr).await?;
                Ok(())
            }
            StmtKind::VarDecl { kind, declarations } => {
                for decl in &declarations {
                    let value = match decl.init {
                        Some(init) => {
                            eval_expr(cx.clone(), module, env.clone(), init).await?
                        }
                        None => Value::Undefined,
                    };
                    match kind {
                        VarKind::Var => {
                            // Hoisted cell already exists; write it.
                            let scope = env.function_scope();
                            if scope.lookup(&decl.name).is_none() {
                                scope.define(&decl.name, value, true);
                            } else {
                                let _ = scope.assign(&decl.name, value);
                            }
                        }
                        VarKind::Let => env.define(&decl.name, value, true),
                        VarKind::Const => env.define(&decl.name, value, false),
                    }
                }
                Ok(())
            }
            StmtKind::Block(stmts) => {
                let block_env = env.block();
                exec_stmts(&cx, module, &block_env, &stmts).await
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let test = eval_expr(cx.clone(), module, env.clone(), cond).await?;
                if ops::truthy(&test) {
                    exec_stmt(cx.clone(), module, env.clone(), then_branch, None).await
                } else if let Some(else_branch) = else_branch {
                    exec_stmt(cx.clone(), module, env.clone(), else_branch, None).await
                } else {
                    Ok(())
                }
            }
            StmtKind::While { cond, body } => {
                loop {
                    let test = eval_expr(cx.clone(), module, env.clone(), cond).await?;
                    if !ops::truthy(&test) {
                        return Ok(());
                    }
                    match exec_stmt(cx.clone(), module, env.clone(), body, None).await {
                        Ok(()) => {}
                        Err(signal) => match loop_signal(signal, label.as_deref())? {
                            LoopFlow::Break => return Ok(()),
                            LoopFlow::Continue => {}
                        },
                    }
                }
            }
            StmtKind::DoWhile { body, cond } => {
                loop {
                    match exec_stmt(cx.clone(), module, env.clone(), body, None).await {
                        Ok(()) => {}
                        Err(signal) => match loop_signal(signal, label.as_deref())? {
                            LoopFlow::Break => return Ok(()),
                            LoopFlow::Continue => {}
                        },
                    }
                    let test = eval_expr(cx.clone(), module, env.clone(), cond).await?;
                    if !ops::truthy(&test) {
                        return Ok(());
                    }
                }
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                let loop_env = env.block();
                if let Some(init) = init {
                    exec_stmt(cx.clone(), module, loop_env.clone(), init, None).await?;
                }
                loop {
                    if let Some(test) = test {
                        let value =
                            eval_expr(cx.clone(), module, loop_env.clone(), test).await?;
                        if !ops::truthy(&value) {
                            return Ok(());
                        }
                    }
                    let iter_env = loop_env.block();
                    match exec_stmt(cx.clone(), module, iter_env, body, None).await {
                        Ok(()) => {}
                        Err(signal) => match loop_signal(signal, label.as_deref())? {
                            LoopFlow::Break => return Ok(()),
                            LoopFlow::Continue => {}
                        },
                    }
                    if let Some(update) = update {
                        eval_expr(cx.clone(), module, loop_env.clone(), update).await?;
                    }
                }
            }
            StmtKind::ForIn { head, object, body } => {
                let value = eval_expr(cx.clone(), module, env.clone(), object).await?;
                for key in ops::own_keys(&value) {
                    let iter_env = env.block();
                    bind_loop_head(&iter_env, &head, Value::string(key));
                    match exec_stmt(cx.clone(), module, iter_env, body, None).await {
                        Ok(()) => {}
                        Err(signal) => match loop_signal(signal, label.as_deref())? {
                            LoopFlow::Break => return Ok(()),
                            LoopFlow::Continue => {}
                        },
                    }
                }
                Ok(())
            }
            StmtKind::ForOf {
                head,
                iterable,
                body,
                is_await,
            } => {
                exec_for_of(
                    &cx,
                    module,
                    &env,
                    &head,
                    iterable,
                    body,
                    is_await,
                    label.as_deref(),
                )
                .await
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                let value =
                    eval_expr(cx.clone(), module, env.clone(), discriminant).await?;
                let switch_env = env.block();
                // Find the matching clause (or default), then fall
                // through until a break.
                let mut start = None;
                for (i, case) in cases.iter().enumerate() {
                    if let Some(test) = case.test {
                        let test_value =
                            eval_expr(cx.clone(), module, switch_env.clone(), test).await?;
                        if ops::strict_eq(&value, &test_value) {
                            start = Some(i);
                            break;
                        }
                    }
                }
                if start.is_none() {
                    start = cases.iter().position(|c| c.test.is_none());
                }
                if let Some(start) = start {
                    for case in &cases[start..] {
                        for &inner in &case.body {
                            match exec_stmt(
                                cx.clone(),
                                module,
                                switch_env.clone(),
                                inner,
                                None,
                            )
                            .await
                            {
                                Ok(()) => {}
                                Err(Signal::Break(None)) => return Ok(()),
                                Err(Signal::Break(Some(l)))
                                    if label.as_deref() == Some(l.as_str()) =>
                                {
                                    return Ok(());
                                }
                                Err(other) => return Err(other),
                            }
                        }
                    }
                }
                Ok(())
            }
            StmtKind::Labeled { label, body } => {
                match exec_stmt(
                    cx.clone(),
                    module,
                    env.clone(),
                    body,
                    Some(label.to_string()),
                )
                .await
                {
                    Err(Signal::Break(Some(l))) if l == *label => Ok(()),
                    other => other,
                }
            }
            StmtKind::Break(label) => Err(Signal::Break(label.map(|l| l.to_string()))),
            StmtKind::Continue(label) => {
                Err(Signal::Continue(label.map(|l| l.to_string())))
            }
            StmtKind::Return(arg) => {
                let value = match arg {
                    Some(arg) => eval_expr(cx.clone(), module, env.clone(), arg).await?,
                    None => Value::Undefined,
                };
                Err(Signal::Return(value))
            }
            StmtKind::Throw(arg) => {
                let value = eval_expr(cx.clone(), module, env.clone(), arg).await?;
                Err(Signal::Throw(value))
            }
            StmtKind::Try {
                block,
                catch,
                finally,
            } => {
                let block_env = env.block();
                let mut result = exec_stmts(&cx, module, &block_env, &block).await;
                if let Err(Signal::Throw(error)) = &result
                    && let Some(catch) = &catch
                {
                    let catch_env = env.block();
                    if let Some(param) = &catch.param {
                        catch_env.define(param, error.clone(), true);
                    }
                    result = exec_stmts(&cx, module, &catch_env, &catch.body).await;
                }
                if let Some(finally) = &finally {
                    // `finally` runs on every exit path; its own abrupt
                    // completion wins.
                    let finally_env = env.block();
                    let finally_result =
                        exec_stmts(&cx, module, &finally_env, finally).await;
                    if finally_result.is_err() {
                        return finally_result;
                    }
                }
                result
            }
            StmtKind::FunctionDecl { .. } => {
                // Bound during hoisting.
                Ok(())
            }
            StmtKind::ClassDecl(class_id) => {
                let class = declare_class(&cx, module, &env, class_id).await?;
                let name = cx.arena(module).class(class_id).name.to_string();
                env.define(&name, class, false);
                Ok(())
            }
            StmtKind::InterfaceDecl(_) | StmtKind::TypeAlias { .. } => Ok(()),
            StmtKind::EnumDecl { name, members } => {
                let value = declare_enum(&cx, module, &env, &members).await?;
                env.define(&name, value, false);
                Ok(())
            }
            StmtKind::Import { kind, specifier } => {
                bind_import(&cx, module, &env, &kind, &specifier);
                Ok(())
            }
            StmtKind::ExportDecl(inner) => {
                exec_stmt(cx.clone(), module, env.clone(), inner, None).await?;
                sync_export_decl(&cx, module, &env, inner);
                Ok(())
            }
            StmtKind::ExportDefault(expr) => {
                let value = eval_expr(cx.clone(), module, env.clone(), expr).await?;
                write_export_cell(&cx, module, "default", value);
                Ok(())
            }
            StmtKind::ExportAssignment(expr) => {
                let value = eval_expr(cx.clone(), module, env.clone(), expr).await?;
                write_export_cell(&cx, module, "=", value);
                Ok(())
            }
            StmtKind::ExportNamed { specifiers, from } => {
                match from {
                    Some(from) => {
                        // Re-export: copy the target module's cells.
                        let resolved = tsr_resolver::resolve_specifier(
                            cx.module_specifier(module),
                            &from,
                        );
                        if let Some(target) = cx.graph.by_specifier(&resolved) {
                            let target_index = target.id.index();
                            for spec in &specifiers {
                                let value = read_export_cell(
                                    &cx,
                                    target_index as u32,
                                    &spec.local,
                                );
                                write_export_cell(&cx, module, &spec.exported, value);
                            }
                        }
                    }
                    None => {
                        for spec in &specifiers {
                            let value =
                                env.get(&spec.local).unwrap_or(Value::Undefined);
                            write_export_cell(&cx, module, &spec.exported, value);
                        }
                    }
                }
                Ok(())
            }
            StmtKind::ExportStar { from } => {
                let resolved =
                    tsr_resolver::resolve_specifier(cx.module_specifier(module), &from);
                if let Some(target) = cx.graph.by_specifier(&resolved) {
                    let target_index = target.id.index();
                    let names: Vec<String> = cx.export_cells.borrow()[target_index]
                        .keys()
                        .filter(|k| *k != "default" && *k != "=")
                        .cloned()
                        .collect();
                    for name in names {
                        let value = read_export_cell(&cx, target_index as u32, &name);
                        write_export_cell(&cx, module, &name, value);
                    }
                }
                Ok(())
            }
        }
    })
}

enum LoopFlow {
    Break,
    Continue,
}

/// Interpret a loop body's abrupt completion for this loop (optionally
/// labeled); anything that isn't ours propagates.
fn loop_signal(signal: Signal, label: Option<&str>) -> Result<LoopFlow, Signal> {
    match signal {
        Signal::Break(None) => Ok(LoopFlow::Break),
        Signal::Continue(None) => Ok(LoopFlow::Continue),
        Signal::Break(Some(l)) if label == Some(l.as_str()) => Ok(LoopFlow::Break),
        Signal::Continue(Some(l)) if label == Some(l.as_str()) => Ok(LoopFlow::Continue),
        other => Err(other),
    }
}

fn bind_loop_head(env: &Rc<Env>, head: &ForHead, value: Value) {
    if head.var_kind.is_some() {
        env.define(&head.name, value, true);
    } else {
        let _ = env.assign(&head.name, value);
    }
}

#[allow(clippy::too_many_arguments)]
async fn exec_for_of(
    cx: &Rc<InterpCx>,
    module: u32,
    env: &Rc<Env>,
    head: &ForHead,
    iterable: tsr_parser::ExprId,
    body: StmtId,
    is_await: bool,
    label: Option<&str>,
) -> ExecResult {
    let value = eval_expr(cx.clone(), module, env.clone(), iterable).await?;
    match ops::get_iter_source(&value) {
        Ok(ops::IterSource::Items(items)) => {
            for item in items {
                let item = if is_await {
                    await_value(cx, item).await?
                } else {
                    item
                };
                let iter_env = env.block();
                bind_loop_head(&iter_env, head, item);
                match exec_stmt(cx.clone(), module, iter_env, body, None).await {
                    Ok(()) => {}
                    Err(signal) => match loop_signal(signal, label)? {
                        LoopFlow::Break => return Ok(()),
                        LoopFlow::Continue => {}
                    },
                }
            }
            Ok(())
        }
        Ok(ops::IterSource::Dynamic(iterator)) => {
            loop {
                let step = iterator_next(cx, &iterator, None).await?;
                let step = if is_await {
                    await_value(cx, step).await?
                } else {
                    step
                };
                let done = get_property(cx, &step, "done").await?;
                if ops::truthy(&done) {
                    return Ok(());
                }
                let mut item = get_property(cx, &step, "value").await?;
                if is_await {
                    item = await_value(cx, item).await?;
                }
                let iter_env = env.block();
                bind_loop_head(&iter_env, head, item);
                match exec_stmt(cx.clone(), module, iter_env, body, None).await {
                    Ok(()) => {}
                    Err(signal) => match loop_signal(signal, label)? {
                        LoopFlow::Break => return Ok(()),
                        LoopFlow::Continue => {}
                    },
                }
            }
        }
        Err(error) => Err(Signal::Throw(error)),
    }
}

async fn await_value(cx: &Rc<InterpCx>, value: Value) -> Result<Value, Signal> {
    match value {
        Value::Promise(promise) => {
            let register_cx = cx.clone();
            crate::closure::AwaitPromise {
                promise,
                registered: false,
                register: Some(Box::new(move |p| register_cx.register_wake(p))),
            }
            .await
        }
        other => Ok(other),
    }
}

// =============================================================================
// Class and enum declarations
// =============================================================================

async fn declare_class(
    cx: &Rc<InterpCx>,
    module: u32,
    env: &Rc<Env>,
    class_id: tsr_parser::ClassId,
) -> Result<Value, Signal> {
    let class = cx.arena(module).class(class_id).clone();

    // Resolve the superclass expression to a class value.
    let parent = match class.superclass {
        Some(superclass) => {
            let value = eval_expr(cx.clone(), module, env.clone(), superclass).await?;
            match value {
                Value::Class(parent) => Some(parent),
                other => {
                    return Err(cx.throw_string(format!(
                        "Class extends value {} is not a constructor",
                        tsr_runtime::fmt::to_string_value(&other)
                    )));
                }
            }
        }
        None => None,
    };

    let mut data = InterpClassData {
        module,
        env: env.clone(),
        ctor: None,
        param_props: Vec::new(),
        methods: rustc_hash::FxHashMap::default(),
        getters: rustc_hash::FxHashMap::default(),
        setters: rustc_hash::FxHashMap::default(),
        field_inits: Vec::new(),
    };
    let mut static_fields: Vec<(String, Option<tsr_parser::ExprId>)> = Vec::new();
    let mut static_methods: Vec<(String, tsr_parser::FuncId)> = Vec::new();
    let mut member_decorators: Vec<(String, Vec<tsr_parser::ExprId>)> = Vec::new();

    for member in &class.members {
        let is_static = member.modifiers.contains(Modifiers::STATIC);
        match &member.kind {
            ClassMemberKind::Field { key, init, .. } => {
                let Some(name) = key.static_name() else { continue };
                if is_static {
                    static_fields.push((name, *init));
                } else {
                    data.field_inits.push(FieldInit {
                        name,
                        init: *init,
                        readonly: member.modifiers.contains(Modifiers::READONLY),
                    });
                }
            }
            ClassMemberKind::Method { key, kind, func } => {
                let Some(name) = key.static_name() else { continue };
                if !member.decorators.is_empty() {
                    member_decorators.push((name.clone(), member.decorators.clone()));
                }
                let has_body = cx.arena(module).func(*func).body.is_some();
                if !has_body {
                    // Abstract members are not installed.
                    continue;
                }
                match kind {
                    MethodKind::Constructor => {
                        data.ctor = Some(*func);
                        let params = cx.arena(module).func(*func).params.clone();
                        for (i, param) in params.iter().enumerate() {
                            if param.modifiers.has_access_modifier()
                                || param.modifiers.contains(Modifiers::READONLY)
                            {
                                data.param_props.push((
                                    i,
                                    param.name.to_string(),
                                    param.modifiers.contains(Modifiers::READONLY),
                                ));
                            }
                        }
                    }
                    MethodKind::Getter => {
                        data.getters.insert(name, *func);
                    }
                    MethodKind::Setter => {
                        data.setters.insert(name, *func);
                    }
                    MethodKind::Method => {
                        if is_static {
                            static_methods.push((name, *func));
                        } else {
                            data.methods.insert(name, *func);
                        }
                    }
                }
            }
            ClassMemberKind::IndexSignature { .. } => {}
        }
    }

    let class_value = Rc::new(ClassValue {
        name: class.name.to_string(),
        parent,
        statics: std::cell::RefCell::new(IndexMap::new()),
        payload: Rc::new(data),
        is_abstract: class.is_abstract,
    });

    // Statics evaluate at declaration time.
    for (name, func) in static_methods {
        let method = make_closure(cx, module, env, func, Some(class_value.clone()));
        class_value.statics.borrow_mut().insert(name, method);
    }
    for (name, init) in static_fields {
        let value = match init {
            Some(init) => eval_expr(cx.clone(), module, env.clone(), init).await?,
            None => Value::Undefined,
        };
        class_value.statics.borrow_mut().insert(name, value);
    }

    let mut result = Value::Class(class_value.clone());

    // Member decorators observe the established class.
    for (name, decorators) in member_decorators {
        for decorator in decorators.iter().rev() {
            let decorator_value =
                eval_expr(cx.clone(), module, env.clone(), *decorator).await?;
            let args = if cx.options.legacy_decorators {
                vec![result.clone(), Value::string(&name)]
            } else {
                let context = ObjectValue::new();
                context.set("kind", Value::string("method"));
                context.set("name", Value::string(&name));
                vec![Value::Undefined, Value::Object(context)]
            };
            call_function(cx.clone(), decorator_value, Value::Undefined, args).await?;
        }
    }

    // Class decorators apply outside-in: the innermost (closest)
    // decorator runs first, each may replace the class value.
    for decorator in class.decorators.iter().rev() {
        let decorator_value =
            eval_expr(cx.clone(), module, env.clone(), *decorator).await?;
        let args = if cx.options.legacy_decorators {
            vec![result.clone()]
        } else {
            let context = ObjectValue::new();
            context.set("kind", Value::string("class"));
            context.set("name", Value::string(&class.name));
            vec![result.clone(), Value::Object(context)]
        };
        let replaced =
            call_function(cx.clone(), decorator_value, Value::Undefined, args).await?;
        if !replaced.is_nullish() {
            result = replaced;
        }
    }

    Ok(result)
}

async fn declare_enum(
    cx: &Rc<InterpCx>,
    module: u32,
    env: &Rc<Env>,
    members: &[tsr_parser::ast::EnumMember],
) -> Result<Value, Signal> {
    let object = ObjectValue::new();
    let mut next_auto = 0.0f64;
    for member in members {
        let value = match member.init {
            Some(init) => eval_expr(cx.clone(), module, env.clone(), init).await?,
            None => Value::Number(next_auto),
        };
        if let Value::Number(n) = &value {
            next_auto = n + 1.0;
            // Numeric members get a reverse mapping.
            object.set(
                &tsr_runtime::fmt::format_number(*n),
                Value::string(&*member.name),
            );
        }
        object.set(&member.name, value);
    }
    Ok(Value::Object(object))
}

// =============================================================================
// Modules
// =============================================================================

/// Create export binding cells up front so cyclic imports can alias
/// them before the exporting module's body has run.
pub(crate) fn prepare_export_cells(cx: &Rc<InterpCx>) {
    let mut all = cx.export_cells.borrow_mut();
    for (index, module) in cx.graph.modules.iter().enumerate() {
        let cells = &mut all[index];
        for name in module.exports.named.keys() {
            cells
                .entry(name.clone())
                .or_insert_with(|| Rc::new(std::cell::RefCell::new(Value::Undefined)));
        }
        if module.exports.has_default {
            cells
                .entry("default".to_string())
                .or_insert_with(|| Rc::new(std::cell::RefCell::new(Value::Undefined)));
        }
        if module.exports.has_export_assignment {
            cells
                .entry("=".to_string())
                .or_insert_with(|| Rc::new(std::cell::RefCell::new(Value::Undefined)));
        }
    }
}

fn export_cell(cx: &Rc<InterpCx>, module: u32, name: &str) -> VarCell {
    let mut all = cx.export_cells.borrow_mut();
    all[module as usize]
        .entry(name.to_string())
        .or_insert_with(|| Rc::new(std::cell::RefCell::new(Value::Undefined)))
        .clone()
}

fn write_export_cell(cx: &Rc<InterpCx>, module: u32, name: &str, value: Value) {
    *export_cell(cx, module, name).borrow_mut() = value;
}

fn read_export_cell(cx: &Rc<InterpCx>, module: u32, name: &str) -> Value {
    export_cell(cx, module, name).borrow().clone()
}

/// Execute one module body in its own scope.
pub(crate) fn run_module(cx: Rc<InterpCx>, module: u32) -> BoxFuture<ExecResult> {
    Box::pin(async move {
        let env = cx.global.child(EnvKind::Module);
        let stmts = cx.graph.modules[module as usize].ast.statements.clone();
        hoist(&cx, module, &env, &stmts);
        for &stmt in &stmts {
            exec_stmt(cx.clone(), module, env.clone(), stmt, None).await?;
        }
        // Final export sync: declaration exports publish their cells.
        for &stmt in &stmts {
            sync_export_stmt(&cx, module, &env, stmt);
        }
        Ok(())
    })
}

fn sync_export_stmt(cx: &Rc<InterpCx>, module: u32, env: &Rc<Env>, stmt: StmtId) {
    if let StmtKind::ExportDecl(inner) = cx.arena(module).stmt(stmt).kind.clone() {
        sync_export_decl(cx, module, env, inner);
    }
}

/// Publish the final values of an exported declaration into its cells.
fn sync_export_decl(cx: &Rc<InterpCx>, module: u32, env: &Rc<Env>, inner: StmtId) {
    let kind = cx.arena(module).stmt(inner).kind.clone();
    let names: Vec<String> = match kind {
        StmtKind::VarDecl { declarations, .. } => {
            declarations.iter().map(|d| d.name.to_string()).collect()
        }
        StmtKind::FunctionDecl { name, .. } => vec![name.to_string()],
        StmtKind::ClassDecl(class_id) => {
            vec![cx.arena(module).class(class_id).name.to_string()]
        }
        StmtKind::EnumDecl { name, .. } => vec![name.to_string()],
        _ => Vec::new(),
    };
    for name in names {
        if let Some(value) = env.get(&name) {
            write_export_cell(cx, module, &name, value);
        }
    }
}

fn bind_import(
    cx: &Rc<InterpCx>,
    module: u32,
    env: &Rc<Env>,
    kind: &ImportKind,
    specifier: &str,
) {
    let resolved = tsr_resolver::resolve_specifier(cx.module_specifier(module), specifier);

    if tsr_resolver::is_builtin_module(&resolved) {
        let namespace = host::host_module(&resolved).unwrap_or(Value::Undefined);
        match kind {
            ImportKind::SideEffect => {}
            ImportKind::EqualsRequire { local } => env.define(local, namespace, false),
            ImportKind::Clause {
                default,
                namespace: ns,
                named,
            } => {
                if let Some(default) = default {
                    env.define(default, namespace.clone(), false);
                }
                if let Some(ns) = ns {
                    env.define(ns, namespace.clone(), false);
                }
                for spec in named {
                    let value = namespace
                        .get_shared_property(&spec.imported)
                        .unwrap_or(Value::Undefined);
                    env.define(&spec.local, value, false);
                }
            }
        }
        return;
    }

    let Some(target) = cx.graph.by_specifier(&resolved) else {
        // Unresolved imports were already diagnosed; bind undefined.
        bind_import_undefined(env, kind);
        return;
    };
    let target_index = target.id.0;

    match kind {
        ImportKind::SideEffect => {}
        ImportKind::EqualsRequire { local } => {
            // `import x = require(...)` targets `export =`, falling back
            // to the default export.
            let has_assignment = cx.export_cells.borrow()[target_index as usize]
                .contains_key("=");
            let cell = if has_assignment {
                export_cell(cx, target_index, "=")
            } else {
                export_cell(cx, target_index, "default")
            };
            env.define_cell(local, cell, false);
        }
        ImportKind::Clause {
            default,
            namespace,
            named,
        } => {
            if let Some(default) = default {
                let cell = export_cell(cx, target_index, "default");
                env.define_cell(default, cell, false);
            }
            if let Some(namespace) = namespace {
                // Namespace objects snapshot the target's cells; the
                // target ran before us in initialization order.
                let object = ObjectValue::new();
                let cells: Vec<(String, VarCell)> = cx.export_cells.borrow()
                    [target_index as usize]
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                for (name, cell) in cells {
                    if name != "=" {
                        object.set(&name, cell.borrow().clone());
                    }
                }
                env.define(namespace, Value::Object(object), false);
            }
            for spec in named {
                let cell = export_cell(cx, target_index, &spec.imported);
                env.define_cell(&spec.local, cell, false);
            }
        }
    }
}

fn bind_import_undefined(env: &Rc<Env>, kind: &ImportKind) {
    match kind {
        ImportKind::SideEffect => {}
        ImportKind::EqualsRequire { local } => env.define(local, Value::Undefined, false),
        ImportKind::Clause {
            default,
            namespace,
            named,
        } => {
            if let Some(default) = default {
                env.define(default, Value::Undefined, false);
            }
            if let Some(namespace) = namespace {
                env.define(namespace, Value::Undefined, false);
            }
            for spec in named {
                env.define(&spec.local, Value::Undefined, false);
            }
        }
    }
}
