//! Expression evaluation.

use std::rc::Rc;

use indexmap::IndexMap;
use tsr_parser::ast::{
    AssignOp, BinaryOp, ExprId, ExprKind, FuncBody, FuncId, LogicalOp, ObjectPropKind, PropKey,
    UnaryOp, UpdateOp,
};
use tsr_runtime::host::{builtin_member, host_error};
use tsr_runtime::ops;
use tsr_runtime::value::{
    ClassValue, FunctionPayload, FunctionValue, InstanceValue, ObjectValue,
};
use tsr_runtime::Value;

use crate::closure::{
    AwaitPromise, BoxFuture, EvalResult, GenChannel, GenOp, GenOpKind, GenResume, GeneratorState,
    InterpClassData, InterpClosure, Signal, YieldPoint,
};
use crate::env::{AssignError, Env, EnvKind};
use crate::exec;
use crate::InterpCx;

pub(crate) fn eval_expr(
    cx: Rc<InterpCx>,
    module: u32,
    env: Rc<Env>,
    id: ExprId,
) -> BoxFuture<EvalResult> {
    Box::pin(async move {
        let kind = cx.arena(module).expr(id).kind.clone();
        match kind {
            ExprKind::NullLit => Ok(Value::Null),
            ExprKind::UndefinedLit => Ok(Value::Undefined),
            ExprKind::BoolLit(b) => Ok(Value::Bool(b)),
            ExprKind::NumberLit(n) => Ok(Value::Number(n)),
            ExprKind::StringLit(s) => Ok(Value::string(&*s)),
            ExprKind::BigIntLit(digits) => {
                // BigInts are tokenized; their arithmetic is out of
                // scope, so they surface as plain numbers.
                Ok(Value::Number(
                    tsr_common::numeric::parse_numeric_literal_value(&digits)
                        .unwrap_or(f64::NAN),
                ))
            }
            ExprKind::Template { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(&expr) = exprs.get(i) {
                        let value =
                            eval_expr(cx.clone(), module, env.clone(), expr).await?;
                        out.push_str(&tsr_runtime::fmt::to_string_value(&value));
                    }
                }
                Ok(Value::string(out))
            }
            ExprKind::Ident(name) => match env.get(&name) {
                Some(value) => Ok(value),
                None => Err(cx.throw_string(format!("{name} is not defined"))),
            },
            ExprKind::This => Ok(env.this_value()),
            ExprKind::Super => {
                // Bare `super` only appears inside call/member forms,
                // which handle it; anything else is an error.
                Err(cx.throw_string("'super' keyword unexpected here"))
            }
            ExprKind::Unary { op, operand } => {
                // `typeof missing` must not throw.
                if op == UnaryOp::Typeof
                    && let ExprKind::Ident(name) = &cx.arena(module).expr(operand).kind
                    && env.lookup(name).is_none()
                {
                    return Ok(Value::string("undefined"));
                }
                if op == UnaryOp::Delete {
                    return eval_delete(&cx, module, &env, operand).await;
                }
                let value = eval_expr(cx.clone(), module, env.clone(), operand).await?;
                Ok(match op {
                    UnaryOp::Plus => Value::Number(ops::to_number(&value)),
                    UnaryOp::Minus => Value::Number(-ops::to_number(&value)),
                    UnaryOp::Not => Value::Bool(!ops::truthy(&value)),
                    UnaryOp::BitNot => Value::Number(f64::from(!ops::to_int32(&value))),
                    UnaryOp::Typeof => Value::string(ops::type_of(&value)),
                    UnaryOp::Void => Value::Undefined,
                    UnaryOp::Delete => unreachable!("handled above"),
                })
            }
            ExprKind::Update { op, prefix, target } => {
                let old = eval_expr(cx.clone(), module, env.clone(), target).await?;
                let old_n = ops::to_number(&old);
                let new_n = match op {
                    UpdateOp::Increment => old_n + 1.0,
                    UpdateOp::Decrement => old_n - 1.0,
                };
                assign_to_target(&cx, module, &env, target, Value::Number(new_n)).await?;
                Ok(Value::Number(if prefix { new_n } else { old_n }))
            }
            ExprKind::Binary { op, left, right } => {
                let lhs = eval_expr(cx.clone(), module, env.clone(), left).await?;
                let rhs = eval_expr(cx.clone(), module, env.clone(), right).await?;
                eval_binary(&cx, op, lhs, rhs)
            }
            ExprKind::Logical { op, left, right } => {
                let lhs = eval_expr(cx.clone(), module, env.clone(), left).await?;
                let take_right = match op {
                    LogicalOp::And => ops::truthy(&lhs),
                    LogicalOp::Or => !ops::truthy(&lhs),
                    LogicalOp::Nullish => lhs.is_nullish(),
                };
                if take_right {
                    eval_expr(cx.clone(), module, env.clone(), right).await
                } else {
                    Ok(lhs)
                }
            }
            ExprKind::Conditional {
                cond,
                when_true,
                when_false,
            } => {
                let test = eval_expr(cx.clone(), module, env.clone(), cond).await?;
                if ops::truthy(&test) {
                    eval_expr(cx.clone(), module, env.clone(), when_true).await
                } else {
                    eval_expr(cx.clone(), module, env.clone(), when_false).await
                }
            }
            ExprKind::Assign { op, target, value } => {
                let new_value = if op == AssignOp::Assign {
                    eval_expr(cx.clone(), module, env.clone(), value).await?
                } else if matches!(op, AssignOp::And | AssignOp::Or | AssignOp::Nullish) {
                    // Short-circuiting compound assignment.
                    let current =
                        eval_expr(cx.clone(), module, env.clone(), target).await?;
                    let proceed = match op {
                        AssignOp::And => ops::truthy(&current),
                        AssignOp::Or => !ops::truthy(&current),
                        _ => current.is_nullish(),
                    };
                    if !proceed {
                        return Ok(current);
                    }
                    eval_expr(cx.clone(), module, env.clone(), value).await?
                } else {
                    let current =
                        eval_expr(cx.clone(), module, env.clone(), target).await?;
                    let rhs = eval_expr(cx.clone(), module, env.clone(), value).await?;
                    compound_binary(&cx, op, current, rhs)?
                };
                assign_to_target(&cx, module, &env, target, new_value.clone()).await?;
                Ok(new_value)
            }
            ExprKind::Member { object, property } => {
                // `super.m` resolves against the home class's parent.
                if let ExprKind::Super = cx.arena(module).expr(object).kind {
                    return super_member(&cx, &env, &property);
                }
                let receiver = eval_expr(cx.clone(), module, env.clone(), object).await?;
                get_property(&cx, &receiver, &property).await
            }
            ExprKind::Index { object, index } => {
                let receiver = eval_expr(cx.clone(), module, env.clone(), object).await?;
                let key = eval_expr(cx.clone(), module, env.clone(), index).await?;
                get_indexed(&cx, &receiver, &key).await
            }
            ExprKind::Call { callee, args, .. } => {
                eval_call(&cx, module, &env, callee, &args).await
            }
            ExprKind::New { callee, args, .. } => {
                let class_value =
                    eval_expr(cx.clone(), module, env.clone(), callee).await?;
                let arg_values = eval_arguments(&cx, module, &env, &args).await?;
                match class_value {
                    Value::Class(class) => {
                        construct(cx.clone(), class, arg_values).await
                    }
                    Value::Function(func) => {
                        // Host constructors (Error) behave as factories.
                        call_function(
                            cx.clone(),
                            Value::Function(func),
                            Value::Undefined,
                            arg_values,
                        )
                        .await
                    }
                    other => Err(cx.throw_string(format!(
                        "{} is not a constructor",
                        tsr_runtime::fmt::to_string_value(&other)
                    ))),
                }
            }
            ExprKind::ObjectLit { props } => {
                eval_object_literal(&cx, module, &env, &props).await
            }
            ExprKind::ArrayLit { elements } => {
                let mut out = Vec::new();
                for &element in &elements {
                    if let ExprKind::Spread(inner) =
                        cx.arena(module).expr(element).kind.clone()
                    {
                        let value =
                            eval_expr(cx.clone(), module, env.clone(), inner).await?;
                        spread_into(&cx, &value, &mut out).await?;
                    } else {
                        out.push(
                            eval_expr(cx.clone(), module, env.clone(), element).await?,
                        );
                    }
                }
                Ok(Value::array(out))
            }
            ExprKind::Arrow(func) | ExprKind::Function(func) => {
                Ok(make_closure(&cx, module, &env, func, None))
            }
            ExprKind::Yield { arg, delegate } => {
                let Some(channel) = env.gen_channel() else {
                    return Err(cx.throw_string("yield outside of a generator"));
                };
                if delegate {
                    let iterable = match arg {
                        Some(arg) => {
                            eval_expr(cx.clone(), module, env.clone(), arg).await?
                        }
                        None => Value::Undefined,
                    };
                    return yield_delegate(&cx, &channel, iterable).await;
                }
                let value = match arg {
                    Some(arg) => eval_expr(cx.clone(), module, env.clone(), arg).await?,
                    None => Value::Undefined,
                };
                YieldPoint::new(channel, value).await
            }
            ExprKind::Await(operand) => {
                let value = eval_expr(cx.clone(), module, env.clone(), operand).await?;
                match value {
                    Value::Promise(promise) => {
                        let register_cx = cx.clone();
                        AwaitPromise {
                            promise,
                            registered: false,
                            register: Some(Box::new(move |p| {
                                register_cx.register_wake(p);
                            })),
                        }
                        .await
                    }
                    other => Ok(other),
                }
            }
            ExprKind::Spread(inner) => {
                // Bare spread outside a call/array context.
                eval_expr(cx.clone(), module, env.clone(), inner).await
            }
            ExprKind::Assertion { expr, .. } => {
                eval_expr(cx.clone(), module, env.clone(), expr).await
            }
        }
    })
}

// =============================================================================
// Operators
// =============================================================================

fn eval_binary(cx: &Rc<InterpCx>, op: BinaryOp, lhs: Value, rhs: Value) -> EvalResult {
    Ok(match op {
        BinaryOp::Add => ops::add(&lhs, &rhs),
        BinaryOp::Sub => Value::Number(ops::to_number(&lhs) - ops::to_number(&rhs)),
        BinaryOp::Mul => Value::Number(ops::to_number(&lhs) * ops::to_number(&rhs)),
        BinaryOp::Div => Value::Number(ops::to_number(&lhs) / ops::to_number(&rhs)),
        BinaryOp::Rem => Value::Number(ops::to_number(&lhs) % ops::to_number(&rhs)),
        BinaryOp::Exp => Value::Number(ops::to_number(&lhs).powf(ops::to_number(&rhs))),
        BinaryOp::Shl => Value::Number(f64::from(
            ops::to_int32(&lhs).wrapping_shl(ops::to_uint32(&rhs) & 31),
        )),
        BinaryOp::Shr => Value::Number(f64::from(
            ops::to_int32(&lhs).wrapping_shr(ops::to_uint32(&rhs) & 31),
        )),
        BinaryOp::UShr => Value::Number(f64::from(
            ops::to_uint32(&lhs).wrapping_shr(ops::to_uint32(&rhs) & 31),
        )),
        BinaryOp::BitAnd => Value::Number(f64::from(ops::to_int32(&lhs) & ops::to_int32(&rhs))),
        BinaryOp::BitOr => Value::Number(f64::from(ops::to_int32(&lhs) | ops::to_int32(&rhs))),
        BinaryOp::BitXor => Value::Number(f64::from(ops::to_int32(&lhs) ^ ops::to_int32(&rhs))),
        BinaryOp::Lt => compare_values(&lhs, &rhs, |o| o == std::cmp::Ordering::Less),
        BinaryOp::Gt => compare_values(&lhs, &rhs, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::Le => compare_values(&lhs, &rhs, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::Ge => compare_values(&lhs, &rhs, |o| o != std::cmp::Ordering::Less),
        BinaryOp::LooseEq => Value::Bool(ops::loose_eq(&lhs, &rhs)),
        BinaryOp::LooseNe => Value::Bool(!ops::loose_eq(&lhs, &rhs)),
        BinaryOp::StrictEq => Value::Bool(ops::strict_eq(&lhs, &rhs)),
        BinaryOp::StrictNe => Value::Bool(!ops::strict_eq(&lhs, &rhs)),
        BinaryOp::In => {
            let key = tsr_runtime::fmt::to_string_value(&lhs);
            Value::Bool(has_property(&rhs, &key))
        }
        BinaryOp::InstanceOf => match (&lhs, &rhs) {
            (Value::Instance(instance), Value::Class(class)) => {
                Value::Bool(instance.class.extends(class))
            }
            (_, Value::Class(_)) | (_, Value::Function(_)) => Value::Bool(false),
            _ => {
                return Err(cx.throw_string(
                    "right-hand side of 'instanceof' is not callable",
                ));
            }
        },
    })
}

fn compare_values(
    lhs: &Value,
    rhs: &Value,
    test: impl Fn(std::cmp::Ordering) -> bool,
) -> Value {
    match ops::compare(lhs, rhs) {
        Some(ordering) => Value::Bool(test(ordering)),
        None => Value::Bool(false),
    }
}

fn compound_binary(cx: &Rc<InterpCx>, op: AssignOp, lhs: Value, rhs: Value) -> EvalResult {
    let binary = match op {
        AssignOp::Add => BinaryOp::Add,
        AssignOp::Sub => BinaryOp::Sub,
        AssignOp::Mul => BinaryOp::Mul,
        AssignOp::Div => BinaryOp::Div,
        AssignOp::Rem => BinaryOp::Rem,
        AssignOp::Exp => BinaryOp::Exp,
        AssignOp::Shl => BinaryOp::Shl,
        AssignOp::Shr => BinaryOp::Shr,
        AssignOp::UShr => BinaryOp::UShr,
        AssignOp::BitAnd => BinaryOp::BitAnd,
        AssignOp::BitOr => BinaryOp::BitOr,
        AssignOp::BitXor => BinaryOp::BitXor,
        _ => return Err(cx.throw_string("invalid compound assignment")),
    };
    eval_binary(cx, binary, lhs, rhs)
}

fn has_property(value: &Value, key: &str) -> bool {
    if value.get_shared_property(key).is_some() {
        return true;
    }
    ops::own_keys(value).iter().any(|k| k == key)
}

// =============================================================================
// Assignment targets
// =============================================================================

async fn assign_to_target(
    cx: &Rc<InterpCx>,
    module: u32,
    env: &Rc<Env>,
    target: ExprId,
    value: Value,
) -> Result<(), Signal> {
    match cx.arena(module).expr(target).kind.clone() {
        ExprKind::Ident(name) => match env.assign(&name, value) {
            Ok(()) => Ok(()),
            Err(AssignError::Immutable) => {
                Err(cx.throw_string(format!("Assignment to constant variable '{name}'")))
            }
            Err(AssignError::Unbound) => {
                Err(cx.throw_string(format!("{name} is not defined")))
            }
        },
        ExprKind::Member { object, property } => {
            let receiver = eval_expr(cx.clone(), module, env.clone(), object).await?;
            set_property(cx, &receiver, &property, value).await
        }
        ExprKind::Index { object, index } => {
            let receiver = eval_expr(cx.clone(), module, env.clone(), object).await?;
            let key = eval_expr(cx.clone(), module, env.clone(), index).await?;
            set_indexed(cx, &receiver, &key, value).await
        }
        _ => Err(cx.throw_string("invalid assignment target")),
    }
}

async fn eval_delete(
    cx: &Rc<InterpCx>,
    module: u32,
    env: &Rc<Env>,
    operand: ExprId,
) -> EvalResult {
    match cx.arena(module).expr(operand).kind.clone() {
        ExprKind::Member { object, property } => {
            let receiver = eval_expr(cx.clone(), module, env.clone(), object).await?;
            Ok(Value::Bool(delete_property(&receiver, &property)))
        }
        ExprKind::Index { object, index } => {
            let receiver = eval_expr(cx.clone(), module, env.clone(), object).await?;
            let key = eval_expr(cx.clone(), module, env.clone(), index).await?;
            let key = tsr_runtime::fmt::to_string_value(&key);
            Ok(Value::Bool(delete_property(&receiver, &key)))
        }
        _ => Ok(Value::Bool(true)),
    }
}

fn delete_property(receiver: &Value, key: &str) -> bool {
    match receiver {
        Value::Object(object) => {
            object.props.borrow_mut().shift_remove(key);
            true
        }
        Value::Instance(instance) => {
            instance.fields.borrow_mut().shift_remove(key);
            true
        }
        _ => false,
    }
}

// =============================================================================
// Property access
// =============================================================================

/// Member lookup order: instance fields, class methods/getters up the
/// chain, class statics, shared structural properties, then the
/// built-in member tables.
pub(crate) async fn get_property(
    cx: &Rc<InterpCx>,
    receiver: &Value,
    name: &str,
) -> EvalResult {
    match receiver {
        Value::Undefined | Value::Null => Err(Signal::Throw(host_error(
            "ETYPE",
            &format!(
                "Cannot read properties of {} (reading '{name}')",
                tsr_runtime::fmt::to_string_value(receiver)
            ),
        ))),
        Value::Instance(instance) => {
            if let Some(value) = instance.fields.borrow().get(name).cloned() {
                return Ok(value);
            }
            if let Some((home, func, data)) = find_method(&instance.class, name) {
                return Ok(method_value(cx, &data, func, receiver.clone(), home, name));
            }
            if let Some((home, func, data)) = find_getter(&instance.class, name) {
                let getter = method_value(cx, &data, func, receiver.clone(), home, name);
                return call_function(cx.clone(), getter, receiver.clone(), Vec::new()).await;
            }
            Ok(Value::Undefined)
        }
        Value::Class(class) => {
            if let Some(value) = class.statics.borrow().get(name).cloned() {
                return Ok(value);
            }
            // Inherited statics.
            let mut parent = class.parent.clone();
            while let Some(p) = parent {
                if let Some(value) = p.statics.borrow().get(name).cloned() {
                    return Ok(value);
                }
                parent = p.parent.clone();
            }
            Ok(Value::Undefined)
        }
        other => {
            if let Some(value) = other.get_shared_property(name) {
                return Ok(value);
            }
            if let Some(member) = builtin_member(other, name) {
                // Methods bind their receiver so `xs.push` detached
                // still works.
                if let Value::Function(f) = &member {
                    return Ok(Value::Function(f.bind(other.clone())));
                }
                return Ok(member);
            }
            Ok(Value::Undefined)
        }
    }
}

async fn get_indexed(cx: &Rc<InterpCx>, receiver: &Value, key: &Value) -> EvalResult {
    if let (Value::Array(items), Value::Number(n)) = (receiver, key) {
        let index = *n as usize;
        return Ok(items.borrow().get(index).cloned().unwrap_or(Value::Undefined));
    }
    let name = tsr_runtime::fmt::to_string_value(key);
    get_property(cx, receiver, &name).await
}

pub(crate) async fn set_property(
    cx: &Rc<InterpCx>,
    receiver: &Value,
    name: &str,
    value: Value,
) -> Result<(), Signal> {
    match receiver {
        Value::Object(object) => {
            object.set(name, value);
            Ok(())
        }
        Value::Instance(instance) => {
            if instance
                .readonly_fields
                .borrow()
                .iter()
                .any(|f| f == name)
            {
                return Err(Signal::Throw(host_error(
                    "ETYPE",
                    &format!("Cannot assign to read only property '{name}'"),
                )));
            }
            if let Some((home, func, data)) = find_setter(&instance.class, name) {
                let setter = method_value(cx, &data, func, receiver.clone(), home, name);
                call_function(cx.clone(), setter, receiver.clone(), vec![value]).await?;
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
                return Ok(());
            }
            Ok(())
        }
        _ => Err(Signal::Throw(host_error(
            "ETYPE",
            &format!(
                "Cannot set properties of {}",
                tsr_runtime::fmt::to_string_value(receiver)
            ),
        ))),
    }
}

async fn set_indexed(
    cx: &Rc<InterpCx>,
    receiver: &Value,
    key: &Value,
    value: Value,
) -> Result<(), Signal> {
    if let (Value::Array(items), Value::Number(n)) = (receiver, key) {
        let index = *n as usize;
        let mut items = items.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value;
        return Ok(());
    }
    let name = tsr_runtime::fmt::to_string_value(key);
    set_property(cx, receiver, &name, value).await
}

// =============================================================================
// Class member resolution
// =============================================================================

fn class_data(class: &Rc<ClassValue>) -> Option<Rc<InterpClassData>> {
    class.payload.clone().downcast::<InterpClassData>().ok()
}

type FoundMember = (Rc<ClassValue>, FuncId, Rc<InterpClassData>);

fn find_in_chain(
    class: &Rc<ClassValue>,
    pick: impl Fn(&InterpClassData) -> Option<FuncId>,
) -> Option<FoundMember> {
    let mut current = Some(class.clone());
    while let Some(c) = current {
        if let Some(data) = class_data(&c)
            && let Some(func) = pick(&data)
        {
            return Some((c, func, data));
        }
        current = c.parent.clone();
    }
    None
}

pub(crate) fn find_method(class: &Rc<ClassValue>, name: &str) -> Option<FoundMember> {
    find_in_chain(class, |data| data.methods.get(name).copied())
}

fn find_getter(class: &Rc<ClassValue>, name: &str) -> Option<FoundMember> {
    find_in_chain(class, |data| data.getters.get(name).copied())
}

fn find_setter(class: &Rc<ClassValue>, name: &str) -> Option<FoundMember> {
    find_in_chain(class, |data| data.setters.get(name).copied())
}

/// Build a bound method value for a found class member.
fn method_value(
    _cx: &Rc<InterpCx>,
    data: &Rc<InterpClassData>,
    func: FuncId,
    this: Value,
    home: Rc<ClassValue>,
    name: &str,
) -> Value {
    let closure = Rc::new(InterpClosure {
        module: data.module,
        func,
        env: data.env.clone(),
        home_class: Some(home),
    });
    let function = FunctionValue::foreign(name, closure);
    Value::Function(function.bind(this))
}

fn super_member(cx: &Rc<InterpCx>, env: &Rc<Env>, name: &str) -> EvalResult {
    let Some(home) = env.home_class() else {
        return Err(cx.throw_string("'super' used outside of a method"));
    };
    let Some(parent) = home.parent.clone() else {
        return Err(cx.throw_string("class has no superclass"));
    };
    let this = env.this_value();
    match find_method(&parent, name) {
        Some((found_home, func, data)) => {
            Ok(method_value(cx, &data, func, this, found_home, name))
        }
        None => Ok(Value::Undefined),
    }
}

// =============================================================================
// Calls
// =============================================================================

async fn eval_arguments(
    cx: &Rc<InterpCx>,
    module: u32,
    env: &Rc<Env>,
    args: &[ExprId],
) -> Result<Vec<Value>, Signal> {
    let mut out = Vec::with_capacity(args.len());
    for &arg in args {
        if let ExprKind::Spread(inner) = cx.arena(module).expr(arg).kind.clone() {
            let value = eval_expr(cx.clone(), module, env.clone(), inner).await?;
            spread_into(cx, &value, &mut out).await?;
        } else {
            out.push(eval_expr(cx.clone(), module, env.clone(), arg).await?);
        }
    }
    Ok(out)
}

/// Expand an iterable into an argument/element vector.
async fn spread_into(
    cx: &Rc<InterpCx>,
    value: &Value,
    out: &mut Vec<Value>,
) -> Result<(), Signal> {
    match ops::get_iter_source(value) {
        Ok(ops::IterSource::Items(items)) => {
            out.extend(items);
            Ok(())
        }
        Ok(ops::IterSource::Dynamic(iterator)) => {
            loop {
                let step = iterator_next(cx, &iterator, None).await?;
                let done = get_property(cx, &step, "done").await?;
                if ops::truthy(&done) {
                    return Ok(());
                }
                out.push(get_property(cx, &step, "value").await?);
            }
        }
        Err(error) => Err(Signal::Throw(error)),
    }
}

/// One protocol step: call the iterator's `next`.
pub(crate) async fn iterator_next(
    cx: &Rc<InterpCx>,
    iterator: &Value,
    value: Option<Value>,
) -> EvalResult {
    let next = get_property(cx, iterator, "next").await?;
    let args = match value {
        Some(v) => vec![v],
        None => Vec::new(),
    };
    call_function(cx.clone(), next, iterator.clone(), args).await
}

async fn eval_call(
    cx: &Rc<InterpCx>,
    module: u32,
    env: &Rc<Env>,
    callee: ExprId,
    args: &[ExprId],
) -> EvalResult {
    let callee_kind = cx.arena(module).expr(callee).kind.clone();

    // `super(...)`: run the parent constructor over the current `this`.
    if let ExprKind::Super = callee_kind {
        let arg_values = eval_arguments(cx, module, env, args).await?;
        return eval_super_call(cx, env, arg_values).await;
    }

    // Method call: `obj.m(...)` binds the receiver.
    if let ExprKind::Member { object, property } = &callee_kind {
        if !matches!(cx.arena(module).expr(*object).kind, ExprKind::Super) {
            let receiver = eval_expr(cx.clone(), module, env.clone(), *object).await?;
            let method = get_property(cx, &receiver, property).await?;
            let arg_values = eval_arguments(cx, module, env, args).await?;
            return call_function(cx.clone(), method, receiver, arg_values).await;
        }
    }

    let func = eval_expr(cx.clone(), module, env.clone(), callee).await?;
    let arg_values = eval_arguments(cx, module, env, args).await?;
    call_function(cx.clone(), func, Value::Undefined, arg_values).await
}

async fn eval_super_call(
    cx: &Rc<InterpCx>,
    env: &Rc<Env>,
    args: Vec<Value>,
) -> EvalResult {
    let Some(home) = env.home_class() else {
        return Err(cx.throw_string("'super' call outside of a constructor"));
    };
    let Some(parent) = home.parent.clone() else {
        return Err(cx.throw_string("class has no superclass"));
    };
    let this = env.this_value();
    let Value::Instance(instance) = &this else {
        return Err(cx.throw_string("'super' call without an instance"));
    };
    initialize_instance(cx.clone(), parent, instance.clone(), args).await?;
    // Field initializers of the home class run right after super().
    if let Some(data) = class_data(&home) {
        run_field_inits(cx, &data, &this).await?;
    }
    Ok(Value::Undefined)
}

/// Create a closure value for a function definition.
pub(crate) fn make_closure(
    cx: &Rc<InterpCx>,
    module: u32,
    env: &Rc<Env>,
    func: FuncId,
    home_class: Option<Rc<ClassValue>>,
) -> Value {
    let def = cx.arena(module).func(func);
    let name = def
        .name
        .clone()
        .map(|n| n.to_string())
        .unwrap_or_default();
    let closure = Rc::new(InterpClosure {
        module,
        func,
        env: env.clone(),
        home_class,
    });
    Value::Function(FunctionValue::foreign(&name, closure))
}

/// The single call path both executors' shared jobs land on.
pub(crate) fn call_function(
    cx: Rc<InterpCx>,
    func: Value,
    this: Value,
    args: Vec<Value>,
) -> BoxFuture<EvalResult> {
    Box::pin(async move {
        match &func {
            Value::Function(f) => {
                let this = f.bound_this.clone().unwrap_or(this);
                match &f.payload {
                    FunctionPayload::Native(native) => {
                        native(&cx.rt, &this, &args).map_err(Signal::Throw)
                    }
                    FunctionPayload::Foreign(payload) => {
                        if let Ok(closure) = payload.clone().downcast::<InterpClosure>() {
                            call_closure(cx.clone(), closure, this, args).await
                        } else if let Ok(op) = payload.clone().downcast::<GenOp>() {
                            drive_generator(&cx, &op, &args)
                        } else {
                            Err(cx.throw_string("value is not callable"))
                        }
                    }
                }
            }
            Value::Class(class) => Err(cx.throw_string(format!(
                "Class constructor {} cannot be invoked without 'new'",
                class.name
            ))),
            other => Err(cx.throw_string(format!(
                "{} is not a function",
                tsr_runtime::fmt::to_string_value(other)
            ))),
        }
    })
}

struct DepthGuard {
    cx: Rc<InterpCx>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.cx.depth.set(self.cx.depth.get() - 1);
        self.cx.call_stack.borrow_mut().pop();
    }
}

async fn call_closure(
    cx: Rc<InterpCx>,
    closure: Rc<InterpClosure>,
    this: Value,
    args: Vec<Value>,
) -> EvalResult {
    let func = cx.arena(closure.module).func(closure.func).clone();

    cx.depth.set(cx.depth.get() + 1);
    cx.call_stack.borrow_mut().push(
        func.name
            .clone()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "<anonymous>".to_string()),
    );
    let _guard = DepthGuard { cx: cx.clone() };
    if cx.depth.get() > cx.options.stack_limit {
        return Err(Signal::Throw(Value::string(
            "Maximum call stack size exceeded",
        )));
    }

    // Arrows capture `this` lexically: a function-kind env without its
    // own receiver keeps the walk going upward.
    let kind = EnvKind::Function {
        this: if func.is_arrow { None } else { Some(this) },
        home_class: closure.home_class.clone(),
        gen_channel: None,
    };
    let call_env = closure.env.child(kind);

    // Parameters: defaults apply when the argument is absent, the rest
    // parameter collects the tail.
    bind_parameters(&cx, closure.module, &call_env, &func.params, &args).await?;

    if func.is_generator {
        return Ok(make_generator(&cx, &closure, &call_env));
    }

    if func.is_async {
        let body = run_function_body(cx.clone(), closure.module, call_env, closure.func);
        return Ok(cx.spawn_async(body));
    }

    run_function_body(cx.clone(), closure.module, call_env, closure.func).await
}

pub(crate) async fn bind_parameters(
    cx: &Rc<InterpCx>,
    module: u32,
    call_env: &Rc<Env>,
    params: &[tsr_parser::ast::Param],
    args: &[Value],
) -> Result<(), Signal> {
    for (i, param) in params.iter().enumerate() {
        if param.rest {
            let rest: Vec<Value> = args.iter().skip(i).cloned().collect();
            call_env.define(&param.name, Value::array(rest), true);
            break;
        }
        let mut value = args.get(i).cloned().unwrap_or(Value::Undefined);
        if matches!(value, Value::Undefined)
            && let Some(default) = param.default
        {
            value = eval_expr(cx.clone(), module, call_env.clone(), default).await?;
        }
        call_env.define(&param.name, value, true);
    }
    Ok(())
}

/// Run a function body to completion, mapping the return signal to a
/// value.
pub(crate) fn run_function_body(
    cx: Rc<InterpCx>,
    module: u32,
    env: Rc<Env>,
    func: FuncId,
) -> BoxFuture<EvalResult> {
    Box::pin(async move {
        let body = cx.arena(module).func(func).body.clone();
        match body {
            Some(FuncBody::Expr(expr)) => eval_expr(cx, module, env, expr).await,
            Some(FuncBody::Block(stmts)) => {
                exec::hoist(&cx, module, &env, &stmts);
                match exec::exec_stmts(&cx, module, &env, &stmts).await {
                    Ok(()) => Ok(Value::Undefined),
                    Err(Signal::Return(value)) => Ok(value),
                    Err(Signal::Throw(error)) => Err(Signal::Throw(error)),
                    Err(_) => Err(cx.throw_string("illegal control flow out of function")),
                }
            }
            None => Ok(Value::Undefined),
        }
    })
}

// =============================================================================
// Generators
// =============================================================================

fn make_generator(cx: &Rc<InterpCx>, closure: &Rc<InterpClosure>, call_env: &Rc<Env>) -> Value {
    let channel = Rc::new(GenChannel::default());
    // Rebuild the function env so the body sees the yield channel.
    let this = call_env.this_value();
    let gen_env = closure.env.child(EnvKind::Function {
        this: Some(this),
        home_class: closure.home_class.clone(),
        gen_channel: Some(channel.clone()),
    });
    // Copy the bound parameters across.
    for (name, binding) in call_env_bindings(call_env) {
        gen_env.define_cell(&name, binding.cell, binding.mutable);
    }
    let body = run_function_body(cx.clone(), closure.module, gen_env, closure.func);
    let state = Rc::new(GeneratorState::new(body, channel));

    let object = ObjectValue::new();
    for (name, kind) in [
        ("next", GenOpKind::Next),
        ("return", GenOpKind::Return),
        ("throw", GenOpKind::Throw),
    ] {
        let op = Rc::new(GenOp {
            state: state.clone(),
            kind,
        });
        object.set(name, Value::Function(FunctionValue::foreign(name, op)));
    }
    Value::Object(object)
}

fn call_env_bindings(env: &Rc<Env>) -> Vec<(String, crate::env::Binding)> {
    env.bindings_snapshot()
}

/// Step a generator: set the resume slot, poll the body, and read the
/// yield slot.
fn drive_generator(cx: &Rc<InterpCx>, op: &Rc<GenOp>, args: &[Value]) -> EvalResult {
    let state = &op.state;
    let arg = args.first().cloned().unwrap_or(Value::Undefined);

    if state.done.get() {
        return match op.kind {
            GenOpKind::Throw => Err(Signal::Throw(arg)),
            _ => Ok(step_result(arg_if_return(op.kind, arg), true)),
        };
    }

    if !state.started() {
        match op.kind {
            GenOpKind::Return => {
                state.done.set(true);
                return Ok(step_result(arg, true));
            }
            GenOpKind::Throw => {
                state.done.set(true);
                return Err(Signal::Throw(arg));
            }
            GenOpKind::Next => {}
        }
    }

    *state.channel.resume.borrow_mut() = Some(match op.kind {
        GenOpKind::Next => GenResume::Next(arg),
        GenOpKind::Return => GenResume::Return(arg),
        GenOpKind::Throw => GenResume::Throw(arg),
    });

    let Some(mut body) = state.body.borrow_mut().take() else {
        return Err(cx.throw_string("generator is already running"));
    };
    state.mark_started();
    let poll = crate::poll_once(&mut body);
    match poll {
        std::task::Poll::Ready(Ok(value)) => {
            state.done.set(true);
            Ok(step_result(value, true))
        }
        std::task::Poll::Ready(Err(Signal::Return(value))) => {
            state.done.set(true);
            Ok(step_result(value, true))
        }
        std::task::Poll::Ready(Err(Signal::Throw(error))) => {
            state.done.set(true);
            Err(Signal::Throw(error))
        }
        std::task::Poll::Ready(Err(_)) => {
            state.done.set(true);
            Err(cx.throw_string("illegal control flow out of generator"))
        }
        std::task::Poll::Pending => {
            *state.body.borrow_mut() = Some(body);
            match state.channel.yielded.borrow_mut().take() {
                Some(value) => Ok(step_result(value, false)),
                None => {
                    state.done.set(true);
                    Err(cx.throw_string("generator suspended outside of yield"))
                }
            }
        }
    }
}

fn arg_if_return(kind: GenOpKind, arg: Value) -> Value {
    match kind {
        GenOpKind::Return => arg,
        _ => Value::Undefined,
    }
}

/// Build an `{ value, done }` record.
pub(crate) fn step_result(value: Value, done: bool) -> Value {
    let mut props = IndexMap::new();
    props.insert("value".to_string(), value);
    props.insert("done".to_string(), Value::Bool(done));
    Value::Object(ObjectValue::from_props(props))
}

/// `yield*`: drive the delegated iterator, forwarding resume values and
/// finishing with its final return value.
async fn yield_delegate(
    cx: &Rc<InterpCx>,
    channel: &Rc<GenChannel>,
    iterable: Value,
) -> EvalResult {
    let iterator = match ops::get_iter_source(&iterable) {
        Ok(ops::IterSource::Items(items)) => {
            // Plain sequences delegate without two-way communication.
            for item in items {
                YieldPoint::new(channel.clone(), item).await?;
            }
            return Ok(Value::Undefined);
        }
        Ok(ops::IterSource::Dynamic(iterator)) => iterator,
        Err(error) => return Err(Signal::Throw(error)),
    };
    let mut send: Option<Value> = None;
    loop {
        let step = iterator_next(cx, &iterator, send.take()).await?;
        let done = get_property(cx, &step, "done").await?;
        let value = get_property(cx, &step, "value").await?;
        if ops::truthy(&done) {
            return Ok(value);
        }
        let resumed = YieldPoint::new(channel.clone(), value).await?;
        send = Some(resumed);
    }
}

// =============================================================================
// Object literals and construction
// =============================================================================

async fn eval_object_literal(
    cx: &Rc<InterpCx>,
    module: u32,
    env: &Rc<Env>,
    props: &[tsr_parser::ast::ObjectProp],
) -> EvalResult {
    let object = ObjectValue::new();
    for prop in props {
        let key = match &prop.key {
            PropKey::Computed(expr) => {
                let value = eval_expr(cx.clone(), module, env.clone(), *expr).await?;
                tsr_runtime::fmt::to_string_value(&value)
            }
            other => other.static_name().unwrap_or_default(),
        };
        match &prop.kind {
            ObjectPropKind::Shorthand => {
                let value = env
                    .get(&key)
                    .ok_or_else(|| cx.throw_string(format!("{key} is not defined")))?;
                object.set(&key, value);
            }
            ObjectPropKind::KeyValue(value) => {
                let value = eval_expr(cx.clone(), module, env.clone(), *value).await?;
                object.set(&key, value);
            }
            ObjectPropKind::Method(func) => {
                object.set(&key, make_closure(cx, module, env, *func, None));
            }
            ObjectPropKind::Getter(func) => {
                // Object-literal accessors evaluate eagerly into data
                // properties.
                let getter = make_closure(cx, module, env, *func, None);
                let value =
                    call_function(cx.clone(), getter, Value::Undefined, Vec::new()).await?;
                object.set(&key, value);
            }
            ObjectPropKind::Setter(_) => {}
            ObjectPropKind::Spread(inner) => {
                let value = eval_expr(cx.clone(), module, env.clone(), *inner).await?;
                for key in ops::own_keys(&value) {
                    if let Some(v) = value.get_shared_property(&key) {
                        object.set(&key, v);
                    }
                }
            }
        }
    }
    Ok(Value::Object(object))
}

/// `new C(...)`: allocate the instance, initialize up the class chain,
/// freeze readonly fields.
pub(crate) async fn construct(
    cx: Rc<InterpCx>,
    class: Rc<ClassValue>,
    args: Vec<Value>,
) -> EvalResult {
    if class.is_abstract {
        return Err(Signal::Throw(host_error(
            "ETYPE",
            &format!("Cannot create an instance of abstract class {}", class.name),
        )));
    }
    let instance = Rc::new(InstanceValue {
        class: class.clone(),
        fields: std::cell::RefCell::new(IndexMap::new()),
        readonly_fields: std::cell::RefCell::new(Vec::new()),
    });
    initialize_instance(cx.clone(), class.clone(), instance.clone(), args).await?;

    // Readonly fields freeze once construction finishes.
    let mut readonly = Vec::new();
    let mut current = Some(class);
    while let Some(c) = current {
        if let Some(data) = class_data(&c) {
            for field in &data.field_inits {
                if field.readonly {
                    readonly.push(field.name.clone());
                }
            }
            for (_, name, is_readonly) in &data.param_props {
                if *is_readonly {
                    readonly.push(name.clone());
                }
            }
        }
        current = c.parent.clone();
    }
    *instance.readonly_fields.borrow_mut() = readonly;
    Ok(Value::Instance(instance))
}

/// Run one class's share of construction for an instance: parameter
/// properties, field initializers, and the constructor body. A class
/// without its own constructor forwards to its superclass.
fn initialize_instance(
    cx: Rc<InterpCx>,
    class: Rc<ClassValue>,
    instance: Rc<InstanceValue>,
    args: Vec<Value>,
) -> BoxFuture<Result<(), Signal>> {
    Box::pin(async move {
        let Some(data) = class_data(&class) else {
            return Ok(());
        };
        let this = Value::Instance(instance.clone());

        match data.ctor {
            Some(ctor) => {
                let func = cx.arena(data.module).func(ctor).clone();
                let call_env = data.env.child(EnvKind::Function {
                    this: Some(this.clone()),
                    home_class: Some(class.clone()),
                    gen_channel: None,
                });
                bind_parameters(&cx, data.module, &call_env, &func.params, &args).await?;

                // Parameter properties become fields before anything
                // else runs.
                for (index, name, _) in &data.param_props {
                    let value = args.get(*index).cloned().unwrap_or(Value::Undefined);
                    let value = match (&value, func.params.get(*index)) {
                        (Value::Undefined, Some(p)) if p.default.is_some() => call_env
                            .get(&p.name)
                            .unwrap_or(Value::Undefined),
                        _ => value,
                    };
                    instance.fields.borrow_mut().insert(name.clone(), value);
                }

                // Base classes run field initializers at the start of
                // the constructor; derived ones wait for `super()`.
                if class.parent.is_none() {
                    run_field_inits(&cx, &data, &this).await?;
                }

                if let Some(FuncBody::Block(stmts)) = &func.body {
                    exec::hoist(&cx, data.module, &call_env, stmts);
                    match exec::exec_stmts(&cx, data.module, &call_env, stmts).await {
                        Ok(()) | Err(Signal::Return(_)) => {}
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }
            None => {
                // Inherited constructor: forward, then own field
                // initializers.
                if let Some(parent) = class.parent.clone() {
                    initialize_instance(cx.clone(), parent, instance.clone(), args).await?;
                }
                run_field_inits(&cx, &data, &this).await?;
                Ok(())
            }
        }
    })
}

async fn run_field_inits(
    cx: &Rc<InterpCx>,
    data: &Rc<InterpClassData>,
    this: &Value,
) -> Result<(), Signal> {
    let Value::Instance(instance) = this else {
        return Ok(());
    };
    for field in &data.field_inits {
        let value = match field.init {
            Some(init) => {
                let field_env = data.env.child(EnvKind::Function {
                    this: Some(this.clone()),
                    home_class: None,
                    gen_channel: None,
                });
                eval_expr(cx.clone(), data.module, field_env, init).await?
            }
            None => Value::Undefined,
        };
        instance
            .fields
            .borrow_mut()
            .insert(field.name.clone(), value);
    }
    Ok(())
}
