//! Promise surface: the `Promise` global, instance members, and the
//! combinators, all over the shared [`PromiseCell`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ctx::RuntimeCtx;
use crate::promise::{PromiseCell, Reaction};
use crate::value::{ObjectValue, Value};

use super::{host_error, native};

/// A fresh pending promise plus its cell.
pub fn new_promise_pair() -> (Value, Rc<PromiseCell>) {
    let cell = PromiseCell::new();
    (Value::Promise(cell.clone()), cell)
}

/// Instance members on promise values: `then`, `catch`, `finally`.
pub fn promise_member(promise: &Rc<PromiseCell>, name: &str) -> Option<Value> {
    let promise = promise.clone();
    match name {
        "then" => Some(native("then", move |ctx, _, args| {
            let target = PromiseCell::new();
            promise.subscribe(
                &ctx.queue,
                Reaction {
                    on_fulfilled: args.first().filter(|v| !v.is_nullish()).cloned(),
                    on_rejected: args.get(1).filter(|v| !v.is_nullish()).cloned(),
                    target: target.clone(),
                },
            );
            Ok(Value::Promise(target))
        })),
        "catch" => Some(native("catch", move |ctx, _, args| {
            let target = PromiseCell::new();
            promise.subscribe(
                &ctx.queue,
                Reaction {
                    on_fulfilled: None,
                    on_rejected: args.first().filter(|v| !v.is_nullish()).cloned(),
                    target: target.clone(),
                },
            );
            Ok(Value::Promise(target))
        })),
        "finally" => Some(native("finally", move |ctx, _, args| {
            // The callback observes nothing and changes nothing; wrap it
            // so the settlement passes through.
            let callback = args.first().cloned();
            let target = PromiseCell::new();
            let pass_through = |callback: Option<Value>, rethrow: bool| {
                native("finallyStep", move |ctx: &RuntimeCtx, _: &Value, args: &[Value]| {
                    if let Some(callback) = &callback {
                        ctx.call_function(callback, &Value::Undefined, &[])?;
                    }
                    let settled = args.first().cloned().unwrap_or(Value::Undefined);
                    if rethrow { Err(settled) } else { Ok(settled) }
                })
            };
            promise.subscribe(
                &ctx.queue,
                Reaction {
                    on_fulfilled: Some(pass_through(callback.clone(), false)),
                    on_rejected: Some(pass_through(callback, true)),
                    target: target.clone(),
                },
            );
            Ok(Value::Promise(target))
        })),
        _ => None,
    }
}

/// The `Promise` global: statics over the same primitive.
pub fn promise_global() -> Value {
    let mut props = IndexMap::new();
    props.insert(
        "resolve".to_string(),
        native("resolve", |ctx, _, args| {
            let cell = PromiseCell::new();
            cell.resolve(
                &ctx.queue,
                args.first().cloned().unwrap_or(Value::Undefined),
            );
            Ok(Value::Promise(cell))
        }),
    );
    props.insert(
        "reject".to_string(),
        native("reject", |ctx, _, args| {
            let cell = PromiseCell::new();
            cell.reject(
                &ctx.queue,
                args.first().cloned().unwrap_or(Value::Undefined),
            );
            // A directly constructed rejection is considered observed.
            cell.handled.set(true);
            Ok(Value::Promise(cell))
        }),
    );
    props.insert("all".to_string(), native("all", promise_all));
    props.insert("allSettled".to_string(), native("allSettled", promise_all_settled));
    props.insert("race".to_string(), native("race", promise_race));
    props.insert("any".to_string(), native("any", promise_any));
    Value::Object(ObjectValue::from_props(props))
}

fn iterable_promises(args: &[Value]) -> Result<Vec<Value>, Value> {
    match args.first() {
        Some(Value::Array(items)) => Ok(items.borrow().clone()),
        _ => Err(host_error("EINVAL", "expected an array of promises")),
    }
}

/// Subscribe a Rust callback to a value that may or may not be a
/// promise; plain values settle immediately on the microtask queue.
fn on_settled(
    ctx: &RuntimeCtx,
    value: &Value,
    on_fulfilled: impl Fn(&RuntimeCtx, Value) + 'static,
    on_rejected: impl Fn(&RuntimeCtx, Value) + 'static,
) {
    let target = PromiseCell::new();
    let fulfilled = native("onFulfilled", move |ctx: &RuntimeCtx, _: &Value, args: &[Value]| {
        on_fulfilled(ctx, args.first().cloned().unwrap_or(Value::Undefined));
        Ok(Value::Undefined)
    });
    let rejected = native("onRejected", move |ctx: &RuntimeCtx, _: &Value, args: &[Value]| {
        on_rejected(ctx, args.first().cloned().unwrap_or(Value::Undefined));
        Ok(Value::Undefined)
    });
    match value {
        Value::Promise(cell) => cell.subscribe(
            &ctx.queue,
            Reaction {
                on_fulfilled: Some(fulfilled),
                on_rejected: Some(rejected),
                target,
            },
        ),
        other => {
            let fulfilled_cell = PromiseCell::fulfilled(other.clone());
            fulfilled_cell.subscribe(
                &ctx.queue,
                Reaction {
                    on_fulfilled: Some(fulfilled),
                    on_rejected: None,
                    target,
                },
            );
        }
    }
}

fn promise_all(ctx: &RuntimeCtx, _this: &Value, args: &[Value]) -> Result<Value, Value> {
    let items = iterable_promises(args)?;
    let result = PromiseCell::new();
    let total = items.len();
    if total == 0 {
        result.fulfill(&ctx.queue, Value::array(Vec::new()));
        return Ok(Value::Promise(result));
    }
    let collected: Rc<RefCell<Vec<Value>>> =
        Rc::new(RefCell::new(vec![Value::Undefined; total]));
    let remaining = Rc::new(Cell::new(total));
    for (i, item) in items.into_iter().enumerate() {
        let collected = collected.clone();
        let remaining = remaining.clone();
        let result_ok = result.clone();
        let result_err = result.clone();
        on_settled(
            ctx,
            &item,
            move |ctx, value| {
                collected.borrow_mut()[i] = value;
                remaining.set(remaining.get() - 1);
                if remaining.get() == 0 {
                    result_ok.fulfill(&ctx.queue, Value::array(collected.borrow().clone()));
                }
            },
            move |ctx, error| {
                result_err.reject(&ctx.queue, error);
                result_err.handled.set(true);
            },
        );
    }
    Ok(Value::Promise(result))
}

fn promise_all_settled(ctx: &RuntimeCtx, _this: &Value, args: &[Value]) -> Result<Value, Value> {
    let items = iterable_promises(args)?;
    let result = PromiseCell::new();
    let total = items.len();
    if total == 0 {
        result.fulfill(&ctx.queue, Value::array(Vec::new()));
        return Ok(Value::Promise(result));
    }
    let collected: Rc<RefCell<Vec<Value>>> =
        Rc::new(RefCell::new(vec![Value::Undefined; total]));
    let remaining = Rc::new(Cell::new(total));
    for (i, item) in items.into_iter().enumerate() {
        let make_entry = |status: &str, key: &str, value: Value| {
            let mut props = IndexMap::new();
            props.insert("status".to_string(), Value::string(status));
            props.insert(key.to_string(), value);
            Value::Object(ObjectValue::from_props(props))
        };
        let collected_ok = collected.clone();
        let collected_err = collected.clone();
        let remaining_ok = remaining.clone();
        let remaining_err = remaining.clone();
        let result_ok = result.clone();
        let result_err = result.clone();
        on_settled(
            ctx,
            &item,
            move |ctx, value| {
                collected_ok.borrow_mut()[i] = make_entry("fulfilled", "value", value);
                remaining_ok.set(remaining_ok.get() - 1);
                if remaining_ok.get() == 0 {
                    result_ok.fulfill(&ctx.queue, Value::array(collected_ok.borrow().clone()));
                }
            },
            move |ctx, error| {
                let mut props = IndexMap::new();
                props.insert("status".to_string(), Value::string("rejected"));
                props.insert("reason".to_string(), error);
                collected_err.borrow_mut()[i] =
                    Value::Object(ObjectValue::from_props(props));
                remaining_err.set(remaining_err.get() - 1);
                if remaining_err.get() == 0 {
                    result_err
                        .fulfill(&ctx.queue, Value::array(collected_err.borrow().clone()));
                }
            },
        );
    }
    Ok(Value::Promise(result))
}

fn promise_race(ctx: &RuntimeCtx, _this: &Value, args: &[Value]) -> Result<Value, Value> {
    let items = iterable_promises(args)?;
    let result = PromiseCell::new();
    for item in items {
        let result_ok = result.clone();
        let result_err = result.clone();
        on_settled(
            ctx,
            &item,
            move |ctx, value| result_ok.resolve(&ctx.queue, value),
            move |ctx, error| {
                result_err.reject(&ctx.queue, error);
                result_err.handled.set(true);
            },
        );
    }
    Ok(Value::Promise(result))
}

fn promise_any(ctx: &RuntimeCtx, _this: &Value, args: &[Value]) -> Result<Value, Value> {
    let items = iterable_promises(args)?;
    let result = PromiseCell::new();
    let total = items.len();
    if total == 0 {
        result.reject(
            &ctx.queue,
            host_error("ERR_AGGREGATE", "All promises were rejected"),
        );
        result.handled.set(true);
        return Ok(Value::Promise(result));
    }
    let remaining = Rc::new(Cell::new(total));
    for item in items {
        let result_ok = result.clone();
        let result_err = result.clone();
        let remaining = remaining.clone();
        on_settled(
            ctx,
            &item,
            move |ctx, value| result_ok.resolve(&ctx.queue, value),
            move |ctx, _error| {
                remaining.set(remaining.get() - 1);
                if remaining.get() == 0 {
                    result_err.reject(
                        &ctx.queue,
                        host_error("ERR_AGGREGATE", "All promises were rejected"),
                    );
                    result_err.handled.set(true);
                }
            },
        );
    }
    Ok(Value::Promise(result))
}
