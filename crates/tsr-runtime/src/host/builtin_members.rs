//! Built-in members on primitive and wrapper values.
//!
//! Both executors route member access through here when the receiver is
//! a string, number, array, promise, or similar. Returned functions are
//! natives that read their receiver from `this`.

use crate::ctx::RuntimeCtx;
use crate::fmt::{format_number, to_string_value};
use crate::ops::{strict_eq, to_number, truthy};
use crate::value::Value;

use super::{host_error, native, promise_member};

/// Resolve a built-in member on a value. Data properties return their
/// value; methods return a callable expecting the same receiver as
/// `this`.
pub fn builtin_member(value: &Value, name: &str) -> Option<Value> {
    match value {
        Value::String(_) => string_member(name),
        Value::Number(_) => number_member(name),
        Value::Bool(_) => bool_member(name),
        Value::Array(_) => array_member(name),
        Value::Promise(p) => promise_member(p, name),
        _ => None,
    }
}

fn this_string(this: &Value) -> Result<String, Value> {
    match this {
        Value::String(s) => Ok(s.to_string()),
        other => Ok(to_string_value(other)),
    }
}

fn arg_number(args: &[Value], i: usize, default: f64) -> f64 {
    args.get(i).map(to_number).unwrap_or(default)
}

fn arg_string(args: &[Value], i: usize) -> String {
    args.get(i).map(to_string_value).unwrap_or_default()
}

/// Clamp a possibly negative index against a length, JS-slice style.
fn clamp_index(i: f64, len: usize) -> usize {
    if i.is_nan() {
        return 0;
    }
    if i < 0.0 {
        let from_end = len as f64 + i;
        if from_end < 0.0 { 0 } else { from_end as usize }
    } else if i > len as f64 {
        len
    } else {
        i as usize
    }
}

fn string_member(name: &str) -> Option<Value> {
    Some(match name {
        "charAt" => native("charAt", |_, this, args| {
            let s = this_string(this)?;
            let i = arg_number(args, 0, 0.0);
            Ok(Value::string(
                s.chars()
                    .nth(i as usize)
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
            ))
        }),
        "charCodeAt" => native("charCodeAt", |_, this, args| {
            let s = this_string(this)?;
            let i = arg_number(args, 0, 0.0);
            Ok(match s.chars().nth(i as usize) {
                Some(c) => Value::Number(c as u32 as f64),
                None => Value::Number(f64::NAN),
            })
        }),
        "codePointAt" => native("codePointAt", |_, this, args| {
            let s = this_string(this)?;
            let i = arg_number(args, 0, 0.0);
            Ok(match s.chars().nth(i as usize) {
                Some(c) => Value::Number(c as u32 as f64),
                None => Value::Undefined,
            })
        }),
        "at" => native("at", |_, this, args| {
            let s = this_string(this)?;
            let chars: Vec<char> = s.chars().collect();
            let mut i = arg_number(args, 0, 0.0);
            if i < 0.0 {
                i += chars.len() as f64;
            }
            Ok(if i < 0.0 {
                Value::Undefined
            } else {
                chars
                    .get(i as usize)
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or(Value::Undefined)
            })
        }),
        "slice" | "substring" => native("slice", |_, this, args| {
            let s = this_string(this)?;
            let chars: Vec<char> = s.chars().collect();
            let start = clamp_index(arg_number(args, 0, 0.0), chars.len());
            let end = clamp_index(arg_number(args, 1, chars.len() as f64), chars.len());
            Ok(Value::string(if start < end {
                chars[start..end].iter().collect::<String>()
            } else {
                String::new()
            }))
        }),
        "indexOf" => native("indexOf", |_, this, args| {
            let s = this_string(this)?;
            let needle = arg_string(args, 0);
            Ok(Value::Number(match s.find(&needle) {
                Some(byte_pos) => s[..byte_pos].chars().count() as f64,
                None => -1.0,
            }))
        }),
        "lastIndexOf" => native("lastIndexOf", |_, this, args| {
            let s = this_string(this)?;
            let needle = arg_string(args, 0);
            Ok(Value::Number(match s.rfind(&needle) {
                Some(byte_pos) => s[..byte_pos].chars().count() as f64,
                None => -1.0,
            }))
        }),
        "includes" => native("includes", |_, this, args| {
            let s = this_string(this)?;
            Ok(Value::Bool(s.contains(&arg_string(args, 0))))
        }),
        "startsWith" => native("startsWith", |_, this, args| {
            let s = this_string(this)?;
            Ok(Value::Bool(s.starts_with(&arg_string(args, 0))))
        }),
        "endsWith" => native("endsWith", |_, this, args| {
            let s = this_string(this)?;
            Ok(Value::Bool(s.ends_with(&arg_string(args, 0))))
        }),
        "toUpperCase" => native("toUpperCase", |_, this, _| {
            Ok(Value::string(this_string(this)?.to_uppercase()))
        }),
        "toLowerCase" => native("toLowerCase", |_, this, _| {
            Ok(Value::string(this_string(this)?.to_lowercase()))
        }),
        "trim" => native("trim", |_, this, _| {
            Ok(Value::string(this_string(this)?.trim().to_string()))
        }),
        "trimStart" => native("trimStart", |_, this, _| {
            Ok(Value::string(this_string(this)?.trim_start().to_string()))
        }),
        "trimEnd" => native("trimEnd", |_, this, _| {
            Ok(Value::string(this_string(this)?.trim_end().to_string()))
        }),
        "split" => native("split", |_, this, args| {
            let s = this_string(this)?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::Undefined) => vec![Value::string(&s)],
                Some(sep) => {
                    let sep = to_string_value(sep);
                    if sep.is_empty() {
                        s.chars().map(|c| Value::string(c.to_string())).collect()
                    } else {
                        s.split(&sep).map(Value::string).collect()
                    }
                }
            };
            Ok(Value::array(parts))
        }),
        "replace" => native("replace", |_, this, args| {
            let s = this_string(this)?;
            let from = arg_string(args, 0);
            let to = arg_string(args, 1);
            Ok(Value::string(s.replacen(&from, &to, 1)))
        }),
        "replaceAll" => native("replaceAll", |_, this, args| {
            let s = this_string(this)?;
            let from = arg_string(args, 0);
            let to = arg_string(args, 1);
            Ok(Value::string(s.replace(&from, &to)))
        }),
        "repeat" => native("repeat", |_, this, args| {
            let s = this_string(this)?;
            let count = arg_number(args, 0, 0.0);
            if count < 0.0 {
                return Err(host_error("ERANGE", "Invalid count value"));
            }
            Ok(Value::string(s.repeat(count as usize)))
        }),
        "padStart" => native("padStart", |_, this, args| {
            let s = this_string(this)?;
            let width = arg_number(args, 0, 0.0) as usize;
            let pad = args
                .get(1)
                .map(to_string_value)
                .unwrap_or_else(|| " ".to_string());
            Ok(Value::string(pad_string(&s, width, &pad, true)))
        }),
        "padEnd" => native("padEnd", |_, this, args| {
            let s = this_string(this)?;
            let width = arg_number(args, 0, 0.0) as usize;
            let pad = args
                .get(1)
                .map(to_string_value)
                .unwrap_or_else(|| " ".to_string());
            Ok(Value::string(pad_string(&s, width, &pad, false)))
        }),
        "concat" => native("concat", |_, this, args| {
            let mut s = this_string(this)?;
            for arg in args {
                s.push_str(&to_string_value(arg));
            }
            Ok(Value::string(s))
        }),
        "toString" => native("toString", |_, this, _| {
            Ok(Value::string(this_string(this)?))
        }),
        _ => return None,
    })
}

fn pad_string(s: &str, width: usize, pad: &str, at_start: bool) -> String {
    let len = s.chars().count();
    if len >= width || pad.is_empty() {
        return s.to_string();
    }
    let fill: String = pad.chars().cycle().take(width - len).collect();
    if at_start {
        fill + s
    } else {
        s.to_string() + &fill
    }
}

fn number_member(name: &str) -> Option<Value> {
    Some(match name {
        "toFixed" => native("toFixed", |_, this, args| {
            let n = to_number(this);
            let digits = arg_number(args, 0, 0.0) as usize;
            Ok(Value::string(format!("{n:.digits$}")))
        }),
        "toString" => native("toString", |_, this, args| {
            let n = to_number(this);
            match args.first() {
                Some(radix) => {
                    let radix = to_number(radix) as u32;
                    if radix == 10 || !(2..=36).contains(&radix) {
                        Ok(Value::string(format_number(n)))
                    } else {
                        Ok(Value::string(to_radix_string(n, radix)))
                    }
                }
                None => Ok(Value::string(format_number(n))),
            }
        }),
        "toPrecision" => native("toPrecision", |_, this, args| {
            let n = to_number(this);
            match args.first() {
                Some(p) => {
                    let p = to_number(p) as usize;
                    Ok(Value::string(format!("{n:.*}", p.saturating_sub(1))))
                }
                None => Ok(Value::string(format_number(n))),
            }
        }),
        _ => return None,
    })
}

fn to_radix_string(n: f64, radix: u32) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    let negative = n < 0.0;
    let mut i = n.abs().trunc() as u64;
    let mut digits = Vec::new();
    loop {
        let d = (i % u64::from(radix)) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        i /= u64::from(radix);
        if i == 0 {
            break;
        }
    }
    if negative {
        digits.push('-');
    }
    digits.into_iter().rev().collect()
}

fn bool_member(name: &str) -> Option<Value> {
    match name {
        "toString" => Some(native("toString", |_, this, _| {
            Ok(Value::string(to_string_value(this)))
        })),
        _ => None,
    }
}

fn this_array(this: &Value) -> Result<std::rc::Rc<std::cell::RefCell<Vec<Value>>>, Value> {
    match this {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(host_error("EINVAL", "receiver is not an array")),
    }
}

fn call_with_index(
    ctx: &RuntimeCtx,
    callback: &Value,
    item: &Value,
    index: usize,
) -> Result<Value, Value> {
    ctx.call_function(
        callback,
        &Value::Undefined,
        &[item.clone(), Value::Number(index as f64)],
    )
}

fn array_member(name: &str) -> Option<Value> {
    Some(match name {
        "push" => native("push", |_, this, args| {
            let items = this_array(this)?;
            items.borrow_mut().extend(args.iter().cloned());
            let len = items.borrow().len();
            Ok(Value::Number(len as f64))
        }),
        "pop" => native("pop", |_, this, _| {
            let items = this_array(this)?;
            let popped = items.borrow_mut().pop();
            Ok(popped.unwrap_or(Value::Undefined))
        }),
        "shift" => native("shift", |_, this, _| {
            let items = this_array(this)?;
            let mut items = items.borrow_mut();
            Ok(if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            })
        }),
        "unshift" => native("unshift", |_, this, args| {
            let items = this_array(this)?;
            let mut borrowed = items.borrow_mut();
            for (i, arg) in args.iter().enumerate() {
                borrowed.insert(i, arg.clone());
            }
            Ok(Value::Number(borrowed.len() as f64))
        }),
        "slice" => native("slice", |_, this, args| {
            let items = this_array(this)?;
            let items = items.borrow();
            let start = clamp_index(arg_number(args, 0, 0.0), items.len());
            let end = clamp_index(arg_number(args, 1, items.len() as f64), items.len());
            Ok(Value::array(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            }))
        }),
        "concat" => native("concat", |_, this, args| {
            let items = this_array(this)?;
            let mut out = items.borrow().clone();
            for arg in args {
                match arg {
                    Value::Array(more) => out.extend(more.borrow().iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::array(out))
        }),
        "reverse" => native("reverse", |_, this, _| {
            let items = this_array(this)?;
            items.borrow_mut().reverse();
            Ok(this.clone())
        }),
        "join" => native("join", |_, this, args| {
            let items = this_array(this)?;
            let sep = match args.first() {
                None | Some(Value::Undefined) => ",".to_string(),
                Some(v) => to_string_value(v),
            };
            let parts: Vec<String> = items
                .borrow()
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        to_string_value(v)
                    }
                })
                .collect();
            Ok(Value::string(parts.join(&sep)))
        }),
        "indexOf" => native("indexOf", |_, this, args| {
            let items = this_array(this)?;
            let needle = args.first().cloned().unwrap_or(Value::Undefined);
            let found = items
                .borrow()
                .iter()
                .position(|v| strict_eq(v, &needle))
                .map(|i| i as f64)
                .unwrap_or(-1.0);
            Ok(Value::Number(found))
        }),
        "includes" => native("includes", |_, this, args| {
            let items = this_array(this)?;
            let needle = args.first().cloned().unwrap_or(Value::Undefined);
            let found = items.borrow().iter().any(|v| strict_eq(v, &needle));
            Ok(Value::Bool(found))
        }),
        "map" => native("map", |ctx, this, args| {
            let items = this_array(this)?;
            let callback = args.first().cloned().unwrap_or(Value::Undefined);
            let snapshot = items.borrow().clone();
            let mut out = Vec::with_capacity(snapshot.len());
            for (i, item) in snapshot.iter().enumerate() {
                out.push(call_with_index(ctx, &callback, item, i)?);
            }
            Ok(Value::array(out))
        }),
        "filter" => native("filter", |ctx, this, args| {
            let items = this_array(this)?;
            let callback = args.first().cloned().unwrap_or(Value::Undefined);
            let snapshot = items.borrow().clone();
            let mut out = Vec::new();
            for (i, item) in snapshot.iter().enumerate() {
                if truthy(&call_with_index(ctx, &callback, item, i)?) {
                    out.push(item.clone());
                }
            }
            Ok(Value::array(out))
        }),
        "forEach" => native("forEach", |ctx, this, args| {
            let items = this_array(this)?;
            let callback = args.first().cloned().unwrap_or(Value::Undefined);
            let snapshot = items.borrow().clone();
            for (i, item) in snapshot.iter().enumerate() {
                call_with_index(ctx, &callback, item, i)?;
            }
            Ok(Value::Undefined)
        }),
        "find" => native("find", |ctx, this, args| {
            let items = this_array(this)?;
            let callback = args.first().cloned().unwrap_or(Value::Undefined);
            let snapshot = items.borrow().clone();
            for (i, item) in snapshot.iter().enumerate() {
                if truthy(&call_with_index(ctx, &callback, item, i)?) {
                    return Ok(item.clone());
                }
            }
            Ok(Value::Undefined)
        }),
        "findIndex" => native("findIndex", |ctx, this, args| {
            let items = this_array(this)?;
            let callback = args.first().cloned().unwrap_or(Value::Undefined);
            let snapshot = items.borrow().clone();
            for (i, item) in snapshot.iter().enumerate() {
                if truthy(&call_with_index(ctx, &callback, item, i)?) {
                    return Ok(Value::Number(i as f64));
                }
            }
            Ok(Value::Number(-1.0))
        }),
        "some" => native("some", |ctx, this, args| {
            let items = this_array(this)?;
            let callback = args.first().cloned().unwrap_or(Value::Undefined);
            let snapshot = items.borrow().clone();
            for (i, item) in snapshot.iter().enumerate() {
                if truthy(&call_with_index(ctx, &callback, item, i)?) {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }),
        "every" => native("every", |ctx, this, args| {
            let items = this_array(this)?;
            let callback = args.first().cloned().unwrap_or(Value::Undefined);
            let snapshot = items.borrow().clone();
            for (i, item) in snapshot.iter().enumerate() {
                if !truthy(&call_with_index(ctx, &callback, item, i)?) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }),
        "reduce" => native("reduce", |ctx, this, args| {
            let items = this_array(this)?;
            let callback = args.first().cloned().unwrap_or(Value::Undefined);
            let snapshot = items.borrow().clone();
            let mut iter = snapshot.iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match iter.next() {
                    Some((_, first)) => first.clone(),
                    None => {
                        return Err(host_error(
                            "EINVAL",
                            "Reduce of empty array with no initial value",
                        ));
                    }
                },
            };
            for (i, item) in iter {
                acc = ctx.call_function(
                    &callback,
                    &Value::Undefined,
                    &[acc, item.clone(), Value::Number(i as f64)],
                )?;
            }
            Ok(acc)
        }),
        "sort" => native("sort", |ctx, this, args| {
            let items = this_array(this)?;
            let comparator = args.first().cloned();
            let mut sorted = items.borrow().clone();
            let mut error = None;
            sorted.sort_by(|a, b| {
                if error.is_some() {
                    return std::cmp::Ordering::Equal;
                }
                match &comparator {
                    Some(Value::Function(_)) => {
                        let comparator = comparator.as_ref().unwrap();
                        match ctx.call_function(comparator, &Value::Undefined, &[a.clone(), b.clone()])
                        {
                            Ok(result) => {
                                let n = to_number(&result);
                                n.partial_cmp(&0.0).unwrap_or(std::cmp::Ordering::Equal)
                            }
                            Err(e) => {
                                error = Some(e);
                                std::cmp::Ordering::Equal
                            }
                        }
                    }
                    _ => {
                        // Default sort compares string forms.
                        to_string_value(a).cmp(&to_string_value(b))
                    }
                }
            });
            if let Some(e) = error {
                return Err(e);
            }
            *items.borrow_mut() = sorted;
            Ok(this.clone())
        }),
        "flat" => native("flat", |_, this, _| {
            let items = this_array(this)?;
            let mut out = Vec::new();
            for item in items.borrow().iter() {
                match item {
                    Value::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::array(out))
        }),
        "keys" => native("keys", |_, this, _| {
            let items = this_array(this)?;
            let len = items.borrow().len();
            Ok(Value::array(
                (0..len).map(|i| Value::Number(i as f64)).collect(),
            ))
        }),
        _ => return None,
    })
}
