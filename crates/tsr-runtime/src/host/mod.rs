//! Host surfaces: globals, built-in value members, and host modules.
//!
//! Everything here is a data-driven table of natives over the shared
//! value model. The checker sees these surfaces as opaque namespaces;
//! the executors resolve them through [`host_module`] and
//! [`install_globals`].

mod builtin_members;
mod modules;
mod promise_api;

pub use builtin_members::builtin_member;
pub use modules::host_module;
pub use promise_api::{new_promise_pair, promise_global, promise_member};

use std::rc::Rc;

use indexmap::IndexMap;

use crate::ctx::RuntimeCtx;
use crate::fmt::{console_format, format_number};
use crate::ops::to_number;
use crate::value::{FunctionValue, ObjectValue, Value};

/// Wrap a Rust closure as a native function value.
pub fn native(
    name: &str,
    f: impl Fn(&RuntimeCtx, &Value, &[Value]) -> Result<Value, Value> + 'static,
) -> Value {
    Value::Function(FunctionValue::native(name, Rc::new(f)))
}

/// A catchable host error value carrying the conventional `code`
/// taxonomy (`ENOENT`, `EACCES`, ...).
pub fn host_error(code: &str, message: &str) -> Value {
    let mut props = IndexMap::new();
    props.insert("name".to_string(), Value::string("Error"));
    props.insert("message".to_string(), Value::string(message));
    props.insert("code".to_string(), Value::string(code));
    Value::Object(ObjectValue::from_props(props))
}

pub fn io_error(err: &std::io::Error, path: &str) -> Value {
    use std::io::ErrorKind;
    let code = match err.kind() {
        ErrorKind::NotFound => "ENOENT",
        ErrorKind::PermissionDenied => "EACCES",
        ErrorKind::AlreadyExists => "EEXIST",
        ErrorKind::InvalidInput => "EINVAL",
        ErrorKind::DirectoryNotEmpty => "ENOTEMPTY",
        _ => "EIO",
    };
    host_error(code, &format!("{code}: {err}, '{path}'"))
}

/// A stub for a signature-only host surface: raises catchable `ENOSYS`.
pub fn unsupported(name: &'static str) -> Value {
    native(name, move |_, _, _| {
        Err(host_error(
            "ENOSYS",
            &format!("host operation '{name}' is not linked in this runtime"),
        ))
    })
}

pub(super) fn object(props: Vec<(&str, Value)>) -> Value {
    let mut map = IndexMap::new();
    for (name, value) in props {
        map.insert(name.to_string(), value);
    }
    Value::Object(ObjectValue::from_props(map))
}

/// Install the global bindings both executors seed their outermost
/// environment with.
pub fn install_globals(globals: &mut IndexMap<String, Value>) {
    globals.insert("console".to_string(), console());
    globals.insert("Math".to_string(), math());
    globals.insert("JSON".to_string(), json());
    globals.insert("Object".to_string(), object_namespace());
    globals.insert("Promise".to_string(), promise_global());
    globals.insert("NaN".to_string(), Value::Number(f64::NAN));
    globals.insert("Infinity".to_string(), Value::Number(f64::INFINITY));

    globals.insert(
        "parseInt".to_string(),
        native("parseInt", |_, _, args| {
            let text = match args.first() {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(other) => crate::fmt::to_string_value(other),
                None => return Ok(Value::Number(f64::NAN)),
            };
            let radix = args.get(1).map(to_number).unwrap_or(10.0) as u32;
            let radix = if radix == 0 { 10 } else { radix };
            // Longest valid prefix.
            let negative = text.starts_with('-');
            let digits: String = text
                .trim_start_matches(['+', '-'])
                .chars()
                .take_while(|c| c.to_digit(radix).is_some())
                .collect();
            if digits.is_empty() {
                return Ok(Value::Number(f64::NAN));
            }
            let mut value = 0.0f64;
            for c in digits.chars() {
                value = value * f64::from(radix) + f64::from(c.to_digit(radix).unwrap_or(0));
            }
            Ok(Value::Number(if negative { -value } else { value }))
        }),
    );
    globals.insert(
        "parseFloat".to_string(),
        native("parseFloat", |_, _, args| {
            let text = match args.first() {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(other) => crate::fmt::to_string_value(other),
                None => return Ok(Value::Number(f64::NAN)),
            };
            // Longest valid float prefix.
            let mut end = 0;
            let bytes = text.as_bytes();
            let mut seen_dot = false;
            let mut seen_e = false;
            while end < bytes.len() {
                let b = bytes[end];
                let ok = b.is_ascii_digit()
                    || (b == b'.' && !seen_dot && !seen_e)
                    || ((b == b'e' || b == b'E') && !seen_e && end > 0)
                    || ((b == b'+' || b == b'-')
                        && (end == 0
                            || bytes[end - 1] == b'e'
                            || bytes[end - 1] == b'E'));
                if !ok {
                    break;
                }
                seen_dot |= b == b'.';
                seen_e |= b == b'e' || b == b'E';
                end += 1;
            }
            Ok(Value::Number(
                text[..end].parse::<f64>().unwrap_or(f64::NAN),
            ))
        }),
    );
    globals.insert(
        "isNaN".to_string(),
        native("isNaN", |_, _, args| {
            let n = args.first().map(to_number).unwrap_or(f64::NAN);
            Ok(Value::Bool(n.is_nan()))
        }),
    );
    globals.insert(
        "isFinite".to_string(),
        native("isFinite", |_, _, args| {
            let n = args.first().map(to_number).unwrap_or(f64::NAN);
            Ok(Value::Bool(n.is_finite()))
        }),
    );
    globals.insert(
        "Number".to_string(),
        native("Number", |_, _, args| {
            Ok(Value::Number(args.first().map(to_number).unwrap_or(0.0)))
        }),
    );
    globals.insert(
        "String".to_string(),
        native("String", |_, _, args| {
            Ok(Value::string(
                args.first()
                    .map(crate::fmt::to_string_value)
                    .unwrap_or_default(),
            ))
        }),
    );
    globals.insert(
        "Boolean".to_string(),
        native("Boolean", |_, _, args| {
            Ok(Value::Bool(
                args.first().map(crate::ops::truthy).unwrap_or(false),
            ))
        }),
    );

    // Timers.
    globals.insert(
        "setTimeout".to_string(),
        native("setTimeout", |ctx, _, args| {
            let func = args.first().cloned().unwrap_or(Value::Undefined);
            let delay = args.get(1).map(to_number).unwrap_or(0.0);
            let extra: Vec<Value> = args.iter().skip(2).cloned().collect();
            let id = ctx.queue.set_timeout(func, extra, delay);
            Ok(Value::Number(id as f64))
        }),
    );
    globals.insert(
        "setInterval".to_string(),
        native("setInterval", |ctx, _, args| {
            let func = args.first().cloned().unwrap_or(Value::Undefined);
            let period = args.get(1).map(to_number).unwrap_or(0.0);
            let extra: Vec<Value> = args.iter().skip(2).cloned().collect();
            let id = ctx.queue.set_interval(func, extra, period);
            Ok(Value::Number(id as f64))
        }),
    );
    let clear = native("clearTimeout", |ctx, _, args| {
        if let Some(Value::Number(id)) = args.first() {
            ctx.queue.clear_timer(*id as u64);
        }
        Ok(Value::Undefined)
    });
    globals.insert("clearTimeout".to_string(), clear.clone());
    globals.insert("clearInterval".to_string(), clear);
    globals.insert(
        "queueMicrotask".to_string(),
        native("queueMicrotask", |ctx, _, args| {
            let func = args.first().cloned().unwrap_or(Value::Undefined);
            ctx.queue.push_micro(crate::queue::Job::Call {
                func,
                this: Value::Undefined,
                args: Vec::new(),
                complete: None,
            });
            Ok(Value::Undefined)
        }),
    );

    globals.insert(
        "process".to_string(),
        object(vec![
            ("argv", Value::array(Vec::new())),
            ("env", Value::Object(ObjectValue::new())),
            ("platform", Value::string(std::env::consts::OS)),
            (
                "exit",
                native("exit", |ctx, _, args| {
                    let code = args.first().map(to_number).unwrap_or(0.0);
                    ctx.exit_code.set(code as i32);
                    Ok(Value::Undefined)
                }),
            ),
        ]),
    );

    globals.insert(
        "Error".to_string(),
        native("Error", |_, _, args| {
            let message = args
                .first()
                .map(crate::fmt::to_string_value)
                .unwrap_or_default();
            let mut props = IndexMap::new();
            props.insert("name".to_string(), Value::string("Error"));
            props.insert("message".to_string(), Value::string(message));
            Ok(Value::Object(ObjectValue::from_props(props)))
        }),
    );
}

fn console() -> Value {
    let log = |stream: &'static str| {
        native(stream, move |ctx: &RuntimeCtx, _: &Value, args: &[Value]| {
            ctx.writeln_stdout(&console_format(args));
            Ok(Value::Undefined)
        })
    };
    object(vec![
        ("log", log("log")),
        ("error", log("error")),
        ("warn", log("warn")),
        ("info", log("info")),
        ("debug", log("debug")),
    ])
}

fn math() -> Value {
    let unary = |name: &'static str, f: fn(f64) -> f64| {
        native(name, move |_, _, args: &[Value]| {
            Ok(Value::Number(f(args.first().map(to_number).unwrap_or(
                f64::NAN,
            ))))
        })
    };
    object(vec![
        ("floor", unary("floor", f64::floor)),
        ("ceil", unary("ceil", f64::ceil)),
        ("round", unary("round", f64::round)),
        ("trunc", unary("trunc", f64::trunc)),
        ("abs", unary("abs", f64::abs)),
        ("sqrt", unary("sqrt", f64::sqrt)),
        ("sign", unary("sign", f64::signum)),
        ("log", unary("log", f64::ln)),
        ("log2", unary("log2", f64::log2)),
        ("exp", unary("exp", f64::exp)),
        ("sin", unary("sin", f64::sin)),
        ("cos", unary("cos", f64::cos)),
        ("tan", unary("tan", f64::tan)),
        (
            "pow",
            native("pow", |_, _, args| {
                let base = args.first().map(to_number).unwrap_or(f64::NAN);
                let exp = args.get(1).map(to_number).unwrap_or(f64::NAN);
                Ok(Value::Number(base.powf(exp)))
            }),
        ),
        (
            "min",
            native("min", |_, _, args| {
                Ok(Value::Number(
                    args.iter().map(to_number).fold(f64::INFINITY, f64::min),
                ))
            }),
        ),
        (
            "max",
            native("max", |_, _, args| {
                Ok(Value::Number(
                    args.iter()
                        .map(to_number)
                        .fold(f64::NEG_INFINITY, f64::max),
                ))
            }),
        ),
        (
            "random",
            native("random", |ctx, _, _| {
                let bits = ctx.next_random() >> 11;
                Ok(Value::Number(bits as f64 / (1u64 << 53) as f64))
            }),
        ),
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
    ])
}

fn json() -> Value {
    object(vec![
        (
            "stringify",
            native("stringify", |_, _, args| {
                let value = args.first().cloned().unwrap_or(Value::Undefined);
                Ok(match json_stringify(&value) {
                    Some(text) => Value::string(text),
                    None => Value::Undefined,
                })
            }),
        ),
        (
            "parse",
            native("parse", |_, _, args| {
                let text = match args.first() {
                    Some(Value::String(s)) => s.to_string(),
                    _ => return Err(host_error("EINVAL", "JSON.parse expects a string")),
                };
                let parsed: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| host_error("EINVAL", &format!("Unexpected token: {e}")))?;
                Ok(from_json(&parsed))
            }),
        ),
    ])
}

fn object_namespace() -> Value {
    object(vec![
        (
            "keys",
            native("keys", |_, _, args| {
                let keys = args
                    .first()
                    .map(crate::ops::own_keys)
                    .unwrap_or_default()
                    .into_iter()
                    .map(Value::string)
                    .collect();
                Ok(Value::array(keys))
            }),
        ),
        (
            "values",
            native("values", |_, _, args| {
                let value = args.first().cloned().unwrap_or(Value::Undefined);
                let values = crate::ops::own_keys(&value)
                    .into_iter()
                    .filter_map(|k| value.get_shared_property(&k))
                    .collect();
                Ok(Value::array(values))
            }),
        ),
        (
            "entries",
            native("entries", |_, _, args| {
                let value = args.first().cloned().unwrap_or(Value::Undefined);
                let entries = crate::ops::own_keys(&value)
                    .into_iter()
                    .filter_map(|k| {
                        value
                            .get_shared_property(&k)
                            .map(|v| Value::array(vec![Value::string(k), v]))
                    })
                    .collect();
                Ok(Value::array(entries))
            }),
        ),
        (
            "assign",
            native("assign", |_, _, args| {
                let Some(Value::Object(target)) = args.first() else {
                    return Err(host_error("EINVAL", "Object.assign target must be an object"));
                };
                for source in args.iter().skip(1) {
                    for key in crate::ops::own_keys(source) {
                        if let Some(v) = source.get_shared_property(&key) {
                            target.set(&key, v);
                        }
                    }
                }
                Ok(args[0].clone())
            }),
        ),
        (
            "freeze",
            native("freeze", |_, _, args| {
                Ok(args.first().cloned().unwrap_or(Value::Undefined))
            }),
        ),
    ])
}

/// JSON serialization over the shared value model; `undefined`,
/// functions, and opaque values yield `None` at the top level, as the
/// host convention dictates.
pub fn json_stringify(value: &Value) -> Option<String> {
    match value {
        Value::Undefined | Value::Function(_) | Value::Class(_) | Value::Handle(_) => None,
        Value::Null => Some("null".to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(if n.is_finite() {
            format_number(*n)
        } else {
            "null".to_string()
        }),
        Value::String(s) => Some(serde_json::Value::String(s.to_string()).to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .borrow()
                .iter()
                .map(|v| json_stringify(v).unwrap_or_else(|| "null".to_string()))
                .collect();
            Some(format!("[{}]", parts.join(",")))
        }
        Value::Object(obj) => {
            let mut parts = Vec::new();
            for (k, v) in obj.props.borrow().iter() {
                if let Some(v) = json_stringify(v) {
                    let key = serde_json::Value::String(k.clone()).to_string();
                    parts.push(format!("{key}:{v}"));
                }
            }
            Some(format!("{{{}}}", parts.join(",")))
        }
        Value::Instance(instance) => {
            let mut parts = Vec::new();
            for (k, v) in instance.fields.borrow().iter() {
                if let Some(v) = json_stringify(v) {
                    let key = serde_json::Value::String(k.clone()).to_string();
                    parts.push(format!("{key}:{v}"));
                }
            }
            Some(format!("{{{}}}", parts.join(",")))
        }
        Value::Promise(_) => Some("{}".to_string()),
    }
}

fn from_json(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::string(s),
        serde_json::Value::Array(items) => {
            Value::array(items.iter().map(from_json).collect())
        }
        serde_json::Value::Object(map) => {
            let mut props = IndexMap::new();
            for (k, v) in map {
                props.insert(k.clone(), from_json(v));
            }
            Value::Object(ObjectValue::from_props(props))
        }
    }
}
