//! Value display and console formatting.

use crate::promise::PromiseState;
use crate::value::Value;

/// Number formatting: integer-valued doubles print without a fractional
/// part; `NaN` and the infinities are spelled out; everything else uses
/// the shortest round-trip representation.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        return format!("{}", n as i64);
    }
    format!("{n}")
}

/// String conversion, as `+` concatenation and template substitution
/// see it.
pub fn to_string_value(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => s.to_string(),
        Value::Array(items) => items
            .borrow()
            .iter()
            .map(to_string_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
        Value::Function(f) => format!("function {}() {{ ... }}", f.name.borrow()),
        Value::Class(c) => format!("class {}", c.name),
        Value::Instance(i) => format!("[object {}]", i.class.name),
        Value::Promise(_) => "[object Promise]".to_string(),
        Value::Handle(h) => format!("[object {}]", h.kind),
    }
}

/// Inspection display, as `console.log` renders a bare value.
pub fn inspect(value: &Value) -> String {
    inspect_depth(value, 0)
}

fn inspect_depth(value: &Value, depth: usize) -> String {
    if depth > 4 {
        return "...".to_string();
    }
    match value {
        Value::String(s) if depth > 0 => format!("'{s}'"),
        Value::Array(items) => {
            let items = items.borrow();
            if items.is_empty() {
                return "[]".to_string();
            }
            let parts: Vec<String> = items
                .iter()
                .map(|v| inspect_depth(v, depth + 1))
                .collect();
            format!("[ {} ]", parts.join(", "))
        }
        Value::Object(object) => {
            let props = object.props.borrow();
            if props.is_empty() {
                return "{}".to_string();
            }
            let parts: Vec<String> = props
                .iter()
                .map(|(k, v)| format!("{k}: {}", inspect_depth(v, depth + 1)))
                .collect();
            format!("{{ {} }}", parts.join(", "))
        }
        Value::Instance(instance) => {
            let fields = instance.fields.borrow();
            let parts: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("{k}: {}", inspect_depth(v, depth + 1)))
                .collect();
            if parts.is_empty() {
                format!("{} {{}}", instance.class.name)
            } else {
                format!("{} {{ {} }}", instance.class.name, parts.join(", "))
            }
        }
        Value::Function(f) => {
            let name = f.name.borrow();
            if name.is_empty() {
                "[Function (anonymous)]".to_string()
            } else {
                format!("[Function: {name}]")
            }
        }
        Value::Class(c) => format!("[class {}]", c.name),
        Value::Promise(p) => match p.state() {
            PromiseState::Pending => "Promise { <pending> }".to_string(),
            PromiseState::Fulfilled(v) => {
                format!("Promise {{ {} }}", inspect_depth(&v, depth + 1))
            }
            PromiseState::Rejected(e) => {
                format!("Promise {{ <rejected> {} }}", inspect_depth(&e, depth + 1))
            }
        },
        other => to_string_value(other),
    }
}

/// Console argument formatting with printf-like expansion: when the
/// first argument is a string containing `%s`/`%d`/`%i`/`%f`/`%j`/`%%`,
/// subsequent arguments substitute in; leftovers append
/// space-separated.
pub fn console_format(args: &[Value]) -> String {
    let Some((first, rest)) = args.split_first() else {
        return String::new();
    };
    let mut out = String::new();
    let mut rest_iter = rest.iter();
    match first {
        Value::String(template) if template.contains('%') => {
            let mut chars = template.chars().peekable();
            while let Some(c) = chars.next() {
                if c != '%' {
                    out.push(c);
                    continue;
                }
                match chars.next() {
                    Some('%') => out.push('%'),
                    Some('s') => match rest_iter.next() {
                        Some(v) => out.push_str(&to_string_value(v)),
                        None => out.push_str("%s"),
                    },
                    Some('d') | Some('i') => match rest_iter.next() {
                        Some(v) => {
                            let n = crate::ops::to_number(v);
                            out.push_str(&format_number(n.trunc()));
                        }
                        None => out.push_str("%d"),
                    },
                    Some('f') => match rest_iter.next() {
                        Some(v) => out.push_str(&format_number(crate::ops::to_number(v))),
                        None => out.push_str("%f"),
                    },
                    Some('j') | Some('o') | Some('O') => match rest_iter.next() {
                        Some(v) => out.push_str(&inspect(v)),
                        None => out.push_str("%j"),
                    },
                    Some(other) => {
                        out.push('%');
                        out.push(other);
                    }
                    None => out.push('%'),
                }
            }
        }
        _ => out.push_str(&inspect(first)),
    }
    for leftover in rest_iter {
        out.push(' ');
        out.push_str(&inspect(leftover));
    }
    out
}
