//! Built-in host modules, resolvable by bare specifier.
//!
//! Runtime support is a subset of the checkable surface: fs (sync
//! subset), path, crypto (non-cryptographic PRNG variants), url,
//! querystring, perf_hooks, and timers are live; stream, http,
//! child_process, dns, zlib, and readline expose their signatures but
//! raise catchable `ENOSYS` host errors when invoked.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::fmt::to_string_value;
use crate::ops::to_number;
use crate::value::{ObjectValue, Value};

use super::{host_error, io_error, native, object, unsupported};

/// Look up a built-in host module namespace.
pub fn host_module(specifier: &str) -> Option<Value> {
    Some(match specifier {
        "fs" => fs_module(),
        "path" => path_module(),
        "crypto" => crypto_module(),
        "url" => url_module(),
        "querystring" => querystring_module(),
        "perf_hooks" => perf_hooks_module(),
        "timers" => timers_module(),
        "stream" => stub_module(&["Readable", "Writable", "Duplex", "Transform"]),
        "http" => http_module(),
        "child_process" => stub_module(&["execSync", "spawnSync", "exec", "spawn"]),
        "dns" => stub_module(&["lookup", "resolve", "resolve4", "reverse"]),
        "zlib" => stub_module(&[
            "gzipSync",
            "gunzipSync",
            "deflateSync",
            "inflateSync",
            "brotliCompressSync",
            "brotliDecompressSync",
            "zstdCompressSync",
            "zstdDecompressSync",
        ]),
        "readline" => stub_module(&["createInterface", "question"]),
        _ => return None,
    })
}

fn stub_module(members: &[&'static str]) -> Value {
    let mut props = IndexMap::new();
    for &member in members {
        props.insert(member.to_string(), unsupported(member));
    }
    Value::Object(ObjectValue::from_props(props))
}

// =============================================================================
// fs
// =============================================================================

fn arg_path(args: &[Value], i: usize) -> Result<String, Value> {
    match args.get(i) {
        Some(Value::String(s)) => Ok(s.to_string()),
        _ => Err(host_error("EINVAL", "path must be a string")),
    }
}

fn fs_module() -> Value {
    object(vec![
        (
            "readFileSync",
            native("readFileSync", |_, _, args| {
                let path = arg_path(args, 0)?;
                match std::fs::read_to_string(&path) {
                    Ok(text) => Ok(Value::string(text)),
                    Err(err) => Err(io_error(&err, &path)),
                }
            }),
        ),
        (
            "writeFileSync",
            native("writeFileSync", |_, _, args| {
                let path = arg_path(args, 0)?;
                let data = args.get(1).map(to_string_value).unwrap_or_default();
                std::fs::write(&path, data).map_err(|e| io_error(&e, &path))?;
                Ok(Value::Undefined)
            }),
        ),
        (
            "appendFileSync",
            native("appendFileSync", |_, _, args| {
                use std::io::Write;
                let path = arg_path(args, 0)?;
                let data = args.get(1).map(to_string_value).unwrap_or_default();
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|e| io_error(&e, &path))?;
                file.write_all(data.as_bytes())
                    .map_err(|e| io_error(&e, &path))?;
                Ok(Value::Undefined)
            }),
        ),
        (
            "existsSync",
            native("existsSync", |_, _, args| {
                let path = arg_path(args, 0)?;
                Ok(Value::Bool(std::path::Path::new(&path).exists()))
            }),
        ),
        (
            "mkdirSync",
            native("mkdirSync", |_, _, args| {
                let path = arg_path(args, 0)?;
                std::fs::create_dir_all(&path).map_err(|e| io_error(&e, &path))?;
                Ok(Value::Undefined)
            }),
        ),
        (
            "readdirSync",
            native("readdirSync", |_, _, args| {
                let path = arg_path(args, 0)?;
                let entries = std::fs::read_dir(&path).map_err(|e| io_error(&e, &path))?;
                let mut names = Vec::new();
                for entry in entries {
                    let entry = entry.map_err(|e| io_error(&e, &path))?;
                    names.push(Value::string(entry.file_name().to_string_lossy()));
                }
                Ok(Value::array(names))
            }),
        ),
        (
            "unlinkSync",
            native("unlinkSync", |_, _, args| {
                let path = arg_path(args, 0)?;
                std::fs::remove_file(&path).map_err(|e| io_error(&e, &path))?;
                Ok(Value::Undefined)
            }),
        ),
        (
            "statSync",
            native("statSync", |_, _, args| {
                let path = arg_path(args, 0)?;
                let metadata = std::fs::metadata(&path).map_err(|e| io_error(&e, &path))?;
                let is_file = metadata.is_file();
                let is_dir = metadata.is_dir();
                Ok(object(vec![
                    ("size", Value::Number(metadata.len() as f64)),
                    (
                        "isFile",
                        native("isFile", move |_, _, _| Ok(Value::Bool(is_file))),
                    ),
                    (
                        "isDirectory",
                        native("isDirectory", move |_, _, _| Ok(Value::Bool(is_dir))),
                    ),
                ]))
            }),
        ),
    ])
}

// =============================================================================
// path
// =============================================================================

fn path_functions(sep: char) -> Vec<(&'static str, Value)> {
    let join = native("join", move |_, _, args: &[Value]| {
        let mut parts = Vec::new();
        for arg in args {
            let part = to_string_value(arg);
            if !part.is_empty() {
                parts.push(part);
            }
        }
        Ok(Value::string(normalize_path(&parts.join(&sep.to_string()), sep)))
    });
    let dirname = native("dirname", move |_, _, args: &[Value]| {
        let path = args.first().map(to_string_value).unwrap_or_default();
        match path.rfind(sep) {
            Some(0) => Ok(Value::string(sep.to_string())),
            Some(pos) => Ok(Value::string(path[..pos].to_string())),
            None => Ok(Value::string(".")),
        }
    });
    let basename = native("basename", move |_, _, args: &[Value]| {
        let path = args.first().map(to_string_value).unwrap_or_default();
        let base = match path.rfind(sep) {
            Some(pos) => path[pos + 1..].to_string(),
            None => path,
        };
        // Optional extension strip.
        match args.get(1) {
            Some(Value::String(ext)) if base.ends_with(&**ext) => {
                Ok(Value::string(base[..base.len() - ext.len()].to_string()))
            }
            _ => Ok(Value::string(base)),
        }
    });
    let extname = native("extname", move |_, _, args: &[Value]| {
        let path = args.first().map(to_string_value).unwrap_or_default();
        let base = match path.rfind(sep) {
            Some(pos) => &path[pos + 1..],
            None => &path,
        };
        match base.rfind('.') {
            Some(0) | None => Ok(Value::string("")),
            Some(pos) => Ok(Value::string(base[pos..].to_string())),
        }
    });
    let normalize = native("normalize", move |_, _, args: &[Value]| {
        let path = args.first().map(to_string_value).unwrap_or_default();
        Ok(Value::string(normalize_path(&path, sep)))
    });
    let resolve = native("resolve", move |_, _, args: &[Value]| {
        let mut result = String::new();
        for arg in args {
            let part = to_string_value(arg);
            if part.starts_with(sep) {
                result = part;
            } else if result.is_empty() {
                result = part;
            } else {
                result.push(sep);
                result.push_str(&part);
            }
        }
        Ok(Value::string(normalize_path(&result, sep)))
    });
    let is_absolute = native("isAbsolute", move |_, _, args: &[Value]| {
        let path = args.first().map(to_string_value).unwrap_or_default();
        Ok(Value::Bool(path.starts_with(sep)))
    });
    vec![
        ("join", join),
        ("dirname", dirname),
        ("basename", basename),
        ("extname", extname),
        ("normalize", normalize),
        ("resolve", resolve),
        ("isAbsolute", is_absolute),
        ("sep", Value::string(sep.to_string())),
    ]
}

fn normalize_path(path: &str, sep: char) -> String {
    let absolute = path.starts_with(sep);
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(sep) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join(&sep.to_string());
    if absolute {
        format!("{sep}{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

fn path_module() -> Value {
    let mut props = path_functions('/');
    props.push(("posix", object(path_functions('/'))));
    props.push(("win32", object(path_functions('\\'))));
    object(props)
}

// =============================================================================
// crypto
// =============================================================================

fn crypto_module() -> Value {
    object(vec![
        (
            "randomBytes",
            native("randomBytes", |ctx, _, args| {
                let count = args.first().map(to_number).unwrap_or(0.0) as usize;
                let mut bytes = Vec::with_capacity(count);
                while bytes.len() < count {
                    let word = ctx.next_random();
                    for shift in [0u32, 8, 16, 24, 32, 40, 48, 56] {
                        if bytes.len() >= count {
                            break;
                        }
                        bytes.push(Value::Number(((word >> shift) & 0xff) as f64));
                    }
                }
                Ok(Value::array(bytes))
            }),
        ),
        (
            "randomUUID",
            native("randomUUID", |ctx, _, _| {
                let a = ctx.next_random();
                let b = ctx.next_random();
                // Version-4 layout over PRNG bits.
                let uuid = format!(
                    "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
                    (a >> 32) as u32,
                    (a >> 16) & 0xffff,
                    a & 0xfff,
                    0x8000 | ((b >> 48) & 0x3fff),
                    b & 0xffff_ffff_ffff,
                );
                Ok(Value::string(uuid))
            }),
        ),
        (
            "randomInt",
            native("randomInt", |ctx, _, args| {
                let (min, max) = match (args.first(), args.get(1)) {
                    (Some(min), Some(max)) => (to_number(min), to_number(max)),
                    (Some(max), None) => (0.0, to_number(max)),
                    _ => return Err(host_error("EINVAL", "randomInt expects a range")),
                };
                if max <= min {
                    return Err(host_error("ERANGE", "max must be greater than min"));
                }
                let span = (max - min) as u64;
                let n = ctx.next_random() % span;
                Ok(Value::Number(min + n as f64))
            }),
        ),
        (
            "createHash",
            native("createHash", |_, _, args| {
                let _algorithm = args.first().map(to_string_value).unwrap_or_default();
                let state = Rc::new(std::cell::Cell::new(0xcbf2_9ce4_8422_2325u64));
                let update_state = state.clone();
                let update = native("update", move |_, this, args| {
                    let data = args.first().map(to_string_value).unwrap_or_default();
                    let mut h = update_state.get();
                    for byte in data.as_bytes() {
                        h ^= u64::from(*byte);
                        h = h.wrapping_mul(0x100_0000_01b3);
                    }
                    update_state.set(h);
                    Ok(this.clone())
                });
                let digest = native("digest", move |_, _, _| {
                    Ok(Value::string(format!("{:016x}", state.get())))
                });
                Ok(object(vec![("update", update), ("digest", digest)]))
            }),
        ),
    ])
}

// =============================================================================
// url / querystring
// =============================================================================

fn url_module() -> Value {
    object(vec![(
        "parse",
        native("parse", |_, _, args| {
            let url = args.first().map(to_string_value).unwrap_or_default();
            let (scheme, rest) = match url.split_once("://") {
                Some((s, r)) => (format!("{s}:"), r.to_string()),
                None => (String::new(), url.clone()),
            };
            let (host_part, path_query) = match rest.split_once('/') {
                Some((h, pq)) => (h.to_string(), format!("/{pq}")),
                None => (rest.clone(), "/".to_string()),
            };
            let (pathname, query) = match path_query.split_once('?') {
                Some((p, q)) => (p.to_string(), q.to_string()),
                None => (path_query.clone(), String::new()),
            };
            Ok(object(vec![
                ("href", Value::string(&url)),
                ("protocol", Value::string(scheme)),
                ("host", Value::string(&host_part)),
                ("hostname", Value::string(
                    host_part.split(':').next().unwrap_or(""),
                )),
                (
                    "port",
                    Value::string(host_part.split(':').nth(1).unwrap_or("")),
                ),
                ("pathname", Value::string(pathname)),
                (
                    "search",
                    Value::string(if query.is_empty() {
                        String::new()
                    } else {
                        format!("?{query}")
                    }),
                ),
                ("query", Value::string(query)),
            ]))
        }),
    )])
}

fn querystring_module() -> Value {
    object(vec![
        (
            "parse",
            native("parse", |_, _, args| {
                let text = args.first().map(to_string_value).unwrap_or_default();
                let mut props = IndexMap::new();
                for pair in text.split('&') {
                    if pair.is_empty() {
                        continue;
                    }
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    props.insert(key.to_string(), Value::string(value));
                }
                Ok(Value::Object(ObjectValue::from_props(props)))
            }),
        ),
        (
            "stringify",
            native("stringify", |_, _, args| {
                let Some(Value::Object(obj)) = args.first() else {
                    return Ok(Value::string(""));
                };
                let parts: Vec<String> = obj
                    .props
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{k}={}", to_string_value(v)))
                    .collect();
                Ok(Value::string(parts.join("&")))
            }),
        ),
    ])
}

// =============================================================================
// perf_hooks / timers / http
// =============================================================================

fn perf_hooks_module() -> Value {
    object(vec![(
        "performance",
        object(vec![(
            "now",
            native("now", |ctx, _, _| Ok(Value::Number(ctx.queue.now()))),
        )]),
    )])
}

fn timers_module() -> Value {
    object(vec![
        (
            "setTimeout",
            native("setTimeout", |ctx, _, args| {
                let func = args.first().cloned().unwrap_or(Value::Undefined);
                let delay = args.get(1).map(to_number).unwrap_or(0.0);
                let id = ctx.queue.set_timeout(func, Vec::new(), delay);
                Ok(Value::Number(id as f64))
            }),
        ),
        (
            "clearTimeout",
            native("clearTimeout", |ctx, _, args| {
                if let Some(Value::Number(id)) = args.first() {
                    ctx.queue.clear_timer(*id as u64);
                }
                Ok(Value::Undefined)
            }),
        ),
    ])
}

fn http_module() -> Value {
    // The status table is live data; server/client surfaces are
    // signature-only.
    let mut statuses = IndexMap::new();
    for (code, text) in [
        (200, "OK"),
        (201, "Created"),
        (204, "No Content"),
        (301, "Moved Permanently"),
        (302, "Found"),
        (304, "Not Modified"),
        (400, "Bad Request"),
        (401, "Unauthorized"),
        (403, "Forbidden"),
        (404, "Not Found"),
        (405, "Method Not Allowed"),
        (409, "Conflict"),
        (418, "I'm a Teapot"),
        (429, "Too Many Requests"),
        (500, "Internal Server Error"),
        (502, "Bad Gateway"),
        (503, "Service Unavailable"),
    ] {
        statuses.insert(code.to_string(), Value::string(text));
    }
    object(vec![
        ("STATUS_CODES", Value::Object(ObjectValue::from_props(statuses))),
        ("createServer", unsupported("createServer")),
        ("request", unsupported("request")),
        ("get", unsupported("get")),
    ])
}
