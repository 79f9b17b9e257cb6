use tsr_runtime::host::host_module;
use tsr_runtime::value::FunctionPayload;
use tsr_runtime::{RuntimeCtx, Value};

fn call_member(
    ctx: &RuntimeCtx,
    namespace: &Value,
    name: &str,
    args: &[Value],
) -> Result<Value, Value> {
    let member = namespace
        .get_shared_property(name)
        .unwrap_or_else(|| panic!("missing member {name}"));
    let Value::Function(f) = &member else {
        panic!("{name} is not callable");
    };
    let FunctionPayload::Native(native) = &f.payload else {
        panic!("{name} is not native");
    };
    native(ctx, &Value::Undefined, args)
}

#[test]
fn fs_round_trips_files_and_stats_them() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("note.txt");
    let path_str = path.to_string_lossy().to_string();

    let ctx = RuntimeCtx::new();
    let fs = host_module("fs").expect("fs module");

    call_member(
        &ctx,
        &fs,
        "writeFileSync",
        &[Value::string(&path_str), Value::string("hello host")],
    )
    .expect("write succeeds");

    let read = call_member(&ctx, &fs, "readFileSync", &[Value::string(&path_str)])
        .expect("read succeeds");
    assert_eq!(read.as_str(), Some("hello host"));

    let stat = call_member(&ctx, &fs, "statSync", &[Value::string(&path_str)])
        .expect("stat succeeds");
    let size = stat.get_shared_property("size").expect("size");
    assert!(matches!(size, Value::Number(n) if n == 10.0));
    let is_file = call_member(&ctx, &stat, "isFile", &[]).expect("isFile callable");
    assert!(matches!(is_file, Value::Bool(true)));

    let exists = call_member(&ctx, &fs, "existsSync", &[Value::string(&path_str)])
        .expect("exists succeeds");
    assert!(matches!(exists, Value::Bool(true)));
}

#[test]
fn fs_errors_carry_the_conventional_code_taxonomy() {
    let ctx = RuntimeCtx::new();
    let fs = host_module("fs").expect("fs module");
    let error = call_member(
        &ctx,
        &fs,
        "readFileSync",
        &[Value::string("/definitely/not/here.txt")],
    )
    .expect_err("missing file must throw");
    let code = error.get_shared_property("code").expect("code field");
    assert_eq!(code.as_str(), Some("ENOENT"));
}

#[test]
fn signature_only_modules_raise_catchable_enosys() {
    let ctx = RuntimeCtx::new();
    let http = host_module("http").expect("http module");
    let error = call_member(&ctx, &http, "createServer", &[]).expect_err("stubbed");
    let code = error.get_shared_property("code").expect("code field");
    assert_eq!(code.as_str(), Some("ENOSYS"));

    // The status table itself is live data.
    let statuses = http
        .get_shared_property("STATUS_CODES")
        .expect("status table");
    let not_found = statuses.get_shared_property("404").expect("404 entry");
    assert_eq!(not_found.as_str(), Some("Not Found"));
}

#[test]
fn path_module_joins_and_normalizes() {
    let ctx = RuntimeCtx::new();
    let path = host_module("path").expect("path module");
    let joined = call_member(
        &ctx,
        &path,
        "join",
        &[Value::string("a"), Value::string("b/.."), Value::string("c")],
    )
    .expect("join succeeds");
    assert_eq!(joined.as_str(), Some("a/c"));

    let ext = call_member(&ctx, &path, "extname", &[Value::string("dir/file.ts")])
        .expect("extname succeeds");
    assert_eq!(ext.as_str(), Some(".ts"));

    // The win32 sub-namespace uses its own separator.
    let win32 = path.get_shared_property("win32").expect("win32 namespace");
    let sep = win32.get_shared_property("sep").expect("sep");
    assert_eq!(sep.as_str(), Some("\\"));
}
