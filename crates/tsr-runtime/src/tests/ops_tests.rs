use crate::fmt::{console_format, format_number, inspect};
use crate::ops::*;
use crate::value::Value;

#[test]
fn typeof_strings_follow_the_table() {
    assert_eq!(type_of(&Value::Undefined), "undefined");
    assert_eq!(type_of(&Value::Null), "object");
    assert_eq!(type_of(&Value::Number(1.0)), "number");
    assert_eq!(type_of(&Value::string("x")), "string");
    assert_eq!(type_of(&Value::Bool(true)), "boolean");
    assert_eq!(type_of(&Value::array(vec![])), "object");
}

#[test]
fn truthiness_table() {
    assert!(!truthy(&Value::Undefined));
    assert!(!truthy(&Value::Null));
    assert!(!truthy(&Value::Number(0.0)));
    assert!(!truthy(&Value::Number(f64::NAN)));
    assert!(!truthy(&Value::string("")));
    assert!(truthy(&Value::string("0")));
    assert!(truthy(&Value::Number(-1.0)));
    assert!(truthy(&Value::array(vec![])));
}

#[test]
fn strict_equality_is_identity_for_heap_values() {
    let a = Value::array(vec![Value::Number(1.0)]);
    let b = Value::array(vec![Value::Number(1.0)]);
    assert!(!strict_eq(&a, &b));
    assert!(strict_eq(&a, &a.clone()));
    assert!(strict_eq(&Value::Number(2.0), &Value::Number(2.0)));
    assert!(!strict_eq(&Value::Number(2.0), &Value::string("2")));
}

#[test]
fn loose_equality_coercion_table() {
    assert!(loose_eq(&Value::Null, &Value::Undefined));
    assert!(loose_eq(&Value::Number(2.0), &Value::string("2")));
    assert!(loose_eq(&Value::Bool(true), &Value::Number(1.0)));
    assert!(loose_eq(&Value::Bool(false), &Value::string("0")));
    assert!(!loose_eq(&Value::Null, &Value::Number(0.0)));
    assert!(!loose_eq(&Value::string("a"), &Value::Number(0.0)));
}

#[test]
fn add_dispatches_on_strings() {
    let sum = add(&Value::Number(1.0), &Value::Number(2.0));
    assert!(matches!(sum, Value::Number(n) if n == 3.0));

    let concat = add(&Value::string("a"), &Value::Number(2.0));
    assert!(matches!(&concat, Value::String(s) if &**s == "a2"));

    let concat = add(&Value::Number(1.0), &Value::string("b"));
    assert!(matches!(&concat, Value::String(s) if &**s == "1b"));
}

#[test]
fn number_formatting_matches_console_expectations() {
    assert_eq!(format_number(3.0), "3");
    assert_eq!(format_number(3.5), "3.5");
    assert_eq!(format_number(f64::NAN), "NaN");
    assert_eq!(format_number(f64::INFINITY), "Infinity");
    assert_eq!(format_number(-0.0), "0");
    assert_eq!(format_number(11.0), "11");
}

#[test]
fn inspect_renders_structures() {
    let arr = Value::array(vec![Value::Number(1.0), Value::string("x")]);
    assert_eq!(inspect(&arr), "[ 1, 'x' ]");
}

#[test]
fn console_format_expands_placeholders() {
    let out = console_format(&[
        Value::string("%s has %d items"),
        Value::string("cart"),
        Value::Number(3.0),
    ]);
    assert_eq!(out, "cart has 3 items");

    let out = console_format(&[Value::Number(7.0), Value::string("x")]);
    assert_eq!(out, "7 'x'");
}

#[test]
fn to_int32_wraps_like_the_shift_operators() {
    assert_eq!(to_int32(&Value::Number(16.0)), 16);
    assert_eq!(to_int32(&Value::Number(-1.0)), -1);
    assert_eq!(to_int32(&Value::Number(f64::NAN)), 0);
    assert_eq!(to_uint32(&Value::Number(-1.0)), u32::MAX);
}

#[test]
fn iteration_sources() {
    let arr = Value::array(vec![Value::Number(1.0)]);
    assert!(matches!(
        get_iter_source(&arr),
        Ok(IterSource::Items(items)) if items.len() == 1
    ));
    let s = Value::string("ab");
    assert!(matches!(
        get_iter_source(&s),
        Ok(IterSource::Items(items)) if items.len() == 2
    ));
    assert!(get_iter_source(&Value::Number(1.0)).is_err());
}
