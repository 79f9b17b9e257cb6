//! Diagnostic types, codes, and the shared sink.
//!
//! Diagnostics flow orthogonally through every compiler phase: lexing,
//! parsing, module resolution, type checking, and execution all report
//! into one ordered `DiagnosticSink` and continue working. Codes are
//! grouped by phase: 1xxx lex/parse, 2xxx resolve/type, 7xxx execution.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use crate::span::Span;

/// Diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticCategory {
    Warning = 0,
    Error = 1,
    Message = 2,
}

/// A single diagnostic with source location and stable code.
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    /// Module specifier the diagnostic was reported against.
    pub module: String,
    pub span: Span,
    pub category: DiagnosticCategory,
    pub code: u32,
    pub message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn error(module: impl Into<String>, span: Span, code: u32, message: String) -> Self {
        Diagnostic {
            module: module.into(),
            span,
            category: DiagnosticCategory::Error,
            code,
            message,
        }
    }

    #[must_use]
    pub fn warning(module: impl Into<String>, span: Span, code: u32, message: String) -> Self {
        Diagnostic {
            module: module.into(),
            span,
            category: DiagnosticCategory::Warning,
            code,
            message,
        }
    }
}

/// Format a message template by replacing `{0}`, `{1}`, ... with arguments.
#[must_use]
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

/// Stable diagnostic codes.
///
/// Codes are append-only; renumbering an existing code is a breaking
/// change for downstream tooling.
pub mod codes {
    // Lexical (10xx)
    pub const UNTERMINATED_STRING: u32 = 1001;
    pub const UNTERMINATED_TEMPLATE: u32 = 1002;
    pub const UNTERMINATED_COMMENT: u32 = 1003;
    pub const INVALID_ESCAPE: u32 = 1004;
    pub const INVALID_NUMERIC_LITERAL: u32 = 1005;
    pub const UNEXPECTED_CHARACTER: u32 = 1006;
    pub const UNTERMINATED_REGEX: u32 = 1007;

    // Syntactic (11xx)
    pub const EXPECTED_TOKEN: u32 = 1101;
    pub const UNEXPECTED_TOKEN: u32 = 1102;
    pub const REST_PARAMETER_MUST_BE_LAST: u32 = 1103;
    pub const INVALID_ASSIGNMENT_TARGET: u32 = 1104;
    pub const DUPLICATE_LABEL: u32 = 1105;
    pub const ILLEGAL_BREAK: u32 = 1106;
    pub const ILLEGAL_CONTINUE: u32 = 1107;
    pub const EXPECTED_EXPRESSION: u32 = 1108;
    pub const MULTIPLE_DEFAULT_CLAUSES: u32 = 1109;
    pub const AWAIT_OUTSIDE_ASYNC: u32 = 1110;
    pub const YIELD_OUTSIDE_GENERATOR: u32 = 1111;
    pub const DECORATOR_NOT_ALLOWED_HERE: u32 = 1112;
    pub const INVALID_OPTIONAL_PARAMETER_ORDER: u32 = 1113;

    // Module resolution (22xx)
    pub const MODULE_NOT_FOUND: u32 = 2201;
    pub const DUPLICATE_DEFAULT_EXPORT: u32 = 2202;
    pub const EXPORT_ASSIGNMENT_CYCLE: u32 = 2203;
    pub const EXPORT_NOT_FOUND: u32 = 2204;
    pub const DUPLICATE_EXPORT: u32 = 2205;
    pub const NAMED_REEXPORT_OF_EXPORT_ASSIGNMENT: u32 = 2209;

    // Types (23xx)
    pub const TYPE_NOT_ASSIGNABLE: u32 = 2301;
    pub const UNKNOWN_NAME: u32 = 2302;
    pub const UNKNOWN_TYPE_NAME: u32 = 2303;
    pub const PROPERTY_NOT_FOUND: u32 = 2304;
    pub const EXCESS_PROPERTY: u32 = 2305;
    pub const NOT_CALLABLE: u32 = 2306;
    pub const ARGUMENT_COUNT_MISMATCH: u32 = 2307;
    pub const TYPE_ARGUMENT_COUNT_MISMATCH: u32 = 2308;
    pub const CONSTRAINT_VIOLATION: u32 = 2309;
    pub const NOT_CONSTRUCTABLE: u32 = 2310;
    pub const ABSTRACT_CLASS_INSTANTIATED: u32 = 2311;
    pub const ABSTRACT_MEMBER_IN_CONCRETE_CLASS: u32 = 2312;
    pub const ASSIGNMENT_TO_CONST: u32 = 2313;
    pub const ASSIGNMENT_TO_READONLY: u32 = 2314;
    pub const INTERFACE_NOT_IMPLEMENTED: u32 = 2315;
    pub const UNKNOWN_OPERATOR_TYPES: u32 = 2316;
    pub const NOT_ITERABLE: u32 = 2317;
    pub const POSSIBLY_NULL_OR_UNDEFINED: u32 = 2318;
    pub const DUPLICATE_DECLARATION: u32 = 2319;
    pub const PRIVATE_MEMBER_ACCESS: u32 = 2320;
    pub const SUPER_OUTSIDE_CLASS: u32 = 2321;
    pub const INDEX_TYPE_MISMATCH: u32 = 2322;
    pub const AWAITED_NON_PROMISE: u32 = 2323;

    // Execution (7xxx)
    pub const UNCAUGHT_EXCEPTION: u32 = 7001;
    pub const UNHANDLED_REJECTION: u32 = 7002;
    pub const STACK_OVERFLOW: u32 = 7003;
    pub const INTERNAL_ERROR: u32 = 7004;
    pub const OPEN_QUESTION: u32 = 7090;
}

/// A message template definition.
#[derive(Clone, Copy, Debug)]
pub struct MessageTemplate {
    pub code: u32,
    pub template: &'static str,
}

/// Message templates for the codes above, `{n}`-substituted via
/// [`format_message`].
pub const MESSAGE_TEMPLATES: &[MessageTemplate] = &[
    MessageTemplate { code: codes::UNTERMINATED_STRING, template: "Unterminated string literal." },
    MessageTemplate { code: codes::UNTERMINATED_TEMPLATE, template: "Unterminated template literal." },
    MessageTemplate { code: codes::UNTERMINATED_COMMENT, template: "'*/' expected." },
    MessageTemplate { code: codes::INVALID_ESCAPE, template: "Invalid escape sequence." },
    MessageTemplate { code: codes::INVALID_NUMERIC_LITERAL, template: "Invalid numeric literal." },
    MessageTemplate { code: codes::UNEXPECTED_CHARACTER, template: "Unexpected character '{0}'." },
    MessageTemplate { code: codes::EXPECTED_TOKEN, template: "'{0}' expected." },
    MessageTemplate { code: codes::UNEXPECTED_TOKEN, template: "Unexpected token '{0}'." },
    MessageTemplate { code: codes::REST_PARAMETER_MUST_BE_LAST, template: "A rest parameter must be last in a parameter list." },
    MessageTemplate { code: codes::MODULE_NOT_FOUND, template: "Cannot find module '{0}'." },
    MessageTemplate { code: codes::DUPLICATE_DEFAULT_EXPORT, template: "A module cannot have multiple default exports." },
    MessageTemplate { code: codes::EXPORT_ASSIGNMENT_CYCLE, template: "Export assignment of module '{0}' participates in a cycle and cannot be initialized." },
    MessageTemplate { code: codes::TYPE_NOT_ASSIGNABLE, template: "Type '{0}' is not assignable to type '{1}'." },
    MessageTemplate { code: codes::UNKNOWN_NAME, template: "Cannot find name '{0}'." },
    MessageTemplate { code: codes::PROPERTY_NOT_FOUND, template: "Property '{0}' does not exist on type '{1}'." },
    MessageTemplate { code: codes::EXCESS_PROPERTY, template: "Object literal may only specify known properties, and '{0}' does not exist in type '{1}'." },
    MessageTemplate { code: codes::NOT_CALLABLE, template: "Type '{0}' is not callable." },
    MessageTemplate { code: codes::ARGUMENT_COUNT_MISMATCH, template: "Expected {0} arguments, but got {1}." },
    MessageTemplate { code: codes::CONSTRAINT_VIOLATION, template: "Type '{0}' does not satisfy the constraint '{1}'." },
    MessageTemplate { code: codes::ABSTRACT_CLASS_INSTANTIATED, template: "Cannot create an instance of an abstract class." },
    MessageTemplate { code: codes::ABSTRACT_MEMBER_IN_CONCRETE_CLASS, template: "Abstract member '{0}' in a class not declared abstract." },
    MessageTemplate { code: codes::UNCAUGHT_EXCEPTION, template: "Uncaught {0}" },
    MessageTemplate { code: codes::UNHANDLED_REJECTION, template: "Unhandled promise rejection: {0}" },
    MessageTemplate { code: codes::STACK_OVERFLOW, template: "Maximum call stack size exceeded." },
    MessageTemplate { code: codes::INTERNAL_ERROR, template: "Internal error: {0}" },
    MessageTemplate { code: codes::OPEN_QUESTION, template: "Behavior intentionally unspecified: {0}" },
];

/// Look up the message template for a code.
#[must_use]
pub fn get_message_template(code: u32) -> Option<&'static str> {
    MESSAGE_TEMPLATES
        .iter()
        .find(|m| m.code == code)
        .map(|m| m.template)
}

/// Ordered, shared diagnostic collector.
///
/// Cloning a sink clones the handle; all clones append to the same list.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticSink {
    inner: Rc<RefCell<Vec<Diagnostic>>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        self.inner.borrow_mut().push(diagnostic);
    }

    pub fn error(&self, module: &str, span: Span, code: u32, args: &[&str]) {
        let message = get_message_template(code)
            .map(|t| format_message(t, args))
            .unwrap_or_else(|| format!("error TSR{code}"));
        self.push(Diagnostic::error(module, span, code, message));
    }

    pub fn warning(&self, module: &str, span: Span, code: u32, args: &[&str]) {
        let message = get_message_template(code)
            .map(|t| format_message(t, args))
            .unwrap_or_else(|| format!("warning TSR{code}"));
        self.push(Diagnostic::warning(module, span, code, message));
    }

    pub fn has_errors(&self) -> bool {
        self.inner
            .borrow()
            .iter()
            .any(|d| d.category == DiagnosticCategory::Error)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Take all collected diagnostics, leaving the sink empty.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.inner.borrow_mut())
    }

    /// Snapshot of collected diagnostics.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.inner.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_message_substitutes_in_order() {
        assert_eq!(
            format_message("Type '{0}' is not assignable to type '{1}'.", &["A", "B"]),
            "Type 'A' is not assignable to type 'B'."
        );
    }

    #[test]
    fn sink_clones_share_storage() {
        let sink = DiagnosticSink::new();
        let clone = sink.clone();
        clone.error("main", Span::new(0, 1), codes::UNKNOWN_NAME, &["x"]);
        assert_eq!(sink.len(), 1);
        assert!(sink.has_errors());
        assert_eq!(sink.snapshot()[0].message, "Cannot find name 'x'.");
    }

    #[test]
    fn unknown_code_falls_back_to_generic_message() {
        let sink = DiagnosticSink::new();
        sink.error("main", Span::dummy(), 9999, &[]);
        assert_eq!(sink.snapshot()[0].message, "error TSR9999");
    }
}
