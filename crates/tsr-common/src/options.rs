//! Compiler options shared by the checker and both executors.
//!
//! This module lives in tsr-common so the checker, interpreter, and
//! emitter can all reference `CompilerOptions` without a circular
//! dependency.

/// Compiler options.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Master strictness switch; turns on the strict family below.
    pub strict: bool,
    /// When true, `null`/`undefined` are not assignable to other types.
    pub strict_null_checks: bool,
    /// When true, method positions check parameters bivariantly.
    /// Function positions are always contravariant in parameters.
    pub method_bivariance: bool,
    /// When true, decorators use the legacy (outside-in, value-rewriting)
    /// protocol; otherwise the proposal (context object) protocol.
    pub legacy_decorators: bool,
    /// Plain calls bind `this` to the global object instead of `undefined`.
    /// Recorded but off by default; the executors implement the strict
    /// behavior.
    pub bind_this_to_global: bool,
    /// Interpreter/VM call-depth limit before a fatal stack diagnostic.
    pub stack_limit: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            strict: true,
            strict_null_checks: true,
            method_bivariance: true,
            legacy_decorators: true,
            bind_this_to_global: false,
            stack_limit: crate::limits::DEFAULT_STACK_LIMIT,
        }
    }
}

impl CompilerOptions {
    /// Apply `strict` defaults to the individual strict flags.
    #[must_use]
    pub fn apply_strict_defaults(mut self) -> Self {
        if self.strict {
            self.strict_null_checks = true;
        }
        self
    }
}
