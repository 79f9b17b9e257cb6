//! Centralized limits and thresholds.

/// Executor call-depth limit before a fatal stack-overflow diagnostic.
pub const DEFAULT_STACK_LIMIT: usize = 2048;

/// Checker recursion guard for deeply nested or self-referential types.
pub const TYPE_RECURSION_LIMIT: usize = 128;

/// Cap on diagnostics collected per compilation; further reports are
/// dropped so runaway error cascades stay bounded.
pub const MAX_DIAGNOSTICS: usize = 10_000;

/// Scheduler drain guard: iterations of the macrotask loop before the
/// executor assumes a runaway timer program.
pub const MAX_TASK_TICKS: usize = 1_000_000;
