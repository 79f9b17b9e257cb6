//! Common types and utilities for the tsr compiler.
//!
//! This crate provides foundational types used across all tsr crates:
//! - Source spans (`Span`, `Spanned`)
//! - Line/column mapping (`LineMap`)
//! - String interning (`Atom`, `Interner`)
//! - Diagnostics (codes, categories, sink)
//! - Numeric literal parsing
//! - Compiler options and limits

pub mod span;
pub use span::{Span, Spanned};

pub mod position;
pub use position::{LineCol, LineMap};

pub mod interner;
pub use interner::{Atom, Interner};

pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSink, codes, format_message};

pub mod numeric;

pub mod options;
pub use options::CompilerOptions;

pub mod limits;
