//! Scanner/tokenizer for the tsr compiler.
//!
//! Produces a token stream with context-sensitive handling of template
//! literals, regex-vs-division, and numeric literals. Compound
//! greater-than tokens (`>>`, `>>>`, `>=`, `>>=`, `>>>=`) are always
//! emitted maximally; [`split_greater_than`] lets the parser resplit
//! them inside type argument lists.

pub mod syntax_kind;
pub use syntax_kind::SyntaxKind;

pub mod token;
pub use token::{Token, TokenValue};

pub mod scanner;
pub use scanner::{Scanner, split_greater_than, tokenize};
