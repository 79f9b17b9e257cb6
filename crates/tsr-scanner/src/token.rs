//! Token value types.

use serde::Serialize;
use tsr_common::{Span, Spanned};

use crate::SyntaxKind;

/// Processed literal value carried by a token.
///
/// String-ish values are cooked: escape sequences are already resolved.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub enum TokenValue {
    #[default]
    None,
    Number(f64),
    /// Big integer digits, stored as text for precision.
    BigInt(Box<str>),
    /// Cooked string / template-chunk contents.
    String(Box<str>),
}

/// A single source token.
#[derive(Clone, Debug, Serialize)]
pub struct Token {
    pub kind: SyntaxKind,
    pub span: Span,
    pub value: TokenValue,
    /// Whether a line break occurred between the previous token and this
    /// one. Drives restricted productions (`return` newline handling) and
    /// statement recovery.
    pub preceded_by_line_break: bool,
}

impl Token {
    pub fn new(kind: SyntaxKind, span: Span) -> Self {
        Token {
            kind,
            span,
            value: TokenValue::None,
            preceded_by_line_break: false,
        }
    }

    /// The cooked string value, for string/template/identifier tokens.
    pub fn string_value(&self) -> Option<&str> {
        match &self.value {
            TokenValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The numeric value, for numeric literal tokens.
    pub fn number_value(&self) -> Option<f64> {
        match self.value {
            TokenValue::Number(n) => Some(n),
            _ => None,
        }
    }

    /// The raw lexeme text.
    pub fn lexeme<'a>(&self, source: &'a str) -> &'a str {
        self.span.slice(source)
    }
}

impl Spanned for Token {
    fn span(&self) -> Span {
        self.span
    }
}
