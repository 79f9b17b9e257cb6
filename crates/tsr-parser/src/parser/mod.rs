//! Recursive-descent parser with Pratt-style expression precedence.
//!
//! Organized into submodules:
//! - `exprs` - expression parsing (precedence climbing, arrows, calls)
//! - `stmts` - statements and declarations
//! - `types` - type annotations (unions, mapped types, `keyof`, ...)
//!
//! Errors are recovered to the next statement boundary so one parse
//! produces the maximum number of useful diagnostics.

mod exprs;
mod stmts;
mod types;

use tracing::debug;
use tsr_common::diagnostics::{DiagnosticSink, codes};
use tsr_common::Span;
use tsr_scanner::{SyntaxKind, Token, TokenValue, split_greater_than, tokenize};

use crate::ast::SourceModule;

/// Parse one module's source text.
pub fn parse_module(specifier: &str, source: &str, sink: &DiagnosticSink) -> SourceModule {
    let tokens = tokenize(specifier, source, sink);
    debug!(module = specifier, tokens = tokens.len(), "parsing module");
    let mut parser = Parser::new(specifier, source, tokens, sink.clone());
    parser.parse_program();
    parser.finish()
}

pub struct Parser<'a> {
    pub(crate) specifier: &'a str,
    #[allow(dead_code)]
    pub(crate) source: &'a str,
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    pub(crate) sink: DiagnosticSink,
    pub(crate) module: SourceModule,
}

impl<'a> Parser<'a> {
    pub fn new(
        specifier: &'a str,
        source: &'a str,
        tokens: Vec<Token>,
        sink: DiagnosticSink,
    ) -> Self {
        Parser {
            specifier,
            source,
            tokens,
            pos: 0,
            sink,
            module: SourceModule::new(specifier),
        }
    }

    pub fn finish(self) -> SourceModule {
        self.module
    }

    // =========================================================================
    // Token cursor
    // =========================================================================

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn kind(&self) -> SyntaxKind {
        self.current().kind
    }

    pub(crate) fn peek_kind(&self, offset: usize) -> SyntaxKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(SyntaxKind::EndOfFileToken)
    }

    pub(crate) fn span(&self) -> Span {
        self.current().span
    }

    pub(crate) fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    pub(crate) fn at(&self, kind: SyntaxKind) -> bool {
        self.kind() == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.at(SyntaxKind::EndOfFileToken)
    }

    pub(crate) fn eat(&mut self, kind: SyntaxKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume `kind` or report "'x' expected" at the current token.
    pub(crate) fn expect(&mut self, kind: SyntaxKind) -> Span {
        if self.at(kind) {
            let span = self.span();
            self.advance();
            span
        } else {
            self.error_here(codes::EXPECTED_TOKEN, &[kind.text()]);
            Span::at(self.span().start)
        }
    }

    /// Save the cursor for speculative parsing.
    pub(crate) fn checkpoint(&self) -> usize {
        self.pos
    }

    /// Roll the cursor back to a checkpoint.
    ///
    /// Note: arena nodes allocated during the failed attempt are left
    /// behind as garbage; they are unreachable and harmless.
    pub(crate) fn rewind(&mut self, checkpoint: usize) {
        self.pos = checkpoint;
    }

    /// Inside a type-argument list, peel one `>` off a compound
    /// greater-than token, leaving the remainder in place.
    pub(crate) fn split_current_greater(&mut self) -> bool {
        let kind = self.kind();
        if let Some(rest) = split_greater_than(kind) {
            let token = &mut self.tokens[self.pos];
            token.kind = rest;
            token.span.start += 1;
            true
        } else {
            false
        }
    }

    // =========================================================================
    // Identifiers
    // =========================================================================

    /// The current token's identifier text, honoring contextual keywords.
    pub(crate) fn identifier_text(&self) -> Option<Box<str>> {
        let token = self.current();
        if !token.kind.is_identifier_like() {
            return None;
        }
        match &token.value {
            TokenValue::String(s) => Some(s.clone()),
            _ => Some(token.kind.text().into()),
        }
    }

    /// Consume an identifier (or contextual keyword used as one).
    pub(crate) fn expect_identifier(&mut self) -> Box<str> {
        match self.identifier_text() {
            Some(text) => {
                self.advance();
                text
            }
            None => {
                self.error_here(codes::EXPECTED_TOKEN, &["identifier"]);
                "".into()
            }
        }
    }

    /// True when the current token matches the given contextual keyword.
    pub(crate) fn at_contextual(&self, kind: SyntaxKind) -> bool {
        self.kind() == kind
    }

    // =========================================================================
    // Semicolons and recovery
    // =========================================================================

    /// Automatic semicolon insertion: an explicit `;`, a line break, a
    /// closing brace, or EOF terminates the statement.
    pub(crate) fn expect_semicolon(&mut self) {
        if self.eat(SyntaxKind::SemicolonToken) {
            return;
        }
        if self.at(SyntaxKind::CloseBraceToken)
            || self.at_eof()
            || self.current().preceded_by_line_break
        {
            return;
        }
        self.error_here(codes::EXPECTED_TOKEN, &[";"]);
    }

    /// Skip to the next plausible statement boundary after a parse error.
    pub(crate) fn recover_to_statement_boundary(&mut self) {
        loop {
            if self.at_eof() {
                return;
            }
            if self.eat(SyntaxKind::SemicolonToken) {
                return;
            }
            if self.at(SyntaxKind::CloseBraceToken) {
                return;
            }
            if self.current().preceded_by_line_break && self.starts_statement() {
                return;
            }
            self.advance();
        }
    }

    fn starts_statement(&self) -> bool {
        use SyntaxKind::*;
        matches!(
            self.kind(),
            VarKeyword
                | LetKeyword
                | ConstKeyword
                | FunctionKeyword
                | ClassKeyword
                | InterfaceKeyword
                | TypeKeyword
                | EnumKeyword
                | ImportKeyword
                | ExportKeyword
                | IfKeyword
                | WhileKeyword
                | DoKeyword
                | ForKeyword
                | SwitchKeyword
                | ReturnKeyword
                | ThrowKeyword
                | TryKeyword
                | BreakKeyword
                | ContinueKeyword
                | OpenBraceToken
                | AtToken
        ) || self.kind().is_identifier_like()
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub(crate) fn error_here(&self, code: u32, args: &[&str]) {
        self.sink.error(self.specifier, self.span(), code, args);
    }

    pub(crate) fn error_at(&self, span: Span, code: u32, args: &[&str]) {
        self.sink.error(self.specifier, span, code, args);
    }
}

#[cfg(test)]
#[path = "tests/parser_tests.rs"]
mod parser_tests;
