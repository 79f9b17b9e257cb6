//! The scanner: source text to token stream.
//!
//! One pass, context-sensitive where the grammar demands it:
//! - template literals produce head/middle/tail parts, with a brace-depth
//!   stack so substitutions nest;
//! - `/` is tokenized as a regex literal when the previous token cannot
//!   end an expression, as division otherwise;
//! - greater-than compounds are always maximal; the parser calls
//!   [`split_greater_than`] to peel one `>` inside type argument lists.

use memchr::memchr2;
use tsr_common::diagnostics::{DiagnosticSink, codes};
use tsr_common::numeric::parse_numeric_literal_value;
use tsr_common::Span;

use crate::token::{Token, TokenValue};
use crate::SyntaxKind;

/// Tokenize a whole module. Convenience wrapper over [`Scanner`].
pub fn tokenize(module: &str, source: &str, sink: &DiagnosticSink) -> Vec<Token> {
    Scanner::new(module, source, sink.clone()).scan_all()
}

/// Given a maximal greater-than compound token kind, the kind that
/// remains after consuming a single leading `>`.
///
/// Returns `None` for kinds that do not start with two `>` characters.
pub fn split_greater_than(kind: SyntaxKind) -> Option<SyntaxKind> {
    use SyntaxKind::*;
    Some(match kind {
        GreaterThanGreaterThanToken => GreaterThanToken,
        GreaterThanGreaterThanGreaterThanToken => GreaterThanGreaterThanToken,
        GreaterThanGreaterThanEqualsToken => GreaterThanEqualsToken,
        GreaterThanGreaterThanGreaterThanEqualsToken => GreaterThanGreaterThanEqualsToken,
        _ => return None,
    })
}

/// Streaming scanner state.
pub struct Scanner<'a> {
    module: &'a str,
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    sink: DiagnosticSink,
    /// Kind of the previous non-trivia token, for regex-vs-division.
    prev_kind: Option<SyntaxKind>,
    /// Brace depth per open template substitution, innermost last.
    template_stack: Vec<u32>,
    /// A line break was seen since the last token.
    pending_line_break: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(module: &'a str, source: &'a str, sink: DiagnosticSink) -> Self {
        Scanner {
            module,
            source,
            bytes: source.as_bytes(),
            pos: 0,
            sink,
            prev_kind: None,
            template_stack: Vec::new(),
            pending_line_break: false,
        }
    }

    /// Scan the whole source, ending with an EOF token.
    pub fn scan_all(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == SyntaxKind::EndOfFileToken;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn error(&self, span: Span, code: u32, args: &[&str]) {
        self.sink.error(self.module, span, code, args);
    }

    fn peek(&self) -> u8 {
        self.bytes.get(self.pos).copied().unwrap_or(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn char_at(&self, pos: usize) -> Option<char> {
        self.source[pos..].chars().next()
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                b'\n' => {
                    self.pending_line_break = true;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'/' if self.peek_at(1) == b'/' => {
                    // Line comment: fast-forward to the next line break.
                    match memchr2(b'\n', b'\r', &self.bytes[self.pos..]) {
                        Some(offset) => self.pos += offset,
                        None => self.pos = self.bytes.len(),
                    }
                }
                b'/' if self.peek_at(1) == b'*' => {
                    let start = self.pos;
                    self.pos += 2;
                    let mut closed = false;
                    while self.pos < self.bytes.len() {
                        if self.peek() == b'*' && self.peek_at(1) == b'/' {
                            self.pos += 2;
                            closed = true;
                            break;
                        }
                        if self.peek() == b'\n' {
                            self.pending_line_break = true;
                        }
                        self.pos += 1;
                    }
                    if !closed {
                        self.error(
                            Span::new(start as u32, self.pos as u32),
                            codes::UNTERMINATED_COMMENT,
                            &[],
                        );
                    }
                }
                c if c >= 0x80 => {
                    // Non-ASCII whitespace is rare; decode and check.
                    match self.char_at(self.pos) {
                        Some(ch) if ch.is_whitespace() => self.pos += ch.len_utf8(),
                        _ => break,
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Token {
        self.skip_trivia();

        // Inside a template substitution, a `}` at depth zero resumes the
        // template text instead of closing a block.
        if let Some(&depth) = self.template_stack.last()
            && depth == 0
            && self.peek() == b'}'
        {
            self.template_stack.pop();
            let token = self.scan_template_part(self.pos, true);
            return self.finish(token);
        }

        let start = self.pos;
        if self.pos >= self.bytes.len() {
            return self.finish(Token::new(
                SyntaxKind::EndOfFileToken,
                Span::at(start as u32),
            ));
        }

        let c = self.peek();
        let token = match c {
            b'0'..=b'9' => self.scan_number(start),
            b'"' | b'\'' => self.scan_string(start, c),
            b'`' => self.scan_template_part(start, false),
            b'/' => {
                if self.regex_allowed() {
                    self.scan_regex(start)
                } else if self.peek_at(1) == b'=' {
                    self.punct(start, 2, SyntaxKind::SlashEqualsToken)
                } else {
                    self.punct(start, 1, SyntaxKind::SlashToken)
                }
            }
            b'.' if self.peek_at(1).is_ascii_digit() => self.scan_number(start),
            _ if is_identifier_start(c) || c >= 0x80 => self.scan_identifier(start),
            _ => self.scan_punctuation(start),
        };
        self.finish(token)
    }

    fn finish(&mut self, mut token: Token) -> Token {
        token.preceded_by_line_break = self.pending_line_break;
        self.pending_line_break = false;
        if token.kind != SyntaxKind::EndOfFileToken {
            self.prev_kind = Some(token.kind);
        }
        // Track brace nesting for template substitutions.
        match token.kind {
            SyntaxKind::OpenBraceToken => {
                if let Some(depth) = self.template_stack.last_mut() {
                    *depth += 1;
                }
            }
            SyntaxKind::CloseBraceToken => {
                if let Some(depth) = self.template_stack.last_mut() {
                    *depth = depth.saturating_sub(1);
                }
            }
            SyntaxKind::TemplateHead => {
                self.template_stack.push(0);
            }
            SyntaxKind::TemplateMiddle => {
                self.template_stack.push(0);
            }
            _ => {}
        }
        token
    }

    /// Whether `/` starts a regex in the current context: true when the
    /// previous token cannot end an expression.
    fn regex_allowed(&self) -> bool {
        use SyntaxKind::*;
        match self.prev_kind {
            None => true,
            Some(kind) => !matches!(
                kind,
                Identifier
                    | NumericLiteral
                    | BigIntLiteral
                    | StringLiteral
                    | RegularExpressionLiteral
                    | NoSubstitutionTemplateLiteral
                    | TemplateTail
                    | CloseParenToken
                    | CloseBracketToken
                    | CloseBraceToken
                    | PlusPlusToken
                    | MinusMinusToken
                    | ThisKeyword
                    | SuperKeyword
                    | TrueKeyword
                    | FalseKeyword
                    | NullKeyword
                    | UndefinedKeyword
            ) && !kind.is_contextual_keyword(),
        }
    }

    fn punct(&mut self, start: usize, len: usize, kind: SyntaxKind) -> Token {
        self.pos = start + len;
        Token::new(kind, Span::new(start as u32, self.pos as u32))
    }

    fn scan_identifier(&mut self, start: usize) -> Token {
        while self.pos < self.bytes.len() {
            let b = self.peek();
            if is_identifier_part(b) {
                self.pos += 1;
            } else if b >= 0x80 {
                match self.char_at(self.pos) {
                    Some(ch) if ch.is_alphanumeric() => self.pos += ch.len_utf8(),
                    _ => break,
                }
            } else {
                break;
            }
        }
        let span = Span::new(start as u32, self.pos as u32);
        let text = span.slice(self.source);
        let kind = SyntaxKind::keyword_from_str(text).unwrap_or(SyntaxKind::Identifier);
        let mut token = Token::new(kind, span);
        if kind == SyntaxKind::Identifier {
            token.value = TokenValue::String(text.into());
        }
        token
    }

    fn scan_number(&mut self, start: usize) -> Token {
        let mut malformed = false;

        if self.peek() == b'0' && matches!(self.peek_at(1) | 0x20, b'x' | b'b' | b'o') {
            self.pos += 2;
            let digits_start = self.pos;
            while matches!(self.peek(), b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F' | b'_') {
                self.pos += 1;
            }
            if self.pos == digits_start {
                malformed = true;
            }
        } else {
            while matches!(self.peek(), b'0'..=b'9' | b'_') {
                self.pos += 1;
            }
            if self.peek() == b'.' {
                self.pos += 1;
                while matches!(self.peek(), b'0'..=b'9' | b'_') {
                    self.pos += 1;
                }
            }
            if self.peek() | 0x20 == b'e' {
                let mark = self.pos;
                self.pos += 1;
                if matches!(self.peek(), b'+' | b'-') {
                    self.pos += 1;
                }
                if self.peek().is_ascii_digit() {
                    while self.peek().is_ascii_digit() {
                        self.pos += 1;
                    }
                } else {
                    // Not an exponent after all (e.g. `1e` then identifier).
                    self.pos = mark;
                    malformed = true;
                }
            }
        }

        // Trailing bigint suffix.
        let mut is_bigint = false;
        if self.peek() == b'n' {
            is_bigint = true;
            self.pos += 1;
        }

        let span = Span::new(start as u32, self.pos as u32);
        let text = span.slice(self.source);

        if is_bigint {
            let digits = &text[..text.len() - 1];
            if malformed || parse_numeric_literal_value(digits).is_none() {
                self.error(span, codes::INVALID_NUMERIC_LITERAL, &[]);
            }
            let mut token = Token::new(SyntaxKind::BigIntLiteral, span);
            token.value = TokenValue::BigInt(digits.into());
            return token;
        }

        let value = if malformed {
            None
        } else {
            parse_numeric_literal_value(text)
        };
        let mut token = Token::new(SyntaxKind::NumericLiteral, span);
        match value {
            Some(n) => token.value = TokenValue::Number(n),
            None => {
                self.error(span, codes::INVALID_NUMERIC_LITERAL, &[]);
                token.value = TokenValue::Number(f64::NAN);
            }
        }
        token
    }

    fn scan_string(&mut self, start: usize, quote: u8) -> Token {
        self.pos += 1;
        let mut value = String::new();
        let mut terminated = false;
        while self.pos < self.bytes.len() {
            let b = self.peek();
            if b == quote {
                self.pos += 1;
                terminated = true;
                break;
            }
            if b == b'\n' || b == b'\r' {
                break;
            }
            if b == b'\\' {
                self.scan_escape(&mut value);
            } else if b < 0x80 {
                value.push(b as char);
                self.pos += 1;
            } else if let Some(ch) = self.char_at(self.pos) {
                value.push(ch);
                self.pos += ch.len_utf8();
            } else {
                self.pos += 1;
            }
        }
        let span = Span::new(start as u32, self.pos as u32);
        if !terminated {
            self.error(span, codes::UNTERMINATED_STRING, &[]);
        }
        let mut token = Token::new(SyntaxKind::StringLiteral, span);
        token.value = TokenValue::String(value.into());
        token
    }

    /// Scan a template chunk starting at `` ` `` (fresh) or `}` (resuming
    /// after a substitution). Produces one of the four template kinds.
    fn scan_template_part(&mut self, start: usize, resuming: bool) -> Token {
        self.pos += 1; // consume ` or }
        let mut value = String::new();
        let mut ends_with_substitution = false;
        let mut terminated = false;
        while self.pos < self.bytes.len() {
            let b = self.peek();
            if b == b'`' {
                self.pos += 1;
                terminated = true;
                break;
            }
            if b == b'$' && self.peek_at(1) == b'{' {
                self.pos += 2;
                ends_with_substitution = true;
                terminated = true;
                break;
            }
            if b == b'\\' {
                self.scan_escape(&mut value);
            } else if b == b'\n' {
                self.pending_line_break = true;
                value.push('\n');
                self.pos += 1;
            } else if b < 0x80 {
                value.push(b as char);
                self.pos += 1;
            } else if let Some(ch) = self.char_at(self.pos) {
                value.push(ch);
                self.pos += ch.len_utf8();
            } else {
                self.pos += 1;
            }
        }
        let span = Span::new(start as u32, self.pos as u32);
        if !terminated {
            self.error(span, codes::UNTERMINATED_TEMPLATE, &[]);
        }
        let kind = match (resuming, ends_with_substitution) {
            (false, false) => SyntaxKind::NoSubstitutionTemplateLiteral,
            (false, true) => SyntaxKind::TemplateHead,
            (true, true) => SyntaxKind::TemplateMiddle,
            (true, false) => SyntaxKind::TemplateTail,
        };
        let mut token = Token::new(kind, span);
        token.value = TokenValue::String(value.into());
        token
    }

    fn scan_escape(&mut self, value: &mut String) {
        let escape_start = self.pos;
        self.pos += 1; // backslash
        let b = self.peek();
        match b {
            b'n' => {
                value.push('\n');
                self.pos += 1;
            }
            b't' => {
                value.push('\t');
                self.pos += 1;
            }
            b'r' => {
                value.push('\r');
                self.pos += 1;
            }
            b'b' => {
                value.push('\u{8}');
                self.pos += 1;
            }
            b'f' => {
                value.push('\u{c}');
                self.pos += 1;
            }
            b'v' => {
                value.push('\u{b}');
                self.pos += 1;
            }
            b'0' if !self.peek_at(1).is_ascii_digit() => {
                value.push('\0');
                self.pos += 1;
            }
            b'\n' => {
                // Line continuation contributes nothing.
                self.pending_line_break = true;
                self.pos += 1;
            }
            b'\r' => {
                self.pending_line_break = true;
                self.pos += 1;
                if self.peek() == b'\n' {
                    self.pos += 1;
                }
            }
            b'x' => {
                self.pos += 1;
                let hex = self.take_hex_digits(2);
                match hex {
                    Some(code) if code <= 0xff => {
                        value.push(code as u8 as char);
                    }
                    _ => self.invalid_escape(escape_start, value),
                }
            }
            b'u' => {
                self.pos += 1;
                if self.peek() == b'{' {
                    self.pos += 1;
                    let mut code: u32 = 0;
                    let mut any = false;
                    while self.peek().is_ascii_hexdigit() {
                        code = code.saturating_mul(16)
                            + u32::from((self.peek() as char).to_digit(16).unwrap_or(0));
                        any = true;
                        self.pos += 1;
                    }
                    if self.peek() == b'}' && any {
                        self.pos += 1;
                        match char::from_u32(code) {
                            Some(ch) => value.push(ch),
                            None => self.invalid_escape(escape_start, value),
                        }
                    } else {
                        self.invalid_escape(escape_start, value);
                    }
                } else {
                    match self.take_hex_digits(4).and_then(char::from_u32) {
                        Some(ch) => value.push(ch),
                        None => self.invalid_escape(escape_start, value),
                    }
                }
            }
            0 => {
                // EOF after backslash; the caller reports unterminated.
            }
            _ => {
                // Identity escape: \' \" \` \\ \$ and everything else.
                if b < 0x80 {
                    value.push(b as char);
                    self.pos += 1;
                } else if let Some(ch) = self.char_at(self.pos) {
                    value.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    fn take_hex_digits(&mut self, count: usize) -> Option<u32> {
        let mut code: u32 = 0;
        for _ in 0..count {
            let digit = (self.peek() as char).to_digit(16)?;
            code = code * 16 + digit;
            self.pos += 1;
        }
        Some(code)
    }

    fn invalid_escape(&mut self, escape_start: usize, value: &mut String) {
        self.error(
            Span::new(escape_start as u32, self.pos as u32),
            codes::INVALID_ESCAPE,
            &[],
        );
        value.push('\u{fffd}');
    }

    fn scan_regex(&mut self, start: usize) -> Token {
        self.pos += 1; // leading /
        let mut in_class = false;
        let mut terminated = false;
        while self.pos < self.bytes.len() {
            match self.peek() {
                b'\\' => {
                    self.pos += 2;
                }
                b'[' => {
                    in_class = true;
                    self.pos += 1;
                }
                b']' => {
                    in_class = false;
                    self.pos += 1;
                }
                b'/' if !in_class => {
                    self.pos += 1;
                    terminated = true;
                    break;
                }
                b'\n' => break,
                _ => self.pos += 1,
            }
        }
        if terminated {
            // Flags.
            while is_identifier_part(self.peek()) {
                self.pos += 1;
            }
        }
        let span = Span::new(start as u32, self.pos as u32);
        if !terminated {
            self.error(span, codes::UNTERMINATED_REGEX, &[]);
        }
        let mut token = Token::new(SyntaxKind::RegularExpressionLiteral, span);
        token.value = TokenValue::String(span.slice(self.source).into());
        token
    }

    fn scan_punctuation(&mut self, start: usize) -> Token {
        use SyntaxKind::*;
        let c = self.peek();
        let c1 = self.peek_at(1);
        let c2 = self.peek_at(2);
        let c3 = self.peek_at(3);
        let (len, kind) = match c {
            b'{' => (1, OpenBraceToken),
            b'}' => (1, CloseBraceToken),
            b'(' => (1, OpenParenToken),
            b')' => (1, CloseParenToken),
            b'[' => (1, OpenBracketToken),
            b']' => (1, CloseBracketToken),
            b';' => (1, SemicolonToken),
            b',' => (1, CommaToken),
            b'@' => (1, AtToken),
            b'~' => (1, TildeToken),
            b':' => (1, ColonToken),
            b'.' => {
                if c1 == b'.' && c2 == b'.' {
                    (3, DotDotDotToken)
                } else {
                    (1, DotToken)
                }
            }
            b'<' => match (c1, c2) {
                (b'<', b'=') => (3, LessThanLessThanEqualsToken),
                (b'<', _) => (2, LessThanLessThanToken),
                (b'=', _) => (2, LessThanEqualsToken),
                _ => (1, LessThanToken),
            },
            b'>' => match (c1, c2, c3) {
                (b'>', b'>', b'=') => (4, GreaterThanGreaterThanGreaterThanEqualsToken),
                (b'>', b'>', _) => (3, GreaterThanGreaterThanGreaterThanToken),
                (b'>', b'=', _) => (3, GreaterThanGreaterThanEqualsToken),
                (b'>', _, _) => (2, GreaterThanGreaterThanToken),
                (b'=', _, _) => (2, GreaterThanEqualsToken),
                _ => (1, GreaterThanToken),
            },
            b'=' => match (c1, c2) {
                (b'=', b'=') => (3, EqualsEqualsEqualsToken),
                (b'=', _) => (2, EqualsEqualsToken),
                (b'>', _) => (2, EqualsGreaterThanToken),
                _ => (1, EqualsToken),
            },
            b'!' => match (c1, c2) {
                (b'=', b'=') => (3, ExclamationEqualsEqualsToken),
                (b'=', _) => (2, ExclamationEqualsToken),
                _ => (1, ExclamationToken),
            },
            b'+' => match c1 {
                b'+' => (2, PlusPlusToken),
                b'=' => (2, PlusEqualsToken),
                _ => (1, PlusToken),
            },
            b'-' => match c1 {
                b'-' => (2, MinusMinusToken),
                b'=' => (2, MinusEqualsToken),
                _ => (1, MinusToken),
            },
            b'*' => match (c1, c2) {
                (b'*', b'=') => (3, AsteriskAsteriskEqualsToken),
                (b'*', _) => (2, AsteriskAsteriskToken),
                (b'=', _) => (2, AsteriskEqualsToken),
                _ => (1, AsteriskToken),
            },
            b'%' => match c1 {
                b'=' => (2, PercentEqualsToken),
                _ => (1, PercentToken),
            },
            b'&' => match (c1, c2) {
                (b'&', b'=') => (3, AmpersandAmpersandEqualsToken),
                (b'&', _) => (2, AmpersandAmpersandToken),
                (b'=', _) => (2, AmpersandEqualsToken),
                _ => (1, AmpersandToken),
            },
            b'|' => match (c1, c2) {
                (b'|', b'=') => (3, BarBarEqualsToken),
                (b'|', _) => (2, BarBarToken),
                (b'=', _) => (2, BarEqualsToken),
                _ => (1, BarToken),
            },
            b'^' => match c1 {
                b'=' => (2, CaretEqualsToken),
                _ => (1, CaretToken),
            },
            b'?' => match (c1, c2) {
                (b'?', b'=') => (3, QuestionQuestionEqualsToken),
                (b'?', _) => (2, QuestionQuestionToken),
                _ => (1, QuestionToken),
            },
            _ => {
                // Unexpected character: report, consume one char, move on.
                let ch = self.char_at(self.pos).unwrap_or('\u{fffd}');
                let len = ch.len_utf8();
                self.error(
                    Span::new(start as u32, (start + len) as u32),
                    codes::UNEXPECTED_CHARACTER,
                    &[&ch.to_string()],
                );
                (len, Unknown)
            }
        };
        self.punct(start, len, kind)
    }
}

fn is_identifier_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_identifier_part(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

#[cfg(test)]
#[path = "tests/scanner_tests.rs"]
mod tests;
