//! Type annotation parsing.
//!
//! Handles union/intersection precedence, postfix `[]` and indexed
//! access, function types, type literals, mapped types, tuples, `keyof`,
//! literal types, and generic references. Closing `>` inside nested
//! argument lists is handled by peeling compound greater-than tokens one
//! `>` at a time.

use tsr_common::diagnostics::codes;
use tsr_scanner::SyntaxKind;

use crate::ast::*;

use super::Parser;

impl<'a> Parser<'a> {
    /// Parse a type (union level).
    pub(crate) fn parse_type(&mut self) -> TypeNodeId {
        // Leading `|` is tolerated: `type T = | A | B`.
        self.eat(SyntaxKind::BarToken);
        let start = self.span();
        let first = self.parse_intersection_type();
        if !self.at(SyntaxKind::BarToken) {
            return first;
        }
        let mut members = vec![first];
        while self.eat(SyntaxKind::BarToken) {
            members.push(self.parse_intersection_type());
        }
        let span = start.merge(self.prev_span());
        self.module
            .arena
            .alloc_type_node(TypeNodeKind::Union(members), span)
    }

    fn parse_intersection_type(&mut self) -> TypeNodeId {
        let start = self.span();
        let first = self.parse_postfix_type();
        if !self.at(SyntaxKind::AmpersandToken) {
            return first;
        }
        let mut members = vec![first];
        while self.eat(SyntaxKind::AmpersandToken) {
            members.push(self.parse_postfix_type());
        }
        let span = start.merge(self.prev_span());
        self.module
            .arena
            .alloc_type_node(TypeNodeKind::Intersection(members), span)
    }

    fn parse_postfix_type(&mut self) -> TypeNodeId {
        let start = self.span();
        let mut ty = self.parse_primary_type();
        while self.at(SyntaxKind::OpenBracketToken) && !self.current().preceded_by_line_break {
            self.advance();
            if self.eat(SyntaxKind::CloseBracketToken) {
                let span = start.merge(self.prev_span());
                ty = self.module.arena.alloc_type_node(TypeNodeKind::Array(ty), span);
            } else {
                let index = self.parse_type();
                self.expect(SyntaxKind::CloseBracketToken);
                let span = start.merge(self.prev_span());
                ty = self
                    .module
                    .arena
                    .alloc_type_node(TypeNodeKind::IndexedAccess { object: ty, index }, span);
            }
        }
        ty
    }

    fn parse_primary_type(&mut self) -> TypeNodeId {
        use SyntaxKind::*;
        let start = self.span();
        let keyword = match self.kind() {
            NumberKeyword => Some(crate::ast::TypeKeyword::Number),
            StringKeyword => Some(crate::ast::TypeKeyword::String),
            BooleanKeyword => Some(crate::ast::TypeKeyword::Boolean),
            AnyKeyword => Some(crate::ast::TypeKeyword::Any),
            UnknownKeyword => Some(crate::ast::TypeKeyword::Unknown),
            VoidKeyword => Some(crate::ast::TypeKeyword::Void),
            NeverKeyword => Some(crate::ast::TypeKeyword::Never),
            NullKeyword => Some(crate::ast::TypeKeyword::Null),
            UndefinedKeyword => Some(crate::ast::TypeKeyword::Undefined),
            SymbolKeyword => Some(crate::ast::TypeKeyword::Symbol),
            _ => None,
        };
        if let Some(keyword) = keyword {
            self.advance();
            return self
                .module
                .arena
                .alloc_type_node(TypeNodeKind::Keyword(keyword), start);
        }

        match self.kind() {
            StringLiteral => {
                let value: Box<str> = self.current().string_value().unwrap_or("").into();
                self.advance();
                self.module
                    .arena
                    .alloc_type_node(TypeNodeKind::Literal(TypeLit::String(value)), start)
            }
            NumericLiteral => {
                let value = self.current().number_value().unwrap_or(f64::NAN);
                self.advance();
                self.module
                    .arena
                    .alloc_type_node(TypeNodeKind::Literal(TypeLit::Number(value)), start)
            }
            MinusToken if self.peek_kind(1) == NumericLiteral => {
                self.advance();
                let value = self.current().number_value().unwrap_or(f64::NAN);
                self.advance();
                let span = start.merge(self.prev_span());
                self.module
                    .arena
                    .alloc_type_node(TypeNodeKind::Literal(TypeLit::Number(-value)), span)
            }
            TrueKeyword => {
                self.advance();
                self.module
                    .arena
                    .alloc_type_node(TypeNodeKind::Literal(TypeLit::Boolean(true)), start)
            }
            FalseKeyword => {
                self.advance();
                self.module
                    .arena
                    .alloc_type_node(TypeNodeKind::Literal(TypeLit::Boolean(false)), start)
            }
            KeyOfKeyword => {
                self.advance();
                let inner = self.parse_postfix_type();
                let span = start.merge(self.module.arena.type_node(inner).span);
                self.module
                    .arena
                    .alloc_type_node(TypeNodeKind::Keyof(inner), span)
            }
            OpenParenToken => self.parse_paren_or_function_type(),
            OpenBraceToken => self.parse_type_literal_or_mapped(),
            OpenBracketToken => self.parse_tuple_type(),
            kind if kind.is_identifier_like() => {
                let name = self.expect_identifier();
                let mut type_args = Vec::new();
                if self.eat(LessThanToken) {
                    type_args = self.parse_type_argument_list_rest();
                }
                let span = start.merge(self.prev_span());
                self.module
                    .arena
                    .alloc_type_node(TypeNodeKind::Ref { name, type_args }, span)
            }
            _ => {
                self.error_here(codes::EXPECTED_TOKEN, &["type"]);
                self.advance();
                self.module
                    .arena
                    .alloc_type_node(TypeNodeKind::Keyword(crate::ast::TypeKeyword::Any), start)
            }
        }
    }

    /// `(A) => B` or `(A | B)`. Speculative: try the function-type shape
    /// first, fall back to a parenthesized type.
    fn parse_paren_or_function_type(&mut self) -> TypeNodeId {
        let checkpoint = self.checkpoint();
        let start = self.span();
        if let Some(node) = self.try_parse_function_type(start) {
            return node;
        }
        self.rewind(checkpoint);
        self.advance(); // (
        let inner = self.parse_type();
        self.expect(SyntaxKind::CloseParenToken);
        inner
    }

    fn try_parse_function_type(&mut self, start: tsr_common::Span) -> Option<TypeNodeId> {
        use SyntaxKind::*;
        if !self.eat(OpenParenToken) {
            return None;
        }
        let mut params = Vec::new();
        while !self.at(CloseParenToken) && !self.at_eof() {
            let rest = self.eat(DotDotDotToken);
            if !self.kind().is_identifier_like() {
                return None;
            }
            let name = self.expect_identifier();
            let optional = self.eat(QuestionToken);
            let ty = if self.eat(ColonToken) {
                self.parse_type()
            } else {
                let span = self.span();
                self.module
                    .arena
                    .alloc_type_node(TypeNodeKind::Keyword(crate::ast::TypeKeyword::Any), span)
            };
            params.push(ParamTypeNode {
                name,
                ty,
                optional,
                rest,
            });
            if !self.eat(CommaToken) {
                break;
            }
        }
        if !self.eat(CloseParenToken) {
            return None;
        }
        if !self.eat(EqualsGreaterThanToken) {
            return None;
        }
        let return_ty = self.parse_type();
        let span = start.merge(self.prev_span());
        Some(self.module.arena.alloc_type_node(
            TypeNodeKind::Function {
                type_params: Vec::new(),
                params,
                return_ty,
            },
            span,
        ))
    }

    /// `{ a: T; [k: string]: U }` or `{ [K in C as R]?: V }`.
    fn parse_type_literal_or_mapped(&mut self) -> TypeNodeId {
        use SyntaxKind::*;
        let start = self.span();
        self.advance(); // {

        // Mapped type: `[` ident `in` ...
        if self.at(OpenBracketToken)
            && self.peek_kind(1).is_identifier_like()
            && self.peek_kind(2) == InKeyword
        {
            self.advance(); // [
            let param_name = self.expect_identifier();
            self.expect(InKeyword);
            let constraint = self.parse_type();
            let as_clause = if self.eat(AsKeyword) {
                Some(self.parse_type())
            } else {
                None
            };
            self.expect(CloseBracketToken);
            let optional = if self.eat(QuestionToken) {
                Some(MappedModifier::Add)
            } else if self.at(PlusToken) && self.peek_kind(1) == QuestionToken {
                self.advance();
                self.advance();
                Some(MappedModifier::Add)
            } else if self.at(MinusToken) && self.peek_kind(1) == QuestionToken {
                self.advance();
                self.advance();
                Some(MappedModifier::Remove)
            } else {
                None
            };
            self.expect(ColonToken);
            let value = self.parse_type();
            self.eat(SemicolonToken);
            let end = self.expect(CloseBraceToken);
            return self.module.arena.alloc_type_node(
                TypeNodeKind::Mapped {
                    param_name,
                    constraint,
                    as_clause,
                    value,
                    optional,
                },
                start.merge(end),
            );
        }

        let mut members = Vec::new();
        while !self.at(CloseBraceToken) && !self.at_eof() {
            members.push(self.parse_type_literal_member());
            // `;` or `,` separators, both optional before `}`.
            if !self.eat(SemicolonToken) {
                self.eat(CommaToken);
            }
        }
        let end = self.expect(CloseBraceToken);
        self.module
            .arena
            .alloc_type_node(TypeNodeKind::TypeLiteral(members), start.merge(end))
    }

    pub(crate) fn parse_type_literal_member(&mut self) -> TypeLiteralMember {
        use SyntaxKind::*;

        // Index signature: `[k: string]: T`.
        if self.at(OpenBracketToken)
            && self.peek_kind(1).is_identifier_like()
            && self.peek_kind(2) == ColonToken
        {
            self.advance();
            let param_name = self.expect_identifier();
            self.expect(ColonToken);
            let key_ty = self.parse_type();
            self.expect(CloseBracketToken);
            self.expect(ColonToken);
            let value_ty = self.parse_type();
            return TypeLiteralMember::IndexSignature {
                param_name,
                key_ty,
                value_ty,
            };
        }

        let readonly = self.at(ReadonlyKeyword)
            && (self.peek_kind(1).is_identifier_like()
                || self.peek_kind(1) == StringLiteral
                || self.peek_kind(1) == OpenBracketToken);
        if readonly {
            self.advance();
        }
        let name = match self.kind() {
            StringLiteral => {
                let s: Box<str> = self.current().string_value().unwrap_or("").into();
                self.advance();
                s
            }
            _ => self.expect_identifier(),
        };
        let optional = self.eat(QuestionToken);

        // Method shorthand: `m(a: T): R` is sugar for a function-typed
        // property.
        if self.at(OpenParenToken) || self.at(LessThanToken) {
            let start = self.span();
            let type_params = self.parse_type_parameters();
            let mut params = Vec::new();
            self.expect(OpenParenToken);
            while !self.at(CloseParenToken) && !self.at_eof() {
                let rest = self.eat(DotDotDotToken);
                let pname = self.expect_identifier();
                let poptional = self.eat(QuestionToken);
                let pty = if self.eat(ColonToken) {
                    self.parse_type()
                } else {
                    let span = self.span();
                    self.module
                        .arena
                        .alloc_type_node(TypeNodeKind::Keyword(crate::ast::TypeKeyword::Any), span)
                };
                params.push(ParamTypeNode {
                    name: pname,
                    ty: pty,
                    optional: poptional,
                    rest,
                });
                if !self.eat(CommaToken) {
                    break;
                }
            }
            self.expect(CloseParenToken);
            let return_ty = if self.eat(ColonToken) {
                self.parse_type_or_predicate()
            } else {
                let span = self.span();
                self.module
                    .arena
                    .alloc_type_node(TypeNodeKind::Keyword(crate::ast::TypeKeyword::Any), span)
            };
            let span = start.merge(self.prev_span());
            let ty = self.module.arena.alloc_type_node(
                TypeNodeKind::Function {
                    type_params,
                    params,
                    return_ty,
                },
                span,
            );
            return TypeLiteralMember::Property {
                name,
                ty,
                optional,
                readonly,
            };
        }

        self.expect(ColonToken);
        let ty = self.parse_type();
        TypeLiteralMember::Property {
            name,
            ty,
            optional,
            readonly,
        }
    }

    fn parse_tuple_type(&mut self) -> TypeNodeId {
        use SyntaxKind::*;
        let start = self.span();
        self.advance(); // [
        let mut elements = Vec::new();
        let mut rest = None;
        while !self.at(CloseBracketToken) && !self.at_eof() {
            if self.eat(DotDotDotToken) {
                let rest_ty = self.parse_type();
                if rest.is_some() || self.at(CommaToken) {
                    self.error_here(codes::UNEXPECTED_TOKEN, &["..."]);
                }
                rest = Some(rest_ty);
            } else {
                let ty = self.parse_type();
                let optional = self.eat(QuestionToken);
                elements.push(TupleElem { ty, optional });
            }
            if !self.eat(CommaToken) {
                break;
            }
        }
        let end = self.expect(CloseBracketToken);
        self.module
            .arena
            .alloc_type_node(TypeNodeKind::Tuple { elements, rest }, start.merge(end))
    }

    /// Return-type position: `x is T` or a plain type.
    pub(crate) fn parse_type_or_predicate(&mut self) -> TypeNodeId {
        if self.kind().is_identifier_like() && self.peek_kind(1) == SyntaxKind::IsKeyword {
            let start = self.span();
            let param_name = self.expect_identifier();
            self.advance(); // is
            let ty = self.parse_type();
            let span = start.merge(self.module.arena.type_node(ty).span);
            return self
                .module
                .arena
                .alloc_type_node(TypeNodeKind::Predicate { param_name, ty }, span);
        }
        self.parse_type()
    }

    // =========================================================================
    // Type parameters and arguments
    // =========================================================================

    /// Parse `<T extends C = D, ...>` when present.
    pub(crate) fn parse_type_parameters(&mut self) -> Vec<TypeParam> {
        use SyntaxKind::*;
        if !self.eat(LessThanToken) {
            return Vec::new();
        }
        let mut params = Vec::new();
        while !self.at_eof() {
            let start = self.span();
            let name = self.expect_identifier();
            let constraint = if self.eat(ExtendsKeyword) {
                Some(self.parse_type())
            } else {
                None
            };
            let default = if self.eat(EqualsToken) {
                Some(self.parse_type())
            } else {
                None
            };
            params.push(TypeParam {
                name,
                constraint,
                default,
                span: start.merge(self.prev_span()),
            });
            if self.eat(CommaToken) {
                continue;
            }
            self.expect_type_list_end();
            break;
        }
        params
    }

    /// Parse the rest of a type argument list after `<`, with errors.
    pub(crate) fn parse_type_argument_list_rest(&mut self) -> Vec<TypeNodeId> {
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type());
            if self.eat(SyntaxKind::CommaToken) {
                continue;
            }
            self.expect_type_list_end();
            return args;
        }
    }

    /// Speculative type argument list after `<`: silent failure.
    pub(crate) fn try_parse_type_argument_list(&mut self) -> Option<Vec<TypeNodeId>> {
        let mut args = Vec::new();
        loop {
            if !self.type_can_start() {
                return None;
            }
            args.push(self.parse_type());
            if self.eat(SyntaxKind::CommaToken) {
                continue;
            }
            if self.at(SyntaxKind::GreaterThanToken) {
                self.advance();
                return Some(args);
            }
            if self.split_current_greater() {
                return Some(args);
            }
            return None;
        }
    }

    fn type_can_start(&self) -> bool {
        use SyntaxKind::*;
        self.kind().is_identifier_like()
            || matches!(
                self.kind(),
                StringLiteral
                    | NumericLiteral
                    | TrueKeyword
                    | FalseKeyword
                    | NullKeyword
                    | OpenParenToken
                    | OpenBraceToken
                    | OpenBracketToken
                    | MinusToken
                    | VoidKeyword
                    | TypeOfKeyword
            )
    }

    /// Consume a closing `>`, peeling one `>` off compound tokens
    /// (`>>` / `>>>` / `>>=` / `>>>=`) when necessary.
    pub(crate) fn expect_type_list_end(&mut self) {
        if self.at(SyntaxKind::GreaterThanToken) {
            self.advance();
            return;
        }
        if self.split_current_greater() {
            return;
        }
        self.error_here(codes::EXPECTED_TOKEN, &[">"]);
    }
}
