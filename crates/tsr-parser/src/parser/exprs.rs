//! Expression parsing: Pratt precedence, speculative arrow detection,
//! call/member chains, object and array literals, templates.

use tsr_common::diagnostics::codes;
use tsr_common::Span;
use tsr_scanner::{SyntaxKind, TokenValue};

use crate::ast::*;

use super::Parser;

/// Binding powers for binary operators; higher binds tighter.
fn binary_precedence(kind: SyntaxKind) -> Option<(u8, BinaryOp)> {
    use SyntaxKind::*;
    Some(match kind {
        EqualsEqualsToken => (7, BinaryOp::LooseEq),
        ExclamationEqualsToken => (7, BinaryOp::LooseNe),
        EqualsEqualsEqualsToken => (7, BinaryOp::StrictEq),
        ExclamationEqualsEqualsToken => (7, BinaryOp::StrictNe),
        LessThanToken => (8, BinaryOp::Lt),
        GreaterThanToken => (8, BinaryOp::Gt),
        LessThanEqualsToken => (8, BinaryOp::Le),
        GreaterThanEqualsToken => (8, BinaryOp::Ge),
        InKeyword => (8, BinaryOp::In),
        InstanceOfKeyword => (8, BinaryOp::InstanceOf),
        LessThanLessThanToken => (9, BinaryOp::Shl),
        GreaterThanGreaterThanToken => (9, BinaryOp::Shr),
        GreaterThanGreaterThanGreaterThanToken => (9, BinaryOp::UShr),
        PlusToken => (10, BinaryOp::Add),
        MinusToken => (10, BinaryOp::Sub),
        AsteriskToken => (11, BinaryOp::Mul),
        SlashToken => (11, BinaryOp::Div),
        PercentToken => (11, BinaryOp::Rem),
        AsteriskAsteriskToken => (12, BinaryOp::Exp),
        AmpersandToken => (6, BinaryOp::BitAnd),
        CaretToken => (5, BinaryOp::BitXor),
        BarToken => (4, BinaryOp::BitOr),
        _ => return None,
    })
}

fn assignment_op(kind: SyntaxKind) -> Option<AssignOp> {
    use SyntaxKind::*;
    Some(match kind {
        EqualsToken => AssignOp::Assign,
        PlusEqualsToken => AssignOp::Add,
        MinusEqualsToken => AssignOp::Sub,
        AsteriskEqualsToken => AssignOp::Mul,
        SlashEqualsToken => AssignOp::Div,
        PercentEqualsToken => AssignOp::Rem,
        AsteriskAsteriskEqualsToken => AssignOp::Exp,
        LessThanLessThanEqualsToken => AssignOp::Shl,
        GreaterThanGreaterThanEqualsToken => AssignOp::Shr,
        GreaterThanGreaterThanGreaterThanEqualsToken => AssignOp::UShr,
        AmpersandEqualsToken => AssignOp::BitAnd,
        BarEqualsToken => AssignOp::BitOr,
        CaretEqualsToken => AssignOp::BitXor,
        AmpersandAmpersandEqualsToken => AssignOp::And,
        BarBarEqualsToken => AssignOp::Or,
        QuestionQuestionEqualsToken => AssignOp::Nullish,
        _ => return None,
    })
}

impl<'a> Parser<'a> {
    /// Parse a full expression (assignment level).
    pub(crate) fn parse_expr(&mut self) -> ExprId {
        self.parse_assignment()
    }

    pub(crate) fn parse_assignment(&mut self) -> ExprId {
        if self.at(SyntaxKind::YieldKeyword) {
            return self.parse_yield();
        }

        if let Some(arrow) = self.try_parse_arrow() {
            return arrow;
        }

        let start = self.span();
        let left = self.parse_conditional();

        if let Some(op) = assignment_op(self.kind()) {
            self.validate_assignment_target(left);
            self.advance();
            let value = self.parse_assignment();
            let span = start.merge(self.module.arena.expr(value).span);
            return self.module.arena.alloc_expr(
                ExprKind::Assign {
                    op,
                    target: left,
                    value,
                },
                span,
            );
        }
        left
    }

    fn validate_assignment_target(&self, target: ExprId) {
        let expr = self.module.arena.expr(target);
        if !matches!(
            expr.kind,
            ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        ) {
            self.error_at(expr.span, codes::INVALID_ASSIGNMENT_TARGET, &[]);
        }
    }

    fn parse_yield(&mut self) -> ExprId {
        let start = self.span();
        self.advance();
        let delegate = self.eat(SyntaxKind::AsteriskToken);
        let has_arg = !self.current().preceded_by_line_break
            && !matches!(
                self.kind(),
                SyntaxKind::SemicolonToken
                    | SyntaxKind::CloseParenToken
                    | SyntaxKind::CloseBracketToken
                    | SyntaxKind::CloseBraceToken
                    | SyntaxKind::CommaToken
                    | SyntaxKind::ColonToken
                    | SyntaxKind::EndOfFileToken
            );
        let arg = if has_arg || delegate {
            Some(self.parse_assignment())
        } else {
            None
        };
        let span = match arg {
            Some(a) => start.merge(self.module.arena.expr(a).span),
            None => start,
        };
        self.module
            .arena
            .alloc_expr(ExprKind::Yield { arg, delegate }, span)
    }

    // =========================================================================
    // Arrow functions (speculative)
    // =========================================================================

    /// Attempt an arrow function at the current position; `None` rewinds
    /// with no effect (modulo unreachable arena garbage).
    fn try_parse_arrow(&mut self) -> Option<ExprId> {
        use SyntaxKind::*;
        let next_no_break = self
            .tokens
            .get(self.pos + 1)
            .is_some_and(|t| !t.preceded_by_line_break);
        let is_async = self.at(AsyncKeyword)
            && next_no_break
            && (self.peek_kind(1) == OpenParenToken
                || (self.peek_kind(1).is_identifier_like()
                    && self.peek_kind(2) == EqualsGreaterThanToken));

        // Cheap single-parameter form: `x => ...`.
        if !is_async
            && self.kind().is_identifier_like()
            && self.peek_kind(1) == EqualsGreaterThanToken
        {
            let start = self.span();
            let name = self.expect_identifier();
            self.advance(); // =>
            let param = Param {
                name,
                ty: None,
                optional: false,
                default: None,
                rest: false,
                modifiers: Modifiers::empty(),
                span: start,
            };
            return Some(self.finish_arrow(start, vec![param], None, false));
        }

        if !(self.at(OpenParenToken) || (is_async && self.peek_kind(1) == OpenParenToken)) {
            if is_async {
                // `async x => ...`
                let start = self.span();
                self.advance(); // async
                let name = self.expect_identifier();
                self.expect(EqualsGreaterThanToken);
                let param = Param {
                    name,
                    ty: None,
                    optional: false,
                    default: None,
                    rest: false,
                    modifiers: Modifiers::empty(),
                    span: start,
                };
                return Some(self.finish_arrow(start, vec![param], None, true));
            }
            return None;
        }

        let checkpoint = self.checkpoint();
        let start = self.span();
        if is_async {
            self.advance();
        }
        match self.try_parse_arrow_head() {
            Some((params, return_type)) => {
                Some(self.finish_arrow(start, params, return_type, is_async))
            }
            None => {
                self.rewind(checkpoint);
                None
            }
        }
    }

    /// Parse `( params ) : Ret =>` without reporting diagnostics; any
    /// mismatch aborts the attempt.
    fn try_parse_arrow_head(&mut self) -> Option<(Vec<Param>, Option<TypeNodeId>)> {
        use SyntaxKind::*;
        if !self.eat(OpenParenToken) {
            return None;
        }
        let mut params = Vec::new();
        while !self.at(CloseParenToken) && !self.at_eof() {
            let param_start = self.span();
            let mut modifiers = Modifiers::empty();
            let rest = self.eat(DotDotDotToken);
            if !self.kind().is_identifier_like() {
                return None;
            }
            let name = self.expect_identifier();
            let optional = self.eat(QuestionToken);
            let ty = if self.eat(ColonToken) {
                Some(self.parse_type())
            } else {
                None
            };
            let default = if self.eat(EqualsToken) {
                Some(self.parse_assignment())
            } else {
                None
            };
            if rest {
                modifiers = Modifiers::empty();
            }
            params.push(Param {
                name,
                ty,
                optional,
                default,
                rest,
                modifiers,
                span: param_start,
            });
            if !self.eat(CommaToken) {
                break;
            }
        }
        if !self.eat(CloseParenToken) {
            return None;
        }
        let return_type = if self.eat(ColonToken) {
            Some(self.parse_type())
        } else {
            None
        };
        if !self.eat(EqualsGreaterThanToken) {
            return None;
        }
        Some((params, return_type))
    }

    fn finish_arrow(
        &mut self,
        start: Span,
        params: Vec<Param>,
        return_type: Option<TypeNodeId>,
        is_async: bool,
    ) -> ExprId {
        let (body, end) = if self.at(SyntaxKind::OpenBraceToken) {
            let stmts = self.parse_block_statements();
            (FuncBody::Block(stmts), self.prev_span())
        } else {
            let expr = self.parse_assignment();
            (FuncBody::Expr(expr), self.module.arena.expr(expr).span)
        };
        let span = start.merge(end);
        let func = self.module.arena.alloc_func(Function {
            name: None,
            type_params: Vec::new(),
            params,
            return_type,
            body: Some(body),
            is_async,
            is_generator: false,
            is_arrow: true,
            span,
        });
        self.module.arena.alloc_expr(ExprKind::Arrow(func), span)
    }

    // =========================================================================
    // Conditional / binary / unary
    // =========================================================================

    fn parse_conditional(&mut self) -> ExprId {
        let cond = self.parse_nullish();
        if self.eat(SyntaxKind::QuestionToken) {
            let when_true = self.parse_assignment();
            self.expect(SyntaxKind::ColonToken);
            let when_false = self.parse_assignment();
            let span = self
                .module
                .arena
                .expr(cond)
                .span
                .merge(self.module.arena.expr(when_false).span);
            return self.module.arena.alloc_expr(
                ExprKind::Conditional {
                    cond,
                    when_true,
                    when_false,
                },
                span,
            );
        }
        cond
    }

    fn parse_nullish(&mut self) -> ExprId {
        let mut left = self.parse_logical_or();
        while self.at(SyntaxKind::QuestionQuestionToken) {
            self.advance();
            let right = self.parse_logical_or();
            left = self.alloc_logical(LogicalOp::Nullish, left, right);
        }
        left
    }

    fn parse_logical_or(&mut self) -> ExprId {
        let mut left = self.parse_logical_and();
        while self.at(SyntaxKind::BarBarToken) {
            self.advance();
            let right = self.parse_logical_and();
            left = self.alloc_logical(LogicalOp::Or, left, right);
        }
        left
    }

    fn parse_logical_and(&mut self) -> ExprId {
        let mut left = self.parse_binary(4);
        while self.at(SyntaxKind::AmpersandAmpersandToken) {
            self.advance();
            let right = self.parse_binary(4);
            left = self.alloc_logical(LogicalOp::And, left, right);
        }
        left
    }

    fn alloc_logical(&mut self, op: LogicalOp, left: ExprId, right: ExprId) -> ExprId {
        let span = self
            .module
            .arena
            .expr(left)
            .span
            .merge(self.module.arena.expr(right).span);
        self.module
            .arena
            .alloc_expr(ExprKind::Logical { op, left, right }, span)
    }

    fn parse_binary(&mut self, min_prec: u8) -> ExprId {
        let mut left = self.parse_unary();
        loop {
            // `as` assertions bind at relational precedence.
            if self.at(SyntaxKind::AsKeyword) && !self.current().preceded_by_line_break {
                self.advance();
                let ty = self.parse_type();
                let span = self
                    .module
                    .arena
                    .expr(left)
                    .span
                    .merge(self.module.arena.type_node(ty).span);
                left = self
                    .module
                    .arena
                    .alloc_expr(ExprKind::Assertion { expr: left, ty }, span);
                continue;
            }
            let Some((prec, op)) = binary_precedence(self.kind()) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            // `**` is right-associative; everything else left.
            let right = if op == BinaryOp::Exp {
                self.parse_binary(prec)
            } else {
                self.parse_binary(prec + 1)
            };
            let span = self
                .module
                .arena
                .expr(left)
                .span
                .merge(self.module.arena.expr(right).span);
            left = self
                .module
                .arena
                .alloc_expr(ExprKind::Binary { op, left, right }, span);
        }
        left
    }

    fn parse_unary(&mut self) -> ExprId {
        use SyntaxKind::*;
        let start = self.span();
        let op = match self.kind() {
            PlusToken => Some(UnaryOp::Plus),
            MinusToken => Some(UnaryOp::Minus),
            ExclamationToken => Some(UnaryOp::Not),
            TildeToken => Some(UnaryOp::BitNot),
            TypeOfKeyword => Some(UnaryOp::Typeof),
            VoidKeyword => Some(UnaryOp::Void),
            DeleteKeyword => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary();
            let span = start.merge(self.module.arena.expr(operand).span);
            return self
                .module
                .arena
                .alloc_expr(ExprKind::Unary { op, operand }, span);
        }

        if self.at(AwaitKeyword) {
            self.advance();
            let operand = self.parse_unary();
            let span = start.merge(self.module.arena.expr(operand).span);
            return self.module.arena.alloc_expr(ExprKind::Await(operand), span);
        }

        if self.at(PlusPlusToken) || self.at(MinusMinusToken) {
            let op = if self.at(PlusPlusToken) {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            self.advance();
            let target = self.parse_unary();
            self.validate_assignment_target(target);
            let span = start.merge(self.module.arena.expr(target).span);
            return self.module.arena.alloc_expr(
                ExprKind::Update {
                    op,
                    prefix: true,
                    target,
                },
                span,
            );
        }

        // `<T>expr` type assertion.
        if self.at(LessThanToken) {
            self.advance();
            let ty = self.parse_type();
            self.expect_type_list_end();
            let expr = self.parse_unary();
            let span = start.merge(self.module.arena.expr(expr).span);
            return self
                .module
                .arena
                .alloc_expr(ExprKind::Assertion { expr, ty }, span);
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ExprId {
        let mut expr = self.parse_call_chain();

        if (self.at(SyntaxKind::PlusPlusToken) || self.at(SyntaxKind::MinusMinusToken))
            && !self.current().preceded_by_line_break
        {
            let op = if self.at(SyntaxKind::PlusPlusToken) {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            self.validate_assignment_target(expr);
            let span = self.module.arena.expr(expr).span.merge(self.span());
            self.advance();
            expr = self.module.arena.alloc_expr(
                ExprKind::Update {
                    op,
                    prefix: false,
                    target: expr,
                },
                span,
            );
        }
        expr
    }

    fn parse_call_chain(&mut self) -> ExprId {
        let mut expr = self.parse_primary();
        loop {
            match self.kind() {
                SyntaxKind::DotToken => {
                    self.advance();
                    let property = self.expect_identifier();
                    let span = self.module.arena.expr(expr).span.merge(self.span());
                    expr = self.module.arena.alloc_expr(
                        ExprKind::Member {
                            object: expr,
                            property,
                        },
                        span,
                    );
                }
                SyntaxKind::OpenBracketToken => {
                    self.advance();
                    let index = self.parse_expr();
                    let end = self.expect(SyntaxKind::CloseBracketToken);
                    let span = self.module.arena.expr(expr).span.merge(end);
                    expr = self.module.arena.alloc_expr(
                        ExprKind::Index {
                            object: expr,
                            index,
                        },
                        span,
                    );
                }
                SyntaxKind::OpenParenToken => {
                    let args = self.parse_arguments();
                    let span = self.module.arena.expr(expr).span.merge(self.prev_span());
                    expr = self.module.arena.alloc_expr(
                        ExprKind::Call {
                            callee: expr,
                            type_args: Vec::new(),
                            args,
                        },
                        span,
                    );
                }
                SyntaxKind::LessThanToken => {
                    // Possibly `f<T>(...)`; speculative.
                    let checkpoint = self.checkpoint();
                    self.advance();
                    match self.try_parse_type_argument_list() {
                        Some(type_args) if self.at(SyntaxKind::OpenParenToken) => {
                            let args = self.parse_arguments();
                            let span =
                                self.module.arena.expr(expr).span.merge(self.prev_span());
                            expr = self.module.arena.alloc_expr(
                                ExprKind::Call {
                                    callee: expr,
                                    type_args,
                                    args,
                                },
                                span,
                            );
                        }
                        _ => {
                            self.rewind(checkpoint);
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
        expr
    }

    pub(crate) fn prev_span(&self) -> Span {
        if self.pos == 0 {
            self.span()
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    pub(crate) fn parse_arguments(&mut self) -> Vec<ExprId> {
        self.expect(SyntaxKind::OpenParenToken);
        let mut args = Vec::new();
        while !self.at(SyntaxKind::CloseParenToken) && !self.at_eof() {
            if self.at(SyntaxKind::DotDotDotToken) {
                let start = self.span();
                self.advance();
                let inner = self.parse_assignment();
                let span = start.merge(self.module.arena.expr(inner).span);
                args.push(self.module.arena.alloc_expr(ExprKind::Spread(inner), span));
            } else {
                args.push(self.parse_assignment());
            }
            if !self.eat(SyntaxKind::CommaToken) {
                break;
            }
        }
        self.expect(SyntaxKind::CloseParenToken);
        args
    }

    // =========================================================================
    // Primary expressions
    // =========================================================================

    fn parse_primary(&mut self) -> ExprId {
        use SyntaxKind::*;
        let start = self.span();
        match self.kind() {
            NumericLiteral => {
                let value = self.current().number_value().unwrap_or(f64::NAN);
                self.advance();
                self.module.arena.alloc_expr(ExprKind::NumberLit(value), start)
            }
            BigIntLiteral => {
                let digits: Box<str> = match &self.current().value {
                    TokenValue::BigInt(d) => d.clone(),
                    _ => "".into(),
                };
                self.advance();
                self.module.arena.alloc_expr(ExprKind::BigIntLit(digits), start)
            }
            StringLiteral => {
                let value: Box<str> = self.current().string_value().unwrap_or("").into();
                self.advance();
                self.module.arena.alloc_expr(ExprKind::StringLit(value), start)
            }
            NoSubstitutionTemplateLiteral | TemplateHead => self.parse_template(),
            TrueKeyword => {
                self.advance();
                self.module.arena.alloc_expr(ExprKind::BoolLit(true), start)
            }
            FalseKeyword => {
                self.advance();
                self.module.arena.alloc_expr(ExprKind::BoolLit(false), start)
            }
            NullKeyword => {
                self.advance();
                self.module.arena.alloc_expr(ExprKind::NullLit, start)
            }
            UndefinedKeyword => {
                self.advance();
                self.module.arena.alloc_expr(ExprKind::UndefinedLit, start)
            }
            ThisKeyword => {
                self.advance();
                self.module.arena.alloc_expr(ExprKind::This, start)
            }
            SuperKeyword => {
                self.advance();
                self.module.arena.alloc_expr(ExprKind::Super, start)
            }
            NewKeyword => self.parse_new(),
            FunctionKeyword => self.parse_function_expression(false),
            AsyncKeyword if self.peek_kind(1) == FunctionKeyword => {
                self.advance();
                self.parse_function_expression(true)
            }
            OpenParenToken => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(CloseParenToken);
                inner
            }
            OpenBracketToken => self.parse_array_literal(),
            OpenBraceToken => self.parse_object_literal(),
            RegularExpressionLiteral => {
                self.error_here(codes::UNEXPECTED_TOKEN, &["regular expression"]);
                self.advance();
                self.module.arena.alloc_expr(ExprKind::UndefinedLit, start)
            }
            kind if kind.is_identifier_like() => {
                let name = self.expect_identifier();
                self.module.arena.alloc_expr(ExprKind::Ident(name), start)
            }
            _ => {
                self.error_here(codes::EXPECTED_EXPRESSION, &[]);
                self.advance();
                self.module.arena.alloc_expr(ExprKind::UndefinedLit, start)
            }
        }
    }

    fn parse_template(&mut self) -> ExprId {
        let start = self.span();
        if self.at(SyntaxKind::NoSubstitutionTemplateLiteral) {
            let chunk: Box<str> = self.current().string_value().unwrap_or("").into();
            self.advance();
            return self.module.arena.alloc_expr(
                ExprKind::Template {
                    quasis: vec![chunk],
                    exprs: Vec::new(),
                },
                start,
            );
        }
        let mut quasis: Vec<Box<str>> =
            vec![self.current().string_value().unwrap_or("").into()];
        let mut exprs = Vec::new();
        self.advance(); // head
        loop {
            exprs.push(self.parse_expr());
            match self.kind() {
                SyntaxKind::TemplateMiddle => {
                    quasis.push(self.current().string_value().unwrap_or("").into());
                    self.advance();
                }
                SyntaxKind::TemplateTail => {
                    quasis.push(self.current().string_value().unwrap_or("").into());
                    let span = start.merge(self.span());
                    self.advance();
                    return self
                        .module
                        .arena
                        .alloc_expr(ExprKind::Template { quasis, exprs }, span);
                }
                _ => {
                    self.error_here(codes::UNTERMINATED_TEMPLATE, &[]);
                    let span = start.merge(self.span());
                    quasis.push("".into());
                    return self
                        .module
                        .arena
                        .alloc_expr(ExprKind::Template { quasis, exprs }, span);
                }
            }
        }
    }

    fn parse_new(&mut self) -> ExprId {
        let start = self.span();
        self.advance(); // new
        let callee = self.parse_member_chain_for_new();
        let mut type_args = Vec::new();
        if self.at(SyntaxKind::LessThanToken) {
            let checkpoint = self.checkpoint();
            self.advance();
            match self.try_parse_type_argument_list() {
                Some(args) if self.at(SyntaxKind::OpenParenToken) => type_args = args,
                _ => self.rewind(checkpoint),
            }
        }
        let args = if self.at(SyntaxKind::OpenParenToken) {
            self.parse_arguments()
        } else {
            Vec::new()
        };
        let span = start.merge(self.prev_span());
        self.module.arena.alloc_expr(
            ExprKind::New {
                callee,
                type_args,
                args,
            },
            span,
        )
    }

    /// Member chain without call consumption, so `new a.b.C()` targets
    /// `a.b.C` rather than calling it.
    fn parse_member_chain_for_new(&mut self) -> ExprId {
        let mut expr = self.parse_primary();
        while self.at(SyntaxKind::DotToken) {
            self.advance();
            let property = self.expect_identifier();
            let span = self.module.arena.expr(expr).span.merge(self.prev_span());
            expr = self.module.arena.alloc_expr(
                ExprKind::Member {
                    object: expr,
                    property,
                },
                span,
            );
        }
        expr
    }

    fn parse_function_expression(&mut self, is_async: bool) -> ExprId {
        let start = self.span();
        self.advance(); // function
        let is_generator = self.eat(SyntaxKind::AsteriskToken);
        let name = if self.kind().is_identifier_like() {
            Some(self.expect_identifier())
        } else {
            None
        };
        let func = self.parse_function_rest(name, is_async, is_generator, start);
        let span = self.module.arena.func(func).span;
        self.module.arena.alloc_expr(ExprKind::Function(func), span)
    }

    /// Shared tail for function declarations/expressions/methods: type
    /// parameters, parameter list, return type, and body.
    pub(crate) fn parse_function_rest(
        &mut self,
        name: Option<Box<str>>,
        is_async: bool,
        is_generator: bool,
        start: Span,
    ) -> FuncId {
        let type_params = self.parse_type_parameters();
        let params = self.parse_parameter_list();
        let return_type = if self.eat(SyntaxKind::ColonToken) {
            Some(self.parse_type_or_predicate())
        } else {
            None
        };
        let body = if self.at(SyntaxKind::OpenBraceToken) {
            Some(FuncBody::Block(self.parse_block_statements()))
        } else {
            self.expect_semicolon();
            None
        };
        let span = start.merge(self.prev_span());
        self.module.arena.alloc_func(Function {
            name,
            type_params,
            params,
            return_type,
            body,
            is_async,
            is_generator,
            is_arrow: false,
            span,
        })
    }

    /// Parse a parenthesized parameter list, including modifiers
    /// (parameter properties), optional markers, defaults, and rest.
    pub(crate) fn parse_parameter_list(&mut self) -> Vec<Param> {
        use SyntaxKind::*;
        self.expect(OpenParenToken);
        let mut params: Vec<Param> = Vec::new();
        let mut seen_rest = false;
        while !self.at(CloseParenToken) && !self.at_eof() {
            let start = self.span();
            let mut modifiers = Modifiers::empty();
            loop {
                match self.kind() {
                    PublicKeyword if self.peek_kind(1).is_identifier_like() => {
                        modifiers |= Modifiers::PUBLIC;
                        self.advance();
                    }
                    PrivateKeyword if self.peek_kind(1).is_identifier_like() => {
                        modifiers |= Modifiers::PRIVATE;
                        self.advance();
                    }
                    ProtectedKeyword if self.peek_kind(1).is_identifier_like() => {
                        modifiers |= Modifiers::PROTECTED;
                        self.advance();
                    }
                    ReadonlyKeyword if self.peek_kind(1).is_identifier_like() => {
                        modifiers |= Modifiers::READONLY;
                        self.advance();
                    }
                    _ => break,
                }
            }
            let rest = self.eat(DotDotDotToken);
            if seen_rest {
                self.error_here(codes::REST_PARAMETER_MUST_BE_LAST, &[]);
            }
            let name = self.expect_identifier();
            let optional = self.eat(QuestionToken);
            let ty = if self.eat(ColonToken) {
                Some(self.parse_type())
            } else {
                None
            };
            let default = if self.eat(EqualsToken) {
                Some(self.parse_assignment())
            } else {
                None
            };
            if optional && default.is_some() {
                self.error_at(start, codes::INVALID_OPTIONAL_PARAMETER_ORDER, &[]);
            }
            if rest {
                seen_rest = true;
            }
            params.push(Param {
                name,
                ty,
                optional,
                default,
                rest,
                modifiers,
                span: start.merge(self.prev_span()),
            });
            if !self.eat(CommaToken) {
                break;
            }
        }
        self.expect(CloseParenToken);
        params
    }

    fn parse_array_literal(&mut self) -> ExprId {
        let start = self.span();
        self.advance(); // [
        let mut elements = Vec::new();
        while !self.at(SyntaxKind::CloseBracketToken) && !self.at_eof() {
            if self.at(SyntaxKind::CommaToken) {
                // Elision: keep slot shape with an undefined literal.
                let span = self.span();
                elements.push(self.module.arena.alloc_expr(ExprKind::UndefinedLit, span));
                self.advance();
                continue;
            }
            if self.at(SyntaxKind::DotDotDotToken) {
                let spread_start = self.span();
                self.advance();
                let inner = self.parse_assignment();
                let span = spread_start.merge(self.module.arena.expr(inner).span);
                elements.push(self.module.arena.alloc_expr(ExprKind::Spread(inner), span));
            } else {
                elements.push(self.parse_assignment());
            }
            if !self.eat(SyntaxKind::CommaToken) {
                break;
            }
        }
        let end = self.expect(SyntaxKind::CloseBracketToken);
        self.module
            .arena
            .alloc_expr(ExprKind::ArrayLit { elements }, start.merge(end))
    }

    fn parse_object_literal(&mut self) -> ExprId {
        use SyntaxKind::*;
        let start = self.span();
        self.advance(); // {
        let mut props = Vec::new();
        while !self.at(CloseBraceToken) && !self.at_eof() {
            let prop_start = self.span();
            if self.at(DotDotDotToken) {
                self.advance();
                let inner = self.parse_assignment();
                props.push(ObjectProp {
                    key: PropKey::Ident("".into()),
                    kind: ObjectPropKind::Spread(inner),
                    span: prop_start.merge(self.prev_span()),
                });
            } else {
                props.push(self.parse_object_property(prop_start));
            }
            if !self.eat(CommaToken) {
                break;
            }
        }
        let end = self.expect(CloseBraceToken);
        self.module
            .arena
            .alloc_expr(ExprKind::ObjectLit { props }, start.merge(end))
    }

    fn parse_object_property(&mut self, start: Span) -> ObjectProp {
        use SyntaxKind::*;

        // Accessor or async/generator method prefixes.
        let is_get = self.at(GetKeyword) && self.object_key_follows(1);
        let is_set = self.at(SetKeyword) && self.object_key_follows(1);
        if is_get || is_set {
            self.advance();
            let key = self.parse_prop_key();
            let func = self.parse_method_tail(false, false, start);
            let kind = if is_get {
                ObjectPropKind::Getter(func)
            } else {
                ObjectPropKind::Setter(func)
            };
            return ObjectProp {
                key,
                kind,
                span: start.merge(self.prev_span()),
            };
        }

        let is_async = self.at(AsyncKeyword) && self.object_key_follows(1);
        if is_async {
            self.advance();
        }
        let is_generator = self.eat(AsteriskToken);

        let key = self.parse_prop_key();
        if self.at(OpenParenToken) || self.at(LessThanToken) {
            let func = self.parse_method_tail(is_async, is_generator, start);
            return ObjectProp {
                key,
                kind: ObjectPropKind::Method(func),
                span: start.merge(self.prev_span()),
            };
        }
        if self.eat(ColonToken) {
            let value = self.parse_assignment();
            return ObjectProp {
                key,
                kind: ObjectPropKind::KeyValue(value),
                span: start.merge(self.prev_span()),
            };
        }
        ObjectProp {
            key,
            kind: ObjectPropKind::Shorthand,
            span: start.merge(self.prev_span()),
        }
    }

    /// Whether the token at `offset` can follow a `get`/`set`/`async`
    /// prefix as a property key.
    fn object_key_follows(&self, offset: usize) -> bool {
        let kind = self.peek_kind(offset);
        kind.is_identifier_like()
            || matches!(
                kind,
                SyntaxKind::StringLiteral
                    | SyntaxKind::NumericLiteral
                    | SyntaxKind::OpenBracketToken
                    | SyntaxKind::AsteriskToken
            )
    }

    pub(crate) fn parse_prop_key(&mut self) -> PropKey {
        use SyntaxKind::*;
        match self.kind() {
            StringLiteral => {
                let s: Box<str> = self.current().string_value().unwrap_or("").into();
                self.advance();
                PropKey::String(s)
            }
            NumericLiteral => {
                let n = self.current().number_value().unwrap_or(f64::NAN);
                self.advance();
                PropKey::Number(n)
            }
            OpenBracketToken => {
                self.advance();
                let expr = self.parse_assignment();
                self.expect(CloseBracketToken);
                PropKey::Computed(expr)
            }
            _ => PropKey::Ident(self.expect_identifier()),
        }
    }

    /// Method body shared by object-literal and class methods: parameter
    /// list onward.
    pub(crate) fn parse_method_tail(
        &mut self,
        is_async: bool,
        is_generator: bool,
        start: Span,
    ) -> FuncId {
        self.parse_function_rest(None, is_async, is_generator, start)
    }
}
