//! Statement and declaration parsing.

use tsr_common::diagnostics::codes;
use tsr_common::Span;
use tsr_scanner::SyntaxKind;

use crate::ast::*;

use super::Parser;

impl<'a> Parser<'a> {
    /// Parse the whole module body.
    pub(crate) fn parse_program(&mut self) {
        while !self.at_eof() {
            let stmt = self.parse_statement();
            self.module.statements.push(stmt);
        }
    }

    /// Parse `{ ... }` and return the inner statement list.
    pub(crate) fn parse_block_statements(&mut self) -> Vec<StmtId> {
        self.expect(SyntaxKind::OpenBraceToken);
        let mut stmts = Vec::new();
        while !self.at(SyntaxKind::CloseBraceToken) && !self.at_eof() {
            stmts.push(self.parse_statement());
        }
        self.expect(SyntaxKind::CloseBraceToken);
        stmts
    }

    pub(crate) fn parse_statement(&mut self) -> StmtId {
        use SyntaxKind::*;
        let start = self.span();
        match self.kind() {
            SemicolonToken => {
                self.advance();
                self.module.arena.alloc_stmt(StmtKind::Empty, start)
            }
            OpenBraceToken => {
                let stmts = self.parse_block_statements();
                let span = start.merge(self.prev_span());
                self.module.arena.alloc_stmt(StmtKind::Block(stmts), span)
            }
            VarKeyword | LetKeyword | ConstKeyword => self.parse_var_statement(),
            IfKeyword => self.parse_if(),
            WhileKeyword => self.parse_while(),
            DoKeyword => self.parse_do_while(),
            ForKeyword => self.parse_for(),
            SwitchKeyword => self.parse_switch(),
            BreakKeyword | ContinueKeyword => self.parse_break_continue(),
            ReturnKeyword => self.parse_return(),
            ThrowKeyword => self.parse_throw(),
            TryKeyword => self.parse_try(),
            FunctionKeyword => self.parse_function_declaration(false),
            AsyncKeyword if self.peek_kind(1) == FunctionKeyword => {
                self.advance();
                self.parse_function_declaration(true)
            }
            AtToken => {
                let decorators = self.parse_decorators();
                self.parse_decorated_declaration(decorators, start)
            }
            AbstractKeyword if self.peek_kind(1) == ClassKeyword => {
                self.parse_class_declaration(Vec::new(), start)
            }
            ClassKeyword => self.parse_class_declaration(Vec::new(), start),
            InterfaceKeyword if self.peek_kind(1).is_identifier_like() => {
                self.parse_interface_declaration()
            }
            TypeKeyword if self.peek_kind(1).is_identifier_like() => self.parse_type_alias(),
            EnumKeyword if self.peek_kind(1).is_identifier_like() => self.parse_enum(),
            ImportKeyword => self.parse_import(),
            ExportKeyword => self.parse_export(),
            kind if kind.is_identifier_like() && self.peek_kind(1) == ColonToken => {
                // Labeled statement.
                let label = self.expect_identifier();
                self.advance(); // :
                let body = self.parse_statement();
                let span = start.merge(self.module.arena.stmt(body).span);
                self.module
                    .arena
                    .alloc_stmt(StmtKind::Labeled { label, body }, span)
            }
            _ => {
                let before = self.pos;
                let expr = self.parse_expr();
                self.expect_semicolon();
                if self.pos == before {
                    // parse_expr consumed nothing; force progress.
                    self.recover_to_statement_boundary();
                }
                let span = start.merge(self.prev_span());
                self.module.arena.alloc_stmt(StmtKind::Expr(expr), span)
            }
        }
    }

    // =========================================================================
    // Simple statements
    // =========================================================================

    fn parse_var_statement(&mut self) -> StmtId {
        let start = self.span();
        let kind = self.parse_var_kind();
        let declarations = self.parse_var_declarators();
        self.expect_semicolon();
        let span = start.merge(self.prev_span());
        self.module
            .arena
            .alloc_stmt(StmtKind::VarDecl { kind, declarations }, span)
    }

    fn parse_var_kind(&mut self) -> VarKind {
        let kind = match self.kind() {
            SyntaxKind::VarKeyword => VarKind::Var,
            SyntaxKind::ConstKeyword => VarKind::Const,
            _ => VarKind::Let,
        };
        self.advance();
        kind
    }

    fn parse_var_declarators(&mut self) -> Vec<VarDeclarator> {
        let mut declarations = Vec::new();
        loop {
            let start = self.span();
            let name = self.expect_identifier();
            let ty = if self.eat(SyntaxKind::ColonToken) {
                Some(self.parse_type())
            } else {
                None
            };
            let init = if self.eat(SyntaxKind::EqualsToken) {
                Some(self.parse_assignment())
            } else {
                None
            };
            declarations.push(VarDeclarator {
                name,
                ty,
                init,
                span: start.merge(self.prev_span()),
            });
            if !self.eat(SyntaxKind::CommaToken) {
                break;
            }
        }
        declarations
    }

    fn parse_if(&mut self) -> StmtId {
        let start = self.span();
        self.advance();
        self.expect(SyntaxKind::OpenParenToken);
        let cond = self.parse_expr();
        self.expect(SyntaxKind::CloseParenToken);
        let then_branch = self.parse_statement();
        let else_branch = if self.eat(SyntaxKind::ElseKeyword) {
            Some(self.parse_statement())
        } else {
            None
        };
        let span = start.merge(self.prev_span());
        self.module.arena.alloc_stmt(
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
            span,
        )
    }

    fn parse_while(&mut self) -> StmtId {
        let start = self.span();
        self.advance();
        self.expect(SyntaxKind::OpenParenToken);
        let cond = self.parse_expr();
        self.expect(SyntaxKind::CloseParenToken);
        let body = self.parse_statement();
        let span = start.merge(self.module.arena.stmt(body).span);
        self.module.arena.alloc_stmt(StmtKind::While { cond, body }, span)
    }

    fn parse_do_while(&mut self) -> StmtId {
        let start = self.span();
        self.advance();
        let body = self.parse_statement();
        self.expect(SyntaxKind::WhileKeyword);
        self.expect(SyntaxKind::OpenParenToken);
        let cond = self.parse_expr();
        self.expect(SyntaxKind::CloseParenToken);
        self.expect_semicolon();
        let span = start.merge(self.prev_span());
        self.module
            .arena
            .alloc_stmt(StmtKind::DoWhile { body, cond }, span)
    }

    fn parse_for(&mut self) -> StmtId {
        use SyntaxKind::*;
        let start = self.span();
        self.advance(); // for
        let is_await = self.eat(AwaitKeyword);
        self.expect(OpenParenToken);

        // Declaration head?
        if matches!(self.kind(), VarKeyword | LetKeyword | ConstKeyword) {
            let head_start = self.span();
            let var_kind = self.parse_var_kind();
            let name = self.expect_identifier();

            if self.at(InKeyword) || self.at(OfKeyword) {
                let of = self.at(OfKeyword);
                self.advance();
                let head = ForHead {
                    var_kind: Some(var_kind),
                    name,
                    span: head_start.merge(self.prev_span()),
                };
                return self.finish_for_in_of(start, head, of, is_await);
            }

            // C-style with declarations; rewind-free: we already consumed
            // `kind name`, continue the declarator in place.
            let ty = if self.eat(ColonToken) {
                Some(self.parse_type())
            } else {
                None
            };
            let init_expr = if self.eat(EqualsToken) {
                Some(self.parse_assignment())
            } else {
                None
            };
            let mut declarations = vec![VarDeclarator {
                name,
                ty,
                init: init_expr,
                span: head_start.merge(self.prev_span()),
            }];
            if self.eat(CommaToken) {
                declarations.extend(self.parse_var_declarators());
            }
            let init_span = head_start.merge(self.prev_span());
            let init = self.module.arena.alloc_stmt(
                StmtKind::VarDecl {
                    kind: var_kind,
                    declarations,
                },
                init_span,
            );
            return self.finish_c_style_for(start, Some(init));
        }

        if self.at(SemicolonToken) {
            return self.finish_c_style_for(start, None);
        }

        // Expression head: either `expr in/of iterable` or C-style.
        let head_start = self.span();
        let expr = self.parse_expr();
        if self.at(InKeyword) || self.at(OfKeyword) {
            let of = self.at(OfKeyword);
            self.advance();
            let name = match &self.module.arena.expr(expr).kind {
                ExprKind::Ident(name) => name.clone(),
                _ => {
                    self.error_at(
                        self.module.arena.expr(expr).span,
                        codes::INVALID_ASSIGNMENT_TARGET,
                        &[],
                    );
                    "".into()
                }
            };
            let head = ForHead {
                var_kind: None,
                name,
                span: head_start.merge(self.prev_span()),
            };
            return self.finish_for_in_of(start, head, of, is_await);
        }
        let init_span = self.module.arena.expr(expr).span;
        let init = self.module.arena.alloc_stmt(StmtKind::Expr(expr), init_span);
        self.finish_c_style_for(start, Some(init))
    }

    fn finish_for_in_of(
        &mut self,
        start: Span,
        head: ForHead,
        of: bool,
        is_await: bool,
    ) -> StmtId {
        let rhs = self.parse_expr();
        self.expect(SyntaxKind::CloseParenToken);
        let body = self.parse_statement();
        let span = start.merge(self.module.arena.stmt(body).span);
        let kind = if of {
            StmtKind::ForOf {
                head,
                iterable: rhs,
                body,
                is_await,
            }
        } else {
            StmtKind::ForIn {
                head,
                object: rhs,
                body,
            }
        };
        self.module.arena.alloc_stmt(kind, span)
    }

    fn finish_c_style_for(&mut self, start: Span, init: Option<StmtId>) -> StmtId {
        self.expect(SyntaxKind::SemicolonToken);
        let test = if self.at(SyntaxKind::SemicolonToken) {
            None
        } else {
            Some(self.parse_expr())
        };
        self.expect(SyntaxKind::SemicolonToken);
        let update = if self.at(SyntaxKind::CloseParenToken) {
            None
        } else {
            Some(self.parse_expr())
        };
        self.expect(SyntaxKind::CloseParenToken);
        let body = self.parse_statement();
        let span = start.merge(self.module.arena.stmt(body).span);
        self.module.arena.alloc_stmt(
            StmtKind::For {
                init,
                test,
                update,
                body,
            },
            span,
        )
    }

    fn parse_switch(&mut self) -> StmtId {
        use SyntaxKind::*;
        let start = self.span();
        self.advance();
        self.expect(OpenParenToken);
        let discriminant = self.parse_expr();
        self.expect(CloseParenToken);
        self.expect(OpenBraceToken);
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.at(CloseBraceToken) && !self.at_eof() {
            let case_start = self.span();
            let test = if self.eat(CaseKeyword) {
                let test = self.parse_expr();
                Some(test)
            } else {
                self.expect(DefaultKeyword);
                if seen_default {
                    self.error_at(case_start, codes::MULTIPLE_DEFAULT_CLAUSES, &[]);
                }
                seen_default = true;
                None
            };
            self.expect(ColonToken);
            let mut body = Vec::new();
            while !matches!(self.kind(), CaseKeyword | DefaultKeyword | CloseBraceToken)
                && !self.at_eof()
            {
                body.push(self.parse_statement());
            }
            cases.push(SwitchCase {
                test,
                body,
                span: case_start.merge(self.prev_span()),
            });
        }
        let end = self.expect(CloseBraceToken);
        self.module.arena.alloc_stmt(
            StmtKind::Switch {
                discriminant,
                cases,
            },
            start.merge(end),
        )
    }

    fn parse_break_continue(&mut self) -> StmtId {
        let start = self.span();
        let is_break = self.at(SyntaxKind::BreakKeyword);
        self.advance();
        let label = if self.kind().is_identifier_like() && !self.current().preceded_by_line_break
        {
            Some(self.expect_identifier())
        } else {
            None
        };
        self.expect_semicolon();
        let span = start.merge(self.prev_span());
        let kind = if is_break {
            StmtKind::Break(label)
        } else {
            StmtKind::Continue(label)
        };
        self.module.arena.alloc_stmt(kind, span)
    }

    fn parse_return(&mut self) -> StmtId {
        let start = self.span();
        self.advance();
        // Restricted production: a line break ends the statement.
        let arg = if self.at(SyntaxKind::SemicolonToken)
            || self.at(SyntaxKind::CloseBraceToken)
            || self.at_eof()
            || self.current().preceded_by_line_break
        {
            None
        } else {
            Some(self.parse_expr())
        };
        self.expect_semicolon();
        let span = start.merge(self.prev_span());
        self.module.arena.alloc_stmt(StmtKind::Return(arg), span)
    }

    fn parse_throw(&mut self) -> StmtId {
        let start = self.span();
        self.advance();
        let arg = self.parse_expr();
        self.expect_semicolon();
        let span = start.merge(self.prev_span());
        self.module.arena.alloc_stmt(StmtKind::Throw(arg), span)
    }

    fn parse_try(&mut self) -> StmtId {
        use SyntaxKind::*;
        let start = self.span();
        self.advance();
        let block = self.parse_block_statements();
        let catch = if self.at(CatchKeyword) {
            let catch_start = self.span();
            self.advance();
            let (param, param_ty) = if self.eat(OpenParenToken) {
                let name = self.expect_identifier();
                let ty = if self.eat(ColonToken) {
                    Some(self.parse_type())
                } else {
                    None
                };
                self.expect(CloseParenToken);
                (Some(name), ty)
            } else {
                (None, None)
            };
            let body = self.parse_block_statements();
            Some(CatchClause {
                param,
                param_ty,
                body,
                span: catch_start.merge(self.prev_span()),
            })
        } else {
            None
        };
        let finally = if self.eat(FinallyKeyword) {
            Some(self.parse_block_statements())
        } else {
            None
        };
        if catch.is_none() && finally.is_none() {
            self.error_here(codes::EXPECTED_TOKEN, &["catch"]);
        }
        let span = start.merge(self.prev_span());
        self.module.arena.alloc_stmt(
            StmtKind::Try {
                block,
                catch,
                finally,
            },
            span,
        )
    }

    fn parse_function_declaration(&mut self, is_async: bool) -> StmtId {
        let start = self.span();
        self.advance(); // function
        let is_generator = self.eat(SyntaxKind::AsteriskToken);
        let name = self.expect_identifier();
        let func =
            self.parse_function_rest(Some(name.clone()), is_async, is_generator, start);
        let span = self.module.arena.func(func).span;
        self.module
            .arena
            .alloc_stmt(StmtKind::FunctionDecl { name, func }, span)
    }

    // =========================================================================
    // Decorators
    // =========================================================================

    /// Parse a run of `@expr` decorators.
    pub(crate) fn parse_decorators(&mut self) -> Vec<ExprId> {
        let mut decorators = Vec::new();
        while self.eat(SyntaxKind::AtToken) {
            // A decorator is an expression: identifier, member chain, or
            // call.
            decorators.push(self.parse_decorator_expression());
        }
        decorators
    }

    fn parse_decorator_expression(&mut self) -> ExprId {
        let start = self.span();
        let name = self.expect_identifier();
        let mut expr = self.module.arena.alloc_expr(ExprKind::Ident(name), start);
        loop {
            match self.kind() {
                SyntaxKind::DotToken => {
                    self.advance();
                    let property = self.expect_identifier();
                    let span = start.merge(self.prev_span());
                    expr = self.module.arena.alloc_expr(
                        ExprKind::Member {
                            object: expr,
                            property,
                        },
                        span,
                    );
                }
                SyntaxKind::OpenParenToken => {
                    let args = self.parse_arguments();
                    let span = start.merge(self.prev_span());
                    expr = self.module.arena.alloc_expr(
                        ExprKind::Call {
                            callee: expr,
                            type_args: Vec::new(),
                            args,
                        },
                        span,
                    );
                    break;
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_decorated_declaration(&mut self, decorators: Vec<ExprId>, start: Span) -> StmtId {
        use SyntaxKind::*;
        match self.kind() {
            ClassKeyword | AbstractKeyword => self.parse_class_declaration(decorators, start),
            ExportKeyword => {
                self.advance();
                let inner = self.parse_class_declaration(decorators, start);
                let span = start.merge(self.module.arena.stmt(inner).span);
                self.module.arena.alloc_stmt(StmtKind::ExportDecl(inner), span)
            }
            _ => {
                self.error_here(codes::DECORATOR_NOT_ALLOWED_HERE, &[]);
                self.parse_statement()
            }
        }
    }

    // =========================================================================
    // Classes
    // =========================================================================

    pub(crate) fn parse_class_declaration(
        &mut self,
        decorators: Vec<ExprId>,
        start: Span,
    ) -> StmtId {
        use SyntaxKind::*;
        let is_abstract = self.eat(AbstractKeyword);
        self.expect(ClassKeyword);
        let name = self.expect_identifier();
        let type_params = self.parse_type_parameters();

        let mut superclass = None;
        let mut super_type_args = Vec::new();
        if self.eat(ExtendsKeyword) {
            let sc_start = self.span();
            let sc_name = self.expect_identifier();
            let mut expr = self
                .module
                .arena
                .alloc_expr(ExprKind::Ident(sc_name), sc_start);
            while self.eat(DotToken) {
                let property = self.expect_identifier();
                let span = sc_start.merge(self.prev_span());
                expr = self.module.arena.alloc_expr(
                    ExprKind::Member {
                        object: expr,
                        property,
                    },
                    span,
                );
            }
            if self.eat(LessThanToken) {
                super_type_args = self.parse_type_argument_list_rest();
            }
            superclass = Some(expr);
        }

        let mut implements = Vec::new();
        if self.eat(ImplementsKeyword) {
            loop {
                implements.push(self.parse_type());
                if !self.eat(CommaToken) {
                    break;
                }
            }
        }

        self.expect(OpenBraceToken);
        let mut members = Vec::new();
        while !self.at(CloseBraceToken) && !self.at_eof() {
            if self.eat(SemicolonToken) {
                continue;
            }
            members.push(self.parse_class_member());
        }
        let end = self.expect(CloseBraceToken);
        let span = start.merge(end);

        let class_id = self.module.arena.alloc_class(Class {
            name,
            type_params,
            superclass,
            super_type_args,
            implements,
            members,
            is_abstract,
            decorators,
            span,
        });
        self.module.arena.alloc_stmt(StmtKind::ClassDecl(class_id), span)
    }

    fn parse_class_member(&mut self) -> ClassMember {
        use SyntaxKind::*;
        let start = self.span();

        // Legacy-position decorators come before modifiers.
        let mut decorators = self.parse_decorators();
        let modifiers = self.parse_member_modifiers();
        // Proposal-position decorators sit between modifiers and the name.
        if self.at(AtToken) {
            decorators.extend(self.parse_decorators());
        }

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
            self.expect_semicolon();
            return ClassMember {
                kind: ClassMemberKind::IndexSignature {
                    param_name,
                    key_ty,
                    value_ty,
                },
                modifiers,
                decorators,
                span: start.merge(self.prev_span()),
            };
        }

        // Accessors.
        let is_get = self.at(GetKeyword) && self.object_key_follows_class(1);
        let is_set = self.at(SetKeyword) && self.object_key_follows_class(1);
        if is_get || is_set {
            self.advance();
            let key = self.parse_prop_key();
            let func = self.parse_method_tail(false, false, start);
            let kind = if is_get {
                MethodKind::Getter
            } else {
                MethodKind::Setter
            };
            return ClassMember {
                kind: ClassMemberKind::Method { key, kind, func },
                modifiers,
                decorators,
                span: start.merge(self.prev_span()),
            };
        }

        let is_async = self.at(AsyncKeyword) && self.object_key_follows_class(1);
        let mut modifiers = modifiers;
        if is_async {
            modifiers |= Modifiers::ASYNC;
            self.advance();
        }
        let is_generator = self.eat(AsteriskToken);

        let key = self.parse_prop_key();
        let optional_marker = self.eat(QuestionToken);
        let _ = optional_marker;

        if self.at(OpenParenToken) || self.at(LessThanToken) {
            let is_ctor = matches!(&key, PropKey::Ident(name) if &**name == "constructor");
            let func = self.parse_method_tail(is_async, is_generator, start);
            let kind = if is_ctor {
                MethodKind::Constructor
            } else {
                MethodKind::Method
            };
            return ClassMember {
                kind: ClassMemberKind::Method { key, kind, func },
                modifiers,
                decorators,
                span: start.merge(self.prev_span()),
            };
        }

        // Field.
        let ty = if self.eat(ColonToken) {
            Some(self.parse_type())
        } else {
            None
        };
        let init = if self.eat(EqualsToken) {
            Some(self.parse_assignment())
        } else {
            None
        };
        self.expect_semicolon();
        ClassMember {
            kind: ClassMemberKind::Field { key, ty, init },
            modifiers,
            decorators,
            span: start.merge(self.prev_span()),
        }
    }

    fn parse_member_modifiers(&mut self) -> Modifiers {
        use SyntaxKind::*;
        let mut modifiers = Modifiers::empty();
        loop {
            let flag = match self.kind() {
                PublicKeyword => Modifiers::PUBLIC,
                PrivateKeyword => Modifiers::PRIVATE,
                ProtectedKeyword => Modifiers::PROTECTED,
                StaticKeyword => Modifiers::STATIC,
                ReadonlyKeyword => Modifiers::READONLY,
                AbstractKeyword => Modifiers::ABSTRACT,
                OverrideKeyword => Modifiers::OVERRIDE,
                DeclareKeyword => Modifiers::DECLARE,
                _ => break,
            };
            // Only treat as a modifier when a member-ish token follows;
            // otherwise it is the member name (`readonly = 1;`).
            if !self.object_key_follows_class(1) && self.peek_kind(1) != AtToken {
                break;
            }
            modifiers |= flag;
            self.advance();
        }
        modifiers
    }

    fn object_key_follows_class(&self, offset: usize) -> bool {
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

    // =========================================================================
    // Interfaces, type aliases, enums
    // =========================================================================

    fn parse_interface_declaration(&mut self) -> StmtId {
        use SyntaxKind::*;
        let start = self.span();
        self.advance(); // interface
        let name = self.expect_identifier();
        let type_params = self.parse_type_parameters();
        let mut extends = Vec::new();
        if self.eat(ExtendsKeyword) {
            loop {
                extends.push(self.parse_type());
                if !self.eat(CommaToken) {
                    break;
                }
            }
        }
        self.expect(OpenBraceToken);
        let mut members = Vec::new();
        while !self.at(CloseBraceToken) && !self.at_eof() {
            let member_start = self.span();
            let member = self.parse_type_literal_member();
            let member_span = member_start.merge(self.prev_span());
            members.push(match member {
                TypeLiteralMember::Property {
                    name,
                    ty,
                    optional,
                    readonly,
                } => InterfaceMember::Property {
                    name,
                    ty,
                    optional,
                    readonly,
                    span: member_span,
                },
                TypeLiteralMember::IndexSignature {
                    param_name,
                    key_ty,
                    value_ty,
                } => InterfaceMember::IndexSignature {
                    param_name,
                    key_ty,
                    value_ty,
                    span: member_span,
                },
            });
            if !self.eat(SemicolonToken) {
                self.eat(CommaToken);
            }
        }
        let end = self.expect(CloseBraceToken);
        let span = start.merge(end);
        let interface_id = self.module.arena.alloc_interface(Interface {
            name,
            type_params,
            extends,
            members,
            span,
        });
        self.module
            .arena
            .alloc_stmt(StmtKind::InterfaceDecl(interface_id), span)
    }

    fn parse_type_alias(&mut self) -> StmtId {
        let start = self.span();
        self.advance(); // type
        let name = self.expect_identifier();
        let type_params = self.parse_type_parameters();
        self.expect(SyntaxKind::EqualsToken);
        let ty = self.parse_type();
        self.expect_semicolon();
        let span = start.merge(self.prev_span());
        self.module.arena.alloc_stmt(
            StmtKind::TypeAlias {
                name,
                type_params,
                ty,
            },
            span,
        )
    }

    fn parse_enum(&mut self) -> StmtId {
        use SyntaxKind::*;
        let start = self.span();
        self.advance(); // enum
        let name = self.expect_identifier();
        self.expect(OpenBraceToken);
        let mut members = Vec::new();
        while !self.at(CloseBraceToken) && !self.at_eof() {
            let member_start = self.span();
            let member_name = match self.kind() {
                StringLiteral => {
                    let s: Box<str> = self.current().string_value().unwrap_or("").into();
                    self.advance();
                    s
                }
                _ => self.expect_identifier(),
            };
            let init = if self.eat(EqualsToken) {
                Some(self.parse_assignment())
            } else {
                None
            };
            members.push(EnumMember {
                name: member_name,
                init,
                span: member_start.merge(self.prev_span()),
            });
            if !self.eat(CommaToken) {
                break;
            }
        }
        let end = self.expect(CloseBraceToken);
        let span = start.merge(end);
        self.module
            .arena
            .alloc_stmt(StmtKind::EnumDecl { name, members }, span)
    }

    // =========================================================================
    // Imports and exports
    // =========================================================================

    fn parse_import(&mut self) -> StmtId {
        use SyntaxKind::*;
        let start = self.span();
        self.advance(); // import

        // `import "m";`
        if self.at(StringLiteral) {
            let specifier: Box<str> = self.current().string_value().unwrap_or("").into();
            self.advance();
            self.expect_semicolon();
            let span = start.merge(self.prev_span());
            return self.module.arena.alloc_stmt(
                StmtKind::Import {
                    kind: ImportKind::SideEffect,
                    specifier,
                },
                span,
            );
        }

        // `import x = require("m");`
        if self.kind().is_identifier_like() && self.peek_kind(1) == EqualsToken {
            let local = self.expect_identifier();
            self.advance(); // =
            self.expect(RequireKeyword);
            self.expect(OpenParenToken);
            let specifier: Box<str> = if self.at(StringLiteral) {
                let s = self.current().string_value().unwrap_or("").into();
                self.advance();
                s
            } else {
                self.error_here(codes::EXPECTED_TOKEN, &["string literal"]);
                "".into()
            };
            self.expect(CloseParenToken);
            self.expect_semicolon();
            let span = start.merge(self.prev_span());
            return self.module.arena.alloc_stmt(
                StmtKind::Import {
                    kind: ImportKind::EqualsRequire { local },
                    specifier,
                },
                span,
            );
        }

        let mut default = None;
        let mut namespace = None;
        let mut named = Vec::new();

        if self.kind().is_identifier_like() {
            default = Some(self.expect_identifier());
            // `import d, {...}` or `import d, * as ns`.
            if self.eat(CommaToken) {
                self.parse_import_bindings(&mut namespace, &mut named);
            }
        } else {
            self.parse_import_bindings(&mut namespace, &mut named);
        }

        self.expect(FromKeyword);
        let specifier: Box<str> = if self.at(StringLiteral) {
            let s = self.current().string_value().unwrap_or("").into();
            self.advance();
            s
        } else {
            self.error_here(codes::EXPECTED_TOKEN, &["string literal"]);
            "".into()
        };
        self.expect_semicolon();
        let span = start.merge(self.prev_span());
        self.module.arena.alloc_stmt(
            StmtKind::Import {
                kind: ImportKind::Clause {
                    default,
                    namespace,
                    named,
                },
                specifier,
            },
            span,
        )
    }

    fn parse_import_bindings(
        &mut self,
        namespace: &mut Option<Box<str>>,
        named: &mut Vec<ImportSpecifier>,
    ) {
        use SyntaxKind::*;
        if self.eat(AsteriskToken) {
            self.expect(AsKeyword);
            *namespace = Some(self.expect_identifier());
            return;
        }
        self.expect(OpenBraceToken);
        while !self.at(CloseBraceToken) && !self.at_eof() {
            let spec_start = self.span();
            let imported = self.expect_identifier();
            let local = if self.eat(AsKeyword) {
                self.expect_identifier()
            } else {
                imported.clone()
            };
            named.push(ImportSpecifier {
                imported,
                local,
                span: spec_start.merge(self.prev_span()),
            });
            if !self.eat(CommaToken) {
                break;
            }
        }
        self.expect(CloseBraceToken);
    }

    fn parse_export(&mut self) -> StmtId {
        use SyntaxKind::*;
        let start = self.span();
        self.advance(); // export

        // `export = expr;`
        if self.eat(EqualsToken) {
            let expr = self.parse_expr();
            self.expect_semicolon();
            let span = start.merge(self.prev_span());
            return self
                .module
                .arena
                .alloc_stmt(StmtKind::ExportAssignment(expr), span);
        }

        // `export default expr;`
        if self.eat(DefaultKeyword) {
            let expr = self.parse_expr();
            self.expect_semicolon();
            let span = start.merge(self.prev_span());
            return self
                .module
                .arena
                .alloc_stmt(StmtKind::ExportDefault(expr), span);
        }

        // `export * from "m";`
        if self.eat(AsteriskToken) {
            self.expect(FromKeyword);
            let from: Box<str> = if self.at(StringLiteral) {
                let s = self.current().string_value().unwrap_or("").into();
                self.advance();
                s
            } else {
                self.error_here(codes::EXPECTED_TOKEN, &["string literal"]);
                "".into()
            };
            self.expect_semicolon();
            let span = start.merge(self.prev_span());
            return self
                .module
                .arena
                .alloc_stmt(StmtKind::ExportStar { from }, span);
        }

        // `export {a, b as c} [from "m"];`
        if self.at(OpenBraceToken) {
            self.advance();
            let mut specifiers = Vec::new();
            while !self.at(CloseBraceToken) && !self.at_eof() {
                let spec_start = self.span();
                let local = self.expect_identifier();
                let exported = if self.eat(AsKeyword) {
                    self.expect_identifier()
                } else {
                    local.clone()
                };
                specifiers.push(ExportSpecifier {
                    local,
                    exported,
                    span: spec_start.merge(self.prev_span()),
                });
                if !self.eat(CommaToken) {
                    break;
                }
            }
            self.expect(CloseBraceToken);
            let from = if self.eat(FromKeyword) {
                if self.at(StringLiteral) {
                    let s: Box<str> = self.current().string_value().unwrap_or("").into();
                    self.advance();
                    Some(s)
                } else {
                    self.error_here(codes::EXPECTED_TOKEN, &["string literal"]);
                    None
                }
            } else {
                None
            };
            self.expect_semicolon();
            let span = start.merge(self.prev_span());
            return self
                .module
                .arena
                .alloc_stmt(StmtKind::ExportNamed { specifiers, from }, span);
        }

        // `export <declaration>`.
        let inner = self.parse_statement();
        let span = start.merge(self.module.arena.stmt(inner).span);
        self.module.arena.alloc_stmt(StmtKind::ExportDecl(inner), span)
    }
}
