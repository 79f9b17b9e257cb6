//! AST pretty-printer.
//!
//! Produces canonical source text from a parsed module. Sub-expressions
//! are parenthesized conservatively; since parentheses do not allocate
//! nodes, printing and re-parsing yields a structurally equal tree
//! (comments aside). Round-trip tests compare `print(parse(print(m)))`
//! with `print(m)`.

use crate::ast::*;

/// Print a whole module.
pub fn print_module(module: &SourceModule) -> String {
    let mut printer = Printer {
        arena: &module.arena,
        out: String::new(),
        indent: 0,
    };
    for &stmt in &module.statements {
        printer.stmt(stmt);
    }
    printer.out
}

struct Printer<'a> {
    arena: &'a Arena,
    out: String,
    indent: usize,
}

impl<'a> Printer<'a> {
    fn write(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn line(&mut self, s: &str) {
        self.write(s);
        self.newline();
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn stmt(&mut self, id: StmtId) {
        match &self.arena.stmt(id).kind {
            StmtKind::Empty => self.line(";"),
            StmtKind::Expr(expr) => {
                // Parenthesized so object literals and function
                // expressions cannot be re-read as statements.
                self.write("(");
                self.expr(*expr);
                self.line(");");
            }
            StmtKind::VarDecl { kind, declarations } => {
                self.var_decl(*kind, declarations);
                self.line(";");
            }
            StmtKind::Block(stmts) => {
                self.block(stmts);
                self.newline();
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.write("if (");
                self.expr(*cond);
                self.write(") ");
                self.nested_stmt(*then_branch);
                if let Some(else_branch) = else_branch {
                    self.write(" else ");
                    self.nested_stmt(*else_branch);
                }
                self.newline();
            }
            StmtKind::While { cond, body } => {
                self.write("while (");
                self.expr(*cond);
                self.write(") ");
                self.nested_stmt(*body);
                self.newline();
            }
            StmtKind::DoWhile { body, cond } => {
                self.write("do ");
                self.nested_stmt(*body);
                self.write(" while (");
                self.expr(*cond);
                self.line(");");
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.write("for (");
                if let Some(init) = init {
                    match &self.arena.stmt(*init).kind {
                        StmtKind::VarDecl { kind, declarations } => {
                            self.var_decl(*kind, declarations)
                        }
                        StmtKind::Expr(e) => self.expr(*e),
                        _ => {}
                    }
                }
                self.write("; ");
                if let Some(test) = test {
                    self.expr(*test);
                }
                self.write("; ");
                if let Some(update) = update {
                    self.expr(*update);
                }
                self.write(") ");
                self.nested_stmt(*body);
                self.newline();
            }
            StmtKind::ForIn { head, object, body } => {
                self.write("for (");
                self.for_head(head);
                self.write(" in ");
                self.expr(*object);
                self.write(") ");
                self.nested_stmt(*body);
                self.newline();
            }
            StmtKind::ForOf {
                head,
                iterable,
                body,
                is_await,
            } => {
                self.write(if *is_await { "for await (" } else { "for (" });
                self.for_head(head);
                self.write(" of ");
                self.expr(*iterable);
                self.write(") ");
                self.nested_stmt(*body);
                self.newline();
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                self.write("switch (");
                self.expr(*discriminant);
                self.write(") {");
                self.indent += 1;
                self.newline();
                for case in cases {
                    match case.test {
                        Some(test) => {
                            self.write("case ");
                            self.expr(test);
                            self.write(":");
                        }
                        None => self.write("default:"),
                    }
                    self.indent += 1;
                    self.newline();
                    for &stmt in &case.body {
                        self.stmt(stmt);
                    }
                    self.indent -= 1;
                    self.newline();
                }
                self.indent -= 1;
                self.line("}");
            }
            StmtKind::Labeled { label, body } => {
                self.write(label);
                self.write(": ");
                self.nested_stmt(*body);
                self.newline();
            }
            StmtKind::Break(label) => {
                self.write("break");
                if let Some(label) = label {
                    self.write(" ");
                    self.write(label);
                }
                self.line(";");
            }
            StmtKind::Continue(label) => {
                self.write("continue");
                if let Some(label) = label {
                    self.write(" ");
                    self.write(label);
                }
                self.line(";");
            }
            StmtKind::Return(arg) => {
                self.write("return");
                if let Some(arg) = arg {
                    self.write(" (");
                    self.expr(*arg);
                    self.write(")");
                }
                self.line(";");
            }
            StmtKind::Throw(arg) => {
                self.write("throw (");
                self.expr(*arg);
                self.line(");");
            }
            StmtKind::Try {
                block,
                catch,
                finally,
            } => {
                self.write("try ");
                self.block(block);
                if let Some(catch) = catch {
                    self.write(" catch ");
                    if let Some(param) = &catch.param {
                        self.write("(");
                        self.write(param);
                        if let Some(ty) = catch.param_ty {
                            self.write(": ");
                            self.type_node(ty);
                        }
                        self.write(") ");
                    }
                    self.block(&catch.body);
                }
                if let Some(finally) = finally {
                    self.write(" finally ");
                    self.block(finally);
                }
                self.newline();
            }
            StmtKind::FunctionDecl { func, .. } => {
                self.function(*func, true);
                self.newline();
            }
            StmtKind::ClassDecl(class_id) => {
                self.class(*class_id);
                self.newline();
            }
            StmtKind::InterfaceDecl(interface_id) => {
                self.interface(*interface_id);
                self.newline();
            }
            StmtKind::TypeAlias {
                name,
                type_params,
                ty,
            } => {
                self.write("type ");
                self.write(name);
                self.type_params(type_params);
                self.write(" = ");
                self.type_node(*ty);
                self.line(";");
            }
            StmtKind::EnumDecl { name, members } => {
                self.write("enum ");
                self.write(name);
                self.write(" { ");
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.write(&member.name);
                    if let Some(init) = member.init {
                        self.write(" = ");
                        self.expr(init);
                    }
                }
                self.line(" }");
            }
            StmtKind::Import { kind, specifier } => {
                self.import(kind, specifier);
            }
            StmtKind::ExportNamed { specifiers, from } => {
                self.write("export { ");
                for (i, spec) in specifiers.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.write(&spec.local);
                    if spec.exported != spec.local {
                        self.write(" as ");
                        self.write(&spec.exported);
                    }
                }
                self.write(" }");
                if let Some(from) = from {
                    self.write(" from ");
                    self.string_lit(from);
                }
                self.line(";");
            }
            StmtKind::ExportStar { from } => {
                self.write("export * from ");
                self.string_lit(from);
                self.line(";");
            }
            StmtKind::ExportDefault(expr) => {
                self.write("export default ");
                self.expr(*expr);
                self.line(";");
            }
            StmtKind::ExportDecl(inner) => {
                self.write("export ");
                self.stmt(*inner);
            }
            StmtKind::ExportAssignment(expr) => {
                self.write("export = ");
                self.expr(*expr);
                self.line(";");
            }
        }
    }

    /// A statement in `if`/loop body position: blocks inline, everything
    /// else on the same line.
    fn nested_stmt(&mut self, id: StmtId) {
        if let StmtKind::Block(stmts) = &self.arena.stmt(id).kind {
            self.block(stmts);
        } else {
            self.write("{ ");
            let saved = self.indent;
            self.stmt(id);
            self.indent = saved;
            self.write(" }");
        }
    }

    fn block(&mut self, stmts: &[StmtId]) {
        self.write("{");
        self.indent += 1;
        self.newline();
        for &stmt in stmts {
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.newline();
        self.write("}");
    }

    fn var_decl(&mut self, kind: VarKind, declarations: &[VarDeclarator]) {
        self.write(match kind {
            VarKind::Var => "var ",
            VarKind::Let => "let ",
            VarKind::Const => "const ",
        });
        for (i, decl) in declarations.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&decl.name);
            if let Some(ty) = decl.ty {
                self.write(": ");
                self.type_node(ty);
            }
            if let Some(init) = decl.init {
                self.write(" = ");
                self.expr(init);
            }
        }
    }

    fn for_head(&mut self, head: &ForHead) {
        if let Some(kind) = head.var_kind {
            self.write(match kind {
                VarKind::Var => "var ",
                VarKind::Let => "let ",
                VarKind::Const => "const ",
            });
        }
        self.write(&head.name);
    }

    fn import(&mut self, kind: &ImportKind, specifier: &str) {
        match kind {
            ImportKind::SideEffect => {
                self.write("import ");
                self.string_lit(specifier);
                self.line(";");
            }
            ImportKind::EqualsRequire { local } => {
                self.write("import ");
                self.write(local);
                self.write(" = require(");
                self.string_lit(specifier);
                self.line(");");
            }
            ImportKind::Clause {
                default,
                namespace,
                named,
            } => {
                self.write("import ");
                let mut first = true;
                if let Some(default) = default {
                    self.write(default);
                    first = false;
                }
                if let Some(namespace) = namespace {
                    if !first {
                        self.write(", ");
                    }
                    self.write("* as ");
                    self.write(namespace);
                    first = false;
                }
                if !named.is_empty() || (default.is_none() && namespace.is_none()) {
                    if !first {
                        self.write(", ");
                    }
                    self.write("{ ");
                    for (i, spec) in named.iter().enumerate() {
                        if i > 0 {
                            self.write(", ");
                        }
                        self.write(&spec.imported);
                        if spec.local != spec.imported {
                            self.write(" as ");
                            self.write(&spec.local);
                        }
                    }
                    self.write(" }");
                }
                self.write(" from ");
                self.string_lit(specifier);
                self.line(";");
            }
        }
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn function(&mut self, id: FuncId, as_declaration: bool) {
        let func = self.arena.func(id);
        if func.is_async {
            self.write("async ");
        }
        if as_declaration || !func.is_arrow {
            self.write("function");
            if func.is_generator {
                self.write("*");
            }
            if let Some(name) = &func.name {
                self.write(" ");
                self.write(name);
            }
        }
        self.type_params(&func.type_params.clone());
        self.params(&func.params.clone());
        if let Some(return_type) = func.return_type {
            self.write(": ");
            self.type_node(return_type);
        }
        let body = func.body.clone();
        match body {
            Some(FuncBody::Block(stmts)) => {
                self.write(" ");
                self.block(&stmts);
            }
            Some(FuncBody::Expr(_)) => unreachable!("non-arrow function with expression body"),
            None => self.write(";"),
        }
    }

    fn arrow(&mut self, id: FuncId) {
        let func = self.arena.func(id);
        if func.is_async {
            self.write("async ");
        }
        self.params(&func.params.clone());
        if let Some(return_type) = func.return_type {
            self.write(": ");
            self.type_node(return_type);
        }
        self.write(" => ");
        match self.arena.func(id).body.clone() {
            Some(FuncBody::Block(stmts)) => self.block(&stmts),
            Some(FuncBody::Expr(expr)) => {
                self.write("(");
                self.expr(expr);
                self.write(")");
            }
            None => self.write("{}"),
        }
    }

    fn params(&mut self, params: &[Param]) {
        self.write("(");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.modifiers(param.modifiers);
            if param.rest {
                self.write("...");
            }
            self.write(&param.name);
            if param.optional {
                self.write("?");
            }
            if let Some(ty) = param.ty {
                self.write(": ");
                self.type_node(ty);
            }
            if let Some(default) = param.default {
                self.write(" = ");
                self.expr(default);
            }
        }
        self.write(")");
    }

    fn modifiers(&mut self, modifiers: Modifiers) {
        if modifiers.contains(Modifiers::PUBLIC) {
            self.write("public ");
        }
        if modifiers.contains(Modifiers::PRIVATE) {
            self.write("private ");
        }
        if modifiers.contains(Modifiers::PROTECTED) {
            self.write("protected ");
        }
        if modifiers.contains(Modifiers::STATIC) {
            self.write("static ");
        }
        if modifiers.contains(Modifiers::ABSTRACT) {
            self.write("abstract ");
        }
        if modifiers.contains(Modifiers::OVERRIDE) {
            self.write("override ");
        }
        if modifiers.contains(Modifiers::READONLY) {
            self.write("readonly ");
        }
    }

    fn class(&mut self, id: ClassId) {
        let class = self.arena.class(id);
        let decorators = class.decorators.clone();
        for decorator in decorators {
            self.write("@");
            self.expr(decorator);
            self.newline();
        }
        let class = self.arena.class(id);
        if class.is_abstract {
            self.write("abstract ");
        }
        self.write("class ");
        self.write(&class.name.clone());
        self.type_params(&class.type_params.clone());
        if let Some(superclass) = class.superclass {
            let super_type_args = class.super_type_args.clone();
            self.write(" extends ");
            self.expr(superclass);
            self.type_args(&super_type_args);
        }
        let implements = self.arena.class(id).implements.clone();
        if !implements.is_empty() {
            self.write(" implements ");
            for (i, ty) in implements.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.type_node(*ty);
            }
        }
        self.write(" {");
        self.indent += 1;
        self.newline();
        let members = self.arena.class(id).members.clone();
        for member in &members {
            self.class_member(member);
        }
        self.indent -= 1;
        self.newline();
        self.write("}");
    }

    fn class_member(&mut self, member: &ClassMember) {
        for &decorator in &member.decorators {
            self.write("@");
            self.expr(decorator);
            self.newline();
        }
        self.modifiers(member.modifiers);
        match &member.kind {
            ClassMemberKind::Field { key, ty, init } => {
                self.prop_key(key);
                if let Some(ty) = ty {
                    self.write(": ");
                    self.type_node(*ty);
                }
                if let Some(init) = init {
                    self.write(" = ");
                    self.expr(*init);
                }
                self.line(";");
            }
            ClassMemberKind::Method { key, kind, func } => {
                let f = self.arena.func(*func);
                if f.is_async {
                    self.write("async ");
                }
                if f.is_generator {
                    self.write("*");
                }
                match kind {
                    MethodKind::Getter => self.write("get "),
                    MethodKind::Setter => self.write("set "),
                    _ => {}
                }
                self.prop_key(key);
                let func = *func;
                let f = self.arena.func(func);
                self.type_params(&f.type_params.clone());
                self.params(&f.params.clone());
                if let Some(return_type) = self.arena.func(func).return_type {
                    self.write(": ");
                    self.type_node(return_type);
                }
                match self.arena.func(func).body.clone() {
                    Some(FuncBody::Block(stmts)) => {
                        self.write(" ");
                        self.block(&stmts);
                        self.newline();
                    }
                    _ => self.line(";"),
                }
            }
            ClassMemberKind::IndexSignature {
                param_name,
                key_ty,
                value_ty,
            } => {
                self.write("[");
                self.write(param_name);
                self.write(": ");
                self.type_node(*key_ty);
                self.write("]: ");
                self.type_node(*value_ty);
                self.line(";");
            }
        }
    }

    fn interface(&mut self, id: InterfaceId) {
        let interface = self.arena.interface(id);
        self.write("interface ");
        self.write(&interface.name.clone());
        self.type_params(&interface.type_params.clone());
        let extends = self.arena.interface(id).extends.clone();
        if !extends.is_empty() {
            self.write(" extends ");
            for (i, ty) in extends.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.type_node(*ty);
            }
        }
        self.write(" {");
        self.indent += 1;
        self.newline();
        let members = self.arena.interface(id).members.clone();
        for member in &members {
            match member {
                InterfaceMember::Property {
                    name,
                    ty,
                    optional,
                    readonly,
                    ..
                } => {
                    if *readonly {
                        self.write("readonly ");
                    }
                    self.write(name);
                    if *optional {
                        self.write("?");
                    }
                    self.write(": ");
                    self.type_node(*ty);
                    self.line(";");
                }
                InterfaceMember::IndexSignature {
                    param_name,
                    key_ty,
                    value_ty,
                    ..
                } => {
                    self.write("[");
                    self.write(param_name);
                    self.write(": ");
                    self.type_node(*key_ty);
                    self.write("]: ");
                    self.type_node(*value_ty);
                    self.line(";");
                }
            }
        }
        self.indent -= 1;
        self.newline();
        self.write("}");
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn expr(&mut self, id: ExprId) {
        match &self.arena.expr(id).kind.clone() {
            ExprKind::NullLit => self.write("null"),
            ExprKind::UndefinedLit => self.write("undefined"),
            ExprKind::BoolLit(true) => self.write("true"),
            ExprKind::BoolLit(false) => self.write("false"),
            ExprKind::NumberLit(n) => {
                let text = format_number_key(*n);
                self.write(&text);
            }
            ExprKind::StringLit(s) => self.string_lit(s),
            ExprKind::BigIntLit(digits) => {
                self.write(digits);
                self.write("n");
            }
            ExprKind::Template { quasis, exprs } => {
                self.write("`");
                for (i, quasi) in quasis.iter().enumerate() {
                    self.template_chunk(quasi);
                    if i < exprs.len() {
                        self.write("${");
                        self.expr(exprs[i]);
                        self.write("}");
                    }
                }
                self.write("`");
            }
            ExprKind::Ident(name) => self.write(name),
            ExprKind::This => self.write("this"),
            ExprKind::Super => self.write("super"),
            ExprKind::Unary { op, operand } => {
                self.write(match op {
                    UnaryOp::Plus => "+",
                    UnaryOp::Minus => "-",
                    UnaryOp::Not => "!",
                    UnaryOp::BitNot => "~",
                    UnaryOp::Typeof => "typeof ",
                    UnaryOp::Void => "void ",
                    UnaryOp::Delete => "delete ",
                });
                self.paren_expr(*operand);
            }
            ExprKind::Update { op, prefix, target } => {
                let text = match op {
                    UpdateOp::Increment => "++",
                    UpdateOp::Decrement => "--",
                };
                if *prefix {
                    self.write(text);
                    self.paren_expr(*target);
                } else {
                    self.paren_expr(*target);
                    self.write(text);
                }
            }
            ExprKind::Binary { op, left, right } => {
                self.paren_expr(*left);
                self.write(match op {
                    BinaryOp::Add => " + ",
                    BinaryOp::Sub => " - ",
                    BinaryOp::Mul => " * ",
                    BinaryOp::Div => " / ",
                    BinaryOp::Rem => " % ",
                    BinaryOp::Exp => " ** ",
                    BinaryOp::Shl => " << ",
                    BinaryOp::Shr => " >> ",
                    BinaryOp::UShr => " >>> ",
                    BinaryOp::BitAnd => " & ",
                    BinaryOp::BitOr => " | ",
                    BinaryOp::BitXor => " ^ ",
                    BinaryOp::Lt => " < ",
                    BinaryOp::Gt => " > ",
                    BinaryOp::Le => " <= ",
                    BinaryOp::Ge => " >= ",
                    BinaryOp::LooseEq => " == ",
                    BinaryOp::LooseNe => " != ",
                    BinaryOp::StrictEq => " === ",
                    BinaryOp::StrictNe => " !== ",
                    BinaryOp::In => " in ",
                    BinaryOp::InstanceOf => " instanceof ",
                });
                self.paren_expr(*right);
            }
            ExprKind::Logical { op, left, right } => {
                self.paren_expr(*left);
                self.write(match op {
                    LogicalOp::And => " && ",
                    LogicalOp::Or => " || ",
                    LogicalOp::Nullish => " ?? ",
                });
                self.paren_expr(*right);
            }
            ExprKind::Conditional {
                cond,
                when_true,
                when_false,
            } => {
                self.paren_expr(*cond);
                self.write(" ? ");
                self.paren_expr(*when_true);
                self.write(" : ");
                self.paren_expr(*when_false);
            }
            ExprKind::Assign { op, target, value } => {
                self.expr(*target);
                self.write(match op {
                    AssignOp::Assign => " = ",
                    AssignOp::Add => " += ",
                    AssignOp::Sub => " -= ",
                    AssignOp::Mul => " *= ",
                    AssignOp::Div => " /= ",
                    AssignOp::Rem => " %= ",
                    AssignOp::Exp => " **= ",
                    AssignOp::Shl => " <<= ",
                    AssignOp::Shr => " >>= ",
                    AssignOp::UShr => " >>>= ",
                    AssignOp::BitAnd => " &= ",
                    AssignOp::BitOr => " |= ",
                    AssignOp::BitXor => " ^= ",
                    AssignOp::And => " &&= ",
                    AssignOp::Or => " ||= ",
                    AssignOp::Nullish => " ??= ",
                });
                self.paren_expr(*value);
            }
            ExprKind::Member { object, property } => {
                self.paren_expr(*object);
                self.write(".");
                self.write(property);
            }
            ExprKind::Index { object, index } => {
                self.paren_expr(*object);
                self.write("[");
                self.expr(*index);
                self.write("]");
            }
            ExprKind::Call {
                callee,
                type_args,
                args,
            } => {
                self.paren_expr(*callee);
                self.type_args(type_args);
                self.args(args);
            }
            ExprKind::New {
                callee,
                type_args,
                args,
            } => {
                self.write("new ");
                self.paren_expr(*callee);
                self.type_args(type_args);
                self.args(args);
            }
            ExprKind::ObjectLit { props } => {
                self.write("{ ");
                for (i, prop) in props.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.object_prop(prop);
                }
                self.write(" }");
            }
            ExprKind::ArrayLit { elements } => {
                self.write("[");
                for (i, &element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.expr(element);
                }
                self.write("]");
            }
            ExprKind::Arrow(func) => self.arrow(*func),
            ExprKind::Function(func) => self.function(*func, false),
            ExprKind::Yield { arg, delegate } => {
                self.write(if *delegate { "yield* " } else { "yield" });
                if let Some(arg) = arg {
                    if !*delegate {
                        self.write(" ");
                    }
                    self.paren_expr(*arg);
                }
            }
            ExprKind::Await(operand) => {
                self.write("await ");
                self.paren_expr(*operand);
            }
            ExprKind::Spread(inner) => {
                self.write("...");
                self.paren_expr(*inner);
            }
            ExprKind::Assertion { expr, ty } => {
                self.paren_expr(*expr);
                self.write(" as ");
                self.type_node(*ty);
            }
        }
    }

    /// Print a sub-expression, parenthesized unless atomic.
    fn paren_expr(&mut self, id: ExprId) {
        let atomic = matches!(
            self.arena.expr(id).kind,
            ExprKind::NullLit
                | ExprKind::UndefinedLit
                | ExprKind::BoolLit(_)
                | ExprKind::NumberLit(_)
                | ExprKind::StringLit(_)
                | ExprKind::Ident(_)
                | ExprKind::This
                | ExprKind::Super
                | ExprKind::Member { .. }
                | ExprKind::Index { .. }
                | ExprKind::Call { .. }
                | ExprKind::ArrayLit { .. }
                | ExprKind::Template { .. }
        );
        if atomic {
            self.expr(id);
        } else {
            self.write("(");
            self.expr(id);
            self.write(")");
        }
    }

    fn args(&mut self, args: &[ExprId]) {
        self.write("(");
        for (i, &arg) in args.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.expr(arg);
        }
        self.write(")");
    }

    fn object_prop(&mut self, prop: &ObjectProp) {
        match &prop.kind {
            ObjectPropKind::Shorthand => self.prop_key(&prop.key),
            ObjectPropKind::KeyValue(value) => {
                self.prop_key(&prop.key);
                self.write(": ");
                self.expr(*value);
            }
            ObjectPropKind::Method(func) => {
                let f = self.arena.func(*func);
                if f.is_async {
                    self.write("async ");
                }
                if f.is_generator {
                    self.write("*");
                }
                self.prop_key(&prop.key);
                self.method_tail(*func);
            }
            ObjectPropKind::Getter(func) => {
                self.write("get ");
                self.prop_key(&prop.key);
                self.method_tail(*func);
            }
            ObjectPropKind::Setter(func) => {
                self.write("set ");
                self.prop_key(&prop.key);
                self.method_tail(*func);
            }
            ObjectPropKind::Spread(inner) => {
                self.write("...");
                self.paren_expr(*inner);
            }
        }
    }

    fn method_tail(&mut self, func: FuncId) {
        let f = self.arena.func(func);
        self.params(&f.params.clone());
        if let Some(return_type) = self.arena.func(func).return_type {
            self.write(": ");
            self.type_node(return_type);
        }
        match self.arena.func(func).body.clone() {
            Some(FuncBody::Block(stmts)) => {
                self.write(" ");
                self.block(&stmts);
            }
            _ => self.write(" {}"),
        }
    }

    fn prop_key(&mut self, key: &PropKey) {
        match key {
            PropKey::Ident(name) => self.write(name),
            PropKey::String(s) => self.string_lit(s),
            PropKey::Number(n) => {
                let text = format_number_key(*n);
                self.write(&text);
            }
            PropKey::Computed(expr) => {
                self.write("[");
                self.expr(*expr);
                self.write("]");
            }
        }
    }

    fn string_lit(&mut self, s: &str) {
        self.out.push('"');
        for ch in s.chars() {
            match ch {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                _ => self.out.push(ch),
            }
        }
        self.out.push('"');
    }

    fn template_chunk(&mut self, s: &str) {
        for ch in s.chars() {
            match ch {
                '`' => self.out.push_str("\\`"),
                '\\' => self.out.push_str("\\\\"),
                '$' => self.out.push_str("\\$"),
                _ => self.out.push(ch),
            }
        }
    }

    // =========================================================================
    // Types
    // =========================================================================

    fn type_params(&mut self, params: &[TypeParam]) {
        if params.is_empty() {
            return;
        }
        self.write("<");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&param.name);
            if let Some(constraint) = param.constraint {
                self.write(" extends ");
                self.type_node(constraint);
            }
            if let Some(default) = param.default {
                self.write(" = ");
                self.type_node(default);
            }
        }
        self.write(">");
    }

    fn type_args(&mut self, args: &[TypeNodeId]) {
        if args.is_empty() {
            return;
        }
        self.write("<");
        for (i, &arg) in args.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.type_node(arg);
        }
        self.write(">");
    }

    fn type_node(&mut self, id: TypeNodeId) {
        match &self.arena.type_node(id).kind.clone() {
            TypeNodeKind::Keyword(keyword) => self.write(match keyword {
                TypeKeyword::Number => "number",
                TypeKeyword::String => "string",
                TypeKeyword::Boolean => "boolean",
                TypeKeyword::Any => "any",
                TypeKeyword::Unknown => "unknown",
                TypeKeyword::Void => "void",
                TypeKeyword::Never => "never",
                TypeKeyword::Null => "null",
                TypeKeyword::Undefined => "undefined",
                TypeKeyword::Symbol => "symbol",
            }),
            TypeNodeKind::Literal(TypeLit::String(s)) => self.string_lit(s),
            TypeNodeKind::Literal(TypeLit::Number(n)) => {
                let text = format_number_key(*n);
                self.write(&text);
            }
            TypeNodeKind::Literal(TypeLit::Boolean(b)) => {
                self.write(if *b { "true" } else { "false" })
            }
            TypeNodeKind::Ref { name, type_args } => {
                self.write(name);
                self.type_args(type_args);
            }
            TypeNodeKind::Array(element) => {
                self.paren_type(*element);
                self.write("[]");
            }
            TypeNodeKind::Tuple { elements, rest } => {
                self.write("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.type_node(element.ty);
                    if element.optional {
                        self.write("?");
                    }
                }
                if let Some(rest) = rest {
                    if !elements.is_empty() {
                        self.write(", ");
                    }
                    self.write("...");
                    self.type_node(*rest);
                }
                self.write("]");
            }
            TypeNodeKind::Union(members) => {
                for (i, &member) in members.iter().enumerate() {
                    if i > 0 {
                        self.write(" | ");
                    }
                    self.paren_type(member);
                }
            }
            TypeNodeKind::Intersection(members) => {
                for (i, &member) in members.iter().enumerate() {
                    if i > 0 {
                        self.write(" & ");
                    }
                    self.paren_type(member);
                }
            }
            TypeNodeKind::Function {
                type_params,
                params,
                return_ty,
            } => {
                self.type_params(type_params);
                self.write("(");
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    if param.rest {
                        self.write("...");
                    }
                    self.write(&param.name);
                    if param.optional {
                        self.write("?");
                    }
                    self.write(": ");
                    self.type_node(param.ty);
                }
                self.write(") => ");
                self.type_node(*return_ty);
            }
            TypeNodeKind::TypeLiteral(members) => {
                self.write("{ ");
                for member in members {
                    match member {
                        TypeLiteralMember::Property {
                            name,
                            ty,
                            optional,
                            readonly,
                        } => {
                            if *readonly {
                                self.write("readonly ");
                            }
                            self.write(name);
                            if *optional {
                                self.write("?");
                            }
                            self.write(": ");
                            self.type_node(*ty);
                            self.write("; ");
                        }
                        TypeLiteralMember::IndexSignature {
                            param_name,
                            key_ty,
                            value_ty,
                        } => {
                            self.write("[");
                            self.write(param_name);
                            self.write(": ");
                            self.type_node(*key_ty);
                            self.write("]: ");
                            self.type_node(*value_ty);
                            self.write("; ");
                        }
                    }
                }
                self.write("}");
            }
            TypeNodeKind::Keyof(inner) => {
                self.write("keyof ");
                self.paren_type(*inner);
            }
            TypeNodeKind::IndexedAccess { object, index } => {
                self.paren_type(*object);
                self.write("[");
                self.type_node(*index);
                self.write("]");
            }
            TypeNodeKind::Mapped {
                param_name,
                constraint,
                as_clause,
                value,
                optional,
            } => {
                self.write("{ [");
                self.write(param_name);
                self.write(" in ");
                self.type_node(*constraint);
                if let Some(as_clause) = as_clause {
                    self.write(" as ");
                    self.type_node(*as_clause);
                }
                self.write("]");
                match optional {
                    Some(MappedModifier::Add) => self.write("?"),
                    Some(MappedModifier::Remove) => self.write("-?"),
                    None => {}
                }
                self.write(": ");
                self.type_node(*value);
                self.write(" }");
            }
            TypeNodeKind::Predicate { param_name, ty } => {
                self.write(param_name);
                self.write(" is ");
                self.type_node(*ty);
            }
        }
    }

    /// Parenthesize compound types in positions that bind tighter.
    fn paren_type(&mut self, id: TypeNodeId) {
        let needs_parens = matches!(
            self.arena.type_node(id).kind,
            TypeNodeKind::Union(_) | TypeNodeKind::Intersection(_) | TypeNodeKind::Function { .. }
        );
        if needs_parens {
            self.write("(");
            self.type_node(id);
            self.write(")");
        } else {
            self.type_node(id);
        }
    }
}
