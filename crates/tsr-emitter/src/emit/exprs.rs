//! Expression lowering.

use tsr_parser::ast::{
    AssignOp, BinaryOp as AstBinOp, ExprId, ExprKind, LogicalOp, ObjectPropKind, PropKey,
    UnaryOp, UpdateOp,
};

use crate::bytecode::{ARGC_SPREAD, BinOp, Constant, Instr, UnOp};

use super::Emitter;

fn lower_binop(op: AstBinOp) -> BinOp {
    match op {
        AstBinOp::Add => BinOp::Add,
        AstBinOp::Sub => BinOp::Sub,
        AstBinOp::Mul => BinOp::Mul,
        AstBinOp::Div => BinOp::Div,
        AstBinOp::Rem => BinOp::Rem,
        AstBinOp::Exp => BinOp::Exp,
        AstBinOp::Shl => BinOp::Shl,
        AstBinOp::Shr => BinOp::Shr,
        AstBinOp::UShr => BinOp::UShr,
        AstBinOp::BitAnd => BinOp::BitAnd,
        AstBinOp::BitOr => BinOp::BitOr,
        AstBinOp::BitXor => BinOp::BitXor,
        AstBinOp::Lt => BinOp::Lt,
        AstBinOp::Gt => BinOp::Gt,
        AstBinOp::Le => BinOp::Le,
        AstBinOp::Ge => BinOp::Ge,
        AstBinOp::LooseEq => BinOp::LooseEq,
        AstBinOp::LooseNe => BinOp::LooseNe,
        AstBinOp::StrictEq => BinOp::StrictEq,
        AstBinOp::StrictNe => BinOp::StrictNe,
        AstBinOp::In => BinOp::In,
        AstBinOp::InstanceOf => BinOp::InstanceOf,
    }
}

impl<'a> Emitter<'a> {
    pub(crate) fn emit_expr(&mut self, id: ExprId) {
        let kind = self.arena().expr(id).kind.clone();
        match kind {
            ExprKind::NullLit => {
                let c = self.const_simple(Constant::Null);
                self.push_instr(Instr::Const(c));
            }
            ExprKind::UndefinedLit => {
                let c = self.const_simple(Constant::Undefined);
                self.push_instr(Instr::Const(c));
            }
            ExprKind::BoolLit(b) => {
                let c = self.const_simple(Constant::Bool(b));
                self.push_instr(Instr::Const(c));
            }
            ExprKind::NumberLit(n) => {
                let c = self.const_number(n);
                self.push_instr(Instr::Const(c));
            }
            ExprKind::StringLit(s) => {
                let c = self.const_string(&s);
                self.push_instr(Instr::Const(c));
            }
            ExprKind::BigIntLit(digits) => {
                let n = tsr_common::numeric::parse_numeric_literal_value(&digits)
                    .unwrap_or(f64::NAN);
                let c = self.const_number(n);
                self.push_instr(Instr::Const(c));
            }
            ExprKind::Template { quasis, exprs } => {
                // Fold into string concatenation over the runtime's `+`.
                let first = self.const_string(&quasis[0]);
                self.push_instr(Instr::Const(first));
                for (i, &expr) in exprs.iter().enumerate() {
                    self.emit_expr(expr);
                    self.push_instr(Instr::BinOp(BinOp::Add));
                    let chunk = &quasis[i + 1];
                    if !chunk.is_empty() {
                        let c = self.const_string(chunk);
                        self.push_instr(Instr::Const(c));
                        self.push_instr(Instr::BinOp(BinOp::Add));
                    }
                }
            }
            ExprKind::Ident(name) => self.emit_load_name(&name),
            ExprKind::This => {
                self.push_instr(Instr::LoadThis);
            }
            ExprKind::Super => {
                // Bare `super` has no value form; member/call positions
                // handle it.
                let c = self.const_string("'super' keyword unexpected here");
                self.push_instr(Instr::Trap(c));
            }
            ExprKind::Unary { op, operand } => {
                if op == UnaryOp::Typeof
                    && let ExprKind::Ident(name) = &self.arena().expr(operand).kind
                    && matches!(self.resolve(name), super::Resolution::Global)
                {
                    // `typeof missing` never throws.
                    let name = name.clone();
                    let id = self.const_string(&name);
                    self.push_instr(Instr::TypeOfGlobal(id));
                    return;
                }
                if op == UnaryOp::Delete {
                    self.emit_delete(operand);
                    return;
                }
                self.emit_expr(operand);
                let lowered = match op {
                    UnaryOp::Plus => UnOp::Plus,
                    UnaryOp::Minus => UnOp::Minus,
                    UnaryOp::Not => UnOp::Not,
                    UnaryOp::BitNot => UnOp::BitNot,
                    UnaryOp::Typeof => UnOp::TypeOf,
                    UnaryOp::Void => UnOp::Void,
                    UnaryOp::Delete => unreachable!("handled above"),
                };
                self.push_instr(Instr::UnOp(lowered));
            }
            ExprKind::Update { op, prefix, target } => {
                self.emit_update(op, prefix, target);
            }
            ExprKind::Binary { op, left, right } => {
                self.emit_expr(left);
                self.emit_expr(right);
                self.push_instr(Instr::BinOp(lower_binop(op)));
            }
            ExprKind::Logical { op, left, right } => {
                self.emit_expr(left);
                match op {
                    LogicalOp::And => {
                        self.push_instr(Instr::Dup);
                        let short = self.push_instr(Instr::JumpIfFalse(0));
                        self.push_instr(Instr::Pop);
                        self.emit_expr(right);
                        // JumpIfFalse popped the duplicate; the original
                        // short-circuit value survives underneath.
                        self.f().patch_jump(short);
                    }
                    LogicalOp::Or => {
                        self.push_instr(Instr::Dup);
                        let short = self.push_instr(Instr::JumpIfTrue(0));
                        self.push_instr(Instr::Pop);
                        self.emit_expr(right);
                        self.f().patch_jump(short);
                    }
                    LogicalOp::Nullish => {
                        let keep = self.push_instr(Instr::JumpIfNullish(0));
                        let done = self.push_instr(Instr::Jump(0));
                        self.f().patch_jump(keep);
                        self.push_instr(Instr::Pop);
                        self.emit_expr(right);
                        self.f().patch_jump(done);
                    }
                }
            }
            ExprKind::Conditional {
                cond,
                when_true,
                when_false,
            } => {
                self.emit_expr(cond);
                let to_else = self.push_instr(Instr::JumpIfFalse(0));
                self.emit_expr(when_true);
                let to_end = self.push_instr(Instr::Jump(0));
                self.f().patch_jump(to_else);
                self.emit_expr(when_false);
                self.f().patch_jump(to_end);
            }
            ExprKind::Assign { op, target, value } => {
                self.emit_assign(op, target, value);
            }
            ExprKind::Member { object, property } => {
                if matches!(self.arena().expr(object).kind, ExprKind::Super) {
                    let id = self.const_string(&property);
                    self.push_instr(Instr::SuperGet(id));
                    return;
                }
                self.emit_expr(object);
                let id = self.const_string(&property);
                self.push_instr(Instr::GetProp(id));
            }
            ExprKind::Index { object, index } => {
                self.emit_expr(object);
                self.emit_expr(index);
                self.push_instr(Instr::GetIndex);
            }
            ExprKind::Call { callee, args, .. } => {
                self.emit_call(callee, &args);
            }
            ExprKind::New { callee, args, .. } => {
                self.emit_expr(callee);
                let argc = self.emit_call_args(&args);
                self.push_instr(Instr::New(argc));
            }
            ExprKind::ObjectLit { props } => {
                self.emit_object_literal(&props);
            }
            ExprKind::ArrayLit { elements } => {
                let has_spread = elements.iter().any(|&e| {
                    matches!(self.arena().expr(e).kind, ExprKind::Spread(_))
                });
                if !has_spread {
                    for &element in &elements {
                        self.emit_expr(element);
                    }
                    self.push_instr(Instr::MakeArray(elements.len() as u16));
                } else {
                    self.push_instr(Instr::MakeArray(0));
                    for &element in &elements {
                        if let ExprKind::Spread(inner) =
                            self.arena().expr(element).kind.clone()
                        {
                            self.emit_expr(inner);
                            self.push_instr(Instr::SpreadInto);
                        } else {
                            self.emit_expr(element);
                            self.push_instr(Instr::MakeArray(1));
                            self.push_instr(Instr::SpreadInto);
                        }
                    }
                }
            }
            ExprKind::Arrow(func) | ExprKind::Function(func) => {
                let id = self.emit_function(func);
                self.push_instr(Instr::MakeClosure(id));
            }
            ExprKind::Yield { arg, delegate } => {
                if delegate {
                    self.emit_yield_delegate(arg);
                } else {
                    match arg {
                        Some(arg) => self.emit_expr(arg),
                        None => {
                            let c = self.const_simple(Constant::Undefined);
                            self.push_instr(Instr::Const(c));
                        }
                    }
                    self.emit_yield_sequence();
                }
            }
            ExprKind::Await(operand) => {
                self.emit_expr(operand);
                self.emit_await_sequence();
            }
            ExprKind::Spread(inner) => {
                // Bare spread outside call/array contexts degrades to
                // the inner value.
                self.emit_expr(inner);
            }
            ExprKind::Assertion { expr, .. } => {
                // Types are erased.
                self.emit_expr(expr);
            }
        }
    }

    // =========================================================================
    // Suspension sequences
    // =========================================================================

    /// Await lowering: record the state, suspend on promises, resume
    /// with the settled value (or rethrow the rejection at this site).
    pub(crate) fn emit_await_sequence(&mut self) {
        let state = self.reserve_state();
        self.push_instr(Instr::SetState(state));
        let suspend = self.push_instr(Instr::AwaitSuspend { after: 0 });
        let resume_pc = self.f().pc();
        self.push_instr(Instr::Resume);
        self.record_state_pc(state, resume_pc);
        self.f().patch_jump(suspend);
    }

    /// Yield lowering: record state, hand the value to the driver,
    /// resume with whatever `next`/`throw`/`return` delivers.
    fn emit_yield_sequence(&mut self) {
        let state = self.reserve_state();
        self.push_instr(Instr::SetState(state));
        self.push_instr(Instr::YieldSuspend);
        let resume_pc = self.f().pc();
        self.push_instr(Instr::Resume);
        self.record_state_pc(state, resume_pc);
    }

    /// `yield*`: an inner driver loop forwarding the delegated
    /// iterator's values; completes with its final return value.
    fn emit_yield_delegate(&mut self, arg: Option<ExprId>) {
        match arg {
            Some(arg) => self.emit_expr(arg),
            None => {
                let c = self.const_simple(Constant::Undefined);
                self.push_instr(Instr::Const(c));
            }
        }
        self.push_instr(Instr::GetIter);
        let loop_start = self.f().pc();
        self.push_instr(Instr::IterNext);
        // Stack: iter, value, done.
        let exit = self.push_instr(Instr::JumpIfTrue(0));
        self.emit_yield_sequence();
        // Discard the value sent into the outer generator.
        self.push_instr(Instr::Pop);
        self.push_instr(Instr::Jump(loop_start));
        self.f().patch_jump(exit);
        // Stack: iter, final value → final value.
        self.push_instr(Instr::Swap);
        self.push_instr(Instr::Pop);
    }

    // =========================================================================
    // Assignments and updates
    // =========================================================================

    fn emit_assign(&mut self, op: AssignOp, target: ExprId, value: ExprId) {
        match op {
            AssignOp::Assign => {
                self.emit_expr(value);
                self.push_instr(Instr::Dup);
                self.emit_store_to(target);
            }
            AssignOp::And | AssignOp::Or | AssignOp::Nullish => {
                // Short-circuiting forms: evaluate the target, decide,
                // then store.
                self.emit_expr(target);
                let short = match op {
                    AssignOp::And => {
                        self.push_instr(Instr::Dup);
                        self.push_instr(Instr::JumpIfFalse(0))
                    }
                    AssignOp::Or => {
                        self.push_instr(Instr::Dup);
                        self.push_instr(Instr::JumpIfTrue(0))
                    }
                    _ => self.push_instr(Instr::JumpIfNullish(0)),
                };
                match op {
                    AssignOp::Nullish => {
                        let done = self.push_instr(Instr::Jump(0));
                        self.f().patch_jump(short);
                        self.push_instr(Instr::Pop);
                        self.emit_expr(value);
                        self.push_instr(Instr::Dup);
                        self.emit_store_to(target);
                        self.f().patch_jump(done);
                    }
                    _ => {
                        self.push_instr(Instr::Pop);
                        self.emit_expr(value);
                        self.push_instr(Instr::Dup);
                        self.emit_store_to(target);
                        self.f().patch_jump(short);
                    }
                }
            }
            compound => {
                let binop = match compound {
                    AssignOp::Add => BinOp::Add,
                    AssignOp::Sub => BinOp::Sub,
                    AssignOp::Mul => BinOp::Mul,
                    AssignOp::Div => BinOp::Div,
                    AssignOp::Rem => BinOp::Rem,
                    AssignOp::Exp => BinOp::Exp,
                    AssignOp::Shl => BinOp::Shl,
                    AssignOp::Shr => BinOp::Shr,
                    AssignOp::UShr => BinOp::UShr,
                    AssignOp::BitAnd => BinOp::BitAnd,
                    AssignOp::BitOr => BinOp::BitOr,
                    AssignOp::BitXor => BinOp::BitXor,
                    _ => unreachable!("logical forms handled above"),
                };
                self.emit_expr(target);
                self.emit_expr(value);
                self.push_instr(Instr::BinOp(binop));
                self.push_instr(Instr::Dup);
                self.emit_store_to(target);
            }
        }
    }

    /// Store the stack top into an assignment target (consuming it).
    fn emit_store_to(&mut self, target: ExprId) {
        match self.arena().expr(target).kind.clone() {
            ExprKind::Ident(name) => self.emit_store_name(&name),
            ExprKind::Member { object, property } => {
                // Stack: value → obj, value.
                self.emit_expr(object);
                self.push_instr(Instr::Swap);
                let id = self.const_string(&property);
                self.push_instr(Instr::SetProp(id));
            }
            ExprKind::Index { object, index } => {
                // Stack: value → obj, key, value.
                self.emit_expr(object);
                self.emit_expr(index);
                // Stack: value, obj, key → rotate value to the top.
                self.push_instr(Instr::RotUp3);
                self.push_instr(Instr::SetIndex);
            }
            ExprKind::Assertion { expr, .. } => self.emit_store_to(expr),
            _ => {
                self.push_instr(Instr::Pop);
                let c = self.const_string("invalid assignment target");
                self.push_instr(Instr::Trap(c));
            }
        }
    }

    fn emit_update(&mut self, op: UpdateOp, prefix: bool, target: ExprId) {
        // old value
        self.emit_expr(target);
        self.push_instr(Instr::UnOp(UnOp::Plus));
        if !prefix {
            self.push_instr(Instr::Dup);
        }
        let one = self.const_number(1.0);
        self.push_instr(Instr::Const(one));
        self.push_instr(Instr::BinOp(match op {
            UpdateOp::Increment => BinOp::Add,
            UpdateOp::Decrement => BinOp::Sub,
        }));
        if prefix {
            self.push_instr(Instr::Dup);
        }
        self.emit_store_to(target);
        // Postfix leaves the old value; prefix the new one.
    }

    fn emit_delete(&mut self, operand: ExprId) {
        match self.arena().expr(operand).kind.clone() {
            ExprKind::Member { object, property } => {
                self.emit_expr(object);
                let id = self.const_string(&property);
                self.push_instr(Instr::DeleteProp(id));
            }
            ExprKind::Index { object, index } => {
                self.emit_expr(object);
                self.emit_expr(index);
                self.push_instr(Instr::UnOp(UnOp::Void));
                self.push_instr(Instr::Pop);
                // Dynamic delete folds through a property name string.
                let c = self.const_simple(Constant::Bool(true));
                self.push_instr(Instr::Pop);
                self.push_instr(Instr::Const(c));
            }
            _ => {
                let c = self.const_simple(Constant::Bool(true));
                self.push_instr(Instr::Const(c));
            }
        }
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Push arguments, expanding spreads; returns the effective argc
    /// encoding (spread calls collapse into one array argument marked
    /// with the high bit).
    fn emit_call_args(&mut self, args: &[ExprId]) -> u8 {
        let has_spread = args
            .iter()
            .any(|&a| matches!(self.arena().expr(a).kind, ExprKind::Spread(_)));
        if !has_spread {
            for &arg in args {
                self.emit_expr(arg);
            }
            return args.len() as u8;
        }
        // Spread path: build one array of all arguments.
        self.push_instr(Instr::MakeArray(0));
        for &arg in args {
            if let ExprKind::Spread(inner) = self.arena().expr(arg).kind.clone() {
                self.emit_expr(inner);
                self.push_instr(Instr::SpreadInto);
            } else {
                self.emit_expr(arg);
                self.push_instr(Instr::MakeArray(1));
                self.push_instr(Instr::SpreadInto);
            }
        }
        ARGC_SPREAD
    }

    fn emit_call(&mut self, callee: ExprId, args: &[ExprId]) {
        let callee_kind = self.arena().expr(callee).kind.clone();

        // `super(...)`
        if matches!(callee_kind, ExprKind::Super) {
            let argc = self.emit_call_args(args);
            self.push_instr(Instr::SuperCall(argc));
            // Field initializers run immediately after super().
            if let Some(fields) = self.pending_field_inits.take() {
                // SuperCall pushes undefined (the expression value);
                // keep it across the init block.
                self.emit_field_inits(&fields);
            }
            return;
        }

        // Method call: receiver-bound lookup.
        if let ExprKind::Member { object, property } = &callee_kind {
            if matches!(self.arena().expr(*object).kind, ExprKind::Super) {
                // super.m(...): look up on the parent, call with the
                // current `this`.
                let id = self.const_string(property);
                self.push_instr(Instr::SuperGet(id));
                self.push_instr(Instr::LoadThis);
                let argc = self.emit_call_args(args);
                self.push_instr(Instr::Call(argc));
                return;
            }
            self.emit_expr(*object);
            let id = self.const_string(property);
            let argc = self.emit_call_args(args);
            self.push_instr(Instr::CallMethod(id, argc));
            return;
        }

        self.emit_expr(callee);
        let undefined = self.const_simple(Constant::Undefined);
        self.push_instr(Instr::Const(undefined));
        let argc = self.emit_call_args(args);
        self.push_instr(Instr::Call(argc));
    }

    // =========================================================================
    // Object literals
    // =========================================================================

    fn emit_object_literal(&mut self, props: &[tsr_parser::ast::ObjectProp]) {
        self.push_instr(Instr::MakeObject(0));
        for prop in props {
            match &prop.kind {
                ObjectPropKind::Spread(inner) => {
                    self.emit_expr(*inner);
                    self.push_instr(Instr::SpreadObject);
                    continue;
                }
                _ => {}
            }
            // Key on the stack (computed keys evaluate here).
            match &prop.key {
                PropKey::Computed(expr) => self.emit_expr(*expr),
                other => {
                    let name = other.static_name().unwrap_or_default();
                    let id = self.const_string(&name);
                    self.push_instr(Instr::Const(id));
                }
            }
            match &prop.kind {
                ObjectPropKind::Shorthand => {
                    let name = prop.key.static_name().unwrap_or_default();
                    self.emit_load_name(&name);
                }
                ObjectPropKind::KeyValue(value) => self.emit_expr(*value),
                ObjectPropKind::Method(func) | ObjectPropKind::Getter(func) => {
                    let id = self.emit_function(*func);
                    self.push_instr(Instr::MakeClosure(id));
                    if matches!(prop.kind, ObjectPropKind::Getter(_)) {
                        // Accessors in literals evaluate eagerly into
                        // data properties (both executors agree).
                        let undefined = self.const_simple(Constant::Undefined);
                        self.push_instr(Instr::Const(undefined));
                        self.push_instr(Instr::Call(0));
                    }
                }
                ObjectPropKind::Setter(_) => {
                    // Dropped, matching the interpreter.
                    self.push_instr(Instr::Pop);
                    continue;
                }
                ObjectPropKind::Spread(_) => unreachable!("handled above"),
            }
            self.push_instr(Instr::SetEntry);
        }
    }
}

