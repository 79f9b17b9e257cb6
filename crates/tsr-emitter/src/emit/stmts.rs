//! Statement lowering.

use tsr_parser::ast::{StmtId, StmtKind, VarKind};

use crate::bytecode::{Constant, Handler, Instr};

use super::{Emitter, LoopCtx};

impl<'a> Emitter<'a> {
    /// Pre-declare `var` bindings (recursively) and top-level function
    /// declarations, emitting the closures up front so forward calls
    /// work. Block-level functions bind at block entry instead.
    pub(crate) fn hoist_into_scope(&mut self, stmts: &[StmtId]) {
        for &stmt in stmts {
            self.hoist_stmt(stmt, true);
        }
    }

    fn hoist_stmt(&mut self, stmt: StmtId, top_level: bool) {
        let kind = self.arena().stmt(stmt).kind.clone();
        match kind {
            StmtKind::VarDecl {
                kind: VarKind::Var,
                declarations,
            } => {
                for decl in &declarations {
                    let mangled = self.declare(&decl.name);
                    let id = self.const_string(&mangled);
                    self.push_instr(Instr::DeclareVar(id));
                }
            }
            StmtKind::FunctionDecl { name, func } => {
                if top_level {
                    let mangled = self.declare(&name);
                    let id = self.emit_function(func);
                    self.push_instr(Instr::MakeClosure(id));
                    let name_id = self.const_string(&mangled);
                    self.push_instr(Instr::StoreVar(0, name_id));
                }
            }
            StmtKind::Block(stmts) => {
                for &inner in &stmts {
                    self.hoist_stmt(inner, false);
                }
            }
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.hoist_stmt(then_branch, false);
                if let Some(else_branch) = else_branch {
                    self.hoist_stmt(else_branch, false);
                }
            }
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::Labeled { body, .. }
            | StmtKind::ForIn { body, .. }
            | StmtKind::ForOf { body, .. } => self.hoist_stmt(body, false),
            StmtKind::For { init, body, .. } => {
                if let Some(init) = init {
                    self.hoist_stmt(init, false);
                }
                self.hoist_stmt(body, false);
            }
            StmtKind::Try {
                block,
                catch,
                finally,
            } => {
                for &inner in &block {
                    self.hoist_stmt(inner, false);
                }
                if let Some(catch) = &catch {
                    for &inner in &catch.body {
                        self.hoist_stmt(inner, false);
                    }
                }
                if let Some(finally) = &finally {
                    for &inner in finally {
                        self.hoist_stmt(inner, false);
                    }
                }
            }
            StmtKind::Switch { cases, .. } => {
                for case in &cases {
                    for &inner in &case.body {
                        self.hoist_stmt(inner, false);
                    }
                }
            }
            StmtKind::ExportDecl(inner) => self.hoist_stmt(inner, top_level),
            _ => {}
        }
    }

    pub(crate) fn emit_stmt(&mut self, stmt: StmtId) {
        self.emit_stmt_labeled(stmt, None);
    }

    fn emit_stmt_labeled(&mut self, stmt: StmtId, label: Option<String>) {
        let kind = self.arena().stmt(stmt).kind.clone();
        match kind {
            StmtKind::Empty => {}
            StmtKind::Expr(expr) => {
                self.emit_expr(expr);
                self.push_instr(Instr::Pop);
            }
            StmtKind::VarDecl { kind, declarations } => {
                for decl in &declarations {
                    match decl.init {
                        Some(init) => self.emit_expr(init),
                        None => {
                            let undefined = self.const_simple(Constant::Undefined);
                            self.push_instr(Instr::Const(undefined));
                        }
                    }
                    let mangled = match kind {
                        VarKind::Var => {
                            // Hoisted: resolve the existing binding.
                            match self.resolve(&decl.name) {
                                super::Resolution::Var(_, mangled) => mangled,
                                _ => self.declare(&decl.name),
                            }
                        }
                        _ => self.declare(&decl.name),
                    };
                    let id = self.const_string(&mangled);
                    if kind != VarKind::Var {
                        self.push_instr(Instr::DeclareVar(id));
                    }
                    self.push_instr(Instr::StoreVar(0, id));
                }
            }
            StmtKind::Block(stmts) => {
                self.enter_block();
                self.hoist_block_functions(&stmts);
                for &inner in &stmts {
                    self.emit_stmt(inner);
                }
                self.exit_block();
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.emit_expr(cond);
                let to_else = self.push_instr(Instr::JumpIfFalse(0));
                self.emit_stmt(then_branch);
                match else_branch {
                    Some(else_branch) => {
                        let to_end = self.push_instr(Instr::Jump(0));
                        self.f().patch_jump(to_else);
                        self.emit_stmt(else_branch);
                        self.f().patch_jump(to_end);
                    }
                    None => self.f().patch_jump(to_else),
                }
            }
            StmtKind::While { cond, body } => {
                let loop_start = self.f().pc();
                self.emit_expr(cond);
                let exit = self.push_instr(Instr::JumpIfFalse(0));
                self.begin_loop(label.clone(), Some(loop_start));
                self.emit_stmt(body);
                self.push_instr(Instr::Jump(loop_start));
                self.f().patch_jump(exit);
                self.end_loop(loop_start);
            }
            StmtKind::DoWhile { body, cond } => {
                let loop_start = self.f().pc();
                self.begin_loop(label.clone(), None);
                self.emit_stmt(body);
                let continue_pc = self.f().pc();
                self.emit_expr(cond);
                let back = self.push_instr(Instr::JumpIfTrue(0));
                match &mut self.f().code[back] {
                    Instr::JumpIfTrue(t) => *t = loop_start,
                    _ => unreachable!(),
                }
                self.end_loop(continue_pc);
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.enter_block();
                if let Some(init) = init {
                    self.emit_stmt(init);
                }
                let loop_start = self.f().pc();
                let exit = match test {
                    Some(test) => {
                        self.emit_expr(test);
                        Some(self.push_instr(Instr::JumpIfFalse(0)))
                    }
                    None => None,
                };
                self.begin_loop(label.clone(), None);
                self.emit_stmt(body);
                let continue_pc = self.f().pc();
                if let Some(update) = update {
                    self.emit_expr(update);
                    self.push_instr(Instr::Pop);
                }
                self.push_instr(Instr::Jump(loop_start));
                if let Some(exit) = exit {
                    self.f().patch_jump(exit);
                }
                self.end_loop(continue_pc);
                self.exit_block();
            }
            StmtKind::ForIn { head, object, body } => {
                self.emit_expr(object);
                self.push_instr(Instr::OwnKeys);
                self.emit_iteration(&head, body, label);
            }
            StmtKind::ForOf {
                head,
                iterable,
                body,
                is_await,
            } => {
                self.emit_expr(iterable);
                self.push_instr(Instr::GetIter);
                if is_await {
                    self.emit_for_await(&head, body, label);
                } else {
                    self.emit_iteration(&head, body, label);
                }
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                self.enter_block();
                self.emit_expr(discriminant);
                let tmp = self.declare("#switch");
                let tmp_id = self.const_string(&tmp);
                self.push_instr(Instr::DeclareVar(tmp_id));
                self.push_instr(Instr::StoreVar(0, tmp_id));

                // Dispatch: test each case, remember its entry jump.
                let mut case_jumps = Vec::new();
                let mut default_index = None;
                for (i, case) in cases.iter().enumerate() {
                    match case.test {
                        Some(test) => {
                            self.push_instr(Instr::LoadVar(0, tmp_id));
                            self.emit_expr(test);
                            self.push_instr(Instr::BinOp(crate::bytecode::BinOp::StrictEq));
                            let jump = self.push_instr(Instr::JumpIfTrue(0));
                            case_jumps.push((i, jump));
                        }
                        None => default_index = Some(i),
                    }
                }
                let to_default = self.push_instr(Instr::Jump(0));

                // Bodies, in order, with fallthrough.
                self.begin_breakable(label.clone(), None, false);
                let mut body_pcs = Vec::new();
                for case in &cases {
                    body_pcs.push(self.f().pc());
                    for &inner in &case.body {
                        self.emit_stmt(inner);
                    }
                }
                let end_of_bodies = self.f().pc();
                for (i, jump) in case_jumps {
                    let target = body_pcs[i];
                    match &mut self.f().code[jump] {
                        Instr::JumpIfTrue(t) => *t = target,
                        _ => unreachable!(),
                    }
                }
                let default_target = default_index
                    .map(|i| body_pcs[i])
                    .unwrap_or(end_of_bodies);
                match &mut self.f().code[to_default] {
                    Instr::Jump(t) => *t = default_target,
                    _ => unreachable!(),
                }
                // `break` inside a switch exits it.
                let ctx = self.f().loops.pop().expect("switch context");
                for patch in ctx.break_patches {
                    self.f().patch_jump(patch);
                }
                self.exit_block();
            }
            StmtKind::Labeled { label, body } => {
                self.emit_stmt_labeled(body, Some(label.to_string()));
            }
            StmtKind::Break(break_label) => {
                self.emit_finallies_to_loop(break_label.as_deref());
                let jump = self.push_instr(Instr::Jump(0));
                self.add_break_patch(break_label.as_deref(), jump);
            }
            StmtKind::Continue(continue_label) => {
                self.emit_finallies_to_loop(continue_label.as_deref());
                let jump = self.push_instr(Instr::Jump(0));
                self.add_continue_patch(continue_label.as_deref(), jump);
            }
            StmtKind::Return(arg) => {
                match arg {
                    Some(arg) => self.emit_expr(arg),
                    None => {
                        let undefined = self.const_simple(Constant::Undefined);
                        self.push_instr(Instr::Const(undefined));
                    }
                }
                // Pending finally blocks run before leaving.
                let finallies: Vec<Vec<StmtId>> =
                    self.f().finally_stack.iter().rev().cloned().collect();
                for body in &finallies {
                    for &inner in body {
                        self.emit_stmt(inner);
                    }
                }
                let in_async = self.f().is_async;
                let in_generator = self.f().is_generator;
                if in_generator {
                    self.push_instr(Instr::GenReturn);
                } else if in_async {
                    self.push_instr(Instr::AsyncReturn);
                } else {
                    self.push_instr(Instr::Return);
                }
            }
            StmtKind::Throw(arg) => {
                self.emit_expr(arg);
                self.push_instr(Instr::Throw);
            }
            StmtKind::Try {
                block,
                catch,
                finally,
            } => {
                self.emit_try(&block, catch.as_ref(), finally.as_deref());
            }
            StmtKind::FunctionDecl { .. } => {
                // Emitted during hoisting.
            }
            StmtKind::ClassDecl(class_id) => {
                let ast_class = self.arena().class(class_id).clone();
                let name = ast_class.name.to_string();
                let mangled = self.declare(&name);
                let id = self.emit_class(class_id);
                self.push_instr(Instr::MakeClass(id));
                let name_id = self.const_string(&mangled);
                self.push_instr(Instr::DeclareVar(name_id));
                self.push_instr(Instr::StoreVar(0, name_id));

                // Static fields evaluate at definition time.
                let statics = std::mem::take(&mut self.deferred_static_fields);
                for (field, init) in statics {
                    self.push_instr(Instr::LoadVar(0, name_id));
                    match init {
                        Some(init) => self.emit_expr(init),
                        None => {
                            let undefined = self.const_simple(Constant::Undefined);
                            self.push_instr(Instr::Const(undefined));
                        }
                    }
                    let field_id = self.const_string(&field);
                    self.push_instr(Instr::SetProp(field_id));
                }

                // Decorators apply outside-in over the established
                // definition and may replace the binding.
                for &decorator in ast_class.decorators.iter().rev() {
                    self.emit_expr(decorator);
                    let undefined = self.const_simple(Constant::Undefined);
                    self.push_instr(Instr::Const(undefined));
                    self.push_instr(Instr::LoadVar(0, name_id));
                    self.push_instr(Instr::Call(1));
                    let keep = self.push_instr(Instr::JumpIfNullish(0));
                    self.push_instr(Instr::Dup);
                    self.push_instr(Instr::StoreVar(0, name_id));
                    self.f().patch_jump(keep);
                    self.push_instr(Instr::Pop);
                }
            }
            StmtKind::InterfaceDecl(_) | StmtKind::TypeAlias { .. } => {}
            StmtKind::EnumDecl { name, members } => {
                let mangled = self.declare(&name);
                self.push_instr(Instr::MakeObject(0));
                let mut next_auto = Some(0.0f64);
                for member in &members {
                    match member.init {
                        Some(init) => {
                            // Literal numeric inits keep the
                            // auto-increment chain going.
                            if let tsr_parser::ast::ExprKind::NumberLit(n) =
                                self.arena().expr(init).kind
                            {
                                next_auto = Some(n + 1.0);
                            } else {
                                next_auto = None;
                            }
                            self.emit_expr(init);
                        }
                        None => {
                            let value = next_auto.unwrap_or(f64::NAN);
                            let id = self.const_number(value);
                            self.push_instr(Instr::Const(id));
                            next_auto = Some(value + 1.0);
                        }
                    }
                    let member_id = self.const_string(&member.name);
                    self.push_instr(Instr::EnumAdd(member_id));
                }
                let name_id = self.const_string(&mangled);
                self.push_instr(Instr::DeclareVar(name_id));
                self.push_instr(Instr::StoreVar(0, name_id));
            }
            StmtKind::Import { .. } => {
                // Imports are resolved to export references at emit
                // time.
            }
            StmtKind::ExportDecl(inner) => {
                self.emit_stmt(inner);
            }
            StmtKind::ExportDefault(expr) => {
                self.emit_expr(expr);
                let id = self.const_string("default");
                self.push_instr(Instr::StoreExport(self.module as u16, id));
            }
            StmtKind::ExportAssignment(expr) => {
                self.emit_expr(expr);
                let id = self.const_string("=");
                self.push_instr(Instr::StoreExport(self.module as u16, id));
            }
            StmtKind::ExportNamed { specifiers, from } => {
                let source_module = match from {
                    Some(from) => {
                        let resolved = tsr_resolver::resolve_specifier(
                            &self.graph.modules[self.module as usize].specifier,
                            &from,
                        );
                        self.graph.by_specifier(&resolved).map(|m| m.id.0 as u16)
                    }
                    None => None,
                };
                for spec in &specifiers {
                    match source_module {
                        Some(source) => {
                            let local_id = self.const_string(&spec.local);
                            self.push_instr(Instr::LoadExport(source, local_id));
                        }
                        None => self.emit_load_name(&spec.local),
                    }
                    let exported_id = self.const_string(&spec.exported);
                    self.push_instr(Instr::StoreExport(self.module as u16, exported_id));
                }
            }
            StmtKind::ExportStar { from } => {
                let resolved = tsr_resolver::resolve_specifier(
                    &self.graph.modules[self.module as usize].specifier,
                    &from,
                );
                if let Some(target) = self.graph.by_specifier(&resolved) {
                    let source = target.id.0 as u16;
                    let names: Vec<String> =
                        target.exports.named.keys().cloned().collect();
                    for name in names {
                        let id = self.const_string(&name);
                        self.push_instr(Instr::LoadExport(source, id));
                        self.push_instr(Instr::StoreExport(self.module as u16, id));
                    }
                }
            }
        }
    }

    /// Block-level function declarations hoist to the block entry.
    fn hoist_block_functions(&mut self, stmts: &[StmtId]) {
        for &stmt in stmts {
            if let StmtKind::FunctionDecl { name, func } = self.arena().stmt(stmt).kind.clone()
            {
                let mangled = self.declare(&name);
                let id = self.emit_function(func);
                self.push_instr(Instr::MakeClosure(id));
                let name_id = self.const_string(&mangled);
                self.push_instr(Instr::DeclareVar(name_id));
                self.push_instr(Instr::StoreVar(0, name_id));
            }
        }
    }

    // =========================================================================
    // Loops
    // =========================================================================

    fn begin_loop(&mut self, label: Option<String>, continue_pc: Option<u32>) {
        self.begin_breakable(label, continue_pc, true);
    }

    fn begin_breakable(
        &mut self,
        label: Option<String>,
        continue_pc: Option<u32>,
        is_loop: bool,
    ) {
        let finally_depth = self.f().finally_stack.len();
        self.f().loops.push(LoopCtx {
            label,
            continue_pc,
            continue_patches: Vec::new(),
            break_patches: Vec::new(),
            finally_depth,
            is_loop,
        });
    }

    fn end_loop(&mut self, continue_target: u32) {
        let ctx = self.f().loops.pop().expect("loop context");
        for patch in ctx.break_patches {
            self.f().patch_jump(patch);
        }
        let target = ctx.continue_pc.unwrap_or(continue_target);
        for patch in ctx.continue_patches {
            match &mut self.f().code[patch] {
                Instr::Jump(t) => *t = target,
                _ => unreachable!(),
            }
        }
    }

    fn add_break_patch(&mut self, label: Option<&str>, jump: usize) {
        let func = self.f();
        for ctx in func.loops.iter_mut().rev() {
            if label.is_none() || ctx.label.as_deref() == label {
                ctx.break_patches.push(jump);
                return;
            }
        }
    }

    fn add_continue_patch(&mut self, label: Option<&str>, jump: usize) {
        let func = self.f();
        for ctx in func.loops.iter_mut().rev() {
            if !ctx.is_loop {
                continue;
            }
            if label.is_none() || ctx.label.as_deref() == label {
                ctx.continue_patches.push(jump);
                return;
            }
        }
    }

    /// Re-emit the finally blocks between the current point and the
    /// targeted loop before an early exit.
    fn emit_finallies_to_loop(&mut self, label: Option<&str>) {
        let boundary = {
            let func = self.f();
            func.loops
                .iter()
                .rev()
                .find(|ctx| label.is_none() || ctx.label.as_deref() == label)
                .map(|ctx| ctx.finally_depth)
                .unwrap_or(0)
        };
        let pending: Vec<Vec<StmtId>> = self.f().finally_stack[boundary..]
            .iter()
            .rev()
            .cloned()
            .collect();
        for body in &pending {
            for &inner in body {
                self.emit_stmt(inner);
            }
        }
    }

    // =========================================================================
    // Iteration shapes
    // =========================================================================

    /// Shared for-in / for-of loop over an iterator handle already on
    /// the stack.
    fn emit_iteration(
        &mut self,
        head: &tsr_parser::ast::ForHead,
        body: StmtId,
        label: Option<String>,
    ) {
        self.enter_block();
        let loop_start = self.f().pc();
        self.push_instr(Instr::IterNext);
        // Stack: iter, value, done.
        let exit = self.push_instr(Instr::JumpIfTrue(0));
        let name = if head.var_kind.is_some() {
            self.declare(&head.name)
        } else {
            match self.resolve(&head.name) {
                super::Resolution::Var(_, mangled) => mangled,
                _ => head.name.to_string(),
            }
        };
        let name_id = self.const_string(&name);
        if head.var_kind.is_some() {
            self.push_instr(Instr::DeclareVar(name_id));
        }
        self.push_instr(Instr::StoreVar(0, name_id));
        self.begin_loop(label, Some(loop_start));
        self.emit_stmt(body);
        self.push_instr(Instr::Jump(loop_start));
        self.f().patch_jump(exit);
        // Done: drop the leftover value and the iterator.
        self.push_instr(Instr::Pop);
        self.push_instr(Instr::Pop);
        self.end_loop(loop_start);
        self.exit_block();
    }

    /// `for await (...)`: each step's value is awaited before binding.
    fn emit_for_await(
        &mut self,
        head: &tsr_parser::ast::ForHead,
        body: StmtId,
        label: Option<String>,
    ) {
        self.enter_block();
        let loop_start = self.f().pc();
        self.push_instr(Instr::IterNext);
        let exit = self.push_instr(Instr::JumpIfTrue(0));
        // Await the yielded value.
        self.emit_await_sequence();
        let name = if head.var_kind.is_some() {
            self.declare(&head.name)
        } else {
            head.name.to_string()
        };
        let name_id = self.const_string(&name);
        if head.var_kind.is_some() {
            self.push_instr(Instr::DeclareVar(name_id));
        }
        self.push_instr(Instr::StoreVar(0, name_id));
        self.begin_loop(label, Some(loop_start));
        self.emit_stmt(body);
        self.push_instr(Instr::Jump(loop_start));
        self.f().patch_jump(exit);
        self.push_instr(Instr::Pop);
        self.push_instr(Instr::Pop);
        self.end_loop(loop_start);
        self.exit_block();
    }

    // =========================================================================
    // try / catch / finally
    // =========================================================================

    /// `finally` lowers by duplication: the normal path and the
    /// catch-all rethrow path each carry a copy, and early exits
    /// re-emit it via the finally stack.
    fn emit_try(
        &mut self,
        block: &[StmtId],
        catch: Option<&tsr_parser::ast::CatchClause>,
        finally: Option<&[StmtId]>,
    ) {
        if let Some(finally) = finally {
            self.f().finally_stack.push(finally.to_vec());
        }

        let try_start = self.f().pc();
        self.enter_block();
        for &inner in block {
            self.emit_stmt(inner);
        }
        self.exit_block();
        let try_end = self.f().pc();
        let to_finally = self.push_instr(Instr::Jump(0));

        // Catch handler: thrown value arrives on the stack.
        let catch_pc = self.f().pc();
        let mut catch_end = catch_pc;
        if let Some(catch) = catch {
            self.enter_block();
            match &catch.param {
                Some(param) => {
                    let mangled = self.declare(param);
                    let id = self.const_string(&mangled);
                    self.push_instr(Instr::DeclareVar(id));
                    self.push_instr(Instr::StoreVar(0, id));
                }
                None => {
                    self.push_instr(Instr::Pop);
                }
            }
            for &inner in &catch.body {
                self.emit_stmt(inner);
            }
            self.exit_block();
            catch_end = self.f().pc();
            self.f().handlers.push(Handler {
                try_start,
                try_end,
                catch_pc,
            });
        }
        let catch_to_finally = self.push_instr(Instr::Jump(0));

        if let Some(finally) = finally {
            self.f().finally_stack.pop();

            // Catch-all: run finally, rethrow.
            let rethrow_pc = self.f().pc();
            let exc = self.declare("#exc");
            let exc_id = self.const_string(&exc);
            self.push_instr(Instr::DeclareVar(exc_id));
            self.push_instr(Instr::StoreVar(0, exc_id));
            self.enter_block();
            for &inner in finally {
                self.emit_stmt(inner);
            }
            self.exit_block();
            self.push_instr(Instr::LoadVar(0, exc_id));
            self.push_instr(Instr::Throw);

            // Protect the try body (and the catch body) with the
            // rethrow path.
            let protected_end = if catch.is_some() { catch_end } else { try_end };
            self.f().handlers.push(Handler {
                try_start,
                try_end: protected_end,
                catch_pc: rethrow_pc,
            });

            // Normal path.
            self.f().patch_jump(to_finally);
            self.f().patch_jump(catch_to_finally);
            self.enter_block();
            for &inner in finally {
                self.emit_stmt(inner);
            }
            self.exit_block();
        } else {
            self.f().patch_jump(to_finally);
            self.f().patch_jump(catch_to_finally);
        }
    }

    /// Publish the final values of exported declarations (mirrors the
    /// interpreter's end-of-module sync).
    pub(crate) fn emit_export_sync(&mut self, stmt: StmtId) {
        let StmtKind::ExportDecl(inner) = self.arena().stmt(stmt).kind.clone() else {
            return;
        };
        let names: Vec<String> = match self.arena().stmt(inner).kind.clone() {
            StmtKind::VarDecl { declarations, .. } => {
                declarations.iter().map(|d| d.name.to_string()).collect()
            }
            StmtKind::FunctionDecl { name, .. } => vec![name.to_string()],
            StmtKind::ClassDecl(class_id) => {
                vec![self.arena().class(class_id).name.to_string()]
            }
            StmtKind::EnumDecl { name, .. } => vec![name.to_string()],
            _ => Vec::new(),
        };
        for name in names {
            self.emit_load_name(&name);
            let id = self.const_string(&name);
            self.push_instr(Instr::StoreExport(self.module as u16, id));
        }
    }
}
