//! Blocks, loops, labels, switches and protected regions.
//!
//! A try region is emitted as
//!
//! ```text
//!     EnterTryCatchFinally      ; patched with the handler table
//!     <body>
//! L_goto_end:
//!     Goto L_end                ; leaves through the finally continuation
//!     EnterExceptionFilter      ; per filtered handler
//! L_filter: <store exception> <filter> LeaveExceptionFilter
//!     EnterExceptionHandler     ; per handler
//! L_catch: <store exception> <body> Branch L_goto_end
//! L_finally:
//!     EnterFinally <body> LeaveFinally
//! L_end:
//! ```

use std::sync::Arc;

use hashbrown::HashMap;
use smallvec::SmallVec;

use super::error::CompileError;
use super::labels::LabelScopeKind;
use super::light_compiler::LightCompiler;
use super::locals::LocalDefinition;
use crate::expr::{
    BinaryOp, CatchBlock, Expr, ExprKind, LabelTarget, MethodInfo, ParameterExpr, SwitchCase,
};
use crate::interpreter::{
    BranchLabelId, ExceptionFilter, ExceptionHandler, Instruction, LocalOperand,
    TryCatchFinallyHandler, TryFaultHandler, switch_key,
};
use crate::types::Type;
use crate::values::Value;

impl LightCompiler {
    // ========================================================================
    // Blocks and loops
    // ========================================================================

    pub(super) fn compile_block(
        &mut self,
        expr: &Expr,
        variables: &[ParameterExpr],
        expressions: &[Expr],
        as_void: bool,
    ) -> Result<(), CompileError> {
        let Some((last, init)) = expressions.split_last() else {
            return Ok(());
        };
        let as_void = as_void || expr.ty().is_void();

        let mut definitions: SmallVec<[LocalDefinition; 4]> = SmallVec::new();
        for variable in variables {
            let definition = self.locals.define(variable);
            self.instructions.emit(Instruction::InitLocal {
                local: definition.operand,
                default: variable.ty().default_value(),
            });
            definitions.push(definition);
        }

        for expr in init {
            self.compile_as_void(expr)?;
        }
        self.compile_with(last, as_void)?;

        for definition in definitions.iter().rev() {
            self.locals.undefine(definition);
        }
        Ok(())
    }

    pub(super) fn compile_loop(
        &mut self,
        expr: &Expr,
        body: &Expr,
        break_target: Option<&LabelTarget>,
        continue_target: Option<&LabelTarget>,
    ) -> Result<(), CompileError> {
        self.label_scopes.push(LabelScopeKind::Statement);
        let break_label = self.loop_label(break_target)?;
        let continue_label = self.loop_label(continue_target)?;

        self.instructions.mark_label(continue_label);
        self.compile_as_void(body)?;
        self.instructions
            .emit_branch(continue_label, !expr.ty().is_void(), false);
        self.instructions.mark_label(break_label);

        self.label_scopes.pop();
        Ok(())
    }

    fn loop_label(&mut self, target: Option<&LabelTarget>) -> Result<BranchLabelId, CompileError> {
        match target {
            Some(target) => {
                self.define_label(target)?;
                Ok(self.branch_label(target))
            }
            None => Ok(self.instructions.make_label()),
        }
    }

    // ========================================================================
    // Labels and jumps
    // ========================================================================

    pub(super) fn compile_label(
        &mut self,
        target: &LabelTarget,
        default_value: Option<&Expr>,
    ) -> Result<(), CompileError> {
        if !self.is_block_label(target) {
            self.define_label(target)?;
        }
        match default_value {
            Some(value) if target.ty().is_void() => self.compile_as_void(value)?,
            Some(value) => self.compile(value)?,
            None if !target.ty().is_void() => {
                self.instructions.emit_load(target.ty().default_value())
            }
            None => {}
        }
        let label = self.branch_label(target);
        self.instructions.mark_label(label);
        Ok(())
    }

    pub(super) fn compile_goto(
        &mut self,
        expr: &Expr,
        target: &LabelTarget,
        value: Option<&Expr>,
    ) -> Result<(), CompileError> {
        let label = self.reference_label(target)?;
        let has_value = match value {
            Some(value) if !value.ty().is_void() => {
                self.compile(value)?;
                true
            }
            Some(value) => {
                self.compile_as_void(value)?;
                false
            }
            None => false,
        };
        self.instructions.emit_goto(
            label,
            !expr.ty().is_void(),
            has_value,
            has_value && !target.ty().is_void(),
        );
        Ok(())
    }

    // ========================================================================
    // Switch
    // ========================================================================

    pub(super) fn compile_switch(
        &mut self,
        expr: &Expr,
        value: &Expr,
        cases: &[SwitchCase],
        default_body: Option<&Expr>,
        comparison: Option<&Arc<MethodInfo>>,
    ) -> Result<(), CompileError> {
        let has_value = !expr.ty().is_void();
        let all_constant = cases.iter().all(|case| {
            case.test_values
                .iter()
                .all(|test| matches!(test.kind(), ExprKind::Constant(_)))
        });

        if all_constant && comparison.is_none() {
            if cases.is_empty() {
                // Evaluated for its side effects only.
                self.compile_as_void(value)?;
                if let Some(body) = default_body {
                    self.compile_with(body, !has_value)?;
                } else if has_value {
                    self.instructions.emit_load(expr.ty().default_value());
                }
                return Ok(());
            }

            let test_count: usize = cases.iter().map(|c| c.test_values.len()).sum();
            if test_count >= self.options.switch_table_threshold {
                if value.ty().numeric_kind().is_some_and(|k| k.is_integer())
                    || matches!(value.ty(), Type::Char)
                {
                    return self.compile_table_switch(expr, value, cases, default_body, false);
                }
                if matches!(value.ty(), Type::Str) {
                    return self.compile_table_switch(expr, value, cases, default_body, true);
                }
            }
        }

        self.compile_switch_as_tests(expr, value, cases, default_body, comparison)
    }

    /// Jump table over integer or string keys. Offsets are relative to the
    /// switch instruction; the first case listing a key wins.
    fn compile_table_switch(
        &mut self,
        expr: &Expr,
        value: &Expr,
        cases: &[SwitchCase],
        default_body: Option<&Expr>,
        string_keys: bool,
    ) -> Result<(), CompileError> {
        let has_value = !expr.ty().is_void();
        let end = self.instructions.make_label();

        self.compile(value)?;
        let switch_index = self.instructions.emit(if string_keys {
            Instruction::StringSwitch {
                cases: Arc::default(),
                null_case: 1,
            }
        } else {
            Instruction::IntSwitch {
                cases: Arc::default(),
            }
        });

        match default_body {
            Some(body) => self.compile_with(body, !has_value)?,
            None if has_value => self.instructions.emit_load(expr.ty().default_value()),
            None => {}
        }
        self.instructions.emit_branch(end, false, has_value);

        let mut int_cases: HashMap<i64, i32> = HashMap::new();
        let mut string_cases: HashMap<Arc<str>, i32> = HashMap::new();
        let mut null_case = None;
        for (i, case) in cases.iter().enumerate() {
            let offset = (self.instructions.count() - switch_index) as i32;
            for test in &case.test_values {
                let ExprKind::Constant(key) = test.kind() else {
                    continue;
                };
                match key {
                    Value::Str(s) if string_keys => {
                        string_cases.entry(s.clone()).or_insert(offset);
                    }
                    Value::Null => {
                        null_case.get_or_insert(offset);
                    }
                    other => {
                        if let Some(key) = switch_key(other) {
                            int_cases.entry(key).or_insert(offset);
                        }
                    }
                }
            }
            self.compile_with(&case.body, !has_value)?;
            if i + 1 < cases.len() {
                self.instructions.emit_branch(end, false, has_value);
            }
        }
        self.instructions.mark_label(end);

        let patched = if string_keys {
            Instruction::StringSwitch {
                cases: Arc::new(string_cases),
                null_case: null_case.unwrap_or(1),
            }
        } else {
            Instruction::IntSwitch {
                cases: Arc::new(int_cases),
            }
        };
        if let Some(instruction) = self.instructions.get_mut(switch_index) {
            *instruction = patched;
        }
        Ok(())
    }

    /// Lowers the switch to one equality test per test value, branching to
    /// the case body on the first match. Bodies are compiled directly in the
    /// switch scope so jumps between cases stay local.
    fn compile_switch_as_tests(
        &mut self,
        expr: &Expr,
        value: &Expr,
        cases: &[SwitchCase],
        default_body: Option<&Expr>,
        comparison: Option<&Arc<MethodInfo>>,
    ) -> Result<(), CompileError> {
        let has_value = !expr.ty().is_void();
        let temp = ParameterExpr::anonymous(value.ty().clone());
        let definition = self.locals.define(&temp);
        self.compile(value)?;
        self.instructions
            .emit(Instruction::StoreLocal(definition.operand));

        let end = self.instructions.make_label();
        let mut bodies: SmallVec<[BranchLabelId; 4]> = SmallVec::new();
        for case in cases {
            let body = self.instructions.make_label();
            bodies.push(body);
            for test in &case.test_values {
                let equal = match comparison {
                    Some(method) => Expr::binary_with_method(
                        BinaryOp::Equal,
                        temp.expr(),
                        test.clone(),
                        false,
                        method.clone(),
                    ),
                    None => Expr::equal(temp.expr(), test.clone()),
                };
                self.compile(&equal)?;
                self.instructions.emit_branch_true(body);
            }
        }

        match default_body {
            Some(body) => self.compile_with(body, !has_value)?,
            None if has_value => self.instructions.emit_load(expr.ty().default_value()),
            None => {}
        }
        self.instructions.emit_branch(end, false, has_value);

        for (i, (case, body)) in cases.iter().zip(bodies).enumerate() {
            self.instructions.mark_label(body);
            self.compile_with(&case.body, !has_value)?;
            if i + 1 < cases.len() {
                self.instructions.emit_branch(end, false, has_value);
            }
        }
        self.instructions.mark_label(end);

        self.locals.undefine(&definition);
        Ok(())
    }

    // ========================================================================
    // Exceptions
    // ========================================================================

    pub(super) fn compile_try(
        &mut self,
        expr: &Expr,
        body: &Expr,
        handlers: &[CatchBlock],
        finally: Option<&Expr>,
        fault: Option<&Expr>,
    ) -> Result<(), CompileError> {
        if let Some(fault) = fault {
            return self.compile_try_fault(expr, body, fault);
        }
        if handlers.is_empty() && finally.is_none() {
            return self.compile(body);
        }

        let has_value = !expr.ty().is_void();
        self.label_scopes.push(LabelScopeKind::Try);

        let end = self.instructions.make_label();
        let goto_end = self.instructions.make_label();
        let finally_label = match finally {
            Some(_) => {
                let label = self.instructions.make_label();
                Some((label, self.instructions.runtime_label_index(label)))
            }
            None => None,
        };
        let finally_runtime = finally_label.map(|(_, index)| index);

        let enter_index = self.instructions.emit(Instruction::EnterTryCatchFinally {
            finally_label: finally_runtime,
            handler: None,
        });
        let try_start = self.instructions.count();
        self.compile_with(body, !has_value)?;
        let try_end = self.instructions.count();

        self.instructions.mark_label(goto_end);
        self.instructions
            .emit_goto(end, has_value, has_value, has_value);

        let mut compiled: SmallVec<[ExceptionHandler; 2]> = SmallVec::new();
        for handler in handlers {
            compiled.push(self.compile_catch(handler, goto_end, has_value)?);
        }

        let finally_range = match (finally, finally_label) {
            (Some(finally), Some((label, runtime_index))) => {
                self.label_scopes.push(LabelScopeKind::Finally);
                let start = self.instructions.count();
                self.instructions.mark_label(label);
                self.instructions
                    .emit(Instruction::EnterFinally(runtime_index));
                self.compile_as_void(finally)?;
                self.instructions.emit(Instruction::LeaveFinally);
                self.label_scopes.pop();
                Some((start, self.instructions.count()))
            }
            _ => None,
        };

        let handler = TryCatchFinallyHandler {
            try_start,
            try_end,
            goto_end: try_end,
            finally: finally_range,
            handlers: compiled,
        };
        if let Some(instruction) = self.instructions.get_mut(enter_index) {
            *instruction = Instruction::EnterTryCatchFinally {
                finally_label: finally_runtime,
                handler: Some(Arc::new(handler)),
            };
        }

        self.instructions.mark_label(end);
        self.label_scopes.pop();
        Ok(())
    }

    fn compile_catch(
        &mut self,
        handler: &CatchBlock,
        goto_end: BranchLabelId,
        has_value: bool,
    ) -> Result<ExceptionHandler, CompileError> {
        let variable = handler
            .variable
            .clone()
            .unwrap_or_else(|| ParameterExpr::anonymous(handler.test.clone()));
        let definition = self.locals.define(&variable);
        self.exception_for_rethrow.push(definition.operand);

        let filter = match &handler.filter {
            Some(filter) => Some(self.compile_filter(definition.operand, filter)?),
            None => None,
        };

        self.label_scopes.push(LabelScopeKind::Catch);
        self.instructions
            .emit(Instruction::EnterExceptionHandler { has_value });
        let label = self.instructions.mark_runtime_label();
        let start = self.instructions.count();
        self.emit_store_exception(definition.operand);
        self.compile_with(&handler.body, !has_value)?;
        self.instructions
            .emit_branch(goto_end, has_value, has_value);
        let end = self.instructions.count();
        self.label_scopes.pop();

        self.exception_for_rethrow.pop();
        self.locals.undefine(&definition);
        Ok(ExceptionHandler {
            test: handler.test.clone(),
            label,
            start,
            end,
            filter,
        })
    }

    fn compile_filter(
        &mut self,
        variable: LocalOperand,
        filter: &Expr,
    ) -> Result<ExceptionFilter, CompileError> {
        self.label_scopes.push(LabelScopeKind::Filter);
        self.instructions.emit(Instruction::EnterExceptionFilter);
        let label = self.instructions.mark_runtime_label();
        let start = self.instructions.count();
        self.emit_store_exception(variable);
        self.compile(filter)?;
        let end = self.instructions.count();
        self.instructions.emit(Instruction::LeaveExceptionFilter);
        self.label_scopes.pop();
        Ok(ExceptionFilter { label, start, end })
    }

    /// Each entry into a handler gets a fresh variable, so closures that
    /// captured an earlier exception keep it.
    fn emit_store_exception(&mut self, variable: LocalOperand) {
        self.instructions.emit(Instruction::InitLocal {
            local: variable,
            default: Value::Null,
        });
        self.instructions.emit(Instruction::StoreLocal(variable));
    }

    fn compile_try_fault(&mut self, expr: &Expr, body: &Expr, fault: &Expr) -> Result<(), CompileError> {
        let has_value = !expr.ty().is_void();
        self.label_scopes.push(LabelScopeKind::Try);

        let end = self.instructions.make_label();
        let enter_index = self
            .instructions
            .emit(Instruction::EnterTryFault { handler: None });
        let try_start = self.instructions.count();
        self.compile_with(body, !has_value)?;
        let try_end = self.instructions.count();
        self.instructions
            .emit_goto(end, has_value, has_value, has_value);

        // Runs like a finally block, but only when an exception escapes.
        self.label_scopes.push(LabelScopeKind::Finally);
        let fault_start = self.instructions.count();
        let fault_label = self.instructions.mark_runtime_label();
        self.instructions.emit(Instruction::EnterFault(fault_label));
        self.compile_as_void(fault)?;
        self.instructions.emit(Instruction::LeaveFault);
        let fault_end = self.instructions.count();
        self.label_scopes.pop();

        let handler = TryFaultHandler {
            try_start,
            try_end,
            goto_end: try_end,
            fault_start,
            fault_end,
        };
        if let Some(instruction) = self.instructions.get_mut(enter_index) {
            *instruction = Instruction::EnterTryFault {
                handler: Some(Arc::new(handler)),
            };
        }

        self.instructions.mark_label(end);
        self.label_scopes.pop();
        Ok(())
    }

    pub(super) fn compile_throw(
        &mut self,
        expr: &Expr,
        exception: Option<&Expr>,
    ) -> Result<(), CompileError> {
        let has_result = !expr.ty().is_void();
        let rethrow = match exception {
            Some(exception) => {
                self.compile(exception)?;
                false
            }
            None => {
                let variable = *self
                    .exception_for_rethrow
                    .last()
                    .ok_or(CompileError::RethrowOutsideCatch)?;
                self.instructions.emit(Instruction::LoadLocal(variable));
                true
            }
        };
        self.instructions
            .emit(Instruction::Throw { rethrow, has_result });
        Ok(())
    }
}
