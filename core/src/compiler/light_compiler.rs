//! Expression tree to instruction lowering.

use std::sync::Arc;

use hashbrown::HashMap;
use tracing::debug;

use super::error::CompileError;
use super::labels::{LabelInfo, LabelScopeKind, LabelScopes};
use super::locals::{LocalVariables, Resolved};
use crate::api::CompileOptions;
use crate::expr::{
    free_variables, BinaryOp, DebugInfoExpr, Expr, ExprKind, LabelTarget, LambdaExpr, MethodInfo,
    ParameterExpr, UnaryOp,
};
use crate::interpreter::arith::{ArithOp, UnaryArith};
use crate::interpreter::compare::CompareOp;
use crate::interpreter::{
    BranchLabelId, DebugInfo, Instruction, InstructionList, Interpreter, LightDelegateCreator,
    LocalOperand,
};
use crate::types::Type;
use crate::values::Value;

/// Compiles one lambda into an [`Interpreter`].
///
/// Nested lambdas get their own compiler. Variables a nested lambda does not
/// define become its closure variables, and the parent supplies their cells
/// when it emits the closure creation.
pub struct LightCompiler {
    /// Instructions of the lambda being compiled.
    pub(super) instructions: InstructionList,

    /// Frame-slot allocation and boxing decisions.
    pub(super) locals: LocalVariables,

    /// Scope tree used to validate jumps.
    pub(super) label_scopes: LabelScopes,

    /// Every label target seen in this lambda.
    labels: HashMap<LabelTarget, LabelInfo>,

    /// Source spans, in instruction order.
    debug_infos: Vec<DebugInfo>,

    /// Exception variables of the enclosing catch blocks, innermost last.
    pub(super) exception_for_rethrow: Vec<LocalOperand>,

    pub(super) options: CompileOptions,

    /// A nested lambda captures variables it cannot resolve; the top-level
    /// lambda reports them as undefined.
    is_nested: bool,
}

impl LightCompiler {
    fn new(options: CompileOptions, is_nested: bool) -> Self {
        Self {
            instructions: InstructionList::new(),
            locals: LocalVariables::new(),
            label_scopes: LabelScopes::new(),
            labels: HashMap::new(),
            debug_infos: Vec::new(),
            exception_for_rethrow: Vec::new(),
            options,
            is_nested,
        }
    }

    /// Compiles a top-level lambda. Every variable it refers to must be one
    /// of its parameters or defined inside it.
    pub fn compile_top(
        options: CompileOptions,
        lambda: &LambdaExpr,
    ) -> Result<LightDelegateCreator, CompileError> {
        let (creator, _) = Self::new(options, false).compile_lambda_body(lambda)?;
        Ok(creator)
    }

    /// Returns the creator and the variables the enclosing lambda must
    /// supply, in closure-slot order.
    fn compile_lambda_body(
        mut self,
        lambda: &LambdaExpr,
    ) -> Result<(LightDelegateCreator, Vec<ParameterExpr>), CompileError> {
        let mut by_ref_parameters = Vec::new();
        for (index, parameter) in lambda.parameters.iter().enumerate() {
            let definition = self.locals.define(parameter);
            self.instructions
                .emit(Instruction::InitParameter(definition.operand));
            if parameter.is_by_ref() {
                by_ref_parameters.push(index);
            }
        }

        let returns_value = !lambda.return_type.is_void();
        if returns_value {
            self.compile(&lambda.body)?;
        } else {
            self.compile_as_void(&lambda.body)?;
        }
        debug_assert_eq!(
            self.instructions.current_stack_depth(),
            usize::from(returns_value)
        );

        for info in self.labels.values() {
            info.validate_finish()?;
        }

        let closure_variables = self.locals.closure_variables().to_vec();
        let locals = &self.locals;
        self.instructions.resolve_locals(|var| locals.is_boxed(var));
        let local_count = self.locals.max_local_count();
        let code = self
            .instructions
            .to_array()
            .map_err(CompileError::UnmarkedLabel)?;

        debug!(
            name = lambda.display_name(),
            instructions = code.instructions.len(),
            locals = local_count,
            max_stack = code.max_stack_depth,
            captured = closure_variables.len(),
            "Compiled lambda"
        );

        let interpreter = Interpreter {
            name: lambda.display_name().to_string(),
            code,
            local_count,
            arg_count: lambda.parameters.len(),
            by_ref_parameters,
            returns_value,
            closure_size: closure_variables.len(),
            debug_infos: self.debug_infos,
            options: self.options,
        };
        Ok((
            LightDelegateCreator::new(interpreter, lambda.signature()),
            closure_variables,
        ))
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Compiles `expr`, leaving its value on the stack unless it is void.
    pub(super) fn compile(&mut self, expr: &Expr) -> Result<(), CompileError> {
        let pushed = self.try_push_label_block(expr)?;
        self.compile_no_label_push(expr)?;
        if pushed {
            self.label_scopes.pop();
        }
        Ok(())
    }

    /// Compiles `expr` for its side effects only.
    pub(super) fn compile_as_void(&mut self, expr: &Expr) -> Result<(), CompileError> {
        let pushed = self.try_push_label_block(expr)?;
        let start_depth = self.instructions.current_stack_depth();
        match expr.kind() {
            ExprKind::Assign { target, value } => self.compile_assign(target, value, true)?,
            ExprKind::Block {
                variables,
                expressions,
            } => self.compile_block(expr, variables, expressions, true)?,
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => self.compile_conditional(expr, test, if_true, if_false, true)?,
            _ => {
                self.compile_no_label_push(expr)?;
                if !expr.ty().is_void() {
                    self.instructions.emit_pop();
                }
            }
        }
        debug_assert_eq!(self.instructions.current_stack_depth(), start_depth);
        if pushed {
            self.label_scopes.pop();
        }
        Ok(())
    }

    pub(super) fn compile_with(&mut self, expr: &Expr, as_void: bool) -> Result<(), CompileError> {
        if as_void {
            self.compile_as_void(expr)
        } else {
            self.compile(expr)
        }
    }

    fn compile_no_label_push(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr.kind() {
            // === Leaves ===
            ExprKind::Constant(value) => {
                if !expr.ty().is_void() {
                    self.instructions.emit_load(value.clone());
                }
            }
            ExprKind::Default => {
                if !expr.ty().is_void() {
                    self.instructions.emit_load(expr.ty().default_value());
                }
            }
            ExprKind::Parameter(parameter) => self.compile_get_variable(parameter)?,

            // === Operators ===
            ExprKind::Unary {
                op,
                operand,
                method,
            } => self.compile_unary(expr, *op, operand, method.as_ref())?,
            ExprKind::Binary {
                op,
                left,
                right,
                method,
                lifted_to_null,
            } => self.compile_binary(*op, left, right, method.as_ref(), *lifted_to_null)?,
            ExprKind::TypeIs { operand, test } => {
                self.compile(operand)?;
                self.instructions.emit(Instruction::TypeIs(test.clone()));
            }
            ExprKind::TypeEqual { operand, test } => {
                self.compile(operand)?;
                self.instructions.emit(Instruction::TypeEqual(test.clone()));
            }

            // === Control flow ===
            ExprKind::Assign { target, value } => self.compile_assign(target, value, false)?,
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => self.compile_conditional(expr, test, if_true, if_false, false)?,
            ExprKind::Block {
                variables,
                expressions,
            } => self.compile_block(expr, variables, expressions, false)?,
            ExprKind::Loop {
                body,
                break_label,
                continue_label,
            } => self.compile_loop(expr, body, break_label.as_ref(), continue_label.as_ref())?,
            ExprKind::Label {
                target,
                default_value,
            } => self.compile_label(target, default_value.as_ref())?,
            ExprKind::Goto { target, value, .. } => {
                self.compile_goto(expr, target, value.as_ref())?
            }
            ExprKind::Switch {
                value,
                cases,
                default_body,
                comparison,
            } => self.compile_switch(expr, value, cases, default_body.as_ref(), comparison.as_ref())?,
            ExprKind::Try {
                body,
                handlers,
                finally,
                fault,
            } => self.compile_try(expr, body, handlers, finally.as_ref(), fault.as_ref())?,
            ExprKind::Throw(exception) => self.compile_throw(expr, exception.as_ref())?,

            // === Members and objects ===
            ExprKind::Call {
                method,
                instance,
                arguments,
            } => self.compile_call(method, instance.as_ref(), arguments)?,
            ExprKind::Invoke { target, arguments } => {
                self.compile_invoke(expr, target, arguments)?
            }
            ExprKind::New {
                class,
                constructor,
                arguments,
            } => self.compile_new(class, constructor.as_ref(), arguments)?,
            ExprKind::NewArrayInit { element, items } => {
                for item in items {
                    self.compile(item)?;
                }
                self.instructions.emit(Instruction::NewArray {
                    element: element.clone(),
                    count: items.len() as u32,
                });
            }
            ExprKind::NewArrayBounds { element, length } => {
                self.compile(length)?;
                self.instructions
                    .emit(Instruction::NewArrayBounds(element.clone()));
            }
            ExprKind::Index {
                object,
                indexer,
                arguments,
            } => self.compile_index(object, indexer.as_ref(), arguments)?,
            ExprKind::Member { object, member } => self.compile_member(object.as_ref(), member)?,

            // === Closures ===
            ExprKind::Lambda(lambda) => self.compile_lambda(lambda)?,
            ExprKind::Quote(quoted) => self.compile_quote(quoted)?,
            ExprKind::RuntimeVariables(variables) => {
                for variable in variables {
                    let resolved = self.ensure_available_for_closure(variable)?;
                    self.emit_load_box(resolved);
                }
                self.instructions
                    .emit(Instruction::RuntimeVariables(variables.len() as u32));
            }
            ExprKind::DebugInfo(info) => self.compile_debug_info(info),
        }
        Ok(())
    }

    // ========================================================================
    // Label scopes
    // ========================================================================

    /// Opens the label scope `expr` introduces, if any.
    fn try_push_label_block(&mut self, expr: &Expr) -> Result<bool, CompileError> {
        let current = self.label_scopes.current();
        match expr.kind() {
            ExprKind::Label { target, .. } => {
                // A label directly in a block belongs to the block's scope.
                if self.label_scopes.kind(current) == LabelScopeKind::Block {
                    if self.label_scopes.contains(current, target) {
                        return Ok(false);
                    }
                    if let Some(parent) = self.label_scopes.parent(current) {
                        if self.label_scopes.kind(parent) == LabelScopeKind::Switch
                            && self.label_scopes.contains(parent, target)
                        {
                            return Ok(false);
                        }
                    }
                }
                self.label_scopes.push(LabelScopeKind::Statement);
            }
            ExprKind::Block { expressions, .. } => {
                let in_switch = self.label_scopes.kind(current) == LabelScopeKind::Switch;
                self.label_scopes.push(LabelScopeKind::Block);
                // Labels directly in the block are valid for the whole block.
                if !in_switch {
                    self.define_labels_in(expressions)?;
                }
            }
            ExprKind::Switch {
                cases,
                default_body,
                ..
            } => {
                self.label_scopes.push(LabelScopeKind::Switch);
                // Case labels are in scope for the whole switch, so jumps
                // between cases stay local.
                for body in cases.iter().map(|c| &c.body).chain(default_body) {
                    if let ExprKind::Block { expressions, .. } = body.kind() {
                        self.define_labels_in(expressions)?;
                    }
                }
            }
            ExprKind::Unary {
                op: UnaryOp::Convert,
                ..
            } if expr.ty().is_void() => self.label_scopes.push(LabelScopeKind::Statement),
            ExprKind::Conditional { .. } | ExprKind::Loop { .. } | ExprKind::Goto { .. } => {
                self.label_scopes.push(LabelScopeKind::Statement)
            }
            _ => {
                if self.label_scopes.kind(current) == LabelScopeKind::Expression {
                    return Ok(false);
                }
                self.label_scopes.push(LabelScopeKind::Expression);
            }
        }
        Ok(true)
    }

    fn define_labels_in(&mut self, expressions: &[Expr]) -> Result<(), CompileError> {
        for expr in expressions {
            if let ExprKind::Label { target, .. } = expr.kind() {
                self.define_label(target)?;
            }
        }
        Ok(())
    }

    pub(super) fn define_label(&mut self, target: &LabelTarget) -> Result<(), CompileError> {
        let scope = self.label_scopes.current();
        self.labels
            .entry(target.clone())
            .or_insert_with(|| LabelInfo::new(target.clone()))
            .define(&mut self.label_scopes, scope)
    }

    /// Records a jump to `target` from the current scope.
    pub(super) fn reference_label(
        &mut self,
        target: &LabelTarget,
    ) -> Result<BranchLabelId, CompileError> {
        let scope = self.label_scopes.current();
        let info = self
            .labels
            .entry(target.clone())
            .or_insert_with(|| LabelInfo::new(target.clone()));
        info.reference(&self.label_scopes, scope)?;
        Ok(info.branch_label(&mut self.instructions))
    }

    pub(super) fn branch_label(&mut self, target: &LabelTarget) -> BranchLabelId {
        self.labels
            .entry(target.clone())
            .or_insert_with(|| LabelInfo::new(target.clone()))
            .branch_label(&mut self.instructions)
    }

    /// Whether the label of a `Label` node was already defined by its
    /// enclosing block or switch.
    pub(super) fn is_block_label(&self, target: &LabelTarget) -> bool {
        let current = self.label_scopes.current();
        if self.label_scopes.kind(current) != LabelScopeKind::Block {
            return false;
        }
        self.label_scopes.contains(current, target)
            || self.label_scopes.parent(current).is_some_and(|parent| {
                self.label_scopes.kind(parent) == LabelScopeKind::Switch
                    && self.label_scopes.contains(parent, target)
            })
    }

    // ========================================================================
    // Variables
    // ========================================================================

    fn capture(&mut self, parameter: &ParameterExpr) -> Result<Resolved, CompileError> {
        if !self.is_nested {
            return Err(CompileError::UndefinedVariable(
                parameter.name().unwrap_or("<anonymous>").to_string(),
            ));
        }
        Ok(Resolved::Closure(self.locals.add_closure_variable(parameter)))
    }

    pub(super) fn resolve(&mut self, parameter: &ParameterExpr) -> Result<Resolved, CompileError> {
        match self.locals.lookup(parameter) {
            Some(resolved) => Ok(resolved),
            None => self.capture(parameter),
        }
    }

    /// Resolves `parameter` so that its cell can be handed out.
    fn ensure_available_for_closure(
        &mut self,
        parameter: &ParameterExpr,
    ) -> Result<Resolved, CompileError> {
        match self.locals.lookup(parameter) {
            Some(Resolved::Local(local)) => {
                self.locals.box_variable(local.var);
                Ok(Resolved::Local(local))
            }
            Some(resolved) => Ok(resolved),
            None => self.capture(parameter),
        }
    }

    fn emit_load_box(&mut self, resolved: Resolved) {
        self.instructions.emit(match resolved {
            Resolved::Local(local) => Instruction::LoadLocalBox(local),
            Resolved::Closure(index) => Instruction::LoadClosureBox(index),
        });
    }

    fn compile_get_variable(&mut self, parameter: &ParameterExpr) -> Result<(), CompileError> {
        let instruction = match self.resolve(parameter)? {
            Resolved::Local(local) => Instruction::LoadLocal(local),
            Resolved::Closure(index) => Instruction::LoadClosure(index),
        };
        self.instructions.emit(instruction);
        Ok(())
    }

    /// Stores the value on top of the stack into `parameter`, keeping it on
    /// the stack unless `as_void`.
    pub(super) fn compile_set_variable(
        &mut self,
        parameter: &ParameterExpr,
        as_void: bool,
    ) -> Result<(), CompileError> {
        let instruction = match (self.resolve(parameter)?, as_void) {
            (Resolved::Local(local), true) => Instruction::StoreLocal(local),
            (Resolved::Local(local), false) => Instruction::AssignLocal(local),
            (Resolved::Closure(index), true) => Instruction::StoreClosure(index),
            (Resolved::Closure(index), false) => Instruction::AssignClosure(index),
        };
        self.instructions.emit(instruction);
        Ok(())
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn compile_unary(
        &mut self,
        expr: &Expr,
        op: UnaryOp,
        operand: &Expr,
        method: Option<&Arc<MethodInfo>>,
    ) -> Result<(), CompileError> {
        if let Some(method) = method {
            return self.compile_method_operator(method, &[operand], None);
        }
        let (arith, checked) = match op {
            UnaryOp::UnaryPlus | UnaryOp::IsTrue => return self.compile(operand),
            UnaryOp::Convert | UnaryOp::Unbox => {
                return self.compile_convert(operand, expr.ty(), false)
            }
            UnaryOp::ConvertChecked => return self.compile_convert(operand, expr.ty(), true),
            UnaryOp::TypeAs => {
                self.compile(operand)?;
                self.instructions.emit(Instruction::TypeAs(expr.ty().clone()));
                return Ok(());
            }
            UnaryOp::ArrayLength => {
                self.compile(operand)?;
                self.instructions.emit(Instruction::ArrayLength);
                return Ok(());
            }
            UnaryOp::Negate => (UnaryArith::Negate, false),
            UnaryOp::NegateChecked => (UnaryArith::Negate, true),
            UnaryOp::Not | UnaryOp::OnesComplement | UnaryOp::IsFalse => (UnaryArith::Not, false),
            UnaryOp::Increment => (UnaryArith::Increment, false),
            UnaryOp::Decrement => (UnaryArith::Decrement, false),
        };
        let kind = operand.ty().underlying_kind().ok_or_else(|| {
            CompileError::Unsupported(format!("{:?} on operand of type {}", op, operand.ty()))
        })?;
        self.compile(operand)?;
        self.instructions.emit(Instruction::Unary {
            op: arith,
            kind,
            checked,
        });
        Ok(())
    }

    fn compile_convert(&mut self, operand: &Expr, to: &Type, checked: bool) -> Result<(), CompileError> {
        if to.is_void() {
            return self.compile_as_void(operand);
        }
        self.compile(operand)?;
        if operand.ty() != to {
            self.instructions.emit(Instruction::Convert {
                to: to.clone(),
                checked,
            });
        }
        Ok(())
    }

    fn compile_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        method: Option<&Arc<MethodInfo>>,
        lifted_to_null: bool,
    ) -> Result<(), CompileError> {
        match op {
            BinaryOp::AndAlso | BinaryOp::OrElse => {
                if method.is_some() {
                    return Err(CompileError::Unsupported(format!(
                        "{:?} with a user-defined operator",
                        op
                    )));
                }
                return self.compile_logical(op == BinaryOp::AndAlso, left, right);
            }
            BinaryOp::Coalesce => return self.compile_coalesce(left, right),
            BinaryOp::ArrayIndex => {
                self.compile(left)?;
                self.compile(right)?;
                self.instructions.emit(Instruction::GetArrayItem);
                return Ok(());
            }
            _ => {}
        }

        if let Some(method) = method {
            let null_result = compare_op(op).map(|cmp| {
                if lifted_to_null {
                    Value::Null
                } else {
                    Value::Bool(cmp == CompareOp::Ne)
                }
            });
            return self.compile_method_operator(method, &[left, right], null_result);
        }

        if let Some(cmp) = compare_op(op) {
            self.compile(left)?;
            self.compile(right)?;
            self.instructions.emit(Instruction::Compare {
                op: cmp,
                kind: left.ty().underlying_kind(),
                lifted_to_null,
            });
            return Ok(());
        }

        let (arith, checked) = arith_op(op)
            .ok_or_else(|| CompileError::Unsupported(format!("binary operator {:?}", op)))?;
        self.compile(left)?;
        self.compile(right)?;
        if matches!(arith, ArithOp::And | ArithOp::Or) && left.ty().is_nullable() && left.ty().is_bool_like() {
            self.instructions.emit(Instruction::LiftedLogical {
                is_and: arith == ArithOp::And,
            });
            return Ok(());
        }
        let kind = left.ty().underlying_kind().ok_or_else(|| {
            CompileError::Unsupported(format!("{:?} on operands of type {}", op, left.ty()))
        })?;
        self.instructions.emit(Instruction::Arith {
            op: arith,
            kind,
            checked,
        });
        Ok(())
    }

    /// A user-defined operator. When nullable operands meet non-nullable
    /// parameters the call is lifted: any null operand skips the call.
    fn compile_method_operator(
        &mut self,
        method: &Arc<MethodInfo>,
        operands: &[&Expr],
        comparison_null_result: Option<Value>,
    ) -> Result<(), CompileError> {
        for operand in operands {
            self.compile(operand)?;
        }
        let lifted = operands.iter().any(|o| o.ty().is_nullable())
            && method.parameters.iter().all(|p| !p.ty.is_nullable());
        let null_result = lifted.then(|| comparison_null_result.unwrap_or(Value::Null));
        self.instructions.emit(Instruction::Call {
            method: method.clone(),
            arg_count: operands.len() as u32,
            updaters: None,
            null_result,
        });
        Ok(())
    }

    /// Short-circuit `&&` and `||`. Over nullable bools a null left operand
    /// still evaluates the right one.
    fn compile_logical(&mut self, is_and: bool, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        let short_circuit = self.instructions.make_label();
        let end = self.instructions.make_label();

        if left.ty().is_nullable() {
            let temp = self.locals.define_temp();
            self.compile(left)?;
            self.instructions.emit(Instruction::AssignLocal(temp));
            self.emit_branch_on(is_and, short_circuit);
            self.instructions.emit(Instruction::LoadLocal(temp));
            self.compile(right)?;
            self.instructions.emit(Instruction::LiftedLogical { is_and });
            self.locals.release(temp);
        } else {
            self.compile(left)?;
            self.emit_branch_on(is_and, short_circuit);
            self.compile(right)?;
        }
        self.instructions.emit_branch(end, false, true);
        self.instructions.mark_label(short_circuit);
        self.instructions.emit_load(Value::Bool(!is_and));
        self.instructions.mark_label(end);
        Ok(())
    }

    fn emit_branch_on(&mut self, is_and: bool, label: BranchLabelId) {
        if is_and {
            self.instructions.emit_branch_false(label);
        } else {
            self.instructions.emit_branch_true(label);
        }
    }

    fn compile_coalesce(&mut self, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        let end = self.instructions.make_label();
        self.compile(left)?;
        self.instructions.emit_coalescing_branch(end);
        self.instructions.emit_pop();
        self.compile(right)?;
        self.instructions.mark_label(end);
        Ok(())
    }

    fn compile_conditional(
        &mut self,
        expr: &Expr,
        test: &Expr,
        if_true: &Expr,
        if_false: &Expr,
        as_void: bool,
    ) -> Result<(), CompileError> {
        let as_void = as_void || expr.ty().is_void();
        self.compile(test)?;

        if is_empty(if_true) {
            let end_of_false = self.instructions.make_label();
            self.instructions.emit_branch_true(end_of_false);
            self.compile_with(if_false, as_void)?;
            self.instructions.mark_label(end_of_false);
            return Ok(());
        }

        let end_of_true = self.instructions.make_label();
        self.instructions.emit_branch_false(end_of_true);
        self.compile_with(if_true, as_void)?;
        if is_empty(if_false) {
            self.instructions.mark_label(end_of_true);
        } else {
            let end_of_false = self.instructions.make_label();
            self.instructions.emit_branch(end_of_false, false, !as_void);
            self.instructions.mark_label(end_of_true);
            self.compile_with(if_false, as_void)?;
            self.instructions.mark_label(end_of_false);
        }
        Ok(())
    }

    // ========================================================================
    // Closures and metadata
    // ========================================================================

    fn compile_lambda(&mut self, lambda: &LambdaExpr) -> Result<(), CompileError> {
        let child = LightCompiler::new(self.options.clone(), true);
        let (creator, captured) = child.compile_lambda_body(lambda)?;
        for variable in &captured {
            let resolved = self.ensure_available_for_closure(variable)?;
            self.emit_load_box(resolved);
        }
        debug!(
            lambda = creator.name(),
            captured = captured.len(),
            "Emitting closure creation"
        );
        self.instructions.emit(Instruction::CreateClosure {
            creator: Arc::new(creator),
            count: captured.len() as u32,
        });
        Ok(())
    }

    /// Binds the quoted tree's free variables to the cells of the variables
    /// in scope here.
    fn compile_quote(&mut self, quoted: &Expr) -> Result<(), CompileError> {
        let variables = free_variables(quoted);
        for variable in &variables {
            let resolved = self.ensure_available_for_closure(variable)?;
            self.emit_load_box(resolved);
        }
        self.instructions.emit(Instruction::Quote {
            expr: quoted.clone(),
            variables: variables.into(),
        });
        Ok(())
    }

    fn compile_debug_info(&mut self, info: &DebugInfoExpr) {
        if !self.options.emit_debug_info {
            return;
        }
        self.debug_infos.push(DebugInfo {
            start_line: info.start_line,
            start_column: info.start_column,
            end_line: info.end_line,
            end_column: info.end_column,
            index: self.instructions.count(),
            file_name: info.document.file_name.as_str().into(),
            is_clear: info.is_clear(),
        });
    }
}

/// The `Expr::empty()` placeholder of an absent branch.
fn is_empty(expr: &Expr) -> bool {
    matches!(expr.kind(), ExprKind::Default) && expr.ty().is_void()
}

fn compare_op(op: BinaryOp) -> Option<CompareOp> {
    Some(match op {
        BinaryOp::Equal => CompareOp::Eq,
        BinaryOp::NotEqual => CompareOp::Ne,
        BinaryOp::LessThan => CompareOp::Lt,
        BinaryOp::LessThanOrEqual => CompareOp::Le,
        BinaryOp::GreaterThan => CompareOp::Gt,
        BinaryOp::GreaterThanOrEqual => CompareOp::Ge,
        _ => return None,
    })
}

fn arith_op(op: BinaryOp) -> Option<(ArithOp, bool)> {
    Some(match op {
        BinaryOp::Add => (ArithOp::Add, false),
        BinaryOp::AddChecked => (ArithOp::Add, true),
        BinaryOp::Subtract => (ArithOp::Sub, false),
        BinaryOp::SubtractChecked => (ArithOp::Sub, true),
        BinaryOp::Multiply => (ArithOp::Mul, false),
        BinaryOp::MultiplyChecked => (ArithOp::Mul, true),
        BinaryOp::Divide => (ArithOp::Div, false),
        BinaryOp::Modulo => (ArithOp::Rem, false),
        BinaryOp::Power => (ArithOp::Pow, false),
        BinaryOp::And => (ArithOp::And, false),
        BinaryOp::Or => (ArithOp::Or, false),
        BinaryOp::ExclusiveOr => (ArithOp::Xor, false),
        BinaryOp::LeftShift => (ArithOp::Shl, false),
        BinaryOp::RightShift => (ArithOp::Shr, false),
        _ => return None,
    })
}
