//! The instruction set.
//!
//! Every instruction declares its effect on the operand stack and on the
//! continuation stack so the compiler can track depths while emitting, and
//! executes by returning the relative offset of the next instruction.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use super::arith::{self, ArithOp, UnaryArith};
use super::by_ref::{ByRefUpdater, WriteBack};
use super::calls;
use super::compare::{self, CompareOp};
use super::convert;
use super::frame::InterpretedFrame;
use super::handlers::{self, TryCatchFinallyHandler, TryFaultHandler};
use super::light_lambda::LightDelegateCreator;
use super::Thrown;
use crate::expr::{Expr, FieldInfo, MethodInfo, ParameterExpr};
use crate::types::{ClassInfo, NumericKind, Type};
use crate::values::{
    ArrayRef, Exception, ObjectRef, QuotedExpr, StrongBox, StructValue, Value,
};

/// Identifies one variable definition within a lambda being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub(crate) u32);

/// Operand of every local-variable instruction.
///
/// `boxed` is filled in when the owning lambda is frozen: a definition
/// captured by a nested closure lives in a heap cell, and every access to it
/// goes through the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalOperand {
    pub index: u32,
    pub var: VarId,
    pub boxed: bool,
}

impl LocalOperand {
    pub(crate) fn new(index: u32, var: VarId) -> Self {
        Self {
            index,
            var,
            boxed: false,
        }
    }
}

#[derive(Debug)]
pub enum Instruction {
    // === Stack ===
    Nop,
    /// Pushes an inline constant (primitives and null).
    LoadConstant(Value),
    /// Pushes a constant from the object pool.
    LoadCached(u32),
    Pop,
    Dup,

    // === Locals and closure variables ===
    LoadLocal(LocalOperand),
    /// Pops into a local.
    StoreLocal(LocalOperand),
    /// Stores into a local, keeping the value on the stack.
    AssignLocal(LocalOperand),
    InitLocal {
        local: LocalOperand,
        default: Value,
    },
    /// Moves a captured parameter into a fresh cell on entry.
    InitParameter(LocalOperand),
    /// Pushes the cell of a boxed local.
    LoadLocalBox(LocalOperand),
    LoadClosure(u32),
    StoreClosure(u32),
    AssignClosure(u32),
    LoadClosureBox(u32),

    // === Operators ===
    Arith {
        op: ArithOp,
        kind: NumericKind,
        checked: bool,
    },
    Unary {
        op: UnaryArith,
        kind: NumericKind,
        checked: bool,
    },
    Compare {
        op: CompareOp,
        kind: Option<NumericKind>,
        lifted_to_null: bool,
    },
    /// Three-valued `&`/`|` over nullable bools.
    LiftedLogical {
        is_and: bool,
    },
    Convert {
        to: Type,
        checked: bool,
    },
    TypeAs(Type),
    TypeIs(Type),
    TypeEqual(Type),

    // === Control flow ===
    Branch {
        offset: i32,
        has_result: bool,
        has_value: bool,
    },
    /// Pops; jumps when the value is `true`.
    BranchTrue(i32),
    /// Pops; jumps when the value is `false`.
    BranchFalse(i32),
    /// Jumps keeping the value when it is not null; falls through otherwise.
    CoalescingBranch(i32),
    /// Jumps to a runtime label, running any finally blocks in between.
    Goto {
        label: u32,
        has_result: bool,
        has_value: bool,
        label_gets_value: bool,
    },
    IntSwitch {
        cases: Arc<HashMap<i64, i32>>,
    },
    StringSwitch {
        cases: Arc<HashMap<Arc<str>, i32>>,
        null_case: i32,
    },

    // === Exceptions ===
    EnterTryCatchFinally {
        finally_label: Option<u32>,
        handler: Option<Arc<TryCatchFinallyHandler>>,
    },
    EnterTryFault {
        handler: Option<Arc<TryFaultHandler>>,
    },
    EnterFinally(u32),
    LeaveFinally,
    EnterFault(u32),
    LeaveFault,
    /// Marks the start of a catch body; the exception arrives on the stack.
    EnterExceptionHandler {
        has_value: bool,
    },
    EnterExceptionFilter,
    /// End of a filter region; the filter result is on top of the stack.
    LeaveExceptionFilter,
    Throw {
        rethrow: bool,
        has_result: bool,
    },

    // === Calls and objects ===
    Call {
        method: Arc<MethodInfo>,
        arg_count: u32,
        updaters: Option<Box<[ByRefUpdater]>>,
        /// Result pushed without calling when any argument is null.
        null_result: Option<Value>,
    },
    Invoke {
        arg_count: u32,
        has_result: bool,
        updaters: Option<Box<[ByRefUpdater]>>,
    },
    New {
        class: Arc<ClassInfo>,
        constructor: Option<Arc<MethodInfo>>,
        arg_count: u32,
    },
    NewArray {
        element: Type,
        count: u32,
    },
    NewArrayBounds(Type),
    ArrayLength,
    GetArrayItem,
    SetArrayItem,
    LoadField(Arc<FieldInfo>),
    StoreField(Arc<FieldInfo>),
    /// Replaces a field of the struct on the stack, pushing the new struct.
    SetStructField(Arc<FieldInfo>),
    /// Pops a value and writes it to a previously evaluated location.
    StoreByRef(Box<WriteBack>),
    CreateClosure {
        creator: Arc<LightDelegateCreator>,
        count: u32,
    },
    Quote {
        expr: Expr,
        variables: Arc<[ParameterExpr]>,
    },
    RuntimeVariables(u32),
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        use Instruction::*;
        match self {
            Nop => "Nop",
            LoadConstant(_) => "LoadConstant",
            LoadCached(_) => "LoadCached",
            Pop => "Pop",
            Dup => "Dup",
            LoadLocal(_) => "LoadLocal",
            StoreLocal(_) => "StoreLocal",
            AssignLocal(_) => "AssignLocal",
            InitLocal { .. } => "InitLocal",
            InitParameter(_) => "InitParameter",
            LoadLocalBox(_) => "LoadLocalBox",
            LoadClosure(_) => "LoadClosure",
            StoreClosure(_) => "StoreClosure",
            AssignClosure(_) => "AssignClosure",
            LoadClosureBox(_) => "LoadClosureBox",
            Arith { .. } => "Arith",
            Unary { .. } => "Unary",
            Compare { .. } => "Compare",
            LiftedLogical { .. } => "LiftedLogical",
            Convert { .. } => "Convert",
            TypeAs(_) => "TypeAs",
            TypeIs(_) => "TypeIs",
            TypeEqual(_) => "TypeEqual",
            Branch { .. } => "Branch",
            BranchTrue(_) => "BranchTrue",
            BranchFalse(_) => "BranchFalse",
            CoalescingBranch(_) => "CoalescingBranch",
            Goto { .. } => "Goto",
            IntSwitch { .. } => "IntSwitch",
            StringSwitch { .. } => "StringSwitch",
            EnterTryCatchFinally { .. } => "EnterTryCatchFinally",
            EnterTryFault { .. } => "EnterTryFault",
            EnterFinally(_) => "EnterFinally",
            LeaveFinally => "LeaveFinally",
            EnterFault(_) => "EnterFault",
            LeaveFault => "LeaveFault",
            EnterExceptionHandler { .. } => "EnterExceptionHandler",
            EnterExceptionFilter => "EnterExceptionFilter",
            LeaveExceptionFilter => "LeaveExceptionFilter",
            Throw { .. } => "Throw",
            Call { .. } => "Call",
            Invoke { .. } => "Invoke",
            New { .. } => "New",
            NewArray { .. } => "NewArray",
            NewArrayBounds(_) => "NewArrayBounds",
            ArrayLength => "ArrayLength",
            GetArrayItem => "GetArrayItem",
            SetArrayItem => "SetArrayItem",
            LoadField(_) => "LoadField",
            StoreField(_) => "StoreField",
            SetStructField(_) => "SetStructField",
            StoreByRef(_) => "StoreByRef",
            CreateClosure { .. } => "CreateClosure",
            Quote { .. } => "Quote",
            RuntimeVariables(_) => "RuntimeVariables",
        }
    }

    pub fn consumed_stack(&self) -> usize {
        use Instruction::*;
        match self {
            Pop | StoreLocal(_) | StoreClosure(_) | Unary { .. } | Convert { .. } | TypeAs(_)
            | TypeIs(_) | TypeEqual(_) | BranchTrue(_) | BranchFalse(_)
            | CoalescingBranch(_) | IntSwitch { .. } | StringSwitch { .. }
            | LeaveExceptionFilter | Throw { .. } | NewArrayBounds(_) | ArrayLength
            | StoreByRef(_) => 1,
            Dup | AssignLocal(_) | AssignClosure(_) => 1,
            Arith { .. } | Compare { .. } | LiftedLogical { .. } | GetArrayItem
            | SetStructField(_) => 2,
            SetArrayItem => 3,
            Branch { has_value, .. } | Goto { has_value, .. } => usize::from(*has_value),
            EnterExceptionHandler { has_value } => usize::from(*has_value),
            LoadField(field) => usize::from(!field.is_static()),
            StoreField(field) => 1 + usize::from(!field.is_static()),
            Call { arg_count, .. } | New { arg_count, .. } => *arg_count as usize,
            Invoke { arg_count, .. } => *arg_count as usize + 1,
            NewArray { count, .. } | CreateClosure { count, .. } | RuntimeVariables(count) => {
                *count as usize
            }
            Quote { variables, .. } => variables.len(),
            _ => 0,
        }
    }

    pub fn produced_stack(&self) -> usize {
        use Instruction::*;
        match self {
            LoadConstant(_) | LoadCached(_) | LoadLocal(_) | LoadLocalBox(_) | LoadClosure(_)
            | LoadClosureBox(_) | Unary { .. } | Convert { .. } | TypeAs(_) | TypeIs(_)
            | TypeEqual(_) | CoalescingBranch(_) | NewArrayBounds(_) | ArrayLength
            | Arith { .. } | Compare { .. } | LiftedLogical { .. } | GetArrayItem
            | SetStructField(_) | LoadField(_) | New { .. } | NewArray { .. }
            | CreateClosure { .. } | Quote { .. } | RuntimeVariables(_)
            | EnterExceptionHandler { .. } | EnterExceptionFilter => 1,
            Dup => 2,
            AssignLocal(_) | AssignClosure(_) => 1,
            Branch { has_result, .. } | Goto { has_result, .. } | Throw { has_result, .. } => {
                usize::from(*has_result)
            }
            Call { method, .. } => usize::from(method.returns_value()),
            Invoke { has_result, .. } => usize::from(*has_result),
            _ => 0,
        }
    }

    pub fn consumed_continuations(&self) -> usize {
        match self {
            Instruction::EnterFinally(_) => 1,
            _ => 0,
        }
    }

    pub fn produced_continuations(&self) -> usize {
        match self {
            Instruction::EnterTryCatchFinally {
                finally_label: Some(_),
                ..
            } => 1,
            _ => 0,
        }
    }

    /// Visits every local operand, for freeze-time resolution.
    pub(crate) fn for_each_local_mut(&mut self, f: &mut dyn FnMut(&mut LocalOperand)) {
        use Instruction::*;
        match self {
            LoadLocal(op) | StoreLocal(op) | AssignLocal(op) | InitParameter(op)
            | LoadLocalBox(op) | InitLocal { local: op, .. } => f(op),
            Call {
                updaters: Some(updaters),
                ..
            }
            | Invoke {
                updaters: Some(updaters),
                ..
            } => {
                for updater in updaters.iter_mut() {
                    updater.write_back.for_each_local_mut(f);
                }
            }
            StoreByRef(write_back) => write_back.for_each_local_mut(f),
            _ => {}
        }
    }

    /// Sets the offset of a branch once its label is marked.
    pub(crate) fn set_offset(&mut self, new_offset: i32) {
        use Instruction::*;
        match self {
            Branch { offset, .. } => *offset = new_offset,
            BranchTrue(offset) | BranchFalse(offset) | CoalescingBranch(offset) => {
                *offset = new_offset
            }
            _ => debug_assert!(false, "{} has no branch offset", self.name()),
        }
    }

    pub(crate) fn run(&self, frame: &mut InterpretedFrame<'_>) -> Result<isize, Thrown> {
        use Instruction::*;
        match self {
            Nop => {}
            LoadConstant(value) => frame.push(value.clone()),
            LoadCached(index) => {
                let value = frame.interpreter.code.objects[*index as usize].clone();
                frame.push(value);
            }
            Pop => {
                frame.pop();
            }
            Dup => {
                let value = frame.peek().clone();
                frame.push(value);
            }

            // === Locals ===
            LoadLocal(local) => {
                let value = frame.load_local(local);
                frame.push(value);
            }
            StoreLocal(local) => {
                let value = frame.pop();
                frame.store_local(local, value);
            }
            AssignLocal(local) => {
                let value = frame.peek().clone();
                frame.store_local(local, value);
            }
            InitLocal { local, default } => frame.init_local(local, default.clone()),
            InitParameter(local) => {
                if local.boxed {
                    let slot = &mut frame.data[local.index as usize];
                    let value = std::mem::take(slot);
                    *slot = Value::Cell(StrongBox::new(value));
                }
            }
            LoadLocalBox(local) => {
                let cell = frame.local_box(local);
                frame.push(Value::Cell(cell));
            }
            LoadClosure(index) => {
                let value = frame.closure_cell(*index)?.get();
                frame.push(value);
            }
            StoreClosure(index) => {
                let value = frame.pop();
                frame.closure_cell(*index)?.set(value);
            }
            AssignClosure(index) => {
                let value = frame.peek().clone();
                frame.closure_cell(*index)?.set(value);
            }
            LoadClosureBox(index) => {
                let cell = frame.closure_cell(*index)?.clone();
                frame.push(Value::Cell(cell));
            }

            // === Operators ===
            Arith { op, checked, .. } => {
                let right = frame.pop();
                let left = frame.pop();
                frame.push(arith::binary(*op, *checked, &left, &right)?);
            }
            Unary { op, checked, .. } => {
                let operand = frame.pop();
                frame.push(arith::unary(*op, *checked, &operand)?);
            }
            Compare {
                op, lifted_to_null, ..
            } => {
                let right = frame.pop();
                let left = frame.pop();
                frame.push(compare::compare(*op, *lifted_to_null, &left, &right));
            }
            LiftedLogical { is_and } => {
                let right = frame.pop();
                let left = frame.pop();
                frame.push(arith::lifted_logical(*is_and, &left, &right));
            }
            Convert { to, checked } => {
                let value = frame.pop();
                frame.push(convert::convert(value, to, *checked)?);
            }
            TypeAs(ty) => {
                let value = frame.pop();
                frame.push(convert::type_as(value, ty));
            }
            TypeIs(ty) => {
                let value = frame.pop();
                frame.push(Value::Bool(value.is_instance_of(ty)));
            }
            TypeEqual(ty) => {
                let value = frame.pop();
                frame.push(Value::Bool(value.has_exact_type(ty)));
            }

            // === Control flow ===
            // A carried value stays in its slot; the target's depth counts it.
            Branch { offset, .. } => return Ok(*offset as isize),
            BranchTrue(offset) => {
                if frame.pop().as_bool() == Some(true) {
                    return Ok(*offset as isize);
                }
            }
            BranchFalse(offset) => {
                if frame.pop().as_bool() == Some(false) {
                    return Ok(*offset as isize);
                }
            }
            CoalescingBranch(offset) => {
                if !frame.peek().is_null() {
                    return Ok(*offset as isize);
                }
            }
            Goto {
                label,
                has_value,
                label_gets_value,
                ..
            } => {
                let value = if *has_value { Some(frame.pop()) } else { None };
                let value = if *label_gets_value { value } else { None };
                return Ok(frame.goto(*label as usize, value));
            }
            IntSwitch { cases } => {
                let value = frame.pop();
                let offset = switch_key(&value)
                    .and_then(|key| cases.get(&key).copied())
                    .unwrap_or(1);
                return Ok(offset as isize);
            }
            StringSwitch { cases, null_case } => {
                let offset = match frame.pop() {
                    Value::Str(s) => cases.get(&*s).copied().unwrap_or(1),
                    Value::Null => *null_case,
                    _ => 1,
                };
                return Ok(offset as isize);
            }

            // === Exceptions ===
            EnterTryCatchFinally {
                finally_label,
                handler,
            } => {
                return handlers::enter_try_catch_finally(
                    frame,
                    *finally_label,
                    handler.as_deref(),
                );
            }
            EnterTryFault { handler } => {
                return handlers::enter_try_fault(frame, handler.as_deref());
            }
            EnterFinally(label) => frame.enter_finally(*label as usize),
            LeaveFinally => return Ok(frame.leave_finally()),
            EnterFault(label) => {
                frame.set_stack_depth(frame.label(*label as usize).stack_depth);
            }
            LeaveFault | EnterExceptionHandler { .. } | EnterExceptionFilter => {}
            LeaveExceptionFilter => {
                frame.pop();
            }
            Throw { rethrow, .. } => {
                let exception = match frame.pop() {
                    Value::Exception(exception) => exception,
                    Value::Null => Exception::null_reference(),
                    other => Exception::invalid_operation(format!(
                        "Cannot throw a value of type '{}'.",
                        other.type_name()
                    )),
                };
                return Err(Thrown::new(exception, *rethrow));
            }

            // === Calls and objects ===
            Call {
                method,
                arg_count,
                updaters,
                null_result,
            } => calls::call(
                frame,
                method,
                *arg_count as usize,
                updaters.as_deref(),
                null_result.as_ref(),
            )?,
            Invoke {
                arg_count,
                has_result,
                updaters,
            } => calls::invoke(frame, *arg_count as usize, *has_result, updaters.as_deref())?,
            New {
                class,
                constructor,
                arg_count,
            } => calls::new_object(frame, class, constructor.as_ref(), *arg_count as usize)?,
            NewArray { element, count } => {
                let items = frame.pop_n(*count as usize).collect();
                frame.push(Value::Array(ArrayRef::new(element.clone(), items)));
            }
            NewArrayBounds(element) => {
                let length = frame.pop();
                let length = length
                    .as_i64()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(Exception::overflow)?;
                frame.push(Value::Array(ArrayRef::with_len(element.clone(), length)));
            }
            ArrayLength => {
                let length = match frame.pop() {
                    Value::Array(array) => array.len(),
                    _ => return Err(Exception::null_reference().into()),
                };
                frame.push(Value::I32(length as i32));
            }
            GetArrayItem => {
                let index = frame.pop();
                let array = frame.pop();
                let item = array_of(&array)?.get(index_of(&index)?)?;
                frame.push(item);
            }
            SetArrayItem => {
                let value = frame.pop();
                let index = frame.pop();
                let array = frame.pop();
                array_of(&array)?.set(index_of(&index)?, value)?;
            }
            LoadField(field) => {
                let value = if field.is_static() {
                    field.static_value()
                } else {
                    frame.pop().load_field(field.slot())?
                };
                frame.push(value);
            }
            StoreField(field) => {
                let value = frame.pop();
                if field.is_static() {
                    field.set_static_value(value);
                } else {
                    store_field(&frame.pop(), field, value)?;
                }
            }
            SetStructField(field) => {
                let value = frame.pop();
                let target = frame.pop();
                let updated = match target {
                    Value::Struct(s) => Value::Struct(s.with_field(field.slot(), value)),
                    other => {
                        store_field(&other, field, value)?;
                        other
                    }
                };
                frame.push(updated);
            }
            StoreByRef(write_back) => {
                let value = frame.pop();
                write_back.write(frame, value)?;
            }
            CreateClosure { creator, count } => {
                let cells = pop_cells(frame, *count as usize);
                let lambda = creator.create_delegate(Some(cells.into()));
                frame.push(Value::Function(Arc::new(lambda)));
            }
            Quote { expr, variables } => {
                let cells = pop_cells(frame, variables.len());
                let bindings = variables.iter().cloned().zip(cells).collect();
                frame.push(Value::Quote(Arc::new(QuotedExpr::new(expr.clone(), bindings))));
            }
            RuntimeVariables(count) => {
                let cells = pop_cells(frame, *count as usize);
                frame.push(Value::RuntimeVariables(Arc::new(crate::values::RuntimeVariables::new(cells))));
            }
        }
        Ok(1)
    }
}

/// Jump-table key of an integral switch value: its bits as an `i64`. All
/// keys of one table share a type, so `U64` values past `i64::MAX` cannot
/// collide with anything.
pub(crate) fn switch_key(value: &Value) -> Option<i64> {
    match value {
        Value::U64(v) => Some(*v as i64),
        other => other.as_i64(),
    }
}

fn array_of(value: &Value) -> Result<&ArrayRef, Thrown> {
    match value {
        Value::Array(array) => Ok(array),
        Value::Null => Err(Exception::null_reference().into()),
        other => Err(Exception::invalid_cast(&other.type_name(), &Type::array(Type::Object)).into()),
    }
}

fn index_of(value: &Value) -> Result<i64, Thrown> {
    value
        .as_i64()
        .ok_or_else(|| Exception::index_out_of_range().into())
}

pub(crate) fn store_field(target: &Value, field: &FieldInfo, value: Value) -> Result<(), Thrown> {
    match target {
        Value::Object(object) => object.set_field(field.slot(), value),
        Value::Exception(exception) => exception.set_field(field.slot(), value),
        Value::Null => return Err(Exception::null_reference().into()),
        other => {
            return Err(Exception::invalid_operation(format!(
                "Cannot assign field '{}' of a '{}' in place.",
                field.name(),
                other.type_name()
            ))
            .into());
        }
    }
    Ok(())
}

/// Pops the cells pushed by `LoadLocalBox`/`LoadClosureBox`, bottom first.
fn pop_cells(frame: &mut InterpretedFrame<'_>, count: usize) -> Vec<StrongBox> {
    frame
        .pop_n(count)
        .map(|value| match value {
            Value::Cell(cell) => cell,
            other => StrongBox::new(other),
        })
        .collect()
}

/// Fresh instance of `class` with default-initialized fields.
pub(crate) fn default_instance(class: &Arc<ClassInfo>) -> Value {
    if class.is_value_type() {
        Value::Struct(StructValue::new(class.clone()))
    } else if class.is_subclass_of(&crate::types::BuiltinClasses::get().exception) {
        Value::Exception(Exception::new(class, ""))
    } else {
        Value::Object(ObjectRef::new(class))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        let local = |f: &mut fmt::Formatter<'_>, op: &LocalOperand| {
            write!(f, "{}", op.index)?;
            if op.boxed {
                write!(f, " (boxed)")?;
            }
            Ok(())
        };
        write!(f, "{}", self.name())?;
        match self {
            LoadConstant(value) => write!(f, " {:?}", value),
            LoadCached(index) => write!(f, " #{}", index),
            LoadLocal(op) | StoreLocal(op) | AssignLocal(op) | InitParameter(op)
            | LoadLocalBox(op) | InitLocal { local: op, .. } => {
                write!(f, " ")?;
                local(f, op)
            }
            LoadClosure(i) | StoreClosure(i) | AssignClosure(i) | LoadClosureBox(i) => {
                write!(f, " {}", i)
            }
            Arith { op, kind, checked } => {
                write!(f, " {:?}.{}{}", op, kind.name(), if *checked { " checked" } else { "" })
            }
            Unary { op, kind, checked } => {
                write!(f, " {:?}.{}{}", op, kind.name(), if *checked { " checked" } else { "" })
            }
            Compare {
                op,
                kind,
                lifted_to_null,
            } => {
                write!(f, " {:?}", op)?;
                if let Some(kind) = kind {
                    write!(f, ".{}", kind.name())?;
                }
                if *lifted_to_null {
                    write!(f, " lifted")?;
                }
                Ok(())
            }
            LiftedLogical { is_and } => write!(f, " {}", if *is_and { "And" } else { "Or" }),
            Convert { to, checked } => {
                write!(f, " {}{}", to, if *checked { " checked" } else { "" })
            }
            TypeAs(ty) | TypeIs(ty) | TypeEqual(ty) | NewArrayBounds(ty) => write!(f, " {}", ty),
            Branch { offset, .. }
            | BranchTrue(offset)
            | BranchFalse(offset)
            | CoalescingBranch(offset) => write!(f, " {:+}", offset),
            Goto { label, .. } => write!(f, " L{}", label),
            IntSwitch { cases } => write!(f, " ({} cases)", cases.len()),
            StringSwitch { cases, .. } => write!(f, " ({} cases)", cases.len()),
            EnterFinally(label) | EnterFault(label) => write!(f, " L{}", label),
            Throw { rethrow: true, .. } => write!(f, " rethrow"),
            Call { method, .. } => write!(f, " {}", method.display_name()),
            Invoke { arg_count, .. } => write!(f, " ({} args)", arg_count),
            New { class, .. } => write!(f, " {}", class.name()),
            NewArray { element, count } => write!(f, " {}[{}]", element, count),
            LoadField(field) | StoreField(field) | SetStructField(field) => {
                write!(f, " {}.{}", field.declaring_class(), field.name())
            }
            CreateClosure { creator, count } => {
                write!(f, " {} ({} captured)", creator.name(), count)
            }
            Quote { variables, .. } => write!(f, " ({} bound)", variables.len()),
            RuntimeVariables(count) => write!(f, " {}", count),
            _ => Ok(()),
        }
    }
}
