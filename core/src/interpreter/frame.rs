use super::debug_info::{DebugInfo, InterpretedFrameInfo};
use super::instruction::LocalOperand;
use super::instruction_list::RuntimeLabel;
use super::{Interpreter, Thrown};
use crate::values::{Exception, ExceptionRef, StrongBox, Value};

/// A jump waiting for the finally blocks between it and its target to run.
#[derive(Debug)]
pub(crate) struct PendingJump {
    label: usize,
    value: Option<Value>,
}

/// Execution state of one interpreted call.
///
/// `data` holds the locals followed by the operand stack; `stack_index` is
/// the absolute index of the next free stack slot.
pub struct InterpretedFrame<'a> {
    pub(crate) interpreter: &'a Interpreter,
    parent: Option<&'a InterpretedFrame<'a>>,
    closure: &'a [StrongBox],
    depth: usize,
    pub(crate) data: Vec<Value>,
    pub(crate) stack_index: usize,
    pub(crate) instruction_index: usize,
    /// Runtime labels of the finally blocks currently protecting execution.
    pub(crate) continuations: Vec<usize>,
    pub(crate) pending: Option<PendingJump>,
    /// Pending jumps suspended while their finally block runs.
    pub(crate) saved_pending: Vec<Option<PendingJump>>,
    /// Entry indices of the try regions whose bodies are running, outermost
    /// first.
    pub(crate) active_tries: Vec<usize>,
}

impl<'a> InterpretedFrame<'a> {
    pub(crate) fn new(
        interpreter: &'a Interpreter,
        parent: Option<&'a InterpretedFrame<'a>>,
        closure: &'a [StrongBox],
    ) -> Self {
        let depth = parent.map_or(0, |p| p.depth + 1);
        let size = interpreter.local_count + interpreter.code.max_stack_depth;
        tracing::trace!(method = %interpreter.name, depth, size, "Creating frame");
        Self {
            interpreter,
            parent,
            closure,
            depth,
            data: vec![Value::Null; size],
            stack_index: interpreter.local_count,
            instruction_index: 0,
            continuations: Vec::with_capacity(interpreter.code.max_continuation_depth),
            pending: None,
            saved_pending: Vec::new(),
            active_tries: Vec::new(),
        }
    }

    /// Number of interpreted frames below this one.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<&InterpretedFrame<'a>> {
        self.parent
    }

    pub fn method_name(&self) -> &str {
        &self.interpreter.name
    }

    pub fn debug_info(&self) -> Option<&DebugInfo> {
        DebugInfo::matching(&self.interpreter.debug_infos, self.instruction_index)
    }

    /// This frame and its callers, innermost first.
    pub fn stack_trace(&self) -> Vec<InterpretedFrameInfo> {
        let mut trace = Vec::new();
        let mut current = Some(self);
        while let Some(frame) = current {
            trace.push(InterpretedFrameInfo {
                method_name: frame.method_name().to_string(),
                debug_info: frame.debug_info().cloned(),
            });
            current = frame.parent;
        }
        trace
    }

    // === Operand stack ===

    pub(crate) fn push(&mut self, value: Value) {
        self.data[self.stack_index] = value;
        self.stack_index += 1;
    }

    pub(crate) fn pop(&mut self) -> Value {
        self.stack_index -= 1;
        std::mem::take(&mut self.data[self.stack_index])
    }

    pub(crate) fn peek(&self) -> &Value {
        &self.data[self.stack_index - 1]
    }

    /// Pops the top `count` values, bottom first.
    pub(crate) fn pop_n(&mut self, count: usize) -> impl Iterator<Item = Value> + '_ {
        let first = self.stack_index - count;
        self.stack_index = first;
        self.data[first..first + count].iter_mut().map(std::mem::take)
    }

    pub(crate) fn set_stack_depth(&mut self, depth: usize) {
        self.stack_index = self.interpreter.local_count + depth;
    }

    // === Locals ===

    pub(crate) fn load_local(&self, local: &LocalOperand) -> Value {
        match &self.data[local.index as usize] {
            Value::Cell(cell) if local.boxed => cell.get(),
            value => value.clone(),
        }
    }

    pub(crate) fn store_local(&mut self, local: &LocalOperand, value: Value) {
        let slot = &mut self.data[local.index as usize];
        match slot {
            Value::Cell(cell) if local.boxed => cell.set(value),
            _ if local.boxed => *slot = Value::Cell(StrongBox::new(value)),
            _ => *slot = value,
        }
    }

    pub(crate) fn init_local(&mut self, local: &LocalOperand, value: Value) {
        self.data[local.index as usize] = if local.boxed {
            Value::Cell(StrongBox::new(value))
        } else {
            value
        };
    }

    /// The heap cell of a boxed local.
    pub(crate) fn local_box(&mut self, local: &LocalOperand) -> StrongBox {
        let slot = &mut self.data[local.index as usize];
        match slot {
            Value::Cell(cell) => cell.clone(),
            _ => {
                let cell = StrongBox::new(std::mem::take(slot));
                *slot = Value::Cell(cell.clone());
                cell
            }
        }
    }

    /// Current value of argument `index`, looking through its box.
    pub(crate) fn argument(&self, index: usize) -> Value {
        match &self.data[index] {
            Value::Cell(cell) => cell.get(),
            value => value.clone(),
        }
    }

    pub(crate) fn closure_cell(&self, index: u32) -> Result<&'a StrongBox, Thrown> {
        let closure = self.closure;
        closure.get(index as usize).ok_or_else(|| {
            Exception::invalid_operation(format!("Closure slot {} is not bound.", index)).into()
        })
    }

    // === Jumps ===

    pub(crate) fn label(&self, index: usize) -> RuntimeLabel {
        self.interpreter.code.labels[index]
    }

    fn offset_to(&self, index: usize) -> isize {
        index as isize - self.instruction_index as isize
    }

    /// Starts a jump to runtime label `label`, detouring through any finally
    /// blocks the target lies outside of. Returns the instruction offset.
    pub(crate) fn goto(&mut self, label: usize, value: Option<Value>) -> isize {
        self.pending = Some(PendingJump { label, value });
        self.yield_to_pending_continuation()
    }

    pub(crate) fn push_continuation(&mut self, label: usize) {
        self.continuations.push(label);
    }

    pub(crate) fn yield_to_pending_continuation(&mut self) -> isize {
        let Some(pending) = &self.pending else {
            return 1;
        };
        let target = self.label(pending.label);
        if let Some(&finally) = self.continuations.last() {
            if target.continuation_stack_depth < self.continuations.len() {
                let finally = self.label(finally);
                self.set_stack_depth(finally.stack_depth);
                return self.offset_to(finally.index);
            }
        }
        let value = self.pending.take().and_then(|p| p.value);
        self.set_stack_depth(target.stack_depth);
        if let Some(value) = value {
            self.data[self.stack_index - 1] = value;
        }
        self.offset_to(target.index)
    }

    pub(crate) fn enter_finally(&mut self, label: usize) {
        if self.pending.is_none() {
            self.set_stack_depth(self.label(label).stack_depth);
        }
        let pending = self.pending.take();
        self.saved_pending.push(pending);
        self.continuations.pop();
    }

    /// Returns the offset to continue at: the next instruction when the
    /// finally block was entered by falling out of a failed region, the
    /// suspended jump otherwise.
    pub(crate) fn leave_finally(&mut self) -> isize {
        self.pending = self.saved_pending.pop().flatten();
        if self.pending.is_none() {
            1
        } else {
            self.yield_to_pending_continuation()
        }
    }

    /// Lands on a handler or filter label with the exception on top of the stack.
    pub(crate) fn enter_handler(&mut self, label: usize, exception: ExceptionRef) {
        let target = self.label(label);
        self.set_stack_depth(target.stack_depth);
        self.data[self.stack_index - 1] = Value::Exception(exception);
        self.instruction_index = target.index;
    }

    /// Drops jump state from regions an exception unwound through.
    pub(crate) fn unwind_to(&mut self, continuations: usize, saved_pending: usize) {
        self.pending = None;
        self.continuations.truncate(continuations);
        self.saved_pending.truncate(saved_pending);
    }

    // === Execution ===

    /// Runs the instruction at `index`, returning the next index.
    pub(crate) fn step(&mut self, index: usize) -> Result<usize, Thrown> {
        let interpreter = self.interpreter;
        self.instruction_index = index;
        let offset = interpreter.code.instructions[index].run(self)?;
        let next = (index as isize + offset) as usize;
        self.instruction_index = next;
        Ok(next)
    }

    /// Runs from `start` while the instruction pointer stays in
    /// `start..end`, returning where it left the range.
    pub(crate) fn run_block(&mut self, start: usize, end: usize) -> Result<usize, Thrown> {
        let mut index = start;
        self.instruction_index = index;
        while index >= start && index < end {
            index = self.step(index)?;
        }
        Ok(index)
    }
}
