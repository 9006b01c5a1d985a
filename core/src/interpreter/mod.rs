//! The bytecode interpreter.
//!
//! A compiled lambda is an immutable [`Interpreter`]: a flat instruction
//! array plus the constants, runtime labels and debug spans it refers to.
//! Every call runs it against a fresh [`InterpretedFrame`].

pub mod arith;
mod by_ref;
mod calls;
pub mod compare;
pub mod convert;
mod debug_info;
mod frame;
mod handlers;
mod instruction;
mod instruction_list;
mod light_lambda;

#[cfg(test)]
mod interpreter_test;

pub use by_ref::{ByRefUpdater, WriteBack};
pub use debug_info::{DebugInfo, InterpretedFrameInfo};
pub use frame::InterpretedFrame;
pub use handlers::{ExceptionFilter, ExceptionHandler, TryCatchFinallyHandler, TryFaultHandler};
pub use instruction::{Instruction, LocalOperand, VarId};
pub(crate) use instruction::switch_key;
pub use instruction_list::{BranchLabelId, InstructionArray, InstructionList, RuntimeLabel};
pub use light_lambda::{LightDelegateCreator, LightLambda};

use static_assertions::assert_impl_all;

use crate::api::CompileOptions;
use crate::values::ExceptionRef;

/// Outcome of the handler search within the frame an exception is
/// unwinding through.
///
/// The search runs once, from the innermost try region outward, before any
/// finally or fault body is run; the unwind then delivers the exception to
/// the chosen handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// Not searched yet.
    Pending,
    /// Handler `handler` of the try region entered at instruction `region`.
    Caught { region: usize, handler: usize },
    /// No handler in this frame accepts the exception.
    Uncaught,
}

/// A program exception travelling through the engine.
#[derive(Debug, Clone)]
pub(crate) struct Thrown {
    pub exception: ExceptionRef,
    /// Raised by a rethrow of the exception being handled.
    pub rethrow: bool,
    pub dispatch: Dispatch,
}

impl Thrown {
    pub(crate) fn new(exception: ExceptionRef, rethrow: bool) -> Self {
        Self {
            exception,
            rethrow,
            dispatch: Dispatch::Pending,
        }
    }
}

impl From<ExceptionRef> for Thrown {
    fn from(exception: ExceptionRef) -> Self {
        Self::new(exception, false)
    }
}

/// One compiled lambda, ready to run any number of times.
#[derive(Debug)]
pub struct Interpreter {
    pub(crate) name: String,
    pub(crate) code: InstructionArray,
    pub(crate) local_count: usize,
    pub(crate) arg_count: usize,
    /// Parameter slots written back to the caller after the call.
    pub(crate) by_ref_parameters: Vec<usize>,
    pub(crate) returns_value: bool,
    pub(crate) closure_size: usize,
    pub(crate) debug_infos: Vec<DebugInfo>,
    pub(crate) options: CompileOptions,
}

assert_impl_all!(Interpreter: Send, Sync);

impl Interpreter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.code.instructions
    }

    pub fn local_count(&self) -> usize {
        self.local_count
    }

    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    pub fn max_stack_depth(&self) -> usize {
        self.code.max_stack_depth
    }

    pub fn max_continuation_depth(&self) -> usize {
        self.code.max_continuation_depth
    }

    /// Number of captured cells the lambda expects.
    pub fn closure_size(&self) -> usize {
        self.closure_size
    }

    pub fn debug_infos(&self) -> &[DebugInfo] {
        &self.debug_infos
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Checks the stack effects of the instruction stream; see
    /// [`InstructionArray::validate`].
    pub fn validate(&self) -> Result<(), String> {
        self.code.validate()
    }

    pub fn disassemble(&self) -> String {
        self.code.disassemble()
    }

    /// Runs the frame until the instruction pointer leaves the code.
    pub(crate) fn run(&self, frame: &mut InterpretedFrame<'_>) -> Result<(), Thrown> {
        frame.run_block(0, self.code.instructions.len())?;
        Ok(())
    }
}
