use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use static_assertions::assert_impl_all;
use tracing::debug;

use super::frame::InterpretedFrame;
use super::{Dispatch, Interpreter, Thrown};
use crate::api::Error;
use crate::types::Signature;
use crate::values::{Callable, Exception, ExceptionRef, StrongBox, Value};

thread_local! {
    /// Interpreted calls running on this thread, however they were entered.
    /// Native code re-entering a lambda has no parent frame to count from.
    static ACTIVE_CALLS: Cell<usize> = const { Cell::new(0) };
}

/// Holds one slot of the thread's call budget for the life of a frame.
struct CallDepthGuard;

impl CallDepthGuard {
    fn enter(max_call_depth: usize) -> Option<Self> {
        ACTIVE_CALLS.with(|active| {
            let depth = active.get();
            if depth >= max_call_depth {
                return None;
            }
            active.set(depth + 1);
            Some(CallDepthGuard)
        })
    }
}

impl Drop for CallDepthGuard {
    fn drop(&mut self) {
        ACTIVE_CALLS.with(|active| active.set(active.get().saturating_sub(1)));
    }
}

/// A compiled lambda that has not been bound to a closure yet.
///
/// Nested lambdas compile to one creator each; every evaluation of the
/// lambda expression binds the creator to the current cells of the captured
/// variables.
pub struct LightDelegateCreator {
    interpreter: Arc<Interpreter>,
    signature: Signature,
}

assert_impl_all!(LightDelegateCreator: Send, Sync);

impl LightDelegateCreator {
    pub(crate) fn new(interpreter: Interpreter, signature: Signature) -> Self {
        Self {
            interpreter: Arc::new(interpreter),
            signature,
        }
    }

    pub fn name(&self) -> &str {
        self.interpreter.name()
    }

    pub fn interpreter(&self) -> &Arc<Interpreter> {
        &self.interpreter
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn create_delegate(self: &Arc<Self>, closure: Option<Arc<[StrongBox]>>) -> LightLambda {
        LightLambda {
            creator: self.clone(),
            closure,
        }
    }
}

impl fmt::Debug for LightDelegateCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LightDelegateCreator({})", self.name())
    }
}

/// A runnable lambda: compiled code plus the cells it closed over.
#[derive(Clone)]
pub struct LightLambda {
    creator: Arc<LightDelegateCreator>,
    closure: Option<Arc<[StrongBox]>>,
}

impl LightLambda {
    pub fn creator(&self) -> &Arc<LightDelegateCreator> {
        &self.creator
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.creator.interpreter
    }

    /// Runs the lambda. By-reference parameters' final values are written
    /// back into `args`.
    pub fn run(&self, args: &mut [Value]) -> Result<Value, Error> {
        let expected = self.interpreter().arg_count;
        if args.len() != expected {
            return Err(Error::Api(format!(
                "'{}' expects {} arguments, got {}",
                self.creator.name(),
                expected,
                args.len()
            )));
        }
        self.run_in(args, None)
            .map_err(|thrown| Error::Runtime(thrown.exception))
    }

    /// Runs the lambda for its side effects.
    pub fn run_void(&self, args: &mut [Value]) -> Result<(), Error> {
        self.run(args).map(drop)
    }

    /// Runs on top of `parent`, the calling interpreted frame if any.
    pub(crate) fn run_in(
        &self,
        args: &mut [Value],
        parent: Option<&InterpretedFrame<'_>>,
    ) -> Result<Value, Thrown> {
        let interpreter = self.interpreter();
        if args.len() != interpreter.arg_count {
            return Err(Exception::argument(format!(
                "'{}' expects {} arguments, got {}",
                interpreter.name,
                interpreter.arg_count,
                args.len()
            ))
            .into());
        }
        let Some(_guard) = CallDepthGuard::enter(interpreter.options.max_call_depth) else {
            return Err(Exception::insufficient_execution_stack().into());
        };

        let closure = self.closure.as_deref().unwrap_or_default();
        let mut frame = InterpretedFrame::new(interpreter, parent, closure);
        frame.data[..args.len()].clone_from_slice(args);

        match interpreter.run(&mut frame) {
            Ok(()) => {
                for &index in &interpreter.by_ref_parameters {
                    args[index] = frame.argument(index);
                }
                Ok(if interpreter.returns_value {
                    frame.pop()
                } else {
                    Value::Null
                })
            }
            Err(mut thrown) => {
                debug!(
                    method = %interpreter.name,
                    exception = %thrown.exception,
                    rethrow = thrown.rethrow,
                    "Exception escaped interpreted frame"
                );
                thrown.exception.attach_trace(|| frame.stack_trace());
                // The caller searches its own handlers.
                thrown.dispatch = Dispatch::Pending;
                Err(thrown)
            }
        }
    }
}

impl Callable for LightLambda {
    fn signature(&self) -> &Signature {
        &self.creator.signature
    }

    fn name(&self) -> &str {
        self.creator.name()
    }

    fn invoke(&self, args: &mut [Value]) -> Result<Value, ExceptionRef> {
        self.run_in(args, None).map_err(|thrown| thrown.exception)
    }

    fn as_light_lambda(&self) -> Option<&LightLambda> {
        Some(self)
    }
}

impl fmt::Debug for LightLambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LightLambda({})", self.creator.name())
    }
}
