//! Protected regions and the exceptional half of the continuation protocol.
//!
//! A try region runs through [`InterpretedFrame::run_block`] restricted to
//! its index range. Normal exits (falling off the end through the trailing
//! `Goto`, or any jump out) leave the range and let the main loop continue;
//! finally blocks on those paths run through the continuation stack. Only a
//! thrown exception is handled here, in two passes: [`dispatch`] first
//! picks the handler among every try region active in the frame (running
//! filters), then the exception unwinds region by region, running finally
//! and fault bodies inline, until it reaches the chosen handler.

use smallvec::SmallVec;
use tracing::debug;

use super::frame::InterpretedFrame;
use super::instruction::Instruction;
use super::{Dispatch, Interpreter, Thrown};
use crate::types::Type;
use crate::values::{ExceptionRef, Value};

/// Filter code guarding a catch handler: `start..end` leaves a bool on the stack.
#[derive(Debug, Clone)]
pub struct ExceptionFilter {
    pub label: u32,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct ExceptionHandler {
    /// Exception type the handler accepts.
    pub test: Type,
    /// Runtime label the handler body starts at; the exception arrives on
    /// the stack.
    pub label: u32,
    pub start: usize,
    pub end: usize,
    pub filter: Option<ExceptionFilter>,
}

impl ExceptionHandler {
    fn matches(&self, exception: &ExceptionRef) -> bool {
        Value::Exception(exception.clone()).is_instance_of(&self.test)
    }
}

#[derive(Debug)]
pub struct TryCatchFinallyHandler {
    pub try_start: usize,
    pub try_end: usize,
    /// Index of the `Goto` that leaves the try and catch bodies.
    pub goto_end: usize,
    pub finally: Option<(usize, usize)>,
    pub handlers: SmallVec<[ExceptionHandler; 2]>,
}

#[derive(Debug)]
pub struct TryFaultHandler {
    pub try_start: usize,
    pub try_end: usize,
    pub goto_end: usize,
    pub fault_start: usize,
    pub fault_end: usize,
}

/// Runs a protected body and, if it ends at the region's exit `Goto`, the
/// exit itself.
fn run_region(
    frame: &mut InterpretedFrame<'_>,
    start: usize,
    end: usize,
    goto_end: usize,
) -> Result<(), Thrown> {
    let index = frame.run_block(start, end)?;
    if index == goto_end {
        frame.step(index)?;
    }
    Ok(())
}

/// Runs the filter with the frame state saved; an exception inside the
/// filter counts as a rejection.
fn filter_accepts(
    frame: &mut InterpretedFrame<'_>,
    filter: &ExceptionFilter,
    exception: &ExceptionRef,
) -> bool {
    let instruction_index = frame.instruction_index;
    let stack_index = frame.stack_index;
    let saved_pending = frame.saved_pending.len();
    // Exceptions raised by the filter never reach the regions around it.
    let active_tries = std::mem::take(&mut frame.active_tries);
    // The search may start inside nested regions; the filter sees only the
    // finally blocks enclosing its own try region.
    let continuations = std::mem::take(&mut frame.continuations);
    let visible = frame.label(filter.label as usize).continuation_stack_depth;
    frame
        .continuations
        .extend_from_slice(&continuations[..visible.min(continuations.len())]);

    frame.enter_handler(filter.label as usize, exception.clone());
    let accepted = match frame.run_block(filter.start, filter.end) {
        Ok(_) => frame.pop().as_bool() == Some(true),
        Err(thrown) => {
            debug!(exception = %thrown.exception, "Exception filter threw");
            false
        }
    };

    frame.active_tries = active_tries;
    frame.continuations = continuations;
    frame.unwind_to(frame.continuations.len(), saved_pending);
    frame.instruction_index = instruction_index;
    frame.stack_index = stack_index;
    accepted
}

impl TryCatchFinallyHandler {
    /// Position of the first handler, in declaration order, accepting the
    /// exception.
    pub(crate) fn find_handler(
        &self,
        frame: &mut InterpretedFrame<'_>,
        exception: &ExceptionRef,
    ) -> Option<usize> {
        self.handlers.iter().position(|handler| {
            handler.matches(exception)
                && handler
                    .filter
                    .as_ref()
                    .map_or(true, |filter| filter_accepts(frame, filter, exception))
        })
    }
}

fn region_handler(interpreter: &Interpreter, region: usize) -> Option<&TryCatchFinallyHandler> {
    match interpreter.code.instructions.get(region) {
        Some(Instruction::EnterTryCatchFinally { handler, .. }) => handler.as_deref(),
        _ => None,
    }
}

/// Picks the handler for `thrown` among the try regions active in this
/// frame, innermost first, running filters as it goes. Nothing unwinds
/// until the search is over, so filters observe the state at the throw.
pub(crate) fn dispatch(frame: &mut InterpretedFrame<'_>, thrown: &mut Thrown) {
    if thrown.dispatch != Dispatch::Pending {
        return;
    }
    let interpreter = frame.interpreter;
    let exception = thrown.exception.unwrap_invocation();
    thrown.dispatch = Dispatch::Uncaught;
    for position in (0..frame.active_tries.len()).rev() {
        let region = frame.active_tries[position];
        let Some(handler) = region_handler(interpreter, region) else {
            continue;
        };
        if let Some(index) = handler.find_handler(frame, &exception) {
            thrown.dispatch = Dispatch::Caught {
                region,
                handler: index,
            };
            return;
        }
    }
}

pub(crate) fn enter_try_catch_finally(
    frame: &mut InterpretedFrame<'_>,
    finally_label: Option<u32>,
    handler: Option<&TryCatchFinallyHandler>,
) -> Result<isize, Thrown> {
    let Some(handler) = handler else {
        debug_assert!(false, "try region was never patched");
        return Ok(1);
    };
    let start = frame.instruction_index;
    let continuations = frame.continuations.len() + usize::from(finally_label.is_some());
    let saved_pending = frame.saved_pending.len();
    let active_tries = frame.active_tries.len();
    if let Some(label) = finally_label {
        frame.push_continuation(label as usize);
    }

    frame.active_tries.push(start);
    let mut outcome = run_region(frame, handler.try_start, handler.try_end, handler.goto_end);
    frame.active_tries.truncate(active_tries + 1);

    if let Err(mut thrown) = outcome {
        frame.unwind_to(continuations, saved_pending);
        dispatch(frame, &mut thrown);
        frame.active_tries.truncate(active_tries);
        outcome = match thrown.dispatch {
            Dispatch::Caught { region, handler: index } if region == start => {
                let catch = &handler.handlers[index];
                let exception = thrown.exception.unwrap_invocation();
                debug!(exception = %exception, handler = %catch.test, "Caught exception");
                frame.enter_handler(catch.label as usize, exception);
                run_region(frame, catch.start, catch.end, handler.goto_end)
            }
            _ => Err(thrown),
        };
    }
    frame.active_tries.truncate(active_tries);

    match outcome {
        Ok(()) => Ok(frame.instruction_index as isize - start as isize),
        Err(mut thrown) => {
            if let Some((finally_start, finally_end)) = handler.finally {
                frame.unwind_to(continuations, saved_pending);
                // Outer filters run before this finally body does.
                dispatch(frame, &mut thrown);
                let fault_index = frame.instruction_index;
                frame.run_block(finally_start, finally_end)?;
                frame.instruction_index = fault_index;
            }
            Err(thrown)
        }
    }
}

pub(crate) fn enter_try_fault(
    frame: &mut InterpretedFrame<'_>,
    handler: Option<&TryFaultHandler>,
) -> Result<isize, Thrown> {
    let Some(handler) = handler else {
        debug_assert!(false, "fault region was never patched");
        return Ok(1);
    };
    let start = frame.instruction_index;
    let continuations = frame.continuations.len();
    let saved_pending = frame.saved_pending.len();
    let active_tries = frame.active_tries.len();

    let outcome = run_region(frame, handler.try_start, handler.try_end, handler.goto_end);
    frame.active_tries.truncate(active_tries);
    match outcome {
        Ok(()) => Ok(frame.instruction_index as isize - start as isize),
        Err(mut thrown) => {
            frame.unwind_to(continuations, saved_pending);
            dispatch(frame, &mut thrown);
            let fault_index = frame.instruction_index;
            frame.run_block(handler.fault_start, handler.fault_end)?;
            frame.instruction_index = fault_index;
            Err(thrown)
        }
    }
}
