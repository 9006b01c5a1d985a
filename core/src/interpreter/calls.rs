use std::sync::Arc;

use smallvec::SmallVec;

use super::by_ref::ByRefUpdater;
use super::frame::InterpretedFrame;
use super::instruction::default_instance;
use super::Thrown;
use crate::expr::{MethodBody, MethodInfo};
use crate::types::ClassInfo;
use crate::values::{Exception, Value};

type Args = SmallVec<[Value; 4]>;

fn pop_args(frame: &mut InterpretedFrame<'_>, count: usize) -> Args {
    frame.pop_n(count).collect()
}

/// Calls `method` with `args`, running interpreted bodies directly on top of
/// `frame`.
pub(crate) fn call_method(
    frame: &InterpretedFrame<'_>,
    method: &MethodInfo,
    args: &mut [Value],
) -> Result<Value, Thrown> {
    if !method.is_static && args.first().map_or(true, Value::is_null) {
        return Err(Exception::null_reference().into());
    }
    match &method.body {
        MethodBody::Native(body) => body(args).map_err(|e| e.unwrap_invocation().into()),
        MethodBody::Interpreted(lambda) => lambda.run_in(args, Some(frame)),
        MethodBody::Abstract => Err(Exception::invalid_operation(format!(
            "Cannot call abstract method '{}'.",
            method.display_name()
        ))
        .into()),
    }
}

fn run_updaters(
    frame: &mut InterpretedFrame<'_>,
    updaters: Option<&[ByRefUpdater]>,
    args: &mut [Value],
) -> Result<(), Thrown> {
    for updater in updaters.unwrap_or_default() {
        let value = std::mem::take(&mut args[updater.arg_index]);
        updater.write_back.write(frame, value)?;
    }
    Ok(())
}

pub(crate) fn call(
    frame: &mut InterpretedFrame<'_>,
    method: &Arc<MethodInfo>,
    arg_count: usize,
    updaters: Option<&[ByRefUpdater]>,
    null_result: Option<&Value>,
) -> Result<(), Thrown> {
    let mut args = pop_args(frame, arg_count);
    if let Some(result) = null_result {
        if args.iter().any(Value::is_null) {
            frame.push(result.clone());
            return Ok(());
        }
    }
    let result = call_method(frame, method, &mut args)?;
    run_updaters(frame, updaters, &mut args)?;
    if method.returns_value() {
        frame.push(result);
    }
    Ok(())
}

/// Invokes the delegate below the arguments on the stack.
pub(crate) fn invoke(
    frame: &mut InterpretedFrame<'_>,
    arg_count: usize,
    has_result: bool,
    updaters: Option<&[ByRefUpdater]>,
) -> Result<(), Thrown> {
    let mut args = pop_args(frame, arg_count);
    let result = match frame.pop() {
        Value::Function(function) => match function.as_light_lambda() {
            Some(lambda) => lambda.run_in(&mut args, Some(&*frame))?,
            None => function
                .invoke(&mut args)
                .map_err(|e| Thrown::from(e.unwrap_invocation()))?,
        },
        Value::Null => return Err(Exception::null_reference().into()),
        other => {
            return Err(Exception::invalid_operation(format!(
                "Value of type '{}' is not invocable.",
                other.type_name()
            ))
            .into())
        }
    };
    run_updaters(frame, updaters, &mut args)?;
    if has_result {
        frame.push(result);
    }
    Ok(())
}

pub(crate) fn new_object(
    frame: &mut InterpretedFrame<'_>,
    class: &Arc<ClassInfo>,
    constructor: Option<&Arc<MethodInfo>>,
    arg_count: usize,
) -> Result<(), Thrown> {
    let instance = match constructor {
        Some(constructor) => {
            let mut args = pop_args(frame, arg_count);
            call_method(frame, constructor, &mut args)?
        }
        None => default_instance(class),
    };
    frame.push(instance);
    Ok(())
}
