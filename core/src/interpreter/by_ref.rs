//! Write-back of values to previously evaluated storage locations.
//!
//! Used after calls with by-reference arguments and for assignments to
//! fields of struct-typed lvalues, where the rebuilt struct has to be stored
//! back into the location it was read from.

use std::sync::Arc;

use smallvec::SmallVec;

use super::calls;
use super::frame::InterpretedFrame;
use super::instruction::{store_field, LocalOperand};
use super::Thrown;
use crate::expr::{FieldInfo, MethodInfo};
use crate::values::{Exception, Value};

/// A storage location whose components (array, index, receiver, indexer
/// arguments) were evaluated into locals.
#[derive(Debug, Clone)]
pub enum WriteBack {
    Local(LocalOperand),
    Closure(u32),
    ArrayElement {
        array: LocalOperand,
        index: LocalOperand,
    },
    Field {
        /// Temp holding the receiver; `None` for static fields.
        object: Option<LocalOperand>,
        field: Arc<FieldInfo>,
        /// Where a struct receiver is stored back once updated.
        parent: Option<Box<WriteBack>>,
    },
    Property {
        setter: Arc<MethodInfo>,
        object: Option<LocalOperand>,
        arguments: SmallVec<[LocalOperand; 2]>,
    },
}

impl WriteBack {
    pub(crate) fn write(&self, frame: &mut InterpretedFrame<'_>, value: Value) -> Result<(), Thrown> {
        match self {
            WriteBack::Local(local) => frame.store_local(local, value),
            WriteBack::Closure(index) => frame.closure_cell(*index)?.set(value),
            WriteBack::ArrayElement { array, index } => {
                let index = frame
                    .load_local(index)
                    .as_i64()
                    .ok_or_else(Exception::index_out_of_range)?;
                match frame.load_local(array) {
                    Value::Array(array) => array.set(index, value)?,
                    _ => return Err(Exception::null_reference().into()),
                }
            }
            WriteBack::Field {
                object: None,
                field,
                ..
            } => field.set_static_value(value),
            WriteBack::Field {
                object: Some(object),
                field,
                parent,
            } => match frame.load_local(object) {
                Value::Struct(target) => {
                    let updated = Value::Struct(target.with_field(field.slot(), value));
                    frame.store_local(object, updated.clone());
                    if let Some(parent) = parent {
                        parent.write(frame, updated)?;
                    }
                }
                target => store_field(&target, field, value)?,
            },
            WriteBack::Property {
                setter,
                object,
                arguments,
            } => {
                let mut args: SmallVec<[Value; 4]> = SmallVec::new();
                if let Some(object) = object {
                    args.push(frame.load_local(object));
                }
                args.extend(arguments.iter().map(|arg| frame.load_local(arg)));
                args.push(value);
                calls::call_method(frame, setter, &mut args)?;
            }
        }
        Ok(())
    }

    pub(crate) fn for_each_local_mut(&mut self, f: &mut dyn FnMut(&mut LocalOperand)) {
        match self {
            WriteBack::Local(local) => f(local),
            WriteBack::Closure(_) => {}
            WriteBack::ArrayElement { array, index } => {
                f(array);
                f(index);
            }
            WriteBack::Field { object, parent, .. } => {
                if let Some(object) = object {
                    f(object);
                }
                if let Some(parent) = parent {
                    parent.for_each_local_mut(f);
                }
            }
            WriteBack::Property {
                object, arguments, ..
            } => {
                if let Some(object) = object {
                    f(object);
                }
                arguments.iter_mut().for_each(|arg| f(arg));
            }
        }
    }
}

/// Copies a by-reference argument back to its source after a call.
#[derive(Debug, Clone)]
pub struct ByRefUpdater {
    pub arg_index: usize,
    pub write_back: WriteBack,
}
