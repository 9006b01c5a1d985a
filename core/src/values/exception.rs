use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::Value;
use crate::interpreter::InterpretedFrameInfo;
use crate::types::{BuiltinClasses, ClassInfo, Type};

pub type ExceptionRef = Arc<Exception>;

/// A program exception.
///
/// Exceptions are shared by reference: catching and rethrowing keeps the same
/// `Arc`, and the interpreted stack trace is attached exactly once, when the
/// exception first escapes an interpreted frame.
pub struct Exception {
    class: Arc<ClassInfo>,
    message: String,
    inner: Option<ExceptionRef>,
    fields: Mutex<Vec<Value>>,
    trace: OnceCell<Vec<InterpretedFrameInfo>>,
}

impl Exception {
    pub fn new(class: &Arc<ClassInfo>, message: impl Into<String>) -> ExceptionRef {
        Self::build(class, message.into(), None)
    }

    pub fn with_inner(
        class: &Arc<ClassInfo>,
        message: impl Into<String>,
        inner: ExceptionRef,
    ) -> ExceptionRef {
        Self::build(class, message.into(), Some(inner))
    }

    fn build(class: &Arc<ClassInfo>, message: String, inner: Option<ExceptionRef>) -> ExceptionRef {
        Arc::new(Exception {
            class: class.clone(),
            message,
            inner,
            fields: Mutex::new(class.default_fields()),
            trace: OnceCell::new(),
        })
    }

    pub fn overflow() -> ExceptionRef {
        Self::new(
            &BuiltinClasses::get().overflow,
            "Arithmetic operation resulted in an overflow.",
        )
    }

    pub fn divide_by_zero() -> ExceptionRef {
        Self::new(
            &BuiltinClasses::get().divide_by_zero,
            "Attempted to divide by zero.",
        )
    }

    pub fn null_reference() -> ExceptionRef {
        Self::new(
            &BuiltinClasses::get().null_reference,
            "Object reference not set to an instance of an object.",
        )
    }

    pub fn invalid_cast(from: &str, to: &Type) -> ExceptionRef {
        Self::new(
            &BuiltinClasses::get().invalid_cast,
            format!("Unable to cast a value of type '{}' to type '{}'.", from, to),
        )
    }

    pub fn index_out_of_range() -> ExceptionRef {
        Self::new(
            &BuiltinClasses::get().index_out_of_range,
            "Index was outside the bounds of the array.",
        )
    }

    pub fn invalid_operation(message: impl Into<String>) -> ExceptionRef {
        Self::new(&BuiltinClasses::get().invalid_operation, message)
    }

    pub fn argument(message: impl Into<String>) -> ExceptionRef {
        Self::new(&BuiltinClasses::get().argument, message)
    }

    pub fn insufficient_execution_stack() -> ExceptionRef {
        Self::new(
            &BuiltinClasses::get().insufficient_execution_stack,
            "Insufficient stack to continue executing the program safely.",
        )
    }

    /// Wraps an exception raised inside a native call.
    pub fn target_invocation(inner: ExceptionRef) -> ExceptionRef {
        Self::with_inner(
            &BuiltinClasses::get().target_invocation,
            "Exception has been thrown by the target of an invocation.",
            inner,
        )
    }

    pub fn class(&self) -> &Arc<ClassInfo> {
        &self.class
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn inner(&self) -> Option<&ExceptionRef> {
        self.inner.as_ref()
    }

    pub fn is_instance_of(&self, class: &ClassInfo) -> bool {
        self.class.is_subclass_of(class)
    }

    pub fn field(&self, slot: usize) -> Value {
        self.fields.lock().get(slot).cloned().unwrap_or(Value::Null)
    }

    pub fn set_field(&self, slot: usize, value: Value) {
        if let Some(cell) = self.fields.lock().get_mut(slot) {
            *cell = value;
        }
    }

    /// Interpreted frames the exception escaped from, innermost first.
    pub fn stack_trace(&self) -> &[InterpretedFrameInfo] {
        self.trace.get().map_or(&[], |trace| trace.as_slice())
    }

    pub(crate) fn attach_trace(&self, trace: impl FnOnce() -> Vec<InterpretedFrameInfo>) {
        self.trace.get_or_init(trace);
    }

    /// Strips invocation wrappers, returning the exception that was really thrown.
    pub fn unwrap_invocation(self: &ExceptionRef) -> ExceptionRef {
        let wrapper = &BuiltinClasses::get().target_invocation;
        let mut current = self;
        while Arc::ptr_eq(&current.class, wrapper) {
            match &current.inner {
                Some(inner) => current = inner,
                None => break,
            }
        }
        current.clone()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class.name(), self.message)
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("class", &self.class.name())
            .field("message", &self.message)
            .field("inner", &self.inner)
            .finish()
    }
}

impl std::error::Error for Exception {}
