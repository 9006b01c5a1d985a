//! Invocable values.
//!
//! This module defines the `Callable` trait implemented by every value that
//! can be the target of an `Invoke` node: native Rust closures and interpreted
//! lambdas. The interpreter recognizes its own lambdas through
//! [`Callable::as_light_lambda`] and runs them directly with the caller's
//! frame as parent instead of going through the generic entry point.

use std::fmt;
use std::sync::Arc;

use super::{ExceptionRef, Value};
use crate::interpreter::LightLambda;
use crate::types::Signature;

// ============================================================================
// Callable Trait
// ============================================================================

/// Trait for callable values.
///
/// `invoke` receives the arguments as a mutable slice: parameters declared
/// by-reference are read back from their slot after the call returns.
pub trait Callable: Send + Sync {
    /// Returns the function's type signature.
    fn signature(&self) -> &Signature;

    /// Name used in stack traces and debug output.
    fn name(&self) -> &str {
        "<anonymous>"
    }

    /// Call the function. Exceptions are returned, never panicked.
    fn invoke(&self, args: &mut [Value]) -> Result<Value, ExceptionRef>;

    /// Downcast hook for the interpreter's direct-call fast path.
    fn as_light_lambda(&self) -> Option<&LightLambda> {
        None
    }
}

pub type FunctionRef = Arc<dyn Callable>;

/// Type alias for native function bodies.
///
/// ```ignore
/// let twice: NativeFn = Arc::new(|args: &mut [Value]| match &args[0] {
///     Value::I32(n) => Ok(Value::I32(n * 2)),
///     _ => Err(Exception::invalid_operation("expected I32")),
/// });
/// ```
pub type NativeFn = Arc<dyn Fn(&mut [Value]) -> Result<Value, ExceptionRef> + Send + Sync>;

/// Wrapper for native Rust closures.
pub struct NativeFunction {
    name: String,
    signature: Signature,
    func: NativeFn,
}

impl NativeFunction {
    pub fn new(name: impl Into<String>, signature: Signature, func: NativeFn) -> Self {
        Self {
            name: name.into(),
            signature,
            func,
        }
    }

    /// Convenience for building a `Value::Function` directly.
    pub fn value(
        name: impl Into<String>,
        signature: Signature,
        func: impl Fn(&mut [Value]) -> Result<Value, ExceptionRef> + Send + Sync + 'static,
    ) -> Value {
        Value::Function(Arc::new(Self::new(name, signature, Arc::new(func))))
    }
}

impl Callable for NativeFunction {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, args: &mut [Value]) -> Result<Value, ExceptionRef> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native {}>", self.name)
    }
}
