use std::sync::Arc;

use once_cell::sync::Lazy;

use super::{ClassBuilder, ClassInfo};

/// The exception classes the engine itself raises.
pub struct BuiltinClasses {
    pub exception: Arc<ClassInfo>,
    pub system_exception: Arc<ClassInfo>,
    pub arithmetic: Arc<ClassInfo>,
    pub overflow: Arc<ClassInfo>,
    pub divide_by_zero: Arc<ClassInfo>,
    pub null_reference: Arc<ClassInfo>,
    pub invalid_cast: Arc<ClassInfo>,
    pub index_out_of_range: Arc<ClassInfo>,
    pub invalid_operation: Arc<ClassInfo>,
    pub argument: Arc<ClassInfo>,
    pub insufficient_execution_stack: Arc<ClassInfo>,
    /// Wraps exceptions escaping a native call; unwrapped before matching.
    pub target_invocation: Arc<ClassInfo>,
}

static BUILTINS: Lazy<BuiltinClasses> = Lazy::new(|| {
    let exception = ClassBuilder::new("Exception").build();
    let system_exception = ClassBuilder::new("SystemException")
        .extends(&exception)
        .build();
    let arithmetic = ClassBuilder::new("ArithmeticException")
        .extends(&system_exception)
        .build();
    let sub = |name: &str, base: &Arc<ClassInfo>| ClassBuilder::new(name).extends(base).build();

    BuiltinClasses {
        overflow: sub("OverflowException", &arithmetic),
        divide_by_zero: sub("DivideByZeroException", &arithmetic),
        null_reference: sub("NullReferenceException", &system_exception),
        invalid_cast: sub("InvalidCastException", &system_exception),
        index_out_of_range: sub("IndexOutOfRangeException", &system_exception),
        invalid_operation: sub("InvalidOperationException", &system_exception),
        argument: sub("ArgumentException", &system_exception),
        insufficient_execution_stack: sub("InsufficientExecutionStackException", &system_exception),
        target_invocation: sub("TargetInvocationException", &exception),
        arithmetic,
        system_exception,
        exception,
    }
});

impl BuiltinClasses {
    pub fn get() -> &'static BuiltinClasses {
        &BUILTINS
    }
}
