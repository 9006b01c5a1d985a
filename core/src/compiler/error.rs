//! Errors raised while lowering an expression tree.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Control cannot enter a try, catch or fault block to reach label '{0}'")]
    ControlCannotEnterTry(String),

    #[error("Control cannot enter an expression to reach label '{0}'")]
    ControlCannotEnterExpression(String),

    #[error("Control cannot leave a finally block")]
    ControlCannotLeaveFinally,

    #[error("Control cannot leave a filter test")]
    ControlCannotLeaveFilterTest,

    #[error("Cannot jump to ambiguous label '{0}'")]
    AmbiguousJump(String),

    #[error("Label '{0}' is defined more than once in the same scope")]
    LabelTargetAlreadyDefined(String),

    #[error("Reference to undefined label '{0}'")]
    LabelTargetUndefined(String),

    #[error("Cannot jump to non-local label '{0}' with a value")]
    NonLocalJumpWithValue(String),

    #[error("Rethrow is only allowed inside a catch block")]
    RethrowOutsideCatch,

    #[error("Expression of kind {0} cannot be assigned to")]
    NotAnLvalue(&'static str),

    #[error("Cannot create an instance of abstract class '{0}'")]
    AbstractConstruction(String),

    #[error("Variable '{0}' is referenced but not defined in scope")]
    UndefinedVariable(String),

    /// A branch refers to a label that was never placed. Indicates a
    /// compiler bug rather than a malformed tree.
    #[error("Branch label #{0} was never marked")]
    UnmarkedLabel(usize),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Display name of a label target for error messages.
pub(crate) fn label_name(target: &crate::expr::LabelTarget) -> String {
    target.name().unwrap_or("<anonymous>").to_string()
}
