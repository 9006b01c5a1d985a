//! Public API: compile an expression tree, run the result.
//!
//! # Example
//!
//! ```
//! use lightvm_core::api::compile;
//! use lightvm_core::expr::{Expr, LambdaExpr, ParameterExpr};
//! use lightvm_core::types::Type;
//! use lightvm_core::values::Value;
//!
//! let x = ParameterExpr::new(Type::I32, "x");
//! let body = Expr::add(x.expr(), Expr::constant(1));
//! let lambda = compile(&LambdaExpr::new(Some("inc"), vec![x], body)).unwrap();
//!
//! let result = lambda.run(&mut [Value::I32(41)]).unwrap();
//! assert_eq!(result, Value::I32(42));
//! ```

pub mod error;
pub mod options;

pub use error::Error;
pub use options::{CompileOptions, CompileOptionsOverride};

use tracing::debug;

use crate::compiler::LightCompiler;
use crate::expr::LambdaExpr;
use crate::interpreter::LightLambda;

/// Compiles a top-level lambda with default options.
pub fn compile(lambda: &LambdaExpr) -> Result<LightLambda, Error> {
    compile_with(CompileOptionsOverride::default(), lambda)
}

/// Compiles a top-level lambda. The lambda must not refer to variables it
/// does not define.
pub fn compile_with(
    options_override: CompileOptionsOverride,
    lambda: &LambdaExpr,
) -> Result<LightLambda, Error> {
    let mut options = CompileOptions::default();
    options.override_with(&options_override);

    let creator = LightCompiler::compile_top(options, lambda)?;
    debug!(name = creator.name(), "Compiled top-level lambda");
    Ok(std::sync::Arc::new(creator).create_delegate(None))
}
