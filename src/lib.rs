//! lightvm - a light interpreter for expression trees
//!
//! # Overview
//!
//! Expression trees (arithmetic, comparisons, control flow, exception
//! handling, method calls, closures) are compiled into a linear instruction
//! sequence and run on an explicit operand stack. There is no native code
//! generation: this is the engine to reach for when compiling to machine code
//! is unavailable or not worth the cost.
//!
//! # Quick Start
//!
//! ```
//! use lightvm::expr::{Expr, LambdaExpr, ParameterExpr};
//! use lightvm::{Type, Value, compile};
//!
//! let x = ParameterExpr::new(Type::I32, "x");
//! let square = LambdaExpr::new(
//!     Some("square"),
//!     vec![x.clone()],
//!     Expr::multiply(x.expr(), x.expr()),
//! );
//!
//! let lambda = compile(&square).unwrap();
//! assert_eq!(lambda.run(&mut [Value::I32(7)]).unwrap(), Value::I32(49));
//! ```
//!
//! # Native Methods
//!
//! Host functions are attached to the tree as methods. Arguments arrive as a
//! mutable slice; parameters declared by reference are copied back to the
//! caller's storage after the call returns.
//!
//! ```
//! use lightvm::expr::{Expr, LambdaExpr, MethodInfo, ParameterExpr, ParameterInfo};
//! use lightvm::{Type, Value, compile};
//!
//! let swap_sign = MethodInfo::native_static(
//!     "swap_sign",
//!     vec![ParameterInfo::by_ref("n", Type::I64)],
//!     Type::Void,
//!     |args| {
//!         let n = args[0].as_i64().unwrap_or_default();
//!         args[0] = Value::I64(-n);
//!         Ok(Value::Null)
//!     },
//! );
//!
//! let n = ParameterExpr::new(Type::I64, "n");
//! let body = Expr::block(
//!     vec![],
//!     vec![Expr::call(None, &swap_sign, vec![n.expr()]), n.expr()],
//! );
//! let lambda = compile(&LambdaExpr::new(None, vec![n], body)).unwrap();
//! assert_eq!(lambda.run(&mut [Value::I64(5)]).unwrap(), Value::I64(-5));
//! ```

// Error rendering utilities
pub mod error_renderer;
pub use error_renderer::{CharSet, RenderConfig, render_error, render_error_to};

// Re-export public API from lightvm_core
pub use lightvm_core::api::{CompileOptions, CompileOptionsOverride, Error, compile, compile_with};
pub use lightvm_core::compiler::CompileError;
pub use lightvm_core::interpreter::{DebugInfo, InterpretedFrameInfo, LightLambda};

// Re-export the tree model, types and values
pub use lightvm_core::expr;
pub use lightvm_core::types::{self, BuiltinClasses, ClassBuilder, ClassInfo, Type};
pub use lightvm_core::values::{self, Callable, Exception, ExceptionRef, NativeFunction, Value};
