//! Lowering of expression trees to interpreter instructions.
//!
//! [`LightCompiler`] walks a lambda's tree once, emitting into an
//! `InstructionList` while tracking stack depth, label scopes and variable
//! slots. Nested lambdas are compiled by child compilers; variables they
//! capture are boxed in the enclosing lambda when it is frozen.

mod control_flow;
mod error;
mod labels;
mod light_compiler;
mod locals;
mod members;

#[cfg(test)]
mod compiler_test;

pub use error::CompileError;
pub use light_compiler::LightCompiler;
