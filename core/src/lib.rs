// Needed so that doc examples and integration helpers can uniformly refer to
// `::lightvm_core` from within this crate or a different one.
extern crate self as lightvm_core;

pub mod api;
pub mod compiler;
pub mod expr;
pub mod interpreter;
pub mod types;
pub mod values;
