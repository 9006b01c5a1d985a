//! Compilation options.

/// Options that shape the compiled code.
///
/// A snapshot is stored in every compiled interpreter, so the options in
/// effect when a lambda was compiled also govern how it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Record `DebugInfo` nodes so runtime stack traces carry source spans.
    pub emit_debug_info: bool,
    /// Deepest chain of nested interpreted calls before
    /// `InsufficientExecutionStackException` is thrown. Every level costs
    /// several host stack frames, so the default stays well inside a 2 MiB
    /// thread stack.
    pub max_call_depth: usize,
    /// Smallest number of constant cases for which a switch is lowered to a
    /// jump table rather than a chain of tests.
    pub switch_table_threshold: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            emit_debug_info: true,
            max_call_depth: 100,
            switch_table_threshold: 2,
        }
    }
}

impl CompileOptions {
    pub fn override_with(&mut self, overrides: &CompileOptionsOverride) {
        if let Some(emit_debug_info) = overrides.emit_debug_info {
            self.emit_debug_info = emit_debug_info;
        }
        if let Some(max_call_depth) = overrides.max_call_depth {
            self.max_call_depth = max_call_depth;
        }
        if let Some(threshold) = overrides.switch_table_threshold {
            self.switch_table_threshold = threshold;
        }
    }
}

/// Per-compilation overrides; `None` keeps the base value.
///
/// ```
/// use lightvm_core::api::{CompileOptions, CompileOptionsOverride};
///
/// let mut options = CompileOptions::default();
/// options.override_with(&CompileOptionsOverride {
///     max_call_depth: Some(50),
///     ..Default::default()
/// });
/// assert_eq!(options.max_call_depth, 50);
/// assert!(options.emit_debug_info);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptionsOverride {
    pub emit_debug_info: Option<bool>,
    pub max_call_depth: Option<usize>,
    pub switch_table_threshold: Option<usize>,
}
