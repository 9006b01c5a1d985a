use std::fmt;
use std::sync::Arc;

/// A source span attached to an instruction index. Entries are sorted by
/// `index`; an entry covers every instruction up to the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub index: usize,
    pub file_name: Arc<str>,
    pub is_clear: bool,
}

impl DebugInfo {
    /// The span in effect at instruction `index`, if any.
    pub fn matching(infos: &[DebugInfo], index: usize) -> Option<&DebugInfo> {
        let pos = infos.partition_point(|info| info.index <= index);
        let info = infos.get(pos.checked_sub(1)?)?;
        (!info.is_clear).then_some(info)
    }
}

impl fmt::Display for DebugInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clear {
            write!(f, "{}: clear", self.index)
        } else {
            write!(
                f,
                "{}: [{}-{}] '{}'",
                self.index, self.start_line, self.end_line, self.file_name
            )
        }
    }
}

/// One frame of an interpreted stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpretedFrameInfo {
    pub method_name: String,
    pub debug_info: Option<DebugInfo>,
}

impl fmt::Display for InterpretedFrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method_name)?;
        if let Some(info) = &self.debug_info {
            write!(
                f,
                " in {}:{}:{}",
                info.file_name, info.start_line, info.start_column
            )?;
        }
        Ok(())
    }
}
