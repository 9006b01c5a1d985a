//! Error rendering using ariadne
//!
//! Runtime errors are printed with their interpreted stack trace. When the
//! text of the document named by the innermost frame's debug info is
//! available, the failing span is shown as an annotated source snippet.

use std::io::Write;
use std::ops::Range;

use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};
use lightvm_core::interpreter::DebugInfo;
use lightvm_core::values::ExceptionRef;

use crate::Error;

/// Character set for rendering error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharSet {
    /// Use Unicode characters for rich visual output.
    #[default]
    Unicode,
    /// Use ASCII-only characters for compatibility.
    Ascii,
}

/// Configuration for error rendering.
#[derive(Debug, Clone)]
pub struct RenderConfig<'a> {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
    /// The character set to use for rendering.
    pub charset: CharSet,
    /// Source text of symbol documents as `(file_name, text)` pairs.
    pub sources: &'a [(&'a str, &'a str)],
}

impl Default for RenderConfig<'_> {
    fn default() -> Self {
        RenderConfig::default()
    }
}

impl RenderConfig<'_> {
    const fn default() -> Self {
        Self {
            color: true,
            charset: CharSet::Unicode,
            sources: &[],
        }
    }

    fn source(&self, file_name: &str) -> Option<&str> {
        self.sources
            .iter()
            .find(|(name, _)| *name == file_name)
            .map(|(_, text)| *text)
    }
}

/// Render an error to stderr using the default config.
pub fn render_error(error: &Error) {
    render_error_to(error, &mut std::io::stderr(), &RenderConfig::default()).ok();
}

/// Render an error to a writer with the given configuration.
///
/// # Example
/// ```
/// use lightvm::expr::{Expr, LambdaExpr};
/// use lightvm::{RenderConfig, compile, render_error_to};
///
/// let body = Expr::divide(Expr::constant(1), Expr::constant(0));
/// let lambda = compile(&LambdaExpr::new(Some("divide"), vec![], body)).unwrap();
/// let error = lambda.run(&mut []).unwrap_err();
///
/// let mut buf = Vec::new();
/// let config = RenderConfig { color: false, ..Default::default() };
/// render_error_to(&error, &mut buf, &config).unwrap();
/// assert!(String::from_utf8_lossy(&buf).contains("at divide"));
/// ```
pub fn render_error_to(
    error: &Error,
    writer: &mut dyn Write,
    config: &RenderConfig,
) -> std::io::Result<()> {
    match error {
        Error::Compilation(err) => writeln!(writer, "Compilation error: {}", err),
        Error::Api(msg) => writeln!(writer, "API error: {}", msg),
        Error::Runtime(exception) => render_exception(exception, writer, config),
    }
}

fn render_exception(
    exception: &ExceptionRef,
    writer: &mut dyn Write,
    config: &RenderConfig,
) -> std::io::Result<()> {
    let trace = exception.stack_trace();
    let snippet = trace
        .first()
        .and_then(|frame| frame.debug_info.as_ref())
        .and_then(|info| Some((info, config.source(&info.file_name)?)));

    match snippet {
        Some((info, source)) => render_snippet(exception, info, source, writer, config)?,
        None => writeln!(writer, "Error: {}", headline(exception))?,
    }

    for frame in trace {
        writeln!(writer, "  at {}", frame)?;
    }
    let mut inner = exception.inner();
    while let Some(cause) = inner {
        writeln!(writer, "Caused by: {}", headline(cause))?;
        inner = cause.inner();
    }
    Ok(())
}

fn headline(exception: &ExceptionRef) -> String {
    if exception.message().is_empty() {
        exception.class().name().to_string()
    } else {
        exception.to_string()
    }
}

fn render_snippet(
    exception: &ExceptionRef,
    info: &DebugInfo,
    source: &str,
    writer: &mut dyn Write,
    config: &RenderConfig,
) -> std::io::Result<()> {
    let filename: &str = &info.file_name;
    let span = span_of(source, info);

    let mut colors = ColorGenerator::new();
    colors.next(); // Skip the first color.

    let ariadne_charset = match config.charset {
        CharSet::Unicode => ariadne::CharSet::Unicode,
        CharSet::Ascii => ariadne::CharSet::Ascii,
    };
    let ariadne_config = ariadne::Config::default()
        .with_color(config.color)
        .with_char_set(ariadne_charset);

    Report::build(ReportKind::Error, (filename, span.clone()))
        .with_message(headline(exception))
        .with_config(ariadne_config)
        .with_label(
            Label::new((filename, span))
                .with_message("exception raised here")
                .with_color(colors.next()),
        )
        .finish()
        .write((filename, Source::from(source)), &mut *writer)
}

/// Char range covered by a debug span. Lines and columns are 1-based; the
/// end column is exclusive. Out-of-range positions clamp to the text.
fn span_of(source: &str, info: &DebugInfo) -> Range<usize> {
    let start = char_offset(source, info.start_line, info.start_column);
    let end = char_offset(source, info.end_line, info.end_column).max(start);
    start..end
}

fn char_offset(source: &str, line: u32, column: u32) -> usize {
    let mut offset = 0;
    for (i, text) in source.split_inclusive('\n').enumerate() {
        let len = text.chars().count();
        if i + 1 == line as usize {
            let width = text.trim_end_matches(['\r', '\n']).chars().count();
            return offset + (column.saturating_sub(1) as usize).min(width);
        }
        offset += len;
    }
    offset
}
