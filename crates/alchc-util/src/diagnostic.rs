//! Diagnostic module - error collection and reporting.
//!
//! Compiler passes never abort on a user error; they push [`Diagnostic`]
//! records into a [`DiagSink`] and keep going. The driver inspects the sink
//! between passes and stops the pipeline when the previous pass left it
//! non-empty. Within a pass, diagnostics come out in source order; across
//! passes, lexer diagnostics precede parser diagnostics because the passes
//! run to completion one after another.
//!
//! # Examples
//!
//! ```
//! use alchc_util::{DiagCode, DiagSink, Span, Stage};
//!
//! let mut sink = DiagSink::new();
//! sink.error(
//!     Stage::Lexer,
//!     DiagCode::LexUnknownSymbol,
//!     Span::point(0, 1, 1),
//!     "unknown symbol '@'",
//! );
//!
//! assert!(!sink.is_empty());
//! assert_eq!(sink.len(), 1);
//! ```

use crate::Span;
use std::fmt;

/// The pass that produced a diagnostic
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Lexer,
    Parser,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Lexer => write!(f, "lexer"),
            Stage::Parser => write!(f, "parser"),
        }
    }
}

/// Diagnostic code - the kind of error, independent of its message text
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagCode {
    // Lexical
    /// Byte that starts no token
    LexUnknownSymbol,
    /// Numeric literal that failed to parse
    LexBadNumber,
    /// `/*` with no closing `*/`
    LexUnterminatedComment,

    // Syntactic
    /// Expected-but-got token mismatch
    ParseExpected,
    /// `{` with no matching `}`
    ParseUnclosedBrace,
    /// Statement missing its `;` terminator
    ParseMissingSemicolon,

    // Semantic (parse-time)
    /// Second declaration of an already-declared function
    RedefFunction,
    /// Call to a name with no declaration
    UndefFunction,
    /// Reference to a variable not in scope
    UndefVariable,
    /// Call with the wrong number of arguments
    ArgcMismatch,
    /// `proc` call in value position
    VoidInExpr,
    /// `func`/`proc` declaration inside a body
    NestedDecl,
    /// `return` inside a `proc`
    ReturnInProc,
    /// `finish` inside a `func`
    FinishInFunc,
    /// `break`/`continue` outside any `while`
    BreakOutsideLoop,
    /// Control-flow statement at top level
    ToplevelStmt,
}

impl DiagCode {
    /// Stable short name used in rendered output
    pub fn name(self) -> &'static str {
        match self {
            DiagCode::LexUnknownSymbol => "unknown_symbol",
            DiagCode::LexBadNumber => "bad_number",
            DiagCode::LexUnterminatedComment => "unterminated_comment",
            DiagCode::ParseExpected => "expected_token",
            DiagCode::ParseUnclosedBrace => "unclosed_brace",
            DiagCode::ParseMissingSemicolon => "missing_semicolon",
            DiagCode::RedefFunction => "redefined_function",
            DiagCode::UndefFunction => "undefined_function",
            DiagCode::UndefVariable => "undefined_variable",
            DiagCode::ArgcMismatch => "argument_count_mismatch",
            DiagCode::VoidInExpr => "void_call_in_expression",
            DiagCode::NestedDecl => "nested_declaration",
            DiagCode::ReturnInProc => "return_in_proc",
            DiagCode::FinishInFunc => "finish_in_func",
            DiagCode::BreakOutsideLoop => "break_outside_loop",
            DiagCode::ToplevelStmt => "toplevel_control_statement",
        }
    }
}

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single diagnostic record
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    /// Pass that produced the record
    pub stage: Stage,
    /// Error kind
    pub code: DiagCode,
    /// Source location (offset, span length, line, column)
    pub span: Span,
    /// Short human message
    pub message: String,
}

/// Accumulating diagnostic sink
///
/// Owned by the driver and threaded through the lexer and parser. Pushing
/// never fails and never aborts the pass.
#[derive(Debug, Default)]
pub struct DiagSink {
    diags: Vec<Diagnostic>,
}

impl DiagSink {
    /// Create a new empty sink
    pub fn new() -> Self {
        Self { diags: Vec::new() }
    }

    /// Record an error
    pub fn error(
        &mut self,
        stage: Stage,
        code: DiagCode,
        span: Span,
        message: impl Into<String>,
    ) {
        self.diags.push(Diagnostic {
            stage,
            code,
            span,
            message: message.into(),
        });
    }

    /// Number of accumulated diagnostics
    pub fn len(&self) -> usize {
        self.diags.len()
    }

    /// Returns true if no diagnostics were recorded
    pub fn is_empty(&self) -> bool {
        self.diags.is_empty()
    }

    /// Iterate over the records in emission order
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diags.iter()
    }

    /// All records, in emission order
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }
}

/// Render a diagnostic with its source line and a caret marker.
///
/// The caret line reproduces the leading tabs and spaces of the source line
/// so the marker stays aligned under tab-indented code regardless of the
/// terminal's tab width.
///
/// # Examples
///
/// ```
/// use alchc_util::{render_diagnostic, DiagCode, Diagnostic, Span, Stage};
///
/// let diag = Diagnostic {
///     stage: Stage::Parser,
///     code: DiagCode::UndefVariable,
///     span: Span::new(4, 5, 1, 5),
///     message: "undefined variable 'y'".into(),
/// };
/// let out = render_diagnostic("x = y;", "input.src", &diag);
/// assert!(out.contains("input.src:1:5"));
/// assert!(out.contains('^'));
/// ```
pub fn render_diagnostic(source: &str, filename: &str, diag: &Diagnostic) -> String {
    let mut out = format!(
        "{}:{}:{}: error[{}]: {}\n",
        filename, diag.span.line, diag.span.column, diag.code, diag.message
    );

    // A non-ASCII byte can anchor a span inside a UTF-8 sequence; back up
    // to a character boundary before slicing.
    let mut anchor = diag.span.start.min(source.len());
    while anchor > 0 && !source.is_char_boundary(anchor) {
        anchor -= 1;
    }
    let line_start = source[..anchor].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = source[line_start..]
        .find('\n')
        .map(|i| line_start + i)
        .unwrap_or(source.len());
    let line = &source[line_start..line_end];

    out.push_str(line);
    out.push('\n');

    // Leading tabs stay tabs so the caret lands under the marked byte.
    let col = diag.span.column.max(1) as usize - 1;
    for b in line.bytes().take(col) {
        out.push(if b == b'\t' { '\t' } else { ' ' });
    }
    let width = diag.span.len().max(1).min(line.len().saturating_sub(col).max(1));
    for _ in 0..width {
        out.push('^');
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_starts_empty() {
        let sink = DiagSink::new();
        assert!(sink.is_empty());
        assert_eq!(sink.len(), 0);
    }

    #[test]
    fn test_sink_accumulates_in_order() {
        let mut sink = DiagSink::new();
        sink.error(Stage::Lexer, DiagCode::LexUnknownSymbol, Span::DUMMY, "a");
        sink.error(Stage::Parser, DiagCode::UndefVariable, Span::DUMMY, "b");

        let msgs: Vec<_> = sink.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(msgs, vec!["a", "b"]);
    }

    #[test]
    fn test_code_names_are_stable() {
        assert_eq!(DiagCode::LexUnknownSymbol.name(), "unknown_symbol");
        assert_eq!(DiagCode::ReturnInProc.name(), "return_in_proc");
        assert_eq!(DiagCode::ToplevelStmt.name(), "toplevel_control_statement");
    }

    #[test]
    fn test_render_points_at_column() {
        let src = "x = y;\n";
        let diag = Diagnostic {
            stage: Stage::Parser,
            code: DiagCode::UndefVariable,
            span: Span::new(4, 5, 1, 5),
            message: "undefined variable 'y'".into(),
        };
        let out = render_diagnostic(src, "t.src", &diag);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[1], "x = y;");
        assert_eq!(lines[2], "    ^");
    }

    #[test]
    fn test_render_preserves_leading_tabs() {
        let src = "\tx = y;\n";
        let diag = Diagnostic {
            stage: Stage::Parser,
            code: DiagCode::UndefVariable,
            span: Span::new(5, 6, 1, 6),
            message: "undefined variable 'y'".into(),
        };
        let out = render_diagnostic(src, "t.src", &diag);
        let caret_line = out.lines().nth(2).unwrap();
        assert!(caret_line.starts_with('\t'));
        assert!(caret_line.ends_with('^'));
    }

    #[test]
    fn test_render_second_line() {
        let src = "a = 1;\nb = zz;\n";
        let diag = Diagnostic {
            stage: Stage::Parser,
            code: DiagCode::UndefVariable,
            span: Span::new(11, 13, 2, 5),
            message: "undefined variable 'zz'".into(),
        };
        let out = render_diagnostic(src, "t.src", &diag);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[1], "b = zz;");
        assert_eq!(lines[2], "    ^^");
    }
}
