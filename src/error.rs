//! Error types for template compilation and rendering.
//!
//! [`TemplateSyntaxError`] is produced while compiling a template and is
//! fatal: it reaches the template author. [`RenderError`] is produced while
//! rendering. The request tags recover from every render error locally, so
//! in practice it only surfaces from host-defined nodes and filters.

use crate::ast::span::Span;
use thiserror::Error;

// ── Syntax errors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TemplateSyntaxError {
    pub span: Option<Span>,
    pub message: String,
    pub hint: Option<String>,
}

impl TemplateSyntaxError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            span: None,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach `span` unless the error already points somewhere more precise.
    pub fn or_span(self, span: Span) -> Self {
        if self.span.is_some() { self } else { self.with_span(span) }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Format the error with source context for display
    pub fn format_with_source(&self, source: &str, template_name: Option<&str>) -> String {
        let span = self.span.unwrap_or_default();
        let (line, col) = offset_to_line_col(source, span.start);
        let source_line = source.lines().nth(line.saturating_sub(1)).unwrap_or("");

        let location = match template_name {
            Some(name) => format!(" --> {name}:{line}:{col}"),
            None => format!(" --> {line}:{col}"),
        };

        let pointer = " ".repeat(col.saturating_sub(1)) + &"^".repeat(span.len().max(1));

        let mut output = format!(
            "Error: {}\n{location}\n  |\n{line:>3} | {source_line}\n    | {pointer}",
            self.message
        );

        if let Some(hint) = &self.hint {
            output.push_str(&format!("\n  = hint: {hint}"));
        }

        output
    }
}

fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

// ── Render errors ───────────────────────────────────────────────────────

/// An error raised while rendering a compiled template.
///
/// `VariableDoesNotExist` doubles as the signal used by argument
/// resolution: tags match on [`RenderErrorKind`] and degrade to empty
/// output instead of propagating it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RenderError {
    pub kind: RenderErrorKind,
    pub span: Option<Span>,
    pub message: String,
}

impl RenderError {
    pub fn new(kind: RenderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            span: None,
            message: message.into(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn variable_does_not_exist(message: impl Into<String>) -> Self {
        Self::new(RenderErrorKind::VariableDoesNotExist, message)
    }

    pub fn failed_lookup(expr: &str) -> Self {
        Self::variable_does_not_exist(format!("Failed lookup for \"{expr}\""))
    }

    pub fn type_error(expected: &str, got: &str) -> Self {
        Self::new(RenderErrorKind::TypeError, format!("expected {expected}, got {got}"))
    }

    pub fn host_error(message: impl Into<String>) -> Self {
        Self::new(RenderErrorKind::HostError, message)
    }

    pub fn is_missing_variable(&self) -> bool {
        self.kind == RenderErrorKind::VariableDoesNotExist
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderErrorKind {
    /// A context variable, attribute or filter argument could not be found,
    /// or a filter expression resolved to an absent value.
    VariableDoesNotExist,
    /// A tag argument resolved to a value of the wrong kind, such as a
    /// string where a query dict is required.
    TypeError,
    /// Raised by a host-defined node or filter.
    HostError,
}

// ── Combined ────────────────────────────────────────────────────────────

/// Error returned by the one-shot helpers that compile and render in a
/// single call.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] TemplateSyntaxError),
    #[error(transparent)]
    Render(#[from] RenderError),
}
