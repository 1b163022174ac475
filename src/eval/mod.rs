//! Template rendering.
//!
//! The renderer walks a compiled [`Template`] and concatenates the output
//! of each node. Text is copied, `{{ }}` expressions are resolved and
//! autoescaped, and tag nodes render themselves against the [`Context`].

use crate::ast::template::*;
use crate::ast::value::Value;
use crate::error::RenderError;
use crate::registry::builtins::escape_html;

mod context;
mod resolve;

pub use context::Context;
pub use resolve::resolve_value;

// ── Engine options ──────────────────────────────────────────────────────

/// Rendering configuration shared by every template an engine compiles.
///
/// Create with [`EngineOptions::new()`] and chain builder methods:
///
/// ```rust
/// use request_tags::EngineOptions;
///
/// let opts = EngineOptions::new()
///     .autoescape(false)
///     .string_if_invalid("INVALID")
///     .request_variable("req");
/// assert_eq!(opts.request_variable, "req");
/// ```
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// HTML-escape `{{ }}` output that is not marked safe.
    pub autoescape: bool,

    /// Rendered in place of a `{{ }}` expression whose variable is missing.
    /// When empty, the expression's filters run on an empty string instead.
    pub string_if_invalid: String,

    /// Context name the URL tags read the current request from.
    pub request_variable: String,
}

impl EngineOptions {
    /// Defaults: autoescape on, empty `string_if_invalid`, request bound
    /// as `request`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn autoescape(mut self, autoescape: bool) -> Self {
        self.autoescape = autoescape;
        self
    }

    pub fn string_if_invalid(mut self, value: impl Into<String>) -> Self {
        self.string_if_invalid = value.into();
        self
    }

    pub fn request_variable(mut self, name: impl Into<String>) -> Self {
        self.request_variable = name.into();
        self
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            autoescape: true,
            string_if_invalid: String::new(),
            request_variable: "request".to_string(),
        }
    }
}

// ── Rendering ───────────────────────────────────────────────────────────

/// Render a compiled node list against `ctx`.
pub fn render_template(
    template: &Template,
    ctx: &mut Context,
    options: &EngineOptions,
) -> Result<String, RenderError> {
    let mut output = String::new();
    for node in &template.nodes {
        let fragment = match &node.node {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Variable(expr) => render_variable(expr, ctx, options)
                .map_err(|e| if e.span.is_none() { e.with_span(node.span) } else { e })?,
            NodeKind::Tag(tag) => tag
                .render(ctx, options)
                .map_err(|e| if e.span.is_none() { e.with_span(node.span) } else { e })?,
        };
        output.push_str(&fragment);
    }
    Ok(output)
}

fn render_variable(
    expr: &crate::ast::expr::FilterExpression,
    ctx: &Context,
    options: &EngineOptions,
) -> Result<String, RenderError> {
    let value = match expr.resolve(ctx, false) {
        Ok(value) => value,
        Err(e) if e.is_missing_variable() => {
            tracing::debug!("{e}; rendering string_if_invalid");
            if !options.string_if_invalid.is_empty() {
                return Ok(options.string_if_invalid.clone());
            }
            expr.apply_filters(ctx, Value::String(String::new()))?
        }
        Err(e) => return Err(e),
    };
    Ok(output_value(&value, options))
}

fn output_value(value: &Value, options: &EngineOptions) -> String {
    let text = value.to_output_string();
    if options.autoescape && !value.is_safe() {
        escape_html(&text)
    } else {
        text
    }
}
