use std::rc::Rc;

use crate::ast::expr::Argument;
use crate::ast::template::TagNode;
use crate::ast::value::Value;
use crate::error::{RenderError, TemplateSyntaxError};
use crate::eval::{Context, EngineOptions};
use crate::parser::{Parser, Token};
use crate::request::HttpRequest;

use super::{bind, resolve_or_skip};

/// The request bound under the configured request variable, if any.
fn current_request(
    tag: &str,
    ctx: &Context,
    options: &EngineOptions,
) -> Option<Rc<dyn HttpRequest>> {
    match ctx.get(&options.request_variable) {
        Some(Value::Request(request)) => Some(Rc::clone(request)),
        Some(other) => {
            tracing::debug!(
                tag,
                variable = %options.request_variable,
                "expected request, got {}; skipping",
                other.type_name()
            );
            None
        }
        None => {
            tracing::debug!(
                tag,
                variable = %options.request_variable,
                "no request in context; skipping"
            );
            None
        }
    }
}

/// Render `url` directly, or bind it and render nothing when an `as`
/// clause was given.
fn emit(tag: &str, as_var: Option<&Argument>, url: String, ctx: &mut Context) -> String {
    match as_var {
        Some(as_var) => {
            bind(tag, as_var, Value::String(url), ctx);
            String::new()
        }
        None => url,
    }
}

// ── qualified_url ───────────────────────────────────────────────────────

/// `{% qualified_url <path> [as <name>] %}`
///
/// Resolves `path` against the current request's scheme, host and path.
#[derive(Debug)]
pub struct QualifiedUrlNode {
    path: Argument,
    as_var: Option<Argument>,
}

impl QualifiedUrlNode {
    pub fn new(path: Argument, as_var: Option<Argument>) -> Self {
        Self { path, as_var }
    }
}

impl TagNode for QualifiedUrlNode {
    fn render(&self, ctx: &mut Context, options: &EngineOptions) -> Result<String, RenderError> {
        let Some(request) = current_request("qualified_url", ctx, options) else {
            return Ok(String::new());
        };
        let Some(path) = resolve_or_skip("qualified_url", &self.path, ctx) else {
            return Ok(String::new());
        };
        let path = path.to_output_string();
        let url = match request.build_absolute_uri(Some(path.as_str())) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(tag = "qualified_url", path = %path, "cannot build URL: {e}");
                return Ok(String::new());
            }
        };
        Ok(emit("qualified_url", self.as_var.as_ref(), url, ctx))
    }
}

pub(super) fn compile_qualified_url(
    parser: &mut Parser<'_>,
    token: &Token,
) -> Result<Box<dyn TagNode>, TemplateSyntaxError> {
    let bits = token.split_contents()?;
    let as_var = match bits.len() {
        2 => None,
        4 if bits[2] == "as" => Some(parser.compile_filter(&bits[3])?.into()),
        _ => {
            return Err(TemplateSyntaxError::new(format!(
                "'{}' tag must be called with the arguments: 'as', and a context variable name",
                bits[0]
            )));
        }
    };
    let path = parser.compile_filter(&bits[1])?.into();
    Ok(Box::new(QualifiedUrlNode::new(path, as_var)))
}

// ── current_location ────────────────────────────────────────────────────

/// `{% current_location [as <name>] %}`
///
/// The request path plus `?querystring` when the query is non-empty.
#[derive(Debug)]
pub struct CurrentLocationNode {
    as_var: Option<Argument>,
}

impl CurrentLocationNode {
    pub fn new(as_var: Option<Argument>) -> Self {
        Self { as_var }
    }
}

impl TagNode for CurrentLocationNode {
    fn render(&self, ctx: &mut Context, options: &EngineOptions) -> Result<String, RenderError> {
        let Some(request) = current_request("current_location", ctx, options) else {
            return Ok(String::new());
        };
        let url = request.get_full_path();
        Ok(emit("current_location", self.as_var.as_ref(), url, ctx))
    }
}

pub(super) fn compile_current_location(
    parser: &mut Parser<'_>,
    token: &Token,
) -> Result<Box<dyn TagNode>, TemplateSyntaxError> {
    let bits = token.split_contents()?;
    let as_var = match bits.len() {
        1 => None,
        3 if bits[1] == "as" => Some(parser.compile_filter(&bits[2])?.into()),
        _ => {
            return Err(TemplateSyntaxError::new(format!(
                "'{}' tag must be called with the arguments: 'as', and a context variable name",
                bits[0]
            )));
        }
    };
    Ok(Box::new(CurrentLocationNode::new(as_var)))
}
