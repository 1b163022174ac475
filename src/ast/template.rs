use std::fmt;

use super::expr::FilterExpression;
use super::span::Spanned;
use crate::error::RenderError;
use crate::eval::{Context, EngineOptions};

/// A compiled node list. Rendering concatenates the output of each node.
#[derive(Debug, Default)]
pub struct Template {
    pub nodes: Vec<Node>,
}

pub type Node = Spanned<NodeKind>;

#[derive(Debug)]
pub enum NodeKind {
    /// Raw text between template constructs.
    Text(String),

    /// `{{ expr }}`. The resolved value is autoescaped unless it is a
    /// safe string.
    Variable(FilterExpression),

    /// `{% tag ... %}`, compiled by the tag's registered compiler.
    Tag(Box<dyn TagNode>),
}

/// A renderable node produced by a tag compiler.
///
/// Nodes render once per template render and may read or bind context
/// variables. Returning an error aborts the whole render, so tags that
/// must never break a page swallow their own failures.
pub trait TagNode: fmt::Debug {
    fn render(&self, ctx: &mut Context, options: &EngineOptions) -> Result<String, RenderError>;
}

/// Node for tags that only affect compilation, such as `{% load %}`.
#[derive(Debug)]
pub struct EmptyNode;

impl TagNode for EmptyNode {
    fn render(&self, _ctx: &mut Context, _options: &EngineOptions) -> Result<String, RenderError> {
        Ok(String::new())
    }
}
