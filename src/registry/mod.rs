//! Tag and filter registration.
//!
//! A [`Library`] maps tag names to [`TagCompiler`]s and filter names to
//! [`Filter`]s. The [`Engine`](crate::Engine) owns one builtins library,
//! available to every template, plus named libraries that templates pull
//! in with `{% load name %}`.
//!
//! Both traits are implemented for plain functions and closures with the
//! matching signature, so most registrations need no wrapper type.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::template::TagNode;
use crate::ast::value::Value;
use crate::error::{RenderError, TemplateSyntaxError};
use crate::parser::{Parser, Token};

pub(crate) mod builtins;

// ── Trait definitions ───────────────────────────────────────────────────

/// Compiles one `{% name ... %}` occurrence into a renderable node.
///
/// Compilers validate the tag's arguments and report problems as
/// [`TemplateSyntaxError`]s; the template then fails to compile. The
/// parser is mutable so tags like `{% load %}` can change which tags and
/// filters the rest of the template sees.
pub trait TagCompiler: Send + Sync {
    fn compile(
        &self,
        parser: &mut Parser<'_>,
        token: &Token,
    ) -> Result<Box<dyn TagNode>, TemplateSyntaxError>;
}

impl<F> TagCompiler for F
where
    F: Fn(&mut Parser<'_>, &Token) -> Result<Box<dyn TagNode>, TemplateSyntaxError> + Send + Sync,
{
    fn compile(
        &self,
        parser: &mut Parser<'_>,
        token: &Token,
    ) -> Result<Box<dyn TagNode>, TemplateSyntaxError> {
        self(parser, token)
    }
}

/// A value transformation applied with `|name` or `|name:arg`.
pub trait Filter: Send + Sync {
    fn apply(&self, value: Value, arg: Option<Value>) -> Result<Value, RenderError>;
}

impl<F> Filter for F
where
    F: Fn(Value, Option<Value>) -> Result<Value, RenderError> + Send + Sync,
{
    fn apply(&self, value: Value, arg: Option<Value>) -> Result<Value, RenderError> {
        self(value, arg)
    }
}

// ── Library ─────────────────────────────────────────────────────────────

/// A named set of tags and filters.
///
/// ```rust
/// use request_tags::{Engine, Library, RenderError, Value};
///
/// let mut library = Library::new();
/// library.register_filter("shout", |value: Value, _arg: Option<Value>| -> Result<Value, RenderError> {
///     Ok(Value::String(value.to_output_string().to_uppercase()))
/// });
///
/// let mut engine = Engine::new();
/// engine.register_library("shouting", library);
/// let template = engine.from_string("{% load shouting %}{{ \"hi\"|shout }}").unwrap();
/// assert_eq!(template.render(&mut Default::default()).unwrap(), "HI");
/// ```
#[derive(Clone, Default)]
pub struct Library {
    tags: HashMap<String, Arc<dyn TagCompiler>>,
    filters: HashMap<String, Arc<dyn Filter>>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tag. A tag with the same name is replaced.
    pub fn register_tag(&mut self, name: impl Into<String>, compiler: impl TagCompiler + 'static) {
        self.tags.insert(name.into(), Arc::new(compiler));
    }

    /// Register a filter. A filter with the same name is replaced.
    pub fn register_filter(&mut self, name: impl Into<String>, filter: impl Filter + 'static) {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub fn tag(&self, name: &str) -> Option<&Arc<dyn TagCompiler>> {
        self.tags.get(name)
    }

    pub fn filter(&self, name: &str) -> Option<&Arc<dyn Filter>> {
        self.filters.get(name)
    }

    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    pub fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    /// Copy every tag and filter of `other` into this library, replacing
    /// entries with the same name.
    pub fn extend(&mut self, other: &Library) {
        for (name, compiler) in other.tags() {
            self.tags.insert(name.clone(), Arc::clone(compiler));
        }
        for (name, filter) in other.filters() {
            self.filters.insert(name.clone(), Arc::clone(filter));
        }
    }

    pub(crate) fn tags(&self) -> impl Iterator<Item = (&String, &Arc<dyn TagCompiler>)> {
        self.tags.iter()
    }

    pub(crate) fn filters(&self) -> impl Iterator<Item = (&String, &Arc<dyn Filter>)> {
        self.filters.iter()
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<_> = self.tag_names().collect();
        let mut filters: Vec<_> = self.filter_names().collect();
        tags.sort_unstable();
        filters.sort_unstable();
        f.debug_struct("Library")
            .field("tags", &tags)
            .field("filters", &filters)
            .finish()
    }
}
