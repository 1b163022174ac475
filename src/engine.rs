//! Engine: options plus the libraries templates can use.

use std::collections::HashMap;

use crate::ast::template::Template;
use crate::error::{Error, RenderError, TemplateSyntaxError};
use crate::eval::{self, Context, EngineOptions};
use crate::parser::Parser;
use crate::registry::{Library, builtins};
use crate::tags;

/// Compiles template source against a set of tag libraries.
///
/// A new engine knows the builtin tags and filters and has the
/// `request_utils` library registered for `{% load %}`.
///
/// ```rust
/// use request_tags::{Context, Engine, QueryDict};
///
/// let engine = Engine::new();
/// let template = engine
///     .from_string(r#"{% load request_utils %}{% append_key qd "page" 2 %}{{ qd.urlencode }}"#)
///     .unwrap();
///
/// let mut ctx = Context::new();
/// ctx.set("qd", QueryDict::parse("q=rust", true));
/// assert_eq!(template.render(&mut ctx).unwrap(), "q=rust&amp;page=2");
/// ```
#[derive(Debug)]
pub struct Engine {
    options: EngineOptions,
    builtins: Library,
    libraries: HashMap<String, Library>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        let mut libraries = HashMap::new();
        libraries.insert(tags::LIBRARY_NAME.to_string(), tags::library());
        Self {
            options,
            builtins: builtins::library(),
            libraries,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Register a library for `{% load name %}`. A library already
    /// registered under `name` is replaced.
    pub fn register_library(&mut self, name: impl Into<String>, library: Library) {
        self.libraries.insert(name.into(), library);
    }

    /// Make `library` available to every template without `{% load %}`.
    pub fn add_to_builtins(&mut self, library: &Library) {
        self.builtins.extend(library);
    }

    /// Compile `source` into a reusable template.
    pub fn from_string(&self, source: &str) -> Result<CompiledTemplate, TemplateSyntaxError> {
        let template = Parser::new(&self.builtins, &self.libraries).parse(source)?;
        Ok(CompiledTemplate {
            template,
            options: self.options.clone(),
        })
    }

    /// Compile and render in one step.
    pub fn render_string(&self, source: &str, ctx: &mut Context) -> Result<String, Error> {
        Ok(self.from_string(source)?.render(ctx)?)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// A compiled template that can be rendered any number of times.
#[derive(Debug)]
pub struct CompiledTemplate {
    template: Template,
    options: EngineOptions,
}

impl CompiledTemplate {
    /// Render against `ctx`. Tags may bind new variables into it.
    pub fn render(&self, ctx: &mut Context) -> Result<String, RenderError> {
        eval::render_template(&self.template, ctx, &self.options)
    }

    /// Access the compiled node list.
    pub fn ast(&self) -> &Template {
        &self.template
    }
}
