//! # request-tags
//!
//! Template tags for building links from the current request: mutate a
//! bound query dictionary in place, clone one into a fresh mutable copy,
//! and render absolute or location-relative URLs.
//!
//! The crate is split into two layers:
//!
//! - **The template language** (tokenizing, parsing, resolution,
//!   rendering) with `{{ expr|filter }}` output, `{% tag %}` statements
//!   and `{% load library %}`.
//! - **The `request_utils` library** ([`tags`]) of query dict and URL
//!   tags, registered with every [`Engine`] and pulled in with
//!   `{% load request_utils %}`.
//!
//! ## Quick start
//!
//! ```rust
//! use request_tags::{Context, Method, Request, Value, render};
//!
//! let mut ctx = Context::new();
//! let request = Request::new(Method::Get, "http", "testserver", "/foo/?a=1");
//! ctx.set("request", Value::request(request));
//!
//! let source = concat!(
//!     r#"{% load request_utils %}{% clone_query_dict request.GET as "qd" %}"#,
//!     r#"{% replace_key qd "a" 2 %}{% qualified_url "bar/" %}?{{ qd.urlencode }}"#,
//! );
//! let output = render(source, &mut ctx).unwrap();
//! assert_eq!(output, "http://testserver/foo/bar/?a=2");
//! ```
//!
//! Destination names after `as` are resolved like any other argument, so
//! a literal name is quoted. An unquoted name is looked up in the context
//! and the tag binds under the string it holds.
//!
//! ## Compiled templates
//!
//! For repeated rendering, compile once with [`Engine::from_string`]:
//!
//! ```rust
//! use request_tags::{Context, Engine, EngineOptions};
//!
//! let engine = Engine::with_options(EngineOptions::new().string_if_invalid("?"));
//! let template = engine.from_string("Hello, {{ name }}!").unwrap();
//!
//! let mut ctx: Context = [("name", "Alice")].into_iter().collect();
//! assert_eq!(template.render(&mut ctx).unwrap(), "Hello, Alice!");
//! assert_eq!(template.render(&mut Context::new()).unwrap(), "Hello, ?!");
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod eval;
pub mod parser;
pub mod querydict;
pub mod registry;
pub mod request;
pub mod tags;

pub use ast::expr::{Argument, FilterExpression, Variable};
pub use ast::span::{Span, Spanned};
pub use ast::template::{Node, NodeKind, TagNode, Template};
pub use ast::value::Value;
pub use engine::{CompiledTemplate, Engine};
pub use error::{Error, RenderError, RenderErrorKind, TemplateSyntaxError};
pub use eval::{Context, EngineOptions, resolve_value};
pub use parser::{Parser, Token};
pub use querydict::{ImmutableQueryDict, QueryDict};
pub use registry::{Filter, Library, TagCompiler};
pub use request::{HttpRequest, Method, Request, RequestError};

/// Compile `source` with a default [`Engine`] and render it.
///
/// For repeated rendering of the same source, prefer
/// [`Engine::from_string`] to avoid re-parsing.
pub fn render(source: &str, ctx: &mut Context) -> Result<String, Error> {
    Engine::new().render_string(source, ctx)
}
