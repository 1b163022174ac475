//! The `request_utils` tag library.
//!
//! Query dict tags: `append_key`, `replace_key`, `delete_key`,
//! `update_query_dict`, `clone_query_dict` and `query_dict`.
//! URL tags: `qualified_url` and `current_location`.
//!
//! Every tag validates its arguments at compile time and never fails at
//! render time. An argument that does not resolve skips the effect it
//! feeds (one value, one key, or the whole tag when the target mapping or
//! destination name is missing) and the tag renders as an empty string.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::expr::Argument;
use crate::ast::value::Value;
use crate::error::RenderError;
use crate::eval::{Context, resolve_value};
use crate::querydict::QueryDict;
use crate::registry::Library;

mod location;
mod querydict;

pub use self::location::{CurrentLocationNode, QualifiedUrlNode};
pub use self::querydict::{
    AppendKeyNode, CloneQueryDictNode, DeleteKeyNode, QueryDictNode, ReplaceKeyNode,
    UpdateQueryDictNode,
};

/// Name the library is registered under for `{% load %}`.
pub const LIBRARY_NAME: &str = "request_utils";

/// Build the `request_utils` library.
pub fn library() -> Library {
    let mut library = Library::new();
    library.register_tag("append_key", querydict::compile_append_key);
    library.register_tag("replace_key", querydict::compile_replace_key);
    library.register_tag("delete_key", querydict::compile_delete_key);
    library.register_tag("update_query_dict", querydict::compile_update_query_dict);
    library.register_tag("clone_query_dict", querydict::compile_clone_query_dict);
    library.register_tag("query_dict", querydict::compile_query_dict);
    library.register_tag("qualified_url", location::compile_qualified_url);
    library.register_tag("current_location", location::compile_current_location);
    library
}

// ── Render-time helpers ─────────────────────────────────────────────────

/// Resolve `argument`, logging and returning `None` on failure.
fn resolve_or_skip(tag: &str, argument: &Argument, ctx: &Context) -> Option<Value> {
    match resolve_value(argument, ctx) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(tag, argument = %argument, "{e}; skipping");
            None
        }
    }
}

/// Resolve `argument` to a query dict handle. Any other value counts as a
/// failed lookup.
fn resolve_query_dict(
    tag: &str,
    argument: &Argument,
    ctx: &Context,
) -> Option<Rc<RefCell<QueryDict>>> {
    match expect_query_dict(resolve_or_skip(tag, argument, ctx)?) {
        Ok(qd) => Some(qd),
        Err(e) => {
            tracing::debug!(tag, argument = %argument, "{e}; skipping");
            None
        }
    }
}

fn expect_query_dict(value: Value) -> Result<Rc<RefCell<QueryDict>>, RenderError> {
    match value {
        Value::QueryDict(qd) => Ok(qd),
        other => Err(RenderError::type_error("querydict", other.type_name())),
    }
}

/// Bind `value` under the name `as_var` resolves to.
fn bind(tag: &str, as_var: &Argument, value: Value, ctx: &mut Context) {
    if let Some(name) = resolve_or_skip(tag, as_var, ctx) {
        ctx.set(name.to_output_string(), value);
    }
}
