//! Tags and filters available without `{% load %}`.

use url::form_urlencoded;

use super::Library;
use crate::ast::template::{EmptyNode, TagNode};
use crate::ast::value::Value;
use crate::error::{RenderError, TemplateSyntaxError};
use crate::parser::{Parser, Token};

pub(crate) fn library() -> Library {
    let mut library = Library::new();
    library.register_tag("load", compile_load);

    library.register_filter("safe", safe);
    library.register_filter("escape", escape);
    library.register_filter("urlencode", urlencode);
    library.register_filter("default", default);
    library.register_filter("length", length);
    library.register_filter("lower", lower);
    library.register_filter("upper", upper);
    library
}

/// `{% load lib [lib ...] %}`
fn compile_load(
    parser: &mut Parser<'_>,
    token: &Token,
) -> Result<Box<dyn TagNode>, TemplateSyntaxError> {
    let bits = token.split_contents()?;
    if bits.len() < 2 {
        return Err(TemplateSyntaxError::new(format!(
            "'{}' tag requires at least one library name",
            bits[0]
        )));
    }
    for name in &bits[1..] {
        parser.load_library(name)?;
    }
    Ok(Box::new(EmptyNode))
}

/// HTML-escape `&`, `<`, `>`, `"` and `'`.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

fn safe(value: Value, _arg: Option<Value>) -> Result<Value, RenderError> {
    Ok(match value {
        Value::String(s) => Value::SafeString(s),
        Value::None => Value::None,
        other => Value::SafeString(other.to_output_string()),
    })
}

fn escape(value: Value, _arg: Option<Value>) -> Result<Value, RenderError> {
    Ok(match value {
        Value::SafeString(s) => Value::SafeString(s),
        other => Value::SafeString(escape_html(&other.to_output_string())),
    })
}

fn urlencode(value: Value, _arg: Option<Value>) -> Result<Value, RenderError> {
    let text = value.to_output_string();
    let encoded: String = form_urlencoded::byte_serialize(text.as_bytes()).collect();
    Ok(Value::String(encoded))
}

fn default(value: Value, arg: Option<Value>) -> Result<Value, RenderError> {
    match arg {
        Some(fallback) if !value.is_truthy() => Ok(fallback),
        _ => Ok(value),
    }
}

fn length(value: Value, _arg: Option<Value>) -> Result<Value, RenderError> {
    let len = match &value {
        Value::String(s) | Value::SafeString(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Dict(map) => map.len(),
        Value::QueryDict(qd) => qd.borrow().len(),
        _ => 0,
    };
    Ok(Value::Number(len as f64))
}

fn lower(value: Value, _arg: Option<Value>) -> Result<Value, RenderError> {
    Ok(map_text(value, |s| s.to_lowercase()))
}

fn upper(value: Value, _arg: Option<Value>) -> Result<Value, RenderError> {
    Ok(map_text(value, |s| s.to_uppercase()))
}

fn map_text(value: Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::SafeString(s) => Value::SafeString(f(&s)),
        Value::None => Value::None,
        other => Value::String(f(&other.to_output_string())),
    }
}
