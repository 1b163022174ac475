use crate::ast::expr::Argument;
use crate::ast::template::TagNode;
use crate::ast::value::Value;
use crate::error::{RenderError, TemplateSyntaxError};
use crate::eval::{Context, EngineOptions};
use crate::parser::{Parser, Token};
use crate::querydict::{ImmutableQueryDict, QueryDict};

use super::{bind, resolve_or_skip, resolve_query_dict};

fn compile_args(
    parser: &Parser<'_>,
    bits: &[String],
) -> Result<Vec<Argument>, TemplateSyntaxError> {
    bits.iter()
        .map(|bit| parser.compile_filter(bit).map(Argument::from))
        .collect()
}

fn immutable(tag: &str, e: ImmutableQueryDict) -> Result<String, RenderError> {
    tracing::warn!(tag, "{e}; copy it with clone_query_dict first");
    Ok(String::new())
}

// ── append_key ──────────────────────────────────────────────────────────

/// `{% append_key <querydict> <key> <value> [<value> ...] %}`
///
/// Appends each value to the list stored under `key`.
#[derive(Debug)]
pub struct AppendKeyNode {
    query_dict: Argument,
    key: Argument,
    values: Vec<Argument>,
}

impl AppendKeyNode {
    pub fn new(query_dict: Argument, key: Argument, values: Vec<Argument>) -> Self {
        Self { query_dict, key, values }
    }
}

impl TagNode for AppendKeyNode {
    fn render(&self, ctx: &mut Context, _options: &EngineOptions) -> Result<String, RenderError> {
        let Some(query_dict) = resolve_query_dict("append_key", &self.query_dict, ctx) else {
            return Ok(String::new());
        };
        let Some(key) = resolve_or_skip("append_key", &self.key, ctx) else {
            return Ok(String::new());
        };
        let key = key.to_output_string();

        for value in &self.values {
            let Some(value) = resolve_or_skip("append_key", value, ctx) else {
                continue;
            };
            let value = value.to_output_string();
            if let Err(e) = query_dict.borrow_mut().append_list(key.as_str(), value) {
                return immutable("append_key", e);
            }
        }
        Ok(String::new())
    }
}

pub(super) fn compile_append_key(
    parser: &mut Parser<'_>,
    token: &Token,
) -> Result<Box<dyn TagNode>, TemplateSyntaxError> {
    let bits = token.split_contents()?;
    if bits.len() <= 3 {
        return Err(TemplateSyntaxError::new(format!(
            "'{}' tag requires at least three values: a querydict, a key, and one or more values to append",
            bits[0]
        )));
    }
    let query_dict = parser.compile_filter(&bits[1])?.into();
    let key = parser.compile_filter(&bits[2])?.into();
    let values = compile_args(parser, &bits[3..])?;
    Ok(Box::new(AppendKeyNode::new(query_dict, key, values)))
}

// ── replace_key ─────────────────────────────────────────────────────────

/// `{% replace_key <querydict> <key> <value> [<value> ...] %}`
///
/// Drops every value stored under `key`, then appends the new ones.
#[derive(Debug)]
pub struct ReplaceKeyNode {
    query_dict: Argument,
    key: Argument,
    values: Vec<Argument>,
}

impl ReplaceKeyNode {
    pub fn new(query_dict: Argument, key: Argument, values: Vec<Argument>) -> Self {
        Self { query_dict, key, values }
    }
}

impl TagNode for ReplaceKeyNode {
    fn render(&self, ctx: &mut Context, _options: &EngineOptions) -> Result<String, RenderError> {
        let Some(query_dict) = resolve_query_dict("replace_key", &self.query_dict, ctx) else {
            return Ok(String::new());
        };
        let Some(key) = resolve_or_skip("replace_key", &self.key, ctx) else {
            return Ok(String::new());
        };
        let key = key.to_output_string();

        // Resolve before mutating so a value that reads the same dict sees
        // it unchanged.
        let values: Vec<String> = self
            .values
            .iter()
            .filter_map(|value| resolve_or_skip("replace_key", value, ctx))
            .map(|value| value.to_output_string())
            .collect();

        // The key moves to the end, as if deleted and then appended to.
        let mut query_dict = query_dict.borrow_mut();
        if let Err(e) = query_dict.remove(&key).and_then(|_| query_dict.set_list(key, values)) {
            return immutable("replace_key", e);
        }
        Ok(String::new())
    }
}

pub(super) fn compile_replace_key(
    parser: &mut Parser<'_>,
    token: &Token,
) -> Result<Box<dyn TagNode>, TemplateSyntaxError> {
    let bits = token.split_contents()?;
    if bits.len() <= 3 {
        return Err(TemplateSyntaxError::new(format!(
            "'{}' tag requires at least three values: a querydict, a key, and one or more values to set for the key",
            bits[0]
        )));
    }
    let query_dict = parser.compile_filter(&bits[1])?.into();
    let key = parser.compile_filter(&bits[2])?.into();
    let values = compile_args(parser, &bits[3..])?;
    Ok(Box::new(ReplaceKeyNode::new(query_dict, key, values)))
}

// ── delete_key ──────────────────────────────────────────────────────────

/// `{% delete_key <querydict> <key> [<key> ...] %}`
///
/// Removes each key. Keys that are not present are ignored.
#[derive(Debug)]
pub struct DeleteKeyNode {
    query_dict: Argument,
    keys: Vec<Argument>,
}

impl DeleteKeyNode {
    pub fn new(query_dict: Argument, keys: Vec<Argument>) -> Self {
        Self { query_dict, keys }
    }
}

impl TagNode for DeleteKeyNode {
    fn render(&self, ctx: &mut Context, _options: &EngineOptions) -> Result<String, RenderError> {
        let Some(query_dict) = resolve_query_dict("delete_key", &self.query_dict, ctx) else {
            return Ok(String::new());
        };
        let keys: Vec<String> = self
            .keys
            .iter()
            .filter_map(|key| resolve_or_skip("delete_key", key, ctx))
            .map(|key| key.to_output_string())
            .collect();

        let mut query_dict = query_dict.borrow_mut();
        for key in keys {
            if let Err(e) = query_dict.remove(&key) {
                return immutable("delete_key", e);
            }
        }
        Ok(String::new())
    }
}

pub(super) fn compile_delete_key(
    parser: &mut Parser<'_>,
    token: &Token,
) -> Result<Box<dyn TagNode>, TemplateSyntaxError> {
    let bits = token.split_contents()?;
    if bits.len() < 3 {
        return Err(TemplateSyntaxError::new(format!(
            "'{}' tag requires at least two values: a querydict and one or more keys to delete",
            bits[0]
        )));
    }
    let query_dict = parser.compile_filter(&bits[1])?.into();
    let keys = compile_args(parser, &bits[2..])?;
    Ok(Box::new(DeleteKeyNode::new(query_dict, keys)))
}

// ── update_query_dict ───────────────────────────────────────────────────

/// `{% update_query_dict <querydict> <other> [<other> ...] %}`
///
/// Appends every value of each other mapping. Others may be query dicts
/// or plain dicts; a dict entry holding a list contributes each element.
#[derive(Debug)]
pub struct UpdateQueryDictNode {
    query_dict: Argument,
    others: Vec<Argument>,
}

impl UpdateQueryDictNode {
    pub fn new(query_dict: Argument, others: Vec<Argument>) -> Self {
        Self { query_dict, others }
    }
}

/// Flatten a mapping value into key/value pairs. Anything other than a
/// query dict or dict is a type error.
fn mapping_pairs(value: &Value) -> Result<Vec<(String, String)>, RenderError> {
    match value {
        Value::QueryDict(qd) => Ok(qd
            .borrow()
            .lists()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.to_string(), v.clone())))
            .collect()),
        Value::Dict(map) => Ok(map
            .iter()
            .flat_map(|(key, value)| match value {
                Value::List(items) => items
                    .iter()
                    .map(|item| (key.clone(), item.to_output_string()))
                    .collect::<Vec<_>>(),
                other => vec![(key.clone(), other.to_output_string())],
            })
            .collect()),
        other => Err(RenderError::type_error("a mapping", other.type_name())),
    }
}

impl TagNode for UpdateQueryDictNode {
    fn render(&self, ctx: &mut Context, _options: &EngineOptions) -> Result<String, RenderError> {
        let Some(query_dict) = resolve_query_dict("update_query_dict", &self.query_dict, ctx)
        else {
            return Ok(String::new());
        };

        for other in &self.others {
            let Some(value) = resolve_or_skip("update_query_dict", other, ctx) else {
                continue;
            };
            let pairs = match mapping_pairs(&value) {
                Ok(pairs) => pairs,
                Err(e) => {
                    tracing::debug!(tag = "update_query_dict", argument = %other, "{e}; skipping");
                    continue;
                }
            };
            if let Err(e) = query_dict.borrow_mut().update(pairs) {
                return immutable("update_query_dict", e);
            }
        }
        Ok(String::new())
    }
}

pub(super) fn compile_update_query_dict(
    parser: &mut Parser<'_>,
    token: &Token,
) -> Result<Box<dyn TagNode>, TemplateSyntaxError> {
    let bits = token.split_contents()?;
    if bits.len() < 3 {
        return Err(TemplateSyntaxError::new(format!(
            "'{}' tag requires at least two values: a querydict to update and one or more dicts to merge",
            bits[0]
        )));
    }
    let query_dict = parser.compile_filter(&bits[1])?.into();
    let others = compile_args(parser, &bits[2..])?;
    Ok(Box::new(UpdateQueryDictNode::new(query_dict, others)))
}

// ── clone_query_dict ────────────────────────────────────────────────────

/// `{% clone_query_dict <querydict> as <name> %}`
///
/// Binds an independent, mutable copy under `name`.
#[derive(Debug)]
pub struct CloneQueryDictNode {
    query_dict: Argument,
    as_var: Argument,
}

impl CloneQueryDictNode {
    pub fn new(query_dict: Argument, as_var: Argument) -> Self {
        Self { query_dict, as_var }
    }
}

impl TagNode for CloneQueryDictNode {
    fn render(&self, ctx: &mut Context, _options: &EngineOptions) -> Result<String, RenderError> {
        let Some(source) = resolve_or_skip("clone_query_dict", &self.query_dict, ctx) else {
            return Ok(String::new());
        };
        let copy = match &source {
            Value::QueryDict(qd) => Value::query_dict(qd.borrow().copy()),
            Value::Dict(_) | Value::List(_) => source.clone(),
            other => {
                tracing::debug!(
                    tag = "clone_query_dict",
                    "cannot copy a {}; skipping",
                    other.type_name()
                );
                return Ok(String::new());
            }
        };
        bind("clone_query_dict", &self.as_var, copy, ctx);
        Ok(String::new())
    }
}

pub(super) fn compile_clone_query_dict(
    parser: &mut Parser<'_>,
    token: &Token,
) -> Result<Box<dyn TagNode>, TemplateSyntaxError> {
    let bits = token.split_contents()?;
    if bits.len() != 4 || bits[2] != "as" {
        return Err(TemplateSyntaxError::new(format!(
            "'{}' tag must be called with the arguments: querydict variable, 'as', and a context variable name",
            bits[0]
        )));
    }
    let query_dict = parser.compile_filter(&bits[1])?.into();
    let as_var = parser.compile_filter(&bits[3])?.into();
    Ok(Box::new(CloneQueryDictNode::new(query_dict, as_var)))
}

// ── query_dict ──────────────────────────────────────────────────────────

/// `{% query_dict as <name> %}`
///
/// Binds a fresh, empty, mutable query dict under `name`.
#[derive(Debug)]
pub struct QueryDictNode {
    as_var: Argument,
}

impl QueryDictNode {
    pub fn new(as_var: Argument) -> Self {
        Self { as_var }
    }
}

impl TagNode for QueryDictNode {
    fn render(&self, ctx: &mut Context, _options: &EngineOptions) -> Result<String, RenderError> {
        bind("query_dict", &self.as_var, Value::query_dict(QueryDict::new()), ctx);
        Ok(String::new())
    }
}

pub(super) fn compile_query_dict(
    parser: &mut Parser<'_>,
    token: &Token,
) -> Result<Box<dyn TagNode>, TemplateSyntaxError> {
    let bits = token.split_contents()?;
    if bits.len() != 3 || bits[1] != "as" {
        return Err(TemplateSyntaxError::new(format!(
            "'{}' tag must be called with the arguments: 'as', and a context variable name",
            bits[0]
        )));
    }
    let as_var = parser.compile_filter(&bits[2])?.into();
    Ok(Box::new(QueryDictNode::new(as_var)))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn qd_value(query: &str) -> (Rc<RefCell<QueryDict>>, Value) {
        let value = Value::query_dict(QueryDict::parse(query, true));
        match &value {
            Value::QueryDict(qd) => (Rc::clone(qd), value),
            _ => unreachable!(),
        }
    }

    fn lit(s: &str) -> Argument {
        Argument::Literal(Value::from(s))
    }

    #[test]
    fn test_append_node_built_by_hand() {
        let (qd, value) = qd_value("foo=bar");
        let mut ctx: Context = [("qd", value)].into_iter().collect();
        let node = AppendKeyNode::new(
            Argument::Variable(crate::ast::expr::Variable::lookup("qd")),
            lit("foo"),
            vec![lit("baz"), lit("quux")],
        );
        let out = node.render(&mut ctx, &EngineOptions::default()).unwrap();
        assert_eq!(out, "");
        assert_eq!(qd.borrow().urlencode(), "foo=bar&foo=baz&foo=quux");
    }

    #[test]
    fn test_replace_reads_value_from_same_dict() {
        let (qd, value) = qd_value("a=1&b=2");
        let mut ctx: Context = [("qd", value)].into_iter().collect();
        let node = ReplaceKeyNode::new(
            Argument::Variable(crate::ast::expr::Variable::lookup("qd")),
            lit("a"),
            vec![Argument::Variable(crate::ast::expr::Variable::lookup("qd.b"))],
        );
        node.render(&mut ctx, &EngineOptions::default()).unwrap();
        assert_eq!(qd.borrow().urlencode(), "b=2&a=2");
    }

    #[test]
    fn test_append_to_immutable_is_noop() {
        let mut ctx = Context::new();
        ctx.set("qd", QueryDict::parse("foo=bar", false));
        let node = AppendKeyNode::new(
            Argument::Variable(crate::ast::expr::Variable::lookup("qd")),
            lit("foo"),
            vec![lit("baz")],
        );
        assert_eq!(node.render(&mut ctx, &EngineOptions::default()).unwrap(), "");
        assert_eq!(
            ctx.get("qd").map(Value::to_output_string),
            Some("foo=bar".to_string())
        );
    }

    #[test]
    fn test_mapping_pairs_from_dict_with_list() {
        let dict: Value = [("a", Value::from(vec!["1", "2"])), ("b", Value::from("3"))]
            .into_iter()
            .collect();
        assert_eq!(
            mapping_pairs(&dict).unwrap(),
            vec![
                ("a".to_string(), "1".to_string()),
                ("a".to_string(), "2".to_string()),
                ("b".to_string(), "3".to_string()),
            ]
        );
        let err = mapping_pairs(&Value::from("x")).unwrap_err();
        assert_eq!(err.kind, crate::error::RenderErrorKind::TypeError);
        assert_eq!(err.to_string(), "expected a mapping, got string");
    }

    #[test]
    fn test_target_must_be_query_dict() {
        let mut ctx: Context = [("qd", "not a dict")].into_iter().collect();
        let node = DeleteKeyNode::new(
            Argument::Variable(crate::ast::expr::Variable::lookup("qd")),
            vec![lit("foo")],
        );
        assert_eq!(node.render(&mut ctx, &EngineOptions::default()).unwrap(), "");
    }
}
