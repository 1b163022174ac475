use std::fmt;
use std::sync::Arc;

use super::value::Value;
use crate::registry::Filter;

/// A single operand: a literal or a dotted context lookup.
///
/// `"foo"`, `'foo'`, `42`, `True` and `None` are literals. Anything else is
/// a path such as `request.path` or `items.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// The text the variable was compiled from.
    pub source: String,
    pub kind: VariableKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariableKind {
    Literal(Value),
    Lookup(Vec<String>),
}

impl Variable {
    pub fn literal(source: impl Into<String>, value: Value) -> Self {
        Self {
            source: source.into(),
            kind: VariableKind::Literal(value),
        }
    }

    pub fn lookup(path: &str) -> Self {
        Self {
            source: path.to_string(),
            kind: VariableKind::Lookup(path.split('.').map(str::to_string).collect()),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A filter applied inside an expression: `|name` or `|name:arg`.
#[derive(Clone)]
pub struct FilterCall {
    pub name: String,
    pub filter: Arc<dyn Filter>,
    pub arg: Option<Variable>,
}

impl fmt::Debug for FilterCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCall")
            .field("name", &self.name)
            .field("arg", &self.arg)
            .finish()
    }
}

/// An operand followed by zero or more filters, e.g.
/// `query_dict.urlencode|safe`. Produced by
/// [`Parser::compile_filter`](crate::parser::Parser::compile_filter).
#[derive(Debug, Clone)]
pub struct FilterExpression {
    pub source: String,
    pub var: Variable,
    pub filters: Vec<FilterCall>,
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// An argument handed to a tag node.
///
/// Compiled templates always produce [`Argument::Expression`]; the other
/// variants let hosts build nodes directly.
#[derive(Debug, Clone)]
pub enum Argument {
    Literal(Value),
    Variable(Variable),
    Expression(FilterExpression),
}

impl From<FilterExpression> for Argument {
    fn from(expr: FilterExpression) -> Self {
        Argument::Expression(expr)
    }
}

impl From<Variable> for Argument {
    fn from(var: Variable) -> Self {
        Argument::Variable(var)
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Literal(value)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Literal(value) => write!(f, "{value:?}"),
            Argument::Variable(var) => write!(f, "{var}"),
            Argument::Expression(expr) => write!(f, "{expr}"),
        }
    }
}
