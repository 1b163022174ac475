use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::querydict::QueryDict;
use crate::request::HttpRequest;

/// Runtime values bound in a [`Context`](crate::Context).
///
/// Query dicts are held behind a shared `Rc<RefCell<_>>` handle: binding
/// the same dict under two names, or reading it back after a tag mutated
/// it, observes a single instance. Use [`Value::query_dict`] to wrap one.
///
/// ```rust
/// use request_tags::{QueryDict, Value};
///
/// let s: Value = "hello".into();
/// let n: Value = 42i64.into();
/// let qd = Value::query_dict(QueryDict::parse("a=1", true));
/// assert_eq!(qd.lookup("urlencode"), Some("a=1".into()));
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    /// A string marked as already escaped. Autoescaping leaves it alone.
    SafeString(String),
    Number(f64),
    Bool(bool),
    List(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    QueryDict(Rc<RefCell<QueryDict>>),
    Request(Rc<dyn HttpRequest>),
    /// The absence of a value. Renders as an empty string.
    None,
}

impl Value {
    pub fn query_dict(qd: QueryDict) -> Self {
        Value::QueryDict(Rc::new(RefCell::new(qd)))
    }

    pub fn request(request: impl HttpRequest + 'static) -> Self {
        Value::Request(Rc::new(request))
    }

    /// String form used for template output, query-dict keys and values,
    /// and context variable names.
    pub fn to_output_string(&self) -> String {
        match self {
            Value::String(s) | Value::SafeString(s) => s.clone(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(Value::to_output_string).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Dict(map) => {
                let items: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.to_output_string()))
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::QueryDict(qd) => qd.borrow().urlencode(),
            Value::Request(request) => {
                format!("<{} {}>", request.method(), request.get_full_path())
            }
            Value::None => String::new(),
        }
    }

    /// Type name for diagnostic messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) | Value::SafeString(_) => "string",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::QueryDict(_) => "querydict",
            Value::Request(_) => "request",
            Value::None => "none",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Value::SafeString(_))
    }

    /// Falsy values: empty string, `0`, `false`, empty collections, `None`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::String(s) | Value::SafeString(s) => !s.is_empty(),
            Value::Number(n) => *n != 0.0,
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
            Value::Dict(map) => !map.is_empty(),
            Value::QueryDict(qd) => !qd.borrow().is_empty(),
            Value::Request(_) => true,
            Value::None => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::SafeString(s) => Some(s),
            _ => None,
        }
    }

    /// One step of a dotted variable path: `a.b` looks up `b` on `a`.
    ///
    /// Returns `None` when the attribute, key or index does not exist.
    pub fn lookup(&self, segment: &str) -> Option<Value> {
        match self {
            Value::Dict(map) => map.get(segment).cloned(),
            Value::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
            // Keys shadow the `urlencode` and `copy` attributes.
            Value::QueryDict(qd) => {
                let qd = qd.borrow();
                match segment {
                    key if qd.contains_key(key) => qd.get(key).map(Value::from),
                    "urlencode" => Some(Value::String(qd.urlencode())),
                    "copy" => Some(Value::query_dict(qd.copy())),
                    _ => None,
                }
            }
            Value::Request(request) => match segment {
                "path" => Some(request.path().into()),
                "method" => Some(request.method().as_str().into()),
                "scheme" => Some(request.scheme().into()),
                "GET" => Some(Value::QueryDict(Rc::new(RefCell::new(request.query().clone())))),
                "get_host" => Some(request.host().into()),
                "get_full_path" => Some(request.get_full_path().into()),
                "is_secure" => Some(request.is_secure().into()),
                "build_absolute_uri" => request.build_absolute_uri(None).ok().map(Value::from),
                _ => None,
            },
            Value::String(s) | Value::SafeString(s) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| c.to_string().into()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::SafeString(a), Value::SafeString(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::QueryDict(a), Value::QueryDict(b)) => a == b,
            (Value::Request(a), Value::Request(b)) => Rc::ptr_eq(a, b),
            (Value::None, Value::None) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_output_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<QueryDict> for Value {
    fn from(qd: QueryDict) -> Self {
        Value::query_dict(qd)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Dict(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
