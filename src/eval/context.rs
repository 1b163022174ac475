use std::collections::HashMap;

use crate::ast::value::Value;

/// The name → value bindings visible while rendering.
///
/// A stack of frames: lookups search from the most recently pushed frame
/// down, and [`set`](Context::set) writes into the top frame. The bottom
/// frame is never popped.
///
/// ```rust
/// use request_tags::{Context, QueryDict, Value};
///
/// let mut ctx = Context::new();
/// ctx.set("page", 2i64);
/// ctx.set("query", QueryDict::parse("a=1", true));
///
/// ctx.push();
/// ctx.set("page", 3i64);
/// assert_eq!(ctx.get("page"), Some(&Value::from(3i64)));
/// ctx.pop();
/// assert_eq!(ctx.get("page"), Some(&Value::from(2i64)));
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    frames: Vec<HashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Bind `name` in the top frame, shadowing bindings in lower frames.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value.into());
        }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Pop the top frame. Returns `None` when only the bottom frame is left.
    pub fn pop(&mut self) -> Option<HashMap<String, Value>> {
        if self.frames.len() > 1 { self.frames.pop() } else { None }
    }

    /// Push a new frame holding `bindings`.
    pub fn update<K, V>(&mut self, bindings: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.frames.push(
            bindings
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Follow a dotted path: the first segment names a binding, each later
    /// segment is an attribute, key or index on the previous value.
    pub fn resolve_lookups(&self, lookups: &[String]) -> Option<Value> {
        let (first, rest) = lookups.split_first()?;
        let mut current = self.get(first)?.clone();
        for segment in rest {
            current = current.lookup(segment)?;
        }
        Some(current)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = Context::new();
        for (name, value) in iter {
            ctx.set(name, value);
        }
        ctx
    }
}
