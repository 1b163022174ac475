//! Multi-valued, ordered query-string mapping.
//!
//! A [`QueryDict`] maps each key to a non-empty list of values and keeps
//! keys in first-insertion order, so [`urlencode`](QueryDict::urlencode)
//! reproduces the pairs in the order they were added.
//!
//! ```rust
//! use request_tags::QueryDict;
//!
//! let mut qd = QueryDict::parse("foo=bar", true);
//! qd.append_list("foo", "baz").unwrap();
//! assert_eq!(qd.urlencode(), "foo=bar&foo=baz");
//! ```

use thiserror::Error;
use url::form_urlencoded;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("this QueryDict instance is immutable")]
pub struct ImmutableQueryDict;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDict {
    entries: Vec<(String, Vec<String>)>,
    mutable: bool,
}

impl QueryDict {
    /// An empty, mutable mapping.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            mutable: true,
        }
    }

    /// Parse an `application/x-www-form-urlencoded` string.
    ///
    /// Request query strings should be parsed with `mutable = false`;
    /// templates then work on a [`copy`](QueryDict::copy).
    pub fn parse(query: &str, mutable: bool) -> Self {
        let mut qd = Self::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            qd.push(key.into_owned(), value.into_owned());
        }
        qd.mutable = mutable;
        qd
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Last value stored for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_list(key)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.position(key).map(|i| self.entries[i].1.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn lists(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Append `value` to the values for `key`, creating the key if needed.
    pub fn append_list(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ImmutableQueryDict> {
        self.ensure_mutable()?;
        self.push(key.into(), value.into());
        Ok(())
    }

    /// Replace every value for `key`. An empty `values` removes the key.
    pub fn set_list(
        &mut self,
        key: impl Into<String>,
        values: Vec<String>,
    ) -> Result<(), ImmutableQueryDict> {
        self.ensure_mutable()?;
        let key = key.into();
        match (self.position(&key), values.is_empty()) {
            (Some(i), true) => {
                self.entries.remove(i);
            }
            (Some(i), false) => self.entries[i].1 = values,
            (None, true) => {}
            (None, false) => self.entries.push((key, values)),
        }
        Ok(())
    }

    /// Remove `key`, returning its values if it was present.
    pub fn remove(&mut self, key: &str) -> Result<Option<Vec<String>>, ImmutableQueryDict> {
        self.ensure_mutable()?;
        Ok(self.position(key).map(|i| self.entries.remove(i).1))
    }

    /// Merge `pairs` into this mapping. Values are appended to any values
    /// already present; nothing is overwritten.
    pub fn update<K, V>(
        &mut self,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<(), ImmutableQueryDict>
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.ensure_mutable()?;
        for (key, value) in pairs {
            self.push(key.into(), value.into());
        }
        Ok(())
    }

    /// Independent, mutable copy. Copying is how templates obtain a
    /// mutable version of an immutable request mapping.
    pub fn copy(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            mutable: true,
        }
    }

    /// Encode as `key=value&...`, one pair per value.
    pub fn urlencode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, values) in &self.entries {
            for value in values {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    fn push(&mut self, key: String, value: String) {
        match self.position(&key) {
            Some(i) => self.entries[i].1.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    fn ensure_mutable(&self) -> Result<(), ImmutableQueryDict> {
        if self.mutable { Ok(()) } else { Err(ImmutableQueryDict) }
    }
}

impl Default for QueryDict {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_order_and_multiple_values() {
        let qd = QueryDict::parse("a=1&b=2&a=3", false);
        assert_eq!(qd.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(qd.get_list("a"), Some(&["1".to_string(), "3".to_string()][..]));
        assert_eq!(qd.get("a"), Some("3"));
        assert!(!qd.is_mutable());
    }

    #[test]
    fn test_append_then_urlencode() {
        let mut qd = QueryDict::parse("foo=bar", true);
        qd.append_list("foo", "baz").unwrap();
        qd.append_list("page", "2").unwrap();
        assert_eq!(qd.urlencode(), "foo=bar&foo=baz&page=2");
    }

    #[test]
    fn test_immutable_rejects_mutation() {
        let mut qd = QueryDict::parse("foo=bar", false);
        assert_eq!(qd.append_list("foo", "baz"), Err(ImmutableQueryDict));
        assert_eq!(qd.remove("foo"), Err(ImmutableQueryDict));
        assert_eq!(qd.urlencode(), "foo=bar");
    }

    #[test]
    fn test_copy_is_independent_and_mutable() {
        let original = QueryDict::parse("foo=bar", false);
        let mut copy = original.copy();
        copy.append_list("foo", "baz").unwrap();
        assert_eq!(original.urlencode(), "foo=bar");
        assert_eq!(copy.urlencode(), "foo=bar&foo=baz");
    }

    #[test]
    fn test_remove_absent_key() {
        let mut qd = QueryDict::parse("bar=baz", true);
        assert_eq!(qd.remove("foo"), Ok(None));
        assert_eq!(qd.remove("bar"), Ok(Some(vec!["baz".to_string()])));
        assert!(qd.is_empty());
    }

    #[test]
    fn test_set_list_replaces_in_place() {
        let mut qd = QueryDict::parse("a=1&b=2&a=3", true);
        qd.set_list("a", vec!["9".to_string()]).unwrap();
        assert_eq!(qd.urlencode(), "a=9&b=2");
        qd.set_list("a", Vec::new()).unwrap();
        assert_eq!(qd.urlencode(), "b=2");
    }

    #[test]
    fn test_update_appends() {
        let mut qd = QueryDict::parse("foo=bar", true);
        qd.update([("baz", "quux"), ("foo", "again")]).unwrap();
        assert_eq!(qd.urlencode(), "foo=bar&foo=again&baz=quux");
    }

    #[test]
    fn test_urlencode_escapes() {
        let mut qd = QueryDict::new();
        qd.append_list("q", "a b&c").unwrap();
        assert_eq!(qd.urlencode(), "q=a+b%26c");
    }
}
