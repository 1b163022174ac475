//! The request object the URL tags read from.
//!
//! Hosts either wrap their own request type in [`HttpRequest`] or build a
//! [`Request`] from the incoming URI.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

use crate::querydict::QueryDict;

/// Capability interface for request-like objects bound into a template
/// context.
pub trait HttpRequest: fmt::Debug {
    fn method(&self) -> Method;

    /// `"http"` or `"https"`.
    fn scheme(&self) -> &str;

    /// Host, including the port when it is not the scheme default.
    fn host(&self) -> &str;

    /// Percent-encoded path, without query string.
    fn path(&self) -> &str;

    /// Parsed query string.
    fn query(&self) -> &QueryDict;

    fn is_secure(&self) -> bool {
        self.scheme() == "https"
    }

    /// Path plus `?query` when the query string is non-empty.
    fn get_full_path(&self) -> String {
        let query = self.query().urlencode();
        if query.is_empty() {
            self.path().to_string()
        } else {
            format!("{}?{query}", self.path())
        }
    }

    /// Resolve `location` against `scheme://host/path`. `None` yields the
    /// absolute form of the full path.
    fn build_absolute_uri(&self, location: Option<&str>) -> Result<String, url::ParseError> {
        let base = Url::parse(&format!("{}://{}{}", self.scheme(), self.host(), self.path()))?;
        let location = match location {
            Some(location) => location.to_string(),
            None => self.get_full_path(),
        };
        Ok(base.join(&location)?.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown HTTP method: {0}")]
pub struct UnknownMethod(String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid request URI: {0}")]
    InvalidUri(#[from] url::ParseError),
    #[error("request URI has no host: {0}")]
    MissingHost(String),
}

/// A plain request value, usually built from the absolute URI the server
/// received.
///
/// ```rust
/// use request_tags::{HttpRequest, Method, Request};
///
/// let request = Request::from_uri(Method::Get, "http://testserver/foo/?page=2").unwrap();
/// assert_eq!(request.path(), "/foo/");
/// assert_eq!(request.get_full_path(), "/foo/?page=2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    scheme: String,
    host: String,
    path: String,
    query: QueryDict,
}

impl Request {
    /// Build a request from its parts. `path_and_query` may carry a
    /// `?query` suffix, which is parsed into an immutable [`QueryDict`].
    pub fn new(method: Method, scheme: &str, host: &str, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, query),
            None => (path_and_query, ""),
        };
        Self {
            method,
            scheme: scheme.to_string(),
            host: host.to_string(),
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            query: QueryDict::parse(query, false),
        }
    }

    pub fn from_uri(method: Method, uri: &str) -> Result<Self, RequestError> {
        let url = Url::parse(uri)?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(RequestError::MissingHost(uri.to_string())),
        };
        Ok(Self {
            method,
            scheme: url.scheme().to_string(),
            host,
            path: url.path().to_string(),
            query: QueryDict::parse(url.query().unwrap_or(""), false),
        })
    }
}

impl HttpRequest for Request {
    fn method(&self) -> Method {
        self.method
    }

    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn query(&self) -> &QueryDict {
        &self.query
    }
}
