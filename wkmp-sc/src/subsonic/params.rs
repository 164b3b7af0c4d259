//! Request parameters
//!
//! Subsonic clients send everything as query parameters; OpenSubsonic's
//! `formPost` extension allows the same parameters in a urlencoded POST body.
//! Both sources are merged once, by the auth middleware, and the result rides
//! along in the request extensions.

use crate::error::{ApiError, Result};
use crate::subsonic::Format;

/// Parameters of one request, query string first, then form body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Parse a urlencoded query string (without the leading `?`)
    pub fn from_query(query: Option<&str>) -> Self {
        let mut params = Self::default();
        if let Some(query) = query {
            params.extend_urlencoded(query.as_bytes());
        }
        params
    }

    /// Append pairs from a urlencoded body
    pub fn extend_urlencoded(&mut self, bytes: &[u8]) {
        self.pairs.extend(
            url::form_urlencoded::parse(bytes).map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First non-empty value for `name`
    ///
    /// Clients routinely send `u=` or `apiKey=` with nothing after it; for
    /// credential negotiation that is the same as not sending the field.
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    /// Every value for `name`, in request order
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value for `name`, or error code 10 naming the parameter
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get_non_empty(name)
            .ok_or_else(|| ApiError::MissingParameter(name.to_string()))
    }

    /// Required integer id
    pub fn require_id(&self, name: &str) -> Result<i64> {
        let raw = self.require(name)?;
        raw.parse::<i64>()
            .map_err(|_| ApiError::NotFound(format!("{} '{}'", name, raw)))
    }

    /// JSONP callback name, if any
    pub fn callback(&self) -> Option<&str> {
        self.get_non_empty("callback")
    }

    /// Wire format requested by `f` / `callback`
    pub fn format(&self) -> Format {
        Format::from_params(self.get("f"), self.callback())
    }
}
