use http::Method;
use serde::Serialize;
use url::Url;

use crate::{Result, SignError};

/// The unit that gets signed and sent: target url, method and parameters.
///
/// Parameters keep their insertion order; they are re-sorted while signing and
/// duplicate keys are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    url: Url,
    method: Method,
    parameters: Vec<(String, String)>,
}

impl Message {
    pub fn new(method: Method, url: &str) -> Result<Self> {
        Ok(Self::with_url(method, Url::parse(url)?))
    }

    pub fn with_url(method: Method, url: Url) -> Self {
        Message {
            url,
            method,
            parameters: Vec::new(),
        }
    }

    /// Convenience constructor for a `GET` message.
    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::GET, url)
    }

    /// Convenience constructor for a `POST` message.
    pub fn post(url: &str) -> Result<Self> {
        Self::new(Method::POST, url)
    }

    /// Append a single parameter.
    pub fn parameter<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters.push((key.into(), value.into()));
        self
    }

    /// Append every pair produced by serializing `params` as a form.
    ///
    /// Accepts anything `serde_urlencoded` does: slices of tuples, maps or
    /// structs with scalar fields.
    pub fn form<T: Serialize + ?Sized>(mut self, params: &T) -> Result<Self> {
        let encoded = serde_urlencoded::to_string(params)
            .map_err(|e| SignError::Serialize(e.to_string()))?;
        self.parameters.extend(
            url::form_urlencoded::parse(encoded.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
        Ok(self)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    pub(crate) fn push(&mut self, key: &str, value: &str) {
        self.parameters.push((key.to_string(), value.to_string()));
    }

    /// Drop every parameter whose key matches `predicate`.
    pub(crate) fn remove_where<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.parameters.retain(|(k, _)| !predicate(k));
    }

    pub(crate) fn into_parts(self) -> (Method, Url, Vec<(String, String)>) {
        (self.method, self.url, self.parameters)
    }
}
