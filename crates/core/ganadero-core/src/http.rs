//! Owned HTTP request/response snapshots.
//!
//! These types are deliberately independent of any HTTP client so they can be
//! stored in cache partitions, persisted in the offline queue and replayed
//! later through whatever `Fetcher` is plugged in.

use crate::{GanaderoError, GanaderoResult};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Header map. Names are stored lowercase so lookups are case-insensitive.
pub type Headers = BTreeMap<String, String>;

/// HTTP request methods understood by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
}

impl Method {
    /// Canonical uppercase name
    #[must_use]
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

    /// Whether the method changes remote state and therefore may be queued
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = GanaderoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            other => Err(GanaderoError::invalid_input(format!("Unsupported HTTP method: {other}"))),
        }
    }
}

/// How the page issued the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Full-page navigation
    Navigate,
    /// Same-origin subresource
    SameOrigin,
    /// Cross-origin request with CORS
    #[default]
    Cors,
    /// Opaque cross-origin request
    NoCors,
}

/// An outbound HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method
    pub method: Method,
    /// Absolute or relative target URL
    pub url: String,
    /// Request headers (lowercase names)
    pub headers: Headers,
    /// Optional request body
    pub body: Option<Bytes>,
    /// Request mode
    pub mode: RequestMode,
}

impl Request {
    /// Create a request with no headers or body
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            mode: RequestMode::default(),
        }
    }

    /// Shorthand for a `GET` request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// A top-level navigation request for a page
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url).with_mode(RequestMode::Navigate)
    }

    /// Set a header, replacing any previous value
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Replace all headers
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        self
    }

    /// Set the raw body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set `content-type`
    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> GanaderoResult<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .with_header("content-type", "application/json")
            .with_body(body))
    }

    /// Set the request mode
    #[must_use]
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whether this request is a full-page navigation
    #[must_use]
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Header lookup (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Classification of a response, mirroring the Fetch API's response types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response
    #[default]
    Basic,
    /// Cross-origin response with CORS
    Cors,
    /// Opaque cross-origin response
    Opaque,
    /// Network error placeholder
    Error,
}

/// An HTTP response snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: u16,
    /// Response headers (lowercase names)
    pub headers: Headers,
    /// Full body
    pub body: Bytes,
    /// Response type
    pub kind: ResponseKind,
}

impl Response {
    /// Create a response with the given status and body
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
        }
    }

    /// A JSON response with `content-type: application/json`
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        // Serializing a `Value` cannot fail.
        let body = serde_json::to_vec(value).unwrap_or_default();
        Self::new(status, body).with_header("content-type", "application/json")
    }

    /// A plain-text response
    pub fn text(status: u16, text: &str) -> Self {
        Self::new(status, text.to_owned()).with_header("content-type", "text/plain; charset=utf-8")
    }

    /// Set a header, replacing any previous value
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Set the response type
    #[must_use]
    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    /// `true` for a 2xx status (the Fetch API's `ok`)
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `true` if this is a network-error placeholder
    #[must_use]
    pub fn is_error_kind(&self) -> bool {
        self.kind == ResponseKind::Error
    }

    /// Header lookup (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Decode the body as JSON
    pub fn json_body<T: DeserializeOwned>(&self) -> GanaderoResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
