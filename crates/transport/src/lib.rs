//! HTTP transport abstraction for the Auth0 client
//!
//! Defines the plain-data `HttpRequest`/`HttpResponse` pair and the
//! `HttpTransport` trait that every layer implements. The default stack is
//! composed from independent decorators around a reqwest-backed base:
//!
//! ```text
//! RateLimitTransport -> LoggingTransport -> Dispatcher -> ReqwestTransport
//! ```
//!
//! Each decorator wraps any `HttpTransport`, so tests can slide a fake
//! transport underneath the real retry and logging logic.

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod options;
pub mod rate_limit;
pub mod reqwest_client;

pub use client::{DefaultHttpClient, layered};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use logging::LoggingTransport;
pub use options::{HttpClientOptions, HttpClientOptionsBuilder, LogLevel, LoggingOptions, ProxyOptions};
pub use rate_limit::{BackoffPolicy, RateLimitState, RateLimitTransport};
pub use reqwest::Url;
pub use reqwest_client::ReqwestTransport;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by async transport calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// HTTP methods used by the Authentication and Management APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        media_type: String,
        content: Vec<u8>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            media_type: media_type.into(),
            content: content.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Payload {
    Bytes(Vec<u8>),
    Multipart(Vec<FormPart>),
}

/// Fully built outgoing request.
///
/// Header names are stored lowercased so a later write for the same header
/// replaces the earlier one regardless of case. Everything handed in is
/// copied, and `headers()` returns a copy, so callers never alias the
/// request's internal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: HttpMethod,
    url: Url,
    headers: BTreeMap<String, String>,
    body: Option<Payload>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Set a header, replacing any previous value for the same name.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Copy every entry of `headers` into the request (last write wins).
    pub fn with_headers<'a, I>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (name, value) in headers {
            self.headers.insert(name.to_ascii_lowercase(), value.clone());
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(Payload::Bytes(body.into()));
        self
    }

    /// Send `parts` as `multipart/form-data`, replacing any byte body.
    /// The transport generates the boundary and the `Content-Type` header.
    pub fn with_multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = Some(Payload::Multipart(parts));
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `host[:port]` used to key per-host concurrency limits.
    pub fn host_key(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port_or_known_default() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Snapshot of all headers.
    pub fn headers(&self) -> BTreeMap<String, String> {
        self.headers.clone()
    }

    pub(crate) fn header_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Raw body bytes. `None` when there is no body or it is multipart.
    pub fn body(&self) -> Option<&[u8]> {
        match &self.body {
            Some(Payload::Bytes(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub fn form_parts(&self) -> Option<&[FormPart]> {
        match &self.body {
            Some(Payload::Multipart(parts)) => Some(parts),
            _ => None,
        }
    }
}

/// Raw response as produced by a transport. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: String,
}

impl HttpResponse {
    pub fn new<K, V, I>(status: u16, headers: I, body: impl Into<String>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
            .collect();
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Snapshot of all headers.
    pub fn headers(&self) -> BTreeMap<String, String> {
        self.headers.clone()
    }

    pub(crate) fn header_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Synchronous and asynchronous HTTP execution contract.
///
/// `execute` parks the calling OS thread for the whole call and must not be
/// invoked from an async task; use `execute_async` there. On that path the
/// configured read timeout covers the whole call rather than each read.
/// Async methods
/// return `BoxFuture` so the trait stays dyn-compatible (`Arc<dyn HttpTransport>`).
pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;

    fn execute_async<'a>(&'a self, request: &'a HttpRequest)
    -> BoxFuture<'a, Result<HttpResponse>>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request)
    }

    fn execute_async<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> BoxFuture<'a, Result<HttpResponse>> {
        (**self).execute_async(request)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request)
    }

    fn execute_async<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> BoxFuture<'a, Result<HttpResponse>> {
        (**self).execute_async(request)
    }
}
