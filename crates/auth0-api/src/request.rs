//! Request builder and executor
//!
//! A `Request<T>` gathers query parameters, headers and an optional JSON
//! body, then runs once through the shared transport. `T` is the decoded
//! success type: `Request<()>` ignores the body, `Request<Page<U>>`
//! normalizes paginated shapes, anything else is plain JSON.
//!
//! Everything handed to the builder is copied in. The body is serialized
//! when the request executes, not when it is attached.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use transport::rate_limit::TOO_MANY_REQUESTS;
use transport::{BoxFuture, FormPart, HttpMethod, HttpRequest, HttpResponse, HttpTransport, Url};

use common::Secret;

use crate::constants::{CONTENT_TYPE_JSON, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE};
use crate::error::{ApiError, Error, RateLimitError, Result};
use crate::filter::{FilterValue, ParameterFilter};
use crate::page::{Page, parse_page};
use crate::token::TokenProvider;

type Decoder<T> = Box<dyn Fn(&str) -> serde_json::Result<T> + Send + Sync>;

/// Serializable body stored until execution.
pub trait JsonBody: Send + Sync {
    fn to_json(&self) -> serde_json::Result<Vec<u8>>;
}

impl<B: Serialize + Send + Sync> JsonBody for B {
    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Multipart field as given to the builder. Files are read when the
/// request is built.
enum PendingPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        path: PathBuf,
        media_type: String,
    },
}

/// Successful response with its decoded body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    status: u16,
    headers: BTreeMap<String, String>,
    body: T,
}

impl<T> ApiResponse<T> {
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Lowercased response headers.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &T {
        &self.body
    }

    pub fn into_body(self) -> T {
        self.body
    }
}

/// One pending API call. Consumed by `execute`/`execute_async`.
pub struct Request<T> {
    transport: Arc<dyn HttpTransport>,
    method: HttpMethod,
    url: Url,
    query: BTreeMap<String, FilterValue>,
    headers: BTreeMap<String, String>,
    body: Option<Box<dyn JsonBody>>,
    body_parameters: Map<String, Value>,
    parts: Option<Vec<PendingPart>>,
    token: Option<Arc<dyn TokenProvider>>,
    decode: Decoder<T>,
}

impl<T: DeserializeOwned> Request<T> {
    /// Request whose 2xx body deserializes into `T`.
    pub fn json(transport: Arc<dyn HttpTransport>, method: HttpMethod, url: Url) -> Self {
        Self::with_decoder(transport, method, url, |body| serde_json::from_str(body))
    }

    /// `multipart/form-data` request with a JSON response. Add fields with
    /// `with_part` and `with_file_part`; at least one is required.
    pub fn multipart(transport: Arc<dyn HttpTransport>, method: HttpMethod, url: Url) -> Self {
        let mut request = Self::json(transport, method, url);
        request.parts = Some(Vec::new());
        request
    }
}

impl Request<()> {
    /// Request whose success body is ignored.
    pub fn empty(transport: Arc<dyn HttpTransport>, method: HttpMethod, url: Url) -> Self {
        Self::with_decoder(transport, method, url, |_| Ok(()))
    }
}

impl<U: DeserializeOwned> Request<Page<U>> {
    /// GET for a paginated collection whose items live under `items_key`.
    pub fn page(transport: Arc<dyn HttpTransport>, url: Url, items_key: &'static str) -> Self {
        Self::with_decoder(transport, HttpMethod::Get, url, move |body| {
            let value: Value = serde_json::from_str(body)?;
            parse_page(value, items_key, serde_json::from_value)
        })
    }
}

impl<T> Request<T> {
    pub fn with_decoder<F>(transport: Arc<dyn HttpTransport>, method: HttpMethod, url: Url, decode: F) -> Self
    where
        F: Fn(&str) -> serde_json::Result<T> + Send + Sync + 'static,
    {
        Self {
            transport,
            method,
            url,
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
            body_parameters: Map::new(),
            parts: None,
            token: None,
            decode: Box::new(decode),
        }
    }

    /// Set a header. Names are case-insensitive and a later write wins.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Copy every entry of `headers` into the request.
    pub fn with_headers(mut self, headers: &HashMap<String, String>) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.to_ascii_lowercase(), value.clone());
        }
        self
    }

    /// Add a text field, turning the body into `multipart/form-data`.
    pub fn with_part(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.get_or_insert_with(Vec::new).push(PendingPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Add a file field, turning the body into `multipart/form-data`.
    pub fn with_file_part(
        mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        media_type: impl Into<String>,
    ) -> Self {
        self.parts.get_or_insert_with(Vec::new).push(PendingPart::File {
            name: name.into(),
            path: path.into(),
            media_type: media_type.into(),
        });
        self
    }

    /// Add one query parameter. A later write for the same key wins.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Merge a filter's parameters into the query string.
    pub fn with_filter(mut self, filter: &impl ParameterFilter) -> Self {
        self.query.extend(filter.as_map());
        self
    }

    /// Attach a body, serialized to JSON at execution time.
    pub fn with_body<B: Serialize + Send + Sync + 'static>(mut self, body: B) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    /// Add one field of a JSON object body. Ignored if `with_body` is used.
    pub fn with_body_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body_parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token = Some(provider);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Copy of the query parameters accumulated so far.
    pub fn parameters(&self) -> BTreeMap<String, FilterValue> {
        self.query.clone()
    }

    /// Copy of the headers accumulated so far.
    pub fn headers(&self) -> BTreeMap<String, String> {
        self.headers.clone()
    }

    /// Execute on the calling thread, blocking through any rate-limit retries.
    ///
    /// Must not be called from inside an async task; use `execute_async`.
    pub fn execute(self) -> Result<ApiResponse<T>> {
        let token = match &self.token {
            Some(provider) => Some(provider.token()?),
            None => None,
        };
        let request = self.build(token)?;
        debug!(method = %request.method(), url = %request.url(), "executing request");
        let response = self.transport.execute(&request)?;
        self.parse_response(response)
    }

    /// Execute without blocking; backoff waits run on tokio timers.
    pub fn execute_async(self) -> BoxFuture<'static, Result<ApiResponse<T>>>
    where
        T: Send + 'static,
    {
        Box::pin(async move {
            let token = match &self.token {
                Some(provider) => Some(provider.token_async().await?),
                None => None,
            };
            let request = self.build(token)?;
            debug!(method = %request.method(), url = %request.url(), "executing request");
            let response = self.transport.execute_async(&request).await?;
            self.parse_response(response)
        })
    }

    /// Build the wire request. Exposed for inspection in tests and logging.
    pub fn build(&self, token: Option<Secret<String>>) -> Result<HttpRequest> {
        let mut url = self.url.clone();
        let query = encode_query(&self.query);
        if !query.is_empty() {
            let merged = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
                _ => query,
            };
            url.set_query(Some(&merged));
        }

        let mut request = HttpRequest::new(self.method, url);
        if self.parts.is_none() {
            request = request.with_header(HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON);
        }
        request = request.with_headers(&self.headers);
        if let Some(token) = token {
            request = request.with_header(HEADER_AUTHORIZATION, format!("Bearer {}", token.expose()));
        }

        if let Some(parts) = &self.parts {
            request = request.with_multipart(self.form_parts(parts)?);
        } else if let Some(body) = &self.body {
            request = request.with_body(body.to_json().map_err(Error::Serialization)?);
        } else if !self.body_parameters.is_empty() {
            let body = serde_json::to_vec(&self.body_parameters).map_err(Error::Serialization)?;
            request = request.with_body(body);
        }
        Ok(request)
    }

    fn form_parts(&self, parts: &[PendingPart]) -> Result<Vec<FormPart>> {
        if self.method == HttpMethod::Get {
            return Err(Error::InvalidArgument(
                "multipart/form-data requests do not support the GET method".into(),
            ));
        }
        if parts.is_empty() {
            return Err(Error::InvalidArgument(
                "cannot create a multipart/form-data body with zero parts".into(),
            ));
        }
        parts
            .iter()
            .map(|part| match part {
                PendingPart::Text { name, value } => Ok(FormPart::text(name.clone(), value.clone())),
                PendingPart::File {
                    name,
                    path,
                    media_type,
                } => {
                    let content = std::fs::read(path).map_err(|e| {
                        Error::InvalidArgument(format!("failed to read part file {}: {e}", path.display()))
                    })?;
                    let file_name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| name.clone());
                    Ok(FormPart::file(name.clone(), file_name, media_type.clone(), content))
                }
            })
            .collect()
    }

    fn parse_response(&self, response: HttpResponse) -> Result<ApiResponse<T>> {
        let status = response.status();
        if !response.is_success() {
            if status == TOO_MANY_REQUESTS {
                return Err(RateLimitError::from_response(&response).into());
            }
            return Err(ApiError::from_response(&response).into());
        }

        let body = (self.decode)(response.body())
            .map_err(|source| Error::Deserialization { status, source })?;
        Ok(ApiResponse {
            status,
            headers: response.headers(),
            body,
        })
    }
}

/// Render query parameters. Pre-encoded values go in verbatim; everything
/// else is percent-encoded exactly once.
fn encode_query(params: &BTreeMap<String, FilterValue>) -> String {
    params
        .iter()
        .map(|(key, value)| {
            let key = urlencoding::encode(key);
            if value.is_encoded() {
                format!("{key}={value}")
            } else {
                format!("{key}={}", urlencoding::encode(&value.to_string()))
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::UserFilter;
    use crate::token::StaticTokenProvider;
    use serde::Deserialize;
    use std::sync::Mutex;

    /// Replays one canned response and records what was sent.
    struct Canned {
        response: HttpResponse,
        sent: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: HttpResponse::new(status, [("x-request-id", "r1")], body),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    impl HttpTransport for Canned {
        fn execute(&self, request: &HttpRequest) -> transport::Result<HttpResponse> {
            self.sent.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }

        fn execute_async<'a>(
            &'a self,
            request: &'a HttpRequest,
        ) -> BoxFuture<'a, transport::Result<HttpResponse>> {
            Box::pin(async move { self.execute(request) })
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        id: String,
    }

    fn url() -> Url {
        Url::parse("https://tenant.auth0.test/api/v2/users").unwrap()
    }

    fn query_pairs(request: &HttpRequest) -> BTreeMap<String, String> {
        request.url().query_pairs().into_owned().collect()
    }

    #[test]
    fn filter_parameters_become_query_string() {
        let transport = Canned::new(200, "[]");
        let filter = UserFilter::new()
            .with_page(1, 25)
            .with_sort("name:1")
            .with_fields("name,email", true);
        let request = Request::<Value>::json(transport, HttpMethod::Get, url()).with_filter(&filter);
        let built = request.build(None).unwrap();

        let pairs = query_pairs(&built);
        let expected: BTreeMap<String, String> = [
            ("page", "1"),
            ("per_page", "25"),
            ("sort", "name:1"),
            ("fields", "name,email"),
            ("include_fields", "true"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn encoded_query_is_not_encoded_twice() {
        let transport = Canned::new(200, "[]");
        let filter = UserFilter::new().with_query("id=log123");
        let built = Request::<Value>::json(transport, HttpMethod::Get, url())
            .with_filter(&filter)
            .build(None)
            .unwrap();
        assert_eq!(built.url().query(), Some("q=id%3Dlog123"));
    }

    #[test]
    fn last_parameter_write_wins() {
        let transport = Canned::new(200, "[]");
        let built = Request::<Value>::json(transport, HttpMethod::Get, url())
            .with_parameter("page", 1)
            .with_filter(&UserFilter::new().with_page(3, 10))
            .with_parameter("per_page", 50)
            .build(None)
            .unwrap();
        let pairs = query_pairs(&built);
        assert_eq!(pairs["page"], "3");
        assert_eq!(pairs["per_page"], "50");
    }

    #[test]
    fn headers_include_content_type_and_bearer_token() {
        let transport = Canned::new(200, "{}");
        let built = Request::<Value>::json(transport, HttpMethod::Get, url())
            .with_header("X-Custom", "1")
            .build(Some(Secret::from("tok")))
            .unwrap();
        assert_eq!(built.header("content-type"), Some("application/json"));
        assert_eq!(built.header("authorization"), Some("Bearer tok"));
        assert_eq!(built.header("x-custom"), Some("1"));
    }

    #[test]
    fn caller_header_map_is_copied() {
        let transport = Canned::new(200, "{}");
        let mut headers = HashMap::new();
        headers.insert("X-Trace".to_string(), "a".to_string());
        let request = Request::<Value>::json(transport, HttpMethod::Get, url()).with_headers(&headers);
        headers.insert("X-Trace".to_string(), "b".to_string());

        assert_eq!(request.headers()["x-trace"], "a");
        let built = request.build(None).unwrap();
        assert_eq!(built.header("x-trace"), Some("a"));
    }

    #[test]
    fn header_names_ignore_case_and_last_write_wins() {
        let transport = Canned::new(200, "{}");
        let built = Request::<Value>::json(transport, HttpMethod::Get, url())
            .with_header("x-trace", "first")
            .with_header("X-Trace", "second")
            .build(None)
            .unwrap();
        assert_eq!(built.header("x-trace"), Some("second"));
        assert_eq!(built.headers().len(), 2);
    }

    #[test]
    fn multipart_request_sends_text_and_file_parts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, r#"[{"email":"a@b.c"}]"#).unwrap();

        let transport = Canned::new(201, r#"{"id":"job_1"}"#);
        let built = Request::<Value>::multipart(transport, HttpMethod::Post, url())
            .with_header("X-Custom", "1")
            .with_part("connection_id", "con_1")
            .with_file_part("users", &path, "text/json")
            .build(Some(Secret::from("tok")))
            .unwrap();

        assert_eq!(built.header("content-type"), None);
        assert_eq!(built.header("authorization"), Some("Bearer tok"));
        assert_eq!(built.body(), None);
        assert_eq!(
            built.form_parts().unwrap(),
            [
                FormPart::text("connection_id", "con_1"),
                FormPart::file("users", "users.json", "text/json", br#"[{"email":"a@b.c"}]"#.to_vec()),
            ]
        );
    }

    #[test]
    fn multipart_rejects_get_and_empty_forms() {
        let transport = Canned::new(200, "{}");
        let err = Request::<Value>::multipart(transport.clone(), HttpMethod::Post, url())
            .build(None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "got {err:?}");

        let err = Request::<Value>::multipart(transport, HttpMethod::Get, url())
            .with_part("a", "b")
            .build(None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("GET")), "got {err:?}");
    }

    #[test]
    fn missing_part_file_fails_the_build() {
        let transport = Canned::new(200, "{}");
        let err = Request::<Value>::multipart(transport, HttpMethod::Post, url())
            .with_file_part("users", "/nonexistent/users.json", "text/json")
            .build(None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("users.json")), "got {err:?}");
    }

    #[test]
    fn explicit_body_wins_over_body_parameters() {
        let transport = Canned::new(200, "{}");
        let built = Request::<Value>::json(transport.clone(), HttpMethod::Post, url())
            .with_body_parameter("ignored", true)
            .with_body(serde_json::json!({"email": "a@b.c"}))
            .build(None)
            .unwrap();
        assert_eq!(built.body(), Some(br#"{"email":"a@b.c"}"#.as_slice()));

        let built = Request::<Value>::json(transport.clone(), HttpMethod::Post, url())
            .with_body_parameter("client_id", "abc")
            .build(None)
            .unwrap();
        assert_eq!(built.body(), Some(br#"{"client_id":"abc"}"#.as_slice()));

        let built = Request::<Value>::json(transport, HttpMethod::Get, url())
            .build(None)
            .unwrap();
        assert_eq!(built.body(), None);
    }

    #[test]
    fn success_body_is_decoded() {
        let transport = Canned::new(200, r#"{"id":"auth0|1"}"#);
        let response = Request::<Thing>::json(transport, HttpMethod::Get, url())
            .execute()
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get("x-request-id").map(String::as_str), Some("r1"));
        assert_eq!(response.into_body(), Thing { id: "auth0|1".into() });
    }

    #[test]
    fn empty_request_ignores_body() {
        let transport = Canned::new(204, "");
        let response = Request::empty(transport, HttpMethod::Delete, url()).execute().unwrap();
        assert_eq!(response.status(), 204);
    }

    #[test]
    fn malformed_success_body_is_deserialization_error() {
        let transport = Canned::new(200, "not json");
        let err = Request::<Thing>::json(transport, HttpMethod::Get, url())
            .execute()
            .unwrap_err();
        assert!(matches!(err, Error::Deserialization { status: 200, .. }), "got {err:?}");
    }

    #[test]
    fn error_status_becomes_api_error() {
        let transport = Canned::new(
            404,
            r#"{"statusCode":404,"error":"Not Found","message":"The user does not exist.","errorCode":"inexistent_user"}"#,
        );
        let err = Request::<Thing>::json(transport, HttpMethod::Get, url())
            .execute()
            .unwrap_err();
        match err {
            Error::Api(api) => {
                assert_eq!(api.status(), 404);
                assert_eq!(api.error_code(), Some("inexistent_user"));
                assert_eq!(api.description(), "The user does not exist.");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn plain_429_becomes_rate_limit_error() {
        let transport = Canned::new(429, "");
        let err = Request::<Thing>::json(transport, HttpMethod::Get, url())
            .execute()
            .unwrap_err();
        assert!(matches!(err, Error::RateLimit(_)), "got {err:?}");
    }

    #[test]
    fn page_request_normalizes_totals_shape() {
        let transport = Canned::new(200, r#"{"start":0,"limit":50,"total":1,"users":[{"id":"a"}]}"#);
        let page = Request::<Page<Thing>>::page(transport, url(), "users")
            .execute()
            .unwrap()
            .into_body();
        assert_eq!(page.total, Some(1));
        assert_eq!(page.items, vec![Thing { id: "a".into() }]);
    }

    #[tokio::test]
    async fn async_execution_sends_token_from_provider() {
        let transport = Canned::new(200, r#"{"id":"x"}"#);
        let provider = Arc::new(StaticTokenProvider::new(Secret::from("async-token")));
        let response = Request::<Thing>::json(transport.clone(), HttpMethod::Get, url())
            .with_token_provider(provider)
            .execute_async()
            .await
            .unwrap();
        assert_eq!(response.body().id, "x");

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].header("authorization"), Some("Bearer async-token"));
    }
}
