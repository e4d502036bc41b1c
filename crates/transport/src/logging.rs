//! Request/response logging decorator
//!
//! Emits `tracing` events at the configured verbosity. Header values named
//! in the redaction set are replaced before formatting.

use std::time::Instant;
use tracing::info;

use crate::error::Result;
use crate::options::{LogLevel, LoggingOptions};
use crate::{BoxFuture, FormPart, HttpRequest, HttpResponse, HttpTransport};

const REDACTED: &str = "██";

#[derive(Debug, Clone)]
pub struct LoggingTransport<T> {
    inner: T,
    options: LoggingOptions,
}

impl<T: HttpTransport> LoggingTransport<T> {
    pub fn new(inner: T, options: LoggingOptions) -> Self {
        Self { inner, options }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn log_request(&self, request: &HttpRequest) {
        match self.options.level() {
            LogLevel::None => {}
            LogLevel::Basic => {
                info!(method = %request.method(), url = %request.url(), "--> request");
            }
            LogLevel::Headers => {
                info!(
                    method = %request.method(),
                    url = %request.url(),
                    headers = %format_headers(request.header_entries(), &self.options),
                    "--> request"
                );
            }
            LogLevel::Body => {
                info!(
                    method = %request.method(),
                    url = %request.url(),
                    headers = %format_headers(request.header_entries(), &self.options),
                    body = %format_body(request),
                    "--> request"
                );
            }
        }
    }

    fn log_response(&self, request: &HttpRequest, response: &Result<HttpResponse>, started: Instant) {
        let level = self.options.level();
        if level == LogLevel::None {
            return;
        }
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                info!(url = %request.url(), elapsed_ms, error = %e, "<-- failed");
                return;
            }
        };
        match level {
            LogLevel::None => {}
            LogLevel::Basic => {
                info!(url = %request.url(), status = response.status(), elapsed_ms, "<-- response");
            }
            LogLevel::Headers => {
                info!(
                    url = %request.url(),
                    status = response.status(),
                    elapsed_ms,
                    headers = %format_headers(response.header_entries(), &self.options),
                    "<-- response"
                );
            }
            LogLevel::Body => {
                info!(
                    url = %request.url(),
                    status = response.status(),
                    elapsed_ms,
                    headers = %format_headers(response.header_entries(), &self.options),
                    body = %response.body(),
                    "<-- response"
                );
            }
        }
    }
}

/// Render headers as `name: value` pairs, redacting sensitive names.
pub(crate) fn format_headers<'a>(
    headers: impl Iterator<Item = (&'a str, &'a str)>,
    options: &LoggingOptions,
) -> String {
    headers
        .map(|(name, value)| {
            if options.is_redacted(name) {
                format!("{name}: {REDACTED}")
            } else {
                format!("{name}: {value}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Byte bodies render as lossy UTF-8; multipart bodies list their part names.
fn format_body(request: &HttpRequest) -> String {
    if let Some(parts) = request.form_parts() {
        let names: Vec<&str> = parts.iter().map(FormPart::name).collect();
        return format!("multipart[{}]", names.join(", "));
    }
    match request.body() {
        Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        None => String::new(),
    }
}

impl<T: HttpTransport> HttpTransport for LoggingTransport<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.log_request(request);
        let started = Instant::now();
        let response = self.inner.execute(request);
        self.log_response(request, &response, started);
        response
    }

    fn execute_async<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> BoxFuture<'a, Result<HttpResponse>> {
        Box::pin(async move {
            self.log_request(request);
            let started = Instant::now();
            let response = self.inner.execute_async(request).await;
            self.log_response(request, &response, started);
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpMethod;
    use crate::testing::{ScriptedTransport, url};

    #[test]
    fn default_redaction_hides_authorization() {
        let options = LoggingOptions::new(LogLevel::Headers);
        let request = HttpRequest::new(HttpMethod::Get, url("api/v2/users"))
            .with_header("Authorization", "Bearer secret-token")
            .with_header("Content-Type", "application/json");

        let rendered = format_headers(request.header_entries(), &options);
        assert_eq!(
            rendered,
            "authorization: ██, content-type: application/json"
        );
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn custom_redaction_set_applies_to_responses() {
        let options = LoggingOptions::new(LogLevel::Body).with_redacted_headers(["Set-Cookie"]);
        let response = HttpResponse::new(200, [("Set-Cookie", "sid=1"), ("X-Id", "7")], "{}");
        let rendered = format_headers(response.header_entries(), &options);
        assert_eq!(rendered, "set-cookie: ██, x-id: 7");
    }

    #[test]
    fn body_renders_lossy_utf8() {
        let request = HttpRequest::new(HttpMethod::Post, url("oauth/token"));
        assert_eq!(format_body(&request), "");
        assert_eq!(format_body(&request.with_body("{\"a\":1}")), "{\"a\":1}");
    }

    #[test]
    fn multipart_body_renders_part_names_only() {
        let request = HttpRequest::new(HttpMethod::Post, url("api/v2/jobs/users-imports")).with_multipart(vec![
            FormPart::text("connection_id", "con_1"),
            FormPart::file("users", "users.json", "text/json", b"[{\"email\":\"a@b.c\"}]".to_vec()),
        ]);
        let rendered = format_body(&request);
        assert_eq!(rendered, "multipart[connection_id, users]");
        assert!(!rendered.contains("a@b.c"));
    }

    #[test]
    fn logging_passes_responses_through_at_every_level() {
        for level in [LogLevel::None, LogLevel::Basic, LogLevel::Headers, LogLevel::Body] {
            let inner = ScriptedTransport::always(HttpResponse::new(200, [("x-a", "1")], "ok"));
            let transport = LoggingTransport::new(inner, LoggingOptions::new(level));
            let request = HttpRequest::new(HttpMethod::Get, url("userinfo"));
            let response = transport.execute(&request).unwrap();
            assert_eq!(response.body(), "ok");
            assert_eq!(transport.inner().calls(), 1);
        }
    }
}
