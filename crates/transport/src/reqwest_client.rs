//! reqwest-backed base transport
//!
//! The async client is built eagerly and shared for the life of the
//! transport. The blocking client is built on first synchronous use,
//! because reqwest's blocking client cannot be constructed from inside an
//! async runtime and most callers never touch the sync path.

use std::sync::OnceLock;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::options::HttpClientOptions;
use crate::{BoxFuture, FormPart, HttpMethod, HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    blocking: OnceLock<reqwest::blocking::Client>,
    options: HttpClientOptions,
}

impl ReqwestTransport {
    pub fn new(options: &HttpClientOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = options.read_timeout() {
            builder = builder.read_timeout(timeout);
        }
        if let Some(proxy) = build_proxy(options)? {
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            blocking: OnceLock::new(),
            options: options.clone(),
        })
    }

    fn blocking_client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.blocking.get() {
            return Ok(client);
        }
        // the blocking client has no per-read timeout; read_timeout bounds the whole call here
        let mut builder = reqwest::blocking::Client::builder()
            .connect_timeout(self.options.connect_timeout())
            .timeout(self.options.read_timeout());
        if let Some(proxy) = build_proxy(&self.options)? {
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build blocking HTTP client: {e}")))?;
        Ok(self.blocking.get_or_init(|| client))
    }
}

fn build_proxy(options: &HttpClientOptions) -> Result<Option<reqwest::Proxy>> {
    let Some(proxy) = options.proxy() else {
        return Ok(None);
    };
    let mut built = reqwest::Proxy::all(proxy.url().as_str())
        .map_err(|e| Error::InvalidConfig(format!("invalid proxy: {e}")))?;
    if let Some((user, password)) = proxy.basic_auth() {
        built = built.basic_auth(user, password);
    }
    Ok(Some(built))
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn part_error(media_type: &str, e: reqwest::Error) -> Error {
    Error::InvalidRequest(format!("invalid media type {media_type:?} for multipart part: {e}"))
}

fn async_form(parts: &[FormPart]) -> Result<reqwest::multipart::Form> {
    use reqwest::multipart::{Form, Part};
    parts.iter().try_fold(Form::new(), |form, part| match part {
        FormPart::Text { name, value } => Ok(form.text(name.clone(), value.clone())),
        FormPart::File {
            name,
            file_name,
            media_type,
            content,
        } => {
            let part = Part::bytes(content.clone())
                .file_name(file_name.clone())
                .mime_str(media_type)
                .map_err(|e| part_error(media_type, e))?;
            Ok(form.part(name.clone(), part))
        }
    })
}

fn blocking_form(parts: &[FormPart]) -> Result<reqwest::blocking::multipart::Form> {
    use reqwest::blocking::multipart::{Form, Part};
    parts.iter().try_fold(Form::new(), |form, part| match part {
        FormPart::Text { name, value } => Ok(form.text(name.clone(), value.clone())),
        FormPart::File {
            name,
            file_name,
            media_type,
            content,
        } => {
            let part = Part::bytes(content.clone())
                .file_name(file_name.clone())
                .mime_str(media_type)
                .map_err(|e| part_error(media_type, e))?;
            Ok(form.part(name.clone(), part))
        }
    })
}

/// Headers to send. A multipart body brings its own `Content-Type` with
/// the boundary, so a caller-supplied one is dropped.
fn outgoing_headers(request: &HttpRequest) -> impl Iterator<Item = (&str, &str)> {
    let multipart = request.form_parts().is_some();
    request
        .header_entries()
        .filter(move |(name, _)| !(multipart && *name == "content-type"))
}

/// Flatten a header map, joining repeated names with ", ".
fn collect_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::with_capacity(headers.len());
    for name in headers.keys() {
        let value = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        out.push((name.as_str().to_owned(), value));
    }
    out
}

impl HttpTransport for ReqwestTransport {
    #[instrument(skip_all, fields(method = %request.method(), host = %request.host_key()))]
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let client = self.blocking_client()?;
        let mut builder = client.request(to_reqwest_method(request.method()), request.url().clone());
        for (name, value) in outgoing_headers(request) {
            builder = builder.header(name, value);
        }
        if let Some(parts) = request.form_parts() {
            builder = builder.multipart(blocking_form(parts)?);
        } else if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.text()?;
        Ok(HttpResponse::new(status, headers, body))
    }

    fn execute_async<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> BoxFuture<'a, Result<HttpResponse>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(to_reqwest_method(request.method()), request.url().clone());
            for (name, value) in outgoing_headers(request) {
                builder = builder.header(name, value);
            }
            if let Some(parts) = request.form_parts() {
                builder = builder.multipart(async_form(parts)?);
            } else if let Some(body) = request.body() {
                builder = builder.body(body.to_vec());
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = collect_headers(response.headers());
            let body = response.text().await?;
            Ok(HttpResponse::new(status, headers, body))
        })
    }
}
