//! Shared client plumbing for the API facades
//!
//! Holds the tenant base URL, the transport shared by every request, the
//! optional token provider and the telemetry header value.

use std::sync::Arc;
use tracing::debug;
use transport::{DefaultHttpClient, HttpTransport, Url};

use crate::constants::HEADER_AUTH0_CLIENT;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::telemetry::Telemetry;
use crate::token::TokenProvider;

/// Parse a tenant domain into a base URL.
///
/// Bare domains get `https://`; explicit `http://`/`https://` URLs are
/// kept so tests and proxies can point at a local server.
pub fn base_url(domain: &str) -> Result<Url> {
    let domain = domain.trim();
    if domain.is_empty() {
        return Err(Error::InvalidArgument("domain must not be empty".into()));
    }
    let raw = if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_owned()
    } else {
        format!("https://{domain}")
    };
    let url = Url::parse(&raw)
        .map_err(|e| Error::InvalidArgument(format!("invalid domain {domain:?}: {e}")))?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(Error::InvalidArgument(format!("invalid domain {domain:?}")));
    }
    Ok(url)
}

#[derive(Clone)]
pub(crate) struct ClientCore {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
    token: Option<Arc<dyn TokenProvider>>,
    telemetry: Option<String>,
}

impl ClientCore {
    pub(crate) fn transport(&self) -> Arc<dyn HttpTransport> {
        self.transport.clone()
    }

    /// Base URL extended with percent-encoded path segments.
    pub(crate) fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // base_url() rejects cannot-be-a-base URLs, so this always applies
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Attach telemetry and, when configured, the token provider.
    pub(crate) fn prepare<T>(&self, mut request: Request<T>) -> Request<T> {
        if let Some(telemetry) = &self.telemetry {
            request = request.with_header(HEADER_AUTH0_CLIENT, telemetry.clone());
        }
        if let Some(token) = &self.token {
            request = request.with_token_provider(token.clone());
        }
        request
    }
}

/// Common builder state for both facades.
pub(crate) struct CoreBuilder {
    domain: String,
    transport: Option<Arc<dyn HttpTransport>>,
    token: Option<Arc<dyn TokenProvider>>,
    telemetry: bool,
}

impl CoreBuilder {
    pub(crate) fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_owned(),
            transport: None,
            token: None,
            telemetry: true,
        }
    }

    pub(crate) fn transport(&mut self, transport: Arc<dyn HttpTransport>) {
        self.transport = Some(transport);
    }

    pub(crate) fn token(&mut self, provider: Arc<dyn TokenProvider>) {
        self.token = Some(provider);
    }

    pub(crate) fn telemetry(&mut self, enabled: bool) {
        self.telemetry = enabled;
    }

    pub(crate) fn build(self, prefix: &[&str]) -> Result<ClientCore> {
        let mut base = base_url(&self.domain)?;
        if let Ok(mut path) = base.path_segments_mut() {
            path.pop_if_empty().extend(prefix);
        }
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(DefaultHttpClient::new()?),
        };
        debug!(base_url = %base, telemetry = self.telemetry, "api client configured");
        Ok(ClientCore {
            base_url: base,
            transport,
            token: self.token,
            telemetry: self.telemetry.then(|| Telemetry::default().header_value()),
        })
    }
}
