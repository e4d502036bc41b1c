//! Default HTTP client
//!
//! Composes the decorator stack over reqwest according to a validated
//! `HttpClientOptions`. The client is cheap to share behind an `Arc` and
//! safe for concurrent use; every request issued through it shares one
//! connection pool.

use crate::error::Result;
use crate::options::HttpClientOptions;
use crate::{
    BoxFuture, Dispatcher, HttpRequest, HttpResponse, HttpTransport, LoggingTransport,
    RateLimitTransport, ReqwestTransport,
};

/// The layered stack built around any base transport.
pub type Layered<T> = RateLimitTransport<LoggingTransport<Dispatcher<T>>>;

/// Wrap `base` in the rate-limit, logging and dispatch layers.
pub fn layered<T: HttpTransport>(options: &HttpClientOptions, base: T) -> Layered<T> {
    let dispatched = Dispatcher::new(
        base,
        options.max_requests(),
        options.max_requests_per_host(),
    );
    let logged = LoggingTransport::new(dispatched, options.logging().clone());
    RateLimitTransport::new(logged, options.max_retries())
}

#[derive(Debug)]
pub struct DefaultHttpClient {
    stack: Layered<ReqwestTransport>,
    options: HttpClientOptions,
}

impl DefaultHttpClient {
    /// Client with default options.
    pub fn new() -> Result<Self> {
        Self::with_options(HttpClientOptions::default())
    }

    pub fn with_options(options: HttpClientOptions) -> Result<Self> {
        let base = ReqwestTransport::new(&options)?;
        Ok(Self {
            stack: layered(&options, base),
            options,
        })
    }

    pub fn options(&self) -> &HttpClientOptions {
        &self.options
    }
}

impl HttpTransport for DefaultHttpClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.stack.execute(request)
    }

    fn execute_async<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> BoxFuture<'a, Result<HttpResponse>> {
        self.stack.execute_async(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, status, url};
    use crate::{Error, HttpMethod};

    #[test]
    fn layered_stack_applies_configured_retries() {
        let options = HttpClientOptions::builder().max_retries(0).build().unwrap();
        let stack = layered(&options, ScriptedTransport::always(status(429)));
        let request = HttpRequest::new(HttpMethod::Get, url("api/v2/users"));

        assert!(matches!(
            stack.execute(&request),
            Err(Error::RateLimited { attempts: 1, .. })
        ));
        assert_eq!(stack.max_retries(), 0);
    }

    #[test]
    fn default_client_keeps_its_options() {
        let client = DefaultHttpClient::new().unwrap();
        assert_eq!(client.options().max_retries(), 3);
        assert_eq!(client.options().max_requests(), 64);
    }
}
