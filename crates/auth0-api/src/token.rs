//! Access token supply
//!
//! Requests ask a `TokenProvider` for a bearer token just before dispatch.
//! Acquiring or refreshing tokens is the caller's business; the static
//! provider covers the common case of a pre-issued Management API token.

use common::Secret;
use transport::BoxFuture;

use crate::error::Result;

pub trait TokenProvider: Send + Sync {
    /// Token for a synchronous request.
    fn token(&self) -> Result<Secret<String>>;

    /// Token for an asynchronous request.
    fn token_async(&self) -> BoxFuture<'_, Result<Secret<String>>>;
}

/// Always hands out the same token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: Secret<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Secret<String>) -> Self {
        Self { token }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token(&self) -> Result<Secret<String>> {
        Ok(self.token.clone())
    }

    fn token_async(&self) -> BoxFuture<'_, Result<Secret<String>>> {
        Box::pin(async move { Ok(self.token.clone()) })
    }
}
