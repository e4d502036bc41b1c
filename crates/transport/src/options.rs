//! HTTP client configuration
//!
//! Timeouts clamp silently: negative input becomes 0, and 0 disables the
//! timeout. Counts fail `build()` with an `InvalidConfig` error instead,
//! so a bad pool size or retry bound never reaches the first request.

use common::Secret;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use crate::Url;
use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT_SECS: i64 = 10;
pub const DEFAULT_MAX_REQUESTS: i32 = 64;
pub const DEFAULT_MAX_REQUESTS_PER_HOST: i32 = 5;
pub const DEFAULT_MAX_RETRIES: i32 = 3;
pub const MAX_RETRIES_LIMIT: i32 = 10;

/// Headers redacted from logs unless the caller overrides the set.
pub const DEFAULT_REDACTED_HEADERS: [&str; 2] = ["authorization", "proxy-authorization"];

/// Request/response logging verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    None,
    Basic,
    Headers,
    Body,
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(LogLevel::None),
            "basic" => Ok(LogLevel::Basic),
            "headers" => Ok(LogLevel::Headers),
            "body" => Ok(LogLevel::Body),
            other => Err(Error::InvalidConfig(format!(
                "unknown log level {other:?}, expected none, basic, headers or body"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    level: LogLevel,
    redacted: BTreeSet<String>,
}

impl LoggingOptions {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            redacted: DEFAULT_REDACTED_HEADERS
                .iter()
                .map(|h| h.to_string())
                .collect(),
        }
    }

    /// Replace the redaction set. Names are matched case-insensitively.
    pub fn with_redacted_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.redacted = headers
            .into_iter()
            .map(|h| h.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn is_redacted(&self, header: &str) -> bool {
        self.redacted.contains(&header.to_ascii_lowercase())
    }
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self::new(LogLevel::None)
    }
}

/// Forward proxy, optionally with basic auth.
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    url: Url,
    username: Option<String>,
    password: Option<Secret<String>>,
}

impl ProxyOptions {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::InvalidConfig(format!("invalid proxy url {url:?}: {e}")))?;
        Ok(Self {
            url,
            username: None,
            password: None,
        })
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Secret<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.expose().as_str())),
            _ => None,
        }
    }
}

/// Validated client settings. Obtain through [`HttpClientOptions::builder`].
#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
    max_requests: usize,
    max_requests_per_host: usize,
    max_retries: u32,
    logging: LoggingOptions,
    proxy: Option<ProxyOptions>,
}

impl HttpClientOptions {
    pub fn builder() -> HttpClientOptionsBuilder {
        HttpClientOptionsBuilder::default()
    }

    /// `None` when the timeout is disabled.
    pub fn connect_timeout(&self) -> Option<Duration> {
        secs_to_timeout(self.connect_timeout_secs)
    }

    /// `None` when the timeout is disabled.
    ///
    /// The async client applies this per read. The blocking client has no
    /// per-read setting, so on the synchronous path it bounds the whole
    /// call instead.
    pub fn read_timeout(&self) -> Option<Duration> {
        secs_to_timeout(self.read_timeout_secs)
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn max_requests_per_host(&self) -> usize {
        self.max_requests_per_host
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn logging(&self) -> &LoggingOptions {
        &self.logging
    }

    pub fn proxy(&self) -> Option<&ProxyOptions> {
        self.proxy.as_ref()
    }
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_TIMEOUT_SECS as u64,
            read_timeout_secs: DEFAULT_TIMEOUT_SECS as u64,
            max_requests: DEFAULT_MAX_REQUESTS as usize,
            max_requests_per_host: DEFAULT_MAX_REQUESTS_PER_HOST as usize,
            max_retries: DEFAULT_MAX_RETRIES as u32,
            logging: LoggingOptions::default(),
            proxy: None,
        }
    }
}

fn secs_to_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Builder for [`HttpClientOptions`]. Counts are validated in `build()`.
#[derive(Debug, Clone)]
pub struct HttpClientOptionsBuilder {
    connect_timeout: i64,
    read_timeout: i64,
    max_requests: i32,
    max_requests_per_host: i32,
    max_retries: i32,
    logging: LoggingOptions,
    proxy: Option<ProxyOptions>,
}

impl Default for HttpClientOptionsBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_TIMEOUT_SECS,
            read_timeout: DEFAULT_TIMEOUT_SECS,
            max_requests: DEFAULT_MAX_REQUESTS,
            max_requests_per_host: DEFAULT_MAX_REQUESTS_PER_HOST,
            max_retries: DEFAULT_MAX_RETRIES,
            logging: LoggingOptions::default(),
            proxy: None,
        }
    }
}

impl HttpClientOptionsBuilder {
    /// Connect timeout in seconds. Negative values clamp to 0 (no timeout).
    pub fn connect_timeout(mut self, secs: i64) -> Self {
        self.connect_timeout = secs.max(0);
        self
    }

    /// Read timeout in seconds. Negative values clamp to 0 (no timeout).
    /// See [`HttpClientOptions::read_timeout`] for how each path applies it.
    pub fn read_timeout(mut self, secs: i64) -> Self {
        self.read_timeout = secs.max(0);
        self
    }

    pub fn max_requests(mut self, max: i32) -> Self {
        self.max_requests = max;
        self
    }

    pub fn max_requests_per_host(mut self, max: i32) -> Self {
        self.max_requests_per_host = max;
        self
    }

    /// Extra attempts after a 429. Must be within 0..=10.
    pub fn max_retries(mut self, retries: i32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn logging(mut self, logging: LoggingOptions) -> Self {
        self.logging = logging;
        self
    }

    pub fn proxy(mut self, proxy: ProxyOptions) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn build(self) -> Result<HttpClientOptions> {
        if !(0..=MAX_RETRIES_LIMIT).contains(&self.max_retries) {
            return Err(Error::InvalidConfig(
                "Retries must be between zero and ten.".into(),
            ));
        }
        if self.max_requests < 1 {
            return Err(Error::InvalidConfig(
                "maxRequests must be one or greater.".into(),
            ));
        }
        if self.max_requests_per_host < 1 {
            return Err(Error::InvalidConfig(
                "maxRequestsPerHost must be one or greater.".into(),
            ));
        }

        Ok(HttpClientOptions {
            connect_timeout_secs: self.connect_timeout as u64,
            read_timeout_secs: self.read_timeout as u64,
            max_requests: self.max_requests as usize,
            max_requests_per_host: self.max_requests_per_host as usize,
            max_retries: self.max_retries as u32,
            logging: self.logging,
            proxy: self.proxy,
        })
    }
}
