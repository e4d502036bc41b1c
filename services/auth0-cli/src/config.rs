//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The API token is loaded from AUTH0_API_TOKEN or api_token_file and the
//! proxy password from AUTH0_PROXY_PASSWORD or password_file; neither is
//! stored in the TOML directly.

use common::{Secret, resolve_secret};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use transport::{HttpClientOptions, LogLevel, LoggingOptions, ProxyOptions};

pub const TOKEN_ENV: &str = "AUTH0_API_TOKEN";
pub const PROXY_PASSWORD_ENV: &str = "AUTH0_PROXY_PASSWORD";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub tenant: TenantConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

/// Tenant and credentials
#[derive(Debug, Deserialize)]
pub struct TenantConfig {
    pub domain: String,
    #[serde(skip)]
    pub api_token: Option<Secret<String>>,
    /// Path to a file containing the Management API token
    #[serde(default)]
    pub api_token_file: Option<PathBuf>,
}

/// HTTP client tuning. Unset fields keep the client defaults.
#[derive(Debug, Default, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: Option<i64>,
    pub read_timeout_secs: Option<i64>,
    pub max_requests: Option<i32>,
    pub max_requests_per_host: Option<i32>,
    pub max_retries: Option<i32>,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub redact_headers: Option<Vec<String>>,
}

/// Outbound HTTP proxy
#[derive(Debug, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
    #[serde(default)]
    pub password_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.tenant.domain.trim().is_empty() {
            return Err(common::Error::Config("tenant.domain must not be empty".into()));
        }

        config.tenant.api_token = resolve_secret(TOKEN_ENV, config.tenant.api_token_file.as_deref())?;

        if let Some(proxy) = config.proxy.as_mut() {
            proxy.password = resolve_secret(PROXY_PASSWORD_ENV, proxy.password_file.as_deref())?;
            if proxy.password.is_some() && proxy.username.is_none() {
                return Err(common::Error::Config(
                    "proxy password is set but proxy.username is missing".into(),
                ));
            }
        }

        Ok(config)
    }

    /// Validated transport options. Builder failures keep their message.
    pub fn http_options(&self) -> common::Result<HttpClientOptions> {
        let http = &self.http;
        let mut builder = HttpClientOptions::builder();
        if let Some(secs) = http.connect_timeout_secs {
            builder = builder.connect_timeout(secs);
        }
        if let Some(secs) = http.read_timeout_secs {
            builder = builder.read_timeout(secs);
        }
        if let Some(max) = http.max_requests {
            builder = builder.max_requests(max);
        }
        if let Some(max) = http.max_requests_per_host {
            builder = builder.max_requests_per_host(max);
        }
        if let Some(retries) = http.max_retries {
            builder = builder.max_retries(retries);
        }

        let mut logging = LoggingOptions::new(http.log_level);
        if let Some(headers) = &http.redact_headers {
            logging = logging.with_redacted_headers(headers);
        }
        builder = builder.logging(logging);

        if let Some(proxy) = &self.proxy {
            let mut options = ProxyOptions::new(&proxy.url).map_err(config_error)?;
            if let (Some(username), Some(password)) = (&proxy.username, &proxy.password) {
                options = options.with_basic_auth(username.clone(), password.clone());
            }
            builder = builder.proxy(options);
        }

        builder.build().map_err(config_error)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("auth0-cli.toml")
    }
}

fn config_error(err: transport::Error) -> common::Error {
    common::Error::Config(err.to_string())
}
