//! Error taxonomy for API calls
//!
//! - `Transport`: the request never produced a usable response (I/O,
//!   timeout, TLS, bad client configuration).
//! - `RateLimit`: still HTTP 429 after every configured retry.
//! - `Api`: any other non-2xx. Structured when the body was a JSON object,
//!   unstructured (raw body text) otherwise.
//! - `Deserialization`: a 2xx whose body did not match the expected type.

use serde_json::{Map, Value};
use std::fmt;
use transport::HttpResponse;

use crate::password_policy;

const RATE_LIMIT_DESCRIPTION: &str = "Rate limit reached";
const UNKNOWN_DESCRIPTION: &str = "Unknown exception";
const UNKNOWN_ERROR: &str = "Unknown error";

pub const HEADER_CLIENT_QUOTA: &str = "auth0-client-quota-limit";
pub const HEADER_ORGANIZATION_QUOTA: &str = "auth0-organization-quota-limit";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(transport::Error),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to parse the response body (status {status}): {source}")]
    Deserialization {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize the request body: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<transport::Error> for Error {
    fn from(err: transport::Error) -> Self {
        match err {
            transport::Error::RateLimited { response, .. } => {
                Error::RateLimit(RateLimitError::from_response(&response))
            }
            other => Error::Transport(other),
        }
    }
}

/// Result alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Non-2xx response from the API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    status: u16,
    error: Option<String>,
    description: String,
    values: Option<Map<String, Value>>,
}

impl ApiError {
    /// Error built from a JSON error object.
    pub fn from_values(values: Map<String, Value>, status: u16) -> Self {
        Self {
            status,
            error: Some(error_code_of(&values)),
            description: description_of(&values),
            values: Some(values),
        }
    }

    /// Error built from a body that was not a JSON object.
    pub fn from_payload(payload: impl Into<String>, status: u16) -> Self {
        Self {
            status,
            error: None,
            description: payload.into(),
            values: None,
        }
    }

    /// Classify a non-2xx response body.
    pub fn from_response(response: &HttpResponse) -> Self {
        match serde_json::from_str::<Map<String, Value>>(response.body()) {
            Ok(values) => Self::from_values(values, response.status()),
            Err(_) => Self::from_payload(response.body(), response.status()),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Machine-readable error code. `None` for unstructured bodies.
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Any field of the error body, including ones not modelled here.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.as_ref()?.get(key)
    }

    pub fn values(&self) -> Option<&Map<String, Value>> {
        self.values.as_ref()
    }

    pub fn is_structured(&self) -> bool {
        self.values.is_some()
    }

    pub fn is_multifactor_required(&self) -> bool {
        self.error_is("mfa_required")
    }

    pub fn is_multifactor_enroll_required(&self) -> bool {
        self.error_is("unsupported_challenge_type")
    }

    pub fn is_multifactor_token_invalid(&self) -> bool {
        (self.error_is("expired_token") && self.description == "mfa_token is expired")
            || (self.error_is("invalid_grant") && self.description == "Malformed mfa_token")
    }

    pub fn is_invalid_credentials(&self) -> bool {
        self.error_is("invalid_user_password")
            || (self.error_is("invalid_grant") && self.description == "Wrong email or password.")
    }

    pub fn is_verification_required(&self) -> bool {
        self.error_is("requires_verification")
    }

    pub fn is_access_denied(&self) -> bool {
        self.error_is("access_denied")
    }

    fn error_is(&self, code: &str) -> bool {
        self.error.as_deref() == Some(code)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Request failed with status code {}: {}",
            self.status, self.description
        )
    }
}

impl std::error::Error for ApiError {}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn error_code_of(values: &Map<String, Value>) -> String {
    ["errorCode", "error", "code"]
        .iter()
        .find_map(|key| values.get(*key).and_then(text_of))
        .unwrap_or_else(|| UNKNOWN_ERROR.to_owned())
}

fn description_of(values: &Map<String, Value>) -> String {
    if let Some(text) = values.get("error_description").and_then(text_of) {
        return text;
    }
    match values.get("description") {
        Some(Value::String(s)) => return s.clone(),
        Some(Value::Object(policy)) => {
            if let Some(text) = password_policy::describe(policy) {
                return text;
            }
        }
        _ => {}
    }
    ["message", "error"]
        .iter()
        .find_map(|key| values.get(*key).and_then(text_of))
        .unwrap_or_else(|| UNKNOWN_DESCRIPTION.to_owned())
}

/// One token quota window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenQuotaLimit {
    pub quota: i64,
    pub remaining: i64,
    /// Seconds until the window resets.
    pub reset_after: i64,
}

/// Hourly and daily token quotas from an `auth0-*-quota-limit` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenQuotaBucket {
    pub per_hour: Option<TokenQuotaLimit>,
    pub per_day: Option<TokenQuotaLimit>,
}

impl TokenQuotaBucket {
    /// Parse `b=per_hour;q=100;r=99;t=3600,b=per_day;q=1000;r=998;t=86400`.
    ///
    /// Unknown or malformed attributes are ignored and count as zero.
    pub fn parse(header: &str) -> Self {
        let mut bucket = Self::default();
        for part in header.split(',') {
            let mut window = None;
            let mut limit = TokenQuotaLimit::default();
            for attribute in part.split(';') {
                let Some((key, value)) = attribute.split_once('=') else {
                    continue;
                };
                let value = value.trim();
                match key.trim() {
                    "b" => window = Some(value.to_owned()),
                    "q" => limit.quota = value.parse().unwrap_or_default(),
                    "r" => limit.remaining = value.parse().unwrap_or_default(),
                    "t" => limit.reset_after = value.parse().unwrap_or_default(),
                    _ => {}
                }
            }
            match window.as_deref() {
                Some("per_hour") => bucket.per_hour = Some(limit),
                Some("per_day") => bucket.per_day = Some(limit),
                _ => {}
            }
        }
        bucket
    }
}

/// HTTP 429 that outlasted every retry.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitError {
    api: ApiError,
    limit: Option<i64>,
    remaining: Option<i64>,
    reset: Option<i64>,
    retry_after: Option<i64>,
    client_quota: Option<TokenQuotaBucket>,
    organization_quota: Option<TokenQuotaBucket>,
}

impl RateLimitError {
    pub fn from_response(response: &HttpResponse) -> Self {
        let state = transport::RateLimitState::from_response(response);
        let api = match serde_json::from_str::<Map<String, Value>>(response.body()) {
            Ok(values) => ApiError::from_values(values, response.status()),
            Err(_) => ApiError {
                status: response.status(),
                error: None,
                description: RATE_LIMIT_DESCRIPTION.to_owned(),
                values: None,
            },
        };
        Self {
            api,
            limit: state.limit,
            remaining: state.remaining,
            reset: state.reset,
            retry_after: state.retry_after,
            client_quota: response.header(HEADER_CLIENT_QUOTA).map(TokenQuotaBucket::parse),
            organization_quota: response
                .header(HEADER_ORGANIZATION_QUOTA)
                .map(TokenQuotaBucket::parse),
        }
    }

    /// Error body details (`error_code`, `description`, extra values).
    pub fn api(&self) -> &ApiError {
        &self.api
    }

    pub fn limit(&self) -> Option<i64> {
        self.limit
    }

    pub fn remaining(&self) -> Option<i64> {
        self.remaining
    }

    /// Epoch seconds at which the window resets.
    pub fn reset(&self) -> Option<i64> {
        self.reset
    }

    pub fn retry_after(&self) -> Option<i64> {
        self.retry_after
    }

    pub fn client_quota(&self) -> Option<&TokenQuotaBucket> {
        self.client_quota.as_ref()
    }

    pub fn organization_quota(&self) -> Option<&TokenQuotaBucket> {
        self.organization_quota.as_ref()
    }
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.api.fmt(f)
    }
}

impl std::error::Error for RateLimitError {}
