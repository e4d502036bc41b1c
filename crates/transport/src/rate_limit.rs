//! Rate-limit aware retry
//!
//! `RateLimitTransport` retries requests that come back with HTTP 429, up to
//! `max_retries` extra attempts, reusing the exact same `HttpRequest` each
//! time. The wait before each retry is chosen in this order:
//!
//! 1. `X-RateLimit-Reset` (epoch seconds): wait until the reset instant.
//! 2. `Retry-After` (delay seconds).
//! 3. Exponential backoff with jitter, seeded from the retry count.
//!
//! Header-derived waits are floored at `min_wait` so a reset in the past
//! never turns into a zero or negative sleep, and capped at `max_wait`.
//! The synchronous path sleeps the calling thread; the async path awaits a
//! tokio timer and never blocks the executor.

use rand::RngExt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::{BoxFuture, HttpRequest, HttpResponse, HttpTransport};

pub const TOO_MANY_REQUESTS: u16 = 429;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// Rate-limit headers seen on one response. Any field may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
    /// Epoch seconds at which the window resets.
    pub reset: Option<i64>,
    /// Delay in seconds from `Retry-After`.
    pub retry_after: Option<i64>,
}

impl RateLimitState {
    /// Parse rate-limit headers. Missing or malformed values become `None`.
    pub fn from_response(response: &HttpResponse) -> Self {
        let parse = |name: &str| response.header(name).and_then(|v| v.trim().parse().ok());
        Self {
            limit: parse(HEADER_LIMIT),
            remaining: parse(HEADER_REMAINING),
            reset: parse(HEADER_RESET),
            retry_after: parse(HEADER_RETRY_AFTER),
        }
    }
}

/// Backoff schedule used between 429 retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// First fallback delay; doubles with each retry.
    pub initial: Duration,
    /// Cap for the exponential fallback.
    pub max_interval: Duration,
    /// Fraction of the delay applied as random +/- jitter.
    pub jitter: f64,
    /// Floor for header-derived waits.
    pub min_wait: Duration,
    /// Cap for header-derived waits.
    pub max_wait: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max_interval: Duration::from_millis(1000),
            jitter: 0.2,
            min_wait: Duration::from_millis(100),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Exponential delay for `retry` (0-indexed) with `sample` in `[-1, 1]`
    /// scaling the jitter.
    pub fn exponential(&self, retry: u32, sample: f64) -> Duration {
        let base = self
            .initial
            .saturating_mul(2_u32.saturating_pow(retry))
            .min(self.max_interval);
        let factor = (1.0 + self.jitter * sample.clamp(-1.0, 1.0)).max(0.0);
        let jittered = (base.as_millis() as f64 * factor).round() as u64;
        Duration::from_millis(jittered).min(self.max_interval)
    }

    /// Wait before retry number `retry`, given the headers of the 429 and the
    /// current time in epoch milliseconds.
    pub fn wait_for(&self, state: &RateLimitState, retry: u32, now_ms: i64, sample: f64) -> Duration {
        if let Some(reset) = state.reset {
            let wait_ms = reset.saturating_mul(1000).saturating_sub(now_ms);
            return self.clamp_header_wait(wait_ms);
        }
        if let Some(secs) = state.retry_after {
            return self.clamp_header_wait(secs.saturating_mul(1000));
        }
        self.exponential(retry, sample)
    }

    fn clamp_header_wait(&self, wait_ms: i64) -> Duration {
        let wait = Duration::from_millis(wait_ms.max(0) as u64);
        wait.clamp(self.min_wait, self.max_wait)
    }

    fn next_wait(&self, state: &RateLimitState, retry: u32) -> Duration {
        let sample = rand::rng().random_range(-1.0..=1.0);
        self.wait_for(state, retry, now_epoch_ms(), sample)
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

enum Step {
    Done(HttpResponse),
    Retry(Duration),
}

/// Decorator that retries 429 responses from the inner transport.
#[derive(Debug, Clone)]
pub struct RateLimitTransport<T> {
    inner: T,
    max_retries: u32,
    policy: BackoffPolicy,
}

impl<T: HttpTransport> RateLimitTransport<T> {
    pub fn new(inner: T, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            policy: BackoffPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn step(&self, request: &HttpRequest, response: HttpResponse, retries: u32) -> Result<Step> {
        crate::metrics::record_attempt(request.method().as_str(), response.status());
        if response.status() != TOO_MANY_REQUESTS {
            return Ok(Step::Done(response));
        }

        let state = RateLimitState::from_response(&response);
        if retries >= self.max_retries {
            crate::metrics::record_rate_limit_exhausted();
            warn!(
                url = %request.url(),
                attempts = retries + 1,
                limit = ?state.limit,
                remaining = ?state.remaining,
                reset = ?state.reset,
                "rate limit retries exhausted"
            );
            return Err(Error::RateLimited {
                state,
                response: Box::new(response),
                attempts: retries + 1,
            });
        }

        let wait = self.policy.next_wait(&state, retries);
        crate::metrics::record_rate_limit_retry();
        debug!(
            url = %request.url(),
            retry = retries + 1,
            wait_ms = wait.as_millis() as u64,
            reset = ?state.reset,
            "rate limited, retrying"
        );
        Ok(Step::Retry(wait))
    }
}

impl<T: HttpTransport> HttpTransport for RateLimitTransport<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut retries = 0;
        loop {
            let response = self.inner.execute(request)?;
            match self.step(request, response, retries)? {
                Step::Done(response) => return Ok(response),
                Step::Retry(wait) => {
                    std::thread::sleep(wait);
                    retries += 1;
                }
            }
        }
    }

    fn execute_async<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> BoxFuture<'a, Result<HttpResponse>> {
        Box::pin(async move {
            let mut retries = 0;
            loop {
                let response = self.inner.execute_async(request).await?;
                match self.step(request, response, retries)? {
                    Step::Done(response) => return Ok(response),
                    Step::Retry(wait) => {
                        tokio::time::sleep(wait).await;
                        retries += 1;
                    }
                }
            }
        })
    }
}
