//! Transport metrics
//!
//! Emitted through the `metrics` facade; calls are no-ops until the host
//! application installs a recorder.
//!
//! - `transport_requests_total` (counter): labels `method`, `status`, one per physical attempt
//! - `transport_rate_limit_retries_total` (counter): 429s that were retried
//! - `transport_rate_limit_exhausted_total` (counter): 429s that ran out of retries

pub fn record_attempt(method: &str, status: u16) {
    metrics::counter!(
        "transport_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_rate_limit_retry() {
    metrics::counter!("transport_rate_limit_retries_total").increment(1);
}

pub fn record_rate_limit_exhausted() {
    metrics::counter!("transport_rate_limit_exhausted_total").increment(1);
}
