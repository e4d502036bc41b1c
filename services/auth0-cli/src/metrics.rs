//! Prometheus exposition for a single CLI run
//!
//! The transport crate emits counters through the `metrics` facade:
//!
//! - `transport_requests_total` (counter): labels `method`, `status`
//! - `transport_rate_limit_retries_total` (counter)
//! - `transport_rate_limit_exhausted_total` (counter)
//!
//! With `--metrics` the CLI installs a recorder and prints the rendered
//! text to stderr once the command has finished.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}
