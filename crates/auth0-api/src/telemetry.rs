//! `Auth0-Client` telemetry header
//!
//! The header value is the URL-safe, unpadded base64 of a JSON document
//! naming the library, its version and the runtime environment. The
//! `rust` entry is the minimum supported toolchain the crate declares.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::constants::CLIENT_NAME;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Telemetry {
    name: String,
    version: String,
    env: BTreeMap<String, String>,
}

impl Telemetry {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Encoded header value.
    pub fn header_value(&self) -> String {
        // serializing a struct of strings and a string map cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(CLIENT_NAME, env!("CARGO_PKG_VERSION"))
            .with_env("rust", env!("CARGO_PKG_RUST_VERSION"))
            .with_env("os", std::env::consts::OS)
            .with_env("arch", std::env::consts::ARCH)
    }
}
