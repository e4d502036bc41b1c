//! Shared types for the Auth0 client workspace
//!
//! Holds the configuration error type used by loaders and the `Secret`
//! wrapper that keeps API tokens and proxy passwords out of logs.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::{Secret, resolve_secret};
