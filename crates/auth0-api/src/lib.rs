//! Auth0 API client core
//!
//! Builds on the `transport` crate: every facade method returns a
//! [`Request`] that can be executed synchronously or asynchronously and
//! decodes into a typed [`ApiResponse`]. Failures are classified into
//! [`ApiError`], [`RateLimitError`] and transport-level errors.

pub mod authentication;
pub mod client;
pub mod constants;
pub mod error;
pub mod filter;
pub mod management;
pub mod page;
pub mod password_policy;
pub mod request;
pub mod telemetry;
pub mod token;
pub mod types;

pub use authentication::{AuthApi, AuthApiBuilder};
pub use client::base_url;
pub use error::{ApiError, Error, RateLimitError, Result, TokenQuotaBucket, TokenQuotaLimit};
pub use filter::{
    CheckpointFilter, ClientFilter, DeviceCredentialsFilter, FieldsFilter, Filter, FilterValue, PageFilter,
    ParameterFilter, QueryFilter, RulesFilter, UserFilter, UsersImportFilter,
};
pub use management::{ManagementApi, ManagementApiBuilder};
pub use page::Page;
pub use request::{ApiResponse, Request};
pub use telemetry::Telemetry;
pub use token::{StaticTokenProvider, TokenProvider};
pub use types::{Job, Organization, Role, TokenHolder, User, UserInfo};
