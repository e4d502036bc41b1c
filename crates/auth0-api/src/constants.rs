//! Wire constants shared by both API facades

/// Telemetry header identifying the client library.
pub const HEADER_AUTH0_CLIENT: &str = "Auth0-Client";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Library name reported in telemetry.
pub const CLIENT_NAME: &str = "auth0-rust";

/// Management API path prefix.
pub const MANAGEMENT_PATH: [&str; 2] = ["api", "v2"];

pub const KEY_USERS: &str = "users";
pub const KEY_ORGANIZATIONS: &str = "organizations";
pub const KEY_ROLES: &str = "roles";

pub const GRANT_TYPE_PASSWORD: &str = "password";
pub const GRANT_TYPE_PASSWORD_REALM: &str = "http://auth0.com/oauth/grant-type/password-realm";
