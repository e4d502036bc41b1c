//! Authentication API facade

use common::Secret;
use std::sync::Arc;
use transport::{HttpMethod, HttpTransport};

use crate::client::{ClientCore, CoreBuilder};
use crate::constants::{GRANT_TYPE_PASSWORD, GRANT_TYPE_PASSWORD_REALM, HEADER_AUTHORIZATION};
use crate::error::{Error, Result};
use crate::request::Request;
use crate::types::{TokenHolder, UserInfo};

pub struct AuthApiBuilder {
    core: CoreBuilder,
    client_id: Option<String>,
}

impl AuthApiBuilder {
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn http_client(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.core.transport(transport);
        self
    }

    pub fn telemetry(mut self, enabled: bool) -> Self {
        self.core.telemetry(enabled);
        self
    }

    pub fn build(self) -> Result<AuthApi> {
        let client_id = self
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidArgument("client_id must be set".into()))?;
        Ok(AuthApi {
            core: self.core.build(&[])?,
            client_id,
        })
    }
}

/// Client for the tenant's Authentication API.
#[derive(Clone)]
pub struct AuthApi {
    core: ClientCore,
    client_id: String,
}

impl AuthApi {
    pub fn builder(domain: &str) -> AuthApiBuilder {
        AuthApiBuilder {
            core: CoreBuilder::new(domain),
            client_id: None,
        }
    }

    /// `GET /userinfo` using the end user's access token.
    pub fn user_info(&self, access_token: &Secret<String>) -> Request<UserInfo> {
        let request = Request::json(self.core.transport(), HttpMethod::Get, self.core.url(&["userinfo"]))
            .with_header(HEADER_AUTHORIZATION, format!("Bearer {}", access_token.expose()));
        self.core.prepare(request)
    }

    /// Resource-owner password grant, optionally scoped to a realm
    /// (database connection).
    pub fn login(&self, username: &str, password: &Secret<String>, realm: Option<&str>) -> Request<TokenHolder> {
        let mut request = Request::json(self.core.transport(), HttpMethod::Post, self.core.url(&["oauth", "token"]))
            .with_body_parameter("client_id", self.client_id.as_str())
            .with_body_parameter("username", username)
            .with_body_parameter("password", password.expose().as_str());
        request = match realm {
            Some(realm) => request
                .with_body_parameter("grant_type", GRANT_TYPE_PASSWORD_REALM)
                .with_body_parameter("realm", realm),
            None => request.with_body_parameter("grant_type", GRANT_TYPE_PASSWORD),
        };
        self.core.prepare(request)
    }

    /// `POST /dbconnections/change_password`; the server emails a reset link.
    pub fn reset_password(&self, email: &str, connection: &str) -> Request<()> {
        let request = Request::empty(
            self.core.transport(),
            HttpMethod::Post,
            self.core.url(&["dbconnections", "change_password"]),
        )
        .with_body_parameter("client_id", self.client_id.as_str())
        .with_body_parameter("email", email)
        .with_body_parameter("connection", connection);
        self.core.prepare(request)
    }
}
