//! Management API facade
//!
//! Entry points return unexecuted `Request`s so callers choose between
//! `execute()` and `execute_async()`.

use common::Secret;
use std::path::Path;
use std::sync::Arc;
use transport::{HttpMethod, HttpTransport};

use crate::client::{ClientCore, CoreBuilder};
use crate::constants::{KEY_ORGANIZATIONS, KEY_ROLES, KEY_USERS, MANAGEMENT_PATH};
use crate::error::Result;
use crate::filter::{FieldsFilter, PageFilter, ParameterFilter, UserFilter, UsersImportFilter};
use crate::page::Page;
use crate::request::Request;
use crate::token::{StaticTokenProvider, TokenProvider};
use crate::types::{Job, Organization, Role, User};

pub struct ManagementApiBuilder {
    core: CoreBuilder,
}

impl ManagementApiBuilder {
    /// Static Management API token.
    pub fn token(mut self, token: Secret<String>) -> Self {
        self.core.token(Arc::new(StaticTokenProvider::new(token)));
        self
    }

    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.core.token(provider);
        self
    }

    /// Transport shared by every request. Defaults to `DefaultHttpClient`.
    pub fn http_client(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.core.transport(transport);
        self
    }

    /// Send the `Auth0-Client` header (on by default).
    pub fn telemetry(mut self, enabled: bool) -> Self {
        self.core.telemetry(enabled);
        self
    }

    pub fn build(self) -> Result<ManagementApi> {
        Ok(ManagementApi {
            core: self.core.build(&MANAGEMENT_PATH)?,
        })
    }
}

/// Client for `https://{domain}/api/v2/`.
#[derive(Clone)]
pub struct ManagementApi {
    core: ClientCore,
}

impl ManagementApi {
    pub fn builder(domain: &str) -> ManagementApiBuilder {
        ManagementApiBuilder {
            core: CoreBuilder::new(domain),
        }
    }

    pub fn users(&self) -> UsersEntity<'_> {
        UsersEntity { core: &self.core }
    }

    pub fn organizations(&self) -> OrganizationsEntity<'_> {
        OrganizationsEntity { core: &self.core }
    }

    pub fn roles(&self) -> RolesEntity<'_> {
        RolesEntity { core: &self.core }
    }

    pub fn jobs(&self) -> JobsEntity<'_> {
        JobsEntity { core: &self.core }
    }
}

pub struct UsersEntity<'a> {
    core: &'a ClientCore,
}

impl UsersEntity<'_> {
    /// `GET /api/v2/users`
    pub fn list(&self, filter: &UserFilter) -> Request<Page<User>> {
        let request = Request::page(self.core.transport(), self.core.url(&["users"]), KEY_USERS)
            .with_filter(filter);
        self.core.prepare(request)
    }

    /// `GET /api/v2/users/{id}`
    pub fn get(&self, user_id: &str, filter: &FieldsFilter) -> Request<User> {
        let request = Request::json(
            self.core.transport(),
            HttpMethod::Get,
            self.core.url(&["users", user_id]),
        )
        .with_filter(filter);
        self.core.prepare(request)
    }

    /// `POST /api/v2/users`
    pub fn create(&self, user: User) -> Request<User> {
        let request = Request::json(self.core.transport(), HttpMethod::Post, self.core.url(&["users"]))
            .with_body(user);
        self.core.prepare(request)
    }

    /// `PATCH /api/v2/users/{id}`
    pub fn update(&self, user_id: &str, changes: User) -> Request<User> {
        let request = Request::json(
            self.core.transport(),
            HttpMethod::Patch,
            self.core.url(&["users", user_id]),
        )
        .with_body(changes);
        self.core.prepare(request)
    }

    /// `DELETE /api/v2/users/{id}`
    pub fn delete(&self, user_id: &str) -> Request<()> {
        let request = Request::empty(
            self.core.transport(),
            HttpMethod::Delete,
            self.core.url(&["users", user_id]),
        );
        self.core.prepare(request)
    }
}

pub struct OrganizationsEntity<'a> {
    core: &'a ClientCore,
}

impl OrganizationsEntity<'_> {
    /// `GET /api/v2/organizations`. Supports offset and checkpoint paging.
    pub fn list(&self, filter: &PageFilter) -> Request<Page<Organization>> {
        let request = Request::page(
            self.core.transport(),
            self.core.url(&["organizations"]),
            KEY_ORGANIZATIONS,
        )
        .with_filter(filter);
        self.core.prepare(request)
    }

    /// `GET /api/v2/organizations/{id}`
    pub fn get(&self, org_id: &str) -> Request<Organization> {
        let request = Request::json(
            self.core.transport(),
            HttpMethod::Get,
            self.core.url(&["organizations", org_id]),
        );
        self.core.prepare(request)
    }
}

pub struct RolesEntity<'a> {
    core: &'a ClientCore,
}

impl RolesEntity<'_> {
    /// `GET /api/v2/roles`
    pub fn list(&self, filter: &PageFilter) -> Request<Page<Role>> {
        let request = Request::page(self.core.transport(), self.core.url(&["roles"]), KEY_ROLES)
            .with_filter(filter);
        self.core.prepare(request)
    }
}

pub struct JobsEntity<'a> {
    core: &'a ClientCore,
}

impl JobsEntity<'_> {
    /// `POST /api/v2/jobs/users-imports`. `users` is a JSON file of user
    /// records, read when the request executes.
    pub fn import_users(&self, connection_id: &str, users: &Path, options: &UsersImportFilter) -> Request<Job> {
        let mut request = Request::multipart(
            self.core.transport(),
            HttpMethod::Post,
            self.core.url(&["jobs", "users-imports"]),
        );
        for (name, value) in options.as_map() {
            request = request.with_part(name, value.to_string());
        }
        let request = request
            .with_part("connection_id", connection_id)
            .with_file_part("users", users, "text/json");
        self.core.prepare(request)
    }

    /// `GET /api/v2/jobs/{id}`
    pub fn get(&self, job_id: &str) -> Request<Job> {
        let request = Request::json(
            self.core.transport(),
            HttpMethod::Get,
            self.core.url(&["jobs", job_id]),
        );
        self.core.prepare(request)
    }
}
