//! Account routes: `POST /auth/register` and `POST /auth/login`.
//!
//! Accounts are ordinary records persisted through the [`Storage`] port. Registration hashes the
//! password with a [`PasswordHasher`]; login checks it and answers with a token minted by a
//! [`TokenIssuer`]. The token's subject is the account identifier.

use crate::auth::{AuthError, PasswordHasher, TokenIssuer};
use crate::error::CrudError;
use crate::record::{new_zero_instance, read_identifier, to_document, Record};
use crate::response::Reply;
use crate::service::CrudService;
use crate::storage::{ListQuery, Pagination, Storage};
use crate::transport::{handler_fn, HandlerFn, HttpEngine, RequestContext, Subject};
use axum::http::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub const REGISTER_PATH: &str = "/auth/register";
pub const LOGIN_PATH: &str = "/auth/login";

/// A record that can log in.
pub trait Account: Record {
    /// Field holding the login name. Logins are looked up by exact match on it.
    const LOGIN_FIELD: &'static str = "email";
    /// Field holding the password hash; never echoed back.
    const PASSWORD_FIELD: &'static str = "password";

    fn login(&self) -> &str;

    fn password_hash(&self) -> &str;

    fn set_credentials(&mut self, login: String, password_hash: String);
}

/// Body of both routes: `{"email": ..., "password": ...}`.
#[derive(Debug, Deserialize)]
struct Credentials {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

impl Credentials {
    fn decode(ctx: &RequestContext) -> Result<Self, CrudError> {
        let credentials: Credentials = ctx.decode_body()?;
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(CrudError::Validation("email and password are required".into()));
        }
        Ok(credentials)
    }
}

enum Failure {
    Crud(CrudError),
    Auth(AuthError),
}

impl From<CrudError> for Failure {
    fn from(e: CrudError) -> Self {
        Failure::Crud(e)
    }
}

impl From<AuthError> for Failure {
    fn from(e: AuthError) -> Self {
        Failure::Auth(e)
    }
}

impl From<Failure> for Reply {
    fn from(f: Failure) -> Self {
        match f {
            Failure::Crud(e) => Reply::from(e),
            Failure::Auth(e) => Reply::from(e),
        }
    }
}

pub struct AccountRoutes<A: Account> {
    service: CrudService<A>,
    issuer: Arc<dyn TokenIssuer>,
    hasher: Arc<dyn PasswordHasher>,
}

impl<A: Account> AccountRoutes<A> {
    pub fn new(
        storage: Arc<dyn Storage>,
        issuer: Arc<dyn TokenIssuer>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self, CrudError> {
        let service = CrudService::<A>::new(storage)?;
        for name in [A::LOGIN_FIELD, A::PASSWORD_FIELD] {
            if service.schema().field(name).is_none() {
                return Err(CrudError::Schema(format!("{}: account field '{}' is not declared", A::NAME, name)));
            }
        }
        Ok(AccountRoutes { service, issuer, hasher })
    }

    pub fn register_handler(self: &Arc<Self>) -> HandlerFn {
        let this = Arc::clone(self);
        handler_fn(move |ctx: RequestContext| {
            let this = Arc::clone(&this);
            async move { this.register(&ctx).await.unwrap_or_else(|f| this.failure(&ctx, f)) }
        })
    }

    pub fn login_handler(self: &Arc<Self>) -> HandlerFn {
        let this = Arc::clone(self);
        handler_fn(move |ctx: RequestContext| {
            let this = Arc::clone(&this);
            async move { this.login(&ctx).await.unwrap_or_else(|f| this.failure(&ctx, f)) }
        })
    }

    async fn register(&self, ctx: &RequestContext) -> Result<Reply, Failure> {
        let credentials = Credentials::decode(ctx)?;
        let login = credentials.email.trim().to_string();
        if self.find(&login).await?.is_some() {
            return Err(CrudError::Validation(format!("{} '{}' is already registered", A::LOGIN_FIELD, login)).into());
        }
        let mut account = new_zero_instance::<A>();
        account.set_credentials(login, self.hasher.hash(&credentials.password)?);
        let created = self.service.create(account).await?;
        let id = read_identifier(&created)?;
        tracing::info!(record = A::NAME, id = %id, login = created.login(), "account registered");

        let mut body = to_document(&created)?;
        body.remove(A::PASSWORD_FIELD);
        Ok(Reply::created(&body))
    }

    async fn login(&self, ctx: &RequestContext) -> Result<Reply, Failure> {
        let credentials = Credentials::decode(ctx)?;
        let account = self
            .find(credentials.email.trim())
            .await?
            .filter(|a| self.hasher.verify(&credentials.password, a.password_hash()))
            .ok_or(AuthError::InvalidCredentials)?;
        let subject = Subject::new(read_identifier(&account)?);
        let token = self.issuer.issue(&subject)?;
        tracing::debug!(record = A::NAME, subject = %subject.id, "login");
        Ok(Reply::ok(&json!({ "token": token })))
    }

    async fn find(&self, login: &str) -> Result<Option<A>, CrudError> {
        let mut query = ListQuery {
            pagination: Pagination::new(1, 0),
            ..ListQuery::default()
        };
        query.filters.insert(A::LOGIN_FIELD.to_string(), Value::String(login.to_string()));
        Ok(self.service.list(&query).await?.into_iter().next())
    }

    fn failure(&self, ctx: &RequestContext, f: Failure) -> Reply {
        let reply = Reply::from(f);
        if reply.status.is_server_error() {
            tracing::warn!(record = A::NAME, path = ctx.path(), error = ?reply.error_message(), "account request failed");
        } else {
            tracing::debug!(record = A::NAME, path = ctx.path(), error = ?reply.error_message(), "account request rejected");
        }
        reply
    }
}

/// Register the account routes for `A`. Both routes are public.
pub fn register_account_routes<A, E>(
    engine: &mut E,
    storage: Arc<dyn Storage>,
    issuer: Arc<dyn TokenIssuer>,
    hasher: Arc<dyn PasswordHasher>,
) -> Result<(), CrudError>
where
    A: Account,
    E: HttpEngine + ?Sized,
{
    let routes = Arc::new(AccountRoutes::<A>::new(storage, issuer, hasher)?);
    engine.register_route(Method::POST, REGISTER_PATH, routes.register_handler(), A::NAME, false)?;
    engine.register_route(Method::POST, LOGIN_PATH, routes.login_handler(), A::NAME, false)?;
    tracing::info!(record = A::NAME, register = REGISTER_PATH, login = LOGIN_PATH, "account routes registered");
    Ok(())
}
