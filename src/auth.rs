//! Auth capability boundary.
//!
//! The engine only needs a middleware to put in front of protected routes. [`BearerAuth`] is the
//! stock provider: it reads a bearer token and asks a [`TokenVerifier`] who the caller is. How
//! tokens are issued and checked is left to the verifier. Account routes (see
//! [`crate::accounts`]) additionally need a [`TokenIssuer`] and a [`PasswordHasher`].

use crate::response::Reply;
use crate::transport::{middleware_fn, MiddlewareFn, Next, RequestContext, Subject};
use axum::http::{header::AUTHORIZATION, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("password hashing: {0}")]
    Hashing(String),
    #[error("token issuing: {0}")]
    Issuing(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Hashing(_) | AuthError::Issuing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<AuthError> for Reply {
    fn from(e: AuthError) -> Self {
        Reply::error(e.status(), e.to_string())
    }
}

/// Supplies the middleware run before protected routes. Aborting (not calling `next`) keeps the
/// request away from the handler.
pub trait AuthProvider: Send + Sync {
    fn middleware(&self) -> MiddlewareFn;
}

pub trait TokenVerifier: Send + Sync + 'static {
    fn verify(&self, token: &str) -> Result<Subject, AuthError>;
}

/// Mints a token for an authenticated subject. Pairs with a [`TokenVerifier`] that accepts it.
pub trait TokenIssuer: Send + Sync + 'static {
    fn issue(&self, subject: &Subject) -> Result<String, AuthError>;
}

pub trait PasswordHasher: Send + Sync + 'static {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    fn verify(&self, password: &str, hashed: &str) -> bool;
}

/// Token from an `Authorization: Bearer <token>` header value. The scheme is case-insensitive.
pub fn extract_bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub struct BearerAuth<V: TokenVerifier> {
    verifier: Arc<V>,
}

impl<V: TokenVerifier> BearerAuth<V> {
    pub fn new(verifier: V) -> Self {
        BearerAuth {
            verifier: Arc::new(verifier),
        }
    }
}

impl<V: TokenVerifier> AuthProvider for BearerAuth<V> {
    fn middleware(&self) -> MiddlewareFn {
        let verifier = Arc::clone(&self.verifier);
        middleware_fn(move |mut ctx: RequestContext, next: Next| {
            let verdict = ctx
                .header(AUTHORIZATION)
                .and_then(extract_bearer_token)
                .ok_or(AuthError::MissingToken)
                .and_then(|token| verifier.verify(token));
            async move {
                match verdict {
                    Ok(subject) => {
                        tracing::debug!(subject = %subject.id, path = ctx.path(), "authenticated");
                        ctx.scope_mut().subject = Some(subject);
                        next.run(ctx).await
                    }
                    Err(e) => {
                        tracing::debug!(path = ctx.path(), error = %e, "rejected");
                        Reply::from(e)
                    }
                }
            }
        })
    }
}

/// Fixed token table, for demos and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Subject>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        StaticTokenVerifier::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, subject: Subject) -> Self {
        self.tokens.insert(token.into(), subject);
        self
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Result<Subject, AuthError> {
        self.tokens.get(token).cloned().ok_or(AuthError::InvalidToken)
    }
}

/// Random opaque tokens remembered in process memory. Clones share one token table, so the same
/// value can issue tokens on the login route and verify them in [`BearerAuth`].
#[derive(Clone, Debug, Default)]
pub struct OpaqueTokens {
    issued: Arc<RwLock<HashMap<String, Subject>>>,
}

impl OpaqueTokens {
    pub fn new() -> Self {
        OpaqueTokens::default()
    }
}

impl TokenIssuer for OpaqueTokens {
    fn issue(&self, subject: &Subject) -> Result<String, AuthError> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.issued
            .write()
            .map_err(|_| AuthError::Issuing("token table lock poisoned".into()))?
            .insert(token.clone(), subject.clone());
        Ok(token)
    }
}

impl TokenVerifier for OpaqueTokens {
    fn verify(&self, token: &str) -> Result<Subject, AuthError> {
        let issued = self.issued.read().map_err(|_| AuthError::InvalidToken)?;
        issued.get(token).cloned().ok_or(AuthError::InvalidToken)
    }
}

/// Stores passwords as given, behind a marker prefix. Demos and tests only.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainPasswords;

impl PlainPasswords {
    const PREFIX: &'static str = "plain$";
}

impl PasswordHasher for PlainPasswords {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        Ok(format!("{}{}", Self::PREFIX, password))
    }

    fn verify(&self, password: &str, hashed: &str) -> bool {
        hashed.strip_prefix(Self::PREFIX) == Some(password)
    }
}
