//! crudkit: generic CRUD REST engine.
//!
//! Describe a record type once ([`Record`]), pick a [`Storage`] backend and an [`HttpEngine`], and
//! the engine derives a pluralized resource path and serves list, get, create, update, patch and
//! delete for it, with lifecycle [`Hooks`] and per-method auth protection. An [`Account`] record type
//! adds register and login routes.

pub mod accounts;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod inflect;
pub mod record;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod storage;
pub mod transport;

pub use accounts::{register_account_routes, Account, AccountRoutes};
pub use app::App;
pub use auth::{
    extract_bearer_token, AuthError, AuthProvider, BearerAuth, OpaqueTokens, PasswordHasher, PlainPasswords,
    StaticTokenVerifier, TokenIssuer, TokenVerifier,
};
pub use config::CrudConfig;
pub use error::CrudError;
pub use hooks::{HookError, HookResult, Hooks};
pub use record::{Document, Field, FieldKind, IdValue, Record, RecordSchema};
pub use response::{error_body, Reply};
pub use routes::register_crud_routes;
pub use service::CrudService;
pub use settings::Settings;
pub use storage::{ListQuery, MemoryStorage, PostgresStorage, Storage};
pub use transport::{AxumEngine, HttpEngine, RequestContext, RequestScope, Subject};
