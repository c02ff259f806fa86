//! App builder: ties storage, engine, auth and record types together.

use crate::accounts::{register_account_routes, Account};
use crate::auth::{AuthProvider, PasswordHasher, TokenIssuer};
use crate::config::CrudConfig;
use crate::error::CrudError;
use crate::record::{Record, RecordSchema};
use crate::routes::register_crud_routes;
use crate::storage::Storage;
use crate::transport::{HttpEngine, MiddlewareFn};
use std::collections::HashSet;
use std::sync::Arc;

type RegisterFn<E> = fn(&mut E, Arc<dyn Storage>, &CrudConfig, Option<&dyn AuthProvider>) -> Result<(), CrudError>;

struct Entity<E> {
    schema: RecordSchema,
    config: CrudConfig,
    register: RegisterFn<E>,
}

type AccountRegisterFn<E> = Box<dyn FnOnce(&mut E, Arc<dyn Storage>) -> Result<(), CrudError> + Send>;

struct Accounts<E> {
    schema: RecordSchema,
    register: AccountRegisterFn<E>,
}

pub struct App<E: HttpEngine> {
    engine: E,
    storage: Arc<dyn Storage>,
    auth: Option<Arc<dyn AuthProvider>>,
    middlewares: Vec<MiddlewareFn>,
    entities: Vec<Entity<E>>,
    accounts: Option<Accounts<E>>,
}

impl<E: HttpEngine> App<E> {
    pub fn new(engine: E, storage: Arc<dyn Storage>) -> Self {
        App {
            engine,
            storage,
            auth: None,
            middlewares: Vec::new(),
            entities: Vec::new(),
            accounts: None,
        }
    }

    pub fn with_auth(mut self, provider: impl AuthProvider + 'static) -> Self {
        self.auth = Some(Arc::new(provider));
        self
    }

    /// Middleware for every route, protected or not.
    pub fn with_middleware(mut self, middleware: MiddlewareFn) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn entity<R: Record>(mut self, config: CrudConfig) -> Self {
        self.entities.push(Entity {
            schema: RecordSchema::of::<R>(),
            config,
            register: register_crud_routes::<R, E>,
        });
        self
    }

    /// Serve `/auth/register` and `/auth/login` for account type `A`.
    pub fn with_accounts<A: Account>(
        mut self,
        issuer: impl TokenIssuer,
        hasher: impl PasswordHasher,
    ) -> Self
    where
        E: 'static,
    {
        let issuer: Arc<dyn TokenIssuer> = Arc::new(issuer);
        let hasher: Arc<dyn PasswordHasher> = Arc::new(hasher);
        self.accounts = Some(Accounts {
            schema: RecordSchema::of::<A>(),
            register: Box::new(move |engine: &mut E, storage: Arc<dyn Storage>| {
                register_account_routes::<A, E>(engine, storage, issuer, hasher)
            }),
        });
        self
    }

    /// Initialize storage, apply every record schema and register all routes.
    pub async fn build(mut self) -> Result<E, CrudError> {
        let mut resources = HashSet::new();
        for entity in &self.entities {
            entity.schema.validate()?;
            let resource = entity.schema.resource();
            if !resources.insert(resource.clone()) {
                return Err(CrudError::Schema(format!(
                    "{}: resource path '/{}' is already registered",
                    entity.schema.name(),
                    resource
                )));
            }
        }

        self.storage.initialize().await?;
        let mut schemas: Vec<RecordSchema> = self.entities.iter().map(|e| e.schema.clone()).collect();
        if let Some(accounts) = &self.accounts {
            accounts.schema.validate()?;
            if !schemas.iter().any(|s| s.name() == accounts.schema.name()) {
                schemas.push(accounts.schema.clone());
            }
        }
        self.storage.apply_schema(&schemas).await?;
        tracing::info!(records = schemas.len(), "schema applied");

        for mw in self.middlewares {
            self.engine.use_middleware(mw);
        }
        let auth = self.auth.as_deref();
        for entity in &self.entities {
            (entity.register)(&mut self.engine, Arc::clone(&self.storage), &entity.config, auth)?;
        }
        if let Some(accounts) = self.accounts.take() {
            (accounts.register)(&mut self.engine, Arc::clone(&self.storage))?;
        }
        Ok(self.engine)
    }

    pub async fn run(self) -> Result<(), CrudError> {
        self.build().await?.start().await
    }
}
