//! Demo server: serves `/items` openly and `/users` behind a bearer token from `/auth/login`.
//!
//! Run with `cargo run --example server`. Uses PostgreSQL when DATABASE_URL is set, in-memory
//! storage otherwise.
//!
//! ```text
//! curl -d '{"email":"ada@example.com","password":"pw"}' localhost:3000/auth/register
//! curl -d '{"email":"ada@example.com","password":"pw"}' localhost:3000/auth/login
//! curl -H 'Authorization: Bearer <token>' localhost:3000/users
//! ```

use crudkit::{
    Account, App, AxumEngine, BearerAuth, CrudConfig, Field, HookError, HookResult, Hooks, MemoryStorage, OpaqueTokens,
    PlainPasswords, PostgresStorage, Record, Settings, Storage,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Item {
    id: String,
    name: String,
    price: f64,
}

impl Hooks for Item {
    fn before_create(&mut self) -> HookResult {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(HookError::new("name must not be empty"));
        }
        Ok(())
    }

    fn after_delete(&self) -> HookResult {
        tracing::info!(id = %self.id, "item deleted");
        Ok(())
    }
}

impl Record for Item {
    const NAME: &'static str = "Item";
    fn fields() -> Vec<Field> {
        vec![Field::text("id"), Field::text("name"), Field::float("price")]
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct User {
    id: i64,
    email: String,
    password: String,
    active: bool,
    created_at: Option<String>,
}

impl Hooks for User {
    fn before_create(&mut self) -> HookResult {
        if !self.email.contains('@') {
            return Err(HookError::new("email is invalid"));
        }
        self.created_at = Some(chrono::Utc::now().to_rfc3339());
        Ok(())
    }
}

impl Record for User {
    const NAME: &'static str = "User";
    fn fields() -> Vec<Field> {
        vec![
            Field::integer("id"),
            Field::text("email"),
            Field::text("password"),
            Field::boolean("active"),
            Field::timestamp("created_at"),
        ]
    }
}

impl Account for User {
    fn login(&self) -> &str {
        &self.email
    }

    fn password_hash(&self) -> &str {
        &self.password
    }

    fn set_credentials(&mut self, login: String, password_hash: String) {
        self.email = login;
        self.password = password_hash;
        self.active = true;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crudkit=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let storage: Arc<dyn Storage> = match &settings.database_url {
        Some(url) => Arc::new(PostgresStorage::connect_lazy(url, &settings.db_schema, settings.max_connections)?),
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory storage");
            Arc::new(MemoryStorage::new())
        }
    };

    // PlainPasswords keeps passwords readable; plug a real PasswordHasher in outside demos.
    let tokens = OpaqueTokens::new();

    App::new(AxumEngine::from_settings(&settings), storage)
        .with_auth(BearerAuth::new(tokens.clone()))
        .with_accounts::<User>(tokens, PlainPasswords)
        .entity::<Item>(CrudConfig::new())
        .entity::<User>(CrudConfig::new().protect_all())
        .run()
        .await?;
    Ok(())
}
