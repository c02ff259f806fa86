//! Environment-driven settings for a server process.

use crate::error::CrudError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Listen address, `CRUDKIT_BIND`.
    pub bind: String,
    /// `DATABASE_URL`; unset means in-memory storage.
    pub database_url: Option<String>,
    /// PostgreSQL schema holding the record tables, `CRUDKIT_SCHEMA`.
    pub db_schema: String,
    pub max_connections: u32,
    /// Maximum request body size in bytes, `CRUDKIT_BODY_LIMIT`.
    pub body_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind: Settings::DEFAULT_BIND.to_string(),
            database_url: None,
            db_schema: "public".to_string(),
            max_connections: 5,
            body_limit: Settings::DEFAULT_BODY_LIMIT,
        }
    }
}

impl Settings {
    pub const DEFAULT_BIND: &'static str = "0.0.0.0:3000";
    pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

    pub fn from_env() -> Result<Self, CrudError> {
        Settings::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CrudError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut s = Settings::default();
        if let Some(bind) = get("CRUDKIT_BIND") {
            s.bind = bind;
        }
        s.database_url = get("DATABASE_URL");
        if let Some(schema) = get("CRUDKIT_SCHEMA") {
            s.db_schema = schema;
        }
        if let Some(v) = get("CRUDKIT_MAX_CONNECTIONS") {
            s.max_connections = parse_var("CRUDKIT_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = get("CRUDKIT_BODY_LIMIT") {
            s.body_limit = parse_var("CRUDKIT_BODY_LIMIT", &v)?;
        }
        Ok(s)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CrudError> {
    value
        .parse()
        .map_err(|_| CrudError::Validation(format!("{}: invalid value '{}'", key, value)))
}
