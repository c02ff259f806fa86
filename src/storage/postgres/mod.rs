//! PostgreSQL adapter over a `sqlx` pool. Each record type maps to one table named like its
//! resource path, inside a configurable schema.

mod builder;
mod params;

pub use builder::QueryBuf;
pub use params::SqlParam;

use super::query::ListQuery;
use super::{generate_text_id, identifier_of, required_identifier, Storage};
use crate::error::CrudError;
use crate::record::{Document, FieldKind, IdValue, RecordSchema};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{ConnectOptions, Postgres, Row};
use std::str::FromStr;

pub struct PostgresStorage {
    pool: PgPool,
    schema: String,
    /// Set when built from a URL; lets `initialize` create the database.
    database_url: Option<String>,
}

impl PostgresStorage {
    /// Pool that connects on first use; `initialize` verifies the connection.
    pub fn connect_lazy(database_url: &str, schema: &str, max_connections: u32) -> Result<Self, CrudError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)
            .map_err(|e| CrudError::Connection(e.to_string()))?;
        Ok(PostgresStorage {
            pool,
            schema: schema.to_string(),
            database_url: Some(database_url.to_string()),
        })
    }

    pub fn from_pool(pool: PgPool, schema: &str) -> Self {
        PostgresStorage {
            pool,
            schema: schema.to_string(),
            database_url: None,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_optional(&self, record: &RecordSchema, q: &QueryBuf) -> Result<Option<Document>, CrudError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(q).fetch_optional(&self.pool).await?;
        row.map(|r| row_to_document(record, &r)).transpose()
    }

    async fn fetch_all(&self, record: &RecordSchema, q: &QueryBuf) -> Result<Vec<Document>, CrudError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(q).fetch_all(&self.pool).await?;
        rows.iter().map(|r| row_to_document(record, r)).collect()
    }
}

fn bind_all(q: &QueryBuf) -> Query<'_, Postgres, sqlx::postgres::PgArguments> {
    q.params
        .iter()
        .fold(sqlx::query(&q.sql), |query, p| p.bind_to(query))
}

fn not_found(record: &RecordSchema, id: &IdValue) -> CrudError {
    CrudError::NotFound(format!("{} '{}'", record.name(), id))
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn initialize(&self) -> Result<(), CrudError> {
        if let Some(url) = &self.database_url {
            ensure_database_exists(url).await?;
        }
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| CrudError::Connection(e.to_string()))?;
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", builder::quoted(&self.schema)))
            .execute(&self.pool)
            .await?;
        tracing::info!(schema = %self.schema, "postgres storage ready");
        Ok(())
    }

    async fn apply_schema(&self, schemas: &[RecordSchema]) -> Result<(), CrudError> {
        for record in schemas {
            record.validate()?;
            for ddl in builder::create_table(&self.schema, record)? {
                tracing::debug!(sql = %ddl, "ddl");
                sqlx::query(&ddl)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| CrudError::Schema(format!("{}: {}", record.name(), e)))?;
            }
            tracing::info!(record = record.name(), table = %record.resource(), "schema applied");
        }
        Ok(())
    }

    async fn create(&self, record: &RecordSchema, mut doc: Document) -> Result<Document, CrudError> {
        let id_field = record.identifier()?;
        let include_pk = match identifier_of(record, &doc)? {
            Some(_) => true,
            None if id_field.kind == FieldKind::Integer => false,
            None => {
                doc.insert(id_field.name.to_string(), Value::String(generate_text_id()));
                true
            }
        };
        let q = builder::insert(&self.schema, record, &doc, include_pk)?;
        let created = self
            .fetch_optional(record, &q)
            .await?
            .ok_or_else(|| CrudError::Storage(format!("{}: insert returned no row", record.name())))?;
        if include_pk && id_field.kind == FieldKind::Integer {
            let sql = builder::advance_sequence(&self.schema, record)?;
            tracing::debug!(sql = %sql, "sequence");
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        Ok(created)
    }

    async fn update(&self, record: &RecordSchema, doc: Document) -> Result<Document, CrudError> {
        let id = required_identifier(record, &doc)?;
        let q = builder::update(&self.schema, record, &id, &doc)?;
        self.fetch_optional(record, &q)
            .await?
            .ok_or_else(|| not_found(record, &id))
    }

    async fn delete(&self, record: &RecordSchema, id: &IdValue) -> Result<(), CrudError> {
        let q = builder::delete(&self.schema, record, id)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        bind_all(&q)
            .fetch_optional(&self.pool)
            .await?
            .map(|_| ())
            .ok_or_else(|| not_found(record, id))
    }

    async fn find_by_id(&self, record: &RecordSchema, id: &IdValue) -> Result<Document, CrudError> {
        let q = builder::select_by_id(&self.schema, record, id)?;
        self.fetch_optional(record, &q)
            .await?
            .ok_or_else(|| not_found(record, id))
    }

    async fn find_all(&self, record: &RecordSchema, query: &ListQuery) -> Result<Vec<Document>, CrudError> {
        let q = builder::select_list(&self.schema, record, query)?;
        self.fetch_all(record, &q).await
    }
}

fn row_to_document(record: &RecordSchema, row: &PgRow) -> Result<Document, CrudError> {
    let mut doc = Document::new();
    for f in record.fields() {
        let name = f.name;
        let v = match f.kind {
            FieldKind::Text => row.try_get::<Option<String>, _>(name)?.map(Value::String),
            FieldKind::Integer => row.try_get::<Option<i64>, _>(name)?.map(|n| Value::Number(n.into())),
            FieldKind::Float => row
                .try_get::<Option<f64>, _>(name)?
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            FieldKind::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
            FieldKind::Timestamp => row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
                .map(|d| Value::String(d.to_rfc3339())),
            FieldKind::Json => row.try_get::<Option<Value>, _>(name)?,
        };
        doc.insert(name.to_string(), v.unwrap_or(Value::Null));
    }
    Ok(doc)
}

const MAINTENANCE_DB: &str = "postgres";

/// Create the database named in `database_url` if it is missing, going through the `postgres`
/// maintenance database.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), CrudError> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| CrudError::Connection(format!("invalid DATABASE_URL: {}", e)))?;
    let Some(target) = target_database(&opts) else {
        return Ok(());
    };
    let mut admin = opts
        .database(MAINTENANCE_DB)
        .connect()
        .await
        .map_err(|e| CrudError::Connection(e.to_string()))?;
    let known: Option<i32> = sqlx::query_scalar("SELECT 1 FROM pg_database WHERE datname = $1")
        .bind(&target)
        .fetch_optional(&mut admin)
        .await?;
    if known.is_none() {
        tracing::info!(database = %target, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", builder::quoted(&target)))
            .execute(&mut admin)
            .await?;
    }
    Ok(())
}

/// Database to create, if any: none when the URL names no database or the maintenance one.
fn target_database(opts: &PgConnectOptions) -> Option<String> {
    opts.get_database()
        .map(str::trim)
        .filter(|db| !db.is_empty() && *db != MAINTENANCE_DB)
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_database_comes_from_the_url_path() {
        let opts = |url: &str| PgConnectOptions::from_str(url).unwrap();
        assert_eq!(
            target_database(&opts("postgres://u:p@localhost:5432/shop?sslmode=disable")),
            Some("shop".to_string())
        );
        assert_eq!(
            target_database(&opts("postgres://u@localhost/shop?host=/var/run/postgresql")),
            Some("shop".to_string())
        );
        assert_eq!(target_database(&opts("postgres://u@localhost/postgres")), None);
    }
}
