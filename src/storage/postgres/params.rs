//! Convert document values to typed parameters sqlx can bind.

use crate::error::CrudError;
use crate::record::{Field, FieldKind, IdValue};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

/// A value bound to a PostgreSQL query, typed by the column it targets.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    Text(Option<String>),
    BigInt(Option<i64>),
    Double(Option<f64>),
    Bool(Option<bool>),
    Timestamp(Option<DateTime<Utc>>),
    Json(Option<Value>),
}

impl SqlParam {
    pub fn from_json(field: &Field, v: &Value) -> Result<Self, CrudError> {
        let bad = || CrudError::Validation(format!("{}: {} does not fit a {:?} column", field.name, v, field.kind));
        Ok(match (field.kind, v) {
            (FieldKind::Json, Value::Null) => SqlParam::Json(None),
            (FieldKind::Json, v) => SqlParam::Json(Some(v.clone())),
            (FieldKind::Text, Value::Null) => SqlParam::Text(None),
            (FieldKind::Integer, Value::Null) => SqlParam::BigInt(None),
            (FieldKind::Float, Value::Null) => SqlParam::Double(None),
            (FieldKind::Boolean, Value::Null) => SqlParam::Bool(None),
            (FieldKind::Timestamp, Value::Null) => SqlParam::Timestamp(None),
            (FieldKind::Text, Value::String(s)) => SqlParam::Text(Some(s.clone())),
            (FieldKind::Integer, Value::Number(n)) => SqlParam::BigInt(Some(n.as_i64().ok_or_else(bad)?)),
            (FieldKind::Float, Value::Number(n)) => SqlParam::Double(Some(n.as_f64().ok_or_else(bad)?)),
            (FieldKind::Boolean, Value::Bool(b)) => SqlParam::Bool(Some(*b)),
            (FieldKind::Timestamp, Value::String(s)) => {
                let at = DateTime::parse_from_rfc3339(s).map_err(|_| bad())?;
                SqlParam::Timestamp(Some(at.with_timezone(&Utc)))
            }
            _ => return Err(bad()),
        })
    }

    pub fn from_id(id: &IdValue) -> Self {
        match id {
            IdValue::Text(s) => SqlParam::Text(Some(s.clone())),
            IdValue::Integer(n) => SqlParam::BigInt(Some(*n)),
        }
    }

    pub fn bind_to<'q>(&self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        match self {
            SqlParam::Text(v) => query.bind(v.clone()),
            SqlParam::BigInt(v) => query.bind(*v),
            SqlParam::Double(v) => query.bind(*v),
            SqlParam::Bool(v) => query.bind(*v),
            SqlParam::Timestamp(v) => query.bind(*v),
            SqlParam::Json(v) => query.bind(v.clone()),
        }
    }
}
