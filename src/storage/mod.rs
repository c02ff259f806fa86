//! Storage port: the contract every backend satisfies, plus the stock adapters.
//!
//! Adapters work on [`Document`]s and the [`RecordSchema`] of the type being stored, so a single
//! adapter instance serves every registered record type. Every method may be called concurrently
//! from independent requests; adapters own their synchronization.
//!
//! Guarantees regardless of backend:
//! - filters are exact match per field;
//! - sort is applied before pagination, with the identifier as final tie-breaker;
//! - without a sort, rows come back in the backend's natural order;
//! - pagination past the end yields a shorter (possibly empty) result, never an error;
//! - creating a record whose identifier already exists is [`CrudError::Conflict`].

pub mod memory;
pub mod postgres;
pub mod query;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
pub use query::{Direction, FilterSet, ListQuery, Pagination, SortSpec};

use crate::error::CrudError;
use crate::record::{Document, FieldKind, IdValue, RecordSchema};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn initialize(&self) -> Result<(), CrudError>;

    /// Idempotent; overlapping sets across calls are fine.
    async fn apply_schema(&self, schemas: &[RecordSchema]) -> Result<(), CrudError>;

    /// Insert and return the stored document. An unset identifier is assigned by the backend.
    async fn create(&self, schema: &RecordSchema, doc: Document) -> Result<Document, CrudError>;

    /// Full replace by identifier. [`CrudError::NotFound`] when the identifier does not exist.
    async fn update(&self, schema: &RecordSchema, doc: Document) -> Result<Document, CrudError>;

    async fn delete(&self, schema: &RecordSchema, id: &IdValue) -> Result<(), CrudError>;

    async fn find_by_id(&self, schema: &RecordSchema, id: &IdValue) -> Result<Document, CrudError>;

    async fn find_all(&self, schema: &RecordSchema, query: &ListQuery) -> Result<Vec<Document>, CrudError>;
}

/// Typed identifier of a document, or None when unset (missing, null, empty text, integer 0).
pub fn identifier_of(schema: &RecordSchema, doc: &Document) -> Result<Option<IdValue>, CrudError> {
    let field = schema.identifier()?;
    Ok(match (field.kind, doc.get(field.name)) {
        (_, None) | (_, Some(Value::Null)) => None,
        (FieldKind::Integer, Some(v)) => match v.as_i64() {
            Some(0) => None,
            Some(n) => Some(IdValue::Integer(n)),
            None => {
                return Err(CrudError::Conversion(format!("{}: identifier {} is not an integer", schema.name(), v)))
            }
        },
        (_, Some(Value::String(s))) if s.is_empty() => None,
        (_, Some(Value::String(s))) => Some(IdValue::Text(s.clone())),
        (_, Some(v)) => return Err(CrudError::Conversion(format!("{}: identifier {} is not text", schema.name(), v))),
    })
}

/// Identifier that must be present (update paths).
pub fn required_identifier(schema: &RecordSchema, doc: &Document) -> Result<IdValue, CrudError> {
    identifier_of(schema, doc)?
        .ok_or_else(|| CrudError::Validation(format!("{}: identifier is required", schema.name())))
}

/// Fresh text identifier for records created without one.
pub fn generate_text_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Field;
    use serde_json::json;

    #[test]
    fn unset_identifiers() {
        let ints = RecordSchema::new("Counter", vec![Field::integer("id")]);
        let texts = RecordSchema::new("Item", vec![Field::text("id")]);
        let doc = |v: Value| json!({ "id": v }).as_object().cloned().unwrap();

        assert_eq!(identifier_of(&ints, &doc(json!(0))).unwrap(), None);
        assert_eq!(identifier_of(&ints, &doc(json!(null))).unwrap(), None);
        assert_eq!(identifier_of(&ints, &doc(json!(4))).unwrap(), Some(IdValue::Integer(4)));
        assert!(identifier_of(&ints, &doc(json!("4"))).is_err());
        assert_eq!(identifier_of(&texts, &doc(json!(""))).unwrap(), None);
        assert_eq!(identifier_of(&texts, &doc(json!("a"))).unwrap(), Some(IdValue::Text("a".into())));
        assert!(required_identifier(&texts, &Document::new()).is_err());
    }

    #[test]
    fn generated_ids_are_uuids() {
        let a = generate_text_id();
        assert_ne!(a, generate_text_id());
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }
}
