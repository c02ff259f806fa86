//! In-memory document store. Rows keep insertion order, which is the natural order for lists.

use super::query::{Direction, ListQuery};
use super::{generate_text_id, identifier_of, required_identifier, Storage};
use crate::error::CrudError;
use crate::record::{Document, FieldKind, IdValue, RecordSchema};
use async_trait::async_trait;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Table {
    rows: Vec<Document>,
    /// Last integer identifier handed out or seen.
    last_id: i64,
}

impl Table {
    fn position(&self, schema: &RecordSchema, id: &IdValue) -> Result<Option<usize>, CrudError> {
        for (i, row) in self.rows.iter().enumerate() {
            if identifier_of(schema, row)?.as_ref() == Some(id) {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<&'static str, Table>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<&'static str, Table>>, CrudError> {
        self.tables
            .read()
            .map_err(|_| CrudError::Storage("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<&'static str, Table>>, CrudError> {
        self.tables
            .write()
            .map_err(|_| CrudError::Storage("memory store lock poisoned".into()))
    }
}

fn not_found(schema: &RecordSchema, id: &IdValue) -> CrudError {
    CrudError::NotFound(format!("{} '{}'", schema.name(), id))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn initialize(&self) -> Result<(), CrudError> {
        Ok(())
    }

    async fn apply_schema(&self, schemas: &[RecordSchema]) -> Result<(), CrudError> {
        let mut tables = self.write()?;
        for schema in schemas {
            schema.validate()?;
            tables.entry(schema.name()).or_default();
        }
        Ok(())
    }

    async fn create(&self, schema: &RecordSchema, mut doc: Document) -> Result<Document, CrudError> {
        let id_field = schema.identifier()?;
        let mut tables = self.write()?;
        let table = tables.entry(schema.name()).or_default();
        match identifier_of(schema, &doc)? {
            Some(id) => {
                if table.position(schema, &id)?.is_some() {
                    return Err(CrudError::Conflict(format!("{} '{}' already exists", schema.name(), id)));
                }
                if let IdValue::Integer(n) = id {
                    table.last_id = table.last_id.max(n);
                }
            }
            None => {
                let id = match id_field.kind {
                    FieldKind::Integer => {
                        table.last_id = table.last_id.checked_add(1).ok_or_else(|| {
                            CrudError::Storage(format!("{}: integer identifier sequence exhausted", schema.name()))
                        })?;
                        IdValue::Integer(table.last_id)
                    }
                    _ => IdValue::Text(generate_text_id()),
                };
                doc.insert(id_field.name.to_string(), id.to_json());
            }
        }
        table.rows.push(doc.clone());
        Ok(doc)
    }

    async fn update(&self, schema: &RecordSchema, doc: Document) -> Result<Document, CrudError> {
        let id = required_identifier(schema, &doc)?;
        let mut tables = self.write()?;
        let table = tables.get_mut(schema.name()).ok_or_else(|| not_found(schema, &id))?;
        let pos = table.position(schema, &id)?.ok_or_else(|| not_found(schema, &id))?;
        table.rows[pos] = doc.clone();
        Ok(doc)
    }

    async fn delete(&self, schema: &RecordSchema, id: &IdValue) -> Result<(), CrudError> {
        let mut tables = self.write()?;
        let table = tables.get_mut(schema.name()).ok_or_else(|| not_found(schema, id))?;
        let pos = table.position(schema, id)?.ok_or_else(|| not_found(schema, id))?;
        table.rows.remove(pos);
        Ok(())
    }

    async fn find_by_id(&self, schema: &RecordSchema, id: &IdValue) -> Result<Document, CrudError> {
        let tables = self.read()?;
        let table = tables.get(schema.name()).ok_or_else(|| not_found(schema, id))?;
        let pos = table.position(schema, id)?.ok_or_else(|| not_found(schema, id))?;
        Ok(table.rows[pos].clone())
    }

    async fn find_all(&self, schema: &RecordSchema, query: &ListQuery) -> Result<Vec<Document>, CrudError> {
        let id_name = schema.identifier()?.name;
        let tables = self.read()?;
        let Some(table) = tables.get(schema.name()) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<&Document> = table
            .rows
            .iter()
            .filter(|row| {
                query
                    .filters
                    .iter()
                    .all(|(k, v)| row.get(k).is_some_and(|have| values_equal(have, v)))
            })
            .collect();

        if !query.sort.is_empty() {
            rows.sort_by(|a, b| {
                for spec in &query.sort {
                    let ord = compare_values(a.get(&spec.field), b.get(&spec.field));
                    let ord = match spec.direction {
                        Direction::Asc => ord,
                        Direction::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                compare_values(a.get(id_name), b.get(id_name))
            });
        }

        let page = rows
            .into_iter()
            .skip(query.pagination.offset())
            .take(query.pagination.limit().unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(page)
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => compare_numbers(n, m) == Ordering::Equal,
        _ => a == b,
    }
}

/// Integers compare exactly; f64 is used only when one side is a float.
fn compare_numbers(x: &Number, y: &Number) -> Ordering {
    match (x.as_i64(), y.as_i64(), x.as_u64(), y.as_u64()) {
        (Some(a), Some(b), _, _) => a.cmp(&b),
        (_, _, Some(a), Some(b)) => a.cmp(&b),
        // one side is above i64::MAX, the other negative
        (None, Some(_), Some(_), _) => Ordering::Greater,
        (Some(_), None, _, Some(_)) => Ordering::Less,
        _ => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
    }
}

/// Total order over JSON values: missing/null < booleans < numbers < strings < everything else.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => compare_numbers(x, y),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) if rank(a) == 4 && rank(b) == 4 => x.to_string().cmp(&y.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}
