//! Builds parameterized SELECT, INSERT, UPDATE, DELETE and DDL for a record schema.
//! Identifiers come from validated record descriptors only; values are always parameters.

use super::params::SqlParam;
use crate::error::CrudError;
use crate::record::{Document, Field, FieldKind, IdValue, RecordSchema};
use crate::storage::query::{Direction, ListQuery};
use serde_json::Value;

/// Quote identifier for PostgreSQL.
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Schema-qualified table for a record type; the table is named like its resource path.
pub(crate) fn qualified_table(db_schema: &str, record: &RecordSchema) -> String {
    format!("{}.{}", quoted(db_schema), quoted(&record.resource()))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl QueryBuf {
    fn push_param(&mut self, p: SqlParam) -> usize {
        self.params.push(p);
        self.params.len()
    }
}

fn column_list(record: &RecordSchema) -> String {
    record
        .fields()
        .iter()
        .map(|f| quoted(f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_type(field: &Field) -> &'static str {
    match field.kind {
        FieldKind::Text => "TEXT",
        FieldKind::Integer => "BIGINT",
        FieldKind::Float => "DOUBLE PRECISION",
        FieldKind::Boolean => "BOOLEAN",
        FieldKind::Timestamp => "TIMESTAMPTZ",
        FieldKind::Json => "JSONB",
    }
}

/// CREATE TABLE for the identifier column, then one ADD COLUMN per other field. Every
/// statement is idempotent.
pub fn create_table(db_schema: &str, record: &RecordSchema) -> Result<Vec<String>, CrudError> {
    let table = qualified_table(db_schema, record);
    let id = record.identifier()?;
    let id_type = match id.kind {
        FieldKind::Integer => "BIGSERIAL",
        _ => "TEXT",
    };
    let mut ddl = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} ({} {} PRIMARY KEY)",
        table,
        quoted(id.name),
        id_type
    )];
    for f in record.fields().iter().filter(|f| !f.is_identifier()) {
        ddl.push(format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
            table,
            quoted(f.name),
            column_type(f)
        ));
    }
    Ok(ddl)
}

pub fn select_by_id(db_schema: &str, record: &RecordSchema, id: &IdValue) -> Result<QueryBuf, CrudError> {
    let mut q = QueryBuf::default();
    let pk = record.identifier()?;
    let n = q.push_param(SqlParam::from_id(id));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${}",
        column_list(record),
        qualified_table(db_schema, record),
        quoted(pk.name),
        n
    );
    Ok(q)
}

/// SELECT with exact-match filters, ORDER BY the requested fields then the identifier,
/// optional LIMIT/OFFSET.
pub fn select_list(db_schema: &str, record: &RecordSchema, query: &ListQuery) -> Result<QueryBuf, CrudError> {
    let mut q = QueryBuf::default();
    let pk = record.identifier()?;

    let mut where_parts = Vec::new();
    for (col, val) in &query.filters {
        let field = record
            .field(col)
            .ok_or_else(|| CrudError::Validation(format!("cannot filter by unknown field '{}'", col)))?;
        if val.is_null() {
            where_parts.push(format!("{} IS NULL", quoted(col)));
            continue;
        }
        let n = q.push_param(SqlParam::from_json(field, val)?);
        where_parts.push(format!("{} = ${}", quoted(col), n));
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };

    let mut order_parts = Vec::new();
    for s in &query.sort {
        if record.field(&s.field).is_none() {
            return Err(CrudError::Validation(format!("cannot sort by unknown field '{}'", s.field)));
        }
        let dir = match s.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        order_parts.push(format!("{} {}", quoted(&s.field), dir));
    }
    order_parts.push(format!("{} ASC", quoted(pk.name)));

    let limit_clause = query
        .pagination
        .limit()
        .map(|n| format!(" LIMIT {}", n))
        .unwrap_or_default();
    let offset_clause = match query.pagination.offset() {
        0 => String::new(),
        n => format!(" OFFSET {}", n),
    };
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}{}{}",
        column_list(record),
        qualified_table(db_schema, record),
        where_clause,
        order_parts.join(", "),
        limit_clause,
        offset_clause
    );
    Ok(q)
}

/// INSERT every declared field. An unset integer identifier is left out so the sequence fills it.
pub fn insert(db_schema: &str, record: &RecordSchema, doc: &Document, include_pk: bool) -> Result<QueryBuf, CrudError> {
    let mut q = QueryBuf::default();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in record.fields() {
        if f.is_identifier() && !include_pk {
            continue;
        }
        let val = doc.get(f.name).unwrap_or(&Value::Null);
        let n = q.push_param(SqlParam::from_json(f, val)?);
        cols.push(quoted(f.name));
        placeholders.push(format!("${}", n));
    }
    q.sql = if cols.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            qualified_table(db_schema, record),
            column_list(record)
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(db_schema, record),
            cols.join(", "),
            placeholders.join(", "),
            column_list(record)
        )
    };
    Ok(q)
}

/// Move the identifier sequence up to the largest stored identifier, so rows inserted with an
/// explicit integer identifier are never handed out again by `nextval`. No-op on an empty table.
pub fn advance_sequence(db_schema: &str, record: &RecordSchema) -> Result<String, CrudError> {
    let pk = record.identifier()?;
    let table = qualified_table(db_schema, record);
    Ok(format!(
        "SELECT setval(pg_get_serial_sequence({}, {}), MAX({})) FROM {}",
        literal(&table),
        literal(pk.name),
        quoted(pk.name),
        table
    ))
}

/// Single-quoted SQL string literal.
fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// UPDATE by identifier: every non-identifier field is written (absent ones become NULL).
pub fn update(db_schema: &str, record: &RecordSchema, id: &IdValue, doc: &Document) -> Result<QueryBuf, CrudError> {
    let pk = record.identifier()?;
    let mut q = QueryBuf::default();
    let mut sets = Vec::new();
    for f in record.fields().iter().filter(|f| !f.is_identifier()) {
        let val = doc.get(f.name).unwrap_or(&Value::Null);
        let n = q.push_param(SqlParam::from_json(f, val)?);
        sets.push(format!("{} = ${}", quoted(f.name), n));
    }
    if sets.is_empty() {
        return select_by_id(db_schema, record, id);
    }
    let n = q.push_param(SqlParam::from_id(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        qualified_table(db_schema, record),
        sets.join(", "),
        quoted(pk.name),
        n,
        column_list(record)
    );
    Ok(q)
}

pub fn delete(db_schema: &str, record: &RecordSchema, id: &IdValue) -> Result<QueryBuf, CrudError> {
    let pk = record.identifier()?;
    let mut q = QueryBuf::default();
    let n = q.push_param(SqlParam::from_id(id));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${} RETURNING {}",
        qualified_table(db_schema, record),
        quoted(pk.name),
        n,
        quoted(pk.name)
    );
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::query::{Pagination, SortSpec};
    use serde_json::json;

    fn person() -> RecordSchema {
        RecordSchema::new(
            "Person",
            vec![Field::integer("id"), Field::text("name"), Field::integer("age"), Field::json("tags")],
        )
    }

    #[test]
    fn ddl_is_idempotent_statements() {
        let ddl = create_table("app", &person()).unwrap();
        assert_eq!(ddl[0], r#"CREATE TABLE IF NOT EXISTS "app"."people" ("id" BIGSERIAL PRIMARY KEY)"#);
        assert_eq!(ddl[1], r#"ALTER TABLE "app"."people" ADD COLUMN IF NOT EXISTS "name" TEXT"#);
        assert_eq!(ddl[3], r#"ALTER TABLE "app"."people" ADD COLUMN IF NOT EXISTS "tags" JSONB"#);
        assert_eq!(ddl.len(), 4);
    }

    #[test]
    fn list_filters_sort_and_pages() {
        let mut query = ListQuery {
            sort: vec![SortSpec::desc("age")],
            pagination: Pagination::new(10, 20),
            ..Default::default()
        };
        query.filters.insert("name".into(), json!("Ann"));
        let q = select_list("app", &person(), &query).unwrap();
        assert_eq!(
            q.sql,
            r#"SELECT "id", "name", "age", "tags" FROM "app"."people" WHERE "name" = $1 ORDER BY "age" DESC, "id" ASC LIMIT 10 OFFSET 20"#
        );
        assert_eq!(q.params, vec![SqlParam::Text(Some("Ann".into()))]);
    }

    #[test]
    fn unbounded_list_has_no_limit() {
        let q = select_list("app", &person(), &ListQuery::default()).unwrap();
        assert!(q.sql.ends_with(r#"ORDER BY "id" ASC"#));
        assert!(q.params.is_empty());
    }

    #[test]
    fn unknown_columns_never_reach_sql() {
        let mut query = ListQuery::default();
        query.filters.insert("name\"; DROP TABLE x; --".into(), json!("x"));
        assert!(select_list("app", &person(), &query).is_err());

        let query = ListQuery {
            sort: vec![SortSpec::asc("nope")],
            ..Default::default()
        };
        assert!(select_list("app", &person(), &query).is_err());
    }

    #[test]
    fn insert_skips_unset_serial_identifier() {
        let doc = json!({"id": 0, "name": "Ann", "age": 3}).as_object().cloned().unwrap();
        let q = insert("app", &person(), &doc, false).unwrap();
        assert_eq!(
            q.sql,
            r#"INSERT INTO "app"."people" ("name", "age", "tags") VALUES ($1, $2, $3) RETURNING "id", "name", "age", "tags""#
        );
        assert_eq!(q.params[2], SqlParam::Json(None));

        let q = insert("app", &person(), &doc, true).unwrap();
        assert_eq!(q.params.len(), 4);
    }

    #[test]
    fn sequence_catches_up_with_explicit_identifiers() {
        let sql = advance_sequence("app", &person()).unwrap();
        assert_eq!(
            sql,
            r#"SELECT setval(pg_get_serial_sequence('"app"."people"', 'id'), MAX("id")) FROM "app"."people""#
        );
        let sql = advance_sequence("o'brien", &person()).unwrap();
        assert!(sql.starts_with(r#"SELECT setval(pg_get_serial_sequence('"o''brien"."people"', 'id')"#));
    }

    #[test]
    fn update_writes_all_fields_and_binds_id_last() {
        let doc = json!({"id": 5, "name": "Ann"}).as_object().cloned().unwrap();
        let q = update("app", &person(), &IdValue::Integer(5), &doc).unwrap();
        assert_eq!(
            q.sql,
            r#"UPDATE "app"."people" SET "name" = $1, "age" = $2, "tags" = $3 WHERE "id" = $4 RETURNING "id", "name", "age", "tags""#
        );
        assert_eq!(q.params[1], SqlParam::BigInt(None));
        assert_eq!(q.params[3], SqlParam::BigInt(Some(5)));
    }

    #[test]
    fn delete_returns_identifier() {
        let q = delete("app", &person(), &IdValue::Integer(1)).unwrap();
        assert_eq!(q.sql, r#"DELETE FROM "app"."people" WHERE "id" = $1 RETURNING "id""#);
    }
}
