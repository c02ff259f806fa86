//! Record descriptors and the reflection operations built on them.
//!
//! A record type describes itself once through [`Record::fields`]; everything else (locating the
//! identifier, moving between the textual identifier of a URL and the typed field, building zero
//! instances, merging sparse patches) works on that descriptor and on the record's JSON form.
//! Field names must match the names the type serializes under.

use crate::error::CrudError;
use crate::hooks::Hooks;
use crate::inflect;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// A record in storage form: field name -> JSON value.
pub type Document = Map<String, Value>;

/// Name of the identifier field, matched ASCII case-insensitively.
pub const IDENTIFIER_FIELD: &str = "id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    /// RFC 3339 text.
    Timestamp,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Field { name, kind }
    }
    pub const fn text(name: &'static str) -> Self {
        Field::new(name, FieldKind::Text)
    }
    pub const fn integer(name: &'static str) -> Self {
        Field::new(name, FieldKind::Integer)
    }
    pub const fn float(name: &'static str) -> Self {
        Field::new(name, FieldKind::Float)
    }
    pub const fn boolean(name: &'static str) -> Self {
        Field::new(name, FieldKind::Boolean)
    }
    pub const fn timestamp(name: &'static str) -> Self {
        Field::new(name, FieldKind::Timestamp)
    }
    pub const fn json(name: &'static str) -> Self {
        Field::new(name, FieldKind::Json)
    }

    pub fn is_identifier(&self) -> bool {
        self.name.eq_ignore_ascii_case(IDENTIFIER_FIELD)
    }
}

/// A caller-defined entity managed by the engine.
///
/// ```ignore
/// #[derive(Clone, Default, Serialize, Deserialize)]
/// struct Item { id: String, name: String }
///
/// impl Hooks for Item {}
///
/// impl Record for Item {
///     const NAME: &'static str = "Item";
///     fn fields() -> Vec<Field> {
///         vec![Field::text("id"), Field::text("name")]
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Default + Clone + Send + Sync + Hooks + 'static {
    /// Type name; the resource path is derived from it.
    const NAME: &'static str;

    fn fields() -> Vec<Field>;
}

/// Descriptor of one record type, built once at registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSchema {
    name: &'static str,
    fields: Vec<Field>,
}

impl RecordSchema {
    pub fn new(name: &'static str, fields: Vec<Field>) -> Self {
        RecordSchema { name, fields }
    }

    pub fn of<R: Record>() -> Self {
        RecordSchema::new(R::NAME, R::fields())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Declared field by exact (case-sensitive) name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn identifier(&self) -> Result<&Field, CrudError> {
        locate_identifier_field(self)
    }

    /// Lower-cased, pluralized path segment, e.g. `Person` -> `people`.
    pub fn resource(&self) -> String {
        inflect::resource_segment(self.name)
    }

    /// Storage-facing checks: plain identifiers for record and field names, no duplicate fields,
    /// a text or integer identifier.
    pub fn validate(&self) -> Result<(), CrudError> {
        let ident = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map_err(|e| CrudError::Schema(format!("identifier pattern: {}", e)))?;
        if !ident.is_match(self.name) {
            return Err(CrudError::Schema(format!("invalid record name '{}'", self.name)));
        }
        let mut seen = HashSet::new();
        for f in &self.fields {
            if !ident.is_match(f.name) {
                return Err(CrudError::Schema(format!("{}: invalid field name '{}'", self.name, f.name)));
            }
            if !seen.insert(f.name) {
                return Err(CrudError::Schema(format!("{}: duplicate field '{}'", self.name, f.name)));
            }
        }
        let id = self.identifier()?;
        if !matches!(id.kind, FieldKind::Text | FieldKind::Integer) {
            return Err(CrudError::Schema(format!(
                "{}: identifier '{}' must be text or integer",
                self.name, id.name
            )));
        }
        Ok(())
    }
}

/// Typed identifier value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IdValue {
    Text(String),
    Integer(i64),
}

impl IdValue {
    pub fn to_json(&self) -> Value {
        match self {
            IdValue::Text(s) => Value::String(s.clone()),
            IdValue::Integer(n) => Value::Number((*n).into()),
        }
    }
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdValue::Text(s) => f.write_str(s),
            IdValue::Integer(n) => write!(f, "{}", n),
        }
    }
}

pub fn locate_identifier_field(schema: &RecordSchema) -> Result<&Field, CrudError> {
    schema
        .fields
        .iter()
        .find(|f| f.is_identifier())
        .ok_or_else(|| CrudError::Schema(format!("{}: identifier field not found", schema.name)))
}

/// Identifier of a record in its textual form. Integers are decimal-encoded; an unset (null)
/// identifier reads as the empty string.
pub fn read_identifier<R: Record>(record: &R) -> Result<String, CrudError> {
    let schema = RecordSchema::of::<R>();
    let doc = to_document(record)?;
    document_identifier(&schema, &doc)
}

pub fn document_identifier(schema: &RecordSchema, doc: &Document) -> Result<String, CrudError> {
    let field = schema.identifier()?;
    match doc.get(field.name) {
        None => Err(CrudError::Schema(format!("{}: identifier field not found", schema.name))),
        Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(CrudError::Schema(format!(
            "{}: identifier has unsupported value {}",
            schema.name, other
        ))),
    }
}

/// Convert path text to the identifier's declared type.
pub fn write_typed_identifier(raw: &str, schema: &RecordSchema) -> Result<IdValue, CrudError> {
    let field = schema.identifier()?;
    match field.kind {
        FieldKind::Integer => raw
            .trim()
            .parse::<i64>()
            .map(IdValue::Integer)
            .map_err(|_| CrudError::Conversion(format!("'{}' is not a valid integer identifier", raw))),
        _ => Ok(IdValue::Text(raw.to_string())),
    }
}

/// Blank instance used as a decode target.
pub fn new_zero_instance<R: Record>() -> R {
    R::default()
}

pub fn to_document<R: Serialize>(record: &R) -> Result<Document, CrudError> {
    match serde_json::to_value(record).map_err(|e| CrudError::Schema(e.to_string()))? {
        Value::Object(map) => Ok(map),
        _ => Err(CrudError::Schema("record does not serialize to a JSON object".into())),
    }
}

pub fn from_document<R: DeserializeOwned>(doc: Document) -> Result<R, CrudError> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| CrudError::Validation(e.to_string()))
}

/// Decode a request body onto a zero instance: absent fields keep their zero values.
pub fn decode_into_zero<R: Record>(body: Value) -> Result<R, CrudError> {
    let Value::Object(incoming) = body else {
        return Err(CrudError::Validation("body must be a JSON object".into()));
    };
    let mut doc = to_document(&new_zero_instance::<R>())?;
    doc.extend(incoming);
    from_document(doc)
}

/// Overwrite only the declared fields present in `patch`. Unknown keys and the identifier are
/// left alone.
pub fn merge_patch<R: Record>(record: &R, patch: &Document) -> Result<R, CrudError> {
    let schema = RecordSchema::of::<R>();
    let mut doc = to_document(record)?;
    for (k, v) in patch {
        match schema.field(k) {
            Some(f) if f.is_identifier() => continue,
            Some(_) => {
                doc.insert(k.clone(), v.clone());
            }
            None => tracing::debug!(record = R::NAME, key = %k, "ignoring unknown patch key"),
        }
    }
    from_document(doc)
}

/// Typed JSON value for a query-string value of `field`.
pub fn parse_field_value(field: &Field, s: &str) -> Result<Value, CrudError> {
    let bad = |what: &str| CrudError::Conversion(format!("{}: '{}' is not a valid {}", field.name, s, what));
    Ok(match field.kind {
        FieldKind::Text => Value::String(s.to_string()),
        FieldKind::Integer => Value::Number(s.trim().parse::<i64>().map_err(|_| bad("integer"))?.into()),
        FieldKind::Float => {
            let n: f64 = s.trim().parse().map_err(|_| bad("number"))?;
            Value::Number(serde_json::Number::from_f64(n).ok_or_else(|| bad("number"))?)
        }
        FieldKind::Boolean => {
            if s.eq_ignore_ascii_case("true") || s == "1" {
                Value::Bool(true)
            } else if s.eq_ignore_ascii_case("false") || s == "0" {
                Value::Bool(false)
            } else {
                return Err(bad("boolean"));
            }
        }
        FieldKind::Timestamp => {
            chrono::DateTime::parse_from_rfc3339(s).map_err(|_| bad("RFC 3339 timestamp"))?;
            Value::String(s.to_string())
        }
        FieldKind::Json => serde_json::from_str(s).map_err(|_| bad("JSON value"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        name: String,
    }
    impl Hooks for Item {}
    impl Record for Item {
        const NAME: &'static str = "Item";
        fn fields() -> Vec<Field> {
            vec![Field::text("id"), Field::text("name")]
        }
    }

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        #[serde(rename = "ID")]
        id: i64,
        label: String,
        hits: i64,
    }
    impl Hooks for Counter {}
    impl Record for Counter {
        const NAME: &'static str = "Counter";
        fn fields() -> Vec<Field> {
            vec![Field::integer("ID"), Field::text("label"), Field::integer("hits")]
        }
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct Note {
        body: String,
    }
    impl Hooks for Note {}
    impl Record for Note {
        const NAME: &'static str = "Note";
        fn fields() -> Vec<Field> {
            vec![Field::text("body")]
        }
    }

    #[test]
    fn zero_text_identifier_reads_empty() {
        assert_eq!(read_identifier(&new_zero_instance::<Item>()).unwrap(), "");
    }

    #[test]
    fn missing_identifier_is_schema_error() {
        let schema = RecordSchema::of::<Note>();
        assert!(matches!(locate_identifier_field(&schema), Err(CrudError::Schema(_))));
        assert!(matches!(read_identifier(&Note::default()), Err(CrudError::Schema(_))));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn identifier_name_is_case_insensitive() {
        let schema = RecordSchema::of::<Counter>();
        assert_eq!(schema.identifier().unwrap().name, "ID");
        let c = Counter {
            id: 99,
            ..Default::default()
        };
        assert_eq!(read_identifier(&c).unwrap(), "99");
    }

    #[test]
    fn typed_identifier_conversion() {
        let ints = RecordSchema::of::<Counter>();
        assert_eq!(write_typed_identifier("42", &ints).unwrap(), IdValue::Integer(42));
        assert!(matches!(write_typed_identifier("abc", &ints), Err(CrudError::Conversion(_))));

        let texts = RecordSchema::of::<Item>();
        assert_eq!(write_typed_identifier("abc", &texts).unwrap(), IdValue::Text("abc".into()));
    }

    #[test]
    fn decode_keeps_zero_values_for_absent_fields() {
        let c: Counter = decode_into_zero(json!({"label": "visits"})).unwrap();
        assert_eq!(c, Counter { id: 0, label: "visits".into(), hits: 0 });

        assert!(matches!(decode_into_zero::<Counter>(json!([1, 2])), Err(CrudError::Validation(_))));
        assert!(matches!(
            decode_into_zero::<Counter>(json!({"hits": "many"})),
            Err(CrudError::Validation(_))
        ));
    }

    #[test]
    fn patch_merges_declared_fields_only() {
        let c = Counter {
            id: 7,
            label: "old".into(),
            hits: 3,
        };
        let patch = json!({"label": "new", "Label": "ignored", "unknown": true, "ID": 8});
        let patched = merge_patch(&c, patch.as_object().unwrap()).unwrap();
        assert_eq!(
            patched,
            Counter {
                id: 7,
                label: "new".into(),
                hits: 3
            }
        );
        let again = merge_patch(&patched, patch.as_object().unwrap()).unwrap();
        assert_eq!(again, patched);
    }

    #[test]
    fn patch_with_wrong_type_is_validation_error() {
        let patch = json!({"hits": "lots"});
        let err = merge_patch(&Counter::default(), patch.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, CrudError::Validation(_)));
    }

    #[test]
    fn query_values_follow_field_kind() {
        assert_eq!(parse_field_value(&Field::integer("n"), "12").unwrap(), json!(12));
        assert_eq!(parse_field_value(&Field::boolean("b"), "TRUE").unwrap(), json!(true));
        assert_eq!(parse_field_value(&Field::float("f"), "1.5").unwrap(), json!(1.5));
        assert_eq!(parse_field_value(&Field::text("t"), "12").unwrap(), json!("12"));
        assert!(parse_field_value(&Field::integer("n"), "x").is_err());
        assert!(parse_field_value(&Field::timestamp("at"), "yesterday").is_err());
        assert!(parse_field_value(&Field::timestamp("at"), "2024-01-02T03:04:05Z").is_ok());
    }

    #[test]
    fn schema_validation_rejects_bad_names() {
        let s = RecordSchema::new("Item", vec![Field::text("id"), Field::text("na me")]);
        assert!(matches!(s.validate(), Err(CrudError::Schema(_))));
        let s = RecordSchema::new("Item", vec![Field::float("id")]);
        assert!(matches!(s.validate(), Err(CrudError::Schema(_))));
        assert!(RecordSchema::of::<Item>().validate().is_ok());
    }
}
