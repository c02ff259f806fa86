//! List query: equality filters, pagination, sort.

use crate::error::CrudError;
use crate::record::{parse_field_value, RecordSchema};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field name -> exact-match value. Empty means no filtering.
pub type FilterSet = BTreeMap<String, Value>;

/// `limit <= 0` means unbounded; `offset <= 0` means from the start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn new(limit: i64, offset: i64) -> Self {
        Pagination { limit, offset }
    }

    pub fn limit(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.limit as usize)
    }

    pub fn offset(&self) -> usize {
        self.offset.max(0) as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: Direction,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        SortSpec {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        SortSpec {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// `name`, `name:asc`, `name:desc` or `-name`.
    pub fn parse(s: &str) -> Result<Self, CrudError> {
        let s = s.trim();
        if let Some(field) = s.strip_prefix('-') {
            return Ok(SortSpec::desc(field));
        }
        match s.split_once(':') {
            None => Ok(SortSpec::asc(s)),
            Some((field, dir)) => match dir.to_ascii_lowercase().as_str() {
                "asc" => Ok(SortSpec::asc(field)),
                "desc" => Ok(SortSpec::desc(field)),
                _ => Err(CrudError::Validation(format!("invalid sort direction '{}'", dir))),
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQuery {
    pub filters: FilterSet,
    pub pagination: Pagination,
    pub sort: Vec<SortSpec>,
}

impl ListQuery {
    /// Build from raw query pairs. `limit`, `offset` and `sort` are reserved; other keys that name
    /// a declared field become equality filters typed by the field; the rest are ignored.
    pub fn from_params(schema: &RecordSchema, params: &[(String, String)]) -> Result<Self, CrudError> {
        let mut q = ListQuery::default();
        for (k, v) in params {
            match k.as_str() {
                "limit" => q.pagination.limit = parse_count("limit", v)?,
                "offset" => q.pagination.offset = parse_count("offset", v)?,
                "sort" => {
                    for part in v.split(',').filter(|p| !p.trim().is_empty()) {
                        let spec = SortSpec::parse(part)?;
                        if schema.field(&spec.field).is_none() {
                            return Err(CrudError::Validation(format!("cannot sort by unknown field '{}'", spec.field)));
                        }
                        q.sort.push(spec);
                    }
                }
                _ => match schema.field(k) {
                    Some(field) => {
                        q.filters.insert(k.clone(), parse_field_value(field, v)?);
                    }
                    None => tracing::debug!(record = schema.name(), key = %k, "ignoring unknown filter"),
                },
            }
        }
        Ok(q)
    }
}

fn parse_count(name: &str, v: &str) -> Result<i64, CrudError> {
    v.trim()
        .parse()
        .map_err(|_| CrudError::Validation(format!("{} must be an integer, got '{}'", name, v)))
}
