//! Typed CRUD execution for one record type: identifier typing, hooks, storage.

use crate::error::CrudError;
use crate::hooks::{self, Operation};
use crate::record::{
    from_document, merge_patch, to_document, write_typed_identifier, Document, IdValue, Record, RecordSchema,
};
use crate::storage::{identifier_of, ListQuery, Storage};
use std::marker::PhantomData;
use std::sync::Arc;

pub struct CrudService<R: Record> {
    storage: Arc<dyn Storage>,
    schema: Arc<RecordSchema>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for CrudService<R> {
    fn clone(&self) -> Self {
        CrudService {
            storage: Arc::clone(&self.storage),
            schema: Arc::clone(&self.schema),
            _record: PhantomData,
        }
    }
}

impl<R: Record> CrudService<R> {
    /// Fails with [`CrudError::Schema`] when `R` has no usable identifier.
    pub fn new(storage: Arc<dyn Storage>) -> Result<Self, CrudError> {
        let schema = RecordSchema::of::<R>();
        schema.validate()?;
        Ok(CrudService {
            storage,
            schema: Arc::new(schema),
            _record: PhantomData,
        })
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Typed identifier from its textual form. Empty text is rejected, never defaulted.
    pub fn parse_id(&self, raw: &str) -> Result<IdValue, CrudError> {
        if raw.trim().is_empty() {
            return Err(CrudError::Validation(format!("{}: identifier is required", R::NAME)));
        }
        write_typed_identifier(raw, &self.schema)
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Vec<R>, CrudError> {
        let docs = self.storage.find_all(&self.schema, query).await?;
        docs.into_iter().map(decode_stored).collect()
    }

    pub async fn get(&self, raw_id: &str) -> Result<R, CrudError> {
        let id = self.parse_id(raw_id)?;
        self.fetch(&id).await
    }

    pub async fn create(&self, mut record: R) -> Result<R, CrudError> {
        hooks::before(&mut record, Operation::Create)?;
        let stored = self.storage.create(&self.schema, to_document(&record)?).await?;
        let created: R = decode_stored(stored)?;
        hooks::after(&created, Operation::Create)?;
        Ok(created)
    }

    /// Full replace. An identifier in `record` must match `raw_id`; the path identifier wins.
    pub async fn update(&self, raw_id: &str, record: R) -> Result<R, CrudError> {
        let id = self.parse_id(raw_id)?;
        let doc = to_document(&record)?;
        if let Some(body_id) = identifier_of(&self.schema, &doc)? {
            if body_id != id {
                return Err(CrudError::Validation(format!(
                    "identifier mismatch: path '{}' but body '{}'",
                    id, body_id
                )));
            }
        }
        let mut record: R = from_document(self.with_id(doc, &id)?)?;
        hooks::before(&mut record, Operation::Update)?;
        let doc = self.with_id(to_document(&record)?, &id)?;
        let updated: R = decode_stored(self.storage.update(&self.schema, doc).await?)?;
        hooks::after(&updated, Operation::Update)?;
        Ok(updated)
    }

    /// Merge `patch` onto the stored record by field name; see [`merge_patch`].
    pub async fn patch(&self, raw_id: &str, patch: &Document) -> Result<R, CrudError> {
        let id = self.parse_id(raw_id)?;
        let current = self.fetch(&id).await?;
        let mut record = merge_patch(&current, patch)?;
        hooks::before(&mut record, Operation::Patch)?;
        let doc = self.with_id(to_document(&record)?, &id)?;
        let patched: R = decode_stored(self.storage.update(&self.schema, doc).await?)?;
        hooks::after(&patched, Operation::Patch)?;
        Ok(patched)
    }

    pub async fn delete(&self, raw_id: &str) -> Result<(), CrudError> {
        let id = self.parse_id(raw_id)?;
        let mut record = self.fetch(&id).await?;
        hooks::before(&mut record, Operation::Delete)?;
        self.storage.delete(&self.schema, &id).await?;
        hooks::after(&record, Operation::Delete)
    }

    async fn fetch(&self, id: &IdValue) -> Result<R, CrudError> {
        decode_stored(self.storage.find_by_id(&self.schema, id).await?)
    }

    fn with_id(&self, mut doc: Document, id: &IdValue) -> Result<Document, CrudError> {
        doc.insert(self.schema.identifier()?.name.to_string(), id.to_json());
        Ok(doc)
    }
}

/// Documents coming back from storage should always decode; failure means the stored shape
/// drifted from the type.
fn decode_stored<R: Record>(doc: Document) -> Result<R, CrudError> {
    from_document(doc).map_err(|e| CrudError::Storage(format!("{}: stored document does not decode: {}", R::NAME, e)))
}
