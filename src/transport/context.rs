//! Per-request context handed to handlers and middlewares.

use crate::error::CrudError;
use crate::record::Document;
use axum::body::Bytes;
use axum::http::{header::HeaderName, HeaderMap, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// Authenticated caller, set by an auth middleware.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    pub roles: Vec<String>,
}

impl Subject {
    pub fn new(id: impl Into<String>) -> Self {
        Subject {
            id: id.into(),
            roles: Vec::new(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Request-scoped cross-cutting data, passed from middlewares to handlers.
#[derive(Clone, Debug, Default)]
pub struct RequestScope {
    pub subject: Option<Subject>,
    pub request_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RequestContext {
    method: Method,
    path: String,
    path_params: HashMap<String, String>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
    scope: RequestScope,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        RequestContext {
            method,
            path: path.into(),
            path_params: HashMap::new(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            scope: RequestScope::default(),
        }
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn header(&self, name: impl axum::http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut RequestScope {
        &mut self.scope
    }

    /// Decode the JSON body. An empty or malformed body is a validation error.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, CrudError> {
        if self.body.is_empty() {
            return Err(CrudError::Validation("request body is empty".into()));
        }
        serde_json::from_slice(&self.body).map_err(|e| CrudError::Validation(format!("invalid JSON body: {}", e)))
    }

    /// Decode the body as a sparse field map.
    pub fn decode_partial_body(&self) -> Result<Document, CrudError> {
        match self.decode_body::<Value>()? {
            Value::Object(map) => Ok(map),
            _ => Err(CrudError::Validation("body must be a JSON object".into())),
        }
    }
}
