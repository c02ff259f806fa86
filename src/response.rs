//! Transport-neutral reply: status, headers, optional JSON body.

use crate::error::CrudError;
use axum::{
    http::{header::HeaderName, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl Reply {
    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Reply {
                status,
                headers: HeaderMap::new(),
                body: Some(body),
            },
            Err(e) => Reply::error(StatusCode::INTERNAL_SERVER_ERROR, format!("encode response: {}", e)),
        }
    }

    pub fn ok<T: Serialize>(body: &T) -> Self {
        Reply::json(StatusCode::OK, body)
    }

    pub fn created<T: Serialize>(body: &T) -> Self {
        Reply::json(StatusCode::CREATED, body)
    }

    pub fn no_content() -> Self {
        Reply {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Reply {
            status,
            headers: HeaderMap::new(),
            body: Some(error_body(message)),
        }
    }

    /// Values that are not valid header text are dropped.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(name, v);
            }
            Err(_) => tracing::warn!(header = %name, "dropping invalid response header value"),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// The `error` message of an error body, if this is one.
    pub fn error_message(&self) -> Option<&str> {
        self.body.as_ref()?.get("error")?.as_str()
    }
}

/// `{"error": <message>}`.
pub fn error_body(message: impl Into<String>) -> Value {
    serde_json::json!({ "error": message.into() })
}

impl From<CrudError> for Reply {
    fn from(e: CrudError) -> Self {
        Reply::error(e.status(), e.to_string())
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        };
        response.headers_mut().extend(self.headers);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    #[test]
    fn errors_are_single_key_objects() {
        let r = Reply::from(CrudError::NotFound("Item '9'".into()));
        assert_eq!(r.status, StatusCode::NOT_FOUND);
        assert_eq!(r.body, Some(serde_json::json!({"error": "not found: Item '9'"})));
        assert_eq!(r.error_message(), Some("not found: Item '9'"));
    }

    #[test]
    fn headers_and_empty_bodies() {
        let r = Reply::created(&serde_json::json!({"id": 1})).with_header(LOCATION, "/items/1");
        assert_eq!(r.headers[LOCATION], "/items/1");
        let r = Reply::no_content().with_header(LOCATION, "bad\nvalue");
        assert!(r.headers.is_empty());
        assert!(r.body.is_none());
    }
}
