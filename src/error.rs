//! Typed errors and HTTP status mapping.

use crate::hooks::{HookStage, Operation};
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrudError {
    /// Identifier or filter text does not match the field's declared type.
    #[error("conversion: {0}")]
    Conversion(String),
    #[error("schema: {0}")]
    Schema(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("storage: {0}")]
    Storage(String),
    /// Backend unreachable during initialization.
    #[error("connection: {0}")]
    Connection(String),
    #[error("{stage} {operation} hook failed: {message}")]
    Hook {
        stage: HookStage,
        operation: Operation,
        message: String,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl CrudError {
    pub fn status(&self) -> StatusCode {
        match self {
            CrudError::Conversion(_) | CrudError::Validation(_) => StatusCode::BAD_REQUEST,
            CrudError::Hook {
                stage: HookStage::Before,
                ..
            } => StatusCode::BAD_REQUEST,
            CrudError::NotFound(_) => StatusCode::NOT_FOUND,
            CrudError::Hook {
                stage: HookStage::After,
                ..
            }
            | CrudError::Conflict(_)
            | CrudError::Storage(_)
            | CrudError::Connection(_)
            | CrudError::Schema(_)
            | CrudError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for CrudError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => CrudError::NotFound(e.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => CrudError::Conflict(db.message().to_string()),
            _ => CrudError::Storage(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for CrudError {
    fn from(e: serde_json::Error) -> Self {
        CrudError::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_stage_decides_client_or_server_error() {
        let before = CrudError::Hook {
            stage: HookStage::Before,
            operation: Operation::Create,
            message: "name required".into(),
        };
        let after = CrudError::Hook {
            stage: HookStage::After,
            operation: Operation::Delete,
            message: "audit down".into(),
        };
        assert_eq!(before.status(), StatusCode::BAD_REQUEST);
        assert_eq!(after.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(before.to_string(), "before create hook failed: name required");
    }

    #[test]
    fn propagation_table() {
        assert_eq!(CrudError::Conversion("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(CrudError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(CrudError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(CrudError::Conflict("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(CrudError::Schema("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(CrudError::Storage("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
