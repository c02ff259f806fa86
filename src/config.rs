//! Per-record route configuration: which HTTP methods require authentication.

use crate::error::CrudError;
use axum::http::Method;
use std::collections::HashSet;

/// Methods covered by [`CrudConfig::protect_all`].
pub const CRUD_METHODS: [Method; 5] = [Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE];

/// Protected-methods set for one record type. The default protects nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CrudConfig {
    protected_methods: HashSet<Method>,
}

impl CrudConfig {
    pub fn new() -> Self {
        CrudConfig::default()
    }

    pub fn protect(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.protected_methods.extend(methods);
        self
    }

    /// Same as [`protect`](Self::protect) for method names given as text, e.g. from settings.
    /// Names are upper-cased; anything outside the CRUD methods is rejected.
    pub fn protect_names<S: AsRef<str>>(self, names: impl IntoIterator<Item = S>) -> Result<Self, CrudError> {
        let mut methods = Vec::new();
        for name in names {
            let upper = name.as_ref().trim().to_ascii_uppercase();
            let method = CRUD_METHODS
                .iter()
                .find(|m| m.as_str() == upper)
                .cloned()
                .ok_or_else(|| CrudError::Validation(format!("unknown HTTP method '{}'", name.as_ref())))?;
            methods.push(method);
        }
        Ok(self.protect(methods))
    }

    pub fn protect_all(self) -> Self {
        self.protect(CRUD_METHODS)
    }

    pub fn is_protected(&self, method: &Method) -> bool {
        self.protected_methods.contains(method)
    }

    pub fn protected_methods(&self) -> impl Iterator<Item = &Method> {
        self.protected_methods.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_protects_nothing() {
        let cfg = CrudConfig::default();
        for m in CRUD_METHODS {
            assert!(!cfg.is_protected(&m));
        }
    }

    #[test]
    fn protect_selected_methods() {
        let cfg = CrudConfig::new().protect([Method::POST, Method::DELETE]);
        assert!(cfg.is_protected(&Method::POST));
        assert!(cfg.is_protected(&Method::DELETE));
        assert!(!cfg.is_protected(&Method::GET));
        assert_eq!(cfg.protected_methods().count(), 2);
    }

    #[test]
    fn protect_all_covers_crud_methods() {
        let cfg = CrudConfig::new().protect_all();
        for m in CRUD_METHODS {
            assert!(cfg.is_protected(&m));
        }
        assert!(!cfg.is_protected(&Method::OPTIONS));
    }

    #[test]
    fn method_names() {
        let cfg = CrudConfig::new().protect_names(["post", " Patch "]).unwrap();
        assert!(cfg.is_protected(&Method::POST));
        assert!(cfg.is_protected(&Method::PATCH));
        assert!(matches!(
            CrudConfig::new().protect_names(["FETCH"]),
            Err(CrudError::Validation(_))
        ));
    }
}
