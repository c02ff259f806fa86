//! Route registrar: six CRUD routes per record type.

use crate::auth::AuthProvider;
use crate::config::CrudConfig;
use crate::error::CrudError;
use crate::handlers::{Action, CrudHandlers, ID_PARAM};
use crate::record::Record;
use crate::service::CrudService;
use crate::storage::Storage;
use crate::transport::{wrap, HttpEngine};
use std::sync::Arc;

/// Collection path `/<segment>` and item path `/<segment>/:id`.
pub fn resource_paths(resource: &str) -> (String, String) {
    (format!("/{}", resource), format!("/{}/:{}", resource, ID_PARAM))
}

/// Register list, get, create, update, patch and delete for `R`.
///
/// Routes whose method `config` protects are flagged and, when `auth` is given, wrapped so its
/// middleware runs first. Unprotected routes never see the auth middleware.
pub fn register_crud_routes<R, E>(
    engine: &mut E,
    storage: Arc<dyn Storage>,
    config: &CrudConfig,
    auth: Option<&dyn AuthProvider>,
) -> Result<(), CrudError>
where
    R: Record,
    E: HttpEngine + ?Sized,
{
    let handlers = Arc::new(CrudHandlers::new(CrudService::<R>::new(storage)?));
    let (collection, item) = resource_paths(handlers.resource());
    let auth_middleware = auth.map(|a| a.middleware());

    for action in Action::ALL {
        let method = action.method();
        let path = if action.is_item() { &item } else { &collection };
        let protected = config.is_protected(&method);
        let mut handler = handlers.handler_for(action);
        if protected {
            match &auth_middleware {
                Some(mw) => handler = wrap(mw, handler),
                None => tracing::warn!(
                    record = R::NAME,
                    method = %method,
                    path = %path,
                    "route is protected but no auth provider is configured"
                ),
            }
        }
        engine.register_route(method.clone(), path, handler, R::NAME, protected)?;
        tracing::info!(record = R::NAME, method = %method, path = %path, protected, "route registered");
    }
    Ok(())
}
