//! Handler set: the six CRUD handlers of one record type, over a [`RequestContext`].

use crate::error::CrudError;
use crate::record::{decode_into_zero, read_identifier, Record};
use crate::response::Reply;
use crate::service::CrudService;
use crate::storage::ListQuery;
use crate::transport::{handler_fn, HandlerFn, RequestContext};
use axum::http::{header::LOCATION, Method};
use serde_json::Value;
use std::sync::Arc;

/// Path parameter carrying the identifier on item routes.
pub const ID_PARAM: &str = "id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    List,
    Get,
    Create,
    Update,
    Patch,
    Delete,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::List,
        Action::Get,
        Action::Create,
        Action::Update,
        Action::Patch,
        Action::Delete,
    ];

    pub fn method(self) -> Method {
        match self {
            Action::List | Action::Get => Method::GET,
            Action::Create => Method::POST,
            Action::Update => Method::PUT,
            Action::Patch => Method::PATCH,
            Action::Delete => Method::DELETE,
        }
    }

    /// Whether the route addresses a single record (`/<segment>/:id`).
    pub fn is_item(self) -> bool {
        !matches!(self, Action::List | Action::Create)
    }
}

pub struct CrudHandlers<R: Record> {
    service: CrudService<R>,
    resource: String,
}

impl<R: Record> CrudHandlers<R> {
    pub fn new(service: CrudService<R>) -> Self {
        let resource = service.schema().resource();
        CrudHandlers { service, resource }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn handler_for(self: &Arc<Self>, action: Action) -> HandlerFn {
        let this = Arc::clone(self);
        handler_fn(move |ctx: RequestContext| {
            let this = Arc::clone(&this);
            async move {
                match this.dispatch(action, &ctx).await {
                    Ok(reply) => reply,
                    Err(e) => this.failure(action, &ctx, e),
                }
            }
        })
    }

    async fn dispatch(&self, action: Action, ctx: &RequestContext) -> Result<Reply, CrudError> {
        match action {
            Action::List => self.list(ctx).await,
            Action::Get => self.get(ctx).await,
            Action::Create => self.create(ctx).await,
            Action::Update => self.update(ctx).await,
            Action::Patch => self.patch(ctx).await,
            Action::Delete => self.delete(ctx).await,
        }
    }

    async fn list(&self, ctx: &RequestContext) -> Result<Reply, CrudError> {
        let query = ListQuery::from_params(self.service.schema(), ctx.query_params())?;
        let records = self.service.list(&query).await?;
        Ok(Reply::ok(&records))
    }

    async fn get(&self, ctx: &RequestContext) -> Result<Reply, CrudError> {
        let record = self.service.get(path_id(ctx)?).await?;
        Ok(Reply::ok(&record))
    }

    async fn create(&self, ctx: &RequestContext) -> Result<Reply, CrudError> {
        let record: R = decode_into_zero(ctx.decode_body::<Value>()?)?;
        let created = self.service.create(record).await?;
        let id = read_identifier(&created)?;
        let location = format!("/{}/{}", self.resource, urlencoding::encode(&id));
        Ok(Reply::created(&created).with_header(LOCATION, &location))
    }

    async fn update(&self, ctx: &RequestContext) -> Result<Reply, CrudError> {
        let id = path_id(ctx)?;
        let record: R = decode_into_zero(ctx.decode_body::<Value>()?)?;
        let updated = self.service.update(id, record).await?;
        Ok(Reply::ok(&updated))
    }

    async fn patch(&self, ctx: &RequestContext) -> Result<Reply, CrudError> {
        let id = path_id(ctx)?;
        let sparse = ctx.decode_partial_body()?;
        let patched = self.service.patch(id, &sparse).await?;
        Ok(Reply::ok(&patched))
    }

    async fn delete(&self, ctx: &RequestContext) -> Result<Reply, CrudError> {
        self.service.delete(path_id(ctx)?).await?;
        Ok(Reply::no_content())
    }

    fn failure(&self, action: Action, ctx: &RequestContext, e: CrudError) -> Reply {
        let status = e.status();
        if status.is_server_error() {
            tracing::warn!(record = R::NAME, ?action, path = ctx.path(), error = %e, "request failed");
        } else {
            tracing::debug!(record = R::NAME, ?action, path = ctx.path(), error = %e, "request rejected");
        }
        Reply::from(e)
    }
}

fn path_id(ctx: &RequestContext) -> Result<&str, CrudError> {
    ctx.path_param(ID_PARAM)
        .ok_or_else(|| CrudError::Validation("missing identifier path parameter".into()))
}
