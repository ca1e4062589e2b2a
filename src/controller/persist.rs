//! Write middlewares: `create`, `update`, `remove`.
//! JSON callers get the written documents back; browser callers are redirected.

use crate::adapters::RespondOptions;
use crate::context::{json_request, RequestContext};
use crate::controller::{truthy, ControllerContext, ControllerOptions};
use crate::db::document::{document_id, id_string, make_nice_name, now_rfc3339};
use crate::db::{CreateOptions, DeleteOptions, UpdateOptions, ID_FIELD};
use crate::error::{AppError, ConfigError};
use crate::inflect::pluralize;
use crate::middleware::{Flow, Middleware};
use serde_json::{json, Value};

/// Marks the request so the following update keeps the previous version.
pub fn revision_marker() -> Middleware {
    Middleware::mutate("save_revision", |req| req.save_revision = true)
}

/// Derive `name` from `title` when the body has a title but no name.
fn with_nice_name(mut body: Value) -> Value {
    if let Value::Object(map) = &mut body {
        let title = map.get("title").and_then(Value::as_str).filter(|t| !t.is_empty());
        let has_name = truthy(map.get("name"));
        if let (Some(title), false) = (title, has_name) {
            let name = make_nice_name(title);
            map.insert("name".into(), Value::String(name));
        }
    }
    body
}

async fn respond_data(ctx: &ControllerContext, opts: &ControllerOptions, req: &RequestContext, data: Value) -> Flow {
    Flow::Done(
        ctx.protocol
            .respond(
                req,
                RespondOptions {
                    data,
                    skip_default_props: opts.skip_default_props,
                    ..Default::default()
                },
            )
            .await,
    )
}

pub fn create(ctx: &ControllerContext, opts: &ControllerOptions) -> Result<Middleware, ConfigError> {
    let db = ctx.db_for(&opts.model_name)?;
    let ctx = ctx.clone();
    let opts = opts.clone();
    let name = format!("{}.create", opts.model_name);
    Ok(Middleware::new(&name, move |req: RequestContext| {
        let ctx = ctx.clone();
        let opts = opts.clone();
        let db = db.clone();
        async move {
            let newdoc = with_nice_name(req.body.clone());
            let created = db
                .create(CreateOptions {
                    newdoc,
                    controller_data: req.controller_data.clone(),
                })
                .await;
            match created {
                Ok(doc) if json_request(&req) => {
                    let data = json!({ "newdoc": doc, "createresponse": doc });
                    respond_data(&ctx, &opts, &req, data).await
                }
                Ok(doc) => {
                    let path = ctx.redirects.path(&req, &opts.model_name, Some(&doc));
                    Flow::Done(ctx.protocol.redirect(&req, &path))
                }
                Err(err) => ctx.fail(&req, err).await,
            }
        }
    }))
}

pub fn update(ctx: &ControllerContext, opts: &ControllerOptions) -> Result<Middleware, ConfigError> {
    let db = ctx.db_for(&opts.model_name)?;
    let ctx = ctx.clone();
    let opts = opts.clone();
    let name = format!("{}.update", opts.model_name);
    Ok(Middleware::new(&name, move |req: RequestContext| {
        let ctx = ctx.clone();
        let opts = opts.clone();
        let db = db.clone();
        async move {
            let mut updatedoc = match req.body.get("updatedoc") {
                Some(doc @ Value::Object(_)) => doc.clone(),
                _ => req.body.clone(),
            };
            let id_field = db.docid().unwrap_or(ID_FIELD).to_string();
            let id = req
                .param("id")
                .map(str::to_string)
                .or_else(|| updatedoc.get(&id_field).and_then(id_string));
            let Some(id) = id else {
                return ctx.fail(&req, AppError::BadRequest("no document id to update".into())).await;
            };
            if let Value::Object(map) = &mut updatedoc {
                if !truthy(map.get("updatedat")) {
                    map.insert("updatedat".into(), Value::String(now_rfc3339()));
                }
            }
            let is_patch = truthy(req.controller_data.get("isPatch")) || truthy(req.body.get("isPatch"));
            let result = db
                .update(UpdateOptions {
                    id,
                    updatedoc: updatedoc.clone(),
                    is_patch,
                    track_changes: req.save_revision,
                    depopulate: req.depopulate,
                })
                .await;
            match result {
                Ok(updated) if json_request(&req) => {
                    let data = json!({ "updatedoc": updatedoc, "updateresponse": updated });
                    respond_data(&ctx, &opts, &req, data).await
                }
                Ok(_) => {
                    let path = ctx.redirects.path(&req, &opts.model_name, Some(&updatedoc));
                    Flow::Done(ctx.protocol.redirect(&req, &path))
                }
                Err(err) => ctx.fail(&req, err).await,
            }
        }
    }))
}

/// Deletes the document `load` put in controller data.
pub fn remove(ctx: &ControllerContext, opts: &ControllerOptions) -> Result<Middleware, ConfigError> {
    let db = ctx.db_for(&opts.model_name)?;
    let redirect_to = if opts.use_plural_view_names {
        pluralize(&opts.model_name)
    } else {
        opts.model_name.clone()
    };
    let ctx = ctx.clone();
    let opts = opts.clone();
    let name = format!("{}.remove", opts.model_name);
    Ok(Middleware::new(&name, move |req: RequestContext| {
        let ctx = ctx.clone();
        let opts = opts.clone();
        let db = db.clone();
        let redirect_to = redirect_to.clone();
        async move {
            let deleteid = req
                .controller_data
                .get(&opts.model_name)
                .and_then(|doc| document_id(doc, db.docid()));
            let Some(deleteid) = deleteid else {
                return ctx.fail(&req, AppError::InvalidRequest).await;
            };
            match db.delete(DeleteOptions { deleteid }).await {
                Ok(deleted) if json_request(&req) => respond_data(&ctx, &opts, &req, deleted).await,
                Ok(_) => Flow::Done(ctx.protocol.redirect(&req, &redirect_to)),
                Err(err) => ctx.fail(&req, err).await,
            }
        }
    }))
}
