//! Loading middlewares: `load` (single document by id), and the request-shaping
//! `load_with_count` / `load_with_limit` run before `paginate`.

use crate::context::RequestContext;
use crate::controller::{truthy, ControllerContext, ControllerOptions};
use crate::db::LoadOptions;
use crate::error::{AppError, ConfigError};
use crate::middleware::{Flow, Middleware};
use serde_json::Value;

/// Default page size when the request names none.
pub const DEFAULT_PER_PAGE: u64 = 15;

/// Alternate id field: the configured one unless the request names its own.
fn resolve_docid(req: &RequestContext, configured: Option<&str>) -> Option<String> {
    let from_data = req.controller_data.get("docid").and_then(Value::as_str);
    let from_query = req.query_str("docid");
    match (configured, from_data, from_query) {
        (Some(c), None, None) => Some(c.to_string()),
        (_, Some(d), _) => Some(d.to_string()),
        (_, None, Some(q)) => Some(q.to_string()),
        (None, None, None) => None,
    }
}

/// Fetch the document named by `:id` into `controller_data[model]`.
/// A missing document fails the chain with "Invalid Request".
pub fn load(ctx: &ControllerContext, opts: &ControllerOptions) -> Result<Middleware, ConfigError> {
    let db = ctx.db_for(&opts.model_name)?;
    let ctx = ctx.clone();
    let opts = opts.clone();
    let name = format!("{}.load", opts.model_name);
    Ok(Middleware::new(&name, move |mut req: RequestContext| {
        let ctx = ctx.clone();
        let opts = opts.clone();
        let db = db.clone();
        async move {
            let skip_population = truthy(req.controller_data.get("skip_population"));
            let load = LoadOptions {
                query: req.param("id").unwrap_or_default().to_string(),
                docid: resolve_docid(&req, opts.docid.as_deref()),
                fields: req.controller_data.get("model_fields").cloned(),
                population: skip_population.then(String::new),
            };
            match db.load(load).await {
                Ok(Some(doc)) => {
                    req.controller_data.insert(opts.model_name.clone(), doc);
                    Flow::Next(req)
                }
                Ok(None) => {
                    let err = AppError::InvalidRequest;
                    ctx.protocol.error(Some(&req), &err);
                    Flow::Fail(req, err)
                }
                Err(err) => {
                    ctx.protocol.error(Some(&req), &err);
                    Flow::Fail(req, err)
                }
            }
        }
    }))
}

/// Ask the following `paginate` to count the whole collection.
pub fn load_with_count(_ctx: &ControllerContext, opts: &ControllerOptions) -> Middleware {
    Middleware::mutate(&format!("{}.load_with_count", opts.model_name), |req| {
        req.with_count = true;
    })
}

/// Normalize `limit` and `pagenum` into the query.
/// `limit` is the first of `{plural}perpage`, `docsperpage`, `limit` from the query, then the
/// body, else 15. `pagenum` keeps a positive query or body value, else 1.
pub fn load_with_limit(ctx: &ControllerContext, opts: &ControllerOptions) -> Middleware {
    let per_page = ctx.view_model(&opts.model_name).plural_key("perpage");
    Middleware::mutate(&format!("{}.load_with_limit", opts.model_name), move |req| {
        let keys = [per_page.as_str(), "docsperpage", "limit"];
        let limit = keys
            .iter()
            .map(|k| req.query.get(*k))
            .chain(keys.iter().map(|k| req.body.get(*k)))
            .flatten()
            .find(|v| truthy(Some(*v)))
            .cloned()
            .unwrap_or(Value::from(DEFAULT_PER_PAGE));
        req.query.insert("limit".into(), limit);

        let positive = |v: Option<&Value>| v.and_then(crate::context::as_number).map(|n| n > 0.0).unwrap_or(false);
        let pagenum = if positive(req.query.get("pagenum")) {
            req.query.get("pagenum").cloned()
        } else if positive(req.body.get("pagenum")) {
            req.body.get("pagenum").cloned()
        } else {
            None
        };
        req.query.insert("pagenum".into(), pagenum.unwrap_or(Value::from(1)));
    })
}
