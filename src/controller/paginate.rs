//! `paginate`: search the model's store one page at a time and publish the result under
//! inflected keys (`examplescount`, `examplepage_next`, `examples`, `examplestotal`, ...).

use crate::adapters::RespondOptions;
use crate::context::{json_request, RequestContext};
use crate::controller::{number, truthy, ControllerContext, ControllerOptions};
use crate::db::{Filter, SearchOptions, SearchResult};
use crate::error::ConfigError;
use crate::inflect::ViewModel;
use crate::middleware::{Flow, Middleware};
use serde_json::{Map, Value};

fn paginate_disabled(v: Option<&Value>) -> bool {
    matches!(v, Some(Value::Bool(false))) || matches!(v, Some(Value::String(s)) if s == "false")
}

/// Query document for the search: controller data, the request, then the configured default.
fn query_source(req: &RequestContext, opts: &ControllerOptions) -> Value {
    req.controller_data
        .get("model_query")
        .filter(|v| truthy(Some(*v)))
        .or_else(|| req.query.get("query"))
        .cloned()
        .or_else(|| opts.query.clone())
        .unwrap_or(Value::Null)
}

/// Window position resolved from the request and the store's defaults.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Window {
    skip: f64,
    limit: f64,
    pagelength: f64,
}

fn window(req: &RequestContext, default_limit: u64, default_pagelength: u64) -> Window {
    let pagenum = req.query_number("pagenum").map(|n| (n - 1.0).max(0.0)).unwrap_or(0.0);
    let limit = req.query_number("limit").unwrap_or(default_limit as f64).max(0.0);
    let pagelength = req
        .query_number("pagelength")
        .unwrap_or(default_pagelength as f64)
        .max(0.0);
    let skip = req.query_number("skip").unwrap_or(pagelength * pagenum).max(0.0);
    Window { skip, limit, pagelength }
}

impl Window {
    /// Documents to fetch: one page, or the whole limit when `pagelength` is 0.
    fn fetch_limit(&self) -> u64 {
        if self.pagelength > 0.0 {
            self.pagelength.min(self.limit) as u64
        } else {
            self.limit as u64
        }
    }
}

/// Data bundle keyed by inflected names. Mutates `query.pagenum` when `skip` was given.
fn bundle(req: &mut RequestContext, vm: &ViewModel, result: &SearchResult, win: Window, concat_documents: bool) -> Map<String, Value> {
    if truthy(req.query.get("skip")) && win.pagelength > 0.0 {
        let page = (win.skip / win.pagelength).ceil() + 1.0;
        req.query.insert("pagenum".into(), number(page));
    }
    let current = req
        .query
        .get("pagenum")
        .filter(|v| truthy(Some(*v)))
        .and_then(crate::context::as_number);
    let page_current = current.unwrap_or(1.0);
    let page_prev = current.map(|c| c - 1.0).filter(|p| *p >= 1.0).map(number).unwrap_or(Value::Null);
    let page = result.first_page();
    let documents = if concat_documents {
        Value::Array(page.documents)
    } else {
        serde_json::to_value(&page).unwrap_or(Value::Null)
    };

    let mut data = Map::new();
    data.insert(vm.page_plural_count.clone(), Value::from(result.total));
    data.insert(vm.single_key("limit"), req.query.get("limit").cloned().unwrap_or(Value::Null));
    data.insert(
        vm.single_key("offset"),
        req.query.get("skip").filter(|v| truthy(Some(*v))).cloned().unwrap_or(number(win.skip)),
    );
    data.insert(vm.single_key("pages"), Value::from(result.total_pages));
    data.insert(vm.single_key("page_current"), number(page_current));
    data.insert(vm.single_key("page_next"), number(page_current + 1.0));
    data.insert(vm.single_key("page_prev"), page_prev);
    data.insert(vm.name_plural.clone(), documents);
    data.insert(vm.plural_key("total"), result.collection_count.map(Value::from).unwrap_or(Value::Null));
    data.insert(vm.plural_key("totalpages"), result.collection_pages.map(Value::from).unwrap_or(Value::Null));
    data
}

pub fn paginate(ctx: &ControllerContext, opts: &ControllerOptions) -> Result<Middleware, ConfigError> {
    let db = ctx.db_for(&opts.model_name)?;
    let vm = ctx.view_model(&opts.model_name);
    let ctx = ctx.clone();
    let opts = opts.clone();
    let name = format!("{}.paginate", opts.model_name);
    Ok(Middleware::new(&name, move |mut req: RequestContext| {
        let ctx = ctx.clone();
        let opts = opts.clone();
        let db = db.clone();
        let vm = vm.clone();
        async move {
            let filter = match Filter::from_json(&query_source(&req, &opts)) {
                Ok(f) => f,
                Err(err) => return ctx.fail(&req, err).await,
            };
            let fields = req
                .controller_data
                .get("model_fields")
                .cloned()
                .or_else(|| opts.fields.clone().filter(Value::is_object));
            let win = window(&req, db.limit(), db.pagelength());
            let search = SearchOptions {
                filter,
                fields,
                population: opts.population.clone(),
                skip: win.skip as u64,
                limit: win.fetch_limit(),
                pagelength: win.pagelength as u64,
                paginate: !(paginate_disabled(req.query.get("paginate"))
                    || paginate_disabled(req.controller_data.get("paginate"))),
                count: req.with_count,
                sort: req.query_str("sort").map(str::to_string),
            };
            tracing::debug!(model = %opts.model_name, skip = search.skip, limit = search.limit, "paginate");
            let result = match db.search(search).await {
                Ok(r) => r,
                Err(err) => return ctx.fail(&req, err).await,
            };
            let data = bundle(&mut req, &vm, &result, win, opts.concat_documents);
            req.locals.extend(data.clone());
            req.controller_data.insert(vm.name_plural.clone(), Value::Object(data.clone()));
            if json_request(&req) && opts.skip_json_post_transforms {
                let response = ctx
                    .protocol
                    .respond(
                        &req,
                        RespondOptions {
                            data: Value::Object(data),
                            skip_default_props: opts.skip_default_props,
                            ..Default::default()
                        },
                    )
                    .await;
                return Flow::Done(response);
            }
            Flow::Next(req)
        }
    }))
}
