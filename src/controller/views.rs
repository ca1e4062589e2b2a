//! View middlewares: `new`, `show`, `edit`, `index`, `search`.
//!
//! Each builds view data from the request (controller data, request diagnostics, locals and a
//! verb-specific transform) and either hands it to the protocol responder or renders the view
//! itself and sends the result as a pre-rendered body.

use crate::adapters::RespondOptions;
use crate::context::{json_request, RequestContext};
use crate::controller::{ControllerContext, ControllerOptions};
use crate::inflect::{pluralize, ViewModel};
use crate::middleware::{Flow, Middleware};
use crate::responder::{RenderOptions, Rendered, ResponderKind};
use serde_json::{json, Map, Value};
use std::sync::Arc;

type Transform = dyn Fn(&RequestContext) -> Map<String, Value> + Send + Sync;

/// `{folder}/{basename}`, where the folder is the model name or its plural.
fn view_name(opts: &ControllerOptions, basename: &str) -> String {
    match &opts.viewname {
        Some(v) => v.clone(),
        None => {
            let folder = if opts.use_plural_view_names {
                pluralize(&opts.model_name)
            } else {
                opts.model_name.clone()
            };
            format!("{}/{}", folder, basename)
        }
    }
}

fn user(req: &RequestContext) -> Value {
    req.user.clone().unwrap_or(Value::Null)
}

/// View data in merge order: controller data, `{ request }`, locals, the verb's transform.
fn view_data(req: &RequestContext, transform: &Transform) -> Value {
    let mut data = req.controller_data.clone();
    data.insert("request".into(), req.diagnostics().to_value());
    data.extend(req.locals.clone());
    data.extend(transform(req));
    Value::Object(data)
}

fn compose(ctx: &ControllerContext, opts: &ControllerOptions, basename: &'static str, transform: Arc<Transform>) -> Middleware {
    let ctx = ctx.clone();
    let render = RenderOptions {
        viewname: Some(view_name(opts, basename)),
        template_ext: opts.template_ext.clone().or_else(|| Some(ctx.config.template_ext.clone())),
    };
    let direct = ctx.responder_kind == ResponderKind::Html || opts.strict;
    let skip_default_props = opts.skip_default_props;
    let name = format!("{}.{}", opts.model_name, basename);
    Middleware::new(&name, move |req: RequestContext| {
        let ctx = ctx.clone();
        let render = render.clone();
        let transform = transform.clone();
        async move {
            let data = view_data(&req, transform.as_ref());
            if direct {
                let response = ctx
                    .protocol
                    .respond(
                        &req,
                        RespondOptions {
                            data,
                            render,
                            skip_default_props,
                            ..Default::default()
                        },
                    )
                    .await;
                return Flow::Done(response);
            }
            let view = render.viewname.as_deref().unwrap_or_default();
            match ctx.views.render(view, render.template_ext.as_deref(), &data).await {
                Ok(html) => Flow::Done(
                    ctx.protocol
                        .respond(&req, RespondOptions::rendered(Rendered::Html(html)))
                        .await,
                ),
                Err(err) => ctx.fail(&req, err).await,
            }
        }
    })
}

/// For JSON callers, respond with `controller_data[key]` instead of rendering.
fn json_shortcut(ctx: &ControllerContext, opts: &ControllerOptions, key: String, composed: Middleware) -> Middleware {
    let ctx = ctx.clone();
    let skip_default_props = opts.skip_default_props;
    let name = composed.name().to_string();
    Middleware::new(&name, move |req: RequestContext| {
        let ctx = ctx.clone();
        let composed = composed.clone();
        let key = key.clone();
        async move {
            if !json_request(&req) {
                return composed.call(req).await;
            }
            let data = req.controller_data.get(&key).cloned().unwrap_or(Value::Null);
            let response = ctx
                .protocol
                .respond(
                    &req,
                    RespondOptions {
                        data,
                        skip_default_props,
                        ..Default::default()
                    },
                )
                .await;
            Flow::Done(response)
        }
    })
}

pub fn new(ctx: &ControllerContext, opts: &ControllerOptions) -> Middleware {
    let title = format!("New {}", opts.model_name);
    compose(
        ctx,
        opts,
        "new",
        Arc::new(move |req: &RequestContext| {
            let mut out = Map::new();
            out.insert("pagedata".into(), json!({ "title": title }));
            out.insert("user".into(), user(req));
            out
        }),
    )
}

/// Loaded document under `data`, titled by its `title`.
fn single_document(model_name: String) -> Arc<Transform> {
    Arc::new(move |req: &RequestContext| {
        let doc = req.controller_data.get(&model_name).cloned().unwrap_or(Value::Null);
        let mut out = Map::new();
        out.insert("pagedata".into(), json!({ "title": doc.get("title").cloned().unwrap_or(Value::Null) }));
        out.insert("data".into(), doc);
        out.insert("user".into(), user(req));
        out
    })
}

pub fn show(ctx: &ControllerContext, opts: &ControllerOptions) -> Middleware {
    let composed = compose(ctx, opts, "show", single_document(opts.model_name.clone()));
    json_shortcut(ctx, opts, opts.model_name.clone(), composed)
}

pub fn edit(ctx: &ControllerContext, opts: &ControllerOptions) -> Middleware {
    compose(ctx, opts, "edit", single_document(opts.model_name.clone()))
}

/// Collection data for index/search views: the paginated bundle, its count and the page count.
fn collection(vm: Arc<ViewModel>, title: String) -> Arc<Transform> {
    Arc::new(move |req: &RequestContext| {
        let count = req
            .controller_data
            .get(&vm.page_plural_count)
            .or_else(|| req.locals.get(&vm.page_plural_count))
            .cloned()
            .unwrap_or(Value::Null);
        let pages = match (count.as_f64(), req.query_number("limit")) {
            (Some(c), Some(l)) if l > 0.0 => super::number((c / l).ceil()),
            _ => Value::Null,
        };
        let mut out = Map::new();
        out.insert("pagedata".into(), json!({ "title": title }));
        out.insert("user".into(), user(req));
        out.insert(
            vm.name_plural.clone(),
            req.controller_data.get(&vm.name_plural).cloned().unwrap_or(Value::Null),
        );
        out.insert(vm.page_plural_count.clone(), count);
        out.insert(vm.page_pages.clone(), pages);
        out
    })
}

pub fn index(ctx: &ControllerContext, opts: &ControllerOptions) -> Middleware {
    let vm = ctx.view_model(&opts.model_name);
    let composed = compose(ctx, opts, "index", collection(vm.clone(), vm.page_plural_title.clone()));
    json_shortcut(ctx, opts, vm.name_plural.clone(), composed)
}

pub fn search(ctx: &ControllerContext, opts: &ControllerOptions) -> Middleware {
    let vm = ctx.view_model(&opts.model_name);
    let title = format!("{} search results", vm.page_plural_title);
    compose(ctx, opts, "search", collection(vm, title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::context;
    use crate::db::MemoryStore;
    use crate::error::AppError;
    use async_trait::async_trait;
    use axum::http::{header, Method, StatusCode};

    struct EchoViews;

    #[async_trait]
    impl crate::responder::ViewRenderer for EchoViews {
        async fn render(&self, view: &str, ext: Option<&str>, data: &Value) -> Result<String, AppError> {
            if view.ends_with("broken") {
                return Err(AppError::Render("boom".into()));
            }
            Ok(format!("{}{}|{}", view, ext.unwrap_or(""), data["pagedata"]["title"].as_str().unwrap_or("")))
        }
    }

    #[test]
    fn view_names() {
        let mut opts = ControllerOptions::new("person");
        assert_eq!(view_name(&opts, "index"), "person/index");
        opts.use_plural_view_names = true;
        assert_eq!(view_name(&opts, "index"), "people/index");
        opts.viewname = Some("custom/list".into());
        assert_eq!(view_name(&opts, "index"), "custom/list");
    }

    #[tokio::test]
    async fn renders_view_and_sends_it_verbatim() {
        let (mut ctx, recorder) = context(Arc::new(MemoryStore::new()));
        ctx.views = Arc::new(EchoViews);
        let mw = new(&ctx, &ControllerOptions::new("example"));
        let flow = mw.call(RequestContext::new(Method::GET, "/examples/new")).await;
        assert!(matches!(flow, Flow::Done(_)));
        let sent = recorder.responded.lock().unwrap().clone();
        assert_eq!(sent, vec![Value::String("example/new.html|New example".into())]);
    }

    #[tokio::test]
    async fn strict_responds_with_data() {
        let (ctx, recorder) = context(Arc::new(MemoryStore::new()));
        let mut opts = ControllerOptions::new("example");
        opts.strict = true;
        let mut req = RequestContext::new(Method::GET, "/examples/1/edit");
        req.controller_data.insert("example".into(), json!({ "_id": "1", "title": "First" }));
        edit(&ctx, &opts).call(req).await;
        let sent = recorder.responded.lock().unwrap().clone();
        assert_eq!(sent[0]["pagedata"]["title"], "First");
        assert_eq!(sent[0]["data"]["_id"], "1");
        assert!(sent[0].get("request").is_some());
    }

    #[tokio::test]
    async fn show_answers_json_callers_with_the_document() {
        let (ctx, recorder) = context(Arc::new(MemoryStore::new()));
        let mut req = RequestContext::new(Method::GET, "/examples/1").with_header(header::ACCEPT, "application/json");
        req.controller_data.insert("example".into(), json!({ "_id": "1" }));
        show(&ctx, &ControllerOptions::new("example")).call(req).await;
        assert_eq!(recorder.responded.lock().unwrap()[0], json!({ "_id": "1" }));
    }

    #[tokio::test]
    async fn search_title_and_render_failure() {
        let (mut ctx, recorder) = context(Arc::new(MemoryStore::new()));
        ctx.views = Arc::new(EchoViews);
        let mw = search(&ctx, &ControllerOptions::new("example"));
        mw.call(RequestContext::new(Method::GET, "/examples/search")).await;
        assert_eq!(
            recorder.responded.lock().unwrap()[0],
            Value::String("example/search.html|Examples search results".into())
        );

        let mut opts = ControllerOptions::new("example");
        opts.viewname = Some("example/broken".into());
        let flow = search(&ctx, &opts).call(RequestContext::new(Method::GET, "/examples/search")).await;
        match flow {
            Flow::Done(res) => assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(recorder.errors.lock().unwrap().len(), 1);
    }
}
