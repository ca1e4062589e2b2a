//! HTTP protocol adapter.
//!
//! [`HttpProtocol`] is the response façade: logging with request diagnostics, content
//! dispatch (pre-rendered, JSON, JSONP, HTML), exception pages and redirects.
//! [`HttpAdapter`] owns a protocol plus the API adapter and tracks the controllers and
//! routes produced by successive `implement` calls.

use crate::adapters::registry::ProtocolOptions;
use crate::adapters::{redirect_target, Protocol, RespondOptions};
use crate::api::{api_adapter, ApiAdapter, ImplementOptions, RouterChoice};
use crate::config::ProtocolConfig;
use crate::context::RequestContext;
use crate::controller::{default_redirects, Controller, ControllerContext, ControllerOptions};
use crate::error::{AppError, ConfigError};
use crate::inflect::InflectionCache;
use crate::responder::{escape_html, JsonResponder, Rendered, Responder, TemplateDirRenderer, ViewRenderer};
use crate::response;
use crate::routes::RouteTable;
use async_trait::async_trait;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shown when neither a configured message nor an error is available.
pub const DEFAULT_EXCEPTION_MESSAGE: &str = "something blew up!";

/// Keep only identifier-ish characters of a JSONP callback name.
fn sanitize_callback(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']'))
        .collect()
}

fn fallback_error_page(message: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>Error</title></head><body><h1>Error</h1><p>{}</p></body></html>",
        escape_html(message)
    )
}

pub struct HttpProtocol {
    responder: Arc<dyn Responder>,
    views: Arc<dyn ViewRenderer>,
    config: Arc<ProtocolConfig>,
}

impl HttpProtocol {
    pub fn new(responder: Arc<dyn Responder>, views: Arc<dyn ViewRenderer>, config: Arc<ProtocolConfig>) -> Self {
        HttpProtocol {
            responder,
            views,
            config,
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn responder(&self) -> &Arc<dyn Responder> {
        &self.responder
    }

    /// Attach `request` diagnostics to object data unless told not to.
    fn decorate(ctx: &RequestContext, data: Value, skip_default_props: bool) -> Value {
        match data {
            Value::Object(mut map) if !skip_default_props => {
                map.insert("request".into(), ctx.diagnostics().to_value());
                Value::Object(map)
            }
            other => other,
        }
    }

    /// The formatted body `respond` would send, without sending it.
    pub async fn response_data(&self, ctx: &RequestContext, opts: RespondOptions) -> Result<Value, AppError> {
        if let Some(body) = opts.responder_override {
            return Ok(body.into_value());
        }
        let rendered = match &opts.err {
            Some(err) => self.responder.error(&err.to_string(), &opts.render).await?,
            None => {
                let data = Self::decorate(ctx, opts.data, opts.skip_default_props);
                self.responder.render(data, &opts.render).await?
            }
        };
        Ok(rendered.into_value())
    }

    fn send(ctx: &RequestContext, body: Rendered, status: StatusCode) -> Response {
        match body {
            Rendered::Html(html) => (status, Html(html)).into_response(),
            Rendered::Json(value) => {
                let callback = ctx.query_str("callback").map(sanitize_callback).filter(|c| !c.is_empty());
                match callback {
                    Some(cb) => {
                        let script = format!("/**/ typeof {cb} === 'function' && {cb}({});", value);
                        (status, [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], script).into_response()
                    }
                    None => (status, Json(value)).into_response(),
                }
            }
        }
    }

    fn log(&self, level: tracing::Level, ctx: Option<&RequestContext>, message: &dyn fmt::Display) {
        let Some(ctx) = ctx else {
            if level == tracing::Level::ERROR {
                tracing::error!(error = %message, "protocol error");
            } else {
                tracing::warn!(detail = %message, "protocol warning");
            }
            return;
        };
        let d = ctx.diagnostics();
        let user = ctx.user.as_ref().map(|u| u.to_string());
        if level == tracing::Level::ERROR {
            tracing::error!(
                method = %ctx.method,
                path = %ctx.uri.path(),
                x_forwarded_for = ?d.x_forwarded_for,
                remote_address = ?d.remote_address,
                referer = ?d.referer,
                host = ?d.header_host,
                user = ?user,
                error = %message,
                "request error"
            );
        } else {
            tracing::warn!(
                method = %ctx.method,
                path = %ctx.uri.path(),
                x_forwarded_for = ?d.x_forwarded_for,
                remote_address = ?d.remote_address,
                referer = ?d.referer,
                host = ?d.header_host,
                user = ?user,
                detail = %message,
                "request warning"
            );
        }
    }
}

#[async_trait]
impl Protocol for HttpProtocol {
    fn error(&self, ctx: Option<&RequestContext>, err: &dyn fmt::Display) {
        self.log(tracing::Level::ERROR, ctx, err);
    }

    fn warn(&self, ctx: Option<&RequestContext>, message: &dyn fmt::Display) {
        self.log(tracing::Level::WARN, ctx, message);
    }

    async fn respond(&self, ctx: &RequestContext, opts: RespondOptions) -> Response {
        if let (Some(err), false) = (&opts.err, opts.ignore_error) {
            self.error(Some(ctx), err);
        }
        if let Some(body) = opts.responder_override {
            return Self::send(ctx, body, StatusCode::OK);
        }
        let status = if opts.err.is_some() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        };
        let rendered = match &opts.err {
            Some(err) => self.responder.error(&err.to_string(), &opts.render).await,
            None => {
                let data = Self::decorate(ctx, opts.data, opts.skip_default_props);
                self.responder.render(data, &opts.render).await
            }
        };
        match rendered {
            Ok(body) => Self::send(ctx, body, status),
            Err(err) => {
                self.error(Some(ctx), &err);
                self.exception(ctx, Some(&err)).await
            }
        }
    }

    async fn exception(&self, ctx: &RequestContext, err: Option<&AppError>) -> Response {
        let message = self
            .config
            .exception_message
            .clone()
            .or_else(|| err.map(|e| e.to_string()))
            .unwrap_or_else(|| DEFAULT_EXCEPTION_MESSAGE.to_string());
        if ctx.is_xhr() {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(response::failure(message))).into_response();
        }
        let page = match self
            .views
            .render(&self.config.error_view, None, &json!({ "message": message }))
            .await
        {
            Ok(html) => html,
            Err(render_err) => {
                self.warn(Some(ctx), &render_err);
                fallback_error_page(&message)
            }
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Html(page)).into_response()
    }

    fn redirect(&self, ctx: &RequestContext, model_name: &str) -> Response {
        (StatusCode::FOUND, [(header::LOCATION, redirect_target(ctx, model_name))]).into_response()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[derive(Default)]
struct Registered {
    controllers: BTreeMap<String, Controller>,
    routes: RouteTable,
}

/// HTTP protocol adapter with its API adapter and everything implemented so far.
pub struct HttpAdapter {
    protocol: Arc<HttpProtocol>,
    context: ControllerContext,
    api: Box<dyn ApiAdapter>,
    registered: Mutex<Registered>,
}

impl HttpAdapter {
    /// Build the adapter. Missing collaborators default to a JSON responder, views from
    /// `config.view_dirs`, the configured redirect strategy and the "rest" API.
    pub fn new(opts: ProtocolOptions) -> Result<Self, ConfigError> {
        let config = Arc::new(opts.config);
        let views: Arc<dyn ViewRenderer> = match opts.views {
            Some(v) => v,
            None => Arc::new(TemplateDirRenderer::new(config.view_dirs.clone(), &config.template_ext)),
        };
        let responder: Arc<dyn Responder> = opts.responder.unwrap_or_else(|| Arc::new(JsonResponder));
        let protocol = Arc::new(HttpProtocol::new(responder.clone(), views.clone(), config.clone()));
        let context = ControllerContext {
            protocol: protocol.clone(),
            db: opts.db,
            responder_kind: responder.kind(),
            views,
            inflections: Arc::new(InflectionCache::new(config.inflection_cache_capacity)),
            redirects: opts.redirects.unwrap_or_else(|| default_redirects(&config)),
            config,
            save_revision: opts.save_revision,
        };
        let api = api_adapter(opts.api.as_deref().unwrap_or("rest"), context.clone())?;
        tracing::debug!(api = api.name(), models = ?context.db.models(), "http adapter ready");
        Ok(HttpAdapter {
            protocol,
            context,
            api,
            registered: Mutex::new(Registered::default()),
        })
    }

    fn registered(&self) -> MutexGuard<'_, Registered> {
        self.registered.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Build the model's controller through the API adapter and record it. Routed
    /// implementations also add their routes to the adapter's table, replacing any
    /// earlier routes at the same method and path.
    pub fn implement(&self, opts: ImplementOptions) -> Result<Controller, ConfigError> {
        if opts.controller.model_name.is_empty() {
            return Err(ConfigError::MissingModelName);
        }
        let model_name = opts.controller.model_name.clone();
        let controller = self.api.implement(opts)?;
        let mut registered = self.registered();
        if let Some(routes) = &controller.router {
            registered.routes.merge(routes.clone());
        }
        registered.controllers.insert(model_name.clone(), controller.clone());
        tracing::info!(model = %model_name, routed = controller.router.is_some(), "implemented");
        Ok(controller)
    }

    /// Implement every model with a registered store, in name order.
    pub fn implement_all(&self) -> Result<Vec<Controller>, ConfigError> {
        self.context
            .db
            .models()
            .iter()
            .map(|model| self.implement(ImplementOptions::new(model)))
            .collect()
    }

    /// Shorthand for a default routed implementation of `model_name`.
    pub fn implement_model(&self, model_name: &str) -> Result<Controller, ConfigError> {
        self.implement(ImplementOptions {
            controller: ControllerOptions::new(model_name),
            router: RouterChoice::Create,
            ..Default::default()
        })
    }

    pub fn routes(&self) -> RouteTable {
        self.registered().routes.clone()
    }

    /// axum router over every route implemented so far.
    pub fn router(&self) -> Router {
        self.routes().into_router()
    }

    pub fn controller(&self, model_name: &str) -> Option<Controller> {
        self.registered().controllers.get(model_name).cloned()
    }

    pub fn controllers(&self) -> Vec<String> {
        self.registered().controllers.keys().cloned().collect()
    }

    pub fn api(&self) -> &dyn ApiAdapter {
        self.api.as_ref()
    }

    pub fn protocol(&self) -> Arc<HttpProtocol> {
        self.protocol.clone()
    }

    /// Context the generated middlewares close over.
    pub fn context(&self) -> &ControllerContext {
        &self.context
    }

    pub async fn response_data(&self, ctx: &RequestContext, opts: RespondOptions) -> Result<Value, AppError> {
        self.protocol.response_data(ctx, opts).await
    }
}

#[async_trait]
impl Protocol for HttpAdapter {
    fn error(&self, ctx: Option<&RequestContext>, err: &dyn fmt::Display) {
        self.protocol.error(ctx, err);
    }

    fn warn(&self, ctx: Option<&RequestContext>, message: &dyn fmt::Display) {
        self.protocol.warn(ctx, message);
    }

    async fn respond(&self, ctx: &RequestContext, opts: RespondOptions) -> Response {
        self.protocol.respond(ctx, opts).await
    }

    async fn exception(&self, ctx: &RequestContext, err: Option<&AppError>) -> Response {
        self.protocol.exception(ctx, err).await
    }

    fn redirect(&self, ctx: &RequestContext, model_name: &str) -> Response {
        self.protocol.redirect(ctx, model_name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbRegistry, MemoryStore};
    use axum::body::to_bytes;
    use axum::http::{HeaderName, Method};

    fn protocol(config: ProtocolConfig) -> HttpProtocol {
        let views = Arc::new(TemplateDirRenderer::new(vec![], ".html"));
        HttpProtocol::new(Arc::new(JsonResponder), views, Arc::new(config))
    }

    async fn body_string(res: Response) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn callback_names_are_sanitized() {
        assert_eq!(sanitize_callback("cb"), "cb");
        assert_eq!(sanitize_callback("jQuery.fn[0]"), "jQuery.fn[0]");
        assert_eq!(sanitize_callback("alert(1);//"), "alert1");
    }

    #[tokio::test]
    async fn respond_wraps_data_with_request() {
        let p = protocol(ProtocolConfig::default());
        let req = RequestContext::new(Method::GET, "/examples?x=1");
        let res = p.respond(&req, RespondOptions::data(json!({ "a": 1 }))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let v: Value = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(v["result"], "success");
        assert_eq!(v["data"]["a"], 1);
        assert_eq!(v["data"]["request"]["query"]["x"], "1");
    }

    #[tokio::test]
    async fn error_option_uses_error_format() {
        let p = protocol(ProtocolConfig::default());
        let req = RequestContext::new(Method::GET, "/examples");
        let res = p
            .respond(
                &req,
                RespondOptions {
                    err: Some(AppError::Validation("bad title".into())),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v: Value = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(v, json!({ "result": "error", "data": { "error": "validation: bad title" } }));
    }

    #[tokio::test]
    async fn jsonp_wraps_json() {
        let p = protocol(ProtocolConfig::default());
        let req = RequestContext::new(Method::GET, "/examples?callback=handle");
        let res = p
            .respond(
                &req,
                RespondOptions {
                    data: json!({ "a": 1 }),
                    skip_default_props: true,
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(res.headers()[header::CONTENT_TYPE], "text/javascript; charset=utf-8");
        let body = body_string(res).await;
        let inner = body
            .strip_prefix("/**/ typeof handle === 'function' && handle(")
            .and_then(|b| b.strip_suffix(");"))
            .unwrap();
        let v: Value = serde_json::from_str(inner).unwrap();
        assert_eq!(v, json!({ "result": "success", "data": { "a": 1 } }));
    }

    #[tokio::test]
    async fn exception_redacts_and_answers_xhr_with_json() {
        let mut config = ProtocolConfig::default();
        config.exception_message = Some("Hello World".into());
        let p = protocol(config);
        let req = RequestContext::new(Method::GET, "/examples")
            .with_header(HeaderName::from_static("x-requested-with"), "XMLHttpRequest");
        let res = p.exception(&req, Some(&AppError::Render("secret path".into()))).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v: Value = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(v["data"]["error"], "Hello World");
    }

    #[tokio::test]
    async fn exception_falls_back_to_builtin_page() {
        let p = protocol(ProtocolConfig::default());
        let res = p.exception(&RequestContext::new(Method::GET, "/examples"), None).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(res).await.contains(DEFAULT_EXCEPTION_MESSAGE));
    }

    #[tokio::test]
    async fn redirect_prefers_request_path() {
        let p = protocol(ProtocolConfig::default());
        let mut req = RequestContext::new(Method::POST, "/examples");
        let res = p.redirect(&req, "example");
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "/example");
        req.redirect_path = Some("/somewhere".into());
        assert_eq!(p.redirect(&req, "example").headers()[header::LOCATION], "/somewhere");
    }

    #[test]
    fn implement_rejects_empty_model_and_tracks_controllers() {
        let opts = ProtocolOptions {
            db: DbRegistry::new()
                .with("example", Arc::new(MemoryStore::new()))
                .with("person", Arc::new(MemoryStore::new())),
            ..Default::default()
        };
        let adapter = HttpAdapter::new(opts).unwrap();
        let err = adapter.implement(ImplementOptions::new("")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingModelName));

        let all = adapter.implement_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(adapter.controllers(), vec!["example".to_string(), "person".to_string()]);
        assert_eq!(adapter.routes().len(), 14);
        assert!(adapter.routes().get(&Method::GET, "/people/:id").is_some());

        adapter.implement_model("example").unwrap();
        assert_eq!(adapter.routes().len(), 14);
    }

    #[test]
    fn disabled_router_builds_middlewares_only() {
        let opts = ProtocolOptions {
            db: DbRegistry::new().with("example", Arc::new(MemoryStore::new())),
            ..Default::default()
        };
        let adapter = HttpAdapter::new(opts).unwrap();
        let mut implement = ImplementOptions::new("example");
        implement.router = RouterChoice::Disabled;
        let controller = adapter.implement(implement).unwrap();
        assert!(controller.router.is_none());
        assert!(adapter.routes().is_empty());
        assert!(adapter.controller("example").is_some());
    }
}
