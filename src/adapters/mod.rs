//! Protocol adapters: the response façade controllers call back into.
//!
//! A [`Protocol`] logs errors and warnings with request context, dispatches responses
//! (rendered or pre-rendered, JSON or JSONP), renders exception pages and issues redirects.
//! [`HttpAdapter`] is the built-in HTTP implementation; [`CustomAdapter`] is assembled from
//! caller-supplied functions and checked for shape by the [`AdapterRegistry`].

pub mod custom;
pub mod http;
pub mod registry;

pub use custom::CustomAdapter;
pub use http::{HttpAdapter, HttpProtocol};
pub use registry::{create, downcast, AdapterRegistry, AdapterSpec, ProtocolOptions};

use crate::context::RequestContext;
use crate::error::AppError;
use crate::responder::{RenderOptions, Rendered};
use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Options for [`Protocol::respond`].
#[derive(Debug, Default)]
pub struct RespondOptions {
    pub data: Value,
    /// Respond with the responder's error format (status 500) after logging it.
    pub err: Option<AppError>,
    /// Do not log `err`.
    pub ignore_error: bool,
    /// Pre-rendered body, sent as-is.
    pub responder_override: Option<Rendered>,
    pub render: RenderOptions,
    /// Do not attach request diagnostics to object data.
    pub skip_default_props: bool,
}

impl RespondOptions {
    pub fn data(data: Value) -> Self {
        RespondOptions {
            data,
            ..Default::default()
        }
    }

    pub fn rendered(body: Rendered) -> Self {
        RespondOptions {
            responder_override: Some(body),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait Protocol: Send + Sync + 'static {
    /// Log an error with the request's diagnostics. Never fails.
    fn error(&self, ctx: Option<&RequestContext>, err: &dyn fmt::Display);

    fn warn(&self, ctx: Option<&RequestContext>, message: &dyn fmt::Display);

    async fn respond(&self, ctx: &RequestContext, opts: RespondOptions) -> Response;

    /// Generic 500: JSON for XHR callers, an error page otherwise.
    async fn exception(&self, ctx: &RequestContext, err: Option<&AppError>) -> Response;

    /// Redirect to `ctx.redirect_path`, else `/{model_name}`.
    fn redirect(&self, ctx: &RequestContext, model_name: &str) -> Response;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// `ctx.redirect_path`, else `model_name` as an absolute path.
pub fn redirect_target(ctx: &RequestContext, model_name: &str) -> String {
    ctx.redirect_path
        .clone()
        .unwrap_or_else(|| format!("/{}", model_name.trim_start_matches('/')))
}
