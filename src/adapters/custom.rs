//! Protocol adapter assembled from caller-supplied functions.

use crate::adapters::{Protocol, RespondOptions};
use crate::context::RequestContext;
use crate::error::{AppError, ConfigError};
use crate::middleware::BoxFuture;
use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type LogFn = Arc<dyn Fn(Option<&RequestContext>, &str) + Send + Sync>;
type RespondFn = Arc<dyn Fn(RequestContext, RespondOptions) -> BoxFuture<Response> + Send + Sync>;
type ExceptionFn = Arc<dyn Fn(RequestContext, Option<String>) -> BoxFuture<Response> + Send + Sync>;
type RedirectFn = Arc<dyn Fn(&RequestContext, &str) -> Response + Send + Sync>;

/// Methods a custom adapter must supply.
pub const REQUIRED_METHODS: [&str; 5] = ["error", "warn", "respond", "exception", "redirect"];

/// A protocol built method by method. The registry rejects instances missing any of
/// [`REQUIRED_METHODS`].
#[derive(Clone, Default)]
pub struct CustomAdapter {
    name: String,
    error: Option<LogFn>,
    warn: Option<LogFn>,
    respond: Option<RespondFn>,
    exception: Option<ExceptionFn>,
    redirect: Option<RedirectFn>,
}

impl CustomAdapter {
    pub fn new(name: &str) -> Self {
        CustomAdapter {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&RequestContext>, &str) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(f));
        self
    }

    pub fn on_warn<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&RequestContext>, &str) + Send + Sync + 'static,
    {
        self.warn = Some(Arc::new(f));
        self
    }

    pub fn on_respond<F>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, RespondOptions) -> BoxFuture<Response> + Send + Sync + 'static,
    {
        self.respond = Some(Arc::new(f));
        self
    }

    /// `f` receives the error message, if any.
    pub fn on_exception<F>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, Option<String>) -> BoxFuture<Response> + Send + Sync + 'static,
    {
        self.exception = Some(Arc::new(f));
        self
    }

    pub fn on_redirect<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext, &str) -> Response + Send + Sync + 'static,
    {
        self.redirect = Some(Arc::new(f));
        self
    }

    /// Required methods not supplied, in [`REQUIRED_METHODS`] order.
    pub fn missing(&self) -> Vec<&'static str> {
        let present = [
            self.error.is_some(),
            self.warn.is_some(),
            self.respond.is_some(),
            self.exception.is_some(),
            self.redirect.is_some(),
        ];
        REQUIRED_METHODS
            .iter()
            .zip(present)
            .filter(|(_, ok)| !ok)
            .map(|(m, _)| *m)
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::InvalidAdapterShape {
                adapter: self.name.clone(),
                missing,
            })
        }
    }

    fn unsupported(&self, method: &str) -> Response {
        AppError::Collaborator(format!("adapter '{}' has no {} method", self.name, method)).into_response()
    }
}

impl fmt::Debug for CustomAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAdapter")
            .field("name", &self.name)
            .field("missing", &self.missing())
            .finish()
    }
}

#[async_trait]
impl Protocol for CustomAdapter {
    fn error(&self, ctx: Option<&RequestContext>, err: &dyn fmt::Display) {
        if let Some(f) = &self.error {
            f(ctx, &err.to_string());
        }
    }

    fn warn(&self, ctx: Option<&RequestContext>, message: &dyn fmt::Display) {
        if let Some(f) = &self.warn {
            f(ctx, &message.to_string());
        }
    }

    async fn respond(&self, ctx: &RequestContext, opts: RespondOptions) -> Response {
        match &self.respond {
            Some(f) => f(ctx.clone(), opts).await,
            None => self.unsupported("respond"),
        }
    }

    async fn exception(&self, ctx: &RequestContext, err: Option<&AppError>) -> Response {
        match &self.exception {
            Some(f) => f(ctx.clone(), err.map(|e| e.to_string())).await,
            None => self.unsupported("exception"),
        }
    }

    fn redirect(&self, ctx: &RequestContext, model_name: &str) -> Response {
        match &self.redirect {
            Some(f) => f(ctx, model_name),
            None => self.unsupported("redirect"),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
