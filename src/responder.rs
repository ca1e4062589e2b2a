//! Response formatting collaborators.
//!
//! A [`Responder`] turns response data into a body: [`JsonResponder`] wraps it in the
//! `{ result, data }` envelope, [`HtmlResponder`] renders a view through a [`ViewRenderer`].
//! [`TemplateDirRenderer`] is a small file-based view renderer with `{{ path }}` placeholders.

use crate::error::AppError;
use crate::response;
use async_trait::async_trait;
use regex::{Captures, Regex};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponderKind {
    Json,
    Html,
}

/// A formatted body, ready to send.
#[derive(Clone, Debug, PartialEq)]
pub enum Rendered {
    Html(String),
    Json(Value),
}

impl Rendered {
    pub fn into_value(self) -> Value {
        match self {
            Rendered::Html(s) => Value::String(s),
            Rendered::Json(v) => v,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
    /// View to render, e.g. "example/show".
    pub viewname: Option<String>,
    /// Template extension override, with leading dot.
    pub template_ext: Option<String>,
}

#[async_trait]
pub trait Responder: Send + Sync {
    fn kind(&self) -> ResponderKind;

    async fn render(&self, data: Value, opts: &RenderOptions) -> Result<Rendered, AppError>;

    /// Format an error message.
    async fn error(&self, message: &str, opts: &RenderOptions) -> Result<Rendered, AppError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonResponder;

#[async_trait]
impl Responder for JsonResponder {
    fn kind(&self) -> ResponderKind {
        ResponderKind::Json
    }

    async fn render(&self, data: Value, _opts: &RenderOptions) -> Result<Rendered, AppError> {
        Ok(Rendered::Json(serde_json::to_value(response::success(data))?))
    }

    async fn error(&self, message: &str, _opts: &RenderOptions) -> Result<Rendered, AppError> {
        Ok(Rendered::Json(serde_json::to_value(response::failure(message))?))
    }
}

/// Renders every response through a view. Errors use `error_view` with `{ message }`.
pub struct HtmlResponder {
    views: Arc<dyn ViewRenderer>,
    error_view: String,
}

impl HtmlResponder {
    pub fn new(views: Arc<dyn ViewRenderer>, error_view: &str) -> Self {
        HtmlResponder {
            views,
            error_view: error_view.to_string(),
        }
    }
}

#[async_trait]
impl Responder for HtmlResponder {
    fn kind(&self) -> ResponderKind {
        ResponderKind::Html
    }

    async fn render(&self, data: Value, opts: &RenderOptions) -> Result<Rendered, AppError> {
        let view = opts
            .viewname
            .as_deref()
            .ok_or_else(|| AppError::Render("no view name given".into()))?;
        let html = self.views.render(view, opts.template_ext.as_deref(), &data).await?;
        Ok(Rendered::Html(html))
    }

    async fn error(&self, message: &str, opts: &RenderOptions) -> Result<Rendered, AppError> {
        let data = serde_json::json!({ "message": message });
        let html = self
            .views
            .render(&self.error_view, opts.template_ext.as_deref(), &data)
            .await?;
        Ok(Rendered::Html(html))
    }
}

/// View-rendering collaborator.
#[async_trait]
pub trait ViewRenderer: Send + Sync {
    /// Render `view` (no extension) with `data`. `ext` overrides the default extension.
    async fn render(&self, view: &str, ext: Option<&str>, data: &Value) -> Result<String, AppError>;
}

/// Looks up `{dir}/{view}{ext}` in each directory in turn and fills `{{ dotted.path }}`
/// placeholders from the data. Strings are HTML-escaped; objects and arrays render as JSON.
pub struct TemplateDirRenderer {
    dirs: Vec<PathBuf>,
    ext: String,
}

impl TemplateDirRenderer {
    pub fn new(dirs: Vec<PathBuf>, ext: &str) -> Self {
        TemplateDirRenderer {
            dirs,
            ext: ext.to_string(),
        }
    }

    async fn find(&self, view: &str, ext: &str) -> Result<String, AppError> {
        let relative = format!("{}{}", view.trim_start_matches('/'), ext);
        for dir in &self.dirs {
            let path = dir.join(&relative);
            match tokio::fs::read_to_string(&path).await {
                Ok(source) => return Ok(source),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(AppError::Render(format!("{}: {}", path.display(), e))),
            }
        }
        Err(AppError::Render(format!("view not found: {}", relative)))
    }
}

fn placeholder() -> Result<&'static Regex, AppError> {
    static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([\w$.\-]+)\s*\}\}"))
        .as_ref()
        .map_err(|e| AppError::Render(format!("placeholder pattern: {}", e)))
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Fill `{{ path }}` placeholders in `source` from `data`.
pub fn fill_placeholders(source: &str, data: &Value) -> Result<String, AppError> {
    Ok(placeholder()?
        .replace_all(source, |caps: &Captures| {
            match crate::db::document::get_path(data, &caps[1]) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => escape_html(s),
                Some(v @ (Value::Object(_) | Value::Array(_))) => escape_html(&v.to_string()),
                Some(v) => v.to_string(),
            }
        })
        .into_owned())
}

#[async_trait]
impl ViewRenderer for TemplateDirRenderer {
    async fn render(&self, view: &str, ext: Option<&str>, data: &Value) -> Result<String, AppError> {
        let ext = ext.unwrap_or(&self.ext);
        let source = self.find(view, ext).await?;
        tracing::debug!(view, ext, "render view");
        fill_placeholders(&source, data)
    }
}
