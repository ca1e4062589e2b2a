//! Where browser callers go after a create, update or remove.

use crate::context::RequestContext;
use crate::db::document::id_string;
use crate::db::ID_FIELD;
use axum::http::header;
use serde_json::Value;

pub trait RedirectStrategy: Send + Sync {
    /// Redirect path for `model_name` after `doc` was written.
    fn path(&self, ctx: &RequestContext, model_name: &str, doc: Option<&Value>) -> String;
}

/// Back to the page the form was posted from, addressed by the document's name or id:
/// `Referer` relative to `Origin`, joined with `name` or `_id`. Falls back to `/data/{model}/`
/// when either header or the id is missing.
#[derive(Clone, Copy, Debug, Default)]
pub struct RefererRedirect;

impl RedirectStrategy for RefererRedirect {
    fn path(&self, ctx: &RequestContext, model_name: &str, doc: Option<&Value>) -> String {
        let origin = ctx.header_str("origin");
        let referer = ctx.header_str(header::REFERER.as_str());
        let id = doc.and_then(|d| d.get(ID_FIELD)).and_then(id_string);
        match (origin, referer, id) {
            (Some(origin), Some(referer), Some(id)) => {
                let base = referer
                    .strip_prefix(&format!("{}/", origin))
                    .unwrap_or(referer)
                    .trim_end_matches('/');
                let leaf = doc
                    .and_then(|d| d.get("name"))
                    .and_then(id_string)
                    .unwrap_or(id);
                if base.is_empty() {
                    leaf
                } else {
                    format!("{}/{}", base, leaf)
                }
            }
            _ => format!("/data/{}/", model_name),
        }
    }
}

/// Always `{prefix}/{model}/`, e.g. `/p-admin/example/`.
#[derive(Clone, Debug)]
pub struct PrefixRedirect {
    prefix: String,
}

impl PrefixRedirect {
    pub fn new(prefix: &str) -> Self {
        PrefixRedirect {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }
}

impl RedirectStrategy for PrefixRedirect {
    fn path(&self, _ctx: &RequestContext, model_name: &str, _doc: Option<&Value>) -> String {
        format!("{}/{}/", self.prefix, model_name)
    }
}
