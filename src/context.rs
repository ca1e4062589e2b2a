//! Request-scoped state shared by a middleware chain, and the axum extractor that builds it.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, FromRequest, FromRequestParts, OriginalUri, Path, Request},
    http::{header, HeaderMap, Method, Uri},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::net::SocketAddr;

/// Largest request body accepted by the extractor.
pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Identity of the signed-in user. Host auth layers insert it into request extensions.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Value);

/// Everything a middleware may read or mutate while a request moves down its chain.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Route parameters, e.g. `id` for `/examples/:id`.
    pub params: HashMap<String, String>,
    pub query: Map<String, Value>,
    pub body: Value,
    /// Data handed between middlewares (loaded documents, pagination bundles, query overrides).
    pub controller_data: Map<String, Value>,
    /// Values exposed to every rendered view.
    pub locals: Map<String, Value>,
    pub user: Option<Value>,
    pub remote_addr: Option<String>,
    /// Mount prefix when the router is nested.
    pub base_url: String,
    pub original_url: String,
    /// Explicit redirect target; wins over any computed path.
    pub redirect_path: Option<String>,
    /// Set by a revision hook so updates keep the previous version.
    pub save_revision: bool,
    pub depopulate: bool,
    /// Set by `load_with_count`: paginated searches also count the whole collection.
    pub with_count: bool,
}

impl RequestContext {
    /// Context for `method` on `uri`, with the query string already parsed.
    pub fn new(method: Method, uri: &str) -> Self {
        let uri: Uri = uri.parse().unwrap_or_default();
        let query = parse_query(uri.query());
        RequestContext {
            method,
            original_url: uri.to_string(),
            uri,
            query,
            body: Value::Object(Map::new()),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: header::HeaderName, value: &str) -> Self {
        if let Ok(v) = header::HeaderValue::from_str(value) {
            self.headers.insert(name, v);
        }
        self
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query_str(&self, key: &str) -> Option<&str> {
        self.query.get(key).and_then(Value::as_str)
    }

    /// Query value as a number, accepting numeric strings.
    pub fn query_number(&self, key: &str) -> Option<f64> {
        self.query.get(key).and_then(as_number)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// `X-Requested-With: XMLHttpRequest`.
    pub fn is_xhr(&self) -> bool {
        self.header_str("x-requested-with")
            .map(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
            .unwrap_or(false)
    }

    /// Declared body content type is JSON (`application/json`, `application/*+json`).
    pub fn is_json_body(&self) -> bool {
        self.header_str(header::CONTENT_TYPE.as_str())
            .map(|ct| ct.to_lowercase().contains("json"))
            .unwrap_or(false)
    }

    pub fn diagnostics(&self) -> RequestDiagnostics {
        RequestDiagnostics {
            query: Value::Object(self.query.clone()),
            params: self
                .params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
            baseurl: self.base_url.clone(),
            originalurl: self.original_url.clone(),
            x_forwarded_for: self.header_str("x-forwarded-for").map(str::to_string),
            remote_address: self.remote_addr.clone(),
            referer: self.header_str(header::REFERER.as_str()).map(str::to_string),
            header_host: self.header_str(header::HOST.as_str()).map(str::to_string),
        }
    }
}

/// Request details attached to JSON responses and view data.
#[derive(Clone, Debug, Serialize)]
pub struct RequestDiagnostics {
    pub query: Value,
    pub params: Map<String, Value>,
    pub baseurl: String,
    pub originalurl: String,
    #[serde(rename = "x-forwarded-for")]
    pub x_forwarded_for: Option<String>,
    #[serde(rename = "remoteAddress")]
    pub remote_address: Option<String>,
    pub referer: Option<String>,
    #[serde(rename = "headerHost")]
    pub header_host: Option<String>,
}

impl RequestDiagnostics {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Content negotiation: true when the client wants JSON.
/// `Accept` mentions json, the body is declared JSON, or `?format=json`.
pub fn json_request(ctx: &RequestContext) -> bool {
    let accept = ctx
        .header_str(header::ACCEPT.as_str())
        .or_else(|| ctx.header_str("accepts"));
    if accept.map(|a| a.contains("json")).unwrap_or(false) {
        return true;
    }
    ctx.is_json_body()
        || ctx
            .query_str("format")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
}

/// JS-style numeric coercion for query/body values: numbers and numeric strings.
pub fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                t.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
        _ => None,
    }
}

/// Truthiness of a request or document flag: false for missing, null, false, 0, "", "0" and "false".
pub fn truthy(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !matches!(s.as_str(), "" | "0" | "false"),
        Some(_) => true,
    }
}

/// Parse a query string into string values. Repeated keys keep the last value.
pub fn parse_query(query: Option<&str>) -> Map<String, Value> {
    let mut out = Map::new();
    if let Some(q) = query {
        for (k, v) in url::form_urlencoded::parse(q.as_bytes()) {
            out.insert(k.into_owned(), Value::String(v.into_owned()));
        }
    }
    out
}

/// Form keys with brackets nest: `updatedoc[contact][first_name]=x` becomes
/// `{"updatedoc":{"contact":{"first_name":"x"}}}`, `tags[]=a&tags[]=b` an array.
fn insert_form_field(out: &mut Map<String, Value>, key: &str, value: Value) {
    let (head, rest) = match key.find('[') {
        Some(i) if key.ends_with(']') => (&key[..i], &key[i + 1..key.len() - 1]),
        _ => {
            out.insert(key.to_string(), value);
            return;
        }
    };
    let segments: Vec<&str> = rest.split("][").collect();
    let mut slot = out.entry(head.to_string()).or_insert(Value::Null);
    for (i, seg) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        if seg.is_empty() {
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                if last {
                    items.push(value);
                    return;
                }
                items.push(Value::Object(Map::new()));
                let end = items.len() - 1;
                slot = &mut items[end];
            }
            continue;
        }
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(map) = slot {
            if last {
                map.insert(seg.to_string(), value);
                return;
            }
            slot = map.entry(seg.to_string()).or_insert(Value::Null);
        }
    }
}

fn parse_body(headers: &HeaderMap, bytes: &Bytes) -> Result<Value, AppError> {
    if bytes.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    if content_type.starts_with("application/x-www-form-urlencoded") {
        let mut out = Map::new();
        for (k, v) in url::form_urlencoded::parse(bytes) {
            insert_form_field(&mut out, &k, Value::String(v.into_owned()));
        }
        return Ok(Value::Object(out));
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(v) => Ok(v),
        Err(e) if content_type.contains("json") => Err(AppError::BadRequest(format!("invalid JSON body: {}", e))),
        Err(_) => Ok(Value::Object(Map::new())),
    }
}

#[async_trait]
impl<S> FromRequest<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let params = Path::<HashMap<String, String>>::from_request_parts(&mut parts, state)
            .await
            .map(|Path(p)| p)
            .unwrap_or_default();
        let original = parts
            .extensions
            .get::<OriginalUri>()
            .map(|o| o.0.clone())
            .unwrap_or_else(|| parts.uri.clone());
        let base_url = original
            .path()
            .strip_suffix(parts.uri.path())
            .unwrap_or("")
            .to_string();
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());
        let user = parts.extensions.get::<CurrentUser>().map(|u| u.0.clone());
        let bytes = axum::body::to_bytes(body, BODY_LIMIT)
            .await
            .map_err(|e| AppError::BadRequest(format!("request body: {}", e)))?;
        let body = parse_body(&parts.headers, &bytes)?;

        Ok(RequestContext {
            query: parse_query(parts.uri.query()),
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            params,
            body,
            user,
            remote_addr,
            base_url,
            original_url: original.to_string(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_query_selects_json() {
        let ctx = RequestContext::new(Method::GET, "/examples?format=json");
        assert!(json_request(&ctx));
        let ctx = RequestContext::new(Method::GET, "/examples?format=JSON");
        assert!(json_request(&ctx));
    }

    #[test]
    fn html_accept_is_not_json() {
        let ctx = RequestContext::new(Method::GET, "/examples").with_header(header::ACCEPT, "text/html");
        assert!(!json_request(&ctx));
    }

    #[test]
    fn json_accept_or_content_type_is_json() {
        let ctx = RequestContext::new(Method::GET, "/examples").with_header(header::ACCEPT, "application/json");
        assert!(json_request(&ctx));
        let ctx = RequestContext::new(Method::POST, "/examples")
            .with_header(header::CONTENT_TYPE, "application/json; charset=utf-8");
        assert!(json_request(&ctx));
    }

    #[test]
    fn numbers_coerce_like_query_strings() {
        assert_eq!(as_number(&Value::String(" 5 ".into())), Some(5.0));
        assert_eq!(as_number(&serde_json::json!(2)), Some(2.0));
        assert_eq!(as_number(&Value::String("five".into())), None);
        assert_eq!(as_number(&Value::String(String::new())), None);
        assert_eq!(as_number(&Value::Bool(true)), None);
    }

    #[test]
    fn diagnostics_carry_headers() {
        let ctx = RequestContext::new(Method::GET, "/examples?limit=2")
            .with_header(header::REFERER, "http://localhost/admin")
            .with_header(header::HOST, "localhost")
            .with_header(header::HeaderName::from_static("x-forwarded-for"), "10.0.0.1");
        let d = ctx.diagnostics().to_value();
        assert_eq!(d["referer"], "http://localhost/admin");
        assert_eq!(d["headerHost"], "localhost");
        assert_eq!(d["x-forwarded-for"], "10.0.0.1");
        assert_eq!(d["query"]["limit"], "2");
    }

    #[test]
    fn form_bodies_parse_to_objects() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let body = parse_body(&headers, &Bytes::from_static(b"title=Hello+World&x=1")).unwrap();
        assert_eq!(body["title"], "Hello World");

        let body = parse_body(
            &headers,
            &Bytes::from_static(b"updatedoc%5Bcontact%5D%5Bfirst_name%5D=Ada&updatedoc%5Bcontact%5D%5Blast_name%5D=L&tags%5B%5D=a&tags%5B%5D=b"),
        )
        .unwrap();
        assert_eq!(body["updatedoc"]["contact"]["first_name"], "Ada");
        assert_eq!(body["updatedoc"]["contact"]["last_name"], "L");
        assert_eq!(body["tags"], serde_json::json!(["a", "b"]));
    }
}
