//! Store-independent query model. Built from request JSON (`{"contact.first_name": "Hello"}`,
//! `$or`/`$and` arrays, `{"$regex": "..."}` values) or from a CLI search string.

use crate::db::document::get_path;
use crate::error::AppError;
use regex::{Regex, RegexBuilder};
use serde_json::Value;

#[derive(Clone, Debug, Default)]
pub enum Filter {
    #[default]
    All,
    /// Dotted path equals value.
    Eq { path: String, value: Value },
    /// Dotted path is a string matching the case-insensitive pattern.
    Matches { path: String, pattern: Regex },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: &str, value: impl Into<Value>) -> Self {
        Filter::Eq {
            path: path.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(path: &str, pattern: &str) -> Result<Self, AppError> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| AppError::BadRequest(format!("invalid pattern for {}: {}", path, e)))?;
        Ok(Filter::Matches {
            path: path.to_string(),
            pattern,
        })
    }

    /// Parse a request query document. Strings are parsed as JSON first; null and `{}` match everything.
    pub fn from_json(v: &Value) -> Result<Self, AppError> {
        match v {
            Value::Null => Ok(Filter::All),
            Value::String(s) if s.trim().is_empty() => Ok(Filter::All),
            Value::String(s) => {
                let parsed: Value = serde_json::from_str(s)
                    .map_err(|e| AppError::BadRequest(format!("query must be a JSON object: {}", e)))?;
                Filter::from_json(&parsed)
            }
            Value::Object(map) => {
                let mut parts = Vec::with_capacity(map.len());
                for (key, value) in map {
                    parts.push(match key.as_str() {
                        "$or" => Filter::Or(Self::list(key, value)?),
                        "$and" => Filter::And(Self::list(key, value)?),
                        _ => Self::field(key, value)?,
                    });
                }
                Ok(match parts.len() {
                    0 => Filter::All,
                    1 => parts.remove(0),
                    _ => Filter::And(parts),
                })
            }
            _ => Err(AppError::BadRequest("query must be a JSON object".into())),
        }
    }

    fn list(key: &str, value: &Value) -> Result<Vec<Filter>, AppError> {
        match value {
            Value::Array(items) => items.iter().map(Filter::from_json).collect(),
            _ => Err(AppError::BadRequest(format!("{} expects an array", key))),
        }
    }

    fn field(path: &str, value: &Value) -> Result<Filter, AppError> {
        if let Some(pattern) = value.get("$regex").and_then(Value::as_str) {
            return Filter::matches(path, pattern);
        }
        Ok(Filter::eq(path, value.clone()))
    }

    /// Case-insensitive match of `search` on `name` or `title`; empty search matches everything.
    /// The search text is reduced to `[a-z0-9@._-]` before it becomes a pattern.
    pub fn name_or_title(search: &str) -> Result<Self, AppError> {
        if search.is_empty() {
            return Ok(Filter::All);
        }
        let cleaned: String = search
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_') {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();
        let escaped = regex::escape(&cleaned);
        Ok(Filter::Or(vec![
            Filter::matches("name", &escaped)?,
            Filter::matches("title", &escaped)?,
        ]))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Filter::All)
    }

    /// Evaluate against an in-memory document.
    pub fn test(&self, doc: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { path, value } => get_path(doc, path).map(|v| value_eq(v, value)).unwrap_or(false),
            Filter::Matches { path, pattern } => get_path(doc, path)
                .and_then(Value::as_str)
                .map(|s| pattern.is_match(s))
                .unwrap_or(false),
            Filter::And(parts) => parts.iter().all(|f| f.test(doc)),
            Filter::Or(parts) => parts.iter().any(|f| f.test(doc)),
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}
