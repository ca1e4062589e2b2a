//! Helpers on JSON documents shared by the stores and controllers: dotted paths, projection,
//! deep merge, id extraction, timestamps and slugs.

use crate::context::truthy;
use crate::db::ID_FIELD;
use crate::error::AppError;
use chrono::Utc;
use serde_json::{Map, Value};

/// Value at a dotted path, e.g. "contact.first_name".
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |cur, seg| cur.get(seg))
}

/// String form of an id-like value.
pub fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `_id`, else the alternate `docid` field.
pub fn document_id(doc: &Value, docid: Option<&str>) -> Option<String> {
    doc.get(ID_FIELD)
        .and_then(id_string)
        .or_else(|| docid.and_then(|f| doc.get(f)).and_then(id_string))
}

/// True when `doc` is addressed by `id` through `_id` or the `docid` field.
pub fn has_id(doc: &Value, id: &str, docid: Option<&str>) -> bool {
    let by = |field: &str| doc.get(field).and_then(id_string).as_deref() == Some(id);
    by(ID_FIELD) || docid.map(by).unwrap_or(false)
}

/// Mongo-style field projection over top-level keys. `{a:1}` keeps `a` and `_id`,
/// `{a:0}` drops `a`. Non-object specs are ignored.
pub fn project(doc: &Value, fields: Option<&Value>) -> Value {
    let (Some(Value::Object(spec)), Value::Object(src)) = (fields, doc) else {
        return doc.clone();
    };
    if spec.is_empty() {
        return doc.clone();
    }
    let include: Vec<&str> = spec
        .iter()
        .filter(|(k, v)| k.as_str() != ID_FIELD && truthy(Some(*v)))
        .map(|(k, _)| k.as_str())
        .collect();
    let drop_id = spec.get(ID_FIELD).map(|v| !truthy(Some(v))).unwrap_or(false);
    let mut out = Map::new();
    if include.is_empty() {
        for (k, v) in src {
            let excluded = spec.get(k).map(|s| !truthy(Some(s))).unwrap_or(false);
            if !excluded {
                out.insert(k.clone(), v.clone());
            }
        }
    } else {
        for (k, v) in src {
            if include.contains(&k.as_str()) || (k == ID_FIELD && !drop_id) {
                out.insert(k.clone(), v.clone());
            }
        }
    }
    Value::Object(out)
}

/// Recursively merge `patch` into `target`; objects merge key by key, everything else replaces.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(t), Value::Object(p)) => {
            for (k, v) in p {
                match t.get_mut(k) {
                    Some(existing) if existing.is_object() && v.is_object() => deep_merge(existing, v),
                    _ => {
                        t.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (t, p) => *t = p.clone(),
    }
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Validate and stamp a new document: object body, `_id` (uuid v4 unless given), `createdat`/`updatedat`.
pub fn prepare_new(newdoc: &Value) -> Result<(String, Value), AppError> {
    let Value::Object(map) = newdoc else {
        return Err(AppError::Validation("document must be a JSON object".into()));
    };
    let mut map = map.clone();
    let id = match map.get(ID_FIELD).and_then(id_string) {
        Some(id) => id,
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            map.insert(ID_FIELD.into(), Value::String(id.clone()));
            id
        }
    };
    let now = now_rfc3339();
    map.entry("createdat").or_insert_with(|| Value::String(now.clone()));
    map.entry("updatedat").or_insert_with(|| Value::String(now));
    Ok((id, Value::Object(map)))
}

/// Apply an update to a stored document. Patch deep-merges; otherwise the body replaces the
/// document while `_id` and `createdat` are kept. `updatedat` is refreshed unless given.
pub fn apply_update(current: &Value, updatedoc: &Value, is_patch: bool) -> Result<Value, AppError> {
    if !updatedoc.is_object() {
        return Err(AppError::Validation("updatedoc must be a JSON object".into()));
    }
    let mut next = if is_patch {
        let mut merged = current.clone();
        deep_merge(&mut merged, updatedoc);
        merged
    } else {
        let mut replaced = updatedoc.clone();
        if let (Value::Object(r), Value::Object(c)) = (&mut replaced, current) {
            for key in [ID_FIELD, "createdat"] {
                if let Some(v) = c.get(key) {
                    r.insert(key.into(), v.clone());
                }
            }
        }
        replaced
    };
    if let Value::Object(map) = &mut next {
        if updatedoc.get("updatedat").is_none() {
            map.insert("updatedat".into(), Value::String(now_rfc3339()));
        }
    }
    Ok(next)
}

/// URL-friendly name from a title: every char outside `[a-z0-9@._]` becomes `-`, then lowercase.
/// e.g. "Hello World!" -> "hello-world-"
pub fn make_nice_name(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_keeps_sibling_fields() {
        let current = json!({ "_id": "1", "contact": { "first_name": "Hello", "last_name": "World" } });
        let next = apply_update(&current, &json!({ "contact": { "last_name": "There" } }), true).unwrap();
        assert_eq!(next["contact"]["first_name"], "Hello");
        assert_eq!(next["contact"]["last_name"], "There");
        assert!(next.get("updatedat").is_some());
    }

    #[test]
    fn replace_keeps_identity() {
        let current = json!({ "_id": "1", "createdat": "t0", "title": "a", "extra": 1 });
        let next = apply_update(&current, &json!({ "title": "b" }), false).unwrap();
        assert_eq!(next["_id"], "1");
        assert_eq!(next["createdat"], "t0");
        assert_eq!(next["title"], "b");
        assert!(next.get("extra").is_none());
    }

    #[test]
    fn projection_include_and_exclude() {
        let doc = json!({ "_id": "1", "contact": {}, "createdat": "t" });
        assert_eq!(project(&doc, Some(&json!({ "contact": 0 }))), json!({ "_id": "1", "createdat": "t" }));
        assert_eq!(project(&doc, Some(&json!({ "createdat": 1 }))), json!({ "_id": "1", "createdat": "t" }));
        assert_eq!(project(&doc, Some(&json!({ "createdat": 1, "_id": 0 }))), json!({ "createdat": "t" }));
        assert_eq!(project(&doc, None), doc);
    }

    #[test]
    fn projection_flags_read_like_query_flags() {
        let doc = json!({ "_id": "1", "contact": {}, "createdat": "t" });
        assert_eq!(project(&doc, Some(&json!({ "contact": "false" }))), json!({ "_id": "1", "createdat": "t" }));
        assert_eq!(project(&doc, Some(&json!({ "contact": "0" }))), json!({ "_id": "1", "createdat": "t" }));
        assert_eq!(project(&doc, Some(&json!({ "contact": "1" }))), json!({ "_id": "1", "contact": {} }));
    }

    #[test]
    fn ids_and_slugs() {
        let doc = json!({ "_id": "abc", "name": "slug" });
        assert_eq!(document_id(&doc, None).as_deref(), Some("abc"));
        assert!(has_id(&doc, "slug", Some("name")));
        assert!(!has_id(&doc, "slug", None));
        assert_eq!(make_nice_name("Hello World!"), "hello-world-");
    }

    #[test]
    fn prepare_new_stamps_fields() {
        let (id, doc) = prepare_new(&json!({ "title": "x" })).unwrap();
        assert_eq!(doc["_id"], id.as_str());
        assert!(doc.get("createdat").is_some());
        assert!(prepare_new(&json!("nope")).is_err());
    }
}
