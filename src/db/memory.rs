//! In-process document store. Documents are kept in insertion order.

use crate::db::document::{apply_update, has_id, prepare_new, project};
use crate::db::{
    CreateOptions, DbAdapter, DeleteOptions, LoadOptions, QueryOptions, SearchOptions, SearchResult,
    UpdateOptions, DEFAULT_LIMIT, DEFAULT_PAGELENGTH,
};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::RwLock;

pub struct MemoryStore {
    docs: RwLock<Vec<Value>>,
    revisions: RwLock<Vec<Value>>,
    docid: Option<String>,
    limit: u64,
    pagelength: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            docs: RwLock::new(Vec::new()),
            revisions: RwLock::new(Vec::new()),
            docid: None,
            limit: DEFAULT_LIMIT,
            pagelength: DEFAULT_PAGELENGTH,
        }
    }

    /// Accept `field` as an alternate document id.
    pub fn with_docid(mut self, field: &str) -> Self {
        self.docid = Some(field.to_string());
        self
    }

    pub fn with_paging(mut self, limit: u64, pagelength: u64) -> Self {
        self.limit = limit;
        self.pagelength = pagelength;
        self
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Previous versions saved by tracked updates, oldest first.
    pub fn revisions(&self) -> Vec<Value> {
        self.revisions.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn all(&self) -> Vec<Value> {
        self.docs.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn position(docs: &[Value], id: &str, docid: Option<&str>) -> Option<usize> {
        docs.iter().position(|d| has_id(d, id, docid))
    }
}

fn compare_by(a: &Value, b: &Value, field: &str) -> Ordering {
    let av = a.get(field);
    let bv = b.get(field);
    match (av.and_then(Value::as_f64), bv.and_then(Value::as_f64)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => {
            let key = |v: Option<&Value>| match v {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            key(av).cmp(&key(bv))
        }
    }
}

#[async_trait]
impl DbAdapter for MemoryStore {
    fn docid(&self) -> Option<&str> {
        self.docid.as_deref()
    }

    fn limit(&self) -> u64 {
        self.limit
    }

    fn pagelength(&self) -> u64 {
        self.pagelength
    }

    async fn create(&self, opts: CreateOptions) -> Result<Value, AppError> {
        let (id, doc) = prepare_new(&opts.newdoc)?;
        let mut docs = self.docs.write().unwrap_or_else(|e| e.into_inner());
        if Self::position(&docs, &id, None).is_some() {
            return Err(AppError::Validation(format!("duplicate _id {}", id)));
        }
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn update(&self, opts: UpdateOptions) -> Result<Value, AppError> {
        let mut docs = self.docs.write().unwrap_or_else(|e| e.into_inner());
        let idx = Self::position(&docs, &opts.id, self.docid())
            .ok_or_else(|| AppError::NotFound(opts.id.clone()))?;
        let next = apply_update(&docs[idx], &opts.updatedoc, opts.is_patch)?;
        if opts.track_changes {
            self.revisions
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .push(docs[idx].clone());
        }
        docs[idx] = next.clone();
        Ok(next)
    }

    async fn delete(&self, opts: DeleteOptions) -> Result<Value, AppError> {
        let mut docs = self.docs.write().unwrap_or_else(|e| e.into_inner());
        let idx = Self::position(&docs, &opts.deleteid, self.docid())
            .ok_or_else(|| AppError::NotFound(opts.deleteid.clone()))?;
        Ok(docs.remove(idx))
    }

    async fn load(&self, opts: LoadOptions) -> Result<Option<Value>, AppError> {
        let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());
        let docid = opts.docid.as_deref().or(self.docid());
        Ok(docs
            .iter()
            .find(|d| has_id(d, &opts.query, docid))
            .map(|d| project(d, opts.fields.as_ref())))
    }

    async fn search(&self, opts: SearchOptions) -> Result<SearchResult, AppError> {
        let mut matched: Vec<Value> = {
            let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());
            docs.iter().filter(|d| opts.filter.test(d)).cloned().collect()
        };
        if let Some(sort) = opts.sort.as_deref() {
            let (field, desc) = match sort.strip_prefix('-') {
                Some(f) => (f, true),
                None => (sort, false),
            };
            matched.sort_by(|a, b| {
                let ord = compare_by(a, b, field);
                if desc {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        let collection_count = opts.count.then_some(matched.len() as u64);
        let window: Vec<Value> = matched
            .iter()
            .skip(opts.skip as usize)
            .take(opts.limit as usize)
            .map(|d| project(d, opts.fields.as_ref()))
            .collect();
        Ok(SearchResult::from_window(window, &opts, collection_count))
    }

    async fn query(&self, opts: QueryOptions) -> Result<Vec<Value>, AppError> {
        let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());
        let limit = opts.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(docs
            .iter()
            .filter(|d| opts.filter.test(d))
            .take(limit)
            .cloned()
            .collect())
    }
}
