//! Document store collaborator: the per-model interface controllers call, and two implementations.

pub mod document;
pub mod filter;
pub mod memory;
pub mod postgres;

pub use filter::Filter;
pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

use crate::error::AppError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Primary id field of every stored document.
pub const ID_FIELD: &str = "_id";
/// Key of the fallback adapter in a [`DbRegistry`].
pub const DEFAULT_DB: &str = "default";

pub const DEFAULT_LIMIT: u64 = 500;
pub const DEFAULT_PAGELENGTH: u64 = 15;

#[derive(Clone, Debug, Default)]
pub struct CreateOptions {
    pub newdoc: Value,
    /// Request-scoped controller data, passed through for stores that use it.
    pub controller_data: Map<String, Value>,
}

#[derive(Clone, Debug, Default)]
pub struct UpdateOptions {
    /// `_id` or alternate id of the target.
    pub id: String,
    pub updatedoc: Value,
    /// Deep-merge `updatedoc` into the stored document instead of replacing it.
    pub is_patch: bool,
    /// Keep the previous version as a revision.
    pub track_changes: bool,
    pub depopulate: bool,
}

#[derive(Clone, Debug, Default)]
pub struct DeleteOptions {
    pub deleteid: String,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Id to look up; matched against `_id` and, when set, the `docid` field.
    pub query: String,
    pub docid: Option<String>,
    pub fields: Option<Value>,
    /// Population spec; `Some("")` skips population.
    pub population: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SearchOptions {
    pub filter: Filter,
    pub fields: Option<Value>,
    pub population: Option<String>,
    pub skip: u64,
    pub limit: u64,
    pub pagelength: u64,
    pub paginate: bool,
    /// Also count every matching document.
    pub count: bool,
    /// Field to sort by, `-field` for descending. None keeps insertion order.
    pub sort: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            filter: Filter::All,
            fields: None,
            population: None,
            skip: 0,
            limit: DEFAULT_LIMIT,
            pagelength: DEFAULT_PAGELENGTH,
            paginate: true,
            count: false,
            sort: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Page {
    pub documents: Vec<Value>,
    pub count: usize,
}

impl Page {
    pub fn new(documents: Vec<Value>) -> Self {
        let count = documents.len();
        Page { documents, count }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchResult {
    pub pages: Vec<Page>,
    /// Documents returned in this window.
    pub total: u64,
    pub total_pages: u64,
    /// Every matching document, when counting was requested.
    pub collection_count: Option<u64>,
    pub collection_pages: Option<u64>,
}

impl SearchResult {
    /// Split a fetched window into pages of `pagelength`.
    pub fn from_window(window: Vec<Value>, opts: &SearchOptions, collection_count: Option<u64>) -> Self {
        let total = window.len() as u64;
        let pages: Vec<Page> = if opts.paginate && opts.pagelength > 0 {
            window
                .chunks(opts.pagelength as usize)
                .map(|chunk| Page::new(chunk.to_vec()))
                .collect()
        } else {
            vec![Page::new(window)]
        };
        let collection_pages = collection_count.map(|c| {
            if opts.pagelength == 0 {
                1
            } else {
                c.div_ceil(opts.pagelength)
            }
        });
        SearchResult {
            total_pages: pages.len() as u64,
            pages,
            total,
            collection_count,
            collection_pages,
        }
    }

    pub fn first_page(&self) -> Page {
        self.pages.first().cloned().unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    pub filter: Filter,
    pub limit: Option<u64>,
}

/// Per-model document store.
#[async_trait]
pub trait DbAdapter: Send + Sync {
    /// Alternate id field accepted wherever `_id` is.
    fn docid(&self) -> Option<&str> {
        None
    }

    fn limit(&self) -> u64 {
        DEFAULT_LIMIT
    }

    fn pagelength(&self) -> u64 {
        DEFAULT_PAGELENGTH
    }

    async fn create(&self, opts: CreateOptions) -> Result<Value, AppError>;
    async fn update(&self, opts: UpdateOptions) -> Result<Value, AppError>;
    async fn delete(&self, opts: DeleteOptions) -> Result<Value, AppError>;
    async fn load(&self, opts: LoadOptions) -> Result<Option<Value>, AppError>;
    async fn search(&self, opts: SearchOptions) -> Result<SearchResult, AppError>;
    async fn query(&self, opts: QueryOptions) -> Result<Vec<Value>, AppError>;
}

/// Model name -> store, with an optional `default` fallback.
#[derive(Clone, Default)]
pub struct DbRegistry {
    adapters: BTreeMap<String, Arc<dyn DbAdapter>>,
}

impl DbRegistry {
    pub fn new() -> Self {
        DbRegistry::default()
    }

    pub fn with(mut self, model_name: &str, adapter: Arc<dyn DbAdapter>) -> Self {
        self.insert(model_name, adapter);
        self
    }

    pub fn insert(&mut self, model_name: &str, adapter: Arc<dyn DbAdapter>) {
        self.adapters.insert(model_name.to_string(), adapter);
    }

    /// Store for `model_name`, else the `default` store.
    pub fn get(&self, model_name: &str) -> Option<Arc<dyn DbAdapter>> {
        self.adapters
            .get(model_name)
            .or_else(|| self.adapters.get(DEFAULT_DB))
            .cloned()
    }

    /// Registered model names, sorted, without the default entry.
    pub fn models(&self) -> Vec<String> {
        self.adapters
            .keys()
            .filter(|k| k.as_str() != DEFAULT_DB)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
