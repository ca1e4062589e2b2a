//! Protocol adapter registry: name -> constructor, plus shape validation for custom adapters.

use crate::adapters::{CustomAdapter, HttpAdapter, Protocol};
use crate::config::ProtocolConfig;
use crate::db::DbRegistry;
use crate::error::ConfigError;
use crate::middleware::Middleware;
use crate::redirect::RedirectStrategy;
use crate::responder::{Responder, ViewRenderer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type Constructor = Arc<dyn Fn(ProtocolOptions) -> Result<Arc<dyn Protocol>, ConfigError> + Send + Sync>;

/// How the caller names the adapter to build.
#[derive(Clone)]
pub enum AdapterSpec {
    /// Registry key, e.g. "http".
    Named(String),
    /// Caller-supplied constructor; its instance is returned as-is.
    Constructor(Constructor),
    /// Caller-assembled adapter, validated for shape.
    Custom(CustomAdapter),
}

impl AdapterSpec {
    pub fn named(name: &str) -> Self {
        AdapterSpec::Named(name.to_string())
    }

    pub fn constructor<F>(f: F) -> Self
    where
        F: Fn(ProtocolOptions) -> Result<Arc<dyn Protocol>, ConfigError> + Send + Sync + 'static,
    {
        AdapterSpec::Constructor(Arc::new(f))
    }
}

impl fmt::Debug for AdapterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterSpec::Named(name) => f.debug_tuple("Named").field(name).finish(),
            AdapterSpec::Constructor(_) => f.write_str("Constructor"),
            AdapterSpec::Custom(c) => f.debug_tuple("Custom").field(c).finish(),
        }
    }
}

/// Everything a protocol adapter is built from.
#[derive(Clone, Default)]
pub struct ProtocolOptions {
    pub adapter: Option<AdapterSpec>,
    /// Alias for `adapter`, consulted when `adapter` is unset.
    pub protocol: Option<AdapterSpec>,
    /// API adapter name; "rest" when unset.
    pub api: Option<String>,
    pub db: DbRegistry,
    pub responder: Option<Arc<dyn Responder>>,
    pub views: Option<Arc<dyn ViewRenderer>>,
    pub config: ProtocolConfig,
    /// Revision hook run before create and update routes.
    pub save_revision: Option<Middleware>,
    pub redirects: Option<Arc<dyn RedirectStrategy>>,
}

impl ProtocolOptions {
    pub fn new(adapter: AdapterSpec) -> Self {
        ProtocolOptions {
            adapter: Some(adapter),
            ..Default::default()
        }
    }
}

pub struct AdapterRegistry {
    constructors: HashMap<String, Constructor>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        AdapterRegistry::new()
    }
}

impl AdapterRegistry {
    /// Registry with the built-in "http" adapter.
    pub fn new() -> Self {
        let mut registry = AdapterRegistry {
            constructors: HashMap::new(),
        };
        registry.register(
            "http",
            Arc::new(|opts: ProtocolOptions| -> Result<Arc<dyn Protocol>, ConfigError> {
                Ok(Arc::new(HttpAdapter::new(opts)?))
            }),
        );
        registry
    }

    pub fn register(&mut self, name: &str, constructor: Constructor) {
        self.constructors.insert(name.to_string(), constructor);
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the adapter named by `opts.adapter`, else `opts.protocol`.
    pub fn create(&self, mut opts: ProtocolOptions) -> Result<Arc<dyn Protocol>, ConfigError> {
        let spec = opts
            .adapter
            .take()
            .or_else(|| opts.protocol.take())
            .ok_or(ConfigError::MissingAdapter)?;
        match spec {
            AdapterSpec::Named(name) => {
                let constructor = self
                    .constructors
                    .get(&name)
                    .ok_or_else(|| ConfigError::UnknownAdapter(name.clone()))?;
                tracing::debug!(adapter = %name, "create protocol adapter");
                constructor(opts)
            }
            AdapterSpec::Constructor(constructor) => constructor(opts),
            AdapterSpec::Custom(custom) => {
                custom.validate()?;
                Ok(Arc::new(custom))
            }
        }
    }
}

/// Create through a registry holding only the built-in adapters.
pub fn create(opts: ProtocolOptions) -> Result<Arc<dyn Protocol>, ConfigError> {
    AdapterRegistry::new().create(opts)
}

/// Concrete adapter behind a protocol handle.
pub fn downcast<T: Protocol>(protocol: Arc<dyn Protocol>) -> Option<Arc<T>> {
    protocol.into_any().downcast::<T>().ok()
}
