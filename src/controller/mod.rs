//! Controller middleware factory: one middleware per CRUD concern for a model, closed over
//! the model's store and the protocol adapter.

pub mod cli;
pub mod load;
pub mod paginate;
pub mod persist;
pub mod views;

pub use cli::{CliArgs, CliHandler};

use crate::adapters::Protocol;
use crate::config::ProtocolConfig;
use crate::db::{DbAdapter, DbRegistry};
use crate::error::{AppError, ConfigError};
use crate::inflect::{InflectionCache, ViewModel};
use crate::middleware::Middleware;
use crate::redirect::{PrefixRedirect, RedirectStrategy, RefererRedirect};
use crate::responder::{ResponderKind, TemplateDirRenderer, ViewRenderer};
use crate::routes::{RouteKey, RouteTable};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a generated middleware needs besides its own options.
#[derive(Clone)]
pub struct ControllerContext {
    pub protocol: Arc<dyn Protocol>,
    pub db: DbRegistry,
    /// Kind of the protocol's responder; HTML responders render views themselves.
    pub responder_kind: ResponderKind,
    pub views: Arc<dyn ViewRenderer>,
    pub inflections: Arc<InflectionCache>,
    pub config: Arc<ProtocolConfig>,
    /// Revision hook run before create and update.
    pub save_revision: Option<Middleware>,
    pub redirects: Arc<dyn RedirectStrategy>,
}

impl ControllerContext {
    /// Context with a JSON responder, views from `config.view_dirs` and the configured redirect strategy.
    pub fn new(protocol: Arc<dyn Protocol>, db: DbRegistry, config: ProtocolConfig) -> Self {
        ControllerContext {
            protocol,
            db,
            responder_kind: ResponderKind::Json,
            views: Arc::new(TemplateDirRenderer::new(config.view_dirs.clone(), &config.template_ext)),
            inflections: Arc::new(InflectionCache::new(config.inflection_cache_capacity)),
            redirects: default_redirects(&config),
            config: Arc::new(config),
            save_revision: None,
        }
    }

    /// Store for `model_name`: its own, else `default`, else one registered under the plural.
    pub fn db_for(&self, model_name: &str) -> Result<Arc<dyn DbAdapter>, ConfigError> {
        self.db
            .get(model_name)
            .or_else(|| self.db.get(&self.inflections.get(model_name).name_plural))
            .ok_or_else(|| ConfigError::MissingDbAdapter(model_name.to_string()))
    }

    pub fn view_model(&self, model_name: &str) -> Arc<ViewModel> {
        self.inflections.get(model_name)
    }

    /// Log `err` then answer with the protocol's exception response.
    pub(crate) async fn fail(&self, ctx: &crate::context::RequestContext, err: AppError) -> crate::middleware::Flow {
        self.protocol.error(Some(ctx), &err);
        crate::middleware::Flow::Done(self.protocol.exception(ctx, Some(&err)).await)
    }
}

pub fn default_redirects(config: &ProtocolConfig) -> Arc<dyn RedirectStrategy> {
    match config.redirect_prefix.as_deref() {
        Some(prefix) => Arc::new(PrefixRedirect::new(prefix)),
        None => Arc::new(RefererRedirect),
    }
}

/// Per-model options for the generated middlewares.
#[derive(Clone, Debug, Default)]
pub struct ControllerOptions {
    pub model_name: String,
    /// Alternate id field for `load`, used when the request names none.
    pub docid: Option<String>,
    /// Default projection for `paginate`.
    pub fields: Option<Value>,
    /// Default query for `paginate`.
    pub query: Option<Value>,
    /// Population spec for multi-document loads.
    pub population: Option<String>,
    /// Always respond through the protocol responder instead of rendering a view.
    pub strict: bool,
    /// View folders use the plural model name.
    pub use_plural_view_names: bool,
    pub template_ext: Option<String>,
    /// Explicit view, replacing `{model}/{verb}`.
    pub viewname: Option<String>,
    /// `paginate` answers JSON callers itself.
    pub skip_json_post_transforms: bool,
    pub skip_default_props: bool,
    /// `paginate` stores the page's documents instead of the page object.
    pub concat_documents: bool,
}

impl ControllerOptions {
    pub fn new(model_name: &str) -> Self {
        ControllerOptions {
            model_name: model_name.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    New,
    Show,
    Edit,
    Index,
    Search,
    Create,
    Update,
    Remove,
    Load,
    LoadWithCount,
    LoadWithLimit,
    Paginate,
}

impl Verb {
    pub const ALL: [Verb; 12] = [
        Verb::New,
        Verb::Show,
        Verb::Edit,
        Verb::Index,
        Verb::Search,
        Verb::Create,
        Verb::Update,
        Verb::Remove,
        Verb::Load,
        Verb::LoadWithCount,
        Verb::LoadWithLimit,
        Verb::Paginate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::New => "new",
            Verb::Show => "show",
            Verb::Edit => "edit",
            Verb::Index => "index",
            Verb::Search => "search",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Remove => "remove",
            Verb::Load => "load",
            Verb::LoadWithCount => "load_with_count",
            Verb::LoadWithLimit => "load_with_limit",
            Verb::Paginate => "paginate",
        }
    }
}

/// Caller replacements: single middlewares by verb, whole route chains by route key.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub controller: HashMap<Verb, Middleware>,
    pub routes: HashMap<RouteKey, Vec<Middleware>>,
}

impl Overrides {
    pub fn new() -> Self {
        Overrides::default()
    }

    pub fn verb(mut self, verb: Verb, middleware: Middleware) -> Self {
        self.controller.insert(verb, middleware);
        self
    }

    pub fn route(mut self, key: RouteKey, chain: Vec<Middleware>) -> Self {
        self.routes.insert(key, chain);
        self
    }
}

/// The middleware bundle for one model, plus its routes once mounted.
#[derive(Clone, Debug)]
pub struct Controller {
    pub new: Middleware,
    pub show: Middleware,
    pub edit: Middleware,
    pub index: Middleware,
    pub search: Middleware,
    pub create: Middleware,
    pub update: Middleware,
    pub remove: Middleware,
    pub load: Middleware,
    pub load_with_count: Middleware,
    pub load_with_limit: Middleware,
    pub paginate: Middleware,
    pub router: Option<RouteTable>,
}

impl Controller {
    /// Build every middleware, taking overridden verbs verbatim.
    pub fn build(
        ctx: &ControllerContext,
        opts: &ControllerOptions,
        overrides: &Overrides,
    ) -> Result<Controller, ConfigError> {
        let make = |verb: Verb| -> Result<Middleware, ConfigError> {
            if let Some(mw) = overrides.controller.get(&verb) {
                return Ok(mw.clone());
            }
            match verb {
                Verb::New => Ok(views::new(ctx, opts)),
                Verb::Show => Ok(views::show(ctx, opts)),
                Verb::Edit => Ok(views::edit(ctx, opts)),
                Verb::Index => Ok(views::index(ctx, opts)),
                Verb::Search => Ok(views::search(ctx, opts)),
                Verb::Create => persist::create(ctx, opts),
                Verb::Update => persist::update(ctx, opts),
                Verb::Remove => persist::remove(ctx, opts),
                Verb::Load => load::load(ctx, opts),
                Verb::LoadWithCount => Ok(load::load_with_count(ctx, opts)),
                Verb::LoadWithLimit => Ok(load::load_with_limit(ctx, opts)),
                Verb::Paginate => paginate::paginate(ctx, opts),
            }
        };
        Ok(Controller {
            new: make(Verb::New)?,
            show: make(Verb::Show)?,
            edit: make(Verb::Edit)?,
            index: make(Verb::Index)?,
            search: make(Verb::Search)?,
            create: make(Verb::Create)?,
            update: make(Verb::Update)?,
            remove: make(Verb::Remove)?,
            load: make(Verb::Load)?,
            load_with_count: make(Verb::LoadWithCount)?,
            load_with_limit: make(Verb::LoadWithLimit)?,
            paginate: make(Verb::Paginate)?,
            router: None,
        })
    }

    pub fn get(&self, verb: Verb) -> &Middleware {
        match verb {
            Verb::New => &self.new,
            Verb::Show => &self.show,
            Verb::Edit => &self.edit,
            Verb::Index => &self.index,
            Verb::Search => &self.search,
            Verb::Create => &self.create,
            Verb::Update => &self.update,
            Verb::Remove => &self.remove,
            Verb::Load => &self.load,
            Verb::LoadWithCount => &self.load_with_count,
            Verb::LoadWithLimit => &self.load_with_limit,
            Verb::Paginate => &self.paginate,
        }
    }
}

pub(crate) use crate::context::truthy;

/// Whole numbers as JSON integers, others as floats.
pub(crate) fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::context;
    use super::*;
    use crate::db::MemoryStore;

    #[test]
    fn overrides_are_used_verbatim() {
        let (ctx, _) = context(Arc::new(MemoryStore::new()));
        let custom = Middleware::mutate("custom_show", |_| {});
        let overrides = Overrides::new().verb(Verb::Show, custom.clone());
        let controller = Controller::build(&ctx, &ControllerOptions::new("example"), &overrides).unwrap();
        assert!(Middleware::ptr_eq(&controller.show, &custom));
        assert!(!Middleware::ptr_eq(&controller.index, &custom));
        assert_eq!(controller.get(Verb::Paginate).name(), "example.paginate");
    }

    #[test]
    fn unknown_model_without_default_store_fails() {
        let (ctx, _) = context(Arc::new(MemoryStore::new()));
        let err = Controller::build(&ctx, &ControllerOptions::new("person"), &Overrides::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDbAdapter(m) if m == "person"));
    }

    #[test]
    fn plural_store_is_found() {
        let (mut ctx, _) = context(Arc::new(MemoryStore::new()));
        ctx.db = DbRegistry::new().with("people", Arc::new(MemoryStore::new()));
        assert!(ctx.db_for("person").is_ok());
    }

    #[test]
    fn truthiness_and_numbers() {
        assert!(!truthy(Some(&Value::from(""))));
        assert!(!truthy(Some(&Value::from("false"))));
        assert!(!truthy(Some(&Value::from("0"))));
        assert!(!truthy(None));
        assert!(truthy(Some(&Value::from("true"))));
        assert!(!truthy(Some(&Value::from(0))));
        assert_eq!(number(2.0), Value::from(2));
        assert_eq!(number(2.5), Value::from(2.5));
    }
}
