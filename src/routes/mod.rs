//! REST route synthesis.
//!
//! Routes are collected in a [`RouteTable`] (method, path, middleware chain) so they can be
//! inspected, replaced and merged before being turned into an `axum::Router`.

mod common;

pub use common::common_routes;

use crate::context::RequestContext;
use crate::controller::{Controller, Overrides};
use crate::inflect::pluralize;
use crate::middleware::{run_chain, Middleware};
use axum::http::Method;
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;
use std::sync::Arc;

/// Conventional REST routes, addressable by overrides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteKey {
    New,
    Edit,
    Index,
    Create,
    Show,
    Update,
    Remove,
}

impl RouteKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKey::New => "new",
            RouteKey::Edit => "edit",
            RouteKey::Index => "index",
            RouteKey::Create => "create",
            RouteKey::Show => "show",
            RouteKey::Update => "update",
            RouteKey::Remove => "remove",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Route {
    pub method: Method,
    /// axum path syntax, e.g. `/examples/:id`.
    pub path: String,
    pub chain: Vec<Middleware>,
}

#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        RouteTable::default()
    }

    /// Register a chain; an existing route with the same method and path is replaced in place.
    pub fn add(&mut self, method: Method, path: &str, chain: Vec<Middleware>) {
        match self.routes.iter_mut().find(|r| r.method == method && r.path == path) {
            Some(existing) => existing.chain = chain,
            None => self.routes.push(Route {
                method,
                path: path.to_string(),
                chain,
            }),
        }
    }

    pub fn merge(&mut self, other: RouteTable) {
        for route in other.routes {
            self.add(route.method, &route.path, route.chain);
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn get(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| &r.method == method && r.path == path)
    }

    /// Distinct paths in registration order.
    pub fn paths(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for r in &self.routes {
            if !out.contains(&r.path.as_str()) {
                out.push(&r.path);
            }
        }
        out
    }

    pub fn methods(&self, path: &str) -> Vec<Method> {
        self.routes
            .iter()
            .filter(|r| r.path == path)
            .map(|r| r.method.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Build the router: one axum route per path, one method handler per registered chain.
    pub fn into_router(self) -> Router {
        let mut router = Router::new();
        for path in self.paths() {
            let mut methods: Option<MethodRouter> = None;
            for route in self.routes.iter().filter(|r| r.path == path) {
                let filter = match MethodFilter::try_from(route.method.clone()) {
                    Ok(f) => f,
                    Err(_) => {
                        tracing::warn!(method = %route.method, path = %path, "unsupported method, route skipped");
                        continue;
                    }
                };
                let chain = Arc::new(route.chain.clone());
                let handler = move |req: RequestContext| {
                    let chain = chain.clone();
                    async move { run_chain(&chain, req).await }
                };
                methods = Some(match methods {
                    Some(m) => m.on(filter, handler),
                    None => on(filter, handler),
                });
            }
            if let Some(m) = methods {
                router = router.route(path, m);
            }
        }
        router
    }
}

/// Mount the REST routes for `model_name` on `table` (a new table when None):
///
/// | key    | method | path                 | chain                                         |
/// |--------|--------|----------------------|-----------------------------------------------|
/// | new    | GET    | `/{plural}/new`      | `new`                                         |
/// | edit   | GET    | `/{plural}/edit`     | `edit`                                        |
/// | index  | GET    | `/{plural}`          | `load_with_count, load_with_limit, paginate, index` |
/// | create | POST   | `/{plural}`          | `save_revision?, create`                      |
/// | show   | GET    | `/{plural}/:id`      | `load, show`                                  |
/// | update | PUT    | `/{plural}/:id`      | `save_revision?, update`                      |
/// | remove | DELETE | `/{plural}/:id`      | `load, remove`                                |
///
/// A route override replaces the whole chain for its key.
pub fn route(
    table: Option<RouteTable>,
    controller: &Controller,
    overrides: &Overrides,
    model_name: &str,
    save_revision: Option<&Middleware>,
) -> RouteTable {
    let mut table = table.unwrap_or_default();
    let plural = pluralize(model_name);
    let collection = format!("/{}", plural);
    let member = format!("/{}/:id", plural);
    let with_revision = |mw: &Middleware| -> Vec<Middleware> {
        save_revision.cloned().into_iter().chain(std::iter::once(mw.clone())).collect()
    };
    let defaults: [(RouteKey, Method, String, Vec<Middleware>); 7] = [
        (RouteKey::New, Method::GET, format!("{}/new", collection), vec![controller.new.clone()]),
        (RouteKey::Edit, Method::GET, format!("{}/edit", collection), vec![controller.edit.clone()]),
        (
            RouteKey::Index,
            Method::GET,
            collection.clone(),
            vec![
                controller.load_with_count.clone(),
                controller.load_with_limit.clone(),
                controller.paginate.clone(),
                controller.index.clone(),
            ],
        ),
        (RouteKey::Create, Method::POST, collection.clone(), with_revision(&controller.create)),
        (
            RouteKey::Show,
            Method::GET,
            member.clone(),
            vec![controller.load.clone(), controller.show.clone()],
        ),
        (RouteKey::Update, Method::PUT, member.clone(), with_revision(&controller.update)),
        (
            RouteKey::Remove,
            Method::DELETE,
            member,
            vec![controller.load.clone(), controller.remove.clone()],
        ),
    ];
    for (key, method, path, chain) in defaults {
        let chain = overrides.routes.get(&key).cloned().unwrap_or(chain);
        tracing::debug!(model = %model_name, route = key.as_str(), method = %method, path = %path, "mount");
        table.add(method, &path, chain);
    }
    table
}
