//! REST API adapter.

use crate::api::{ApiAdapter, ImplementOptions, Initializers, RouterChoice};
use crate::controller::{Controller, ControllerContext, Overrides};
use crate::error::ConfigError;
use crate::routes::{self, RouteTable};
use std::any::Any;

pub struct RestAdapter {
    initialize: Initializers,
}

impl RestAdapter {
    pub fn new(ctx: ControllerContext) -> Self {
        RestAdapter {
            initialize: Initializers::bind(ctx),
        }
    }

    pub fn initialize(&self) -> &Initializers {
        &self.initialize
    }

    /// Mount the conventional REST routes for `model_name`, with the context's revision hook
    /// ahead of create and update.
    pub fn routing(
        &self,
        table: Option<RouteTable>,
        controller: &Controller,
        overrides: &Overrides,
        model_name: &str,
    ) -> RouteTable {
        let save_revision = self.initialize.context().save_revision.as_ref();
        routes::route(table, controller, overrides, model_name, save_revision)
    }
}

impl ApiAdapter for RestAdapter {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn implement(&self, opts: ImplementOptions) -> Result<Controller, ConfigError> {
        let mut controller = self.initialize.controller(&opts.controller, &opts.overrides)?;
        let model_name = &opts.controller.model_name;
        controller.router = match opts.router {
            RouterChoice::Create => Some(self.routing(None, &controller, &opts.overrides, model_name)),
            RouterChoice::Existing(table) => Some(self.routing(Some(table), &controller, &opts.overrides, model_name)),
            RouterChoice::Disabled => None,
        };
        Ok(controller)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::context;
    use crate::controller::Verb;
    use crate::db::MemoryStore;
    use crate::middleware::Middleware;
    use axum::http::Method;
    use std::sync::Arc;

    #[test]
    fn implement_mounts_onto_existing_table() {
        let (ctx, _) = context(Arc::new(MemoryStore::new()));
        let rest = RestAdapter::new(ctx);
        let mut existing = RouteTable::new();
        existing.add(Method::GET, "/status", vec![Middleware::mutate("status", |_| {})]);
        let mut opts = ImplementOptions::new("example");
        opts.router = RouterChoice::Existing(existing);
        let controller = rest.implement(opts).unwrap();
        let table = controller.router.unwrap();
        assert_eq!(table.len(), 8);
        assert!(table.get(&Method::GET, "/status").is_some());
    }

    #[test]
    fn verb_override_reaches_the_route_chain() {
        let (ctx, _) = context(Arc::new(MemoryStore::new()));
        let rest = RestAdapter::new(ctx);
        let custom = Middleware::mutate("custom_show", |_| {});
        let mut opts = ImplementOptions::new("example");
        opts.overrides = Overrides::new().verb(Verb::Show, custom.clone());
        let controller = rest.implement(opts).unwrap();
        assert!(Middleware::ptr_eq(&controller.show, &custom));
        let table = controller.router.unwrap();
        let show = table.get(&Method::GET, "/examples/:id").unwrap();
        assert!(Middleware::ptr_eq(&show.chain[1], &custom));
    }

    #[test]
    fn revision_hook_comes_from_context() {
        let (mut ctx, _) = context(Arc::new(MemoryStore::new()));
        let hook = crate::controller::persist::revision_marker();
        ctx.save_revision = Some(hook.clone());
        let rest = RestAdapter::new(ctx);
        let controller = rest.implement(ImplementOptions::new("example")).unwrap();
        let table = controller.router.unwrap();
        let create = table.get(&Method::POST, "/examples").unwrap();
        assert!(Middleware::ptr_eq(&create.chain[0], &hook));
    }
}
