//! Controller factories pre-bound to a [`ControllerContext`].
//!
//! Callers pass only per-model options; the protocol, stores, views and config come from
//! the bound context.

use crate::controller::{cli, load, paginate, persist, views};
use crate::controller::{CliHandler, Controller, ControllerContext, ControllerOptions, Overrides};
use crate::error::ConfigError;
use crate::middleware::Middleware;

#[derive(Clone)]
pub struct Initializers {
    ctx: ControllerContext,
}

impl Initializers {
    pub fn bind(ctx: ControllerContext) -> Self {
        Initializers { ctx }
    }

    pub fn context(&self) -> &ControllerContext {
        &self.ctx
    }

    pub fn controller(&self, opts: &ControllerOptions, overrides: &Overrides) -> Result<Controller, ConfigError> {
        Controller::build(&self.ctx, opts, overrides)
    }

    pub fn new(&self, opts: &ControllerOptions) -> Middleware {
        views::new(&self.ctx, opts)
    }

    pub fn show(&self, opts: &ControllerOptions) -> Middleware {
        views::show(&self.ctx, opts)
    }

    pub fn edit(&self, opts: &ControllerOptions) -> Middleware {
        views::edit(&self.ctx, opts)
    }

    pub fn index(&self, opts: &ControllerOptions) -> Middleware {
        views::index(&self.ctx, opts)
    }

    pub fn search(&self, opts: &ControllerOptions) -> Middleware {
        views::search(&self.ctx, opts)
    }

    pub fn create(&self, opts: &ControllerOptions) -> Result<Middleware, ConfigError> {
        persist::create(&self.ctx, opts)
    }

    pub fn update(&self, opts: &ControllerOptions) -> Result<Middleware, ConfigError> {
        persist::update(&self.ctx, opts)
    }

    pub fn remove(&self, opts: &ControllerOptions) -> Result<Middleware, ConfigError> {
        persist::remove(&self.ctx, opts)
    }

    pub fn load(&self, opts: &ControllerOptions) -> Result<Middleware, ConfigError> {
        load::load(&self.ctx, opts)
    }

    pub fn load_with_count(&self, opts: &ControllerOptions) -> Middleware {
        load::load_with_count(&self.ctx, opts)
    }

    pub fn load_with_limit(&self, opts: &ControllerOptions) -> Middleware {
        load::load_with_limit(&self.ctx, opts)
    }

    pub fn paginate(&self, opts: &ControllerOptions) -> Result<Middleware, ConfigError> {
        paginate::paginate(&self.ctx, opts)
    }

    pub fn cli(&self, opts: &ControllerOptions) -> Result<CliHandler, ConfigError> {
        cli::cli(&self.ctx, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::controller::testing::context;
    use crate::db::MemoryStore;
    use crate::middleware::Flow;
    use axum::http::Method;
    use std::sync::Arc;

    #[tokio::test]
    async fn bound_factories_share_the_context() {
        let (ctx, recorder) = context(Arc::new(MemoryStore::new()));
        let init = Initializers::bind(ctx);
        let opts = ControllerOptions::new("example");
        assert_eq!(init.load(&opts).unwrap().name(), "example.load");
        assert_eq!(init.paginate(&opts).unwrap().name(), "example.paginate");

        let flow = init
            .load(&opts)
            .unwrap()
            .call(RequestContext::new(Method::GET, "/examples/x").with_param("id", "x"))
            .await;
        assert!(matches!(flow, Flow::Fail(..)));
        assert_eq!(recorder.errors.lock().unwrap().len(), 1);

        let err = init.create(&ControllerOptions::new("person")).err().unwrap();
        assert!(matches!(err, ConfigError::MissingDbAdapter(_)));
    }
}
