//! API adapters: strategies that turn controller options into a controller bundle and routes.

pub mod initializers;
pub mod rest;

pub use initializers::Initializers;
pub use rest::RestAdapter;

use crate::controller::{Controller, ControllerContext, ControllerOptions, Overrides};
use crate::error::ConfigError;
use crate::routes::RouteTable;
use std::any::Any;

/// Where an implementation's routes go.
#[derive(Clone, Debug, Default)]
pub enum RouterChoice {
    /// Mount onto a new route table.
    #[default]
    Create,
    /// Mount onto the given table.
    Existing(RouteTable),
    /// Middlewares only.
    Disabled,
}

#[derive(Clone, Debug, Default)]
pub struct ImplementOptions {
    pub controller: ControllerOptions,
    pub overrides: Overrides,
    pub router: RouterChoice,
}

impl ImplementOptions {
    pub fn new(model_name: &str) -> Self {
        ImplementOptions {
            controller: ControllerOptions::new(model_name),
            ..Default::default()
        }
    }
}

pub trait ApiAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build the model's controller, mounting routes unless the router is disabled.
    fn implement(&self, opts: ImplementOptions) -> Result<Controller, ConfigError>;

    fn as_any(&self) -> &dyn Any;
}

/// API adapter by name, bound to `ctx`.
pub fn api_adapter(name: &str, ctx: ControllerContext) -> Result<Box<dyn ApiAdapter>, ConfigError> {
    match name {
        "rest" => Ok(Box::new(RestAdapter::new(ctx))),
        other => Err(ConfigError::UnknownApi(other.to_string())),
    }
}
