//! REST protocols: protocol adapters that synthesize CRUD controllers and REST routes for
//! model resources from a model name.

pub mod adapters;
pub mod api;
pub mod config;
pub mod context;
pub mod controller;
pub mod db;
pub mod error;
pub mod inflect;
pub mod middleware;
pub mod redirect;
pub mod responder;
pub mod response;
pub mod routes;
pub mod sql;

pub use adapters::{
    create, downcast, AdapterRegistry, AdapterSpec, CustomAdapter, HttpAdapter, HttpProtocol, Protocol,
    ProtocolOptions, RespondOptions,
};
pub use api::{ApiAdapter, ImplementOptions, Initializers, RestAdapter, RouterChoice};
pub use config::ProtocolConfig;
pub use context::{json_request, RequestContext};
pub use controller::{Controller, ControllerContext, ControllerOptions, Overrides, Verb};
pub use db::{DbAdapter, DbRegistry, MemoryStore, PgDocumentStore};
pub use error::{AppError, ConfigError};
pub use inflect::{InflectionCache, ViewModel};
pub use middleware::{Flow, Middleware};
pub use routes::{common_routes, RouteKey, RouteTable};
