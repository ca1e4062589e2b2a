//! Demo server: in-memory `example` and `person` stores behind the HTTP adapter, with the
//! generated REST routes nested under `/data` and health/version at the root.

use axum::Router;
use rest_protocols::{
    common_routes, AdapterSpec, DbRegistry, HttpAdapter, MemoryStore, ProtocolOptions,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rest_protocols=info")))
        .init();

    let config = rest_protocols::config::from_env()?;
    let db = DbRegistry::new()
        .with("example", Arc::new(MemoryStore::new()))
        .with("person", Arc::new(MemoryStore::new().with_docid("name")));
    let adapter = HttpAdapter::new(ProtocolOptions {
        adapter: Some(AdapterSpec::named("http")),
        db,
        config,
        save_revision: Some(rest_protocols::controller::persist::revision_marker()),
        ..Default::default()
    })?;
    let implemented = adapter.implement_all()?;
    tracing::info!(models = ?adapter.controllers(), routes = adapter.routes().len(), count = implemented.len(), "models implemented");

    let app = Router::new()
        .merge(common_routes())
        .nest("/data", adapter.router())
        .layer(RequestBodyLimitLayer::new(rest_protocols::context::BODY_LIMIT));

    let addr = std::env::var("PROTOCOLS_LISTEN").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
