//! One-shot query entry point for command-line use.

use crate::controller::{ControllerContext, ControllerOptions};
use crate::db::{Filter, QueryOptions};
use crate::error::{AppError, ConfigError};
use crate::middleware::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CliArgs {
    /// Case-insensitive match on `name` or `title`; empty matches everything.
    pub search: Option<String>,
    pub limit: Option<u64>,
}

pub type CliHandler = Arc<dyn Fn(CliArgs) -> BoxFuture<Result<Vec<Value>, AppError>> + Send + Sync>;

/// Query handler for the model. Results are logged. Unless `cli_should_exit` is off,
/// the process exits after the query finishes, whether it succeeded or not.
pub fn cli(ctx: &ControllerContext, opts: &ControllerOptions) -> Result<CliHandler, ConfigError> {
    let db = ctx.db_for(&opts.model_name)?;
    let should_exit = ctx.config.cli_should_exit();
    let model = opts.model_name.clone();
    Ok(Arc::new(move |args: CliArgs| -> BoxFuture<Result<Vec<Value>, AppError>> {
        let db = db.clone();
        let model = model.clone();
        Box::pin(async move {
            let result = match args.search.as_deref() {
                Some(search) => match Filter::name_or_title(search) {
                    Ok(filter) => db.query(QueryOptions { filter, limit: args.limit }).await,
                    Err(e) => Err(e),
                },
                None => {
                    tracing::warn!(model = %model, "invalid task: no search given");
                    Err(AppError::InvalidTask)
                }
            };
            match &result {
                Ok(docs) => {
                    tracing::debug!(model = %model, "got docs");
                    let rendered = serde_json::to_string(docs).unwrap_or_default();
                    tracing::info!(model = %model, count = docs.len(), docs = %rendered, "query results");
                }
                Err(err) => tracing::error!(model = %model, error = %err, "query failed"),
            }
            if should_exit {
                std::process::exit(0);
            }
            result
        })
    }))
}
