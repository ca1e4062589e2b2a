//! PostgreSQL document store: one JSONB table per model plus a `{table}_history` revision table.

use crate::db::document::{apply_update, document_id, prepare_new, project};
use crate::db::{
    CreateOptions, DbAdapter, DeleteOptions, LoadOptions, QueryOptions, SearchOptions, SearchResult,
    UpdateOptions, DEFAULT_LIMIT, DEFAULT_PAGELENGTH,
};
use crate::error::AppError;
use crate::sql::params::bind_params;
use crate::sql::{self, qualified_table, quoted, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

pub struct PgDocumentStore {
    pool: PgPool,
    schema: String,
    table: String,
    docid: Option<String>,
    limit: u64,
    pagelength: u64,
}

impl PgDocumentStore {
    /// Store for `model_name` in `schema`; the table is named after the model.
    pub fn new(pool: PgPool, schema: &str, model_name: &str) -> Self {
        PgDocumentStore {
            pool,
            schema: schema.to_string(),
            table: model_name.to_string(),
            docid: None,
            limit: DEFAULT_LIMIT,
            pagelength: DEFAULT_PAGELENGTH,
        }
    }

    pub fn with_docid(mut self, field: &str) -> Self {
        self.docid = Some(field.to_string());
        self
    }

    pub fn with_paging(mut self, limit: u64, pagelength: u64) -> Self {
        self.limit = limit;
        self.pagelength = pagelength;
        self
    }

    fn qualified(&self) -> String {
        qualified_table(&self.schema, &self.table)
    }

    fn history(&self) -> String {
        qualified_table(&self.schema, &format!("{}_history", self.table))
    }

    /// Create schema, document table and history table if missing.
    pub async fn ensure_table(&self) -> Result<(), AppError> {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(&self.schema)))
            .execute(&self.pool)
            .await?;
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                doc JSONB NOT NULL,
                createdat TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updatedat TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.qualified()
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        let history_ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                revision BIGSERIAL PRIMARY KEY,
                doc_id TEXT NOT NULL,
                doc JSONB NOT NULL,
                revised_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.history()
        );
        sqlx::query(&history_ddl).execute(&self.pool).await?;
        tracing::info!(table = %self.qualified(), "document table ready");
        Ok(())
    }

    async fn fetch_docs(&self, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = q.params.len(), "document query");
        let rows: Vec<Json<Value>> = bind_params!(sqlx::query_scalar::<sqlx::Postgres, Json<Value>>(&q.sql), &q.params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(v)| v).collect())
    }

    async fn fetch_doc(&self, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = q.params.len(), "document query");
        let row: Option<Json<Value>> = bind_params!(sqlx::query_scalar::<sqlx::Postgres, Json<Value>>(&q.sql), &q.params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(v)| v))
    }
}

#[async_trait]
impl DbAdapter for PgDocumentStore {
    fn docid(&self) -> Option<&str> {
        self.docid.as_deref()
    }

    fn limit(&self) -> u64 {
        self.limit
    }

    fn pagelength(&self) -> u64 {
        self.pagelength
    }

    async fn create(&self, opts: CreateOptions) -> Result<Value, AppError> {
        let (id, doc) = prepare_new(&opts.newdoc)?;
        let q = sql::insert(&self.qualified(), &id, &doc);
        self.fetch_doc(&q)
            .await?
            .ok_or_else(|| AppError::Collaborator(format!("insert into {} returned no row", self.table)))
    }

    async fn update(&self, opts: UpdateOptions) -> Result<Value, AppError> {
        let table = self.qualified();
        let mut tx = self.pool.begin().await?;

        let q = sql::select_by_id(&table, &opts.id, self.docid(), true);
        tracing::debug!(sql = %q.sql, "lock document");
        let current: Option<Json<Value>> = bind_params!(sqlx::query_scalar::<sqlx::Postgres, Json<Value>>(&q.sql), &q.params)
            .fetch_optional(&mut *tx)
            .await?;
        let Json(current) = current.ok_or_else(|| AppError::NotFound(opts.id.clone()))?;
        let stored_id = document_id(&current, None).unwrap_or_else(|| opts.id.clone());

        if opts.track_changes {
            let q = sql::insert_revision(&self.history(), &stored_id, &current);
            bind_params!(sqlx::query::<sqlx::Postgres>(&q.sql), &q.params)
                .execute(&mut *tx)
                .await?;
        }

        let next = apply_update(&current, &opts.updatedoc, opts.is_patch)?;
        let q = sql::update(&table, &stored_id, &next);
        tracing::debug!(sql = %q.sql, "update document");
        let Json(updated) = bind_params!(sqlx::query_scalar::<sqlx::Postgres, Json<Value>>(&q.sql), &q.params)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete(&self, opts: DeleteOptions) -> Result<Value, AppError> {
        let q = sql::delete(&self.qualified(), &opts.deleteid, self.docid());
        self.fetch_doc(&q)
            .await?
            .ok_or(AppError::NotFound(opts.deleteid))
    }

    async fn load(&self, opts: LoadOptions) -> Result<Option<Value>, AppError> {
        let docid = opts.docid.as_deref().or(self.docid());
        let q = sql::select_by_id(&self.qualified(), &opts.query, docid, false);
        let doc = self.fetch_doc(&q).await?;
        Ok(doc.map(|d| project(&d, opts.fields.as_ref())))
    }

    async fn search(&self, opts: SearchOptions) -> Result<SearchResult, AppError> {
        let table = self.qualified();
        let collection_count = if opts.count {
            let q = sql::count(&table, &opts.filter);
            tracing::debug!(sql = %q.sql, "count documents");
            let n: i64 = bind_params!(sqlx::query_scalar::<sqlx::Postgres, i64>(&q.sql), &q.params)
                .fetch_one(&self.pool)
                .await?;
            Some(n.max(0) as u64)
        } else {
            None
        };
        let q = sql::select_list(
            &table,
            &opts.filter,
            opts.sort.as_deref(),
            Some(opts.skip),
            Some(opts.limit),
        );
        let window: Vec<Value> = self
            .fetch_docs(&q)
            .await?
            .iter()
            .map(|d| project(d, opts.fields.as_ref()))
            .collect();
        Ok(SearchResult::from_window(window, &opts, collection_count))
    }

    async fn query(&self, opts: QueryOptions) -> Result<Vec<Value>, AppError> {
        let q = sql::select_list(&self.qualified(), &opts.filter, None, None, opts.limit);
        self.fetch_docs(&q).await
    }
}
