//! Builds parameterized SELECT/INSERT/UPDATE/DELETE for one-JSONB-column document tables:
//! `(id TEXT PRIMARY KEY, doc JSONB, createdat, updatedat)`.

use crate::db::Filter;
use crate::sql::SqlParam;

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl QueryBuf {
    pub fn new() -> Self {
        QueryBuf::default()
    }

    /// Add a parameter, returning its placeholder number.
    pub fn push_param(&mut self, v: SqlParam) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// WHERE expression for `filter`, pushing its parameters onto `q`.
pub fn where_clause(filter: &Filter, q: &mut QueryBuf) -> String {
    match filter {
        Filter::All => "TRUE".into(),
        Filter::Eq { path, value } => {
            let p = q.push_param(SqlParam::path(path));
            let v = q.push_param(SqlParam::Json(value.clone()));
            format!("(doc #> ${}) = ${}", p, v)
        }
        Filter::Matches { path, pattern } => {
            let p = q.push_param(SqlParam::path(path));
            let v = q.push_param(SqlParam::Text(pattern.as_str().to_string()));
            format!("(doc #>> ${}) ~* ${}", p, v)
        }
        Filter::And(parts) => join(parts, " AND ", "TRUE", q),
        Filter::Or(parts) => join(parts, " OR ", "FALSE", q),
    }
}

fn join(parts: &[Filter], sep: &str, empty: &str, q: &mut QueryBuf) -> String {
    if parts.is_empty() {
        return empty.into();
    }
    let clauses: Vec<String> = parts.iter().map(|f| format!("({})", where_clause(f, q))).collect();
    clauses.join(sep)
}

/// `id = $n`, or `_id`/alternate id match when `docid` is set.
fn id_clause(id: &str, docid: Option<&str>, q: &mut QueryBuf) -> String {
    let n = q.push_param(SqlParam::Text(id.to_string()));
    match docid {
        Some(field) => {
            let f = q.push_param(SqlParam::Text(field.to_string()));
            format!("(id = ${n} OR (doc ->> ${f}) = ${n})")
        }
        None => format!("id = ${n}"),
    }
}

pub fn select_by_id(table: &str, id: &str, docid: Option<&str>, for_update: bool) -> QueryBuf {
    let mut q = QueryBuf::new();
    let clause = id_clause(id, docid, &mut q);
    q.sql = format!(
        "SELECT doc FROM {} WHERE {} LIMIT 1{}",
        table,
        clause,
        if for_update { " FOR UPDATE" } else { "" }
    );
    q
}

pub fn insert(table: &str, id: &str, doc: &serde_json::Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let i = q.push_param(SqlParam::Text(id.to_string()));
    let d = q.push_param(SqlParam::Json(doc.clone()));
    q.sql = format!(
        "INSERT INTO {} (id, doc, createdat, updatedat) VALUES (${}, ${}, NOW(), NOW()) RETURNING doc",
        table, i, d
    );
    q
}

pub fn update(table: &str, id: &str, doc: &serde_json::Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let d = q.push_param(SqlParam::Json(doc.clone()));
    let i = q.push_param(SqlParam::Text(id.to_string()));
    q.sql = format!(
        "UPDATE {} SET doc = ${}, updatedat = NOW() WHERE id = ${} RETURNING doc",
        table, d, i
    );
    q
}

pub fn insert_revision(history_table: &str, id: &str, doc: &serde_json::Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let i = q.push_param(SqlParam::Text(id.to_string()));
    let d = q.push_param(SqlParam::Json(doc.clone()));
    q.sql = format!(
        "INSERT INTO {} (doc_id, doc, revised_at) VALUES (${}, ${}, NOW())",
        history_table, i, d
    );
    q
}

pub fn delete(table: &str, id: &str, docid: Option<&str>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let clause = id_clause(id, docid, &mut q);
    q.sql = format!("DELETE FROM {} WHERE {} RETURNING doc", table, clause);
    q
}

pub fn count(table: &str, filter: &Filter) -> QueryBuf {
    let mut q = QueryBuf::new();
    let clause = where_clause(filter, &mut q);
    q.sql = format!("SELECT COUNT(*) FROM {} WHERE {}", table, clause);
    q
}

/// SELECT docs matching `filter`, sorted by `sort` (`-field` descending) or insertion order.
pub fn select_list(
    table: &str,
    filter: &Filter,
    sort: Option<&str>,
    offset: Option<u64>,
    limit: Option<u64>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let clause = where_clause(filter, &mut q);
    let order = match sort {
        Some(s) => {
            let (field, dir) = match s.strip_prefix('-') {
                Some(f) => (f, "DESC"),
                None => (s, "ASC"),
            };
            let p = q.push_param(SqlParam::path(field));
            format!("(doc #>> ${}) {} NULLS LAST, createdat, id", p, dir)
        }
        None => "createdat, id".into(),
    };
    let mut sql = format!("SELECT doc FROM {} WHERE {} ORDER BY {}", table, clause, order);
    if let Some(offset) = offset {
        let p = q.push_param(SqlParam::I64(offset as i64));
        sql.push_str(&format!(" OFFSET ${}", p));
    }
    if let Some(limit) = limit {
        let p = q.push_param(SqlParam::I64(limit as i64));
        sql.push_str(&format!(" LIMIT ${}", p));
    }
    q.sql = sql;
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_placeholders_are_numbered_in_order() {
        let filter = Filter::Or(vec![Filter::eq("a.b", json!(1)), Filter::eq("c", json!("x"))]);
        let q = select_list("\"s\".\"t\"", &filter, Some("-title"), Some(4), Some(2));
        assert_eq!(
            q.sql,
            "SELECT doc FROM \"s\".\"t\" WHERE ((doc #> $1) = $2) OR ((doc #> $3) = $4) \
             ORDER BY (doc #>> $5) DESC NULLS LAST, createdat, id OFFSET $6 LIMIT $7"
        );
        assert_eq!(q.params.len(), 7);
    }

    #[test]
    fn id_lookup_with_alternate_field() {
        let q = select_by_id("t", "slug", Some("name"), false);
        assert_eq!(q.sql, "SELECT doc FROM t WHERE (id = $1 OR (doc ->> $2) = $1) LIMIT 1");
        assert_eq!(q.params, vec![SqlParam::Text("slug".into()), SqlParam::Text("name".into())]);
    }

    #[test]
    fn quoting_escapes() {
        assert_eq!(qualified_table("pro\"t", "example"), "\"pro\"\"t\".\"example\"");
        let mut q = QueryBuf::new();
        assert_eq!(where_clause(&Filter::Or(vec![]), &mut q), "FALSE");
    }
}
