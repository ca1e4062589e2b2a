//! Parameter values for document-table queries, bound in order with [`bind_params!`].

use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    Text(String),
    /// JSONB path for `#>` / `#>>`, e.g. `{contact,first_name}`.
    TextArray(Vec<String>),
    Json(Value),
    I64(i64),
}

impl SqlParam {
    /// Dotted field path as a JSONB path array.
    pub fn path(dotted: &str) -> Self {
        SqlParam::TextArray(dotted.split('.').map(str::to_string).collect())
    }
}

/// Bind every [`SqlParam`] onto a `sqlx::query`/`query_scalar` builder, in order.
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for p in $params {
            query = match p {
                $crate::sql::SqlParam::Text(s) => query.bind(s.clone()),
                $crate::sql::SqlParam::TextArray(v) => query.bind(v.clone()),
                $crate::sql::SqlParam::Json(v) => query.bind(sqlx::types::Json(v.clone())),
                $crate::sql::SqlParam::I64(n) => query.bind(*n),
            };
        }
        query
    }};
}

pub(crate) use bind_params;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_path_splits() {
        assert_eq!(
            SqlParam::path("contact.first_name"),
            SqlParam::TextArray(vec!["contact".into(), "first_name".into()])
        );
    }
}
