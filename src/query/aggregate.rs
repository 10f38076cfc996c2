use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use crate::database::manager::DatabaseError;
use crate::query::sales_query::{SalesQuery, PROJECTED_COLUMNS};
use crate::query::{bind_param_query, QueryError, SqlResult};

/// The closed set of supported aggregate operations. Unsupported
/// operations simply do not exist here, so there is nothing to reject at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
}

impl Aggregate {
    /// Wraps the query unexecuted as a derived subquery and aggregates over
    /// one of its projected columns. The query's bind parameters carry over
    /// exactly once -- the filter predicates are never restated.
    pub fn over(&self, query: &SalesQuery, column: &str) -> Result<SqlResult, QueryError> {
        if !PROJECTED_COLUMNS.contains(&column) {
            return Err(QueryError::InvalidColumn(column.to_string()));
        }

        let inner = query.to_sql();
        let expr = match self {
            Aggregate::Count => format!("COUNT(subquery.{})", column),
            // SUM over zero rows is NULL; the contract is 0.
            Aggregate::Sum => format!("COALESCE(SUM(subquery.{}), 0)", column),
        };

        Ok(SqlResult {
            sql: format!("SELECT {} AS agg FROM ({}) AS subquery", expr, inner.sql),
            params: inner.params,
        })
    }
}

/// `COUNT` over a projected column; `0` on an empty result set.
pub async fn count(pool: &PgPool, query: &SalesQuery, column: &str) -> Result<i64, DatabaseError> {
    let result = Aggregate::Count
        .over(query, column)
        .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

    let mut q = sqlx::query(&result.sql);
    for p in result.params.iter() {
        q = bind_param_query(q, p);
    }
    let row = q.fetch_one(pool).await?;
    Ok(row.try_get("agg")?)
}

/// `SUM` over a projected column; `0` (never NULL) on an empty result set.
pub async fn sum(pool: &PgPool, query: &SalesQuery, column: &str) -> Result<Decimal, DatabaseError> {
    let result = Aggregate::Sum
        .over(query, column)
        .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

    let mut q = sqlx::query(&result.sql);
    for p in result.params.iter() {
        q = bind_param_query(q, p);
    }
    let row = q.fetch_one(pool).await?;
    Ok(row.try_get("agg")?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{SellerSet, SqlParam};
    use uuid::Uuid;

    #[test]
    fn count_wraps_query_as_subquery() {
        let query = SalesQuery::new(SellerSet::Unrestricted);
        let result = Aggregate::Count.over(&query, "sale_id").unwrap();
        assert!(result.sql.starts_with("SELECT COUNT(subquery.sale_id) AS agg FROM (SELECT"));
        assert!(result.sql.ends_with(") AS subquery"));
        assert!(result.params.is_empty());
    }

    #[test]
    fn sum_coalesces_to_zero() {
        let query = SalesQuery::new(SellerSet::Unrestricted);
        let result = Aggregate::Sum.over(&query, "sale_value").unwrap();
        assert!(result.sql.contains("COALESCE(SUM(subquery.sale_value), 0)"));
    }

    #[test]
    fn filter_params_carry_over_exactly_once() {
        let seller = Uuid::new_v4();
        let query = SalesQuery::new(SellerSet::Only(vec![seller]))
            .board_name(Some("North".into()));

        let inner = query.to_sql();
        let wrapped = Aggregate::Sum.over(&query, "sale_value").unwrap();

        assert_eq!(wrapped.params, inner.params);
        assert_eq!(
            wrapped.params,
            vec![SqlParam::Uuid(seller), SqlParam::Str("North".into())]
        );
        // Placeholders inside the subquery keep their original numbering.
        assert!(wrapped.sql.contains("sales.user_id IN ($1)"));
        assert!(wrapped.sql.contains("boards.board_name = $2"));
    }

    #[test]
    fn rejects_columns_outside_the_projection() {
        let query = SalesQuery::new(SellerSet::Unrestricted);
        let err = Aggregate::Count.over(&query, "sales.ip_address; DROP TABLE sales").unwrap_err();
        assert!(matches!(err, QueryError::InvalidColumn(_)));
    }
}
