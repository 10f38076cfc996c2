pub mod aggregate;
pub mod sales_query;

pub use aggregate::Aggregate;
pub use sales_query::{SalesQuery, SellerSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgArguments;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid aggregate column: {0}")]
    InvalidColumn(String),
}

/// A typed bind parameter. Keeping the parameter list typed (rather than
/// stringly) lets Postgres see the real types for timestamp and numeric
/// comparisons.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Str(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Decimal(Decimal),
}

/// Generated SQL plus its bind parameters, in `$n` order.
#[derive(Debug, Clone)]
pub struct SqlResult {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

pub fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    p: &'q SqlParam,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match p {
        SqlParam::Str(s) => q.bind(s.as_str()),
        SqlParam::Uuid(u) => q.bind(*u),
        SqlParam::Timestamp(t) => q.bind(*t),
        SqlParam::Decimal(d) => q.bind(*d),
    }
}

pub fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    p: &'q SqlParam,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>,
{
    match p {
        SqlParam::Str(s) => q.bind(s.as_str()),
        SqlParam::Uuid(u) => q.bind(*u),
        SqlParam::Timestamp(t) => q.bind(*t),
        SqlParam::Decimal(d) => q.bind(*d),
    }
}
