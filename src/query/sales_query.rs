use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::sale::SaleRecord;
use crate::query::{bind_param_query_as, SqlParam, SqlResult};

/// Seller restriction for a query. The two states are an explicit
/// contract: `Unrestricted` omits the clause entirely (everyone), while
/// `Only` always emits one -- `Only(vec![])` generates a never-matching
/// predicate so an empty scope still executes and returns zero rows.
#[derive(Debug, Clone, PartialEq)]
pub enum SellerSet {
    Unrestricted,
    Only(Vec<Uuid>),
}

/// Builder for the joined, denormalized sale projection. All filters are
/// conjunctive; the generated SQL is re-executable and safe to wrap as a
/// derived subquery because nothing here triggers execution.
#[derive(Debug, Clone)]
pub struct SalesQuery {
    sellers: SellerSet,
    board_name: Option<String>,
    unit_name: Option<String>,
    salesperson_name: Option<String>,
    period: Option<(DateTime<Utc>, DateTime<Utc>)>,
    board_id: Option<Uuid>,
    unit_id: Option<Uuid>,
    seller_id: Option<Uuid>,
    sale_id: Option<Uuid>,
}

/// Columns projected by `SalesQuery`, usable as aggregate targets.
pub const PROJECTED_COLUMNS: &[&str] = &[
    "sale_id",
    "sale_value",
    "salesperson",
    "nearest_unit",
    "board",
    "latitude",
    "longitude",
    "roaming",
    "sold_at",
];

impl SalesQuery {
    pub fn new(sellers: SellerSet) -> Self {
        Self {
            sellers,
            board_name: None,
            unit_name: None,
            salesperson_name: None,
            period: None,
            board_id: None,
            unit_id: None,
            seller_id: None,
            sale_id: None,
        }
    }

    pub fn board_name(mut self, name: Option<String>) -> Self {
        self.board_name = name;
        self
    }

    /// Filters on the resolved nearest unit: the sale's override name when
    /// set, otherwise the seller's assigned unit name (COALESCE in SQL,
    /// not a stored column).
    pub fn unit_name(mut self, name: Option<String>) -> Self {
        self.unit_name = name;
        self
    }

    pub fn salesperson_name(mut self, name: Option<String>) -> Self {
        self.salesperson_name = name;
        self
    }

    /// Inclusive `[start, end]` restriction on the sale timestamp.
    pub fn period(mut self, range: Option<(DateTime<Utc>, DateTime<Utc>)>) -> Self {
        self.period = range;
        self
    }

    pub fn board_id(mut self, id: Uuid) -> Self {
        self.board_id = Some(id);
        self
    }

    pub fn unit_id(mut self, id: Uuid) -> Self {
        self.unit_id = Some(id);
        self
    }

    pub fn seller_id(mut self, id: Uuid) -> Self {
        self.seller_id = Some(id);
        self
    }

    pub fn sale_id(mut self, id: Uuid) -> Self {
        self.sale_id = Some(id);
        self
    }

    pub fn to_sql(&self) -> SqlResult {
        let mut params: Vec<SqlParam> = vec![];
        let mut conditions: Vec<String> = vec![];

        let param = |params: &mut Vec<SqlParam>, value: SqlParam| {
            params.push(value);
            format!("${}", params.len())
        };

        match &self.sellers {
            SellerSet::Unrestricted => {}
            SellerSet::Only(ids) if ids.is_empty() => {
                conditions.push("1=0".to_string());
            }
            SellerSet::Only(ids) => {
                let placeholders: Vec<String> = ids
                    .iter()
                    .map(|id| param(&mut params, SqlParam::Uuid(*id)))
                    .collect();
                conditions.push(format!("sales.user_id IN ({})", placeholders.join(", ")));
            }
        }

        if let Some(name) = &self.board_name {
            let p = param(&mut params, SqlParam::Str(name.clone()));
            conditions.push(format!("boards.board_name = {}", p));
        }
        if let Some(name) = &self.unit_name {
            let p = param(&mut params, SqlParam::Str(name.clone()));
            conditions.push(format!(
                "COALESCE(sales.override_unit_name, units.unit_name) = {}",
                p
            ));
        }
        if let Some(name) = &self.salesperson_name {
            let p = param(&mut params, SqlParam::Str(name.clone()));
            conditions.push(format!("users.name = {}", p));
        }
        if let Some((start, end)) = &self.period {
            let p_start = param(&mut params, SqlParam::Timestamp(*start));
            let p_end = param(&mut params, SqlParam::Timestamp(*end));
            conditions.push(format!("sales.sold_at BETWEEN {} AND {}", p_start, p_end));
        }
        if let Some(id) = self.board_id {
            let p = param(&mut params, SqlParam::Uuid(id));
            conditions.push(format!("boards.id = {}", p));
        }
        if let Some(id) = self.unit_id {
            let p = param(&mut params, SqlParam::Uuid(id));
            conditions.push(format!("units.id = {}", p));
        }
        if let Some(id) = self.seller_id {
            let p = param(&mut params, SqlParam::Uuid(id));
            conditions.push(format!("sales.user_id = {}", p));
        }
        if let Some(id) = self.sale_id {
            let p = param(&mut params, SqlParam::Uuid(id));
            conditions.push(format!("sales.id = {}", p));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT sales.id AS sale_id, sales.sale_value, users.name AS salesperson, \
             COALESCE(sales.override_unit_name, units.unit_name) AS nearest_unit, \
             boards.board_name AS board, sales.latitude, sales.longitude, \
             sales.roaming, sales.sold_at \
             FROM sales \
             JOIN users ON users.id = sales.user_id \
             JOIN unit_assignments ON unit_assignments.user_id = users.id \
             JOIN units ON units.id = unit_assignments.unit_id \
             JOIN boards ON boards.id = units.board_id{}",
            where_clause
        );

        SqlResult { sql, params }
    }

    pub async fn fetch_all(&self, pool: &PgPool) -> Result<Vec<SaleRecord>, DatabaseError> {
        let result = self.to_sql();
        let mut q = sqlx::query_as::<_, SaleRecord>(&result.sql);
        for p in result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_all(pool).await?)
    }

    pub async fn fetch_optional(&self, pool: &PgPool) -> Result<Option<SaleRecord>, DatabaseError> {
        let result = self.to_sql();
        let mut q = sqlx::query_as::<_, SaleRecord>(&result.sql);
        for p in result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_optional(pool).await?)
    }
}
