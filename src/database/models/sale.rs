use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// The denormalized sale shape every read path returns: sale columns
/// joined through the seller's assignment up to the board, with
/// `nearest_unit` resolved from the override name when the sale roamed.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SaleRecord {
    pub sale_id: Uuid,
    pub sale_value: Decimal,
    pub salesperson: String,
    pub nearest_unit: String,
    pub board: String,
    pub latitude: f64,
    pub longitude: f64,
    pub roaming: bool,
    pub sold_at: DateTime<Utc>,
}

/// A sale row as inserted. Immutable after insert; only the optional
/// enrichment relation is attached later.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub id: Uuid,
    pub user_id: Uuid,
    pub override_unit_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub sale_value: Decimal,
    pub ip_address: String,
    pub roaming: bool,
    pub sold_at: DateTime<Utc>,
}
