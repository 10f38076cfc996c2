use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Top-level org node. Reference data, maintained outside this service.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BoardRow {
    pub id: Uuid,
    pub board_name: String,
}

/// Physical branch location under a board, with its registered coordinate.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UnitRow {
    pub id: Uuid,
    pub unit_name: String,
    pub board_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SalespersonRow {
    pub id: Uuid,
    pub name: String,
}

/// A seller's active (board, unit) assignment joined with the unit's
/// registered coordinate -- the "home" used for roaming detection.
#[derive(Debug, Clone, FromRow)]
pub struct SellerAssignment {
    pub board_id: Uuid,
    pub unit_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
}
