use axum::{
    extract::{ConnectInfo, Path, Query},
    http::HeaderMap,
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::auth::AuthActor;
use crate::services::sale_service::{RecordSaleInput, SaleFilters, SaleService};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub board: Option<String>,
    pub unit: Option<String>,
    pub salesperson: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

async fn service() -> Result<SaleService, ApiError> {
    let pool = DatabaseManager::pool().await?;
    Ok(SaleService::new(pool.clone()))
}

/// GET /api/sales - scoped listing with totals and filter menus
pub async fn list_sales(
    Extension(actor): Extension<AuthActor>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let period = match (query.from, query.to) {
        (Some(from), Some(to)) => Some((from, to)),
        (None, None) => None,
        _ => {
            return Err(ApiError::bad_request(
                "Date filtering requires both 'from' and 'to'",
            ))
        }
    };

    let filters = SaleFilters {
        board: query.board,
        unit: query.unit,
        salesperson: query.salesperson,
        period,
    };

    let listing = service().await?.list_sales(&actor, &filters).await?;
    Ok(Json(json!({ "success": true, "data": listing })))
}

/// GET /api/sales/:id - scoped detail lookup
pub async fn get_sale(
    Extension(actor): Extension<AuthActor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let sale = service().await?.get_sale(&actor, id).await?;
    Ok(Json(json!({ "success": true, "data": sale })))
}

/// POST /api/sales - record a geo-tagged sale
pub async fn create_sale(
    Extension(actor): Extension<AuthActor>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(input): Json<RecordSaleInput>,
) -> Result<Json<Value>, ApiError> {
    validate_sale_input(&input)?;

    let ip = client_ip(&headers, remote);
    let sale = service().await?.record_sale(&actor, input, ip).await?;
    Ok(Json(json!({ "success": true, "data": sale })))
}

fn validate_sale_input(input: &RecordSaleInput) -> Result<(), ApiError> {
    let mut field_errors = HashMap::new();

    if !(-90.0..=90.0).contains(&input.latitude) {
        field_errors.insert("latitude".to_string(), "Must be between -90 and 90".to_string());
    }
    if !(-180.0..=180.0).contains(&input.longitude) {
        field_errors.insert("longitude".to_string(), "Must be between -180 and 180".to_string());
    }
    if input.sale_value.is_sign_negative() || input.sale_value.is_zero() {
        field_errors.insert("sale_value".to_string(), "Must be greater than zero".to_string());
    }

    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation_error("One or more fields are invalid", Some(field_errors)))
    }
}

/// Submitter IP: first X-Forwarded-For hop when present, else the socket
/// peer address.
fn client_ip(headers: &HeaderMap, remote: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| remote.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn input(lat: f64, lon: f64, value: Decimal) -> RecordSaleInput {
        RecordSaleInput { latitude: lat, longitude: lon, sale_value: value, sold_at: None }
    }

    #[test]
    fn accepts_valid_input() {
        assert!(validate_sale_input(&input(-23.5, -46.6, Decimal::new(100, 0))).is_ok());
    }

    #[test]
    fn rejects_out_of_range_coordinates_and_value() {
        let err = validate_sale_input(&input(91.0, -200.0, Decimal::ZERO)).unwrap_err();
        assert_eq!(err.status_code(), 400);
        let body = err.to_json();
        let fields = body["field_errors"].as_object().unwrap();
        assert!(fields.contains_key("latitude"));
        assert!(fields.contains_key("longitude"));
        assert!(fields.contains_key("sale_value"));
    }

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "198.51.100.7, 10.0.0.1".parse().unwrap());
        let remote: SocketAddr = "192.0.2.1:443".parse().unwrap();
        assert_eq!(client_ip(&headers, remote), "198.51.100.7");
        assert_eq!(client_ip(&HeaderMap::new(), remote), "192.0.2.1");
    }
}
