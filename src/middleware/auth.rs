use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{Json, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use uuid::Uuid;

use crate::auth::Claims;
use crate::config;
use crate::error::ApiError;
use crate::org::Role;

/// Authenticated actor context extracted from the bearer token.
#[derive(Clone, Debug)]
pub struct AuthActor {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub board_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
}

impl AuthActor {
    /// The parsed role, or `None` when the token carries a role this build
    /// does not recognize.
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

impl From<Claims> for AuthActor {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            role: claims.role,
            board_id: claims.board_id,
            unit_id: claims.unit_id,
        }
    }
}

/// JWT authentication middleware that validates tokens and injects the
/// actor into request extensions.
pub async fn jwt_auth_middleware(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<serde_json::Value>)> {
    let token = extract_jwt_from_headers(&headers).map_err(unauthorized)?;
    let claims = validate_jwt(&token).map_err(unauthorized)?;

    let actor = AuthActor::from(claims);
    request.extensions_mut().insert(actor);

    Ok(next.run(request).await)
}

fn unauthorized(msg: String) -> (StatusCode, Json<serde_json::Value>) {
    let api_error = ApiError::unauthorized(msg);
    (
        StatusCode::from_u16(api_error.status_code()).unwrap_or(StatusCode::UNAUTHORIZED),
        Json(api_error.to_json()),
    )
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"))
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

/// Validate JWT token and extract claims
fn validate_jwt(token: &str) -> Result<Claims, String> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err("JWT secret not configured".to_string());
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| format!("Invalid JWT token: {}", e))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::generate_jwt;

    #[test]
    fn token_round_trip_preserves_actor_fields() {
        let user_id = Uuid::new_v4();
        let board_id = Uuid::new_v4();
        let claims = Claims::new(
            user_id,
            "Ana".to_string(),
            "director".to_string(),
            Some(board_id),
            None,
        );

        let token = generate_jwt(claims).expect("dev config has a secret");
        let decoded = validate_jwt(&token).expect("token just minted");
        let actor = AuthActor::from(decoded);

        assert_eq!(actor.id, user_id);
        assert_eq!(actor.board_id, Some(board_id));
        assert_eq!(actor.unit_id, None);
        assert_eq!(actor.role(), Some(Role::Director));
    }

    #[test]
    fn unknown_role_string_parses_to_none() {
        let actor = AuthActor {
            id: Uuid::new_v4(),
            name: "X".to_string(),
            role: "auditor".to_string(),
            board_id: None,
            unit_id: None,
        };
        assert_eq!(actor.role(), None);
    }

    #[test]
    fn rejects_non_bearer_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic abc123".parse().unwrap());
        assert!(extract_jwt_from_headers(&headers).is_err());

        let empty = HeaderMap::new();
        assert!(extract_jwt_from_headers(&empty).is_err());
    }
}
