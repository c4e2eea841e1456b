///! Authentication middleware
///!
///! Verifies HS256 bearer tokens and places the caller's identity in the
///! request extensions. Token issuance belongs to the login service; the
///! signing helper here exists for tooling and tests.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Authentication error response
#[derive(Serialize)]
pub struct AuthError {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let json = Json(self);
        (StatusCode::UNAUTHORIZED, json).into_response()
    }
}

/// Authenticated caller
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // subject (user ID)
    pub username: String,
    pub exp: usize,       // expiration time (seconds since epoch)
    pub iat: usize,       // issued at (seconds since epoch)
}

/// Require a valid bearer token
pub async fn auth_middleware(
    State(state): State<Arc<crate::AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AuthError {
            error: "unauthorized".to_string(),
            message: "Authentication required. Provide a Bearer token.".to_string(),
        })?;

    let claims = validate_jwt_token(token, &state.config.auth.jwt_secret).map_err(|e| AuthError {
        error: "invalid_token".to_string(),
        message: format!("Invalid JWT token: {}", e),
    })?;

    request.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
        username: claims.username,
    });

    Ok(next.run(request).await)
}

/// Validate JWT token with signature and expiry verification
pub fn validate_jwt_token(token: &str, secret: &str) -> Result<Claims, String> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| format!("JWT validation failed: {}", e))?;

    Ok(token_data.claims)
}

/// Sign a token for a user, valid for `ttl_secs`
pub fn generate_jwt_token(
    user_id: &str,
    username: &str,
    secret: &str,
    ttl_secs: usize,
) -> Result<String, String> {
    let now = chrono::Utc::now().timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp: now + ttl_secs,
        iat: now,
    };

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::new(Algorithm::HS256);

    encode(&header, &claims, &encoding_key)
        .map_err(|e| format!("Failed to generate JWT: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-0123456789abcdef0123";

    #[test]
    fn test_round_trip() {
        let token = generate_jwt_token("user123", "alice", SECRET, 3600).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = validate_jwt_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "user123");
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = generate_jwt_token("user123", "alice", SECRET, 3600).unwrap();
        assert!(validate_jwt_token(&token, "another-secret-entirely-000000000").is_err());
    }

    #[test]
    fn test_validate_invalid_token() {
        assert!(validate_jwt_token("invalid", SECRET).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: "user123".to_string(),
            username: "alice".to_string(),
            exp: now - 3600,
            iat: now - 7200,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(validate_jwt_token(&token, SECRET).is_err());
    }
}
