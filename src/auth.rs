use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::UserRole;

/// Authenticated principal extracted from the bearer token the external
/// auth subsystem issues. Ledger operations receive this explicitly; there
/// is no ambient current-user state.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    role: UserRole,
    email: Option<String>,
    full_name: Option<String>,
    #[allow(dead_code)]
    exp: usize,
}

pub fn require_user(config: &AppConfig, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let secret = config.auth_jwt_secret.as_deref().ok_or_else(|| {
        AppError::Dependency("Auth is not configured. Set AUTH_JWT_SECRET.".to_string())
    })?;

    let token = bearer_token(headers)?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token.".to_string()))?;

    let id = Uuid::parse_str(data.claims.sub.trim())
        .map_err(|_| AppError::Unauthorized("Token subject is not a valid user id.".to_string()))?;

    Ok(AuthUser {
        id,
        role: data.claims.role,
        email: data.claims.email,
        full_name: data.claims.full_name,
    })
}

pub fn require_owner(config: &AppConfig, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let user = require_user(config, headers)?;
    match user.role {
        UserRole::Owner => Ok(user),
        UserRole::Renter => Err(AppError::Forbidden(
            "Forbidden: this action requires an owner account.".to_string(),
        )),
    }
}

pub fn require_renter(config: &AppConfig, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let user = require_user(config, headers)?;
    match user.role {
        UserRole::Renter => Ok(user),
        UserRole::Owner => Err(AppError::Forbidden(
            "Forbidden: this action requires a renter account.".to_string(),
        )),
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let raw = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("Missing Authorization header.".to_string())
        })?;

    raw.strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Malformed Authorization header.".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    const SECRET: &str = "test-secret";

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        role: &'a str,
        email: Option<&'a str>,
        full_name: Option<&'a str>,
        exp: usize,
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::from_env();
        config.auth_jwt_secret = Some(SECRET.to_string());
        config
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn token(sub: &str, role: &str) -> String {
        let claims = TestClaims {
            sub,
            role,
            email: Some("owner@example.com"),
            full_name: Some("Asha Rao"),
            exp: 4102444800, // 2100-01-01
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_owner_token() {
        let id = Uuid::new_v4();
        let headers = headers_with(&token(&id.to_string(), "owner"));
        let user = require_owner(&config(), &headers).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, UserRole::Owner);
    }

    #[test]
    fn renter_token_is_forbidden_on_owner_surface() {
        let headers = headers_with(&token(&Uuid::new_v4().to_string(), "renter"));
        assert!(matches!(
            require_owner(&config(), &headers),
            Err(AppError::Forbidden(_))
        ));
        assert!(require_renter(&config(), &headers).is_ok());
    }

    #[test]
    fn missing_header_is_unauthorized() {
        assert!(matches!(
            require_user(&config(), &HeaderMap::new()),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn garbage_token_is_unauthorized() {
        let headers = headers_with("not-a-jwt");
        assert!(matches!(
            require_user(&config(), &headers),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn non_uuid_subject_is_unauthorized() {
        let headers = headers_with(&token("alice", "owner"));
        assert!(matches!(
            require_user(&config(), &headers),
            Err(AppError::Unauthorized(_))
        ));
    }
}
