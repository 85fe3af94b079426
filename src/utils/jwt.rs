// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError, models::user::UserRef, utils::cookies::ACCESS_COOKIE};

/// Access tokens authorize requests; refresh tokens only mint new pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    pub kind: TokenKind,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn user(&self) -> Result<UserRef, AppError> {
        self.sub
            .parse::<i64>()
            .map(|id| UserRef { id })
            .map_err(|_| AppError::AuthError("Invalid token".to_string()))
    }
}

/// Signs a new JWT for the user.
pub fn sign_jwt(
    user_id: i64,
    kind: TokenKind,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        kind,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string of the expected kind.
pub fn verify_jwt(token: &str, secret: &str, expected: TokenKind) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    if token_data.claims.kind != expected {
        return Err(AppError::AuthError("Invalid token".to_string()));
    }
    Ok(token_data.claims)
}

/// The caller as resolved by `identity_middleware`; `None` for anonymous requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Viewer(pub Option<UserRef>);

/// An authenticated caller. Rejects with 401 when the request carries no valid access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserRef);

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().copied().unwrap_or_default())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Viewer>()
            .and_then(|viewer| viewer.0)
            .map(AuthUser)
            .ok_or_else(|| AppError::AuthError("Authentication credentials were not provided".to_string()))
    }
}

/// Pulls the access token from the `access_token` cookie, falling back to a Bearer header.
fn access_token(req: &Request<Body>) -> Option<String> {
    let jar = CookieJar::from_headers(req.headers());
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        return Some(cookie.value().to_string());
    }

    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Axum Middleware: Identity.
///
/// Resolves the caller from the request and injects a `Viewer` into the
/// request extensions. Invalid or expired tokens make the request anonymous;
/// handlers that need a user extract `AuthUser`, which turns that into 401.
pub async fn identity_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let viewer = access_token(&req)
        .and_then(|token| verify_jwt(&token, &config.jwt_secret, TokenKind::Access).ok())
        .and_then(|claims| claims.user().ok());

    req.extensions_mut().insert(Viewer(viewer));
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn round_trip_keeps_subject() {
        let token = sign_jwt(42, TokenKind::Access, SECRET, 60).unwrap();
        let claims = verify_jwt(&token, SECRET, TokenKind::Access).unwrap();
        assert_eq!(claims.user().unwrap(), UserRef { id: 42 });
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let token = sign_jwt(42, TokenKind::Refresh, SECRET, 60).unwrap();
        assert!(verify_jwt(&token, SECRET, TokenKind::Access).is_err());
        assert!(verify_jwt(&token, SECRET, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_jwt(42, TokenKind::Access, SECRET, 60).unwrap();
        assert!(matches!(
            verify_jwt(&token, "another-secret", TokenKind::Access),
            Err(AppError::AuthError(_))
        ));
    }

    #[test]
    fn cookie_wins_over_header() {
        let req = Request::builder()
            .header(header::COOKIE, "theme=dark; access_token=from-cookie")
            .header(header::AUTHORIZATION, "Bearer from-header")
            .body(Body::empty())
            .unwrap();
        assert_eq!(access_token(&req).as_deref(), Some("from-cookie"));

        let req = Request::builder()
            .header(header::AUTHORIZATION, "Bearer from-header")
            .body(Body::empty())
            .unwrap();
        assert_eq!(access_token(&req).as_deref(), Some("from-header"));
    }
}
