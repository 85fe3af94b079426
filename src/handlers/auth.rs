// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    models::user::{CreateUserRequest, LoginRequest, User},
    utils::{
        cookies::{REFRESH_COOKIE, clear_tokens, issue_tokens},
        hash::{hash_password, verify_password},
        jwt::{TokenKind, verify_jwt},
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, password)
        VALUES ($1, $2)
        RETURNING id, username, password, profile_picture, created_at
        "#,
    )
    .bind(&payload.username)
    .bind(&hashed_password)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::conflict(
                format!("Username '{}' already exists", payload.username),
                "Please choose a different username",
            )
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    tracing::info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and sets the access/refresh cookies.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, profile_picture, created_at FROM users WHERE username = $1",
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::from(e)
    })?
    .ok_or_else(|| AppError::AuthError("Invalid username or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid username or password".to_string()));
    }

    let jar = issue_tokens(jar, &config, user.id)?;
    Ok((jar, Json(user)))
}

/// Rotates the token pair using the refresh cookie.
pub async fn refresh(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| AppError::AuthError("Refresh token is missing".to_string()))?;

    let user = verify_jwt(&token, &config.jwt_secret, TokenKind::Refresh)?.user()?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(user.id)
        .fetch_one(&pool)
        .await?;
    if !exists {
        return Err(AppError::AuthError("User not found".to_string()));
    }

    let jar = issue_tokens(jar, &config, user.id)?;
    Ok((jar, Json(json!({ "refreshed": true }))))
}

/// Clears the auth cookies. Always succeeds.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (clear_tokens(jar), Json(json!({ "logged_out": true })))
}
