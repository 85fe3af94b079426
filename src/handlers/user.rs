use axum::{
    Json,
    extract::{Multipart, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    handlers::editor::read_upload,
    models::user::{UpdateUsernameRequest, User},
    state::SharedObjectStore,
    utils::jwt::AuthUser,
};

/// Returns the authenticated user's profile.
pub async fn me(
    State(pool): State<PgPool>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, profile_picture, created_at FROM users WHERE id = $1",
    )
    .bind(user.id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

pub async fn update_username(
    State(pool): State<PgPool>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateUsernameRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let username: String = sqlx::query_scalar(
        "UPDATE users SET username = $1 WHERE id = $2 RETURNING username",
    )
    .bind(&payload.username)
    .bind(user.id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::conflict(
                format!("Username '{}' already exists", payload.username),
                "Please choose a different username",
            )
        } else {
            AppError::from(e)
        }
    })?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({ "username": username })))
}

/// Replaces the avatar with the uploaded `profile_picture` image.
pub async fn update_profile_picture(
    State(pool): State<PgPool>,
    State(objects): State<SharedObjectStore>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let upload = read_upload(&mut multipart, "profile_picture").await?;
    if !upload.is_image() {
        return Err(AppError::BadRequest("Profile picture must be an image".to_string()));
    }

    let stored = objects.put(&upload.file_name, upload.bytes).await?;

    sqlx::query("UPDATE users SET profile_picture = $1 WHERE id = $2")
        .bind(&stored.url)
        .bind(user.id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "profile_picture": stored.url })))
}
