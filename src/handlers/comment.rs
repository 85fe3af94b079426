use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::comment::{Comment, CreateCommentRequest},
    services::comment_tree::{CommentNode, MAX_DEPTH},
    utils::{html::clean_html, jwt::AuthUser},
};

/// Level of `comment_id` in its thread, counting a top-level comment as 1.
/// Stops climbing once past `MAX_DEPTH`.
async fn reply_depth(pool: &PgPool, comment_id: i64) -> Result<usize, AppError> {
    let depth: Option<i32> = sqlx::query_scalar(
        r#"
        WITH RECURSIVE chain (id, parent_id, depth) AS (
            SELECT id, parent_id, 1 FROM comments WHERE id = $1
            UNION ALL
            SELECT c.id, c.parent_id, chain.depth + 1
            FROM comments c
            JOIN chain ON c.id = chain.parent_id
            WHERE chain.depth <= $2
        )
        SELECT MAX(depth) FROM chain
        "#,
    )
    .bind(comment_id)
    .bind(MAX_DEPTH as i32)
    .fetch_one(pool)
    .await?;

    Ok(depth.unwrap_or(0).max(0) as usize)
}

/// Adds a comment to a post, optionally as a reply.
///
/// A reply must target a comment of the same post.
pub async fn create_comment(
    State(pool): State<PgPool>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let post_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1)")
        .bind(payload.post_id)
        .fetch_one(&pool)
        .await?;
    if !post_exists {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    if let Some(parent_id) = payload.reply_to_id {
        let parent_post: i64 = sqlx::query_scalar("SELECT post_id FROM comments WHERE id = $1")
            .bind(parent_id)
            .fetch_optional(&pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;
        if parent_post != payload.post_id {
            return Err(AppError::BadRequest(
                "Parent comment belongs to a different post".to_string(),
            ));
        }
        if reply_depth(&pool, parent_id).await? >= MAX_DEPTH {
            return Err(AppError::BadRequest(format!(
                "Replies cannot be nested more than {MAX_DEPTH} levels deep"
            )));
        }
    }

    let content = clean_html(&payload.content);
    if content.trim().is_empty() {
        return Err(AppError::BadRequest("Comment is empty".to_string()));
    }

    let comment = sqlx::query_as::<_, Comment>(
        r#"
        WITH inserted AS (
            INSERT INTO comments (author_id, post_id, parent_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, post_id, parent_id, content, author_id, created_at
        )
        SELECT
            i.id, i.post_id, i.parent_id, i.content,
            i.author_id, u.username AS author_username, u.profile_picture AS author_profile_picture,
            i.created_at
        FROM inserted i
        JOIN users u ON u.id = i.author_id
        "#,
    )
    .bind(user.id)
    .bind(payload.post_id)
    .bind(payload.reply_to_id)
    .bind(&content)
    .fetch_one(&pool)
    .await?;

    tracing::info!(
        comment_id = comment.id,
        post_id = comment.post_id,
        parent_id = ?comment.parent_id,
        "comment created"
    );
    Ok((StatusCode::CREATED, Json(CommentNode::leaf(comment, 0, None))))
}
