use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents a 'comments' row joined with its author.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    /// The comment being replied to; `None` for top-level comments.
    pub parent_id: Option<i64>,
    pub content: String,
    pub author_id: i64,
    pub author_username: String,
    pub author_profile_picture: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub post_id: i64,

    #[validate(length(
        min = 1,
        max = 10000,
        message = "Comment must be between 1 and 10000 characters"
    ))]
    pub content: String,

    /// Optional: the ID of the comment being replied to.
    pub reply_to_id: Option<i64>,
}
