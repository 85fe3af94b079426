use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::{
    models::{
        community::SubrabbitRef,
        user::AuthorView,
        vote::VoteType,
    },
    services::{comment_tree::CommentNode, ranking::Ranked},
};

/// Represents a 'posts' row joined with its author and community.
/// Vote and comment aggregates are not columns; see `PostView`.
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    /// Editor.js block document, kept opaque.
    pub content: Json<serde_json::Value>,
    pub author_id: i64,
    pub author_username: String,
    pub author_profile_picture: Option<String>,
    pub subrabbit_id: i64,
    pub subrabbit_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Read model for a post in feeds and on the detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub content: serde_json::Value,
    pub author: AuthorView,
    pub subrabbit: SubrabbitRef,
    pub net_votes: i64,
    pub comments_count: i64,
    /// The viewer's own vote. Never cached; filled per request.
    pub current_user_vote: Option<VoteType>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Ranked<PostRow>> for PostView {
    fn from(ranked: Ranked<PostRow>) -> Self {
        let Ranked {
            item: row,
            net_votes,
            comment_count,
        } = ranked;
        Self {
            id: row.id,
            title: row.title,
            content: row.content.0,
            author: AuthorView {
                id: row.author_id,
                username: row.author_username,
                profile_picture: row.author_profile_picture,
            },
            subrabbit: SubrabbitRef {
                id: row.subrabbit_id,
                name: row.subrabbit_name,
            },
            net_votes,
            comments_count: comment_count,
            current_user_vote: None,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Read model for `GET /post-detail/{id}`.
#[derive(Debug, Serialize)]
pub struct PostDetailView {
    #[serde(flatten)]
    pub post: PostView,
    pub comments: Vec<CommentNode>,
}

/// Write model for `POST /create-post`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Title length must be between 1 and 100 chars"
    ))]
    pub title: String,

    #[validate(custom(function = validate_content))]
    pub content: serde_json::Value,

    pub subrabbit_id: i64,
}

/// Content must be a JSON object (an editor document) of bounded size.
fn validate_content(content: &serde_json::Value) -> Result<(), validator::ValidationError> {
    if !content.is_object() {
        return Err(validator::ValidationError::new("content_must_be_object"));
    }
    if content.to_string().len() > 100_000 {
        return Err(validator::ValidationError::new("payload_too_large"));
    }
    Ok(())
}

/// Query parameters for the ranked feed.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedParams {
    /// 1-based page number (default: 1).
    pub page: Option<u32>,

    /// Restrict the feed to one community.
    pub subrabbit_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_must_be_an_object() {
        let mut req = CreatePostRequest {
            title: "Hello".into(),
            content: json!({ "blocks": [] }),
            subrabbit_id: 1,
        };
        assert!(req.validate().is_ok());

        req.content = json!("just a string");
        assert!(req.validate().is_err());
    }

    #[test]
    fn request_uses_camel_case_keys() {
        let req: CreatePostRequest = serde_json::from_value(json!({
            "title": "t",
            "content": { "blocks": [] },
            "subrabbitId": 7
        }))
        .unwrap();
        assert_eq!(req.subrabbit_id, 7);
    }
}
