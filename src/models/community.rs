use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::user::{AuthorView, UserRef};

/// Represents the 'subrabbits' table joined with its creator and member count.
#[derive(Debug, Clone, FromRow)]
pub struct SubrabbitRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub rules: Option<String>,
    pub creator_id: i64,
    pub creator_username: String,
    pub members_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Compact listing entry used by the sidebar and search.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SubrabbitSummary {
    pub id: i64,
    pub name: String,
    pub creator_id: i64,
    pub members_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Embedded reference to the owning community in post views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubrabbitRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatorView {
    pub id: i64,
    pub username: String,
}

/// Read model for `GET /subrabbit/{name}`.
#[derive(Debug, Clone, Serialize)]
pub struct SubrabbitView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub rules: Option<String>,
    pub creator: CreatorView,
    pub moderators: Vec<AuthorView>,
    pub members_count: i64,
    /// Present only for authenticated viewers.
    #[serde(rename = "isSubscriber", skip_serializing_if = "Option::is_none")]
    pub is_subscriber: Option<bool>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl SubrabbitView {
    pub fn new(
        row: SubrabbitRow,
        moderators: Vec<AuthorView>,
        viewer: Option<UserRef>,
        viewer_subscribed: bool,
    ) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            rules: row.rules,
            creator: CreatorView {
                id: row.creator_id,
                username: row.creator_username,
            },
            moderators,
            members_count: row.members_count,
            is_subscriber: is_subscriber(viewer, viewer_subscribed),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Subscription flag as shown to a viewer; anonymous viewers get no flag at all.
pub fn is_subscriber(viewer: Option<UserRef>, subscribed: bool) -> Option<bool> {
    viewer.map(|_| subscribed)
}

/// Write model for `POST /subrabbits`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubrabbitRequest {
    #[validate(length(min = 3, max = 21, message = "Please choose a name between 3 and 21 letters."))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: String,
    #[validate(length(max = 500))]
    pub rules: Option<String>,
}

/// Write model for `PATCH /subrabbit/{name}`. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSubrabbitRequest {
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub rules: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> CreateSubrabbitRequest {
        CreateSubrabbitRequest {
            name: name.to_string(),
            description: String::new(),
            rules: None,
        }
    }

    #[test]
    fn name_length_bounds() {
        assert!(request("go").validate().is_err());
        assert!(request("golang").validate().is_ok());
        assert!(request("abc").validate().is_ok());
        assert!(request(&"a".repeat(21)).validate().is_ok());
        assert!(request(&"a".repeat(22)).validate().is_err());
    }

    #[test]
    fn name_length_counts_characters() {
        // 7 characters, 21 bytes
        assert!(request("ラビットの巣穴").validate().is_ok());
    }

    #[test]
    fn subscriber_flag_hidden_for_anonymous() {
        assert_eq!(is_subscriber(None, true), None);
        assert_eq!(is_subscriber(Some(UserRef { id: 1 }), false), Some(false));
        assert_eq!(is_subscriber(Some(UserRef { id: 1 }), true), Some(true));
    }
}
