//! Ranked post feeds and single-post reads.

use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        post::{PostRow, PostView},
        user::UserRef,
        vote::VoteTally,
    },
    services::{
        aggregates,
        feed_cache::FeedScope,
        ranking::{Ranked, page_slice, rank},
    },
};

const POST_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.content,
        p.author_id, u.username AS author_username, u.profile_picture AS author_profile_picture,
        p.subrabbit_id, s.name AS subrabbit_name,
        p.created_at, p.updated_at
    FROM posts p
    JOIN users u ON u.id = p.author_id
    JOIN subrabbits s ON s.id = p.subrabbit_id
"#;

/// Posts of a scope in store (insertion) order.
async fn fetch_scope(pool: &PgPool, scope: &FeedScope) -> Result<Vec<PostRow>, AppError> {
    let rows = match scope {
        FeedScope::All => {
            let sql = format!("{POST_SELECT} ORDER BY p.id");
            sqlx::query_as::<_, PostRow>(&sql).fetch_all(pool).await?
        }
        FeedScope::Community(name) => {
            let sql = format!("{POST_SELECT} WHERE s.name = $1 ORDER BY p.id");
            sqlx::query_as::<_, PostRow>(&sql)
                .bind(name)
                .fetch_all(pool)
                .await?
        }
        FeedScope::Subscriptions(user_id) => {
            let sql = format!(
                "{POST_SELECT} WHERE p.subrabbit_id IN \
                 (SELECT subrabbit_id FROM subrabbit_subscribers WHERE user_id = $1) \
                 ORDER BY p.id"
            );
            sqlx::query_as::<_, PostRow>(&sql)
                .bind(user_id)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows)
}

/// Every post of `scope`, best first, with aggregates computed now.
pub async fn load_ranked(pool: &PgPool, scope: &FeedScope) -> Result<Vec<PostView>, AppError> {
    let rows = fetch_scope(pool, scope).await?;
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();

    let tallies = aggregates::post_tallies(pool, &ids).await?;
    let counts = aggregates::comment_counts(pool, &ids).await?;

    Ok(rank(rows, &tallies, Some(&counts))
        .into_iter()
        .map(PostView::from)
        .collect())
}

/// One page of the ranked feed. Viewer-independent, so it can be shared via the cache.
pub async fn load_page(
    pool: &PgPool,
    scope: &FeedScope,
    page: u32,
    page_size: u32,
) -> Result<Vec<PostView>, AppError> {
    let ranked = load_ranked(pool, scope).await?;
    Ok(page_slice(&ranked, page, page_size))
}

/// Fills `current_user_vote` for the viewer; always read fresh.
pub async fn attach_viewer_votes(
    pool: &PgPool,
    viewer: Option<UserRef>,
    mut posts: Vec<PostView>,
) -> Result<Vec<PostView>, AppError> {
    let Some(viewer) = viewer else {
        return Ok(posts);
    };
    let ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
    let mine = aggregates::viewer_post_votes(pool, viewer.id, &ids).await?;
    for post in &mut posts {
        post.current_user_vote = mine.get(&post.id).copied();
    }
    Ok(posts)
}

pub async fn fetch_post(pool: &PgPool, post_id: i64) -> Result<PostRow, AppError> {
    let sql = format!("{POST_SELECT} WHERE p.id = $1");
    sqlx::query_as::<_, PostRow>(&sql)
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

/// A single post with its aggregates and the viewer's vote.
pub async fn load_post(
    pool: &PgPool,
    post_id: i64,
    viewer: Option<UserRef>,
) -> Result<PostView, AppError> {
    let row = fetch_post(pool, post_id).await?;
    let ids = [row.id];

    let tally = aggregates::post_tallies(pool, &ids)
        .await?
        .remove(&row.id)
        .unwrap_or_default();
    let comment_count = aggregates::comment_counts(pool, &ids)
        .await?
        .remove(&row.id)
        .unwrap_or(0);

    let view = PostView::from(Ranked {
        item: row,
        net_votes: VoteTally::net(&tally),
        comment_count,
    });
    let mut views = attach_viewer_votes(pool, viewer, vec![view]).await?;
    views
        .pop()
        .ok_or_else(|| AppError::InternalServerError("post vanished while loading".to_string()))
}
