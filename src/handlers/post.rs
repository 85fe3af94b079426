use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    handlers::community::{fetch_subrabbit, is_moderator},
    models::{
        comment::Comment,
        post::{CreatePostRequest, FeedParams, PostDetailView, PostView},
        user::UserRef,
    },
    services::{
        aggregates,
        comment_tree::build_tree,
        feed,
        feed_cache::{self, FeedKey, FeedScope},
    },
    state::SharedFeedCache,
    utils::jwt::{AuthUser, Viewer},
};

pub async fn create_post(
    State(pool): State<PgPool>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let community_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM subrabbits WHERE id = $1)")
            .bind(payload.subrabbit_id)
            .fetch_one(&pool)
            .await?;
    if !community_exists {
        return Err(AppError::NotFound("Subrabbit not found".to_string()));
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO posts (author_id, subrabbit_id, title, content)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(user.id)
    .bind(payload.subrabbit_id)
    .bind(&payload.title)
    .bind(SqlJson(&payload.content))
    .fetch_one(&pool)
    .await?;

    tracing::info!(post_id = id, subrabbit_id = payload.subrabbit_id, author = user.id, "post created");
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// Serves one page of `scope`, sharing page one through the cache.
async fn serve_feed(
    pool: &PgPool,
    cache: &SharedFeedCache,
    config: &Config,
    viewer: Option<UserRef>,
    scope: FeedScope,
    page: Option<u32>,
) -> Result<Vec<PostView>, AppError> {
    let page = page.unwrap_or(1).max(1);
    let page_size = config.feed_page_size;
    let key = FeedKey::new(scope, page);

    let posts = feed_cache::get_or_compute(cache.as_ref(), key.clone(), || {
        feed::load_page(pool, &key.scope, page, page_size)
    })
    .await?;

    feed::attach_viewer_votes(pool, viewer, posts).await
}

/// Home feed. Signed-in users see their subscriptions unless a community is named.
pub async fn list_posts(
    State(pool): State<PgPool>,
    State(cache): State<SharedFeedCache>,
    State(config): State<Config>,
    Viewer(viewer): Viewer,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, AppError> {
    // Unknown communities are a 404 and never get a cache key.
    let scope = match (params.subrabbit_name.as_deref(), viewer) {
        (Some(name), _) => FeedScope::Community(fetch_subrabbit(&pool, name).await?.name),
        (None, Some(user)) => FeedScope::Subscriptions(user.id),
        (None, None) => FeedScope::All,
    };

    let posts = serve_feed(&pool, &cache, &config, viewer, scope, params.page).await?;
    Ok(Json(posts))
}

pub async fn subrabbit_posts(
    State(pool): State<PgPool>,
    State(cache): State<SharedFeedCache>,
    State(config): State<Config>,
    Viewer(viewer): Viewer,
    Path(name): Path<String>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, AppError> {
    let row = fetch_subrabbit(&pool, &name).await?;

    let scope = FeedScope::Community(row.name);
    let posts = serve_feed(&pool, &cache, &config, viewer, scope, params.page).await?;
    Ok(Json(posts))
}

/// A post with its aggregates and the full ranked comment forest.
pub async fn post_detail(
    State(pool): State<PgPool>,
    Viewer(viewer): Viewer,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = feed::load_post(&pool, id, viewer).await?;

    let comments = sqlx::query_as::<_, Comment>(
        r#"
        SELECT
            c.id, c.post_id, c.parent_id, c.content,
            c.author_id, u.username AS author_username, u.profile_picture AS author_profile_picture,
            c.created_at
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.post_id = $1
        ORDER BY c.id
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let tallies = aggregates::comment_tallies(&pool, id).await?;
    let mine = match viewer {
        Some(user) => aggregates::viewer_comment_votes(&pool, user.id, id).await?,
        None => Default::default(),
    };

    let comments = build_tree(comments, &tallies, &mine)?;

    Ok(Json(PostDetailView { post, comments }))
}

/// Deletes a post. Allowed for its author and the community's moderators.
pub async fn delete_post(
    State(pool): State<PgPool>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = feed::fetch_post(&pool, id).await?;

    if post.author_id != user.id && !is_moderator(&pool, post.subrabbit_id, user.id).await? {
        return Err(AppError::Forbidden(
            "You are not allowed to delete this post".to_string(),
        ));
    }

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    tracing::info!(post_id = id, by = user.id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}
