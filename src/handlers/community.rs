use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    models::{
        community::{
            CreateSubrabbitRequest, SearchParams, SubrabbitRow, SubrabbitSummary, SubrabbitView,
            UpdateSubrabbitRequest,
        },
        user::{AuthorView, UserRef},
    },
    utils::{
        html::clean_html,
        jwt::{AuthUser, Viewer},
    },
};

const SUBRABBIT_SELECT: &str = r#"
    SELECT
        s.id, s.name, s.description, s.rules,
        s.creator_id, u.username AS creator_username,
        (SELECT COUNT(*) FROM subrabbit_subscribers ss WHERE ss.subrabbit_id = s.id) AS members_count,
        s.created_at, s.updated_at
    FROM subrabbits s
    JOIN users u ON u.id = s.creator_id
"#;

const SUMMARY_SELECT: &str = r#"
    SELECT
        s.id, s.name, s.creator_id,
        (SELECT COUNT(*) FROM subrabbit_subscribers ss WHERE ss.subrabbit_id = s.id) AS members_count,
        s.created_at
    FROM subrabbits s
"#;

pub async fn fetch_subrabbit(pool: &PgPool, name: &str) -> Result<SubrabbitRow, AppError> {
    let sql = format!("{SUBRABBIT_SELECT} WHERE s.name = $1");
    sqlx::query_as::<_, SubrabbitRow>(&sql)
        .bind(name)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subrabbit '{name}' not found")))
}

pub async fn is_moderator(pool: &PgPool, subrabbit_id: i64, user_id: i64) -> Result<bool, AppError> {
    let moderates: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM subrabbit_moderators WHERE subrabbit_id = $1 AND user_id = $2)",
    )
    .bind(subrabbit_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(moderates)
}

async fn load_view(pool: &PgPool, name: &str, viewer: Option<UserRef>) -> Result<SubrabbitView, AppError> {
    let row = fetch_subrabbit(pool, name).await?;

    let moderators = sqlx::query_as::<_, AuthorView>(
        r#"
        SELECT u.id, u.username, u.profile_picture
        FROM subrabbit_moderators m
        JOIN users u ON u.id = m.user_id
        WHERE m.subrabbit_id = $1
        ORDER BY u.id
        "#,
    )
    .bind(row.id)
    .fetch_all(pool)
    .await?;

    let subscribed = match viewer {
        Some(user) => {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM subrabbit_subscribers WHERE subrabbit_id = $1 AND user_id = $2)",
            )
            .bind(row.id)
            .bind(user.id)
            .fetch_one(pool)
            .await?
        }
        None => false,
    };

    Ok(SubrabbitView::new(row, moderators, viewer, subscribed))
}

/// Most popular communities: by members, then newest.
pub async fn list_subrabbits(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let sql = format!("{SUMMARY_SELECT} ORDER BY members_count DESC, s.created_at DESC LIMIT 5");
    let subrabbits = sqlx::query_as::<_, SubrabbitSummary>(&sql)
        .fetch_all(&pool)
        .await?;
    Ok(Json(subrabbits))
}

/// Creates a community. The creator becomes its first subscriber and moderator.
pub async fn create_subrabbit(
    State(pool): State<PgPool>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateSubrabbitRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO subrabbits (creator_id, name, description, rules)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(user.id)
    .bind(&payload.name)
    .bind(clean_html(&payload.description))
    .bind(payload.rules.as_deref().map(clean_html))
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::conflict(
                "A subrabbit with this name already exists.",
                "Please choose a different subrabbit name",
            )
        } else {
            AppError::from(e)
        }
    })?;

    sqlx::query("INSERT INTO subrabbit_subscribers (subrabbit_id, user_id) VALUES ($1, $2)")
        .bind(id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO subrabbit_moderators (subrabbit_id, user_id) VALUES ($1, $2)")
        .bind(id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(subrabbit_id = id, name = %payload.name, creator = user.id, "subrabbit created");
    Ok((StatusCode::CREATED, Json(payload.name)))
}

pub async fn get_subrabbit(
    State(pool): State<PgPool>,
    Viewer(viewer): Viewer,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(load_view(&pool, &name, viewer).await?))
}

/// Edits description/rules. Moderators only.
pub async fn update_subrabbit(
    State(pool): State<PgPool>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
    Json(payload): Json<UpdateSubrabbitRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let row = fetch_subrabbit(&pool, &name).await?;
    if !is_moderator(&pool, row.id, user.id).await? {
        return Err(AppError::Forbidden(
            "Only moderators can edit this subrabbit".to_string(),
        ));
    }

    sqlx::query(
        r#"
        UPDATE subrabbits
        SET description = COALESCE($2, description),
            rules = COALESCE($3, rules),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(row.id)
    .bind(payload.description.as_deref().map(clean_html))
    .bind(payload.rules.as_deref().map(clean_html))
    .execute(&pool)
    .await?;

    Ok(Json(load_view(&pool, &name, Some(user)).await?))
}

/// Deletes a community with all of its posts. Creator only.
pub async fn delete_subrabbit(
    State(pool): State<PgPool>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let row = fetch_subrabbit(&pool, &name).await?;
    if row.creator_id != user.id {
        return Err(AppError::Forbidden(
            "Only the creator can delete this subrabbit".to_string(),
        ));
    }

    sqlx::query("DELETE FROM subrabbits WHERE id = $1")
        .bind(row.id)
        .execute(&pool)
        .await?;

    tracing::info!(subrabbit_id = row.id, "subrabbit deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn subscribe(
    State(pool): State<PgPool>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let row = fetch_subrabbit(&pool, &name).await?;

    sqlx::query(
        "INSERT INTO subrabbit_subscribers (subrabbit_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(row.id)
    .bind(user.id)
    .execute(&pool)
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn unsubscribe(
    State(pool): State<PgPool>,
    AuthUser(user): AuthUser,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let row = fetch_subrabbit(&pool, &name).await?;

    sqlx::query("DELETE FROM subrabbit_subscribers WHERE subrabbit_id = $1 AND user_id = $2")
        .bind(row.id)
        .bind(user.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Escapes LIKE wildcards so user input only ever matches literally.
fn like_prefix(q: &str) -> String {
    let mut pattern = String::with_capacity(q.len() + 1);
    for c in q.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Up to five communities whose name starts with `q`.
pub async fn search_subrabbits(
    State(pool): State<PgPool>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let Some(q) = params.q.filter(|q| !q.is_empty()) else {
        return Ok(Json(Vec::<SubrabbitSummary>::new()));
    };

    let sql = format!("{SUMMARY_SELECT} WHERE s.name LIKE $1 ORDER BY s.name LIMIT 5");
    let matches = sqlx::query_as::<_, SubrabbitSummary>(&sql)
        .bind(like_prefix(&q))
        .fetch_all(&pool)
        .await?;

    Ok(Json(matches))
}
