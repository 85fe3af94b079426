use axum::{Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::vote::{CommentVoteRequest, PostVoteRequest, VoteResponse, VoteTarget, VoteType},
    services::ledger,
    utils::jwt::AuthUser,
};

fn required<T>(value: Option<T>) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::BadRequest("Missing required fields".to_string()))
}

async fn cast(
    pool: &PgPool,
    user_id: i64,
    target: VoteTarget,
    raw_vote: &str,
) -> Result<VoteResponse, AppError> {
    // Parsed before the target is looked up: a bad type is 400 even for a missing target.
    let vote_type: VoteType = raw_vote.parse()?;
    let result = ledger::apply_vote(pool, user_id, target, vote_type).await?;
    Ok(VoteResponse { result })
}

/// Votes on a post. Repeating the same vote retracts it.
pub async fn vote_post(
    State(pool): State<PgPool>,
    AuthUser(user): AuthUser,
    Json(payload): Json<PostVoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let post_id = required(payload.post_id)?;
    let vote = required(payload.vote_type)?;

    let response = cast(&pool, user.id, VoteTarget::Post(post_id), &vote).await?;
    Ok(Json(response))
}

pub async fn vote_comment(
    State(pool): State<PgPool>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CommentVoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let comment_id = required(payload.comment_id)?;
    let vote = required(payload.vote_type)?;

    let response = cast(&pool, user.id, VoteTarget::Comment(comment_id), &vote).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_bad_requests() {
        assert!(matches!(required::<i64>(None), Err(AppError::BadRequest(_))));
        assert_eq!(required(Some(3)).unwrap(), 3);
    }
}
