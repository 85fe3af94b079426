//! Grouped counts over the vote ledger and comment table.
//!
//! Aggregates are recomputed on every read; nothing here is persisted.

use std::collections::HashMap;

use sqlx::PgPool;

use crate::{
    error::AppError,
    models::vote::{VoteTally, VoteType},
    services::ranking::tally_votes,
};

fn decode_rows(rows: Vec<(i64, String, i64)>) -> Result<HashMap<i64, VoteTally>, AppError> {
    let typed = rows
        .into_iter()
        .map(|(id, kind, count)| {
            kind.parse::<VoteType>()
                .map(|kind| (id, kind, count))
                .map_err(|_| AppError::DataIntegrity(format!("unknown vote type {kind:?}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tally_votes(typed))
}

fn decode_votes(rows: Vec<(i64, String)>) -> Result<HashMap<i64, VoteType>, AppError> {
    rows.into_iter()
        .map(|(id, kind)| {
            kind.parse::<VoteType>()
                .map(|kind| (id, kind))
                .map_err(|_| AppError::DataIntegrity(format!("unknown vote type {kind:?}")))
        })
        .collect()
}

/// Up/down counts per post.
pub async fn post_tallies(pool: &PgPool, post_ids: &[i64]) -> Result<HashMap<i64, VoteTally>, AppError> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, String, i64)> = sqlx::query_as(
        r#"
        SELECT post_id, vote_type, COUNT(*)
        FROM votes
        WHERE post_id = ANY($1)
        GROUP BY post_id, vote_type
        "#,
    )
    .bind(post_ids)
    .fetch_all(pool)
    .await?;
    decode_rows(rows)
}

/// Number of comments per post.
pub async fn comment_counts(pool: &PgPool, post_ids: &[i64]) -> Result<HashMap<i64, i64>, AppError> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT post_id, COUNT(*)
        FROM comments
        WHERE post_id = ANY($1)
        GROUP BY post_id
        "#,
    )
    .bind(post_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Up/down counts for every comment of one post.
pub async fn comment_tallies(pool: &PgPool, post_id: i64) -> Result<HashMap<i64, VoteTally>, AppError> {
    let rows: Vec<(i64, String, i64)> = sqlx::query_as(
        r#"
        SELECT v.comment_id, v.vote_type, COUNT(*)
        FROM votes v
        JOIN comments c ON c.id = v.comment_id
        WHERE c.post_id = $1
        GROUP BY v.comment_id, v.vote_type
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;
    decode_rows(rows)
}

/// The viewer's own votes on the given posts.
pub async fn viewer_post_votes(
    pool: &PgPool,
    user_id: i64,
    post_ids: &[i64],
) -> Result<HashMap<i64, VoteType>, AppError> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT post_id, vote_type FROM votes WHERE user_id = $1 AND post_id = ANY($2)",
    )
    .bind(user_id)
    .bind(post_ids)
    .fetch_all(pool)
    .await?;
    decode_votes(rows)
}

/// The viewer's own votes on the comments of one post.
pub async fn viewer_comment_votes(
    pool: &PgPool,
    user_id: i64,
    post_id: i64,
) -> Result<HashMap<i64, VoteType>, AppError> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT v.comment_id, v.vote_type
        FROM votes v
        JOIN comments c ON c.id = v.comment_id
        WHERE v.user_id = $1 AND c.post_id = $2
        "#,
    )
    .bind(user_id)
    .bind(post_id)
    .fetch_all(pool)
    .await?;
    decode_votes(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouped_rows_fold_into_tallies() {
        let tallies = decode_rows(vec![
            (1, "UP".into(), 3),
            (1, "DOWN".into(), 1),
            (2, "DOWN".into(), 2),
        ])
        .unwrap();

        assert_eq!(tallies[&1].net(), 2);
        assert_eq!(tallies[&2].net(), -2);
        assert!(!tallies.contains_key(&3));
    }

    #[test]
    fn unknown_stored_type_is_an_integrity_error() {
        assert!(matches!(
            decode_rows(vec![(1, "MEH".into(), 1)]),
            Err(AppError::DataIntegrity(_))
        ));
        assert!(matches!(
            decode_votes(vec![(1, "meh".into())]),
            Err(AppError::DataIntegrity(_))
        ));
    }
}
