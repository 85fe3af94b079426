//! Vote ledger: at most one vote per (user, target), with toggle/flip semantics.

use sqlx::{PgConnection, PgPool};

use crate::{
    error::AppError,
    models::vote::{VoteOutcome, VoteTarget, VoteType},
};

/// Next ledger state for a (user, target) pair.
///
/// Returns what happened and the vote that should be stored afterwards.
pub fn transition(
    existing: Option<VoteType>,
    requested: VoteType,
) -> (VoteOutcome, Option<VoteType>) {
    match existing {
        None => (VoteOutcome::Created, Some(requested)),
        Some(current) if current == requested => (VoteOutcome::Retracted, None),
        Some(_) => (VoteOutcome::Flipped, Some(requested)),
    }
}

/// Applies a vote action as one transaction.
///
/// The voter's `users` row is locked first, so concurrent votes from the same
/// user (double clicks, client retries) run one after another and each sees the
/// previous one's result.
pub async fn apply_vote(
    pool: &PgPool,
    user_id: i64,
    target: VoteTarget,
    vote_type: VoteType,
) -> Result<VoteOutcome, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::AuthError("User not found".to_string()))?;

    if !target_exists(&mut tx, target).await? {
        return Err(AppError::NotFound(format!("{} not found", target.label())));
    }

    let existing = current_vote(&mut tx, user_id, target).await?;
    let (outcome, next) = transition(existing, vote_type);

    match (existing, next) {
        (None, Some(kind)) => insert_vote(&mut tx, user_id, target, kind).await?,
        (Some(_), Some(kind)) => update_vote(&mut tx, user_id, target, kind).await?,
        (Some(_), None) => delete_vote(&mut tx, user_id, target).await?,
        (None, None) => {}
    }

    tx.commit().await?;

    tracing::debug!(
        user_id,
        vote_target = ?target,
        vote = %vote_type,
        outcome = ?outcome,
        "vote applied"
    );
    Ok(outcome)
}

async fn target_exists(conn: &mut PgConnection, target: VoteTarget) -> Result<bool, AppError> {
    let sql = match target {
        VoteTarget::Post(_) => "SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1)",
        VoteTarget::Comment(_) => "SELECT EXISTS(SELECT 1 FROM comments WHERE id = $1)",
    };
    let exists: bool = sqlx::query_scalar(sql)
        .bind(target.id())
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// The caller's current vote on `target`, if any.
pub async fn current_vote(
    conn: &mut PgConnection,
    user_id: i64,
    target: VoteTarget,
) -> Result<Option<VoteType>, AppError> {
    let sql = match target {
        VoteTarget::Post(_) => "SELECT vote_type FROM votes WHERE user_id = $1 AND post_id = $2",
        VoteTarget::Comment(_) => {
            "SELECT vote_type FROM votes WHERE user_id = $1 AND comment_id = $2"
        }
    };
    let raw: Option<String> = sqlx::query_scalar(sql)
        .bind(user_id)
        .bind(target.id())
        .fetch_optional(&mut *conn)
        .await?;

    raw.map(|value| value.parse::<VoteType>())
        .transpose()
        .map_err(|_| AppError::DataIntegrity(format!("unknown vote type stored for {target:?}")))
}

async fn insert_vote(
    conn: &mut PgConnection,
    user_id: i64,
    target: VoteTarget,
    vote_type: VoteType,
) -> Result<(), AppError> {
    let sql = match target {
        VoteTarget::Post(_) => "INSERT INTO votes (user_id, post_id, vote_type) VALUES ($1, $2, $3)",
        VoteTarget::Comment(_) => {
            "INSERT INTO votes (user_id, comment_id, vote_type) VALUES ($1, $2, $3)"
        }
    };
    sqlx::query(sql)
        .bind(user_id)
        .bind(target.id())
        .bind(vote_type.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn update_vote(
    conn: &mut PgConnection,
    user_id: i64,
    target: VoteTarget,
    vote_type: VoteType,
) -> Result<(), AppError> {
    let sql = match target {
        VoteTarget::Post(_) => "UPDATE votes SET vote_type = $3 WHERE user_id = $1 AND post_id = $2",
        VoteTarget::Comment(_) => {
            "UPDATE votes SET vote_type = $3 WHERE user_id = $1 AND comment_id = $2"
        }
    };
    sqlx::query(sql)
        .bind(user_id)
        .bind(target.id())
        .bind(vote_type.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn delete_vote(
    conn: &mut PgConnection,
    user_id: i64,
    target: VoteTarget,
) -> Result<(), AppError> {
    let sql = match target {
        VoteTarget::Post(_) => "DELETE FROM votes WHERE user_id = $1 AND post_id = $2",
        VoteTarget::Comment(_) => "DELETE FROM votes WHERE user_id = $1 AND comment_id = $2",
    };
    sqlx::query(sql)
        .bind(user_id)
        .bind(target.id())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays actions through `transition`, returning rows stored for the pair.
    fn replay(actions: &[VoteType]) -> (Vec<VoteOutcome>, Vec<VoteType>) {
        let mut stored: Option<VoteType> = None;
        let mut outcomes = Vec::new();
        for &action in actions {
            let (outcome, next) = transition(stored, action);
            outcomes.push(outcome);
            stored = next;
        }
        (outcomes, stored.into_iter().collect())
    }

    #[test]
    fn first_vote_creates() {
        assert_eq!(
            transition(None, VoteType::Up),
            (VoteOutcome::Created, Some(VoteType::Up))
        );
    }

    #[test]
    fn same_type_twice_retracts() {
        for kind in [VoteType::Up, VoteType::Down] {
            let (outcomes, rows) = replay(&[kind, kind]);
            assert_eq!(outcomes, vec![VoteOutcome::Created, VoteOutcome::Retracted]);
            assert!(rows.is_empty());
        }
    }

    #[test]
    fn opposite_type_flips_in_place() {
        let (outcomes, rows) = replay(&[VoteType::Up, VoteType::Down]);
        assert_eq!(outcomes, vec![VoteOutcome::Created, VoteOutcome::Flipped]);
        assert_eq!(rows, vec![VoteType::Down]);
    }

    #[test]
    fn golang_scenario() {
        let (outcomes, rows) = replay(&[VoteType::Up, VoteType::Up, VoteType::Down]);
        assert_eq!(
            outcomes,
            vec![VoteOutcome::Created, VoteOutcome::Retracted, VoteOutcome::Created]
        );
        assert_eq!(rows, vec![VoteType::Down]);
    }

    #[test]
    fn never_more_than_one_row() {
        // Every sequence up to length 6 over {UP, DOWN}.
        for len in 0..=6u32 {
            for mask in 0..(1u32 << len) {
                let actions: Vec<VoteType> = (0..len)
                    .map(|bit| if mask & (1 << bit) == 0 { VoteType::Up } else { VoteType::Down })
                    .collect();
                let (_, rows) = replay(&actions);
                assert!(rows.len() <= 1);
                if let Some(last) = actions.last() {
                    // A surviving row always carries the latest requested type.
                    if let Some(row) = rows.first() {
                        assert_eq!(row, last);
                    }
                }
            }
        }
    }
}
