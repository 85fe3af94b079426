use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Direction of a vote. Stored as `'UP'` / `'DOWN'` in the `votes.vote_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteType::Up => "UP",
            VoteType::Down => "DOWN",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(VoteType::Up),
            "DOWN" => Ok(VoteType::Down),
            _ => Err(AppError::invalid_vote_type()),
        }
    }
}

/// The entity a vote is attached to. A vote row references exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteTarget {
    Post(i64),
    Comment(i64),
}

impl VoteTarget {
    pub fn id(self) -> i64 {
        match self {
            VoteTarget::Post(id) | VoteTarget::Comment(id) => id,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "Post",
            VoteTarget::Comment(_) => "Comment",
        }
    }
}

/// What a vote action did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    Created,
    Flipped,
    Retracted,
}

/// Up/down counts for a single target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub up: i64,
    pub down: i64,
}

impl VoteTally {
    pub fn net(&self) -> i64 {
        self.up - self.down
    }

    pub fn add(&mut self, vote_type: VoteType, count: i64) {
        match vote_type {
            VoteType::Up => self.up += count,
            VoteType::Down => self.down += count,
        }
    }
}

/// DTO for voting on a post.
/// Fields are optional so a missing one maps to 400 instead of a JSON rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostVoteRequest {
    pub post_id: Option<i64>,
    pub vote_type: Option<String>,
}

/// DTO for voting on a comment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentVoteRequest {
    pub comment_id: Option<i64>,
    pub vote_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub result: VoteOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_only_upper_case_types() {
        assert_eq!("UP".parse::<VoteType>().unwrap(), VoteType::Up);
        assert_eq!("DOWN".parse::<VoteType>().unwrap(), VoteType::Down);
        assert!(matches!("up".parse::<VoteType>(), Err(AppError::BadRequest(_))));
        assert!(matches!("SIDEWAYS".parse::<VoteType>(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn tally_net_is_up_minus_down() {
        let mut tally = VoteTally::default();
        tally.add(VoteType::Up, 3);
        tally.add(VoteType::Down, 5);
        assert_eq!(tally.net(), -2);
    }

    #[test]
    fn outcome_serializes_lowercase() {
        let body = serde_json::to_value(VoteResponse { result: VoteOutcome::Retracted }).unwrap();
        assert_eq!(body, serde_json::json!({ "result": "retracted" }));
    }
}
