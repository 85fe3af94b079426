//! Ranking engine shared by the post feed and every level of the comment tree.
//!
//! Items are ordered by `(net_votes, comment_count, created_at)`, all descending.
//! The sort is stable, so items that tie on the whole key keep the order the
//! store returned them in. Comments are ranked without comment counts, which
//! makes their key `(net_votes, created_at)` at every depth.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{post::PostRow, vote::{VoteTally, VoteType}};

/// Anything the engine can order.
pub trait Rankable {
    fn rank_id(&self) -> i64;
    fn created_at(&self) -> DateTime<Utc>;
}

impl Rankable for PostRow {
    fn rank_id(&self) -> i64 {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// An item together with the aggregates it was ranked by.
#[derive(Debug, Clone)]
pub struct Ranked<T> {
    pub item: T,
    pub net_votes: i64,
    pub comment_count: i64,
}

impl<T: Rankable> Ranked<T> {
    fn key(&self) -> (i64, i64, DateTime<Utc>) {
        (self.net_votes, self.comment_count, self.item.created_at())
    }
}

/// Orders `items` best-first.
///
/// Missing entries in `tallies` count as zero votes. Passing `None` for
/// `comment_counts` drops the comment-count tiebreaker.
pub fn rank<T: Rankable>(
    items: Vec<T>,
    tallies: &HashMap<i64, VoteTally>,
    comment_counts: Option<&HashMap<i64, i64>>,
) -> Vec<Ranked<T>> {
    let mut ranked: Vec<Ranked<T>> = items
        .into_iter()
        .map(|item| {
            let id = item.rank_id();
            Ranked {
                net_votes: tallies.get(&id).map(VoteTally::net).unwrap_or(0),
                comment_count: comment_counts
                    .and_then(|counts| counts.get(&id).copied())
                    .unwrap_or(0),
                item,
            }
        })
        .collect();

    // `sort_by` is stable: equal keys keep store order.
    ranked.sort_by(|a, b| b.key().cmp(&a.key()));
    ranked
}

/// Folds `(target_id, vote_type, count)` rows from a grouped count query into tallies.
pub fn tally_votes<I>(rows: I) -> HashMap<i64, VoteTally>
where
    I: IntoIterator<Item = (i64, VoteType, i64)>,
{
    let mut tallies: HashMap<i64, VoteTally> = HashMap::new();
    for (target_id, vote_type, count) in rows {
        tallies.entry(target_id).or_default().add(vote_type, count);
    }
    tallies
}

/// Returns the requested 1-based page of an already ranked sequence.
pub fn page_slice<T: Clone>(ranked: &[T], page: u32, page_size: u32) -> Vec<T> {
    let page = page.max(1) as usize;
    let size = page_size.max(1) as usize;
    ranked
        .iter()
        .skip((page - 1).saturating_mul(size))
        .take(size)
        .cloned()
        .collect()
}
