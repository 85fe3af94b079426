//! Rebuilds the reply forest of a post from its flat comment rows.
//!
//! Comments live in an arena indexed by slot; parents are referenced by id.
//! Every sibling group (roots included) is ranked with the shared ranking
//! engine. Rows that cannot be reached from a root mean the stored parent
//! chain is broken (a cycle, or a parent on another post) and fail the build.
//! So does a chain deeper than `MAX_DEPTH`, which the write path never creates.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::AppError,
    models::{
        comment::Comment,
        user::AuthorView,
        vote::{VoteTally, VoteType},
    },
    services::ranking::{Rankable, rank},
};

/// Deepest allowed reply level; top-level comments are level 1.
pub const MAX_DEPTH: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub author: AuthorView,
    pub net_votes: i64,
    pub current_user_vote: Option<VoteType>,
    pub created_at: DateTime<Utc>,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    /// A node with no replies, e.g. for a freshly created comment.
    pub fn leaf(comment: Comment, net_votes: i64, current_user_vote: Option<VoteType>) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            content: comment.content,
            author: AuthorView {
                id: comment.author_id,
                username: comment.author_username,
                profile_picture: comment.author_profile_picture,
            },
            net_votes,
            current_user_vote,
            created_at: comment.created_at,
            children: Vec::new(),
        }
    }
}

impl Rankable for CommentNode {
    fn rank_id(&self) -> i64 {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Builds the ranked forest for one post.
///
/// `comments` must be every comment of the post, in store order.
pub fn build_tree(
    comments: Vec<Comment>,
    tallies: &HashMap<i64, VoteTally>,
    viewer_votes: &HashMap<i64, VoteType>,
) -> Result<Vec<CommentNode>, AppError> {
    let total = comments.len();

    let mut slot_of: HashMap<i64, usize> = HashMap::with_capacity(total);
    for (slot, comment) in comments.iter().enumerate() {
        if slot_of.insert(comment.id, slot).is_some() {
            return Err(AppError::DataIntegrity(format!(
                "comment {} appears twice",
                comment.id
            )));
        }
    }

    // Children grouped by parent slot, in store order.
    let mut roots: Vec<usize> = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); total];
    for (slot, comment) in comments.iter().enumerate() {
        match comment.parent_id {
            None => roots.push(slot),
            Some(parent_id) => {
                let parent = *slot_of.get(&parent_id).ok_or_else(|| {
                    AppError::DataIntegrity(format!(
                        "comment {} replies to {} which is not on post {}",
                        comment.id, parent_id, comment.post_id
                    ))
                })?;
                children[parent].push(slot);
            }
        }
    }

    // Breadth-first from the roots; parents always precede their children.
    let mut order: Vec<usize> = Vec::with_capacity(total);
    let mut depth: Vec<usize> = vec![0; total];
    let mut queue: VecDeque<usize> = roots.iter().copied().collect();
    for &root in &roots {
        depth[root] = 1;
    }
    while let Some(slot) = queue.pop_front() {
        if depth[slot] > MAX_DEPTH {
            return Err(AppError::DataIntegrity(format!(
                "comment {} is nested deeper than {} levels",
                comments[slot].id, MAX_DEPTH
            )));
        }
        order.push(slot);
        for &child in &children[slot] {
            depth[child] = depth[slot] + 1;
            queue.push_back(child);
        }
    }

    if order.len() != total {
        let mut reached = vec![false; total];
        for &slot in &order {
            reached[slot] = true;
        }
        let stranded: Vec<i64> = comments
            .iter()
            .enumerate()
            .filter(|(slot, _)| !reached[*slot])
            .map(|(_, c)| c.id)
            .collect();
        return Err(AppError::DataIntegrity(format!(
            "comment parent cycle involving {:?}",
            stranded
        )));
    }

    let mut pending: Vec<Option<Comment>> = comments.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentNode>> = vec![None; total];

    // Children before parents, so every child group is complete when its parent is built.
    for &slot in order.iter().rev() {
        let comment = pending[slot]
            .take()
            .ok_or_else(|| AppError::DataIntegrity("comment visited twice".to_string()))?;
        let net_votes = tallies.get(&comment.id).map(VoteTally::net).unwrap_or(0);
        let own_vote = viewer_votes.get(&comment.id).copied();

        let mut node = CommentNode::leaf(comment, net_votes, own_vote);
        node.children = rank_group(&children[slot], &mut built, tallies)?;
        built[slot] = Some(node);
    }

    rank_group(&roots, &mut built, tallies)
}

fn rank_group(
    slots: &[usize],
    built: &mut [Option<CommentNode>],
    tallies: &HashMap<i64, VoteTally>,
) -> Result<Vec<CommentNode>, AppError> {
    let group = slots
        .iter()
        .map(|&slot| {
            built[slot]
                .take()
                .ok_or_else(|| AppError::DataIntegrity("reply attached twice".to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rank(group, tallies, None)
        .into_iter()
        .map(|ranked| ranked.item)
        .collect())
}
