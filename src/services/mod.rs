// src/services/mod.rs

pub mod aggregates;
pub mod comment_tree;
pub mod feed;
pub mod feed_cache;
pub mod ledger;
pub mod link_meta;
pub mod ranking;
pub mod storage;
