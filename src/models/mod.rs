// src/models/mod.rs

pub mod comment;
pub mod community;
pub mod post;
pub mod user;
pub mod vote;
