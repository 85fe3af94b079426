// src/handlers/mod.rs

pub mod auth;
pub mod comment;
pub mod community;
pub mod editor;
pub mod post;
pub mod user;
pub mod vote;
