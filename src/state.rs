use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    config::Config,
    models::post::PostView,
    services::{feed_cache::FeedCache, storage::ObjectStore},
};

pub type SharedFeedCache = Arc<dyn FeedCache<PostView>>;
pub type SharedObjectStore = Arc<dyn ObjectStore>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub feed_cache: SharedFeedCache,
    pub objects: SharedObjectStore,
    /// Outbound client for link previews; carries the request timeout.
    pub http: reqwest::Client,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for SharedFeedCache {
    fn from_ref(state: &AppState) -> Self {
        state.feed_cache.clone()
    }
}

impl FromRef<AppState> for SharedObjectStore {
    fn from_ref(state: &AppState) -> Self {
        state.objects.clone()
    }
}

impl FromRef<AppState> for reqwest::Client {
    fn from_ref(state: &AppState) -> Self {
        state.http.clone()
    }
}
