// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    pub jwt_expiration: u64,
    /// Refresh token lifetime in seconds.
    pub jwt_refresh_expiration: u64,
    /// Sets the `Secure` attribute on auth cookies.
    pub cookie_secure: bool,
    pub rust_log: String,
    pub feed_cache_ttl_secs: u64,
    pub feed_cache_max_entries: usize,
    pub feed_page_size: u32,
    pub media_dir: String,
    pub media_base_url: String,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: parse_or("JWT_EXPIRATION", 3600),
            jwt_refresh_expiration: parse_or("JWT_REFRESH_EXPIRATION", 7 * 24 * 3600),
            cookie_secure: parse_or("COOKIE_SECURE", false),
            rust_log,
            feed_cache_ttl_secs: parse_or("FEED_CACHE_TTL_SECS", 60),
            feed_cache_max_entries: parse_or("FEED_CACHE_MAX_ENTRIES", 10_000usize).max(1),
            feed_page_size: parse_or("FEED_PAGE_SIZE", 3u32).max(1),
            media_dir: env::var("MEDIA_DIR").unwrap_or_else(|_| "./media".to_string()),
            media_base_url: env::var("MEDIA_BASE_URL").unwrap_or_else(|_| "/media".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        }
    }
}

/// Reads an optional variable, falling back to `default` when unset or unparsable.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
