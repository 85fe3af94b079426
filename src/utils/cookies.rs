//! HttpOnly cookies carrying the JWT pair.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{
    config::Config,
    error::AppError,
    utils::jwt::{TokenKind, sign_jwt},
};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

fn auth_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Signs a fresh access/refresh pair for `user_id` and stores both in `jar`.
pub fn issue_tokens(jar: CookieJar, config: &Config, user_id: i64) -> Result<CookieJar, AppError> {
    let access = sign_jwt(user_id, TokenKind::Access, &config.jwt_secret, config.jwt_expiration)?;
    let refresh = sign_jwt(
        user_id,
        TokenKind::Refresh,
        &config.jwt_secret,
        config.jwt_refresh_expiration,
    )?;

    Ok(jar
        .add(auth_cookie(ACCESS_COOKIE, access, config.cookie_secure))
        .add(auth_cookie(REFRESH_COOKIE, refresh, config.cookie_secure)))
}

pub fn clear_tokens(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"))
}
