// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, patch, post, put},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{auth, comment, community, editor, post, user, vote},
    state::AppState,
    utils::jwt::identity_middleware,
};

const UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

/// Assembles the main application router.
///
/// * Every request passes `identity_middleware`; handlers that need a user
///   take the `AuthUser` extractor, the rest read the optional `Viewer`.
/// * Uploaded media is served back from `media_dir` under `media_base_url`.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout));

    let user_routes = Router::new()
        .route("/me", get(user::me))
        .route("/me/username", patch(user::update_username))
        .route(
            "/me/profile-picture",
            patch(user::update_profile_picture).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        );

    let community_routes = Router::new()
        .route(
            "/subrabbits",
            get(community::list_subrabbits).post(community::create_subrabbit),
        )
        .route(
            "/subrabbit/{name}",
            get(community::get_subrabbit)
                .patch(community::update_subrabbit)
                .delete(community::delete_subrabbit),
        )
        .route("/subrabbit/{name}/subscribe", put(community::subscribe))
        .route("/subrabbit/{name}/unsubscribe", put(community::unsubscribe))
        .route("/subrabbit/{name}/posts", get(post::subrabbit_posts))
        .route("/search", get(community::search_subrabbits));

    let post_routes = Router::new()
        .route("/create-post", post(post::create_post))
        .route("/posts", get(post::list_posts))
        .route(
            "/post-detail/{id}",
            get(post::post_detail).delete(post::delete_post),
        )
        .route("/subrabbit/post/comment", post(comment::create_comment))
        .route("/subrabbit/post/vote", patch(vote::vote_post))
        .route("/subrabbit/post/comment/vote", patch(vote::vote_comment));

    let editor_routes = Router::new()
        .route("/link", get(editor::fetch_url_metadata))
        .route("/upload-image", post(editor::upload_image))
        .route("/upload-file", post(editor::upload_file))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .merge(community_routes)
        .merge(post_routes)
        .merge(editor_routes);

    let mut app = Router::new().nest("/api", api);

    let media_base = state.config.media_base_url.trim_end_matches('/');
    if media_base.starts_with('/') && media_base.len() > 1 {
        app = app.nest_service(media_base, ServeDir::new(&state.config.media_dir));
    }

    app
        // Global Middleware (applied from outside in)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
