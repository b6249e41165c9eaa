use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/competitions", competition_routes())
        .nest("/submissions", submission_routes())
        .route("/leaderboard", get(handlers::leaderboard::leaderboard))
        .route("/views/{name}", get(handlers::views::get_public_view))
        .route("/admin/views/{name}", get(handlers::views::get_admin_view))
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/me", get(handlers::auth::me))
}

fn competition_routes() -> Router<AppState> {
    Router::new().route(
        "/",
        get(handlers::competition::list_competitions)
            .post(handlers::competition::create_competition),
    )
}

fn submission_routes() -> Router<AppState> {
    Router::new().route(
        "/",
        get(handlers::submission::list_submissions).post(handlers::submission::create_submission),
    )
}
