pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod scoring;
pub mod seed;
pub mod state;
pub mod utils;
pub mod views;

use std::time::Duration;

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::CorsConfig;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rally Competitions API",
        version = "1.0.0",
        description = "API for the Rally realtime competitions server"
    ),
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::me,
        handlers::competition::create_competition,
        handlers::competition::list_competitions,
        handlers::submission::create_submission,
        handlers::submission::list_submissions,
        handlers::leaderboard::leaderboard,
        handlers::views::get_public_view,
        handlers::views::get_admin_view,
    ),
    tags(
        (name = "Auth", description = "Registration and API key login"),
        (name = "Competitions", description = "Competition registry"),
        (name = "Submissions", description = "Submission intake and scoring"),
        (name = "Leaderboard", description = "Ranked public leaderboard"),
        (name = "Views", description = "Materialized view snapshots"),
    ),
    modifiers(&SecurityAddon),
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

fn cors_layer(cfg: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(cfg.max_age));
    if cfg.allow_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = cfg
            .allow_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let cors = cors_layer(&state.config.server.cors);
    let base_path = state.config.server.base_path.trim_end_matches('/').to_string();

    let api = axum::Router::new()
        .nest("/api", routes::api_routes())
        .with_state(state);

    // Reverse-proxy deployments serve the API under a prefix.
    let api = if base_path.is_empty() {
        api
    } else {
        axum::Router::new().nest(&base_path, api)
    };

    api.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
}
