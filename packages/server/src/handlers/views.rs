use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::Value;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::state::AppState;
use crate::views::{VIEW_COMPETITIONS, VIEW_LEADERBOARD, VIEW_SUBMISSIONS};

/// Snapshot a public view table.
#[utoipa::path(
    get,
    path = "/api/v1/views/{name}",
    tag = "Views",
    operation_id = "getPublicView",
    summary = "Public view snapshot",
    params(("name" = String, Path, description = "View name: competitions | leaderboard")),
    responses(
        (status = 200, description = "View rows"),
        (status = 404, description = "Unknown view (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_public_view(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    if ![VIEW_COMPETITIONS, VIEW_LEADERBOARD].contains(&name.as_str()) {
        return Err(AppError::NotFound(format!("No public view '{name}'")));
    }
    let rows = state.views.public().snapshot(&name).unwrap_or_default();
    Ok(Json(rows))
}

/// Snapshot an admin view table. Requires the admin role.
#[utoipa::path(
    get,
    path = "/api/v1/admin/views/{name}",
    tag = "Views",
    operation_id = "getAdminView",
    summary = "Admin view snapshot",
    params(("name" = String, Path, description = "View name: competitions | submissions")),
    responses(
        (status = 200, description = "View rows"),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Unknown view (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn get_admin_view(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    auth_user.require_admin()?;
    if ![VIEW_COMPETITIONS, VIEW_SUBMISSIONS].contains(&name.as_str()) {
        return Err(AppError::NotFound(format!("No admin view '{name}'")));
    }
    let rows = state.views.admin().snapshot(&name).unwrap_or_default();
    Ok(Json(rows))
}
