use axum::{Json, extract::Query, extract::State};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::state::AppState;
use crate::views::VIEW_LEADERBOARD;

/// Query parameters for the leaderboard.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct LeaderboardQuery {
    /// Restrict to one competition.
    pub competition_id: Option<i32>,
}

/// Public leaderboard: scored submissions ranked best-first.
#[utoipa::path(
    get,
    path = "/api/v1/leaderboard",
    tag = "Leaderboard",
    operation_id = "leaderboard",
    summary = "Ranked leaderboard",
    description = "Sweeps the deferred queue, then returns the public leaderboard rows ordered by score descending.",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Ranked rows"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, query))]
pub async fn leaderboard(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<Value>>, AppError> {
    // Readers must never see a submission that could have been scored.
    state.engine.sweep().await;

    let mut rows = state
        .views
        .public()
        .snapshot(VIEW_LEADERBOARD)
        .unwrap_or_default();

    if let Some(cid) = query.competition_id {
        rows.retain(|row| row["competition_id"].as_i64() == Some(i64::from(cid)));
    }

    rows.sort_by(|a, b| {
        let sa = a["score"].as_f64().unwrap_or(f64::NEG_INFINITY);
        let sb = b["score"].as_f64().unwrap_or(f64::NEG_INFINITY);
        sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(Json(rows))
}
