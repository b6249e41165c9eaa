use axum::{Json, extract::Query, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::competition;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::competition::{
    CompetitionListQuery, CompetitionResponse, CreateCompetitionRequest,
    CreateCompetitionResponse, validate_competition_list_query, validate_create_competition,
};
use crate::state::AppState;

/// Deactivate a competition observed past its expiration. Persists the flip
/// and republishes the row; a no-op for already inactive rows.
pub async fn deactivate_expired(
    state: &AppState,
    comp: competition::Model,
) -> Result<competition::Model, AppError> {
    if !comp.active || !comp.is_expired(Utc::now()) {
        return Ok(comp);
    }
    info!(competition_id = comp.id, "Competition expired, deactivating");
    let mut active: competition::ActiveModel = comp.into();
    active.active = Set(false);
    let updated = active.update(&state.db).await?;
    state.views.publish_competition(&updated);
    Ok(updated)
}

/// Register a competition.
#[utoipa::path(
    post,
    path = "/api/v1/competitions",
    tag = "Competitions",
    operation_id = "createCompetition",
    summary = "Register a competition",
    description = "Validates the specification, snapshots the dataset for later new-row detection, and publishes the competition. The caller becomes the owner.",
    request_body = CreateCompetitionRequest,
    responses(
        (status = 201, description = "Competition registered", body = CreateCompetitionResponse),
        (status = 400, description = "Malformed specification (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn create_competition(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateCompetitionRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_competition(&payload)?;
    let spec = payload.spec;

    let targets = serde_json::to_value(&spec.targets)
        .map_err(|e| AppError::Internal(format!("Target serialization error: {}", e)))?;

    let now = Utc::now();
    let new_competition = competition::ActiveModel {
        title: Set(spec.title.trim().to_string()),
        competition_type: Set(spec.competition_type.to_string()),
        dataset_url: Set(spec.dataset_url.clone()),
        dataset_key: Set(spec.dataset_key.clone()),
        targets: Set(targets),
        answer_delay_secs: Set(spec.answer_delay_secs),
        expiration: Set(spec.expiration),
        active: Set(now <= spec.expiration),
        current_state: Set(None),
        answer: Set(None),
        user_id: Set(auth_user.user_id),
        created_at: Set(now),
        ..Default::default()
    };

    let model = new_competition.insert(&state.db).await?;

    // Record what the dataset looks like now; growth past this snapshot is
    // what makes deferred submissions scoreable.
    let snapshot = state.engine.snapshot_state(&model).await;
    let mut active: competition::ActiveModel = model.into();
    active.current_state = Set(Some(snapshot));
    let model = active.update(&state.db).await?;

    state.views.publish_competition(&model);

    info!(
        competition_id = model.id,
        competition_type = %model.competition_type,
        "Registered competition"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateCompetitionResponse {
            competition_id: model.id,
        }),
    ))
}

/// List competitions.
#[utoipa::path(
    get,
    path = "/api/v1/competitions",
    tag = "Competitions",
    operation_id = "listCompetitions",
    summary = "List competitions",
    description = "Returns competitions matching every provided filter. Expired competitions observed by the read are deactivated, even when the filtered result is empty.",
    params(CompetitionListQuery),
    responses(
        (status = 200, description = "Matching competitions", body = [CompetitionResponse]),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, query))]
pub async fn list_competitions(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<CompetitionListQuery>,
) -> Result<Json<Vec<CompetitionResponse>>, AppError> {
    validate_competition_list_query(&query)?;

    // Full scan so that every expired row the read touches gets deactivated,
    // regardless of the filters.
    let competitions = competition::Entity::find().all(&state.db).await?;

    let mut rows = Vec::new();
    for comp in competitions {
        let comp = deactivate_expired(&state, comp).await?;

        if let Some(id) = query.competition_id
            && comp.id != id
        {
            continue;
        }
        if let Some(uid) = query.user_id
            && comp.user_id != uid
        {
            continue;
        }
        if let Some(ref ty) = query.competition_type
            && comp.competition_type != *ty
        {
            continue;
        }
        if !query.include_inactive && !comp.active {
            continue;
        }

        rows.push(CompetitionResponse::from(comp));
    }

    Ok(Json(rows))
}
