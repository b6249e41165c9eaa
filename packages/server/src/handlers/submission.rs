use std::collections::HashMap;

use axum::{Json, extract::Query, extract::State, response::IntoResponse};
use chrono::Utc;
use sea_orm::*;
use serde_json::json;
use tracing::{info, instrument};

use crate::entity::{competition, submission};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::handlers::competition::deactivate_expired;
use crate::models::submission::{
    CreateSubmissionRequest, SubmissionListQuery, SubmissionResponse, validate_create_submission,
    validate_submission_list_query,
};
use crate::state::AppState;

/// Find a competition by ID or return 404.
async fn find_competition(
    db: &DatabaseConnection,
    id: i32,
) -> Result<competition::Model, AppError> {
    competition::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Competition not registered".into()))
}

/// Submit an answer to a competition.
///
/// Three outcomes, all HTTP 200/201: the scored record (no answer delay), a
/// `{"submission_id": ...}` acknowledgment (deferred), or `{}` when the
/// competition already expired (accepted as a no-op, never scored).
#[utoipa::path(
    post,
    path = "/api/v1/submissions",
    tag = "Submissions",
    operation_id = "createSubmission",
    summary = "Submit an answer",
    request_body = CreateSubmissionRequest,
    responses(
        (status = 200, description = "Scored record, deferred acknowledgment, or empty object for an expired competition"),
        (status = 400, description = "Malformed submission (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Competition not registered (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, competition_id = payload.competition_id))]
pub async fn create_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateSubmissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Reject malformed payloads before any state mutation.
    validate_create_submission(&payload)?;

    let comp = find_competition(&state.db, payload.competition_id).await?;

    if comp.is_expired(Utc::now()) {
        deactivate_expired(&state, comp).await?;
        return Ok(Json(json!({})));
    }

    let new_submission = submission::ActiveModel {
        format: Set(payload.submission.format.to_string()),
        payload: Set(payload.submission.data.clone()),
        score: Set(None),
        user_id: Set(auth_user.user_id),
        competition_id: Set(comp.id),
        created_at: Set(Utc::now()),
        scored_at: Set(None),
        ..Default::default()
    };

    let model = new_submission.insert(&state.db).await?;
    state.views.publish_submission(&model);

    info!(
        submission_id = model.id,
        user_id = model.user_id,
        "Registering submission"
    );

    if comp.answer_delay_secs <= 0 {
        let scored = state.engine.score_immediate(model, &comp).await?;
        let body = serde_json::to_value(SubmissionResponse::from(scored))
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(Json(body))
    } else {
        let ack = state.engine.defer(&model, &comp).await;
        Ok(Json(json!({ "submission_id": ack.submission_id })))
    }
}

/// List submissions.
#[utoipa::path(
    get,
    path = "/api/v1/submissions",
    tag = "Submissions",
    operation_id = "listSubmissions",
    summary = "List submissions",
    description = "Sweeps the deferred queue, then returns submissions matching every provided filter. A submission is visible only to its submitter and the competition owner; admins see all.",
    params(SubmissionListQuery),
    responses(
        (status = 200, description = "Matching submissions", body = [SubmissionResponse]),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id))]
pub async fn list_submissions(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SubmissionListQuery>,
) -> Result<Json<Vec<SubmissionResponse>>, AppError> {
    validate_submission_list_query(&query)?;

    // Grade anything that became answerable before this read.
    state.engine.sweep().await;

    let submissions = submission::Entity::find().all(&state.db).await?;

    let mut competitions: HashMap<i32, competition::Model> = competition::Entity::find()
        .all(&state.db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    // Deactivate every expired competition this read observes.
    for (_, comp) in competitions.iter_mut() {
        let updated = deactivate_expired(&state, comp.clone()).await?;
        *comp = updated;
    }

    let mut rows = Vec::new();
    for sub in submissions {
        if let Some(id) = query.submission_id
            && sub.id != id
        {
            continue;
        }
        if let Some(cid) = query.competition_id
            && sub.competition_id != cid
        {
            continue;
        }
        if let Some(uid) = query.user_id
            && sub.user_id != uid
        {
            continue;
        }

        let Some(comp) = competitions.get(&sub.competition_id) else {
            continue;
        };
        if let Some(ref ty) = query.competition_type
            && comp.competition_type != *ty
        {
            continue;
        }

        // Visible only to the submitter and the competition owner.
        let is_party = auth_user.user_id == sub.user_id || auth_user.user_id == comp.user_id;
        if !auth_user.is_admin() && !is_party {
            continue;
        }

        rows.push(SubmissionResponse::from(sub));
    }

    Ok(Json(rows))
}
