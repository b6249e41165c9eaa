use chrono::{DateTime, Utc};
use common::SubmissionPayload;
use serde::{Deserialize, Serialize};

use crate::entity::submission;
use crate::error::AppError;

/// Request body for submitting an answer to a competition.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateSubmissionRequest {
    pub competition_id: i32,
    pub submission: SubmissionPayload,
}

/// Query parameters for submission listing. Filters are conjunctive; absent
/// filters are wildcards.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct SubmissionListQuery {
    /// Filter by submission ID.
    pub submission_id: Option<i32>,
    /// Filter by competition ID.
    pub competition_id: Option<i32>,
    /// Filter by submitter user ID.
    pub user_id: Option<i32>,
    /// Filter by competition type (`Predict` | `Classify`).
    #[serde(rename = "type")]
    pub competition_type: Option<String>,
}

/// Full submission details, visible to the submitter and the competition
/// owner.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmissionResponse {
    pub id: i32,
    pub competition_id: i32,
    pub user_id: i32,
    pub format: String,
    pub payload: serde_json::Value,
    /// Rounded to 2 decimals; null until resolved.
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub scored_at: Option<DateTime<Utc>>,
}

impl From<submission::Model> for SubmissionResponse {
    fn from(m: submission::Model) -> Self {
        Self {
            id: m.id,
            competition_id: m.competition_id,
            user_id: m.user_id,
            format: m.format,
            payload: m.payload,
            score: m.score.map(round2),
            created_at: m.created_at,
            scored_at: m.scored_at,
        }
    }
}

pub fn round2(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

/// Validate a submission request body. The payload must parse as tabular data
/// before any state is touched.
pub fn validate_create_submission(req: &CreateSubmissionRequest) -> Result<(), AppError> {
    req.submission
        .frame()
        .map_err(|e| AppError::Validation(format!("Submission malformed: {e}")))?;
    Ok(())
}

/// Validate the type filter, when present.
pub fn validate_submission_list_query(query: &SubmissionListQuery) -> Result<(), AppError> {
    if let Some(ref ty) = query.competition_type {
        ty.parse::<common::CompetitionType>()
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }
    Ok(())
}
