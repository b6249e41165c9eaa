use chrono::{DateTime, Utc};
use common::CompetitionSpec;
use serde::{Deserialize, Serialize};

use crate::entity::competition;
use crate::error::AppError;

/// Request body for registering a competition.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateCompetitionRequest {
    pub spec: CompetitionSpec,
}

/// Response to a successful registration.
#[derive(Serialize, utoipa::ToSchema)]
pub struct CreateCompetitionResponse {
    pub competition_id: i32,
}

/// Query parameters for competition listing. Filters are conjunctive; absent
/// filters are wildcards.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct CompetitionListQuery {
    /// Filter by competition ID.
    pub competition_id: Option<i32>,
    /// Filter by owner user ID.
    pub user_id: Option<i32>,
    /// Filter by competition type (`Predict` | `Classify`).
    #[serde(rename = "type")]
    pub competition_type: Option<String>,
    /// Include competitions that are no longer active.
    #[serde(default)]
    pub include_inactive: bool,
}

/// A competition as returned by the listing endpoint: the public projection.
#[derive(Serialize, utoipa::ToSchema)]
pub struct CompetitionResponse {
    pub id: i32,
    pub title: String,
    pub competition_type: String,
    pub dataset_url: String,
    pub dataset_key: Option<String>,
    pub targets: serde_json::Value,
    pub answer_delay_secs: i64,
    pub expiration: DateTime<Utc>,
    pub active: bool,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
}

impl From<competition::Model> for CompetitionResponse {
    fn from(m: competition::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            competition_type: m.competition_type,
            dataset_url: m.dataset_url,
            dataset_key: m.dataset_key,
            targets: m.targets,
            answer_delay_secs: m.answer_delay_secs,
            expiration: m.expiration,
            active: m.active,
            user_id: m.user_id,
            created_at: m.created_at,
        }
    }
}

/// Validate a competition registration request before anything is persisted.
pub fn validate_create_competition(req: &CreateCompetitionRequest) -> Result<(), AppError> {
    req.spec
        .validate()
        .map_err(|e| AppError::Validation(format!("Competition specification malformed: {e}")))
}

/// Validate the type filter, when present.
pub fn validate_competition_list_query(query: &CompetitionListQuery) -> Result<(), AppError> {
    if let Some(ref ty) = query.competition_type {
        ty.parse::<common::CompetitionType>()
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }
    Ok(())
}
