use common::{PayloadFormat, SubmissionPayload};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// One of: Json, Records
    pub format: String,
    pub payload: Json,

    /// Written exactly once by the scoring engine; NULL until resolved.
    pub score: Option<f64>,

    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    pub competition_id: i32,
    #[sea_orm(belongs_to, from = "competition_id", to = "id")]
    pub competition: HasOne<super::competition::Entity>,

    pub created_at: DateTimeUtc,
    pub scored_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn payload(&self) -> SubmissionPayload {
        SubmissionPayload {
            format: self
                .format
                .parse()
                .unwrap_or(PayloadFormat::Json),
            data: self.payload.clone(),
        }
    }
}
