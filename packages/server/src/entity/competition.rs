use chrono::{DateTime, Utc};
use common::{CompetitionSpec, CompetitionType, Frame, Row, TargetSpec};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "competition")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,
    /// One of: Predict, Classify
    pub competition_type: String,

    pub dataset_url: String,
    pub dataset_key: Option<String>,
    /// Target shape as JSON: a column name, a column list, or a keyed map.
    pub targets: Json,

    /// Seconds until answers become available; <= 0 scores immediately.
    pub answer_delay_secs: i64,
    pub expiration: DateTimeUtc,
    /// Derived flag, flipped false lazily whenever a read observes
    /// `now > expiration`.
    pub active: bool,

    /// Latest known dataset snapshot (JSON records), used to detect new rows.
    pub current_state: Option<Json>,
    /// Resolved answer snapshot, written once ground truth lands.
    pub answer: Option<Json>,

    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub owner: HasOne<super::user::Entity>,

    #[sea_orm(has_many)]
    pub submissions: HasMany<super::submission::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn competition_type(&self) -> Option<CompetitionType> {
        self.competition_type.parse().ok()
    }

    pub fn target_spec(&self) -> Option<TargetSpec> {
        serde_json::from_value(self.targets.clone()).ok()
    }

    /// Reassemble the host-facing spec from the stored columns.
    pub fn spec(&self) -> Option<CompetitionSpec> {
        Some(CompetitionSpec {
            title: self.title.clone(),
            competition_type: self.competition_type()?,
            dataset_url: self.dataset_url.clone(),
            dataset_key: self.dataset_key.clone(),
            targets: self.target_spec()?,
            answer_delay_secs: self.answer_delay_secs,
            expiration: self.expiration,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiration
    }

    /// The recorded snapshot, empty when none was ever captured.
    pub fn current_state_frame(&self) -> Frame {
        self.current_state
            .as_ref()
            .and_then(|v| Frame::from_json(v).ok())
            .unwrap_or_default()
    }

    /// The resolved answer row, if one has landed.
    pub fn answer_row(&self) -> Option<Row> {
        let value = self.answer.as_ref()?;
        Frame::from_json(value).ok()?.last_row().cloned()
    }
}
