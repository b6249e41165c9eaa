use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of competition, which determines how submissions are scored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "PascalCase")]
pub enum CompetitionType {
    /// Submissions are numeric predictions scored by closeness to the answer.
    Predict,
    /// Submissions are labels scored by exact match against the answer.
    Classify,
}

impl fmt::Display for CompetitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompetitionType::Predict => write!(f, "Predict"),
            CompetitionType::Classify => write!(f, "Classify"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid competition type: '{0}', expected one of: Predict, Classify")]
pub struct ParseCompetitionTypeError(String);

impl FromStr for CompetitionType {
    type Err = ParseCompetitionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Predict" => Ok(CompetitionType::Predict),
            "Classify" => Ok(CompetitionType::Classify),
            other => Err(ParseCompetitionTypeError(other.to_string())),
        }
    }
}

/// Which part of the dataset holds the answers.
///
/// Exactly three shapes exist. A keyed join selects answer rows whose
/// `dataset_key` value appears in the competition's recorded snapshot; the
/// other two name answer columns directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum TargetSpec {
    /// A single target column name.
    Column(String),
    /// An explicit list of target columns.
    Columns(Vec<String>),
    /// Keyed join: maps dataset-key values to the column holding their answer.
    Keyed(BTreeMap<String, serde_json::Value>),
}

impl TargetSpec {
    /// Column names to compare when scoring, deterministic order.
    pub fn target_columns(&self) -> Vec<String> {
        match self {
            TargetSpec::Column(c) => vec![c.clone()],
            TargetSpec::Columns(cols) => cols.clone(),
            TargetSpec::Keyed(map) => {
                let mut cols: Vec<String> = map
                    .values()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                cols.sort();
                cols.dedup();
                cols
            }
        }
    }
}

/// Everything a host provides to open a competition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CompetitionSpec {
    pub title: String,
    pub competition_type: CompetitionType,
    /// Where the dataset (and, after expiration, the answers) is fetched from.
    pub dataset_url: String,
    /// Join key for `TargetSpec::Keyed`; unused by the other shapes.
    #[serde(default)]
    pub dataset_key: Option<String>,
    pub targets: TargetSpec,
    /// Seconds after which answers become available. Zero or negative means
    /// submissions are scored the moment they arrive.
    #[serde(default)]
    pub answer_delay_secs: i64,
    pub expiration: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("title must be 1-256 characters")]
    InvalidTitle,
    #[error("dataset_url is not a valid URL: {0}")]
    InvalidDatasetUrl(#[from] url::ParseError),
    #[error("targets must not be empty")]
    EmptyTargets,
    #[error("keyed targets require a dataset_key")]
    MissingDatasetKey,
}

impl CompetitionSpec {
    /// Reject malformed specifications before anything is persisted.
    pub fn validate(&self) -> Result<(), SpecError> {
        let title = self.title.trim();
        if title.is_empty() || title.chars().count() > 256 {
            return Err(SpecError::InvalidTitle);
        }
        url::Url::parse(&self.dataset_url)?;
        match &self.targets {
            TargetSpec::Column(c) if c.trim().is_empty() => return Err(SpecError::EmptyTargets),
            TargetSpec::Columns(cols) if cols.is_empty() => return Err(SpecError::EmptyTargets),
            TargetSpec::Keyed(map) if map.is_empty() => return Err(SpecError::EmptyTargets),
            TargetSpec::Keyed(_) if self.dataset_key.is_none() => {
                return Err(SpecError::MissingDatasetKey);
            }
            _ => {}
        }
        Ok(())
    }
}
