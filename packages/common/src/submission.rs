use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::frame::{Frame, FrameError, Row};

/// How a submission payload is encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "PascalCase")]
pub enum PayloadFormat {
    /// A single JSON object or column map.
    Json,
    /// An array of row objects.
    Records,
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadFormat::Json => write!(f, "Json"),
            PayloadFormat::Records => write!(f, "Records"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid payload format: '{0}', expected one of: Json, Records")]
pub struct ParsePayloadFormatError(String);

impl FromStr for PayloadFormat {
    type Err = ParsePayloadFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Json" => Ok(PayloadFormat::Json),
            "Records" => Ok(PayloadFormat::Records),
            other => Err(ParsePayloadFormatError(other.to_string())),
        }
    }
}

/// A participant's answer to a competition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SubmissionPayload {
    pub format: PayloadFormat,
    pub data: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("submission malformed: {0}")]
    Malformed(#[from] FrameError),
    #[error("submission contains no rows")]
    Empty,
}

impl SubmissionPayload {
    pub fn json(data: serde_json::Value) -> Self {
        Self {
            format: PayloadFormat::Json,
            data,
        }
    }

    pub fn records(data: serde_json::Value) -> Self {
        Self {
            format: PayloadFormat::Records,
            data,
        }
    }

    /// Parse the payload into a tabular frame.
    pub fn frame(&self) -> Result<Frame, SubmissionError> {
        Ok(Frame::from_json(&self.data)?)
    }

    /// The answered row: the most recent row of the payload.
    pub fn latest(&self) -> Result<Row, SubmissionError> {
        self.frame()?
            .last_row()
            .cloned()
            .ok_or(SubmissionError::Empty)
    }

    /// True when there is nothing to submit (a strategy declined to answer).
    pub fn is_empty(&self) -> bool {
        match Frame::from_json(&self.data) {
            Ok(frame) => frame.is_empty(),
            Err(_) => false,
        }
    }
}
