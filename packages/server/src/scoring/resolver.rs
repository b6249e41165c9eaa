use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use common::Frame;
use common::frame::FrameError;

use crate::entity::competition;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("dataset request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("dataset payload malformed: {0}")]
    Malformed(#[from] FrameError),
    #[error("no dataset registered for '{0}'")]
    Unknown(String),
}

/// Fetches the current dataset slice for a competition.
#[async_trait]
pub trait DatasetResolver: Send + Sync {
    async fn fetch(&self, competition: &competition::Model) -> Result<Frame, ResolveError>;
}

/// Resolver that pulls JSON datasets over HTTP from `dataset_url`.
pub struct HttpDatasetResolver {
    client: reqwest::Client,
}

impl HttpDatasetResolver {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DatasetResolver for HttpDatasetResolver {
    async fn fetch(&self, competition: &competition::Model) -> Result<Frame, ResolveError> {
        let body: serde_json::Value = self
            .client
            .get(&competition.dataset_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(Frame::from_json(&body)?)
    }
}

/// In-memory resolver keyed by dataset URL, for tests and offline runs.
#[derive(Default)]
pub struct StaticDatasetResolver {
    frames: RwLock<HashMap<String, Frame>>,
}

impl StaticDatasetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, dataset_url: &str, frame: Frame) {
        self.frames
            .write()
            .expect("dataset table lock poisoned")
            .insert(dataset_url.to_string(), frame);
    }
}

#[async_trait]
impl DatasetResolver for StaticDatasetResolver {
    async fn fetch(&self, competition: &competition::Model) -> Result<Frame, ResolveError> {
        self.frames
            .read()
            .expect("dataset table lock poisoned")
            .get(&competition.dataset_url)
            .cloned()
            .ok_or_else(|| ResolveError::Unknown(competition.dataset_url.clone()))
    }
}
