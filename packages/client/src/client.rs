use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{CompetitionSpec, CompetitionType, SubmissionPayload};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

use crate::compete::{Intake, ParticipationLoop, Registry, Strategy, StrategyBook};
use crate::error::ClientError;

/// Environment variable holding the API key.
pub const KEY_ENV: &str = "RALLY_KEY";
/// Environment variable holding the API secret.
pub const SECRET_ENV: &str = "RALLY_SECRET";

/// How often the participation loop polls for active competitions.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// An active competition as seen by a participant.
#[derive(Clone, Debug)]
pub struct ActiveCompetition {
    pub competition_id: i32,
    pub spec: CompetitionSpec,
}

/// Conjunctive query filters; absent fields are wildcards.
#[derive(Clone, Debug, Default)]
pub struct QueryFilter {
    pub submission_id: Option<i32>,
    pub competition_id: Option<i32>,
    pub user_id: Option<i32>,
    pub competition_type: Option<CompetitionType>,
}

impl QueryFilter {
    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(id) = self.submission_id {
            query.push(("submission_id", id.to_string()));
        }
        if let Some(id) = self.competition_id {
            query.push(("competition_id", id.to_string()));
        }
        if let Some(id) = self.user_id {
            query.push(("user_id", id.to_string()));
        }
        if let Some(ty) = self.competition_type {
            query.push(("type", ty.to_string()));
        }
        query
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    code: String,
    message: String,
}

#[derive(Deserialize)]
struct CreateCompetitionResponse {
    competition_id: i32,
}

/// The primary interface for talking to a competitions server.
///
/// Cheap to clone; clones share the session token, the hosted-competition
/// list, and the strategy registry.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base: Url,
    key: String,
    secret: String,
    token: Arc<RwLock<Option<String>>>,
    hosted: Arc<std::sync::Mutex<Vec<i32>>>,
    book: Arc<StrategyBook>,
    competing: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl Client {
    pub fn new(host: &str, key: &str, secret: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: Url::parse(host)?,
            key: key.to_string(),
            secret: secret.to_string(),
            token: Arc::new(RwLock::new(None)),
            hosted: Arc::new(std::sync::Mutex::new(Vec::new())),
            book: Arc::new(StrategyBook::new()),
            competing: Arc::new(AtomicBool::new(false)),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Build a client with credentials from `RALLY_KEY` / `RALLY_SECRET`.
    pub fn from_env(host: &str) -> Result<Self, ClientError> {
        let key = std::env::var(KEY_ENV).map_err(|_| ClientError::MissingCredentials(KEY_ENV))?;
        let secret =
            std::env::var(SECRET_ENV).map_err(|_| ClientError::MissingCredentials(SECRET_ENV))?;
        Self::new(host, &key, &secret)
    }

    /// Override the discovery cadence of the participation loop.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn api(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(&format!("api/v1/{path}"))?)
    }

    /// Exchange the credential pair for a bearer token.
    pub async fn login(&self) -> Result<(), ClientError> {
        let url = self.api("auth/login")?;
        let response = self
            .http
            .post(url)
            .json(&json!({ "key": self.key, "secret": self.secret }))
            .send()
            .await?;
        let body: LoginResponse = Self::parse(response).await?;
        *self.token.write().await = Some(body.token);
        Ok(())
    }

    async fn ensure_token(&self) -> Result<String, ClientError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.login().await?;
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| ClientError::Unexpected("login produced no token".into()))
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let code_message = response
            .json::<ApiErrorBody>()
            .await
            .map(|b| (b.code, b.message))
            .unwrap_or_else(|_| ("UNKNOWN".into(), status.to_string()));
        Err(ClientError::Api {
            status: status.as_u16(),
            code: code_message.0,
            message: code_message.1,
        })
    }

    async fn send_get(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<reqwest::Response, ClientError> {
        let token = self.ensure_token().await?;
        Ok(self
            .http
            .get(self.api(path)?)
            .bearer_auth(&token)
            .query(query)
            .send()
            .await?)
    }

    /// GET with the session token; logs in again once on a stale token.
    async fn get_json(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<Value, ClientError> {
        let mut response = self.send_get(path, query).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            *self.token.write().await = None;
            response = self.send_get(path, query).await?;
        }
        Self::parse(response).await
    }

    async fn send_post(&self, path: &str, body: &Value) -> Result<reqwest::Response, ClientError> {
        let token = self.ensure_token().await?;
        Ok(self
            .http
            .post(self.api(path)?)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?)
    }

    /// POST with the session token; logs in again once on a stale token.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let mut response = self.send_post(path, body).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            *self.token.write().await = None;
            response = self.send_post(path, body).await?;
        }
        Self::parse(response).await
    }

    /// Host a competition. The specification is validated locally before the
    /// request is sent.
    pub async fn start_competition(&self, spec: &CompetitionSpec) -> Result<i32, ClientError> {
        spec.validate()?;
        let body = self
            .post_json("competitions", &json!({ "spec": spec }))
            .await?;
        let created: CreateCompetitionResponse = serde_json::from_value(body)
            .map_err(|e| ClientError::Unexpected(e.to_string()))?;
        self.hosted
            .lock()
            .expect("hosted list lock poisoned")
            .push(created.competition_id);
        info!(
            competition_id = created.competition_id,
            "Hosting competition"
        );
        Ok(created.competition_id)
    }

    /// Competitions this client has started hosting.
    pub fn hosted_competitions(&self) -> Vec<i32> {
        self.hosted
            .lock()
            .expect("hosted list lock poisoned")
            .clone()
    }

    /// Query the server for competitions matching the filter.
    pub async fn competitions(
        &self,
        filter: &QueryFilter,
    ) -> Result<Vec<ActiveCompetition>, ClientError> {
        let body = self.get_json("competitions", &filter.to_query()).await?;
        let rows = body
            .as_array()
            .ok_or_else(|| ClientError::Unexpected("competition list is not an array".into()))?;
        Ok(rows.iter().filter_map(parse_competition).collect())
    }

    /// Query the server for submissions/leaderboard rows matching the filter.
    pub async fn leaderboards(&self, filter: &QueryFilter) -> Result<Vec<Value>, ClientError> {
        let body = self.get_json("submissions", &filter.to_query()).await?;
        body.as_array()
            .cloned()
            .ok_or_else(|| ClientError::Unexpected("submission list is not an array".into()))
    }

    /// Submit an answer to a competition.
    pub async fn submit(
        &self,
        competition_id: i32,
        submission: SubmissionPayload,
    ) -> Result<Value, ClientError> {
        self.post_json(
            "submissions",
            &json!({ "competition_id": competition_id, "submission": submission }),
        )
        .await
    }

    /// Register a strategy for a competition type and make sure the
    /// participation loop is running. The loop runs until the process exits.
    pub fn compete(&self, competition_type: CompetitionType, strategy: Arc<dyn Strategy>) {
        self.book.register(competition_type, strategy);
        if !self.competing.swap(true, Ordering::SeqCst) {
            let participation = ParticipationLoop::new(
                Arc::new(self.clone()),
                Arc::new(self.clone()),
                Arc::clone(&self.book),
                self.poll_interval,
            );
            tokio::spawn(participation.run());
            info!("Started participation loop");
        }
    }
}

/// Parse one competition listing row; rows that do not carry a well-formed
/// spec are skipped with a warning.
fn parse_competition(row: &Value) -> Option<ActiveCompetition> {
    let competition_id = row.get("id")?.as_i64()? as i32;
    match serde_json::from_value::<CompetitionSpec>(row.clone()) {
        Ok(spec) => Some(ActiveCompetition {
            competition_id,
            spec,
        }),
        Err(e) => {
            warn!(competition_id, error = %e, "Skipping unparseable competition row");
            None
        }
    }
}

#[async_trait]
impl Registry for Client {
    async fn active_competitions(&self) -> Result<Vec<ActiveCompetition>, ClientError> {
        self.competitions(&QueryFilter::default()).await
    }
}

#[async_trait]
impl Intake for Client {
    async fn submit_result(
        &self,
        competition_id: i32,
        payload: SubmissionPayload,
    ) -> Result<(), ClientError> {
        self.submit(competition_id, payload).await.map(|_| ())
    }
}
