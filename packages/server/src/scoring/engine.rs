use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use common::{Row, TargetSpec, scoring};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::entity::{competition, submission};
use crate::scoring::resolver::{DatasetResolver, ResolveError};
use crate::views::ViewPropagator;

/// Acknowledgment returned for a deferred submission: the caller learns only
/// that it was accepted and is pending.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DeferredAck {
    pub submission_id: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("submission {0} payload unreadable: {1}")]
    Payload(i32, common::submission::SubmissionError),
}

/// A deferred-queue entry awaiting its competition's answer data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingScore {
    submission_id: i32,
    competition_id: i32,
}

/// What one sweep pass decided about a queue entry.
enum SweepOutcome {
    Scored(Box<submission::Model>),
    NotReady,
    /// The entry no longer needs sweeping (submission gone or already scored).
    Resolved,
}

/// The sole writer of submission scores.
///
/// Scores submissions immediately when a competition has no answer delay,
/// otherwise parks them in the deferred queue until a sweep finds that new
/// answer rows have landed. All score writes go through `score_immediate`,
/// and every write is propagated into the views before the call returns.
pub struct ScoringEngine {
    db: DatabaseConnection,
    resolver: Arc<dyn DatasetResolver>,
    views: ViewPropagator,
    queue: tokio::sync::Mutex<VecDeque<PendingScore>>,
}

impl ScoringEngine {
    pub fn new(
        db: DatabaseConnection,
        resolver: Arc<dyn DatasetResolver>,
        views: ViewPropagator,
    ) -> Self {
        Self {
            db,
            resolver,
            views,
            queue: tokio::sync::Mutex::new(VecDeque::new()),
        }
    }

    /// Rebuild the deferred queue from the database on startup.
    ///
    /// Scores are written before queue entries are dropped, so any unscored
    /// submission of a delayed competition belongs back in the queue.
    pub async fn recover_pending(&self) -> Result<usize, EngineError> {
        let pending = submission::Entity::find()
            .filter(submission::Column::Score.is_null())
            .all(&self.db)
            .await?;

        let mut queue = self.queue.lock().await;
        queue.clear();
        for sub in pending {
            let Some(comp) = competition::Entity::find_by_id(sub.competition_id)
                .one(&self.db)
                .await?
            else {
                continue;
            };
            if comp.answer_delay_secs > 0 {
                queue.push_back(PendingScore {
                    submission_id: sub.id,
                    competition_id: sub.competition_id,
                });
            }
        }
        if !queue.is_empty() {
            info!(pending = queue.len(), "Recovered deferred submissions");
        }
        Ok(queue.len())
    }

    /// Snapshot the competition's dataset for later new-row detection.
    /// Resolver failures are tolerated: the competition starts with an empty
    /// snapshot and any later rows count as growth.
    pub async fn snapshot_state(&self, comp: &competition::Model) -> serde_json::Value {
        match self.resolver.fetch(comp).await {
            Ok(frame) => frame.to_records(),
            Err(e) => {
                warn!(
                    competition_id = comp.id,
                    error = %e,
                    "Dataset snapshot failed at registration, starting empty"
                );
                serde_json::Value::Array(vec![])
            }
        }
    }

    /// Score a submission now and persist the result.
    ///
    /// Exactly one persisted write and one propagation into the admin
    /// submissions view and the public leaderboard.
    pub async fn score_immediate(
        &self,
        sub: submission::Model,
        comp: &competition::Model,
    ) -> Result<submission::Model, EngineError> {
        let submitted = sub
            .payload()
            .latest()
            .map_err(|e| EngineError::Payload(sub.id, e))?;

        let answer = self.answer_context(comp);
        let targets = comp
            .target_spec()
            .map(|t| t.target_columns())
            .unwrap_or_default();
        let kind = comp
            .competition_type()
            .unwrap_or(common::CompetitionType::Classify);

        let value = scoring::score(kind, &submitted, &answer, &targets);
        info!(
            submission_id = sub.id,
            competition_id = comp.id,
            score = value,
            "Scoring submission"
        );

        let txn = self.db.begin().await?;
        let mut active: submission::ActiveModel = sub.into();
        active.score = Set(Some(value));
        active.scored_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        self.views.publish_scored(&updated);
        Ok(updated)
    }

    /// Park a submission until its competition's answer data lands.
    pub async fn defer(
        &self,
        sub: &submission::Model,
        comp: &competition::Model,
    ) -> DeferredAck {
        info!(
            submission_id = sub.id,
            competition_id = comp.id,
            "Stashing submission to score later"
        );
        self.queue.lock().await.push_back(PendingScore {
            submission_id: sub.id,
            competition_id: comp.id,
        });
        DeferredAck {
            submission_id: sub.id,
        }
    }

    /// Resolve every deferred submission whose readiness condition holds.
    ///
    /// Entries are scored in queue order; an entry is removed only after its
    /// score is written. Running the sweep with no new data is a no-op, and
    /// an empty queue returns immediately. Resolver or database failures
    /// leave the entry queued for the next sweep.
    pub async fn sweep(&self) -> Vec<i32> {
        let mut queue = self.queue.lock().await;
        if queue.is_empty() {
            return Vec::new();
        }

        let mut remaining = VecDeque::with_capacity(queue.len());
        let mut scored = Vec::new();

        while let Some(entry) = queue.pop_front() {
            match self.try_resolve(entry).await {
                Ok(SweepOutcome::Scored(model)) => scored.push(model.id),
                Ok(SweepOutcome::Resolved) => {}
                Ok(SweepOutcome::NotReady) => remaining.push_back(entry),
                Err(e) => {
                    warn!(
                        submission_id = entry.submission_id,
                        error = %e,
                        "Sweep failed for submission, will retry on next sweep"
                    );
                    remaining.push_back(entry);
                }
            }
        }

        debug!(left = remaining.len(), scored = scored.len(), "Sweep done");
        *queue = remaining;
        scored
    }

    pub async fn pending_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Try to score one queue entry. Ready iff the competition has expired
    /// and the dataset has grown past the recorded snapshot.
    async fn try_resolve(&self, entry: PendingScore) -> Result<SweepOutcome, EngineError> {
        let Some(sub) = submission::Entity::find_by_id(entry.submission_id)
            .one(&self.db)
            .await?
        else {
            warn!(submission_id = entry.submission_id, "Queued submission vanished");
            return Ok(SweepOutcome::Resolved);
        };
        if sub.score.is_some() {
            return Ok(SweepOutcome::Resolved);
        }

        let Some(comp) = competition::Entity::find_by_id(entry.competition_id)
            .one(&self.db)
            .await?
        else {
            warn!(competition_id = entry.competition_id, "Queued competition vanished");
            return Ok(SweepOutcome::Resolved);
        };

        if !comp.is_expired(Utc::now()) {
            return Ok(SweepOutcome::NotReady);
        }

        let current = comp.current_state_frame();
        let dataset = self.resolver.fetch(&comp).await?;
        let slice = Self::answer_slice(&comp, &dataset);

        if slice.len() <= current.len() {
            debug!(
                submission_id = sub.id,
                rows = slice.len(),
                "Skipping, no new answer rows"
            );
            return Ok(SweepOutcome::NotReady);
        }

        // New rows exist: the most recent one is the answer.
        let answer_rows: Vec<common::Row> = slice.last_row().cloned().into_iter().collect();
        let answer = common::Frame::from_rows(answer_rows).to_records();

        let mut active: competition::ActiveModel = comp.clone().into();
        active.answer = Set(Some(answer));
        let comp = active.update(&self.db).await?;
        self.views.publish_competition(&comp);

        let model = self.score_immediate(sub, &comp).await?;
        Ok(SweepOutcome::Scored(Box::new(model)))
    }

    /// Cut the answer slice out of the fetched dataset by target shape.
    fn answer_slice(comp: &competition::Model, dataset: &common::Frame) -> common::Frame {
        let current = comp.current_state_frame();
        let current_columns = current.columns();
        // An empty snapshot has no columns to project onto.
        let narrow = |frame: common::Frame| {
            if current_columns.is_empty() {
                frame
            } else {
                frame.select(&current_columns)
            }
        };
        match comp.target_spec() {
            Some(TargetSpec::Keyed(_)) => {
                let Some(key) = comp.dataset_key.as_deref() else {
                    return dataset.clone();
                };
                let keep = current.key_values(key);
                narrow(dataset.filter_key_in(key, &keep))
            }
            Some(TargetSpec::Columns(cols)) => narrow(dataset.select(&cols)),
            Some(TargetSpec::Column(col)) => narrow(dataset.select(std::slice::from_ref(&col))),
            None => dataset.clone(),
        }
    }

    /// The answer context for scoring: the resolved answer row when one has
    /// landed, otherwise the latest row of the recorded snapshot.
    fn answer_context(&self, comp: &competition::Model) -> Row {
        comp.answer_row()
            .or_else(|| comp.current_state_frame().last_row().cloned())
            .unwrap_or_default()
    }
}
