use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{CompetitionSpec, CompetitionType, SubmissionPayload};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::ActiveCompetition;
use crate::error::ClientError;

/// A participant strategy for one competition type.
///
/// Returning `None` (or an empty payload) declines to answer; nothing is
/// submitted and the competition may be picked up again on a later cycle.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, spec: &CompetitionSpec) -> Option<SubmissionPayload>;
}

/// Source of currently active competitions.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn active_competitions(&self) -> Result<Vec<ActiveCompetition>, ClientError>;
}

/// Destination for finished strategy results.
#[async_trait]
pub trait Intake: Send + Sync {
    async fn submit_result(
        &self,
        competition_id: i32,
        payload: SubmissionPayload,
    ) -> Result<(), ClientError>;
}

/// Identifies one in-flight worker: `(competition_id, strategy name)`.
pub type DispatchKey = (i32, String);

/// Strategies registered per competition type, shared between the caller and
/// the running loop so new strategies can join mid-flight.
#[derive(Default)]
pub struct StrategyBook {
    inner: RwLock<HashMap<CompetitionType, Vec<Arc<dyn Strategy>>>>,
}

impl StrategyBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, competition_type: CompetitionType, strategy: Arc<dyn Strategy>) {
        self.inner
            .write()
            .expect("strategy book lock poisoned")
            .entry(competition_type)
            .or_default()
            .push(strategy);
    }

    pub fn for_type(&self, competition_type: CompetitionType) -> Vec<Arc<dyn Strategy>> {
        self.inner
            .read()
            .expect("strategy book lock poisoned")
            .get(&competition_type)
            .cloned()
            .unwrap_or_default()
    }
}

/// The discovery-and-dispatch loop.
///
/// Each cycle polls the registry, launches at most one worker per
/// `(competition_id, strategy)` pair, then collects finished workers without
/// ever blocking on a running one. Finished results are submitted exactly
/// once; a worker that never finishes keeps its pair dispatched and is never
/// relaunched. The loop runs until the owning process shuts down.
pub struct ParticipationLoop {
    registry: Arc<dyn Registry>,
    intake: Arc<dyn Intake>,
    book: Arc<StrategyBook>,
    dispatched: HashMap<DispatchKey, JoinHandle<Option<SubmissionPayload>>>,
    interval: Duration,
}

impl ParticipationLoop {
    pub fn new(
        registry: Arc<dyn Registry>,
        intake: Arc<dyn Intake>,
        book: Arc<StrategyBook>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            intake,
            book,
            dispatched: HashMap::new(),
            interval,
        }
    }

    /// Run forever at a fixed cadence, independent of worker runtimes.
    pub async fn run(mut self) {
        loop {
            self.cycle().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One discovery + collection pass.
    pub async fn cycle(&mut self) {
        self.discover().await;
        self.collect().await;
    }

    /// Pairs with a live or uncollected worker.
    pub fn dispatched_pairs(&self) -> Vec<DispatchKey> {
        self.dispatched.keys().cloned().collect()
    }

    async fn discover(&mut self) {
        let competitions = match self.registry.active_competitions().await {
            Ok(competitions) => competitions,
            Err(e) => {
                warn!(error = %e, "Competition poll failed");
                return;
            }
        };

        for competition in competitions {
            let strategies = self.book.for_type(competition.spec.competition_type);
            for strategy in strategies {
                let key = (competition.competition_id, strategy.name().to_string());
                if self.dispatched.contains_key(&key) {
                    continue;
                }

                let spec = competition.spec.clone();
                let handle = tokio::spawn(async move { strategy.run(&spec).await });

                info!(
                    competition_id = key.0,
                    strategy = %key.1,
                    "Dispatched worker"
                );
                self.dispatched.insert(key, handle);
            }
        }
    }

    async fn collect(&mut self) {
        let finished: Vec<DispatchKey> = self
            .dispatched
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(key, _)| key.clone())
            .collect();

        for key in finished {
            let Some(handle) = self.dispatched.remove(&key) else {
                continue;
            };
            // The handle already finished, so this await does not block.
            match handle.await {
                Ok(Some(payload)) if !payload.is_empty() => {
                    if let Err(e) = self.intake.submit_result(key.0, payload).await {
                        warn!(
                            competition_id = key.0,
                            strategy = %key.1,
                            error = %e,
                            "Result submission failed"
                        );
                    } else {
                        info!(
                            competition_id = key.0,
                            strategy = %key.1,
                            "Submitted worker result"
                        );
                    }
                }
                Ok(_) => {
                    debug!(
                        competition_id = key.0,
                        strategy = %key.1,
                        "Strategy declined to answer"
                    );
                }
                Err(e) => {
                    warn!(
                        competition_id = key.0,
                        strategy = %key.1,
                        error = %e,
                        "Worker failed"
                    );
                }
            }
        }
    }
}
