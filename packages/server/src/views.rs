use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Value, json};
use tracing::debug;

use crate::entity::{competition, submission};

/// Public view of competitions (spec fields, no dataset internals).
pub const VIEW_COMPETITIONS: &str = "competitions";
/// Admin view of every submission, all fields.
pub const VIEW_SUBMISSIONS: &str = "submissions";
/// Public leaderboard of scored submissions.
pub const VIEW_LEADERBOARD: &str = "leaderboard";

/// A set of named, independently queryable materialized tables.
///
/// Rows are keyed by record id, so republishing a record replaces its row
/// rather than appending a duplicate.
#[derive(Debug, Default)]
pub struct ViewHub {
    tables: DashMap<String, BTreeMap<i32, Value>>,
}

impl ViewHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) a table with its initial rows.
    pub fn host(&self, name: &str, rows: Vec<(i32, Value)>) {
        debug!(view = name, rows = rows.len(), "Hosting view");
        self.tables.insert(name.to_string(), rows.into_iter().collect());
    }

    /// Upsert rows into a table; unknown tables are created on the fly.
    pub fn update(&self, name: &str, rows: Vec<(i32, Value)>) {
        let mut table = self.tables.entry(name.to_string()).or_default();
        for (id, row) in rows {
            table.insert(id, row);
        }
    }

    /// Snapshot a table's rows in id order, `None` for unknown tables.
    pub fn snapshot(&self, name: &str) -> Option<Vec<Value>> {
        self.tables
            .get(name)
            .map(|table| table.values().cloned().collect())
    }

    pub fn names(&self) -> Vec<String> {
        self.tables.iter().map(|e| e.key().clone()).collect()
    }
}

/// Public projection of a competition: the spec a participant needs, without
/// the dataset snapshot or the resolved answer.
pub fn competition_public_row(m: &competition::Model) -> Value {
    json!({
        "id": m.id,
        "title": m.title,
        "competition_type": m.competition_type,
        "dataset_url": m.dataset_url,
        "dataset_key": m.dataset_key,
        "targets": m.targets,
        "answer_delay_secs": m.answer_delay_secs,
        "expiration": m.expiration,
        "active": m.active,
        "user_id": m.user_id,
        "created_at": m.created_at,
    })
}

/// Admin projection of a competition: everything, including snapshots.
pub fn competition_admin_row(m: &competition::Model) -> Value {
    let mut row = competition_public_row(m);
    if let Some(obj) = row.as_object_mut() {
        obj.insert("current_state".into(), m.current_state.clone().into());
        obj.insert("answer".into(), m.answer.clone().into());
    }
    row
}

/// Public projection of a submission: leaderboard fields only, never the
/// payload.
pub fn submission_public_row(m: &submission::Model) -> Value {
    json!({
        "id": m.id,
        "competition_id": m.competition_id,
        "user_id": m.user_id,
        "score": m.score,
        "created_at": m.created_at,
    })
}

/// Admin projection of a submission: all fields.
pub fn submission_admin_row(m: &submission::Model) -> Value {
    json!({
        "id": m.id,
        "competition_id": m.competition_id,
        "user_id": m.user_id,
        "format": m.format,
        "payload": m.payload,
        "score": m.score,
        "created_at": m.created_at,
        "scored_at": m.scored_at,
    })
}

/// Fans record changes out into the public and admin view tiers.
///
/// Both hubs are injected at startup and shared by reference; projection is
/// deterministic, so one record always yields the same two rows.
#[derive(Clone)]
pub struct ViewPropagator {
    public: Arc<ViewHub>,
    admin: Arc<ViewHub>,
}

impl ViewPropagator {
    pub fn new(public: Arc<ViewHub>, admin: Arc<ViewHub>) -> Self {
        Self { public, admin }
    }

    pub fn public(&self) -> &ViewHub {
        &self.public
    }

    pub fn admin(&self) -> &ViewHub {
        &self.admin
    }

    /// Publish a competition into both tiers.
    pub fn publish_competition(&self, m: &competition::Model) {
        self.admin
            .update(VIEW_COMPETITIONS, vec![(m.id, competition_admin_row(m))]);
        self.public
            .update(VIEW_COMPETITIONS, vec![(m.id, competition_public_row(m))]);
    }

    /// Publish a newly accepted submission into the admin tier.
    pub fn publish_submission(&self, m: &submission::Model) {
        self.admin
            .update(VIEW_SUBMISSIONS, vec![(m.id, submission_admin_row(m))]);
    }

    /// Publish a scored submission into the admin tier and the public
    /// leaderboard.
    pub fn publish_scored(&self, m: &submission::Model) {
        self.admin
            .update(VIEW_SUBMISSIONS, vec![(m.id, submission_admin_row(m))]);
        self.public
            .update(VIEW_LEADERBOARD, vec![(m.id, submission_public_row(m))]);
    }
}
