use std::sync::Arc;

use ::common::Frame;
use sea_orm::EntityTrait;
use serde_json::json;

use server::entity::{competition, submission};
use server::scoring::{DatasetResolver, ScoringEngine};

use crate::common::{TestApp, routes, spec_json};

const DATA_URL: &str = "http://data.test/labels.json";

#[tokio::test]
async fn test_immediate_scoring_appears_in_views_before_submit_returns() {
    let app = TestApp::spawn().await;
    let host = app.create_user("host").await;
    let player = app.create_user("player").await;

    app.resolver.set(
        DATA_URL,
        Frame::from_json(&json!([{"label": "cat"}])).unwrap(),
    );
    let id = app
        .create_competition(&host.token, &spec_json("Classify", DATA_URL, json!("label"), 0))
        .await;

    let res = app.submit(&player.token, id, json!([{"label": "cat"}])).await;
    assert_eq!(res.status, 200, "{}", res.text);
    let score = res.body["score"].as_f64().expect("score must be resolved");
    assert!(score.is_finite());
    assert_eq!(score, 1.0);
    let submission_id = res.body["id"].as_i64().unwrap();

    // Visible on the public leaderboard without any further calls.
    let board = app.get_with_token(routes::LEADERBOARD, &player.token).await;
    let rows = board.body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"].as_i64().unwrap(), submission_id);
    assert_eq!(rows[0]["score"].as_f64().unwrap(), 1.0);
    // Leaderboard rows are the public projection: no payload.
    assert!(rows[0].get("payload").is_none());

    // And in the admin submissions view, with the payload.
    let admin = app.create_admin("boss").await;
    let view = app
        .get_with_token(&routes::admin_view("submissions"), &admin.token)
        .await;
    let rows = view.body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].get("payload").is_some());
}

#[tokio::test]
async fn test_submit_to_unknown_competition_is_not_found() {
    let app = TestApp::spawn().await;
    let player = app.create_user("player").await;

    let res = app.submit(&player.token, 999, json!([{"a": 1}])).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_submission_rejected_without_state_change() {
    let app = TestApp::spawn().await;
    let host = app.create_user("host").await;

    app.resolver.set(DATA_URL, Frame::from_json(&json!([])).unwrap());
    let id = app
        .create_competition(&host.token, &spec_json("Classify", DATA_URL, json!("label"), 0))
        .await;

    let res = app.submit(&host.token, id, json!(42)).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");

    let stored = submission::Entity::find().all(&app.db).await.unwrap();
    assert!(stored.is_empty());
    assert_eq!(app.engine.pending_len().await, 0);
}

#[tokio::test]
async fn test_expired_competition_accepts_submission_as_no_op() {
    let app = TestApp::spawn().await;
    let host = app.create_user("host").await;
    let player = app.create_user("player").await;

    app.resolver.set(DATA_URL, Frame::from_json(&json!([])).unwrap());
    let id = app
        .create_competition(&host.token, &spec_json("Classify", DATA_URL, json!("label"), 0))
        .await;
    app.expire_competition(id).await;

    let res = app.submit(&player.token, id, json!([{"label": "cat"}])).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, json!({}));

    let stored = submission::Entity::find().all(&app.db).await.unwrap();
    assert!(stored.is_empty());

    // Observing the expiration at submit time deactivates the competition.
    let comp = competition::Entity::find_by_id(id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!comp.active);
}

#[tokio::test]
async fn test_deferred_scoring_lifecycle() {
    let app = TestApp::spawn().await;
    let host = app.create_user("host").await;
    let player = app.create_user("player").await;

    app.resolver.set(
        DATA_URL,
        Frame::from_json(&json!([{"close": 10.0}])).unwrap(),
    );
    let id = app
        .create_competition(&host.token, &spec_json("Predict", DATA_URL, json!("close"), 3600))
        .await;

    // Deferred: the caller learns only the submission id.
    let res = app.submit(&player.token, id, json!([{"close": 11.0}])).await;
    assert_eq!(res.status, 200, "{}", res.text);
    let submission_id = res.body["submission_id"].as_i64().unwrap() as i32;
    assert_eq!(res.body.as_object().unwrap().len(), 1);
    assert_eq!(app.engine.pending_len().await, 1);

    // Not expired yet: a read sweeps but nothing is ready.
    let list = app.get_with_token(routes::SUBMISSIONS, &player.token).await;
    assert_eq!(list.body[0]["score"], json!(null));
    assert_eq!(app.engine.pending_len().await, 1);

    // Expired but the dataset has not grown: the entry stays queued.
    app.expire_competition(id).await;
    let list = app.get_with_token(routes::SUBMISSIONS, &player.token).await;
    assert_eq!(list.body[0]["score"], json!(null));
    assert_eq!(app.engine.pending_len().await, 1);

    // A new row lands: the next read scores it and empties the queue.
    app.resolver.set(
        DATA_URL,
        Frame::from_json(&json!([{"close": 10.0}, {"close": 12.0}])).unwrap(),
    );
    let list = app.get_with_token(routes::SUBMISSIONS, &player.token).await;
    let score = list.body[0]["score"].as_f64().expect("score resolved");
    assert_eq!(score, 0.5); // |11 - 12| = 1 => 1 / (1 + 1)
    assert_eq!(app.engine.pending_len().await, 0);

    // The most recent row was recorded as the competition's answer.
    let comp = competition::Entity::find_by_id(id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(comp.answer, Some(json!([{"close": 12.0}])));

    // Scored submissions reach the leaderboard through the sweep too.
    let board = app.get_with_token(routes::LEADERBOARD, &player.token).await;
    let rows = board.body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"].as_i64().unwrap() as i32, submission_id);
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let app = TestApp::spawn().await;
    let host = app.create_user("host").await;

    app.resolver.set(
        DATA_URL,
        Frame::from_json(&json!([{"close": 10.0}])).unwrap(),
    );
    let id = app
        .create_competition(&host.token, &spec_json("Predict", DATA_URL, json!("close"), 3600))
        .await;
    app.submit(&host.token, id, json!([{"close": 10.0}])).await;

    app.expire_competition(id).await;
    app.resolver.set(
        DATA_URL,
        Frame::from_json(&json!([{"close": 10.0}, {"close": 10.0}])).unwrap(),
    );

    let first = app.engine.sweep().await;
    assert_eq!(first.len(), 1);

    // No new data between sweeps: nothing changes, nothing duplicates.
    let second = app.engine.sweep().await;
    assert!(second.is_empty());
    let third = app.engine.sweep().await;
    assert!(third.is_empty());

    let board = app.get_with_token(routes::LEADERBOARD, &host.token).await;
    assert_eq!(board.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_submissions_visible_only_to_submitter_and_owner() {
    let app = TestApp::spawn().await;
    let host = app.create_user("host").await;
    let player = app.create_user("player").await;
    let stranger = app.create_user("stranger").await;

    app.resolver.set(
        DATA_URL,
        Frame::from_json(&json!([{"label": "cat"}])).unwrap(),
    );
    let id = app
        .create_competition(&host.token, &spec_json("Classify", DATA_URL, json!("label"), 0))
        .await;
    app.submit(&player.token, id, json!([{"label": "dog"}])).await;

    let mine = app.get_with_token(routes::SUBMISSIONS, &player.token).await;
    assert_eq!(mine.body.as_array().unwrap().len(), 1);

    // The competition owner sees entries to their competition.
    let owners = app.get_with_token(routes::SUBMISSIONS, &host.token).await;
    assert_eq!(owners.body.as_array().unwrap().len(), 1);

    // A third party sees nothing, even with explicit filters.
    let theirs = app.get_with_token(routes::SUBMISSIONS, &stranger.token).await;
    assert!(theirs.body.as_array().unwrap().is_empty());
    let path = format!("{}?user_id={}", routes::SUBMISSIONS, player.id);
    let theirs = app.get_with_token(&path, &stranger.token).await;
    assert!(theirs.body.as_array().unwrap().is_empty());

    // Admins see everything.
    let admin = app.create_admin("boss").await;
    let all = app.get_with_token(routes::SUBMISSIONS, &admin.token).await;
    assert_eq!(all.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_recover_pending_rebuilds_queue_from_database() {
    let app = TestApp::spawn().await;
    let host = app.create_user("host").await;

    app.resolver.set(
        DATA_URL,
        Frame::from_json(&json!([{"close": 10.0}])).unwrap(),
    );
    let id = app
        .create_competition(&host.token, &spec_json("Predict", DATA_URL, json!("close"), 3600))
        .await;
    app.submit(&host.token, id, json!([{"close": 9.0}])).await;

    // A fresh engine (as after a restart) rediscovers the deferred entry.
    let fresh = ScoringEngine::new(
        app.db.clone(),
        Arc::clone(&app.resolver) as Arc<dyn DatasetResolver>,
        app.views.clone(),
    );
    let recovered = fresh.recover_pending().await.unwrap();
    assert_eq!(recovered, 1);

    app.expire_competition(id).await;
    app.resolver.set(
        DATA_URL,
        Frame::from_json(&json!([{"close": 10.0}, {"close": 9.0}])).unwrap(),
    );
    let scored = fresh.sweep().await;
    assert_eq!(scored.len(), 1);
    assert_eq!(fresh.pending_len().await, 0);
}
