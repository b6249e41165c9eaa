use ::common::Frame;
use sea_orm::EntityTrait;
use serde_json::json;

use server::entity::competition;

use crate::common::{TestApp, routes, spec_json};

const DATA_URL: &str = "http://data.test/prices.json";

#[tokio::test]
async fn test_create_and_list_competition() {
    let app = TestApp::spawn().await;
    let host = app.create_user("host").await;

    app.resolver.set(
        DATA_URL,
        Frame::from_json(&json!([{"close": 10.0}])).unwrap(),
    );

    let id = app
        .create_competition(&host.token, &spec_json("Predict", DATA_URL, json!("close"), 0))
        .await;

    let list = app.get_with_token(routes::COMPETITIONS, &host.token).await;
    assert_eq!(list.status, 200);
    let rows = list.body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"].as_i64().unwrap() as i32, id);
    assert_eq!(rows[0]["competition_type"], "Predict");
    assert_eq!(rows[0]["active"], true);
    // Public listing never carries the dataset snapshot or the answer.
    assert!(rows[0].get("current_state").is_none());
    assert!(rows[0].get("answer").is_none());

    // The registration snapshot was recorded for new-row detection.
    let stored = competition::Entity::find_by_id(id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.current_state, Some(json!([{"close": 10.0}])));
}

#[tokio::test]
async fn test_malformed_spec_rejected_before_persistence() {
    let app = TestApp::spawn().await;
    let host = app.create_user("host").await;

    let bad = spec_json("Predict", "not a url", json!("close"), 0);
    let res = app
        .post_with_token(routes::COMPETITIONS, &json!({ "spec": bad }), &host.token)
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");

    let bad = spec_json("Predict", DATA_URL, json!([]), 0);
    let res = app
        .post_with_token(routes::COMPETITIONS, &json!({ "spec": bad }), &host.token)
        .await;
    assert_eq!(res.status, 400);

    // A keyed target shape without a dataset key is malformed too.
    let keyed = spec_json("Predict", DATA_URL, json!({"AAPL": "close"}), 0);
    let res = app
        .post_with_token(routes::COMPETITIONS, &json!({ "spec": keyed }), &host.token)
        .await;
    assert_eq!(res.status, 400);

    let none = competition::Entity::find().all(&app.db).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_list_filters_are_conjunctive() {
    let app = TestApp::spawn().await;
    let host = app.create_user("host").await;
    let other = app.create_user("other").await;

    app.resolver.set(DATA_URL, Frame::from_json(&json!([])).unwrap());

    let predict = app
        .create_competition(&host.token, &spec_json("Predict", DATA_URL, json!("close"), 0))
        .await;
    app.create_competition(&other.token, &spec_json("Classify", DATA_URL, json!("label"), 0))
        .await;

    let path = format!(
        "{}?type=Predict&user_id={}",
        routes::COMPETITIONS,
        host.id
    );
    let list = app.get_with_token(&path, &host.token).await;
    let rows = list.body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"].as_i64().unwrap() as i32, predict);

    // Same type filter, wrong owner: conjunction yields nothing.
    let path = format!(
        "{}?type=Predict&user_id={}",
        routes::COMPETITIONS,
        other.id
    );
    let list = app.get_with_token(&path, &host.token).await;
    assert!(list.body.as_array().unwrap().is_empty());

    let bad = format!("{}?type=Guess", routes::COMPETITIONS);
    let res = app.get_with_token(&bad, &host.token).await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn test_expired_competition_deactivated_even_when_read_returns_nothing() {
    let app = TestApp::spawn().await;
    let host = app.create_user("host").await;

    app.resolver.set(DATA_URL, Frame::from_json(&json!([])).unwrap());
    let id = app
        .create_competition(&host.token, &spec_json("Predict", DATA_URL, json!("close"), 0))
        .await;
    app.expire_competition(id).await;

    // Filter matches nothing, but the read still observes the expired row.
    let path = format!("{}?type=Classify", routes::COMPETITIONS);
    let list = app.get_with_token(&path, &host.token).await;
    assert!(list.body.as_array().unwrap().is_empty());

    let stored = competition::Entity::find_by_id(id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.active);

    // Inactive rows stay hidden unless explicitly requested.
    let list = app.get_with_token(routes::COMPETITIONS, &host.token).await;
    assert!(list.body.as_array().unwrap().is_empty());

    let path = format!("{}?include_inactive=true", routes::COMPETITIONS);
    let list = app.get_with_token(&path, &host.token).await;
    assert_eq!(list.body.as_array().unwrap().len(), 1);
}
