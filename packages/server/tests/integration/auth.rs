use serde_json::json;

use crate::common::{TestApp, routes};

#[tokio::test]
async fn test_register_login_me() {
    let app = TestApp::spawn().await;
    let alice = app.create_user("alice").await;

    let me = app.get_with_token(routes::ME, &alice.token).await;
    assert_eq!(me.status, 200);
    assert_eq!(me.body["username"], "alice");
    assert_eq!(me.body["role"], "participant");
    assert_eq!(me.body["id"].as_i64().unwrap() as i32, alice.id);
}

#[tokio::test]
async fn test_login_with_wrong_secret_fails() {
    let app = TestApp::spawn().await;
    let alice = app.create_user("alice").await;

    let res = app
        .post_without_token(
            routes::LOGIN,
            &json!({ "key": alice.api_key, "secret": "not-the-secret" }),
        )
        .await;
    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_duplicate_username_conflict() {
    let app = TestApp::spawn().await;
    app.create_user("alice").await;

    let res = app
        .post_without_token(routes::REGISTER, &json!({ "username": "alice" }))
        .await;
    assert_eq!(res.status, 409);
    assert_eq!(res.body["code"], "USERNAME_TAKEN");
}

#[tokio::test]
async fn test_invalid_username_rejected() {
    let app = TestApp::spawn().await;

    let res = app
        .post_without_token(routes::REGISTER, &json!({ "username": "a b" }))
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = TestApp::spawn().await;

    let res = app.get_without_token(routes::ME).await;
    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_MISSING");
}
