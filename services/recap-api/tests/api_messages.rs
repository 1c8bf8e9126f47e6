//! Channel messages derived from stored summaries

mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use common::{at, summary_request, TestApp};
use recap_types::{Plan, QuotaTable, UserId};

async fn app_with_summary(quota: u32) -> (TestApp, UserId, String) {
    let app = TestApp::with_quotas(
        at(2025, 3, 15, 12, 0, 0),
        QuotaTable::default().with_limit(Plan::Free, quota),
    );
    let user = app.free_user(0, at(2025, 3, 1, 0, 0, 0));
    let (status, created) = app.post("/api/v1/summaries", summary_request(user)).await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_str().unwrap().to_string();
    (app, user, id)
}

#[tokio::test]
async fn test_message_does_not_consume_quota() {
    let (app, user, id) = app_with_summary(1).await;
    assert_eq!(app.usage(user), 1);

    let (status, body) = app
        .post(
            &format!("/api/v1/summaries/{id}/messages"),
            serde_json::json!({ "user_id": user.to_string(), "channel": "slack" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["channel"], "slack");
    assert_eq!(body["message"]["summary_id"], id);
    assert_eq!(body["message"]["text"], "Draft #2 (1000 tokens max)");
    assert!(body.get("warning").is_none());
    assert_eq!(app.usage(user), 1);
}

#[tokio::test]
async fn test_message_replaced_per_channel() {
    let (app, user, id) = app_with_summary(5).await;
    let uri = format!("/api/v1/summaries/{id}/messages");

    for channel in ["email", "email", "linkedin"] {
        let (status, _) = app
            .post(
                &uri,
                serde_json::json!({ "user_id": user.to_string(), "channel": channel }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .get(&format!("/api/v1/summaries/{id}?user_id={user}"))
        .await;
    assert_eq!(status, StatusCode::OK);

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    let email = messages
        .iter()
        .find(|m| m["channel"] == "email")
        .expect("email message stored");
    assert_eq!(email["text"], "Draft #3 (1000 tokens max)");
}

#[tokio::test]
async fn test_x_message_over_limit_carries_warning() {
    let (app, user, id) = app_with_summary(5).await;
    app.generator.set_text("x".repeat(300));

    let (status, body) = app
        .post(
            &format!("/api/v1/summaries/{id}/messages"),
            serde_json::json!({ "user_id": user.to_string(), "channel": "twitter" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["channel"], "x");
    assert_eq!(
        body["warning"],
        "Generated message is 300 characters, exceeds limit of 280"
    );
}

#[tokio::test]
async fn test_message_errors() {
    let (app, user, id) = app_with_summary(5).await;
    let uri = format!("/api/v1/summaries/{id}/messages");

    let (status, _) = app
        .post(
            &uri,
            serde_json::json!({ "user_id": user.to_string(), "channel": "fax" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            &uri,
            serde_json::json!({ "user_id": UserId::new().to_string(), "channel": "email" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.generator.fail.store(true, Ordering::SeqCst);
    let (status, body) = app
        .post(
            &uri,
            serde_json::json!({ "user_id": user.to_string(), "channel": "email" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "GENERATION_FAILED");
    assert_eq!(app.usage(user), 1);
}

#[tokio::test]
async fn test_delete_message_checks_owner() {
    let (app, user, id) = app_with_summary(5).await;
    let intruder = app.free_user(0, at(2025, 3, 1, 0, 0, 0));

    let (_, created) = app
        .post(
            &format!("/api/v1/summaries/{id}/messages"),
            serde_json::json!({ "user_id": user.to_string(), "channel": "linkedin" }),
        )
        .await;
    let message_id = created["message"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .delete(&format!("/api/v1/messages/{message_id}?user_id={intruder}"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "MESSAGE_NOT_FOUND");
    assert_eq!(app.messages.len(), 1);

    let (status, _) = app
        .delete(&format!("/api/v1/messages/{message_id}?user_id={user}"))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.messages.is_empty());

    let (status, _) = app
        .delete(&format!("/api/v1/messages/{message_id}?user_id={user}"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .delete(&format!("/api/v1/messages/not-an-id?user_id={user}"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
