//! Message History API Tests

use axum::http::StatusCode;
use serde_json::json;

use crate::common::{body_json, token_for, TestApp};

const CHAT: i64 = 42;
const ALICE: i64 = 1001;
const BOB: i64 = 1002;

fn messages_uri(chat_id: i64) -> String {
    format!("/api/v1/chats/{}/messages", chat_id)
}

#[tokio::test]
async fn test_list_without_token_is_unauthorized() {
    let app = TestApp::new();

    let response = app.get(&messages_uri(CHAT)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_send_without_token_is_unauthorized() {
    let app = TestApp::new();

    let response = app
        .post_json(&messages_uri(CHAT), &json!({ "text": "hi" }).to_string())
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_send_then_list_round_trip() {
    let app = TestApp::new();
    app.harness.members.join(ALICE, CHAT);
    app.harness.members.join(BOB, CHAT);

    let response = app
        .post_json_auth(
            &messages_uri(CHAT),
            &json!({ "text": "hello there" }).to_string(),
            &token_for(ALICE),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["text"], "hello there");
    assert_eq!(created["action"], "send");
    assert_eq!(created["chat_id"], CHAT.to_string());
    assert_eq!(created["sender_id"], ALICE.to_string());

    let response = app.get_auth(&messages_uri(CHAT), &token_for(BOB)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-history-source"], "fast");

    let page = body_json(response).await;
    let messages = page["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["id"], created["id"]);
    assert_eq!(messages[0]["created_at"], created["created_at"]);
    assert_eq!(page["has_more"], false);
    assert_eq!(page["source"], "fast");
}

#[tokio::test]
async fn test_list_with_limit_reports_more() {
    let app = TestApp::new();
    app.harness.members.join(ALICE, CHAT);
    let token = token_for(ALICE);

    for text in ["one", "two", "three"] {
        let response = app
            .post_json_auth(&messages_uri(CHAT), &json!({ "text": text }).to_string(), &token)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .get_auth(&format!("{}?limit=2", messages_uri(CHAT)), &token)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_json(response).await;
    let texts: Vec<&str> = page["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["two", "three"]);
    assert_eq!(page["has_more"], true);
}

#[tokio::test]
async fn test_non_member_is_forbidden() {
    let app = TestApp::new();
    app.harness.members.join(ALICE, CHAT);
    let token = token_for(BOB);

    let response = app.get_auth(&messages_uri(CHAT), &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_json_auth(&messages_uri(CHAT), &json!({ "text": "hi" }).to_string(), &token)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.harness.history.len(CHAT), 0);
}

#[tokio::test]
async fn test_empty_text_is_rejected() {
    let app = TestApp::new();
    app.harness.members.join(ALICE, CHAT);
    let token = token_for(ALICE);

    for text in ["", "   "] {
        let response = app
            .post_json_auth(&messages_uri(CHAT), &json!({ "text": text }).to_string(), &token)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    assert_eq!(app.harness.history.len(CHAT), 0);
}

#[tokio::test]
async fn test_malformed_chat_id_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .get_auth("/api/v1/chats/not-a-number/messages", &token_for(ALICE))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_conflicting_bounds_are_bad_request() {
    let app = TestApp::new();
    app.harness.members.join(ALICE, CHAT);

    let uri = format!(
        "{}?before=2024-05-01T00:00:00Z&after=2024-04-01T00:00:00Z",
        messages_uri(CHAT)
    );
    let response = app.get_auth(&uri, &token_for(ALICE)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
