mod common;

use axum::http::StatusCode;
use chat_service::services::MockChatProvider;
use common::{test_config, TestApp};
use serde_json::json;

#[tokio::test]
async fn start_session_without_initial_message() {
    let app = TestApp::new();
    let token = app.token_for("alice");

    let (status, body) = app
        .post("/api/chat/session/start", Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["session"]["title"], "New Chat Session");
    assert_eq!(body["data"]["session"]["model"], "openai/gpt-3.5-turbo");
    assert_eq!(body["data"]["session"]["messageCount"], 0);
    assert!(body["data"]["firstMessage"].is_null());
}

#[tokio::test]
async fn start_session_runs_the_initial_message() {
    let app = TestApp::new();
    let token = app.token_for("alice");

    let (status, body) = app
        .post(
            "/api/chat/session/start",
            Some(&token),
            json!({
                "title": "Greetings",
                "modelId": "openai/gpt-4",
                "initialMessage": "Hi there"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["session"]["title"], "Greetings");
    assert_eq!(body["data"]["session"]["messageCount"], 2);
    assert_eq!(body["data"]["firstMessage"]["role"], "assistant");
    assert_eq!(body["data"]["firstMessage"]["model"], "openai/gpt-4");

    let request = app.provider.last_request().expect("provider was not called");
    assert_eq!(request.model, "openai/gpt-4");
}

#[tokio::test]
async fn send_message_stores_both_turns() {
    let app = TestApp::new();
    let token = app.token_for("alice");
    let id = app.create_session(&token, "chat").await;

    let (status, body) = app
        .post(
            "/api/chat/session",
            Some(&token),
            json!({ "sessionId": id, "message": "What is Rust?" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["sessionId"], id.as_str());
    assert_eq!(body["data"]["message"]["role"], "assistant");
    assert!(body["data"]["message"]["content"]
        .as_str()
        .unwrap()
        .contains("What is Rust?"));
    assert_eq!(body["data"]["usage"]["promptTokens"], 13);
    assert_eq!(body["data"]["usage"]["completionTokens"], 50);
    assert_eq!(
        body["data"]["note"],
        "Mock response - configure OPENROUTER_API_KEY for real AI responses"
    );

    let (status, body) = app
        .get(
            &format!("/api/chat/session/{}/history", id),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "What is Rust?");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["tokens"]["completion"], 50);
    assert_eq!(body["data"]["pagination"]["count"], 2);
    assert_eq!(body["data"]["session"]["messageCount"], 2);
}

#[tokio::test]
async fn send_message_requires_session_and_text() {
    let app = TestApp::new();
    let token = app.token_for("alice");

    let (status, body) = app
        .post("/api/chat/session", Some(&token), json!({ "message": "hello" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "sessionId and message are required");

    let id = app.create_session(&token, "blank").await;
    let (status, _) = app
        .post(
            "/api/chat/session",
            Some(&token),
            json!({ "sessionId": id, "message": "   " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn send_message_to_unknown_session_is_not_found() {
    let app = TestApp::new();
    let token = app.token_for("alice");

    let (status, body) = app
        .post(
            "/api/chat/session",
            Some(&token),
            json!({ "sessionId": "missing", "message": "hello" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session not found");
}

#[tokio::test]
async fn upstream_failure_keeps_the_user_turn() {
    let app = TestApp::with_provider(test_config(), MockChatProvider::new(false));
    let token = app.token_for("alice");
    let id = app.create_session(&token, "failing").await;

    let (status, body) = app
        .post(
            "/api/chat/session",
            Some(&token),
            json!({ "sessionId": id, "message": "hello?" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);

    let (_, body) = app
        .get(&format!("/api/sessions/{}/messages", id), Some(&token))
        .await;
    let messages = body["data"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
}

#[tokio::test]
async fn context_window_sends_only_recent_messages() {
    let mut config = test_config();
    config.chat.context_window = 3;
    let app = TestApp::with_config(config);
    let token = app.token_for("alice");
    let id = app.create_session(&token, "window").await;

    for content in ["one", "two", "three"] {
        app.post(
            &format!("/api/sessions/{}/messages", id),
            Some(&token),
            json!({ "role": "user", "content": content }),
        )
        .await;
    }
    app.post(
        "/api/chat/session",
        Some(&token),
        json!({ "sessionId": id, "message": "four" }),
    )
    .await;

    let request = app.provider.last_request().expect("provider was not called");
    let sent: Vec<&str> = request
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(sent, vec!["two", "three", "four"]);
}

#[tokio::test]
async fn history_of_another_users_session_is_not_found() {
    let app = TestApp::new();
    let alice = app.token_for("alice");
    let bob = app.token_for("bob");
    let id = app.create_session(&alice, "mine").await;

    let (status, _) = app
        .get(&format!("/api/chat/session/{}/history", id), Some(&bob))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn model_catalogue_is_public() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/chat/models", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    assert_eq!(
        body["note"],
        "Using mock models - configure OPENROUTER_API_KEY for real models"
    );
}

#[tokio::test]
async fn filtered_models() {
    let app = TestApp::new();

    let (status, body) = app
        .get("/api/chat/models/filtered?maxPrice=0.01", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&"openai/gpt-4"));
    assert_eq!(body["filters"]["maxPrice"], 0.01);

    let (_, body) = app
        .get(
            "/api/chat/models/filtered?provider=openai&minContextLength=8000",
            None,
        )
        .await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["id"], "openai/gpt-4");

    let (_, body) = app
        .get("/api/chat/models/filtered?search=free", None)
        .await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn cost_estimate() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/chat/cost-estimate",
            None,
            json!({
                "modelId": "openai/gpt-4",
                "promptTokens": 100,
                "completionTokens": 10
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["model"], "GPT-4");
    assert_eq!(body["data"]["modelId"], "openai/gpt-4");
    let total = body["data"]["cost"]["totalCost"].as_f64().unwrap();
    assert!((total - 3.6).abs() < 1e-9);

    let (status, body) = app
        .post(
            "/api/chat/cost-estimate",
            None,
            json!({ "modelId": "nope/none", "promptTokens": 1, "completionTokens": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Model not found");

    let (status, _) = app
        .post(
            "/api/chat/cost-estimate",
            None,
            json!({ "modelId": "", "promptTokens": 1, "completionTokens": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn direct_message_needs_no_token() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/chat/message",
            None,
            json!({ "modelId": "openai/gpt-4", "message": "quick question" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["modelId"], "openai/gpt-4");
    assert_eq!(body["data"]["message"], "quick question");
    assert!(body["data"]["response"]
        .as_str()
        .unwrap()
        .contains("quick question"));
    assert!(body["data"]["note"].is_string());
}

#[tokio::test]
async fn simple_chat_answers_without_envelope() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/chat/simple",
            None,
            json!({ "modelId": "openai/gpt-4", "message": "hello" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["modelId"], "openai/gpt-4");
    assert!(body["response"].is_string());
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn sessionless_chat_requires_model_and_message() {
    let app = TestApp::new();

    for uri in [
        "/api/chat/message",
        "/api/chat/simple",
        "/api/chat/conversation",
        "/api/chat/complete",
    ] {
        let (status, body) = app.post(uri, None, json!({ "message": "hi" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "modelId and message are required");
    }
    assert!(app.provider.last_request().is_none());
}

#[tokio::test]
async fn conversation_returns_updated_context() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/chat/conversation",
            None,
            json!({
                "modelId": "openai/gpt-4",
                "message": "and then?",
                "context": ["tell me a story", "once upon a time"]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let context = body["data"]["updatedContext"].as_array().unwrap();
    assert_eq!(context.len(), 4);
    assert_eq!(context[0], "tell me a story");
    assert_eq!(context[2], "and then?");
    assert_eq!(context[3], body["data"]["response"]);
    assert_eq!(app.provider.last_request().unwrap().messages.len(), 3);
}

#[tokio::test]
async fn complete_honours_and_validates_options() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/chat/complete",
            None,
            json!({
                "modelId": "openai/gpt-4",
                "message": "be brief",
                "options": { "maxTokens": 64 }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["maxTokens"], 64);
    assert_eq!(app.provider.last_request().unwrap().params.max_tokens, 64);

    let (status, _) = app
        .post(
            "/api/chat/complete",
            None,
            json!({
                "modelId": "openai/gpt-4",
                "message": "too hot",
                "options": { "temperature": 5.0 }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sessionless_upstream_failure_is_bad_gateway() {
    let app = TestApp::with_provider(test_config(), MockChatProvider::new(false));

    let (status, body) = app
        .post(
            "/api/chat/message",
            None,
            json!({ "modelId": "openai/gpt-4", "message": "hello?" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn chat_health_reports_upstream_state() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/chat/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["openRouterApi"], true);
    assert!(body["data"]["timestamp"].is_string());

    let down = TestApp::with_provider(test_config(), MockChatProvider::new(false));
    let (status, body) = down.get("/api/chat/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["openRouterApi"], false);
}
