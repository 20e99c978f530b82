use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use fireglobe_core::{ProviderError, ScriptedProvider, ServiceConfig, TesterService, TransportMode};
use fireglobe_server::router;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const HASH: &str = "0x8f2b1c3d4e5f60718293a4b5c6d7e8f90123456789abcdef0123456789abcdef";

fn app(dir: &TempDir, mode: TransportMode, provider: ScriptedProvider) -> Router {
    let mut config = ServiceConfig::default();
    config.storage.dir = dir.path().to_path_buf();
    config.server.transport = mode;
    let service = TesterService::with_provider(config, Arc::new(provider)).unwrap();
    router(Arc::new(service))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    call(app, Method::POST, uri, Some(body)).await
}

fn personas_reply(count: usize) -> String {
    let items: Vec<Value> = (0..count)
        .map(|i| json!({ "name": format!("P{i}"), "personality": "bold", "description": "tries swaps" }))
        .collect();
    Value::Array(items).to_string()
}

#[tokio::test]
async fn test_health() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, TransportMode::PlainHttp, ScriptedProvider::new());

    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["relay_enabled"], false);
    assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_generate_personalities_end_to_end() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, TransportMode::PlainHttp, ScriptedProvider::new().reply(personas_reply(3)));

    let (status, body) = post(
        &app,
        "/generate-personalities",
        json!({
            "agent_description": "A DeFi agent",
            "agent_capabilities": "swaps, transfers",
            "num_personalities": 3
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["personalities"].as_array().unwrap().len(), 3);
    assert_eq!(body["used_fallback"], false);
    assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_generate_personalities_falls_back() {
    let dir = TempDir::new().unwrap();
    let app = app(
        &dir,
        TransportMode::PlainHttp,
        ScriptedProvider::new().fail(ProviderError::Api { status: 500, message: "down".into() }),
    );

    let (status, body) = post(
        &app,
        "/generate-personalities",
        json!({ "agent_description": "d", "agent_capabilities": "c", "num_personalities": 4 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["used_fallback"], true);
    assert_eq!(body["personalities"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_zero_count_depends_on_transport() {
    let dir = TempDir::new().unwrap();
    let request = json!({ "agent_description": "d", "agent_capabilities": "c", "num_personalities": 0 });

    let plain = app(&dir, TransportMode::PlainHttp, ScriptedProvider::new());
    let (status, body) = post(&plain, "/generate-personalities", request.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("num_personalities"));

    let message = app(&dir, TransportMode::MessageProtocol, ScriptedProvider::new().reply(personas_reply(1)));
    let (status, body) = post(&message, "/rest/generate-personalities", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["personalities"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_oversized_count_depends_on_transport() {
    let dir = TempDir::new().unwrap();
    let request = json!({ "agent_description": "d", "agent_capabilities": "c", "num_personalities": 2_000_000 });

    let plain = app(&dir, TransportMode::PlainHttp, ScriptedProvider::new());
    let (status, body) = post(&plain, "/generate-personalities", request.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("at most 50"));

    let message = app(&dir, TransportMode::MessageProtocol, ScriptedProvider::new().reply("not json"));
    let (status, body) = post(&message, "/rest/generate-personalities", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["personalities"].as_array().unwrap().len(), 50);
    assert_eq!(body["used_fallback"], true);
}

#[tokio::test]
async fn test_message_protocol_mounts_under_rest() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, TransportMode::MessageProtocol, ScriptedProvider::new());

    let (status, _) = call(&app, Method::GET, "/rest/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    // malformed body still answers 200
    let (status, body) = post(&app, "/rest/evaluate-conversation", json!({ "nope": true })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_malformed_body_is_client_error_over_plain_http() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, TransportMode::PlainHttp, ScriptedProvider::new());

    let (status, body) = post(&app, "/store-conversation", json!({ "messages": [] })).await;
    assert!(status.is_client_error());
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_generate_message() {
    let dir = TempDir::new().unwrap();
    let app = app(
        &dir,
        TransportMode::PlainHttp,
        ScriptedProvider::new().reply(format!("You: Did {HASH} settle on base sepolia?\nAgent: yes")),
    );

    let (status, body) = post(
        &app,
        "/generate-personality-message",
        json!({
            "personality": { "name": "P", "personality": "nervous", "description": "checks every tx" },
            "previous_messages": [
                { "role": "user", "content": "send 1 ETH" },
                { "role": "agent", "content": "sent" }
            ],
            "is_initial": false,
            "agent_description": "wallet agent"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], format!("Did {HASH} settle on base sepolia?"));
    assert_eq!(body["detected_transaction"]["chain_id"], "84532");
    assert_eq!(body["used_fallback"], false);
}

#[tokio::test]
async fn test_evaluate_conversation_fallback() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, TransportMode::PlainHttp, ScriptedProvider::new().reply("not json"));

    let (status, body) = post(
        &app,
        "/evaluate-conversation",
        json!({
            "personality_name": "P",
            "personality": "p",
            "description": "d",
            "messages": [{ "role": "user", "content": "hi" }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 50);
    assert_eq!(body["personalityName"], "P");
    assert_eq!(body["criteria"].as_object().unwrap().len(), 5);
    assert!(body["criteria"].as_object().unwrap().values().all(|v| v == 50));
}

#[tokio::test]
async fn test_store_conversation() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, TransportMode::PlainHttp, ScriptedProvider::new());

    let (status, body) = post(
        &app,
        "/store-conversation",
        json!({
            "conversation_id": "conv-1",
            "personality_name": "P",
            "messages": [{ "role": "user", "content": "hi" }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let path = body["filepath"].as_str().unwrap();
    assert!(std::path::Path::new(path).exists());
}

#[tokio::test]
async fn test_relay_endpoints_without_relay() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, TransportMode::PlainHttp, ScriptedProvider::new());

    let (status, body) = post(
        &app,
        "/analyze-agent-transaction",
        json!({
            "conversation_id": "c",
            "personality_name": "P",
            "conversation_messages": [],
            "transaction_hash": HASH,
            "chain_id": "84532"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let (_, body) = post(&app, "/get-transaction-analysis", json!({ "transaction_hash": HASH })).await;
    assert_eq!(body["success"], false);
    assert!(body.get("analysis").is_none());
}

#[tokio::test]
async fn test_pushed_analysis_is_retrievable() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, TransportMode::PlainHttp, ScriptedProvider::new());

    let (status, body) = post(
        &app,
        "/transaction-analysis-result",
        json!({ "transaction_hash": HASH, "analysis": "token approval", "timestamp": "2025-05-01T00:00:00Z" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, body) = post(&app, "/get-transaction-analysis", json!({ "transaction_hash": HASH })).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["analysis"], "token approval");
    assert_eq!(body["timestamp"], "2025-05-01T00:00:00Z");
}
