use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use ember_agents::providers::{GenerateRequest, LlmProvider};
use ember_agents::{ApiKey, ChatEngine, DiaryWriter, KeyRotator};
use ember_common::Result;
use ember_config::PersonaConfig;
use ember_db::{ChatStore, DiaryStore, MemoryStore};
use ember_gateway::state::AppState;
use ember_gateway::build_router;
use serde_json::{Value, json};
use tokio::sync::Mutex;

struct ScriptedProvider(String);

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider_id(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _key: &ApiKey, _request: &GenerateRequest) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Spin up a gateway on an ephemeral port with in-memory stores and a
/// scripted model, returning its address.
async fn start_gateway(reply: &str, keys: Vec<String>) -> SocketAddr {
    let persona = Arc::new(PersonaConfig::fallback());
    let chat = Arc::new(Mutex::new(ChatStore::in_memory().expect("store")));
    let memory = Arc::new(Mutex::new(MemoryStore::in_memory().expect("store")));
    let diary = Arc::new(Mutex::new(DiaryStore::in_memory().expect("store")));
    let rotator = Arc::new(KeyRotator::new(keys));
    let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider(reply.to_string()));

    let engine = ChatEngine::new(
        Arc::clone(&provider),
        Arc::clone(&rotator),
        Arc::clone(&persona),
        Arc::clone(&chat),
        Arc::clone(&memory),
        chrono_tz::Tz::UTC,
    );
    let diary_writer = DiaryWriter::new(
        Arc::clone(&chat),
        Arc::clone(&diary),
        provider,
        rotator,
        persona,
    );

    let state = Arc::new(AppState {
        engine,
        diary_writer,
        chat,
        memory,
        diary,
        display_tz: chrono_tz::Tz::UTC,
    });

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn post_json(addr: SocketAddr, path: &str, body: Value) -> Value {
    reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .json(&body)
        .send()
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("response should be JSON")
}

async fn get_json(addr: SocketAddr, path: &str) -> Value {
    reqwest::get(format!("http://{addr}{path}"))
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("response should be JSON")
}

#[tokio::test]
async fn chat_round_trip_mints_a_session_and_records_history() {
    let addr = start_gateway("hey you!", vec!["k".into()]).await;

    let reply = post_json(addr, "/chat", json!({ "message": "hello there" })).await;
    assert_eq!(reply["reply"], "hey you!");
    let session_id = reply["session_id"].as_str().expect("session id minted");
    assert!(!session_id.is_empty());
    assert!(reply["time"].as_str().is_some());

    let chats = get_json(addr, "/get_chat_list").await;
    let chats = chats.as_array().expect("array");
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0]["session_id"], session_id);
    assert_eq!(chats[0]["title"], "hello there");

    let history = get_json(addr, &format!("/get_history?session_id={session_id}")).await;
    let history = history.as_array().expect("array");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[0]["content"], "hello there");
    assert_eq!(history[1]["role"], "model");
    assert_eq!(history[1]["content"], "hey you!");
}

#[tokio::test]
async fn save_marker_lands_in_memories_and_is_hidden() {
    let addr = start_gateway("Got it! [SAVE: loves coffee] Anything else?", vec!["k".into()]).await;

    let reply = post_json(addr, "/chat", json!({ "message": "remember this" })).await;
    let text = reply["reply"].as_str().expect("reply text");
    assert!(!text.contains("[SAVE:"));
    assert!(!text.contains(']'));

    let memories = get_json(addr, "/memories").await;
    let memories = memories.as_array().expect("array");
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0]["text"], "loves coffee");
}

#[tokio::test]
async fn empty_credentials_still_answer_with_an_apology() {
    let addr = start_gateway("unreachable", Vec::new()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/chat"))
        .json(&json!({ "message": "hi" }))
        .send()
        .await
        .expect("request should succeed");
    // Never a 5xx for missing credentials.
    assert!(response.status().is_success());

    let reply: Value = response.json().await.expect("JSON");
    let text = reply["reply"].as_str().expect("reply text");
    assert!(text.contains("no provider credentials configured"));
}

#[tokio::test]
async fn rename_overrides_titles_and_delete_empties_history() {
    let addr = start_gateway("ok", vec!["k".into()]).await;

    let reply = post_json(addr, "/chat", json!({ "message": "first message" })).await;
    let session_id = reply["session_id"].as_str().expect("session id").to_string();

    let renamed = post_json(
        addr,
        "/rename_chat",
        json!({ "session_id": session_id, "new_title": "our plans" }),
    )
    .await;
    assert_eq!(renamed["status"], "success");

    let chats = get_json(addr, "/get_chat_list").await;
    assert_eq!(chats[0]["title"], "our plans");

    let deleted = post_json(addr, "/delete_chat", json!({ "session_id": session_id })).await;
    assert_eq!(deleted["status"], "success");

    let history = get_json(addr, &format!("/get_history?session_id={session_id}")).await;
    assert_eq!(history.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn memories_can_be_managed_directly() {
    let addr = start_gateway("ok", vec!["k".into()]).await;

    let saved = post_json(addr, "/memories", json!({ "text": "birthday is in June" })).await;
    assert_eq!(saved["status"], "saved");

    let memories = get_json(addr, "/memories").await;
    assert_eq!(memories[0]["text"], "birthday is in June");

    let deleted = reqwest::Client::new()
        .delete(format!("http://{addr}/memories"))
        .json(&json!({ "text": "birthday is in June" }))
        .send()
        .await
        .expect("request should succeed")
        .json::<Value>()
        .await
        .expect("JSON");
    assert_eq!(deleted["status"], "deleted");

    let memories = get_json(addr, "/memories").await;
    assert_eq!(memories.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn diary_synthesis_round_trip() {
    let addr = start_gateway("dear diary, we laughed a lot today", vec!["k".into()]).await;

    // Nothing to write yet.
    let empty = post_json(addr, "/diary", json!({})).await;
    assert_eq!(empty["status"], "No chats today to write diary about.");

    post_json(addr, "/chat", json!({ "message": "today was fun" })).await;

    let written = post_json(addr, "/diary", json!({})).await;
    assert_eq!(written["status"], "success");
    assert_eq!(written["entry"], "dear diary, we laughed a lot today");

    let entries = get_json(addr, "/diary").await;
    assert_eq!(entries[0]["entry"], "dear diary, we laughed a lot today");
}

#[tokio::test]
async fn health_endpoint_responds() {
    let addr = start_gateway("ok", vec!["k".into()]).await;
    let body = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("request should succeed")
        .text()
        .await
        .expect("body");
    assert_eq!(body, "ok");
}
