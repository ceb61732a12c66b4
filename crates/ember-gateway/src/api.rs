use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use ember_agents::{DiaryOutcome, TurnRequest};
use ember_common::Error;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::state::SharedState;

/// Error wrapper mapping internal failures onto HTTP statuses. Provider
/// failures inside chat turns never reach this point — they degrade to
/// reply text in the engine; what arrives here is mostly store trouble.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Provider(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub image: Option<String>,
    pub session_id: Option<String>,
}

pub async fn chat(
    State(state): State<SharedState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .engine
        .process_turn(TurnRequest {
            session_id: request.session_id,
            message: request.message,
            image: request.image,
        })
        .await?;

    Ok(Json(json!({
        "reply": outcome.reply,
        "session_id": outcome.session_id,
        "time": outcome.time,
    })))
}

pub async fn list_chats(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let sessions = state.chat.lock().await.list_sessions()?;
    let formatted: Vec<Value> = sessions
        .iter()
        .map(|s| {
            json!({
                "session_id": s.session_id,
                "title": s.title,
                "date": s.last_activity.with_timezone(&state.display_tz).format("%d/%m").to_string(),
            })
        })
        .collect();
    Ok(Json(json!(formatted)))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub session_id: String,
}

/// Each turn is exposed as one user-role record and one model-role record,
/// timestamped in the display timezone.
pub async fn history(
    State(state): State<SharedState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Value>, ApiError> {
    let turns = state.chat.lock().await.session_history(&params.session_id)?;

    let mut records = Vec::with_capacity(turns.len() * 2);
    for turn in &turns {
        let local = turn.timestamp.with_timezone(&state.display_tz);
        let time = local.format("%I:%M %p").to_string();
        records.push(json!({
            "role": "user",
            "content": turn.user_msg,
            "time": time,
            "date": local.format("%Y-%m-%d").to_string(),
        }));
        records.push(json!({
            "role": "model",
            "content": turn.bot_reply,
            "time": time,
        }));
    }
    Ok(Json(json!(records)))
}

pub async fn list_memories(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let facts = state.memory.lock().await.list_facts()?;
    let formatted: Vec<Value> = facts
        .iter()
        .map(|f| json!({ "text": f.text, "timestamp": f.timestamp.to_rfc3339() }))
        .collect();
    Ok(Json(json!(formatted)))
}

#[derive(Debug, Deserialize)]
pub struct MemoryRequest {
    pub text: String,
}

pub async fn add_memory(
    State(state): State<SharedState>,
    Json(request): Json<MemoryRequest>,
) -> Result<Json<Value>, ApiError> {
    state.memory.lock().await.insert_fact(&request.text, Utc::now())?;
    Ok(Json(json!({ "status": "saved" })))
}

pub async fn delete_memory(
    State(state): State<SharedState>,
    Json(request): Json<MemoryRequest>,
) -> Result<Json<Value>, ApiError> {
    state.memory.lock().await.delete_fact(&request.text)?;
    Ok(Json(json!({ "status": "deleted" })))
}

pub async fn list_diary(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let entries = state.diary.lock().await.list_entries()?;
    let formatted: Vec<Value> = entries
        .iter()
        .map(|e| {
            json!({
                "date": e.date.with_timezone(&state.display_tz).format("%d %B %Y").to_string(),
                "entry": e.entry,
            })
        })
        .collect();
    Ok(Json(json!(formatted)))
}

pub async fn write_diary(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    match state.diary_writer.write_today().await? {
        DiaryOutcome::NothingToWrite => Ok(Json(json!({
            "status": "No chats today to write diary about."
        }))),
        DiaryOutcome::Written(entry) => Ok(Json(json!({
            "status": "success",
            "entry": entry,
        }))),
    }
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub session_id: String,
    pub new_title: String,
}

pub async fn rename_chat(
    State(state): State<SharedState>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .chat
        .lock()
        .await
        .rename_session(&request.session_id, &request.new_title)?;
    Ok(Json(json!({ "status": "success" })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub session_id: String,
}

pub async fn delete_chat(
    State(state): State<SharedState>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<Value>, ApiError> {
    state.chat.lock().await.delete_session(&request.session_id)?;
    Ok(Json(json!({ "status": "success" })))
}
