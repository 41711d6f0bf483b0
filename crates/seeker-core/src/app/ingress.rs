//! Chat webhook ingress.
//!
//! Extracts `{chat_id, text}` from a Telegram update and hands it to the
//! publishing task without waiting for the broker. The platform always gets
//! `200 OK` for a well-addressed webhook, whatever the broker is doing.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use tracing::debug;

use super::producer::PublishHandle;
use crate::domain::{ConversationId, TaskEnvelope};

#[derive(Clone)]
struct IngressState {
    publisher: PublishHandle,
    bot_token: Arc<Secret<String>>,
}

pub fn router(publisher: PublishHandle, bot_token: Secret<String>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/webhook/{token}", post(webhook))
        .with_state(IngressState {
            publisher,
            bot_token: Arc::new(bot_token),
        })
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "service": "seeker", "status": "ok" }))
}

async fn webhook(
    State(state): State<IngressState>,
    Path(token): Path<String>,
    body: Bytes,
) -> Response {
    if token.as_str() != state.bot_token.expose_secret().as_str() {
        return StatusCode::NOT_FOUND.into_response();
    }

    match extract_task(&body) {
        Some(envelope) => {
            state.publisher.enqueue(envelope);
        }
        None => debug!("ignoring update without a text message"),
    }

    Json(serde_json::json!({ "status": "ok" })).into_response()
}

#[derive(Deserialize)]
struct Update {
    message: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Chat {
    id: ConversationId,
}

/// Build an envelope from a raw update; `None` for anything that is not a text message.
pub fn extract_task(body: &[u8]) -> Option<TaskEnvelope> {
    let update: Update = serde_json::from_slice(body).ok()?;
    let message = update.message?;
    let text = message.text?;
    Some(TaskEnvelope::new(message.chat.id, text))
}
