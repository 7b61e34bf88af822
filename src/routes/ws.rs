//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::logic::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "codestep_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "codestep_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "codestep_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "codestep_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "codestep_backend", "WebSocket disconnected");
}

fn or_error<T>(result: Result<T, LogicError>, ok: impl FnOnce(T) -> ServerWsMessage) -> ServerWsMessage {
  match result {
    Ok(v) => ok(v),
    Err(e) => ServerWsMessage::Error { message: e.to_string() },
  }
}

#[instrument(level = "info", skip(state))]
pub(crate) async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::ListLessons => ServerWsMessage::Lessons { lessons: lesson_summaries(state).await },

    ClientWsMessage::OpenLesson { lesson_id } => {
      let res = open_lesson(state, &lesson_id).await;
      info!(target: "lesson", id = %lesson_id, ok = res.is_ok(), "WS lesson served");
      or_error(res, |lesson| ServerWsMessage::Lesson { lesson })
    }

    ClientWsMessage::Check { lesson_id, code } => {
      let res = check_code(state, &lesson_id, &code).await;
      if let Ok(out) = &res {
        info!(target: "lesson", id = %lesson_id, kind = ?out.feedback.kind, attempts = out.attempts, "WS check evaluated");
      }
      or_error(res, |result| ServerWsMessage::CheckResult { result })
    }

    ClientWsMessage::Advance { lesson_id } => {
      or_error(advance_stage(state, &lesson_id).await, |result| ServerWsMessage::Advanced { result })
    }

    ClientWsMessage::ResetStage { lesson_id } => {
      or_error(reset_stage(state, &lesson_id).await, |out| ServerWsMessage::Code { code: out.code })
    }

    ClientWsMessage::Restart { lesson_id } => {
      or_error(restart_lesson(state, &lesson_id).await, |lesson| ServerWsMessage::Lesson { lesson })
    }

    ClientWsMessage::Progress => ServerWsMessage::Progress { progress: course_progress(state).await },

    ClientWsMessage::SelectLesson { index } => {
      or_error(select_lesson(state, index).await, |progress| ServerWsMessage::Progress { progress })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::hints::KeywordNudge;
  use crate::seeds::seed_lessons;
  use crate::store::MemoryStore;

  fn state() -> AppState {
    AppState::from_parts(seed_lessons(), Arc::new(MemoryStore::new()), Arc::new(KeywordNudge))
  }

  async fn roundtrip(state: &AppState, json: &str) -> serde_json::Value {
    let msg: ClientWsMessage = serde_json::from_str(json).unwrap();
    serde_json::to_value(handle_client_ws(msg, state).await).unwrap()
  }

  #[tokio::test]
  async fn ping_and_unknown_lesson() {
    let s = state();
    assert_eq!(roundtrip(&s, r#"{"type":"ping"}"#).await["type"], "pong");

    let reply = roundtrip(&s, r#"{"type":"open_lesson","lessonId":"nope"}"#).await;
    assert_eq!(reply["type"], "error");
    assert!(reply["message"].as_str().unwrap().contains("nope"));
  }

  #[tokio::test]
  async fn check_then_advance_over_ws() {
    let s = state();
    let reply = roundtrip(&s, r#"{"type":"check","lessonId":"lesson-1","code":"cout << 1;"}"#).await;
    assert_eq!(reply["type"], "check_result");
    assert_eq!(reply["result"]["feedback"]["kind"], "error");

    let reply = roundtrip(&s, r#"{"type":"advance","lessonId":"lesson-1"}"#).await;
    assert_eq!(reply["type"], "error");

    let reply = roundtrip(
      &s,
      r#"{"type":"check","lessonId":"lesson-1","code":"cout << \"Hello World\";"}"#,
    )
    .await;
    assert_eq!(reply["result"]["feedback"]["kind"], "success");

    let reply = roundtrip(&s, r#"{"type":"advance","lessonId":"lesson-1"}"#).await;
    assert_eq!(reply["type"], "advanced");
    assert_eq!(reply["result"]["lesson_complete"], false);
    assert_eq!(reply["result"]["lesson"]["stage_index"], 1);
  }

  #[tokio::test]
  async fn selecting_a_locked_lesson_is_an_error() {
    let s = state();
    let reply = roundtrip(&s, r#"{"type":"select_lesson","index":2}"#).await;
    assert_eq!(reply["type"], "error");
    let reply = roundtrip(&s, r#"{"type":"progress"}"#).await;
    assert_eq!(reply["progress"]["unlocked_lesson"], 0);
  }
}
