//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::course::{CourseError, CourseProgress};
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

impl IntoResponse for LogicError {
  fn into_response(self) -> Response {
    let status = match &self {
      LogicError::UnknownLesson(_) => StatusCode::NOT_FOUND,
      LogicError::Session(_) => StatusCode::CONFLICT,
      LogicError::Course(CourseError::LessonLocked { .. }) => StatusCode::FORBIDDEN,
      LogicError::Course(CourseError::OutOfRange { .. }) => StatusCode::BAD_REQUEST,
      LogicError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(target: "codestep_backend", status = status.as_u16(), error = %self, "HTTP request rejected");
    (status, Json(ErrorOut { message: self.to_string() })).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_lessons(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(lesson_summaries(&state).await)
}

#[instrument(level = "info", skip(state), fields(%q.lesson_id))]
pub async fn http_get_lesson(
  State(state): State<Arc<AppState>>,
  Query(q): Query<LessonQuery>,
) -> Result<Json<LessonViewOut>, LogicError> {
  let view = open_lesson(&state, &q.lesson_id).await?;
  info!(target: "lesson", id = %q.lesson_id, step = view.step, status = ?view.status, "HTTP lesson served");
  Ok(Json(view))
}

#[instrument(level = "info", skip(state, body), fields(%body.lesson_id, code_len = body.code.len()))]
pub async fn http_post_check(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CheckIn>,
) -> Result<Json<CheckOut>, LogicError> {
  let out = check_code(&state, &body.lesson_id, &body.code).await?;
  info!(target: "lesson", id = %body.lesson_id, kind = ?out.feedback.kind, attempts = out.attempts, "HTTP check evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(%body.lesson_id))]
pub async fn http_post_advance(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LessonIn>,
) -> Result<Json<AdvanceOut>, LogicError> {
  let out = advance_stage(&state, &body.lesson_id).await?;
  info!(target: "lesson", id = %body.lesson_id, lesson_complete = out.lesson_complete, "HTTP advance");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(%body.lesson_id))]
pub async fn http_post_reset_stage(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LessonIn>,
) -> Result<Json<CodeOut>, LogicError> {
  Ok(Json(reset_stage(&state, &body.lesson_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(%body.lesson_id))]
pub async fn http_post_restart(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LessonIn>,
) -> Result<Json<LessonViewOut>, LogicError> {
  let view = restart_lesson(&state, &body.lesson_id).await?;
  info!(target: "lesson", id = %body.lesson_id, "HTTP lesson restarted");
  Ok(Json(view))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(course_progress(&state).await)
}

#[instrument(level = "info", skip(state, body), fields(index = body.index))]
pub async fn http_post_select(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SelectIn>,
) -> Result<Json<CourseProgress>, LogicError> {
  Ok(Json(select_lesson(&state, body.index).await?))
}
