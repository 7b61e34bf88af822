//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Listing lessons with their lock/completion state
//!   - Opening a lesson (restoring its session) and rendering the current stage
//!   - Checking code, advancing, resetting the code buffer and restarting a lesson
//!   - Course progress (selecting an unlocked lesson, recording completion)
//!
//! Anything that may write to the progress store runs on the blocking pool, since a
//! file store syncs to disk on every write.

use thiserror::Error;
use tokio::task::JoinError;
use tracing::{info, instrument, warn};

use crate::course::{CourseError, CourseProgress};
use crate::engine::session::{Advance, SessionError};
use crate::protocol::{to_view, AdvanceOut, CheckOut, CodeOut, LessonSummaryOut, LessonViewOut};
use crate::state::{AppState, SharedSession};

#[derive(Debug, Error)]
pub enum LogicError {
  #[error("Unknown lessonId: {0}")]
  UnknownLesson(String),

  #[error(transparent)]
  Session(#[from] SessionError),

  #[error(transparent)]
  Course(#[from] CourseError),

  #[error("progress worker failed: {0}")]
  Worker(#[from] JoinError),
}

/// Run store-touching work off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, LogicError>
where
  F: FnOnce() -> T + Send + 'static,
  T: Send + 'static,
{
  Ok(tokio::task::spawn_blocking(work).await?)
}

async fn session_for(state: &AppState, lesson_id: &str) -> Result<SharedSession, LogicError> {
  state
    .session(lesson_id)
    .await?
    .ok_or_else(|| LogicError::UnknownLesson(lesson_id.to_string()))
}

#[instrument(level = "info", skip(state))]
pub async fn lesson_summaries(state: &AppState) -> Vec<LessonSummaryOut> {
  let progress = *state.progress.lock().await;
  state
    .lessons
    .iter()
    .enumerate()
    .map(|(index, l)| LessonSummaryOut {
      id: l.id.clone(),
      index,
      title: l.title.clone(),
      module: l.module,
      concept: l.concept.clone(),
      stages: l.stages.len(),
      locked: index > progress.unlocked_lesson,
      completed: index < progress.unlocked_lesson,
    })
    .collect()
}

#[instrument(level = "info", skip(state), fields(%lesson_id))]
pub async fn open_lesson(state: &AppState, lesson_id: &str) -> Result<LessonViewOut, LogicError> {
  let session = session_for(state, lesson_id).await?;
  let s = session.lock().await;
  Ok(to_view(&s))
}

#[instrument(level = "info", skip(state, code), fields(%lesson_id, code_len = code.len()))]
pub async fn check_code(state: &AppState, lesson_id: &str, code: &str) -> Result<CheckOut, LogicError> {
  let session = session_for(state, lesson_id).await?;
  let code = code.to_string();
  let (out, step) = blocking(move || {
    let mut s = session.blocking_lock();
    let result = s.check(&code);
    let out = CheckOut {
      feedback: result.feedback,
      attempts: s.attempts(),
      captured: result.captured,
      diagnostics: result.diagnostics,
      preview_unlocked: s.preview_unlocked(),
    };
    (out, s.current_stage().step)
  })
  .await?;
  if !out.diagnostics.is_empty() {
    warn!(target: "lesson", %lesson_id, step, broken = out.diagnostics.len(), "Stage has solution patterns that fail to compile");
  }
  Ok(out)
}

#[instrument(level = "info", skip(state), fields(%lesson_id))]
pub async fn advance_stage(state: &AppState, lesson_id: &str) -> Result<AdvanceOut, LogicError> {
  let session = session_for(state, lesson_id).await?;
  let next = blocking(move || {
    let mut s = session.blocking_lock();
    s.advance().map(|advance| match advance {
      Advance::Stage { .. } => Some(to_view(&s)),
      Advance::LessonComplete => None,
    })
  })
  .await??;
  if let Some(view) = next {
    return Ok(AdvanceOut { lesson_complete: false, lesson: Some(view), course: None });
  }

  let index = state
    .lesson_index(lesson_id)
    .ok_or_else(|| LogicError::UnknownLesson(lesson_id.to_string()))?;
  let mut progress = state.progress.lock().await;
  let (lessons, store) = (state.lessons.clone(), state.store.clone());
  let current = *progress;
  let outcome = blocking(move || {
    let mut next = current;
    next.complete(index, &lessons, store.as_ref())
  })
  .await?;
  *progress = outcome.progress;
  drop(progress);
  info!(target: "lesson", %lesson_id, unlocked = outcome.progress.unlocked_lesson, module_completed = outcome.module_completed.is_some(), course_completed = outcome.course_completed, "Lesson completion recorded");
  Ok(AdvanceOut { lesson_complete: true, lesson: None, course: Some(outcome) })
}

#[instrument(level = "info", skip(state), fields(%lesson_id))]
pub async fn reset_stage(state: &AppState, lesson_id: &str) -> Result<CodeOut, LogicError> {
  let session = session_for(state, lesson_id).await?;
  let mut s = session.lock().await;
  // Re-rendering the template never touches the store.
  Ok(CodeOut { code: s.reset_stage().to_string() })
}

#[instrument(level = "info", skip(state), fields(%lesson_id))]
pub async fn restart_lesson(state: &AppState, lesson_id: &str) -> Result<LessonViewOut, LogicError> {
  let session = session_for(state, lesson_id).await?;
  blocking(move || {
    let mut s = session.blocking_lock();
    s.restart_exercise(&mut rand::thread_rng());
    to_view(&s)
  })
  .await
}

pub async fn course_progress(state: &AppState) -> CourseProgress {
  *state.progress.lock().await
}

#[instrument(level = "info", skip(state))]
pub async fn select_lesson(state: &AppState, index: usize) -> Result<CourseProgress, LogicError> {
  let mut progress = state.progress.lock().await;
  let (count, store) = (state.lessons.len(), state.store.clone());
  let current = *progress;
  let updated = blocking(move || {
    let mut next = current;
    next.select(index, count, store.as_ref()).map(|()| next)
  })
  .await??;
  *progress = updated;
  Ok(updated)
}
