//! Course-level progress: which lesson is open, how far the learner has unlocked,
//! and the "module completed / skill unlocked" signal.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::Lesson;
use crate::store::KvStore;

pub const CURRENT_LESSON_KEY: &str = "current_lesson_index";
pub const UNLOCKED_LESSON_KEY: &str = "unlocked_lesson_index";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CourseError {
  #[error("lesson {index} is locked (unlocked up to {unlocked})")]
  LessonLocked { index: usize, unlocked: usize },

  #[error("lesson index {index} is out of range ({count} lessons)")]
  OutOfRange { index: usize, count: usize },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CourseProgress {
  pub current_lesson: usize,
  pub unlocked_lesson: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModuleCompletion {
  pub module: String,
  pub skill: String,
}

/// Result of finishing a lesson.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompletionOutcome {
  pub progress: CourseProgress,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub module_completed: Option<ModuleCompletion>,
  pub course_completed: bool,
}

impl CourseProgress {
  /// Read progress from `store`, clamping anything unreadable or out of range to 0.
  pub fn load(store: &dyn KvStore, lesson_count: usize) -> Self {
    let read = |key: &str| -> usize {
      let value = store
        .get(key)
        .ok()
        .flatten()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .unwrap_or(0);
      if value >= lesson_count.max(1) {
        warn!(target: "codestep_backend", %key, value, lesson_count, "Stored lesson index out of range; using 0");
        0
      } else {
        value
      }
    };
    let mut progress = Self {
      current_lesson: read(CURRENT_LESSON_KEY),
      unlocked_lesson: read(UNLOCKED_LESSON_KEY),
    };
    if progress.current_lesson > progress.unlocked_lesson {
      progress.current_lesson = progress.unlocked_lesson;
    }
    progress
  }

  /// Open lesson `index`; only unlocked lessons can be selected.
  pub fn select(&mut self, index: usize, lesson_count: usize, store: &dyn KvStore) -> Result<(), CourseError> {
    if index >= lesson_count {
      return Err(CourseError::OutOfRange { index, count: lesson_count });
    }
    if index > self.unlocked_lesson {
      return Err(CourseError::LessonLocked { index, unlocked: self.unlocked_lesson });
    }
    self.current_lesson = index;
    self.persist(store);
    Ok(())
  }

  /// Record that the lesson at `index` was finished.
  ///
  /// Finishing the furthest unlocked lesson unlocks the next one and may complete its
  /// module (last lesson overall, or the next lesson belongs to another module). The
  /// current lesson moves on unless it was the last one, which completes the course.
  pub fn complete(&mut self, index: usize, lessons: &[Arc<Lesson>], store: &dyn KvStore) -> CompletionOutcome {
    let last = lessons.len().saturating_sub(1);
    let mut module_completed = None;

    if let Some(finished) = lessons.get(index).filter(|_| index == self.unlocked_lesson) {
      self.unlocked_lesson = (self.unlocked_lesson + 1).min(last);

      let ends_module = match lessons.get(index + 1) {
        Some(next) => next.module != finished.module,
        None => true,
      };
      if ends_module {
        let module = finished.module;
        info!(target: "lesson", module = module.code(), skill = module.skill(), "Module completed");
        module_completed = Some(ModuleCompletion { module: module.code().into(), skill: module.skill().into() });
      }
    }

    let course_completed = index >= last;
    if !course_completed {
      self.current_lesson = index + 1;
    } else {
      info!(target: "lesson", "Course completed");
    }
    self.persist(store);

    CompletionOutcome { progress: *self, module_completed, course_completed }
  }

  fn persist(&self, store: &dyn KvStore) {
    for (key, value) in [
      (CURRENT_LESSON_KEY, self.current_lesson),
      (UNLOCKED_LESSON_KEY, self.unlocked_lesson),
    ] {
      if let Err(e) = store.set(key, &value.to_string()) {
        warn!(target: "codestep_backend", %key, error = %e, "Failed to persist course progress");
      }
    }
  }
}
