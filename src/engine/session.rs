//! Per-lesson validation session: the state machine behind "check", "next",
//! "reset code" and "restart lesson".
//!
//! Owns the running context (rolled variants merged with captures from earlier
//! stages), the attempt counter and feedback of the current stage, and the
//! editable code buffer. Stage index, variants and captures are written to the
//! store on every change so a reload resumes at the same stage with the same
//! bindings.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use super::hints::{HintStrategy, HintTier, PREVIEW_UNLOCK_AFTER};
use super::matcher::{match_solutions, PatternDiagnostic};
use super::normalize::normalize;
use super::template::interpolate;
use super::{merge_layers, Bindings};
use crate::domain::{Lesson, Stage};
use crate::store::KvStore;

pub const SUCCESS_MESSAGE: &str = "Correct! Great job.";

pub fn stage_key(lesson_id: &str) -> String {
    format!("lesson_stage_{lesson_id}")
}

pub fn variants_key(lesson_id: &str) -> String {
    format!("lesson_variants_{lesson_id}")
}

pub fn captures_key(lesson_id: &str) -> String {
    format!("lesson_captures_{lesson_id}")
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Idle,
    Success,
    Failure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Success,
    Error,
}

/// What the learner sees after a check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub kind: FeedbackKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<HintTier>,
}

impl Feedback {
    fn success() -> Self {
        Self {
            kind: FeedbackKind::Success,
            message: SUCCESS_MESSAGE.into(),
            tier: None,
        }
    }

    fn failure(message: String, tier: HintTier) -> Self {
        Self {
            kind: FeedbackKind::Error,
            message,
            tier: Some(tier),
        }
    }
}

/// Per-stage transient state, discarded on stage transition.
#[derive(Clone, Debug, Default)]
pub struct AttemptState {
    pub attempts: u32,
    pub status: StageStatus,
    pub feedback: Option<Feedback>,
}

#[derive(Clone, Debug)]
pub struct CheckResult {
    pub feedback: Feedback,
    /// Bindings newly discovered by this check (already merged into the session).
    pub captured: Bindings,
    pub diagnostics: Vec<PatternDiagnostic>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Advance {
    Stage { index: usize, code: String },
    LessonComplete,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("stage {step} of lesson '{lesson}' has not been passed yet")]
    StageNotPassed { lesson: String, step: u32 },
}

/// Validation state for one lesson. `lesson.stages` must be non-empty.
pub struct ValidationSession {
    lesson: Arc<Lesson>,
    store: Arc<dyn KvStore>,
    hints: Arc<dyn HintStrategy>,
    variants: Bindings,
    captures: Bindings,
    stage_index: usize,
    attempt: AttemptState,
    code: String,
}

impl ValidationSession {
    /// Restore the session from `store`, falling back to defaults for anything
    /// missing or unreadable (stage 0, fresh variant roll, no captures).
    #[instrument(level = "info", skip_all, fields(lesson = %lesson.id))]
    pub fn open<R: Rng + ?Sized>(
        lesson: Arc<Lesson>,
        store: Arc<dyn KvStore>,
        hints: Arc<dyn HintStrategy>,
        rng: &mut R,
    ) -> Self {
        let id = lesson.id.clone();

        let stored_stage = read_json::<usize>(store.as_ref(), &stage_key(&id));
        let stage_index = match stored_stage {
            Some(i) if i < lesson.stages.len() => i,
            Some(i) => {
                warn!(target: "lesson", lesson = %id, stored = i, stages = lesson.stages.len(), "Stored stage out of range; restarting at stage 0");
                0
            }
            None => 0,
        };
        let stored_variants = read_json::<Bindings>(store.as_ref(), &variants_key(&id));
        let stored_captures = read_json::<Bindings>(store.as_ref(), &captures_key(&id));
        let variants_loaded = stored_variants.is_some();
        let captures_loaded = stored_captures.is_some();

        let mut session = Self {
            lesson,
            store,
            hints,
            variants: stored_variants.unwrap_or_default(),
            captures: stored_captures.unwrap_or_default(),
            stage_index,
            attempt: AttemptState::default(),
            code: String::new(),
        };

        if stored_stage != Some(stage_index) {
            session.persist_stage();
        }
        let rolled = session.roll_missing_variants(rng);
        if !variants_loaded || rolled > 0 {
            session.persist_variants();
        }
        if !captures_loaded {
            session.persist_captures();
        }
        session.code = session.render_code_template();

        info!(target: "lesson", lesson = %id, stage = session.stage_index, variants = session.variants.len(), captures = session.captures.len(), "Session opened");
        session
    }

    /// Judge `code` against the current stage.
    ///
    /// Once the stage is passed, further checks do not re-evaluate; the learner has to
    /// advance explicitly.
    #[instrument(level = "info", skip(self, code), fields(lesson = %self.lesson.id, stage = self.stage_index, code_len = code.len()))]
    pub fn check(&mut self, code: &str) -> CheckResult {
        self.code = code.to_string();

        if self.attempt.status == StageStatus::Success {
            debug!(target: "lesson", "Stage already passed; not re-checking");
            return CheckResult {
                feedback: self.attempt.feedback.clone().unwrap_or_else(Feedback::success),
                captured: Bindings::new(),
                diagnostics: Vec::new(),
            };
        }

        let lesson = Arc::clone(&self.lesson);
        let stage = &lesson.stages[self.stage_index];
        let context = self.context();
        let normalized = normalize(code);
        let outcome = match_solutions(code, &normalized, &stage.solutions, &context);

        let feedback = if outcome.success {
            if !outcome.captures.is_empty() {
                self.captures
                    .extend(outcome.captures.iter().map(|(k, v)| (k.clone(), v.clone())));
                self.persist_captures();
            }
            self.attempt.status = StageStatus::Success;
            info!(target: "lesson", step = stage.step, attempts = self.attempt.attempts, captured = ?outcome.captures, "Stage passed");
            Feedback::success()
        } else {
            self.attempt.attempts += 1;
            self.attempt.status = StageStatus::Failure;
            let tier = HintTier::for_attempts(self.attempt.attempts);
            let message = match tier {
                HintTier::Nudge => self.hints.nudge(stage, &context),
                HintTier::Authored => interpolate(&stage.hint, &context),
            };
            info!(target: "lesson", step = stage.step, attempts = self.attempt.attempts, ?tier, "Stage check failed");
            Feedback::failure(message, tier)
        };

        self.attempt.feedback = Some(feedback.clone());
        CheckResult {
            feedback,
            captured: outcome.captures,
            diagnostics: outcome.diagnostics,
        }
    }

    /// Move to the next stage. Only valid once the current stage is passed.
    #[instrument(level = "info", skip(self), fields(lesson = %self.lesson.id, stage = self.stage_index))]
    pub fn advance(&mut self) -> Result<Advance, SessionError> {
        if self.attempt.status != StageStatus::Success {
            return Err(SessionError::StageNotPassed {
                lesson: self.lesson.id.clone(),
                step: self.current_stage().step,
            });
        }
        if self.lesson.is_last_stage(self.stage_index) {
            info!(target: "lesson", "Lesson complete");
            return Ok(Advance::LessonComplete);
        }

        self.stage_index += 1;
        self.persist_stage();
        self.attempt = AttemptState::default();
        self.code = self.render_code_template();
        info!(target: "lesson", stage = self.stage_index, "Advanced to next stage");
        Ok(Advance::Stage {
            index: self.stage_index,
            code: self.code.clone(),
        })
    }

    /// Discard learner edits by re-rendering the current stage's code template.
    pub fn reset_stage(&mut self) -> &str {
        self.code = self.render_code_template();
        &self.code
    }

    /// Start the lesson over: fresh variant roll, no captures, stage 0.
    #[instrument(level = "info", skip_all, fields(lesson = %self.lesson.id))]
    pub fn restart_exercise<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.captures.clear();
        self.variants = roll_variants(&self.lesson, rng);
        self.stage_index = 0;
        self.attempt = AttemptState::default();
        self.persist_stage();
        self.persist_variants();
        self.persist_captures();
        self.code = self.render_code_template();
        info!(target: "lesson", variants = ?self.variants, "Lesson restarted");
    }

    pub fn lesson(&self) -> &Lesson {
        &self.lesson
    }

    pub fn stage_index(&self) -> usize {
        self.stage_index
    }

    pub fn current_stage(&self) -> &Stage {
        &self.lesson.stages[self.stage_index]
    }

    /// Variant layer merged with the capture layer; captures win.
    pub fn context(&self) -> Bindings {
        merge_layers(&self.variants, &self.captures)
    }

    pub fn variants(&self) -> &Bindings {
        &self.variants
    }

    pub fn captures(&self) -> &Bindings {
        &self.captures
    }

    pub fn instruction(&self) -> String {
        interpolate(&self.current_stage().instruction, &self.context())
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn status(&self) -> StageStatus {
        self.attempt.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempt.attempts
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.attempt.feedback.as_ref()
    }

    /// Stage preview, or the lesson preview on the first stage.
    pub fn preview_code(&self) -> Option<&str> {
        self.current_stage()
            .preview_code
            .as_deref()
            .or_else(|| match self.stage_index {
                0 => self.lesson.preview_code.as_deref(),
                _ => None,
            })
    }

    pub fn preview_unlocked(&self) -> bool {
        self.attempt.attempts >= PREVIEW_UNLOCK_AFTER
    }

    pub fn attempts_to_unlock(&self) -> u32 {
        PREVIEW_UNLOCK_AFTER.saturating_sub(self.attempt.attempts)
    }

    /// The intro card is shown on a fresh first stage.
    pub fn show_intro(&self) -> bool {
        self.lesson.intro.is_some()
            && self.stage_index == 0
            && self.attempt.status == StageStatus::Idle
    }

    fn render_code_template(&self) -> String {
        interpolate(&self.current_stage().code_template, &self.context())
    }

    fn roll_missing_variants<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let lesson = Arc::clone(&self.lesson);
        let mut rolled = 0;
        for (name, pool) in &lesson.variants {
            if self.variants.contains_key(name) {
                continue;
            }
            if let Some(value) = pool.choose(rng) {
                self.variants.insert(name.clone(), value.clone());
                rolled += 1;
            }
        }
        rolled
    }

    fn persist_stage(&self) {
        self.write(&stage_key(&self.lesson.id), &self.stage_index);
    }

    fn persist_variants(&self) {
        self.write(&variants_key(&self.lesson.id), &self.variants);
    }

    fn persist_captures(&self) {
        self.write(&captures_key(&self.lesson.id), &self.captures);
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let encoded = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                warn!(target: "lesson", %key, error = %e, "Failed to encode session state");
                return;
            }
        };
        if let Err(e) = self.store.set(key, &encoded) {
            warn!(target: "lesson", %key, error = %e, "Failed to persist session state");
        }
    }
}

/// Pick one value per variant pool. Empty pools are skipped.
pub fn roll_variants<R: Rng + ?Sized>(lesson: &Lesson, rng: &mut R) -> Bindings {
    let mut rolled = Bindings::new();
    for (name, pool) in &lesson.variants {
        match pool.choose(rng) {
            Some(value) => {
                rolled.insert(name.clone(), value.clone());
            }
            None => warn!(target: "lesson", lesson = %lesson.id, variant = %name, "Empty variant pool"),
        }
    }
    rolled
}

fn read_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Option<T> {
    match store.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(target: "lesson", %key, error = %e, "Corrupt session state; using defaults");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            error!(target: "lesson", %key, error = %e, "Failed to read session state; using defaults");
            None
        }
    }
}
