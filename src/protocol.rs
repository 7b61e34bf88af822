//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::course::{CompletionOutcome, CourseProgress};
use crate::domain::{LessonIntro, Module};
use crate::engine::matcher::PatternDiagnostic;
use crate::engine::session::{Feedback, StageStatus, ValidationSession};
use crate::engine::Bindings;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    ListLessons,
    OpenLesson {
        #[serde(rename = "lessonId")]
        lesson_id: String,
    },
    Check {
        #[serde(rename = "lessonId")]
        lesson_id: String,
        code: String,
    },
    Advance {
        #[serde(rename = "lessonId")]
        lesson_id: String,
    },
    ResetStage {
        #[serde(rename = "lessonId")]
        lesson_id: String,
    },
    Restart {
        #[serde(rename = "lessonId")]
        lesson_id: String,
    },
    Progress,
    SelectLesson {
        index: usize,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Lessons { lessons: Vec<LessonSummaryOut> },
    Lesson { lesson: LessonViewOut },
    CheckResult { result: CheckOut },
    Advanced { result: AdvanceOut },
    Code { code: String },
    Progress { progress: CourseProgress },
    Error { message: String },
}

/// Sidebar entry.
#[derive(Debug, Serialize)]
pub struct LessonSummaryOut {
    pub id: String,
    pub index: usize,
    pub title: String,
    pub module: Module,
    pub concept: String,
    pub stages: usize,
    pub locked: bool,
    pub completed: bool,
}

/// Everything needed to render the current stage of a lesson.
#[derive(Debug, Serialize)]
pub struct LessonViewOut {
    pub id: String,
    pub title: String,
    pub module: Module,
    pub concept: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro: Option<LessonIntro>,
    pub show_intro: bool,
    pub stage_index: usize,
    pub step: u32,
    pub total_stages: usize,
    pub instruction: String,
    pub code: String,
    pub status: StageStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    pub has_preview: bool,
    /// Only present once unlocked by failed attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_code: Option<String>,
    pub attempts_to_unlock: u32,
}

/// Convert a session into the public view DTO.
pub fn to_view(s: &ValidationSession) -> LessonViewOut {
    let lesson = s.lesson();
    let preview = s.preview_code();
    LessonViewOut {
        id: lesson.id.clone(),
        title: lesson.title.clone(),
        module: lesson.module,
        concept: lesson.concept.clone(),
        description: lesson.description.clone(),
        intro: lesson.intro.clone(),
        show_intro: s.show_intro(),
        stage_index: s.stage_index(),
        step: s.current_stage().step,
        total_stages: lesson.stages.len(),
        instruction: s.instruction(),
        code: s.code().to_string(),
        status: s.status(),
        attempts: s.attempts(),
        feedback: s.feedback().cloned(),
        has_preview: preview.is_some(),
        preview_code: preview.filter(|_| s.preview_unlocked()).map(str::to_string),
        attempts_to_unlock: s.attempts_to_unlock(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct LessonQuery {
    #[serde(rename = "lessonId")]
    pub lesson_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LessonIn {
    #[serde(rename = "lessonId")]
    pub lesson_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckIn {
    #[serde(rename = "lessonId")]
    pub lesson_id: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct CheckOut {
    pub feedback: Feedback,
    pub attempts: u32,
    pub captured: Bindings,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<PatternDiagnostic>,
    pub preview_unlocked: bool,
}

#[derive(Debug, Serialize)]
pub struct AdvanceOut {
    pub lesson_complete: bool,
    /// The new stage, absent when the lesson was completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson: Option<LessonViewOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<CompletionOutcome>,
}

#[derive(Debug, Serialize)]
pub struct CodeOut {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectIn {
    pub index: usize,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub message: String,
}
