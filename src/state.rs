//! Application state: lesson bank, progress store, per-lesson sessions and course progress.
//!
//! This module owns:
//!   - the ordered lesson list (config bank first, then built-in seeds) and an id index
//!   - the injected key-value store shared by sessions and course progress
//!   - one validation session per opened lesson, each behind its own async mutex so
//!     overlapping checks on a lesson are serialized
//!   - the hint strategy handed to every session

use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinError;
use tracing::{error, info, instrument};

use crate::config::{load_lesson_bank_from_env, open_store_from_env, unresolvable_placeholders};
use crate::course::CourseProgress;
use crate::domain::Lesson;
use crate::engine::hints::{HintStrategy, KeywordNudge};
use crate::engine::session::ValidationSession;
use crate::seeds::seed_lessons;
use crate::store::KvStore;

pub type SharedSession = Arc<Mutex<ValidationSession>>;

pub struct AppState {
    pub lessons: Vec<Arc<Lesson>>,
    pub by_id: HashMap<String, usize>,
    pub sessions: RwLock<HashMap<String, SharedSession>>,
    pub progress: Mutex<CourseProgress>,
    pub store: Arc<dyn KvStore>,
    pub hints: Arc<dyn HintStrategy>,
}

impl AppState {
    /// Build state from env: load the lesson bank, add built-in seeds, open the store.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let mut lessons: Vec<Lesson> = Vec::new();

        // Config-bank lessons come first, in file order.
        if let Some(cfg) = load_lesson_bank_from_env() {
            for lc in cfg.lessons {
                let title = lc.title.clone();
                match lc.into_lesson() {
                    Ok(lesson) => lessons.push(lesson),
                    Err(e) => {
                        error!(target: "lesson", %title, error = %e, "Skipping bank lesson");
                    }
                }
            }
        }

        // Always append built-in seeds, but don't overwrite existing ids.
        for seed in seed_lessons() {
            if !lessons.iter().any(|l| l.id == seed.id) {
                lessons.push(seed);
            }
        }

        Self::from_parts(lessons, open_store_from_env(), Arc::new(KeywordNudge))
    }

    pub fn from_parts(lessons: Vec<Lesson>, store: Arc<dyn KvStore>, hints: Arc<dyn HintStrategy>) -> Self {
        let lessons: Vec<Arc<Lesson>> = lessons.into_iter().map(Arc::new).collect();
        let by_id = lessons
            .iter()
            .enumerate()
            .map(|(i, l)| (l.id.clone(), i))
            .collect();

        for lesson in &lessons {
            let unresolved = unresolvable_placeholders(lesson).len();
            info!(target: "lesson", id = %lesson.id, module = lesson.module.code(), stages = lesson.stages.len(), unresolved, "Lesson available");
        }

        let progress = CourseProgress::load(store.as_ref(), lessons.len());
        info!(target: "codestep_backend", lessons = lessons.len(), current = progress.current_lesson, unlocked = progress.unlocked_lesson, "Course loaded");

        Self {
            lessons,
            by_id,
            sessions: RwLock::new(HashMap::new()),
            progress: Mutex::new(progress),
            store,
            hints,
        }
    }

    pub fn lesson_index(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Session for lesson `id`, opened (and restored from the store) on first use.
    /// `Ok(None)` means no such lesson.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn session(&self, id: &str) -> Result<Option<SharedSession>, JoinError> {
        if let Some(s) = { self.sessions.read().await.get(id).cloned() } {
            return Ok(Some(s));
        }
        let Some(lesson) = self.lesson_index(id).and_then(|i| self.lessons.get(i)).cloned() else {
            return Ok(None);
        };

        let mut sessions = self.sessions.write().await;
        if let Some(s) = sessions.get(id) {
            return Ok(Some(s.clone()));
        }
        // Opening writes defaults back to the store.
        let (store, hints) = (self.store.clone(), self.hints.clone());
        let opened = tokio::task::spawn_blocking(move || {
            ValidationSession::open(lesson, store, hints, &mut rand::thread_rng())
        })
        .await?;
        let session = Arc::new(Mutex::new(opened));
        sessions.insert(id.to_string(), session.clone());
        Ok(Some(session))
    }
}
