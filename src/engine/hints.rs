//! Hint escalation.
//!
//! The first failed check shows a nudge from a `HintStrategy`; from the second
//! failure on, the stage's authored hint is shown with placeholders resolved.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::template::interpolate;
use super::Bindings;
use crate::domain::Stage;

// Word match, so regex sources like `int\s+x` count as declarations too.
static DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:int|string)\b").expect("Invalid declaration regex"));

/// Failures before the authored hint replaces the nudge.
pub const AUTHORED_HINT_AFTER: u32 = 2;
/// Failures before the preview snippet is revealed.
pub const PREVIEW_UNLOCK_AFTER: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintTier {
    Nudge,
    Authored,
}

impl HintTier {
    pub fn for_attempts(attempts: u32) -> Self {
        if attempts >= AUTHORED_HINT_AFTER {
            HintTier::Authored
        } else {
            HintTier::Nudge
        }
    }
}

/// Produces the tier-0 message for a failed check.
pub trait HintStrategy: Send + Sync {
    fn nudge(&self, stage: &Stage, context: &Bindings) -> String;
}

/// Sniffs the stage's primary solution, with placeholders resolved, for a few keywords.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordNudge;

impl HintStrategy for KeywordNudge {
    fn nudge(&self, stage: &Stage, context: &Bindings) -> String {
        let primary = stage
            .solutions
            .first()
            .map(|s| interpolate(s.primary_text(), context))
            .unwrap_or_default();

        if primary.contains("cout") {
            "Tip: Focus on the `cout` statement.".into()
        } else if DECLARATION.is_match(&primary) {
            "Tip: Check your variable declaration.".into()
        } else if primary.contains("if") || primary.contains("for") {
            "Tip: Review the structure of your logic block.".into()
        } else {
            "Check your syntax. Make sure you followed the instructions properly.".into()
        }
    }
}
