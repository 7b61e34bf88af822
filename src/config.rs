//! Loading the lesson bank from TOML and choosing the progress store.
//!
//! See `LessonBankConfig` and `LessonCfg` for the expected schema. Solutions use the
//! authored text form: a string or a list of strings, optionally prefixed with
//! `regex:` or `context:`.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::{Lesson, LessonIntro, Module, SolutionSpec, Stage};
use crate::engine::matcher::declared_capture_names;
use crate::engine::template::placeholders;
use crate::store::{FileStore, KvStore, MemoryStore};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LessonBankConfig {
  #[serde(default)]
  pub lessons: Vec<LessonCfg>,
}

/// Lesson entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct LessonCfg {
  #[serde(default)] pub id: Option<String>,
  pub title: String,
  pub module: Module,
  #[serde(default)] pub concept: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub intro: Option<LessonIntro>,
  #[serde(default)] pub variants: BTreeMap<String, Vec<String>>,
  #[serde(default)] pub preview_code: Option<String>,
  #[serde(default)] pub stages: Vec<StageCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StageCfg {
  #[serde(default)] pub step: Option<u32>,
  pub instruction: String,
  #[serde(default)] pub code_template: String,
  pub solution: AuthoredSolution,
  #[serde(default)] pub hint: String,
  #[serde(default)] pub preview_code: Option<String>,
}

/// `solution = "..."` or `solution = ["...", "..."]`.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum AuthoredSolution {
  One(String),
  Many(Vec<String>),
}

impl AuthoredSolution {
  pub fn into_specs(self) -> Vec<SolutionSpec> {
    match self {
      AuthoredSolution::One(text) => vec![SolutionSpec::from_authored(&text)],
      AuthoredSolution::Many(texts) => SolutionSpec::from_authored_list(&texts),
    }
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("lesson '{lesson}' has no stages")]
  NoStages { lesson: String },

  #[error("lesson '{lesson}' stage {step} has no solutions")]
  NoSolutions { lesson: String, step: u32 },

  #[error("lesson '{lesson}' variant pool '{name}' is empty")]
  EmptyVariantPool { lesson: String, name: String },
}

impl LessonCfg {
  /// Validate and convert into a `Lesson`. Lessons without an id get a random one.
  pub fn into_lesson(self) -> Result<Lesson, ConfigError> {
    let id = self.id.unwrap_or_else(|| Uuid::new_v4().to_string());

    if self.stages.is_empty() {
      return Err(ConfigError::NoStages { lesson: id });
    }
    if let Some((name, _)) = self.variants.iter().find(|(_, pool)| pool.is_empty()) {
      return Err(ConfigError::EmptyVariantPool { lesson: id, name: name.clone() });
    }

    let mut stages = Vec::with_capacity(self.stages.len());
    for (i, sc) in self.stages.into_iter().enumerate() {
      let step = sc.step.unwrap_or(i as u32 + 1);
      let solutions = sc.solution.into_specs();
      let empty = solutions.is_empty()
        || solutions.iter().all(|s| matches!(s, SolutionSpec::LiteralSet(ts) if ts.is_empty()));
      if empty {
        return Err(ConfigError::NoSolutions { lesson: id, step });
      }
      stages.push(Stage {
        step,
        instruction: sc.instruction,
        code_template: sc.code_template,
        solutions,
        hint: sc.hint,
        preview_code: sc.preview_code,
      });
    }

    Ok(Lesson {
      id,
      title: self.title,
      module: self.module,
      concept: self.concept,
      description: self.description,
      intro: self.intro,
      variants: self.variants,
      preview_code: self.preview_code,
      stages,
    })
  }
}

pub fn parse_lesson_bank(s: &str) -> Result<LessonBankConfig, toml::de::Error> {
  toml::from_str::<LessonBankConfig>(s)
}

/// Attempt to load the lesson bank from LESSONS_CONFIG_PATH. On any IO/parse error, returns None.
pub fn load_lesson_bank_from_env() -> Option<LessonBankConfig> {
  let path = std::env::var("LESSONS_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_lesson_bank(&s) {
      Ok(cfg) => {
        info!(target: "codestep_backend", %path, lessons = cfg.lessons.len(), "Loaded lesson bank (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "codestep_backend", %path, error = %e, "Failed to parse TOML lesson bank");
        None
      }
    },
    Err(e) => {
      error!(target: "codestep_backend", %path, error = %e, "Failed to read TOML lesson bank");
      None
    }
  }
}

/// File store at STORE_PATH, or an in-memory store when unset or unopenable.
pub fn open_store_from_env() -> Arc<dyn KvStore> {
  let Ok(path) = std::env::var("STORE_PATH") else {
    info!(target: "codestep_backend", "STORE_PATH not set; progress is kept in memory.");
    return Arc::new(MemoryStore::new());
  };
  match FileStore::open(&path) {
    Ok(store) => {
      info!(target: "codestep_backend", path = %store.path().display(), "Progress store enabled");
      Arc::new(store)
    }
    Err(e) => {
      error!(target: "codestep_backend", %path, error = %e, "Failed to open progress store; using memory");
      Arc::new(MemoryStore::new())
    }
  }
}

/// Names a lesson's templates reference that no variant or earlier capture group can
/// provide. Such tokens would render verbatim, which is an authoring bug.
pub fn unresolvable_placeholders(lesson: &Lesson) -> Vec<(u32, String)> {
  let mut known: HashSet<String> = lesson.variants.keys().cloned().collect();
  let mut missing = Vec::new();

  for stage in &lesson.stages {
    let mut texts = vec![stage.instruction.as_str(), stage.code_template.as_str(), stage.hint.as_str()];
    for spec in &stage.solutions {
      match spec {
        SolutionSpec::LiteralSet(ts) => texts.extend(ts.iter().map(String::as_str)),
        other => texts.push(other.primary_text()),
      }
    }
    for text in texts {
      for name in placeholders(text) {
        if !known.contains(&name) && !missing.iter().any(|(s, n)| *s == stage.step && *n == name) {
          missing.push((stage.step, name));
        }
      }
    }
    // Captures from this stage are available to later stages only.
    for spec in &stage.solutions {
      if let SolutionSpec::Regex(source) = spec {
        known.extend(declared_capture_names(source));
      }
    }
  }

  for (step, name) in &missing {
    debug!(target: "lesson", lesson = %lesson.id, step, placeholder = %name, "Placeholder has no variant or earlier capture");
  }
  missing
}

#[cfg(test)]
mod tests {
  use super::*;

  const BANK: &str = r#"
[[lessons]]
id = "vars"
title = "Variables"
module = "PG1"
concept = "The Box"

[lessons.variants]
targetType = ["int", "double"]

[[lessons.stages]]
instruction = "Create a `{{targetType}}` variable."
code_template = "// Create {{targetType}} variable"
solution = 'regex:{{targetType}}\s+(?<varName>\w+)\s*=\s*[\d\.]+;'
hint = "`{{targetType}} name = value;`"

[[lessons.stages]]
instruction = "Print `{{varName}}`."
solution = "context:cout << {{varName}};"
hint = "`cout << {{varName}};`"

[[lessons]]
title = "Input"
module = "PG1"

[[lessons.stages]]
step = 4
instruction = "Read `score`."
solution = ["cin >> score;", "cin >>score;"]
"#;

  #[test]
  fn parses_a_lesson_bank() {
    let cfg = parse_lesson_bank(BANK).unwrap();
    assert_eq!(cfg.lessons.len(), 2);

    let mut lessons = cfg.lessons.into_iter().map(|l| l.into_lesson().unwrap());
    let vars = lessons.next().unwrap();
    assert_eq!(vars.id, "vars");
    assert_eq!(vars.module, Module::Pg1);
    assert_eq!(vars.stages.len(), 2);
    assert_eq!(vars.stages[0].step, 1);
    assert_eq!(vars.stages[1].step, 2);
    assert!(matches!(vars.stages[0].solutions[0], SolutionSpec::Regex(_)));
    assert!(matches!(vars.stages[1].solutions[0], SolutionSpec::ContextLiteral(_)));
    assert_eq!(vars.variants["targetType"], vec!["int".to_string(), "double".to_string()]);

    let input = lessons.next().unwrap();
    assert!(!input.id.is_empty());
    assert_eq!(input.stages[0].step, 4);
    assert!(matches!(input.stages[0].solutions[0], SolutionSpec::LiteralSet(_)));
  }

  #[test]
  fn rejects_lessons_without_stages_or_pools() {
    let no_stages = r#"
[[lessons]]
id = "empty"
title = "Empty"
module = "DSA"
"#;
    let cfg = parse_lesson_bank(no_stages).unwrap();
    let err = cfg.lessons.into_iter().next().unwrap().into_lesson().unwrap_err();
    assert_eq!(err, ConfigError::NoStages { lesson: "empty".into() });

    let empty_pool = r#"
[[lessons]]
id = "pool"
title = "Pool"
module = "SE"
variants = { kind = [] }

[[lessons.stages]]
instruction = "x"
solution = "x;"
"#;
    let cfg = parse_lesson_bank(empty_pool).unwrap();
    let err = cfg.lessons.into_iter().next().unwrap().into_lesson().unwrap_err();
    assert_eq!(err, ConfigError::EmptyVariantPool { lesson: "pool".into(), name: "kind".into() });
  }

  #[test]
  fn rejects_empty_solution_lists() {
    let bank = r#"
[[lessons]]
id = "nosol"
title = "No solution"
module = "PG2"

[[lessons.stages]]
instruction = "x"
solution = []
"#;
    let cfg = parse_lesson_bank(bank).unwrap();
    let err = cfg.lessons.into_iter().next().unwrap().into_lesson().unwrap_err();
    assert_eq!(err, ConfigError::NoSolutions { lesson: "nosol".into(), step: 1 });
  }

  #[test]
  fn placeholders_resolve_from_variants_and_earlier_captures() {
    let cfg = parse_lesson_bank(BANK).unwrap();
    let vars = cfg.lessons.into_iter().next().unwrap().into_lesson().unwrap();
    assert!(unresolvable_placeholders(&vars).is_empty());

    let mut broken = vars.clone();
    broken.stages[0].hint = "use {{varName}} and {{typo}}".into();
    assert_eq!(
      unresolvable_placeholders(&broken),
      vec![(1, "varName".to_string()), (1, "typo".to_string())]
    );
  }
}
