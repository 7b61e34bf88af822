//! Domain models used by the backend: lessons, stages, modules and solution specs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Course module a lesson belongs to. Finishing the last lesson of a module unlocks its skill.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Module {
  Pg1,
  Pg2,
  Systems,
  Dsa,
  Se,
  Interview,
}

impl Module {
  pub fn code(self) -> &'static str {
    match self {
      Module::Pg1 => "PG1",
      Module::Pg2 => "PG2",
      Module::Systems => "SYSTEMS",
      Module::Dsa => "DSA",
      Module::Se => "SE",
      Module::Interview => "INTERVIEW",
    }
  }

  pub fn skill(self) -> &'static str {
    match self {
      Module::Pg1 => "C++ Fundamentals",
      Module::Pg2 => "Control Flow Mastery",
      Module::Systems => "Memory Management",
      Module::Dsa => "Algorithmic Thinking",
      Module::Se => "Clean Code Architecture",
      Module::Interview => "Technical Interview Readiness",
    }
  }
}

/// One accepted answer for a stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolutionSpec {
  /// Normalized containment of the (interpolated) text.
  Literal(String),
  /// Like `Literal`, passes if any member is contained.
  LiteralSet(Vec<String>),
  /// Pattern tested against the raw code; named groups become captures.
  Regex(String),
  /// Literal text that references earlier captures through `{{name}}`.
  ContextLiteral(String),
}

const REGEX_PREFIX: &str = "regex:";
const CONTEXT_PREFIX: &str = "context:";

impl SolutionSpec {
  /// Parse the authored text form (`regex:` / `context:` prefixes, plain literal otherwise).
  pub fn from_authored(text: &str) -> Self {
    if let Some(body) = text.strip_prefix(REGEX_PREFIX) {
      SolutionSpec::Regex(body.to_string())
    } else if let Some(body) = text.strip_prefix(CONTEXT_PREFIX) {
      SolutionSpec::ContextLiteral(body.to_string())
    } else {
      SolutionSpec::Literal(text.to_string())
    }
  }

  /// Parse a list of authored answers. A list made only of plain literals collapses
  /// into a single `LiteralSet`; mixed lists keep one spec per entry.
  pub fn from_authored_list<S: AsRef<str>>(texts: &[S]) -> Vec<Self> {
    let specs: Vec<SolutionSpec> = texts.iter().map(|t| Self::from_authored(t.as_ref())).collect();
    let all_plain = specs.len() > 1 && specs.iter().all(|s| matches!(s, SolutionSpec::Literal(_)));
    if !all_plain {
      return specs;
    }
    let texts = specs
      .into_iter()
      .filter_map(|s| match s {
        SolutionSpec::Literal(t) => Some(t),
        _ => None,
      })
      .collect();
    vec![SolutionSpec::LiteralSet(texts)]
  }

  /// The text a hint strategy may sniff: the literal itself, the first member of a set,
  /// or the pattern source.
  pub fn primary_text(&self) -> &str {
    match self {
      SolutionSpec::Literal(t) | SolutionSpec::ContextLiteral(t) | SolutionSpec::Regex(t) => t,
      SolutionSpec::LiteralSet(ts) => ts.first().map(String::as_str).unwrap_or(""),
    }
  }
}

/// Intro card shown before the first stage.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LessonIntro {
  pub story: String,
  pub example_code: String,
  #[serde(default)] pub efficiency_tip: Option<String>,
}

/// One checkable step of a lesson.
#[derive(Clone, Debug)]
pub struct Stage {
  pub step: u32,
  pub instruction: String,   // template
  pub code_template: String, // template
  pub solutions: Vec<SolutionSpec>,
  pub hint: String,          // template
  pub preview_code: Option<String>,
}

/// Core lesson structure held in memory.
#[derive(Clone, Debug)]
pub struct Lesson {
  pub id: String,
  pub title: String,
  pub module: Module,
  pub concept: String,
  pub description: String,
  pub intro: Option<LessonIntro>,
  /// Placeholder name -> pool of alternatives, one of which is rolled per attempt.
  pub variants: BTreeMap<String, Vec<String>>,
  pub preview_code: Option<String>,
  pub stages: Vec<Stage>,
}

impl Lesson {
  pub fn is_last_stage(&self, index: usize) -> bool {
    index + 1 >= self.stages.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn authored_prefixes_select_the_variant() {
    assert_eq!(SolutionSpec::from_authored("regex:a+"), SolutionSpec::Regex("a+".into()));
    assert_eq!(
      SolutionSpec::from_authored("context:cout << {{varName}};"),
      SolutionSpec::ContextLiteral("cout << {{varName}};".into())
    );
    assert_eq!(SolutionSpec::from_authored("cin >> x;"), SolutionSpec::Literal("cin >> x;".into()));
  }

  #[test]
  fn plain_lists_collapse_into_a_literal_set() {
    let specs = SolutionSpec::from_authored_list(&["cin >> a;", "cin>>a;"]);
    assert_eq!(specs, vec![SolutionSpec::LiteralSet(vec!["cin >> a;".into(), "cin>>a;".into()])]);
    assert_eq!(specs[0].primary_text(), "cin >> a;");
  }

  #[test]
  fn mixed_lists_keep_each_entry() {
    let specs = SolutionSpec::from_authored_list(&["regex:x\\d", "x1;"]);
    assert_eq!(specs.len(), 2);
    assert!(matches!(specs[0], SolutionSpec::Regex(_)));
    assert!(matches!(specs[1], SolutionSpec::Literal(_)));
  }

  #[test]
  fn module_names_round_trip_through_serde() {
    let m: Module = serde_json::from_str("\"SYSTEMS\"").unwrap();
    assert_eq!(m, Module::Systems);
    assert_eq!(serde_json::to_string(&Module::Pg1).unwrap(), "\"PG1\"");
    assert_eq!(Module::Dsa.skill(), "Algorithmic Thinking");
  }
}
