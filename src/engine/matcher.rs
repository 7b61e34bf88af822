//! Solution matching: decides whether submitted code satisfies any of a stage's
//! solution specs and extracts named captures from the first one that does.
//!
//! The matcher is a pure decision function. Captures are returned to the caller and
//! never committed here; the session owns the durable context.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use super::normalize::normalize;
use super::template::interpolate;
use super::Bindings;
use crate::domain::SolutionSpec;

static NAMED_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\?P?<([A-Za-z_]\w*)>").expect("Invalid named group regex"));

/// A solution pattern that could not be evaluated. Reported to the caller so lesson
/// authors can find broken patterns; the solution itself counts as a non-match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PatternDiagnostic {
    pub spec_index: usize,
    pub pattern: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub success: bool,
    /// Index of the first matching spec, in declaration order.
    pub matched_index: Option<usize>,
    pub captures: Bindings,
    pub diagnostics: Vec<PatternDiagnostic>,
}

/// Test `raw` / `normalized` code against `specs`, interpolating each with `context`.
///
/// Success is the OR over all specs; the first match wins and only its captures are
/// returned.
pub fn match_solutions(
    raw: &str,
    normalized: &str,
    specs: &[SolutionSpec],
    context: &Bindings,
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    for (index, spec) in specs.iter().enumerate() {
        let verdict = match spec {
            SolutionSpec::Regex(source) => {
                let pattern = interpolate(source, context);
                match match_pattern(raw, &pattern) {
                    Ok(found) => found,
                    Err(message) => {
                        warn!(target: "lesson", spec_index = index, %pattern, error = %message, "Solution pattern failed; treating as non-match");
                        outcome.diagnostics.push(PatternDiagnostic {
                            spec_index: index,
                            pattern,
                            message,
                        });
                        None
                    }
                }
            }
            SolutionSpec::Literal(text) | SolutionSpec::ContextLiteral(text) => {
                contains_normalized(normalized, &interpolate(text, context)).then(Bindings::new)
            }
            SolutionSpec::LiteralSet(texts) => texts
                .iter()
                .any(|text| contains_normalized(normalized, &interpolate(text, context)))
                .then(Bindings::new),
        };

        if let Some(captures) = verdict {
            debug!(target: "lesson", spec_index = index, captured = captures.len(), "Solution matched");
            outcome.success = true;
            outcome.matched_index = Some(index);
            outcome.captures = captures;
            break;
        }
    }

    outcome
}

/// Capture group names declared in an (uninterpolated) pattern source.
pub fn declared_capture_names(source: &str) -> Vec<String> {
    NAMED_GROUP
        .captures_iter(source)
        .map(|caps| caps[1].to_string())
        .collect()
}

// Backtracking engine so patterns can use back-references like `\1`.
fn match_pattern(raw: &str, pattern: &str) -> Result<Option<Bindings>, String> {
    let re = fancy_regex::Regex::new(pattern).map_err(|e| e.to_string())?;
    let Some(caps) = re.captures(raw).map_err(|e| e.to_string())? else {
        return Ok(None);
    };

    let mut captured = Bindings::new();
    for name in re.capture_names().flatten() {
        // Groups that did not take part in the match are not bindings.
        if let Some(m) = caps.name(name) {
            captured.insert(name.to_string(), m.as_str().to_string());
        }
    }
    Ok(Some(captured))
}

fn contains_normalized(normalized_code: &str, solution: &str) -> bool {
    let needle = normalize(solution);
    // An empty answer key would accept anything.
    !needle.is_empty() && normalized_code.contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> Bindings {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn check(code: &str, specs: &[SolutionSpec], context: &Bindings) -> MatchOutcome {
        match_solutions(code, &normalize(code), specs, context)
    }

    const FOR_LOOP: &str = r"for\s*\(\s*int\s+(\w+)\s*=\s*0\s*;\s*\1\s*<\s*10\s*;\s*\1\+\+\s*\)\s*\{\s*cout\s*<<\s*\1\s*;\s*\}";

    #[test]
    fn literal_match_is_substring_after_normalization() {
        let specs = vec![SolutionSpec::Literal("cout << \"Hi\";".into())];
        let outcome = check("// noise\n   cout<<\"Hi\";", &specs, &Bindings::new());
        assert!(outcome.success);
        assert_eq!(outcome.matched_index, Some(0));
        assert!(outcome.captures.is_empty());
    }

    #[test]
    fn literal_contents_must_match_exactly() {
        let specs = vec![SolutionSpec::Literal("cout << \"Hello World\";".into())];
        assert!(!check("cout << \"HelloWorld\";", &specs, &Bindings::new()).success);
        assert!(check("int main() { std::cout << \"Hello World\"; }", &specs, &Bindings::new()).success);
    }

    #[test]
    fn literal_set_passes_on_any_member() {
        let specs = vec![SolutionSpec::LiteralSet(vec![
            "cin >> width >> height;".into(),
            "cin >> width; cin >> height;".into(),
        ])];
        assert!(check("cin >> width;\ncin >> height;", &specs, &Bindings::new()).success);
        assert!(!check("cin >> height >> width;", &specs, &Bindings::new()).success);
    }

    #[test]
    fn back_reference_enforces_one_loop_variable() {
        let specs = vec![SolutionSpec::Regex(FOR_LOOP.into())];
        assert!(check("for (int i = 0; i < 10; i++) { cout << i; }", &specs, &Bindings::new()).success);
        assert!(!check("for (int i = 0; i < 10; j++) { cout << i; }", &specs, &Bindings::new()).success);
    }

    #[test]
    fn named_groups_become_captures() {
        let specs = vec![SolutionSpec::Regex(r"int\s+(?<varName>\w+)\s*=\s*\d+;".into())];
        let outcome = check("int xp = 50;", &specs, &Bindings::new());
        assert!(outcome.success);
        assert_eq!(outcome.captures, ctx(&[("varName", "xp")]));
    }

    #[test]
    fn context_literal_resolves_earlier_captures() {
        let specs = vec![SolutionSpec::ContextLiteral("cout << {{varName}};".into())];
        let context = ctx(&[("varName", "xp")]);
        assert!(check("cout << xp;", &specs, &context).success);
        assert!(!check("cout << hp;", &specs, &context).success);
    }

    #[test]
    fn regex_placeholders_are_interpolated_before_compiling() {
        let specs = vec![SolutionSpec::Regex(r"{{targetType}}\s+(?<varName>\w+)\s*=".into())];
        let outcome = check("double price = 4.5;", &specs, &ctx(&[("targetType", "double")]));
        assert_eq!(outcome.captures.get("varName").map(String::as_str), Some("price"));
        assert!(!check("int price = 4;", &specs, &ctx(&[("targetType", "double")])).success);
    }

    #[test]
    fn first_matching_spec_wins() {
        let specs = vec![
            SolutionSpec::Regex(r"(?<first>\w+) = 1;".into()),
            SolutionSpec::Regex(r"(?<second>\w+) = 1;".into()),
        ];
        let outcome = check("a = 1;", &specs, &Bindings::new());
        assert_eq!(outcome.matched_index, Some(0));
        assert_eq!(outcome.captures, ctx(&[("first", "a")]));
    }

    #[test]
    fn non_participating_groups_are_skipped() {
        let specs = vec![SolutionSpec::Regex(r"sum\s*\+=\s*(?<a>\w+);|sum = sum \+ (?<b>\w+);".into())];
        let outcome = check("sum += i;", &specs, &Bindings::new());
        assert_eq!(outcome.captures, ctx(&[("a", "i")]));
    }

    #[test]
    fn malformed_pattern_is_a_diagnosed_non_match() {
        let specs = vec![
            SolutionSpec::Regex(r"int\s+(".into()),
            SolutionSpec::Literal("int x = 1;".into()),
        ];
        let outcome = check("int x = 1;", &specs, &Bindings::new());
        assert!(outcome.success);
        assert_eq!(outcome.matched_index, Some(1));
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].spec_index, 0);

        let only_bad = vec![SolutionSpec::Regex("(".into())];
        let outcome = check("(", &only_bad, &Bindings::new());
        assert!(!outcome.success);
        assert_eq!(outcome.diagnostics.len(), 1);
    }

    #[test]
    fn empty_literal_never_matches() {
        let specs = vec![SolutionSpec::Literal("  // nothing\n".into())];
        assert!(!check("anything", &specs, &Bindings::new()).success);
    }

    #[test]
    fn finds_declared_capture_names() {
        let names = declared_capture_names(r"(?<varName>\w+)(?<=x)(?P<other>\d)(?<!y)");
        assert_eq!(names, vec!["varName".to_string(), "other".to_string()]);
    }
}
