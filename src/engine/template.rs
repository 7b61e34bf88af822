//! `{{name}}` placeholder substitution for instructions, hints, code templates and
//! solution patterns.
//!
//! Unlike strict prompt templating, an unknown name is not an error: the token is
//! left in place so an authoring mistake shows up as visibly wrong text. This lets
//! callers interpolate repeatedly as more bindings become known.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::Bindings;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("Invalid placeholder regex"));

/// Replace every `{{name}}` whose `name` is bound in `context`. Substituted values are
/// not re-scanned.
pub fn interpolate(template: &str, context: &Bindings) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match context.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Placeholder names referenced by `template`, in first-appearance order.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Names that `interpolate(template, context)` would leave unresolved.
pub fn unresolved_placeholders(template: &str, context: &Bindings) -> Vec<String> {
    placeholders(template)
        .into_iter()
        .filter(|name| !context.contains_key(name))
        .collect()
}
