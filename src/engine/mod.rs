//! Answer validation engine.
//!
//! Leaf-first: `normalize` and `template` have no dependencies, `matcher` decides a
//! single check, `session` owns the per-lesson state machine and its persistence.

use std::collections::BTreeMap;

pub mod hints;
pub mod matcher;
pub mod normalize;
pub mod session;
pub mod template;

/// Variable name -> value, used for variant rolls, captures and their merge.
pub type Bindings = BTreeMap<String, String>;

/// Merge the variant layer with the capture layer. Captures win on collision.
pub fn merge_layers(variants: &Bindings, captures: &Bindings) -> Bindings {
    let mut merged = variants.clone();
    merged.extend(captures.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
