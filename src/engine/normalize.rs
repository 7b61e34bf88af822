//! Code normalization for loose answer comparison.
//!
//! Removes `//` comments, then deletes whitespace and the `std::` qualifier from
//! everything outside double-quoted string literals. Literal contents are copied
//! verbatim. The output is only used for containment checks and is never shown
//! to the learner.

use std::sync::LazyLock;

use regex::Regex;

const NAMESPACE_TOKEN: &str = "std::";

// A literal and a comment are recognized in one scan: whichever starts first wins,
// so `//` inside a literal stays literal content. An unterminated literal runs to the
// end of the text.
static LITERAL_OR_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^"\\]|\\.)*(?:"|\\?\z)|//[^\n]*"#).expect("Invalid literal/comment regex")
});

/// Canonicalize `text`. Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Code between two literals, with its comments already dropped.
    let mut code = String::new();
    let mut last = 0;
    for token in LITERAL_OR_COMMENT.find_iter(text) {
        code.push_str(&text[last..token.start()]);
        if token.as_str().starts_with('"') {
            out.push_str(&compact_code(&code));
            code.clear();
            out.push_str(token.as_str());
        }
        last = token.end();
    }
    code.push_str(&text[last..]);
    out.push_str(&compact_code(&code));
    out
}

// Deleting whitespace can join `/ /` into a comment marker (or `s td::` into a
// qualifier), so repeat until nothing changes. Only runs between literals are
// touched; a marker formed here swallows the rest of the run, never a literal.
fn compact_code(code: &str) -> String {
    let mut current: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    loop {
        let mut next = current.replace(NAMESPACE_TOKEN, "");
        if let Some(at) = next.find("//") {
            next.truncate(at);
        }
        if next == current {
            return current;
        }
        current = next;
    }
}
