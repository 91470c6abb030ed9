//! Before/after snippets for operator review.
//!
//! Each occurrence of the staging host is shown with up to
//! [`RewriteRule::SUMMARY_CONTEXT`] characters of context on either side.
//! The "after" text is produced by running the same rule over the "before"
//! snippets, so the two always line up one-to-one.

use serde::Serialize;

use crate::rewrite::pattern::RewriteRule;

/// Review snippets for one column value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub before: String,
    pub after: String,
}

/// Extract context windows around every match in `content`.
pub fn summarize(rule: &RewriteRule, content: &str) -> Summary {
    let before = rule
        .summary_pattern()
        .find_iter(content)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let after = rule.rewrite(&before).0.into_owned();
    Summary { before, after }
}
