//! Staging URL match/replace rule.
//!
//! A [`TargetSpec`] holds the validated staging host and optional base-path
//! remap. [`RewriteRule`] compiles it into a case-insensitive regex that
//! recognizes `http(s)://<host>/[<base>/]`, optionally preceded by a
//! `src="`/`href='` style attribute marker. The marker survives the rewrite;
//! the scheme, host and base path are replaced with `/` (or `/<replace>/`).

use std::borrow::Cow;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::FixError;

/// Base-path segment swapped during the rewrite, stored without
/// leading or trailing slashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasePathRemap {
    pub remove: String,
    pub replace: String,
}

/// Validated staging target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSpec {
    host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_path: Option<BasePathRemap>,
}

impl TargetSpec {
    /// Validate the staging URL and the optional base-path pair.
    ///
    /// The URL must not carry a scheme; surrounding whitespace and slashes
    /// are stripped. `base_path_remove` and `base_path_replace` must be
    /// given together.
    pub fn new(
        absolute_url: &str,
        base_path_remove: Option<&str>,
        base_path_replace: Option<&str>,
    ) -> Result<Self, FixError> {
        let trimmed = absolute_url.trim();
        if trimmed
            .get(..4)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http"))
        {
            return Err(FixError::Config(
                "Please do not add http/s at the start of the staging URL".to_string(),
            ));
        }
        let host = trimmed.trim_matches('/');
        if host.is_empty() {
            return Err(FixError::Config("Staging URL must not be empty".to_string()));
        }

        let base_path = match (base_path_remove, base_path_replace) {
            (None, None) => None,
            (Some(remove), Some(replace)) => {
                let remove = trim_path(remove);
                if remove.is_empty() {
                    return Err(FixError::Config(
                        "Base path to remove must contain at least one path segment".to_string(),
                    ));
                }
                Some(BasePathRemap {
                    remove: remove.to_string(),
                    replace: trim_path(replace).to_string(),
                })
            }
            _ => {
                return Err(FixError::Config(
                    "You must set both --base-path-remove and --base-path-replace".to_string(),
                ))
            }
        };

        Ok(TargetSpec {
            host: host.to_string(),
            base_path,
        })
    }

    /// Staging host without scheme or slashes.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base_path(&self) -> Option<&BasePathRemap> {
        self.base_path.as_ref()
    }
}

fn trim_path(path: &str) -> &str {
    path.trim().trim_matches('/')
}

/// Compiled match/replace rule for one [`TargetSpec`].
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Regex,
    summary: Regex,
    replacement: String,
    needle: String,
}

impl RewriteRule {
    /// Number of context characters kept on each side of a summary match.
    pub const SUMMARY_CONTEXT: usize = 45;

    pub fn new(target: &TargetSpec) -> Result<Self, FixError> {
        let host = regex::escape(&target.host);

        let (segment, replacement) = match &target.base_path {
            Some(remap) => {
                let segment = format!("{}/{}/", host, regex::escape(&remap.remove));
                let replacement = if remap.replace.is_empty() {
                    "/".to_string()
                } else {
                    format!("/{}/", remap.replace)
                };
                (segment, replacement)
            }
            None => (format!("{}/", host), "/".to_string()),
        };

        let pattern = Regex::new(&format!(
            r#"(?i)((?:src|href)=["'])?https?://{}"#,
            segment
        ))
        .map_err(|e| FixError::Config(format!("Cannot build URL pattern: {}", e)))?;

        // Summaries anchor on the host (and base path) alone so that
        // scheme-less mentions still show up in the review output.
        let summary_core = segment.trim_end_matches('/');
        let summary = Regex::new(&format!(
            "(?i)(.{{0,{ctx}}}{core}.{{0,{ctx}}})",
            ctx = Self::SUMMARY_CONTEXT,
            core = summary_core
        ))
        .map_err(|e| FixError::Config(format!("Cannot build summary pattern: {}", e)))?;

        Ok(RewriteRule {
            pattern,
            summary,
            replacement,
            needle: target.host.clone(),
        })
    }

    /// Raw host substring used for the coarse database pre-filter.
    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Replace every match in `text`, returning the new text and the number
    /// of replacements made.
    pub fn rewrite<'a>(&self, text: &'a str) -> (Cow<'a, str>, usize) {
        let mut count = 0;
        let replaced = self.pattern.replace_all(text, |caps: &Captures<'_>| {
            count += 1;
            let marker = caps.get(1).map_or("", |m| m.as_str());
            format!("{}{}", marker, self.replacement)
        });
        (replaced, count)
    }

    pub(crate) fn summary_pattern(&self) -> &Regex {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(host: &str) -> RewriteRule {
        RewriteRule::new(&TargetSpec::new(host, None, None).unwrap()).unwrap()
    }

    fn remap_rule(host: &str, remove: &str, replace: &str) -> RewriteRule {
        RewriteRule::new(&TargetSpec::new(host, Some(remove), Some(replace)).unwrap()).unwrap()
    }

    #[test]
    fn test_rejects_scheme_in_host() {
        let err = TargetSpec::new("https://staging.example.com", None, None).unwrap_err();
        assert!(matches!(err, FixError::Config(_)));
        assert!(TargetSpec::new("HTTP://staging.example.com", None, None).is_err());
    }

    #[test]
    fn test_rejects_half_base_path_pair() {
        assert!(matches!(
            TargetSpec::new("staging.example.com", Some("/files/"), None),
            Err(FixError::Config(_))
        ));
        assert!(matches!(
            TargetSpec::new("staging.example.com", None, Some("/files/")),
            Err(FixError::Config(_))
        ));
    }

    #[test]
    fn test_trims_host_and_paths() {
        let target = TargetSpec::new("  staging.example.com/ ", Some("/a/b/"), Some("c/")).unwrap();
        assert_eq!(target.host(), "staging.example.com");
        let remap = target.base_path().unwrap();
        assert_eq!(remap.remove, "a/b");
        assert_eq!(remap.replace, "c");
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(TargetSpec::new(" / ", None, None).is_err());
    }

    #[test]
    fn test_plain_urls_become_root_relative() {
        let r = rule("staging.example.com");
        let (out, n) = r.rewrite("see http://staging.example.com/about and https://staging.example.com/contact");
        assert_eq!(out, "see /about and /contact");
        assert_eq!(n, 2);
    }

    #[test]
    fn test_case_insensitive_scheme_and_host() {
        let r = rule("staging.example.com");
        let (out, n) = r.rewrite("HTTPS://Staging.Example.COM/path");
        assert_eq!(out, "/path");
        assert_eq!(n, 1);
    }

    #[test]
    fn test_attribute_marker_preserved() {
        let r = rule("staging.example.com");
        let (out, _) = r.rewrite(r#"<img src="http://staging.example.com/a.jpg">"#);
        assert_eq!(out, r#"<img src="/a.jpg">"#);
        let (out, _) = r.rewrite("<a href='https://staging.example.com/b'>");
        assert_eq!(out, "<a href='/b'>");
    }

    #[test]
    fn test_base_path_remap() {
        let r = remap_rule("HOST", "/files/old/", "/new/");
        let (out, n) = r.rewrite("http://HOST/files/old/img.jpg");
        assert_eq!(out, "/new/img.jpg");
        assert_eq!(n, 1);

        let (out, n) = r.rewrite("http://HOST/other/img.jpg");
        assert_eq!(out, "http://HOST/other/img.jpg");
        assert_eq!(n, 0);
    }

    #[test]
    fn test_base_path_requires_whole_segment() {
        let r = remap_rule("HOST", "files/old", "new");
        assert!(!r.is_match("http://HOST/files/older/img.jpg"));
    }

    #[test]
    fn test_empty_replacement_strips_base_path() {
        let r = remap_rule("HOST", "/sites/default/files/", "/");
        let (out, _) = r.rewrite(r#"src="http://HOST/sites/default/files/x.png""#);
        assert_eq!(out, r#"src="/x.png""#);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let r = rule("staging.example.com");
        let (once, _) = r.rewrite(r#"<img src="http://staging.example.com/a.jpg">"#);
        let (twice, n) = r.rewrite(&once);
        assert_eq!(once, twice);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_host_without_scheme_is_not_a_match() {
        let r = rule("staging.example.com");
        assert!(!r.is_match("visit staging.example.com/today"));
        assert!(!r.is_match("http://staging.example.com.evil/x"));
    }

    #[test]
    fn test_regex_metacharacters_in_host_are_literal() {
        let r = rule("staging.example.com");
        assert!(!r.is_match("http://stagingXexampleXcom/x"));
    }

    #[test]
    fn test_needle_is_raw_host() {
        assert_eq!(rule("staging.example.com/").needle(), "staging.example.com");
    }
}
