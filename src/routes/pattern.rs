use anyhow::{bail, Context, Result};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

/// A registered path pattern compiled for matching.
///
/// Patterns use `{name}` capture segments, e.g. `/content/v1/articles/{id}`.
/// Compilation happens once at registration; matching is anchored and
/// case-insensitive, and a capture segment matches exactly one path segment.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    regex: Regex,
    param_names: Vec<String>,
}

impl PathPattern {
    /// Compile a pattern. Fails on malformed or duplicate capture names.
    pub fn compile(path: &str) -> Result<Self> {
        if !path.starts_with('/') {
            bail!("route pattern {path:?} must start with '/'");
        }

        let mut pattern = String::with_capacity(path.len() + 8);
        pattern.push('^');
        let mut param_names = Vec::with_capacity(path.matches('{').count());

        for segment in path.split('/') {
            if segment.is_empty() {
                continue;
            }
            if let Some(name) = segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
            {
                if name.is_empty()
                    || !name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    bail!("invalid capture name {name:?} in route pattern {path:?}");
                }
                if param_names.iter().any(|existing| existing == name) {
                    bail!("duplicate capture name {name:?} in route pattern {path:?}");
                }
                pattern.push_str(&format!("/(?P<{name}>[^/]+)"));
                param_names.push(name.to_string());
            } else if segment.contains('{') || segment.contains('}') {
                bail!("malformed capture segment {segment:?} in route pattern {path:?}");
            } else {
                pattern.push('/');
                pattern.push_str(&regex::escape(segment));
            }
        }

        if pattern == "^" {
            // Root pattern.
            pattern.push('/');
        }
        pattern.push('$');

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("failed to compile route pattern {path:?}"))?;

        Ok(Self {
            raw: path.to_string(),
            regex,
            param_names,
        })
    }

    /// The pattern as registered, e.g. `/content/v1/articles/{id}`.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Anchored match against a request path, extracting named captures.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(path)?;
        let mut params = HashMap::with_capacity(self.param_names.len());
        for name in &self.param_names {
            if let Some(capture) = captures.name(name) {
                params.insert(name.clone(), capture.as_str().to_string());
            }
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_named_captures() {
        let pattern = PathPattern::compile("/content/v1/articles/{id}/revisions/{rev}")
            .expect("pattern compiles");
        let params = pattern
            .matches("/content/v1/articles/42/revisions/7")
            .expect("path matches");
        assert_eq!(params["id"], "42");
        assert_eq!(params["rev"], "7");
        assert_eq!(pattern.param_names(), ["id", "rev"]);
    }

    #[test]
    fn matching_is_anchored() {
        let pattern = PathPattern::compile("/content/v1/articles").expect("pattern compiles");
        assert!(pattern.matches("/content/v1/articles").is_some());
        assert!(pattern.matches("/content/v1/articles/42").is_none());
        assert!(pattern.matches("/prefix/content/v1/articles").is_none());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let pattern = PathPattern::compile("/content/v1/articles").expect("pattern compiles");
        assert!(pattern.matches("/Content/V1/Articles").is_some());
    }

    #[test]
    fn capture_spans_one_segment_only() {
        let pattern = PathPattern::compile("/content/v1/articles/{id}").expect("pattern compiles");
        assert!(pattern.matches("/content/v1/articles/42/extra").is_none());
        assert!(pattern.matches("/content/v1/articles/").is_none());
    }

    #[test]
    fn literal_segments_are_escaped() {
        let pattern = PathPattern::compile("/v1.0/things").expect("pattern compiles");
        assert!(pattern.matches("/v1.0/things").is_some());
        assert!(pattern.matches("/v1x0/things").is_none());
    }

    #[test]
    fn root_pattern_matches_only_root() {
        let pattern = PathPattern::compile("/").expect("pattern compiles");
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/anything").is_none());
    }

    #[test]
    fn rejects_bad_captures() {
        assert!(PathPattern::compile("/a/{}").is_err());
        assert!(PathPattern::compile("/a/{id}/b/{id}").is_err());
        assert!(PathPattern::compile("/a/{id").is_err());
        assert!(PathPattern::compile("no-leading-slash").is_err());
    }
}
