/// URL activation rules for features
use regex::Regex;

use crate::error::RegistryError;

/// A single activation predicate.
#[derive(Debug, Clone)]
pub enum MatchRule {
    /// Matches when the URL contains the literal anywhere
    Substring(String),
    /// Matches when the regex finds a match in the full URL
    Pattern(Regex),
}

impl MatchRule {
    pub fn substring(literal: impl Into<String>) -> MatchRule {
        MatchRule::Substring(literal.into())
    }

    pub fn pattern(pattern: &str) -> Result<MatchRule, RegistryError> {
        Regex::new(pattern)
            .map(MatchRule::Pattern)
            .map_err(|source| RegistryError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn is_match(&self, url: &str) -> bool {
        match self {
            MatchRule::Substring(literal) => url.contains(literal.as_str()),
            MatchRule::Pattern(regex) => regex.is_match(url),
        }
    }
}

/// Check a URL against a rule set.
///
/// An empty rule set matches every page; otherwise any single matching rule
/// is enough.
pub fn matches(url: &str, rules: &[MatchRule]) -> bool {
    rules.is_empty() || rules.iter().any(|rule| rule.is_match(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rules_match_everything() {
        assert!(matches("https://www.google.com", &[]));
        assert!(matches("about:blank", &[]));
        assert!(matches("", &[]));
    }

    #[test]
    fn test_substring_rule() {
        let rules = vec![MatchRule::substring("foo.com")];

        assert!(matches("https://foo.com/watch", &rules));
        assert!(!matches("bar.com", &rules));
    }

    #[test]
    fn test_pattern_rule() {
        let rules = vec![MatchRule::pattern(r"^https://(www\.)?youtube\.com/watch").unwrap()];

        assert!(matches("https://www.youtube.com/watch?v=abc", &rules));
        assert!(matches("https://youtube.com/watch?v=abc", &rules));
        assert!(!matches("https://music.youtube.com/watch?v=abc", &rules));
    }

    #[test]
    fn test_any_rule_matches() {
        let rules = vec![
            MatchRule::substring("github.com"),
            MatchRule::pattern(r"gitlab\.(com|io)").unwrap(),
        ];

        assert!(matches("https://github.com/rust-lang", &rules));
        assert!(matches("https://gitlab.io/pages", &rules));
        assert!(!matches("https://bitbucket.org", &rules));
    }

    #[test]
    fn test_substring_is_literal() {
        // Regex metacharacters in a substring rule are not interpreted
        let rules = vec![MatchRule::substring("a.b")];

        assert!(matches("https://a.b/", &rules));
        assert!(!matches("https://axb/", &rules));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            MatchRule::pattern("[unclosed"),
            Err(RegistryError::InvalidPattern { .. })
        ));
    }
}
