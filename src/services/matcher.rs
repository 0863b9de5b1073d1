// src/services/matcher.rs

//! Pattern matcher mapping message text to labels.

use std::collections::BTreeSet;

use regex::Regex;

use crate::error::Result;
use crate::models::PatternRule;

/// Stateless matcher over a fixed set of compiled pattern rules.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    rules: Vec<(Regex, String)>,
}

impl PatternMatcher {
    /// Compile every rule case-insensitively.
    pub fn new(rules: &[PatternRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| Ok((rule.compile()?, rule.label.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Labels of every rule matching anywhere in `text`.
    pub fn labels(&self, text: &str) -> BTreeSet<String> {
        if text.is_empty() {
            return BTreeSet::new();
        }
        self.rules
            .iter()
            .filter(|(regex, _)| regex.is_match(text))
            .map(|(_, label)| label.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;

    fn default_matcher() -> PatternMatcher {
        PatternMatcher::new(&Config::default().patterns).unwrap()
    }

    #[test]
    fn test_separator_variants() {
        let matcher = default_matcher();
        for text in ["az-104 prep", "AZ 104 exam", "Az104 course"] {
            let labels = matcher.labels(text);
            assert!(labels.contains("AZ-104"), "no match for {text:?}");
        }
    }

    #[test]
    fn test_word_boundaries() {
        let matcher = default_matcher();
        assert!(matcher.labels("XAZ-1045").is_empty());
        assert!(matcher.labels("CCNAX").is_empty());
        assert!(matcher.labels("code 2003011").is_empty());
    }

    #[test]
    fn test_multiple_labels_sorted() {
        let matcher = default_matcher();
        let labels: Vec<_> = matcher
            .labels("CCNA 200-301 and CompTIA Security+ SY0-701")
            .into_iter()
            .collect();
        assert_eq!(labels, vec!["200-301", "CCNA", "CompTIA Security+", "SY0-701"]);
    }

    #[test]
    fn test_duplicate_labels_collapse() {
        let rules = vec![
            PatternRule::new(r"\bfoo\b", "X"),
            PatternRule::new(r"\bbar\b", "X"),
        ];
        let matcher = PatternMatcher::new(&rules).unwrap();
        assert_eq!(matcher.labels("foo bar").len(), 1);
    }

    #[test]
    fn test_empty_text() {
        assert!(default_matcher().labels("").is_empty());
    }

    #[test]
    fn test_invalid_rule() {
        assert!(PatternMatcher::new(&[PatternRule::new("[", "bad")]).is_err());
    }
}
