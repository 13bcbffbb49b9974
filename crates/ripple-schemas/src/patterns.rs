//! Pattern sets for classifying unit and resource identifiers.
//!
//! Several phases need to recognise "uninteresting" identifiers: the noise
//! filter drops standard-library and test-framework units from the graph,
//! the hub bypass reroutes around marker vertices, and the checksum store
//! skips well-known external resources. All of these are expressed as a
//! [`PatternSet`] so the domain knowledge lives in configuration rather than
//! in the algorithms.

use serde::{Deserialize, Serialize};

/// A single identifier pattern.
///
/// Serialized as a one-key object: `{"prefix": "java."}` or
/// `{"contains": ".utils."}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Matches identifiers starting with the given text.
    Prefix(String),
    /// Matches identifiers containing the given text anywhere.
    Contains(String),
}

impl Pattern {
    /// Returns the pattern with its text lowercased.
    fn lowercased(self) -> Self {
        match self {
            Pattern::Prefix(text) => Pattern::Prefix(text.to_lowercase()),
            Pattern::Contains(text) => Pattern::Contains(text.to_lowercase()),
        }
    }

    /// Tests an already-lowercased identifier against this pattern.
    fn matches_lowercase(&self, lowered: &str) -> bool {
        match self {
            Pattern::Prefix(text) => lowered.starts_with(text.as_str()),
            Pattern::Contains(text) => lowered.contains(text.as_str()),
        }
    }
}

/// An ordered list of patterns, matched case-insensitively.
///
/// An identifier matches the set if it matches any pattern. Pattern text is
/// lowercased on construction, so matching only has to lowercase the
/// identifier once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Pattern>", into = "Vec<Pattern>")]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Creates an empty set that matches nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from prefix and substring lists.
    pub fn from_parts(prefixes: &[&str], substrings: &[&str]) -> Self {
        prefixes
            .iter()
            .map(|p| Pattern::Prefix((*p).to_string()))
            .chain(substrings.iter().map(|s| Pattern::Contains((*s).to_string())))
            .collect::<Vec<_>>()
            .into()
    }

    /// Returns true if `id` matches any pattern in the set.
    pub fn matches(&self, id: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let lowered = id.to_lowercase();
        self.patterns.iter().any(|p| p.matches_lowercase(&lowered))
    }

    /// Returns the patterns in declaration order.
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Returns true if the set contains no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl From<Vec<Pattern>> for PatternSet {
    fn from(patterns: Vec<Pattern>) -> Self {
        Self {
            patterns: patterns.into_iter().map(Pattern::lowercased).collect(),
        }
    }
}

impl From<PatternSet> for Vec<Pattern> {
    fn from(set: PatternSet) -> Self {
        set.patterns
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::testutil::arb_unit;

    #[test]
    fn prefix_and_contains_match() {
        let set = PatternSet::from_parts(&["java."], &[".utils."]);
        assert!(set.matches("java.lang.Object"));
        assert!(set.matches("com.acme.utils.Strings"));
        assert!(!set.matches("com.acme.Service"));
    }

    /// Pattern matching ignores case.
    #[test]
    fn matching_is_case_insensitive() {
        let set = PatternSet::from_parts(&["Org.JUnit."], &[".NLS."]);
        assert!(set.matches("org.junit.Assert"));
        assert!(set.matches("com.acme.nls.Messages"));
        assert!(set.matches("ORG.JUNIT.RULE"));
    }

    #[test]
    fn empty_set_matches_nothing() {
        let set = PatternSet::new();
        assert!(set.is_empty());
        assert!(!set.matches(""));
        assert!(!set.matches("java.lang.Object"));
    }

    #[test]
    fn serde_shape_is_tagged_list() {
        let set = PatternSet::from_parts(&["java."], &[".type."]);
        let json = serde_json::to_string(&set).expect("serialize");
        assert_eq!(json, r#"[{"prefix":"java."},{"contains":".type."}]"#);
    }

    #[test]
    fn deserialization_lowercases_patterns() {
        let set: PatternSet =
            serde_json::from_str(r#"[{"prefix":"COM.Acme."}]"#)
                .expect("deserialize");
        assert_eq!(set.patterns(), &[Pattern::Prefix("com.acme.".into())]);
        assert!(set.matches("com.ACME.Widget"));
    }

    proptest! {
        /// A prefix pattern built from any identifier matches that identifier.
        #[test]
        fn prefix_of_self_matches(unit in arb_unit()) {
            let set = PatternSet::from_parts(&[unit.as_str()], &[]);
            prop_assert!(set.matches(&unit));
        }
    }
}
