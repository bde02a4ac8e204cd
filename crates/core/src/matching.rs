//! Matching predicates: glob filters, tag containment, and content matching.
//!
//! Globs use shell-glob (`fnmatch`) semantics against the full string — `*`
//! crosses `/`, so `*/scratch/*` matches `/tmp/scratch/x/simple.pdf` without
//! needing `scratch` to be a full path segment. Invalid user-supplied
//! patterns (globs, regexes) are a non-match, not an error.

use globset::GlobBuilder;
use regex::Regex;

use crate::types::DbId;
use crate::workflow::MatchingAlgorithm;

/// Minimum normalized similarity for a fuzzy content match.
const FUZZY_THRESHOLD: f64 = 0.85;

// ---------------------------------------------------------------------------
// Glob and set predicates
// ---------------------------------------------------------------------------

/// Match `value` against a shell-style glob pattern, case-insensitively.
///
/// `literal_separator(false)` keeps `*` matching across `/`, which is what
/// fnmatch does on a plain string. An unparseable pattern never matches.
pub fn glob_matches(pattern: &str, value: &str) -> bool {
    let glob = match GlobBuilder::new(pattern)
        .literal_separator(false)
        .case_insensitive(true)
        .build()
    {
        Ok(glob) => glob,
        Err(e) => {
            tracing::debug!(pattern, error = %e, "Ignoring invalid glob filter");
            return false;
        }
    };
    glob.compile_matcher().is_match(value)
}

/// Whether `document_tags` contains every id in `required`.
pub fn tags_superset(
    document_tags: &std::collections::HashSet<DbId>,
    required: &std::collections::HashSet<DbId>,
) -> bool {
    required.is_subset(document_tags)
}

// ---------------------------------------------------------------------------
// ContentMatcher
// ---------------------------------------------------------------------------

/// Content-matching capability consumed by the trigger evaluator.
///
/// The built-in [`PatternMatcher`] covers the platform algorithms; the trait
/// seam exists so tests and future entity-matching backends can substitute
/// their own implementation.
pub trait ContentMatcher: Send + Sync {
    /// Evaluate `pattern` against `text` under the given algorithm.
    fn matches(
        &self,
        algorithm: MatchingAlgorithm,
        pattern: &str,
        case_insensitive: bool,
        text: &str,
    ) -> bool;
}

/// Default content matcher: word-boundary ANY/ALL, substring LITERAL,
/// REGEX, and edit-distance FUZZY.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternMatcher;

impl ContentMatcher for PatternMatcher {
    fn matches(
        &self,
        algorithm: MatchingAlgorithm,
        pattern: &str,
        case_insensitive: bool,
        text: &str,
    ) -> bool {
        if algorithm == MatchingAlgorithm::None {
            return true;
        }
        if pattern.trim().is_empty() {
            tracing::debug!(algorithm = %algorithm, "Empty match pattern never matches");
            return false;
        }
        match algorithm {
            MatchingAlgorithm::None => true,
            MatchingAlgorithm::Any => any_word_matches(pattern, case_insensitive, text),
            MatchingAlgorithm::All => all_words_match(pattern, case_insensitive, text),
            MatchingAlgorithm::Literal => literal_matches(pattern, case_insensitive, text),
            MatchingAlgorithm::Regex => regex_matches(pattern, case_insensitive, text),
            MatchingAlgorithm::Fuzzy => fuzzy_matches(pattern, text),
        }
    }
}

fn word_regex(word: &str, case_insensitive: bool) -> Option<Regex> {
    let flags = if case_insensitive { "(?i)" } else { "" };
    let pattern = format!(r"{flags}\b{}\b", regex::escape(word));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::debug!(word, error = %e, "Could not build word-boundary pattern");
            None
        }
    }
}

fn any_word_matches(pattern: &str, case_insensitive: bool, text: &str) -> bool {
    pattern
        .split_whitespace()
        .filter_map(|word| word_regex(word, case_insensitive))
        .any(|re| re.is_match(text))
}

fn all_words_match(pattern: &str, case_insensitive: bool, text: &str) -> bool {
    pattern.split_whitespace().all(|word| {
        word_regex(word, case_insensitive)
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    })
}

fn literal_matches(pattern: &str, case_insensitive: bool, text: &str) -> bool {
    let matched = if case_insensitive {
        text.to_lowercase().contains(&pattern.to_lowercase())
    } else {
        text.contains(pattern)
    };
    if matched {
        tracing::debug!(pattern, "Document content contains this string");
    }
    matched
}

fn regex_matches(pattern: &str, case_insensitive: bool, text: &str) -> bool {
    let full = if case_insensitive {
        format!("(?i){pattern}")
    } else {
        pattern.to_string()
    };
    match Regex::new(&full) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            tracing::debug!(pattern, error = %e, "Ignoring invalid regex filter");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Fuzzy matching
// ---------------------------------------------------------------------------

/// Lowercase and strip punctuation so the edit distance only sees words.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Length of the longest common subsequence of two char slices.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

/// Normalized indel similarity in `[0, 1]` (1.0 = identical).
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    (2 * lcs_len(&a, &b)) as f64 / total as f64
}

/// Slide a word-aligned window the size of the pattern over the content and
/// keep the best similarity, so a short pattern can approximately match
/// anywhere inside a long document.
fn fuzzy_matches(pattern: &str, text: &str) -> bool {
    let pattern = normalize(pattern);
    let text = normalize(text);
    if pattern.is_empty() || text.is_empty() {
        return false;
    }

    let pattern_words = pattern.split(' ').count();
    let words: Vec<&str> = text.split(' ').collect();
    if words.len() <= pattern_words {
        return similarity(&pattern, &text) >= FUZZY_THRESHOLD;
    }

    words
        .windows(pattern_words)
        .map(|window| similarity(&pattern, &window.join(" ")))
        .any(|score| score >= FUZZY_THRESHOLD)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    // -- glob_matches -------------------------------------------------------

    #[test]
    fn glob_star_crosses_separators() {
        assert!(glob_matches("*/scratch/*", "/tmp/scratch/x/simple.pdf"));
    }

    #[test]
    fn glob_matches_filename_substring() {
        assert!(glob_matches("*simple*", "simple.pdf"));
        assert!(!glob_matches("*simple*", "other.pdf"));
    }

    #[test]
    fn glob_is_case_insensitive() {
        assert!(glob_matches("*INVOICE*", "2026_invoice_003.pdf"));
    }

    #[test]
    fn glob_question_mark_single_char() {
        assert!(glob_matches("doc?.pdf", "doc1.pdf"));
        assert!(!glob_matches("doc?.pdf", "doc12.pdf"));
    }

    #[test]
    fn glob_invalid_pattern_never_matches() {
        assert!(!glob_matches("[unclosed", "anything"));
    }

    // -- tags_superset ------------------------------------------------------

    #[test]
    fn tags_superset_requires_all() {
        let doc: HashSet<i64> = [1, 2, 3].into();
        assert!(tags_superset(&doc, &[1, 2].into()));
        assert!(!tags_superset(&doc, &[1, 4].into()));
    }

    #[test]
    fn tags_superset_empty_filter_always_true() {
        let doc: HashSet<i64> = [1].into();
        assert!(tags_superset(&doc, &HashSet::new()));
        assert!(tags_superset(&HashSet::new(), &HashSet::new()));
    }

    #[test]
    fn tags_subset_does_not_match() {
        // Document tagged only {A} does not match filter {A, B}.
        let doc: HashSet<i64> = [1].into();
        assert!(!tags_superset(&doc, &[1, 2].into()));
    }

    // -- PatternMatcher -----------------------------------------------------

    fn matches(alg: MatchingAlgorithm, pattern: &str, text: &str) -> bool {
        PatternMatcher.matches(alg, pattern, true, text)
    }

    #[test]
    fn none_always_matches() {
        assert!(matches(MatchingAlgorithm::None, "", "anything"));
    }

    #[test]
    fn empty_pattern_never_matches() {
        for alg in [
            MatchingAlgorithm::Any,
            MatchingAlgorithm::All,
            MatchingAlgorithm::Literal,
            MatchingAlgorithm::Regex,
            MatchingAlgorithm::Fuzzy,
        ] {
            assert!(!matches(alg, "  ", "anything"), "{alg} matched empty pattern");
        }
    }

    #[test]
    fn any_matches_one_word() {
        assert!(matches(MatchingAlgorithm::Any, "invoice receipt", "your receipt is attached"));
        assert!(!matches(MatchingAlgorithm::Any, "invoice receipt", "a delivery note"));
    }

    #[test]
    fn any_respects_word_boundaries() {
        assert!(!matches(MatchingAlgorithm::Any, "count", "accountant ledger"));
        assert!(matches(MatchingAlgorithm::Any, "count", "final count sheet"));
    }

    #[test]
    fn all_requires_every_word() {
        assert!(matches(MatchingAlgorithm::All, "annual report", "the annual financial report"));
        assert!(!matches(MatchingAlgorithm::All, "annual report", "the annual letter"));
    }

    #[test]
    fn literal_is_substring() {
        assert!(matches(MatchingAlgorithm::Literal, "Gas Bill", "enclosed gas bill for March"));
        assert!(!matches(MatchingAlgorithm::Literal, "gas bill", "gas and a bill"));
    }

    #[test]
    fn literal_case_sensitive_flag() {
        assert!(!PatternMatcher.matches(MatchingAlgorithm::Literal, "Gas Bill", false, "gas bill"));
        assert!(PatternMatcher.matches(MatchingAlgorithm::Literal, "gas bill", false, "gas bill"));
    }

    #[test]
    fn regex_matches_pattern() {
        assert!(matches(MatchingAlgorithm::Regex, r"inv-\d{4}", "ref INV-2093 enclosed"));
        assert!(!matches(MatchingAlgorithm::Regex, r"inv-\d{4}", "ref INV-20 enclosed"));
    }

    #[test]
    fn regex_invalid_pattern_is_non_match() {
        assert!(!matches(MatchingAlgorithm::Regex, "([unbalanced", "anything"));
    }

    #[test]
    fn fuzzy_tolerates_ocr_noise() {
        assert!(matches(
            MatchingAlgorithm::Fuzzy,
            "Eletricity Bill",
            "Your Electricity Bill is due on the first"
        ));
    }

    #[test]
    fn fuzzy_rejects_unrelated_text() {
        assert!(!matches(MatchingAlgorithm::Fuzzy, "electricity bill", "meeting minutes attached"));
    }

    #[test]
    fn fuzzy_ignores_punctuation() {
        assert!(matches(MatchingAlgorithm::Fuzzy, "ACME, Inc.", "invoice from acme inc dated"));
    }

    // -- similarity internals ----------------------------------------------

    #[test]
    fn similarity_identical_is_one() {
        assert!((similarity("abc", "abc") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn similarity_disjoint_is_zero() {
        assert!(similarity("abc", "xyz") < f64::EPSILON);
    }

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("  ACME, Inc.  "), "acme inc");
    }
}
