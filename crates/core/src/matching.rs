//! Keyword matching for incoming comments.
//!
//! Pure functions: given a comment text, the workflow's keyword list, and the
//! workflow's matching settings, return the first keyword that triggers. No
//! database access, no provider calls.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Per-workflow matching behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MatchSettings {
    /// Compare text and keywords without lower-casing first.
    pub case_sensitive: bool,
    /// Require the keyword to appear as a whole word, not a substring.
    pub exact_match: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            exact_match: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Returns the first keyword in `keywords` (list order) that matches `text`,
/// or `None` if the text or keyword list is empty or nothing matches.
///
/// Identical inputs always yield identical output.
pub fn find_keyword_match<'k>(
    text: &str,
    keywords: &'k [String],
    settings: &MatchSettings,
) -> Option<&'k str> {
    if text.is_empty() || keywords.is_empty() {
        return None;
    }

    // Lower-case the haystack once for the substring mode; the whole-word
    // mode lets the regex engine handle case folding instead.
    let lowered;
    let haystack: &str = if settings.case_sensitive {
        text
    } else {
        lowered = text.to_lowercase();
        &lowered
    };

    keywords
        .iter()
        .map(String::as_str)
        .find(|keyword| keyword_matches(text, haystack, keyword, settings))
}

fn keyword_matches(text: &str, haystack: &str, keyword: &str, settings: &MatchSettings) -> bool {
    if keyword.is_empty() {
        return false;
    }
    if settings.exact_match {
        return whole_word_match(text, keyword, settings.case_sensitive);
    }
    if settings.case_sensitive {
        haystack.contains(keyword)
    } else {
        haystack.contains(&keyword.to_lowercase())
    }
}

/// Word-boundary containment test: "price" matches "the price is" but not
/// "pricey". The keyword is regex-escaped, so metacharacters in keywords are
/// matched literally. Explicit non-word-char edges rather than `\b` so
/// keywords ending in punctuation (e.g. "c++") still match at text edges.
fn whole_word_match(text: &str, keyword: &str, case_sensitive: bool) -> bool {
    let pattern = format!(r"(?:^|[^\w]){}(?:[^\w]|$)", regex::escape(keyword));
    regex::RegexBuilder::new(&pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
