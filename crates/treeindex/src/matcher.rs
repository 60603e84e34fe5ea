//! Query term matching.

use crate::error::{IndexError, Result};
use crate::types::{Entry, MatchMode, SearchOptions, TypeFilter};

/// A compiled query: case-folded terms, all of which must match.
#[derive(Debug, Clone)]
pub struct TermMatcher {
    terms: Vec<String>,
    match_mode: MatchMode,
    type_filter: TypeFilter,
    exact: bool,
}

impl TermMatcher {
    /// Splits `query` on whitespace into case-folded terms.
    pub fn compile(query: &str, options: &SearchOptions) -> Result<Self> {
        let folded = query.trim().to_lowercase();
        let terms: Vec<String> = folded.split_whitespace().map(str::to_string).collect();
        if terms.is_empty() {
            return Err(IndexError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }
        Ok(Self {
            terms,
            match_mode: options.match_mode,
            type_filter: options.type_filter,
            exact: options.exact,
        })
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        if !self.type_filter.matches(entry.is_dir) {
            return false;
        }
        match self.match_mode {
            MatchMode::Name => self.matches_text(&entry.name_lower),
            MatchMode::Path => self.matches_text(&entry.relative_path.to_lowercase()),
        }
    }

    fn matches_text(&self, haystack: &str) -> bool {
        if self.exact {
            self.terms.iter().all(|term| contains_word(haystack, term))
        } else {
            self.terms.iter().all(|term| haystack.contains(term.as_str()))
        }
    }
}

/// Characters that delimit a whole word.
fn is_word_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | '_' | '-' | '/' | '\\')
}

/// Whether `term` occurs in `haystack` delimited on both sides by a word
/// boundary or the edge of the string.
fn contains_word(haystack: &str, term: &str) -> bool {
    let mut from = 0;
    while let Some(offset) = haystack[from..].find(term) {
        let start = from + offset;
        let end = start + term.len();
        let open = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, is_word_boundary);
        let close = haystack[end..].chars().next().map_or(true, is_word_boundary);
        if open && close {
            return true;
        }
        // Retry one character further; occurrences may overlap.
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}
