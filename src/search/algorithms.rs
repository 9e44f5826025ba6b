//! Line matching: literal substring search and regular expressions
use crate::error::{LogSearchError, Result};
use memchr::memmem;
use regex::Regex;
use std::fmt;

/// How the request's pattern should be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    #[default]
    Literal,
    Regex,
}

/// A compiled pattern, decided once when the request is accepted.
#[derive(Clone)]
pub enum SearchCriteria {
    Literal(memmem::Finder<'static>),
    Regex(Regex),
}

impl SearchCriteria {
    pub fn new(pattern: &str, mode: MatchMode) -> Result<Self> {
        match mode {
            MatchMode::Literal => Ok(Self::literal(pattern)),
            MatchMode::Regex => Self::regex(pattern),
        }
    }

    pub fn literal(pattern: &str) -> Self {
        SearchCriteria::Literal(memmem::Finder::new(pattern.as_bytes()).into_owned())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(SearchCriteria::Regex)
            .map_err(|source| LogSearchError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// True when the pattern occurs anywhere in `line`.
    ///
    /// An empty literal matches every line.
    pub fn is_match(&self, line: &str) -> bool {
        match self {
            SearchCriteria::Literal(finder) => {
                finder.needle().is_empty() || finder.find(line.as_bytes()).is_some()
            }
            SearchCriteria::Regex(regex) => regex.is_match(line),
        }
    }

    pub fn mode(&self) -> MatchMode {
        match self {
            SearchCriteria::Literal(_) => MatchMode::Literal,
            SearchCriteria::Regex(_) => MatchMode::Regex,
        }
    }
}

impl fmt::Debug for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchCriteria::Literal(finder) => f
                .debug_tuple("Literal")
                .field(&String::from_utf8_lossy(finder.needle()))
                .finish(),
            SearchCriteria::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_anywhere_in_line() {
        let criteria = SearchCriteria::literal("ERROR");
        assert!(criteria.is_match("2024-01-01 00:00:00 ERROR disk full"));
        assert!(criteria.is_match("ERROR at the start"));
        assert!(!criteria.is_match("2024-01-01 00:00:00 INFO fine"));
        assert!(!criteria.is_match("error is case sensitive"));
    }

    #[test]
    fn test_empty_literal_matches_everything() {
        let criteria = SearchCriteria::literal("");
        assert!(criteria.is_match(""));
        assert!(criteria.is_match("2024-01-01 00:00:00 anything"));
    }

    #[test]
    fn test_literal_is_not_a_regex() {
        let criteria = SearchCriteria::literal("a.c");
        assert!(criteria.is_match("xa.cx"));
        assert!(!criteria.is_match("abc"));
    }

    #[test]
    fn test_regex_mode() {
        let criteria = SearchCriteria::new(r"user=\d+", MatchMode::Regex).unwrap();
        assert_eq!(criteria.mode(), MatchMode::Regex);
        assert!(criteria.is_match("2024-01-01 00:00:00 login user=42"));
        assert!(!criteria.is_match("2024-01-01 00:00:00 login user=bob"));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let err = SearchCriteria::new("(unclosed", MatchMode::Regex).unwrap_err();
        assert!(matches!(err, LogSearchError::InvalidPattern { .. }));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_invalid_regex_text_is_fine_as_literal() {
        let criteria = SearchCriteria::new("(unclosed", MatchMode::Literal).unwrap();
        assert!(criteria.is_match("x (unclosed y"));
    }
}
