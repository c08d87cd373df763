use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{MatchMode, ScanRequest, TokenSplit};

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("valid token regex"));

/// Compares lines against the scan keyword
#[derive(Debug, Clone)]
pub struct LineMatcher {
    keyword: String,
    mode: MatchMode,
    split: TokenSplit,
    case_sensitive: bool,
}

impl LineMatcher {
    /// Creates a matcher for `keyword` with the given semantics
    pub fn new(keyword: &str, mode: MatchMode, split: TokenSplit, case_sensitive: bool) -> Self {
        let keyword = match mode {
            MatchMode::Exact => keyword.trim(),
            _ => keyword,
        };
        Self {
            keyword: normalize(keyword, case_sensitive),
            mode,
            split,
            case_sensitive,
        }
    }

    /// Matcher for the primary keyword of a request
    pub fn from_request(request: &ScanRequest) -> Self {
        Self::new(
            &request.keyword,
            request.match_mode,
            request.token_split,
            request.case_sensitive,
        )
    }

    /// Matcher for a secondary keyword sharing the request's semantics
    pub fn with_keyword(&self, keyword: &str) -> Self {
        Self::new(keyword, self.mode, self.split, self.case_sensitive)
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Tests a single line (without its line terminator)
    pub fn is_match(&self, line: &str) -> bool {
        if self.keyword.is_empty() {
            return false;
        }
        let line = normalize(line, self.case_sensitive);
        match self.mode {
            MatchMode::Substring => line.contains(self.keyword.as_str()),
            MatchMode::Exact => line.trim() == self.keyword,
            MatchMode::Token => self.tokens(&line).any(|token| token == self.keyword),
        }
    }

    /// Tests a multi-line context window as one text.
    ///
    /// Exact mode compares the whole trimmed window; token mode splits across line breaks.
    pub fn window_matches(&self, window: &str) -> bool {
        self.is_match(window)
    }

    fn tokens<'a>(&self, line: &'a str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        match self.split {
            TokenSplit::Whitespace => Box::new(line.split_whitespace()),
            TokenSplit::NonWord => Box::new(NON_WORD.split(line).filter(|t| !t.is_empty())),
        }
    }
}

fn normalize(text: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    }
}
