//! Pattern matching implementation.

use std::fmt;

use regex::Regex;

use crate::crypto::KeyMaterial;
use crate::error::PatternError;

/// Result of testing one candidate against a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchResult {
    /// The authorized key text matched
    pub matched_authorized_key: bool,
    /// The fingerprint matched
    pub matched_fingerprint: bool,
    /// Fingerprint match followed by authorized key match
    pub match_string: String,
}

impl MatchResult {
    #[inline]
    pub fn is_match(&self) -> bool {
        self.matched_authorized_key || self.matched_fingerprint
    }
}

/// A compiled regular expression together with its source text.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles `text` into a pattern.
    pub fn compile(text: &str) -> Result<Self, PatternError> {
        let regex = Regex::new(text).map_err(|source| PatternError::Compile {
            pattern: text.to_string(),
            source,
        })?;

        Ok(Self {
            source: text.to_string(),
            regex,
        })
    }

    /// Returns the source text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Tests `candidate`, returning the leftmost matching substring.
    #[inline]
    pub fn test<'a>(&self, candidate: &'a str) -> Option<&'a str> {
        self.regex.find(candidate).map(|m| m.as_str())
    }

    /// Tests the fingerprint and authorized key text of `key` independently.
    pub fn match_key(&self, key: &KeyMaterial) -> MatchResult {
        let fingerprint = self.test(&key.fingerprint);
        let authorized = self.test(&key.authorized_key);

        let mut match_string = String::new();
        match_string.push_str(fingerprint.unwrap_or_default());
        match_string.push_str(authorized.unwrap_or_default());

        MatchResult {
            matched_authorized_key: authorized.is_some(),
            matched_fingerprint: fingerprint.is_some(),
            match_string,
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({})", self.source)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
