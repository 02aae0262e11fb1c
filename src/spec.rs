//! Validation and segmentation of the user-supplied spec string.

use crate::error::ResolveError;

/// True for characters allowed anywhere in a spec.
pub fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '/'
}

/// True when every character of `s` is in the safe set.
pub fn is_safe(s: &str) -> bool {
    s.chars().all(is_safe_char)
}

/// A validated spec: its non-empty `/`-separated segments, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spec {
    raw: String,
    segments: Vec<String>,
}

impl Spec {
    /// Check the charset, then split on `/` discarding empty segments.
    ///
    /// Nothing else may touch the filesystem before this has succeeded.
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        if !is_safe(raw) {
            return Err(ResolveError::InvalidSpecCharacters {
                spec: raw.to_string(),
            });
        }
        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}
