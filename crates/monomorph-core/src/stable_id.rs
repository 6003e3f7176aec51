//! Opaque identity tokens.
//!
//! This module provides the identifiers that survive renames of a declaration
//! ([`StableId`]) and the identifiers the host's asset index hands out for
//! generated artifacts ([`ArtifactId`]).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity token of a declaration that is stable across renames.
///
/// The token is opaque. An empty token means the identity is not known yet
/// (for example the declaration was renamed before its identifier attribute
/// was recompiled), and two empty tokens never count as the same identity.
///
/// # Example
///
/// ```
/// use monomorph_core::StableId;
///
/// let id = StableId::new("5e1c0b2a");
/// assert!(!id.is_empty());
/// assert!(StableId::unknown().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(String);

impl StableId {
    /// Create a stable id from a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The "not assigned yet" id.
    pub fn unknown() -> Self {
        Self(String::new())
    }

    /// Check whether the id is unknown.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the underlying token.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for StableId {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for StableId {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Identity of a generated artifact in the host's asset index.
///
/// This is a weak reference: the artifact may have been deleted externally
/// while the registry still holds the id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Create an artifact id from a token minted by the asset importer.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the underlying token.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_is_empty() {
        assert!(StableId::unknown().is_empty());
        assert!(StableId::default().is_empty());
        assert!(!StableId::new("g1").is_empty());
    }

    #[test]
    fn stable_id_display() {
        assert_eq!(StableId::new("g1").to_string(), "g1");
        assert_eq!(StableId::unknown().to_string(), "<unknown>");
    }

    #[test]
    fn artifact_id_equality() {
        let a = ArtifactId::new("a1");
        let b = ArtifactId::from("a1");
        let c = ArtifactId::new("a2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "a1");
    }
}
