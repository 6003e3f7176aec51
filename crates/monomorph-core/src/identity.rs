//! Two-tier identity used by reconciliation.
//!
//! Stable-id equality is authoritative. Qualified-name equality is the fallback
//! used only when stable ids cannot decide, i.e. when at least one side has no
//! stable id yet. This is what lets a rename without a recompiled id, and a
//! recompiled id without a rename, both be matched to their previous record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{QualifiedName, StableId};

/// How two identities matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// Both stable ids are present and equal.
    Identity,
    /// Stable ids could not decide and the qualified names are equal.
    Name,
}

/// Stable id + qualified name of a template or argument type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TypeIdentity {
    pub stable_id: StableId,
    pub name: QualifiedName,
}

impl TypeIdentity {
    /// Create an identity.
    pub fn new(stable_id: impl Into<StableId>, name: impl Into<QualifiedName>) -> Self {
        Self {
            stable_id: stable_id.into(),
            name: name.into(),
        }
    }

    /// Create an identity whose stable id is not known yet.
    pub fn unidentified(name: impl Into<QualifiedName>) -> Self {
        Self {
            stable_id: StableId::unknown(),
            name: name.into(),
        }
    }

    /// Both stable ids are non-empty and equal.
    pub fn same_identity(&self, other: &TypeIdentity) -> bool {
        !self.stable_id.is_empty() && self.stable_id == other.stable_id
    }

    /// Qualified names (module included) are equal.
    pub fn same_name(&self, other: &TypeIdentity) -> bool {
        self.name == other.name
    }

    /// Whether stable ids are able to decide the match on their own.
    pub fn ids_decide(&self, other: &TypeIdentity) -> bool {
        !self.stable_id.is_empty() && !other.stable_id.is_empty()
    }

    /// Two-tier match.
    ///
    /// Two records with different non-empty stable ids never match, even when
    /// their names are equal.
    pub fn matches(&self, other: &TypeIdentity) -> Option<MatchKind> {
        if self.same_identity(other) {
            Some(MatchKind::Identity)
        } else if !self.ids_decide(other) && self.same_name(other) {
            Some(MatchKind::Name)
        } else {
            None
        }
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.stable_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_wins_over_name() {
        let old = TypeIdentity::new("g1", "Box");
        let renamed = TypeIdentity::new("g1", "Container");
        assert_eq!(old.matches(&renamed), Some(MatchKind::Identity));
        assert!(!old.same_name(&renamed));
    }

    #[test]
    fn name_fallback_when_one_id_is_empty() {
        let old = TypeIdentity::unidentified("Box");
        let assigned = TypeIdentity::new("g1", "Box");
        assert_eq!(old.matches(&assigned), Some(MatchKind::Name));
        assert_eq!(assigned.matches(&old), Some(MatchKind::Name));
    }

    #[test]
    fn empty_ids_are_never_the_same_identity() {
        let a = TypeIdentity::unidentified("Box");
        let b = TypeIdentity::unidentified("Box");
        assert!(!a.same_identity(&b));
        assert_eq!(a.matches(&b), Some(MatchKind::Name));
    }

    #[test]
    fn different_ids_do_not_fall_back_to_name() {
        let a = TypeIdentity::new("g1", "Box");
        let b = TypeIdentity::new("g2", "Box");
        assert_eq!(a.matches(&b), None);
    }

    #[test]
    fn unrelated_identities_do_not_match() {
        let a = TypeIdentity::unidentified("Box");
        let b = TypeIdentity::new("g2", "Crate");
        assert_eq!(a.matches(&b), None);
    }
}
