//! Pairing new declarations with unmatched prior records.
//!
//! A new entry matches an old one when the two-tier identity match holds, or
//! when the rename heuristic does: the new entry has no stable id, the old
//! one has, and resolving the old id against the live declarations yields
//! the new entry's name. The heuristic covers the window where a declaration
//! was renamed but its id has not been recompiled into it yet.
//!
//! When several old entries could pair with one new entry, [`MatchPolicy`]
//! decides which one wins.

use serde::{Deserialize, Serialize};

use monomorph_core::{MatchKind, TypeIdentity};

use crate::scanner::DeclarationSource;

/// Policy for choosing among several candidate prior records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// The first candidate in registry order wins, whatever kind of match.
    #[default]
    FirstMatch,
    /// A stable-id match anywhere in the pool beats a name match, which
    /// beats the rename heuristic.
    IdentityFirst,
    /// Like `IdentityFirst`, but a name or heuristic match with more than
    /// one candidate is refused.
    RequireUnique,
}

/// Why two entries were paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchReason {
    Identity,
    Name,
    /// The old stable id resolves to the new entry's name.
    ResolvedById,
}

impl From<MatchKind> for MatchReason {
    fn from(kind: MatchKind) -> Self {
        match kind {
            MatchKind::Identity => MatchReason::Identity,
            MatchKind::Name => MatchReason::Name,
        }
    }
}

/// Result of searching the pool for one new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched { index: usize, reason: MatchReason },
    /// Refused under [`MatchPolicy::RequireUnique`].
    Ambiguous { candidates: usize },
    Unmatched,
}

/// Whether the rename heuristic pairs `old` with `new`.
pub fn resolves_to(old: &TypeIdentity, new: &TypeIdentity, source: &dyn DeclarationSource) -> bool {
    new.stable_id.is_empty()
        && !old.stable_id.is_empty()
        && !old.same_name(new)
        && source
            .resolve_by_id(&old.stable_id)
            .is_some_and(|live| live.identity.name == new.name)
}

fn reason(old: &TypeIdentity, new: &TypeIdentity, source: &dyn DeclarationSource) -> Option<MatchReason> {
    old.matches(new)
        .map(MatchReason::from)
        .or_else(|| resolves_to(old, new, source).then_some(MatchReason::ResolvedById))
}

/// Search `pool` for the prior record that pairs with `new`.
pub fn find_match<T>(
    pool: &[T],
    identity_of: impl Fn(&T) -> &TypeIdentity,
    new: &TypeIdentity,
    source: &dyn DeclarationSource,
    policy: MatchPolicy,
) -> MatchOutcome {
    let matched = |index, reason| MatchOutcome::Matched { index, reason };

    if policy == MatchPolicy::FirstMatch {
        return pool
            .iter()
            .enumerate()
            .find_map(|(i, old)| reason(identity_of(old), new, source).map(|r| matched(i, r)))
            .unwrap_or(MatchOutcome::Unmatched);
    }

    if let Some(i) = pool.iter().position(|old| identity_of(old).same_identity(new)) {
        return matched(i, MatchReason::Identity);
    }

    let by_name: Vec<usize> = pool
        .iter()
        .enumerate()
        .filter(|(_, old)| identity_of(old).matches(new) == Some(MatchKind::Name))
        .map(|(i, _)| i)
        .collect();
    if let Some(outcome) = pick(&by_name, MatchReason::Name, policy) {
        return outcome;
    }

    let by_id: Vec<usize> = pool
        .iter()
        .enumerate()
        .filter(|(_, old)| resolves_to(identity_of(old), new, source))
        .map(|(i, _)| i)
        .collect();
    pick(&by_id, MatchReason::ResolvedById, policy).unwrap_or(MatchOutcome::Unmatched)
}

fn pick(candidates: &[usize], reason: MatchReason, policy: MatchPolicy) -> Option<MatchOutcome> {
    match candidates {
        [] => None,
        [index] => Some(MatchOutcome::Matched {
            index: *index,
            reason,
        }),
        [first, ..] if policy != MatchPolicy::RequireUnique => Some(MatchOutcome::Matched {
            index: *first,
            reason,
        }),
        _ => Some(MatchOutcome::Ambiguous {
            candidates: candidates.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::DeclarationSet;
    use monomorph_core::{QualifiedName, TemplateKind};

    fn pool(entries: &[(&str, &str)]) -> Vec<TypeIdentity> {
        entries
            .iter()
            .map(|(id, name)| TypeIdentity::new(*id, *name))
            .collect()
    }

    fn search(pool: &[TypeIdentity], new: &TypeIdentity, source: &DeclarationSet, policy: MatchPolicy) -> MatchOutcome {
        find_match(pool, |t| t, new, source, policy)
    }

    #[test]
    fn first_match_takes_registry_order() {
        let old = pool(&[("", "Box"), ("g1", "Crate")]);
        let new = TypeIdentity::new("g1", "Box");
        let source = DeclarationSet::new();
        // The name match comes first and wins under FirstMatch.
        assert_eq!(
            search(&old, &new, &source, MatchPolicy::FirstMatch),
            MatchOutcome::Matched {
                index: 0,
                reason: MatchReason::Name
            }
        );
        // IdentityFirst prefers the id match further down.
        assert_eq!(
            search(&old, &new, &source, MatchPolicy::IdentityFirst),
            MatchOutcome::Matched {
                index: 1,
                reason: MatchReason::Identity
            }
        );
    }

    #[test]
    fn require_unique_refuses_ambiguous_name_match() {
        let old = pool(&[("", "Box"), ("g7", "Box")]);
        let new = TypeIdentity::unidentified("Box");
        let source = DeclarationSet::new();
        assert_eq!(
            search(&old, &new, &source, MatchPolicy::RequireUnique),
            MatchOutcome::Ambiguous { candidates: 2 }
        );
        assert_eq!(
            search(&old, &new, &source, MatchPolicy::IdentityFirst),
            MatchOutcome::Matched {
                index: 0,
                reason: MatchReason::Name
            }
        );
    }

    #[test]
    fn different_ids_never_match() {
        let old = pool(&[("g1", "Box")]);
        let new = TypeIdentity::new("g2", "Box");
        let source = DeclarationSet::new();
        for policy in [MatchPolicy::FirstMatch, MatchPolicy::IdentityFirst, MatchPolicy::RequireUnique] {
            assert_eq!(search(&old, &new, &source, policy), MatchOutcome::Unmatched);
        }
    }

    #[test]
    fn heuristic_resolves_old_id() {
        let mut source = DeclarationSet::new();
        source.add_template(TemplateKind::Asset, TypeIdentity::new("g1", "Container`1"), &["T"]);
        let old = pool(&[("g1", "Box`1")]);
        let new = TypeIdentity::unidentified("Container`1");
        assert_eq!(
            search(&old, &new, &source, MatchPolicy::FirstMatch),
            MatchOutcome::Matched {
                index: 0,
                reason: MatchReason::ResolvedById
            }
        );

        // The old id resolving to some other name is not a match.
        let other = TypeIdentity::unidentified(QualifiedName::from("Other`1"));
        assert_eq!(
            search(&old, &other, &source, MatchPolicy::FirstMatch),
            MatchOutcome::Unmatched
        );
    }
}
