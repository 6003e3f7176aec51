//! Template set difference.
//!
//! Computes the changes between the templates of one [`TemplateKind`] stored
//! in the registry and the ones the scanner reports now. Entries equal on
//! every field are left untouched. The remaining new entries are paired with
//! the remaining old ones through [`find_match`]; whatever is left over on
//! either side is a pure addition or a pure removal.

use bitflags::bitflags;
use rustc_hash::FxHashSet;

use monomorph_core::{DeclarationInfo, TemplateKind, TypeIdentity};
use monomorph_registry::{Registry, TemplateId, TemplateRecord};

use crate::matching::{MatchOutcome, MatchPolicy, MatchReason, find_match};
use crate::scanner::DeclarationSource;

bitflags! {
    /// Which parts of a matched template differ from the stored record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IdentityDelta: u8 {
        /// Qualified name or module changed.
        const NAME = 1 << 0;
        /// Stable id assigned or changed.
        const STABLE_ID = 1 << 1;
        /// Parameter display names changed.
        const PARAMETERS = 1 << 2;
    }
}

impl IdentityDelta {
    pub fn between(
        old: &TemplateRecord,
        identity: &TypeIdentity,
        parameter_names: &[String],
    ) -> Self {
        let mut delta = IdentityDelta::empty();
        if old.identity.name != identity.name {
            delta |= IdentityDelta::NAME;
        }
        if old.identity.stable_id != identity.stable_id {
            delta |= IdentityDelta::STABLE_ID;
        }
        if old.parameter_names != parameter_names {
            delta |= IdentityDelta::PARAMETERS;
        }
        delta
    }

    /// Whether dependent artifacts must be regenerated under new content or
    /// a new name. A bare stable-id update touches the registry only.
    #[inline]
    pub fn regenerates(self) -> bool {
        self.intersects(IdentityDelta::NAME | IdentityDelta::PARAMETERS)
    }
}

/// One change to apply to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateChange {
    Added(DeclarationInfo),
    Removed(TemplateId),
    Updated {
        id: TemplateId,
        identity: TypeIdentity,
        parameter_names: Vec<String>,
        delta: IdentityDelta,
        reason: MatchReason,
    },
}

/// Changes for one template kind.
#[derive(Debug, Clone, Default)]
pub struct TemplateDiff {
    pub changes: Vec<TemplateChange>,
    /// Name matches refused by [`MatchPolicy::RequireUnique`].
    pub ambiguous: usize,
}

impl TemplateDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// The identity a matched record is updated to.
///
/// A new entry with no stable id never erases a stored one.
fn merged_identity(old: &TypeIdentity, new: &TypeIdentity) -> TypeIdentity {
    TypeIdentity {
        stable_id: if new.stable_id.is_empty() {
            old.stable_id.clone()
        } else {
            new.stable_id.clone()
        },
        name: new.name.clone(),
    }
}

/// Diff the stored templates of `kind` against the live declarations.
pub fn diff_templates(
    registry: &Registry,
    kind: TemplateKind,
    live: impl IntoIterator<Item = DeclarationInfo>,
    source: &dyn DeclarationSource,
    policy: MatchPolicy,
) -> TemplateDiff {
    let old: Vec<(TemplateId, &TemplateRecord)> = registry.templates_of_kind(kind).collect();

    let mut seen = FxHashSet::default();
    let live: Vec<DeclarationInfo> = live
        .into_iter()
        .filter(|decl| seen.insert(decl.clone()))
        .collect();

    let mut diff = TemplateDiff::default();

    // Fast paths.
    match (old.is_empty(), live.is_empty()) {
        (true, true) => return diff,
        (true, false) => {
            diff.changes = live.into_iter().map(TemplateChange::Added).collect();
            return diff;
        }
        (false, true) => {
            diff.changes = old
                .into_iter()
                .map(|(id, _)| TemplateChange::Removed(id))
                .collect();
            return diff;
        }
        (false, false) => {}
    }

    let live_keys: FxHashSet<(&TypeIdentity, &[String])> = live
        .iter()
        .map(|decl| (&decl.identity, decl.parameter_names.as_slice()))
        .collect();
    let old_keys: FxHashSet<(&TypeIdentity, &[String])> = old
        .iter()
        .map(|(_, record)| (&record.identity, record.parameter_names.as_slice()))
        .collect();

    let (unchanged, mut pool): (Vec<_>, Vec<_>) = old.iter().copied().partition(|(_, record)| {
        live_keys.contains(&(&record.identity, record.parameter_names.as_slice()))
    });

    for decl in live
        .iter()
        .filter(|decl| !old_keys.contains(&(&decl.identity, decl.parameter_names.as_slice())))
    {
        match find_match(&pool, |(_, record)| &record.identity, &decl.identity, source, policy) {
            MatchOutcome::Matched { index, reason } => {
                let (id, record) = pool.remove(index);
                if record.arity() != decl.arity() {
                    tracing::debug!(
                        template = %decl.identity.name,
                        from = record.arity(),
                        to = decl.arity(),
                        "arity changed, replacing template"
                    );
                    diff.changes.push(TemplateChange::Removed(id));
                    diff.changes.push(TemplateChange::Added(decl.clone()));
                    continue;
                }
                let identity = merged_identity(&record.identity, &decl.identity);
                let delta = IdentityDelta::between(record, &identity, &decl.parameter_names);
                if delta.is_empty() {
                    continue;
                }
                diff.changes.push(TemplateChange::Updated {
                    id,
                    identity,
                    parameter_names: decl.parameter_names.clone(),
                    delta,
                    reason,
                });
            }
            outcome => {
                if let MatchOutcome::Ambiguous { candidates } = outcome {
                    tracing::warn!(
                        template = %decl.identity.name,
                        candidates,
                        "ambiguous name match refused, treating as removal and addition"
                    );
                    diff.ambiguous += 1;
                }
                let duplicate = unchanged
                    .iter()
                    .any(|(_, record)| record.identity.matches(&decl.identity).is_some());
                if duplicate {
                    tracing::warn!(
                        template = %decl.identity.name,
                        "declaration duplicates an unchanged template, skipping"
                    );
                    continue;
                }
                diff.changes.push(TemplateChange::Added(decl.clone()));
            }
        }
    }

    diff.changes
        .extend(pool.into_iter().map(|(id, _)| TemplateChange::Removed(id)));
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::DeclarationSet;
    use monomorph_core::QualifiedName;

    fn registry(entries: &[(&str, &str, &[&str])]) -> Registry {
        let mut registry = Registry::new();
        for (id, name, params) in entries {
            registry
                .add_template(TemplateRecord::new(
                    TypeIdentity::new(*id, *name),
                    TemplateKind::Asset,
                    params.iter().map(|p| p.to_string()).collect(),
                ))
                .unwrap();
        }
        registry
    }

    fn decl(id: &str, name: &str, params: &[&str]) -> DeclarationInfo {
        DeclarationInfo::template(
            TypeIdentity::new(id, name),
            params.iter().map(|p| p.to_string()).collect(),
        )
    }

    fn diff(registry: &Registry, live: Vec<DeclarationInfo>) -> TemplateDiff {
        diff_templates(
            registry,
            TemplateKind::Asset,
            live,
            &DeclarationSet::new(),
            MatchPolicy::FirstMatch,
        )
    }

    #[test]
    fn unchanged_entries_produce_nothing() {
        let registry = registry(&[("g1", "Box`1", &["T"]), ("g2", "Map`2", &["K", "V"])]);
        let result = diff(
            &registry,
            vec![decl("g2", "Map`2", &["K", "V"]), decl("g1", "Box`1", &["T"])],
        );
        assert!(result.is_empty());
    }

    #[test]
    fn fast_paths() {
        let empty = Registry::new();
        let added = diff(&empty, vec![decl("g1", "Box`1", &["T"])]);
        assert!(matches!(added.changes.as_slice(), [TemplateChange::Added(_)]));

        let full = registry(&[("g1", "Box`1", &["T"])]);
        let removed = diff(&full, Vec::new());
        assert!(matches!(removed.changes.as_slice(), [TemplateChange::Removed(_)]));

        assert!(diff(&empty, Vec::new()).is_empty());
    }

    #[test]
    fn rename_keeps_the_record() {
        let registry = registry(&[("g1", "Box`1", &["T"])]);
        let result = diff(&registry, vec![decl("g1", "Container`1", &["T"])]);
        match result.changes.as_slice() {
            [TemplateChange::Updated { delta, reason, identity, .. }] => {
                assert_eq!(*delta, IdentityDelta::NAME);
                assert_eq!(*reason, MatchReason::Identity);
                assert_eq!(identity.name, QualifiedName::from("Container`1"));
            }
            other => panic!("unexpected changes: {other:?}"),
        }
    }

    #[test]
    fn id_assignment_with_parameter_rename() {
        let registry = registry(&[("", "Box`1", &["T"])]);
        let result = diff(&registry, vec![decl("g1", "Box`1", &["TItem"])]);
        match result.changes.as_slice() {
            [TemplateChange::Updated { delta, .. }] => {
                assert_eq!(*delta, IdentityDelta::STABLE_ID | IdentityDelta::PARAMETERS);
                assert!(delta.regenerates());
            }
            other => panic!("unexpected changes: {other:?}"),
        }
    }

    #[test]
    fn missing_new_id_does_not_erase_stored_one() {
        let registry = registry(&[("g1", "Box`1", &["T"])]);
        let result = diff(&registry, vec![decl("", "Box`1", &["T"])]);
        assert!(result.is_empty());
    }

    #[test]
    fn consumed_entries_match_only_once() {
        // Two old entries sharing a name, one unidentified new entry.
        let registry = registry(&[("g1", "Box`1", &["T"]), ("g2", "Box`1", &["U"])]);
        let result = diff(&registry, vec![decl("", "Box`1", &["V"])]);
        let updated = result
            .changes
            .iter()
            .filter(|c| matches!(c, TemplateChange::Updated { .. }))
            .count();
        let removed = result
            .changes
            .iter()
            .filter(|c| matches!(c, TemplateChange::Removed(_)))
            .count();
        assert_eq!((updated, removed), (1, 1));
    }

    #[test]
    fn unmatched_entries_are_additions_and_removals() {
        let registry = registry(&[("g1", "Box`1", &["T"])]);
        let result = diff(&registry, vec![decl("g2", "Crate`1", &["T"])]);
        assert_eq!(result.changes.len(), 2);
        assert!(matches!(result.changes[0], TemplateChange::Added(_)));
        assert!(matches!(result.changes[1], TemplateChange::Removed(_)));
    }

    #[test]
    fn arity_change_replaces_the_template() {
        let registry = registry(&[("g1", "Box`1", &["T"])]);
        let result = diff(&registry, vec![decl("g1", "Box`2", &["T", "U"])]);
        assert!(matches!(
            result.changes.as_slice(),
            [TemplateChange::Removed(_), TemplateChange::Added(_)]
        ));
    }

    #[test]
    fn require_unique_turns_ambiguity_into_remove_and_add() {
        let registry = registry(&[("g1", "Box`1", &["T"]), ("g2", "Box`1", &["U"])]);
        let result = diff_templates(
            &registry,
            TemplateKind::Asset,
            vec![decl("", "Box`1", &["V"])],
            &DeclarationSet::new(),
            MatchPolicy::RequireUnique,
        );
        assert_eq!(result.ambiguous, 1);
        assert_eq!(result.changes.len(), 3);
    }
}
