//! Reconciliation output: lifecycle edits and the pass report.

use std::fmt;

use rustc_hash::FxHashSet;

use monomorph_core::{ArtifactId, QualifiedName};
use monomorph_registry::{ArgList, Registry, TemplateId};

use crate::state::DeclarationState;

/// The registry record an artifact belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactTarget {
    /// A template's selector artifact.
    Selector(TemplateId),
    /// One concrete instantiation.
    Instantiation(TemplateId, ArgList),
}

impl ArtifactTarget {
    pub fn template(&self) -> TemplateId {
        match self {
            ArtifactTarget::Selector(t) | ArtifactTarget::Instantiation(t, _) => *t,
        }
    }

    /// Whether the record this target points at is still in the registry.
    pub fn exists_in(&self, registry: &Registry) -> bool {
        match self {
            ArtifactTarget::Selector(t) => registry
                .template(*t)
                .is_some_and(|record| record.kind.has_selector()),
            ArtifactTarget::Instantiation(t, args) => registry.instantiation(*t, args).is_some(),
        }
    }
}

impl fmt::Display for ArtifactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactTarget::Selector(t) => write!(f, "selector of {t}"),
            ArtifactTarget::Instantiation(t, args) => {
                write!(f, "{t}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
        }
    }
}

/// One operation against the artifact store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEdit {
    /// Generate and import a new artifact for the target.
    Create(ArtifactTarget),
    /// Regenerate the target's artifact under its recomputed name, keeping
    /// the artifact identity.
    Replace {
        target: ArtifactTarget,
        artifact: ArtifactId,
    },
    /// Delete an artifact whose registry record is already gone.
    Delete(ArtifactId),
}

impl LifecycleEdit {
    /// Application phase: removals, then updates, then additions.
    fn phase(&self) -> u8 {
        match self {
            LifecycleEdit::Delete(_) => 0,
            LifecycleEdit::Replace { .. } => 1,
            LifecycleEdit::Create(_) => 2,
        }
    }

    pub fn target(&self) -> Option<&ArtifactTarget> {
        match self {
            LifecycleEdit::Create(target) | LifecycleEdit::Replace { target, .. } => Some(target),
            LifecycleEdit::Delete(_) => None,
        }
    }
}

/// A template's state change during one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub template: QualifiedName,
    pub from: DeclarationState,
    pub to: DeclarationState,
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub templates_added: usize,
    pub templates_removed: usize,
    pub templates_renamed: usize,
    pub stable_ids_updated: usize,
    /// Templates whose parameter display names changed.
    pub parameters_updated: usize,
    pub arguments_renamed: usize,
    /// Arguments whose stable id was assigned or changed without a rename.
    pub arguments_reassigned: usize,
    pub arguments_removed: usize,
    /// Instantiations removed by template or argument removal.
    pub instantiations_removed: usize,
    /// Artifacts flagged missing on a previous pass and scheduled again.
    pub regenerations: usize,
    /// Name-only matches refused because they were ambiguous.
    pub ambiguous_matches: usize,
    pub transitions: Vec<StateTransition>,
}

impl ReconcileReport {
    /// Whether any structural change occurred.
    ///
    /// Cosmetic changes such as parameter renames count: consumers still
    /// need to refresh.
    pub fn changed(&self) -> bool {
        self.templates_added
            + self.templates_removed
            + self.templates_renamed
            + self.stable_ids_updated
            + self.parameters_updated
            + self.arguments_renamed
            + self.arguments_reassigned
            + self.arguments_removed
            + self.instantiations_removed
            > 0
    }

    pub(crate) fn transition(&mut self, template: &QualifiedName, from: DeclarationState, to: DeclarationState) {
        tracing::trace!(template = %template, %from, %to, "state transition");
        self.transitions.push(StateTransition {
            template: template.clone(),
            from,
            to,
        });
    }
}

/// Ordered edits for the lifecycle coordinator plus the pass report.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    pub edits: Vec<LifecycleEdit>,
    pub report: ReconcileReport,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && !self.report.changed()
    }

    pub(crate) fn push(&mut self, edit: LifecycleEdit) {
        tracing::debug!(?edit, "planned lifecycle edit");
        self.edits.push(edit);
    }

    /// Put edits in application order and drop the redundant ones.
    ///
    /// - edits whose target record no longer exists are dropped
    /// - a target gets at most one edit; `Create` wins over `Replace`
    /// - `Delete`s come first, then `Replace`s, then `Create`s
    pub(crate) fn normalize(&mut self, registry: &Registry) {
        let created: FxHashSet<ArtifactTarget> = self
            .edits
            .iter()
            .filter_map(|edit| match edit {
                LifecycleEdit::Create(target) => Some(target.clone()),
                _ => None,
            })
            .collect();

        let mut seen: FxHashSet<ArtifactTarget> = FxHashSet::default();
        let mut deleted: FxHashSet<ArtifactId> = FxHashSet::default();
        self.edits.retain(|edit| match edit {
            LifecycleEdit::Delete(artifact) => deleted.insert(artifact.clone()),
            LifecycleEdit::Replace { target, .. } => {
                target.exists_in(registry) && !created.contains(target) && seen.insert(target.clone())
            }
            LifecycleEdit::Create(target) => target.exists_in(registry) && seen.insert(target.clone()),
        });
        self.edits.sort_by_key(LifecycleEdit::phase);
    }
}
