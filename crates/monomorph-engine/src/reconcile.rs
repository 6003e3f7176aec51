//! Reconciliation pass.
//!
//! ## Pass order
//!
//! ```text
//! 1. regeneration   records flagged missing on the previous pass -> Create
//! 2. arguments      renames cascade Replace, vanished ones cascade Delete
//! 3. templates      per kind: removals, then updates, then additions
//! 4. normalize      drop redundant edits, order Delete < Replace < Create
//! ```
//!
//! The registry is mutated in place while the pass runs. Artifact ids are
//! filled in afterwards by the lifecycle coordinator.

use thiserror::Error;

use monomorph_core::{ArtifactError, DeclarationInfo, RegistryError, TemplateKind, TypeIdentity};
use monomorph_registry::{Registry, TemplateId, TemplateRecord};

use crate::arguments::reconcile_arguments;
use crate::diff::{IdentityDelta, TemplateChange, diff_templates};
use crate::matching::MatchPolicy;
use crate::plan::{ArtifactTarget, LifecycleEdit, ReconcilePlan};
use crate::scanner::DeclarationSource;
use crate::state::{DeclarationEvent, DeclarationState};

/// Errors that abort a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub match_policy: MatchPolicy,
}

/// Diffs the registry against the live declarations.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(options: ReconcileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Run one pass, updating `registry` and returning the edits to apply.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn reconcile(
        &self,
        registry: &mut Registry,
        source: &dyn DeclarationSource,
    ) -> Result<ReconcilePlan, ReconcileError> {
        let mut plan = ReconcilePlan::default();

        schedule_regenerations(registry, &mut plan);
        reconcile_arguments(registry, source, &mut plan)?;

        for kind in TemplateKind::ALL {
            let diff = diff_templates(
                registry,
                kind,
                source.scan_templates(kind),
                source,
                self.options.match_policy,
            );
            plan.report.ambiguous_matches += diff.ambiguous;
            apply_changes(registry, kind, diff.changes, &mut plan)?;
        }

        plan.normalize(registry);

        let report = &plan.report;
        tracing::info!(
            added = report.templates_added,
            removed = report.templates_removed,
            renamed = report.templates_renamed,
            arguments_renamed = report.arguments_renamed,
            arguments_removed = report.arguments_removed,
            regenerations = report.regenerations,
            edits = plan.edits.len(),
            "reconciliation planned"
        );
        Ok(plan)
    }
}

/// Queue a `Create` for every artifact flagged missing.
fn schedule_regenerations(registry: &Registry, plan: &mut ReconcilePlan) {
    let mut targets = Vec::new();
    for (id, template) in registry.templates() {
        if template.selector_stale {
            targets.push(ArtifactTarget::Selector(id));
        }
        targets.extend(
            registry
                .instantiations(id)
                .iter()
                .filter(|inst| inst.needs_regeneration)
                .map(|inst| ArtifactTarget::Instantiation(id, inst.arguments.clone())),
        );
    }
    plan.report.regenerations += targets.len();
    for target in targets {
        plan.push(LifecycleEdit::Create(target));
    }
}

fn apply_changes(
    registry: &mut Registry,
    kind: TemplateKind,
    changes: Vec<TemplateChange>,
    plan: &mut ReconcilePlan,
) -> Result<(), ReconcileError> {
    let mut removals = Vec::new();
    let mut updates = Vec::new();
    let mut additions = Vec::new();
    for change in changes {
        match change {
            TemplateChange::Removed(id) => removals.push(id),
            TemplateChange::Updated {
                id,
                identity,
                parameter_names,
                delta,
                ..
            } => updates.push((id, identity, parameter_names, delta)),
            TemplateChange::Added(decl) => additions.push(decl),
        }
    }

    for id in removals {
        remove_template(registry, id, plan)?;
    }
    for (id, identity, parameter_names, delta) in updates {
        update_template(registry, id, identity, parameter_names, delta, plan)?;
    }
    for decl in additions {
        add_template(registry, kind, decl, plan)?;
    }
    Ok(())
}

fn remove_template(
    registry: &mut Registry,
    id: TemplateId,
    plan: &mut ReconcilePlan,
) -> Result<(), ReconcileError> {
    let from = DeclarationState::of(registry, id);
    let mut deleted = Vec::new();
    let removed = registry.remove_template(id, |artifact| deleted.push(artifact.clone()))?;
    tracing::debug!(template = %removed.record.identity.name, "template removed");

    for artifact in deleted {
        plan.push(LifecycleEdit::Delete(artifact));
    }
    plan.report.templates_removed += 1;
    plan.report.instantiations_removed += removed.instantiations.len();
    if let Some(to) = from.on(DeclarationEvent::Vanished) {
        plan.report.transition(&removed.record.identity.name, from, to);
    }
    Ok(())
}

fn update_template(
    registry: &mut Registry,
    id: TemplateId,
    identity: TypeIdentity,
    parameter_names: Vec<String>,
    delta: IdentityDelta,
    plan: &mut ReconcilePlan,
) -> Result<(), ReconcileError> {
    let from = DeclarationState::of(registry, id);
    tracing::debug!(template = %id, to = %identity, ?delta, "template updated");

    registry.update_template_identity(id, identity)?;
    registry.update_template_parameters(id, parameter_names)?;

    if delta.contains(IdentityDelta::NAME) {
        plan.report.templates_renamed += 1;
    }
    if delta.contains(IdentityDelta::STABLE_ID) {
        plan.report.stable_ids_updated += 1;
    }
    if delta.contains(IdentityDelta::PARAMETERS) {
        plan.report.parameters_updated += 1;
    }

    let record = registry.require_template(id)?;
    if delta.regenerates() {
        if record.kind.has_selector() {
            plan.push(match &record.artifact {
                Some(artifact) => LifecycleEdit::Replace {
                    target: ArtifactTarget::Selector(id),
                    artifact: artifact.clone(),
                },
                None => LifecycleEdit::Create(ArtifactTarget::Selector(id)),
            });
        }
        for inst in registry.instantiations(id) {
            plan.push(LifecycleEdit::Replace {
                target: ArtifactTarget::Instantiation(id, inst.arguments.clone()),
                artifact: inst.artifact.clone(),
            });
        }
    }

    let name = record.identity.name.clone();
    if let Some(to) = from.on(DeclarationEvent::Renamed) {
        plan.report.transition(&name, from, to);
    }
    Ok(())
}

fn add_template(
    registry: &mut Registry,
    kind: TemplateKind,
    decl: DeclarationInfo,
    plan: &mut ReconcilePlan,
) -> Result<(), ReconcileError> {
    let name = decl.identity.name.clone();
    let id = registry.add_template(TemplateRecord::new(decl.identity, kind, decl.parameter_names))?;
    tracing::debug!(template = %name, %kind, "template added");

    if kind.has_selector() {
        plan.push(LifecycleEdit::Create(ArtifactTarget::Selector(id)));
    }
    plan.report.templates_added += 1;
    let from = DeclarationState::Unknown;
    if let Some(to) = from.on(DeclarationEvent::Observed) {
        plan.report.transition(&name, from, to);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::DeclarationSet;
    use monomorph_core::{ArtifactId, QualifiedName};

    fn live_box(name: &str) -> DeclarationSet {
        let mut set = DeclarationSet::new();
        set.add_template(TemplateKind::Component, TypeIdentity::new("g1", name), &["T"])
            .add_type(TypeIdentity::new("t1", "Int"));
        set
    }

    /// Registry after a first pass plus one requested `Box<Int>`.
    fn materialized() -> (Registry, TemplateId) {
        let mut registry = Registry::new();
        Reconciler::default()
            .reconcile(&mut registry, &live_box("Box`1"))
            .unwrap();
        let (id, _) = registry.templates().next().unwrap();
        registry
            .set_template_artifact(id, Some(ArtifactId::new("sel")))
            .unwrap();
        registry
            .add_instantiation(id, &[TypeIdentity::new("t1", "Int")], ArtifactId::new("a1"))
            .unwrap();
        (registry, id)
    }

    #[test]
    fn first_pass_adds_and_creates_selectors() {
        let mut registry = Registry::new();
        let plan = Reconciler::default()
            .reconcile(&mut registry, &live_box("Box`1"))
            .unwrap();

        assert_eq!(plan.report.templates_added, 1);
        assert!(plan.report.changed());
        assert!(matches!(
            plan.edits.as_slice(),
            [LifecycleEdit::Create(ArtifactTarget::Selector(_))]
        ));
        assert_eq!(
            plan.report.transitions[0].to,
            DeclarationState::Registered
        );
    }

    #[test]
    fn second_pass_is_idempotent() {
        let (mut registry, _) = materialized();
        let plan = Reconciler::default()
            .reconcile(&mut registry, &live_box("Box`1"))
            .unwrap();
        assert!(plan.is_empty());
        assert!(!plan.report.changed());
    }

    #[test]
    fn rename_replaces_selector_and_instantiations() {
        let (mut registry, id) = materialized();
        let plan = Reconciler::default()
            .reconcile(&mut registry, &live_box("Container`1"))
            .unwrap();

        assert_eq!(plan.report.templates_renamed, 1);
        assert_eq!(plan.report.templates_added, 0);
        assert_eq!(plan.report.templates_removed, 0);
        assert_eq!(plan.edits.len(), 2);
        assert!(plan.edits.iter().all(|e| matches!(e, LifecycleEdit::Replace { .. })));
        assert_eq!(
            registry.template(id).unwrap().identity.name,
            QualifiedName::from("Container`1")
        );
        assert_eq!(
            plan.report.transitions[0].to,
            DeclarationState::Renamed(Box::new(DeclarationState::Materialized))
        );
    }

    #[test]
    fn removal_cascades_and_releases_arguments() {
        let (mut registry, _) = materialized();
        let mut live = DeclarationSet::new();
        live.add_type(TypeIdentity::new("t1", "Int"));
        let plan = Reconciler::default().reconcile(&mut registry, &live).unwrap();

        assert_eq!(plan.report.templates_removed, 1);
        assert_eq!(plan.report.instantiations_removed, 1);
        assert_eq!(
            plan.edits,
            vec![
                LifecycleEdit::Delete(ArtifactId::new("a1")),
                LifecycleEdit::Delete(ArtifactId::new("sel")),
            ]
        );
        assert!(registry.is_empty());
        assert_eq!(plan.report.transitions[0].to, DeclarationState::Removed);
    }

    #[test]
    fn argument_rename_is_applied_before_template_rename() {
        let (mut registry, _) = materialized();
        let mut live = DeclarationSet::new();
        live.add_template(TemplateKind::Component, TypeIdentity::new("g1", "Container`1"), &["T"])
            .add_type(TypeIdentity::new("t1", "Int32"));
        let plan = Reconciler::default().reconcile(&mut registry, &live).unwrap();

        assert_eq!(plan.report.arguments_renamed, 1);
        assert_eq!(plan.report.templates_renamed, 1);
        // One Replace per artifact even though two cascades touched the instantiation.
        assert_eq!(plan.edits.len(), 2);
    }

    #[test]
    fn stale_records_are_regenerated() {
        let (mut registry, id) = materialized();
        let key = registry.instantiations(id)[0].arguments.clone();
        registry.mark_instantiation_stale(id, &key).unwrap();

        let plan = Reconciler::default()
            .reconcile(&mut registry, &live_box("Box`1"))
            .unwrap();
        assert_eq!(plan.report.regenerations, 1);
        assert_eq!(
            plan.edits,
            vec![LifecycleEdit::Create(ArtifactTarget::Instantiation(id, key))]
        );
        assert!(!plan.report.changed());
    }

    #[test]
    fn parameter_rename_is_a_change() {
        let (mut registry, _) = materialized();
        let mut live = DeclarationSet::new();
        live.add_template(TemplateKind::Component, TypeIdentity::new("g1", "Box`1"), &["TItem"])
            .add_type(TypeIdentity::new("t1", "Int"));
        let plan = Reconciler::default().reconcile(&mut registry, &live).unwrap();
        assert_eq!(plan.report.parameters_updated, 1);
        assert!(plan.report.changed());
    }
}
