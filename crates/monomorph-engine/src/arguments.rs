//! Argument reconciliation.
//!
//! Runs before templates are diffed so that every cascade computes artifact
//! names from already-updated argument names.

use monomorph_core::{RegistryError, TypeIdentity};
use monomorph_registry::{ArgumentId, Registry, TemplateId};

use crate::plan::{ArtifactTarget, LifecycleEdit, ReconcilePlan};
use crate::scanner::DeclarationSource;
use crate::state::{DeclarationEvent, DeclarationState};

/// How one stored argument relates to the live declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ArgumentStatus {
    Unchanged,
    Renamed(TypeIdentity),
    Reassigned(TypeIdentity),
    Vanished,
}

fn status(stored: &TypeIdentity, source: &dyn DeclarationSource) -> ArgumentStatus {
    let live = source
        .resolve_by_id(&stored.stable_id)
        .or_else(|| source.resolve_by_name(&stored.name))
        // A name hit with a different stable id is a different type.
        .filter(|live| stored.matches(&live.identity).is_some());

    let Some(live) = live else {
        return ArgumentStatus::Vanished;
    };
    let updated = TypeIdentity {
        stable_id: if live.identity.stable_id.is_empty() {
            stored.stable_id.clone()
        } else {
            live.identity.stable_id
        },
        name: live.identity.name,
    };

    if updated == *stored {
        ArgumentStatus::Unchanged
    } else if updated.name != stored.name {
        ArgumentStatus::Renamed(updated)
    } else {
        ArgumentStatus::Reassigned(updated)
    }
}

/// Reconcile every stored argument against the live declarations.
pub(crate) fn reconcile_arguments(
    registry: &mut Registry,
    source: &dyn DeclarationSource,
    plan: &mut ReconcilePlan,
) -> Result<(), RegistryError> {
    let statuses: Vec<(ArgumentId, ArgumentStatus)> = registry
        .arguments()
        .map(|(id, record)| (id, status(&record.identity, source)))
        .filter(|(_, status)| *status != ArgumentStatus::Unchanged)
        .collect();

    for (id, status) in statuses {
        match status {
            ArgumentStatus::Unchanged => {}
            ArgumentStatus::Renamed(identity) => {
                tracing::debug!(argument = %id, to = %identity, "argument renamed");
                registry.update_argument_identity(id, identity)?;
                plan.report.arguments_renamed += 1;
                cascade_rename(registry, id, plan);
            }
            ArgumentStatus::Reassigned(identity) => {
                tracing::debug!(argument = %id, to = %identity, "argument stable id updated");
                registry.update_argument_identity(id, identity)?;
                plan.report.arguments_reassigned += 1;
            }
            ArgumentStatus::Vanished => {
                // An earlier removal may already have released it.
                if registry.argument(id).is_none() {
                    continue;
                }
                tracing::debug!(argument = %id, "argument no longer declared");
                let dependents = registry.dependents_of(id).to_vec();
                let mut deleted = Vec::new();
                let removed = registry.remove_argument(id, |_, inst| {
                    deleted.push(inst.artifact.clone());
                })?;
                for artifact in deleted {
                    plan.push(LifecycleEdit::Delete(artifact));
                }
                plan.report.arguments_removed += 1;
                plan.report.instantiations_removed += removed;
                record_dematerialized(registry, &dependents, plan);
            }
        }
    }
    Ok(())
}

/// Record templates left without any instantiation.
fn record_dematerialized(registry: &Registry, templates: &[TemplateId], plan: &mut ReconcilePlan) {
    for template in templates {
        let Some(record) = registry.template(*template) else {
            continue;
        };
        if !registry.instantiations(*template).is_empty() {
            continue;
        }
        let from = DeclarationState::Materialized;
        if let Some(to) = from.on(DeclarationEvent::Dematerialized) {
            plan.report.transition(&record.identity.name, from, to);
        }
    }
}

/// Replace every instantiation that uses `argument`.
fn cascade_rename(registry: &Registry, argument: ArgumentId, plan: &mut ReconcilePlan) {
    for template in registry.dependents_of(argument) {
        for inst in registry.instantiations(*template) {
            if inst.arguments.contains(argument) {
                plan.push(LifecycleEdit::Replace {
                    target: ArtifactTarget::Instantiation(*template, inst.arguments.clone()),
                    artifact: inst.artifact.clone(),
                });
            }
        }
    }
}
