//! Flat, persistable form of the registry.
//!
//! The host's persistence layer only stores flat arrays of primitive-field
//! records, so the registry's maps are flattened into parallel tables:
//!
//! ```text
//! templates[i]                  <-> instantiations_by_template[i]
//! arguments[j]                  <-> argument_dependents[j]
//! ```
//!
//! Every identity is written out as an [`IdentityRow`]. On rehydration those
//! rows are interned through a shared pool, so an argument written once per
//! instantiation that uses it comes back as a single argument record, and the
//! dependents index is rebuilt from the instantiations.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use monomorph_core::{
    ArtifactId, QualifiedName, SnapshotError, StableId, TemplateKind, TypeIdentity,
};

use crate::records::{
    ArgList, ArgumentId, ArgumentRecord, InstantiationRecord, TemplateId, TemplateRecord,
};
use crate::registry::Registry;

/// Version of the persisted layout.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted identity: `{stable_id, qualified_name, module}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityRow {
    pub stable_id: String,
    pub qualified_name: String,
    pub module: String,
}

impl IdentityRow {
    pub fn from_identity(identity: &TypeIdentity) -> Self {
        Self {
            stable_id: identity.stable_id.as_str().to_string(),
            qualified_name: identity.name.full_name(),
            module: identity.name.module.clone(),
        }
    }

    pub fn to_identity(&self) -> TypeIdentity {
        TypeIdentity {
            stable_id: StableId::new(self.stable_id.clone()),
            name: QualifiedName::from_qualified_string(&self.qualified_name)
                .in_module(self.module.clone()),
        }
    }
}

/// Persisted template record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRow {
    #[serde(flatten)]
    pub identity: IdentityRow,
    pub kind: TemplateKind,
    pub parameter_names: Vec<String>,
    /// Selector artifact id, empty when not materialized.
    #[serde(default)]
    pub artifact_id: String,
    #[serde(default)]
    pub selector_stale: bool,
}

/// Persisted instantiation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiationRow {
    pub arguments: Vec<IdentityRow>,
    pub artifact_id: String,
    #[serde(default)]
    pub needs_regeneration: bool,
}

/// The registry as parallel flat tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub version: u32,
    pub templates: Vec<TemplateRow>,
    pub instantiations_by_template: Vec<Vec<InstantiationRow>>,
    pub arguments: Vec<IdentityRow>,
    pub argument_dependents: Vec<Vec<IdentityRow>>,
}

impl Default for RegistrySnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            templates: Vec::new(),
            instantiations_by_template: Vec::new(),
            arguments: Vec::new(),
            argument_dependents: Vec::new(),
        }
    }
}

fn corrupt(detail: impl Into<String>) -> SnapshotError {
    SnapshotError::CorruptPersistedState(detail.into())
}

impl Registry {
    /// Convert the registry into parallel flat tables.
    pub fn flatten(&self) -> RegistrySnapshot {
        let mut snapshot = RegistrySnapshot::default();

        for (id, record) in self.templates() {
            snapshot.templates.push(TemplateRow {
                identity: IdentityRow::from_identity(&record.identity),
                kind: record.kind,
                parameter_names: record.parameter_names.clone(),
                artifact_id: record
                    .artifact
                    .as_ref()
                    .map(|a| a.as_str().to_string())
                    .unwrap_or_default(),
                selector_stale: record.selector_stale,
            });

            let rows = self
                .instantiations(id)
                .iter()
                .map(|inst| InstantiationRow {
                    arguments: inst
                        .arguments
                        .iter()
                        .filter_map(|arg| self.argument(arg))
                        .map(|arg| IdentityRow::from_identity(&arg.identity))
                        .collect(),
                    artifact_id: inst.artifact.as_str().to_string(),
                    needs_regeneration: inst.needs_regeneration,
                })
                .collect();
            snapshot.instantiations_by_template.push(rows);
        }

        for (id, record) in self.arguments() {
            snapshot
                .arguments
                .push(IdentityRow::from_identity(&record.identity));
            snapshot.argument_dependents.push(
                self.dependents_of(id)
                    .iter()
                    .filter_map(|t| self.template(*t))
                    .map(|t| IdentityRow::from_identity(&t.identity))
                    .collect(),
            );
        }

        snapshot
    }

    /// Rebuild a registry from its flat tables.
    ///
    /// Structurally equal identity rows are interned to one record. Fails with
    /// `CorruptPersistedState` when the parallel tables disagree in length,
    /// the layout version is unknown, or a row references an identity that
    /// no table defines.
    pub fn rehydrate(snapshot: RegistrySnapshot) -> Result<Registry, SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(corrupt(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        if snapshot.templates.len() != snapshot.instantiations_by_template.len() {
            return Err(corrupt(format!(
                "{} templates but {} instantiation lists",
                snapshot.templates.len(),
                snapshot.instantiations_by_template.len()
            )));
        }
        if snapshot.arguments.len() != snapshot.argument_dependents.len() {
            return Err(corrupt(format!(
                "{} arguments but {} dependent lists",
                snapshot.arguments.len(),
                snapshot.argument_dependents.len()
            )));
        }

        let mut registry = Registry::new();
        let mut argument_pool: FxHashMap<IdentityRow, ArgumentId> = FxHashMap::default();
        let mut template_pool: FxHashMap<IdentityRow, TemplateId> = FxHashMap::default();

        for row in &snapshot.arguments {
            if !argument_pool.contains_key(row) {
                let id = registry.insert_argument(ArgumentRecord {
                    identity: row.to_identity(),
                });
                argument_pool.insert(row.clone(), id);
            }
        }

        for (row, instantiations) in snapshot
            .templates
            .iter()
            .zip(&snapshot.instantiations_by_template)
        {
            let template = match template_pool.get(&row.identity) {
                Some(id) => {
                    tracing::debug!(
                        template = %row.identity.qualified_name,
                        "merging duplicate template row"
                    );
                    *id
                }
                None => {
                    let mut record = TemplateRecord::new(
                        row.identity.to_identity(),
                        row.kind,
                        row.parameter_names.clone(),
                    );
                    record.artifact =
                        (!row.artifact_id.is_empty()).then(|| ArtifactId::new(row.artifact_id.clone()));
                    record.selector_stale = row.selector_stale;
                    let id = registry.insert_template(record);
                    template_pool.insert(row.identity.clone(), id);
                    id
                }
            };

            for inst in instantiations {
                if inst.arguments.len() != row.parameter_names.len() {
                    return Err(corrupt(format!(
                        "instantiation of '{}' has {} arguments, template declares {}",
                        row.identity.qualified_name,
                        inst.arguments.len(),
                        row.parameter_names.len()
                    )));
                }
                let ids = inst
                    .arguments
                    .iter()
                    .map(|arg| {
                        argument_pool.get(arg).copied().ok_or_else(|| {
                            corrupt(format!(
                                "instantiation of '{}' references unknown argument '{}'",
                                row.identity.qualified_name, arg.qualified_name
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let key = ArgList::from(ids);
                if registry.instantiation(template, &key).is_some() {
                    tracing::warn!(
                        template = %row.identity.qualified_name,
                        "dropping duplicate persisted instantiation"
                    );
                    continue;
                }

                for arg in key.iter() {
                    let dependents = registry.dependents.entry(arg).or_default();
                    if !dependents.contains(&template) {
                        dependents.push(template);
                    }
                }
                let mut record =
                    InstantiationRecord::new(key, ArtifactId::new(inst.artifact_id.clone()));
                record.needs_regeneration = inst.needs_regeneration;
                registry
                    .instantiations
                    .entry(template)
                    .or_default()
                    .push(record);
            }
        }

        for (row, persisted) in snapshot.arguments.iter().zip(&snapshot.argument_dependents) {
            let Some(arg) = argument_pool.get(row).copied() else {
                continue;
            };
            let persisted = persisted
                .iter()
                .map(|t| {
                    template_pool.get(t).copied().ok_or_else(|| {
                        corrupt(format!(
                            "argument '{}' lists unknown dependent '{}'",
                            row.qualified_name, t.qualified_name
                        ))
                    })
                })
                .collect::<Result<FxHashSet<_>, _>>()?;
            let derived: FxHashSet<TemplateId> =
                registry.dependents_of(arg).iter().copied().collect();
            if persisted != derived {
                tracing::warn!(
                    argument = %row.qualified_name,
                    persisted = persisted.len(),
                    derived = derived.len(),
                    "persisted dependents disagree with instantiations, using derived list"
                );
            }
        }

        // Arguments nothing depends on have no reason to exist.
        let unused: Vec<ArgumentId> = registry
            .arguments()
            .map(|(id, _)| id)
            .filter(|id| registry.dependents_of(*id).is_empty())
            .collect();
        for id in unused {
            tracing::debug!(argument = %id, "dropping unreferenced persisted argument");
            registry.arguments.remove(&id);
        }

        registry.reset_counters();
        Ok(registry)
    }

    /// Rebuild a registry, falling back to an empty one on corrupt state.
    pub fn rehydrate_or_empty(snapshot: RegistrySnapshot) -> Registry {
        match Registry::rehydrate(snapshot) {
            Ok(registry) => registry,
            Err(err) => {
                tracing::warn!(error = %err, "discarding persisted registry");
                Registry::new()
            }
        }
    }
}
