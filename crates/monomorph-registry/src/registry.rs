//! Registry - the persisted template/argument/instantiation store.
//!
//! This module provides [`Registry`], the exclusive owner of every
//! [`TemplateRecord`], [`ArgumentRecord`] and [`InstantiationRecord`].
//!
//! # Storage Model
//!
//! - **Templates** and **arguments** live in arenas keyed by [`TemplateId`] /
//!   [`ArgumentId`]. Ids are allocated monotonically, so iteration order is
//!   insertion order.
//! - **Instantiations** are stored per template, keyed by their [`ArgList`].
//! - **Dependents** is the reverse index argument → templates with at least
//!   one instantiation using that argument. It doubles as the argument's
//!   reference count: when an argument loses its last dependent it is dropped.
//!
//! # Thread Safety
//!
//! `Registry` is a plain value. It is loaded at the start of a reconciliation
//! pass, mutated only by the engine and the lifecycle coordinator, and
//! persisted once at the end of the pass.
//!
//! # Example
//!
//! ```
//! use monomorph_core::{ArtifactId, TemplateKind, TypeIdentity};
//! use monomorph_registry::{Registry, TemplateRecord};
//!
//! let mut registry = Registry::new();
//! let boxed = registry
//!     .add_template(TemplateRecord::new(
//!         TypeIdentity::new("g1", "Box`1"),
//!         TemplateKind::Asset,
//!         vec!["T".into()],
//!     ))
//!     .unwrap();
//!
//! let int = TypeIdentity::new("t1", "System::Int32");
//! registry.add_instantiation(boxed, &[int], ArtifactId::new("a1")).unwrap();
//! assert_eq!(registry.instantiation_count(), 1);
//! assert_eq!(registry.argument_count(), 1);
//! ```

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use monomorph_core::{
    ArtifactId, QualifiedName, RecordKind, RegistryError, TemplateKind, TypeIdentity,
};

use crate::records::{
    ArgList, ArgumentId, ArgumentRecord, InstantiationRecord, TemplateId, TemplateRecord,
};

/// What [`Registry::remove_template`] took out of the registry.
#[derive(Debug, Clone)]
pub struct RemovedTemplate {
    pub record: TemplateRecord,
    pub instantiations: Vec<InstantiationRecord>,
    /// Arguments dropped because this template was their last dependent.
    pub released_arguments: Vec<ArgumentRecord>,
}

/// Template/argument/instantiation registry.
#[derive(Default, Clone)]
pub struct Registry {
    pub(crate) templates: BTreeMap<TemplateId, TemplateRecord>,
    pub(crate) arguments: BTreeMap<ArgumentId, ArgumentRecord>,
    pub(crate) instantiations: FxHashMap<TemplateId, Vec<InstantiationRecord>>,
    pub(crate) dependents: FxHashMap<ArgumentId, Vec<TemplateId>>,
    next_template: u32,
    next_argument: u32,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Template Lookup
    // ==========================================================================

    /// Get a template by id.
    pub fn template(&self, id: TemplateId) -> Option<&TemplateRecord> {
        self.templates.get(&id)
    }

    /// Get a template by id, or fail with `IdentityNotFound`.
    pub fn require_template(&self, id: TemplateId) -> Result<&TemplateRecord, RegistryError> {
        self.templates
            .get(&id)
            .ok_or_else(|| RegistryError::not_found(RecordKind::Template, id))
    }

    fn template_mut(&mut self, id: TemplateId) -> Result<&mut TemplateRecord, RegistryError> {
        self.templates
            .get_mut(&id)
            .ok_or_else(|| RegistryError::not_found(RecordKind::Template, id))
    }

    /// Iterate over all templates in insertion order.
    pub fn templates(&self) -> impl Iterator<Item = (TemplateId, &TemplateRecord)> {
        self.templates.iter().map(|(id, record)| (*id, record))
    }

    /// Iterate over the templates of one kind in insertion order.
    pub fn templates_of_kind(
        &self,
        kind: TemplateKind,
    ) -> impl Iterator<Item = (TemplateId, &TemplateRecord)> {
        self.templates().filter(move |(_, record)| record.kind == kind)
    }

    /// Find the first template matching an identity (two-tier match).
    pub fn find_template(&self, identity: &TypeIdentity) -> Option<TemplateId> {
        self.templates()
            .find(|(_, record)| record.identity.matches(identity).is_some())
            .map(|(id, _)| id)
    }

    /// Find a template by exact qualified name.
    pub fn find_template_by_name(&self, name: &QualifiedName) -> Option<TemplateId> {
        self.templates()
            .find(|(_, record)| record.identity.name == *name)
            .map(|(id, _)| id)
    }

    // ==========================================================================
    // Argument Lookup
    // ==========================================================================

    /// Get an argument by id.
    pub fn argument(&self, id: ArgumentId) -> Option<&ArgumentRecord> {
        self.arguments.get(&id)
    }

    /// Iterate over all arguments in insertion order.
    pub fn arguments(&self) -> impl Iterator<Item = (ArgumentId, &ArgumentRecord)> {
        self.arguments.iter().map(|(id, record)| (*id, record))
    }

    /// Find the first argument matching an identity (two-tier match).
    pub fn find_argument(&self, identity: &TypeIdentity) -> Option<ArgumentId> {
        self.arguments()
            .find(|(_, record)| record.identity.matches(identity).is_some())
            .map(|(id, _)| id)
    }

    /// Templates with at least one instantiation using `argument`.
    pub fn dependents_of(&self, argument: ArgumentId) -> &[TemplateId] {
        self.dependents
            .get(&argument)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve an argument list to its identities.
    pub fn argument_identities(&self, args: &ArgList) -> Result<Vec<&TypeIdentity>, RegistryError> {
        args.iter()
            .map(|id| {
                self.arguments
                    .get(&id)
                    .map(|record| &record.identity)
                    .ok_or_else(|| RegistryError::not_found(RecordKind::Argument, id))
            })
            .collect()
    }

    // ==========================================================================
    // Instantiation Lookup
    // ==========================================================================

    /// Instantiations of a template (empty if none or unknown).
    pub fn instantiations(&self, template: TemplateId) -> &[InstantiationRecord] {
        self.instantiations
            .get(&template)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Get one instantiation by key.
    pub fn instantiation(&self, template: TemplateId, args: &ArgList) -> Option<&InstantiationRecord> {
        self.instantiations(template)
            .iter()
            .find(|inst| inst.arguments == *args)
    }

    /// Find an instantiation by argument identities without interning anything.
    pub fn find_instantiation(
        &self,
        template: TemplateId,
        args: &[TypeIdentity],
    ) -> Option<&InstantiationRecord> {
        let ids = self.lookup_arg_list(args)?;
        self.instantiation(template, &ids)
    }

    /// Whether any selector or instantiation currently points at `artifact`.
    pub fn references_artifact(&self, artifact: &ArtifactId) -> bool {
        self.templates
            .values()
            .any(|record| record.artifact.as_ref() == Some(artifact))
            || self
                .instantiations
                .values()
                .flatten()
                .any(|inst| inst.artifact == *artifact)
    }

    fn lookup_arg_list(&self, args: &[TypeIdentity]) -> Option<ArgList> {
        args.iter()
            .map(|identity| self.find_argument(identity))
            .collect::<Option<Vec<_>>>()
            .map(ArgList::from)
    }

    // ==========================================================================
    // Counts
    // ==========================================================================

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }

    /// Total number of instantiations across all templates.
    pub fn instantiation_count(&self) -> usize {
        self.instantiations.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty() && self.arguments.is_empty()
    }

    // ==========================================================================
    // Template Mutation
    // ==========================================================================

    /// Register a template.
    ///
    /// Returns an error if a template with a matching identity already exists.
    pub fn add_template(&mut self, record: TemplateRecord) -> Result<TemplateId, RegistryError> {
        if self.find_template(&record.identity).is_some() {
            return Err(RegistryError::DuplicateTemplate(record.identity.name.to_string()));
        }
        Ok(self.insert_template(record))
    }

    pub(crate) fn insert_template(&mut self, record: TemplateRecord) -> TemplateId {
        let id = TemplateId::new(self.next_template);
        self.next_template += 1;
        self.templates.insert(id, record);
        id
    }

    /// Remove a template and everything that depends on it.
    ///
    /// Every instantiation is removed first, then the argument back-references,
    /// then the template record itself. `on_artifact_removed` is invoked once
    /// per removed artifact: each instantiation, then the selector.
    pub fn remove_template(
        &mut self,
        id: TemplateId,
        mut on_artifact_removed: impl FnMut(&ArtifactId),
    ) -> Result<RemovedTemplate, RegistryError> {
        self.require_template(id)?;

        let instantiations = self.instantiations.remove(&id).unwrap_or_default();
        for inst in &instantiations {
            on_artifact_removed(&inst.artifact);
        }

        let mut used: Vec<ArgumentId> = instantiations
            .iter()
            .flat_map(|inst| inst.arguments.iter())
            .collect();
        used.sort_unstable();
        used.dedup();
        let released_arguments = self.release_dependents(id, used);

        let record = self
            .templates
            .remove(&id)
            .ok_or_else(|| RegistryError::not_found(RecordKind::Template, id))?;
        if let Some(artifact) = &record.artifact {
            on_artifact_removed(artifact);
        }

        Ok(RemovedTemplate {
            record,
            instantiations,
            released_arguments,
        })
    }

    /// Update a template's identity. Returns whether anything changed.
    pub fn update_template_identity(
        &mut self,
        id: TemplateId,
        identity: TypeIdentity,
    ) -> Result<bool, RegistryError> {
        let record = self.template_mut(id)?;
        if record.identity == identity {
            return Ok(false);
        }
        record.identity = identity;
        Ok(true)
    }

    /// Update a template's parameter display names. Returns whether anything changed.
    ///
    /// The arity is part of the template's identity and cannot change here.
    pub fn update_template_parameters(
        &mut self,
        id: TemplateId,
        parameter_names: Vec<String>,
    ) -> Result<bool, RegistryError> {
        let record = self.template_mut(id)?;
        if record.parameter_names == parameter_names {
            return Ok(false);
        }
        if record.parameter_names.len() != parameter_names.len() {
            return Err(RegistryError::ArityMismatch {
                template: record.identity.name.to_string(),
                expected: record.parameter_names.len(),
                found: parameter_names.len(),
            });
        }
        record.parameter_names = parameter_names;
        Ok(true)
    }

    /// Set or clear a template's selector artifact.
    pub fn set_template_artifact(
        &mut self,
        id: TemplateId,
        artifact: Option<ArtifactId>,
    ) -> Result<(), RegistryError> {
        let record = self.template_mut(id)?;
        record.artifact = artifact;
        record.selector_stale = false;
        Ok(())
    }

    /// Flag a template's selector for regeneration on the next pass.
    pub fn mark_selector_stale(&mut self, id: TemplateId) -> Result<(), RegistryError> {
        self.template_mut(id)?.selector_stale = true;
        Ok(())
    }

    // ==========================================================================
    // Instantiation Mutation
    // ==========================================================================

    /// Register a concrete instantiation.
    ///
    /// Arguments are interned: an argument matching an existing record reuses
    /// it, otherwise a new argument record is created. Fails with
    /// `DuplicateInstantiation` if the same ordered argument list is already
    /// registered for the template; nothing is interned in that case.
    pub fn add_instantiation(
        &mut self,
        template: TemplateId,
        args: &[TypeIdentity],
        artifact: ArtifactId,
    ) -> Result<ArgList, RegistryError> {
        let record = self.require_template(template)?;
        if record.arity() != args.len() {
            return Err(RegistryError::ArityMismatch {
                template: record.identity.name.to_string(),
                expected: record.arity(),
                found: args.len(),
            });
        }
        if self.find_instantiation(template, args).is_some() {
            return Err(self.duplicate_error(template, args));
        }

        let ids: ArgList = args
            .iter()
            .map(|identity| self.intern_argument(identity))
            .collect::<Vec<_>>()
            .into();
        // Interning may collapse two identities that differ only in how much
        // they know about themselves onto one record.
        if self.instantiation(template, &ids).is_some() {
            return Err(self.duplicate_error(template, args));
        }

        for arg in ids.iter() {
            let dependents = self.dependents.entry(arg).or_default();
            if !dependents.contains(&template) {
                dependents.push(template);
            }
        }
        self.instantiations
            .entry(template)
            .or_default()
            .push(InstantiationRecord::new(ids.clone(), artifact));
        Ok(ids)
    }

    /// Remove one instantiation, releasing arguments it was the last user of.
    pub fn remove_instantiation(
        &mut self,
        template: TemplateId,
        args: &ArgList,
    ) -> Result<InstantiationRecord, RegistryError> {
        let position = self
            .instantiations(template)
            .iter()
            .position(|inst| inst.arguments == *args)
            .ok_or_else(|| {
                RegistryError::not_found(
                    RecordKind::Instantiation,
                    self.describe_instantiation(template, args),
                )
            })?;
        let mut removed = None;
        if let Some(list) = self.instantiations.get_mut(&template) {
            removed = Some(list.remove(position));
            if list.is_empty() {
                self.instantiations.remove(&template);
            }
        }
        let removed = removed.ok_or_else(|| {
            RegistryError::not_found(RecordKind::Instantiation, template)
        })?;

        let candidates: Vec<ArgumentId> = removed.arguments.iter().collect();
        self.release_dependents(template, candidates);
        Ok(removed)
    }

    /// Remove an argument from every template that references it.
    ///
    /// Every instantiation using the argument is removed and
    /// `on_artifact_removed` is invoked once per removed instantiation artifact.
    /// Other arguments that lose their last dependent are released too.
    /// Returns the number of removed instantiations.
    pub fn remove_argument(
        &mut self,
        id: ArgumentId,
        mut on_artifact_removed: impl FnMut(TemplateId, &InstantiationRecord),
    ) -> Result<usize, RegistryError> {
        if !self.arguments.contains_key(&id) {
            return Err(RegistryError::not_found(RecordKind::Argument, id));
        }

        let dependents = self.dependents.get(&id).cloned().unwrap_or_default();
        let mut removed = 0;
        for template in dependents {
            let Some(list) = self.instantiations.get_mut(&template) else {
                continue;
            };
            let (dropped, kept): (Vec<_>, Vec<_>) =
                list.drain(..).partition(|inst| inst.arguments.contains(id));
            *list = kept;
            if list.is_empty() {
                self.instantiations.remove(&template);
            }

            let mut candidates = Vec::new();
            for inst in &dropped {
                on_artifact_removed(template, inst);
                candidates.extend(inst.arguments.iter());
            }
            candidates.sort_unstable();
            candidates.dedup();
            removed += dropped.len();
            self.release_dependents(template, candidates);
        }

        // An argument with no dependents left is released above; one that
        // never had any is dropped here.
        self.dependents.remove(&id);
        self.arguments.remove(&id);
        Ok(removed)
    }

    /// Update an argument's identity. Returns whether anything changed.
    pub fn update_argument_identity(
        &mut self,
        id: ArgumentId,
        identity: TypeIdentity,
    ) -> Result<bool, RegistryError> {
        let record = self
            .arguments
            .get_mut(&id)
            .ok_or_else(|| RegistryError::not_found(RecordKind::Argument, id))?;
        if record.identity == identity {
            return Ok(false);
        }
        record.identity = identity;
        Ok(true)
    }

    /// Point an instantiation at a (re)generated artifact.
    pub fn set_instantiation_artifact(
        &mut self,
        template: TemplateId,
        args: &ArgList,
        artifact: ArtifactId,
    ) -> Result<(), RegistryError> {
        let inst = self.instantiation_mut(template, args)?;
        inst.artifact = artifact;
        inst.needs_regeneration = false;
        Ok(())
    }

    /// Flag an instantiation for regeneration on the next pass.
    pub fn mark_instantiation_stale(
        &mut self,
        template: TemplateId,
        args: &ArgList,
    ) -> Result<(), RegistryError> {
        self.instantiation_mut(template, args)?.needs_regeneration = true;
        Ok(())
    }

    fn instantiation_mut(
        &mut self,
        template: TemplateId,
        args: &ArgList,
    ) -> Result<&mut InstantiationRecord, RegistryError> {
        let key = self.describe_instantiation(template, args);
        self.instantiations
            .get_mut(&template)
            .and_then(|list| list.iter_mut().find(|inst| inst.arguments == *args))
            .ok_or_else(|| RegistryError::not_found(RecordKind::Instantiation, key))
    }

    // ==========================================================================
    // Internals
    // ==========================================================================

    /// Intern an argument identity, reusing a matching record.
    ///
    /// A matching record that has no stable id yet adopts the incoming one.
    fn intern_argument(&mut self, identity: &TypeIdentity) -> ArgumentId {
        if let Some(id) = self.find_argument(identity) {
            if let Some(record) = self.arguments.get_mut(&id)
                && record.identity.stable_id.is_empty()
                && !identity.stable_id.is_empty()
            {
                record.identity.stable_id = identity.stable_id.clone();
            }
            return id;
        }
        self.insert_argument(ArgumentRecord {
            identity: identity.clone(),
        })
    }

    pub(crate) fn insert_argument(&mut self, record: ArgumentRecord) -> ArgumentId {
        let id = ArgumentId::new(self.next_argument);
        self.next_argument += 1;
        self.arguments.insert(id, record);
        id
    }

    /// Drop `template` from the dependents of every candidate argument it no
    /// longer uses, and release arguments left without dependents.
    fn release_dependents(
        &mut self,
        template: TemplateId,
        candidates: Vec<ArgumentId>,
    ) -> Vec<ArgumentRecord> {
        let mut released = Vec::new();
        for arg in candidates {
            let still_used = self
                .instantiations(template)
                .iter()
                .any(|inst| inst.arguments.contains(arg));
            if still_used {
                continue;
            }
            if let Some(dependents) = self.dependents.get_mut(&arg) {
                dependents.retain(|t| *t != template);
                if dependents.is_empty() {
                    self.dependents.remove(&arg);
                    if let Some(record) = self.arguments.remove(&arg) {
                        released.push(record);
                    }
                }
            }
        }
        released
    }

    fn duplicate_error(&self, template: TemplateId, args: &[TypeIdentity]) -> RegistryError {
        RegistryError::DuplicateInstantiation {
            template: self.template_display(template),
            arguments: args
                .iter()
                .map(|a| a.name.full_name())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn template_display(&self, template: TemplateId) -> String {
        self.templates
            .get(&template)
            .map(|t| t.identity.name.full_name())
            .unwrap_or_else(|| template.to_string())
    }

    fn describe_instantiation(&self, template: TemplateId, args: &ArgList) -> String {
        let names: Vec<String> = args
            .iter()
            .map(|id| {
                self.arguments
                    .get(&id)
                    .map(|a| a.identity.name.full_name())
                    .unwrap_or_else(|| id.to_string())
            })
            .collect();
        format!("{}<{}>", self.template_display(template), names.join(", "))
    }

    pub(crate) fn reset_counters(&mut self) {
        self.next_template = self.templates.keys().last().map_or(0, |id| id.index() + 1);
        self.next_argument = self.arguments.keys().last().map_or(0, |id| id.index() + 1);
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("templates", &self.templates.len())
            .field("arguments", &self.arguments.len())
            .field("instantiations", &self.instantiation_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(id: &str, name: &str, params: &[&str]) -> TemplateRecord {
        TemplateRecord::new(
            TypeIdentity::new(id, name),
            TemplateKind::Asset,
            params.iter().map(|p| p.to_string()).collect(),
        )
    }

    fn arg(id: &str, name: &str) -> TypeIdentity {
        TypeIdentity::new(id, name)
    }

    #[test]
    fn new_registry_is_empty() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.template_count(), 0);
        assert_eq!(registry.instantiation_count(), 0);
    }

    #[test]
    fn add_and_find_template() {
        let mut registry = Registry::new();
        let id = registry.add_template(template("g1", "Box`1", &["T"])).unwrap();

        assert_eq!(registry.find_template(&arg("g1", "Renamed`1")), Some(id));
        assert_eq!(
            registry.find_template_by_name(&QualifiedName::from("Box`1")),
            Some(id)
        );
        assert_eq!(registry.find_template(&arg("g2", "Box`1")), None);
    }

    #[test]
    fn duplicate_template_error() {
        let mut registry = Registry::new();
        registry.add_template(template("g1", "Box`1", &["T"])).unwrap();
        let result = registry.add_template(template("g1", "Other`1", &["T"]));
        assert!(matches!(result, Err(RegistryError::DuplicateTemplate(_))));
    }

    #[test]
    fn instantiation_interns_arguments() {
        let mut registry = Registry::new();
        let boxed = registry.add_template(template("g1", "Box`1", &["T"])).unwrap();
        let list = registry.add_template(template("g2", "List`1", &["T"])).unwrap();

        registry
            .add_instantiation(boxed, &[arg("t1", "Int")], ArtifactId::new("a1"))
            .unwrap();
        registry
            .add_instantiation(list, &[arg("t1", "Int")], ArtifactId::new("a2"))
            .unwrap();

        assert_eq!(registry.argument_count(), 1);
        let int = registry.find_argument(&arg("t1", "Int")).unwrap();
        assert_eq!(registry.dependents_of(int), &[boxed, list]);
    }

    #[test]
    fn duplicate_instantiation_error() {
        let mut registry = Registry::new();
        let boxed = registry.add_template(template("g1", "Box`1", &["T"])).unwrap();
        registry
            .add_instantiation(boxed, &[arg("t1", "Int")], ArtifactId::new("a1"))
            .unwrap();

        let result = registry.add_instantiation(boxed, &[arg("t1", "Int")], ArtifactId::new("a9"));
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateInstantiation { .. })
        ));
        assert_eq!(registry.instantiation_count(), 1);
    }

    #[test]
    fn argument_order_is_part_of_key() {
        let mut registry = Registry::new();
        let map = registry
            .add_template(template("g1", "Map`2", &["K", "V"]))
            .unwrap();
        let k = arg("t1", "Key");
        let v = arg("t2", "Value");
        registry
            .add_instantiation(map, &[k.clone(), v.clone()], ArtifactId::new("a1"))
            .unwrap();
        registry
            .add_instantiation(map, &[v, k], ArtifactId::new("a2"))
            .unwrap();
        assert_eq!(registry.instantiations(map).len(), 2);
    }

    #[test]
    fn arity_mismatch_error() {
        let mut registry = Registry::new();
        let boxed = registry.add_template(template("g1", "Box`1", &["T"])).unwrap();
        let result = registry.add_instantiation(
            boxed,
            &[arg("t1", "Int"), arg("t2", "Float")],
            ArtifactId::new("a1"),
        );
        assert!(matches!(
            result,
            Err(RegistryError::ArityMismatch {
                expected: 1,
                found: 2,
                ..
            })
        ));
        assert_eq!(registry.argument_count(), 0);
    }

    #[test]
    fn remove_template_cascades() {
        let mut registry = Registry::new();
        let boxed = registry.add_template(template("g1", "Box`1", &["T"])).unwrap();
        registry.set_template_artifact(boxed, Some(ArtifactId::new("sel"))).unwrap();
        registry
            .add_instantiation(boxed, &[arg("t1", "Int")], ArtifactId::new("a1"))
            .unwrap();

        let mut removed = Vec::new();
        let result = registry
            .remove_template(boxed, |artifact| removed.push(artifact.clone()))
            .unwrap();

        assert_eq!(removed, vec![ArtifactId::new("a1"), ArtifactId::new("sel")]);
        assert_eq!(result.released_arguments.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn shared_argument_survives_one_template_removal() {
        let mut registry = Registry::new();
        let boxed = registry.add_template(template("g1", "Box`1", &["T"])).unwrap();
        let list = registry.add_template(template("g2", "List`1", &["T"])).unwrap();
        registry
            .add_instantiation(boxed, &[arg("t1", "Int")], ArtifactId::new("a1"))
            .unwrap();
        registry
            .add_instantiation(list, &[arg("t1", "Int")], ArtifactId::new("a2"))
            .unwrap();

        registry.remove_template(boxed, |_| {}).unwrap();

        let int = registry.find_argument(&arg("t1", "Int")).unwrap();
        assert_eq!(registry.dependents_of(int), &[list]);
    }

    #[test]
    fn remove_argument_cascades_to_instantiations() {
        let mut registry = Registry::new();
        let map = registry
            .add_template(template("g1", "Map`2", &["K", "V"]))
            .unwrap();
        let boxed = registry.add_template(template("g2", "Box`1", &["T"])).unwrap();
        registry
            .add_instantiation(map, &[arg("t1", "Int"), arg("t2", "Str")], ArtifactId::new("a1"))
            .unwrap();
        registry
            .add_instantiation(boxed, &[arg("t1", "Int")], ArtifactId::new("a2"))
            .unwrap();
        registry
            .add_instantiation(boxed, &[arg("t3", "Float")], ArtifactId::new("a3"))
            .unwrap();

        let int = registry.find_argument(&arg("t1", "Int")).unwrap();
        let mut removed = Vec::new();
        let count = registry
            .remove_argument(int, |_, inst| removed.push(inst.artifact.clone()))
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(removed, vec![ArtifactId::new("a1"), ArtifactId::new("a2")]);
        assert_eq!(registry.instantiation_count(), 1);
        // Str was only used by the removed Map<Int, Str>.
        assert!(registry.find_argument(&arg("t2", "Str")).is_none());
        assert!(registry.find_argument(&arg("t3", "Float")).is_some());
    }

    #[test]
    fn identity_updates_are_idempotent() {
        let mut registry = Registry::new();
        let boxed = registry.add_template(template("g1", "Box`1", &["T"])).unwrap();

        assert!(registry
            .update_template_identity(boxed, arg("g1", "Container`1"))
            .unwrap());
        assert!(!registry
            .update_template_identity(boxed, arg("g1", "Container`1"))
            .unwrap());
        assert!(registry
            .update_template_parameters(boxed, vec!["TItem".into()])
            .unwrap());
        assert!(!registry
            .update_template_parameters(boxed, vec!["TItem".into()])
            .unwrap());
    }

    #[test]
    fn parameter_update_cannot_change_arity() {
        let mut registry = Registry::new();
        let boxed = registry.add_template(template("g1", "Box`1", &["T"])).unwrap();
        let result = registry.update_template_parameters(boxed, vec!["A".into(), "B".into()]);
        assert!(matches!(result, Err(RegistryError::ArityMismatch { .. })));
    }

    #[test]
    fn unknown_records_are_identity_not_found() {
        let mut registry = Registry::new();
        let missing = TemplateId::new(7);
        assert!(matches!(
            registry.remove_template(missing, |_| {}),
            Err(RegistryError::IdentityNotFound {
                kind: RecordKind::Template,
                ..
            })
        ));
        assert!(matches!(
            registry.remove_argument(ArgumentId::new(3), |_, _| {}),
            Err(RegistryError::IdentityNotFound {
                kind: RecordKind::Argument,
                ..
            })
        ));
    }

    #[test]
    fn interning_adopts_late_stable_id() {
        let mut registry = Registry::new();
        let boxed = registry.add_template(template("g1", "Box`1", &["T"])).unwrap();
        let list = registry.add_template(template("g2", "List`1", &["T"])).unwrap();
        registry
            .add_instantiation(boxed, &[TypeIdentity::unidentified("Int")], ArtifactId::new("a1"))
            .unwrap();
        registry
            .add_instantiation(list, &[arg("t1", "Int")], ArtifactId::new("a2"))
            .unwrap();

        assert_eq!(registry.argument_count(), 1);
        let (_, int) = registry.arguments().next().unwrap();
        assert_eq!(int.identity.stable_id.as_str(), "t1");
    }

    #[test]
    fn stale_flags_are_cleared_by_new_artifacts() {
        let mut registry = Registry::new();
        let boxed = registry.add_template(template("g1", "Box`1", &["T"])).unwrap();
        let key = registry
            .add_instantiation(boxed, &[arg("t1", "Int")], ArtifactId::new("a1"))
            .unwrap();

        registry.mark_instantiation_stale(boxed, &key).unwrap();
        assert!(registry.instantiation(boxed, &key).unwrap().needs_regeneration);

        registry
            .set_instantiation_artifact(boxed, &key, ArtifactId::new("a2"))
            .unwrap();
        let inst = registry.instantiation(boxed, &key).unwrap();
        assert!(!inst.needs_regeneration);
        assert_eq!(inst.artifact, ArtifactId::new("a2"));
    }

    #[test]
    fn artifact_references_cover_selectors_and_instantiations() {
        let mut registry = Registry::new();
        let boxed = registry.add_template(template("g1", "Box`1", &["T"])).unwrap();
        registry
            .set_template_artifact(boxed, Some(ArtifactId::new("sel")))
            .unwrap();
        let key = registry
            .add_instantiation(boxed, &[arg("t1", "Int")], ArtifactId::new("a1"))
            .unwrap();

        assert!(registry.references_artifact(&ArtifactId::new("sel")));
        assert!(registry.references_artifact(&ArtifactId::new("a1")));
        assert!(!registry.references_artifact(&ArtifactId::new("a2")));

        registry.remove_instantiation(boxed, &key).unwrap();
        assert!(!registry.references_artifact(&ArtifactId::new("a1")));
    }
}
