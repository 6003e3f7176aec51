//! Artifact lifecycle coordinator.
//!
//! Executes [`LifecycleEdit`]s against the artifact generator and the asset
//! importer, and records the resulting artifact ids in the registry.
//!
//! ## Replace-in-place
//!
//! ```text
//! Box_Int.asset       (primary, deleted)
//! Box_Int.asset.meta  (id a1) --rename--> Container_Int.asset.meta (id a1)
//!                                         Container_Int.asset      (generated, imported)
//! ```
//!
//! The importer adopts the id found in the sidecar, so references to `a1`
//! keep resolving after the rename. Regenerating a stale record takes the
//! same path.
//!
//! ## Collision policy
//!
//! For a base name `N` the candidates are `N`, `N_1`, `N_2`, ... A candidate
//! is taken when it is free or already belongs to the artifact being
//! replaced. A candidate holding a structurally identical type (same
//! [`Fingerprint`]) that no registry record points at is adopted instead of
//! generating a duplicate.

use monomorph_core::{
    ArtifactError, ArtifactId, Fingerprint, QualifiedName, RecordKind, RegistryError, TypeIdentity,
};
use monomorph_registry::{Registry, TemplateId, TemplateRecord};

use crate::naming;
use crate::plan::{ArtifactTarget, LifecycleEdit};
use crate::reconcile::ReconcileError;
use crate::state::{DeclarationEvent, DeclarationState};

/// What an artifact materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Selector,
    Instantiation,
}

/// Everything the generator needs to produce one artifact.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub kind: ArtifactKind,
    pub template: &'a TemplateRecord,
    /// Concrete arguments, empty for selectors.
    pub arguments: Vec<&'a TypeIdentity>,
    /// Artifact name the bytes will be imported under.
    pub name: &'a str,
    pub fingerprint: Fingerprint,
}

/// Produces compiled artifact bytes.
///
/// Must be deterministic: identical requests yield identical bytes.
pub trait ArtifactGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<u8>, ArtifactError>;
}

/// An artifact already present in the asset index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingArtifact {
    pub id: ArtifactId,
    pub fingerprint: Fingerprint,
}

/// The host's asset index.
pub trait AssetImporter {
    /// Import `bytes` under `name`.
    ///
    /// When a metadata sidecar is already present under `name` its artifact
    /// id is adopted, otherwise a fresh id is minted.
    fn import(
        &mut self,
        bytes: &[u8],
        name: &str,
        fingerprint: Fingerprint,
    ) -> Result<ArtifactId, ArtifactError>;

    /// Delete the primary file and the metadata sidecar.
    fn delete(&mut self, id: &ArtifactId) -> Result<(), ArtifactError>;

    /// Delete the primary file only, keeping the sidecar.
    fn delete_primary(&mut self, id: &ArtifactId) -> Result<(), ArtifactError>;

    /// Move the sidecar of `id` so that it sits under `new_name`.
    fn rename_metadata_only(&mut self, id: &ArtifactId, new_name: &str) -> Result<(), ArtifactError>;

    /// Whether the primary file of `id` is present.
    fn exists(&self, id: &ArtifactId) -> bool;

    /// The artifact currently registered under `name`, if any.
    fn find_by_name(&self, name: &str) -> Option<ExistingArtifact>;
}

/// Result of a creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new artifact was generated and imported.
    Created(ArtifactId),
    /// A structurally identical artifact already existed and was adopted.
    AlreadyExists(ArtifactId),
}

impl CreateOutcome {
    pub fn artifact(&self) -> &ArtifactId {
        match self {
            CreateOutcome::Created(id) | CreateOutcome::AlreadyExists(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Highest numeric suffix tried before a collision is unresolvable.
    pub max_collision_suffix: usize,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            max_collision_suffix: 1000,
        }
    }
}

/// What applying a list of edits did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub created: usize,
    /// Creations satisfied by an existing identical artifact.
    pub adopted: usize,
    pub replaced: usize,
    pub deleted: usize,
    /// Deletes of artifacts that were already gone.
    pub skipped_deletes: usize,
    /// Artifacts found missing and flagged for regeneration on the next pass.
    pub scheduled_regenerations: usize,
    /// Creations that failed without aborting the pass.
    pub failures: Vec<ArtifactError>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.scheduled_regenerations == 0
    }
}

enum NameChoice {
    Free(String),
    /// The candidate already belongs to the artifact being regenerated.
    Own(String),
    Adopt(ExistingArtifact),
}

enum Materialized {
    Imported(ArtifactId),
    Adopted(ArtifactId),
}

/// A target resolved against the registry.
struct Resolved<'r> {
    kind: ArtifactKind,
    template: &'r TemplateRecord,
    arguments: Vec<&'r TypeIdentity>,
    base_name: String,
    fingerprint: Fingerprint,
    current: Option<ArtifactId>,
}

impl<'r> Resolved<'r> {
    fn selector(template: &'r TemplateRecord) -> Self {
        let name = &template.identity.name;
        Resolved {
            kind: ArtifactKind::Selector,
            template,
            arguments: Vec::new(),
            base_name: naming::selector_name(name),
            fingerprint: Fingerprint::selector(name),
            current: template.artifact.clone(),
        }
    }

    fn instantiation(
        template: &'r TemplateRecord,
        arguments: Vec<&'r TypeIdentity>,
        current: Option<ArtifactId>,
    ) -> Self {
        let names: Vec<&QualifiedName> = arguments.iter().map(|arg| &arg.name).collect();
        Resolved {
            kind: ArtifactKind::Instantiation,
            template,
            base_name: naming::instantiation_name(&template.identity.name, &names),
            fingerprint: Fingerprint::instantiation(&template.identity.name, &names),
            arguments,
            current,
        }
    }

    fn of(registry: &'r Registry, target: &ArtifactTarget) -> Result<Self, RegistryError> {
        match target {
            ArtifactTarget::Selector(id) => Ok(Resolved::selector(registry.require_template(*id)?)),
            ArtifactTarget::Instantiation(id, args) => {
                let template = registry.require_template(*id)?;
                let inst = registry
                    .instantiation(*id, args)
                    .ok_or_else(|| RegistryError::not_found(RecordKind::Instantiation, target))?;
                let arguments = registry.argument_identities(args)?;
                Ok(Resolved::instantiation(
                    template,
                    arguments,
                    Some(inst.artifact.clone()),
                ))
            }
        }
    }
}

/// Applies lifecycle edits for one pass.
pub struct LifecycleCoordinator<'a, G: ?Sized, I: ?Sized> {
    generator: &'a G,
    importer: &'a mut I,
    options: CoordinatorOptions,
}

impl<'a, G, I> LifecycleCoordinator<'a, G, I>
where
    G: ArtifactGenerator + ?Sized,
    I: AssetImporter + ?Sized,
{
    pub fn new(generator: &'a G, importer: &'a mut I, options: CoordinatorOptions) -> Self {
        Self {
            generator,
            importer,
            options,
        }
    }

    /// Execute `edits` in order.
    ///
    /// Structural errors and generator/importer failures abort. Unresolvable
    /// name collisions are recorded in the report and the remaining edits
    /// still run. Missing artifacts are flagged for regeneration.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn apply(
        &mut self,
        registry: &mut Registry,
        edits: &[LifecycleEdit],
    ) -> Result<ApplyReport, ReconcileError> {
        let mut report = ApplyReport::default();

        for edit in edits {
            let result = match edit {
                LifecycleEdit::Create(target) => {
                    self.create(registry, target).map(|outcome| match outcome {
                        CreateOutcome::Created(_) => report.created += 1,
                        CreateOutcome::AlreadyExists(_) => report.adopted += 1,
                    })
                }
                LifecycleEdit::Replace { target, artifact } => {
                    if !self.importer.exists(artifact) {
                        let err = ArtifactError::ArtifactMissingOnDisk(artifact.clone());
                        tracing::warn!(error = %err, %target, "scheduling regeneration");
                        mark_stale(registry, target)?;
                        report.scheduled_regenerations += 1;
                        continue;
                    }
                    self.replace(registry, target, artifact)
                        .map(|()| report.replaced += 1)
                }
                LifecycleEdit::Delete(artifact) => {
                    if self.importer.exists(artifact) {
                        tracing::debug!(%artifact, "deleting artifact");
                        self.importer.delete(artifact)?;
                        report.deleted += 1;
                    } else {
                        tracing::debug!(%artifact, "artifact already gone");
                        report.skipped_deletes += 1;
                    }
                    Ok(())
                }
            };

            match result {
                Ok(()) => {}
                Err(ReconcileError::Artifact(
                    err @ ArtifactError::NameCollisionUnresolvable { .. },
                )) => {
                    tracing::warn!(error = %err, "artifact creation failed");
                    report.failures.push(err);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(report)
    }

    /// Materialize one concrete instantiation on demand.
    ///
    /// This is the lazy creation path: instantiations only exist once a
    /// consumer asks for them. An instantiation already in the registry is
    /// returned as [`CreateOutcome::AlreadyExists`].
    ///
    /// The record is added before anything is imported and removed again if
    /// materializing fails, so neither side is left holding an orphan.
    pub fn create_instantiation(
        &mut self,
        registry: &mut Registry,
        template: TemplateId,
        args: &[TypeIdentity],
    ) -> Result<CreateOutcome, ReconcileError> {
        if let Some(inst) = registry.find_instantiation(template, args) {
            return Ok(CreateOutcome::AlreadyExists(inst.artifact.clone()));
        }

        let from = DeclarationState::of(registry, template);
        let key = registry.add_instantiation(template, args, ArtifactId::new(""))?;
        let target = ArtifactTarget::Instantiation(template, key.clone());

        let materialized = match Resolved::of(registry, &target) {
            Ok(mut resolved) => {
                resolved.current = None;
                self.materialize(registry, &resolved, false)
                    .map_err(ReconcileError::from)
            }
            Err(err) => Err(err.into()),
        };
        let outcome = match materialized {
            Ok(Materialized::Imported(id)) => CreateOutcome::Created(id),
            Ok(Materialized::Adopted(id)) => CreateOutcome::AlreadyExists(id),
            Err(err) => {
                registry.remove_instantiation(template, &key)?;
                return Err(err);
            }
        };
        record_artifact(registry, &target, outcome.artifact().clone())?;

        if let Some(to) = from.on(DeclarationEvent::Instantiated)
            && to != from
        {
            tracing::debug!(%template, %from, %to, "state transition");
        }
        tracing::debug!(%target, artifact = %outcome.artifact(), "instantiation requested");
        Ok(outcome)
    }

    fn create(
        &mut self,
        registry: &mut Registry,
        target: &ArtifactTarget,
    ) -> Result<CreateOutcome, ReconcileError> {
        let outcome = {
            let resolved = Resolved::of(registry, target)?;
            // A regeneration reuses the surviving sidecar so the id is kept.
            let in_place = resolved.current.is_some();
            match self.materialize(registry, &resolved, in_place)? {
                Materialized::Imported(id) => CreateOutcome::Created(id),
                Materialized::Adopted(id) => CreateOutcome::AlreadyExists(id),
            }
        };
        tracing::debug!(%target, artifact = %outcome.artifact(), "artifact created");
        record_artifact(registry, target, outcome.artifact().clone())?;
        Ok(outcome)
    }

    fn replace(
        &mut self,
        registry: &mut Registry,
        target: &ArtifactTarget,
        artifact: &ArtifactId,
    ) -> Result<(), ReconcileError> {
        let id = {
            let mut resolved = Resolved::of(registry, target)?;
            resolved.current = Some(artifact.clone());
            match self.materialize(registry, &resolved, true)? {
                Materialized::Imported(id) => {
                    if id != *artifact {
                        tracing::warn!(
                            %target,
                            old = %artifact,
                            new = %id,
                            "importer did not keep the artifact identity"
                        );
                    }
                    id
                }
                Materialized::Adopted(id) => {
                    // An identical artifact already sits under the new name.
                    self.importer.delete(artifact)?;
                    id
                }
            }
        };
        tracing::debug!(%target, artifact = %id, "artifact replaced in place");
        record_artifact(registry, target, id)?;
        Ok(())
    }

    /// Pick a name, then generate and import, or adopt an identical artifact.
    ///
    /// With `in_place`, the current artifact's primary file is deleted and its
    /// sidecar moved to the chosen name once the new bytes are in hand. A
    /// failing generator leaves the current artifact untouched.
    fn materialize(
        &mut self,
        registry: &Registry,
        resolved: &Resolved<'_>,
        in_place: bool,
    ) -> Result<Materialized, ArtifactError> {
        let name = match self.choose_name(registry, resolved)? {
            NameChoice::Adopt(existing) => return Ok(Materialized::Adopted(existing.id)),
            NameChoice::Free(name) | NameChoice::Own(name) => name,
        };

        let request = GenerationRequest {
            kind: resolved.kind,
            template: resolved.template,
            arguments: resolved.arguments.clone(),
            name: &name,
            fingerprint: resolved.fingerprint,
        };
        let bytes = self.generator.generate(&request)?;

        if in_place && let Some(current) = &resolved.current {
            self.importer.delete_primary(current)?;
            self.importer.rename_metadata_only(current, &name)?;
        }
        let id = self.importer.import(&bytes, &name, resolved.fingerprint)?;
        Ok(Materialized::Imported(id))
    }

    /// First usable candidate name.
    ///
    /// An identical artifact is adopted only when no registry record points
    /// at it. One still owned by a live record, e.g. the other side of a name
    /// swap, counts as a collision.
    fn choose_name(
        &self,
        registry: &Registry,
        resolved: &Resolved<'_>,
    ) -> Result<NameChoice, ArtifactError> {
        let max = self.options.max_collision_suffix;
        for attempt in 0..=max {
            let name = naming::candidate(&resolved.base_name, attempt);
            match self.importer.find_by_name(&name) {
                None => return Ok(NameChoice::Free(name)),
                Some(existing) if resolved.current.as_ref() == Some(&existing.id) => {
                    return Ok(NameChoice::Own(name));
                }
                Some(existing)
                    if existing.fingerprint == resolved.fingerprint
                        && !registry.references_artifact(&existing.id) =>
                {
                    return Ok(NameChoice::Adopt(existing));
                }
                Some(_) => {}
            }
        }
        Err(ArtifactError::NameCollisionUnresolvable {
            name: resolved.base_name.clone(),
            attempts: max + 1,
        })
    }
}

fn record_artifact(
    registry: &mut Registry,
    target: &ArtifactTarget,
    artifact: ArtifactId,
) -> Result<(), RegistryError> {
    match target {
        ArtifactTarget::Selector(id) => registry.set_template_artifact(*id, Some(artifact)),
        ArtifactTarget::Instantiation(id, args) => {
            registry.set_instantiation_artifact(*id, args, artifact)
        }
    }
}

fn mark_stale(registry: &mut Registry, target: &ArtifactTarget) -> Result<(), RegistryError> {
    match target {
        ArtifactTarget::Selector(id) => registry.mark_selector_stale(*id),
        ArtifactTarget::Instantiation(id, args) => registry.mark_instantiation_stale(*id, args),
    }
}
