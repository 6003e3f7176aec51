//! Reconciliation session.
//!
//! A [`Session`] owns the four collaborators of a pass and runs them in a
//! fixed order:
//!
//! ```text
//! store.load ─► rehydrate ─► Reconciler ─► LifecycleCoordinator ─► store.save ─► LookupTable
//! ```
//!
//! The registry is saved exactly once, after every edit has been applied.
//! A pass that fails before that point leaves the stored snapshot untouched.

use monomorph_core::{QualifiedName, TypeIdentity};
use monomorph_engine::{
    ApplyReport, ArtifactGenerator, AssetImporter, CreateOutcome, DeclarationSource,
    LifecycleCoordinator, ReconcileReport, Reconciler,
};
use monomorph_registry::{LookupTable, Registry};

use crate::config::MonomorphConfig;
use crate::error::{Error, Result};
use crate::persistence::SnapshotStore;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub report: ReconcileReport,
    pub apply: ApplyReport,
    pub edits: usize,
}

impl PassSummary {
    /// Whether consumers of the lookup table need to refresh.
    pub fn changed(&self) -> bool {
        self.report.changed()
            || self.apply.created + self.apply.replaced + self.apply.deleted > 0
    }
}

pub struct Session<P, G, I, S> {
    config: MonomorphConfig,
    source: P,
    generator: G,
    importer: I,
    store: S,
    lookup: Option<LookupTable>,
}

impl<P, G, I, S> Session<P, G, I, S>
where
    P: DeclarationSource,
    G: ArtifactGenerator,
    I: AssetImporter,
    S: SnapshotStore,
{
    pub fn new(config: MonomorphConfig, source: P, generator: G, importer: I, store: S) -> Self {
        Self {
            config,
            source,
            generator,
            importer,
            store,
            lookup: None,
        }
    }

    /// Run one full pass and publish a fresh lookup table.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run_reconciliation(&mut self) -> Result<PassSummary> {
        let mut registry = self.load_registry()?;

        let plan = Reconciler::new(self.config.reconcile_options())
            .reconcile(&mut registry, &self.source)?;
        let apply = LifecycleCoordinator::new(
            &self.generator,
            &mut self.importer,
            self.config.coordinator_options(),
        )
        .apply(&mut registry, &plan.edits)?;

        self.store.save(&registry.flatten())?;
        self.lookup = Some(LookupTable::build(&registry));

        let summary = PassSummary {
            edits: plan.edits.len(),
            report: plan.report,
            apply,
        };
        tracing::info!(
            edits = summary.edits,
            created = summary.apply.created,
            replaced = summary.apply.replaced,
            deleted = summary.apply.deleted,
            failures = summary.apply.failures.len(),
            changed = summary.changed(),
            "reconciliation pass complete"
        );
        Ok(summary)
    }

    /// Materialize `template<arguments>` on demand.
    ///
    /// Only valid after a completed pass. The registry is saved and the lookup
    /// table rebuilt when a new record is added.
    pub fn request_instantiation(
        &mut self,
        template: &QualifiedName,
        arguments: &[TypeIdentity],
    ) -> Result<CreateOutcome> {
        if self.lookup.is_none() {
            return Err(Error::NotReconciled);
        }

        let mut registry = self.load_registry()?;
        let id = registry
            .find_template_by_name(template)
            .ok_or_else(|| Error::UnknownTemplate(template.clone()))?;
        let known = registry.find_instantiation(id, arguments).is_some();

        let outcome = LifecycleCoordinator::new(
            &self.generator,
            &mut self.importer,
            self.config.coordinator_options(),
        )
        .create_instantiation(&mut registry, id, arguments)?;

        if !known {
            self.store.save(&registry.flatten())?;
            self.lookup = Some(LookupTable::build(&registry));
        }
        Ok(outcome)
    }

    /// The table published by the last pass, `None` before the first one.
    pub fn lookup(&self) -> Option<&LookupTable> {
        self.lookup.as_ref()
    }

    pub fn config(&self) -> &MonomorphConfig {
        &self.config
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    /// Mutable access to the declarations, e.g. to simulate an edit.
    pub fn source_mut(&mut self) -> &mut P {
        &mut self.source
    }

    pub fn importer(&self) -> &I {
        &self.importer
    }

    pub fn importer_mut(&mut self) -> &mut I {
        &mut self.importer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Rehydrate the stored registry.
    ///
    /// Missing state starts empty. Corrupt state is logged and also starts
    /// empty; every artifact is then rediscovered on the next pass.
    pub fn load_registry(&self) -> Result<Registry> {
        match self.store.load() {
            Ok(Some(snapshot)) => Ok(Registry::rehydrate_or_empty(snapshot)),
            Ok(None) => Ok(Registry::new()),
            Err(err) if err.is_corrupt() => {
                tracing::warn!(error = %err, "discarding unreadable registry");
                Ok(Registry::new())
            }
            Err(err) => Err(err.into()),
        }
    }
}
