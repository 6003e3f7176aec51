//! Read-optimized runtime dictionary.
//!
//! Built once from the registry at the end of a reconciliation pass and
//! never mutated afterwards. A new pass builds a new table.

use rustc_hash::FxHashMap;

use monomorph_core::{ArtifactId, QualifiedName};

use crate::registry::Registry;

type InstantiationKey = (QualifiedName, Box<[QualifiedName]>);

/// `(template name, argument names) -> artifact` and `template name -> selector`.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    instantiations: FxHashMap<InstantiationKey, ArtifactId>,
    selectors: FxHashMap<QualifiedName, ArtifactId>,
}

impl LookupTable {
    /// Build the dictionary from a registry.
    ///
    /// Instantiations flagged for regeneration still resolve to their last
    /// known artifact id; the importer keeps that id across regeneration.
    pub fn build(registry: &Registry) -> Self {
        let mut table = LookupTable::default();

        for (id, template) in registry.templates() {
            if let Some(selector) = &template.artifact {
                table
                    .selectors
                    .insert(template.identity.name.clone(), selector.clone());
            }

            for inst in registry.instantiations(id) {
                let Ok(args) = registry.argument_identities(&inst.arguments) else {
                    tracing::warn!(
                        template = %template.identity.name,
                        "skipping instantiation with dangling argument"
                    );
                    continue;
                };
                let key = (
                    template.identity.name.clone(),
                    args.into_iter().map(|a| a.name.clone()).collect(),
                );
                table.instantiations.insert(key, inst.artifact.clone());
            }
        }

        table
    }

    /// Resolve a concrete instantiation by template and argument names.
    pub fn instantiation(
        &self,
        template: &QualifiedName,
        args: &[QualifiedName],
    ) -> Option<&ArtifactId> {
        // Tuple keys need an owned lookup key.
        let key: InstantiationKey = (template.clone(), args.to_vec().into_boxed_slice());
        self.instantiations.get(&key)
    }

    /// Resolve a template's selector artifact.
    pub fn selector(&self, template: &QualifiedName) -> Option<&ArtifactId> {
        self.selectors.get(template)
    }

    /// Number of instantiation entries.
    pub fn len(&self) -> usize {
        self.instantiations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instantiations.is_empty() && self.selectors.is_empty()
    }

    /// Iterate over every instantiation entry.
    pub fn iter(&self) -> impl Iterator<Item = (&QualifiedName, &[QualifiedName], &ArtifactId)> {
        self.instantiations
            .iter()
            .map(|((template, args), artifact)| (template, &args[..], artifact))
    }
}
