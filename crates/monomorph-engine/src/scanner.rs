//! Declaration scanner adapter.
//!
//! The engine never inspects compiled code itself. It asks a
//! [`DeclarationSource`] for the live generic templates of each
//! [`TemplateKind`] and resolves individual argument types by stable id or
//! by name.

use monomorph_core::{DeclarationInfo, QualifiedName, StableId, TemplateKind, TypeIdentity};

/// Snapshot of the currently compiled declarations.
///
/// `scan_templates` must be restartable: calling it twice without an
/// intervening recompile yields the same sequence.
pub trait DeclarationSource {
    /// Enumerate the live generic templates deriving from `kind`.
    fn scan_templates(&self, kind: TemplateKind) -> Box<dyn Iterator<Item = DeclarationInfo> + '_>;

    /// Resolve the live declaration that currently carries `id`.
    fn resolve_by_id(&self, id: &StableId) -> Option<DeclarationInfo>;

    /// Resolve the live declaration with exactly this qualified name.
    fn resolve_by_name(&self, name: &QualifiedName) -> Option<DeclarationInfo>;
}

/// An owned, in-memory set of declarations.
///
/// Used by hosts that collect declarations eagerly and by tests. Templates
/// are reported in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DeclarationSet {
    templates: Vec<(TemplateKind, DeclarationInfo)>,
    types: Vec<DeclarationInfo>,
}

impl DeclarationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a generic template.
    pub fn add_template(
        &mut self,
        kind: TemplateKind,
        identity: TypeIdentity,
        parameter_names: &[&str],
    ) -> &mut Self {
        let params = parameter_names.iter().map(|p| p.to_string()).collect();
        self.templates
            .push((kind, DeclarationInfo::template(identity, params)));
        self
    }

    /// Declare a concrete, non-generic type.
    pub fn add_type(&mut self, identity: TypeIdentity) -> &mut Self {
        self.types.push(DeclarationInfo::plain(identity));
        self
    }

    /// Replace the identity of every declaration currently matching `from`.
    ///
    /// Returns whether a declaration was found.
    pub fn redeclare(&mut self, from: &TypeIdentity, to: TypeIdentity) -> bool {
        let mut found = false;
        for decl in self
            .templates
            .iter_mut()
            .map(|(_, decl)| decl)
            .chain(self.types.iter_mut())
        {
            if decl.identity == *from {
                decl.identity = to.clone();
                found = true;
            }
        }
        found
    }

    /// Replace the parameter names of a template.
    pub fn rename_parameters(&mut self, template: &TypeIdentity, parameter_names: &[&str]) -> bool {
        match self
            .templates
            .iter_mut()
            .find(|(_, decl)| decl.identity == *template)
        {
            Some((_, decl)) => {
                decl.parameter_names = parameter_names.iter().map(|p| p.to_string()).collect();
                true
            }
            None => false,
        }
    }

    /// Remove every declaration with this identity.
    pub fn remove(&mut self, identity: &TypeIdentity) -> bool {
        let before = self.templates.len() + self.types.len();
        self.templates.retain(|(_, decl)| decl.identity != *identity);
        self.types.retain(|decl| decl.identity != *identity);
        before != self.templates.len() + self.types.len()
    }

    fn all(&self) -> impl Iterator<Item = &DeclarationInfo> {
        self.templates
            .iter()
            .map(|(_, decl)| decl)
            .chain(self.types.iter())
    }
}

impl DeclarationSource for DeclarationSet {
    fn scan_templates(&self, kind: TemplateKind) -> Box<dyn Iterator<Item = DeclarationInfo> + '_> {
        Box::new(
            self.templates
                .iter()
                .filter(move |(k, _)| *k == kind)
                .map(|(_, decl)| decl.clone()),
        )
    }

    fn resolve_by_id(&self, id: &StableId) -> Option<DeclarationInfo> {
        if id.is_empty() {
            return None;
        }
        self.all()
            .find(|decl| decl.identity.stable_id == *id)
            .cloned()
    }

    fn resolve_by_name(&self, name: &QualifiedName) -> Option<DeclarationInfo> {
        self.all().find(|decl| decl.identity.name == *name).cloned()
    }
}
