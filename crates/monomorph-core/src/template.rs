//! Declaration types reported by the scanner.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::TypeIdentity;

/// Base category a generic template derives from.
///
/// Component templates are attached to host objects and need a selector
/// artifact so the host can list them before any instantiation exists. Asset
/// templates only ever get concrete instantiations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Component,
    Asset,
}

impl TemplateKind {
    /// All kinds, in reconciliation order.
    pub const ALL: [TemplateKind; 2] = [TemplateKind::Component, TemplateKind::Asset];

    /// Whether templates of this kind own a selector artifact.
    #[inline]
    pub fn has_selector(self) -> bool {
        matches!(self, TemplateKind::Component)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::Component => "component",
            TemplateKind::Asset => "asset",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live declaration as found by the declaration scanner.
///
/// For generic templates `parameter_names` holds the display names of the
/// type parameters; for plain argument types it is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclarationInfo {
    pub identity: TypeIdentity,
    pub parameter_names: Vec<String>,
}

impl DeclarationInfo {
    /// Create a declaration for a generic template.
    pub fn template(identity: TypeIdentity, parameter_names: Vec<String>) -> Self {
        Self {
            identity,
            parameter_names,
        }
    }

    /// Create a declaration for a non-generic type.
    pub fn plain(identity: TypeIdentity) -> Self {
        Self {
            identity,
            parameter_names: Vec::new(),
        }
    }

    /// Number of type parameters.
    #[inline]
    pub fn arity(&self) -> usize {
        self.parameter_names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_components_have_selectors() {
        assert!(TemplateKind::Component.has_selector());
        assert!(!TemplateKind::Asset.has_selector());
    }

    #[test]
    fn declaration_arity() {
        let decl = DeclarationInfo::template(
            TypeIdentity::new("g1", "Map`2"),
            vec!["TKey".into(), "TValue".into()],
        );
        assert_eq!(decl.arity(), 2);
        assert_eq!(DeclarationInfo::plain(TypeIdentity::new("a", "Int")).arity(), 0);
    }
}
