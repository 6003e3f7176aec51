use std::fmt;

use serde::{Deserialize, Serialize};

/// Rename-sensitive identity of a declaration.
///
/// A fully-qualified name (namespace path + simple name) together with the
/// module that contains the declaration. Changes whenever the declaration is
/// renamed or moved, and is always present.
///
/// # Examples
///
/// ```
/// use monomorph_core::QualifiedName;
///
/// let boxed = QualifiedName::new("Box`1", vec!["Game".into()], "Game.Runtime");
/// assert_eq!(boxed.to_string(), "Game::Box`1 [Game.Runtime]");
/// assert_eq!(boxed.short_name(), "Box");
///
/// let int = QualifiedName::from_qualified_string("System::Int32");
/// assert_eq!(int.full_name(), "System::Int32");
/// assert!(int.module.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Simple name, possibly carrying an arity marker (e.g. "Box`1")
    pub name: String,
    /// Namespace path (e.g. ["Game", "Items"]), empty for the global namespace
    pub namespace: Vec<String>,
    /// Containing module (assembly), empty when unknown
    pub module: String,
}

impl QualifiedName {
    /// Create a new qualified name.
    pub fn new(name: impl Into<String>, namespace: Vec<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace,
            module: module.into(),
        }
    }

    /// Create a qualified name in the global namespace with no module.
    pub fn global(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new(), String::new())
    }

    /// Create from a qualified string (e.g., "Game::Box`1").
    ///
    /// Splits on "::" - the last segment is the name, rest is namespace.
    /// Leading "::" is normalized: "::Game::Box" == "Game::Box".
    pub fn from_qualified_string(s: &str) -> Self {
        let mut parts: Vec<String> = s
            .split("::")
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        let name = parts.pop().unwrap_or_default();
        Self::new(name, parts, String::new())
    }

    /// Replace the containing module.
    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Check if this is in the global namespace.
    pub fn is_global(&self) -> bool {
        self.namespace.is_empty()
    }

    /// Get the simple name, arity marker included.
    pub fn simple_name(&self) -> &str {
        &self.name
    }

    /// Get the simple name without its arity marker.
    ///
    /// `` Box`1 `` becomes `Box`; a backtick not followed only by digits is kept.
    pub fn short_name(&self) -> &str {
        match self.name.rfind('`') {
            Some(pos)
                if pos > 0
                    && pos + 1 < self.name.len()
                    && self.name[pos + 1..].bytes().all(|b| b.is_ascii_digit()) =>
            {
                &self.name[..pos]
            }
            _ => &self.name,
        }
    }

    /// Get the namespace as a joined string.
    pub fn namespace_string(&self) -> String {
        self.namespace.join("::")
    }

    /// Namespace + simple name, without the module.
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.namespace.join("::"), self.name)
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())?;
        if !self.module.is_empty() {
            write!(f, " [{}]", self.module)?;
        }
        Ok(())
    }
}

impl From<&str> for QualifiedName {
    fn from(s: &str) -> Self {
        Self::from_qualified_string(s)
    }
}

impl From<String> for QualifiedName {
    fn from(s: String) -> Self {
        Self::from_qualified_string(&s)
    }
}
