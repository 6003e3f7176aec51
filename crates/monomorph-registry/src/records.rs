//! Registry record types and arena ids.

use std::fmt;

use monomorph_core::{ArtifactId, TemplateKind, TypeIdentity};

/// Arena index of a template record.
///
/// Allocated by the registry, stable for the lifetime of one in-memory
/// registry, and reassigned on rehydration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(u32);

impl TemplateId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template_{}", self.0)
    }
}

/// Arena index of an argument record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArgumentId(u32);

impl ArgumentId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ArgumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "argument_{}", self.0)
    }
}

/// Ordered list of interned arguments, the key of an instantiation.
///
/// Order is significant: `Map<Key, Value>` and `Map<Value, Key>` are
/// different keys. Because arguments are interned, renaming an argument
/// never changes the keys that reference it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArgList(Box<[ArgumentId]>);

impl ArgList {
    pub fn new(ids: impl Into<Box<[ArgumentId]>>) -> Self {
        Self(ids.into())
    }

    #[inline]
    pub fn as_slice(&self) -> &[ArgumentId] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: ArgumentId) -> bool {
        self.0.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = ArgumentId> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<ArgumentId>> for ArgList {
    fn from(ids: Vec<ArgumentId>) -> Self {
        Self(ids.into_boxed_slice())
    }
}

/// One generic type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRecord {
    pub identity: TypeIdentity,
    pub kind: TemplateKind,
    /// Display names of the type parameters; its length is the arity.
    pub parameter_names: Vec<String>,
    /// Generated selector artifact, once materialized.
    pub artifact: Option<ArtifactId>,
    /// The selector artifact was found missing and must be regenerated.
    pub selector_stale: bool,
}

impl TemplateRecord {
    pub fn new(identity: TypeIdentity, kind: TemplateKind, parameter_names: Vec<String>) -> Self {
        Self {
            identity,
            kind,
            parameter_names,
            artifact: None,
            selector_stale: false,
        }
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.parameter_names.len()
    }

    /// Full-record equality against a live declaration: identity, name and
    /// parameter names all equal.
    pub fn same_record(&self, identity: &TypeIdentity, parameter_names: &[String]) -> bool {
        self.identity == *identity && self.parameter_names == parameter_names
    }
}

/// One concrete type usable as an instantiation argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentRecord {
    pub identity: TypeIdentity,
}

/// One materialized template instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantiationRecord {
    pub arguments: ArgList,
    pub artifact: ArtifactId,
    /// The artifact was found missing and must be regenerated.
    pub needs_regeneration: bool,
}

impl InstantiationRecord {
    pub fn new(arguments: ArgList, artifact: ArtifactId) -> Self {
        Self {
            arguments,
            artifact,
            needs_regeneration: false,
        }
    }
}
