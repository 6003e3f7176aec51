//! Error types for the instantiation registry.
//!
//! ## Error Hierarchy
//!
//! ```text
//! RegistryError  - structural errors; abort the current pass
//! ArtifactError  - artifact generation / asset index errors
//! SnapshotError  - persisted registry state could not be rehydrated
//! ```
//!
//! Structural errors signal a broken invariant and are never caught inside
//! the engine. Environmental errors (a missing artifact, a corrupt snapshot)
//! are recovered where they are detected and self-heal on a later pass.

use std::fmt;

use thiserror::Error;

use crate::ArtifactId;

/// The kind of registry record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Template,
    Argument,
    Instantiation,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Template => write!(f, "template"),
            RecordKind::Argument => write!(f, "argument"),
            RecordKind::Instantiation => write!(f, "instantiation"),
        }
    }
}

/// Errors raised by registry store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// An operation referenced a record that is not in the registry.
    #[error("{kind} not found: {key}")]
    IdentityNotFound {
        /// What kind of record was looked up.
        kind: RecordKind,
        /// Display form of the key that was looked up.
        key: String,
    },

    /// A template with a matching identity is already registered.
    #[error("duplicate template: {0}")]
    DuplicateTemplate(String),

    /// An instantiation with the same ordered argument list already exists.
    #[error("duplicate instantiation: {template}<{arguments}>")]
    DuplicateInstantiation {
        /// The template name.
        template: String,
        /// The argument names, comma separated.
        arguments: String,
    },

    /// The number of arguments does not match the template's parameters.
    #[error("template '{template}' takes {expected} type arguments, got {found}")]
    ArityMismatch {
        /// The template name.
        template: String,
        /// Declared number of parameters.
        expected: usize,
        /// Number of arguments supplied.
        found: usize,
    },
}

impl RegistryError {
    /// Shorthand for [`RegistryError::IdentityNotFound`].
    pub fn not_found(kind: RecordKind, key: impl fmt::Display) -> Self {
        RegistryError::IdentityNotFound {
            kind,
            key: key.to_string(),
        }
    }
}

/// Errors raised while generating, importing or deleting artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    /// The registry references an artifact whose primary file is absent.
    #[error("artifact missing on disk: {0}")]
    ArtifactMissingOnDisk(ArtifactId),

    /// No free artifact name could be found for a creation.
    #[error("artifact name '{name}' collides with a different type ({attempts} names tried)")]
    NameCollisionUnresolvable {
        /// The base name that was requested.
        name: String,
        /// How many candidate names were tried.
        attempts: usize,
    },

    /// The artifact generator failed.
    #[error("failed to generate '{name}': {message}")]
    Generation {
        /// The artifact name being generated.
        name: String,
        /// Generator-provided detail.
        message: String,
    },

    /// The asset importer failed.
    #[error("asset index operation failed for '{target}': {message}")]
    Import {
        /// Artifact id or name the operation targeted.
        target: String,
        /// Importer-provided detail.
        message: String,
    },
}

impl ArtifactError {
    /// Check if this error is recovered locally by scheduling a regeneration.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ArtifactError::ArtifactMissingOnDisk(_))
    }
}

/// Errors raised while rehydrating a persisted registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// The persisted tables are inconsistent with each other.
    #[error("corrupt persisted registry state: {0}")]
    CorruptPersistedState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_not_found_display() {
        let err = RegistryError::not_found(RecordKind::Template, "Game::Box");
        assert_eq!(err.to_string(), "template not found: Game::Box");
    }

    #[test]
    fn duplicate_instantiation_display() {
        let err = RegistryError::DuplicateInstantiation {
            template: "Box".into(),
            arguments: "Int".into(),
        };
        assert_eq!(err.to_string(), "duplicate instantiation: Box<Int>");
    }

    #[test]
    fn only_missing_artifacts_are_recoverable() {
        assert!(ArtifactError::ArtifactMissingOnDisk(ArtifactId::new("a1")).is_recoverable());
        assert!(
            !ArtifactError::NameCollisionUnresolvable {
                name: "Box".into(),
                attempts: 3
            }
            .is_recoverable()
        );
    }

    #[test]
    fn snapshot_error_display() {
        let err = SnapshotError::CorruptPersistedState("2 templates, 1 instantiation list".into());
        assert!(err.to_string().starts_with("corrupt persisted registry state"));
    }
}
