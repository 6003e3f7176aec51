use thiserror::Error;

use monomorph_core::{ArtifactError, QualifiedName, RegistryError};
use monomorph_engine::ReconcileError;

use crate::config::ConfigError;
use crate::persistence::PersistError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("no template named {0}")]
    UnknownTemplate(QualifiedName),

    /// Instantiations were requested before the first pass completed.
    #[error("reconciliation has not run yet")]
    NotReconciled,
}

impl From<RegistryError> for Error {
    fn from(err: RegistryError) -> Self {
        Error::Reconcile(err.into())
    }
}

impl From<ArtifactError> for Error {
    fn from(err: ArtifactError) -> Self {
        Error::Reconcile(err.into())
    }
}

impl Error {
    /// The artifact error behind this error, if any.
    pub fn as_artifact_error(&self) -> Option<&ArtifactError> {
        match self {
            Error::Reconcile(ReconcileError::Artifact(err)) => Some(err),
            _ => None,
        }
    }
}
