//! Persisted registry storage.
//!
//! A [`SnapshotStore`] holds one flattened [`RegistrySnapshot`] that survives
//! process restarts. It is written once at the end of a successful pass.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use monomorph_registry::RegistrySnapshot;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed registry file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistError {
    /// Whether the stored bytes exist but cannot be decoded.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, PersistError::Json { .. })
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        PersistError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Opaque storage for the flattened registry.
pub trait SnapshotStore {
    /// The last saved snapshot, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<RegistrySnapshot>, PersistError>;

    fn save(&mut self, snapshot: &RegistrySnapshot) -> Result<(), PersistError>;
}

/// Stores the snapshot as pretty-printed JSON.
///
/// Saving writes a sibling temp file and renames it over the target, so a
/// crash mid-save leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<RegistrySnapshot>, PersistError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(PersistError::io(&self.path, err)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| PersistError::Json {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&mut self, snapshot: &RegistrySnapshot) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| PersistError::io(parent, err))?;
        }
        let json = serde_json::to_string_pretty(snapshot).map_err(|source| PersistError::Json {
            path: self.path.clone(),
            source,
        })?;
        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|err| PersistError::io(&temp, err))?;
        fs::rename(&temp, &self.path).map_err(|err| PersistError::io(&self.path, err))?;
        tracing::debug!(path = %self.path.display(), "registry saved");
        Ok(())
    }
}

/// Keeps the snapshot in memory. Counts saves.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshot: Option<RegistrySnapshot>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot.
    pub fn with_snapshot(snapshot: RegistrySnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            saves: 0,
        }
    }

    pub fn snapshot(&self) -> Option<&RegistrySnapshot> {
        self.snapshot.as_ref()
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<RegistrySnapshot>, PersistError> {
        Ok(self.snapshot.clone())
    }

    fn save(&mut self, snapshot: &RegistrySnapshot) -> Result<(), PersistError> {
        self.snapshot = Some(snapshot.clone());
        self.saves += 1;
        Ok(())
    }
}
