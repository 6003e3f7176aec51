//! Directory-backed asset index.
//!
//! Each artifact is a primary file plus a JSON metadata sidecar:
//!
//! ```text
//! <root>/Box_Int.asset        generated bytes
//! <root>/Box_Int.asset.meta   {"id": "...", "fingerprint": ...}
//! ```
//!
//! The sidecar carries the artifact id. Importing over an existing sidecar
//! adopts its id, which is what keeps references stable when an artifact is
//! renamed in place.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use monomorph_core::{ArtifactError, ArtifactId, Fingerprint};
use monomorph_engine::{AssetImporter, ExistingArtifact};

use crate::persistence::PersistError;

const META_SUFFIX: &str = ".meta";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ArtifactMeta {
    id: ArtifactId,
    fingerprint: Fingerprint,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    name: String,
    fingerprint: Fingerprint,
}

/// [`AssetImporter`] over a flat directory.
#[derive(Debug)]
pub struct DirectoryAssetStore {
    root: PathBuf,
    extension: String,
    by_id: FxHashMap<ArtifactId, IndexEntry>,
    by_name: FxHashMap<String, ArtifactId>,
}

impl DirectoryAssetStore {
    /// Open `root`, creating it if needed, and index the sidecars in it.
    ///
    /// Unreadable sidecars are skipped with a warning.
    pub fn open(root: impl Into<PathBuf>, extension: impl Into<String>) -> Result<Self, PersistError> {
        let root = root.into();
        let extension = extension.into();
        fs::create_dir_all(&root).map_err(|err| PersistError::io(&root, err))?;

        let mut store = Self {
            root,
            extension,
            by_id: FxHashMap::default(),
            by_name: FxHashMap::default(),
        };

        let suffix = format!(".{}{}", store.extension, META_SUFFIX);
        let entries = fs::read_dir(&store.root).map_err(|err| PersistError::io(&store.root, err))?;
        for entry in entries {
            let path = entry.map_err(|err| PersistError::io(&store.root, err))?.path();
            let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(&suffix))
                .map(str::to_string)
            else {
                continue;
            };
            match read_meta(&path) {
                Ok(meta) => store.index(meta.id, name, meta.fingerprint),
                Err(err) => tracing::warn!(path = %path.display(), error = %err, "skipping unreadable sidecar"),
            }
        }

        tracing::debug!(root = %store.root.display(), artifacts = store.by_id.len(), "asset index opened");
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Name the artifact is currently filed under.
    pub fn name_of(&self, id: &ArtifactId) -> Option<&str> {
        self.by_id.get(id).map(|e| e.name.as_str())
    }

    pub fn primary_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{}", self.extension))
    }

    pub fn meta_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{}{META_SUFFIX}", self.extension))
    }

    /// Read the generated bytes of an artifact.
    pub fn read(&self, id: &ArtifactId) -> Option<Vec<u8>> {
        let name = self.name_of(id)?;
        fs::read(self.primary_path(name)).ok()
    }

    fn index(&mut self, id: ArtifactId, name: String, fingerprint: Fingerprint) {
        if let Some(previous) = self.by_name.insert(name.clone(), id.clone())
            && previous != id
        {
            self.by_id.remove(&previous);
        }
        if let Some(old) = self.by_id.insert(id, IndexEntry { name: name.clone(), fingerprint })
            && old.name != name
        {
            self.by_name.remove(&old.name);
        }
    }
}

impl AssetImporter for DirectoryAssetStore {
    fn import(
        &mut self,
        bytes: &[u8],
        name: &str,
        fingerprint: Fingerprint,
    ) -> Result<ArtifactId, ArtifactError> {
        let meta_path = self.meta_path(name);
        let id = match self.by_name.get(name) {
            Some(id) => id.clone(),
            None => ArtifactId::new(uuid::Uuid::new_v4().to_string()),
        };

        fs::write(self.primary_path(name), bytes).map_err(|err| import_error(name, err))?;
        let meta = ArtifactMeta {
            id: id.clone(),
            fingerprint,
        };
        let json = serde_json::to_string_pretty(&meta).map_err(|err| import_error(name, err))?;
        fs::write(&meta_path, json).map_err(|err| import_error(name, err))?;

        self.index(id.clone(), name.to_string(), fingerprint);
        tracing::trace!(%id, name, "artifact imported");
        Ok(id)
    }

    fn delete(&mut self, id: &ArtifactId) -> Result<(), ArtifactError> {
        let Some(entry) = self.by_id.remove(id) else {
            return Ok(());
        };
        self.by_name.remove(&entry.name);
        remove_if_present(&self.primary_path(&entry.name)).map_err(|err| import_error(id, err))?;
        remove_if_present(&self.meta_path(&entry.name)).map_err(|err| import_error(id, err))?;
        Ok(())
    }

    fn delete_primary(&mut self, id: &ArtifactId) -> Result<(), ArtifactError> {
        let Some(entry) = self.by_id.get(id) else {
            return Ok(());
        };
        remove_if_present(&self.primary_path(&entry.name)).map_err(|err| import_error(id, err))
    }

    /// A no-op for ids the index does not know; the next import mints a new id.
    fn rename_metadata_only(&mut self, id: &ArtifactId, new_name: &str) -> Result<(), ArtifactError> {
        let Some(entry) = self.by_id.get(id).cloned() else {
            tracing::debug!(%id, "no sidecar to move");
            return Ok(());
        };
        if entry.name == new_name {
            return Ok(());
        }
        if self.by_name.contains_key(new_name) {
            return Err(ArtifactError::Import {
                target: new_name.to_string(),
                message: "sidecar name is already taken".to_string(),
            });
        }
        fs::rename(self.meta_path(&entry.name), self.meta_path(new_name))
            .map_err(|err| import_error(id, err))?;
        self.index(id.clone(), new_name.to_string(), entry.fingerprint);
        tracing::trace!(%id, from = %entry.name, to = new_name, "sidecar moved");
        Ok(())
    }

    fn exists(&self, id: &ArtifactId) -> bool {
        self.by_id
            .get(id)
            .is_some_and(|entry| self.primary_path(&entry.name).is_file())
    }

    fn find_by_name(&self, name: &str) -> Option<ExistingArtifact> {
        let id = self.by_name.get(name)?;
        self.by_id.get(id).map(|entry| ExistingArtifact {
            id: id.clone(),
            fingerprint: entry.fingerprint,
        })
    }
}

fn read_meta(path: &Path) -> Result<ArtifactMeta, String> {
    let text = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&text).map_err(|err| err.to_string())
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

fn import_error(target: impl ToString, err: impl std::fmt::Display) -> ArtifactError {
    ArtifactError::Import {
        target: target.to_string(),
        message: err.to_string(),
    }
}
