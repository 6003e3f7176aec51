//! Persistent registry of generic template instantiations.
//!
//! Hosts that only run pre-compiled code cannot instantiate generics at
//! runtime. Monomorph keeps a registry of every concrete instantiation that
//! has been requested, reconciles it against the live declarations after
//! every rebuild, and keeps the generated artifacts on disk in sync.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ monomorph (this crate)                      │
//! │   Session, config, persistence, assets      │
//! ├─────────────────────────────────────────────┤
//! │ monomorph-engine                            │
//! │   Reconciler, LifecycleCoordinator          │
//! ├─────────────────────────────────────────────┤
//! │ monomorph-registry                          │
//! │   Registry, RegistrySnapshot, LookupTable   │
//! ├─────────────────────────────────────────────┤
//! │ monomorph-core                              │
//! │   TypeIdentity, Fingerprint, errors         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use monomorph::prelude::*;
//!
//! let config = MonomorphConfig::load("monomorph.toml")?;
//! let importer = DirectoryAssetStore::open("Generated", config.artifact_extension.clone())?;
//! let store = JsonFileStore::new(config.registry_file.clone());
//! let mut session = Session::new(config, scanner, generator, importer, store);
//!
//! let summary = session.run_reconciliation()?;
//! if summary.changed() {
//!     refresh(session.lookup());
//! }
//! ```

pub mod assets;
pub mod config;
pub mod error;
pub mod persistence;
pub mod session;

pub use assets::DirectoryAssetStore;
pub use config::{ConfigError, MonomorphConfig};
pub use error::{Error, Result};
pub use persistence::{JsonFileStore, MemoryStore, PersistError, SnapshotStore};
pub use session::{PassSummary, Session};

pub use monomorph_core as core;
pub use monomorph_engine as engine;
pub use monomorph_registry as registry;

pub mod prelude {
    pub use crate::assets::DirectoryAssetStore;
    pub use crate::config::MonomorphConfig;
    pub use crate::error::{Error, Result};
    pub use crate::persistence::{JsonFileStore, MemoryStore, SnapshotStore};
    pub use crate::session::{PassSummary, Session};
    pub use monomorph_core::{
        ArtifactError, ArtifactId, DeclarationInfo, Fingerprint, QualifiedName, StableId,
        TemplateKind, TypeIdentity,
    };
    pub use monomorph_engine::{
        ArtifactGenerator, AssetImporter, CreateOutcome, DeclarationSet, DeclarationSource,
        ExistingArtifact, GenerationRequest, MatchPolicy,
    };
    pub use monomorph_registry::{LookupTable, Registry};
}
