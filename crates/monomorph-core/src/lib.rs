//! Monomorph core types.
//!
//! Leaf value types shared by every layer of the instantiation registry:
//!
//! - [`StableId`] / [`ArtifactId`]: opaque identity tokens
//! - [`QualifiedName`]: rename-sensitive name + module identity
//! - [`TypeIdentity`]: the two-tier identity used for reconciliation matching
//! - [`Fingerprint`]: deterministic structural hash of a generated type
//! - [`TemplateKind`] / [`DeclarationInfo`]: what the declaration scanner reports
//! - [`error`]: the error taxonomy for registry, artifact and snapshot failures

pub mod error;
mod fingerprint;
mod identity;
mod qualified_name;
mod stable_id;
mod template;

pub use error::{ArtifactError, RecordKind, RegistryError, SnapshotError};
pub use fingerprint::{Fingerprint, fingerprint_constants};
pub use identity::{MatchKind, TypeIdentity};
pub use qualified_name::QualifiedName;
pub use stable_id::{ArtifactId, StableId};
pub use template::{DeclarationInfo, TemplateKind};
