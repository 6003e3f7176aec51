//! Monomorph registry crate.
//!
//! Owns every template, argument and concrete instantiation record and the
//! bidirectional indexes between them:
//!
//! - [`Registry`]: the store and its mutating operations
//! - [`RegistrySnapshot`]: the flat, persistable form produced by
//!   [`Registry::flatten`] and consumed by [`Registry::rehydrate`]
//! - [`LookupTable`]: read-optimized dictionary rebuilt after each pass

mod lookup;
mod records;
mod registry;
mod snapshot;

pub use lookup::LookupTable;
pub use records::{ArgList, ArgumentId, ArgumentRecord, InstantiationRecord, TemplateId, TemplateRecord};
pub use registry::{Registry, RemovedTemplate};
pub use snapshot::{IdentityRow, InstantiationRow, RegistrySnapshot, SNAPSHOT_VERSION, TemplateRow};
