//! Monomorph reconciliation engine.
//!
//! ## Architecture
//!
//! - **Reconciliation** ([`Reconciler`]): diff the persisted registry against
//!   a fresh [`DeclarationSource`] scan and emit an ordered
//!   [`ReconcilePlan`] of lifecycle edits
//! - **Application** ([`LifecycleCoordinator`]): execute the edits against an
//!   [`ArtifactGenerator`] and an [`AssetImporter`], recording artifact ids
//!
//! ## Modules
//!
//! - [`scanner`]: declaration scanner adapter
//! - [`matching`]: two-tier matching and [`MatchPolicy`]
//! - [`diff`]: template set difference
//! - [`naming`]: deterministic artifact names
//! - [`plan`]: lifecycle edits and reports
//! - [`state`]: per-declaration lifecycle states
//! - [`coordinator`]: artifact lifecycle coordinator

mod arguments;
pub mod coordinator;
pub mod diff;
pub mod matching;
pub mod naming;
pub mod plan;
mod reconcile;
pub mod scanner;
pub mod state;

pub use coordinator::{
    ApplyReport, ArtifactGenerator, ArtifactKind, AssetImporter, CoordinatorOptions, CreateOutcome,
    ExistingArtifact, GenerationRequest, LifecycleCoordinator,
};
pub use diff::{IdentityDelta, TemplateChange};
pub use matching::MatchPolicy;
pub use plan::{ArtifactTarget, LifecycleEdit, ReconcilePlan, ReconcileReport, StateTransition};
pub use reconcile::{ReconcileError, ReconcileOptions, Reconciler};
pub use scanner::{DeclarationSet, DeclarationSource};
pub use state::{DeclarationEvent, DeclarationState};
