//! Per-declaration lifecycle across reconciliation passes.
//!
//! ```text
//!            Observed          Instantiated
//!  Unknown ----------> Registered <-------> Materialized
//!                          |    Dematerialized    |
//!                          +-------+     +--------+
//!                          Renamed |     | Renamed
//!                                  v     v
//!                           Renamed(prior) --settle--> prior
//!
//!  Registered | Materialized | Renamed --Vanished--> Removed (terminal)
//! ```
//!
//! Transitions are driven by the engine only: the reconciler during a pass,
//! the lifecycle coordinator when an instantiation is requested.

use std::fmt;

use monomorph_registry::{Registry, TemplateId};

/// Where a declaration is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeclarationState {
    /// Not in the registry.
    Unknown,
    /// Template recorded, no instantiations.
    Registered,
    /// At least one concrete instantiation exists.
    Materialized,
    /// Identity preserved and updated in place; remembers the settled state.
    Renamed(Box<DeclarationState>),
    /// All dependent artifacts deleted.
    Removed,
}

/// Something the reconciler observed about a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationEvent {
    /// First seen with no matching prior record.
    Observed,
    /// Gained a concrete instantiation.
    Instantiated,
    /// Lost its last concrete instantiation.
    Dematerialized,
    /// Matched a prior record with a different name, id or parameters.
    Renamed,
    /// No longer observed.
    Vanished,
}

impl DeclarationState {
    /// Settled state of a template currently in the registry.
    pub fn of(registry: &Registry, template: TemplateId) -> Self {
        if registry.template(template).is_none() {
            DeclarationState::Unknown
        } else if registry.instantiations(template).is_empty() {
            DeclarationState::Registered
        } else {
            DeclarationState::Materialized
        }
    }

    /// Apply an event. Returns `None` when the transition is not allowed.
    pub fn on(&self, event: DeclarationEvent) -> Option<DeclarationState> {
        use DeclarationEvent as E;
        use DeclarationState as S;

        match (self, event) {
            (S::Removed, _) => None,
            (S::Unknown, E::Observed) => Some(S::Registered),
            (S::Unknown, _) => None,

            (S::Renamed(prior), E::Renamed) => Some(S::Renamed(prior.clone())),
            (S::Renamed(_), other) => self.clone().settle().on(other),

            (S::Registered | S::Materialized, E::Vanished) => Some(S::Removed),
            (S::Registered | S::Materialized, E::Renamed) => Some(S::Renamed(Box::new(self.clone()))),
            (S::Registered | S::Materialized, E::Instantiated) => Some(S::Materialized),
            (S::Materialized, E::Dematerialized) => Some(S::Registered),
            (S::Registered, E::Dematerialized) | (_, E::Observed) => None,
        }
    }

    /// Resolve a `Renamed` state back to the state it was renamed from.
    pub fn settle(self) -> DeclarationState {
        match self {
            DeclarationState::Renamed(prior) => prior.settle(),
            other => other,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeclarationState::Removed)
    }
}

impl fmt::Display for DeclarationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationState::Unknown => write!(f, "unknown"),
            DeclarationState::Registered => write!(f, "registered"),
            DeclarationState::Materialized => write!(f, "materialized"),
            DeclarationState::Renamed(prior) => write!(f, "renamed ({prior})"),
            DeclarationState::Removed => write!(f, "removed"),
        }
    }
}
