//! Deterministic structural fingerprints of generated types.
//!
//! A [`Fingerprint`] is a 64-bit hash computed from the qualified names that
//! make up a generated type: for a selector, the template alone; for an
//! instantiation, the template plus its ordered argument list. Two artifacts
//! with the same fingerprint describe structurally identical types, which is
//! what the artifact collision policy uses to tell a redundant creation apart
//! from a genuine name clash.
//!
//! # Hash Computation
//!
//! Uses XXHash64 with domain-specific mixing constants so a selector and an
//! instantiation never share a fingerprint, and argument order matters.
//!
//! ```
//! use monomorph_core::{Fingerprint, QualifiedName};
//!
//! let list = QualifiedName::from("Game::List`1");
//! let int = QualifiedName::from("System::Int32");
//! let float = QualifiedName::from("System::Single");
//!
//! let a = Fingerprint::instantiation(&list, &[&int]);
//! let b = Fingerprint::instantiation(&list, &[&float]);
//! assert_ne!(a, b);
//! assert_eq!(a, Fingerprint::instantiation(&list, &[&int]));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

use crate::QualifiedName;

/// Domain-specific mixing constants for fingerprint computation.
pub mod fingerprint_constants {
    /// Separator constant between components
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for selector fingerprints
    pub const SELECTOR: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for instantiation fingerprints
    pub const INSTANTIATION: u64 = 0x5ea77ffbcdf5f302;

    /// Domain marker for the module component of a name
    pub const MODULE: u64 = 0x1a095090689d4647;

    /// Argument position mixing constants.
    /// Each position gets its own constant so argument order matters.
    pub const PARAM_MARKERS: [u64; 8] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
    ];
}

/// Structural fingerprint of a generated type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// Fingerprint of a qualified name, module included.
    #[inline]
    pub fn of_name(name: &QualifiedName) -> Self {
        let base = xxh64(name.full_name().as_bytes(), 0);
        let module = xxh64(name.module.as_bytes(), fingerprint_constants::MODULE);
        Fingerprint(base.wrapping_mul(fingerprint_constants::SEP) ^ module)
    }

    /// Fingerprint of a template's selector artifact.
    #[inline]
    pub fn selector(template: &QualifiedName) -> Self {
        Fingerprint(fingerprint_constants::SELECTOR ^ Self::of_name(template).0)
    }

    /// Fingerprint of one concrete instantiation.
    pub fn instantiation(template: &QualifiedName, args: &[&QualifiedName]) -> Self {
        let mut hash = fingerprint_constants::INSTANTIATION ^ Self::of_name(template).0;
        for (i, arg) in args.iter().enumerate() {
            let markers = &fingerprint_constants::PARAM_MARKERS;
            let marker = markers[i % markers.len()].wrapping_add((i / markers.len()) as u64);
            // wrapping_mul keeps the fold order-sensitive
            hash = hash
                .wrapping_mul(fingerprint_constants::SEP)
                .wrapping_add(marker ^ Self::of_name(arg).0);
        }
        Fingerprint(hash)
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:#018x})", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qn(s: &str) -> QualifiedName {
        QualifiedName::from_qualified_string(s)
    }

    #[test]
    fn deterministic() {
        assert_eq!(Fingerprint::of_name(&qn("Game::Box")), Fingerprint::of_name(&qn("Game::Box")));
        assert_ne!(Fingerprint::of_name(&qn("Game::Box")), Fingerprint::of_name(&qn("Box")));
    }

    #[test]
    fn module_changes_fingerprint() {
        let a = qn("Game::Box").in_module("A");
        let b = qn("Game::Box").in_module("B");
        assert_ne!(Fingerprint::of_name(&a), Fingerprint::of_name(&b));
    }

    #[test]
    fn selector_and_instantiation_domains_differ() {
        let boxed = qn("Box`1");
        assert_ne!(Fingerprint::selector(&boxed), Fingerprint::instantiation(&boxed, &[]));
    }

    #[test]
    fn argument_order_matters() {
        let map = qn("Map`2");
        let k = qn("Key");
        let v = qn("Value");
        assert_ne!(
            Fingerprint::instantiation(&map, &[&k, &v]),
            Fingerprint::instantiation(&map, &[&v, &k])
        );
    }

    #[test]
    fn many_arguments_stay_distinct() {
        let t = qn("Wide");
        let names: Vec<QualifiedName> = (0..10).map(|i| qn(&format!("A{i}"))).collect();
        let refs: Vec<&QualifiedName> = names.iter().collect();
        let mut swapped = refs.clone();
        swapped.swap(0, 8);
        assert_ne!(
            Fingerprint::instantiation(&t, &refs),
            Fingerprint::instantiation(&t, &swapped)
        );
    }
}
