//! Session configuration.
//!
//! ```toml
//! match_policy = "identity_first"
//! max_collision_suffix = 100
//! artifact_extension = "asset"
//! registry_file = "Library/monomorph.json"
//! ```
//!
//! Every key is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use monomorph_engine::{CoordinatorOptions, MatchPolicy, ReconcileOptions};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonomorphConfig {
    /// How ambiguous name matches are resolved.
    pub match_policy: MatchPolicy,
    /// Highest `_N` suffix tried for a colliding artifact name.
    pub max_collision_suffix: usize,
    /// File extension of generated artifacts, without the dot.
    pub artifact_extension: String,
    /// Where the flattened registry is persisted.
    pub registry_file: PathBuf,
}

impl Default for MonomorphConfig {
    fn default() -> Self {
        Self {
            match_policy: MatchPolicy::default(),
            max_collision_suffix: CoordinatorOptions::default().max_collision_suffix,
            artifact_extension: "asset".to_string(),
            registry_file: PathBuf::from("monomorph-registry.json"),
        }
    }
}

impl MonomorphConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            match_policy: self.match_policy,
        }
    }

    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            max_collision_suffix: self.max_collision_suffix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = MonomorphConfig::from_toml_str("").unwrap();
        assert_eq!(config, MonomorphConfig::default());
        assert_eq!(config.max_collision_suffix, 1000);
        assert_eq!(config.match_policy, MatchPolicy::FirstMatch);
    }

    #[test]
    fn parses_every_key() {
        let config = MonomorphConfig::from_toml_str(
            r#"
            match_policy = "require_unique"
            max_collision_suffix = 5
            artifact_extension = "dll"
            registry_file = "state/registry.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.match_policy, MatchPolicy::RequireUnique);
        assert_eq!(config.coordinator_options().max_collision_suffix, 5);
        assert_eq!(config.artifact_extension, "dll");
        assert_eq!(config.registry_file, PathBuf::from("state/registry.json"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            MonomorphConfig::from_toml_str("speed = 11"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monomorph.toml");
        std::fs::write(&path, "match_policy = \"identity_first\"\n").unwrap();
        let config = MonomorphConfig::load(&path).unwrap();
        assert_eq!(config.reconcile_options().match_policy, MatchPolicy::IdentityFirst);

        assert!(matches!(
            MonomorphConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
