//! TOML-based configuration for the merge and resolution policies.
//!
//! All knobs here are policy, not correctness: the defaults reproduce the
//! engine's documented behavior and a missing file simply yields
//! [`MergeConfig::default`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conflict::differ::FieldMergePolicy;
use crate::errors::ConfigError;

/// Environment variable overriding the session timeout, in seconds.
pub const SESSION_TIMEOUT_ENV: &str = "SNIPSYNC_SESSION_TIMEOUT_SECS";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level engine configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Text merge settings.
    #[serde(default)]
    pub merge: MergeSection,

    /// Resolution session settings.
    #[serde(default)]
    pub session: SessionSection,

    /// History resolver settings.
    #[serde(default)]
    pub history: HistorySection,
}

/// Text merge policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSection {
    /// Maximum number of conflicting hunks a two-way merge will wrap in
    /// markers before giving up on partial markup (default 3).
    #[serde(default = "default_hunk_limit")]
    pub conflict_hunk_limit: usize,

    /// Tie-break policy when both sides changed a field to different,
    /// populated values (default prefer_remote).
    #[serde(default)]
    pub field_policy: FieldMergePolicy,
}

fn default_hunk_limit() -> usize {
    3
}

impl Default for MergeSection {
    fn default() -> Self {
        Self {
            conflict_hunk_limit: default_hunk_limit(),
            field_policy: FieldMergePolicy::default(),
        }
    }
}

/// Resolution session knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Seconds a session may sit in `awaiting_user` before timing out
    /// (default 900).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    900
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// History resolver knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySection {
    /// Revision ref queried when a triple arrives without a base
    /// (default "HEAD").
    #[serde(default = "default_base_revision")]
    pub base_revision: String,
}

fn default_base_revision() -> String {
    "HEAD".into()
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            base_revision: default_base_revision(),
        }
    }
}

impl MergeConfig {
    /// Load configuration from a TOML file, applying environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let mut config: MergeConfig =
            toml::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load from a file if it exists, otherwise fall back to defaults with
    /// environment overrides applied.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::FileNotFound(_)) => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config
            }
            Err(e) => {
                warn!(error = %e, "configuration load failed, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Apply supported environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(SESSION_TIMEOUT_ENV) {
            match raw.parse::<u64>() {
                Ok(secs) => self.session.timeout_secs = secs,
                Err(_) => warn!(
                    value = %raw,
                    "ignoring non-numeric {SESSION_TIMEOUT_ENV}"
                ),
            }
        }
    }

    /// Reject values the engine cannot operate with.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.timeout_secs".into(),
                detail: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Session timeout as a [`Duration`].
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MergeConfig::default();
        assert_eq!(config.merge.conflict_hunk_limit, 3);
        assert_eq!(config.merge.field_policy, FieldMergePolicy::PreferRemote);
        assert_eq!(config.session.timeout_secs, 900);
        assert_eq!(config.history.base_revision, "HEAD");
    }

    #[test]
    fn test_parse_partial_toml() {
        let raw = r#"
            [merge]
            conflict_hunk_limit = 5
            field_policy = "prefer_local"

            [session]
            timeout_secs = 60
        "#;
        let config: MergeConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.merge.conflict_hunk_limit, 5);
        assert_eq!(config.merge.field_policy, FieldMergePolicy::PreferLocal);
        assert_eq!(config.session_timeout(), Duration::from_secs(60));
        assert_eq!(config.history.base_revision, "HEAD");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session]\ntimeout_secs = 0\n").unwrap();
        let result = MergeConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_missing_file_is_file_not_found() {
        let result = MergeConfig::load(Path::new("/nonexistent/snipsync.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
