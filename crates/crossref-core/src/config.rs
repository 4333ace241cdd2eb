//! Persisted settings and environment overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::diagnostics::Severity;
use crate::errors::{CrossRefError, CrossRefResult};
use crate::models::{DEFAULT_RESTORE_BATCH, MAX_RESTORE_BATCH};

pub const ENV_UNRESOLVED_WARNINGS: &str = "CROSSREF_UNRESOLVED_WARNINGS";
pub const ENV_RESTORE_BATCH: &str = "CROSSREF_RESTORE_BATCH";

pub fn clamp_batch(value: usize) -> usize {
    value.clamp(1, MAX_RESTORE_BATCH)
}

/// Parse an on/off toggle.  `0|false|no|off` disable, anything else enables.
fn parse_toggle(raw: &str) -> bool {
    let v = raw.trim().to_lowercase();
    !matches!(v.as_str(), "0" | "false" | "no" | "off")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossRefConfig {
    /// Report unresolved references on passes that honour suppression.
    pub unresolved_reference_warnings: bool,
    pub restore_batch_size: usize,
    pub failure_severity: Severity,
}

impl Default for CrossRefConfig {
    fn default() -> Self {
        Self {
            unresolved_reference_warnings: true,
            restore_batch_size: DEFAULT_RESTORE_BATCH,
            failure_severity: Severity::Warning,
        }
    }
}

impl CrossRefConfig {
    /// Read settings from `path`.  A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> CrossRefResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&text)
            .map_err(|e| CrossRefError::Config(format!("{}: {e}", path.display())))?;
        config.restore_batch_size = clamp_batch(config.restore_batch_size);
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> CrossRefResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Overlay `CROSSREF_*` environment variables.
    pub fn apply_env(mut self) -> Self {
        if let Ok(val) = std::env::var(ENV_UNRESOLVED_WARNINGS) {
            self.unresolved_reference_warnings = parse_toggle(&val);
        }
        if let Ok(val) = std::env::var(ENV_RESTORE_BATCH) {
            match val.trim().parse::<usize>() {
                Ok(n) => self.restore_batch_size = clamp_batch(n),
                Err(_) => warn!("Ignoring {ENV_RESTORE_BATCH}={val:?}: not a number"),
            }
        }
        self
    }

    pub fn with_batch_size(mut self, batch: usize) -> Self {
        self.restore_batch_size = clamp_batch(batch);
        self
    }

    pub fn batch_size(&self) -> usize {
        clamp_batch(self.restore_batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrossRefConfig::default();
        assert!(config.unresolved_reference_warnings);
        assert_eq!(config.batch_size(), 20);
        assert_eq!(config.failure_severity, Severity::Warning);
    }

    #[test]
    fn test_clamp_batch() {
        assert_eq!(clamp_batch(0), 1);
        assert_eq!(clamp_batch(7), 7);
        assert_eq!(clamp_batch(usize::MAX), MAX_RESTORE_BATCH);
        assert_eq!(CrossRefConfig::default().with_batch_size(0).batch_size(), 1);
    }

    #[test]
    fn test_parse_toggle() {
        for off in ["0", "false", "NO", " off "] {
            assert!(!parse_toggle(off), "{off}");
        }
        for on in ["1", "true", "yes", "anything"] {
            assert!(parse_toggle(on), "{on}");
        }
    }

    #[test]
    fn test_apply_env_overrides() {
        std::env::set_var(ENV_UNRESOLVED_WARNINGS, "off");
        std::env::set_var(ENV_RESTORE_BATCH, "99999999");
        let config = CrossRefConfig::default().apply_env();
        std::env::remove_var(ENV_UNRESOLVED_WARNINGS);
        std::env::remove_var(ENV_RESTORE_BATCH);

        assert!(!config.unresolved_reference_warnings);
        assert_eq!(config.restore_batch_size, MAX_RESTORE_BATCH);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CrossRefConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, CrossRefConfig::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings/crossref.json");
        let config = CrossRefConfig {
            unresolved_reference_warnings: false,
            restore_batch_size: 5,
            failure_severity: Severity::Error,
        };
        config.save(&path).unwrap();
        assert_eq!(CrossRefConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crossref.json");
        std::fs::write(&path, r#"{"restore_batch_size": 0}"#).unwrap();
        let config = CrossRefConfig::load(&path).unwrap();
        assert_eq!(config.restore_batch_size, 1);
        assert!(config.unresolved_reference_warnings);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crossref.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            CrossRefConfig::load(&path),
            Err(CrossRefError::Config(_))
        ));
    }
}
