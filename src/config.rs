//! Configuration loading and management
//!
//! Handles parsing of `.tempo.toml` configuration files. Every key has a
//! serde default, so a missing or partial file merges cleanly with the
//! built-in configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Statistics seeds
    #[serde(default)]
    pub statistics: StatisticsConfig,

    /// Snapshot behavior
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Entity id generation
    #[serde(default)]
    pub ids: IdConfig,
}

/// Statistics-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Seed for points-per-hour before any task with a duration completes
    #[serde(default = "default_points_per_hour")]
    pub points_per_hour: f64,
}

fn default_points_per_hour() -> f64 {
    1.0
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            points_per_hour: default_points_per_hour(),
        }
    }
}

/// Snapshot-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Save the snapshot after this many folded events
    #[serde(default = "default_snapshot_every")]
    pub every: usize,
}

fn default_snapshot_every() -> usize {
    1
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            every: default_snapshot_every(),
        }
    }
}

/// Entity id configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    /// Length of the random suffix on generated entity ids
    #[serde(default = "default_suffix_len")]
    pub suffix_len: usize,
}

fn default_suffix_len() -> usize {
    6
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            suffix_len: default_suffix_len(),
        }
    }
}

impl Config {
    /// Load configuration from a file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the default configuration for `tempo init`.
    pub fn default_toml() -> Result<String> {
        Ok(toml::to_string_pretty(&Config::default())?)
    }

    fn validate(&self) -> Result<()> {
        if !self.statistics.points_per_hour.is_finite() || self.statistics.points_per_hour < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "statistics.points_per_hour must be a non-negative number, got {}",
                self.statistics.points_per_hour
            )));
        }
        if self.snapshot.every == 0 {
            return Err(Error::InvalidConfig(
                "snapshot.every must be at least 1".to_string(),
            ));
        }
        if self.ids.suffix_len == 0 || self.ids.suffix_len > 16 {
            return Err(Error::InvalidConfig(format!(
                "ids.suffix_len must be between 1 and 16, got {}",
                self.ids.suffix_len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_when_file_missing() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(&temp.path().join(".tempo.toml")).unwrap();
        assert_eq!(config.statistics.points_per_hour, 1.0);
        assert_eq!(config.snapshot.every, 1);
        assert_eq!(config.ids.suffix_len, 6);
    }

    #[test]
    fn partial_file_merges_with_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".tempo.toml");
        std::fs::write(&path, "[statistics]\npoints_per_hour = 3.5\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.statistics.points_per_hour, 3.5);
        assert_eq!(config.snapshot.every, 1);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".tempo.toml");
        std::fs::write(&path, "[snapshot]\nevery = 0\n").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(Error::InvalidConfig(_))
        ));

        std::fs::write(&path, "[statistics]\npoints_per_hour = -2.0\n").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn default_toml_parses_back() {
        let rendered = Config::default_toml().unwrap();
        let config: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(config.snapshot.every, 1);
    }
}
