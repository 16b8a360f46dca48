//! Session configuration

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::builder::{DEFAULT_ROW_SLOTS, DEFAULT_ROW_WIDTH};

/// Session configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Number of control rows
    #[serde(default = "default_row_slots")]
    pub row_slots: usize,
    /// Width capacity of each row
    #[serde(default = "default_row_width")]
    pub row_width: usize,
    /// Auto-refresh interval in seconds (unset = no auto-refresh)
    #[serde(default)]
    pub auto_update_secs: Option<u64>,
    /// Total lifetime in seconds
    #[serde(default)]
    pub max_alive_secs: Option<u64>,
    /// Idle lifetime in seconds
    #[serde(default)]
    pub max_idle_secs: Option<u64>,
    /// Respond ephemerally (only the invoking user sees the message)
    #[serde(default)]
    pub ephemeral: bool,
}

fn default_row_slots() -> usize {
    DEFAULT_ROW_SLOTS
}

fn default_row_width() -> usize {
    DEFAULT_ROW_WIDTH
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            row_slots: default_row_slots(),
            row_width: default_row_width(),
            auto_update_secs: None,
            max_alive_secs: None,
            max_idle_secs: None,
            ephemeral: false,
        }
    }
}

impl SessionConfig {
    /// Load config from a TOML file, falling back to defaults if missing
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("session config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(content)?;
        anyhow::ensure!(config.row_slots > 0, "row_slots must be at least 1");
        anyhow::ensure!(config.row_width > 0, "row_width must be at least 1");
        Ok(config)
    }

    pub fn auto_update(&self) -> Option<Duration> {
        self.auto_update_secs.map(Duration::from_secs)
    }

    /// Both clocks, if either is configured. A missing one never fires.
    pub fn timeouts(&self) -> Option<(Duration, Duration)> {
        if self.max_alive_secs.is_none() && self.max_idle_secs.is_none() {
            return None;
        }
        let clock = |secs: Option<u64>| secs.map(Duration::from_secs).unwrap_or(Duration::MAX);
        Some((clock(self.max_alive_secs), clock(self.max_idle_secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = SessionConfig::parse("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.row_slots, 5);
        assert!(config.timeouts().is_none());
        assert!(config.auto_update().is_none());
    }

    #[test]
    fn parses_all_fields() {
        let config = SessionConfig::parse(
            r#"
            row_slots = 3
            row_width = 4
            auto_update_secs = 5
            max_alive_secs = 180
            max_idle_secs = 30
            ephemeral = true
            "#,
        )
        .unwrap();
        assert_eq!(config.row_slots, 3);
        assert_eq!(config.row_width, 4);
        assert_eq!(config.auto_update(), Some(Duration::from_secs(5)));
        assert_eq!(
            config.timeouts(),
            Some((Duration::from_secs(180), Duration::from_secs(30)))
        );
        assert!(config.ephemeral);
    }

    #[test]
    fn single_clock_leaves_other_unbounded() {
        let config = SessionConfig::parse("max_idle_secs = 60").unwrap();
        assert_eq!(config.timeouts(), Some((Duration::MAX, Duration::from_secs(60))));
    }

    #[test]
    fn zero_rows_rejected() {
        assert!(SessionConfig::parse("row_slots = 0").is_err());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = SessionConfig::load("/nonexistent/livesurface.toml").unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let path = std::env::temp_dir().join(format!("livesurface-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "row_width = 2\n").unwrap();
        let config = SessionConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.row_width, 2);
    }
}
