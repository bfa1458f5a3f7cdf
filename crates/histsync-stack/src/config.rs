use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use histsync_log::{LogConfig, SyncMode};
use histsync_types::{Originator, OriginatorId};

use crate::error::{Result, StackError};

/// Configuration of one writer process.
///
/// ```toml
/// originator = "app"
/// roster = ["app", "widget"]
/// data_dir = "/var/lib/shared"
/// sync_mode = "every_write"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub originator: OriginatorId,
    pub roster: Vec<OriginatorId>,
    /// Directory shared by every writer.
    pub data_dir: PathBuf,
    /// Log file, relative to `data_dir`.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Watermark directory, relative to `data_dir`.
    #[serde(default = "default_watermark_dir")]
    pub watermark_dir: PathBuf,
    #[serde(default)]
    pub sync_mode: SyncMode,
    /// How often a [`crate::LogWatcher`] checks the log for outside writes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_log_file() -> PathBuf {
    PathBuf::from("history.log")
}

fn default_watermark_dir() -> PathBuf {
    PathBuf::from("watermarks")
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl SyncConfig {
    /// Config with default file layout under `data_dir`.
    pub fn new(originator: OriginatorId, roster: Vec<OriginatorId>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            originator,
            roster,
            data_dir: data_dir.into(),
            log_file: default_log_file(),
            watermark_dir: default_watermark_dir(),
            sync_mode: SyncMode::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.roster.is_empty() {
            return Err(StackError::InvalidConfig("roster is empty".into()));
        }
        if !self.roster.contains(&self.originator) {
            return Err(StackError::InvalidConfig(format!(
                "originator {} is not listed in the roster",
                self.originator
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(StackError::InvalidConfig("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn current_originator(&self) -> Originator {
        Originator::new(self.originator.clone(), self.roster.clone())
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_file)
    }

    pub fn watermark_path(&self) -> PathBuf {
        self.data_dir.join(&self.watermark_dir)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            sync_mode: self.sync_mode,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> OriginatorId {
        OriginatorId::new(s).unwrap()
    }

    #[test]
    fn minimal_document_gets_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
            originator = "app"
            roster = ["app", "widget"]
            data_dir = "/tmp/shared"
            "#,
        )
        .unwrap();

        assert_eq!(config.originator, id("app"));
        assert_eq!(config.log_path(), PathBuf::from("/tmp/shared/history.log"));
        assert_eq!(config.watermark_path(), PathBuf::from("/tmp/shared/watermarks"));
        assert_eq!(config.sync_mode, SyncMode::OsDefault);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
            originator = "widget"
            roster = ["app", "widget"]
            data_dir = "shared"
            log_file = "tx.log"
            sync_mode = "every_write"
            poll_interval_ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.log_path(), PathBuf::from("shared/tx.log"));
        assert_eq!(config.log_config().sync_mode, SyncMode::EveryWrite);
        assert_eq!(config.poll_interval_ms, 50);
    }

    #[test]
    fn originator_outside_roster_is_rejected() {
        let err = SyncConfig::from_toml_str(
            r#"
            originator = "intruder"
            roster = ["app", "widget"]
            data_dir = "shared"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, StackError::InvalidConfig(_)));
    }

    #[test]
    fn invalid_identifier_is_a_parse_error() {
        let err = SyncConfig::from_toml_str(
            r#"
            originator = "has space"
            roster = ["has space"]
            data_dir = "shared"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, StackError::ConfigParse(_)));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut config = SyncConfig::new(id("app"), vec![id("app")], "shared");
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_roundtrip() {
        let config = SyncConfig::new(id("app"), vec![id("app"), id("widget")], "shared");
        let text = config.to_toml_string().unwrap();
        assert_eq!(SyncConfig::from_toml_str(&text).unwrap(), config);
    }
}
