//! Configuration loading.
//!
//! Reads `timebox.toml`. Every field has a default, so a missing file or a
//! partial file both yield a usable configuration.

use crate::logging::default_log_level;
use crate::service::schedule_service::ScheduleSettings;
use jiff::tz::TimeZone;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config `{path}`: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("unknown time zone `{name}`: {source}")]
    InvalidTimeZone { name: String, source: jiff::Error },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeboxConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// IANA zone name; empty means the system zone.
    #[serde(default)]
    pub time_zone: String,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TimeboxConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            time_zone: String::new(),
            search: SearchConfig::default(),
            status: StatusConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("timebox.db")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Shortest search text that runs a query.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

fn default_min_chars() -> usize {
    3
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Other in-progress tasks at which starting another one warns.
    #[serde(default = "default_in_progress_warning_threshold")]
    pub in_progress_warning_threshold: usize,
}

fn default_in_progress_warning_threshold() -> usize {
    2
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            in_progress_warning_threshold: default_in_progress_warning_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    /// Absolute log directory; file logging is off when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_level() -> String {
    default_log_level().to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: None,
        }
    }
}

impl TimeboxConfig {
    /// Loads `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn resolve_time_zone(&self) -> Result<TimeZone, ConfigError> {
        let name = self.time_zone.trim();
        if name.is_empty() {
            return Ok(TimeZone::system());
        }
        if name.eq_ignore_ascii_case("UTC") {
            return Ok(TimeZone::UTC);
        }
        TimeZone::get(name).map_err(|source| ConfigError::InvalidTimeZone {
            name: name.to_string(),
            source,
        })
    }

    pub fn to_settings(&self) -> Result<ScheduleSettings, ConfigError> {
        Ok(ScheduleSettings {
            time_zone: self.resolve_time_zone()?,
            search_min_chars: self.search.min_chars,
            in_progress_warning_threshold: self.status.in_progress_warning_threshold,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.search.min_chars == 0 {
            return Err(ConfigError::Invalid(
                "search.min_chars must be >= 1".to_string(),
            ));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "database_path cannot be empty".to_string(),
            ));
        }
        self.resolve_time_zone()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, TimeboxConfig};
    use std::fs;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TimeboxConfig::load(&dir.path().join("timebox.toml")).unwrap();
        assert_eq!(config, TimeboxConfig::default());
        assert_eq!(config.search.min_chars, 3);
        assert_eq!(config.status.in_progress_warning_threshold, 2);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timebox.toml");
        fs::write(
            &path,
            "time_zone = \"UTC\"\n[search]\nmin_chars = 4\n[logging]\nlevel = \"warn\"\n",
        )
        .unwrap();

        let config = TimeboxConfig::load(&path).unwrap();
        assert_eq!(config.search.min_chars, 4);
        assert_eq!(config.status.in_progress_warning_threshold, 2);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.database_path.to_str(), Some("timebox.db"));

        let settings = config.to_settings().unwrap();
        assert_eq!(settings.search_min_chars, 4);
    }

    #[test]
    fn unknown_zone_and_malformed_toml_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timebox.toml");

        fs::write(&path, "time_zone = \"Mars/Olympus_Mons\"\n").unwrap();
        assert!(matches!(
            TimeboxConfig::load(&path),
            Err(ConfigError::InvalidTimeZone { .. })
        ));

        fs::write(&path, "[search\nmin_chars = 3\n").unwrap();
        assert!(matches!(
            TimeboxConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn zero_search_minimum_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timebox.toml");
        fs::write(&path, "[search]\nmin_chars = 0\n").unwrap();
        assert!(matches!(
            TimeboxConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
