//! Application settings, paths, and the per-run context.

use crate::aggregator::ExposureAggregator;
use crate::error::{ConfigError, ConfigResult};
use crate::types::{Port, PortSpec};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/outpost)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolve paths using XDG directories.
    pub fn new() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("com", "outpost", "outpost").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Tunables for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Per-probe connect timeout, also applied to each enrichment lookup.
    pub timeout_ms: u64,
    /// Deadline for the whole scan in seconds, 0 for none.
    pub scan_timeout_secs: u64,
    /// Maximum in-flight probes.
    pub concurrency: usize,
    /// Probes per second, 0 for unlimited.
    pub rate_limit: u32,
    /// Port specification, e.g. "top100" or "22,80,443".
    pub ports: String,
    /// Number of aggregator lock shards.
    pub shards: usize,
    /// Resolve hostnames for exposed addresses.
    pub reverse_dns: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 500,
            scan_timeout_secs: 900,
            concurrency: 500,
            rate_limit: 0,
            ports: "top100".to_string(),
            shards: ExposureAggregator::DEFAULT_SHARDS,
            reverse_dns: true,
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, falling back to defaults
    /// when no settings file exists.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::new()?.settings_file();
        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The overall scan deadline, if any.
    pub fn scan_deadline(&self) -> Option<Duration> {
        (self.scan_timeout_secs > 0).then(|| Duration::from_secs(self.scan_timeout_secs))
    }

    /// Check the settings and resolve the port list.
    pub fn validate(&self) -> ConfigResult<Vec<Port>> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".to_string()));
        }
        if self.shards == 0 {
            return Err(ConfigError::Invalid("shards must be at least 1".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be positive".to_string()));
        }
        if let Some(deadline) = self.scan_deadline() {
            if self.timeout() >= deadline {
                return Err(ConfigError::Invalid(format!(
                    "timeout ({}ms) must be shorter than the scan deadline ({}s)",
                    self.timeout_ms, self.scan_timeout_secs
                )));
            }
        }

        let spec: PortSpec = self
            .ports
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("ports: {}", e)))?;
        let ports = spec.to_ports();
        debug!(ports = %spec, count = ports.len(), "Resolved port list");
        Ok(ports)
    }
}

/// Everything a run needs to know, built once and passed by reference.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub settings: AppSettings,
    pub ports: Vec<Port>,
    /// Stop after discovery without scanning.
    pub discover_only: bool,
    pub progress: bool,
}

impl RunContext {
    /// Validate `settings` and freeze them for one run.
    pub fn new(settings: AppSettings) -> ConfigResult<Self> {
        let ports = settings.validate()?;
        Ok(Self {
            settings,
            ports,
            discover_only: false,
            progress: false,
        })
    }

    pub fn discover_only(mut self) -> Self {
        self.discover_only = true;
        self
    }

    pub fn with_progress(mut self) -> Self {
        self.progress = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.timeout_ms, 500);
        assert_eq!(settings.validate().unwrap().len(), 100);
    }

    #[test]
    fn test_partial_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"ports": "22,443", "reverse_dns": false}}"#).unwrap();

        let settings = AppSettings::load_from(file.path()).unwrap();
        assert_eq!(settings.ports, "22,443");
        assert!(!settings.reverse_dns);
        assert_eq!(settings.concurrency, 500);
    }

    #[test]
    fn test_invalid_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            AppSettings::load_from(file.path()),
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_timeout_must_be_shorter_than_deadline() {
        let settings = AppSettings {
            timeout_ms: 5_000,
            scan_timeout_secs: 5,
            ..AppSettings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));

        let no_deadline = AppSettings {
            scan_timeout_secs: 0,
            ..settings
        };
        assert!(no_deadline.validate().is_ok());
        assert_eq!(no_deadline.scan_deadline(), None);
    }

    #[test]
    fn test_rejects_bad_values() {
        for settings in [
            AppSettings {
                concurrency: 0,
                ..AppSettings::default()
            },
            AppSettings {
                shards: 0,
                ..AppSettings::default()
            },
            AppSettings {
                ports: "abc".to_string(),
                ..AppSettings::default()
            },
        ] {
            assert!(RunContext::new(settings).is_err());
        }
    }
}
