//! Application settings and paths.
//!
//! Settings hold the defaults the CLI and HTTP server use when a request
//! leaves a value unspecified. They live in an XDG-compliant config dir.

use super::scan::BoundsPolicy;
use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/skiff)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the platform directories.
    pub fn discover() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("com", "skiff", "skiff").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Default number of concurrent probes.
    pub default_concurrency: usize,
    /// Default per-probe timeout in seconds.
    pub default_timeout_secs: f64,
    /// Policy for out-of-range concurrency/timeout on the command line.
    pub bounds_policy: BoundsPolicy,
    /// Scan the predefined port list when no expression is given.
    pub use_predefined_ports: bool,
    /// Address the HTTP API binds to.
    pub bind_address: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_concurrency: 10,
            default_timeout_secs: 1.0,
            bounds_policy: BoundsPolicy::Reject,
            use_predefined_ports: false,
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

impl AppSettings {
    /// Load settings from `path` if given, otherwise from the default
    /// location. A missing default file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let file = Paths::discover()?.settings_file();
                if !file.exists() {
                    debug!(path = %file.display(), "no settings file, using defaults");
                    return Ok(Self::default());
                }
                Self::load_from(&file)
            }
        }
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings = serde_json::from_str(&content)?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Write settings as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let write_err = |e: std::io::Error| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.default_concurrency, 10);
        assert_eq!(settings.default_timeout_secs, 1.0);
        assert_eq!(settings.bounds_policy, BoundsPolicy::Reject);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "default_concurrency": 50, "bounds_policy": "clamp" }"#).unwrap();

        let settings = AppSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.default_concurrency, 50);
        assert_eq!(settings.bounds_policy, BoundsPolicy::Clamp);
        assert_eq!(settings.default_timeout_secs, 1.0);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = AppSettings {
            use_predefined_ports: true,
            ..AppSettings::default()
        };

        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppSettings::load(Some(&dir.path().join("absent.json")));
        assert!(matches!(result, Err(ConfigError::ReadFailed { .. })));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            AppSettings::load_from(&path),
            Err(ConfigError::InvalidFormat(_))
        ));
    }
}
