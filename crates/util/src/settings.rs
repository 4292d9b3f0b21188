//! Engine settings persisted as JSON.
//!
//! Settings live in the standard configuration directory (`~/.config/flowparams/settings.json` on most
//! platforms) unless `FLOWPARAMS_SETTINGS_PATH` points elsewhere. A missing file yields defaults; a file that
//! cannot be parsed is reported with a warning and also yields defaults. Individual values can be overridden
//! through environment variables, which win over the file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::expand_tilde;

/// Environment variable allowing callers to override the settings file path.
pub const SETTINGS_PATH_ENV: &str = "FLOWPARAMS_SETTINGS_PATH";

/// Environment variable overriding [`EngineSettings::run_configuration_overrides_parameters`].
pub const RUN_CONF_OVERRIDES_ENV: &str = "FLOWPARAMS_RUN_CONF_OVERRIDES_PARAMS";

/// Default filename for the JSON payload.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Error surfaced when the settings file exists but cannot be read.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Engine-wide switches consulted by the merge pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Whether run-level configuration is merged over workflow and step parameters.
    pub run_configuration_overrides_parameters: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            run_configuration_overrides_parameters: true,
        }
    }
}

impl EngineSettings {
    /// Loads settings from the default location and applies environment overrides.
    pub fn load() -> Result<Self, SettingsError> {
        Self::from_path(&default_settings_path())
    }

    /// Loads settings from `path` and applies environment overrides.
    pub fn from_path(path: &Path) -> Result<Self, SettingsError> {
        let mut settings = load_file(path)?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Applies recognised environment overrides in place. Unrecognised values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        let Ok(raw) = env::var(RUN_CONF_OVERRIDES_ENV) else {
            return;
        };
        match parse_flag(&raw) {
            Some(flag) => {
                debug!(variable = RUN_CONF_OVERRIDES_ENV, value = flag, "applying settings override from environment");
                self.run_configuration_overrides_parameters = flag;
            }
            None => warn!(
                variable = RUN_CONF_OVERRIDES_ENV,
                value = %raw,
                "Ignoring unrecognised boolean in environment override"
            ),
        }
    }
}

/// Path of the settings file: `$FLOWPARAMS_SETTINGS_PATH` when set, otherwise the config directory default.
pub fn default_settings_path() -> PathBuf {
    if let Ok(path) = env::var(SETTINGS_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flowparams")
        .join(SETTINGS_FILE_NAME)
}

/// Parses `true/false/1/0/yes/no`, case-insensitively.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn load_file(path: &Path) -> Result<EngineSettings, SettingsError> {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(settings) => Ok(settings),
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "Failed to parse settings file; using defaults"
                );
                Ok(EngineSettings::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(EngineSettings::default()),
        Err(source) => Err(SettingsError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
