//! Shared helpers for the flowparams crates: engine settings and path handling.

pub mod paths;
pub mod settings;

pub use paths::expand_tilde;
pub use settings::{EngineSettings, RUN_CONF_OVERRIDES_ENV, SETTINGS_PATH_ENV, SettingsError, default_settings_path, parse_flag};
