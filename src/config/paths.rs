use std::{env, fs, path::PathBuf};

use super::ConfigError;

const APP_DIR: &str = "tandem";

/// Locations of configuration, data and log files
///
/// Follows the XDG Base Directory specification.
pub struct ConfigPaths;

impl ConfigPaths {
    /// Configuration directory
    ///
    /// `$XDG_CONFIG_HOME/tandem`, falling back to `$HOME/.config/tandem`.
    ///
    /// # Errors
    /// Returns error if neither `XDG_CONFIG_HOME` nor `HOME` is set
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        Self::xdg_dir("XDG_CONFIG_HOME", ".config", "config")
    }

    /// Application data directory
    ///
    /// `$XDG_DATA_HOME/tandem`, falling back to `$HOME/.local/share/tandem`.
    ///
    /// # Errors
    /// Returns error if neither `XDG_DATA_HOME` nor `HOME` is set
    pub fn data_dir() -> Result<PathBuf, ConfigError> {
        Self::xdg_dir("XDG_DATA_HOME", ".local/share", "data")
    }

    /// Log directory, created if missing
    ///
    /// # Errors
    /// Returns error if the data directory cannot be located or created
    pub fn log_dir() -> Result<PathBuf, ConfigError> {
        let log_dir = Self::data_dir()?.join("logs");
        if !log_dir.exists() {
            fs::create_dir_all(&log_dir).map_err(|e| ConfigError::io(&log_dir, e))?;
        }
        Ok(log_dir)
    }

    /// Main configuration file
    ///
    /// # Errors
    /// Returns error if the configuration directory cannot be located
    pub fn main_config() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Preference file holding cached device volumes
    ///
    /// # Errors
    /// Returns error if the data directory cannot be located
    pub fn preferences_file() -> Result<PathBuf, ConfigError> {
        Ok(Self::data_dir()?.join("preferences.json"))
    }

    fn xdg_dir(
        xdg_var: &'static str,
        home_fallback: &str,
        kind: &'static str,
    ) -> Result<PathBuf, ConfigError> {
        let base = env::var(xdg_var)
            .ok()
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| env::var("HOME").ok().map(|home| PathBuf::from(home).join(home_fallback)))
            .ok_or(ConfigError::NoHomeDirectory { kind, xdg_var })?;

        Ok(base.join(APP_DIR))
    }
}
