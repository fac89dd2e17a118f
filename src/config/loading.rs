use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::{info, instrument, warn};

use super::{Config, ConfigError, ConfigPaths};

impl Config {
    /// Load the configuration file at `path`
    ///
    /// A missing file yields the default configuration. Out of range values
    /// are clamped, invalid ones rejected.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid TOML, or
    /// holds an invalid value
    #[instrument]
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                info!("No config file found, using defaults");
                return Ok(Config::default());
            }
            Err(error) => return Err(ConfigError::io(path, error)),
        };

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
            location: path.display().to_string(),
            details: e.to_string(),
        })?;
        config.validated()
    }

    /// Load the configuration from the default location
    ///
    /// # Errors
    /// Returns error if the location cannot be resolved or loading fails
    pub fn load_default() -> Result<Config, ConfigError> {
        Self::load(&ConfigPaths::main_config()?)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid TOML or holds an invalid value
    pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::TomlParse {
            location: "string".to_string(),
            details: e.to_string(),
        })?;
        config.validated()
    }

    /// Preference file the volume cache lives in
    ///
    /// # Errors
    /// Returns error if no override is set and the data directory cannot be located
    pub fn preferences_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.volume.store_path {
            Some(path) => Ok(path.clone()),
            None => ConfigPaths::preferences_file(),
        }
    }

    fn validated(mut self) -> Result<Config, ConfigError> {
        if self.sharing.sink_uid.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "sharing.sink_uid",
                reason: "must not be empty".to_string(),
            });
        }

        let level = self.volume.default_level;
        if level.is_nan() {
            return Err(ConfigError::InvalidField {
                field: "volume.default_level",
                reason: "must be a number between 0.0 and 1.0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&level) {
            warn!("volume.default_level {level} clamped to 0.0..=1.0");
            self.volume.default_level = level.clamp(0.0, 1.0);
        }

        Ok(self)
    }
}
