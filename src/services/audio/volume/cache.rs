use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::level::VolumeLevel;
use crate::services::audio::{device::DeviceUid, error::AudioError};

/// Preference key holding the `uid -> level` record
pub const DEVICE_VOLUMES_KEY: &str = "tandem.device_volumes";
/// Preference key holding the time of the last save
pub const UPDATED_AT_KEY: &str = "tandem.updated_at";

/// Last known volume per stable device identity
///
/// Entries are never removed; a level cached for a device that is gone is
/// picked up again when it reconnects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeCache {
    levels: HashMap<DeviceUid, VolumeLevel>,
}

impl VolumeCache {
    /// Cached level of `uid`
    pub fn get(&self, uid: &DeviceUid) -> Option<VolumeLevel> {
        self.levels.get(uid).copied()
    }

    /// Record the level of `uid`, returning whether it changed
    pub fn insert(&mut self, uid: DeviceUid, level: VolumeLevel) -> bool {
        self.levels.insert(uid, level) != Some(level)
    }

    /// Number of cached devices
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Iterate over cached entries
    pub fn iter(&self) -> impl Iterator<Item = (&DeviceUid, VolumeLevel)> {
        self.levels.iter().map(|(uid, level)| (uid, *level))
    }
}

impl FromIterator<(DeviceUid, VolumeLevel)> for VolumeCache {
    fn from_iter<I: IntoIterator<Item = (DeviceUid, VolumeLevel)>>(iter: I) -> Self {
        Self {
            levels: iter.into_iter().collect(),
        }
    }
}

/// Key-value preference file the volume cache is persisted in
///
/// The file is a JSON object. Only the volume keys are owned by this store;
/// any other keys already in the file are written back untouched.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
}

impl PreferenceStore {
    /// Store backed by the file at `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Store that keeps nothing across restarts
    pub fn ephemeral() -> Self {
        Self { path: None }
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the cached volumes
    ///
    /// A missing file yields an empty cache. A file that is not valid JSON is
    /// logged and treated as empty as well.
    ///
    /// # Errors
    /// Returns `AudioError::Persistence` if the file exists but cannot be read
    #[instrument(skip(self), fields(path = ?self.path))]
    pub fn load(&self) -> Result<VolumeCache, AudioError> {
        let Some(document) = self.read_document()? else {
            return Ok(VolumeCache::default());
        };

        let Some(Value::Object(entries)) = document.get(DEVICE_VOLUMES_KEY) else {
            debug!("No cached device volumes");
            return Ok(VolumeCache::default());
        };

        let cache: VolumeCache = entries
            .iter()
            .filter_map(|(uid, level)| match level.as_f64() {
                Some(level) => Some((
                    DeviceUid::new(uid.as_str()),
                    VolumeLevel::from_scalar(level),
                )),
                None => {
                    warn!(%uid, "Ignoring non-numeric cached volume");
                    None
                }
            })
            .collect();
        info!("Loaded cached volumes for {} devices", cache.len());
        Ok(cache)
    }

    /// Persist the cached volumes
    ///
    /// # Errors
    /// Returns `AudioError::Persistence` if the file or its directory cannot be written
    #[instrument(skip(self, cache), fields(path = ?self.path))]
    pub fn save(&self, cache: &VolumeCache) -> Result<(), AudioError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut document = self.read_document()?.unwrap_or_default();
        let levels: Map<String, Value> = cache
            .iter()
            .map(|(uid, level)| (uid.0.clone(), Value::from(f64::from(level.get()))))
            .collect();
        document.insert(DEVICE_VOLUMES_KEY.to_string(), Value::Object(levels));
        document.insert(UPDATED_AT_KEY.to_string(), Value::from(Utc::now().to_rfc3339()));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&Value::Object(document))?;
        fs::write(path, content)?;

        debug!("Saved cached volumes for {} devices", cache.len());
        Ok(())
    }

    fn read_document(&self) -> Result<Option<Map<String, Value>>, AudioError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                info!("No preference file found, starting empty");
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        };

        match serde_json::from_str(&content) {
            Ok(Value::Object(document)) => Ok(Some(document)),
            _ => {
                warn!("Invalid preference file, using defaults");
                Ok(None)
            }
        }
    }
}
