//! Persistence of the last saved settings.
//!
//! A missing or unreadable store is never an error for readers: it simply
//! means "no settings yet".
use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use log::{debug, info, warn};

use crate::{error::ConfigError, settings::Settings};

pub trait ConfigStore: Send + Sync {
    /// Last persisted settings, `None` when absent or malformed.
    fn read(&self) -> Option<Settings>;

    fn write(&self, settings: &Settings) -> Result<(), ConfigError>;
}

/// Settings stored as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn read(&self) -> Option<Settings> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("No settings at {}: {e}", self.path.display());
                return None;
            }
        };
        parse_stored(&raw)
    }

    fn write(&self, settings: &Settings) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(settings)?)?;
        info!("Saved {} setting(s) to {}", settings.len(), self.path.display());
        Ok(())
    }
}

/// In-memory store holding the serialized document.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    raw: Mutex<Option<String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a raw document, well-formed or not.
    pub fn with_raw(raw: &str) -> Self {
        Self {
            raw: Mutex::new(Some(raw.to_string())),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn read(&self) -> Option<Settings> {
        let raw = self.raw.lock().ok()?.clone()?;
        parse_stored(&raw)
    }

    fn write(&self, settings: &Settings) -> Result<(), ConfigError> {
        let raw = serde_json::to_string(settings)?;
        *self.raw.lock().map_err(|_| ConfigError::StoreUnavailable)? = Some(raw);
        Ok(())
    }
}

fn parse_stored(raw: &str) -> Option<Settings> {
    match serde_json::from_str::<serde_json::Value>(raw)
        .map_err(ConfigError::from)
        .and_then(Settings::from_json_object)
    {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!("Ignoring stored settings: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_absent_and_malformed() {
        assert_eq!(MemoryConfigStore::new().read(), None);
        assert_eq!(MemoryConfigStore::with_raw("{not json").read(), None);
        assert_eq!(MemoryConfigStore::with_raw("[1, 2]").read(), None);
    }

    #[test]
    fn test_memory_store_write_then_read() {
        let store = MemoryConfigStore::new();
        let mut settings = Settings::new();
        settings.insert("batwarn", 20);
        settings.insert("dialfont", "smooth");
        store.write(&settings).unwrap();
        assert_eq!(store.read(), Some(settings));
    }
}
