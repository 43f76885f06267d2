use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::snapshot::DEFAULT_PERSIST_CAP;

/// Errors that can occur while loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to serialize config: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Tunables for a document's edit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum undo stack depth; oldest entries are evicted first.
    pub max_history: usize,
    /// Bound on eagerly persisted snapshots and on the resident protected
    /// window. Clamped to [3, 20] when applied.
    pub memory_cache_size: usize,
    /// When off, every push stores a full snapshot regardless of bbox.
    pub capture_regions: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history: 30,
            memory_cache_size: DEFAULT_PERSIST_CAP,
            capture_regions: true,
        }
    }
}

/// Top-level editor configuration, persisted as pretty JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    pub history: HistoryConfig,
    pub default_canvas_width: u32,
    pub default_canvas_height: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history: HistoryConfig::default(),
            default_canvas_width: 800,
            default_canvas_height: 600,
        }
    }
}

impl EditorConfig {
    /// Loads configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Saves configuration as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.history.max_history, 30);
        assert_eq!(config.history.memory_cache_size, 8);
        assert!(config.history.capture_regions);
    }

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings").join("editor.json");

        let mut config = EditorConfig::default();
        config.history.max_history = 50;
        config.save(&path).unwrap();

        let loaded = EditorConfig::load(&path).unwrap();
        assert_eq!(loaded.history.max_history, 50);
        assert_eq!(loaded.default_canvas_width, 800);
    }
}
