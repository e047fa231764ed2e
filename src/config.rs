//! Sync-layer configuration.
//!
//! Loaded from `~/.shopsync/config.json` when present; every field has a
//! serde default so an empty or missing file yields a working config.

use std::path::PathBuf;

use serde::Deserialize;

fn default_event_capacity() -> usize {
    64
}

/// Tuning knobs for the sync layer. Construction never touches the network.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Override for the local cache database path. Defaults to
    /// `~/.shopsync/cache.db`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Skip SQLite entirely and run memory-only (kiosk mode, tests).
    #[serde(default)]
    pub in_memory: bool,

    /// Capacity of the connectivity and drain-event broadcast channels.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            in_memory: false,
            event_capacity: default_event_capacity(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from `~/.shopsync/config.json`, falling back to
    /// defaults if the file is missing or unreadable.
    pub fn load() -> Self {
        let Some(home) = dirs::home_dir() else {
            return Self::default();
        };
        let path = home.join(".shopsync").join("config.json");
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Failed to parse {}: {e}. Using defaults.", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {e}. Using defaults.", path.display());
                Self::default()
            }
        }
    }
}
