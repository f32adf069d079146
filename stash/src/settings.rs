//! User settings consumed by the capture pipeline and item builder

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::Category;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Capture and classification settings.
///
/// Missing fields in a stored file take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Start the capture loop when the store is opened
    pub auto_capture: bool,
    /// Drop clipboard values that look like passwords
    pub ignore_passwords: bool,
    /// Run the category cascade on new items
    pub auto_categorize: bool,
    /// Category used verbatim when `auto_categorize` is off
    pub default_category: String,
    pub capture_interval_ms: u64,
    /// Informational only; the store does not cap or evict items
    pub max_items: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_capture: true,
            ignore_passwords: true,
            auto_categorize: true,
            default_category: Category::Text.as_str().to_string(),
            capture_interval_ms: 500,
            max_items: 1000,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. A missing file yields defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write settings as pretty JSON, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn capture_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.capture_interval_ms.max(1))
    }
}
