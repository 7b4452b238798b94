use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ThemeError};
use crate::theme::DEFAULT_THEME_NAME;

/// Representation of the backing settings store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsFormat {
    /// `settings.json`, a single JSON object
    #[default]
    Native,
    /// `settings.ini`, portable `key=value` lines
    Ini,
}

impl SettingsFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            SettingsFormat::Native => "settings.json",
            SettingsFormat::Ini => "settings.ini",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "native" | "json" => Some(SettingsFormat::Native),
            "ini" => Some(SettingsFormat::Ini),
            _ => None,
        }
    }
}

/// Parameters applied to a `ThemeStore` in one go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsParameters {
    /// Folder scanned for `*.json` themes; relative to the executable dir
    #[serde(default)]
    pub setting_folder: String,
    /// Extra token prepended to every settings key
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub format: SettingsFormat,
    /// Explicit theme files, loaded in addition to the folder scan
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub theme_paths: Vec<PathBuf>,
    #[serde(default = "default_current_theme")]
    pub current_theme: String,
}

fn default_current_theme() -> String {
    DEFAULT_THEME_NAME.to_string()
}

impl Default for SettingsParameters {
    fn default() -> Self {
        Self {
            setting_folder: String::new(),
            prefix: String::new(),
            format: SettingsFormat::default(),
            theme_paths: Vec::new(),
            current_theme: default_current_theme(),
        }
    }
}

impl SettingsParameters {
    /// Returns the settings directory path (~/.themestore)
    pub fn settings_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".themestore"))
    }

    /// Returns the default parameters file path (~/.themestore/parameters.json)
    pub fn default_path() -> Option<PathBuf> {
        Self::settings_dir().map(|d| d.join("parameters.json"))
    }

    /// Loads parameters from a JSON file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ThemeError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        serde_json::from_str(&content)
            .map_err(|e| ThemeError::Config(format!("Invalid JSON in {}: {}", path.display(), e)))
    }

    /// Loads the default parameters file, falling back to defaults if not found or invalid
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Self::default()
        })
    }
}
