use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("Not a theme file (expected .json): {}", path.display())]
    NotJson { path: PathBuf },

    #[error("Couldn't open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't parse {} at byte {offset}: {message}", path.display())]
    Parse {
        path: PathBuf,
        message: String,
        offset: usize,
    },

    #[error("Top-level value of {} is not a JSON object", path.display())]
    NotAnObject { path: PathBuf },

    #[error("Invalid theme name: {0:?}")]
    InvalidName(String),

    #[error("No active theme")]
    NoActiveTheme,

    #[error("Invalid path {path:?}: segment {segment:?} is not a nested node")]
    InvalidPath { path: String, segment: String },

    #[error("Settings store error: {0}")]
    Storage(String),

    #[error("Settings store IO error: {0}")]
    StorageIo(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ThemeError>;
