use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::node::ThemeNode;
use crate::error::{Result, ThemeError};

// ═══════════════════════════════════════════════════════════════════════════════
// Theme discovery
// ═══════════════════════════════════════════════════════════════════════════════

/// Returns true if the path names a `.json` file
pub fn is_theme_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Theme name for a path: the file name up to its first `.`
pub fn theme_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .and_then(|s| s.split('.').next())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Validates a theme name used as a settings key
/// Security: names are also used to build `{name}.json` paths, so separators and
/// traversal tokens are rejected
pub fn is_valid_theme_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 64 {
        return false;
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return false;
    }
    !name.chars().any(|c| c.is_control())
}

/// Resolves the configured setting folder. Relative folders are taken relative
/// to `base_dir`, absolute ones are used as-is.
pub fn resolve_folder(folder: &str, base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(folder);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

/// Directory of the running executable, used as base for relative folders
pub fn app_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Lists the `.json` files directly inside `folder` (non-recursive), sorted.
///
/// A missing or unreadable folder yields an empty list; the settings folder
/// may simply not exist yet on first run.
pub fn discover(folder: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Skipping theme folder {}: {}", folder.display(), e);
            return Vec::new();
        }
    };

    let mut found: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        // Follows symlinks
        .filter(|path| path.is_file() && is_theme_file(path))
        .collect();
    found.sort();

    tracing::debug!("Found {} theme file(s) in {}", found.len(), folder.display());
    found
}

// ═══════════════════════════════════════════════════════════════════════════════
// Theme file loading
// ═══════════════════════════════════════════════════════════════════════════════

/// Reads and parses a theme file into a node tree
pub fn read_theme_file(path: &Path) -> Result<ThemeNode> {
    if !is_theme_file(path) {
        return Err(ThemeError::NotJson { path: path.to_path_buf() });
    }
    let content = fs::read_to_string(path).map_err(|source| ThemeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_theme(&content, path)
}

/// Parses theme JSON. `path` is only used for error reporting.
pub fn parse_theme(content: &str, path: &Path) -> Result<ThemeNode> {
    let value: Value = serde_json::from_str(content).map_err(|e| ThemeError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
        offset: byte_offset(content, e.line(), e.column()),
    })?;
    ThemeNode::try_from(value).map_err(|_| ThemeError::NotAnObject { path: path.to_path_buf() })
}

/// Converts serde_json's 1-based line/column into a byte offset
fn byte_offset(content: &str, line: usize, column: usize) -> usize {
    let line_start: usize = content
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(content.len())
}
