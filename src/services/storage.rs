use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::config::SettingsFormat;
use crate::error::{Result, ThemeError};

/// Key of the cached theme map: `{prefix}/themes/{name}`
pub fn theme_key(prefix: &str, name: &str) -> String {
    join_key(prefix, &format!("themes/{}", name))
}

/// Key of the persisted selection: `{prefix}/currentTheme`
pub fn current_theme_key(prefix: &str) -> String {
    join_key(prefix, "currentTheme")
}

fn join_key(prefix: &str, rest: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        rest.to_string()
    } else {
        format!("{}/{}", prefix, rest)
    }
}

/// Durable key-value store backing the theme cache and the selection
pub trait SettingsBackend {
    fn get(&self, key: &str) -> Option<&Value>;

    fn set(&mut self, key: &str, value: Value) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn keys(&self) -> Vec<String>;

    /// Drops every key
    fn clear(&mut self) -> Result<()>;

    fn format(&self) -> SettingsFormat;

    /// Switches the on-disk representation. Backends without one just record it.
    fn set_format(&mut self, format: SettingsFormat) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory backend
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: BTreeMap<String, Value>,
    format: SettingsFormat,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn format(&self) -> SettingsFormat {
        self.format
    }

    fn set_format(&mut self, format: SettingsFormat) -> Result<()> {
        self.format = format;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// File backend
// ═══════════════════════════════════════════════════════════════════════════════

/// Settings persisted to `settings.json` (native) or `settings.ini` (portable)
/// inside a settings directory. Every mutation is written through.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    format: SettingsFormat,
    entries: BTreeMap<String, Value>,
}

impl FileBackend {
    /// Opens the settings file for `format` in `dir`. A missing file is an empty
    /// store; a corrupt one is logged and replaced on the next write.
    pub fn open(dir: impl Into<PathBuf>, format: SettingsFormat) -> Self {
        let dir = dir.into();
        let entries = Self::read_entries(&dir.join(format.file_name()), format);
        Self { dir, format, entries }
    }

    /// Path of the settings file currently in use
    pub fn path(&self) -> PathBuf {
        self.dir.join(self.format.file_name())
    }

    fn read_entries(path: &Path, format: SettingsFormat) -> BTreeMap<String, Value> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return BTreeMap::new(),
        };
        let parsed = match format {
            SettingsFormat::Native => decode_native(&content),
            SettingsFormat::Ini => decode_ini(&content),
        };
        match parsed {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                BTreeMap::new()
            }
        }
    }

    /// Writes the store using the atomic write pattern (temp file, then rename)
    fn flush(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
            // Set directory permissions to user-only on Unix
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = fs::Permissions::from_mode(0o700);
                let _ = fs::set_permissions(&self.dir, perms);
            }
        }

        let content = match self.format {
            SettingsFormat::Native => encode_native(&self.entries)?,
            SettingsFormat::Ini => encode_ini(&self.entries)?,
        };

        let path = self.path();
        let temp_path = self.dir.join(format!("{}.tmp", self.format.file_name()));
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }
}

impl SettingsBackend for FileBackend {
    fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        if self.entries.get(key) == Some(&value) {
            return Ok(());
        }
        let previous = self.entries.insert(key.to_string(), value);
        self.flush().inspect_err(|_| {
            match previous {
                Some(old) => self.entries.insert(key.to_string(), old),
                None => self.entries.remove(key),
            };
        })
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let Some(previous) = self.entries.remove(key) else {
            return Ok(());
        };
        self.flush().inspect_err(|_| {
            self.entries.insert(key.to_string(), previous);
        })
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn clear(&mut self) -> Result<()> {
        let previous = std::mem::take(&mut self.entries);
        self.flush().inspect_err(|_| {
            self.entries = previous;
        })
    }

    fn format(&self) -> SettingsFormat {
        self.format
    }

    fn set_format(&mut self, format: SettingsFormat) -> Result<()> {
        if self.format == format {
            return Ok(());
        }
        self.format = format;
        self.entries = Self::read_entries(&self.path(), format);
        Ok(())
    }
}

// ─── Native (JSON) encoding ────────────────────────────────────────────

fn decode_native(content: &str) -> Result<BTreeMap<String, Value>> {
    let map: Map<String, Value> =
        serde_json::from_str(content).map_err(|e| ThemeError::Storage(e.to_string()))?;
    Ok(map.into_iter().collect())
}

fn encode_native(entries: &BTreeMap<String, Value>) -> Result<String> {
    serde_json::to_string_pretty(entries).map_err(|e| ThemeError::Storage(e.to_string()))
}

// ─── Portable (INI) encoding ───────────────────────────────────────────
// One `key=<compact json>` line per entry under a `[General]` section.

const INI_SECTION: &str = "[General]";

/// Percent-encodes the characters the line format would otherwise eat:
/// `%`, `=`, line breaks and whitespace anywhere, and a leading `[`, `#` or `;`
fn escape_ini_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (index, c) in key.chars().enumerate() {
        let leading = index == 0 && matches!(c, '[' | '#' | ';');
        if leading || matches!(c, '%' | '=') || c.is_whitespace() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn unescape_ini_key(key: &str) -> String {
    let bytes = key.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(byte) = key
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn decode_ini(content: &str) -> Result<BTreeMap<String, Value>> {
    let mut entries = BTreeMap::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') || line.starts_with('[') {
            continue;
        }
        let (key, raw) = line
            .split_once('=')
            .ok_or_else(|| ThemeError::Storage(format!("line {}: missing '='", index + 1)))?;
        let value: Value = serde_json::from_str(raw.trim())
            .map_err(|e| ThemeError::Storage(format!("line {}: {}", index + 1, e)))?;
        entries.insert(unescape_ini_key(key.trim()), value);
    }
    Ok(entries)
}

fn encode_ini(entries: &BTreeMap<String, Value>) -> Result<String> {
    let mut out = String::from(INI_SECTION);
    out.push('\n');
    for (key, value) in entries {
        let raw = serde_json::to_string(value).map_err(|e| ThemeError::Storage(e.to_string()))?;
        out.push_str(&escape_ini_key(key));
        out.push('=');
        out.push_str(&raw);
        out.push('\n');
    }
    Ok(out)
}
