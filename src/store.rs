//! The theme store: owns every loaded theme, the current selection and the
//! settings backend that caches both between runs.
//!
//! The active theme is never held by reference. It is resolved from the
//! collection by name whenever it is read, so replacing a theme through
//! [`ThemeStore::save`] is immediately visible through [`ThemeStore::theme`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::{SettingsFormat, SettingsParameters};
use crate::error::{Result, ThemeError};
use crate::services::notify::{ListenerId, Notifier, ThemeEvent};
use crate::services::storage::{current_theme_key, theme_key, FileBackend, SettingsBackend};
use crate::theme::loader::{
    app_dir, discover, is_theme_file, is_valid_theme_name, read_theme_file, resolve_folder,
    theme_name,
};
use crate::theme::{default_theme, ThemeNode, ThemeValue, DEFAULT_THEME_NAME};

/// Every known theme, keyed by theme name
pub type ThemeCollection = BTreeMap<String, ThemeNode>;

/// Name-keyed theme collection with a persisted current selection
pub struct ThemeStore {
    setting_folder: String,
    prefix: String,
    theme_paths: Vec<PathBuf>,
    current_theme: String,
    themes: ThemeCollection,
    theme_loaded: bool,
    /// The `default` entry is still the synthesized one and may be replaced by a load
    builtin_default: bool,
    base_dir: PathBuf,
    backend: Box<dyn SettingsBackend>,
    notifier: Notifier,
}

impl ThemeStore {
    /// Creates a store over `backend` holding only the built-in default theme
    pub fn new(backend: Box<dyn SettingsBackend>) -> Self {
        let mut store = Self {
            setting_folder: String::new(),
            prefix: String::new(),
            theme_paths: Vec::new(),
            current_theme: String::new(),
            themes: ThemeCollection::new(),
            theme_loaded: false,
            builtin_default: true,
            base_dir: app_dir(),
            backend,
            notifier: Notifier::new(),
        };
        store.install_default_theme();
        store
    }

    /// Opens the store in the default settings directory and applies the
    /// default parameters file. A previously persisted selection wins over the
    /// configured current theme.
    pub fn open_default() -> Result<Self> {
        let dir = SettingsParameters::settings_dir()
            .ok_or_else(|| ThemeError::Config("Could not determine settings directory".to_string()))?;
        let mut params = SettingsParameters::load();
        let backend = FileBackend::open(dir, params.format);
        if let Some(name) = backend.get(&current_theme_key(&params.prefix)).and_then(Value::as_str) {
            params.current_theme = name.to_string();
        }

        let mut store = Self::new(Box::new(backend));
        store.apply_parameters(&params)?;
        Ok(store)
    }

    /// Sets the directory relative setting folders are resolved against
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn backend(&self) -> &dyn SettingsBackend {
        self.backend.as_ref()
    }

    pub fn into_backend(self) -> Box<dyn SettingsBackend> {
        self.backend
    }

    // ─── Notifications ─────────────────────────────────────────────────

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ThemeEvent) + 'static,
    {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    // ─── Configuration ─────────────────────────────────────────────────

    /// Copies every parameter into the store, refreshing as each one changes.
    ///
    /// The prefix is applied before any theme is loaded so cache lookups use
    /// the new namespace. Explicit paths and the folder scan both add to the
    /// path list, so applying the same parameters twice is a no-op.
    pub fn apply_parameters(&mut self, params: &SettingsParameters) -> Result<()> {
        self.set_format(params.format)?;
        self.set_prefix(&params.prefix);
        self.extend_theme_paths(params.theme_paths.clone());
        self.set_setting_folder(&params.setting_folder);
        self.select_theme(&params.current_theme);
        Ok(())
    }

    pub fn setting_folder(&self) -> &str {
        &self.setting_folder
    }

    /// Sets the folder to scan and registers every theme file found in it
    pub fn set_setting_folder(&mut self, value: &str) {
        if self.setting_folder == value {
            return;
        }
        self.setting_folder = value.to_string();
        self.notifier.emit(ThemeEvent::SettingFolderChanged(self.setting_folder.clone()));
        self.parse_folder();
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn set_prefix(&mut self, value: &str) {
        if self.prefix == value {
            return;
        }
        self.prefix = value.to_string();
        self.notifier.emit(ThemeEvent::PrefixChanged(self.prefix.clone()));
        if self.builtin_default {
            self.install_default_theme();
        }
    }

    pub fn format(&self) -> SettingsFormat {
        self.backend.format()
    }

    /// Switches the backing store representation
    pub fn set_format(&mut self, format: SettingsFormat) -> Result<()> {
        if self.backend.format() == format {
            return Ok(());
        }
        self.backend.set_format(format)?;
        self.notifier.emit(ThemeEvent::FormatChanged(format));
        Ok(())
    }

    pub fn theme_paths(&self) -> &[PathBuf] {
        &self.theme_paths
    }

    /// Replaces the theme path list and loads every path not loaded yet
    pub fn set_theme_paths(&mut self, paths: Vec<PathBuf>) {
        if self.theme_paths == paths {
            return;
        }
        self.theme_paths = paths;
        self.notifier.emit(ThemeEvent::ThemePathsChanged);
        self.refresh_themes();
    }

    pub fn add_theme_path(&mut self, path: impl Into<PathBuf>) -> bool {
        self.extend_theme_paths(vec![path.into()])
    }

    /// Removes `path` from the list. An already loaded theme stays in the collection.
    pub fn remove_theme_path(&mut self, path: &Path) -> bool {
        let Some(index) = self.theme_paths.iter().position(|p| p == path) else {
            return false;
        };
        self.theme_paths.remove(index);
        self.notifier.emit(ThemeEvent::ThemePathsChanged);
        true
    }

    fn extend_theme_paths(&mut self, candidates: Vec<PathBuf>) -> bool {
        let mut added = false;
        for path in candidates {
            if !self.theme_paths.contains(&path) {
                self.theme_paths.push(path);
                added = true;
            }
        }
        if added {
            self.notifier.emit(ThemeEvent::ThemePathsChanged);
            self.refresh_themes();
        }
        added
    }

    // ─── Discovery and loading ─────────────────────────────────────────

    /// Registers the theme files found in the setting folder
    pub fn parse_folder(&mut self) {
        if self.setting_folder.is_empty() {
            return;
        }
        let folder = resolve_folder(&self.setting_folder, &self.base_dir);
        let found = discover(&folder);
        self.extend_theme_paths(found);
    }

    /// Loads every configured path whose theme is not in the collection yet
    pub fn refresh_themes(&mut self) {
        for path in self.theme_paths.clone() {
            let Some(name) = theme_name(&path) else {
                tracing::warn!("Cannot derive a theme name from {}", path.display());
                continue;
            };
            if self.is_loaded(&name) {
                continue;
            }
            if self.load(&name, &path).is_ok() {
                tracing::debug!("Theme \"{}\" successfully loaded.", name);
            }
        }
    }

    fn is_loaded(&self, name: &str) -> bool {
        self.themes.contains_key(name) && !(name == DEFAULT_THEME_NAME && self.builtin_default)
    }

    /// Loads theme `name` from the settings cache, or from `path` on a cache miss.
    ///
    /// A name already in the collection is left alone. Failures are logged and
    /// leave the collection untouched.
    pub fn load(&mut self, name: &str, path: &Path) -> Result<()> {
        if self.is_loaded(name) {
            return Ok(());
        }
        self.load_entry(name, path, true)
    }

    /// Reads `path` from disk, bypassing the cache, and replaces theme `name`
    pub fn reload(&mut self, name: &str, path: &Path) -> Result<()> {
        self.load_entry(name, path, false)
    }

    fn load_entry(&mut self, name: &str, path: &Path, use_cache: bool) -> Result<()> {
        if !is_theme_file(path) {
            tracing::warn!("Cannot load {} with path {}: not a .json file", name, path.display());
            return Err(ThemeError::NotJson { path: path.to_path_buf() });
        }

        let key = theme_key(&self.prefix, name);
        if use_cache {
            if let Some(node) = self.cached_theme(&key) {
                tracing::debug!("Theme \"{}\" restored from settings cache", name);
                self.store_theme(name, node);
                return Ok(());
            }
        }

        let node = read_theme_file(path).map_err(|e| {
            tracing::warn!("Cannot load {} with path {}: {}", name, path.display(), e);
            e
        })?;

        if let Err(e) = self.backend.set(&key, node.to_json()) {
            tracing::warn!("Couldn't cache theme \"{}\": {}", name, e);
        }
        self.store_theme(name, node);
        Ok(())
    }

    fn cached_theme(&self, key: &str) -> Option<ThemeNode> {
        let value = self.backend.get(key)?.clone();
        match ThemeNode::try_from(value) {
            Ok(node) => Some(node),
            Err(_) => {
                tracing::warn!("Ignoring cached theme at {}: not a JSON object", key);
                None
            }
        }
    }

    /// Inserts or replaces a theme and re-activates it if it is the current one
    fn store_theme(&mut self, name: &str, node: ThemeNode) {
        let is_new = self.themes.insert(name.to_string(), node).is_none();
        if name == DEFAULT_THEME_NAME {
            self.builtin_default = false;
        }
        self.notifier.emit(ThemeEvent::ThemesChanged);
        if is_new {
            self.notifier.emit(ThemeEvent::ThemeNamesChanged);
        }
        if name == self.current_theme {
            self.activate();
        }
    }

    fn install_default_theme(&mut self) {
        let key = theme_key(&self.prefix, DEFAULT_THEME_NAME);
        let node = self.cached_theme(&key).unwrap_or_else(default_theme);
        if self.themes.get(DEFAULT_THEME_NAME) == Some(&node) {
            return;
        }
        let is_new = self.themes.insert(DEFAULT_THEME_NAME.to_string(), node).is_none();
        self.builtin_default = true;
        self.notifier.emit(ThemeEvent::ThemesChanged);
        if is_new {
            self.notifier.emit(ThemeEvent::ThemeNamesChanged);
        }
        if self.current_theme == DEFAULT_THEME_NAME {
            self.notifier.emit(ThemeEvent::ThemeChanged);
        }
    }

    // ─── Collection access ─────────────────────────────────────────────

    pub fn themes(&self) -> &ThemeCollection {
        &self.themes
    }

    pub fn theme_names(&self) -> Vec<String> {
        self.themes.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&ThemeNode> {
        self.themes.get(name)
    }

    // ─── Selection ─────────────────────────────────────────────────────

    pub fn current_theme(&self) -> &str {
        &self.current_theme
    }

    /// The active theme, resolved from the collection by the current selection
    pub fn theme(&self) -> Option<&ThemeNode> {
        if self.current_theme.is_empty() {
            return None;
        }
        self.themes.get(&self.current_theme)
    }

    pub fn theme_loaded(&self) -> bool {
        self.theme_loaded
    }

    /// Selects theme `name` and persists the choice. Returns whether the
    /// selection resolves to a loaded theme; selecting the current theme again
    /// does nothing.
    pub fn select_theme(&mut self, name: &str) -> bool {
        if self.current_theme == name {
            return self.theme_loaded;
        }
        self.current_theme = name.to_string();
        self.notifier.emit(ThemeEvent::CurrentThemeChanged(self.current_theme.clone()));
        self.activate();
        self.theme_loaded
    }

    fn activate(&mut self) {
        let key = current_theme_key(&self.prefix);
        let persisted = if self.current_theme.is_empty() {
            self.backend.remove(&key)
        } else {
            self.backend.set(&key, Value::String(self.current_theme.clone()))
        };
        if let Err(e) = persisted {
            tracing::warn!("Couldn't persist current theme \"{}\": {}", self.current_theme, e);
        }

        if !self.current_theme.is_empty() && !self.themes.contains_key(&self.current_theme) {
            tracing::warn!("Theme \"{}\" is not loaded", self.current_theme);
        }
        self.notifier.emit(ThemeEvent::ThemeChanged);
        self.refresh_loaded();
    }

    fn refresh_loaded(&mut self) {
        let loaded = self.theme().is_some();
        if loaded == self.theme_loaded {
            return;
        }
        self.theme_loaded = loaded;
        self.notifier.emit(ThemeEvent::ThemeLoadedChanged(loaded));
    }

    /// Whether a selection has been persisted under the current prefix
    pub fn is_selection_persisted(&self) -> bool {
        self.backend.contains(&current_theme_key(&self.prefix))
    }

    pub fn persisted_selection(&self) -> Option<String> {
        self.backend
            .get(&current_theme_key(&self.prefix))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    // ─── Mutation ──────────────────────────────────────────────────────

    /// Sets the value at a separator-joined `path` in the active theme.
    ///
    /// Nothing is persisted or emitted; call [`ThemeStore::save`] to keep the
    /// change. Returns the replaced value, if any.
    pub fn set_value(
        &mut self,
        path: &str,
        value: impl Into<ThemeValue>,
        separator: &str,
    ) -> Result<Option<ThemeValue>> {
        if self.current_theme.is_empty() {
            return Err(ThemeError::NoActiveTheme);
        }
        let theme = self
            .themes
            .get_mut(&self.current_theme)
            .ok_or(ThemeError::NoActiveTheme)?;
        theme.set_path(path, value, separator).map_err(|e| {
            tracing::warn!("Cannot set {} in theme \"{}\": {}", path, self.current_theme, e);
            e
        })
    }

    /// Replaces theme `name` with `theme` and writes it to the settings cache
    pub fn save(&mut self, name: &str, theme: ThemeNode) -> Result<()> {
        if !is_valid_theme_name(name) {
            return Err(ThemeError::InvalidName(name.to_string()));
        }
        self.backend.set(&theme_key(&self.prefix, name), theme.to_json())?;
        self.store_theme(name, theme);
        tracing::debug!("Theme \"{}\" saved", name);
        Ok(())
    }

    /// Saves the active theme, including changes made with [`ThemeStore::set_value`]
    pub fn save_current(&mut self) -> Result<()> {
        let theme = self.theme().cloned().ok_or(ThemeError::NoActiveTheme)?;
        let name = self.current_theme.clone();
        self.save(&name, theme)
    }

    /// Discards every cached theme and the persisted selection, then reloads
    /// all configured paths from disk.
    ///
    /// The collection is rebuilt from the built-in default plus the reloaded
    /// files, and the selection is cleared.
    pub fn restore(&mut self) -> Result<()> {
        self.backend.clear()?;

        if !self.current_theme.is_empty() {
            self.current_theme.clear();
            self.notifier.emit(ThemeEvent::CurrentThemeChanged(String::new()));
        }

        self.themes.clear();
        self.builtin_default = true;
        self.themes.insert(DEFAULT_THEME_NAME.to_string(), default_theme());
        self.notifier.emit(ThemeEvent::ThemesChanged);
        self.notifier.emit(ThemeEvent::ThemeNamesChanged);
        self.notifier.emit(ThemeEvent::ThemeChanged);
        self.refresh_loaded();

        self.parse_folder();
        self.refresh_themes();
        tracing::info!("Restored {} theme(s) from disk", self.themes.len());
        Ok(())
    }
}

impl std::fmt::Debug for ThemeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeStore")
            .field("setting_folder", &self.setting_folder)
            .field("prefix", &self.prefix)
            .field("format", &self.backend.format())
            .field("theme_paths", &self.theme_paths)
            .field("current_theme", &self.current_theme)
            .field("themes", &self.theme_names())
            .field("theme_loaded", &self.theme_loaded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::MemoryBackend;
    use serde_json::json;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    fn memory_store() -> ThemeStore {
        ThemeStore::new(Box::new(MemoryBackend::new()))
    }

    fn record(store: &mut ThemeStore) -> Rc<RefCell<Vec<ThemeEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        events
    }

    fn write_theme(dir: &Path, file: &str, content: &str) -> PathBuf {
        let path = dir.join(file);
        fs::write(&path, content).unwrap();
        path
    }

    fn node(value: Value) -> ThemeNode {
        ThemeNode::try_from(value).unwrap()
    }

    #[test]
    fn test_new_store_has_builtin_default() {
        let store = memory_store();
        assert_eq!(store.theme_names(), vec![DEFAULT_THEME_NAME.to_string()]);
        assert_eq!(store.get(DEFAULT_THEME_NAME), Some(&default_theme()));
        assert!(!store.theme_loaded());
        assert!(store.theme().is_none());
        assert!(!store.backend().contains(&theme_key("", DEFAULT_THEME_NAME)));
    }

    #[test]
    fn test_folder_scan_load_and_select() {
        let dir = tempfile::tempdir().unwrap();
        write_theme(dir.path(), "dark.json", r##"{"color":{"bg":"#000"}}"##);
        write_theme(dir.path(), "readme.txt", "ignored");

        let mut store = memory_store();
        store.set_setting_folder(&dir.path().to_string_lossy());

        assert_eq!(store.theme_paths(), &[dir.path().join("dark.json")]);
        let dark = store.get("dark").unwrap();
        assert_eq!(*dark, node(json!({"color": {"bg": "#000"}})));
        assert!(dark.child("color").is_some());
        assert!(store.backend().contains("themes/dark"));

        assert!(store.select_theme("dark"));
        assert!(store.theme_loaded());
        assert_eq!(store.theme(), store.get("dark"));
        assert_eq!(store.backend().get("currentTheme"), Some(&json!("dark")));
        assert!(store.is_selection_persisted());
        assert_eq!(store.persisted_selection().as_deref(), Some("dark"));
    }

    #[test]
    fn test_relative_folder_uses_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("themes")).unwrap();
        write_theme(&dir.path().join("themes"), "light.json", r#"{"bg":"white"}"#);

        let mut store = memory_store().with_base_dir(dir.path());
        store.set_setting_folder("themes");
        assert!(store.get("light").is_some());
    }

    #[test]
    fn test_missing_folder_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = memory_store();
        let events = record(&mut store);
        store.set_setting_folder(&dir.path().join("absent").to_string_lossy());
        assert!(store.theme_paths().is_empty());
        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn test_loading_twice_yields_identical_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_theme(dir.path(), "dark.json", r#"{"a":{"b":{"c":1}},"d":[true,null]}"#);

        let mut first = memory_store();
        first.load("dark", &path).unwrap();
        let mut second = memory_store();
        second.load("dark", &path).unwrap();
        assert_eq!(first.get("dark"), second.get("dark"));
    }

    #[test]
    fn test_second_load_uses_cache_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_theme(dir.path(), "dark.json", r##"{"color":{"bg":"#000"}}"##);

        let mut store = memory_store();
        store.load("dark", &path).unwrap();
        let loaded = store.get("dark").cloned();
        assert_eq!(
            store.backend().get("themes/dark"),
            Some(&json!({"color": {"bg": "#000"}}))
        );

        fs::remove_file(&path).unwrap();
        let mut reopened = ThemeStore::new(store.into_backend());
        reopened.load("dark", &path).unwrap();
        assert_eq!(reopened.get("dark").cloned(), loaded);
    }

    #[test]
    fn test_cache_survives_file_backend_reopen() {
        let themes = tempfile::tempdir().unwrap();
        let settings = tempfile::tempdir().unwrap();
        let path = write_theme(themes.path(), "dark.json", r#"{"x":1}"#);

        {
            let backend = FileBackend::open(settings.path(), SettingsFormat::Native);
            let mut store = ThemeStore::new(Box::new(backend));
            store.set_prefix("app");
            store.load("dark", &path).unwrap();
            store.select_theme("dark");
        }
        fs::write(&path, r#"{"x":2}"#).unwrap();

        let backend = FileBackend::open(settings.path(), SettingsFormat::Native);
        let mut store = ThemeStore::new(Box::new(backend));
        store.set_prefix("app");
        assert_eq!(store.persisted_selection().as_deref(), Some("dark"));
        store.load("dark", &path).unwrap();
        assert_eq!(store.get("dark"), Some(&node(json!({"x": 1}))));
    }

    #[test]
    fn test_invalid_cache_entry_falls_back_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_theme(dir.path(), "dark.json", r#"{"x":1}"#);
        let mut backend = MemoryBackend::new();
        backend.set("themes/dark", json!("garbage")).unwrap();

        let mut store = ThemeStore::new(Box::new(backend));
        store.load("dark", &path).unwrap();
        assert_eq!(store.get("dark"), Some(&node(json!({"x": 1}))));
        assert_eq!(store.backend().get("themes/dark"), Some(&json!({"x": 1})));
    }

    #[test]
    fn test_load_failures_leave_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_theme(dir.path(), "bad.json", "{ \"a\": ");
        let list = write_theme(dir.path(), "list.json", "[1, 2]");
        let text = write_theme(dir.path(), "notes.txt", "{}");

        let mut store = memory_store();
        let events = record(&mut store);
        assert!(matches!(store.load("bad", &bad), Err(ThemeError::Parse { .. })));
        assert!(matches!(store.load("list", &list), Err(ThemeError::NotAnObject { .. })));
        assert!(matches!(store.load("notes", &text), Err(ThemeError::NotJson { .. })));
        assert!(matches!(
            store.load("gone", &dir.path().join("gone.json")),
            Err(ThemeError::Io { .. })
        ));

        assert_eq!(store.theme_names(), vec![DEFAULT_THEME_NAME.to_string()]);
        assert!(store.backend().keys().is_empty());
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_load_existing_name_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_theme(dir.path(), "dark.json", r#"{"x":1}"#);
        let mut store = memory_store();
        store.load("dark", &path).unwrap();

        fs::write(&path, r#"{"x":2}"#).unwrap();
        store.load("dark", &path).unwrap();
        assert_eq!(store.get("dark"), Some(&node(json!({"x": 1}))));

        store.reload("dark", &path).unwrap();
        assert_eq!(store.get("dark"), Some(&node(json!({"x": 2}))));
        assert_eq!(store.backend().get("themes/dark"), Some(&json!({"x": 2})));
    }

    #[test]
    fn test_default_json_replaces_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_theme(dir.path(), "default.json", r#"{"custom":true}"#);
        let mut store = memory_store();
        store.add_theme_path(&path);
        assert_eq!(store.get(DEFAULT_THEME_NAME), Some(&node(json!({"custom": true}))));
    }

    #[test]
    fn test_load_emits_collection_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_theme(dir.path(), "dark.json", "{}");
        let mut store = memory_store();
        let events = record(&mut store);
        store.load("dark", &path).unwrap();
        assert_eq!(
            *events.borrow(),
            vec![ThemeEvent::ThemesChanged, ThemeEvent::ThemeNamesChanged]
        );
    }

    #[test]
    fn test_select_same_theme_twice_is_noop() {
        let mut store = memory_store();
        let events = record(&mut store);
        assert!(store.select_theme(DEFAULT_THEME_NAME));
        let after_first = events.borrow().clone();
        assert_eq!(
            after_first,
            vec![
                ThemeEvent::CurrentThemeChanged(DEFAULT_THEME_NAME.to_string()),
                ThemeEvent::ThemeChanged,
                ThemeEvent::ThemeLoadedChanged(true),
            ]
        );

        assert!(store.select_theme(DEFAULT_THEME_NAME));
        assert_eq!(*events.borrow(), after_first);
        assert_eq!(store.theme(), store.get(DEFAULT_THEME_NAME));
    }

    #[test]
    fn test_select_unknown_theme_is_recoverable() {
        let mut store = memory_store();
        store.select_theme(DEFAULT_THEME_NAME);
        let events = record(&mut store);

        assert!(!store.select_theme("missing"));
        assert!(!store.theme_loaded());
        assert!(store.theme().is_none());
        assert_eq!(store.current_theme(), "missing");
        assert_eq!(store.persisted_selection().as_deref(), Some("missing"));
        assert_eq!(
            *events.borrow(),
            vec![
                ThemeEvent::CurrentThemeChanged("missing".to_string()),
                ThemeEvent::ThemeChanged,
                ThemeEvent::ThemeLoadedChanged(false),
            ]
        );
    }

    #[test]
    fn test_loading_selected_theme_activates_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_theme(dir.path(), "late.json", r#"{"x":1}"#);
        let mut store = memory_store();
        assert!(!store.select_theme("late"));

        store.add_theme_path(&path);
        assert!(store.theme_loaded());
        assert_eq!(store.theme(), Some(&node(json!({"x": 1}))));
    }

    #[test]
    fn test_set_value_updates_active_theme_only() {
        let mut store = memory_store();
        store
            .save("nested", node(json!({"a": {"b": {"c": 1, "d": 2}, "e": 3}})))
            .unwrap();
        store.select_theme("nested");
        let events = record(&mut store);

        store.set_value("a.b.c", 42i64, ".").unwrap();
        let theme = store.theme().unwrap();
        assert_eq!(theme.get_path("a.b.c", ".").and_then(ThemeValue::as_i64), Some(42));
        assert_eq!(theme.get_path("a.b.d", ".").and_then(ThemeValue::as_i64), Some(2));
        assert_eq!(theme.get_path("a.e", ".").and_then(ThemeValue::as_i64), Some(3));
        assert_eq!(store.get("nested"), store.theme());

        assert!(events.borrow().is_empty());
        assert_eq!(
            store.backend().get("themes/nested"),
            Some(&json!({"a": {"b": {"c": 1, "d": 2}, "e": 3}}))
        );

        store.save_current().unwrap();
        assert_eq!(
            store.backend().get("themes/nested"),
            Some(&json!({"a": {"b": {"c": 42, "d": 2}, "e": 3}}))
        );
    }

    #[test]
    fn test_set_value_errors() {
        let mut store = memory_store();
        assert!(matches!(store.set_value("a", 1i64, "."), Err(ThemeError::NoActiveTheme)));

        store.select_theme(DEFAULT_THEME_NAME);
        let before = store.theme().cloned();
        assert!(matches!(
            store.set_value("nope.x", 1i64, "."),
            Err(ThemeError::InvalidPath { .. })
        ));
        assert!(matches!(
            store.set_value("name.x", 1i64, "."),
            Err(ThemeError::InvalidPath { .. })
        ));
        assert_eq!(store.theme().cloned(), before);
    }

    #[test]
    fn test_save_current_theme_updates_active_content() {
        let mut store = memory_store();
        store.save("mine", node(json!({"bg": "#111"}))).unwrap();
        store.select_theme("mine");
        let events = record(&mut store);

        store.save("mine", node(json!({"fg": "#eee"}))).unwrap();
        assert_eq!(store.theme(), Some(&node(json!({"fg": "#eee"}))));
        assert_eq!(store.backend().get("themes/mine"), Some(&json!({"fg": "#eee"})));
        assert_eq!(store.backend().get("currentTheme"), Some(&json!("mine")));
        assert_eq!(
            *events.borrow(),
            vec![ThemeEvent::ThemesChanged, ThemeEvent::ThemeChanged]
        );
    }

    #[test]
    fn test_save_other_theme_keeps_selection() {
        let mut store = memory_store();
        store.select_theme(DEFAULT_THEME_NAME);
        let events = record(&mut store);
        store.save("other", node(json!({"x": 1}))).unwrap();
        assert_eq!(store.current_theme(), DEFAULT_THEME_NAME);
        assert_eq!(store.theme(), Some(&default_theme()));
        assert_eq!(
            *events.borrow(),
            vec![ThemeEvent::ThemesChanged, ThemeEvent::ThemeNamesChanged]
        );
    }

    #[test]
    fn test_save_with_failing_backend_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = write_theme(dir.path(), "settings", "");
        let mut store = ThemeStore::new(Box::new(FileBackend::open(&blocked, SettingsFormat::Native)));

        assert!(store.save("ghost", node(json!({"a": 1}))).is_err());
        assert!(store.get("ghost").is_none());
        assert!(!store.backend().contains("themes/ghost"));

        // Disk content wins over the failed write; caching it only warns
        let themes = tempfile::tempdir().unwrap();
        let path = write_theme(themes.path(), "ghost.json", r#"{"a":2}"#);
        store.load("ghost", &path).unwrap();
        assert_eq!(store.get("ghost"), Some(&node(json!({"a": 2}))));
        assert!(!store.backend().contains("themes/ghost"));
    }

    #[test]
    fn test_save_rejects_bad_name() {
        let mut store = memory_store();
        assert!(matches!(
            store.save("../evil", ThemeNode::new()),
            Err(ThemeError::InvalidName(_))
        ));
        assert!(matches!(store.save("", ThemeNode::new()), Err(ThemeError::InvalidName(_))));
        assert!(store.get("../evil").is_none());
    }

    #[test]
    fn test_saved_default_is_restored_from_cache() {
        let mut backend = MemoryBackend::new();
        backend.set("app/themes/default", json!({"edited": true})).unwrap();
        let mut store = ThemeStore::new(Box::new(backend));
        assert_eq!(store.get(DEFAULT_THEME_NAME), Some(&default_theme()));

        store.set_prefix("app");
        assert_eq!(store.get(DEFAULT_THEME_NAME), Some(&node(json!({"edited": true}))));
    }

    #[test]
    fn test_restore_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_theme(dir.path(), "dark.json", r#"{"v":1}"#);

        let mut store = memory_store();
        store.set_theme_paths(vec![path.clone()]);
        store.save("scratch", node(json!({"tmp": true}))).unwrap();
        store.select_theme("dark");

        fs::write(&path, r#"{"v":2}"#).unwrap();
        store.restore().unwrap();

        assert!(!store.is_selection_persisted());
        assert!(!store.backend().contains("themes/scratch"));
        assert_eq!(store.current_theme(), "");
        assert!(!store.theme_loaded());
        assert_eq!(store.get("dark"), Some(&node(json!({"v": 2}))));
        assert_eq!(store.backend().get("themes/dark"), Some(&json!({"v": 2})));
        assert!(store.get("scratch").is_none());
        assert_eq!(store.get(DEFAULT_THEME_NAME), Some(&default_theme()));
    }

    #[test]
    fn test_apply_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("themes");
        fs::create_dir(&folder).unwrap();
        write_theme(&folder, "dark.json", r#"{"bg":"black"}"#);
        let extra = write_theme(dir.path(), "light.json", r#"{"bg":"white"}"#);

        let params = SettingsParameters {
            setting_folder: folder.to_string_lossy().into_owned(),
            prefix: "app".to_string(),
            format: SettingsFormat::Ini,
            theme_paths: vec![extra.clone()],
            current_theme: "dark".to_string(),
        };

        let mut store = memory_store();
        let events = record(&mut store);
        store.apply_parameters(&params).unwrap();

        assert_eq!(store.format(), SettingsFormat::Ini);
        assert_eq!(store.prefix(), "app");
        assert_eq!(store.theme_paths(), &[extra, folder.join("dark.json")]);
        assert!(store.theme_loaded());
        assert_eq!(store.theme(), Some(&node(json!({"bg": "black"}))));
        assert!(store.backend().contains("app/themes/light"));
        assert_eq!(store.backend().get("app/currentTheme"), Some(&json!("dark")));

        let events = events.borrow();
        assert_eq!(events[0], ThemeEvent::FormatChanged(SettingsFormat::Ini));
        assert_eq!(events[1], ThemeEvent::PrefixChanged("app".to_string()));
        assert_eq!(events.last(), Some(&ThemeEvent::ThemeLoadedChanged(true)));

        // Re-applying the same parameters changes nothing
        drop(events);
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        store.subscribe(move |_| *counter.borrow_mut() += 1);
        store.apply_parameters(&params).unwrap();
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_remove_theme_path_keeps_theme() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_theme(dir.path(), "dark.json", "{}");
        let mut store = memory_store();
        assert!(store.add_theme_path(&path));
        assert!(!store.add_theme_path(&path));
        assert!(store.remove_theme_path(&path));
        assert!(!store.remove_theme_path(&path));
        assert!(store.theme_paths().is_empty());
        assert!(store.get("dark").is_some());
    }
}
