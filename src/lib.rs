//! Theme and settings store.
//!
//! Themes are JSON documents loaded from a settings folder or from explicit
//! paths, kept in memory as [`ThemeNode`] trees and cached in a persistent
//! key-value backend together with the current selection:
//!
//! - `{prefix}/themes/{name}`: the theme's JSON object
//! - `{prefix}/currentTheme`: the selected theme name
//!
//! ```no_run
//! use themestore::{MemoryBackend, ThemeStore};
//!
//! let mut store = ThemeStore::new(Box::new(MemoryBackend::new()));
//! store.set_setting_folder("/usr/share/myapp/themes");
//! if store.select_theme("dark") {
//!     store.set_value("color.bg", "#101010", ".").ok();
//!     store.save_current().ok();
//! }
//! ```

pub mod config;
pub mod error;
pub mod services;
pub mod store;
pub mod theme;

pub use config::{SettingsFormat, SettingsParameters};
pub use error::{Result, ThemeError};
pub use services::notify::{ListenerId, ThemeEvent};
pub use services::storage::{FileBackend, MemoryBackend, SettingsBackend};
pub use store::{ThemeCollection, ThemeStore};
pub use theme::{ThemeNode, ThemeValue, DEFAULT_THEME_NAME};
