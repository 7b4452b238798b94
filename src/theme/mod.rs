pub mod builtin;
pub mod loader;
pub mod node;

pub use builtin::{default_theme, DEFAULT_THEME_NAME};
pub use node::{ThemeNode, ThemeValue};
