use serde_json::json;

use super::node::ThemeNode;

/// Name of the theme synthesized in memory when nothing has been cached yet
pub const DEFAULT_THEME_NAME: &str = "default";

/// Minimal valid theme used on first run
pub fn default_theme() -> ThemeNode {
    let value = json!({
        "name": DEFAULT_THEME_NAME,
        "palette": {
            "background": "#ffffff",
            "foreground": "#000000",
            "accent": "#0078d7",
            "border": "#c0c0c0"
        },
        "font": {
            "family": "sans-serif",
            "size": 12
        }
    });
    match value {
        serde_json::Value::Object(map) => ThemeNode::from_json_object(map),
        _ => ThemeNode::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::node::ThemeValue;

    #[test]
    fn test_default_theme_is_nested() {
        let theme = default_theme();
        assert_eq!(theme.get("name").and_then(ThemeValue::as_str), Some(DEFAULT_THEME_NAME));
        assert!(theme.child("palette").is_some());
        assert_eq!(theme.get_path("font.size", ".").and_then(ThemeValue::as_i64), Some(12));
    }
}
