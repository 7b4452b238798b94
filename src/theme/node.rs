use std::collections::btree_map;
use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use crate::error::{Result, ThemeError};

// ═══════════════════════════════════════════════════════════════════════════════
// Theme value tree
// ═══════════════════════════════════════════════════════════════════════════════

/// A single entry of a theme: either a scalar, a list, or a nested node.
#[derive(Debug, Clone, PartialEq)]
pub enum ThemeValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<ThemeValue>),
    Node(ThemeNode),
}

impl ThemeValue {
    pub fn as_node(&self) -> Option<&ThemeNode> {
        match self {
            ThemeValue::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut ThemeNode> {
        match self {
            ThemeValue::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ThemeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ThemeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ThemeValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ThemeValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, ThemeValue::Node(_))
    }

    /// Converts back into the JSON form the value was parsed from
    pub fn to_json(&self) -> Value {
        match self {
            ThemeValue::Null => Value::Null,
            ThemeValue::Bool(b) => Value::Bool(*b),
            ThemeValue::Number(n) => Value::Number(n.clone()),
            ThemeValue::String(s) => Value::String(s.clone()),
            ThemeValue::List(items) => Value::Array(items.iter().map(ThemeValue::to_json).collect()),
            ThemeValue::Node(node) => node.to_json(),
        }
    }
}

impl From<Value> for ThemeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ThemeValue::Null,
            Value::Bool(b) => ThemeValue::Bool(b),
            Value::Number(n) => ThemeValue::Number(n),
            Value::String(s) => ThemeValue::String(s),
            Value::Array(items) => ThemeValue::List(items.into_iter().map(ThemeValue::from).collect()),
            Value::Object(map) => ThemeValue::Node(ThemeNode::from_json_object(map)),
        }
    }
}

impl From<ThemeNode> for ThemeValue {
    fn from(node: ThemeNode) -> Self {
        ThemeValue::Node(node)
    }
}

impl From<&str> for ThemeValue {
    fn from(s: &str) -> Self {
        ThemeValue::String(s.to_string())
    }
}

impl From<String> for ThemeValue {
    fn from(s: String) -> Self {
        ThemeValue::String(s)
    }
}

impl From<bool> for ThemeValue {
    fn from(b: bool) -> Self {
        ThemeValue::Bool(b)
    }
}

impl From<i64> for ThemeValue {
    fn from(n: i64) -> Self {
        ThemeValue::Number(n.into())
    }
}

impl From<f64> for ThemeValue {
    /// NaN and infinities have no JSON form and become `Null`
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(ThemeValue::Null, ThemeValue::Number)
    }
}

/// Parsed content of one theme, keyed by property name.
///
/// Iteration order is the key order, so two trees built from the same JSON
/// always compare and serialize identically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThemeNode {
    entries: BTreeMap<String, ThemeValue>,
}

impl ThemeNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a node tree from a JSON object. Nested objects become child
    /// nodes, everything else is stored as-is.
    pub fn from_json_object(map: Map<String, Value>) -> Self {
        let entries = map
            .into_iter()
            .map(|(key, value)| (key, ThemeValue::from(value)))
            .collect();
        Self { entries }
    }

    /// Flat JSON object form, used as the persisted representation
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect();
        Value::Object(map)
    }

    pub fn get(&self, key: &str) -> Option<&ThemeValue> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ThemeValue> {
        self.entries.get_mut(key)
    }

    pub fn child(&self, key: &str) -> Option<&ThemeNode> {
        self.get(key).and_then(ThemeValue::as_node)
    }

    pub fn child_mut(&mut self, key: &str) -> Option<&mut ThemeNode> {
        self.get_mut(key).and_then(ThemeValue::as_node_mut)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ThemeValue>) -> Option<ThemeValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<ThemeValue> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ThemeValue> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Looks up a value by a separator-joined path such as `"color.bg"`
    pub fn get_path(&self, path: &str, separator: &str) -> Option<&ThemeValue> {
        if path.is_empty() || separator.is_empty() {
            return None;
        }
        let mut tokens = path.split(separator);
        let first = tokens.next()?;
        let mut current = self.get(first)?;
        for token in tokens {
            current = current.as_node()?.get(token)?;
        }
        Some(current)
    }

    /// Sets the value at `path`, walking one child node per segment.
    ///
    /// Every segment but the last must name an existing child node; missing
    /// intermediate nodes are not created. Returns the replaced value, if any.
    pub fn set_path(
        &mut self,
        path: &str,
        value: impl Into<ThemeValue>,
        separator: &str,
    ) -> Result<Option<ThemeValue>> {
        let invalid = |segment: &str| ThemeError::InvalidPath {
            path: path.to_string(),
            segment: segment.to_string(),
        };

        if path.is_empty() || separator.is_empty() {
            return Err(invalid(path));
        }

        let mut tokens: Vec<&str> = path.split(separator).collect();
        let last = match tokens.pop() {
            Some(last) if !last.is_empty() => last,
            _ => return Err(invalid(path)),
        };

        let mut node = self;
        for token in tokens {
            node = match node.entries.get_mut(token) {
                Some(ThemeValue::Node(child)) => child,
                _ => return Err(invalid(token)),
            };
        }

        Ok(node.entries.insert(last.to_string(), value.into()))
    }
}

impl TryFrom<Value> for ThemeNode {
    type Error = Value;

    /// Only JSON objects convert; any other value is handed back unchanged
    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(ThemeNode::from_json_object(map)),
            other => Err(other),
        }
    }
}

impl<'a> IntoIterator for &'a ThemeNode {
    type Item = (&'a String, &'a ThemeValue);
    type IntoIter = btree_map::Iter<'a, String, ThemeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ThemeNode {
        ThemeNode::try_from(json!({
            "name": "dark",
            "a": { "b": { "c": 1, "d": "keep" }, "sibling": true },
            "list": [1, { "x": null }]
        }))
        .unwrap()
    }

    #[test]
    fn test_nested_objects_become_child_nodes() {
        let node = sample();
        let a = node.child("a").unwrap();
        let b = a.child("b").unwrap();
        assert_eq!(b.get("c").and_then(ThemeValue::as_i64), Some(1));
        assert_eq!(a.get("sibling").and_then(ThemeValue::as_bool), Some(true));
        assert_eq!(node.get("name").and_then(ThemeValue::as_str), Some("dark"));
        assert!(node.child("name").is_none());
    }

    #[test]
    fn test_scalar_map_is_leaf_node() {
        let node = ThemeNode::try_from(json!({"bg": "#000", "fg": "#fff"})).unwrap();
        assert_eq!(node.len(), 2);
        assert!(node.iter().all(|(_, v)| !v.is_node()));
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let src = r##"{"color":{"bg":"#000","fg":"#fff"},"size":12}"##;
        let first = ThemeNode::try_from(serde_json::from_str::<Value>(src).unwrap()).unwrap();
        let second = ThemeNode::try_from(serde_json::from_str::<Value>(src).unwrap()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_json().to_string(), second.to_json().to_string());
    }

    #[test]
    fn test_to_json_preserves_shape() {
        let original = json!({"color": {"bg": "#000"}, "list": [1, {"x": null}], "n": 1.5});
        let node = ThemeNode::try_from(original.clone()).unwrap();
        assert_eq!(node.to_json(), original);
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert_eq!(ThemeNode::try_from(json!([1, 2])), Err(json!([1, 2])));
        assert!(ThemeNode::try_from(json!("text")).is_err());
    }

    #[test]
    fn test_set_path_nested_leaves_siblings() {
        let mut node = sample();
        let previous = node.set_path("a.b.c", 42i64, ".").unwrap();
        assert_eq!(previous, Some(ThemeValue::from(1i64)));
        assert_eq!(node.get_path("a.b.c", ".").and_then(ThemeValue::as_i64), Some(42));
        assert_eq!(node.get_path("a.b.d", ".").and_then(ThemeValue::as_str), Some("keep"));
        assert_eq!(node.get_path("a.sibling", ".").and_then(ThemeValue::as_bool), Some(true));
    }

    #[test]
    fn test_set_path_creates_last_key_only() {
        let mut node = sample();
        assert_eq!(node.set_path("a.b.new", "v", ".").unwrap(), None);
        assert_eq!(node.get_path("a.b.new", ".").and_then(ThemeValue::as_str), Some("v"));

        let err = node.set_path("a.missing.key", 1i64, ".").unwrap_err();
        match err {
            ThemeError::InvalidPath { segment, .. } => assert_eq!(segment, "missing"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(node.child("a").unwrap().get("missing").is_none());
    }

    #[test]
    fn test_set_path_through_scalar_fails() {
        let mut node = sample();
        let err = node.set_path("name.x", 1i64, ".").unwrap_err();
        assert!(matches!(err, ThemeError::InvalidPath { ref segment, .. } if segment == "name"));
        assert_eq!(node.get("name").and_then(ThemeValue::as_str), Some("dark"));
    }

    #[test]
    fn test_set_path_rejects_empty_input() {
        let mut node = sample();
        assert!(node.set_path("", 1i64, ".").is_err());
        assert!(node.set_path("a", 1i64, "").is_err());
        assert!(node.set_path("a.", 1i64, ".").is_err());
    }

    #[test]
    fn test_set_path_custom_separator() {
        let mut node = sample();
        node.set_path("a/b/c", "slash", "/").unwrap();
        assert_eq!(node.get_path("a/b/c", "/").and_then(ThemeValue::as_str), Some("slash"));
    }

    #[test]
    fn test_f64_nan_becomes_null() {
        assert_eq!(ThemeValue::from(f64::NAN), ThemeValue::Null);
        assert_eq!(ThemeValue::from(0.5).as_f64(), Some(0.5));
    }
}
