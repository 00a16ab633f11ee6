// Validated setting tree
// What schemas produce: normalized scalars, id handles, lists and mappings.

use crate::{Mapping, Value};
use indexmap::IndexMap;
use std::fmt;

/// Handle of a declared identifier in a symbol table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub usize);

/// Handle of a pending reference in a symbol table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(pub usize);

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decl#{}", self.0)
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.0)
    }
}

/// Normalized value
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Canonical enumeration token
    Enum(String),
    /// Whole milliseconds
    Duration(u64),
    Byte(u8),
    Declare(DeclId),
    Use(RefId),
    List(Vec<Setting>),
    Map(Settings),
    /// Native code body, emitted verbatim
    Lambda(String),
}

/// Resolves id handles to names when a tree is rendered back into values
pub trait IdNames {
    fn declared_name(&self, id: DeclId) -> String;
    fn referenced_name(&self, id: RefId) -> String;
}

impl Setting {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Setting::Int(i) => Some(*i),
            Setting::Byte(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Setting::Float(x) => Some(*x),
            Setting::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Setting::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text of a string or enum token
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Setting::Str(s) | Setting::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<u64> {
        match self {
            Setting::Duration(ms) => Some(*ms),
            _ => None,
        }
    }

    pub fn as_byte(&self) -> Option<u8> {
        match self {
            Setting::Byte(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_lambda(&self) -> Option<&str> {
        match self {
            Setting::Lambda(code) => Some(code),
            _ => None,
        }
    }

    pub fn as_decl(&self) -> Option<DeclId> {
        match self {
            Setting::Declare(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<RefId> {
        match self {
            Setting::Use(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Setting]> {
        match self {
            Setting::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Settings> {
        match self {
            Setting::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Every reference handle in the tree, in tree order
    pub fn references(&self) -> Vec<RefId> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs(&self, out: &mut Vec<RefId>) {
        match self {
            Setting::Use(id) => out.push(*id),
            Setting::List(items) => items.iter().for_each(|s| s.collect_refs(out)),
            Setting::Map(map) => map.values().for_each(|s| s.collect_refs(out)),
            _ => {}
        }
    }

    /// Render back into an untyped value, with ids replaced by their names
    pub fn to_value(&self, names: &dyn IdNames) -> Value {
        match self {
            Setting::Null => Value::Null,
            Setting::Bool(b) => Value::Bool(*b),
            Setting::Int(i) => Value::Int(*i),
            Setting::Float(x) => Value::Float(*x),
            Setting::Str(s) | Setting::Enum(s) => Value::String(s.clone()),
            Setting::Duration(ms) => Value::String(format!("{}ms", ms)),
            Setting::Byte(b) => Value::String(format!("0x{:02X}", b)),
            Setting::Declare(id) => Value::String(names.declared_name(*id)),
            Setting::Use(id) => Value::String(names.referenced_name(*id)),
            Setting::List(items) => Value::List(items.iter().map(|s| s.to_value(names)).collect()),
            Setting::Map(map) => Value::Map(map.to_mapping(names)),
            Setting::Lambda(code) => Value::Lambda(code.clone()),
        }
    }
}

/// Validated mapping, keyed by option name in schema order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    entries: IndexMap<String, Setting>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Setting) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Setting> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Setting)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Setting> {
        self.entries.values()
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Setting::as_int)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Setting::as_float)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Setting::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Setting::as_str)
    }

    pub fn get_duration(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Setting::as_duration)
    }

    pub fn get_lambda(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Setting::as_lambda)
    }

    pub fn get_decl(&self, key: &str) -> Option<DeclId> {
        self.get(key).and_then(Setting::as_decl)
    }

    pub fn get_ref(&self, key: &str) -> Option<RefId> {
        self.get(key).and_then(Setting::as_ref_id)
    }

    pub fn get_list(&self, key: &str) -> Option<&[Setting]> {
        self.get(key).and_then(Setting::as_list)
    }

    pub fn get_map(&self, key: &str) -> Option<&Settings> {
        self.get(key).and_then(Setting::as_map)
    }

    pub fn to_mapping(&self, names: &dyn IdNames) -> Mapping {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_value(names)))
            .collect()
    }
}

impl FromIterator<(String, Setting)> for Settings {
    fn from_iter<I: IntoIterator<Item = (String, Setting)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Names;

    impl IdNames for Names {
        fn declared_name(&self, id: DeclId) -> String {
            format!("decl_{}", id.0)
        }

        fn referenced_name(&self, id: RefId) -> String {
            format!("ref_{}", id.0)
        }
    }

    #[test]
    fn test_accessors() {
        let mut settings = Settings::new();
        settings.insert("address", Setting::Byte(0x23));
        settings.insert("update_interval", Setting::Duration(60_000));
        settings.insert("gain", Setting::Enum("1X".into()));

        assert_eq!(settings.get_int("address"), Some(0x23));
        assert_eq!(settings.get_duration("update_interval"), Some(60_000));
        assert_eq!(settings.get_str("gain"), Some("1X"));
        assert_eq!(settings.get_bool("gain"), None);
    }

    #[test]
    fn test_references_walk_nested_tree() {
        let mut inner = Settings::new();
        inner.insert("bus_id", Setting::Use(RefId(1)));
        let tree = Setting::List(vec![Setting::Use(RefId(0)), Setting::Map(inner)]);
        assert_eq!(tree.references(), vec![RefId(0), RefId(1)]);
    }

    #[test]
    fn test_to_value_names_ids() {
        let mut settings = Settings::new();
        settings.insert("id", Setting::Declare(DeclId(3)));
        settings.insert("uart_id", Setting::Use(RefId(0)));
        settings.insert("timeout", Setting::Duration(200));
        settings.insert("lambda", Setting::Lambda("return 1;".into()));

        let mapping = settings.to_mapping(&Names);
        assert_eq!(mapping.get("id"), Some(&Value::from("decl_3")));
        assert_eq!(mapping.get("uart_id"), Some(&Value::from("ref_0")));
        assert_eq!(mapping.get("timeout"), Some(&Value::from("200ms")));
        assert_eq!(mapping.get("lambda"), Some(&Value::Lambda("return 1;".into())));
    }
}
