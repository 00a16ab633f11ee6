/// Document breadcrumbs
///
/// A path names the position of a value inside the parsed document, e.g.
/// `sensor[0].platform` or `dev.bus_id`. Validators extend the path as they
/// descend so every diagnostic can point back at the offending value.
use serde::{Serialize, Serializer};
use std::fmt;

/// One step into a mapping key or a list index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigPath {
    segments: Vec<PathSegment>,
}

impl ConfigPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from plain mapping keys
    pub fn from_keys(keys: &[&str]) -> Self {
        Self {
            segments: keys
                .iter()
                .map(|k| PathSegment::Key((*k).to_string()))
                .collect(),
        }
    }

    /// Child path for a mapping key
    pub fn key(&self, key: &str) -> Self {
        let mut child = self.clone();
        child.push_key(key);
        child
    }

    /// Child path for a list index
    pub fn index(&self, index: usize) -> Self {
        let mut child = self.clone();
        child.push_index(index);
        child
    }

    pub fn push_key(&mut self, key: &str) {
        self.segments.push(PathSegment::Key(key.to_string()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.segments.push(PathSegment::Index(index));
    }

    pub fn pop(&mut self) -> Option<PathSegment> {
        self.segments.pop()
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i > 0 => write!(f, ".{}", key)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}

impl Serialize for ConfigPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mixes_keys_and_indices() {
        let path = ConfigPath::root().key("sensor").index(0).key("platform");
        assert_eq!(path.to_string(), "sensor[0].platform");
        assert_eq!(ConfigPath::root().to_string(), "<root>");
    }

    #[test]
    fn test_pop_returns_to_parent() {
        let mut path = ConfigPath::from_keys(&["uart"]);
        path.push_index(2);
        path.push_key("rx_pin");
        assert_eq!(path.to_string(), "uart[2].rx_pin");
        assert_eq!(path.pop(), Some(PathSegment::Key("rx_pin".into())));
        assert_eq!(path.pop(), Some(PathSegment::Index(2)));
        assert_eq!(path, ConfigPath::root().key("uart"));
    }
}
