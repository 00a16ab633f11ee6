// Document loading
// Converts YAML into the untyped value model, keeping key order. Loader tags
// are resolved on the way in; see `tags`.

use crate::tags::Reader;
use crate::{Mapping, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised before validation starts
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML syntax error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("top level of the document must be a mapping, found {0}")]
    NotAMapping(&'static str),

    #[error("unsupported YAML tag {tag} at {location}")]
    UnsupportedTag { tag: String, location: String },

    #[error("YAML tag {tag} at {location} needs a scalar argument")]
    TagArgument { tag: String, location: String },

    #[error("mapping keys must be scalars (at {0})")]
    NonScalarKey(String),

    #[error("duplicate key '{key}' at {location}")]
    DuplicateKey { key: String, location: String },

    #[error("Secret '{name}' not defined (at {location})")]
    UndefinedSecret { name: String, location: String },

    #[error("{path} must contain a mapping of secrets, found {found}")]
    SecretsNotAMapping { path: PathBuf, found: &'static str },

    #[error("Environment variable '{name}' not defined (at {location})")]
    UndefinedEnvVar { name: String, location: String },

    #[error("{path} includes itself")]
    IncludeCycle { path: PathBuf },
}

/// Parsed top-level document: component kind -> configuration value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub root: Mapping,
}

impl Document {
    /// Parse YAML text; an empty document is an empty mapping. File tags
    /// resolve against the current directory.
    pub fn parse(source: &str) -> Result<Self, LoadError> {
        Self::parse_in(source, Path::new("."))
    }

    /// Parse YAML text whose `!include` and `!secret` tags resolve against
    /// `dir`
    pub fn parse_in(source: &str, dir: &Path) -> Result<Self, LoadError> {
        Self::from_value(Reader::new().parse(source, dir)?)
    }

    /// Read and parse a YAML file; tags resolve next to it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        Self::from_value(Reader::new().read_file(path.as_ref())?)
    }

    fn from_value(value: Value) -> Result<Self, LoadError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Map(root) => Ok(Self { root }),
            other => Err(LoadError::NotAMapping(other.type_name())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Top-level kinds in document order
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    pub fn get(&self, kind: &str) -> Option<&Value> {
        self.root.get(kind)
    }
}
