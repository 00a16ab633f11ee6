use thiserror::Error;

/// Faults in schema construction. These are programming mistakes in a
/// component definition, raised when the schema is built rather than when a
/// document is validated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("key '{key}' has conflicting value types: {left} vs {right}")]
    ConflictingType {
        key: String,
        left: String,
        right: String,
    },

    #[error("key '{key}' appears twice in exclusive group '{group}'")]
    DuplicateGroupKey { key: String, group: String },

    #[error("invalid regex pattern '{pattern}': {error}")]
    InvalidRegex { pattern: String, error: String },

    #[error("invalid bounds for '{what}': {min} > {max}")]
    InvalidBounds {
        what: &'static str,
        min: String,
        max: String,
    },
}
