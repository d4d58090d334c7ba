//! Error types for programmer errors and file loading.
//!
//! Problems in the *input* never surface here: they accumulate in the
//! [`ErrorTree`](crate::ErrorTree) and parsing continues. This enum is the
//! separate, fatal channel for mistakes in the *schema* or in how the library
//! is driven.

use thiserror::Error;

/// Fatal errors raised while building a schema or running a parse.
#[derive(Debug, Error)]
pub enum Error {
    /// Two entries in the same context share a primary name or alias.
    #[error("duplicate flag in scope '{scope}': {flag}")]
    DuplicateFlag { scope: String, flag: String },

    /// An option or group was declared with an empty name.
    #[error("flag must define a non-empty name")]
    MissingFlagName,

    /// Neither the entry, the registry chain, nor a built-in can convert the type.
    #[error("no converter for type {type_name} (flag '{flag}')")]
    NoConverter {
        flag: String,
        type_name: &'static str,
    },

    /// Declared minimum is greater than the declared maximum.
    #[error("invalid bounds for flag '{flag}': minimum {min} is greater than maximum {max}")]
    InvalidBounds {
        flag: String,
        min: String,
        max: String,
    },

    /// An error group only partially overlaps an existing one.
    #[error("error group {start}..={end} partially overlaps {other_start}..={other_end}")]
    OverlappingGroup {
        start: usize,
        end: usize,
        other_start: usize,
        other_end: usize,
    },

    /// Input exceeds the configured byte limit.
    #[error("input too large: {len} bytes exceeds the limit of {limit}")]
    InputTooLarge { len: usize, limit: usize },

    /// A flag path does not name any entry in the schema.
    #[error("unknown flag path: {0}")]
    UnknownFlagPath(String),

    /// A flag path names a group where a value-carrying entry was expected.
    #[error("flag path '{0}' names a group, not a value")]
    NotAValue(String),

    /// Typed retrieval asked for a different type than the entry holds.
    #[error("flag '{flag}' holds {actual}, not {requested}")]
    TypeMismatch {
        flag: String,
        requested: &'static str,
        actual: &'static str,
    },

    /// A declarative schema document is structurally invalid.
    #[error("invalid schema file: {0}")]
    InvalidSchemaFile(String),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// A copy for reporting the same failure again. Wrapped I/O and parse
    /// errors keep only their kind and message.
    pub(crate) fn replay(&self) -> Error {
        match self {
            Error::DuplicateFlag { scope, flag } => Error::DuplicateFlag {
                scope: scope.clone(),
                flag: flag.clone(),
            },
            Error::MissingFlagName => Error::MissingFlagName,
            Error::NoConverter { flag, type_name } => Error::NoConverter {
                flag: flag.clone(),
                type_name: *type_name,
            },
            Error::InvalidBounds { flag, min, max } => Error::InvalidBounds {
                flag: flag.clone(),
                min: min.clone(),
                max: max.clone(),
            },
            Error::OverlappingGroup {
                start,
                end,
                other_start,
                other_end,
            } => Error::OverlappingGroup {
                start: *start,
                end: *end,
                other_start: *other_start,
                other_end: *other_end,
            },
            Error::InputTooLarge { len, limit } => Error::InputTooLarge {
                len: *len,
                limit: *limit,
            },
            Error::UnknownFlagPath(path) => Error::UnknownFlagPath(path.clone()),
            Error::NotAValue(path) => Error::NotAValue(path.clone()),
            Error::TypeMismatch {
                flag,
                requested,
                actual,
            } => Error::TypeMismatch {
                flag: flag.clone(),
                requested: *requested,
                actual: *actual,
            },
            Error::InvalidSchemaFile(message) => Error::InvalidSchemaFile(message.clone()),
            Error::Io(err) => Error::Io(std::io::Error::new(err.kind(), err.to_string())),
            Error::Json(err) => Error::InvalidSchemaFile(err.to_string()),
            Error::Yaml(err) => Error::InvalidSchemaFile(err.to_string()),
        }
    }
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_keeps_declaration_details() {
        let err = Error::DuplicateFlag {
            scope: "app".to_string(),
            flag: "--w".to_string(),
        };
        assert_eq!(err.replay().to_string(), err.to_string());

        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(matches!(io.replay(), Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound));
    }
}
