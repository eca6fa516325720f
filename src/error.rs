//! Error types for configuration loading.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error kinds for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Caller errors
    InvalidArgument,

    // Input errors
    Io,
    Decode,
    Encode,
    FileNotFound,

    // Schema errors
    UnknownField,
    TypeMismatch,
    StructureConflict,
    Conversion,
    MissingRequiredFields,
}

/// Failure of a document codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDecode(#[from] toml::de::Error),
    #[error(transparent)]
    TomlEncode(#[from] toml::ser::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("document is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Boxed error returned by environment value converters.
pub type ConvertError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A fatal configuration loading error.
///
/// `origin` names where the offending input came from: a document label,
/// `[default]`, `$VAR`, or `merged configuration`.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to read {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {origin}: {source}")]
    Decode {
        origin: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to encode {origin}: {source}")]
    Encode {
        origin: String,
        #[source]
        source: CodecError,
    },

    #[error("{origin}: field '{key}' is not part of the configuration")]
    UnknownField { origin: String, key: String },

    #[error("{origin}: field '{key}' has type {found}, expected {expected}")]
    TypeMismatch {
        origin: String,
        key: String,
        found: String,
        expected: String,
    },

    #[error("{origin}: cannot write '{key}' because '{at}' already holds a value")]
    StructureConflict {
        origin: String,
        key: String,
        at: String,
    },

    #[error("failed to convert ${env_var}: {source}")]
    Conversion {
        env_var: String,
        #[source]
        source: ConvertError,
    },

    #[error("missing required fields: {}", .0.join(", "))]
    MissingRequiredFields(Vec<String>),

    #[error("could not find {filename} in {search_paths:?}")]
    FileNotFound {
        filename: String,
        search_paths: Vec<PathBuf>,
    },
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            LoadError::Io { .. } => ErrorKind::Io,
            LoadError::Decode { .. } => ErrorKind::Decode,
            LoadError::Encode { .. } => ErrorKind::Encode,
            LoadError::UnknownField { .. } => ErrorKind::UnknownField,
            LoadError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            LoadError::StructureConflict { .. } => ErrorKind::StructureConflict,
            LoadError::Conversion { .. } => ErrorKind::Conversion,
            LoadError::MissingRequiredFields(_) => ErrorKind::MissingRequiredFields,
            LoadError::FileNotFound { .. } => ErrorKind::FileNotFound,
        }
    }

    // Convenience constructors

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        LoadError::InvalidArgument(message.into())
    }

    pub fn unknown_field(origin: &str, key: impl ToString) -> Self {
        LoadError::UnknownField {
            origin: origin.to_string(),
            key: key.to_string(),
        }
    }

    pub fn decode(origin: &str, source: impl Into<CodecError>) -> Self {
        LoadError::Decode {
            origin: origin.to_string(),
            source: source.into(),
        }
    }

    pub fn encode(origin: &str, source: impl Into<CodecError>) -> Self {
        LoadError::Encode {
            origin: origin.to_string(),
            source: source.into(),
        }
    }
}

/// Result type for loading operations.
pub type LoadResult<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let err = LoadError::MissingRequiredFields(vec!["a".into()]);
        assert_eq!(
            serde_json::to_string(&err.kind()).unwrap(),
            "\"MISSING_REQUIRED_FIELDS\""
        );
    }

    #[test]
    fn test_missing_fields_message_lists_all() {
        let err = LoadError::MissingRequiredFields(vec!["a.b".into(), "c".into()]);
        assert_eq!(err.to_string(), "missing required fields: a.b, c");
    }

    #[test]
    fn test_unknown_field_message() {
        let err = LoadError::unknown_field("conf.toml", "nope");
        assert_eq!(err.kind(), ErrorKind::UnknownField);
        assert_eq!(
            err.to_string(),
            "conf.toml: field 'nope' is not part of the configuration"
        );
    }
}
