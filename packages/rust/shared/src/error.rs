//! Error types for the materials knowledge-base pipeline.
//!
//! Library crates use [`MatKbError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum MatKbError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// YAML/JSON decoding or encoding error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The material's category has no entry in the Category Range Table.
    #[error("category '{category}' for material '{material}' not found in category ranges")]
    CategoryNotFound { material: String, category: String },

    /// A category range entry is malformed (missing unit, min >= max, ...).
    #[error("invalid range for {category}.{property}: {message}")]
    InvalidRange {
        category: String,
        property: String,
        message: String,
    },

    /// The author sub-record failed validation or could not be resolved.
    #[error("author error for '{material}': {message}")]
    Author { material: String, message: String },

    /// A generation sub-step failed; carries the material name for context.
    #[error("generation failed for '{material}': {source}")]
    Generation {
        material: String,
        source: Box<MatKbError>,
    },

    /// Normalizer-internal structural failure.
    #[error("normalization error: {0}")]
    Normalization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MatKbError>;

impl MatKbError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap any error with the name of the material being generated.
    ///
    /// Already-wrapped errors are not wrapped twice.
    pub fn generation(material: impl Into<String>, source: MatKbError) -> Self {
        match source {
            Self::Generation { .. } => source,
            other => Self::Generation {
                material: material.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through `Generation` wrappers.
    pub fn root_cause(&self) -> &MatKbError {
        match self {
            Self::Generation { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = MatKbError::config("missing data dir");
        assert_eq!(err.to_string(), "config error: missing data dir");

        let err = MatKbError::CategoryNotFound {
            material: "Copper".into(),
            category: "metals".into(),
        };
        assert!(err.to_string().contains("'metals'"));
        assert!(err.to_string().contains("'Copper'"));
    }

    #[test]
    fn generation_wraps_once() {
        let inner = MatKbError::validation("bad");
        let wrapped = MatKbError::generation("Copper", inner);
        let rewrapped = MatKbError::generation("Other", wrapped);

        match &rewrapped {
            MatKbError::Generation { material, .. } => assert_eq!(material, "Copper"),
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(matches!(
            rewrapped.root_cause(),
            MatKbError::Validation { .. }
        ));
    }
}
