use std::path::PathBuf;
use thiserror::Error;

/// Core error type for embroider-bridge operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Why a specifier could not be resolved.
///
/// Carried inside [`crate::Resolution::NotFound`] and raised by resolvers
/// that fail outright. Cloneable so an outcome can be logged and re-reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Nothing on any attempted path provided the module.
    #[error("Module not found: cannot resolve '{specifier}' from '{from}'")]
    NotFound { specifier: String, from: String },

    /// The host's native resolver reported a failure.
    #[error("Native resolver failed for '{specifier}': {message}")]
    Native { specifier: String, message: String },

    /// The declarative resolver itself failed.
    #[error("{0}")]
    Resolver(String),
}

impl ResolveError {
    /// Generic "module not found" error.
    #[must_use]
    pub fn not_found(specifier: impl Into<String>, from: impl Into<String>) -> Self {
        Self::NotFound {
            specifier: specifier.into(),
            from: from.into(),
        }
    }

    #[must_use]
    pub fn native(specifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Native {
            specifier: specifier.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver(msg.into())
    }
}
