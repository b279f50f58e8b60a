//! Error types for glossa-core.

use thiserror::Error;

/// Result type for glossa-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for glossa-core operations.
///
/// The taxonomy is deliberately small: configuration problems (bad type
/// wiring, conflicting redefinitions, missing annotators) are fatal and never
/// retried; annotation failures abort the current run; I/O failures surface
/// as-is.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Configuration error: undefined type, conflicting redefinition,
    /// no annotator configured, or cyclic type wiring.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resolution error: an annotator was fetched for a type it does not
    /// declare it satisfies. Indicates a wiring bug.
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// An annotator failed while processing a document.
    #[error("Annotation error: {0}")]
    Annotation(String),

    /// Attribute value does not match its declared value kind.
    #[error("Attribute type mismatch: {0}")]
    AttributeType(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a resolution error.
    #[must_use]
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create an annotation error.
    #[must_use]
    pub fn annotation(msg: impl Into<String>) -> Self {
        Self::Annotation(msg.into())
    }

    /// Create an attribute type-mismatch error.
    #[must_use]
    pub fn attribute_type(msg: impl Into<String>) -> Self {
        Self::AttributeType(msg.into())
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
