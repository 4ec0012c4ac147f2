use std::{fmt, io, path::StripPrefixError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide error type.
///
/// Structural inconsistencies in the wiki (missing parents, stale taxonomy
/// entries, ...) are *not* errors; they are reported as
/// [`crate::diagnostics::Finding`]s. `TaxonError` covers the failures that
/// stop an operation: I/O, serialization, a rejected resolution, or changelog
/// corruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum TaxonError {
    #[error("Circular is_a reference: {}", cycle.join(" -> "))]
    CircularReference { cycle: Vec<String> },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Changelog corruption: {0}")]
    Corruption(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("Resolution failed: {0}")]
    Resolution(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Staging failed for '{path}': {cause}")]
    Staging { path: String, cause: String },
}

impl From<io::Error> for TaxonError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => TaxonError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => TaxonError::PermissionDenied,
            _ => TaxonError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<serde_json::Error> for TaxonError {
    fn from(src: serde_json::Error) -> Self {
        TaxonError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<toml::de::Error> for TaxonError {
    fn from(src: toml::de::Error) -> Self {
        TaxonError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for TaxonError {
    fn from(src: toml::ser::Error) -> Self {
        TaxonError::Config(format!("Toml serialization error: {src}"))
    }
}

impl From<regex::Error> for TaxonError {
    fn from(src: regex::Error) -> Self {
        TaxonError::Serialization(format!("Regex parse failed: {src}"))
    }
}

impl From<StripPrefixError> for TaxonError {
    fn from(src: StripPrefixError) -> Self {
        TaxonError::NotFound(format!("Strip prefix failed for path. Error: {src}"))
    }
}

impl From<fmt::Error> for TaxonError {
    fn from(x: fmt::Error) -> Self {
        TaxonError::Io(format!("{x}"))
    }
}
