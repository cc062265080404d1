//! Error taxonomy shared by every jvmdeps crate.
//!
//! Component-internal failures (one file, one registry call) are logged and
//! degrade the result set; only caller-facing operations surface these errors.

use crate::registry::RegistryError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DepsError {
    /// A single build file could not be parsed. Non-fatal for scans.
    #[error("Failed to parse {file_type}: {source}")]
    ParseError {
        file_type: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No anchor block (`dependencies {}`, `plugins {}`, `<build>`) was found.
    #[error("No `{0}` block found")]
    MissingAnchor(String),

    /// A recorded span no longer fits the current text.
    #[error("Span {offset}+{length} is not valid for text of {text_len} bytes")]
    StaleSpan {
        offset: usize,
        length: usize,
        text_len: usize,
    },

    /// The file changed between computing an edit and applying it.
    #[error("{} changed since the edit was computed", path.display())]
    StaleContent { path: PathBuf },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Malformed XML: {0}")]
    XmlMalformed(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DepsError>;

impl DepsError {
    pub fn parse(file_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            file_type: file_type.into(),
            source: Box::new(std::io::Error::other(message.into())),
        }
    }
}
