//! Errors specific to POM handling and Maven repositories.

use jvmdeps_core::{DepsError, RegistryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MavenError {
    #[error("Malformed XML at byte {position}: {message}")]
    Xml { message: String, position: u64 },

    #[error("Expected <{expected}> root element, found <{found}>")]
    UnexpectedRoot { expected: String, found: String },

    #[error("Failed to read plugin archive {artifact}: {message}")]
    Archive { artifact: String, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MavenError>;

impl MavenError {
    pub fn xml(err: impl std::fmt::Display, position: u64) -> Self {
        Self::Xml {
            message: err.to_string(),
            position,
        }
    }
}

impl From<MavenError> for DepsError {
    fn from(err: MavenError) -> Self {
        match err {
            err @ (MavenError::Xml { .. } | MavenError::UnexpectedRoot { .. }) => {
                Self::XmlMalformed(err.to_string())
            }
            MavenError::Archive { artifact, message } => Self::ParseError {
                file_type: format!("plugin descriptor of {artifact}"),
                source: Box::new(std::io::Error::other(message)),
            },
            MavenError::Registry(e) => Self::Registry(e),
            MavenError::Io(e) => Self::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MavenError::xml("mismatched end tag", 120);
        assert_eq!(
            err.to_string(),
            "Malformed XML at byte 120: mismatched end tag"
        );
    }

    #[test]
    fn test_xml_errors_become_xml_malformed() {
        let err = MavenError::UnexpectedRoot {
            expected: "project".into(),
            found: "settings".into(),
        };
        let deps_err: DepsError = err.into();
        assert!(matches!(deps_err, DepsError::XmlMalformed(ref m) if m.contains("<settings>")));
    }

    #[test]
    fn test_registry_error_conversion() {
        let err: MavenError = RegistryError::http("https://repo/x.pom", 404).into();
        let deps_err: DepsError = err.into();
        assert!(matches!(deps_err, DepsError::Registry(ref e) if e.is_not_found()));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::from(std::io::ErrorKind::NotFound);
        let err: MavenError = io_err.into();
        assert!(matches!(err, MavenError::Io(_)));

        let deps_err: DepsError = err.into();
        assert!(matches!(deps_err, DepsError::Io(_)));
    }
}
