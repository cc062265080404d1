//! Errors specific to Gradle build scripts and version catalogs.

use jvmdeps_core::DepsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GradleError {
    #[error("Failed to parse Gradle file: {message}")]
    ParseError { message: String },

    #[error("Invalid version catalog: {0}")]
    Catalog(#[from] toml_edit::TomlError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GradleError>;

impl From<GradleError> for DepsError {
    fn from(err: GradleError) -> Self {
        match err {
            GradleError::ParseError { message } => Self::parse("Gradle", message),
            GradleError::Catalog(e) => Self::ParseError {
                file_type: "version catalog".into(),
                source: Box::new(e),
            },
            GradleError::Io(e) => Self::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = GradleError::ParseError {
            message: "syntax error".into(),
        };
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn test_conversion_to_deps_error() {
        let err = GradleError::ParseError {
            message: "test".into(),
        };
        let deps_err: DepsError = err.into();
        assert!(matches!(deps_err, DepsError::ParseError { .. }));
    }

    #[test]
    fn test_catalog_error_conversion() {
        let toml_err = "[versions\n".parse::<toml_edit::DocumentMut>().unwrap_err();
        let err: GradleError = toml_err.into();
        assert!(err.to_string().starts_with("Invalid version catalog"));
        let deps_err: DepsError = err.into();
        assert!(matches!(
            deps_err,
            DepsError::ParseError { ref file_type, .. } if file_type == "version catalog"
        ));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::from(std::io::ErrorKind::NotFound);
        let err: GradleError = io_err.into();
        assert!(matches!(err, GradleError::Io(_)));
        let deps_err: DepsError = err.into();
        assert!(matches!(deps_err, DepsError::Io(_)));
    }
}
