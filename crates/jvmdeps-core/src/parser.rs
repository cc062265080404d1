//! Build-file syntax detection.
//!
//! Scanning dispatches on [`BuildFileSyntax`]; text generation dispatches on
//! [`DslFlavor`], which is derived from the file extension alone.

use serde::Serialize;
use std::path::Path;

pub const GRADLE_GROOVY_FILE: &str = "build.gradle";
pub const GRADLE_KOTLIN_FILE: &str = "build.gradle.kts";
pub const POM_FILE: &str = "pom.xml";
pub const SETTINGS_GROOVY_FILE: &str = "settings.gradle";
pub const SETTINGS_KOTLIN_FILE: &str = "settings.gradle.kts";

/// Kind of build manifest a file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuildFileSyntax {
    GradleGroovy,
    GradleKotlin,
    MavenXml,
}

impl BuildFileSyntax {
    /// Detects the syntax from the file name. Only the conventional manifest
    /// names are recognized.
    pub fn detect(path: &Path) -> Option<Self> {
        match path.file_name()?.to_str()? {
            GRADLE_GROOVY_FILE => Some(Self::GradleGroovy),
            GRADLE_KOTLIN_FILE => Some(Self::GradleKotlin),
            POM_FILE => Some(Self::MavenXml),
            _ => None,
        }
    }

    pub const fn dsl_flavor(self) -> Option<DslFlavor> {
        match self {
            Self::GradleGroovy => Some(DslFlavor::Groovy),
            Self::GradleKotlin => Some(DslFlavor::Kotlin),
            Self::MavenXml => None,
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::GradleGroovy => "Gradle (Groovy DSL)",
            Self::GradleKotlin => "Gradle (Kotlin DSL)",
            Self::MavenXml => "pom.xml",
        }
    }
}

/// Whether `path` is a Gradle settings script.
pub fn is_gradle_settings(path: &Path) -> bool {
    matches!(
        path.file_name().and_then(|n| n.to_str()),
        Some(SETTINGS_GROOVY_FILE | SETTINGS_KOTLIN_FILE)
    )
}

/// Gradle DSL dialect used when generating declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DslFlavor {
    Groovy,
    Kotlin,
}

impl DslFlavor {
    /// `.kts` files use the Kotlin DSL; everything else is treated as Groovy.
    pub fn from_path(path: &Path) -> Self {
        if path.extension().is_some_and(|e| e == "kts") {
            Self::Kotlin
        } else {
            Self::Groovy
        }
    }

    pub const fn is_kotlin(self) -> bool {
        matches!(self, Self::Kotlin)
    }

    /// Wraps `value` in the flavor's preferred string quotes.
    pub fn quote(self, value: &str) -> String {
        match self {
            Self::Kotlin => format!("\"{value}\""),
            Self::Groovy => format!("'{value}'"),
        }
    }
}

/// Strips one pair of matching surrounding quotes (`'...'` or `"..."`).
pub fn strip_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}
