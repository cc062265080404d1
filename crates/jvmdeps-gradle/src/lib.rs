//! Gradle build script support for jvmdeps.
//!
//! Handles the Groovy DSL (`build.gradle`), the Kotlin DSL
//! (`build.gradle.kts`) and version catalogs (`gradle/libs.versions.toml`):
//! - [`parser`]: dependency and plugin scanning with variable and catalog
//!   resolution
//! - [`patch`]: span-based edits (versions, add/remove, exclusions,
//!   extension blocks)
//! - [`repositories`]: repository declarations in build and settings scripts
//! - [`gradle_properties`]: property reading and credential writing

pub mod error;
pub mod gradle_properties;
pub mod lexer;
pub mod parser;
pub mod patch;
pub mod repositories;

pub use error::{GradleError, Result};
pub use parser::catalog::VersionCatalog;
pub use parser::{GradleScan, ScanContext, parse_build_file};
pub use repositories::{RepositoryTarget, add_repository, remove_repository};
