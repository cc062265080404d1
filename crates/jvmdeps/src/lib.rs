//! Dependency and plugin reconciliation engine for Gradle and Maven projects.
//!
//! The engine scans a project tree, checks every declared dependency and
//! plugin against a Maven repository, suggests exclusions for problematic
//! transitive artifacts and computes minimal text edits that a host (an IDE
//! panel or the `jvmdeps` CLI) previews and applies.

pub mod applier;
pub mod config;
pub mod exclusions;
pub mod pool;
pub mod resolver;
pub mod scanner;
pub mod session;

pub use applier::{ChangeApplier, preview};
pub use config::EngineConfig;
pub use exclusions::{
    ExclusionAnalyzer, ExclusionReport, ExclusionSuggestion, Severity, SuggestionSource,
};
pub use pool::WorkerPool;
pub use resolver::VersionResolver;
pub use scanner::{ProjectScanner, ScanReport};
pub use session::{OutdatedReport, Session, SessionCacheStats};

pub use jvmdeps_core::{CancellationToken, DepsError, FileEdit, ProgressSender, Result};
