//! Core abstractions for jvmdeps.
//!
//! Shared by the Maven and Gradle crates and by the engine:
//! - the immutable record model (coordinates, installed dependencies/plugins, spans)
//! - the error taxonomy
//! - span-based text splicing helpers
//! - TTL caches (generic and HTTP-backed)
//! - the registry client and text source seams
//! - cancellation and progress primitives for long-running analyses

pub mod cache;
pub mod edit;
pub mod error;
pub mod model;
pub mod parser;
pub mod progress;
pub mod registry;
pub mod text_source;

pub use cache::{CacheStats, HttpCache, TtlCache};
pub use error::{DepsError, Result};
pub use model::{
    Coordinate, DependencyExclusion, DependencyUpdate, FileEdit, InstalledDependency,
    InstalledPlugin, MavenInstalledPlugin, MavenPluginUpdate, MojoDescriptor, MojoParameter,
    PluginDescriptor, PluginSyntax, PluginUpdate, RemoteRepository, Span, Update, VersionRef,
    VersionedRecord, DEFAULT_MAVEN_PLUGIN_GROUP, normalize_url,
};
pub use parser::{BuildFileSyntax, DslFlavor, strip_quotes};
pub use progress::{CancellationToken, ProgressSender, ProgressUpdate};
pub use registry::{
    ArtifactInfo, RegistryClient, RegistryError, RegistryResult, TransitiveDependency,
    TransitiveDeps,
};
pub use text_source::{FsTextSource, MemoryTextSource, TextSource};
