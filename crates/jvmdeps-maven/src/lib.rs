//! `pom.xml` scanning, patching and Maven repository support.
//!
//! - [`parser`]: event-based POM parsing with byte spans and `${...}`
//!   property resolution through the parent chain
//! - [`editor`]: span-preserving text patches for plugins and dependencies
//! - [`settings`]: repository and server entries edited as XML trees
//! - [`registry`]: a [`jvmdeps_core::RegistryClient`] for Maven-layout
//!   repositories
//! - [`descriptor`]: plugin goal/parameter descriptors read from plugin JARs

pub mod descriptor;
pub mod editor;
pub mod error;
pub mod parser;
pub mod registry;
pub mod settings;
pub mod version;
pub mod xml_tree;

pub use descriptor::{PluginDescriptorLoader, parse_plugin_descriptor};
pub use error::{MavenError, Result};
pub use parser::{PomModel, PomRecords, load_parent_chain, parse_pom, scan_pom};
pub use registry::{MavenRepositoryClient, package_url};
pub use settings::ServerCredentials;
pub use version::{compare_versions, is_prerelease, latest_version};
