//! Engine configuration.
//!
//! Read from a camelCase JSON file. Every section and field has a default,
//! so a partial file (or none at all) yields a usable configuration.

use jvmdeps_maven::registry::{MAVEN_CENTRAL_REPOSITORY, MAVEN_CENTRAL_SEARCH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "JVMDEPS_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub registry: RegistryConfig,
    pub cache: CacheConfig,
    pub scan: ScanConfig,
    pub workers: WorkerConfig,
    pub updates: UpdateConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Solr-style search endpoint used when `maven-metadata.xml` is missing.
    pub search_url: String,
    /// Base URL of the Maven-layout repository.
    pub repository_url: String,
    /// Local repository read before the network. `None` means `~/.m2/repository`.
    pub local_repository: Option<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            search_url: MAVEN_CENTRAL_SEARCH.to_string(),
            repository_url: MAVEN_CENTRAL_REPOSITORY.to_string(),
            local_repository: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanConfig {
    /// Directory names skipped in addition to the built-in list.
    pub skip_dirs: Vec<String>,
    /// Gradle configurations recognized in addition to the defaults
    /// (`kapt`, `ksp`, ...).
    pub extra_configurations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkerConfig {
    pub max_concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { max_concurrency: 8 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateConfig {
    pub allow_prerelease: bool,
}

impl EngineConfig {
    /// Parses a JSON configuration.
    pub fn from_json(content: &str) -> jvmdeps_core::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Loads `path`, falling back to defaults when the file is missing or
    /// invalid.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Cannot read config {}: {}, using defaults", path.display(), e);
                return Self::default();
            }
        };
        match Self::from_json(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Invalid config {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolves the configuration from an explicit path, then
    /// `JVMDEPS_CONFIG`, then defaults.
    pub fn discover(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(config.workers.max_concurrency, 8);
        assert!(!config.updates.allow_prerelease);
        assert!(config.registry.local_repository.is_none());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(
            r#"{
                "cache": { "ttlSecs": 60 },
                "scan": { "skipDirs": ["generated"], "extraConfigurations": ["kapt"] },
                "updates": { "allowPrerelease": true }
            }"#,
        )
        .unwrap();
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.scan.skip_dirs, vec!["generated"]);
        assert_eq!(config.scan.extra_configurations, vec!["kapt"]);
        assert!(config.updates.allow_prerelease);
        assert_eq!(config.workers, WorkerConfig::default());
        assert_eq!(config.registry, RegistryConfig::default());
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jvmdeps.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(EngineConfig::load(&path), EngineConfig::default());
        assert_eq!(
            EngineConfig::load(&dir.path().join("missing.json")),
            EngineConfig::default()
        );
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jvmdeps.json");
        std::fs::write(&path, r#"{ "workers": { "maxConcurrency": 2 } }"#).unwrap();
        assert_eq!(EngineConfig::discover(Some(&path)).workers.max_concurrency, 2);
    }
}
