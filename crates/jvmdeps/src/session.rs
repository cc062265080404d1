//! One logical session over a project.
//!
//! A session owns every cache the engine uses. Nothing is process-wide:
//! dropping the session or calling [`Session::clear`] discards all cached
//! registry answers.

use crate::applier::ChangeApplier;
use crate::config::EngineConfig;
use crate::exclusions::{ExclusionAnalyzer, ExclusionReport, ExclusionSuggestion, TransitiveCache};
use crate::pool::WorkerPool;
use crate::resolver::{VersionCache, VersionResolver};
use crate::scanner::{FileScan, ProjectScanner, ScanReport};
use jvmdeps_core::{
    BuildFileSyntax, CacheStats, CancellationToken, DependencyUpdate, DepsError, FileEdit,
    FsTextSource, HttpCache, InstalledDependency, MavenInstalledPlugin, MavenPluginUpdate,
    PluginDescriptor, PluginUpdate, ProgressSender, RegistryClient, RemoteRepository, Result,
    TextSource, VersionRef,
};
use jvmdeps_core::parser::is_gradle_settings;
use jvmdeps_gradle::gradle_properties::{GRADLE_PROPERTIES_FILE, parse_properties, set_property};
use jvmdeps_gradle::parser::{catalog, project_root};
use jvmdeps_gradle::patch;
use jvmdeps_gradle::repositories::{self, RepositoryTarget};
use jvmdeps_maven::settings::{self, SETTINGS_FILE};
use jvmdeps_maven::{MavenRepositoryClient, PluginDescriptorLoader, editor};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Files that can carry repository declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepositoryFile {
    Pom,
    MavenSettings,
    Gradle(RepositoryTarget),
}

impl RepositoryFile {
    fn for_path(path: &Path) -> Option<Self> {
        match BuildFileSyntax::detect(path) {
            Some(BuildFileSyntax::MavenXml) => Some(Self::Pom),
            Some(_) => Some(Self::Gradle(RepositoryTarget::for_path(path))),
            None if is_gradle_settings(path) => {
                Some(Self::Gradle(RepositoryTarget::for_path(path)))
            }
            None if path.file_name().is_some_and(|n| n == SETTINGS_FILE) => {
                Some(Self::MavenSettings)
            }
            None => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutdatedReport {
    pub dependencies: Vec<DependencyUpdate>,
    pub plugins: Vec<PluginUpdate>,
    pub maven_plugins: Vec<MavenPluginUpdate>,
}

impl OutdatedReport {
    pub fn len(&self) -> usize {
        self.dependencies.len() + self.plugins.len() + self.maven_plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCacheStats {
    pub versions: CacheStats,
    pub transitive: CacheStats,
    pub descriptors: CacheStats,
    pub http: Option<CacheStats>,
}

pub struct Session {
    config: EngineConfig,
    http: Option<Arc<HttpCache>>,
    versions: Arc<VersionCache>,
    transitive: Arc<TransitiveCache>,
    descriptors: PluginDescriptorLoader,
    scanner: ProjectScanner,
    resolver: VersionResolver,
    analyzer: ExclusionAnalyzer,
    pool: WorkerPool,
    source: Arc<dyn TextSource>,
    applier: ChangeApplier,
}

impl Session {
    /// Builds a session around an existing registry client and text source.
    pub fn new(
        config: EngineConfig,
        registry: Arc<dyn RegistryClient>,
        source: Arc<dyn TextSource>,
    ) -> Self {
        let ttl = config.cache.ttl();
        let pool = WorkerPool::new(config.workers.max_concurrency);
        let versions = Arc::new(VersionCache::new(ttl));
        let transitive = Arc::new(TransitiveCache::new(ttl));

        Self {
            http: None,
            descriptors: PluginDescriptorLoader::new(Arc::clone(&registry), ttl),
            scanner: ProjectScanner::from_config(&config.scan),
            resolver: VersionResolver::new(Arc::clone(&registry), Arc::clone(&versions))
                .with_prerelease(config.updates.allow_prerelease),
            analyzer: ExclusionAnalyzer::new(registry, Arc::clone(&transitive), pool.clone()),
            applier: ChangeApplier::new(Arc::clone(&source)),
            versions,
            transitive,
            pool,
            source,
            config,
        }
    }

    /// Session over the configured Maven repository and the local
    /// filesystem.
    pub fn from_config(config: EngineConfig) -> Self {
        let http = Arc::new(HttpCache::with_ttl(config.cache.ttl()));
        let mut client = MavenRepositoryClient::new(Arc::clone(&http))
            .with_search_url(config.registry.search_url.clone())
            .with_repository_url(&config.registry.repository_url);
        if let Some(local) = &config.registry.local_repository {
            client = client.with_local_repository(Some(local.clone()));
        }

        let mut session = Self::new(config, Arc::new(client), Arc::new(FsTextSource::new()));
        session.http = Some(http);
        session
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    pub fn analyzer(&self) -> &ExclusionAnalyzer {
        &self.analyzer
    }

    /// Scans `root` off the async runtime's worker threads.
    pub async fn scan(&self, root: &Path) -> Result<ScanReport> {
        let scanner = self.scanner.clone();
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || scanner.scan(&root))
            .await
            .map_err(|e| DepsError::Io(std::io::Error::other(e)))
    }

    /// Every record of `report` with a newer version available.
    pub async fn outdated(
        &self,
        report: &ScanReport,
        cancel: &CancellationToken,
    ) -> OutdatedReport {
        let (dependencies, plugins, maven_plugins) = tokio::join!(
            self.resolver
                .find_dependency_updates(&report.dependencies, &self.pool, cancel),
            self.resolver
                .find_plugin_updates(&report.plugins, &self.pool, cancel),
            self.resolver
                .find_maven_plugin_updates(&report.maven_plugins, &self.pool, cancel),
        );
        OutdatedReport {
            dependencies,
            plugins,
            maven_plugins,
        }
    }

    pub async fn exclusions(
        &self,
        report: &ScanReport,
        module: Option<&str>,
        cancel: &CancellationToken,
        progress: Option<&ProgressSender>,
    ) -> ExclusionReport {
        self.analyzer
            .analyze(&report.dependencies, module, cancel, progress)
            .await
    }

    pub async fn plugin_descriptor(
        &self,
        plugin: &MavenInstalledPlugin,
    ) -> Option<Arc<PluginDescriptor>> {
        let version = plugin.version.as_deref()?;
        self.descriptors
            .load(&plugin.group_id, &plugin.artifact_id, version)
            .await
    }

    fn read(&self, path: &Path) -> Result<(String, FileScan)> {
        let text = self.source.read_text(path)?;
        let scan = self.scanner.scan_file(path, &text)?;
        Ok((text, scan))
    }

    /// Computes the edit that sets `id` (`group:artifact` or a Gradle plugin
    /// id) to `new_version` in `build_file`.
    ///
    /// The edit targets wherever the version is written: the declaration, a
    /// variable in the same script, `gradle.properties` or the version
    /// catalog. `Ok(None)` when nothing matches or nothing would change.
    pub fn plan_version_update(
        &self,
        build_file: &Path,
        id: &str,
        new_version: &str,
    ) -> Result<Option<FileEdit>> {
        let (text, scan) = self.read(build_file)?;
        let maven = BuildFileSyntax::detect(build_file) == Some(BuildFileSyntax::MavenXml);

        if let Some(dep) = scan.dependencies.iter().find(|d| d.id() == id) {
            if maven {
                return Ok(editor::update_dependency_version(&text, dep, new_version)
                    .map(|updated| FileEdit::new(build_file, text, updated)));
            }
            return self.plan_gradle_dependency_update(&text, dep, new_version);
        }

        if let Some(plugin) = scan.maven_plugins.iter().find(|p| p.id() == id) {
            return Ok(editor::update_plugin_version(&text, plugin, new_version)
                .map(|updated| FileEdit::new(build_file, text, updated)));
        }

        if let Some(plugin) = scan.plugins.iter().find(|p| p.plugin_id == id) {
            return Ok(patch::update_plugin_version(&text, plugin, new_version)
                .map(|updated| FileEdit::new(build_file, text, updated)));
        }

        tracing::debug!("{} is not declared in {}", id, build_file.display());
        Ok(None)
    }

    fn plan_gradle_dependency_update(
        &self,
        text: &str,
        dep: &InstalledDependency,
        new_version: &str,
    ) -> Result<Option<FileEdit>> {
        match &dep.version_ref {
            VersionRef::Catalog(_) => {
                let Some(catalog_path) = catalog::find_catalog(&dep.build_file) else {
                    return Ok(None);
                };
                let catalog_text = self.source.read_text(&catalog_path)?;
                Ok(patch::update_catalog_version(&catalog_text, dep, new_version)
                    .map(|updated| FileEdit::new(catalog_path, catalog_text, updated)))
            }
            VersionRef::Variable(name) => {
                if let Some(updated) = patch::update_dependency_version(text, dep, new_version) {
                    return Ok(Some(FileEdit::new(&dep.build_file, text, updated)));
                }
                self.plan_property_update(&dep.build_file, name, new_version)
            }
            _ => Ok(patch::update_dependency_version(text, dep, new_version)
                .map(|updated| FileEdit::new(&dep.build_file, text, updated))),
        }
    }

    /// Rewrites `name` in the `gradle.properties` that defines it, module
    /// file first.
    fn plan_property_update(
        &self,
        build_file: &Path,
        name: &str,
        new_version: &str,
    ) -> Result<Option<FileEdit>> {
        let module_dir = build_file.parent().unwrap_or_else(|| Path::new("."));
        let candidates: Vec<PathBuf> = [module_dir.to_path_buf(), project_root(module_dir)]
            .into_iter()
            .map(|dir| dir.join(GRADLE_PROPERTIES_FILE))
            .collect();

        for path in candidates {
            let Ok(content) = self.source.read_text(&path) else {
                continue;
            };
            if !parse_properties(&content).contains_key(name) {
                continue;
            }
            return Ok(set_property(&content, name, new_version)
                .map(|updated| FileEdit::new(path, content, updated)));
        }
        Ok(None)
    }

    /// Computes the edit adding a suggested exclusion to its parent
    /// declaration.
    pub fn plan_exclusion(&self, suggestion: &ExclusionSuggestion) -> Result<Option<FileEdit>> {
        let path = &suggestion.parent.build_file;
        let (text, scan) = self.read(path)?;
        let Some(parent) = scan.dependencies.iter().find(|d| {
            d.id() == suggestion.parent.id()
                && d.configuration == suggestion.parent.configuration
        }) else {
            return Ok(None);
        };

        let updated = if BuildFileSyntax::detect(path) == Some(BuildFileSyntax::MavenXml) {
            editor::add_exclusion(&text, parent, &suggestion.exclusion)
        } else {
            patch::add_exclusion(&text, parent, &suggestion.exclusion)
        };
        Ok(updated.map(|updated| FileEdit::new(path, text, updated)))
    }

    /// Declares `repository` in a POM, a Maven `settings.xml` or a Gradle
    /// build/settings script. Any other file yields `None`.
    pub fn plan_add_repository(
        &self,
        path: &Path,
        repository: &RemoteRepository,
    ) -> Result<Option<FileEdit>> {
        let Some(kind) = RepositoryFile::for_path(path) else {
            tracing::debug!("{} cannot declare repositories", path.display());
            return Ok(None);
        };
        let text = self.source.read_text(path)?;
        Ok(match kind {
            RepositoryFile::Pom => settings::add_repository(path, &text, repository),
            RepositoryFile::MavenSettings => {
                settings::add_settings_repository(path, &text, repository)
            }
            RepositoryFile::Gradle(target) => {
                repositories::add_repository(path, &text, repository, target)
            }
        })
    }

    pub fn plan_remove_repository(&self, path: &Path, id_or_url: &str) -> Result<Option<FileEdit>> {
        let Some(kind) = RepositoryFile::for_path(path) else {
            tracing::debug!("{} cannot declare repositories", path.display());
            return Ok(None);
        };
        let text = self.source.read_text(path)?;
        Ok(match kind {
            RepositoryFile::Pom => settings::remove_repository(path, &text, id_or_url),
            RepositoryFile::MavenSettings => {
                settings::remove_settings_repository(path, &text, id_or_url)
            }
            RepositoryFile::Gradle(target) => {
                repositories::remove_repository(path, &text, id_or_url, target)
            }
        })
    }

    pub fn apply(&self, edit: &FileEdit, label: &str) -> Result<()> {
        self.applier.apply(edit, label)
    }

    pub fn cache_stats(&self) -> SessionCacheStats {
        SessionCacheStats {
            versions: self.versions.stats(),
            transitive: self.transitive.stats(),
            descriptors: self.descriptors.cache().stats(),
            http: self.http.as_ref().map(|h| h.stats()),
        }
    }

    /// Drops every cached registry answer.
    pub fn clear(&self) {
        self.versions.clear();
        self.transitive.clear();
        self.descriptors.cache().clear();
        if let Some(http) = &self.http {
            http.clear();
        }
        tracing::debug!("Session caches cleared");
    }
}
