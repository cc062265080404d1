//! Latest-version lookup and update detection.
//!
//! Answers are cached per `group:artifact` for the lifetime of a session.
//! A registry failure is logged and reported as "no answer" so one bad
//! lookup never fails a whole update check.

use crate::pool::WorkerPool;
use jvmdeps_core::registry::exact_query;
use jvmdeps_core::{
    CancellationToken, DependencyUpdate, InstalledDependency, InstalledPlugin,
    MavenInstalledPlugin, MavenPluginUpdate, PluginUpdate, RegistryClient, TtlCache, Update,
    VersionedRecord,
};
use jvmdeps_maven::{compare_versions, latest_version};
use std::sync::Arc;

/// Versions requested per lookup.
const SEARCH_LIMIT: usize = 100;

pub type VersionCache = TtlCache<String, Option<String>>;

#[derive(Clone)]
pub struct VersionResolver {
    registry: Arc<dyn RegistryClient>,
    cache: Arc<VersionCache>,
    allow_prerelease: bool,
}

impl VersionResolver {
    pub fn new(registry: Arc<dyn RegistryClient>, cache: Arc<VersionCache>) -> Self {
        Self {
            registry,
            cache,
            allow_prerelease: false,
        }
    }

    #[must_use]
    pub fn with_prerelease(mut self, allow: bool) -> Self {
        self.allow_prerelease = allow;
        self
    }

    pub fn cache(&self) -> &VersionCache {
        &self.cache
    }

    /// Every published version, newest first. Empty on registry failure.
    pub async fn available_versions(&self, group_id: &str, artifact_id: &str) -> Vec<String> {
        match self
            .registry
            .search(&exact_query(group_id, artifact_id), SEARCH_LIMIT)
            .await
        {
            Ok(hits) => {
                let mut versions: Vec<String> = hits
                    .into_iter()
                    .filter(|hit| hit.group_id == group_id && hit.artifact_id == artifact_id)
                    .map(|hit| hit.version)
                    .collect();
                sort_versions_desc(&mut versions);
                versions.dedup();
                versions
            }
            Err(e) => {
                tracing::warn!("Version lookup for {}:{} failed: {}", group_id, artifact_id, e);
                Vec::new()
            }
        }
    }

    /// Best current version of `group:artifact`, or `None` when it cannot be
    /// determined.
    pub async fn latest_version(&self, group_id: &str, artifact_id: &str) -> Option<String> {
        let key = format!("{group_id}:{artifact_id}");
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let query = exact_query(group_id, artifact_id);
        let latest = match self.registry.search(&query, SEARCH_LIMIT).await {
            Ok(hits) => latest_version(
                hits.iter()
                    .filter(|hit| hit.group_id == group_id && hit.artifact_id == artifact_id)
                    .map(|hit| hit.version.as_str()),
                self.allow_prerelease,
            )
            .map(str::to_string),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                // Transient failures are not cached.
                tracing::warn!("Version lookup for {} failed: {}", key, e);
                return None;
            }
        };

        tracing::debug!("Latest {} = {:?}", key, latest);
        self.cache.insert(key, latest.clone());
        latest
    }

    /// Pairs each record with its latest version, keeping only records whose
    /// installed version differs. Output follows input order.
    pub async fn find_updates<R>(
        &self,
        records: &[R],
        pool: &WorkerPool,
        cancel: &CancellationToken,
    ) -> Vec<Update<R>>
    where
        R: VersionedRecord + Clone + Send + Sync + 'static,
    {
        let resolver = self.clone();
        let results = pool
            .run(records.to_vec(), cancel, move |record: R| {
                let resolver = resolver.clone();
                async move {
                    let latest = resolver
                        .latest_version(record.lookup_group(), &record.lookup_artifact())
                        .await?;
                    let update = Update::new(record, latest);
                    update.has_update().then_some(update)
                }
            })
            .await;

        if cancel.is_cancelled() {
            return Vec::new();
        }
        results.into_iter().flatten().flatten().collect()
    }

    pub async fn find_dependency_updates(
        &self,
        dependencies: &[InstalledDependency],
        pool: &WorkerPool,
        cancel: &CancellationToken,
    ) -> Vec<DependencyUpdate> {
        self.find_updates(dependencies, pool, cancel).await
    }

    /// Gradle plugins are looked up through their marker artifact
    /// (`id:id.gradle.plugin`).
    pub async fn find_plugin_updates(
        &self,
        plugins: &[InstalledPlugin],
        pool: &WorkerPool,
        cancel: &CancellationToken,
    ) -> Vec<PluginUpdate> {
        let versioned: Vec<_> = plugins
            .iter()
            .filter(|p| p.version.is_some())
            .cloned()
            .collect();
        self.find_updates(&versioned, pool, cancel).await
    }

    pub async fn find_maven_plugin_updates(
        &self,
        plugins: &[MavenInstalledPlugin],
        pool: &WorkerPool,
        cancel: &CancellationToken,
    ) -> Vec<MavenPluginUpdate> {
        self.find_updates(plugins, pool, cancel).await
    }

    /// Versions strictly older than `installed`, newest first.
    pub async fn downgrade_candidates(
        &self,
        group_id: &str,
        artifact_id: &str,
        installed: &str,
    ) -> Vec<String> {
        older_versions(&self.available_versions(group_id, artifact_id).await, installed)
    }
}

/// Sorts newest first by Maven version order.
pub fn sort_versions_desc(versions: &mut [String]) {
    versions.sort_by(|a, b| compare_versions(b, a));
}

/// Versions strictly older than `installed`, newest first.
pub fn older_versions(versions: &[String], installed: &str) -> Vec<String> {
    let mut older: Vec<String> = versions
        .iter()
        .filter(|v| compare_versions(v, installed).is_lt())
        .cloned()
        .collect();
    sort_versions_desc(&mut older);
    older
}
