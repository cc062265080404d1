//! Exclusion suggestions from transitive dependency graphs.
//!
//! Each analyzed dependency's transitive closure is fetched on the worker
//! pool. Two passes then run over the collected closures:
//! - [`rules::KNOWN_RULES`] flags artifacts that are known to cause trouble
//! - conflict detection flags parents that bring an older copy of an
//!   artifact some other path (or a direct declaration) already provides
//!
//! Suggestions are deduplicated by `(parent, exclusion)` and sorted by
//! severity, then exclusion id, so the result never depends on task
//! completion order.

pub mod rules;

use crate::pool::WorkerPool;
use jvmdeps_core::{
    CancellationToken, Coordinate, DependencyExclusion, InstalledDependency, ProgressSender,
    RegistryClient, TransitiveDeps, TtlCache,
};
use jvmdeps_maven::compare_versions;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionSource {
    ConflictDetection,
    KnownRules,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionSuggestion {
    /// Declared dependency the exclusion is added to.
    pub parent: InstalledDependency,
    pub exclusion: DependencyExclusion,
    pub severity: Severity,
    pub source: SuggestionSource,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionReport {
    pub suggestions: Vec<ExclusionSuggestion>,
    /// Dependencies whose closure was fetched.
    pub analyzed: usize,
    /// Closures whose root descriptor was missing from the local artifact
    /// cache. A high count means a full dependency resolution would improve
    /// coverage.
    pub cache_misses: usize,
    pub cancelled: bool,
}

pub type TransitiveCache = TtlCache<String, Option<Arc<TransitiveDeps>>>;

#[derive(Clone)]
pub struct ExclusionAnalyzer {
    registry: Arc<dyn RegistryClient>,
    cache: Arc<TransitiveCache>,
    pool: WorkerPool,
}

impl ExclusionAnalyzer {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        cache: Arc<TransitiveCache>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            registry,
            cache,
            pool,
        }
    }

    /// Transitive closure of `coordinate`, cached per GAV. `None` when the
    /// coordinate has no version or the registry cannot provide it.
    pub async fn transitive_deps(&self, coordinate: &Coordinate) -> Option<Arc<TransitiveDeps>> {
        let version = coordinate.version.as_deref()?;
        let key = coordinate.full_name();
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let closure = match self
            .registry
            .fetch_transitive_deps(&coordinate.group_id, &coordinate.artifact_id, version)
            .await
        {
            Ok(deps) => Some(Arc::new(deps)),
            Err(e) if e.is_not_found() => {
                tracing::debug!("No descriptor for {}", key);
                None
            }
            Err(e) => {
                tracing::warn!("Transitive lookup for {} failed: {}", key, e);
                return None;
            }
        };
        self.cache.insert(key, closure.clone());
        closure
    }

    /// Analyzes `dependencies`, optionally restricted to one module.
    pub async fn analyze(
        &self,
        dependencies: &[InstalledDependency],
        module: Option<&str>,
        cancel: &CancellationToken,
        progress: Option<&ProgressSender>,
    ) -> ExclusionReport {
        let targets: Vec<InstalledDependency> = dependencies
            .iter()
            .filter(|d| module.is_none_or(|m| d.module_name == m))
            .filter(|d| d.version().is_some())
            .cloned()
            .collect();
        let total = targets.len();
        tracing::debug!("Analyzing transitive dependencies of {} declarations", total);

        let completed = Arc::new(AtomicUsize::new(0));
        let analyzer = self.clone();
        let progress = progress.cloned();
        let task_cancel = cancel.clone();
        let closures = self
            .pool
            .run(targets.clone(), cancel, move |dependency: InstalledDependency| {
                let analyzer = analyzer.clone();
                let completed = Arc::clone(&completed);
                let progress = progress.clone();
                let cancel = task_cancel.clone();
                async move {
                    let closure = analyzer.transitive_deps(&dependency.coordinate).await;
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(progress) = &progress {
                        progress.send(done, total, format!("Analyzed {}", dependency.coordinate));
                    }
                    closure
                }
            })
            .await;

        if cancel.is_cancelled() {
            tracing::debug!("Exclusion analysis cancelled");
            return ExclusionReport {
                cancelled: true,
                ..ExclusionReport::default()
            };
        }

        let analyzed: Vec<(InstalledDependency, Arc<TransitiveDeps>)> = targets
            .into_iter()
            .zip(closures)
            .filter_map(|(dependency, closure)| Some((dependency, closure.flatten()?)))
            .collect();
        let cache_misses = analyzed.iter().filter(|(_, c)| !c.local_cache_hit).count();

        let mut suggestions = known_rule_suggestions(&analyzed);
        suggestions.extend(conflict_suggestions(&analyzed));
        let suggestions = rank(suggestions);

        tracing::info!(
            "{} exclusion suggestions from {} of {} dependencies ({} local cache misses)",
            suggestions.len(),
            analyzed.len(),
            total,
            cache_misses
        );
        ExclusionReport {
            suggestions,
            analyzed: analyzed.len(),
            cache_misses,
            cancelled: false,
        }
    }
}

type Analyzed = (InstalledDependency, Arc<TransitiveDeps>);

fn already_excluded(parent: &InstalledDependency, group_id: &str, artifact_id: &str) -> bool {
    parent.exclusions.iter().any(|e| e.matches(group_id, artifact_id))
}

fn known_rule_suggestions(analyzed: &[Analyzed]) -> Vec<ExclusionSuggestion> {
    let present: HashSet<String> = analyzed
        .iter()
        .flat_map(|(parent, closure)| {
            std::iter::once(parent.id()).chain(closure.dependencies.iter().map(|t| t.id()))
        })
        .collect();

    let mut suggestions = Vec::new();
    for (parent, closure) in analyzed {
        for transitive in &closure.dependencies {
            if already_excluded(parent, &transitive.group_id, &transitive.artifact_id) {
                continue;
            }
            for rule in rules::rules_for(&transitive.id()) {
                if !rule.applies(&present) {
                    continue;
                }
                suggestions.push(ExclusionSuggestion {
                    parent: parent.clone(),
                    exclusion: DependencyExclusion::new(
                        &transitive.group_id,
                        &transitive.artifact_id,
                    ),
                    severity: rule.severity,
                    source: SuggestionSource::KnownRules,
                    reason: rule.reason.to_string(),
                });
            }
        }
    }
    suggestions
}

fn conflict_suggestions(analyzed: &[Analyzed]) -> Vec<ExclusionSuggestion> {
    let direct: HashMap<String, &str> = analyzed
        .iter()
        .filter_map(|(d, _)| Some((d.id(), d.version()?)))
        .collect();

    // artifact id -> (parent index, version) for every versioned occurrence
    let mut occurrences: BTreeMap<String, Vec<(usize, &str)>> = BTreeMap::new();
    for (index, (parent, closure)) in analyzed.iter().enumerate() {
        for transitive in &closure.dependencies {
            let Some(version) = transitive.version.as_deref() else {
                continue;
            };
            if transitive.id() == parent.id()
                || already_excluded(parent, &transitive.group_id, &transitive.artifact_id)
            {
                continue;
            }
            occurrences
                .entry(transitive.id())
                .or_default()
                .push((index, version));
        }
    }

    let mut suggestions = Vec::new();
    let mut suggest = |index: usize, id: &str, severity: Severity, reason: String| {
        let parent = &analyzed[index].0;
        let (group_id, artifact_id) = id.split_once(':').unwrap_or((id, ""));
        suggestions.push(ExclusionSuggestion {
            parent: parent.clone(),
            exclusion: DependencyExclusion::new(group_id, artifact_id),
            severity,
            source: SuggestionSource::ConflictDetection,
            reason,
        });
    };

    for (id, found) in &occurrences {
        if let Some(declared) = direct.get(id) {
            for &(index, version) in found {
                if compare_versions(version, declared).is_lt() {
                    suggest(
                        index,
                        id,
                        Severity::Info,
                        format!("Brings {id}:{version}; the direct declaration {declared} wins"),
                    );
                }
            }
            continue;
        }

        let Some(&(newest_index, newest)) = found
            .iter()
            .reduce(|best, next| if compare_versions(next.1, best.1).is_gt() { next } else { best })
        else {
            continue;
        };
        let newest_parent = analyzed[newest_index].0.id();
        for &(index, version) in found {
            if compare_versions(version, newest).is_lt() {
                suggest(
                    index,
                    id,
                    Severity::Warning,
                    format!("Brings {id}:{version} while {newest_parent} brings {newest}"),
                );
            }
        }
    }
    suggestions
}

/// Keeps the most severe suggestion per `(parent, exclusion)` and sorts by
/// severity, exclusion id and parent id.
pub(crate) fn rank(suggestions: Vec<ExclusionSuggestion>) -> Vec<ExclusionSuggestion> {
    let mut best: HashMap<(String, String), ExclusionSuggestion> = HashMap::new();
    for suggestion in suggestions {
        let key = (suggestion.parent.id(), suggestion.exclusion.id());
        match best.get(&key) {
            Some(existing) if existing.severity <= suggestion.severity => {}
            _ => {
                best.insert(key, suggestion);
            }
        }
    }

    let mut ranked: Vec<_> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| a.exclusion.id().cmp(&b.exclusion.id()))
            .then_with(|| a.parent.id().cmp(&b.parent.id()))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use jvmdeps_core::{ArtifactInfo, RegistryError, RegistryResult, TransitiveDependency};
    use std::time::Duration;

    #[derive(Default)]
    struct GraphRegistry {
        graphs: HashMap<String, TransitiveDeps>,
        calls: AtomicUsize,
    }

    impl GraphRegistry {
        fn with(mut self, gav: &str, local: bool, deps: &[&str]) -> Self {
            let dependencies = deps
                .iter()
                .map(|d| {
                    let c = Coordinate::parse_gav(d).unwrap();
                    TransitiveDependency {
                        group_id: c.group_id,
                        artifact_id: c.artifact_id,
                        version: c.version,
                        scope: Some("compile".into()),
                        optional: false,
                    }
                })
                .collect();
            self.graphs.insert(
                gav.to_string(),
                TransitiveDeps {
                    dependencies,
                    local_cache_hit: local,
                },
            );
            self
        }
    }

    #[async_trait]
    impl RegistryClient for GraphRegistry {
        async fn search(&self, query: &str, _limit: usize) -> RegistryResult<Vec<ArtifactInfo>> {
            Err(RegistryError::http(query, 404))
        }

        async fn fetch_transitive_deps(
            &self,
            group_id: &str,
            artifact_id: &str,
            version: &str,
        ) -> RegistryResult<TransitiveDeps> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gav = format!("{group_id}:{artifact_id}:{version}");
            self.graphs
                .get(&gav)
                .cloned()
                .ok_or_else(|| RegistryError::http(gav, 404))
        }

        async fn download_artifact(
            &self,
            _group_id: &str,
            _artifact_id: &str,
            _version: &str,
            _classifier: Option<&str>,
            _extension: &str,
        ) -> RegistryResult<Bytes> {
            Err(RegistryError::http("jar", 404))
        }
    }

    const WEB: &str = "org.springframework.boot:spring-boot-starter-web:3.2.0";
    const HADOOP: &str = "org.apache.hadoop:hadoop-common:3.3.6";
    const JACKSON: &str = "com.fasterxml.jackson.core:jackson-databind:2.16.0";
    const JCL: &str = "org.slf4j:jcl-over-slf4j:2.0.9";

    fn registry() -> GraphRegistry {
        GraphRegistry::default()
            .with(
                WEB,
                true,
                &[
                    "org.slf4j:slf4j-api:2.0.9",
                    "ch.qos.logback:logback-classic:1.4.14",
                    "commons-logging:commons-logging:1.2",
                    "com.fasterxml.jackson.core:jackson-databind:2.15.3",
                ],
            )
            .with(
                HADOOP,
                false,
                &[
                    "org.slf4j:slf4j-api:1.7.36",
                    "org.slf4j:slf4j-log4j12:1.7.36",
                    "log4j:log4j:1.2.17",
                    "commons-logging:commons-logging:1.2",
                ],
            )
            .with(JACKSON, false, &[])
            .with(JCL, false, &[])
    }

    fn analyzer(registry: GraphRegistry) -> (ExclusionAnalyzer, Arc<GraphRegistry>) {
        let registry = Arc::new(registry);
        let cache = Arc::new(TransitiveCache::new(Duration::from_secs(60)));
        (
            ExclusionAnalyzer::new(registry.clone(), cache, WorkerPool::new(2)),
            registry,
        )
    }

    fn dependency(gav: &str, module: &str) -> InstalledDependency {
        InstalledDependency::new(
            Coordinate::parse_gav(gav).unwrap(),
            "implementation",
            module,
            format!("/p/{module}/build.gradle.kts"),
        )
    }

    fn project() -> Vec<InstalledDependency> {
        vec![
            dependency(WEB, "app"),
            dependency(HADOOP, "hadoop"),
            dependency(JACKSON, "app"),
            dependency(JCL, "app"),
        ]
    }

    fn summary(report: &ExclusionReport) -> Vec<(Severity, String, String, SuggestionSource)> {
        report
            .suggestions
            .iter()
            .map(|s| (s.severity, s.parent.id(), s.exclusion.id(), s.source))
            .collect()
    }

    #[tokio::test]
    async fn test_full_analysis_order() {
        let (analyzer, _) = analyzer(registry());
        let report = analyzer
            .analyze(&project(), None, &CancellationToken::new(), None)
            .await;

        let web = "org.springframework.boot:spring-boot-starter-web".to_string();
        let hadoop = "org.apache.hadoop:hadoop-common".to_string();
        use Severity::{Critical, Info, Warning};
        use SuggestionSource::{ConflictDetection, KnownRules};
        assert_eq!(
            summary(&report),
            vec![
                (Critical, hadoop.clone(), "log4j:log4j".into(), KnownRules),
                (Warning, web.clone(), "ch.qos.logback:logback-classic".into(), KnownRules),
                (Warning, hadoop.clone(), "commons-logging:commons-logging".into(), KnownRules),
                (Warning, web.clone(), "commons-logging:commons-logging".into(), KnownRules),
                (Warning, hadoop.clone(), "org.slf4j:slf4j-api".into(), ConflictDetection),
                (Warning, hadoop, "org.slf4j:slf4j-log4j12".into(), KnownRules),
                (
                    Info,
                    web,
                    "com.fasterxml.jackson.core:jackson-databind".into(),
                    ConflictDetection
                ),
            ]
        );
        assert_eq!(report.analyzed, 4);
        assert_eq!(report.cache_misses, 3);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_module_filter_and_existing_exclusions() {
        let (analyzer, _) = analyzer(registry());
        let mut deps = project();
        deps[0]
            .exclusions
            .push(DependencyExclusion::wildcard("commons-logging"));

        let report = analyzer
            .analyze(&deps, Some("app"), &CancellationToken::new(), None)
            .await;
        assert_eq!(report.analyzed, 3);
        let exclusions: Vec<_> = report.suggestions.iter().map(|s| s.exclusion.id()).collect();
        assert_eq!(exclusions, vec!["com.fasterxml.jackson.core:jackson-databind"]);
    }

    #[tokio::test]
    async fn test_progress_and_cache() {
        let (analyzer, registry) = analyzer(registry());
        let (progress, mut rx) = ProgressSender::channel();
        analyzer
            .analyze(&project(), None, &CancellationToken::new(), Some(&progress))
            .await;

        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        assert_eq!(updates.len(), 4);
        assert_eq!(updates.iter().map(|u| u.completed).max(), Some(4));
        assert!(updates.iter().all(|u| u.total == 4));

        analyzer
            .analyze(&project(), None, &CancellationToken::new(), None)
            .await;
        assert_eq!(registry.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_progress_total_skips_unversioned() {
        let (analyzer, registry) = analyzer(registry());
        let mut deps = project();
        deps.push(InstalledDependency::new(
            Coordinate::new("org.springframework.boot", "spring-boot-starter-test", None),
            "testImplementation",
            "app",
            "/p/app/build.gradle.kts",
        ));
        let (progress, mut rx) = ProgressSender::channel();
        let report = analyzer
            .analyze(&deps, Some("app"), &CancellationToken::new(), Some(&progress))
            .await;
        assert_eq!(report.analyzed, 3);

        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        assert_eq!(updates.len(), 3);
        assert!(updates.iter().all(|u| u.total == 3));
        assert_eq!(updates.iter().map(|u| u.completed).max(), Some(3));
        assert_eq!(registry.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_analysis_reports_nothing() {
        let (analyzer, registry) = analyzer(registry());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = analyzer.analyze(&project(), None, &cancel, None).await;
        assert!(report.cancelled);
        assert!(report.suggestions.is_empty());
        assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rank_keeps_most_severe() {
        let parent = dependency(HADOOP, "hadoop");
        let suggestion = |severity, source| ExclusionSuggestion {
            parent: parent.clone(),
            exclusion: DependencyExclusion::new("log4j", "log4j"),
            severity,
            source,
            reason: String::new(),
        };
        let ranked = rank(vec![
            suggestion(Severity::Warning, SuggestionSource::ConflictDetection),
            suggestion(Severity::Critical, SuggestionSource::KnownRules),
            suggestion(Severity::Info, SuggestionSource::ConflictDetection),
        ]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].severity, Severity::Critical);
        assert_eq!(ranked[0].source, SuggestionSource::KnownRules);
    }
}
