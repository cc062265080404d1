//! Maven-layout repository client.
//!
//! Versions come from `maven-metadata.xml` in the configured repository
//! (Maven Central, Nexus, Artifactory, Azure Artifacts...) with the Central
//! search API as fallback. POMs are read from the local `~/.m2/repository`
//! before going to the network.

use crate::parser::{MAX_PARENT_DEPTH, PomModel, parse_pom, resolve_placeholders};
use crate::version::compare_versions;
use crate::xml_tree::Document;
use async_trait::async_trait;
use bytes::Bytes;
use jvmdeps_core::{
    ArtifactInfo, DependencyExclusion, HttpCache, RegistryClient, RegistryError, RegistryResult,
    TransitiveDependency, TransitiveDeps,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const MAVEN_CENTRAL_SEARCH: &str = "https://search.maven.org/solrsearch/select";
pub const MAVEN_CENTRAL_REPOSITORY: &str = "https://repo1.maven.org/maven2";

const DEFAULT_MAX_DEPTH: usize = 4;
const DEFAULT_MAX_NODES: usize = 256;

/// Scopes that are not passed on to dependents.
const NON_TRANSITIVE_SCOPES: &[&str] = &["test", "provided", "system"];

/// Path of an artifact file relative to the repository root.
pub fn artifact_path(
    group_id: &str,
    artifact_id: &str,
    version: &str,
    classifier: Option<&str>,
    extension: &str,
) -> String {
    let classifier = classifier.map(|c| format!("-{c}")).unwrap_or_default();
    format!(
        "{}/{artifact_id}/{version}/{artifact_id}-{version}{classifier}.{extension}",
        group_id.replace('.', "/")
    )
}

pub fn metadata_path(group_id: &str, artifact_id: &str) -> String {
    format!("{}/{artifact_id}/maven-metadata.xml", group_id.replace('.', "/"))
}

/// `~/.m2/repository` for the current user.
pub fn default_local_repository() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".m2").join("repository"))
}

pub fn package_url(group_id: &str, artifact_id: &str) -> String {
    format!("https://central.sonatype.com/artifact/{group_id}/{artifact_id}")
}

/// Versions listed in a `maven-metadata.xml` document, in file order.
pub fn parse_metadata_versions(content: &str) -> crate::error::Result<Vec<String>> {
    let doc = Document::parse(content)?;
    Ok(doc
        .root
        .child("versioning")
        .and_then(|v| v.child("versions"))
        .map(|versions| {
            versions
                .children_named("version")
                .filter_map(crate::xml_tree::Element::text)
                .collect()
        })
        .unwrap_or_default())
}

#[derive(Deserialize)]
struct SolrResponse {
    response: SolrBody,
}

#[derive(Deserialize)]
struct SolrBody {
    #[serde(default)]
    docs: Vec<SolrDoc>,
}

#[derive(Deserialize)]
struct SolrDoc {
    g: String,
    a: String,
    #[serde(default)]
    v: Option<String>,
    #[serde(rename = "latestVersion", default)]
    latest_version: Option<String>,
}

fn parse_search_response(url: &str, data: &[u8]) -> RegistryResult<Vec<ArtifactInfo>> {
    let response: SolrResponse = serde_json::from_slice(data)
        .map_err(|e| RegistryError::transport(url, format!("invalid search response: {e}")))?;
    Ok(response
        .response
        .docs
        .into_iter()
        .filter_map(|d| {
            let version = d.v.or(d.latest_version)?;
            Some(ArtifactInfo {
                group_id: d.g,
                artifact_id: d.a,
                version,
            })
        })
        .collect())
}

/// A POM with its inherited context resolved.
struct EffectivePom {
    model: PomModel,
    properties: HashMap<String, String>,
    /// `group:artifact` → version from `<dependencyManagement>`, own and
    /// inherited.
    managed: HashMap<String, String>,
    local: bool,
}

struct Pending {
    group_id: String,
    artifact_id: String,
    version: String,
    depth: usize,
    exclusions: Vec<DependencyExclusion>,
}

/// [`RegistryClient`] over HTTP for any Maven-layout repository.
#[derive(Clone)]
pub struct MavenRepositoryClient {
    http: Arc<HttpCache>,
    search_url: String,
    repository_url: String,
    local_repository: Option<PathBuf>,
    max_depth: usize,
    max_nodes: usize,
}

impl MavenRepositoryClient {
    pub fn new(http: Arc<HttpCache>) -> Self {
        Self {
            http,
            search_url: MAVEN_CENTRAL_SEARCH.to_string(),
            repository_url: MAVEN_CENTRAL_REPOSITORY.to_string(),
            local_repository: default_local_repository(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }

    #[must_use]
    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    #[must_use]
    pub fn with_repository_url(mut self, url: impl AsRef<str>) -> Self {
        self.repository_url = jvmdeps_core::normalize_url(url.as_ref()).to_string();
        self
    }

    #[must_use]
    pub fn with_local_repository(mut self, path: Option<PathBuf>) -> Self {
        self.local_repository = path;
        self
    }

    /// Limits transitive resolution to `depth` levels below the root.
    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    fn remote_url(&self, relative: &str) -> String {
        format!("{}/{relative}", self.repository_url)
    }

    fn local_file(&self, relative: &str) -> Option<PathBuf> {
        self.local_repository.as_ref().map(|root| root.join(relative))
    }

    async fn read_local(path: &Path) -> Option<Vec<u8>> {
        match tokio::fs::read(path).await {
            Ok(data) => Some(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::debug!("Cannot read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Versions from `maven-metadata.xml`, newest first.
    pub async fn metadata_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> RegistryResult<Vec<String>> {
        let url = self.remote_url(&metadata_path(group_id, artifact_id));
        let data = self.http.get_cached(&url).await?;
        let mut versions = parse_metadata_versions(&String::from_utf8_lossy(&data))
            .map_err(|e| RegistryError::transport(&url, e.to_string()))?;
        versions.sort_by(|a, b| compare_versions(b, a));
        Ok(versions)
    }

    async fn search_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        limit: usize,
    ) -> RegistryResult<Vec<ArtifactInfo>> {
        match self.metadata_versions(group_id, artifact_id).await {
            Ok(versions) if !versions.is_empty() => {
                return Ok(versions
                    .into_iter()
                    .take(limit)
                    .map(|version| ArtifactInfo {
                        group_id: group_id.to_string(),
                        artifact_id: artifact_id.to_string(),
                        version,
                    })
                    .collect());
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Metadata lookup failed, trying search API: {}", e),
        }

        let query = jvmdeps_core::registry::exact_query(group_id, artifact_id);
        let url = format!(
            "{}?q={}&core=gav&rows={limit}&wt=json",
            self.search_url,
            urlencoding::encode(&query)
        );
        let data = self.http.get_cached(&url).await?;
        let mut results = parse_search_response(&url, &data)?;
        results.sort_by(|a, b| compare_versions(&b.version, &a.version));
        Ok(results)
    }

    /// Reads a POM, preferring the local repository. The flag tells whether
    /// it was found locally.
    async fn read_pom(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
    ) -> RegistryResult<(String, bool)> {
        let relative = artifact_path(group_id, artifact_id, version, None, "pom");
        if let Some(path) = self.local_file(&relative)
            && let Some(data) = Self::read_local(&path).await
        {
            tracing::trace!("Local POM {}", path.display());
            return Ok((String::from_utf8_lossy(&data).into_owned(), true));
        }
        let url = self.remote_url(&relative);
        let data = self.http.get_cached(&url).await?;
        Ok((String::from_utf8_lossy(&data).into_owned(), false))
    }

    async fn load_model(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
    ) -> RegistryResult<(PomModel, bool)> {
        let (content, local) = self.read_pom(group_id, artifact_id, version).await?;
        let model = parse_pom(&content).map_err(|e| {
            RegistryError::transport(
                format!("{group_id}:{artifact_id}:{version}"),
                format!("invalid POM: {e}"),
            )
        })?;
        Ok((model, local))
    }

    /// Loads a POM together with its parents from the repository.
    async fn effective_pom(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
    ) -> RegistryResult<EffectivePom> {
        let (model, local) = self.load_model(group_id, artifact_id, version).await?;

        let mut parents: Vec<PomModel> = Vec::new();
        let mut next = model.parent.clone();
        while let Some(parent) = next.take() {
            if parents.len() >= MAX_PARENT_DEPTH {
                break;
            }
            let (Some(g), Some(a), Some(v)) = (parent.group_id, parent.artifact_id, parent.version)
            else {
                break;
            };
            match self.load_model(&g, &a, &v).await {
                Ok((parent_model, _)) => {
                    next.clone_from(&parent_model.parent);
                    parents.push(parent_model);
                }
                Err(e) => {
                    tracing::debug!("Parent {}:{}:{} unavailable: {}", g, a, v, e);
                    break;
                }
            }
        }

        let properties = model.property_table(&parents);
        let mut managed = HashMap::new();
        for pom in parents.iter().rev().chain(std::iter::once(&model)) {
            for dep in pom.dependencies.iter().filter(|d| d.managed) {
                if dep.scope.as_deref() == Some("import") {
                    continue;
                }
                if let Some(version) = &dep.version {
                    let id = format!(
                        "{}:{}",
                        resolve_placeholders(&dep.group_id, &properties),
                        resolve_placeholders(&dep.artifact_id, &properties)
                    );
                    managed.insert(id, resolve_placeholders(&version.value, &properties));
                }
            }
        }

        Ok(EffectivePom {
            model,
            properties,
            managed,
            local,
        })
    }
}

#[async_trait]
impl RegistryClient for MavenRepositoryClient {
    async fn search(&self, query: &str, limit: usize) -> RegistryResult<Vec<ArtifactInfo>> {
        if let Some((group_id, artifact_id)) = jvmdeps_core::registry::parse_exact_query(query) {
            return self.search_versions(group_id, artifact_id, limit).await;
        }

        let url = format!(
            "{}?q={}&rows={limit}&wt=json",
            self.search_url,
            urlencoding::encode(query)
        );
        let data = self.http.get_cached(&url).await?;
        let mut results = parse_search_response(&url, &data)?;
        results.truncate(limit);
        Ok(results)
    }

    async fn fetch_transitive_deps(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
    ) -> RegistryResult<TransitiveDeps> {
        let mut result = TransitiveDeps::default();
        let mut seen: HashSet<String> = HashSet::from([format!("{group_id}:{artifact_id}")]);
        let mut queue = VecDeque::from([Pending {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            depth: 0,
            exclusions: Vec::new(),
        }]);

        while let Some(node) = queue.pop_front() {
            let pom = match self
                .effective_pom(&node.group_id, &node.artifact_id, &node.version)
                .await
            {
                Ok(pom) => pom,
                Err(e) if node.depth == 0 => return Err(e),
                Err(e) => {
                    tracing::debug!(
                        "Skipping {}:{}:{}: {}",
                        node.group_id,
                        node.artifact_id,
                        node.version,
                        e
                    );
                    continue;
                }
            };
            if node.depth == 0 {
                result.local_cache_hit = pom.local;
            }

            for dep in pom.model.dependencies.iter().filter(|d| !d.managed) {
                if dep.optional
                    || dep
                        .scope
                        .as_deref()
                        .is_some_and(|s| NON_TRANSITIVE_SCOPES.contains(&s))
                {
                    continue;
                }
                let dep_group = resolve_placeholders(&dep.group_id, &pom.properties);
                let dep_artifact = resolve_placeholders(&dep.artifact_id, &pom.properties);
                if node
                    .exclusions
                    .iter()
                    .any(|e| e.matches(&dep_group, &dep_artifact))
                {
                    continue;
                }
                let id = format!("{dep_group}:{dep_artifact}");
                if !seen.insert(id.clone()) {
                    continue;
                }

                let dep_version = dep
                    .version
                    .as_ref()
                    .map(|v| resolve_placeholders(&v.value, &pom.properties))
                    .or_else(|| pom.managed.get(&id).cloned())
                    .filter(|v| !v.contains("${"));

                if let Some(v) = &dep_version
                    && node.depth + 1 < self.max_depth
                    && result.dependencies.len() < self.max_nodes
                {
                    let mut exclusions = node.exclusions.clone();
                    exclusions.extend(dep.exclusions.iter().cloned());
                    queue.push_back(Pending {
                        group_id: dep_group.clone(),
                        artifact_id: dep_artifact.clone(),
                        version: v.clone(),
                        depth: node.depth + 1,
                        exclusions,
                    });
                }

                result.dependencies.push(TransitiveDependency {
                    group_id: dep_group,
                    artifact_id: dep_artifact,
                    version: dep_version,
                    scope: dep.scope.clone(),
                    optional: dep.optional,
                });
            }

            if result.dependencies.len() >= self.max_nodes {
                tracing::debug!(
                    "Transitive closure of {}:{} truncated at {} nodes",
                    group_id,
                    artifact_id,
                    self.max_nodes
                );
                break;
            }
        }

        Ok(result)
    }

    async fn download_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
        classifier: Option<&str>,
        extension: &str,
    ) -> RegistryResult<Bytes> {
        let relative = artifact_path(group_id, artifact_id, version, classifier, extension);
        if let Some(path) = self.local_file(&relative)
            && let Some(data) = Self::read_local(&path).await
        {
            return Ok(Bytes::from(data));
        }
        self.http.fetch(&self.remote_url(&relative)).await
    }
}
