use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;

/// Failure of a single registry request.
///
/// Ordinary failure modes (404, timeouts, unreachable hosts) are reported as
/// values so callers can degrade to "no result" instead of aborting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryError {
    pub url: String,
    /// HTTP status when the server answered.
    pub status: Option<u16>,
    pub message: String,
}

impl RegistryError {
    pub fn http(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status: Some(status),
            message: format!("HTTP {status}"),
        }
    }

    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registry request to {} failed: {}", self.url, self.message)
    }
}

impl std::error::Error for RegistryError {}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl ArtifactInfo {
    pub fn id(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

/// A dependency pulled in through an artifact's published descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitiveDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub optional: bool,
}

impl TransitiveDependency {
    pub fn id(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

/// Transitive closure of one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitiveDeps {
    pub dependencies: Vec<TransitiveDependency>,
    /// Whether the root descriptor came from the local artifact cache.
    pub local_cache_hit: bool,
}

/// Remote artifact registry.
///
/// Implemented against Maven Central, Nexus, Artifactory, Azure Artifacts or
/// any other Maven-layout repository. Hosts may substitute their own client.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Searches for artifacts. The query uses `g:<group> AND a:<artifact>`
    /// syntax for exact lookups and free text otherwise.
    async fn search(&self, query: &str, limit: usize) -> RegistryResult<Vec<ArtifactInfo>>;

    /// Returns the transitive dependency closure of `group:artifact:version`.
    async fn fetch_transitive_deps(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
    ) -> RegistryResult<TransitiveDeps>;

    /// Downloads an artifact file (`jar` unless `extension` says otherwise).
    async fn download_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
        classifier: Option<&str>,
        extension: &str,
    ) -> RegistryResult<Bytes>;
}

/// Builds the query string for an exact `group:artifact` lookup.
pub fn exact_query(group_id: &str, artifact_id: &str) -> String {
    format!("g:{group_id} AND a:{artifact_id}")
}

/// Splits an exact query produced by [`exact_query`].
pub fn parse_exact_query(query: &str) -> Option<(&str, &str)> {
    let (g, a) = query.split_once(" AND ")?;
    Some((g.trim().strip_prefix("g:")?, a.trim().strip_prefix("a:")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::http("https://repo1.maven.org/x.pom", 404);
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Registry request to https://repo1.maven.org/x.pom failed: HTTP 404"
        );

        let err = RegistryError::transport("https://nexus.local", "connection refused");
        assert_eq!(err.status, None);
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_exact_query_roundtrip() {
        let q = exact_query("com.google.guava", "guava");
        assert_eq!(q, "g:com.google.guava AND a:guava");
        assert_eq!(parse_exact_query(&q), Some(("com.google.guava", "guava")));
        assert_eq!(parse_exact_query("guava"), None);
    }

    #[test]
    fn test_ids() {
        let dep = TransitiveDependency {
            group_id: "org.slf4j".into(),
            artifact_id: "slf4j-api".into(),
            version: None,
            scope: None,
            optional: false,
        };
        assert_eq!(dep.id(), "org.slf4j:slf4j-api");

        let info = ArtifactInfo {
            group_id: "junit".into(),
            artifact_id: "junit".into(),
            version: "4.13.2".into(),
        };
        assert_eq!(info.id(), "junit:junit");
    }
}
