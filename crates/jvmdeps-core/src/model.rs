//! Immutable record model for dependency and plugin declarations.
//!
//! Records are produced fresh by every scan and never mutated in place. Source
//! spans are only valid against the exact text they were computed from.

use crate::error::{DepsError, Result};
use crate::parser::strip_quotes;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

/// Group assumed by Maven when a `<plugin>` omits `<groupId>`.
pub const DEFAULT_MAVEN_PLUGIN_GROUP: &str = "org.apache.maven.plugins";

/// `(groupId, artifactId, version?)` triple identifying a published artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Coordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
}

impl Coordinate {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version,
        }
    }

    /// Version-independent identity key: `group:artifact`.
    pub fn id(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    /// `group:artifact:version`, or the identity key when no version is known.
    pub fn full_name(&self) -> String {
        match &self.version {
            Some(v) => format!("{}:{}:{v}", self.group_id, self.artifact_id),
            None => self.id(),
        }
    }

    /// Parses a Gradle-style `group:artifact:version[:classifier][@ext]` string.
    ///
    /// Surrounding single or double quotes are stripped first. Strings with
    /// fewer than three non-empty colon-delimited parts are rejected.
    pub fn parse_gav(raw: &str) -> Option<Self> {
        let unquoted = strip_quotes(raw.trim());
        let parts: Vec<&str> = unquoted.split(':').collect();
        if parts.len() < 3 || parts[..3].iter().any(|p| p.trim().is_empty()) {
            return None;
        }

        let version = parts[2]
            .split('@')
            .next()
            .unwrap_or(parts[2])
            .trim()
            .to_string();
        if version.is_empty() {
            return None;
        }

        Some(Self::new(parts[0].trim(), parts[1].trim(), Some(version)))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Byte range `[offset, offset + length)` of a declaration in its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
}

impl Span {
    pub const fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    pub const fn from_bounds(start: usize, end: usize) -> Self {
        Self {
            offset: start,
            length: end.saturating_sub(start),
        }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Returns the byte range if the span still fits `text`.
    pub fn checked_range(&self, text: &str) -> Result<Range<usize>> {
        let end = self.offset.checked_add(self.length);
        match end {
            Some(end)
                if end <= text.len()
                    && text.is_char_boundary(self.offset)
                    && text.is_char_boundary(end) =>
            {
                Ok(self.offset..end)
            }
            _ => Err(DepsError::StaleSpan {
                offset: self.offset,
                length: self.length,
                text_len: text.len(),
            }),
        }
    }

    pub fn slice<'a>(&self, text: &'a str) -> Result<&'a str> {
        let range = self.checked_range(text)?;
        Ok(&text[range])
    }
}

/// How a declared version is written in the build file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum VersionRef {
    #[default]
    Literal,
    /// Maven `${name}` property.
    Property(String),
    /// Gradle `$name` / `${name}` variable or extra property.
    Variable(String),
    /// Gradle version catalog alias.
    Catalog(String),
}

/// A dependency declaration found in a build file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledDependency {
    pub coordinate: Coordinate,
    /// Gradle configuration (`implementation`, `api`, ...) or Maven scope.
    pub configuration: String,
    pub module_name: String,
    pub build_file: PathBuf,
    pub span: Option<Span>,
    pub version_ref: VersionRef,
    pub catalog_key: Option<String>,
    pub exclusions: Vec<DependencyExclusion>,
}

impl InstalledDependency {
    pub fn new(
        coordinate: Coordinate,
        configuration: impl Into<String>,
        module_name: impl Into<String>,
        build_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            coordinate,
            configuration: configuration.into(),
            module_name: module_name.into(),
            build_file: build_file.into(),
            span: None,
            version_ref: VersionRef::Literal,
            catalog_key: None,
            exclusions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    #[must_use]
    pub fn with_version_ref(mut self, version_ref: VersionRef) -> Self {
        self.version_ref = version_ref;
        self
    }

    pub fn id(&self) -> String {
        self.coordinate.id()
    }

    pub fn version(&self) -> Option<&str> {
        self.coordinate.version.as_deref()
    }

    pub fn is_from_version_catalog(&self) -> bool {
        self.catalog_key.is_some()
    }
}

/// The eight ways a Gradle plugin can be declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginSyntax {
    /// `id("x") version "1.0"`
    IdVersion,
    /// `id("x")`
    IdOnly,
    /// `kotlin("jvm") version "1.9.0"`
    KotlinShorthand,
    /// `` `java-library` ``
    Backtick,
    /// `id 'x' version '1.0'`
    GroovyIdVersion,
    /// `id 'x'`
    GroovyIdOnly,
    /// bare `java` inside a Groovy `plugins {}` block
    GroovyShorthand,
    /// `apply plugin: 'x'` / `apply(plugin = "x")`
    LegacyApply,
}

impl PluginSyntax {
    pub const fn is_shorthand(self) -> bool {
        matches!(
            self,
            Self::KotlinShorthand | Self::Backtick | Self::GroovyShorthand
        )
    }

    pub const fn is_groovy(self) -> bool {
        matches!(
            self,
            Self::GroovyIdVersion | Self::GroovyIdOnly | Self::GroovyShorthand
        )
    }
}

/// A Gradle plugin declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledPlugin {
    pub plugin_id: String,
    pub version: Option<String>,
    pub module_name: String,
    pub build_file: PathBuf,
    pub span: Option<Span>,
    pub syntax: PluginSyntax,
    /// False for `apply false` declarations.
    pub applied: bool,
}

impl InstalledPlugin {
    pub fn is_shorthand(&self) -> bool {
        self.syntax.is_shorthand()
    }

    /// Artifact id of the plugin marker published for `plugin_id`.
    pub fn marker_artifact_id(&self) -> String {
        format!("{}.gradle.plugin", self.plugin_id)
    }
}

/// A `<plugin>` declared in a POM's `<build>` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenInstalledPlugin {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub version_ref: VersionRef,
    pub module_name: String,
    pub pom_file: PathBuf,
    pub span: Option<Span>,
    pub phase: Option<String>,
    pub goals: Vec<String>,
    pub inherited: Option<bool>,
    pub from_plugin_management: bool,
    pub configuration: BTreeMap<String, String>,
}

impl MavenInstalledPlugin {
    pub fn id(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    pub fn has_default_group(&self) -> bool {
        self.group_id == DEFAULT_MAVEN_PLUGIN_GROUP
    }
}

/// Records that can be checked against a registry for newer versions.
pub trait VersionedRecord {
    fn lookup_group(&self) -> &str;

    fn lookup_artifact(&self) -> Cow<'_, str>;

    fn installed_version(&self) -> Option<&str>;
}

impl VersionedRecord for InstalledDependency {
    fn lookup_group(&self) -> &str {
        &self.coordinate.group_id
    }

    fn lookup_artifact(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.coordinate.artifact_id)
    }

    fn installed_version(&self) -> Option<&str> {
        self.version()
    }
}

impl VersionedRecord for InstalledPlugin {
    fn lookup_group(&self) -> &str {
        &self.plugin_id
    }

    fn lookup_artifact(&self) -> Cow<'_, str> {
        Cow::Owned(self.marker_artifact_id())
    }

    fn installed_version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl VersionedRecord for MavenInstalledPlugin {
    fn lookup_group(&self) -> &str {
        &self.group_id
    }

    fn lookup_artifact(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.artifact_id)
    }

    fn installed_version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

/// An installed record paired with the latest version known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Update<R> {
    pub installed: R,
    pub latest_version: String,
}

pub type DependencyUpdate = Update<InstalledDependency>;
pub type PluginUpdate = Update<InstalledPlugin>;
pub type MavenPluginUpdate = Update<MavenInstalledPlugin>;

impl<R: VersionedRecord> Update<R> {
    pub fn new(installed: R, latest_version: impl Into<String>) -> Self {
        Self {
            installed,
            latest_version: latest_version.into(),
        }
    }

    /// Plain string inequality between installed and latest.
    ///
    /// `1.0` vs `1.0.0` therefore counts as an update.
    pub fn has_update(&self) -> bool {
        self.installed
            .installed_version()
            .is_some_and(|v| v != self.latest_version)
    }
}

/// An instruction to omit a transitive dependency.
///
/// Without an artifact id the exclusion covers the whole group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyExclusion {
    pub group_id: String,
    pub artifact_id: Option<String>,
}

impl DependencyExclusion {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: Some(artifact_id.into()),
        }
    }

    pub fn wildcard(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: None,
        }
    }

    pub fn id(&self) -> String {
        match &self.artifact_id {
            Some(a) => format!("{}:{a}", self.group_id),
            None => self.group_id.clone(),
        }
    }

    pub fn display_name(&self) -> String {
        match &self.artifact_id {
            Some(a) => format!("{}:{a}", self.group_id),
            None => format!("{}:*", self.group_id),
        }
    }

    pub fn matches(&self, group_id: &str, artifact_id: &str) -> bool {
        self.group_id == group_id && self.artifact_id.as_deref().is_none_or(|a| a == artifact_id)
    }
}

/// Goals and parameters of a downloaded Maven plugin.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub goal_prefix: Option<String>,
    pub mojos: Vec<MojoDescriptor>,
}

impl PluginDescriptor {
    pub fn mojo(&self, goal: &str) -> Option<&MojoDescriptor> {
        self.mojos.iter().find(|m| m.goal == goal)
    }

    pub fn goals(&self) -> impl Iterator<Item = &str> {
        self.mojos.iter().map(|m| m.goal.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MojoDescriptor {
    pub goal: String,
    pub description: Option<String>,
    pub default_phase: Option<String>,
    pub parameters: Vec<MojoParameter>,
}

impl MojoDescriptor {
    /// Parameters a user may set in `<configuration>`.
    pub fn editable_parameters(&self) -> impl Iterator<Item = &MojoParameter> {
        self.parameters.iter().filter(|p| p.editable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MojoParameter {
    pub name: String,
    pub type_name: String,
    pub required: bool,
    pub editable: bool,
    pub description: Option<String>,
    pub default_value: Option<String>,
    /// User property, e.g. `${maven.compiler.release}`.
    pub expression: Option<String>,
}

/// A remote Maven-layout repository to declare in a build or settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRepository {
    pub id: String,
    pub name: Option<String>,
    pub url: String,
    /// Emit a credentials reference (the secrets themselves live elsewhere).
    pub credentials: bool,
}

impl RemoteRepository {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            url: url.into(),
            credentials: false,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_credentials(mut self) -> Self {
        self.credentials = true;
        self
    }

    /// URL without trailing slashes, for comparisons.
    pub fn normalized_url(&self) -> &str {
        normalize_url(&self.url)
    }
}

pub fn normalize_url(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}

/// A staged full-file replacement, shown as a preview before it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEdit {
    pub path: PathBuf,
    pub original: String,
    pub updated: String,
}

impl FileEdit {
    pub fn new(path: impl Into<PathBuf>, original: impl Into<String>, updated: String) -> Self {
        Self {
            path: path.into(),
            original: original.into(),
            updated,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.original == self.updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guava() -> InstalledDependency {
        InstalledDependency::new(
            Coordinate::new("com.google.guava", "guava", Some("31.0-jre".into())),
            "implementation",
            "app",
            "/p/app/build.gradle.kts",
        )
    }

    #[test]
    fn test_coordinate_identity() {
        let c = Coordinate::new("org.slf4j", "slf4j-api", Some("2.0.9".into()));
        assert_eq!(c.id(), "org.slf4j:slf4j-api");
        assert_eq!(c.full_name(), "org.slf4j:slf4j-api:2.0.9");
        assert_eq!(c.to_string(), "org.slf4j:slf4j-api:2.0.9");

        let unversioned = Coordinate::new("org.slf4j", "slf4j-api", None);
        assert_eq!(unversioned.full_name(), "org.slf4j:slf4j-api");
    }

    #[test]
    fn test_parse_gav_accepts_three_parts() {
        let c = Coordinate::parse_gav("com.google.guava:guava:31.0-jre").unwrap();
        assert_eq!(c.group_id, "com.google.guava");
        assert_eq!(c.artifact_id, "guava");
        assert_eq!(c.version.as_deref(), Some("31.0-jre"));
    }

    #[test]
    fn test_parse_gav_rejects_partial() {
        assert!(Coordinate::parse_gav("com.google.guava:guava").is_none());
        assert!(Coordinate::parse_gav("guava").is_none());
        assert!(Coordinate::parse_gav("a::1.0").is_none());
        assert!(Coordinate::parse_gav("a:b:").is_none());
    }

    #[test]
    fn test_parse_gav_quote_stripping_is_idempotent() {
        let single = Coordinate::parse_gav("'g:a:v'").unwrap();
        let double = Coordinate::parse_gav("\"g:a:v\"").unwrap();
        let bare = Coordinate::parse_gav("g:a:v").unwrap();
        assert_eq!(single, double);
        assert_eq!(single, bare);
    }

    #[test]
    fn test_parse_gav_classifier_and_extension() {
        let c = Coordinate::parse_gav("io.netty:netty-tcnative:2.0.61.Final:linux-x86_64").unwrap();
        assert_eq!(c.version.as_deref(), Some("2.0.61.Final"));

        let c = Coordinate::parse_gav("org.webjars:jquery:3.7.1@jar").unwrap();
        assert_eq!(c.version.as_deref(), Some("3.7.1"));
    }

    #[test]
    fn test_span_checked_range() {
        let text = "dependencies { }";
        assert_eq!(Span::new(0, 12).checked_range(text).unwrap(), 0..12);
        assert_eq!(Span::new(0, 12).slice(text).unwrap(), "dependencies");
        assert!(matches!(
            Span::new(10, 10).checked_range(text),
            Err(DepsError::StaleSpan { text_len: 16, .. })
        ));
        assert!(Span::new(usize::MAX, 2).checked_range(text).is_err());
    }

    #[test]
    fn test_span_rejects_split_char() {
        let text = "é";
        assert!(Span::new(1, 1).checked_range(text).is_err());
    }

    #[test]
    fn test_dependency_update_string_inequality() {
        let update = DependencyUpdate::new(guava(), "32.1.3-jre");
        assert!(update.has_update());

        let same = DependencyUpdate::new(guava(), "31.0-jre");
        assert!(!same.has_update());

        let mut unversioned = guava();
        unversioned.coordinate.version = None;
        assert!(!DependencyUpdate::new(unversioned, "32.1.3-jre").has_update());
    }

    #[test]
    fn test_update_equivalent_representations_count_as_update() {
        let mut dep = guava();
        dep.coordinate.version = Some("1.0".into());
        assert!(DependencyUpdate::new(dep, "1.0.0").has_update());
    }

    #[test]
    fn test_exclusion_ids() {
        let exact = DependencyExclusion::new("commons-logging", "commons-logging");
        assert_eq!(exact.id(), "commons-logging:commons-logging");
        assert_eq!(exact.display_name(), "commons-logging:commons-logging");

        let wildcard = DependencyExclusion::wildcard("org.slf4j");
        assert_eq!(wildcard.id(), "org.slf4j");
        assert_eq!(wildcard.display_name(), "org.slf4j:*");
        assert!(wildcard.matches("org.slf4j", "slf4j-simple"));
        assert!(!exact.matches("commons-logging", "other"));
    }

    #[test]
    fn test_plugin_marker_lookup() {
        let plugin = InstalledPlugin {
            plugin_id: "org.springframework.boot".into(),
            version: Some("3.2.0".into()),
            module_name: "app".into(),
            build_file: "/p/build.gradle.kts".into(),
            span: None,
            syntax: PluginSyntax::IdVersion,
            applied: true,
        };
        assert_eq!(plugin.lookup_group(), "org.springframework.boot");
        assert_eq!(
            plugin.lookup_artifact(),
            "org.springframework.boot.gradle.plugin"
        );
        assert!(!plugin.is_shorthand());
        assert!(PluginSyntax::Backtick.is_shorthand());
        assert!(PluginSyntax::GroovyIdOnly.is_groovy());
    }

    #[test]
    fn test_plugin_descriptor_lookup() {
        let descriptor = PluginDescriptor {
            group_id: DEFAULT_MAVEN_PLUGIN_GROUP.into(),
            artifact_id: "maven-compiler-plugin".into(),
            version: "3.11.0".into(),
            goal_prefix: Some("compiler".into()),
            mojos: vec![MojoDescriptor {
                goal: "compile".into(),
                parameters: vec![
                    MojoParameter {
                        name: "release".into(),
                        editable: true,
                        ..Default::default()
                    },
                    MojoParameter {
                        name: "project".into(),
                        editable: false,
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
        };
        let mojo = descriptor.mojo("compile").unwrap();
        assert_eq!(mojo.editable_parameters().count(), 1);
        assert_eq!(descriptor.goals().collect::<Vec<_>>(), vec!["compile"]);
        assert!(descriptor.mojo("testCompile").is_none());
    }

    #[test]
    fn test_repository_url_normalization() {
        let repo = RemoteRepository::new("nexus", "https://nexus.example.com/repository/maven/")
            .with_credentials();
        assert_eq!(
            repo.normalized_url(),
            "https://nexus.example.com/repository/maven"
        );
        assert!(repo.credentials);
        assert_eq!(
            normalize_url(" https://repo.maven.apache.org/maven2// "),
            "https://repo.maven.apache.org/maven2"
        );
    }

    #[test]
    fn test_file_edit_noop() {
        let edit = FileEdit::new("/p/pom.xml", "a", "a".to_string());
        assert!(edit.is_noop());
    }
}
