//! pom.xml parser with byte-accurate spans.
//!
//! Uses the quick-xml event reader without text trimming so that
//! `buffer_position()` before each event points at the event's first byte.
//! Every `<dependency>` and top-level `<plugin>` keeps the byte range of its
//! element plus the content ranges of the values the patch engine rewrites.

use crate::error::{MavenError, Result};
use jvmdeps_core::{
    Coordinate, DEFAULT_MAVEN_PLUGIN_GROUP, DependencyExclusion, InstalledDependency,
    MavenInstalledPlugin, Span, VersionRef,
};
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Upper bound on `${...}` substitution rounds; cyclic properties stop here.
pub const MAX_PLACEHOLDER_ITERATIONS: usize = 10;
pub(crate) const MAX_PARENT_DEPTH: usize = 8;
const DEFAULT_RELATIVE_PATH: &str = "../pom.xml";

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
static SOLE_PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").unwrap())
}

fn sole_placeholder() -> &'static Regex {
    SOLE_PLACEHOLDER.get_or_init(|| Regex::new(r"^\$\{([^}]+)\}$").unwrap())
}

/// Byte layout of one element: `<tag ...>` starts at `start`, its content
/// spans `content_start..close_start` and `</tag>` ends at `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementSpan {
    pub start: usize,
    pub content_start: usize,
    pub close_start: usize,
    pub end: usize,
}

impl ElementSpan {
    pub const fn span(&self) -> Span {
        Span::from_bounds(self.start, self.end)
    }

    pub const fn content(&self) -> Span {
        Span::from_bounds(self.content_start, self.close_start)
    }
}

/// A leaf value together with the span of its raw content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomValue {
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentRef {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub relative_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<PomValue>,
    pub scope: Option<String>,
    pub optional: bool,
    pub exclusions: Vec<DependencyExclusion>,
    pub exclusions_element: Option<ElementSpan>,
    pub element: ElementSpan,
    /// Declared under `<dependencyManagement>`.
    pub managed: bool,
}

impl PomDependency {
    pub fn id(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomPlugin {
    /// As written; `None` means the default Maven plugin group.
    pub group_id: Option<String>,
    pub artifact_id: String,
    pub artifact_id_element: ElementSpan,
    pub version: Option<PomValue>,
    pub inherited: Option<bool>,
    pub phase: Option<String>,
    pub goals: Vec<String>,
    pub configuration: BTreeMap<String, String>,
    pub configuration_element: Option<ElementSpan>,
    pub element: ElementSpan,
    pub from_plugin_management: bool,
}

impl PomPlugin {
    pub fn effective_group_id(&self) -> &str {
        self.group_id.as_deref().unwrap_or(DEFAULT_MAVEN_PLUGIN_GROUP)
    }

    /// Matches by artifact id and group, treating an omitted `<groupId>` as
    /// the default plugin group.
    pub fn matches(&self, group_id: &str, artifact_id: &str) -> bool {
        self.artifact_id == artifact_id && self.effective_group_id() == group_id
    }
}

/// Structural view of one POM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomModel {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub parent: Option<ParentRef>,
    pub properties: BTreeMap<String, PomValue>,
    pub modules: Vec<String>,
    pub dependencies: Vec<PomDependency>,
    pub plugins: Vec<PomPlugin>,
    pub project_element: ElementSpan,
    pub properties_element: Option<ElementSpan>,
    pub dependencies_element: Option<ElementSpan>,
    pub repositories_element: Option<ElementSpan>,
    pub build_element: Option<ElementSpan>,
    pub build_plugins_element: Option<ElementSpan>,
}

/// Records extracted from one POM.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PomRecords {
    pub module_name: String,
    pub dependencies: Vec<InstalledDependency>,
    pub plugins: Vec<MavenInstalledPlugin>,
}

struct OpenElement {
    name: String,
    start: usize,
    content_start: usize,
}

#[derive(Default)]
struct DependencyAccum {
    managed: bool,
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<PomValue>,
    scope: Option<String>,
    optional: bool,
    exclusions: Vec<DependencyExclusion>,
    exclusions_element: Option<ElementSpan>,
    exclusion: Option<(Option<String>, Option<String>)>,
}

#[derive(Default)]
struct PluginAccum {
    from_plugin_management: bool,
    group_id: Option<String>,
    artifact_id: Option<String>,
    artifact_id_element: Option<ElementSpan>,
    version: Option<PomValue>,
    inherited: Option<bool>,
    phase: Option<String>,
    goals: Vec<String>,
    configuration: BTreeMap<String, String>,
    nested_configuration: BTreeSet<String>,
    configuration_element: Option<ElementSpan>,
}

#[derive(Default)]
struct PomBuilder {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    parent: Option<ParentRef>,
    properties: BTreeMap<String, PomValue>,
    modules: Vec<String>,
    dependencies: Vec<PomDependency>,
    plugins: Vec<PomPlugin>,
    project_element: Option<ElementSpan>,
    properties_element: Option<ElementSpan>,
    dependencies_element: Option<ElementSpan>,
    repositories_element: Option<ElementSpan>,
    build_element: Option<ElementSpan>,
    build_plugins_element: Option<ElementSpan>,
    dependency: Option<DependencyAccum>,
    plugin: Option<PluginAccum>,
}

impl PomBuilder {
    fn on_start(&mut self, path: &[&str]) {
        match path {
            ["project", "dependencies", "dependency"] => {
                self.dependency = Some(DependencyAccum::default());
            }
            ["project", "dependencyManagement", "dependencies", "dependency"] => {
                self.dependency = Some(DependencyAccum {
                    managed: true,
                    ..DependencyAccum::default()
                });
            }
            ["project", "build", "plugins", "plugin"] => {
                self.plugin = Some(PluginAccum::default());
            }
            ["project", "build", "pluginManagement", "plugins", "plugin"] => {
                self.plugin = Some(PluginAccum {
                    from_plugin_management: true,
                    ..PluginAccum::default()
                });
            }
            ["project", "dependencies", "dependency", rest @ ..]
            | ["project", "dependencyManagement", "dependencies", "dependency", rest @ ..] => {
                if rest == ["exclusions", "exclusion"]
                    && let Some(dep) = self.dependency.as_mut()
                {
                    dep.exclusion = Some((None, None));
                }
            }
            ["project", "build", "plugins", "plugin", rest @ ..]
            | ["project", "build", "pluginManagement", "plugins", "plugin", rest @ ..] => {
                if let ["configuration", child, _, ..] = rest
                    && let Some(plugin) = self.plugin.as_mut()
                {
                    plugin.nested_configuration.insert((*child).to_string());
                }
            }
            _ => {}
        }
    }

    fn on_end(&mut self, path: &[&str], element: ElementSpan, text: &str, self_closing: bool) {
        match path {
            ["project"] => self.project_element = Some(element),
            ["project", field @ ("groupId" | "artifactId" | "version")] => {
                let slot = match *field {
                    "groupId" => &mut self.group_id,
                    "artifactId" => &mut self.artifact_id,
                    _ => &mut self.version,
                };
                *slot = non_empty(text);
            }
            ["project", "parent", field] => {
                let parent = self.parent.get_or_insert_with(ParentRef::default);
                match *field {
                    "groupId" => parent.group_id = non_empty(text),
                    "artifactId" => parent.artifact_id = non_empty(text),
                    "version" => parent.version = non_empty(text),
                    "relativePath" => parent.relative_path = Some(text.to_string()),
                    _ => {}
                }
            }
            ["project", "parent"] => {
                self.parent.get_or_insert_with(ParentRef::default);
            }
            ["project", "properties", key] => {
                self.properties.insert(
                    (*key).to_string(),
                    PomValue {
                        value: text.to_string(),
                        span: element.content(),
                    },
                );
            }
            ["project", "modules", "module"] => {
                if let Some(module) = non_empty(text) {
                    self.modules.push(module);
                }
            }
            ["project", container] if !self_closing => match *container {
                "properties" => self.properties_element = Some(element),
                "dependencies" => self.dependencies_element = Some(element),
                "repositories" => self.repositories_element = Some(element),
                "build" => self.build_element = Some(element),
                _ => {}
            },
            ["project", "build", "plugins"] if !self_closing => {
                self.build_plugins_element = Some(element);
            }
            ["project", "dependencies", "dependency", rest @ ..]
            | ["project", "dependencyManagement", "dependencies", "dependency", rest @ ..] => {
                self.on_dependency_end(rest, element, text);
            }
            ["project", "build", "plugins", "plugin", rest @ ..]
            | ["project", "build", "pluginManagement", "plugins", "plugin", rest @ ..] => {
                self.on_plugin_end(rest, element, text);
            }
            _ => {}
        }
    }

    fn on_dependency_end(&mut self, rest: &[&str], element: ElementSpan, text: &str) {
        if rest.is_empty() {
            if let Some(dep) = self.dependency.take()
                && let (Some(group_id), Some(artifact_id)) = (dep.group_id, dep.artifact_id)
            {
                self.dependencies.push(PomDependency {
                    group_id,
                    artifact_id,
                    version: dep.version,
                    scope: dep.scope,
                    optional: dep.optional,
                    exclusions: dep.exclusions,
                    exclusions_element: dep.exclusions_element,
                    element,
                    managed: dep.managed,
                });
            }
            return;
        }

        let Some(dep) = self.dependency.as_mut() else {
            return;
        };
        match rest {
            ["groupId"] => dep.group_id = non_empty(text),
            ["artifactId"] => dep.artifact_id = non_empty(text),
            ["version"] => {
                dep.version = Some(PomValue {
                    value: text.to_string(),
                    span: element.content(),
                });
            }
            ["scope"] => dep.scope = non_empty(text),
            ["optional"] => dep.optional = text == "true",
            ["exclusions"] => dep.exclusions_element = Some(element),
            ["exclusions", "exclusion", field @ ("groupId" | "artifactId")] => {
                if let Some((group, artifact)) = dep.exclusion.as_mut() {
                    if *field == "groupId" {
                        *group = non_empty(text);
                    } else {
                        *artifact = non_empty(text);
                    }
                }
            }
            ["exclusions", "exclusion"] => {
                if let Some((Some(group), artifact)) = dep.exclusion.take() {
                    dep.exclusions.push(match artifact.as_deref() {
                        None | Some("*") => DependencyExclusion::wildcard(group),
                        Some(a) => DependencyExclusion::new(group, a),
                    });
                }
            }
            _ => {}
        }
    }

    fn on_plugin_end(&mut self, rest: &[&str], element: ElementSpan, text: &str) {
        if rest.is_empty() {
            if let Some(plugin) = self.plugin.take()
                && let (Some(artifact), Some(artifact_id_element)) =
                    (plugin.artifact_id, plugin.artifact_id_element)
            {
                self.plugins.push(PomPlugin {
                    group_id: plugin.group_id,
                    artifact_id: artifact,
                    artifact_id_element,
                    version: plugin.version,
                    inherited: plugin.inherited,
                    phase: plugin.phase,
                    goals: plugin.goals,
                    configuration: plugin.configuration,
                    configuration_element: plugin.configuration_element,
                    element,
                    from_plugin_management: plugin.from_plugin_management,
                });
            }
            return;
        }

        let Some(plugin) = self.plugin.as_mut() else {
            return;
        };
        match rest {
            ["groupId"] => plugin.group_id = non_empty(text),
            ["artifactId"] => {
                plugin.artifact_id = non_empty(text);
                plugin.artifact_id_element = Some(element);
            }
            ["version"] => {
                plugin.version = Some(PomValue {
                    value: text.to_string(),
                    span: element.content(),
                });
            }
            ["inherited"] => plugin.inherited = text.parse().ok(),
            ["executions", "execution", "phase"] => {
                if plugin.phase.is_none() {
                    plugin.phase = non_empty(text);
                }
            }
            ["executions", "execution", "goals", "goal"] => {
                if let Some(goal) = non_empty(text)
                    && !plugin.goals.contains(&goal)
                {
                    plugin.goals.push(goal);
                }
            }
            ["configuration"] => plugin.configuration_element = Some(element),
            ["configuration", key] => {
                if !plugin.nested_configuration.contains(*key) {
                    plugin
                        .configuration
                        .insert((*key).to_string(), text.to_string());
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> Result<PomModel> {
        let project_element = self
            .project_element
            .ok_or_else(|| MavenError::xml("missing <project> element", 0))?;
        Ok(PomModel {
            group_id: self.group_id,
            artifact_id: self.artifact_id,
            version: self.version,
            parent: self.parent,
            properties: self.properties,
            modules: self.modules,
            dependencies: self.dependencies,
            plugins: self.plugins,
            project_element,
            properties_element: self.properties_element,
            dependencies_element: self.dependencies_element,
            repositories_element: self.repositories_element,
            build_element: self.build_element,
            build_plugins_element: self.build_plugins_element,
        })
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parses a POM into its structural model.
pub fn parse_pom(content: &str) -> Result<PomModel> {
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut builder = PomBuilder::default();
    let mut text = String::new();

    loop {
        let pos = reader.buffer_position();
        let event = reader.read_event().map_err(|e| MavenError::xml(e, pos))?;

        match event {
            Event::Start(ref e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                check_root(&stack, &name)?;
                stack.push(OpenElement {
                    name,
                    start: pos as usize,
                    content_start: reader.buffer_position() as usize,
                });
                let path = element_path(&stack, None);
                builder.on_start(&path);
                text.clear();
            }
            Event::Empty(ref e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                check_root(&stack, &name)?;
                let end = reader.buffer_position() as usize;
                let element = ElementSpan {
                    start: pos as usize,
                    content_start: end,
                    close_start: end,
                    end,
                };
                let path = element_path(&stack, Some(name.as_str()));
                builder.on_start(&path);
                builder.on_end(&path, element, "", true);
                text.clear();
            }
            Event::Text(ref e) => {
                let raw = e
                    .decode()
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(e.as_ref()).into_owned());
                text.push_str(&unescape(&raw));
            }
            Event::GeneralRef(ref r) => {
                let name = String::from_utf8_lossy(r.as_ref()).into_owned();
                text.push_str(&unescape(&format!("&{name};")));
            }
            Event::CData(ref e) => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Event::End(_) => {
                let Some(open) = stack.pop() else {
                    return Err(MavenError::xml("unexpected closing tag", pos));
                };
                let element = ElementSpan {
                    start: open.start,
                    content_start: open.content_start,
                    close_start: pos as usize,
                    end: reader.buffer_position() as usize,
                };
                let path = element_path(&stack, Some(open.name.as_str()));
                builder.on_end(&path, element, text.trim(), false);
                text.clear();
            }
            Event::Eof => {
                if let Some(open) = stack.last() {
                    return Err(MavenError::xml(
                        format!("unclosed <{}> element", open.name),
                        pos,
                    ));
                }
                break;
            }
            _ => {}
        }
    }

    builder.finish()
}

fn check_root(stack: &[OpenElement], name: &str) -> Result<()> {
    if stack.is_empty() && name != "project" {
        return Err(MavenError::UnexpectedRoot {
            expected: "project".into(),
            found: name.to_string(),
        });
    }
    Ok(())
}

fn element_path<'a>(stack: &'a [OpenElement], last: Option<&'a str>) -> Vec<&'a str> {
    stack
        .iter()
        .map(|o| o.name.as_str())
        .chain(last)
        .collect()
}

fn unescape(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Substitutes `${key}` placeholders, at most
/// [`MAX_PLACEHOLDER_ITERATIONS`] rounds. Unknown keys are left in place.
pub fn resolve_placeholders(value: &str, properties: &HashMap<String, String>) -> String {
    let mut current = value.to_string();
    for _ in 0..MAX_PLACEHOLDER_ITERATIONS {
        if !current.contains("${") {
            break;
        }
        let next = placeholder()
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                properties
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Name of the property when `value` is exactly one `${name}` reference.
pub fn property_reference(value: &str) -> Option<&str> {
    sole_placeholder()
        .captures(value.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

impl PomModel {
    pub fn effective_group_id(&self) -> Option<&str> {
        self.group_id
            .as_deref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.group_id.as_deref()))
    }

    pub fn effective_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.version.as_deref()))
    }

    /// Module name: the artifact id, else the containing directory's name.
    pub fn module_name(&self, pom_file: &Path) -> String {
        self.artifact_id.clone().unwrap_or_else(|| {
            pom_file
                .parent()
                .and_then(|d| d.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    /// Property table used for `${...}` substitution.
    ///
    /// `parents` is the parent chain, nearest first. Child properties override
    /// inherited ones; `project.*`/`pom.*` coordinates are always present when
    /// known.
    pub fn property_table(&self, parents: &[Self]) -> HashMap<String, String> {
        let mut table = HashMap::new();
        for parent in parents.iter().rev() {
            for (key, value) in &parent.properties {
                table.insert(key.clone(), value.value.clone());
            }
        }
        for (key, value) in &self.properties {
            table.insert(key.clone(), value.value.clone());
        }

        let group_id = self
            .effective_group_id()
            .or_else(|| parents.first().and_then(Self::effective_group_id));
        let version = self
            .effective_version()
            .or_else(|| parents.first().and_then(Self::effective_version));
        let coordinates = [
            ("groupId", group_id),
            ("artifactId", self.artifact_id.as_deref()),
            ("version", version),
        ];
        for (field, value) in coordinates {
            if let Some(value) = value {
                table.insert(format!("project.{field}"), value.to_string());
                table.insert(format!("pom.{field}"), value.to_string());
            }
        }
        if let Some(parent) = &self.parent {
            let parent_fields = [
                ("groupId", &parent.group_id),
                ("artifactId", &parent.artifact_id),
                ("version", &parent.version),
            ];
            for (field, value) in parent_fields {
                if let Some(value) = value {
                    table.insert(format!("project.parent.{field}"), value.clone());
                }
            }
        }
        table
    }

    /// Builds installed records, resolving versions against the property table.
    pub fn to_records(&self, pom_file: &Path, parents: &[Self]) -> PomRecords {
        let table = self.property_table(parents);
        let module_name = self.module_name(pom_file);

        let dependencies = self
            .dependencies
            .iter()
            .map(|dep| {
                let (version, version_ref) = resolve_version(dep.version.as_ref(), &table);
                let configuration = if dep.managed {
                    "dependencyManagement".to_string()
                } else {
                    dep.scope.clone().unwrap_or_else(|| "compile".to_string())
                };
                let mut record = InstalledDependency::new(
                    Coordinate::new(
                        resolve_placeholders(&dep.group_id, &table),
                        resolve_placeholders(&dep.artifact_id, &table),
                        version,
                    ),
                    configuration,
                    module_name.clone(),
                    pom_file,
                )
                .with_span(dep.element.span())
                .with_version_ref(version_ref);
                record.exclusions.clone_from(&dep.exclusions);
                record
            })
            .collect();

        let plugins = self
            .plugins
            .iter()
            .map(|plugin| {
                let (version, version_ref) = resolve_version(plugin.version.as_ref(), &table);
                MavenInstalledPlugin {
                    group_id: resolve_placeholders(plugin.effective_group_id(), &table),
                    artifact_id: plugin.artifact_id.clone(),
                    version,
                    version_ref,
                    module_name: module_name.clone(),
                    pom_file: pom_file.to_path_buf(),
                    span: Some(plugin.element.span()),
                    phase: plugin.phase.clone(),
                    goals: plugin.goals.clone(),
                    inherited: plugin.inherited,
                    from_plugin_management: plugin.from_plugin_management,
                    configuration: plugin
                        .configuration
                        .iter()
                        .map(|(k, v)| (k.clone(), resolve_placeholders(v, &table)))
                        .collect(),
                }
            })
            .collect();

        PomRecords {
            module_name,
            dependencies,
            plugins,
        }
    }

    /// Finds a build plugin, preferring `<build><plugins>` over
    /// `<pluginManagement>`.
    pub fn find_plugin(&self, group_id: &str, artifact_id: &str) -> Option<&PomPlugin> {
        self.plugins
            .iter()
            .filter(|p| p.matches(group_id, artifact_id))
            .min_by_key(|p| p.from_plugin_management)
    }

    /// Finds a dependency, preferring `<dependencies>` over
    /// `<dependencyManagement>`.
    pub fn find_dependency(&self, group_id: &str, artifact_id: &str) -> Option<&PomDependency> {
        self.dependencies
            .iter()
            .filter(|d| d.group_id == group_id && d.artifact_id == artifact_id)
            .min_by_key(|d| d.managed)
    }
}

fn resolve_version(
    raw: Option<&PomValue>,
    table: &HashMap<String, String>,
) -> (Option<String>, VersionRef) {
    let Some(raw) = raw else {
        return (None, VersionRef::Literal);
    };
    let version_ref = property_reference(&raw.value)
        .map_or(VersionRef::Literal, |name| VersionRef::Property(name.to_string()));
    let resolved = resolve_placeholders(&raw.value, table);
    let version = (!resolved.contains("${") && !resolved.is_empty()).then_some(resolved);
    (version, version_ref)
}

/// Loads the on-disk parent chain of `model` (nearest first) through
/// `<relativePath>`, stopping at the first parent that is missing or whose
/// artifact id does not match.
pub fn load_parent_chain(pom_file: &Path, model: &PomModel) -> Vec<PomModel> {
    let mut chain: Vec<PomModel> = Vec::new();
    let mut current_file = pom_file.to_path_buf();
    let mut parent_ref = model.parent.clone();

    while let Some(parent) = parent_ref.take() {
        if chain.len() >= MAX_PARENT_DEPTH {
            tracing::debug!("Parent chain of {} truncated", pom_file.display());
            break;
        }
        let Some(path) = parent_pom_path(&current_file, &parent) else {
            break;
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!("Parent POM {} not readable: {}", path.display(), e);
                break;
            }
        };
        let parent_model = match parse_pom(&content) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Failed to parse parent POM {}: {}", path.display(), e);
                break;
            }
        };
        if let (Some(expected), Some(found)) = (&parent.artifact_id, &parent_model.artifact_id)
            && expected != found
        {
            tracing::debug!(
                "{} is {} rather than parent {}",
                path.display(),
                found,
                expected
            );
            break;
        }

        parent_ref = parent_model.parent.clone();
        current_file = path;
        chain.push(parent_model);
    }
    chain
}

fn parent_pom_path(pom_file: &Path, parent: &ParentRef) -> Option<PathBuf> {
    let relative = parent
        .relative_path
        .as_deref()
        .unwrap_or(DEFAULT_RELATIVE_PATH)
        .trim();
    if relative.is_empty() {
        return None;
    }
    let mut path = pom_file.parent()?.join(relative);
    if path.is_dir() {
        path.push("pom.xml");
    }
    path.is_file().then_some(path)
}

/// Parses a POM file and turns it into records, consulting parent POMs on
/// disk for inherited properties.
pub fn scan_pom(pom_file: &Path, content: &str) -> Result<PomRecords> {
    let model = parse_pom(content)?;
    let parents = load_parent_chain(pom_file, &model);
    let records = model.to_records(pom_file, &parents);
    tracing::debug!(
        "{}: {} dependencies, {} plugins",
        pom_file.display(),
        records.dependencies.len(),
        records.plugins.len()
    );
    Ok(records)
}
