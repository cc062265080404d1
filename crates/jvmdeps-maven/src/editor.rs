//! Text patches for `<plugin>` and `<dependency>` blocks in a POM.
//!
//! Blocks are located through [`parse_pom`] on the current text, so spans
//! are always fresh. Edits splice only the located block; the rest of the
//! file keeps its formatting byte for byte. Every operation returns the full
//! new text, or `None` when there is nothing to change.

use crate::parser::{
    ElementSpan, PomDependency, PomModel, PomPlugin, PomValue, parse_pom, property_reference,
    resolve_placeholders,
};
use jvmdeps_core::edit::{
    indent_unit, insert_at, line_indent, line_start, remove_span, replace_span, starts_line,
};
use jvmdeps_core::{Coordinate, DependencyExclusion, InstalledDependency, MavenInstalledPlugin};
use quick_xml::escape::escape;

/// Lines of a generated block, each with its nesting depth.
type Lines = Vec<(usize, String)>;

fn parse(text: &str) -> Option<PomModel> {
    parse_pom(text)
        .map_err(|e| tracing::warn!("Cannot edit POM: {}", e))
        .ok()
}

fn leaf(depth: usize, name: &str, value: &str) -> (usize, String) {
    (depth, format!("<{name}>{}</{name}>", escape(value)))
}

fn nest(lines: Lines, by: usize) -> Lines {
    lines.into_iter().map(|(d, l)| (d + by, l)).collect()
}

fn wrap(name: &str, inner: Lines) -> Lines {
    let mut lines = vec![(0, format!("<{name}>"))];
    lines.extend(nest(inner, 1));
    lines.push((0, format!("</{name}>")));
    lines
}

fn render(lines: &[(usize, String)], base: &str, unit: &str) -> String {
    lines
        .iter()
        .map(|(depth, line)| format!("{base}{}{line}", unit.repeat(*depth)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inserts `lines` as the last children of `parent`.
fn insert_before_close(text: &str, parent: ElementSpan, lines: &Lines) -> Option<String> {
    let unit = indent_unit(text);
    let parent_indent = line_indent(text, parent.start).to_string();
    let child_indent = format!("{parent_indent}{unit}");
    let block = render(lines, &child_indent, &unit);

    if parent.close_start == parent.end {
        // Self-closing element: nothing to insert into.
        return None;
    }
    if starts_line(text, parent.close_start) {
        insert_at(text, line_start(text, parent.close_start), &format!("{block}\n"))
    } else {
        insert_at(
            text,
            parent.close_start,
            &format!("\n{block}\n{parent_indent}"),
        )
    }
}

/// Inserts `lines` as a sibling placed before `element`.
fn insert_before(text: &str, element: ElementSpan, lines: &Lines) -> Option<String> {
    let unit = indent_unit(text);
    let indent = line_indent(text, element.start).to_string();
    let block = render(lines, &indent, &unit);
    if starts_line(text, element.start) {
        insert_at(text, line_start(text, element.start), &format!("{block}\n"))
    } else {
        insert_at(text, element.start, &format!("{}\n{indent}", block.trim_start()))
    }
}

fn locate_plugin<'a>(model: &'a PomModel, plugin: &MavenInstalledPlugin) -> Option<&'a PomPlugin> {
    let candidates: Vec<&PomPlugin> = model
        .plugins
        .iter()
        .filter(|p| {
            p.matches(&plugin.group_id, &plugin.artifact_id)
                && p.from_plugin_management == plugin.from_plugin_management
        })
        .collect();
    plugin
        .span
        .and_then(|span| candidates.iter().find(|p| p.element.span() == span))
        .or_else(|| candidates.first())
        .copied()
}

fn locate_dependency<'a>(
    model: &'a PomModel,
    dep: &InstalledDependency,
) -> Option<&'a PomDependency> {
    let managed = dep.configuration == "dependencyManagement";
    let table = model.property_table(&[]);
    let candidates: Vec<&PomDependency> = model
        .dependencies
        .iter()
        .filter(|d| {
            d.managed == managed
                && resolve_placeholders(&d.group_id, &table) == dep.coordinate.group_id
                && resolve_placeholders(&d.artifact_id, &table) == dep.coordinate.artifact_id
        })
        .collect();
    dep.span
        .and_then(|span| candidates.iter().find(|d| d.element.span() == span))
        .or_else(|| candidates.first())
        .copied()
}

/// Rewrites a version value, following a `${property}` reference into the
/// same file's `<properties>` when the version is property-backed.
fn rewrite_version(
    text: &str,
    model: &PomModel,
    raw: &PomValue,
    new_version: &str,
) -> Option<String> {
    let target = match property_reference(&raw.value) {
        Some(name) => {
            let Some(property) = model.properties.get(name) else {
                tracing::debug!("Property {} is not declared in this POM", name);
                return None;
            };
            property
        }
        None => raw,
    };
    if target.value == new_version {
        return None;
    }
    replace_span(text, target.span, &escape(new_version))
}

/// Sets a plugin's version. Inserts `<version>` after `<artifactId>` when the
/// plugin has none.
pub fn update_plugin_version(
    text: &str,
    plugin: &MavenInstalledPlugin,
    new_version: &str,
) -> Option<String> {
    let model = parse(text)?;
    let located = locate_plugin(&model, plugin)?;

    if let Some(raw) = &located.version {
        return rewrite_version(text, &model, raw, new_version);
    }

    let artifact = located.artifact_id_element;
    let version_tag = format!("<version>{}</version>", escape(new_version));
    if starts_line(text, artifact.start) {
        let indent = line_indent(text, artifact.start);
        insert_at(text, artifact.end, &format!("\n{indent}{version_tag}"))
    } else {
        insert_at(text, artifact.end, &version_tag)
    }
}

pub fn remove_plugin(text: &str, plugin: &MavenInstalledPlugin) -> Option<String> {
    let model = parse(text)?;
    let located = locate_plugin(&model, plugin)?;
    remove_span(text, located.element.span())
}

/// Adds a plugin to `<build><plugins>`, creating `<plugins>` and `<build>`
/// when missing. `None` when the plugin is already declared there.
pub fn add_plugin(
    text: &str,
    group_id: &str,
    artifact_id: &str,
    version: Option<&str>,
) -> Option<String> {
    let model = parse(text)?;
    if model
        .plugins
        .iter()
        .any(|p| !p.from_plugin_management && p.matches(group_id, artifact_id))
    {
        return None;
    }

    let mut inner = vec![leaf(0, "groupId", group_id), leaf(0, "artifactId", artifact_id)];
    if let Some(v) = version {
        inner.push(leaf(0, "version", v));
    }
    let plugin = wrap("plugin", inner);

    if let Some(plugins) = model.build_plugins_element {
        insert_before_close(text, plugins, &plugin)
    } else if let Some(build) = model.build_element {
        insert_before_close(text, build, &wrap("plugins", plugin))
    } else {
        insert_before_close(
            text,
            model.project_element,
            &wrap("build", wrap("plugins", plugin)),
        )
    }
}

/// Replaces the plugin's `<configuration>` with a flat list of children, or
/// inserts one. Empty `entries` removes the block.
pub fn set_plugin_configuration(
    text: &str,
    plugin: &MavenInstalledPlugin,
    entries: &[(String, String)],
) -> Option<String> {
    let model = parse(text)?;
    let located = locate_plugin(&model, plugin)?;

    if entries.is_empty() {
        return located
            .configuration_element
            .and_then(|config| remove_span(text, config.span()));
    }

    let lines = wrap(
        "configuration",
        entries.iter().map(|(k, v)| leaf(0, k, v)).collect(),
    );
    match located.configuration_element {
        Some(config) => {
            let unit = indent_unit(text);
            let indent = line_indent(text, config.start);
            let rendered = render(&lines, indent, &unit);
            let replacement = rendered.trim_start();
            if config.span().slice(text).ok()? == replacement {
                return None;
            }
            replace_span(text, config.span(), replacement)
        }
        None => insert_before_close(text, located.element, &lines),
    }
}

/// Sets a dependency's version. `None` when the dependency has no
/// `<version>` (managed elsewhere) or already has `new_version`.
pub fn update_dependency_version(
    text: &str,
    dep: &InstalledDependency,
    new_version: &str,
) -> Option<String> {
    let model = parse(text)?;
    let located = locate_dependency(&model, dep)?;
    let raw = located.version.as_ref()?;
    rewrite_version(text, &model, raw, new_version)
}

pub fn remove_dependency(text: &str, dep: &InstalledDependency) -> Option<String> {
    let model = parse(text)?;
    let located = locate_dependency(&model, dep)?;
    remove_span(text, located.element.span())
}

/// Adds a dependency to the project's `<dependencies>`, creating the block
/// before `<build>` (or at the end of `<project>`) when missing.
pub fn add_dependency(text: &str, coordinate: &Coordinate, scope: Option<&str>) -> Option<String> {
    let model = parse(text)?;
    if model.dependencies.iter().any(|d| {
        !d.managed
            && d.group_id == coordinate.group_id
            && d.artifact_id == coordinate.artifact_id
    }) {
        return None;
    }

    let mut inner = vec![
        leaf(0, "groupId", &coordinate.group_id),
        leaf(0, "artifactId", &coordinate.artifact_id),
    ];
    if let Some(v) = &coordinate.version {
        inner.push(leaf(0, "version", v));
    }
    if let Some(scope) = scope.filter(|s| *s != "compile") {
        inner.push(leaf(0, "scope", scope));
    }
    let dependency = wrap("dependency", inner);

    match (model.dependencies_element, model.build_element) {
        (Some(deps), _) => insert_before_close(text, deps, &dependency),
        (None, Some(build)) => insert_before(text, build, &wrap("dependencies", dependency)),
        (None, None) => insert_before_close(
            text,
            model.project_element,
            &wrap("dependencies", dependency),
        ),
    }
}

/// Adds an `<exclusion>` to a dependency, creating `<exclusions>` if needed.
/// A wildcard exclusion is written with `<artifactId>*</artifactId>`.
pub fn add_exclusion(
    text: &str,
    dep: &InstalledDependency,
    exclusion: &DependencyExclusion,
) -> Option<String> {
    let model = parse(text)?;
    let located = locate_dependency(&model, dep)?;
    if located.exclusions.contains(exclusion) {
        return None;
    }

    let lines = wrap(
        "exclusion",
        vec![
            leaf(0, "groupId", &exclusion.group_id),
            leaf(0, "artifactId", exclusion.artifact_id.as_deref().unwrap_or("*")),
        ],
    );
    match located.exclusions_element {
        Some(exclusions) => insert_before_close(text, exclusions, &lines),
        None => insert_before_close(text, located.element, &wrap("exclusions", lines)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::scan_pom;
    use jvmdeps_core::DEFAULT_MAVEN_PLUGIN_GROUP;
    use std::path::Path;

    const POM: &str = r"<project>
    <artifactId>demo</artifactId>
    <properties>
        <my.plugin.version>3.2</my.plugin.version>
    </properties>
    <dependencies>
        <dependency>
            <groupId>com.google.guava</groupId>
            <artifactId>guava</artifactId>
            <version>31.0-jre</version>
        </dependency>
        <dependency>
            <groupId>com.google.guava</groupId>
            <artifactId>failureaccess</artifactId>
            <version>31.0-jre</version>
        </dependency>
    </dependencies>
    <build>
        <plugins>
            <plugin>
                <artifactId>maven-compiler-plugin</artifactId>
                <version>${my.plugin.version}</version>
            </plugin>
            <plugin>
                <artifactId>maven-surefire-plugin</artifactId>
            </plugin>
        </plugins>
    </build>
</project>
";

    fn records(text: &str) -> crate::parser::PomRecords {
        scan_pom(Path::new("/nonexistent/demo/pom.xml"), text).unwrap()
    }

    fn plugin(text: &str, artifact: &str) -> MavenInstalledPlugin {
        records(text)
            .plugins
            .into_iter()
            .find(|p| p.artifact_id == artifact)
            .unwrap()
    }

    fn dependency(text: &str, artifact: &str) -> InstalledDependency {
        records(text)
            .dependencies
            .into_iter()
            .find(|d| d.coordinate.artifact_id == artifact)
            .unwrap()
    }

    #[test]
    fn test_update_property_backed_plugin_version() {
        let compiler = plugin(POM, "maven-compiler-plugin");
        let updated = update_plugin_version(POM, &compiler, "3.11.0").unwrap();
        assert!(updated.contains("<my.plugin.version>3.11.0</my.plugin.version>"));
        assert!(updated.contains("<version>${my.plugin.version}</version>"));
    }

    #[test]
    fn test_update_inserts_missing_version() {
        let surefire = plugin(POM, "maven-surefire-plugin");
        let updated = update_plugin_version(POM, &surefire, "3.2.2").unwrap();
        assert!(updated.contains(
            "                <artifactId>maven-surefire-plugin</artifactId>\n                <version>3.2.2</version>\n            </plugin>"
        ));
    }

    #[test]
    fn test_update_dependency_touches_only_its_block() {
        let guava = dependency(POM, "guava");
        let updated = update_dependency_version(POM, &guava, "32.1.3-jre").unwrap();
        assert_eq!(updated, POM.replacen("31.0-jre", "32.1.3-jre", 1));
        let untouched = "<artifactId>failureaccess</artifactId>\n            <version>31.0-jre</version>";
        assert!(updated.contains(untouched));
    }

    #[test]
    fn test_update_same_version_is_noop() {
        let guava = dependency(POM, "guava");
        assert_eq!(update_dependency_version(POM, &guava, "31.0-jre"), None);
    }

    #[test]
    fn test_remove_plugin_leaves_no_blank_line() {
        let surefire = plugin(POM, "maven-surefire-plugin");
        let updated = remove_plugin(POM, &surefire).unwrap();
        assert!(!updated.contains("maven-surefire-plugin"));
        assert!(updated.contains("            </plugin>\n        </plugins>"));
    }

    #[test]
    fn test_add_then_remove_plugin_round_trip() {
        let added =
            add_plugin(POM, "org.codehaus.mojo", "exec-maven-plugin", Some("3.1.0")).unwrap();
        assert!(added.contains(
            "            <plugin>\n                <groupId>org.codehaus.mojo</groupId>\n                <artifactId>exec-maven-plugin</artifactId>\n                <version>3.1.0</version>\n            </plugin>\n        </plugins>"
        ));
        let exec = plugin(&added, "exec-maven-plugin");
        assert_eq!(remove_plugin(&added, &exec).unwrap(), POM);
    }

    #[test]
    fn test_add_existing_plugin_is_noop() {
        assert_eq!(
            add_plugin(POM, DEFAULT_MAVEN_PLUGIN_GROUP, "maven-compiler-plugin", None),
            None
        );
    }

    #[test]
    fn test_add_plugin_creates_build_section() {
        let pom = "<project>\n  <artifactId>x</artifactId>\n</project>\n";
        let updated = add_plugin(pom, "g", "p", None).unwrap();
        assert_eq!(
            updated,
            "<project>\n  <artifactId>x</artifactId>\n  <build>\n    <plugins>\n      <plugin>\n        <groupId>g</groupId>\n        <artifactId>p</artifactId>\n      </plugin>\n    </plugins>\n  </build>\n</project>\n"
        );
    }

    #[test]
    fn test_set_configuration_insert_and_replace() {
        let surefire = plugin(POM, "maven-surefire-plugin");
        let entries = vec![("skipTests".to_string(), "true".to_string())];
        let inserted = set_plugin_configuration(POM, &surefire, &entries).unwrap();
        assert!(inserted.contains(
            "                <configuration>\n                    <skipTests>true</skipTests>\n                </configuration>\n            </plugin>"
        ));

        let surefire = plugin(&inserted, "maven-surefire-plugin");
        let entries = vec![
            ("skipTests".to_string(), "false".to_string()),
            ("argLine".to_string(), "-Xmx1g <x>".to_string()),
        ];
        let replaced = set_plugin_configuration(&inserted, &surefire, &entries).unwrap();
        assert!(replaced.contains("<skipTests>false</skipTests>"));
        assert!(replaced.contains("<argLine>-Xmx1g &lt;x&gt;</argLine>"));
        assert_eq!(replaced.matches("<configuration>").count(), 1);

        let surefire = plugin(&replaced, "maven-surefire-plugin");
        assert_eq!(set_plugin_configuration(&replaced, &surefire, &[]).unwrap(), POM);
    }

    #[test]
    fn test_add_and_remove_dependency() {
        let coordinate = Coordinate::new("org.slf4j", "slf4j-api", Some("2.0.9".into()));
        let added = add_dependency(POM, &coordinate, Some("runtime")).unwrap();
        assert!(added.contains(
            "        <dependency>\n            <groupId>org.slf4j</groupId>\n            <artifactId>slf4j-api</artifactId>\n            <version>2.0.9</version>\n            <scope>runtime</scope>\n        </dependency>\n    </dependencies>"
        ));
        assert_eq!(add_dependency(&added, &coordinate, None), None);

        let slf4j = dependency(&added, "slf4j-api");
        assert_eq!(remove_dependency(&added, &slf4j).unwrap(), POM);
    }

    #[test]
    fn test_add_dependency_creates_block_before_build() {
        let pom = "<project>\n  <build>\n  </build>\n</project>\n";
        let coordinate = Coordinate::new("g", "a", Some("1".into()));
        let updated = add_dependency(pom, &coordinate, None).unwrap();
        assert!(updated.starts_with(
            "<project>\n  <dependencies>\n    <dependency>\n      <groupId>g</groupId>"
        ));
        assert!(updated.contains("  </dependencies>\n  <build>"));
    }

    #[test]
    fn test_add_exclusion() {
        let guava = dependency(POM, "guava");
        let exclusion = DependencyExclusion::wildcard("com.google.code.findbugs");
        let updated = add_exclusion(POM, &guava, &exclusion).unwrap();
        assert!(updated.contains(
            "            <exclusions>\n                <exclusion>\n                    <groupId>com.google.code.findbugs</groupId>\n                    <artifactId>*</artifactId>\n                </exclusion>\n            </exclusions>\n        </dependency>"
        ));

        let guava = dependency(&updated, "guava");
        assert_eq!(guava.exclusions, vec![exclusion.clone()]);
        assert_eq!(add_exclusion(&updated, &guava, &exclusion), None);

        let second = DependencyExclusion::new("org.checkerframework", "checker-qual");
        let twice = add_exclusion(&updated, &guava, &second).unwrap();
        assert_eq!(twice.matches("<exclusions>").count(), 1);
        assert_eq!(twice.matches("<exclusion>").count(), 2);
    }

    #[test]
    fn test_malformed_pom_yields_none() {
        let surefire = plugin(POM, "maven-surefire-plugin");
        assert_eq!(remove_plugin("<project><build>", &surefire), None);
    }
}
