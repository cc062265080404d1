//! In-place edits of Gradle build scripts.
//!
//! Every function returns the complete new text, or `None` when nothing can
//! be changed: the span is stale, the version token is missing, the entry is
//! already present or there is nothing to remove.

use crate::lexer::{Block, MaskedText};
use crate::parser::catalog;
use crate::parser::plugins::id_call_len;
use crate::parser::variables::collect_definitions;
use jvmdeps_core::edit::{
    indent_unit, insert_at, line_indent, line_start, remove_span, replace_in_span, replace_span,
    starts_line,
};
use jvmdeps_core::{
    Coordinate, DependencyExclusion, DslFlavor, InstalledDependency, InstalledPlugin,
    PluginSyntax, Span, VersionRef, strip_quotes,
};

/// Deletes a declaration together with its indentation and line break.
pub fn remove_declaration(text: &str, span: Span) -> Option<String> {
    remove_span(text, span)
}

/// Replaces the first `old` inside `span` with `new`.
pub fn update_version(text: &str, span: Span, old: &str, new: &str) -> Option<String> {
    if old == new {
        return None;
    }
    replace_in_span(text, span, old, new)
}

fn indent_lines(statement: &str, indent: &str) -> String {
    statement
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `header {` + indented statement + `}`.
pub(crate) fn nest(header: &str, statement: &str, unit: &str) -> String {
    format!("{header} {{\n{}\n}}", indent_lines(statement, unit))
}

/// Inserts `statement` as the last entry of `block`, one indentation level
/// deeper than the block's own line.
pub(crate) fn insert_into_block(text: &str, block: &Block, statement: &str) -> Option<String> {
    let outer = line_indent(text, block.start);
    let inner = format!("{outer}{}", indent_unit(text));
    let indented = indent_lines(statement, &inner);

    if starts_line(text, block.close) {
        insert_at(text, line_start(text, block.close), &format!("{indented}\n"))
    } else {
        // `name { }` or a closing brace sharing a line with code
        let before = text[..block.close].trim_end_matches([' ', '\t']).len();
        replace_span(
            text,
            Span::from_bounds(before, block.close),
            &format!("\n{indented}\n{outer}"),
        )
    }
}

/// Appends a new top-level block, separated by a blank line.
pub(crate) fn append_block(text: &str, block: &str) -> String {
    let mut out = text.to_string();
    if !out.is_empty() {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        if !out.ends_with("\n\n") {
            out.push('\n');
        }
    }
    out.push_str(block);
    out.push('\n');
    out
}

pub fn dependency_statement(
    flavor: DslFlavor,
    coordinate: &Coordinate,
    configuration: &str,
) -> String {
    let notation = flavor.quote(&coordinate.full_name());
    match flavor {
        DslFlavor::Kotlin => format!("{configuration}({notation})"),
        DslFlavor::Groovy => format!("{configuration} {notation}"),
    }
}

/// Whether the top-level `dependencies { }` already names `group:artifact`.
fn declares(text: &str, masked: &MaskedText, block: &Block, id: &str) -> bool {
    let prefix = format!("{id}:");
    masked
        .strings()
        .iter()
        .filter(|r| block.contains(r.start))
        .map(|r| strip_quotes(&text[r.clone()]))
        .any(|s| s == id || s.starts_with(&prefix))
}

/// Adds a dependency to the top-level `dependencies { }` block, creating the
/// block at the end of the file when missing.
pub fn add_dependency(
    text: &str,
    flavor: DslFlavor,
    coordinate: &Coordinate,
    configuration: &str,
) -> Option<String> {
    let statement = dependency_statement(flavor, coordinate, configuration);
    let masked = MaskedText::new(text);

    match masked.top_level_block("dependencies") {
        Some(block) => {
            if declares(text, &masked, &block, &coordinate.id()) {
                tracing::debug!("{} already declared", coordinate.id());
                return None;
            }
            insert_into_block(text, &block, &statement)
        }
        None => Some(append_block(
            text,
            &nest("dependencies", &statement, &indent_unit(text)),
        )),
    }
}

pub fn remove_dependency(text: &str, dependency: &InstalledDependency) -> Option<String> {
    remove_declaration(text, dependency.span?)
}

/// Sets a dependency's version where it is written: the literal inside the
/// declaration or the variable's definition in the same script.
///
/// Catalog-backed versions live in `libs.versions.toml`; see
/// [`update_catalog_version`]. Versions coming from `gradle.properties` or
/// another script cannot be edited here.
pub fn update_dependency_version(
    text: &str,
    dependency: &InstalledDependency,
    new_version: &str,
) -> Option<String> {
    match &dependency.version_ref {
        VersionRef::Literal => {
            update_version(text, dependency.span?, dependency.version()?, new_version)
        }
        VersionRef::Variable(name) => {
            let masked = MaskedText::new(text);
            let definition = collect_definitions(&masked)
                .into_iter()
                .rev()
                .find(|d| d.name == *name)?;
            if definition.value == new_version {
                return None;
            }
            replace_span(text, definition.value_span, new_version)
        }
        VersionRef::Catalog(_) | VersionRef::Property(_) => None,
    }
}

/// Rewrites the version of a catalog-backed dependency in the catalog text.
pub fn update_catalog_version(
    catalog_text: &str,
    dependency: &InstalledDependency,
    new_version: &str,
) -> Option<String> {
    catalog::update_version(catalog_text, dependency.catalog_key.as_deref()?, new_version)
}

pub fn plugin_statement(flavor: DslFlavor, plugin_id: &str, version: Option<&str>) -> String {
    let id = flavor.quote(plugin_id);
    let call = match flavor {
        DslFlavor::Kotlin => format!("id({id})"),
        DslFlavor::Groovy => format!("id {id}"),
    };
    match version {
        Some(v) => format!("{call} version {}", flavor.quote(v)),
        None => call,
    }
}

/// Adds `id(...)` to `plugins { }`. A missing block is created after
/// `buildscript { }` when present, else at the top of the file.
pub fn add_plugin(
    text: &str,
    flavor: DslFlavor,
    plugin_id: &str,
    version: Option<&str>,
) -> Option<String> {
    let statement = plugin_statement(flavor, plugin_id, version);
    let masked = MaskedText::new(text);

    if let Some(block) = masked.top_level_block("plugins") {
        let present = masked
            .strings()
            .iter()
            .filter(|r| block.contains(r.start))
            .any(|r| strip_quotes(&text[r.clone()]) == plugin_id);
        if present {
            return None;
        }
        return insert_into_block(text, &block, &statement);
    }

    let block = nest("plugins", &statement, &indent_unit(text));
    match masked.top_level_block("buildscript") {
        Some(buildscript) => insert_at(text, buildscript.end(), &format!("\n\n{block}")),
        None if text.is_empty() => Some(format!("{block}\n")),
        None => Some(format!("{block}\n\n{text}")),
    }
}

/// Sets a plugin's version, adding ` version "x"` after the id call when the
/// declaration has none. Core plugins (shorthand and legacy forms) are not
/// versioned.
pub fn update_plugin_version(
    text: &str,
    plugin: &InstalledPlugin,
    new_version: &str,
) -> Option<String> {
    let span = plugin.span?;
    if let Some(old) = &plugin.version {
        return update_version(text, span, old, new_version);
    }

    match plugin.syntax {
        PluginSyntax::IdOnly | PluginSyntax::GroovyIdOnly | PluginSyntax::KotlinShorthand => {
            let flavor = DslFlavor::from_path(&plugin.build_file);
            let statement = span.slice(text).ok()?;
            let at = span.offset + id_call_len(statement)?;
            insert_at(text, at, &format!(" version {}", flavor.quote(new_version)))
        }
        _ => None,
    }
}

pub fn remove_plugin(text: &str, plugin: &InstalledPlugin) -> Option<String> {
    remove_declaration(text, plugin.span?)
}

pub fn exclusion_statement(flavor: DslFlavor, exclusion: &DependencyExclusion) -> String {
    let quote = |s: &str| flavor.quote(s);
    match (flavor, &exclusion.artifact_id) {
        (DslFlavor::Kotlin, Some(module)) => format!(
            "exclude(group = {}, module = {})",
            quote(&exclusion.group_id),
            quote(module)
        ),
        (DslFlavor::Kotlin, None) => format!("exclude(group = {})", quote(&exclusion.group_id)),
        (DslFlavor::Groovy, Some(module)) => format!(
            "exclude group: {}, module: {}",
            quote(&exclusion.group_id),
            quote(module)
        ),
        (DslFlavor::Groovy, None) => format!("exclude group: {}", quote(&exclusion.group_id)),
    }
}

/// Appends an exclude statement to the declaration's closure, creating the
/// closure when the declaration has none.
pub fn add_exclusion(
    text: &str,
    dependency: &InstalledDependency,
    exclusion: &DependencyExclusion,
) -> Option<String> {
    if dependency.exclusions.contains(exclusion) {
        return None;
    }
    let span = dependency.span?;
    let declaration = span.slice(text).ok()?;
    let flavor = DslFlavor::from_path(&dependency.build_file);
    let statement = exclusion_statement(flavor, exclusion);

    let masked = MaskedText::new(text);
    if declaration.ends_with('}') {
        let open = (span.offset..span.end())
            .find(|&i| masked.as_str().as_bytes()[i] == b'{' && !masked.in_string(i))?;
        let close = masked.matching(open)?;
        let block = Block {
            start: span.offset,
            open,
            close,
        };
        return insert_into_block(text, &block, &statement);
    }

    // Groovy `implementation 'g:a:v'` needs parentheses to take a closure.
    let args = declaration.get(dependency.configuration.len()..)?.trim();
    let call = if args.starts_with('(') {
        format!("{}{args}", dependency.configuration)
    } else {
        format!("{}({args})", dependency.configuration)
    };
    let outer = line_indent(text, span.offset);
    let inner = format!("{outer}{}", indent_unit(text));
    replace_span(
        text,
        span,
        &format!("{call} {{\n{inner}{statement}\n{outer}}}"),
    )
}

fn is_literal(value: &str) -> bool {
    value == "true"
        || value == "false"
        || value.parse::<f64>().is_ok()
        || (value.ends_with(['L', 'f']) && value[..value.len() - 1].parse::<f64>().is_ok())
}

/// Quotes `value` unless it is a boolean or number, already quoted, or an
/// expression.
pub fn config_value(flavor: DslFlavor, value: &str) -> String {
    let trimmed = value.trim();
    let quoted = trimmed.len() >= 2 && strip_quotes(trimmed).len() + 2 == trimmed.len();
    if is_literal(trimmed) || quoted || trimmed.contains('(') {
        trimmed.to_string()
    } else {
        flavor.quote(trimmed)
    }
}

fn extension_block(
    flavor: DslFlavor,
    name: &str,
    entries: &[(String, String)],
    unit: &str,
) -> String {
    let body: Vec<String> = entries
        .iter()
        .map(|(key, value)| {
            if key.contains('(') {
                key.clone()
            } else {
                format!("{key} = {}", config_value(flavor, value))
            }
        })
        .collect();
    if body.is_empty() {
        return format!("{name} {{\n}}");
    }
    nest(name, &body.join("\n"), unit)
}

/// Span of the top-level `name { }` extension block.
pub fn find_extension_block(text: &str, name: &str) -> Option<Span> {
    MaskedText::new(text)
        .top_level_block(name)
        .map(|b| b.span())
}

/// Writes a plugin extension block such as `jacoco { toolVersion = "0.8.11" }`.
///
/// `previous_span` is the block written last time; when absent, an existing
/// top-level block of the same name is replaced. New blocks go after
/// `plugins { }`, else at the end of the file.
pub fn set_extension_config(
    text: &str,
    flavor: DslFlavor,
    name: &str,
    previous_span: Option<Span>,
    entries: &[(String, String)],
) -> Option<String> {
    let masked = MaskedText::new(text);
    let unit = indent_unit(text);
    let block = extension_block(flavor, name, entries, &unit);

    let existing = previous_span
        .filter(|s| s.slice(text).is_ok_and(|t| t.starts_with(name)))
        .or_else(|| masked.top_level_block(name).map(|b| b.span()));

    let updated = match (existing, masked.top_level_block("plugins")) {
        (Some(span), _) => {
            let outer = line_indent(text, span.offset).to_string();
            let reindented = block.replace('\n', &format!("\n{outer}"));
            replace_span(text, span, &reindented)?
        }
        (None, Some(plugins)) => insert_at(text, plugins.end(), &format!("\n\n{block}"))?,
        (None, None) => append_block(text, &block),
    };
    (updated != text).then_some(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ScanContext, parse_build_file};
    use std::path::Path;

    const KTS: &str = "/p/app/build.gradle.kts";
    const GROOVY: &str = "/p/app/build.gradle";

    fn dependencies(path: &str, text: &str) -> Vec<InstalledDependency> {
        parse_build_file(Path::new(path), text, &ScanContext::new("app"))
            .unwrap()
            .dependencies
    }

    fn plugins(path: &str, text: &str) -> Vec<InstalledPlugin> {
        parse_build_file(Path::new(path), text, &ScanContext::new("app"))
            .unwrap()
            .plugins
    }

    #[test]
    fn test_update_guava_version() {
        let text = "dependencies {\n    implementation(\"com.google.guava:guava:31.0-jre\")\n}\n";
        let deps = dependencies(KTS, text);
        let updated = update_dependency_version(text, &deps[0], "32.1.3-jre").unwrap();
        assert_eq!(
            updated,
            "dependencies {\n    implementation(\"com.google.guava:guava:32.1.3-jre\")\n}\n"
        );
        assert!(update_dependency_version(text, &deps[0], "31.0-jre").is_none());
    }

    #[test]
    fn test_update_only_touches_the_declaration() {
        let text = "dependencies {\n    api(\"a:one:1.0\")\n    api(\"a:two:1.0\")\n}\n";
        let deps = dependencies(KTS, text);
        let updated = update_dependency_version(text, &deps[1], "2.0").unwrap();
        assert_eq!(updated, "dependencies {\n    api(\"a:one:1.0\")\n    api(\"a:two:2.0\")\n}\n");
    }

    #[test]
    fn test_update_skips_version_inside_artifact_id() {
        let text = "dependencies {\n    implementation(\"org.example:lib-1.0:1.0\")\n}\n";
        let deps = dependencies(KTS, text);
        let updated = update_dependency_version(text, &deps[0], "1.1").unwrap();
        assert_eq!(
            updated,
            "dependencies {\n    implementation(\"org.example:lib-1.0:1.1\")\n}\n"
        );
    }

    #[test]
    fn test_update_variable_definition() {
        let text = "ext {\n    guavaVersion = '31.0-jre'\n}\ndependencies {\n    implementation \"com.google.guava:guava:$guavaVersion\"\n}\n";
        let deps = dependencies(GROOVY, text);
        assert_eq!(deps[0].version_ref, VersionRef::Variable("guavaVersion".into()));
        let updated = update_dependency_version(text, &deps[0], "33.0.0-jre").unwrap();
        assert!(updated.contains("guavaVersion = '33.0.0-jre'"));
        assert!(updated.contains("guava:$guavaVersion\""));
    }

    #[test]
    fn test_stale_span_is_rejected() {
        let text = "dependencies {\n    implementation(\"com.google.guava:guava:31.0-jre\")\n}\n";
        let deps = dependencies(KTS, text);
        assert!(update_dependency_version("dependencies {}", &deps[0], "32.0").is_none());
    }

    #[test]
    fn test_remove_leaves_no_blank_line() {
        let text = "dependencies {\n    implementation(\"a:b:1.0\")\n    testImplementation(\"c:d:2.0\") {\n        exclude(group = \"x\")\n    }\n    api(\"e:f:3.0\")\n}\n";
        let deps = dependencies(KTS, text);
        let removed = remove_dependency(text, &deps[1]).unwrap();
        assert_eq!(
            removed,
            "dependencies {\n    implementation(\"a:b:1.0\")\n    api(\"e:f:3.0\")\n}\n"
        );
    }

    #[test]
    fn test_add_then_remove_round_trip() {
        let text = "plugins {\n    java\n}\n\ndependencies {\n    implementation 'a:b:1.0'\n}\n";
        let coordinate = Coordinate::new("com.google.guava", "guava", Some("32.1.3-jre".into()));
        let added = add_dependency(text, DslFlavor::Groovy, &coordinate, "implementation").unwrap();
        assert_eq!(
            added,
            "plugins {\n    java\n}\n\ndependencies {\n    implementation 'a:b:1.0'\n    implementation 'com.google.guava:guava:32.1.3-jre'\n}\n"
        );
        assert!(add_dependency(&added, DslFlavor::Groovy, &coordinate, "api").is_none());

        let guava = dependencies(GROOVY, &added)
            .into_iter()
            .find(|d| d.coordinate.artifact_id == "guava")
            .unwrap();
        assert_eq!(remove_dependency(&added, &guava).unwrap(), text);
    }

    #[test]
    fn test_add_dependency_creates_block() {
        let coordinate = Coordinate::new("a", "b", Some("1.0".into()));
        let script = "plugins {\n  java\n}\n";
        let added = add_dependency(script, DslFlavor::Kotlin, &coordinate, "api").unwrap();
        assert_eq!(added, "plugins {\n  java\n}\n\ndependencies {\n  api(\"a:b:1.0\")\n}\n");

        let inline =
            add_dependency("dependencies {}\n", DslFlavor::Kotlin, &coordinate, "api").unwrap();
        assert_eq!(inline, "dependencies {\n    api(\"a:b:1.0\")\n}\n");
    }

    #[test]
    fn test_add_plugin() {
        let text = "plugins {\n    id(\"java\")\n}\n";
        let added =
            add_plugin(text, DslFlavor::Kotlin, "org.springframework.boot", Some("3.2.0")).unwrap();
        assert_eq!(
            added,
            "plugins {\n    id(\"java\")\n    id(\"org.springframework.boot\") version \"3.2.0\"\n}\n"
        );
        assert!(add_plugin(&added, DslFlavor::Kotlin, "org.springframework.boot", None).is_none());
    }

    #[test]
    fn test_add_plugin_synthesizes_block() {
        let text = "buildscript {\n    repositories { mavenCentral() }\n}\n\nrepositories {\n    mavenCentral()\n}\n";
        let added = add_plugin(text, DslFlavor::Groovy, "checkstyle", None).unwrap();
        assert_eq!(
            added,
            "buildscript {\n    repositories { mavenCentral() }\n}\n\nplugins {\n    id 'checkstyle'\n}\n\nrepositories {\n    mavenCentral()\n}\n"
        );

        let prepended =
            add_plugin("dependencies {\n}\n", DslFlavor::Kotlin, "application", None).unwrap();
        assert_eq!(prepended, "plugins {\n    id(\"application\")\n}\n\ndependencies {\n}\n");
    }

    #[test]
    fn test_update_plugin_version() {
        let text = "plugins {\n    id(\"org.springframework.boot\") version \"3.2.0\"\n    id(\"io.freefair.lombok\") apply false\n    kotlin(\"jvm\")\n    java\n}\n";
        let found = plugins(KTS, text);

        let updated = update_plugin_version(text, &found[0], "3.2.5").unwrap();
        assert!(updated.contains("id(\"org.springframework.boot\") version \"3.2.5\""));

        let inserted = update_plugin_version(text, &found[1], "8.4").unwrap();
        assert!(inserted.contains("id(\"io.freefair.lombok\") version \"8.4\" apply false"));

        let kotlin = update_plugin_version(text, &found[2], "1.9.22").unwrap();
        assert!(kotlin.contains("kotlin(\"jvm\") version \"1.9.22\"\n"));

        assert!(update_plugin_version(text, &found[3], "1.0").is_none());

        let removed = remove_plugin(text, &found[3]).unwrap();
        assert!(!removed.contains("java"));
        assert!(removed.ends_with("kotlin(\"jvm\")\n}\n"));
    }

    #[test]
    fn test_groovy_plugin_version_insert() {
        let text = "plugins {\n    id 'com.diffplug.spotless'\n}\n";
        let found = plugins(GROOVY, text);
        let updated = update_plugin_version(text, &found[0], "6.23.3").unwrap();
        assert_eq!(updated, "plugins {\n    id 'com.diffplug.spotless' version '6.23.3'\n}\n");
    }

    #[test]
    fn test_add_exclusion_to_existing_closure() {
        let text = "dependencies {\n    implementation(\"org.springframework.boot:spring-boot-starter-web:3.2.0\") {\n        exclude(group = \"commons-logging\")\n    }\n}\n";
        let deps = dependencies(KTS, text);
        let exclusion =
            DependencyExclusion::new("org.springframework.boot", "spring-boot-starter-tomcat");
        let updated = add_exclusion(text, &deps[0], &exclusion).unwrap();
        assert_eq!(
            updated,
            "dependencies {\n    implementation(\"org.springframework.boot:spring-boot-starter-web:3.2.0\") {\n        exclude(group = \"commons-logging\")\n        exclude(group = \"org.springframework.boot\", module = \"spring-boot-starter-tomcat\")\n    }\n}\n"
        );

        let present = DependencyExclusion::wildcard("commons-logging");
        assert!(add_exclusion(text, &deps[0], &present).is_none());
    }

    #[test]
    fn test_add_exclusion_creates_closure() {
        let text = "dependencies {\n    implementation 'log4j:log4j:1.2.17'\n}\n";
        let deps = dependencies(GROOVY, text);
        let exclusion = DependencyExclusion::new("javax.jms", "jms");
        let updated = add_exclusion(text, &deps[0], &exclusion).unwrap();
        assert_eq!(
            updated,
            "dependencies {\n    implementation('log4j:log4j:1.2.17') {\n        exclude group: 'javax.jms', module: 'jms'\n    }\n}\n"
        );
        let rescanned = dependencies(GROOVY, &updated);
        assert_eq!(rescanned[0].exclusions.len(), 1);
    }

    #[test]
    fn test_config_value_quoting() {
        assert_eq!(config_value(DslFlavor::Kotlin, "0.8.11"), "\"0.8.11\"");
        assert_eq!(config_value(DslFlavor::Kotlin, "17"), "17");
        assert_eq!(config_value(DslFlavor::Kotlin, "true"), "true");
        assert_eq!(config_value(DslFlavor::Kotlin, "10L"), "10L");
        assert_eq!(config_value(DslFlavor::Kotlin, "build/reports"), "\"build/reports\"");
        assert_eq!(config_value(DslFlavor::Groovy, "build/reports"), "'build/reports'");
        assert_eq!(config_value(DslFlavor::Groovy, "'quoted'"), "'quoted'");
        assert_eq!(config_value(DslFlavor::Kotlin, "file(\"x\")"), "file(\"x\")");
    }

    #[test]
    fn test_set_extension_config() {
        let text = "plugins {\n    jacoco\n}\n\ndependencies {\n}\n";
        let entries = vec![
            ("toolVersion".to_string(), "0.8.11".to_string()),
            ("reportsDirectory".to_string(), "layout.buildDirectory.dir(\"jacoco\")".to_string()),
        ];
        let first =
            set_extension_config(text, DslFlavor::Kotlin, "jacoco", None, &entries).unwrap();
        assert_eq!(
            first,
            "plugins {\n    jacoco\n}\n\njacoco {\n    toolVersion = \"0.8.11\"\n    reportsDirectory = layout.buildDirectory.dir(\"jacoco\")\n}\n\ndependencies {\n}\n"
        );

        let span = find_extension_block(&first, "jacoco").unwrap();
        let entries = vec![("toolVersion".to_string(), "0.8.12".to_string())];
        let second =
            set_extension_config(&first, DslFlavor::Kotlin, "jacoco", Some(span), &entries)
                .unwrap();
        assert_eq!(
            second,
            "plugins {\n    jacoco\n}\n\njacoco {\n    toolVersion = \"0.8.12\"\n}\n\ndependencies {\n}\n"
        );
        assert!(
            set_extension_config(&second, DslFlavor::Kotlin, "jacoco", None, &entries).is_none()
        );
    }
}
