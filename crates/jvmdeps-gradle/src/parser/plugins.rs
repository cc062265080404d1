//! Plugin declarations inside `plugins { }` and legacy `apply plugin:`.

use super::Script;
use jvmdeps_core::{InstalledPlugin, PluginSyntax, Span};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Namespace `kotlin("x")` expands into.
pub const KOTLIN_PLUGIN_PREFIX: &str = "org.jetbrains.kotlin.";

static RE_ID: OnceLock<Regex> = OnceLock::new();
static RE_KOTLIN: OnceLock<Regex> = OnceLock::new();
static RE_BACKTICK: OnceLock<Regex> = OnceLock::new();
static RE_BARE: OnceLock<Regex> = OnceLock::new();
static RE_APPLY_FALSE: OnceLock<Regex> = OnceLock::new();
static RE_LEGACY_APPLY: OnceLock<Regex> = OnceLock::new();

/// `id("x")`, `id 'x'`, `id "x"` with an optional `version` and `apply false`.
fn re_id() -> &'static Regex {
    RE_ID.get_or_init(|| {
        Regex::new(
            r#"^id\s*\(?\s*["']([^"']+)["']\s*\)?(?:\s*version\s*\(?\s*["']([^"']+)["']\s*\)?)?"#,
        )
        .unwrap()
    })
}

/// `kotlin("jvm")` with an optional `version`.
fn re_kotlin() -> &'static Regex {
    RE_KOTLIN.get_or_init(|| {
        Regex::new(r#"^kotlin\s*\(\s*"([^"]+)"\s*\)(?:\s*version\s*\(?\s*"([^"]+)"\s*\)?)?"#)
            .unwrap()
    })
}

fn re_backtick() -> &'static Regex {
    RE_BACKTICK.get_or_init(|| Regex::new(r"^`([^`]+)`\s*$").unwrap())
}

/// A lone identifier such as `java` or `application`.
fn re_bare() -> &'static Regex {
    RE_BARE.get_or_init(|| Regex::new(r"^([A-Za-z][\w-]*)\s*$").unwrap())
}

fn re_apply_false() -> &'static Regex {
    RE_APPLY_FALSE.get_or_init(|| Regex::new(r"\bapply\s*\(?\s*false\s*\)?\s*$").unwrap())
}

/// `apply plugin: 'x'` and `apply(plugin = "x")`
fn re_legacy_apply() -> &'static Regex {
    RE_LEGACY_APPLY.get_or_init(|| {
        Regex::new(r#"\bapply\s*\(?\s*plugin\s*[:=]\s*["']([^"']+)["'](?:\s*\))?"#).unwrap()
    })
}

/// Call prefix of a declaration, up to where ` version "x"` belongs.
pub(crate) fn id_call_len(statement: &str) -> Option<usize> {
    let caps = re_id()
        .captures(statement)
        .or_else(|| re_kotlin().captures(statement))?;
    let id = caps.get(1)?;
    let after_quote = id.end() + 1;
    let rest = &statement[after_quote..];
    let trimmed = rest.trim_start();
    Some(if trimmed.starts_with(')') {
        after_quote + (rest.len() - trimmed.len()) + 1
    } else {
        after_quote
    })
}

fn version_of(script: &Script<'_>, caps: &Captures<'_>) -> Option<String> {
    let raw = caps.get(2)?.as_str();
    let resolved = script.variables.interpolate(raw);
    if resolved.is_none() {
        tracing::debug!("Unresolved plugin version '{}' in {}", raw, script.path.display());
    }
    resolved
}

/// Parses one statement of a `plugins { }` block.
fn plugin_statement(
    script: &Script<'_>,
    statement: &str,
) -> Option<(String, Option<String>, PluginSyntax)> {
    let kotlin = script.flavor.is_kotlin();

    if let Some(caps) = re_id().captures(statement) {
        let version = version_of(script, &caps);
        let has_version = caps.get(2).is_some();
        let syntax = match (kotlin, has_version) {
            (true, true) => PluginSyntax::IdVersion,
            (true, false) => PluginSyntax::IdOnly,
            (false, true) => PluginSyntax::GroovyIdVersion,
            (false, false) => PluginSyntax::GroovyIdOnly,
        };
        return Some((caps.get(1)?.as_str().to_string(), version, syntax));
    }

    if let Some(caps) = re_kotlin().captures(statement) {
        let id = format!("{KOTLIN_PLUGIN_PREFIX}{}", caps.get(1)?.as_str());
        return Some((id, version_of(script, &caps), PluginSyntax::KotlinShorthand));
    }

    if let Some(caps) = re_backtick().captures(statement) {
        return Some((caps.get(1)?.as_str().to_string(), None, PluginSyntax::Backtick));
    }

    let caps = re_bare().captures(statement)?;
    let syntax = if kotlin {
        PluginSyntax::Backtick
    } else {
        PluginSyntax::GroovyShorthand
    };
    Some((caps.get(1)?.as_str().to_string(), None, syntax))
}

/// Every plugin declared in the script, in source order.
pub(crate) fn scan_plugins(script: &Script<'_>) -> Vec<InstalledPlugin> {
    let masked = &script.masked;
    let text = masked.as_str();
    let new_plugin = |plugin_id: String, version, span, syntax, applied| InstalledPlugin {
        plugin_id,
        version,
        module_name: script.context.module_name.clone(),
        build_file: script.path.to_path_buf(),
        span: Some(span),
        syntax,
        applied,
    };

    let mut plugins = Vec::new();

    if let Some(block) = masked.top_level_block("plugins") {
        let body = block.body();
        let mut line_start = body.start;
        for line in text[body.clone()].split_inclusive('\n') {
            let indent = line.len() - line.trim_start().len();
            let statement = line.trim();
            let start = line_start + indent;
            line_start += line.len();
            if statement.is_empty() {
                continue;
            }

            let Some((id, version, syntax)) = plugin_statement(script, statement) else {
                tracing::debug!("Unrecognized plugin declaration: {}", statement);
                continue;
            };
            let applied = !re_apply_false().is_match(statement);
            let span = Span::new(start, statement.len());
            plugins.push(new_plugin(id, version, span, syntax, applied));
        }
    }

    for caps in re_legacy_apply().captures_iter(text) {
        let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if masked.in_string(whole.start()) {
            continue;
        }
        let span = Span::from_bounds(whole.start(), whole.end());
        plugins.push(new_plugin(
            id.as_str().to_string(),
            None,
            span,
            PluginSyntax::LegacyApply,
            true,
        ));
    }

    plugins.sort_by_key(|p| p.span.map(|s| s.offset));
    plugins
}
