//! Dependency declarations: `configuration("g:a:v")`, `configuration 'g:a:v'`,
//! map notation and version catalog accessors (`libs.foo.bar`).

use super::Script;
use super::variables::variable_reference;
use crate::lexer::Block;
use jvmdeps_core::{
    Coordinate, DependencyExclusion, InstalledDependency, Span, VersionRef, strip_quotes,
};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

static RE_EXCLUDE: OnceLock<Regex> = OnceLock::new();
static RE_MAP_NOTATION: OnceLock<Regex> = OnceLock::new();
static RE_CATALOG_ACCESSOR: OnceLock<Regex> = OnceLock::new();

/// `exclude group: 'g', module: 'm'` and `exclude(group = "g", module = "m")`
fn re_exclude() -> &'static Regex {
    RE_EXCLUDE.get_or_init(|| {
        Regex::new(
            r#"\bexclude\s*\(?\s*group\s*[:=]\s*['"]([^'"]+)['"](?:\s*,\s*module\s*[:=]\s*['"]([^'"]+)['"])?"#,
        )
        .unwrap()
    })
}

/// `group: 'g', name: 'a', version: 'v'` (either `:` or `=`).
fn re_map_notation() -> &'static Regex {
    RE_MAP_NOTATION.get_or_init(|| {
        Regex::new(
            r#"^\s*group\s*[:=]\s*['"]([^'"]+)['"]\s*,\s*name\s*[:=]\s*['"]([^'"]+)['"](?:\s*,\s*version\s*[:=]\s*['"]([^'"]+)['"])?"#,
        )
        .unwrap()
    })
}

fn re_catalog_accessor() -> &'static Regex {
    RE_CATALOG_ACCESSOR
        .get_or_init(|| Regex::new(r"\blibs\.([A-Za-z_][\w.]*[A-Za-z0-9_])").unwrap())
}

/// Accessor namespaces that never name a library.
const NON_LIBRARY_ACCESSORS: &[&str] = &["versions.", "plugins.", "bundles."];

/// Call-site shape of one declaration.
struct Declaration {
    start: usize,
    args: Range<usize>,
    end: usize,
}

fn skip_inline_space(bytes: &[u8], mut pos: usize) -> usize {
    while matches!(bytes.get(pos), Some(b' ' | b'\t')) {
        pos += 1;
    }
    pos
}

/// Locates the argument region and the end of a declaration starting with
/// the configuration name at `start`.
fn declaration_at(script: &Script<'_>, start: usize, name_len: usize) -> Option<Declaration> {
    let masked = &script.masked;
    let bytes = masked.as_str().as_bytes();
    let after = skip_inline_space(bytes, start + name_len);

    let (args, mut end) = match bytes.get(after)? {
        b'(' => {
            let close = masked.matching(after)?;
            (after + 1..close, close + 1)
        }
        // Groovy: `implementation 'g:a:v'`, `implementation libs.foo`, map notation
        b if matches!(b, b'"' | b'\'') || b.is_ascii_alphabetic() => {
            let line_end = masked.as_str()[after..]
                .find('\n')
                .map_or(bytes.len(), |i| after + i);
            let trimmed = after + masked.as_str()[after..line_end].trim_end().len();
            (after..trimmed, trimmed)
        }
        _ => return None,
    };

    // Optional configuration closure: `implementation("g:a:v") { ... }`
    let brace = skip_inline_space(bytes, end);
    if bytes.get(brace) == Some(&b'{')
        && let Some(close) = masked.matching(brace)
    {
        end = close + 1;
    }

    Some(Declaration { start, args, end })
}

fn exclusions_in(text: &str) -> Vec<DependencyExclusion> {
    re_exclude()
        .captures_iter(text)
        .filter_map(|caps| {
            let group = caps.get(1)?.as_str();
            Some(match caps.get(2) {
                Some(module) => DependencyExclusion::new(group, module.as_str()),
                None => DependencyExclusion::wildcard(group),
            })
        })
        .collect()
}

/// Coordinate and version reference for a string notation.
fn resolve_notation(script: &Script<'_>, literal: &str) -> Option<(Coordinate, VersionRef)> {
    let raw = strip_quotes(literal);
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() < 3 {
        tracing::debug!("Skipping notation without version: {}", raw);
        return None;
    }

    let version_ref = variable_reference(parts[2].split('@').next().unwrap_or(parts[2]))
        .map_or(VersionRef::Literal, |name| VersionRef::Variable(name.to_string()));

    let Some(resolved) = script.variables.interpolate(raw) else {
        tracing::debug!("Unresolved variable in {} ({})", raw, script.path.display());
        return None;
    };
    let coordinate = Coordinate::parse_gav(&resolved)?;
    Some((coordinate, version_ref))
}

fn record_for(
    script: &Script<'_>,
    configuration: &str,
    decl: &Declaration,
) -> Option<InstalledDependency> {
    let masked = &script.masked;
    let args_text = &masked.as_str()[decl.args.clone()];
    let context = script.context;
    let new_record = |coordinate: Coordinate| {
        InstalledDependency::new(
            coordinate,
            configuration,
            context.module_name.as_str(),
            script.path,
        )
        .with_span(Span::from_bounds(decl.start, decl.end))
    };

    if let Some(caps) = re_map_notation().captures(args_text) {
        let version = caps.get(3).map(|v| v.as_str());
        let version_ref = version
            .and_then(variable_reference)
            .map_or(VersionRef::Literal, |name| VersionRef::Variable(name.to_string()));
        let interpolate = |s: &str| script.variables.interpolate(s);
        let coordinate = Coordinate::new(
            interpolate(caps.get(1)?.as_str())?,
            interpolate(caps.get(2)?.as_str())?,
            match version {
                Some(v) => Some(interpolate(v)?),
                None => None,
            },
        );
        return Some(new_record(coordinate).with_version_ref(version_ref));
    }

    let literal = masked.first_string_in(decl.args.clone());
    let accessor = re_catalog_accessor()
        .captures(args_text)
        .and_then(|c| c.get(1))
        .filter(|m| !masked.in_string(decl.args.start + m.start()));

    match (literal, accessor) {
        (Some(lit), acc) if acc.is_none_or(|a| lit.start < decl.args.start + a.start()) => {
            let (coordinate, version_ref) = resolve_notation(script, &script.text[lit])?;
            Some(new_record(coordinate).with_version_ref(version_ref))
        }
        (_, Some(acc)) => {
            let accessor = acc.as_str();
            if NON_LIBRARY_ACCESSORS.iter().any(|p| accessor.starts_with(p)) {
                return None;
            }
            let Some(library) = context.catalog.as_ref().and_then(|c| c.library(accessor)) else {
                tracing::debug!("Unknown catalog accessor libs.{}", accessor);
                return None;
            };
            let mut record = new_record(library.coordinate())
                .with_version_ref(VersionRef::Catalog(library.alias.clone()));
            record.catalog_key = Some(library.alias.clone());
            Some(record)
        }
        _ => None,
    }
}

/// Every dependency declared inside a `dependencies { }` block, in source
/// order.
pub(crate) fn scan_dependencies(script: &Script<'_>) -> Vec<InstalledDependency> {
    let masked = &script.masked;
    let blocks: Vec<Block> = masked.blocks("dependencies");
    if blocks.is_empty() {
        return Vec::new();
    }

    let mut records: Vec<InstalledDependency> = Vec::new();
    for configuration in script.context.configurations() {
        for start in masked.identifiers(configuration) {
            if !blocks.iter().any(|b| b.contains(start)) {
                continue;
            }
            let Some(decl) = declaration_at(script, start, configuration.len()) else {
                continue;
            };
            let Some(mut record) = record_for(script, configuration, &decl) else {
                continue;
            };
            record.exclusions = exclusions_in(&masked.as_str()[decl.args.end..decl.end]);
            records.push(record);
        }
    }

    records.sort_by_key(|r| r.span.map(|s| s.offset));
    records
}
