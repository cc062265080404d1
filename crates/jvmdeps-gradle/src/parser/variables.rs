//! Version variables: `val`/`var`/`def`, `ext`, `extra` and
//! `gradle.properties` values, with `$name` / `${name}` interpolation.

use crate::lexer::MaskedText;
use jvmdeps_core::Span;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Upper bound on interpolation passes, so cyclic definitions terminate.
pub const MAX_RESOLUTION_PASSES: usize = 10;

/// A variable assigned a string literal in the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    pub name: String,
    /// Raw literal content, possibly containing `$` references.
    pub value: String,
    /// Span of the literal content, quotes excluded.
    pub value_span: Span,
}

static RE_LOCAL: OnceLock<Regex> = OnceLock::new();
static RE_EXT_PROPERTY: OnceLock<Regex> = OnceLock::new();
static RE_BLOCK_ASSIGNMENT: OnceLock<Regex> = OnceLock::new();
static RE_EXTRA_INDEX: OnceLock<Regex> = OnceLock::new();
static RE_BY_EXTRA: OnceLock<Regex> = OnceLock::new();
static RE_REFERENCE: OnceLock<Regex> = OnceLock::new();

/// `val name = "1.0"`, `var name: String = "1.0"`, `def name = '1.0'`
fn re_local() -> &'static Regex {
    RE_LOCAL.get_or_init(|| {
        Regex::new(
            r#"\b(?:val|var|def)\s+([A-Za-z_]\w*)(?:\s*:\s*[\w.<>?]+)?\s*=\s*("[^"\n]*"|'[^'\n]*')"#,
        )
        .unwrap()
    })
}

/// `ext.name = '1.0'`, `project.ext.name = '1.0'`
fn re_ext_property() -> &'static Regex {
    RE_EXT_PROPERTY.get_or_init(|| {
        Regex::new(r#"\bext\.([A-Za-z_]\w*)\s*=\s*("[^"\n]*"|'[^'\n]*')"#).unwrap()
    })
}

/// `name = '1.0'` at the start of a line, used inside `ext { }`.
fn re_block_assignment() -> &'static Regex {
    RE_BLOCK_ASSIGNMENT.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*(?:set\s*\(\s*)?([A-Za-z_]\w*)\s*=\s*("[^"\n]*"|'[^'\n]*')"#)
            .unwrap()
    })
}

/// `extra["name"] = "1.0"`
fn re_extra_index() -> &'static Regex {
    RE_EXTRA_INDEX.get_or_init(|| {
        Regex::new(r#"\bextra\s*\[\s*"([A-Za-z_][\w.]*)"\s*\]\s*=\s*("[^"\n]*")"#).unwrap()
    })
}

/// `val name by extra("1.0")`
fn re_by_extra() -> &'static Regex {
    RE_BY_EXTRA.get_or_init(|| {
        Regex::new(r#"\bval\s+([A-Za-z_]\w*)\s+by\s+extra\s*\(\s*("[^"\n]*")\s*\)"#).unwrap()
    })
}

/// `${name}` or `$name`
fn re_reference() -> &'static Regex {
    RE_REFERENCE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][\w.]*)\}|\$([A-Za-z_]\w*)").unwrap()
    })
}

fn definition_from(caps: &Captures<'_>, offset: usize) -> Option<VariableDefinition> {
    let name = caps.get(1)?;
    let literal = caps.get(2)?;
    let start = offset + literal.start() + 1;
    let end = offset + literal.end() - 1;
    Some(VariableDefinition {
        name: name.as_str().to_string(),
        value: literal.as_str()[1..literal.len() - 1].to_string(),
        value_span: Span::from_bounds(start, end),
    })
}

/// Every string-valued variable definition in the script, in source order.
pub fn collect_definitions(masked: &MaskedText) -> Vec<VariableDefinition> {
    let text = masked.as_str();
    let mut found: Vec<(usize, VariableDefinition)> = Vec::new();

    for re in [re_local(), re_ext_property(), re_extra_index(), re_by_extra()] {
        for caps in re.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if masked.in_string(whole.start()) {
                continue;
            }
            if let Some(def) = definition_from(&caps, 0) {
                found.push((whole.start(), def));
            }
        }
    }

    for block in masked.blocks("ext") {
        let body = block.body();
        for caps in re_block_assignment().captures_iter(&text[body.clone()]) {
            let Some(name) = caps.get(1) else { continue };
            if masked.in_string(body.start + name.start()) {
                continue;
            }
            if let Some(def) = definition_from(&caps, body.start) {
                found.push((body.start + name.start(), def));
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, def)| def).collect()
}

/// The name when `version` is exactly one reference (`$name` or `${name}`).
pub fn variable_reference(version: &str) -> Option<&str> {
    let caps = re_reference().captures(version)?;
    let whole = caps.get(0)?;
    if whole.start() != 0 || whole.end() != version.len() {
        return None;
    }
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

pub fn contains_reference(s: &str) -> bool {
    re_reference().is_match(s)
}

/// Resolved variable values visible to one build script.
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    values: HashMap<String, String>,
    definitions: HashMap<String, VariableDefinition>,
}

impl VariableTable {
    /// Builds the table from the script's own definitions, which shadow the
    /// `gradle.properties` values in `properties`.
    pub fn new(masked: &MaskedText, properties: &HashMap<String, String>) -> Self {
        let mut values = properties.clone();
        let mut definitions = HashMap::new();
        for def in collect_definitions(masked) {
            values.insert(def.name.clone(), def.value.clone());
            // The last assignment wins, as when the script runs.
            definitions.insert(def.name.clone(), def);
        }

        let mut table = Self {
            values,
            definitions,
        };
        table.resolve();
        table
    }

    fn resolve(&mut self) {
        for _ in 0..MAX_RESOLUTION_PASSES {
            let pending: Vec<(String, String)> = self
                .values
                .iter()
                .filter(|(_, v)| contains_reference(v))
                .filter_map(|(k, v)| {
                    let resolved = self.interpolate(v)?;
                    (resolved != *v).then(|| (k.clone(), resolved))
                })
                .collect();
            if pending.is_empty() {
                return;
            }
            self.values.extend(pending);
        }
        tracing::debug!("Variable resolution stopped after {} passes", MAX_RESOLUTION_PASSES);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .or_else(|| {
                // `rootProject.ext.x`, `project.x`
                let (_, last) = name.rsplit_once('.')?;
                self.values.get(last)
            })
            .map(String::as_str)
    }

    /// Definition of `name` in this script, if it is defined here.
    pub fn definition(&self, name: &str) -> Option<&VariableDefinition> {
        self.definitions.get(name)
    }

    /// Substitutes every reference in `s`; `None` when any is unknown.
    pub fn interpolate(&self, s: &str) -> Option<String> {
        let mut out = String::with_capacity(s.len());
        let mut last = 0;
        for caps in re_reference().captures_iter(s) {
            let whole = caps.get(0)?;
            let name = caps.get(1).or_else(|| caps.get(2))?.as_str();
            out.push_str(&s[last..whole.start()]);
            out.push_str(self.get(name)?);
            last = whole.end();
        }
        out.push_str(&s[last..]);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> VariableTable {
        VariableTable::new(&MaskedText::new(text), &HashMap::new())
    }

    #[test]
    fn test_collect_all_definition_forms() {
        let text = r#"val kotlinVersion = "1.9.22"
var ktorVersion: String = "2.3.7"
def springVersion = '6.1.2'
ext.junitVersion = '5.10.1'
ext {
    slf4jVersion = '2.0.9'
}
extra["jacksonVersion"] = "2.16.0"
val coroutinesVersion by extra("1.7.3")
// val commented = "0.0"
"#;
        let masked = MaskedText::new(text);
        let defs = collect_definitions(&masked);
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "kotlinVersion",
                "ktorVersion",
                "springVersion",
                "junitVersion",
                "slf4jVersion",
                "jacksonVersion",
                "coroutinesVersion"
            ]
        );

        for def in &defs {
            assert_eq!(def.value_span.slice(text).unwrap(), def.value);
        }
    }

    #[test]
    fn test_variable_reference() {
        assert_eq!(variable_reference("$kotlinVersion"), Some("kotlinVersion"));
        assert_eq!(variable_reference("${kotlinVersion}"), Some("kotlinVersion"));
        assert_eq!(variable_reference("${rootProject.ext.v}"), Some("rootProject.ext.v"));
        assert_eq!(variable_reference("1.0-$suffix"), None);
        assert_eq!(variable_reference("1.0"), None);
    }

    #[test]
    fn test_resolution_through_chain() {
        let vars = table("val base = \"1.2\"\nval full = \"${base}.3\"\nval alias = \"$full\"\n");
        assert_eq!(vars.get("alias"), Some("1.2.3"));
        assert_eq!(vars.interpolate("v$base"), Some("v1.2".to_string()));
        assert_eq!(vars.interpolate("$missing"), None);
    }

    #[test]
    fn test_cycles_terminate() {
        let vars = table("val a = \"$b\"\nval b = \"$a\"\n");
        assert!(vars.get("a").is_some());
    }

    #[test]
    fn test_script_shadows_properties() {
        let mut props = HashMap::new();
        props.insert("kotlinVersion".to_string(), "1.8.0".to_string());
        props.insert("okioVersion".to_string(), "3.6.0".to_string());

        let masked = MaskedText::new("val kotlinVersion = \"1.9.22\"\n");
        let vars = VariableTable::new(&masked, &props);
        assert_eq!(vars.get("kotlinVersion"), Some("1.9.22"));
        assert_eq!(vars.get("okioVersion"), Some("3.6.0"));
        assert!(vars.definition("kotlinVersion").is_some());
        assert!(vars.definition("okioVersion").is_none());
        assert_eq!(vars.get("rootProject.ext.okioVersion"), Some("3.6.0"));
    }
}
