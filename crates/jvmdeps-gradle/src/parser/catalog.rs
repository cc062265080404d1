//! Gradle version catalog (`gradle/libs.versions.toml`).
//!
//! Parsing and in-place version edits both go through `toml_edit`, so edits
//! keep the file's comments, ordering and spacing.

use crate::error::Result;
use jvmdeps_core::Coordinate;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item, TableLike, Value};

/// Catalog location relative to the root project.
pub const CATALOG_PATH: &str = "gradle/libs.versions.toml";

/// Keys of a rich version declaration, in lookup order.
const RICH_VERSION_KEYS: &[&str] = &["require", "strictly", "prefer"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLibrary {
    pub alias: String,
    pub group_id: String,
    pub artifact_id: String,
    /// Resolved version, following `version.ref`.
    pub version: Option<String>,
    pub version_ref: Option<String>,
}

impl CatalogLibrary {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(
            self.group_id.as_str(),
            self.artifact_id.as_str(),
            self.version.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPlugin {
    pub alias: String,
    pub id: String,
    pub version: Option<String>,
    pub version_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionCatalog {
    pub versions: BTreeMap<String, String>,
    pub libraries: Vec<CatalogLibrary>,
    pub plugins: Vec<CatalogPlugin>,
}

/// Accessor path Gradle generates for an alias: `-`, `_` and `.` all become
/// `.` (`commons-lang3` is `libs.commons.lang3`).
pub fn accessor_path(alias: &str) -> String {
    alias.replace(['-', '_'], ".")
}

/// Nearest `gradle/libs.versions.toml` at or above the build file's
/// directory.
pub fn find_catalog(build_file: &Path) -> Option<PathBuf> {
    build_file
        .ancestors()
        .skip(1)
        .map(|dir| dir.join(CATALOG_PATH))
        .find(|candidate| candidate.is_file())
}

fn version_string(item: &Item) -> Option<String> {
    if let Some(s) = item.as_str() {
        return Some(s.to_string());
    }
    let table = item.as_table_like()?;
    RICH_VERSION_KEYS
        .iter()
        .find_map(|k| table.get(k).and_then(Item::as_str))
        .map(str::to_string)
}

/// `(version, version_ref)` of a library or plugin entry.
fn entry_version(
    table: &dyn TableLike,
    versions: &BTreeMap<String, String>,
) -> (Option<String>, Option<String>) {
    let Some(version) = table.get("version") else {
        return (None, None);
    };
    if let Some(reference) = version
        .as_table_like()
        .and_then(|t| t.get("ref"))
        .and_then(Item::as_str)
    {
        return (versions.get(reference).cloned(), Some(reference.to_string()));
    }
    (version_string(version), None)
}

fn parse_library(
    alias: &str,
    item: &Item,
    versions: &BTreeMap<String, String>,
) -> Option<CatalogLibrary> {
    if let Some(notation) = item.as_str() {
        let mut parts = notation.split(':');
        let (group_id, artifact_id) = (parts.next()?, parts.next()?);
        return Some(CatalogLibrary {
            alias: alias.to_string(),
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: parts.next().map(str::to_string),
            version_ref: None,
        });
    }

    let table = item.as_table_like()?;
    let (group_id, artifact_id) = match table.get("module").and_then(Item::as_str) {
        Some(module) => {
            let (g, a) = module.split_once(':')?;
            (g.to_string(), a.to_string())
        }
        None => (
            table.get("group")?.as_str()?.to_string(),
            table.get("name")?.as_str()?.to_string(),
        ),
    };
    let (version, version_ref) = entry_version(table, versions);
    Some(CatalogLibrary {
        alias: alias.to_string(),
        group_id,
        artifact_id,
        version,
        version_ref,
    })
}

fn parse_plugin(
    alias: &str,
    item: &Item,
    versions: &BTreeMap<String, String>,
) -> Option<CatalogPlugin> {
    if let Some(notation) = item.as_str() {
        let (id, version) = notation
            .split_once(':')
            .map_or((notation, None), |(id, v)| (id, Some(v.to_string())));
        return Some(CatalogPlugin {
            alias: alias.to_string(),
            id: id.to_string(),
            version,
            version_ref: None,
        });
    }
    let table = item.as_table_like()?;
    let (version, version_ref) = entry_version(table, versions);
    Some(CatalogPlugin {
        alias: alias.to_string(),
        id: table.get("id")?.as_str()?.to_string(),
        version,
        version_ref,
    })
}

impl VersionCatalog {
    pub fn parse(content: &str) -> Result<Self> {
        let doc: DocumentMut = content.parse()?;

        let versions: BTreeMap<String, String> = doc
            .get("versions")
            .and_then(Item::as_table_like)
            .map(|t| {
                t.iter()
                    .filter_map(|(k, v)| Some((k.to_string(), version_string(v)?)))
                    .collect()
            })
            .unwrap_or_default();

        let section = |name: &str| doc.get(name).and_then(Item::as_table_like);

        let libraries = section("libraries")
            .map(|t| {
                t.iter()
                    .filter_map(|(alias, item)| {
                        let lib = parse_library(alias, item, &versions);
                        if lib.is_none() {
                            tracing::debug!("Skipping catalog library '{}'", alias);
                        }
                        lib
                    })
                    .collect()
            })
            .unwrap_or_default();

        let plugins = section("plugins")
            .map(|t| {
                t.iter()
                    .filter_map(|(alias, item)| parse_plugin(alias, item, &versions))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            versions,
            libraries,
            plugins,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Library for an accessor path such as `spring.boot.starter` (the part
    /// after `libs.`).
    pub fn library(&self, accessor: &str) -> Option<&CatalogLibrary> {
        self.libraries
            .iter()
            .find(|l| accessor_path(&l.alias) == accessor)
    }

    pub fn plugin(&self, accessor: &str) -> Option<&CatalogPlugin> {
        self.plugins
            .iter()
            .find(|p| accessor_path(&p.alias) == accessor)
    }
}

/// Replaces a string value, keeping its surrounding whitespace and comments.
fn set_string(value: &mut Value, new: &str) -> bool {
    if value.as_str() == Some(new) {
        return false;
    }
    let decor = value.decor().clone();
    *value = Value::from(new);
    *value.decor_mut() = decor;
    true
}

/// Rewrites a plain or rich version item in place.
fn set_version_item(item: &mut Item, new: &str) -> Option<bool> {
    if item.is_str() {
        return Some(set_string(item.as_value_mut()?, new));
    }
    let table = item.as_table_like_mut()?;
    let key = RICH_VERSION_KEYS
        .iter()
        .find(|k| table.get(k).is_some_and(Item::is_str))?;
    Some(set_string(table.get_mut(key)?.as_value_mut()?, new))
}

fn entry_ref(doc: &DocumentMut, section: &str, alias: &str) -> Option<String> {
    doc.get(section)?
        .as_table_like()?
        .get(alias)?
        .as_table_like()?
        .get("version")?
        .as_table_like()?
        .get("ref")?
        .as_str()
        .map(str::to_string)
}

fn update_entry_version(content: &str, section: &str, alias: &str, new: &str) -> Option<String> {
    let mut doc: DocumentMut = content
        .parse()
        .map_err(|e| tracing::warn!("Cannot edit version catalog: {}", e))
        .ok()?;

    let changed = if let Some(reference) = entry_ref(&doc, section, alias) {
        let versions = doc.get_mut("versions")?.as_table_like_mut()?;
        set_version_item(versions.get_mut(&reference)?, new)?
    } else {
        let entry = doc.get_mut(section)?.as_table_like_mut()?.get_mut(alias)?;
        if let Some(notation) = entry.as_str() {
            // `group:artifact:version` or `plugin.id:version`
            let keep = if section == "plugins" { 1 } else { 2 };
            let head: Vec<&str> = notation.split(':').take(keep).collect();
            if head.len() < keep {
                return None;
            }
            let updated = format!("{}:{new}", head.join(":"));
            set_string(entry.as_value_mut()?, &updated)
        } else {
            let version = entry.as_table_like_mut()?.get_mut("version")?;
            set_version_item(version, new)?
        }
    };

    changed.then(|| doc.to_string())
}

/// Sets the version of library `alias`. A `version.ref` is followed into
/// `[versions]`, which also moves every other entry sharing that reference.
pub fn update_version(content: &str, alias: &str, new_version: &str) -> Option<String> {
    update_entry_version(content, "libraries", alias, new_version)
}

pub fn update_plugin_version(content: &str, alias: &str, new_version: &str) -> Option<String> {
    update_entry_version(content, "plugins", alias, new_version)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[versions]
spring = "3.2.0"   # Spring Boot
kotlin = { strictly = "1.9.22" }

[libraries]
spring-boot-starter = { module = "org.springframework.boot:spring-boot-starter", version.ref = "spring" }
guava = "com.google.guava:guava:31.0-jre"
commons_lang3 = { group = "org.apache.commons", name = "commons-lang3", version = "3.14.0" }
kotlin-stdlib = { module = "org.jetbrains.kotlin:kotlin-stdlib", version.ref = "kotlin" }
bom-managed = { module = "org.slf4j:slf4j-api" }

[libraries.jackson]
module = "com.fasterxml.jackson.core:jackson-databind"
version = "2.16.0"

[plugins]
spring-boot = { id = "org.springframework.boot", version.ref = "spring" }
ktlint = "org.jlleitschuh.gradle.ktlint:12.1.0"
"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = VersionCatalog::parse(CATALOG).unwrap();
        assert_eq!(catalog.versions.get("spring").map(String::as_str), Some("3.2.0"));
        assert_eq!(catalog.versions.get("kotlin").map(String::as_str), Some("1.9.22"));
        assert_eq!(catalog.libraries.len(), 6);

        let spring = catalog.library("spring.boot.starter").unwrap();
        assert_eq!(spring.group_id, "org.springframework.boot");
        assert_eq!(spring.version.as_deref(), Some("3.2.0"));
        assert_eq!(spring.version_ref.as_deref(), Some("spring"));

        let guava = catalog.library("guava").unwrap();
        assert_eq!(guava.coordinate().full_name(), "com.google.guava:guava:31.0-jre");

        let lang = catalog.library("commons.lang3").unwrap();
        assert_eq!(lang.artifact_id, "commons-lang3");
        assert_eq!(lang.version.as_deref(), Some("3.14.0"));

        assert_eq!(catalog.library("bom.managed").unwrap().version, None);
        assert_eq!(
            catalog.library("jackson").unwrap().version.as_deref(),
            Some("2.16.0")
        );

        let boot = catalog.plugin("spring.boot").unwrap();
        assert_eq!(boot.id, "org.springframework.boot");
        assert_eq!(boot.version.as_deref(), Some("3.2.0"));
        assert_eq!(
            catalog.plugin("ktlint").unwrap().version.as_deref(),
            Some("12.1.0")
        );
    }

    #[test]
    fn test_invalid_catalog() {
        assert!(VersionCatalog::parse("[libraries\nfoo = ").is_err());
    }

    #[test]
    fn test_update_through_version_ref() {
        let updated = update_version(CATALOG, "spring-boot-starter", "3.2.5").unwrap();
        assert!(updated.contains("spring = \"3.2.5\"   # Spring Boot"));
        assert_eq!(
            updated.replace("3.2.5", "3.2.0"),
            CATALOG,
            "only the referenced version changes"
        );
    }

    #[test]
    fn test_update_inline_and_shorthand_versions() {
        let updated = update_version(CATALOG, "commons_lang3", "3.15.0").unwrap();
        assert!(updated.contains(r#"name = "commons-lang3", version = "3.15.0" }"#));

        let updated = update_version(CATALOG, "guava", "33.0.0-jre").unwrap();
        assert!(updated.contains(r#"guava = "com.google.guava:guava:33.0.0-jre""#));

        let updated = update_version(CATALOG, "jackson", "2.17.0").unwrap();
        assert!(updated.contains("version = \"2.17.0\"\n"));
    }

    #[test]
    fn test_update_rich_version() {
        let updated = update_version(CATALOG, "kotlin-stdlib", "2.0.0").unwrap();
        assert!(updated.contains(r#"kotlin = { strictly = "2.0.0" }"#));
    }

    #[test]
    fn test_update_noop_and_missing() {
        assert!(update_version(CATALOG, "guava", "31.0-jre").is_none());
        assert!(update_version(CATALOG, "bom-managed", "2.0.9").is_none());
        assert!(update_version(CATALOG, "unknown", "1.0").is_none());
    }

    #[test]
    fn test_update_plugin_version() {
        let updated = update_plugin_version(CATALOG, "ktlint", "12.2.0").unwrap();
        assert!(updated.contains(r#"ktlint = "org.jlleitschuh.gradle.ktlint:12.2.0""#));
    }

    #[test]
    fn test_find_catalog() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("gradle")).unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join(CATALOG_PATH), CATALOG).unwrap();

        let found = find_catalog(&dir.path().join("app/build.gradle.kts")).unwrap();
        assert_eq!(found, dir.path().join(CATALOG_PATH));
        assert!(VersionCatalog::load(&found).is_ok());
    }
}
