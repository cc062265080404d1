//! Repository declarations in `pom.xml` and `settings.xml`, and server
//! credentials in `settings.xml`.
//!
//! Both files are edited as XML trees and re-serialized, so the result is
//! always well-formed and uses two-space indentation. `settings.xml` only
//! accepts repositories inside a profile, so they go into
//! [`SETTINGS_PROFILE_ID`], which is also listed in `<activeProfiles>`.

use crate::error::{MavenError, Result};
use crate::xml_tree::{Document, Element, Node};
use jvmdeps_core::{FileEdit, RemoteRepository, normalize_url};
use std::path::{Path, PathBuf};

const SETTINGS_NAMESPACE: &str = "http://maven.apache.org/SETTINGS/1.2.0";
const SETTINGS_SCHEMA: &str =
    "http://maven.apache.org/SETTINGS/1.2.0 https://maven.apache.org/xsd/settings-1.2.0.xsd";

pub const SETTINGS_FILE: &str = "settings.xml";
pub const SETTINGS_PROFILE_ID: &str = "jvmdeps-repositories";

/// Elements that conventionally follow `<repositories>` in a POM.
const AFTER_REPOSITORIES: &[&str] = &[
    "pluginRepositories",
    "build",
    "reporting",
    "profiles",
];

/// A `<server>` entry in `settings.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCredentials {
    pub id: String,
    pub username: String,
    pub password: String,
}

impl ServerCredentials {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// `~/.m2/settings.xml` for the current user.
pub fn user_settings_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".m2").join(SETTINGS_FILE))
}

fn new_settings() -> Document {
    Document::new(
        Element::new("settings")
            .attribute("xmlns", SETTINGS_NAMESPACE)
            .attribute("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance")
            .attribute("xsi:schemaLocation", SETTINGS_SCHEMA),
    )
}

fn parse_root(text: &str, expected: &str) -> Result<Document> {
    let doc = Document::parse(text)?;
    if doc.root.name != expected {
        return Err(MavenError::UnexpectedRoot {
            expected: expected.to_string(),
            found: doc.root.name,
        });
    }
    Ok(doc)
}

fn finish(path: &Path, original: &str, doc: &Document) -> Option<FileEdit> {
    match doc.to_xml() {
        Ok(updated) if updated != original => Some(FileEdit::new(path, original, updated)),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Failed to serialize {}: {}", path.display(), e);
            None
        }
    }
}

fn repository_matches(element: &Element, id: &str, url: &str) -> bool {
    element.child_text("id").as_deref() == Some(id)
        || element
            .child_text("url")
            .is_some_and(|u| normalize_url(&u) == url)
}

fn repository_element(repository: &RemoteRepository) -> Element {
    let mut element = Element::new("repository");
    element.push(Element::with_text("id", repository.id.as_str()));
    if let Some(name) = &repository.name {
        element.push(Element::with_text("name", name.as_str()));
    }
    element.push(Element::with_text("url", repository.normalized_url()));
    element
}

/// Returns `<repositories>`, creating it before the first element that
/// conventionally follows it.
fn ensure_repositories(project: &mut Element) -> &mut Element {
    if project.child("repositories").is_none() {
        let position = project
            .children
            .iter()
            .position(|n| {
                matches!(n, Node::Element(e) if AFTER_REPOSITORIES.contains(&e.name.as_str()))
            })
            .unwrap_or(project.children.len());
        project.children.insert(
            position,
            Node::Element(Element::new("repositories")),
        );
    }
    project.ensure_child("repositories")
}

/// Declares `repository` in the POM's `<repositories>` block.
///
/// Returns `None` when a repository with the same id or URL is already
/// declared, or when the POM cannot be parsed.
pub fn add_repository(path: &Path, text: &str, repository: &RemoteRepository) -> Option<FileEdit> {
    let mut doc = parse_root(text, "project")
        .map_err(|e| tracing::warn!("Cannot add repository to {}: {}", path.display(), e))
        .ok()?;

    let url = repository.normalized_url();
    if let Some(existing) = doc.root.child("repositories")
        && existing
            .children_named("repository")
            .any(|r| repository_matches(r, &repository.id, url))
    {
        tracing::debug!("Repository {} already declared in {}", repository.id, path.display());
        return None;
    }

    ensure_repositories(&mut doc.root).push(repository_element(repository));

    finish(path, text, &doc)
}

/// Removes repositories whose id or URL equals `id_or_url`. An emptied
/// `<repositories>` block is removed too.
pub fn remove_repository(path: &Path, text: &str, id_or_url: &str) -> Option<FileEdit> {
    let mut doc = parse_root(text, "project")
        .map_err(|e| tracing::warn!("Cannot remove repository from {}: {}", path.display(), e))
        .ok()?;

    let url = normalize_url(id_or_url);
    let repositories = doc.root.child_mut("repositories")?;
    if repositories.remove_where(|r| repository_matches(r, id_or_url, url)) == 0 {
        return None;
    }
    if repositories.elements().next().is_none() {
        doc.root.remove_where(|e| e.name == "repositories");
    }

    finish(path, text, &doc)
}

fn is_settings_profile(element: &Element) -> bool {
    element.name == "profile" && element.child_text("id").as_deref() == Some(SETTINGS_PROFILE_ID)
}

/// Returns the engine's profile, creating `<profiles>` ahead of
/// `<activeProfiles>` and the profile itself when missing.
fn ensure_settings_profile(settings: &mut Element) -> &mut Element {
    if settings.child("profiles").is_none() {
        let position = settings
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.name == "activeProfiles"))
            .unwrap_or(settings.children.len());
        settings
            .children
            .insert(position, Node::Element(Element::new("profiles")));
    }

    let profiles = settings.ensure_child("profiles");
    let index = profiles
        .children
        .iter()
        .position(|n| matches!(n, Node::Element(e) if is_settings_profile(e)));
    let index = index.unwrap_or_else(|| {
        let mut profile = Element::new("profile");
        profile.push(Element::with_text("id", SETTINGS_PROFILE_ID));
        profiles.push(profile);
        profiles.children.len() - 1
    });
    match &mut profiles.children[index] {
        Node::Element(e) => e,
        _ => unreachable!("index points at an element"),
    }
}

fn activate_settings_profile(settings: &mut Element) {
    let active = settings.ensure_child("activeProfiles");
    if !active
        .children_named("activeProfile")
        .any(|p| p.text().as_deref() == Some(SETTINGS_PROFILE_ID))
    {
        active.push(Element::with_text("activeProfile", SETTINGS_PROFILE_ID));
    }
}

/// Declares `repository` in `settings.xml`, creating the document when
/// `text` is empty.
///
/// Returns `None` when any profile already declares the same id or URL, or
/// when the file is not a settings document.
pub fn add_settings_repository(
    path: &Path,
    text: &str,
    repository: &RemoteRepository,
) -> Option<FileEdit> {
    let mut doc = if text.trim().is_empty() {
        new_settings()
    } else {
        parse_root(text, "settings")
            .map_err(|e| tracing::warn!("Cannot add repository to {}: {}", path.display(), e))
            .ok()?
    };

    let url = repository.normalized_url();
    let declared = doc.root.child("profiles").is_some_and(|profiles| {
        profiles
            .children_named("profile")
            .filter_map(|p| p.child("repositories"))
            .flat_map(|r| r.children_named("repository"))
            .any(|r| repository_matches(r, &repository.id, url))
    });
    if declared {
        tracing::debug!("Repository {} already declared in {}", repository.id, path.display());
        return None;
    }

    ensure_settings_profile(&mut doc.root)
        .ensure_child("repositories")
        .push(repository_element(repository));
    activate_settings_profile(&mut doc.root);

    finish(path, text, &doc)
}

/// Removes repositories whose id or URL equals `id_or_url` from every
/// profile in `settings.xml`.
pub fn remove_settings_repository(path: &Path, text: &str, id_or_url: &str) -> Option<FileEdit> {
    let mut doc = parse_root(text, "settings")
        .map_err(|e| tracing::warn!("Cannot remove repository from {}: {}", path.display(), e))
        .ok()?;

    let url = normalize_url(id_or_url);
    let profiles = doc.root.child_mut("profiles")?;
    let mut removed = 0;
    for node in &mut profiles.children {
        if let Node::Element(profile) = node
            && profile.name == "profile"
            && let Some(repositories) = profile.child_mut("repositories")
        {
            removed += repositories.remove_where(|r| repository_matches(r, id_or_url, url));
            if repositories.elements().next().is_none() {
                profile.remove_where(|e| e.name == "repositories");
            }
        }
    }
    if removed == 0 {
        return None;
    }

    finish(path, text, &doc)
}

/// Writes `server` into `settings.xml`, creating the document when `text`
/// is empty.
///
/// An existing entry with the same id is updated in place. Returns `None`
/// when it already holds the same credentials.
pub fn add_server(path: &Path, text: &str, server: &ServerCredentials) -> Option<FileEdit> {
    let mut doc = if text.trim().is_empty() {
        new_settings()
    } else {
        parse_root(text, "settings")
            .map_err(|e| tracing::warn!("Cannot add server to {}: {}", path.display(), e))
            .ok()?
    };

    let servers = doc.root.ensure_child("servers");
    let existing = servers.children.iter_mut().find_map(|n| match n {
        Node::Element(e)
            if e.name == "server" && e.child_text("id").as_deref() == Some(server.id.as_str()) =>
        {
            Some(e)
        }
        _ => None,
    });

    match existing {
        Some(entry) => {
            if entry.child_text("username").as_deref() == Some(server.username.as_str())
                && entry.child_text("password").as_deref() == Some(server.password.as_str())
            {
                return None;
            }
            entry.set_child_text("username", server.username.as_str());
            entry.set_child_text("password", server.password.as_str());
        }
        None => {
            let mut entry = Element::new("server");
            entry.push(Element::with_text("id", server.id.as_str()));
            entry.push(Element::with_text("username", server.username.as_str()));
            entry.push(Element::with_text("password", server.password.as_str()));
            servers.push(entry);
        }
    }

    finish(path, text, &doc)
}

/// Removes the `<server>` with `id` from `settings.xml`.
pub fn remove_server(path: &Path, text: &str, id: &str) -> Option<FileEdit> {
    let mut doc = parse_root(text, "settings")
        .map_err(|e| tracing::warn!("Cannot remove server from {}: {}", path.display(), e))
        .ok()?;
    let servers = doc.root.child_mut("servers")?;
    if servers.remove_where(|s| s.child_text("id").as_deref() == Some(id)) == 0 {
        return None;
    }
    finish(path, text, &doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project>
    <modelVersion>4.0.0</modelVersion>
    <groupId>com.example</groupId>
    <artifactId>app</artifactId>
    <version>1.0</version>
    <build>
        <plugins>
            <plugin>
                <artifactId>maven-compiler-plugin</artifactId>
            </plugin>
        </plugins>
    </build>
</project>
"#;

    fn pom_path() -> PathBuf {
        PathBuf::from("/p/pom.xml")
    }

    #[test]
    fn test_add_repository_creates_block_before_build() {
        let repo = RemoteRepository::new("nexus", "https://nexus.example.com/repository/maven/")
            .with_name("Company Nexus");
        let edit = add_repository(&pom_path(), POM, &repo).unwrap();

        assert_eq!(edit.original, POM);
        assert!(edit.updated.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(edit.updated.contains(
            "  <repositories>
    <repository>
      <id>nexus</id>
      <name>Company Nexus</name>
      <url>https://nexus.example.com/repository/maven</url>
    </repository>
  </repositories>
  <build>"
        ));
    }

    #[test]
    fn test_add_repository_twice_is_noop() {
        let repo = RemoteRepository::new("nexus", "https://nexus.example.com/maven");
        let first = add_repository(&pom_path(), POM, &repo).unwrap();

        assert!(add_repository(&pom_path(), &first.updated, &repo).is_none());

        let same_url = RemoteRepository::new("other", "https://nexus.example.com/maven/");
        assert!(add_repository(&pom_path(), &first.updated, &same_url).is_none());
    }

    #[test]
    fn test_remove_repository() {
        let repo = RemoteRepository::new("nexus", "https://nexus.example.com/maven");
        let added = add_repository(&pom_path(), POM, &repo).unwrap();

        let removed = remove_repository(&pom_path(), &added.updated, "nexus").unwrap();
        assert!(!removed.updated.contains("<repositories>"));
        assert!(removed.updated.contains("<artifactId>maven-compiler-plugin</artifactId>"));

        assert!(remove_repository(&pom_path(), &removed.updated, "nexus").is_none());
    }

    #[test]
    fn test_remove_repository_by_url() {
        let repo = RemoteRepository::new("nexus", "https://nexus.example.com/maven");
        let added = add_repository(&pom_path(), POM, &repo).unwrap();
        let removed =
            remove_repository(&pom_path(), &added.updated, "https://nexus.example.com/maven/");
        assert!(removed.is_some());
    }

    #[test]
    fn test_add_repository_rejects_non_pom() {
        let repo = RemoteRepository::new("nexus", "https://nexus.example.com/maven");
        assert!(add_repository(&pom_path(), "<settings/>", &repo).is_none());
        assert!(add_repository(&pom_path(), "<project>", &repo).is_none());
    }

    #[test]
    fn test_add_server_creates_settings() {
        let path = PathBuf::from("/home/u/.m2/settings.xml");
        let server = ServerCredentials::new("nexus", "deployer", "s3cr&t");
        let edit = add_server(&path, "", &server).unwrap();

        assert_eq!(edit.original, "");
        let prolog = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
        assert!(edit.updated.starts_with(prolog));
        assert!(edit.updated[prolog.len()..]
            .starts_with("<settings xmlns=\"http://maven.apache.org/SETTINGS/1.2.0\""));
        assert!(edit.updated.contains(
            "  <servers>
    <server>
      <id>nexus</id>
      <username>deployer</username>
      <password>s3cr&amp;t</password>
    </server>
  </servers>
</settings>
"
        ));
    }

    #[test]
    fn test_add_server_updates_existing_entry() {
        let path = PathBuf::from("settings.xml");
        let first = add_server(&path, "", &ServerCredentials::new("nexus", "a", "1")).unwrap();

        let same = ServerCredentials::new("nexus", "a", "1");
        assert!(add_server(&path, &first.updated, &same).is_none());

        let second =
            add_server(&path, &first.updated, &ServerCredentials::new("nexus", "b", "2")).unwrap();
        assert_eq!(second.updated.matches("<server>").count(), 1);
        assert!(second.updated.contains("<username>b</username>"));

        let third =
            add_server(&path, &second.updated, &ServerCredentials::new("azure", "c", "3")).unwrap();
        assert_eq!(third.updated.matches("<server>").count(), 2);

        let removed = remove_server(&path, &third.updated, "nexus").unwrap();
        assert_eq!(removed.updated.matches("<server>").count(), 1);
        assert!(remove_server(&path, &removed.updated, "nexus").is_none());
    }

    #[test]
    fn test_settings_repository_goes_into_active_profile() {
        let path = PathBuf::from("/home/u/.m2/settings.xml");
        let text = "<settings>\n  <servers/>\n</settings>\n";
        let repo = RemoteRepository::new("nexus", "https://nexus.example.com/repository/public/");
        let edit = add_settings_repository(&path, text, &repo).unwrap();
        assert!(!edit.updated.contains("repositories {"));

        let doc = Document::parse(&edit.updated).unwrap();
        assert_eq!(doc.root.name, "settings");
        let profile = doc
            .root
            .child("profiles")
            .and_then(|p| p.child("profile"))
            .unwrap();
        assert_eq!(profile.child_text("id").as_deref(), Some(SETTINGS_PROFILE_ID));
        let declared = profile
            .child("repositories")
            .and_then(|r| r.child("repository"))
            .unwrap();
        assert_eq!(declared.child_text("id").as_deref(), Some("nexus"));
        assert_eq!(
            declared.child_text("url").as_deref(),
            Some("https://nexus.example.com/repository/public")
        );
        let active = doc.root.child("activeProfiles").unwrap();
        assert_eq!(active.child_text("activeProfile").as_deref(), Some(SETTINGS_PROFILE_ID));

        assert!(add_settings_repository(&path, &edit.updated, &repo).is_none());
        let same_url =
            RemoteRepository::new("other", "https://nexus.example.com/repository/public");
        assert!(add_settings_repository(&path, &edit.updated, &same_url).is_none());

        let removed = remove_settings_repository(&path, &edit.updated, "nexus").unwrap();
        assert!(!removed.updated.contains("<repository>"));
        assert!(removed.updated.contains("<servers"));
        assert!(remove_settings_repository(&path, &removed.updated, "nexus").is_none());
    }

    #[test]
    fn test_settings_repository_rejects_pom() {
        let path = PathBuf::from("settings.xml");
        let repo = RemoteRepository::new("nexus", "https://nexus.example.com/maven");
        assert!(add_settings_repository(&path, POM, &repo).is_none());
        assert!(remove_settings_repository(&path, POM, "nexus").is_none());

        let created = add_settings_repository(&path, "", &repo).unwrap();
        assert!(created.updated.contains(SETTINGS_NAMESPACE));
        assert!(created.updated.contains("<activeProfile>jvmdeps-repositories</activeProfile>"));
    }

    #[test]
    fn test_user_settings_path() {
        if let Some(path) = user_settings_path() {
            assert!(path.ends_with(".m2/settings.xml"));
        }
    }
}
