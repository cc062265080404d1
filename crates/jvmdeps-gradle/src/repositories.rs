//! Repository declarations in build and settings scripts.
//!
//! Well-known repositories are written as their shorthand call
//! (`mavenCentral()`); everything else becomes a `maven { }` block whose
//! credentials reference `<id>User` / `<id>Password` Gradle properties.

use crate::gradle_properties::{password_property, username_property};
use crate::lexer::{Block, MaskedText};
use crate::patch::{append_block, insert_into_block, nest};
use jvmdeps_core::edit::{indent_unit, remove_span};
use jvmdeps_core::parser::is_gradle_settings;
use jvmdeps_core::{DslFlavor, FileEdit, RemoteRepository, Span, normalize_url};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Which `repositories { }` block to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryTarget {
    /// Top-level `repositories { }` of a build script.
    Project,
    /// `dependencyResolutionManagement { repositories { } }` of a settings
    /// script.
    Settings,
}

impl RepositoryTarget {
    /// Settings scripts get the `dependencyResolutionManagement` block.
    pub fn for_path(path: &Path) -> Self {
        if is_gradle_settings(path) {
            Self::Settings
        } else {
            Self::Project
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnownRepository {
    MavenCentral,
    Google,
    GradlePluginPortal,
}

impl WellKnownRepository {
    pub const ALL: [Self; 3] = [Self::MavenCentral, Self::Google, Self::GradlePluginPortal];

    pub const fn call_name(self) -> &'static str {
        match self {
            Self::MavenCentral => "mavenCentral",
            Self::Google => "google",
            Self::GradlePluginPortal => "gradlePluginPortal",
        }
    }

    /// Host and path of the repository's known mirrors, scheme excluded.
    pub const fn urls(self) -> &'static [&'static str] {
        match self {
            Self::MavenCentral => &["repo.maven.apache.org/maven2", "repo1.maven.org/maven2"],
            Self::Google => &["maven.google.com", "dl.google.com/dl/android/maven2"],
            Self::GradlePluginPortal => &["plugins.gradle.org/m2"],
        }
    }

    pub fn from_url(url: &str) -> Option<Self> {
        let url = normalize_url(url);
        let bare = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or(url)
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|repo| repo.urls().contains(&bare.as_str()))
    }

    pub fn from_call_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|repo| repo.call_name() == name)
    }
}

/// A repository found in a `repositories { }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredRepository {
    pub name: Option<String>,
    pub url: Option<String>,
    pub well_known: Option<WellKnownRepository>,
    pub span: Span,
}

impl DeclaredRepository {
    /// Whether this declaration stands for `key`: a repository name, a
    /// shorthand call name or a URL.
    pub fn matches(&self, key: &str) -> bool {
        let key_url = normalize_url(key);
        self.name.as_deref() == Some(key)
            || self.url.as_deref().map(normalize_url) == Some(key_url)
            || self.well_known.is_some_and(|w| {
                w.call_name() == key || WellKnownRepository::from_url(key) == Some(w)
            })
    }

    fn declares(&self, repo: &RemoteRepository) -> bool {
        if let Some(known) = WellKnownRepository::from_url(&repo.url) {
            return self.well_known == Some(known);
        }
        self.matches(&repo.id)
            || repo.name.as_deref().is_some_and(|n| self.matches(n))
            || self.matches(repo.normalized_url())
    }
}

static RE_URL: OnceLock<Regex> = OnceLock::new();
static RE_NAME: OnceLock<Regex> = OnceLock::new();

/// `url = uri("x")`, `url 'x'`, `url = "x"`, `setUrl("x")`
fn re_url() -> &'static Regex {
    RE_URL.get_or_init(|| {
        Regex::new(r#"\b(?:url|setUrl)\s*(?:=\s*)?\(?\s*(?:uri\s*\(\s*)?["']([^"']+)["']"#)
            .unwrap()
    })
}

fn re_name() -> &'static Regex {
    RE_NAME.get_or_init(|| Regex::new(r#"\bname\s*(?:=\s*)?\(?\s*["']([^"']+)["']"#).unwrap())
}

fn repositories_block(masked: &MaskedText, target: RepositoryTarget) -> Option<Block> {
    match target {
        RepositoryTarget::Project => masked.top_level_block("repositories"),
        RepositoryTarget::Settings => {
            let management = masked.top_level_block("dependencyResolutionManagement")?;
            masked.child_block(&management, "repositories")
        }
    }
}

fn skip_inline_space(bytes: &[u8], mut pos: usize) -> usize {
    while matches!(bytes.get(pos), Some(b' ' | b'\t')) {
        pos += 1;
    }
    pos
}

fn declared_in(masked: &MaskedText, block: &Block) -> Vec<DeclaredRepository> {
    let text = masked.as_str();
    let bytes = text.as_bytes();
    let depth = masked.depth_at(block.open) + 1;
    let direct = |pos: usize| block.contains(pos) && masked.depth_at(pos) == depth;
    let mut found = Vec::new();

    for known in WellKnownRepository::ALL {
        for start in masked.identifiers(known.call_name()).filter(|&p| direct(p)) {
            let open = skip_inline_space(bytes, start + known.call_name().len());
            if bytes.get(open) != Some(&b'(') {
                continue;
            }
            let Some(close) = masked.matching(open) else { continue };
            found.push(DeclaredRepository {
                name: None,
                url: known.urls().first().map(|u| format!("https://{u}")),
                well_known: Some(known),
                span: Span::from_bounds(start, close + 1),
            });
        }
    }

    for start in masked.identifiers("maven").filter(|&p| direct(p)) {
        let mut end = skip_inline_space(bytes, start + "maven".len());
        let mut url = None;
        if bytes.get(end) == Some(&b'(') {
            // `maven("https://...")`
            let Some(close) = masked.matching(end) else { continue };
            url = masked
                .first_string_in(end..close)
                .map(|r| text[r.start + 1..r.end - 1].to_string());
            end = skip_inline_space(bytes, close + 1);
        }

        let mut name = None;
        let mut span_end = end;
        if bytes.get(end) == Some(&b'{') {
            let Some(close) = masked.matching(end) else { continue };
            let body = &text[end..close];
            if url.is_none() {
                url = re_url().captures(body).map(|c| c[1].to_string());
            }
            name = re_name().captures(body).map(|c| c[1].to_string());
            span_end = close + 1;
        } else if url.is_none() {
            continue;
        }

        found.push(DeclaredRepository {
            name,
            url,
            well_known: None,
            span: Span::from_bounds(start, span_end),
        });
    }

    found.sort_by_key(|r| r.span.offset);
    found
}

/// Repositories declared in the target block, in source order.
pub fn declared_repositories(text: &str, target: RepositoryTarget) -> Vec<DeclaredRepository> {
    let masked = MaskedText::new(text);
    repositories_block(&masked, target)
        .map(|block| declared_in(&masked, &block))
        .unwrap_or_default()
}

/// Declaration text for `repo`, indented with `unit` below its first line.
pub fn repository_statement(flavor: DslFlavor, repo: &RemoteRepository, unit: &str) -> String {
    if let Some(known) = WellKnownRepository::from_url(&repo.url) {
        return format!("{}()", known.call_name());
    }

    let q = |s: &str| flavor.quote(s);
    let name = repo.name.as_deref().unwrap_or(&repo.id);
    let mut lines = vec![format!("name = {}", q(name))];
    lines.push(match flavor {
        DslFlavor::Kotlin => format!("url = uri({})", q(&repo.url)),
        DslFlavor::Groovy => format!("url = {}", q(&repo.url)),
    });
    if repo.credentials {
        let property = |p: String| format!("providers.gradleProperty({}).orNull", q(&p));
        let credentials = format!(
            "username = {}\npassword = {}",
            property(username_property(&repo.id)),
            property(password_property(&repo.id))
        );
        lines.push(nest("credentials", &credentials, unit));
    }
    nest("maven", &lines.join("\n"), unit)
}

/// Declares `repo` in the target block, creating missing blocks. `None` when
/// an equivalent declaration already exists.
pub fn add_repository(
    path: &Path,
    text: &str,
    repo: &RemoteRepository,
    target: RepositoryTarget,
) -> Option<FileEdit> {
    let flavor = DslFlavor::from_path(path);
    let masked = MaskedText::new(text);
    let unit = indent_unit(text);
    let statement = repository_statement(flavor, repo, &unit);

    let updated = match repositories_block(&masked, target) {
        Some(block) => {
            if declared_in(&masked, &block).iter().any(|d| d.declares(repo)) {
                tracing::debug!("Repository {} already declared in {}", repo.id, path.display());
                return None;
            }
            insert_into_block(text, &block, &statement)?
        }
        None => {
            let repositories = nest("repositories", &statement, &unit);
            match target {
                RepositoryTarget::Project => append_block(text, &repositories),
                RepositoryTarget::Settings => {
                    match masked.top_level_block("dependencyResolutionManagement") {
                        Some(management) => insert_into_block(text, &management, &repositories)?,
                        None => append_block(
                            text,
                            &nest("dependencyResolutionManagement", &repositories, &unit),
                        ),
                    }
                }
            }
        }
    };

    Some(FileEdit::new(path, text, updated))
}

/// Removes the first declaration matching `id_or_url` (a repository name,
/// shorthand call name or URL).
pub fn remove_repository(
    path: &Path,
    text: &str,
    id_or_url: &str,
    target: RepositoryTarget,
) -> Option<FileEdit> {
    let declared = declared_repositories(text, target);
    let found = declared.iter().find(|d| d.matches(id_or_url))?;
    let updated = remove_span(text, found.span)?;
    Some(FileEdit::new(path, text, updated))
}
