//! Gradle build script scanner.
//!
//! Scripts are read through a [`MaskedText`] view, so declarations inside
//! comments are never reported and spans index the original text.

pub mod catalog;
pub mod dependencies;
pub mod plugins;
pub mod variables;

use crate::error::{GradleError, Result};
use crate::gradle_properties::{GRADLE_PROPERTIES_FILE, parse_properties};
use crate::lexer::MaskedText;
use catalog::VersionCatalog;
use jvmdeps_core::parser::{SETTINGS_GROOVY_FILE, SETTINGS_KOTLIN_FILE};
use jvmdeps_core::{DslFlavor, InstalledDependency, InstalledPlugin};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use variables::VariableTable;

/// Configurations recognized as dependency declarations.
pub const DEFAULT_CONFIGURATIONS: &[&str] = &[
    "implementation",
    "api",
    "testImplementation",
    "runtimeOnly",
    "compileOnly",
    "annotationProcessor",
    "testRuntimeOnly",
    "testCompileOnly",
];

/// Project-level inputs needed to resolve one build script.
#[derive(Debug, Clone, Default)]
pub struct ScanContext {
    pub module_name: String,
    /// Merged `gradle.properties` (module entries override the root's).
    pub properties: HashMap<String, String>,
    pub catalog: Option<Arc<VersionCatalog>>,
    pub extra_configurations: Vec<String>,
}

impl ScanContext {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<VersionCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn with_extra_configurations(mut self, configurations: Vec<String>) -> Self {
        self.extra_configurations = configurations;
        self
    }

    /// Builds the context for `build_file` from disk: the module name is the
    /// script's directory name, properties come from the root project's and
    /// the module's `gradle.properties`, and the catalog from the root's
    /// `gradle/libs.versions.toml`.
    pub fn discover(build_file: &Path) -> Self {
        let module_dir = build_file.parent().unwrap_or_else(|| Path::new("."));
        let root = project_root(module_dir);

        let mut properties = HashMap::new();
        let mut property_files = vec![root.join(GRADLE_PROPERTIES_FILE)];
        if root != module_dir {
            property_files.push(module_dir.join(GRADLE_PROPERTIES_FILE));
        }
        for file in property_files {
            if let Ok(content) = std::fs::read_to_string(&file) {
                properties.extend(parse_properties(&content));
            }
        }

        let catalog = catalog::find_catalog(build_file).and_then(|path| {
            VersionCatalog::load(&path)
                .map_err(|e| tracing::warn!("Ignoring version catalog {}: {}", path.display(), e))
                .ok()
        });

        Self {
            module_name: module_name(build_file),
            properties,
            catalog: catalog.map(Arc::new),
            extra_configurations: Vec::new(),
        }
    }

    /// Default vocabulary followed by the configured extras.
    pub fn configurations(&self) -> impl Iterator<Item = &str> {
        DEFAULT_CONFIGURATIONS
            .iter()
            .copied()
            .chain(self.extra_configurations.iter().map(String::as_str))
    }
}

/// Directory name of the build script.
pub fn module_name(build_file: &Path) -> String {
    build_file
        .parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Nearest ancestor holding a settings script, else `dir` itself.
pub fn project_root(dir: &Path) -> PathBuf {
    dir.ancestors()
        .find(|d| {
            d.join(SETTINGS_KOTLIN_FILE).is_file() || d.join(SETTINGS_GROOVY_FILE).is_file()
        })
        .unwrap_or(dir)
        .to_path_buf()
}

/// Everything declared in one build script, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradleScan {
    pub dependencies: Vec<InstalledDependency>,
    pub plugins: Vec<InstalledPlugin>,
}

/// A script prepared for scanning.
pub(crate) struct Script<'a> {
    pub(crate) text: &'a str,
    pub(crate) masked: MaskedText,
    pub(crate) path: &'a Path,
    pub(crate) flavor: DslFlavor,
    pub(crate) variables: VariableTable,
    pub(crate) context: &'a ScanContext,
}

impl<'a> Script<'a> {
    pub(crate) fn new(path: &'a Path, text: &'a str, context: &'a ScanContext) -> Self {
        let masked = MaskedText::new(text);
        let variables = VariableTable::new(&masked, &context.properties);
        Self {
            text,
            masked,
            path,
            flavor: DslFlavor::from_path(path),
            variables,
            context,
        }
    }
}

/// Scans a `build.gradle` or `build.gradle.kts` script.
///
/// Unbalanced braces make the whole file unusable for span-based editing and
/// are reported as a parse error.
pub fn parse_build_file(path: &Path, content: &str, context: &ScanContext) -> Result<GradleScan> {
    let script = Script::new(path, content, context);
    if script.masked.depth_at(content.len()) != 0 {
        return Err(GradleError::ParseError {
            message: format!("unbalanced braces in {}", path.display()),
        });
    }

    let dependencies = dependencies::scan_dependencies(&script);
    let plugins = plugins::scan_plugins(&script);
    tracing::debug!(
        "{}: {} dependencies, {} plugins",
        path.display(),
        dependencies.len(),
        plugins.len()
    );

    Ok(GradleScan {
        dependencies,
        plugins,
    })
}
