//! Project-wide build file discovery and scanning.
//!
//! Walks a project tree in file-name order, dispatches every recognized
//! manifest to the Gradle or Maven scanner and collects the records in
//! enumeration order. A file that fails to read or parse is logged and
//! reported in [`ScanReport::failures`]. The rest of the scan continues.

use crate::config::ScanConfig;
use jvmdeps_core::{BuildFileSyntax, InstalledDependency, InstalledPlugin, MavenInstalledPlugin};
use jvmdeps_gradle::ScanContext;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Build output, VCS, IDE and package-manager directories never scanned.
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    "build",
    "target",
    "out",
    ".git",
    ".svn",
    ".hg",
    ".gradle",
    ".idea",
    ".vscode",
    "node_modules",
    ".mvn",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Records found under one project root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub build_files: Vec<PathBuf>,
    pub dependencies: Vec<InstalledDependency>,
    pub plugins: Vec<InstalledPlugin>,
    pub maven_plugins: Vec<MavenInstalledPlugin>,
    pub failures: Vec<ScanFailure>,
}

impl ScanReport {
    /// Module names in first-seen order.
    pub fn modules(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.dependencies
            .iter()
            .map(|d| d.module_name.as_str())
            .chain(self.plugins.iter().map(|p| p.module_name.as_str()))
            .chain(self.maven_plugins.iter().map(|p| p.module_name.as_str()))
            .filter(|m| seen.insert(*m))
            .collect()
    }

    pub fn dependencies_in<'a>(
        &'a self,
        module: &'a str,
    ) -> impl Iterator<Item = &'a InstalledDependency> + 'a {
        self.dependencies.iter().filter(move |d| d.module_name == module)
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty() && self.plugins.is_empty() && self.maven_plugins.is_empty()
    }

    fn absorb(&mut self, scan: FileScan) {
        self.dependencies.extend(scan.dependencies);
        self.plugins.extend(scan.plugins);
        self.maven_plugins.extend(scan.maven_plugins);
    }
}

/// Records of a single build file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileScan {
    pub dependencies: Vec<InstalledDependency>,
    pub plugins: Vec<InstalledPlugin>,
    pub maven_plugins: Vec<MavenInstalledPlugin>,
}

#[derive(Debug, Clone)]
pub struct ProjectScanner {
    skip_dirs: HashSet<String>,
    extra_configurations: Vec<String>,
}

impl Default for ProjectScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectScanner {
    pub fn new() -> Self {
        Self {
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|d| (*d).to_string()).collect(),
            extra_configurations: Vec::new(),
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new()
            .with_skip_dirs(config.skip_dirs.iter().cloned())
            .with_extra_configurations(config.extra_configurations.clone())
    }

    #[must_use]
    pub fn with_skip_dirs(mut self, dirs: impl IntoIterator<Item = String>) -> Self {
        self.skip_dirs.extend(dirs);
        self
    }

    #[must_use]
    pub fn with_extra_configurations(mut self, configurations: Vec<String>) -> Self {
        self.extra_configurations = configurations;
        self
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.skip_dirs.contains(name))
    }

    /// Every build manifest under `root`, in walk order.
    pub fn build_files(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_skipped(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| BuildFileSyntax::detect(entry.path()).is_some())
            .map(DirEntry::into_path)
            .collect()
    }

    /// Scans one build file whose content is already in memory.
    pub fn scan_file(&self, path: &Path, content: &str) -> jvmdeps_core::Result<FileScan> {
        let Some(syntax) = BuildFileSyntax::detect(path) else {
            return Err(jvmdeps_core::DepsError::parse(
                "build file",
                format!("unrecognized build file {}", path.display()),
            ));
        };

        match syntax {
            BuildFileSyntax::GradleGroovy | BuildFileSyntax::GradleKotlin => {
                let context = ScanContext::discover(path)
                    .with_extra_configurations(self.extra_configurations.clone());
                let scan = jvmdeps_gradle::parse_build_file(path, content, &context)?;
                Ok(FileScan {
                    dependencies: scan.dependencies,
                    plugins: scan.plugins,
                    maven_plugins: Vec::new(),
                })
            }
            BuildFileSyntax::MavenXml => {
                let records = jvmdeps_maven::scan_pom(path, content)?;
                Ok(FileScan {
                    dependencies: records.dependencies,
                    plugins: Vec::new(),
                    maven_plugins: records.plugins,
                })
            }
        }
    }

    /// Scans every build file under `root`.
    pub fn scan(&self, root: &Path) -> ScanReport {
        let mut report = ScanReport::default();

        for path in self.build_files(root) {
            let result = std::fs::read_to_string(&path)
                .map_err(jvmdeps_core::DepsError::from)
                .and_then(|content| self.scan_file(&path, &content));
            match result {
                Ok(scan) => {
                    tracing::debug!(
                        "{}: {} dependencies, {} plugins",
                        path.display(),
                        scan.dependencies.len(),
                        scan.plugins.len() + scan.maven_plugins.len()
                    );
                    report.absorb(scan);
                }
                Err(e) => {
                    tracing::warn!("Failed to scan {}: {}", path.display(), e);
                    report.failures.push(ScanFailure {
                        path: path.clone(),
                        message: e.to_string(),
                    });
                }
            }
            report.build_files.push(path);
        }

        tracing::info!(
            "Scanned {} build files under {}: {} dependencies, {} plugins, {} failures",
            report.build_files.len(),
            root.display(),
            report.dependencies.len(),
            report.plugins.len() + report.maven_plugins.len(),
            report.failures.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_build_files_skip_conventional_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "settings.gradle", "include 'app'\n");
        write(root, "app/build.gradle", "");
        write(root, "lib/pom.xml", "<project/>");
        write(root, "build/generated/build.gradle", "");
        write(root, "node_modules/x/pom.xml", "<project/>");
        write(root, "generated/build.gradle.kts", "");
        write(root, "app/README.md", "");

        let scanner = ProjectScanner::new().with_skip_dirs(["generated".to_string()]);
        let files: Vec<_> = scanner
            .build_files(root)
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            files,
            vec![PathBuf::from("app/build.gradle"), PathBuf::from("lib/pom.xml")]
        );
    }

    #[test]
    fn test_scan_collects_records_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "app/build.gradle.kts",
            "dependencies {\n    implementation(\"com.google.guava:guava:31.0-jre\")\n}\n",
        );
        write(root, "broken/build.gradle", "dependencies {\n    implementation 'a:b:1.0'\n");
        write(
            root,
            "svc/pom.xml",
            "<project><artifactId>svc</artifactId><dependencies><dependency><groupId>org.slf4j</groupId><artifactId>slf4j-api</artifactId><version>2.0.9</version></dependency></dependencies></project>",
        );

        let report = ProjectScanner::new().scan(root);
        assert_eq!(report.build_files.len(), 3);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("broken/build.gradle"));

        let ids: Vec<_> = report.dependencies.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["com.google.guava:guava", "org.slf4j:slf4j-api"]);
        assert_eq!(report.modules(), vec!["app", "svc"]);
        assert_eq!(report.dependencies_in("svc").count(), 1);
    }

    #[test]
    fn test_extra_configurations_reach_gradle_scanner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app/build.gradle");
        let content = "dependencies {\n    kapt 'com.google.dagger:dagger-compiler:2.50'\n}\n";

        let plain = ProjectScanner::new().scan_file(&path, content).unwrap();
        assert!(plain.dependencies.is_empty());

        let scanner = ProjectScanner::new().with_extra_configurations(vec!["kapt".into()]);
        let scan = scanner.scan_file(&path, content).unwrap();
        assert_eq!(scan.dependencies[0].configuration, "kapt");
    }
}
