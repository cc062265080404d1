//! Text source seam between the engine and whatever owns build-file content.
//!
//! Writes are all-or-nothing replacements of the whole file; readers never
//! observe a partially written file.

use crate::error::{DepsError, Result};
use dashmap::DashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

pub trait TextSource: Send + Sync {
    fn read_text(&self, path: &Path) -> Result<String>;

    /// Replaces the whole content of `path`. `label` names the transaction
    /// (shown in undo history by IDE hosts, logged here).
    fn write_text(&self, path: &Path, text: &str, label: &str) -> Result<()>;
}

/// Local filesystem text source.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target while an exclusive write lock is held.
#[derive(Default)]
pub struct FsTextSource {
    write_lock: Mutex<()>,
}

impl FsTextSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextSource for FsTextSource {
    fn read_text(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(DepsError::Io)
    }

    fn write_text(&self, path: &Path, text: &str, label: &str) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.flush()?;
        // The rename replaces the target inode, so carry its mode over.
        if let Ok(meta) = std::fs::metadata(path) {
            tmp.as_file().set_permissions(meta.permissions())?;
        }
        tmp.persist(path).map_err(|e| DepsError::Io(e.error))?;

        tracing::info!("{}: wrote {} ({} bytes)", label, path.display(), text.len());
        Ok(())
    }
}

/// In-memory text source for hosts that keep documents open in an editor.
#[derive(Default)]
pub struct MemoryTextSource {
    files: DashMap<PathBuf, String>,
    writes: AtomicUsize,
}

impl MemoryTextSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }

    pub fn get(&self, path: &Path) -> Option<String> {
        self.files.get(path).map(|t| t.clone())
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl TextSource for MemoryTextSource {
    fn read_text(&self, path: &Path) -> Result<String> {
        self.get(path).ok_or_else(|| {
            DepsError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not open", path.display()),
            ))
        })
    }

    fn write_text(&self, path: &Path, text: &str, label: &str) -> Result<()> {
        tracing::debug!("{}: replacing {} in memory", label, path.display());
        self.files.insert(path.to_path_buf(), text.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
