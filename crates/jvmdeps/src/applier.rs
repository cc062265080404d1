//! Commits previewed edits through a [`TextSource`].
//!
//! An edit is only written when the file still holds exactly the text the
//! edit was computed from. Anything else fails with
//! [`DepsError::StaleContent`] and leaves the file untouched.

use jvmdeps_core::{DepsError, FileEdit, Result, TextSource};
use similar::TextDiff;
use std::sync::Arc;

#[derive(Clone)]
pub struct ChangeApplier {
    source: Arc<dyn TextSource>,
}

impl ChangeApplier {
    pub fn new(source: Arc<dyn TextSource>) -> Self {
        Self { source }
    }

    fn check_fresh(&self, edit: &FileEdit) -> Result<()> {
        let current = self.source.read_text(&edit.path)?;
        if current == edit.original {
            Ok(())
        } else {
            tracing::warn!("{} changed since the edit was computed", edit.path.display());
            Err(DepsError::StaleContent {
                path: edit.path.clone(),
            })
        }
    }

    /// Writes `edit.updated` as one replacement of the whole file.
    pub fn apply(&self, edit: &FileEdit, label: &str) -> Result<()> {
        if edit.is_noop() {
            tracing::debug!("{}: nothing to change in {}", label, edit.path.display());
            return Ok(());
        }
        self.check_fresh(edit)?;
        self.source.write_text(&edit.path, &edit.updated, label)
    }

    /// Applies several edits, checking all of them before writing any.
    pub fn apply_all(&self, edits: &[FileEdit], label: &str) -> Result<()> {
        for edit in edits {
            self.check_fresh(edit)?;
        }
        for edit in edits.iter().filter(|e| !e.is_noop()) {
            self.source.write_text(&edit.path, &edit.updated, label)?;
        }
        Ok(())
    }
}

/// Unified diff of an edit with three lines of context around each hunk.
pub fn preview(edit: &FileEdit) -> String {
    let path = edit.path.display().to_string();
    TextDiff::from_lines(&edit.original, &edit.updated)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}
