//! Live preview file.
//!
//! The latest artifact is written to a file that a browser (or any file
//! watcher) can keep open. An empty artifact writes a placeholder.

use std::path::{Path, PathBuf};

/// Written whenever there is nothing to preview.
pub const PLACEHOLDER: &str = "<!-- Waiting for HTML artifact... -->";

#[derive(Debug, Clone)]
pub struct PreviewFile {
    path: PathBuf,
}

impl PreviewFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file contents with `body`, or the placeholder when empty.
    ///
    /// Called from a debouncer callback, so it writes synchronously; a
    /// preview is a single small file.
    pub fn write(&self, body: &str) -> std::io::Result<()> {
        let content = if body.is_empty() { PLACEHOLDER } else { body };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)
    }

    /// Like [`write`](Self::write), logging failures instead of returning them.
    pub fn refresh(&self, body: &str) {
        match self.write(body) {
            Ok(()) => tracing::debug!(path = %self.path.display(), bytes = body.len(), "preview refreshed"),
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to write preview"),
        }
    }
}
