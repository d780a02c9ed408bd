//! Guaranteed removal of transient artifacts.
//!
//! Every file written while serving a request is owned by one of the guards
//! here, so it is removed on every exit path, including early returns and
//! panics. Removal is idempotent and failures are logged, never surfaced.

use std::path::{Path, PathBuf};

/// Remove a file if it is present.
///
/// Returns `true` when the path is absent afterwards. A missing path is not
/// an error; a failed removal is logged at `warn` and reported as `false`.
pub fn discard(path: &Path) -> bool {
    if !path.exists() {
        return true;
    }

    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::trace!(path = %path.display(), "Removed transient file");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to remove transient file: {e}");
            false
        }
    }
}

/// Scope guard that discards every tracked path when dropped.
#[derive(Debug, Default)]
pub struct TransientGuard {
    paths: Vec<PathBuf>,
}

impl TransientGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path for removal and hand it back.
    pub fn track(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }

    /// Stop tracking `path`, transferring its removal obligation to the
    /// caller. Returns `false` if the path was not tracked.
    pub fn release(&mut self, path: &Path) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| p != path);
        self.paths.len() != before
    }

    /// Remove everything tracked so far, leaving the guard empty.
    pub fn sweep(&mut self) {
        for path in self.paths.drain(..) {
            discard(&path);
        }
    }

    /// Number of paths still owed a removal.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Drop for TransientGuard {
    fn drop(&mut self) {
        self.sweep();
    }
}

/// Removal obligation for a file that outlives the function that made it.
///
/// The file is discarded when this value is dropped. Moving it into a
/// response body stream ties the removal to the end of delivery.
#[derive(Debug)]
pub struct DeferredRemoval {
    path: PathBuf,
}

impl DeferredRemoval {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The file this guard will remove.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DeferredRemoval {
    fn drop(&mut self) {
        if discard(&self.path) {
            tracing::debug!(path = %self.path.display(), "Removed delivered file");
        }
    }
}
