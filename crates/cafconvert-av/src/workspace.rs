//! Request-scoped transient storage.
//!
//! A [`RequestWorkspace`] is a private subdirectory of the upload root that
//! holds the input copies and intermediate outputs of exactly one request.
//! Two requests never share a workspace, so same-named uploads cannot
//! collide.

use std::path::{Path, PathBuf};

use cafconvert_core::{Error, RequestId, Result};
use tempfile::TempDir;

/// Private scratch directory for one request.
///
/// The directory is removed when the workspace is closed or dropped.
///
/// # Example
///
/// ```no_run
/// use cafconvert_av::RequestWorkspace;
/// use cafconvert_core::RequestId;
///
/// # async fn example() -> cafconvert_core::Result<()> {
/// let workspace = RequestWorkspace::create(std::path::Path::new("uploads"), RequestId::new())?;
/// let input = workspace.persist_upload("clip.caf", b"...").await?;
/// // ... convert `input` ...
/// workspace.close();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RequestWorkspace {
    id: RequestId,
    temp_dir: TempDir,
}

impl RequestWorkspace {
    /// Create `<root>/req-<id>-XXXXXX/`, creating `root` if needed.
    pub fn create(root: &Path, id: RequestId) -> Result<Self> {
        std::fs::create_dir_all(root)?;

        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("req-{id}-"))
            .tempdir_in(root)
            .map_err(|e| Error::Internal(format!("failed to create request workspace: {e}")))?;

        tracing::debug!(request_id = %id, path = %temp_dir.path().display(), "Created request workspace");

        Ok(Self { id, temp_dir })
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Path of the workspace directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path for a named transient file inside the workspace. Nothing is
    /// created.
    pub fn transient_path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Write uploaded bytes under `name` and return the path written.
    ///
    /// `name` must already be sanitized.
    pub async fn persist_upload(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.transient_path(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Remove the workspace directory and everything left in it.
    pub fn close(self) {
        let path = self.temp_dir.path().to_path_buf();
        if let Err(e) = self.temp_dir.close() {
            tracing::warn!(request_id = %self.id, path = %path.display(), "Failed to remove request workspace: {e}");
        }
    }
}
