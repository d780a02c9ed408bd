//! Batch conversion orchestration.
//!
//! [`BatchConverter`] takes every file of one submission, converts the
//! eligible ones in submission order and decides the shape of the result by
//! cardinality: one file comes back as a converted file on disk, more than
//! one comes back as an in-memory zip. Every transient artifact is owned by a
//! guard from [`cafconvert_av::janitor`], so nothing outlives the request
//! whichever branch returns.

mod archive;
mod local;

pub use archive::ArchiveBuilder;
pub use local::{
    convert_directory, convert_directory_with_progress, find_sources, DirectoryEvent,
    DirectoryReport,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use cafconvert_av::{
    convert_one, convert_with_outcome, verify_artifact, ConversionOutcome, DeferredRemoval,
    RequestWorkspace, TransientGuard, Transcoder,
};
use cafconvert_core::config::{BatchPolicy, Config};
use cafconvert_core::naming::{self, ARCHIVE_NAME};
use cafconvert_core::{Error, RequestId, Result};

/// Message returned when a single upload is not a `.caf` file.
pub const INELIGIBLE_MESSAGE: &str = "Please upload only .caf files";

/// Message returned when the submission holds no usable selection.
pub const NO_FILES_SELECTED: &str = "No files selected";

/// One uploaded file as received from the caller.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Name supplied by the caller. Untrusted.
    pub name: String,
    pub bytes: Bytes,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Every upload of one submission, in the order received.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub id: RequestId,
    pub uploads: Vec<Upload>,
}

impl ConversionRequest {
    pub fn new(uploads: Vec<Upload>) -> Self {
        Self::with_id(RequestId::new(), uploads)
    }

    pub fn with_id(id: RequestId, uploads: Vec<Upload>) -> Self {
        Self { id, uploads }
    }
}

/// A converted file waiting to be delivered.
///
/// The file is removed from disk when this value, or the
/// [`DeferredRemoval`] taken out of it, is dropped.
#[derive(Debug)]
pub struct Deliverable {
    download_name: String,
    removal: DeferredRemoval,
}

impl Deliverable {
    /// Name the caller should save the file under.
    pub fn download_name(&self) -> &str {
        &self.download_name
    }

    /// Location of the converted file.
    pub fn path(&self) -> &Path {
        self.removal.path()
    }

    /// Split into the download name and the removal obligation, so the
    /// obligation can travel with the response body.
    pub fn into_parts(self) -> (String, DeferredRemoval) {
        (self.download_name, self.removal)
    }
}

/// The single output of a conversion request.
#[derive(Debug)]
pub enum ResultBundle {
    /// Exactly one file was submitted and converted.
    Single(Deliverable),
    /// More than one file was submitted. The archive may hold fewer entries
    /// than files submitted, or none at all.
    Archive {
        name: String,
        bytes: Vec<u8>,
        entries: Vec<String>,
    },
}

/// Drives per-file conversion for a whole submission.
#[derive(Clone)]
pub struct BatchConverter {
    transcoder: Arc<dyn Transcoder>,
    upload_dir: PathBuf,
    output_dir: PathBuf,
    policy: BatchPolicy,
}

impl BatchConverter {
    pub fn new(transcoder: Arc<dyn Transcoder>, upload_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            transcoder,
            upload_dir,
            output_dir,
            policy: BatchPolicy::default(),
        }
    }

    /// Build a converter using the storage and policy settings of `config`.
    pub fn from_config(transcoder: Arc<dyn Transcoder>, config: &Config) -> Self {
        Self::new(
            transcoder,
            config.storage.resolved_upload_dir(),
            config.storage.resolved_output_dir(),
        )
        .with_policy(config.conversion.batch_policy)
    }

    pub fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// Root under which request workspaces are created.
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Directory single-file results are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Convert a whole submission.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptySubmission`] if nothing was selected
    /// - [`Error::IneligibleInput`] for a single non-`.caf` upload, or any in
    ///   strict mode
    /// - [`Error::Transcode`] if a single upload fails to convert, or any in
    ///   strict mode
    pub async fn convert(&self, request: ConversionRequest) -> Result<ResultBundle> {
        let selected = request
            .uploads
            .first()
            .is_some_and(|upload| !upload.name.is_empty());
        if !selected {
            return Err(Error::EmptySubmission(NO_FILES_SELECTED.into()));
        }

        let workspace = RequestWorkspace::create(&self.upload_dir, request.id)?;

        tracing::info!(
            request_id = %request.id,
            files = request.uploads.len(),
            "Converting submission"
        );

        let result = match request.uploads.as_slice() {
            [upload] => self.convert_single(&workspace, upload).await,
            uploads => self.convert_many(&workspace, uploads).await,
        };

        workspace.close();
        result
    }

    async fn convert_single(
        &self,
        workspace: &RequestWorkspace,
        upload: &Upload,
    ) -> Result<ResultBundle> {
        let sanitized = eligible_name(upload)
            .ok_or_else(|| Error::IneligibleInput(INELIGIBLE_MESSAGE.into()))?;

        let mut guard = TransientGuard::new();
        let input = guard.track(workspace.persist_upload(&sanitized, &upload.bytes).await?);

        // Converted inside the workspace; the shared output directory is only
        // touched once there is a verified file to put there.
        let download_name = naming::output_file_name(&sanitized);
        let staged = guard.track(workspace.transient_path(&download_name));

        if !convert_one(self.transcoder.as_ref(), &input, &staged).await {
            return Err(Error::transcode(format!("could not convert {}", upload.name)));
        }
        verify_artifact(&staged).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self.output_dir.join(&download_name);
        place(&staged, &output).await?;

        tracing::info!(file = %download_name, "Converted single file");

        Ok(ResultBundle::Single(Deliverable {
            download_name,
            removal: DeferredRemoval::new(output),
        }))
    }

    async fn convert_many(
        &self,
        workspace: &RequestWorkspace,
        uploads: &[Upload],
    ) -> Result<ResultBundle> {
        let mut archive = ArchiveBuilder::new();

        for upload in uploads {
            let Some(sanitized) = eligible_name(upload) else {
                if self.policy == BatchPolicy::Strict {
                    return Err(Error::IneligibleInput(format!(
                        "{}: {INELIGIBLE_MESSAGE}",
                        upload.name
                    )));
                }
                tracing::debug!(file = %upload.name, "Skipping ineligible upload");
                continue;
            };

            // Dropped at the end of each iteration, so at most one
            // input/output pair is on disk at a time.
            let mut guard = TransientGuard::new();
            let input = guard.track(workspace.persist_upload(&sanitized, &upload.bytes).await?);
            let output_name = naming::output_file_name(&sanitized);
            let output = guard.track(workspace.transient_path(&output_name));

            match convert_with_outcome(self.transcoder.as_ref(), &input, &output).await {
                ConversionOutcome::Success(path) => {
                    let data = tokio::fs::read(&path).await?;
                    let entry = archive.append(&output_name, &data)?;
                    tracing::debug!(file = %upload.name, entry = %entry, "Added archive entry");
                }
                ConversionOutcome::Failure(reason) => {
                    if self.policy == BatchPolicy::Strict {
                        return Err(Error::transcode(format!("{}: {reason}", upload.name)));
                    }
                    tracing::warn!(file = %upload.name, "Leaving failed file out of archive");
                }
            }
        }

        let (bytes, entries) = archive.finish()?;

        tracing::info!(
            submitted = uploads.len(),
            converted = entries.len(),
            "Assembled archive"
        );

        Ok(ResultBundle::Archive {
            name: ARCHIVE_NAME.to_string(),
            bytes,
            entries,
        })
    }
}

/// Move `from` to `to`, copying when they sit on different filesystems.
async fn place(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    Ok(())
}

/// The sanitized name of an eligible upload, or `None` if it must be
/// skipped.
fn eligible_name(upload: &Upload) -> Option<String> {
    if !naming::is_eligible(&upload.name) {
        return None;
    }
    let sanitized = naming::sanitize_filename(&upload.name);
    (!sanitized.is_empty()).then_some(sanitized)
}
