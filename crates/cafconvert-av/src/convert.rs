//! Single-file conversion: transcode, then verify the artifact.

use std::path::{Path, PathBuf};

use cafconvert_core::{Error, Result};

use crate::transcode::Transcoder;

/// Terminal result of converting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// The output exists and is non-empty.
    Success(PathBuf),
    /// The converter failed or produced nothing usable.
    Failure(String),
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Success(_))
    }
}

/// Check that a converted file exists and has content, returning its size.
pub async fn verify_artifact(path: &Path) -> Result<u64> {
    let meta = tokio::fs::metadata(path).await.map_err(|_| {
        Error::ArtifactVerification(format!("output file not found: {}", path.display()))
    })?;

    if !meta.is_file() || meta.len() == 0 {
        return Err(Error::ArtifactVerification(format!(
            "output file is empty: {}",
            path.display()
        )));
    }

    Ok(meta.len())
}

/// Convert `input` into `output` and verify the result.
///
/// Never returns an error: every failure becomes
/// [`ConversionOutcome::Failure`] with the reason, and is logged.
pub async fn convert_with_outcome(
    transcoder: &dyn Transcoder,
    input: &Path,
    output: &Path,
) -> ConversionOutcome {
    if let Err(e) = transcoder.transcode(input, output).await {
        tracing::error!(input = %input.display(), "Conversion failed: {e}");
        return ConversionOutcome::Failure(e.to_string());
    }

    match verify_artifact(output).await {
        Ok(size) => {
            tracing::debug!(output = %output.display(), size, "Conversion succeeded");
            ConversionOutcome::Success(output.to_path_buf())
        }
        Err(e) => {
            tracing::warn!(input = %input.display(), "{e}");
            ConversionOutcome::Failure(e.to_string())
        }
    }
}

/// Convert `input` into `output`, reporting only whether a usable file now
/// exists at `output`.
pub async fn convert_one(transcoder: &dyn Transcoder, input: &Path, output: &Path) -> bool {
    convert_with_outcome(transcoder, input, output)
        .await
        .is_success()
}
