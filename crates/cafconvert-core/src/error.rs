//! Unified error type for cafconvert.
//!
//! Every crate funnels its failures into [`Error`], which carries enough
//! context for the HTTP layer to derive a status code via
//! [`Error::http_status`]. Client-class variants describe bad submissions,
//! server-class variants describe conversion or storage failures.

/// Unified error type covering all failure modes in cafconvert.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Nothing was submitted, or the selection was empty.
    #[error("{0}")]
    EmptySubmission(String),

    /// A submitted file is not eligible for conversion (wrong extension or
    /// unusable name).
    #[error("{0}")]
    IneligibleInput(String),

    /// The request body exceeded the configured upload limit.
    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    /// Request or configuration data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The converter failed, timed out, or produced no usable output.
    #[error("Conversion failed: {message}")]
    Transcode {
        /// Diagnostic text, usually the converter's stderr.
        message: String,
    },

    /// The converted artifact was missing or empty after conversion.
    #[error("Conversion failed - {0}")]
    ArtifactVerification(String),

    /// Assembling the output archive failed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// An external tool could not be found or started.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::EmptySubmission(_) => 400,
            Error::IneligibleInput(_) => 400,
            Error::Validation(_) => 400,
            Error::PayloadTooLarge(_) => 413,
            Error::Transcode { .. } => 500,
            Error::ArtifactVerification(_) => 500,
            Error::Archive(_) => 500,
            Error::Tool { .. } => 502,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::Transcode`].
    pub fn transcode(message: impl Into<String>) -> Self {
        Error::Transcode {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
