//! # cafconvert-av
//!
//! Audio conversion, external tool management and transient storage for
//! cafconvert.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- locate ffmpeg once at startup.
//! - **Command execution** ([`ToolCommand`]) -- run an external process under
//!   a deadline and capture its output.
//! - **Transcoding** ([`Transcoder`], [`FfmpegTranscoder`]) -- the converter
//!   contract and its ffmpeg implementation with fixed MP3 parameters.
//! - **Single-file conversion** ([`convert_one`]) -- transcode plus output
//!   verification, collapsed to a boolean.
//! - **Transient storage** ([`RequestWorkspace`], [`janitor`]) -- per-request
//!   scratch directories and guaranteed artifact removal.

pub mod command;
pub mod convert;
pub mod janitor;
pub mod tools;
pub mod transcode;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use convert::{convert_one, convert_with_outcome, verify_artifact, ConversionOutcome};
pub use janitor::{discard, DeferredRemoval, TransientGuard};
pub use tools::{LocatedTool, ToolInfo, ToolRegistry, ToolSource};
pub use transcode::{EncodingParams, FfmpegTranscoder, Transcoder};
pub use workspace::RequestWorkspace;
