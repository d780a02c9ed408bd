//! The converter contract and its ffmpeg implementation.
//!
//! A [`Transcoder`] turns one input file into one MP3 file. The rest of the
//! system only depends on the trait, so any converter that honours the
//! contract can be substituted (tests use an in-process fake).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use cafconvert_core::config::ConversionConfig;
use cafconvert_core::{Error, Result};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Convert one file at `input` into an MP3 at `output`.
///
/// Implementations overwrite any existing file at `output`. On success
/// exactly one file exists at `output`; on failure `output` may be missing
/// or hold a partial file, which callers must not trust.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run the conversion, returning [`Error::Transcode`] with diagnostic
    /// text on failure.
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Fixed encoder parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingParams {
    /// ffmpeg audio encoder name.
    pub codec: String,
    /// Target bitrate, in ffmpeg syntax (e.g. `192k`).
    pub bitrate: String,
}

impl Default for EncodingParams {
    fn default() -> Self {
        Self {
            codec: "libmp3lame".to_string(),
            bitrate: "192k".to_string(),
        }
    }
}

impl From<&ConversionConfig> for EncodingParams {
    fn from(config: &ConversionConfig) -> Self {
        Self {
            codec: config.codec.clone(),
            bitrate: config.bitrate.clone(),
        }
    }
}

/// [`Transcoder`] backed by the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    params: EncodingParams,
    timeout: Duration,
}

impl FfmpegTranscoder {
    /// Create a transcoder for the given ffmpeg executable with default
    /// parameters and a 5 minute timeout.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            params: EncodingParams::default(),
            timeout: Duration::from_secs(300),
        }
    }

    /// Build a transcoder from discovered tools and the conversion config.
    ///
    /// When ffmpeg was not discovered the bare name is used, so every
    /// conversion fails with a spawn error rather than the server refusing
    /// to start.
    pub fn discover(registry: &ToolRegistry, config: &ConversionConfig) -> Self {
        let program = match registry.require("ffmpeg") {
            Ok(tool) => tool.path.clone(),
            Err(e) => {
                tracing::warn!("{e}; conversions will fail until ffmpeg is installed");
                PathBuf::from("ffmpeg")
            }
        };

        Self::new(program)
            .with_params(EncodingParams::from(config))
            .with_timeout(config.timeout())
    }

    /// Override the encoder parameters.
    pub fn with_params(mut self, params: EncodingParams) -> Self {
        self.params = params;
        self
    }

    /// Override the per-file timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The ffmpeg executable this transcoder runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The full ffmpeg argument list for one conversion.
    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            // Drop embedded artwork streams.
            "-vn".to_string(),
            "-codec:a".to_string(),
            self.params.codec.clone(),
            "-b:a".to_string(),
            self.params.bitrate.clone(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        let args = self.args(input, output);
        tracing::debug!(?args, "Running ffmpeg");

        let cmd = ToolCommand::new(self.program.clone())
            .args(args)
            .deadline(self.timeout);

        match cmd.execute().await {
            Ok(_) => Ok(()),
            Err(Error::Tool { message, .. }) => Err(Error::transcode(message)),
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_mp3_192k() {
        let params = EncodingParams::default();
        assert_eq!(params.codec, "libmp3lame");
        assert_eq!(params.bitrate, "192k");
    }

    #[test]
    fn params_follow_config() {
        let config = ConversionConfig {
            bitrate: "128k".into(),
            ..ConversionConfig::default()
        };
        let params = EncodingParams::from(&config);
        assert_eq!(params.bitrate, "128k");
        assert_eq!(params.codec, "libmp3lame");
    }

    #[test]
    fn args_overwrite_and_encode() {
        let t = FfmpegTranscoder::new(PathBuf::from("ffmpeg"));
        let args = t.args(Path::new("/in/clip.caf"), Path::new("/out/clip.mp3"));

        assert!(args.contains(&"-y".to_string()));
        let codec = args.iter().position(|a| a == "-codec:a").unwrap();
        assert_eq!(args[codec + 1], "libmp3lame");
        let bitrate = args.iter().position(|a| a == "-b:a").unwrap();
        assert_eq!(args[bitrate + 1], "192k");
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "/in/clip.caf");
        assert_eq!(args.last().unwrap(), "/out/clip.mp3");
    }

    #[test]
    fn discover_without_ffmpeg_falls_back_to_name() {
        let t = FfmpegTranscoder::discover(&ToolRegistry::default(), &ConversionConfig::default());
        assert_eq!(t.program(), Path::new("ffmpeg"));
    }

    #[cfg(unix)]
    mod script {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Write an executable shell script standing in for ffmpeg.
        fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("ffmpeg");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn success_writes_output() {
            let dir = tempfile::tempdir().unwrap();
            // The output path is the last argument.
            let program = fake_ffmpeg(dir.path(), r#"for last; do :; done; printf 'ID3' > "$last""#);
            let output = dir.path().join("clip.mp3");

            FfmpegTranscoder::new(program)
                .transcode(&dir.path().join("clip.caf"), &output)
                .await
                .unwrap();

            assert_eq!(std::fs::read(&output).unwrap(), b"ID3");
        }

        #[tokio::test]
        async fn failure_carries_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(
                dir.path(),
                "echo 'Invalid data found when processing input' >&2; exit 1",
            );

            let err = FfmpegTranscoder::new(program)
                .transcode(&dir.path().join("broken.caf"), &dir.path().join("broken.mp3"))
                .await
                .unwrap_err();

            assert!(matches!(err, Error::Transcode { .. }));
            assert!(err.to_string().contains("Invalid data found"));
        }

        #[tokio::test]
        async fn timeout_is_a_transcode_error() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(dir.path(), "sleep 10");

            let err = FfmpegTranscoder::new(program)
                .with_timeout(Duration::from_millis(100))
                .transcode(&dir.path().join("slow.caf"), &dir.path().join("slow.mp3"))
                .await
                .unwrap_err();

            assert!(matches!(err, Error::Transcode { .. }));
            assert!(err.to_string().contains("timed out"));
        }

        #[tokio::test]
        async fn missing_program_is_a_transcode_error() {
            let dir = tempfile::tempdir().unwrap();
            let err = FfmpegTranscoder::new(dir.path().join("no-such-ffmpeg"))
                .transcode(&dir.path().join("a.caf"), &dir.path().join("a.mp3"))
                .await
                .unwrap_err();

            assert!(matches!(err, Error::Transcode { .. }));
        }
    }
}
